//! Application Registry
//!
//! Builds the list a front end shows: every app pinned in the Dock, followed
//! by every other running app that would normally own a Dock icon, each
//! annotated with its current hidden flag. Rows are rebuilt from scratch on
//! every call.

use crate::bundle::{ActivationPolicy, BundleInfo};
use crate::dock::{read_pinned_apps, PinnedApp};
use crate::process::{ProcessControl, RunningApp};
use crate::visibility::VisibilityFlags;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppSource {
    /// Pinned in the Dock
    Pinned,
    /// Running but not pinned
    Running,
    /// Named explicitly by bundle path
    Direct,
}

/// One row of the application list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppDescriptor {
    /// Normalized bundle path; the natural key
    pub identity: PathBuf,
    pub name: String,
    pub bundle_path: PathBuf,
    pub bundle_id: Option<String>,
    pub is_hidden: bool,
    pub source: AppSource,
    /// A live instance was seen when the list was built
    pub running: bool,
}

/// Key used to match the same bundle across sources
pub fn identity_of(bundle: &Path) -> PathBuf {
    bundle.components().collect()
}

/// Merge pinned and running apps.
///
/// Pinned entries keep their Dock order and come first. Running apps already
/// pinned collapse into the pinned row; the rest follow in enumeration order,
/// except background-only processes which never get a Dock icon.
pub fn merge_applications(
    pinned: &[PinnedApp],
    running: &[RunningApp],
    flags: &dyn VisibilityFlags,
) -> Vec<AppDescriptor> {
    let running_by_identity: HashMap<PathBuf, &RunningApp> = running
        .iter()
        .map(|app| (identity_of(&app.bundle_path), app))
        .collect();

    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(pinned.len() + running.len());

    for pin in pinned {
        let identity = identity_of(&pin.bundle_path);
        if !seen.insert(identity.clone()) {
            debug!("Duplicate Dock pin for {:?}", identity);
            continue;
        }
        let live = running_by_identity.get(&identity);
        let bundle_id = pin
            .bundle_id
            .clone()
            .or_else(|| live.and_then(|app| app.bundle_id.clone()))
            .or_else(|| BundleInfo::load(&pin.bundle_path).identifier);

        merged.push(AppDescriptor {
            is_hidden: flags.is_hidden(&pin.bundle_path),
            name: pin.label.clone(),
            bundle_path: pin.bundle_path.clone(),
            bundle_id,
            source: AppSource::Pinned,
            running: live.is_some(),
            identity,
        });
    }

    for app in running {
        if app.policy == ActivationPolicy::Prohibited {
            continue;
        }
        let identity = identity_of(&app.bundle_path);
        if !seen.insert(identity.clone()) {
            continue;
        }
        merged.push(AppDescriptor {
            is_hidden: flags.is_hidden(&app.bundle_path),
            name: app.name.clone(),
            bundle_path: app.bundle_path.clone(),
            bundle_id: app.bundle_id.clone(),
            source: AppSource::Running,
            running: true,
            identity,
        });
    }

    merged
}

/// Enumerates dockable applications
pub struct ApplicationRegistry {
    dock_preferences: Option<PathBuf>,
    processes: Arc<dyn ProcessControl>,
    flags: Arc<dyn VisibilityFlags>,
}

impl ApplicationRegistry {
    pub fn new(
        dock_preferences: Option<PathBuf>,
        processes: Arc<dyn ProcessControl>,
        flags: Arc<dyn VisibilityFlags>,
    ) -> Self {
        Self {
            dock_preferences,
            processes,
            flags,
        }
    }

    /// Dock pins, or nothing when the preferences cannot be read
    pub fn pinned_apps(&self) -> Vec<PinnedApp> {
        let Some(path) = &self.dock_preferences else {
            debug!("No Dock preferences location, skipping pinned apps");
            return Vec::new();
        };
        match read_pinned_apps(path) {
            Ok(pinned) => pinned,
            Err(e) => {
                warn!("{}; listing running applications only", e);
                Vec::new()
            }
        }
    }

    pub fn list_dock_applications(&self) -> Vec<AppDescriptor> {
        let pinned = self.pinned_apps();
        let running = self.processes.running_applications();
        let merged = merge_applications(&pinned, &running, self.flags.as_ref());
        debug!(
            "Listed {} applications ({} pinned, {} running)",
            merged.len(),
            pinned.len(),
            running.len()
        );
        merged
    }

    /// Re-read a row's flag from disk, replacing any optimistic value
    pub fn refresh(&self, app: &mut AppDescriptor) {
        app.is_hidden = self.flags.is_hidden(&app.bundle_path);
        app.running = self.processes.find_running(&app.bundle_path).is_some();
    }

    /// Describe an arbitrary bundle that may be neither pinned nor running
    pub fn describe(&self, bundle: &Path) -> AppDescriptor {
        let info = BundleInfo::load(bundle);
        AppDescriptor {
            identity: identity_of(bundle),
            name: info.name,
            bundle_path: bundle.to_path_buf(),
            bundle_id: info.identifier,
            is_hidden: self.flags.is_hidden(bundle),
            source: AppSource::Direct,
            running: self.processes.find_running(bundle).is_some(),
        }
    }

    /// Resolve a user query by bundle path, bundle identifier or display name
    pub fn find(&self, query: &str) -> Option<AppDescriptor> {
        let apps = self.list_dock_applications();
        let as_path = identity_of(Path::new(query));

        apps.iter()
            .find(|app| app.identity == as_path)
            .or_else(|| {
                apps.iter().find(|app| {
                    app.bundle_id
                        .as_deref()
                        .map(|id| id.eq_ignore_ascii_case(query))
                        .unwrap_or(false)
                })
            })
            .or_else(|| apps.iter().find(|app| app.name.eq_ignore_ascii_case(query)))
            .cloned()
    }
}
