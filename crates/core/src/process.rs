/// Running applications and process control
///
/// Enumerates processes whose executable lives directly in a top-level
/// `.app` bundle, and performs the three lifecycle actions the controller
/// needs: ask one app to terminate, check whether it has gone, and launch a
/// bundle again.
use crate::bundle::{bundle_for_executable, ActivationPolicy, BundleInfo};
use crate::error::DockError;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessStatus, Signal, System};
use tracing::{debug, info, warn};

/// A live application instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningApp {
    pub pid: u32,
    pub name: String,
    pub bundle_path: PathBuf,
    pub bundle_id: Option<String>,
    pub policy: ActivationPolicy,
}

/// Process-table access used by the registry and lifecycle controller
pub trait ProcessControl: Send + Sync {
    /// One entry per running application bundle, in ascending pid order
    fn running_applications(&self) -> Vec<RunningApp>;

    /// The running instance of `bundle`, if any
    fn find_running(&self, bundle: &Path) -> Option<RunningApp> {
        self.running_applications()
            .into_iter()
            .find(|app| app.bundle_path == bundle)
    }

    /// Request graceful termination. A process that is already gone counts.
    fn terminate(&self, app: &RunningApp) -> Result<(), DockError>;

    /// Whether `app`'s process has exited
    fn has_exited(&self, app: &RunningApp) -> bool;

    /// Launch (and activate) a bundle
    fn launch(&self, bundle: &Path) -> Result<(), DockError>;
}

/// `ProcessControl` over the live process table
pub struct SystemProcesses {
    system: Mutex<System>,
}

impl SystemProcesses {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for SystemProcesses {
    fn running_applications(&self) -> Vec<RunningApp> {
        let mut bundles: Vec<(u32, PathBuf)> = {
            let mut system = self.system.lock();
            system.refresh_processes();
            system
                .processes()
                .iter()
                .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
                .filter_map(|(pid, process)| {
                    let bundle = bundle_for_executable(process.exe()?)?;
                    Some((pid.as_u32(), bundle))
                })
                .collect()
        };
        bundles.sort_by_key(|(pid, _)| *pid);

        let mut seen = HashSet::new();
        let apps: Vec<RunningApp> = bundles
            .into_iter()
            .filter(|(_, bundle)| seen.insert(bundle.clone()))
            .map(|(pid, bundle_path)| {
                let info = BundleInfo::load(&bundle_path);
                RunningApp {
                    pid,
                    name: info.name,
                    bundle_id: info.identifier,
                    policy: info.policy,
                    bundle_path,
                }
            })
            .collect();

        debug!("Found {} running application bundles", apps.len());
        apps
    }

    fn terminate(&self, app: &RunningApp) -> Result<(), DockError> {
        let pid = Pid::from_u32(app.pid);
        let mut system = self.system.lock();

        if !system.refresh_process(pid) {
            debug!("{} (pid {}) already gone", app.name, app.pid);
            return Ok(());
        }
        let Some(process) = system.process(pid) else {
            return Ok(());
        };

        let delivered = match process.kill_with(Signal::Term) {
            Some(sent) => sent,
            None => process.kill(),
        };

        if delivered {
            info!("Requested termination of {} (pid {})", app.name, app.pid);
            Ok(())
        } else {
            Err(DockError::TerminationFailed {
                name: app.name.clone(),
                pid: app.pid,
            })
        }
    }

    fn has_exited(&self, app: &RunningApp) -> bool {
        let pid = Pid::from_u32(app.pid);
        let mut system = self.system.lock();

        if !system.refresh_process(pid) {
            return true;
        }
        match system.process(pid) {
            None => true,
            Some(process) if process.status() == ProcessStatus::Zombie => true,
            // The pid was recycled by an unrelated executable
            Some(process) => process
                .exe()
                .map(|exe| !exe.starts_with(&app.bundle_path))
                .unwrap_or(false),
        }
    }

    fn launch(&self, bundle: &Path) -> Result<(), DockError> {
        if !bundle.exists() {
            warn!("Cannot relaunch {:?}: bundle is gone", bundle);
            return Err(DockError::ProcessNotFound(bundle.to_path_buf()));
        }

        open::that(bundle).map_err(|source| DockError::RelaunchFailed {
            path: bundle.to_path_buf(),
            source,
        })?;

        info!("Launched {:?}", bundle);
        Ok(())
    }
}
