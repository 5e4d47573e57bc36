/// Application bundle metadata
///
/// Locates a bundle's `Contents/Info.plist` and pulls out the handful of keys
/// the rest of the crate cares about: display name, bundle identifier and the
/// activation policy the OS will give the app at launch.
use plist::{Dictionary, Value};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key whose presence hides an app's Dock icon
pub const SENTINEL_KEY: &str = "LSUIElement";

/// Key marking a faceless background app
pub const BACKGROUND_ONLY_KEY: &str = "LSBackgroundOnly";

/// Whether a process gets a Dock icon and menu bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationPolicy {
    /// Ordinary app with Dock icon
    Regular,
    /// No Dock icon, may still show windows (LSUIElement)
    Accessory,
    /// Background only, never shows UI (LSBackgroundOnly)
    Prohibited,
}

/// Path of the metadata file inside a bundle
pub fn info_plist_path(bundle: &Path) -> PathBuf {
    bundle.join("Contents").join("Info.plist")
}

/// Read the bundle's Info.plist as a dictionary, `None` on any failure
pub fn read_info_plist(bundle: &Path) -> Option<Dictionary> {
    let path = info_plist_path(bundle);
    match Value::from_file(&path) {
        Ok(Value::Dictionary(dict)) => Some(dict),
        Ok(_) => {
            debug!("Info.plist at {:?} is not a dictionary", path);
            None
        }
        Err(e) => {
            debug!("Cannot read {:?}: {}", path, e);
            None
        }
    }
}

/// Interpret a plist flag the way the bundle loader does
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Integer(i) => i.as_signed().map(|n| n != 0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            s == "1" || s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("yes")
        }
        _ => false,
    }
}

/// Display metadata for one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    pub name: String,
    pub identifier: Option<String>,
    pub policy: ActivationPolicy,
}

impl BundleInfo {
    /// Load metadata, falling back to the bundle's file stem for the name
    pub fn load(bundle: &Path) -> Self {
        let fallback_name = bundle
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| bundle.display().to_string());

        let Some(dict) = read_info_plist(bundle) else {
            return BundleInfo {
                name: fallback_name,
                identifier: None,
                policy: ActivationPolicy::Regular,
            };
        };

        Self::from_dictionary(&dict, fallback_name)
    }

    fn from_dictionary(dict: &Dictionary, fallback_name: String) -> Self {
        let string_key = |key: &str| {
            dict.get(key)
                .and_then(Value::as_string)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let name = string_key("CFBundleDisplayName")
            .or_else(|| string_key("CFBundleName"))
            .unwrap_or(fallback_name);

        let flag = |key: &str| dict.get(key).map(is_truthy).unwrap_or(false);
        let policy = if flag(BACKGROUND_ONLY_KEY) {
            ActivationPolicy::Prohibited
        } else if flag(SENTINEL_KEY) {
            ActivationPolicy::Accessory
        } else {
            ActivationPolicy::Regular
        };

        BundleInfo {
            name,
            identifier: string_key("CFBundleIdentifier"),
            policy,
        }
    }
}

/// Whether `path` names an `.app` bundle (by extension only)
pub fn is_app_bundle(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("app"))
        .unwrap_or(false)
}

/// Top-level `.app` bundle whose `Contents/MacOS` directly holds `exe`.
///
/// Helper apps nested inside another bundle (`Foo.app/Contents/Frameworks/
/// Helper.app/...`) return `None`: they belong to their host application.
pub fn bundle_for_executable(exe: &Path) -> Option<PathBuf> {
    let macos = exe.parent()?;
    if macos.file_name()? != "MacOS" {
        return None;
    }
    let contents = macos.parent()?;
    if contents.file_name()? != "Contents" {
        return None;
    }
    let bundle = contents.parent()?;
    if !is_app_bundle(bundle) {
        return None;
    }
    if bundle.ancestors().skip(1).any(is_app_bundle) {
        return None;
    }
    Some(bundle.to_path_buf())
}
