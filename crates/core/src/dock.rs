/// Dock pin list reader
///
/// The Dock keeps its pinned applications in
/// `~/Library/Preferences/com.apple.dock.plist` under `persistent-apps`. Each
/// entry's `tile-data` carries the app's location as a file URL plus a label.
/// This module only ever reads that file.
use crate::bundle::is_app_bundle;
use crate::error::DockError;
use directories::BaseDirs;
use plist::{Dictionary, Value};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

const PERSISTENT_APPS_KEY: &str = "persistent-apps";

/// One application pinned in the Dock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinnedApp {
    pub label: String,
    pub bundle_path: PathBuf,
    pub bundle_id: Option<String>,
}

/// Location of the current user's Dock preferences
pub fn default_dock_preferences() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| {
        dirs.home_dir()
            .join("Library")
            .join("Preferences")
            .join("com.apple.dock.plist")
    })
}

/// Read the pinned applications in Dock order.
///
/// A missing preferences file means nothing is pinned, not an error.
pub fn read_pinned_apps(path: &Path) -> Result<Vec<PinnedApp>, DockError> {
    if !path.exists() {
        debug!("No Dock preferences at {:?}, treating pin list as empty", path);
        return Ok(Vec::new());
    }

    let unreadable = |reason: String| DockError::PinListUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let document = Value::from_file(path).map_err(|e| unreadable(e.to_string()))?;
    pinned_from_document(&document).map_err(unreadable)
}

/// Extract pinned apps from a parsed Dock preferences document
pub fn pinned_from_document(document: &Value) -> Result<Vec<PinnedApp>, String> {
    let root = document
        .as_dictionary()
        .ok_or_else(|| "top-level object is not a dictionary".to_string())?;

    let Some(entries) = root.get(PERSISTENT_APPS_KEY) else {
        return Ok(Vec::new());
    };
    let entries = entries
        .as_array()
        .ok_or_else(|| format!("`{}` is not an array", PERSISTENT_APPS_KEY))?;

    Ok(entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let pinned = entry.as_dictionary().and_then(pinned_from_tile);
            if pinned.is_none() {
                debug!("Skipping Dock tile #{}: not an application", index);
            }
            pinned
        })
        .collect())
}

fn pinned_from_tile(entry: &Dictionary) -> Option<PinnedApp> {
    let tile = entry.get("tile-data")?.as_dictionary()?;
    let raw_url = tile
        .get("file-data")?
        .as_dictionary()?
        .get("_CFURLString")?
        .as_string()?;

    let bundle_path = path_from_url_string(raw_url)?;
    if !is_app_bundle(&bundle_path) {
        return None;
    }

    let label = tile
        .get("file-label")
        .and_then(Value::as_string)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            bundle_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })?;

    Some(PinnedApp {
        label,
        bundle_id: tile
            .get("bundle-identifier")
            .and_then(Value::as_string)
            .map(str::to_string),
        bundle_path,
    })
}

/// Decode `file:///Applications/Visual%20Studio%20Code.app/` or a bare POSIX path
fn path_from_url_string(raw: &str) -> Option<PathBuf> {
    let path = if raw.starts_with("file:") {
        Url::parse(raw).ok()?.to_file_path().ok()?
    } else if raw.starts_with('/') {
        PathBuf::from(raw)
    } else {
        return None;
    };
    // Drop the trailing slash the Dock stores for directories
    Some(path.components().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(url: &str, label: &str, bundle_id: Option<&str>) -> Value {
        let mut file_data = Dictionary::new();
        file_data.insert("_CFURLString".into(), Value::String(url.into()));
        file_data.insert("_CFURLStringType".into(), Value::Integer(15i64.into()));

        let mut tile_data = Dictionary::new();
        tile_data.insert("file-data".into(), Value::Dictionary(file_data));
        tile_data.insert("file-label".into(), Value::String(label.into()));
        if let Some(id) = bundle_id {
            tile_data.insert("bundle-identifier".into(), Value::String(id.into()));
        }

        let mut entry = Dictionary::new();
        entry.insert("tile-data".into(), Value::Dictionary(tile_data));
        entry.insert("tile-type".into(), Value::String("file-tile".into()));
        Value::Dictionary(entry)
    }

    fn dock_document(tiles: Vec<Value>) -> Value {
        let mut root = Dictionary::new();
        root.insert(PERSISTENT_APPS_KEY.into(), Value::Array(tiles));
        root.insert("tilesize".into(), Value::Integer(48i64.into()));
        Value::Dictionary(root)
    }

    #[test]
    fn test_reads_pinned_apps_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("com.apple.dock.plist");
        dock_document(vec![
            tile("file:///System/Applications/Mail.app/", "Mail", Some("com.apple.mail")),
            tile(
                "file:///Applications/Visual%20Studio%20Code.app/",
                "Visual Studio Code",
                None,
            ),
        ])
        .to_file_binary(&path)
        .unwrap();

        let pinned = read_pinned_apps(&path).unwrap();
        assert_eq!(pinned.len(), 2);
        assert_eq!(pinned[0].label, "Mail");
        assert_eq!(pinned[0].bundle_path, PathBuf::from("/System/Applications/Mail.app"));
        assert_eq!(pinned[0].bundle_id.as_deref(), Some("com.apple.mail"));
        assert_eq!(
            pinned[1].bundle_path,
            PathBuf::from("/Applications/Visual Studio Code.app")
        );
    }

    #[test]
    fn test_skips_non_application_tiles() {
        let mut spacer = Dictionary::new();
        spacer.insert("tile-data".into(), Value::Dictionary(Dictionary::new()));
        spacer.insert("tile-type".into(), Value::String("spacer-tile".into()));

        let document = dock_document(vec![
            Value::Dictionary(spacer),
            tile("file:///Users/me/Downloads/", "Downloads", None),
            tile("/Applications/Safari.app", "Safari", None),
        ]);

        let pinned = pinned_from_document(&document).unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].bundle_path, PathBuf::from("/Applications/Safari.app"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pinned = read_pinned_apps(&dir.path().join("absent.plist")).unwrap();
        assert!(pinned.is_empty());
    }

    #[test]
    fn test_malformed_documents_are_errors() {
        let dir = tempfile::tempdir().unwrap();

        let garbage = dir.path().join("garbage.plist");
        std::fs::write(&garbage, b"\x00\x01 definitely not a plist").unwrap();
        assert!(matches!(
            read_pinned_apps(&garbage),
            Err(DockError::PinListUnreadable { .. })
        ));

        let mut root = Dictionary::new();
        root.insert(PERSISTENT_APPS_KEY.into(), Value::String("nope".into()));
        assert!(pinned_from_document(&Value::Dictionary(root)).is_err());
    }

    #[test]
    fn test_document_without_pins() {
        let document = Value::Dictionary(Dictionary::new());
        assert!(pinned_from_document(&document).unwrap().is_empty());
    }
}
