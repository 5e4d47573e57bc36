//! Visibility Store
//!
//! The Dock-icon flag lives in each application's own `Info.plist`: the
//! `LSUIElement` key set to `"1"` hides the icon, its absence shows it. Nothing
//! here caches the flag; every query goes back to disk.
//!
//! Writes are all-or-nothing. The new document is serialized in the file's
//! existing format (binary or XML), written to a sibling temp file carrying the
//! original permissions, then renamed over the original.

use crate::bundle::{info_plist_path, is_truthy, read_info_plist, SENTINEL_KEY};
use crate::error::DockError;
use plist::Value;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// Value written under the sentinel key to hide an app
pub const HIDDEN_MARKER: &str = "1";

const BINARY_MAGIC: &[u8] = b"bplist00";

/// Read/write access to the per-application hidden flag
pub trait VisibilityFlags: Send + Sync {
    /// Current on-disk flag. Missing or unparsable metadata reads as visible.
    fn is_hidden(&self, bundle: &Path) -> bool;

    /// Persist the flag. Only processes launched afterwards observe it.
    fn set_hidden(&self, bundle: &Path, hidden: bool) -> Result<(), DockError>;
}

/// `VisibilityFlags` backed by the bundle's Info.plist
#[derive(Debug, Default, Clone, Copy)]
pub struct PlistVisibilityStore;

impl PlistVisibilityStore {
    pub fn new() -> Self {
        Self
    }
}

impl VisibilityFlags for PlistVisibilityStore {
    fn is_hidden(&self, bundle: &Path) -> bool {
        read_info_plist(bundle)
            .and_then(|dict| dict.get(SENTINEL_KEY).map(is_truthy))
            .unwrap_or(false)
    }

    fn set_hidden(&self, bundle: &Path, hidden: bool) -> Result<(), DockError> {
        let path = info_plist_path(bundle);

        let bytes = fs::read(&path).map_err(|e| DockError::MetadataUnreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let binary = bytes.starts_with(BINARY_MAGIC);

        let mut document =
            Value::from_reader(Cursor::new(&bytes)).map_err(|e| DockError::MetadataUnreadable {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let dict = document
            .as_dictionary_mut()
            .ok_or_else(|| DockError::MetadataUnreadable {
                path: path.clone(),
                reason: "top-level object is not a dictionary".to_string(),
            })?;

        // Only the canonical layout counts as already done: "1" or no key
        let in_place = match dict.get(SENTINEL_KEY) {
            Some(Value::String(marker)) => hidden && marker == HIDDEN_MARKER,
            Some(_) => false,
            None => !hidden,
        };
        if in_place {
            debug!("{:?} already has hidden={}, nothing to write", path, hidden);
            return Ok(());
        }

        if hidden {
            dict.insert(
                SENTINEL_KEY.to_string(),
                Value::String(HIDDEN_MARKER.to_string()),
            );
        } else {
            dict.remove(SENTINEL_KEY);
        }

        let mut payload = Vec::with_capacity(bytes.len() + 64);
        let serialized = if binary {
            document.to_writer_binary(&mut payload)
        } else {
            document.to_writer_xml(&mut payload)
        };
        serialized.map_err(|e| DockError::write_failed(&path, e))?;

        write_atomic(&path, &payload)?;

        info!("Set {}={} in {:?}", SENTINEL_KEY, hidden, path);
        Ok(())
    }
}

fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), DockError> {
    let temp_path = match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.tmp", name.to_string_lossy())),
        None => path.with_extension("tmp"),
    };

    let replaced = fs::write(&temp_path, payload)
        .and_then(|_| match fs::metadata(path) {
            Ok(meta) => fs::set_permissions(&temp_path, meta.permissions()),
            Err(_) => Ok(()),
        })
        .and_then(|_| fs::rename(&temp_path, path));

    replaced.map_err(|source| {
        // Leave nothing half-written behind; a directory in the way is not ours
        if temp_path.is_file() {
            let _ = fs::remove_file(&temp_path);
        }
        DockError::MetadataWriteFailed {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::Dictionary;
    use std::path::PathBuf;

    fn make_bundle(root: &Path, binary: bool) -> PathBuf {
        let bundle = root.join("Example.app");
        fs::create_dir_all(bundle.join("Contents")).unwrap();

        let mut dict = Dictionary::new();
        dict.insert("CFBundleName".into(), Value::String("Example".into()));
        dict.insert("CFBundleIdentifier".into(), Value::String("com.example.app".into()));
        let doc = Value::Dictionary(dict);
        if binary {
            doc.to_file_binary(info_plist_path(&bundle)).unwrap();
        } else {
            doc.to_file_xml(info_plist_path(&bundle)).unwrap();
        }
        bundle
    }

    fn read_dict(bundle: &Path) -> Dictionary {
        Value::from_file(info_plist_path(bundle))
            .unwrap()
            .into_dictionary()
            .unwrap()
    }

    #[test]
    fn test_hide_then_show() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(dir.path(), false);
        let store = PlistVisibilityStore::new();

        assert!(!store.is_hidden(&bundle));

        store.set_hidden(&bundle, true).unwrap();
        assert!(store.is_hidden(&bundle));
        assert!(!fs::read(info_plist_path(&bundle))
            .unwrap()
            .starts_with(BINARY_MAGIC));
        let dict = read_dict(&bundle);
        assert_eq!(
            dict.get(SENTINEL_KEY).and_then(Value::as_string),
            Some(HIDDEN_MARKER)
        );
        assert_eq!(
            dict.get("CFBundleIdentifier").and_then(Value::as_string),
            Some("com.example.app")
        );

        store.set_hidden(&bundle, false).unwrap();
        assert!(!store.is_hidden(&bundle));
        assert!(read_dict(&bundle).get(SENTINEL_KEY).is_none());
        assert!(!fs::read(info_plist_path(&bundle))
            .unwrap()
            .starts_with(BINARY_MAGIC));
    }

    fn write_sentinel(bundle: &Path, value: Value) {
        let mut dict = read_dict(bundle);
        dict.insert(SENTINEL_KEY.to_string(), value);
        Value::Dictionary(dict)
            .to_file_xml(info_plist_path(bundle))
            .unwrap();
    }

    #[test]
    fn test_show_removes_non_truthy_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(dir.path(), false);
        write_sentinel(&bundle, Value::String("0".to_string()));
        let store = PlistVisibilityStore::new();
        assert!(!store.is_hidden(&bundle));

        store.set_hidden(&bundle, false).unwrap();

        assert!(read_dict(&bundle).get(SENTINEL_KEY).is_none());
    }

    #[test]
    fn test_hide_rewrites_non_canonical_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(dir.path(), false);
        write_sentinel(&bundle, Value::Boolean(false));
        let store = PlistVisibilityStore::new();

        store.set_hidden(&bundle, true).unwrap();

        assert_eq!(
            read_dict(&bundle).get(SENTINEL_KEY).and_then(Value::as_string),
            Some(HIDDEN_MARKER)
        );
        assert!(store.is_hidden(&bundle));
    }

    #[test]
    fn test_repeated_write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(dir.path(), false);
        let store = PlistVisibilityStore::new();

        store.set_hidden(&bundle, true).unwrap();
        let first = fs::read(info_plist_path(&bundle)).unwrap();
        store.set_hidden(&bundle, true).unwrap();
        let second = fs::read(info_plist_path(&bundle)).unwrap();

        assert_eq!(first, second);
        assert!(store.is_hidden(&bundle));
    }

    #[test]
    fn test_binary_plist_stays_binary() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(dir.path(), true);
        let store = PlistVisibilityStore::new();

        store.set_hidden(&bundle, true).unwrap();

        let bytes = fs::read(info_plist_path(&bundle)).unwrap();
        assert!(bytes.starts_with(BINARY_MAGIC));
        assert!(store.is_hidden(&bundle));
    }

    #[test]
    fn test_unreadable_metadata_reads_as_visible() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlistVisibilityStore::new();

        let missing = dir.path().join("Missing.app");
        assert!(!store.is_hidden(&missing));

        let garbage = dir.path().join("Garbage.app");
        fs::create_dir_all(garbage.join("Contents")).unwrap();
        fs::write(info_plist_path(&garbage), b"not a plist at all").unwrap();
        assert!(!store.is_hidden(&garbage));
    }

    #[test]
    fn test_set_hidden_on_unreadable_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlistVisibilityStore::new();

        let missing = dir.path().join("Missing.app");
        assert!(matches!(
            store.set_hidden(&missing, true),
            Err(DockError::MetadataUnreadable { .. })
        ));

        let array = dir.path().join("Array.app");
        fs::create_dir_all(array.join("Contents")).unwrap();
        Value::Array(vec![Value::String("x".into())])
            .to_file_xml(info_plist_path(&array))
            .unwrap();
        assert!(matches!(
            store.set_hidden(&array, true),
            Err(DockError::MetadataUnreadable { .. })
        ));
    }

    #[test]
    fn test_failed_write_leaves_original_intact() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(dir.path(), false);
        let store = PlistVisibilityStore::new();
        let before = fs::read(info_plist_path(&bundle)).unwrap();

        // A directory where the temp file should go makes the write fail
        fs::create_dir_all(bundle.join("Contents").join("Info.plist.tmp")).unwrap();

        let result = store.set_hidden(&bundle, true);
        assert!(matches!(result, Err(DockError::MetadataWriteFailed { .. })));
        assert_eq!(fs::read(info_plist_path(&bundle)).unwrap(), before);
        assert!(!store.is_hidden(&bundle));
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_survive_rewrite() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(dir.path(), false);
        let path = info_plist_path(&bundle);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        PlistVisibilityStore::new().set_hidden(&bundle, true).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }
}
