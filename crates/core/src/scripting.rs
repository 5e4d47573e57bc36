/// Scripting bridge
///
/// Flips the window visibility of a running application through System
/// Events. Nothing is persisted: the app reappears on its next launch.
use crate::error::DockError;
use std::process::Command;
use tracing::debug;

/// Sends visibility commands to running applications
pub trait ScriptingBridge: Send + Sync {
    /// Toggle the visibility of the process with this bundle identifier
    fn flip_visibility(&self, bundle_id: &str) -> Result<(), DockError>;
}

/// `ScriptingBridge` driven by `osascript`
#[derive(Debug, Clone)]
pub struct OsaScriptBridge {
    program: String,
}

impl OsaScriptBridge {
    pub fn new() -> Self {
        Self {
            program: "osascript".to_string(),
        }
    }
}

impl Default for OsaScriptBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// AppleScript that negates `visible` of the matching process
pub fn flip_visibility_script(bundle_id: &str) -> Result<String, DockError> {
    if bundle_id.is_empty()
        || bundle_id
            .chars()
            .any(|c| c == '"' || c == '\\' || c.is_control())
    {
        return Err(DockError::ScriptingFailed(format!(
            "refusing to script bundle identifier {:?}",
            bundle_id
        )));
    }

    Ok(format!(
        r#"tell application "System Events"
    set targetProcess to first application process whose bundle identifier is "{}"
    set visible of targetProcess to not (visible of targetProcess)
end tell"#,
        bundle_id
    ))
}

impl ScriptingBridge for OsaScriptBridge {
    fn flip_visibility(&self, bundle_id: &str) -> Result<(), DockError> {
        let script = flip_visibility_script(bundle_id)?;
        debug!("Running visibility script for {}", bundle_id);

        let output = Command::new(&self.program)
            .args(["-e", &script])
            .output()
            .map_err(|e| DockError::ScriptingFailed(format!("{}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(DockError::ScriptingFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}
