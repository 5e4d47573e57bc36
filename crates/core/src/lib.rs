//! Dock Hider Core Library
//!
//! Lists dockable macOS applications and toggles whether each shows a Dock
//! icon, by editing the `LSUIElement` flag in the app's Info.plist and
//! restarting the app so the OS re-reads it.
//!
//! Architecture:
//! - Visibility Store (visibility module) reads and writes the flag
//! - Application Registry (registry module) merges Dock pins and running apps
//! - Lifecycle Controller (lifecycle module) writes the flag and restarts
//! - Front ends hold a `DockHider` and call into the above

pub mod bundle;
pub mod config;
pub mod dock;
pub mod error;
pub mod lifecycle;
pub mod process;
pub mod registry;
pub mod scripting;
pub mod visibility;

pub use crate::error::DockError;
pub use crate::lifecycle::{LifecycleController, Timing, ToggleOutcome, ToggleState, ToggleStrategy};
pub use crate::registry::{AppDescriptor, AppSource, ApplicationRegistry};

use crate::config::AppConfig;
use crate::process::SystemProcesses;
use crate::scripting::OsaScriptBridge;
use crate::visibility::PlistVisibilityStore;
use std::sync::Arc;

/// Registry and controller sharing one set of system backends
pub struct DockHider {
    pub registry: ApplicationRegistry,
    pub controller: LifecycleController,
}

impl DockHider {
    /// Wire the live Info.plist store, process table and osascript bridge
    pub fn from_config(config: &AppConfig) -> Self {
        let flags = Arc::new(PlistVisibilityStore::new());
        let processes = Arc::new(SystemProcesses::new());
        let bridge = Arc::new(OsaScriptBridge::new());

        Self {
            registry: ApplicationRegistry::new(
                config.dock_preferences_path(),
                processes.clone(),
                flags.clone(),
            ),
            controller: LifecycleController::new(flags, processes, bridge, config.timing()),
        }
    }
}
