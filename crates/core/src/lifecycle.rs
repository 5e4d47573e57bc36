//! Lifecycle Controller
//!
//! Applies a Dock visibility change to one application. Two strategies:
//!
//! - `Restart`: persist the flag, terminate the app if it is running, wait for
//!   the OS to confirm the exit, then relaunch it after a short delay so the
//!   bundle loader re-reads the flag.
//! - `Immediate`: ask the scripting bridge to flip the running app's window
//!   visibility. Cosmetic only, nothing survives a relaunch.
//!
//! Operations on the same application are serialized: a second toggle waits
//! until the first one (including its deferred relaunch) has finished.

use crate::error::DockError;
use crate::process::{ProcessControl, RunningApp};
use crate::registry::AppDescriptor;
use crate::scripting::ScriptingBridge;
use crate::visibility::VisibilityFlags;
use crossbeam_channel::bounded;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a toggle is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleStrategy {
    /// Persist the flag and restart the app
    #[default]
    Restart,
    /// Flip window visibility through the scripting bridge
    Immediate,
}

/// Progress of a toggle for one application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Idle,
    WritingFlag,
    FlagWritten,
    TerminatingIfRunning,
    AwaitingTermination,
    Relaunching,
    /// The last operation failed before the app was relaunched
    Error,
}

/// What a successful toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The flag already had the requested value
    Unchanged { hidden: bool },
    /// Flag written; the app was not running
    Persisted { hidden: bool },
    /// Flag written, app terminated, relaunch scheduled
    Restarting { hidden: bool },
    /// Window visibility flipped via the scripting bridge
    WindowsFlipped,
    /// Immediate strategy on an app that is not running
    NotRunning,
}

/// Timings for the terminate/relaunch sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub poll_interval: Duration,
    pub termination_timeout: Duration,
    pub relaunch_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            termination_timeout: Duration::from_secs(10),
            relaunch_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Default)]
struct IdentityLocks {
    busy: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl IdentityLocks {
    fn acquire(self: &Arc<Self>, identity: &Path) -> IdentityGuard {
        let mut busy = self.busy.lock();
        while busy.contains(identity) {
            debug!("Waiting for in-flight operation on {:?}", identity);
            self.released.wait(&mut busy);
        }
        busy.insert(identity.to_path_buf());
        IdentityGuard {
            locks: Arc::clone(self),
            identity: identity.to_path_buf(),
        }
    }
}

/// Held for the whole operation, including a deferred relaunch
struct IdentityGuard {
    locks: Arc<IdentityLocks>,
    identity: PathBuf,
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        self.locks.busy.lock().remove(&self.identity);
        self.locks.released.notify_all();
    }
}

#[derive(Default)]
struct StateBoard(Mutex<HashMap<PathBuf, ToggleState>>);

impl StateBoard {
    fn set(&self, identity: &Path, state: ToggleState) {
        debug!("{:?} -> {:?}", identity, state);
        self.0.lock().insert(identity.to_path_buf(), state);
    }

    fn get(&self, identity: &Path) -> ToggleState {
        self.0
            .lock()
            .get(identity)
            .copied()
            .unwrap_or(ToggleState::Idle)
    }
}

/// Applies visibility changes to applications
pub struct LifecycleController {
    flags: Arc<dyn VisibilityFlags>,
    processes: Arc<dyn ProcessControl>,
    bridge: Arc<dyn ScriptingBridge>,
    timing: Timing,
    locks: Arc<IdentityLocks>,
    states: Arc<StateBoard>,
}

impl LifecycleController {
    pub fn new(
        flags: Arc<dyn VisibilityFlags>,
        processes: Arc<dyn ProcessControl>,
        bridge: Arc<dyn ScriptingBridge>,
        timing: Timing,
    ) -> Self {
        Self {
            flags,
            processes,
            bridge,
            timing,
            locks: Arc::default(),
            states: Arc::default(),
        }
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Current state of the last operation on `identity`
    pub fn state_of(&self, identity: &Path) -> ToggleState {
        self.states.get(identity)
    }

    /// Dispatch on `strategy`. `on_relaunch` only fires if a relaunch was scheduled.
    pub fn toggle<F>(
        &self,
        app: &AppDescriptor,
        strategy: ToggleStrategy,
        on_relaunch: F,
    ) -> Result<ToggleOutcome, DockError>
    where
        F: FnOnce(Result<(), DockError>) + Send + 'static,
    {
        match strategy {
            ToggleStrategy::Restart => self.toggle_by_restart(app, on_relaunch),
            ToggleStrategy::Immediate => {
                let _guard = self.locks.acquire(&app.identity);
                match self.processes.find_running(&app.bundle_path) {
                    Some(instance) => {
                        self.toggle_immediate(&instance);
                        Ok(ToggleOutcome::WindowsFlipped)
                    }
                    None => {
                        info!("{} is not running, nothing to flip", app.name);
                        Ok(ToggleOutcome::NotRunning)
                    }
                }
            }
        }
    }

    /// Persist `!app.is_hidden` and restart the app if it is running.
    ///
    /// Returns once termination is confirmed; the relaunch happens afterwards
    /// on a background thread and reports through `on_relaunch`.
    pub fn toggle_by_restart<F>(
        &self,
        app: &AppDescriptor,
        on_relaunch: F,
    ) -> Result<ToggleOutcome, DockError>
    where
        F: FnOnce(Result<(), DockError>) + Send + 'static,
    {
        let guard = self.locks.acquire(&app.identity);
        self.apply(app, !app.is_hidden, guard, on_relaunch)
    }

    /// Like `toggle_by_restart` with an explicit target. Already-matching
    /// flags are left alone and the app is not restarted.
    pub fn set_visibility<F>(
        &self,
        app: &AppDescriptor,
        hidden: bool,
        on_relaunch: F,
    ) -> Result<ToggleOutcome, DockError>
    where
        F: FnOnce(Result<(), DockError>) + Send + 'static,
    {
        let guard = self.locks.acquire(&app.identity);
        if self.flags.is_hidden(&app.bundle_path) == hidden {
            debug!("{} already has hidden={}", app.name, hidden);
            self.states.set(&app.identity, ToggleState::Idle);
            return Ok(ToggleOutcome::Unchanged { hidden });
        }
        self.apply(app, hidden, guard, on_relaunch)
    }

    /// Flip window visibility of a running app. Failures are only logged.
    pub fn toggle_immediate(&self, app: &RunningApp) {
        let Some(bundle_id) = app.bundle_id.as_deref() else {
            warn!("{} has no bundle identifier, cannot script it", app.name);
            return;
        };
        match self.bridge.flip_visibility(bundle_id) {
            Ok(()) => info!("Flipped window visibility of {}", app.name),
            Err(e) => warn!("Visibility flip for {} ignored: {}", app.name, e),
        }
    }

    fn apply<F>(
        &self,
        app: &AppDescriptor,
        hidden: bool,
        guard: IdentityGuard,
        on_relaunch: F,
    ) -> Result<ToggleOutcome, DockError>
    where
        F: FnOnce(Result<(), DockError>) + Send + 'static,
    {
        let identity = &app.identity;

        self.states.set(identity, ToggleState::WritingFlag);
        if let Err(e) = self.flags.set_hidden(&app.bundle_path, hidden) {
            warn!("Not restarting {}: {}", app.name, e);
            self.states.set(identity, ToggleState::Error);
            return Err(e);
        }
        self.states.set(identity, ToggleState::FlagWritten);

        self.states.set(identity, ToggleState::TerminatingIfRunning);
        let Some(instance) = self.processes.find_running(&app.bundle_path) else {
            info!("{} hidden={} applies at its next launch", app.name, hidden);
            self.states.set(identity, ToggleState::Idle);
            return Ok(ToggleOutcome::Persisted { hidden });
        };

        let terminated = self
            .processes
            .terminate(&instance)
            .and_then(|_| {
                self.states.set(identity, ToggleState::AwaitingTermination);
                self.await_termination(&instance)
            });
        if let Err(e) = terminated {
            warn!("Restart of {} aborted: {}", app.name, e);
            self.states.set(identity, ToggleState::Error);
            return Err(e);
        }

        self.states.set(identity, ToggleState::Relaunching);
        self.schedule_relaunch(app, guard, on_relaunch);
        Ok(ToggleOutcome::Restarting { hidden })
    }

    /// Block until `app` has exited or the termination timeout elapses
    fn await_termination(&self, app: &RunningApp) -> Result<(), DockError> {
        if self.processes.has_exited(app) {
            debug!("{} (pid {}) exited", app.name, app.pid);
            return Ok(());
        }

        let (exited_tx, exited_rx) = bounded::<()>(1);
        let processes = Arc::clone(&self.processes);
        let target = app.clone();
        let poll_interval = self.timing.poll_interval;
        let deadline = Instant::now() + self.timing.termination_timeout;

        thread::spawn(move || loop {
            if processes.has_exited(&target) {
                let _ = exited_tx.send(());
                return;
            }
            if Instant::now() >= deadline {
                return;
            }
            thread::sleep(poll_interval);
        });

        match exited_rx.recv_timeout(self.timing.termination_timeout) {
            Ok(()) => {
                debug!("{} (pid {}) exited", app.name, app.pid);
                Ok(())
            }
            Err(_) => Err(DockError::TerminationTimeout {
                name: app.name.clone(),
                timeout: self.timing.termination_timeout,
            }),
        }
    }

    fn schedule_relaunch<F>(&self, app: &AppDescriptor, guard: IdentityGuard, on_relaunch: F)
    where
        F: FnOnce(Result<(), DockError>) + Send + 'static,
    {
        let processes = Arc::clone(&self.processes);
        let states = Arc::clone(&self.states);
        let delay = self.timing.relaunch_delay;
        let bundle = app.bundle_path.clone();
        let name = app.name.clone();

        thread::spawn(move || {
            thread::sleep(delay);
            let result = processes.launch(&bundle);
            match &result {
                Ok(()) => info!("Relaunched {}", name),
                Err(e) => warn!("Relaunch of {} failed: {}", name, e),
            }
            states.set(&guard.identity, ToggleState::Idle);
            drop(guard);
            on_relaunch(result);
        });
    }
}
