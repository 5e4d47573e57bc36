//! DockHider - command line front end
//!
//! This process:
//! - Lists pinned and running applications with their Dock icon state
//! - Hides, shows or toggles one application's Dock icon
//! - Waits for the relaunch of a restarted application before exiting

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use dock_hider_core::{
    bundle::is_app_bundle,
    config::{self, AppConfig},
    AppDescriptor, DockHider, ToggleOutcome, ToggleStrategy,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Extra time allowed for the OS launcher after the relaunch delay
const RELAUNCH_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "dockhider")]
#[command(about = "Show or hide application icons in the macOS Dock", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read pinned applications from this plist instead of the Dock's
    #[arg(long, global = true, value_name = "PATH")]
    dock_plist: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pinned and running applications
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one application's Dock icon state
    Status {
        /// Bundle path, bundle identifier or name
        app: String,
        #[arg(long)]
        json: bool,
    },
    /// Toggle an application's Dock icon
    Toggle {
        /// Bundle path, bundle identifier or name
        app: String,
        /// Flip window visibility now instead of editing Info.plist
        #[arg(long)]
        immediate: bool,
    },
    /// Hide an application's Dock icon
    Hide {
        /// Bundle path, bundle identifier or name
        app: String,
    },
    /// Show an application's Dock icon
    Show {
        /// Bundle path, bundle identifier or name
        app: String,
    },
    /// Manage config.json
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration to config.json
    Init,
    /// Print the location of config.json
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    tracing::debug!("DockHider starting...");

    let mut app_config = config::load_config();
    if let Some(path) = cli.dock_plist.clone() {
        app_config.dock_preferences = Some(path);
    }

    let hider = DockHider::from_config(&app_config);
    run_command(cli.command, &hider, &app_config)
}

fn run_config(action: ConfigCommands, app_config: &AppConfig) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(app_config)?);
        }
        ConfigCommands::Init => {
            let path = config::save_config(app_config).context("Failed to write config.json")?;
            println!("Wrote {}", path.display());
        }
        ConfigCommands::Path => {
            let path = config::config_path().context("Failed to locate config directory")?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn run_command(command: Commands, hider: &DockHider, app_config: &AppConfig) -> Result<()> {
    match command {
        Commands::List { json } => {
            let apps = hider.registry.list_dock_applications();
            if json {
                println!("{}", serde_json::to_string_pretty(&apps)?);
            } else if apps.is_empty() {
                println!("No dockable applications found");
            } else {
                for app in &apps {
                    print_row(app);
                }
            }
        }
        Commands::Status { app, json } => {
            let app = resolve(hider, &app)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&app)?);
            } else {
                print_row(&app);
            }
        }
        Commands::Toggle { app, immediate } => {
            let strategy = if immediate {
                ToggleStrategy::Immediate
            } else {
                app_config.default_strategy
            };
            let app = resolve(hider, &app)?;
            apply(hider, app, |hider, app, on_relaunch| {
                hider.controller.toggle(app, strategy, on_relaunch)
            })?;
        }
        Commands::Hide { app } => {
            let app = resolve(hider, &app)?;
            apply(hider, app, |hider, app, on_relaunch| {
                hider.controller.set_visibility(app, true, on_relaunch)
            })?;
        }
        Commands::Show { app } => {
            let app = resolve(hider, &app)?;
            apply(hider, app, |hider, app, on_relaunch| {
                hider.controller.set_visibility(app, false, on_relaunch)
            })?;
        }
        Commands::Config { action } => run_config(action, app_config)?,
    }
    Ok(())
}

type RelaunchSender = Box<dyn FnOnce(Result<(), dock_hider_core::DockError>) + Send + 'static>;

/// Run one lifecycle operation, then wait for any relaunch it scheduled
fn apply<F>(hider: &DockHider, mut app: AppDescriptor, operation: F) -> Result<()>
where
    F: FnOnce(
        &DockHider,
        &AppDescriptor,
        RelaunchSender,
    ) -> Result<ToggleOutcome, dock_hider_core::DockError>,
{
    let (relaunch_tx, relaunch_rx) = bounded(1);
    let on_relaunch: RelaunchSender = Box::new(move |result| {
        let _ = relaunch_tx.send(result);
    });

    let outcome = match operation(hider, &app, on_relaunch) {
        Ok(outcome) => outcome,
        Err(e) => {
            // Report what is actually on disk, not what was attempted
            hider.registry.refresh(&mut app);
            tracing::error!(
                "{} is still {}",
                app.name,
                if app.is_hidden { "hidden" } else { "visible" }
            );
            return Err(e).with_context(|| format!("Failed to change {}", app.name));
        }
    };

    match outcome {
        ToggleOutcome::Unchanged { hidden } => {
            println!("{}: already {}", app.name, describe(hidden));
        }
        ToggleOutcome::Persisted { hidden } => {
            println!("{}: {} (applies at next launch)", app.name, describe(hidden));
        }
        ToggleOutcome::Restarting { hidden } => {
            println!("{}: {}, restarting...", app.name, describe(hidden));
            let wait = hider.controller.timing().relaunch_delay + RELAUNCH_GRACE;
            match relaunch_rx.recv_timeout(wait) {
                Ok(Ok(())) => println!("{}: relaunched", app.name),
                Ok(Err(e)) => bail!("{} was quit but could not be relaunched: {}", app.name, e),
                Err(_) => bail!("Timed out waiting for {} to relaunch", app.name),
            }
        }
        ToggleOutcome::WindowsFlipped => {
            println!("{}: window visibility flipped", app.name);
        }
        ToggleOutcome::NotRunning => {
            println!("{}: not running, nothing to flip", app.name);
        }
    }
    Ok(())
}

/// Find an application by path, bundle identifier or name
fn resolve(hider: &DockHider, query: &str) -> Result<AppDescriptor> {
    if let Some(app) = hider.registry.find(query) {
        return Ok(app);
    }

    let path = Path::new(query);
    if is_app_bundle(path) && path.is_dir() {
        return Ok(hider.registry.describe(path));
    }

    bail!(
        "No pinned or running application matches {:?}; pass a path to an .app bundle",
        query
    )
}

fn describe(hidden: bool) -> &'static str {
    if hidden {
        "hidden from Dock"
    } else {
        "shown in Dock"
    }
}

fn print_row(app: &AppDescriptor) {
    println!(
        "{:<28} {:<8} {:<8} {}",
        app.name,
        if app.is_hidden { "hidden" } else { "visible" },
        if app.running { "running" } else { "" },
        app.bundle_path.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_subcommand_parses() {
        let cli = Cli::try_parse_from(["dockhider", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigCommands::Show
            }
        ));
    }

    #[test]
    fn test_config_show_runs_through_run_command() {
        let app_config = AppConfig::default();
        let hider = DockHider::from_config(&app_config);
        let command = Commands::Config {
            action: ConfigCommands::Show,
        };
        assert!(run_command(command, &hider, &app_config).is_ok());
    }
}
