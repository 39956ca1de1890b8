// src/main.rs

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nv_res_tool::{
    config::{
        default_settings_path, load_settings, save_settings, ProfileName, Settings,
        SwitcherConfig,
    },
    constants::{EXIT_FAILURE, EXIT_SUCCESS},
    errors::SwitchError,
    nv_modes::{codec::ModeToken, list_modes, AdapterStore},
    orchestrator::{FixOutcome, ProfileOrchestrator},
};
use strum::IntoEnumIterator;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "nv_res_tool")]
#[command(about = "Switch between a native and a custom NVIDIA game resolution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to the per-user config directory).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Switch to the native resolution.
    Native,
    /// Switch to the game resolution.
    Game,
    /// Add the game resolution to the driver's NV_Modes list (requires administrator rights).
    FixNvModes,
    /// Show the custom modes each display adapter exposes.
    ListModes,
    /// Change the game resolution.
    SetGame { width: u32, height: u32 },
    /// Write a default settings file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the configured profiles.
    Show,
}

fn init_logging(verbose: bool) {
    let level = if verbose || cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(windows)]
fn adapter_store(config: &SwitcherConfig) -> Result<Box<dyn AdapterStore>> {
    Ok(Box::new(nv_res_tool::utils::registry::RegistryAdapterStore::new(
        config.adapter_class_path.clone(),
    )))
}

#[cfg(not(windows))]
fn adapter_store(_config: &SwitcherConfig) -> Result<Box<dyn AdapterStore>> {
    anyhow::bail!("The NV_Modes registry is only available on Windows")
}

#[cfg(windows)]
fn build_orchestrator(config: SwitcherConfig) -> Result<ProfileOrchestrator> {
    use nv_res_tool::utils::{process::SystemRunner, windows::UacBroker};

    let store = adapter_store(&config)?;
    Ok(ProfileOrchestrator::new(
        config,
        Box::new(SystemRunner),
        Box::new(UacBroker),
        store,
    ))
}

#[cfg(not(windows))]
fn build_orchestrator(_config: SwitcherConfig) -> Result<ProfileOrchestrator> {
    anyhow::bail!("Display switching is only supported on Windows")
}

fn switch_profile(settings: &Settings, settings_path: &std::path::Path, name: ProfileName) -> Result<()> {
    let orchestrator = build_orchestrator(SwitcherConfig::new(settings, settings_path))?;
    let profile = settings.profile(name);
    orchestrator.apply_mode_with_secondary_displays(&profile, &settings.secondary_displays)?;
    println!(
        "Switched to {} ({}x{} @ {} bpp).",
        name, profile.width, profile.height, profile.bit_depth
    );
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let settings_path = match cli.settings {
        Some(path) => path,
        None => default_settings_path()?,
    };

    match cli.command {
        Commands::Init { force } => {
            if settings_path.exists() && !force {
                return Err(SwitchError::Config(format!(
                    "'{}' already exists; use --force to overwrite it",
                    settings_path.display()
                ))
                .into());
            }
            save_settings(&settings_path, &Settings::default())?;
            println!("Wrote default settings to {}", settings_path.display());
        }
        Commands::Show => {
            let settings = load_settings(&settings_path)?;
            println!("Settings: {}", settings_path.display());
            for name in ProfileName::iter() {
                let profile = settings.profile(name);
                println!(
                    "  {:<7} {}x{} @ {} bpp",
                    name, profile.width, profile.height, profile.bit_depth
                );
            }
            if !settings.secondary_displays.is_empty() {
                println!("  Secondary displays: {}", settings.secondary_displays.join(", "));
            }
            println!("  Display tool: {}", settings.display_tool_path().display());
        }
        Commands::SetGame { width, height } => {
            let mut settings = load_settings(&settings_path)?;
            settings.set_game(width, height)?;
            save_settings(&settings_path, &settings)?;
            println!(
                "Game resolution set to {}x{}. Run fix-nv-modes to register it with the driver.",
                width, height
            );
        }
        Commands::Native => {
            let settings = load_settings(&settings_path)?;
            switch_profile(&settings, &settings_path, ProfileName::Native)?;
        }
        Commands::Game => {
            let settings = load_settings(&settings_path)?;
            switch_profile(&settings, &settings_path, ProfileName::Game)?;
        }
        Commands::FixNvModes => {
            let settings = load_settings(&settings_path)?;
            let orchestrator = build_orchestrator(SwitcherConfig::new(&settings, &settings_path))?;
            let game = settings.profile(ProfileName::Game);
            match orchestrator.apply_nv_modes_fix(&game)? {
                FixOutcome::Applied(summary) => println!(
                    "NV_Modes: {} adapter key(s), {} updated, {} already had {}x{}.",
                    summary.examined, summary.updated, summary.unchanged, game.width, game.height
                ),
                FixOutcome::Delegated => {
                    println!("NV_Modes updated for {}x{}.", game.width, game.height)
                }
            }
            println!("Restart the computer (or the display driver) for new modes to appear.");
        }
        Commands::ListModes => {
            let settings = load_settings(&settings_path)?;
            let store = adapter_store(&SwitcherConfig::new(&settings, &settings_path))?;
            for adapter in list_modes(store.as_ref()).context("Failed to read NV_Modes")? {
                let kind = if adapter.multi_string { "REG_MULTI_SZ" } else { "REG_SZ" };
                println!("{} ({})", adapter.key, kind);
                for token in adapter.tokens {
                    match token {
                        ModeToken::Entry(entry) => println!(
                            "  {}x{} depths {:?} flag {}",
                            entry.width, entry.height, entry.depths, entry.flag
                        ),
                        ModeToken::Reserved(raw) => println!("  {}", raw),
                    }
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let run_span = tracing::span!(Level::INFO, "nv_res_tool");
    let result = run_span.in_scope(|| run(cli));

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
