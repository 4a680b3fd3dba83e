//! `portsense` command line entry point.

mod board;
mod cli;
mod error_fmt;
mod replay;
mod report;
#[cfg(unix)]
mod rt;
mod watch;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use portsense_config::Config;
use portsense_core::{PortKind, PortManager, tables};
use portsense_hardware::RecordingRegistry;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = run(cli) {
        if cli::json_mode() {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::debug!(error = ?err, "command failed");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Modes { kind } = &cli.cmd {
        init_tracing(&cli.log_level, cli.json, None)?;
        print_modes(kind.map(PortKind::from), cli.json);
        return Ok(());
    }

    let cfg = load_config(&cli.config)?;
    init_tracing(&cli.log_level, cli.json, Some(&cfg.logging))?;
    tracing::debug!(config = %cli.config.display(), ports = cfg.ports.len(), "config loaded");

    match cli.cmd {
        Commands::Watch {
            ticks,
            set_mode,
            rt: rt_enabled,
            rt_prio,
            rt_lock,
            rt_cpu,
        } => {
            let opts = watch::WatchOpts {
                ticks,
                set_mode: set_mode
                    .iter()
                    .map(|s| watch::parse_assignment(s))
                    .collect::<Result<_>>()?,
            };
            #[cfg(unix)]
            {
                if rt_enabled {
                    rt::setup_rt_once(rt::RtRequest {
                        prio: rt_prio,
                        lock: rt_lock.unwrap_or_else(cli::RtLock::os_default),
                        cpu: rt_cpu,
                    });
                }
            }
            #[cfg(not(unix))]
            let _ = (rt_enabled, rt_prio, rt_lock, rt_cpu);

            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;

            #[cfg(all(feature = "hardware", target_os = "linux"))]
            let board = board::gpio_board(&cfg)?;
            #[cfg(not(all(feature = "hardware", target_os = "linux")))]
            let board = board::sim_board(&cfg);

            watch::run_watch(board, &cfg, &opts, cli.json, &shutdown)
        }
        Commands::Replay { trace, tail } => replay::run_replay(&cfg, &trace, tail, cli.json),
        Commands::SelfCheck => self_check(&cfg, cli.json),
        Commands::Modes { .. } => Ok(()),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = portsense_config::load_toml(&text)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Console layer (pretty or JSON lines) plus an optional non-blocking file
/// layer from `[logging]`. `RUST_LOG` overrides `--log-level`.
fn init_tracing(
    level: &str,
    json: bool,
    logging: Option<&portsense_config::Logging>,
) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;
    // Logs go to stderr so stdout stays clean for events.
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.and_then(|l| l.file.as_deref().map(|f| (l, f))) {
        Some((l, file)) => {
            let path = Path::new(file);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map_or_else(|| "portsense.log".into(), |n| n.to_string_lossy().into_owned());
            let appender = match l.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::try_new(l.level.as_deref().unwrap_or("info"))
                .wrap_err("invalid logging.level")?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn print_modes(kind: Option<PortKind>, json: bool) {
    let kinds: Vec<PortKind> = kind.map_or_else(|| PortKind::ALL.to_vec(), |k| vec![k]);
    for k in kinds {
        if json {
            let names: Vec<&str> = k.modes().iter().map(|(n, _)| *n).collect();
            println!("{}", serde_json::json!({ "kind": k.name(), "modes": names }));
        } else {
            println!("{}: {}", k.name(), k.mode_names());
        }
    }
}

/// Config is already validated by the time this runs. Checks the tables,
/// then brings every port up once on the simulated board and tears it down.
fn self_check(cfg: &Config, json: bool) -> Result<()> {
    for (name, res) in tables::validate_all() {
        res.map_err(|e| eyre::eyre!("classification table {name}: {e}"))?;
    }
    let mut mgr = PortManager::builder()
        .with_io(board::sim_board(cfg))
        .with_registry(RecordingRegistry::new())
        .with_settings(cfg.into())
        .with_ports(board::port_specs(cfg))
        .try_build()?;
    if let Some(e) = mgr.init_failures().first() {
        return Err(e.clone().into());
    }
    let statuses = mgr.statuses();
    mgr.shutdown();

    if json {
        println!(
            "{}",
            serde_json::json!({ "ok": true, "ports": statuses.len(), "tables": tables::validate_all().len() })
        );
    } else {
        println!("self-check ok: {} ports, {} tables", statuses.len(), tables::validate_all().len());
    }
    Ok(())
}
