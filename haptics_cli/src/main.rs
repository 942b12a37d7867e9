mod cli;
mod error_fmt;
mod session;

use clap::Parser;
use cli::{Cli, Commands};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use eyre::WrapErr;
use haptics_config::Config;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;
type FileGuard = tracing_appender::non_blocking::WorkerGuard;

fn make_filter(level: &str) -> eyre::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(f) => Ok(f),
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("invalid log level '{level}'")),
    }
}

fn file_layer(logging: &haptics_config::Logging) -> eyre::Result<Option<(BoxedLayer, FileGuard)>> {
    let Some(file) = logging.file.as_deref() else {
        return Ok(None);
    };
    let path = Path::new(file);
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file '{file}' has no file name"))?;
    let appender = match logging.rotation.as_deref() {
        Some("daily") => tracing_appender::rolling::daily(dir, name),
        Some("hourly") => tracing_appender::rolling::hourly(dir, name),
        _ => tracing_appender::rolling::never(dir, name),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let level = logging.level.as_deref().unwrap_or("info");
    let layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(make_filter(level)?)
        .boxed();
    Ok(Some((layer, guard)))
}

/// Install console (and optional file) logging. The returned guard flushes the
/// file writer when dropped.
fn init_tracing(
    json: bool,
    level: &str,
    logging: &haptics_config::Logging,
) -> eyre::Result<Option<FileGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    // Console logs go to stderr; stdout carries command output.
    let console = fmt::layer().with_writer(std::io::stderr);
    layers.push(if json {
        console.json().with_filter(make_filter(level)?).boxed()
    } else {
        console.with_filter(make_filter(level)?).boxed()
    });
    let guard = match file_layer(logging)? {
        Some((layer, guard)) => {
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(guard)
}

fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    match path {
        Some(p) => haptics_config::load_file(p),
        None => {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }
}

fn vec_json(v: haptics_traits::Vector3) -> serde_json::Value {
    json!([v.x, v.y, v.z])
}

fn run_command(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    match &cli.cmd {
        Commands::Run {
            effect,
            duration_ms,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Release)) {
                tracing::warn!(error = %e, "Ctrl-C handler not installed");
            }
            let summary = session::run(cfg, *effect, *duration_ms, shutdown)?;
            let s = &summary.stats;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "effect": summary.effect,
                        "iterations": s.iterations,
                        "fresh_updates": s.fresh_updates,
                        "overruns": s.overruns,
                        "servo_cycles": summary.servo_cycles,
                        "elapsed_ms": s.elapsed.as_millis() as u64,
                        "last_position": vec_json(s.last_position),
                        "last_force": vec_json(s.last_force),
                    })
                );
            } else {
                println!(
                    "Run complete: effect={} iterations={} fresh={} overruns={} servo_cycles={} elapsed={:?}",
                    summary.effect,
                    s.iterations,
                    s.fresh_updates,
                    s.overruns,
                    summary.servo_cycles,
                    s.elapsed
                );
                println!(
                    "Last position: ({:.4}, {:.4}, {:.4})  last force: ({:.3}, {:.3}, {:.3})",
                    s.last_position.x,
                    s.last_position.y,
                    s.last_position.z,
                    s.last_force.x,
                    s.last_force.y,
                    s.last_force.z
                );
            }
        }
        Commands::Probe => {
            let r = session::probe(cfg)?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "synced": r.synced,
                        "position": vec_json(r.position),
                        "app_position": r.app_position.map(vec_json),
                        "button_down": r.button_down,
                        "device_workspace": r.device_workspace.extents(),
                        "transform": r.transform,
                    })
                );
            } else {
                println!("Synced: {}", r.synced);
                println!(
                    "Position: ({:.4}, {:.4}, {:.4})",
                    r.position.x, r.position.y, r.position.z
                );
                if let Some(p) = r.app_position {
                    println!("App position: ({:.4}, {:.4}, {:.4})", p.x, p.y, p.z);
                }
                println!("Button down: {}", r.button_down);
                println!("Device workspace: {:?}", r.device_workspace.extents());
                if let Some(m) = r.transform {
                    println!("Transform (column-major): {m:?}");
                }
            }
        }
        Commands::SelfCheck => {
            session::self_check(cfg)?;
            if cli.json {
                println!("{}", json!({ "status": "ok" }));
            } else {
                println!("ok");
            }
        }
    }
    Ok(())
}

fn real_main(cli: &Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    let _guard = init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "configuration loaded");
    run_command(cli, &cfg)
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = color_eyre::install() {
        eprintln!("color-eyre not installed: {e}");
    }
    if let Err(e) = real_main(&cli) {
        if cli.json {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}
