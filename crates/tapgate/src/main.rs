mod cli;
mod config;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use access_engine::{AccessEngine, TapEvent, TapOutcome};
use audit_log::{AuditFilter, AuditLog, ExportFormat, FileAuditLog};
use credential_store::Registry;

use crate::cli::{Cli, Command};
use crate::config::Config;

/// Exit status for a tap that was recorded but not granted.
const EXIT_REFUSED: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let loaded = config::load(&cli.config)?;
    let config_found = loaded.is_some();
    let mut cfg = loaded.unwrap_or_default();

    if let Some(ref registry) = cli.registry {
        cfg.registry_file = registry.clone();
    }
    if let Some(ref audit_log) = cli.audit_log {
        cfg.logging.audit_log_path = audit_log.clone();
    }

    // 3. Init tracing-subscriber with JSON format. Stdout is reserved for
    //    command output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    if !config_found {
        warn!(
            path = %cli.config.display(),
            "configuration file not found; using defaults"
        );
    }

    info!(
        config_file = %cli.config.display(),
        registry_file = %cfg.registry_file.display(),
        audit_log = %cfg.logging.audit_log_path.display(),
        "tapgate starting"
    );

    // 4. Dispatch.
    match cli.command {
        Command::Tap {
            uid,
            zone,
            device,
            at,
        } => {
            let mut tap = TapEvent::new(uid, zone);
            tap.device_id = device.or_else(|| cfg.tap.default_device_id.clone());
            if let Some(at) = at {
                tap = tap.at(at);
            }
            run_tap(&cfg, tap).await
        }
        Command::Logs {
            filter,
            limit,
            offset,
        } => {
            run_logs(&cfg, filter.into(), limit, offset).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Export {
            format,
            filter,
            output,
        } => {
            run_export(&cfg, format, filter.into(), output.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Zones => {
            run_zones(&cfg)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => {
            run_check(&cfg)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_registry(cfg: &Config) -> Result<Registry> {
    credential_store::load_registry(&cfg.registry_file).context("failed to load registry")
}

async fn open_audit_log(cfg: &Config) -> Result<(FileAuditLog, JoinHandle<()>)> {
    FileAuditLog::open(&cfg.logging.audit_log_path)
        .await
        .with_context(|| {
            format!(
                "failed to open audit log {}",
                cfg.logging.audit_log_path.display()
            )
        })
}

/// Wait for the writer task to drain once every log handle is gone.
async fn close_audit_log(handle: JoinHandle<()>) -> Result<()> {
    handle.await.context("audit writer task failed")
}

async fn run_tap(cfg: &Config, tap: TapEvent) -> Result<ExitCode> {
    let (credentials, zones) = load_registry(cfg)?.into_stores();
    let (audit, handle) = open_audit_log(cfg).await?;

    let engine = AccessEngine::new(Arc::new(credentials), Arc::new(zones), Arc::new(audit));
    let outcome = engine.evaluate(tap).await;
    drop(engine);
    close_audit_log(handle).await?;

    let record = outcome.context("tap could not be resolved")?;
    print_json(&TapOutcome::from(&record))?;

    Ok(if record.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REFUSED)
    })
}

async fn run_logs(cfg: &Config, filter: AuditFilter, limit: usize, offset: usize) -> Result<()> {
    let (audit, handle) = open_audit_log(cfg).await?;
    let records = audit.query(&filter, limit, offset).await;
    drop(audit);
    close_audit_log(handle).await?;

    for record in records.context("audit query failed")? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

async fn run_export(
    cfg: &Config,
    format: ExportFormat,
    filter: AuditFilter,
    output: Option<&Path>,
) -> Result<()> {
    let (audit, handle) = open_audit_log(cfg).await?;
    let bytes = audit.export(format, &filter).await;
    drop(audit);
    close_audit_log(handle).await?;
    let bytes = bytes.context("audit export failed")?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("failed to write export to {}", path.display()))?;
            info!(path = %path.display(), %format, bytes = bytes.len(), "audit log exported");
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&bytes).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

fn run_zones(cfg: &Config) -> Result<()> {
    let (_, zones) = load_registry(cfg)?.into_stores();
    for zone in zones.zones()? {
        println!("{}", serde_json::to_string(&zone)?);
    }
    Ok(())
}

fn run_check(cfg: &Config) -> Result<()> {
    let registry = load_registry(cfg)?;
    let active_zones = registry.zones.iter().filter(|z| z.is_active).count();
    let active_credentials = registry.credentials.iter().filter(|c| c.is_active).count();
    print_json(&serde_json::json!({
        "registry_file": cfg.registry_file.display().to_string(),
        "version": registry.version,
        "credentials": registry.credentials.len(),
        "active_credentials": active_credentials,
        "zones": registry.zones.len(),
        "active_zones": active_zones,
    }))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
