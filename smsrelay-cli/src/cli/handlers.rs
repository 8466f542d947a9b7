//! CLI command handlers

use anyhow::{Context, Result};
use bytes::Bytes;
use smsrelay_core::drain::{DrainCoordinator, DrainError};
use smsrelay_core::models::{Configuration, DrainRequest, InboundMessage};
use smsrelay_core::server::providers::{MemorySource, MessageSource};
use smsrelay_core::server::RelayServer;
use smsrelay_core::services::logging::init_logging;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

fn resolve_config_path(config_arg: &str) -> Result<PathBuf> {
    if config_arg == "~/.config/smsrelay/config.toml" {
        Configuration::default_config_path().map_err(|e| anyhow::anyhow!("Config path: {}", e))
    } else if let Some(rest) = config_arg.strip_prefix("~/") {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME not set"))?;
        Ok(PathBuf::from(home).join(rest))
    } else {
        Ok(PathBuf::from(config_arg))
    }
}

fn load_config(config_arg: &str) -> Result<Configuration> {
    let path = resolve_config_path(config_arg)?;
    let config = Configuration::load_from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?
        .apply_env();
    if let Err(errors) = config.validate() {
        anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }
    if let Err(e) = init_logging(config.log_level.clone()) {
        // A subscriber is already installed (e.g. a second load in one process).
        tracing::debug!(error = %e, "Logging already initialized");
    }
    Ok(config)
}

/// Handle the 'serve' command
pub async fn handle_serve(config_arg: &str, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = load_config(config_arg)?;
    if let Some(host) = host {
        config.server_host = host;
    }
    if let Some(port) = port {
        config.server_port = port;
    }
    RelayServer::new(config).start().await
}

/// Handle the 'send' command
pub async fn handle_send(config_arg: &str, input: &str) -> Result<()> {
    let config = load_config(config_arg)?;

    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read envelope from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };
    let envelope: serde_json::Value =
        serde_json::from_str(&raw).context("Envelope is not valid JSON")?;

    let relay = RelayServer::build_relay(&config)?;
    tracing::debug!(provider = relay.sink_name(), "Relaying single envelope");
    relay
        .send_envelope(&envelope)
        .await
        .context("Failed to relay message")?;
    println!("✅ Message sent via {}", relay.sink_name());
    Ok(())
}

/// Read newline-delimited JSON payloads into an in-memory feed
fn file_source(path: &str) -> Result<Arc<MemorySource>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let source = MemorySource::new(path);
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let data = Bytes::copy_from_slice(line.as_bytes());
        if !source.push(InboundMessage::with_random_id(data)) {
            anyhow::bail!("Too many messages in {}", path);
        }
    }
    source.close();
    Ok(Arc::new(source))
}

/// Handle the 'drain' command
pub async fn handle_drain(
    config_arg: &str,
    request: DrainRequest,
    from_file: Option<String>,
) -> Result<()> {
    let config = load_config(config_arg)?;
    let drain_config = request
        .to_config(&config.drain)
        .context("Invalid drain options")?;

    let relay = RelayServer::build_relay(&config)?;
    let coordinator = DrainCoordinator::new(relay);
    tracing::debug!(
        max_messages = drain_config.max_messages(),
        window_secs = drain_config.window().as_secs(),
        always_ack = drain_config.always_ack(),
        "Drain options resolved"
    );

    let result = match from_file {
        Some(path) => {
            let source: Arc<dyn MessageSource> = file_source(&path)?;
            coordinator.run_session(source, &drain_config).await
        }
        None => {
            let sources = RelayServer::build_sources(&config);
            coordinator
                .drain(
                    sources.as_deref(),
                    request.subscription(&config.drain),
                    &drain_config,
                )
                .await
        }
    };

    match result {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e @ DrainError::Stream(_)) => Err(anyhow::anyhow!(e).context("Drain aborted")),
        Err(e @ DrainError::Config(_)) => {
            Err(anyhow::anyhow!(e).context("Set --subscription and pubsub.project_id, or use --from-file"))
        }
        Err(e) => Err(anyhow::anyhow!(e)),
    }
}

/// Handle the 'config --init' command
pub async fn handle_config_init(config_arg: &str) -> Result<()> {
    let path = resolve_config_path(config_arg)?;
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(());
    }
    Configuration::default()
        .save_to_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}
