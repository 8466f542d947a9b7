//! Main server integration for smsrelay

use crate::models::Configuration;
use crate::server::api::{create_api_routes, AppState};
use crate::server::providers::{PubSubClient, SmsSink, SourceFactory, TwilioCredentials, TwilioSink};
use crate::services::Relay;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

/// Main smsrelay HTTP server
pub struct RelayServer {
    config: Configuration,
}

impl RelayServer {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    /// Build the relay with the configured SMS provider
    pub fn build_relay(config: &Configuration) -> Result<Relay> {
        let credentials = TwilioCredentials::load(&config.sms.credentials_path)
            .context("Failed to load SMS provider credentials")?;
        let sink: Arc<dyn SmsSink> = Arc::new(TwilioSink::new(credentials));
        Ok(Relay::new(sink).with_override_to(config.sms.override_to.clone()))
    }

    /// Build the subscription backend, if one is configured
    pub fn build_sources(config: &Configuration) -> Option<Arc<dyn SourceFactory>> {
        match PubSubClient::new(&config.pubsub) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Drain endpoint disabled");
                None
            }
        }
    }

    /// Start the server and run until Ctrl+C
    pub async fn start(self) -> Result<()> {
        let address: SocketAddr = format!("{}:{}", self.config.server_host, self.config.server_port)
            .parse()
            .context("Invalid server address")?;

        let relay = Self::build_relay(&self.config)?;
        let sources = Self::build_sources(&self.config);
        let state = Arc::new(AppState::new(
            relay,
            sources,
            self.config.drain.clone(),
        ));
        let routes = create_api_routes(state);

        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(address, async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutting down server");
            })
            .with_context(|| format!("Failed to bind to {}", address))?;

        tracing::info!(address = %bound, "smsrelay server listening");
        server.await;
        Ok(())
    }
}
