//! # Plugin client pool
//!
//! Resolves a provider name to a long-lived RPC client over a Unix domain
//! socket. Dialing happens lazily under a writer lock, once per provider;
//! reads of other providers never block.

use crate::constants::PLUGIN_NAME_PATTERN;
use crate::error::ReconcileError;
use crate::plugin::client::PluginClient;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::RwLock;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::info;

/// Validates and dials provider plugin sockets, searching `socket_dirs` in
/// order and keeping one channel per provider name for the life of the
/// process.
pub struct PluginPool {
    socket_dirs: Vec<PathBuf>,
    max_response_bytes: usize,
    name_pattern: Regex,
    clients: RwLock<HashMap<String, PluginClient>>,
}

impl PluginPool {
    #[must_use]
    pub fn new<I, P>(socket_dirs: I, max_response_bytes: usize) -> Arc<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Arc::new(Self {
            socket_dirs: socket_dirs.into_iter().map(Into::into).collect(),
            max_response_bytes,
            name_pattern: Regex::new(PLUGIN_NAME_PATTERN).expect("static plugin name regex"),
            clients: RwLock::new(HashMap::new()),
        })
    }

    /// Resolve and return a client for `provider`, dialing it on first use.
    pub async fn client_for(&self, provider: &str) -> Result<PluginClient, ReconcileError> {
        if !self.name_pattern.is_match(provider) {
            return Err(ReconcileError::SecretProviderClassMisconfigured {
                name: provider.to_string(),
                source: anyhow!("provider name {provider:?} does not match {PLUGIN_NAME_PATTERN}"),
            });
        }

        if let Some(client) = self.clients.read().await.get(provider) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(provider) {
            return Ok(client.clone());
        }

        let channel = self.dial(provider).await.map_err(|e| {
            ReconcileError::SecretProviderClassMisconfigured {
                name: provider.to_string(),
                source: e,
            }
        })?;
        let client = PluginClient::new(provider.to_string(), channel, self.max_response_bytes);
        clients.insert(provider.to_string(), client.clone());
        Ok(client)
    }

    /// Search `socket_dirs` in order and dial the first `<dir>/<provider>.sock`
    /// that exists.
    async fn dial(&self, provider: &str) -> Result<Channel> {
        let socket_path = self
            .socket_dirs
            .iter()
            .map(|dir| dir.join(format!("{provider}.sock")))
            .find(|path| path.exists())
            .ok_or_else(|| {
                anyhow!(
                    "no socket named {provider}.sock found in any of: {}",
                    self.socket_dirs
                        .iter()
                        .map(|d| d.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?;

        info!(provider, socket = %socket_path.display(), "dialing provider plugin");

        let socket_path = socket_path.clone();
        // The URI is unused by the connector; tonic requires one to build an Endpoint.
        let channel = Endpoint::try_from("http://[::]:50051")
            .context("constructing plugin endpoint")?
            .connect_with_connector(service_fn(move |_: Uri| {
                let socket_path = socket_path.clone();
                async move {
                    let stream = UnixStream::connect(socket_path).await?;
                    Ok::<_, std::io::Error>(hyper_util::rt::TokioIo::new(stream))
                }
            }))
            .await
            .context("connecting to provider plugin socket")?;

        Ok(channel)
    }

    /// Periodic liveness probe: calls `Version` on every pooled client,
    /// bounded to 5s each (§5). Dead entries are evicted so the next
    /// `client_for` call redials.
    pub async fn probe_liveness(&self) {
        let providers: Vec<String> = self.clients.read().await.keys().cloned().collect();
        for provider in providers {
            let mut client = match self.clients.read().await.get(&provider) {
                Some(c) => c.clone(),
                None => continue,
            };
            let probe = tokio::time::timeout(
                std::time::Duration::from_secs(crate::constants::PLUGIN_HEALTH_PROBE_TIMEOUT_SECS),
                client.version(),
            )
            .await;
            if !matches!(probe, Ok(Ok(_))) {
                tracing::warn!(provider, "plugin liveness probe failed, evicting client");
                self.clients.write().await.remove(&provider);
            }
        }
    }

    /// Spawn the background liveness-probe task.
    pub fn spawn_liveness_prober(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                pool.probe_liveness().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_pattern_rejects_path_traversal() {
        let re = Regex::new(PLUGIN_NAME_PATTERN).unwrap();
        assert!(re.is_match("vault"));
        assert!(re.is_match("my-provider_1"));
        assert!(!re.is_match("../evil"));
        assert!(!re.is_match("a/b"));
    }
}
