//! # Plugin RPC client
//!
//! Thin wrapper over the generated `CSIDriverProvider` client: fixes the
//! controller's constant request fields, classifies both transport-level
//! and domain (`error.code`) failures into [`ReconcileError::ProviderError`],
//! and retries `UNAVAILABLE` with bounded exponential backoff.

use crate::constants::{
    MOUNT_PERMISSION_OCTAL, MOUNT_RESPONSE_WARN_BYTES, MOUNT_TARGET_PATH,
    PLUGIN_RETRY_INITIAL_BACKOFF_MS, PLUGIN_RETRY_MAX_ATTEMPTS, PLUGIN_RETRY_MAX_BACKOFF_MS,
    PLUGIN_RETRY_MULTIPLIER,
};
use crate::error::ReconcileError;
use crate::observability::metrics;
use crate::plugin::proto::csi_driver_provider_client::CsiDriverProviderClient;
use crate::plugin::proto::{MountRequest, VersionRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use tonic::transport::Channel;
use tracing::warn;

/// Projected result of a `Mount` call: the plugin's file list as a path to
/// bytes map, plus a flag noting whether the response crossed the
/// size-warning threshold.
pub struct MountOutcome {
    pub files: HashMap<String, Vec<u8>>,
    pub oversized: bool,
}

#[derive(Clone)]
pub struct PluginClient {
    provider: String,
    inner: CsiDriverProviderClient<Channel>,
}

impl PluginClient {
    /// `max_response_bytes` bounds the decoded size of any single RPC
    /// response message (the configurable max `Mount` response size, §4.2).
    #[must_use]
    pub fn new(provider: String, channel: Channel, max_response_bytes: usize) -> Self {
        Self {
            provider,
            inner: CsiDriverProviderClient::new(channel)
                .max_decoding_message_size(max_response_bytes),
        }
    }

    pub async fn mount(&mut self, attributes: &str) -> Result<MountOutcome, ReconcileError> {
        let request = MountRequest {
            attributes: attributes.to_string(),
            secrets: "{}".to_string(),
            permission: MOUNT_PERMISSION_OCTAL.to_string(),
            current_object_version: Vec::new(),
            target_path: MOUNT_TARGET_PATH.to_string(),
        };

        let response = self.call_with_retry("Mount", request).await?;

        if let Some(err) = response.error.as_ref() {
            if !err.code.is_empty() {
                metrics::record_plugin_rpc_error(&self.provider, "Mount");
                return Err(ReconcileError::ProviderError(anyhow::anyhow!(
                    "provider {} reported error code {}",
                    self.provider,
                    err.code
                )));
            }
        }

        let mut total_bytes = 0usize;
        let mut files = HashMap::with_capacity(response.files.len());
        for file in response.files {
            total_bytes += file.contents.len();
            files.insert(file.path, file.contents);
        }

        let oversized = total_bytes > MOUNT_RESPONSE_WARN_BYTES;
        if oversized {
            warn!(
                provider = %self.provider,
                bytes = total_bytes,
                "Mount response exceeds size warning threshold"
            );
        }

        Ok(MountOutcome { files, oversized })
    }

    pub async fn version(&mut self) -> Result<String, ReconcileError> {
        let request = VersionRequest {
            version: "v1alpha1".to_string(),
        };
        let response = self.call_with_retry("Version", request).await?;
        Ok(response.runtime_version)
    }

    async fn call_with_retry<Req, Resp>(
        &mut self,
        rpc: &'static str,
        request: Req,
    ) -> Result<Resp, ReconcileError>
    where
        Req: Clone,
        CsiDriverProviderClient<Channel>: RpcCaller<Req, Resp>,
    {
        let mut backoff_ms = PLUGIN_RETRY_INITIAL_BACKOFF_MS;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let start = std::time::Instant::now();
            let result = self.inner.call(rpc, request.clone()).await;
            metrics::observe_plugin_rpc_duration(&self.provider, rpc, start.elapsed().as_secs_f64());

            match result {
                Ok(resp) => return Ok(resp),
                Err(status) if status.code() == tonic::Code::Unavailable
                    && attempt < PLUGIN_RETRY_MAX_ATTEMPTS =>
                {
                    warn!(
                        provider = %self.provider,
                        rpc,
                        attempt,
                        backoff_ms,
                        "plugin unavailable, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    backoff_ms = ((backoff_ms as f64 * PLUGIN_RETRY_MULTIPLIER) as u64)
                        .min(PLUGIN_RETRY_MAX_BACKOFF_MS);
                }
                Err(status) => {
                    metrics::record_plugin_rpc_error(&self.provider, rpc);
                    return Err(ReconcileError::ProviderError(anyhow::anyhow!(
                        "{} RPC to provider {} failed: {}",
                        rpc,
                        self.provider,
                        status
                    )));
                }
            }
        }
    }
}

/// Dispatch helper so `call_with_retry` can be generic over `Mount`/`Version`
/// without duplicating the retry loop.
#[async_trait]
trait RpcCaller<Req, Resp> {
    async fn call(&mut self, rpc: &'static str, request: Req) -> Result<Resp, tonic::Status>;
}

#[async_trait]
impl RpcCaller<MountRequest, crate::plugin::proto::MountResponse>
    for CsiDriverProviderClient<Channel>
{
    async fn call(
        &mut self,
        _rpc: &'static str,
        request: MountRequest,
    ) -> Result<crate::plugin::proto::MountResponse, tonic::Status> {
        self.mount(request).await.map(|r| r.into_inner())
    }
}

#[async_trait]
impl RpcCaller<VersionRequest, crate::plugin::proto::VersionResponse>
    for CsiDriverProviderClient<Channel>
{
    async fn call(
        &mut self,
        _rpc: &'static str,
        request: VersionRequest,
    ) -> Result<crate::plugin::proto::VersionResponse, tonic::Status> {
        self.version(request).await.map(|r| r.into_inner())
    }
}
