//! Delivery provider abstraction.
//!
//! The engine never talks to SMTP, SMS gateways, or push services directly.
//! One `ProviderGateway` per channel is injected by the embedding
//! application; any error or timeout a gateway raises is treated uniformly as
//! a delivery failure. Provider-call timeouts are the gateway's
//! responsibility.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::preference::Channel;

/// Error raised by a delivery provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider accepted the request but refused the message.
    #[error("{provider} rejected the message: {message}")]
    Rejected {
        provider: &'static str,
        message: String,
    },

    /// No gateway is registered for the notification's channel.
    #[error("No provider registered for channel {0}")]
    ChannelUnavailable(Channel),

    /// Transport-level failure (connection, timeout, protocol). The cause is
    /// opaque to the engine.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Receipt returned by a gateway for an accepted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReceipt {
    /// Provider-assigned identifier for the dispatched message.
    pub provider_id: String,
    /// True when the provider confirmed final delivery synchronously.
    /// Gateways that confirm asynchronously return false here.
    pub delivered: bool,
}

/// External delivery mechanism for a single channel.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Dispatch one message. A returned error is a failed delivery attempt.
    async fn send(
        &self,
        recipient: &str,
        subject: Option<&str>,
        content: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<ProviderReceipt, ProviderError>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Maps each channel to its injected gateway.
#[derive(Default)]
pub struct ProviderRegistry {
    gateways: HashMap<Channel, Arc<dyn ProviderGateway>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            gateways: HashMap::new(),
        }
    }

    /// Register the gateway for a channel, replacing any previous one.
    pub fn register(&mut self, channel: Channel, gateway: Arc<dyn ProviderGateway>) -> &mut Self {
        self.gateways.insert(channel, gateway);
        self
    }

    /// The gateway for a channel, or `ChannelUnavailable`.
    pub fn gateway(&self, channel: Channel) -> Result<Arc<dyn ProviderGateway>, ProviderError> {
        self.gateways
            .get(&channel)
            .cloned()
            .ok_or(ProviderError::ChannelUnavailable(channel))
    }

    /// Channels with a registered gateway.
    pub fn channels(&self) -> Vec<Channel> {
        self.gateways.keys().copied().collect()
    }
}
