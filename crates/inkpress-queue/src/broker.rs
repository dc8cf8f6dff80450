//! Broker adapter.
//!
//! Thin wrapper around the Redis client. When no broker is configured the
//! adapter still constructs, but every connection attempt reports
//! [`QueueError::Unavailable`] so the queue manager can degrade instead of
//! crashing the process.

use redis::aio::MultiplexedConnection;
use tracing::debug;

use crate::error::{QueueError, QueueResult};

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Redis URL; `None` means queuing is unavailable
    pub redis_url: Option<String>,
    /// Key namespace prefix
    pub namespace: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            redis_url: Some("redis://localhost:6379".to_string()),
            namespace: "inkpress".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Create config from environment variables.
    ///
    /// Unlike most collaborators, a missing `REDIS_URL` is not an error:
    /// the queue degrades to the unavailable mode and callers fall back to
    /// synchronous execution.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL").ok(),
            namespace: std::env::var("QUEUE_NAMESPACE").unwrap_or_else(|_| "inkpress".to_string()),
        }
    }

    /// Config with no broker at all.
    pub fn unconfigured() -> Self {
        Self {
            redis_url: None,
            namespace: "inkpress".to_string(),
        }
    }
}

/// Broker client handle. Cheap to clone.
#[derive(Clone)]
pub struct Broker {
    client: Option<redis::Client>,
    namespace: String,
}

impl Broker {
    /// Create a new broker adapter. A malformed URL is treated the same as
    /// an absent one: the broker constructs in the unavailable mode.
    pub fn new(config: BrokerConfig) -> Self {
        let client = match &config.redis_url {
            Some(url) => match redis::Client::open(url.as_str()) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!("Invalid REDIS_URL, queue unavailable: {}", e);
                    None
                }
            },
            None => None,
        };

        Self {
            client,
            namespace: config.namespace,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(BrokerConfig::from_env())
    }

    /// Whether a broker client was configured at all.
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Key namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Build a namespaced key: `{namespace}:{parts joined by ':'}`.
    pub fn key(&self, parts: &[&str]) -> String {
        let mut key = self.namespace.clone();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    /// Open a multiplexed connection.
    pub async fn connect(&self) -> QueueResult<MultiplexedConnection> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| QueueError::unavailable("no broker configured"))?;

        client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)
    }

    /// Round-trip a PING to verify the broker is reachable.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connect().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        debug!("Broker ping ok");
        Ok(())
    }
}
