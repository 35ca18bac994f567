use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};

/// Best-effort cache client. The referral ledger stays the source of
/// truth; every failure here is logged and degraded to a miss.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self { manager })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.manager.clone();

        match conn.get::<&str, Option<String>>(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("Failed to deserialize cache key {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("Redis GET error for key {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let json_data = serde_json::to_string(value)?;

        conn.set_ex::<&str, String, ()>(key, json_data, ttl_secs)
            .await
            .map_err(|e| anyhow::anyhow!("Redis SET failed: {}", e))?;

        Ok(())
    }
}
