//! REST store backend (Upstash-style command-over-path API).
//!
//! Commands map onto URL path segments (`/set/{key}/{value}/ex/{ttl}/nx`),
//! authenticated with a bearer token. Replies are `{"result": ...}` where a
//! null result means nil.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use async_trait::async_trait;

use super::{KvStore, StoreError};

#[derive(Debug, Deserialize)]
struct RestReply<T> {
    result: Option<T>,
}

#[derive(Debug, Clone)]
pub struct RestStore {
    http: Client,
    base_url: String,
    token: String,
}

impl RestStore {
    pub fn new(base_url: String, token: String) -> anyhow::Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn encode(segment: &str) -> String {
        utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string()
    }

    async fn command<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        let reply: RestReply<T> = response.json().await?;
        Ok(reply.result)
    }
}

#[async_trait]
impl KvStore for RestStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.command::<String>(&format!("get/{}", Self::encode(key)))
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), StoreError> {
        let path = match ttl_seconds {
            Some(ttl) => format!("set/{}/{}/ex/{}", Self::encode(key), Self::encode(value), ttl),
            None => format!("set/{}/{}", Self::encode(key), Self::encode(value)),
        };
        self.command::<String>(&path).await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, StoreError> {
        // SET .. EX .. NX replies OK on a fresh write, null when the key is
        // already present.
        let path = format!(
            "set/{}/{}/ex/{}/nx",
            Self::encode(key),
            Self::encode(value),
            ttl_seconds
        );
        let reply = self.command::<String>(&path).await?;
        Ok(reply.is_some())
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let reply = self
            .command::<i64>(&format!("incr/{}", Self::encode(key)))
            .await?;
        reply.ok_or_else(|| StoreError::UnexpectedReply("nil reply to INCR".to_string()))
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool, StoreError> {
        let reply = self
            .command::<i64>(&format!("expire/{}/{}", Self::encode(key), ttl_seconds))
            .await?;
        Ok(reply.unwrap_or(0) == 1)
    }
}
