//! In-memory Pair Cache
//!
//! `PairResolver` backed by a map filled from configuration (or by the
//! operator at runtime). Lookups for unknown pairs fail, which the
//! scraper treats as an unverified pair.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::AppConfig;
use crate::domain::pair;
use crate::domain::trade::ExchangePair;
use crate::ports::pair_resolver::PairResolver;

type PairKey = (String, String);

/// Pair cache keyed by `(exchange, canonical foreign name)`.
#[derive(Default)]
pub struct InMemoryPairCache {
    pairs: RwLock<HashMap<PairKey, ExchangePair>>,
}

impl InMemoryPairCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache seeded with every configured pair of every exchange.
    pub async fn from_config(config: &AppConfig) -> Self {
        let cache = Self::new();
        for exchange in &config.exchanges {
            for pair_config in &exchange.pairs {
                cache.insert(pair_config.to_exchange_pair(exchange)).await;
            }
        }
        cache
    }

    /// Insert or replace a pair. Native names are stored canonicalized.
    pub async fn insert(&self, mut pair: ExchangePair) {
        if let Ok(name) = pair::canonicalize(&pair.foreign_name, '/') {
            pair.foreign_name = name;
        }
        let key = (pair.exchange.clone(), pair.foreign_name.clone());
        debug!(exchange = %key.0, pair = %key.1, verified = pair.verified, "Cached pair");
        self.pairs.write().await.insert(key, pair);
    }

    pub async fn len(&self) -> usize {
        self.pairs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pairs.read().await.is_empty()
    }
}

#[async_trait]
impl PairResolver for InMemoryPairCache {
    async fn get_exchange_pair_cache(&self, exchange: &str, foreign_name: &str) -> Result<ExchangePair> {
        let key = (exchange.to_string(), foreign_name.to_string());
        self.pairs
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("pair {foreign_name} not cached for {exchange}"))
    }
}
