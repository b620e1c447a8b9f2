//! Pair Resolver Port - Exchange Pair Lookup Interface
//!
//! Maps a raw exchange pair to canonical token identities and a verified
//! flag. Backed by an external pair/asset cache that may fail or be stale;
//! the scraper tolerates both.

use async_trait::async_trait;

use crate::domain::trade::{ExchangePair, ResolvedPair};

/// Lookup capability for exchange pairs.
#[async_trait]
pub trait PairResolver: Send + Sync + 'static {
  /// Fetch the cached pair for `(exchange, foreign_name)`.
  async fn get_exchange_pair_cache(
    &self,
    exchange: &str,
    foreign_name: &str,
  ) -> anyhow::Result<ExchangePair>;

  /// Resolve verification and token identities for a pair.
  ///
  /// Callers treat an error as "unverified, no token identities".
  async fn resolve(
    &self,
    exchange: &str,
    foreign_name: &str,
  ) -> anyhow::Result<ResolvedPair> {
    let pair = self.get_exchange_pair_cache(exchange, foreign_name).await?;
    Ok(ResolvedPair::from(pair))
  }
}
