//! Per-pair trade cursors.
//!
//! A cursor remembers the furthest-forward trade seen for a pair. Only
//! the worker that polls the pair owns its `CursorBook`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::trade::RawTrade;

/// Last-seen trade of one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeCursor {
    /// Exchange-native identifier of the last trade.
    pub trade_id: String,
    /// Native ordering key of the last trade.
    pub sequence: u64,
}

impl TradeCursor {
    /// Cursor positioned at `trade`.
    pub fn at(trade: &RawTrade) -> Self {
        Self {
            trade_id: trade.foreign_trade_id.clone(),
            sequence: trade.sequence,
        }
    }
}

/// Cursors of every pair a worker polls, keyed by foreign name.
#[derive(Debug, Default)]
pub struct CursorBook {
    cursors: HashMap<String, TradeCursor>,
}

impl CursorBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor of `pair`.
    pub fn get(&self, pair: &str) -> Option<&TradeCursor> {
        self.cursors.get(pair)
    }

    /// Filter a fetched page down to unseen trades and advance the cursor.
    ///
    /// Trades at or behind the cursor are dropped, duplicates collapse to
    /// one, and the result is in ascending native order. The cursor moves
    /// to the furthest-forward trade regardless of the page order the
    /// exchange used. Never moves backwards.
    pub fn accept(&mut self, pair: &str, mut trades: Vec<RawTrade>) -> Vec<RawTrade> {
        let floor = self.cursors.get(pair).map(|c| c.sequence);

        trades.retain(|t| floor.is_none_or(|f| t.sequence > f));
        trades.sort_by_key(|t| t.sequence);
        trades.dedup_by_key(|t| t.sequence);

        if let Some(last) = trades.last() {
            self.cursors.insert(pair.to_string(), TradeCursor::at(last));
        }
        trades
    }

    /// Forget cursors of pairs for which `keep` is false.
    pub fn retain_pairs(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.cursors.retain(|pair, _| keep(pair));
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn trade(seq: u64) -> RawTrade {
        RawTrade {
            foreign_trade_id: seq.to_string(),
            sequence: seq,
            price: "1".to_string(),
            volume: "1".to_string(),
            time: Utc::now(),
        }
    }

    #[test]
    fn test_first_page_sets_cursor_to_newest() {
        let mut book = CursorBook::new();
        // Newest-first page, as many exchanges return it.
        let fresh = book.accept("ETH-DAI", vec![trade(9), trade(8), trade(7)]);

        let seqs: Vec<u64> = fresh.iter().map(|t| t.sequence).collect();
        assert_eq!(seqs, vec![7, 8, 9]);
        assert_eq!(book.get("ETH-DAI").unwrap().trade_id, "9");
    }

    #[test]
    fn test_already_seen_trades_dropped() {
        let mut book = CursorBook::new();
        book.accept("ETH-DAI", vec![trade(5)]);

        let fresh = book.accept("ETH-DAI", vec![trade(4), trade(5), trade(6), trade(6)]);
        let seqs: Vec<u64> = fresh.iter().map(|t| t.sequence).collect();
        assert_eq!(seqs, vec![6]);
        assert_eq!(book.get("ETH-DAI").unwrap().sequence, 6);
    }

    #[test]
    fn test_empty_page_keeps_cursor() {
        let mut book = CursorBook::new();
        book.accept("ETH-DAI", vec![trade(5)]);
        assert!(book.accept("ETH-DAI", Vec::new()).is_empty());
        assert_eq!(book.get("ETH-DAI").unwrap().sequence, 5);
    }

    #[test]
    fn test_pairs_are_isolated() {
        let mut book = CursorBook::new();
        book.accept("ETH-DAI", vec![trade(100)]);
        let fresh = book.accept("MKR-DAI", vec![trade(3)]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(book.len(), 2);

        book.retain_pairs(|pair| pair != "MKR-DAI");
        assert!(book.get("MKR-DAI").is_none());
    }
}
