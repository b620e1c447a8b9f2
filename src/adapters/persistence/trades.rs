//! Trade Logger - Append-only JSONL Trade Records
//!
//! Persists scraped trades to daily JSONL files named after the trade's
//! own date, `trades/YYYY-MM-DD.jsonl`. Each line is one self-contained
//! `TradeRecord`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::domain::trade::TradeRecord;

/// Append-only JSONL trade sink with daily partitioning.
pub struct TradeLogger {
    trades_dir: PathBuf,
}

impl TradeLogger {
    /// Create a logger writing under `data_dir/trades`.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let trades_dir = Path::new(data_dir).join("trades");

        fs::create_dir_all(&trades_dir)
            .await
            .context("Failed to create trades directory")?;

        Ok(Self { trades_dir })
    }

    fn file_for(&self, time: &DateTime<Utc>) -> PathBuf {
        self.trades_dir.join(format!("{}.jsonl", time.format("%Y-%m-%d")))
    }

    /// Append one trade to the file of its trade date.
    #[instrument(skip(self, record), fields(source = %record.source, trade_id = %record.foreign_trade_id))]
    pub async fn append_trade(&self, record: &TradeRecord) -> Result<()> {
        let path = self.file_for(&record.time);

        let mut json = serde_json::to_string(record).context("Failed to serialize trade record")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open trade log file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write trade record")?;

        file.flush().await.context("Failed to flush trade log")?;

        Ok(())
    }

    /// Load every stored trade, oldest first. Malformed lines are skipped.
    #[instrument(skip(self))]
    pub async fn load_all_trades(&self) -> Result<Vec<TradeRecord>> {
        let mut trades = Vec::new();
        let mut entries = fs::read_dir(&self.trades_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "jsonl") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            for line in content.lines().filter(|line| !line.trim().is_empty()) {
                match serde_json::from_str::<TradeRecord>(line) {
                    Ok(record) => trades.push(record),
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "Skipping malformed trade record");
                    }
                }
            }
        }

        trades.sort_by_key(|t| t.time);
        info!(count = trades.len(), "Loaded trade records");
        Ok(trades)
    }
}
