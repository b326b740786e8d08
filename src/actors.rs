//! Per-address behaviour summaries and sniper / bot / insider labelling.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::config::DetectionParams;
use crate::domain::{Transaction, TxKind};

/// Source of addresses already known to be trading bots.
pub trait BotRegistry: Send + Sync {
    fn is_known_bot(&self, address: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct StaticBotList {
    addresses: HashSet<String>,
}

impl StaticBotList {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { addresses: addresses.into_iter().map(Into::into).collect() }
    }

    /// One address per line; blank lines and `#` comments are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::new(
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        ))
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl BotRegistry for StaticBotList {
    fn is_known_bot(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressPattern {
    pub address: String,
    pub buy_count: u32,
    pub sell_count: u32,
    pub total_volume: f64,
    pub first_tx_time: DateTime<Utc>,
    pub last_tx_time: DateTime<Utc>,
    pub avg_tx_size: f64,
}

impl AddressPattern {
    fn start(tx: &Transaction) -> Self {
        Self {
            address: tx.address.clone(),
            buy_count: 0,
            sell_count: 0,
            total_volume: 0.0,
            first_tx_time: tx.timestamp,
            last_tx_time: tx.timestamp,
            avg_tx_size: 0.0,
        }
    }

    fn fold(&mut self, tx: &Transaction) {
        match tx.kind {
            TxKind::Buy => self.buy_count += 1,
            TxKind::Sell => self.sell_count += 1,
        }
        self.total_volume += tx.amount.max(0.0);
        self.first_tx_time = self.first_tx_time.min(tx.timestamp);
        self.last_tx_time = self.last_tx_time.max(tx.timestamp);
        // Recomputed from totals, never accumulated.
        self.avg_tx_size = self.total_volume / f64::from(self.tx_count());
    }

    pub fn tx_count(&self) -> u32 {
        self.buy_count + self.sell_count
    }

    pub fn active_span(&self) -> Duration {
        self.last_tx_time - self.first_tx_time
    }

    /// Transactions per minute, with the active span floored at one minute.
    pub fn tx_rate_per_minute(&self) -> f64 {
        let minutes = self.active_span().num_milliseconds() as f64 / 60_000.0;
        f64::from(self.tx_count()) / minutes.max(1.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActorReport {
    pub sniper_count: usize,
    pub bot_count: usize,
    pub insider_count: usize,
    /// Union of every flagged address, deduplicated.
    pub flagged: BTreeSet<String>,
    pub dev_selling: bool,
    pub volume_5m: f64,
}

#[derive(Clone)]
pub struct ActorClassifier {
    params: DetectionParams,
    bots: Arc<dyn BotRegistry>,
}

impl ActorClassifier {
    pub fn new(params: DetectionParams, bots: Arc<dyn BotRegistry>) -> Self {
        Self { params, bots }
    }

    pub fn fold_addresses(transactions: &[Transaction]) -> HashMap<String, AddressPattern> {
        let mut patterns: HashMap<String, AddressPattern> = HashMap::new();
        for tx in transactions {
            patterns
                .entry(tx.address.clone())
                .or_insert_with(|| AddressPattern::start(tx))
                .fold(tx);
        }
        patterns
    }

    pub fn classify(
        &self,
        creation_time: DateTime<Utc>,
        creator_address: &str,
        transactions: &[Transaction],
    ) -> ActorReport {
        let patterns = Self::fold_addresses(transactions);

        let snipers = self.snipers(&patterns, creation_time);
        let bots = self.bots(&patterns);
        let insiders = self.insiders(&patterns, creation_time);

        let dev_selling = patterns
            .get(creator_address)
            .is_some_and(|p| p.sell_count > 0);

        let early_cutoff = creation_time + Duration::seconds(self.params.early_volume_window_secs);
        let volume_5m = transactions
            .iter()
            .filter(|tx| tx.timestamp >= creation_time && tx.timestamp <= early_cutoff)
            .map(|tx| tx.amount.max(0.0))
            .sum();

        let flagged: BTreeSet<String> = snipers
            .iter()
            .chain(bots.iter())
            .chain(insiders.iter())
            .cloned()
            .collect();

        ActorReport {
            sniper_count: snipers.len(),
            bot_count: bots.len(),
            insider_count: insiders.len(),
            flagged,
            dev_selling,
            volume_5m,
        }
    }

    fn snipers(&self, patterns: &HashMap<String, AddressPattern>, creation_time: DateTime<Utc>) -> BTreeSet<String> {
        let window = creation_time + Duration::seconds(self.params.sniper_window_secs);
        patterns
            .values()
            .filter(|p| p.first_tx_time <= window && p.buy_count > 0 && p.total_volume > 0.0)
            .map(|p| p.address.clone())
            .collect()
    }

    fn bots(&self, patterns: &HashMap<String, AddressPattern>) -> BTreeSet<String> {
        patterns
            .values()
            .filter(|p| {
                self.bots.is_known_bot(&p.address) || p.tx_rate_per_minute() >= self.params.bot_tx_per_minute
            })
            .map(|p| p.address.clone())
            .collect()
    }

    /// Bought inside the sniper window and was already selling within the exit window.
    fn insiders(&self, patterns: &HashMap<String, AddressPattern>, creation_time: DateTime<Utc>) -> BTreeSet<String> {
        let window = creation_time + Duration::seconds(self.params.sniper_window_secs);
        let exit = Duration::seconds(self.params.insider_exit_secs);
        patterns
            .values()
            .filter(|p| {
                p.first_tx_time <= window && p.total_volume > 0.0 && p.sell_count > 0 && p.active_span() < exit
            })
            .map(|p| p.address.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(address: &str, kind: TxKind, amount: f64, at: DateTime<Utc>) -> Transaction {
        Transaction { address: address.to_string(), kind, amount, timestamp: at }
    }

    fn classifier(bots: &[&str]) -> ActorClassifier {
        ActorClassifier::new(DetectionParams::default(), Arc::new(StaticBotList::new(bots.iter().copied())))
    }

    #[test]
    fn empty_input_yields_zero_counts() {
        let report = classifier(&[]).classify(Utc::now(), "dev", &[]);
        assert_eq!(report, ActorReport::default());
    }

    #[test]
    fn early_buy_and_quick_exit_is_sniper_and_insider() {
        let created = Utc::now();
        let txs = vec![
            tx("early", TxKind::Buy, 5.0, created + Duration::seconds(10)),
            tx("early", TxKind::Sell, 5.0, created + Duration::seconds(250)),
            tx("late", TxKind::Buy, 5.0, created + Duration::seconds(1000)),
            tx("late", TxKind::Sell, 5.0, created + Duration::seconds(1100)),
        ];
        let report = classifier(&[]).classify(created, "dev", &txs);
        assert_eq!(report.sniper_count, 1);
        assert_eq!(report.insider_count, 1);
        assert_eq!(report.bot_count, 0);
        assert_eq!(report.flagged.iter().collect::<Vec<_>>(), vec!["early"]);
    }

    #[test]
    fn unordered_transactions_fold_to_true_first_and_last() {
        let created = Utc::now();
        let txs = vec![
            tx("a", TxKind::Sell, 1.0, created + Duration::seconds(200)),
            tx("a", TxKind::Buy, 3.0, created + Duration::seconds(30)),
        ];
        let map = ActorClassifier::fold_addresses(&txs);
        let a = &map["a"];
        assert_eq!(a.first_tx_time, created + Duration::seconds(30));
        assert_eq!(a.last_tx_time, created + Duration::seconds(200));
        assert_eq!(a.avg_tx_size, 2.0);

        let report = classifier(&[]).classify(created, "dev", &txs);
        assert_eq!(report.sniper_count, 1);
        assert_eq!(report.insider_count, 1);
    }

    #[test]
    fn sniper_needs_a_buy_with_volume() {
        let created = Utc::now();
        let txs = vec![
            tx("seller", TxKind::Sell, 4.0, created + Duration::seconds(5)),
            tx("dust", TxKind::Buy, 0.0, created + Duration::seconds(5)),
        ];
        let report = classifier(&[]).classify(created, "dev", &txs);
        assert_eq!(report.sniper_count, 0);
        // "seller" still exits fast with volume.
        assert_eq!(report.insider_count, 1);
    }

    #[test]
    fn slow_exit_is_not_insider() {
        let created = Utc::now();
        let txs = vec![
            tx("holder", TxKind::Buy, 1.0, created + Duration::seconds(60)),
            tx("holder", TxKind::Sell, 1.0, created + Duration::seconds(60 + 301)),
        ];
        let report = classifier(&[]).classify(created, "dev", &txs);
        assert_eq!(report.sniper_count, 1);
        assert_eq!(report.insider_count, 0);
    }

    #[test]
    fn high_rate_and_allow_list_mark_bots() {
        let created = Utc::now() - Duration::hours(1);
        let mut txs: Vec<Transaction> = (0..12)
            .map(|i| tx("spammer", TxKind::Buy, 1.0, created + Duration::seconds(3600 + i * 5)))
            .collect();
        txs.push(tx("listed", TxKind::Buy, 1.0, created + Duration::seconds(4000)));
        txs.push(tx("human", TxKind::Buy, 1.0, created + Duration::seconds(4000)));

        let report = classifier(&["listed"]).classify(created, "dev", &txs);
        assert_eq!(report.bot_count, 2);
        assert!(report.flagged.contains("spammer"));
        assert!(report.flagged.contains("listed"));
        assert!(!report.flagged.contains("human"));
    }

    #[test]
    fn rate_floors_span_at_one_minute() {
        let t = Utc::now();
        let txs: Vec<Transaction> = (0..9).map(|_| tx("a", TxKind::Buy, 1.0, t)).collect();
        let map = ActorClassifier::fold_addresses(&txs);
        assert_eq!(map["a"].tx_rate_per_minute(), 9.0);
    }

    #[test]
    fn tracks_dev_selling_and_early_volume() {
        let created = Utc::now();
        let txs = vec![
            tx("dev", TxKind::Sell, 10.0, created + Duration::seconds(400)),
            tx("b", TxKind::Buy, 2.0, created + Duration::seconds(100)),
            tx("c", TxKind::Buy, 3.0, created + Duration::seconds(290)),
        ];
        let report = classifier(&[]).classify(created, "dev", &txs);
        assert!(report.dev_selling);
        assert_eq!(report.volume_5m, 5.0);
    }

    #[test]
    fn bot_list_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bots.txt");
        std::fs::write(&path, "# known\nBot1\n\n  Bot2  \n").unwrap();
        let list = StaticBotList::from_file(&path).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.is_known_bot("Bot2"));
        assert!(!list.is_known_bot("# known"));
    }
}
