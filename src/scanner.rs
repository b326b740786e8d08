use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::actors::{BotRegistry, StaticBotList};
use crate::config::Config;
use crate::domain::{Token, TokenStatus};
use crate::journal;
use crate::lifecycle::{AnalysisOutcome, Controller, Sources};
use crate::logger::{append_line, heartbeat_line};
use crate::notifier::WebhookNotifier;
use crate::sources::{HttpMarketData, StaticMarketData, TokenFeed};
use crate::state::{PersistedState, StateStore};

/// The token book plus everything needed to move it forward one poll at a time.
pub struct Scanner {
    cfg: Config,
    feed: Arc<dyn TokenFeed>,
    sources: Sources,
    controller: Controller,
    store: StateStore,
    tokens: BTreeMap<String, Token>,
}

impl Scanner {
    /// Loads any saved snapshot. Tokens caught mid-analysis go back to NEW.
    pub fn new(cfg: Config, feed: Arc<dyn TokenFeed>, sources: Sources, controller: Controller) -> Result<Self> {
        let store = StateStore::new(&cfg.state_path);
        let mut tokens = BTreeMap::new();
        if let Some(st) = store.load()? {
            for mut token in st.tokens {
                if token.status == TokenStatus::Analyzing {
                    token.status = TokenStatus::New;
                }
                tokens.insert(token.address.clone(), token);
            }
        }
        info!(restored = tokens.len(), path = %cfg.state_path, "scanner.state_loaded");
        Ok(Self { cfg, feed, sources, controller, store, tokens })
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    pub fn token(&self, address: &str) -> Option<&Token> {
        self.tokens.get(address)
    }

    /// Adds tokens seen for the first time. Returns how many were new.
    pub async fn discover(&mut self) -> usize {
        let limit = self.cfg.fetch_timeout();
        let found = crate::sources::bounded("feed", "*", limit, vec![], self.feed.new_tokens()).await;
        let mut added = 0;
        for discovery in found {
            if self.tokens.contains_key(&discovery.address) {
                continue;
            }
            let token = Token::from(discovery);
            debug!(token = %token.address, name = %token.name, "scanner.discovered");
            self.tokens.insert(token.address.clone(), token);
            added += 1;
        }
        added
    }

    /// Analyses every NEW token, at most `max_concurrent` at a time.
    pub async fn analyze_pending(&mut self) -> usize {
        let pending: Vec<String> = self
            .tokens
            .values()
            .filter(|t| t.status == TokenStatus::New)
            .map(|t| t.address.clone())
            .collect();

        let mut set: JoinSet<(Token, AnalysisOutcome)> = JoinSet::new();
        let mut done = 0;

        for address in pending {
            while set.len() >= self.cfg.max_concurrent.max(1) {
                done += self.collect_one(&mut set).await;
            }
            let Some(token) = self.tokens.get_mut(&address) else { continue };
            let mut working = token.clone();
            token.status = TokenStatus::Analyzing;

            let controller = self.controller.clone();
            let sources = self.sources.clone();
            set.spawn(async move {
                let outcome = controller.process(&sources, &mut working).await;
                (working, outcome)
            });
        }
        while !set.is_empty() {
            done += self.collect_one(&mut set).await;
        }

        // Whatever is still ANALYZING here belonged to a crashed task.
        for token in self.tokens.values_mut().filter(|t| t.status == TokenStatus::Analyzing) {
            warn!(token = %token.address, "scanner.analysis_reset");
            token.status = TokenStatus::New;
        }
        done
    }

    async fn collect_one(&mut self, set: &mut JoinSet<(Token, AnalysisOutcome)>) -> usize {
        match set.join_next().await {
            Some(Ok((token, outcome))) => {
                if let Err(err) = journal::append_analysis(&self.cfg.journal_path, &self.cfg.tz, &token, &outcome) {
                    warn!(token = %token.address, error = %err, "scanner.journal_failed");
                }
                self.tokens.insert(token.address.clone(), token);
                1
            }
            Some(Err(err)) => {
                error!(error = %err, "scanner.analysis_crashed");
                0
            }
            None => 0,
        }
    }

    pub fn save(&self) -> Result<()> {
        self.store.save(&PersistedState { version: 1, tokens: self.tokens.values().cloned().collect() })
    }

    /// One poll: discover, analyse, persist, heartbeat.
    pub async fn tick(&mut self) -> Result<()> {
        let added = self.discover().await;
        let analysed = self.analyze_pending().await;
        self.save()?;
        if let Err(err) = append_line(&self.cfg.heartbeat_log_path, &heartbeat_line(self.tokens.len())) {
            warn!(error = %err, "scanner.heartbeat_write_failed");
        }
        info!(added, analysed, tracked = self.tokens.len(), "scanner.heartbeat");
        Ok(())
    }
}

fn load_bots(cfg: &Config) -> Result<Arc<dyn BotRegistry>> {
    let bots = match cfg.known_bots_path.as_deref() {
        Some(path) => StaticBotList::from_file(path)?,
        None => StaticBotList::default(),
    };
    info!(known_bots = bots.len(), "scanner.bots_loaded");
    Ok(Arc::new(bots))
}

pub async fn run(cfg: Config) -> Result<()> {
    info!(
        data_api = cfg.data_api_url.as_deref().unwrap_or(""),
        webhook = cfg.webhook_url.is_some(),
        poll_interval_secs = cfg.poll_interval_secs,
        max_concurrent = cfg.max_concurrent,
        risk_threshold = cfg.risk_threshold,
        "scanner.start"
    );

    let (feed, sources): (Arc<dyn TokenFeed>, Sources) = match cfg.data_api_url.clone() {
        Some(url) => {
            let api = Arc::new(HttpMarketData::new(url));
            let feed: Arc<dyn TokenFeed> = api.clone();
            (feed, Sources::from_provider(api))
        }
        None => {
            warn!("scanner.no_data_api");
            let empty = Arc::new(StaticMarketData::default());
            let feed: Arc<dyn TokenFeed> = empty.clone();
            (feed, Sources::from_provider(empty))
        }
    };
    let notifier = Arc::new(WebhookNotifier::new(cfg.webhook_url.clone()));
    let controller = Controller::new(&cfg, load_bots(&cfg)?, notifier);

    let poll = Duration::from_secs(cfg.poll_interval_secs.max(1));
    let mut scanner = Scanner::new(cfg, feed, sources, controller)?;

    loop {
        if let Err(err) = scanner.tick().await {
            error!(error = %err, "scanner.tick_failed");
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("scanner.shutdown");
                return scanner.save();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TokenDiscovery, TradingSignal};
    use crate::notifier::BroadcastNotifier;

    fn discovery(address: &str) -> TokenDiscovery {
        TokenDiscovery {
            address: address.to_string(),
            name: format!("Token {address}"),
            creator_address: "dev".to_string(),
            symbol: String::new(),
            creation_time: None,
        }
    }

    fn scanner(dir: &tempfile::TempDir, data: StaticMarketData, max_concurrent: usize) -> Scanner {
        let cfg = Config {
            state_path: dir.path().join("tokens.json").display().to_string(),
            journal_path: dir.path().join("analysis.md").display().to_string(),
            heartbeat_log_path: dir.path().join("heartbeat.log").display().to_string(),
            max_concurrent,
            ..Config::default()
        };
        let data = Arc::new(data);
        let controller = Controller::new(
            &cfg,
            Arc::new(StaticBotList::default()),
            Arc::new(BroadcastNotifier::new(64)),
        );
        Scanner::new(cfg, data.clone(), Sources::from_provider(data), controller).unwrap()
    }

    #[tokio::test]
    async fn tick_discovers_analyses_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let data = StaticMarketData {
            discoveries: vec![discovery("A"), discovery("B"), discovery("C"), discovery("A")],
            ..Default::default()
        };
        let mut s = scanner(&dir, data, 2);
        s.tick().await.unwrap();

        assert_eq!(s.tokens().count(), 3);
        assert!(s.tokens().all(|t| t.status == TokenStatus::Approved));
        assert_eq!(s.token("B").unwrap().trading_signal, TradingSignal::Wait);

        let saved = StateStore::new(dir.path().join("tokens.json")).load().unwrap().unwrap();
        assert_eq!(saved.tokens.len(), 3);
        let journal = std::fs::read_to_string(dir.path().join("analysis.md")).unwrap();
        assert_eq!(journal.matches("- Risk score: 50.0").count(), 3);
        let heartbeat = std::fs::read_to_string(dir.path().join("heartbeat.log")).unwrap();
        assert!(heartbeat.trim_end().ends_with("heartbeat tokens=3"));
    }

    #[tokio::test]
    async fn zero_concurrency_still_analyses_one_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let data = StaticMarketData { discoveries: vec![discovery("A"), discovery("B")], ..Default::default() };
        let mut s = scanner(&dir, data, 0);
        assert_eq!(s.discover().await, 2);
        assert_eq!(s.analyze_pending().await, 2);
        assert!(s.tokens().all(|t| t.status == TokenStatus::Approved));
    }

    #[tokio::test]
    async fn analysed_tokens_are_not_redone() {
        let dir = tempfile::tempdir().unwrap();
        let data = StaticMarketData { discoveries: vec![discovery("A")], ..Default::default() };
        let mut s = scanner(&dir, data, 4);
        s.tick().await.unwrap();
        assert_eq!(s.discover().await, 0);
        assert_eq!(s.analyze_pending().await, 0);
    }

    #[tokio::test]
    async fn interrupted_tokens_resume_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut stuck = Token::new("A", "One", "dev");
        stuck.status = TokenStatus::Analyzing;
        let mut rejected = Token::new("R", "Two", "dev");
        rejected.status = TokenStatus::Rejected;
        StateStore::new(dir.path().join("tokens.json"))
            .save(&PersistedState { version: 1, tokens: vec![stuck, rejected] })
            .unwrap();

        let mut s = scanner(&dir, StaticMarketData::default(), 1);
        assert_eq!(s.token("A").unwrap().status, TokenStatus::New);
        assert_eq!(s.analyze_pending().await, 1);
        assert_eq!(s.token("A").unwrap().status, TokenStatus::Approved);
        assert_eq!(s.token("R").unwrap().status, TokenStatus::Rejected);
    }
}
