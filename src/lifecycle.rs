//! Drives one token through NEW -> ANALYZING -> APPROVED | SUSPICIOUS.
//!
//! Actor classification, chart detection and trade clustering run as
//! independent blocking tasks and are joined before scoring. Any branch that
//! fails is replaced by its neutral default, so a run always ends in a
//! terminal state and a `token_update` notification.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::actors::{ActorClassifier, ActorReport, BotRegistry};
use crate::chart::{ChartDetector, ChartReport, ClusterWashDetector};
use crate::config::Config;
use crate::domain::{DetectedPattern, PricePoint, Token, TokenMetrics, TokenStatus, TradingSignal, Transaction};
use crate::notifier::{Notification, NotificationSink};
use crate::risk::{normalize_sentiment, risk_score, select_signal, terminal_status, RiskParams};
use crate::sources::{bounded, PriceSource, SentimentSource, TransactionSource};

#[derive(Debug, Clone, Default)]
pub struct AnalysisInputs {
    pub transactions: Vec<Transaction>,
    pub price_history: Vec<PricePoint>,
    pub sentiment: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisOutcome {
    pub risk_score: f64,
    pub trading_signal: TradingSignal,
    pub status: TokenStatus,
    pub metrics: TokenMetrics,
    pub patterns: Vec<DetectedPattern>,
    pub natural_chart: bool,
    pub chart_confidence: f64,
    pub flagged_addresses: Vec<String>,
}

#[derive(Clone)]
pub struct Sources {
    pub transactions: Arc<dyn TransactionSource>,
    pub prices: Arc<dyn PriceSource>,
    pub sentiment: Arc<dyn SentimentSource>,
}

impl Sources {
    /// One provider serving all three inputs.
    pub fn from_provider<P>(provider: Arc<P>) -> Self
    where
        P: TransactionSource + PriceSource + SentimentSource + 'static,
    {
        Self {
            transactions: provider.clone(),
            prices: provider.clone(),
            sentiment: provider,
        }
    }
}

/// Puts a token into ANALYZING and takes it back to NEW if dropped before `finish`.
struct AnalyzingGuard<'a> {
    token: &'a mut Token,
    finished: bool,
}

impl<'a> AnalyzingGuard<'a> {
    fn begin(token: &'a mut Token) -> Self {
        token.status = TokenStatus::Analyzing;
        Self { token, finished: false }
    }

    /// Applies the outcome and returns the matching `token_update`.
    fn finish(mut self, outcome: &AnalysisOutcome) -> Notification {
        self.token.risk_score = outcome.risk_score;
        self.token.trading_signal = outcome.trading_signal;
        self.token.metrics = outcome.metrics.clone();
        self.token.status = outcome.status;
        self.finished = true;
        Notification::token_update(self.token)
    }
}

impl Drop for AnalyzingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished && self.token.status == TokenStatus::Analyzing {
            warn!(token = %self.token.address, "lifecycle.abandoned");
            self.token.status = TokenStatus::New;
        }
    }
}

#[derive(Clone)]
pub struct Controller {
    risk: RiskParams,
    classifier: Arc<ActorClassifier>,
    chart: Arc<ChartDetector>,
    wash: ClusterWashDetector,
    notifier: Arc<dyn NotificationSink>,
    fetch_timeout: Duration,
}

impl Controller {
    pub fn new(cfg: &Config, bots: Arc<dyn BotRegistry>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            risk: RiskParams::with_threshold(cfg.risk_threshold),
            classifier: Arc::new(ActorClassifier::new(cfg.detection.clone(), bots)),
            chart: Arc::new(ChartDetector::new(&cfg.detection)),
            wash: ClusterWashDetector::new(cfg.fast_clustering),
            notifier,
            fetch_timeout: cfg.fetch_timeout(),
        }
    }

    pub fn with_chart_detector(mut self, chart: ChartDetector) -> Self {
        self.chart = Arc::new(chart);
        self
    }

    pub fn risk_params(&self) -> &RiskParams {
        &self.risk
    }

    /// Fetches all three inputs concurrently; each is time-bounded and empty on failure.
    pub async fn fetch_inputs(&self, sources: &Sources, token: &Token) -> AnalysisInputs {
        let limit = self.fetch_timeout;
        let (transactions, price_history, sentiment) = tokio::join!(
            bounded("transactions", &token.address, limit, vec![], sources.transactions.transactions(token)),
            bounded("prices", &token.address, limit, vec![], sources.prices.price_history(token)),
            bounded("sentiment", &token.address, limit, None, sources.sentiment.sentiment(token)),
        );
        AnalysisInputs { transactions, price_history, sentiment }
    }

    /// Fetch then analyze. The token is ANALYZING for the whole duration.
    pub async fn process(&self, sources: &Sources, token: &mut Token) -> AnalysisOutcome {
        let guard = AnalyzingGuard::begin(token);
        let inputs = self.fetch_inputs(sources, guard.token).await;
        self.run(guard, inputs).await
    }

    pub async fn analyze(
        &self,
        token: &mut Token,
        transactions: Vec<Transaction>,
        price_history: Vec<PricePoint>,
        sentiment: Option<f64>,
    ) -> AnalysisOutcome {
        let guard = AnalyzingGuard::begin(token);
        self.run(guard, AnalysisInputs { transactions, price_history, sentiment }).await
    }

    async fn run(&self, guard: AnalyzingGuard<'_>, inputs: AnalysisInputs) -> AnalysisOutcome {
        let address = guard.token.address.clone();
        let outcome = self.evaluate(guard.token, inputs).await;
        let update = guard.finish(&outcome);
        self.publish(&address, update, &outcome.patterns).await;
        outcome
    }

    async fn evaluate(&self, token: &Token, inputs: AnalysisInputs) -> AnalysisOutcome {
        let transactions = Arc::new(inputs.transactions);
        let series = inputs.price_history;

        let actors_task = {
            let classifier = Arc::clone(&self.classifier);
            let txs = Arc::clone(&transactions);
            let created = token.creation_time;
            let creator = token.creator_address.clone();
            tokio::task::spawn_blocking(move || classifier.classify(created, &creator, &txs))
        };
        let chart_task = {
            let chart = Arc::clone(&self.chart);
            tokio::task::spawn_blocking(move || chart.analyze(&series))
        };
        let wash_task = {
            let wash = self.wash.clone();
            let txs = Arc::clone(&transactions);
            tokio::task::spawn_blocking(move || wash.detect(&txs))
        };

        let (actors, chart, clustered) = tokio::join!(actors_task, chart_task, wash_task);
        let actors = actors.unwrap_or_else(|err| {
            warn!(token = %token.address, error = %err, "lifecycle.actors_failed");
            ActorReport::default()
        });
        let chart = chart.unwrap_or_else(|err| {
            warn!(token = %token.address, error = %err, "lifecycle.chart_failed");
            ChartReport::insufficient()
        });
        let clustered = clustered.unwrap_or_else(|err| {
            warn!(token = %token.address, error = %err, "lifecycle.clustering_failed");
            vec![]
        });

        let sentiment = normalize_sentiment(inputs.sentiment.unwrap_or(0.0));
        let mut patterns = chart.patterns;
        patterns.extend(clustered);

        let score = risk_score(&self.risk, &actors, chart.natural_chart, &patterns, sentiment);
        let trading_signal = select_signal(&self.risk, score, sentiment, chart.natural_chart);
        let status = terminal_status(&self.risk, score);

        let metrics = TokenMetrics {
            volume_5m: actors.volume_5m,
            sniper_count: actors.sniper_count,
            bot_buyer_count: actors.bot_count,
            insider_count: actors.insider_count,
            dev_selling: actors.dev_selling,
            natural_chart: chart.natural_chart,
            social_sentiment: sentiment,
        };

        info!(
            token = %token.address,
            risk_score = score,
            signal = ?trading_signal,
            status = ?status,
            patterns = patterns.len(),
            flagged = actors.flagged.len(),
            "lifecycle.analyzed"
        );

        AnalysisOutcome {
            risk_score: score,
            trading_signal,
            status,
            metrics,
            patterns,
            natural_chart: chart.natural_chart,
            chart_confidence: chart.confidence,
            flagged_addresses: actors.flagged.into_iter().collect(),
        }
    }

    async fn publish(&self, address: &str, update: Notification, patterns: &[DetectedPattern]) {
        let alerts = patterns.iter().map(|p| Notification::pattern_alert(address, p));
        for notification in std::iter::once(update).chain(alerts) {
            if let Err(err) = self.notifier.send(&notification).await {
                warn!(token = address, error = %err, "lifecycle.notify_failed");
            }
        }
    }
}
