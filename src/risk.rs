use serde::{Deserialize, Serialize};

use crate::actors::ActorReport;
use crate::domain::{DetectedPattern, PatternType, TokenStatus, TradingSignal};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    pub risk_threshold: f64, // 70.0 => SELL / SUSPICIOUS at or above

    pub base_score: f64,
    pub per_sniper: f64,
    pub per_bot: f64,
    pub per_insider: f64,
    pub unnatural_chart: f64,
    pub per_pump_and_dump: f64,
    pub per_wash_trading: f64,
    pub negative_sentiment_weight: f64,

    // Signal
    pub buy_sentiment: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self::with_threshold(70.0)
    }
}

impl RiskParams {
    pub fn with_threshold(risk_threshold: f64) -> Self {
        Self {
            risk_threshold,
            base_score: 50.0,
            per_sniper: 2.0,
            per_bot: 1.5,
            per_insider: 3.0,
            unnatural_chart: 20.0,
            per_pump_and_dump: 15.0,
            per_wash_trading: 10.0,
            negative_sentiment_weight: 10.0,
            buy_sentiment: 0.5,
        }
    }
}

/// Sentiment outside [-1, 1] is clamped; NaN counts as neutral.
pub fn normalize_sentiment(sentiment: f64) -> f64 {
    if sentiment.is_nan() {
        0.0
    } else {
        sentiment.clamp(-1.0, 1.0)
    }
}

/// Pure and deterministic. Snipers that are also insiders count in both categories.
pub fn risk_score(
    params: &RiskParams,
    actors: &ActorReport,
    natural_chart: bool,
    patterns: &[DetectedPattern],
    sentiment: f64,
) -> f64 {
    let mut score = params.base_score;

    score += actors.sniper_count as f64 * params.per_sniper;
    score += actors.bot_count as f64 * params.per_bot;
    score += actors.insider_count as f64 * params.per_insider;

    if !natural_chart {
        score += params.unnatural_chart;
    }
    for p in patterns {
        match p.pattern_type {
            PatternType::PumpAndDump => score += params.per_pump_and_dump,
            PatternType::WashTrading => score += params.per_wash_trading,
            _ => {}
        }
    }

    let sentiment = normalize_sentiment(sentiment);
    if sentiment < 0.0 {
        score += sentiment.abs() * params.negative_sentiment_weight;
    }

    score.clamp(0.0, 100.0)
}

/// SELL wins over BUY when both hold.
pub fn select_signal(params: &RiskParams, risk_score: f64, sentiment: f64, natural_chart: bool) -> TradingSignal {
    if risk_score >= params.risk_threshold {
        return TradingSignal::Sell;
    }
    if normalize_sentiment(sentiment) > params.buy_sentiment && natural_chart {
        return TradingSignal::Buy;
    }
    TradingSignal::Wait
}

pub fn terminal_status(params: &RiskParams, risk_score: f64) -> TokenStatus {
    if risk_score < params.risk_threshold {
        TokenStatus::Approved
    } else {
        TokenStatus::Suspicious
    }
}
