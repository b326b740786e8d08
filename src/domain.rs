use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Buy,
    Sell,
}

/// One trade against a token, as reported by the transaction source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,

    /// Candle extremes, when the provider reports them. Used as a spread proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64, volume: f64) -> Self {
        Self { timestamp, price, volume, high: None, low: None }
    }

    pub fn spread(&self) -> f64 {
        self.high.unwrap_or(self.price) - self.low.unwrap_or(self.price)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    PumpAndDump,
    Accumulation,
    Distribution,
    WashTrading,
    LiquidityManipulation,
    BearishDivergence,
    BullishDivergence,
    WhaleActivity,
    UnusualVolume,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedPattern {
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub severity: f64,
    pub description: String,
}

impl DetectedPattern {
    /// Clamps confidence into [0, 1], severity to non-negative and orders the interval.
    pub fn new(
        pattern_type: PatternType,
        confidence: f64,
        a: DateTime<Utc>,
        b: DateTime<Utc>,
        severity: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            pattern_type,
            confidence: if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 },
            start_time: a.min(b),
            end_time: a.max(b),
            severity: if severity.is_finite() { severity.max(0.0) } else { 0.0 },
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    New,
    Analyzing,
    Approved,
    /// Set by external moderation only.
    Rejected,
    Suspicious,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradingSignal {
    Buy,
    Sell,
    Wait,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenMetrics {
    pub volume_5m: f64,
    pub sniper_count: usize,
    pub bot_buyer_count: usize,
    pub insider_count: usize,
    pub dev_selling: bool,
    pub natural_chart: bool,
    pub social_sentiment: f64, // -1..1
}

impl Default for TokenMetrics {
    fn default() -> Self {
        Self {
            volume_5m: 0.0,
            sniper_count: 0,
            bot_buyer_count: 0,
            insider_count: 0,
            dev_selling: false,
            natural_chart: true,
            social_sentiment: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub name: String,
    pub creator_address: String,
    #[serde(default)]
    pub symbol: String,
    pub status: TokenStatus,
    pub risk_score: f64,
    pub trading_signal: TradingSignal,
    pub metrics: TokenMetrics,
    pub creation_time: DateTime<Utc>,
}

impl Token {
    pub fn new(address: impl Into<String>, name: impl Into<String>, creator_address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            creator_address: creator_address.into(),
            symbol: String::new(),
            status: TokenStatus::New,
            risk_score: 0.0,
            trading_signal: TradingSignal::Wait,
            metrics: TokenMetrics::default(),
            creation_time: Utc::now(),
        }
    }

    pub fn with_creation_time(mut self, creation_time: DateTime<Utc>) -> Self {
        self.creation_time = creation_time;
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }
}

/// A newly created token as announced by the discovery feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDiscovery {
    pub address: String,
    pub name: String,
    pub creator_address: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}

impl From<TokenDiscovery> for Token {
    fn from(d: TokenDiscovery) -> Self {
        let token = Token::new(d.address, d.name, d.creator_address).with_symbol(d.symbol);
        match d.creation_time {
            Some(t) => token.with_creation_time(t),
            None => token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn pattern_interval_is_ordered() {
        let t0 = Utc::now();
        let p = DetectedPattern::new(PatternType::WhaleActivity, 1.7, t0, t0 - Duration::seconds(5), -1.0, "x");
        assert!(p.end_time >= p.start_time);
        assert_eq!(p.confidence, 1.0);
        assert_eq!(p.severity, 0.0);
    }

    #[test]
    fn enums_serialize_in_wire_casing() {
        assert_eq!(serde_json::to_string(&PatternType::PumpAndDump).unwrap(), "\"pump_and_dump\"");
        assert_eq!(serde_json::to_string(&TokenStatus::Suspicious).unwrap(), "\"suspicious\"");
        assert_eq!(serde_json::to_string(&TradingSignal::Wait).unwrap(), "\"wait\"");
    }

    #[test]
    fn transaction_reads_provider_json() {
        let raw = r#"{"address":"A1","type":"sell","amount":2.5,"timestamp":"2026-01-01T00:00:00Z"}"#;
        let tx: Transaction = serde_json::from_str(raw).unwrap();
        assert_eq!(tx.kind, TxKind::Sell);
        assert_eq!(tx.amount, 2.5);
    }

    #[test]
    fn spread_falls_back_to_price() {
        let mut p = PricePoint::new(Utc::now(), 1.0, 10.0);
        assert_eq!(p.spread(), 0.0);
        p.high = Some(1.2);
        p.low = Some(0.9);
        assert!((p.spread() - 0.3).abs() < 1e-12);
    }
}
