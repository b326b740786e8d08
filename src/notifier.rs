use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{DetectedPattern, PatternType, Token, TokenMetrics, TokenStatus, TradingSignal};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Notification {
    TokenUpdate(TokenUpdate),
    PatternAlert(PatternAlert),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenUpdate {
    pub address: String,
    pub name: String,
    pub risk_score: f64,
    pub trading_signal: TradingSignal,
    pub status: TokenStatus,
    pub metrics: TokenMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternAlert {
    pub token_address: String,
    pub pattern: PatternSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternSummary {
    #[serde(rename = "type")]
    pub kind: PatternType,
    pub confidence: f64,
    pub description: String,
}

impl Notification {
    pub fn token_update(token: &Token) -> Self {
        Self::TokenUpdate(TokenUpdate {
            address: token.address.clone(),
            name: token.name.clone(),
            risk_score: token.risk_score,
            trading_signal: token.trading_signal,
            status: token.status,
            metrics: token.metrics.clone(),
        })
    }

    pub fn pattern_alert(token_address: &str, pattern: &DetectedPattern) -> Self {
        Self::PatternAlert(PatternAlert {
            token_address: token_address.to_string(),
            pattern: PatternSummary {
                kind: pattern.pattern_type,
                confidence: pattern.confidence,
                description: pattern.description.clone(),
            },
        })
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// POSTs each notification as JSON. Without a URL it does nothing.
#[derive(Clone)]
pub struct WebhookNotifier {
    webhook_url: Option<String>,
    http: Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self { webhook_url, http: Client::new() }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let Some(url) = self.webhook_url.as_deref() else {
            // In dev/test we allow a missing webhook.
            return Ok(());
        };

        let resp = self.http.post(url).json(notification).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("notification webhook failed: {}", resp.status()));
        }
        Ok(())
    }
}

/// In-process fan-out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        match self.tx.send(notification.clone()) {
            Ok(subscribers) => {
                debug!(subscribers, "notifier.broadcast");
                Ok(())
            }
            // Nobody listening is not a failure.
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn token_update_wire_shape() {
        let token = Token::new("Mint1", "One", "Dev1");
        let value = serde_json::to_value(Notification::token_update(&token)).unwrap();
        assert_eq!(value["type"], "token_update");
        assert_eq!(value["data"]["address"], "Mint1");
        assert_eq!(value["data"]["status"], "new");
        assert_eq!(value["data"]["trading_signal"], "wait");
        assert_eq!(value["data"]["metrics"]["natural_chart"], true);
    }

    #[test]
    fn pattern_alert_wire_shape() {
        let t = Utc::now();
        let p = DetectedPattern::new(PatternType::WashTrading, 0.9, t, t, 0.5, "12 similar-sized trades");
        let value = serde_json::to_value(Notification::pattern_alert("Mint1", &p)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "pattern_alert",
                "data": {
                    "token_address": "Mint1",
                    "pattern": {"type": "wash_trading", "confidence": 0.9, "description": "12 similar-sized trades"}
                }
            })
        );
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let bus = BroadcastNotifier::new(8);
        let mut rx = bus.subscribe();
        let token = Token::new("Mint1", "One", "Dev1");
        bus.send(&Notification::token_update(&token)).await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), Notification::TokenUpdate(u) if u.address == "Mint1"));
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_ok() {
        let bus = BroadcastNotifier::new(8);
        let token = Token::new("Mint1", "One", "Dev1");
        assert!(bus.send(&Notification::token_update(&token)).await.is_ok());
    }

    #[tokio::test]
    async fn webhook_without_url_is_noop() {
        let token = Token::new("Mint1", "One", "Dev1");
        assert!(WebhookNotifier::new(None).send(&Notification::token_update(&token)).await.is_ok());
    }
}
