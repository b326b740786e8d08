use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{PricePoint, Token, TokenDiscovery, Transaction};

#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn transactions(&self, token: &Token) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Ascending by timestamp.
    async fn price_history(&self, token: &Token) -> Result<Vec<PricePoint>>;
}

#[async_trait]
pub trait SentimentSource: Send + Sync {
    /// A scalar in [-1, 1], or None when nothing is known about the token.
    async fn sentiment(&self, token: &Token) -> Result<Option<f64>>;
}

#[async_trait]
pub trait TokenFeed: Send + Sync {
    async fn new_tokens(&self) -> Result<Vec<TokenDiscovery>>;
}

/// Awaits `fut` for at most `limit`. Errors and timeouts become `fallback`.
pub async fn bounded<T, F>(what: &'static str, token: &str, limit: Duration, fallback: T, fut: F) -> T
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => v,
        Ok(Err(err)) => {
            warn!(source = what, token, error = %err, "sources.fetch_failed");
            fallback
        }
        Err(_) => {
            warn!(source = what, token, timeout_ms = limit.as_millis() as u64, "sources.fetch_timeout");
            fallback
        }
    }
}

/// JSON market-data provider:
/// `GET {base}/tokens/new`, `GET {base}/tokens/{address}/transactions`,
/// `GET {base}/tokens/{address}/candles`, `GET {base}/tokens/{address}/sentiment`.
#[derive(Clone)]
pub struct HttpMarketData {
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    score: Option<f64>,
}

impl HttpMarketData {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    fn token_url(&self, token: &Token, leaf: &str) -> String {
        format!("{}/tokens/{}/{leaf}", self.base_url, token.address)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl TransactionSource for HttpMarketData {
    async fn transactions(&self, token: &Token) -> Result<Vec<Transaction>> {
        self.get_json(self.token_url(token, "transactions")).await
    }
}

#[async_trait]
impl PriceSource for HttpMarketData {
    async fn price_history(&self, token: &Token) -> Result<Vec<PricePoint>> {
        let mut points: Vec<PricePoint> = self.get_json(self.token_url(token, "candles")).await?;
        // Providers are not trusted to sort; duplicates are left alone.
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

#[async_trait]
impl SentimentSource for HttpMarketData {
    async fn sentiment(&self, token: &Token) -> Result<Option<f64>> {
        let resp: SentimentResponse = self.get_json(self.token_url(token, "sentiment")).await?;
        Ok(resp.score)
    }
}

#[async_trait]
impl TokenFeed for HttpMarketData {
    async fn new_tokens(&self) -> Result<Vec<TokenDiscovery>> {
        self.get_json(format!("{}/tokens/new", self.base_url)).await
    }
}

/// Stands in for every source when no provider is configured, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    pub discoveries: Vec<TokenDiscovery>,
    pub transactions: Vec<Transaction>,
    pub price_history: Vec<PricePoint>,
    pub sentiment: Option<f64>,
}

#[async_trait]
impl TransactionSource for StaticMarketData {
    async fn transactions(&self, _token: &Token) -> Result<Vec<Transaction>> {
        Ok(self.transactions.clone())
    }
}

#[async_trait]
impl PriceSource for StaticMarketData {
    async fn price_history(&self, _token: &Token) -> Result<Vec<PricePoint>> {
        Ok(self.price_history.clone())
    }
}

#[async_trait]
impl SentimentSource for StaticMarketData {
    async fn sentiment(&self, _token: &Token) -> Result<Option<f64>> {
        Ok(self.sentiment)
    }
}

#[async_trait]
impl TokenFeed for StaticMarketData {
    async fn new_tokens(&self) -> Result<Vec<TokenDiscovery>> {
        Ok(self.discoveries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn bounded_passes_values_through() {
        let v = bounded("test", "t", Duration::from_secs(1), 0, async { Ok(7) }).await;
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn bounded_turns_errors_into_fallback() {
        let v: Vec<u8> = bounded("test", "t", Duration::from_secs(1), vec![], async { Err(anyhow!("down")) }).await;
        assert!(v.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_turns_timeouts_into_fallback() {
        let v = bounded("test", "t", Duration::from_millis(50), None, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Some(0.9))
        })
        .await;
        assert_eq!(v, None);
    }

    #[test]
    fn http_urls_are_normalised() {
        let api = HttpMarketData::new("https://data.example/".to_string());
        let token = Token::new("Mint1", "One", "Dev1");
        assert_eq!(api.token_url(&token, "candles"), "https://data.example/tokens/Mint1/candles");
    }
}
