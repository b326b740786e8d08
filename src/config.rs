use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Thresholds used by the actor classifier and chart detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionParams {
    pub sniper_window_secs: i64,
    pub insider_exit_secs: i64,
    pub bot_tx_per_minute: f64,
    pub early_volume_window_secs: i64,

    pub min_chart_points: usize,
    pub pump_dump_threshold: f64,  // 0.3 => 30% drop from peak
    pub volume_spike_multiplier: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            sniper_window_secs: 120,
            insider_exit_secs: 300,
            bot_tx_per_minute: 10.0,
            early_volume_window_secs: 300,
            min_chart_points: 10,
            pump_dump_threshold: 0.3,
            volume_spike_multiplier: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Collaborators
    pub data_api_url: Option<String>,
    pub webhook_url: Option<String>,
    pub known_bots_path: Option<String>,

    // Runtime
    pub fetch_timeout_ms: u64,
    pub poll_interval_secs: u64,
    pub max_concurrent: usize,
    pub fast_clustering: bool,
    pub log_json: bool,
    pub tz: String,

    // Scoring
    pub risk_threshold: f64,
    pub detection: DetectionParams,

    // Persistence
    pub state_path: String,
    pub heartbeat_log_path: String,
    pub journal_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_api_url: None,
            webhook_url: None,
            known_bots_path: None,
            fetch_timeout_ms: 5_000,
            poll_interval_secs: 30,
            max_concurrent: 8,
            fast_clustering: true,
            log_json: false,
            tz: "UTC".to_string(),
            risk_threshold: 70.0,
            detection: DetectionParams::default(),
            state_path: "./tokens.json".to_string(),
            heartbeat_log_path: "./heartbeat.log".to_string(),
            journal_path: "./analysis.md".to_string(),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|s| s.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "y" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "n" || v == "off" => false,
        Some(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|x| x.trim().parse().ok())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl DetectionParams {
    fn from_env() -> Self {
        let d = Self::default();
        Self {
            sniper_window_secs: env_parse("SENTINEL_SNIPER_WINDOW_SECS").unwrap_or(d.sniper_window_secs),
            insider_exit_secs: env_parse("SENTINEL_INSIDER_EXIT_SECS").unwrap_or(d.insider_exit_secs),
            bot_tx_per_minute: env_parse("SENTINEL_BOT_TX_PER_MINUTE").unwrap_or(d.bot_tx_per_minute),
            early_volume_window_secs: env_parse("SENTINEL_EARLY_VOLUME_WINDOW_SECS")
                .unwrap_or(d.early_volume_window_secs),
            min_chart_points: env_parse("SENTINEL_MIN_CHART_POINTS").unwrap_or(d.min_chart_points),
            pump_dump_threshold: env_parse("SENTINEL_PUMP_DUMP_THRESHOLD").unwrap_or(d.pump_dump_threshold),
            volume_spike_multiplier: env_parse("SENTINEL_VOLUME_SPIKE_MULTIPLIER")
                .unwrap_or(d.volume_spike_multiplier),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sniper_window_secs < 0 || self.insider_exit_secs < 0 || self.early_volume_window_secs < 0 {
            return Err(anyhow!("detection windows cannot be negative"));
        }
        if self.bot_tx_per_minute <= 0.0 {
            return Err(anyhow!("SENTINEL_BOT_TX_PER_MINUTE must be positive"));
        }
        // Every windowed detector needs a handful of points to say anything.
        if self.min_chart_points < 5 {
            return Err(anyhow!("SENTINEL_MIN_CHART_POINTS must be at least 5"));
        }
        if !(0.0..1.0).contains(&self.pump_dump_threshold) {
            return Err(anyhow!("SENTINEL_PUMP_DUMP_THRESHOLD must lie in [0, 1)"));
        }
        if self.volume_spike_multiplier <= 1.0 {
            return Err(anyhow!("SENTINEL_VOLUME_SPIKE_MULTIPLIER must exceed 1.0"));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();

        // Collaborators
        let data_api_url = env_opt("SENTINEL_DATA_API_URL");
        let webhook_url = env_opt("SENTINEL_WEBHOOK_URL");
        let known_bots_path = env_opt("SENTINEL_KNOWN_BOTS_PATH");

        // Runtime
        let fetch_timeout_ms = env_parse::<u64>("SENTINEL_FETCH_TIMEOUT_MS").unwrap_or(d.fetch_timeout_ms);
        if fetch_timeout_ms == 0 {
            return Err(anyhow!("SENTINEL_FETCH_TIMEOUT_MS must be positive"));
        }
        let poll_interval_secs = env_parse::<u64>("SENTINEL_POLL_INTERVAL_SECS").unwrap_or(d.poll_interval_secs);
        let max_concurrent = env_parse::<usize>("SENTINEL_MAX_CONCURRENT").unwrap_or(d.max_concurrent).max(1);
        let fast_clustering = env_bool("SENTINEL_FAST_CLUSTERING", d.fast_clustering);
        let log_json = env_bool("SENTINEL_LOG_JSON", d.log_json);
        let tz = std::env::var("SENTINEL_TZ").unwrap_or(d.tz);
        crate::time::parse_tz(&tz)?;

        // Scoring
        let risk_threshold = env_parse::<f64>("SENTINEL_RISK_THRESHOLD").unwrap_or(d.risk_threshold);
        if !(0.0..=100.0).contains(&risk_threshold) {
            return Err(anyhow!("SENTINEL_RISK_THRESHOLD must lie in [0, 100]"));
        }
        let detection = DetectionParams::from_env();
        detection.validate()?;

        let state_path = std::env::var("SENTINEL_STATE_PATH").unwrap_or(d.state_path);
        let heartbeat_log_path = std::env::var("SENTINEL_HEARTBEAT_LOG").unwrap_or(d.heartbeat_log_path);
        let journal_path = std::env::var("SENTINEL_JOURNAL_PATH").unwrap_or(d.journal_path);

        Ok(Self {
            data_api_url,
            webhook_url,
            known_bots_path,
            fetch_timeout_ms,
            poll_interval_secs,
            max_concurrent,
            fast_clustering,
            log_json,
            tz,
            risk_threshold,
            detection,
            state_path,
            heartbeat_log_path,
            journal_path,
        })
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_detection_params_are_valid() {
        assert!(DetectionParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_detection_params() {
        let mut p = DetectionParams::default();
        p.volume_spike_multiplier = 1.0;
        assert!(p.validate().is_err());

        let mut p = DetectionParams::default();
        p.min_chart_points = 2;
        assert!(p.validate().is_err());

        let mut p = DetectionParams::default();
        p.pump_dump_threshold = 1.5;
        assert!(p.validate().is_err());
    }

    #[test]
    fn default_config_matches_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.risk_threshold, 70.0);
        assert_eq!(cfg.fetch_timeout(), std::time::Duration::from_secs(5));
        assert!(cfg.fast_clustering);
    }
}
