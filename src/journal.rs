use anyhow::Result;
use std::{fs::OpenOptions, io::Write, path::Path};

use crate::domain::Token;
use crate::lifecycle::AnalysisOutcome;
use crate::time::now_stamp;

/// Appends one markdown entry per finished analysis.
pub fn append_analysis(journal_path: impl AsRef<Path>, tz: &str, token: &Token, outcome: &AnalysisOutcome) -> Result<()> {
    let stamp = now_stamp(tz)?;

    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(journal_path)?;

    writeln!(f, "## {} ({})\n", token.name, token.address)?;
    writeln!(f, "- Analysed at: {stamp}")?;
    writeln!(f, "- Creator: {}", token.creator_address)?;
    writeln!(f, "- Risk score: {:.1}", outcome.risk_score)?;
    writeln!(f, "- Signal / status: {:?} / {:?}", outcome.trading_signal, outcome.status)?;
    writeln!(
        f,
        "- Actors (sniper / bot / insider): {} / {} / {}",
        outcome.metrics.sniper_count, outcome.metrics.bot_buyer_count, outcome.metrics.insider_count
    )?;
    writeln!(f, "- Dev selling: {}", outcome.metrics.dev_selling)?;
    writeln!(f, "- Volume (first 5m): {:.2}", outcome.metrics.volume_5m)?;
    writeln!(
        f,
        "- Chart: natural={} confidence={:.2}",
        outcome.natural_chart, outcome.chart_confidence
    )?;
    writeln!(f, "- Sentiment: {:.2}\n", outcome.metrics.social_sentiment)?;

    if !outcome.patterns.is_empty() {
        writeln!(f, "### Patterns\n")?;
        for p in &outcome.patterns {
            writeln!(f, "- {:?} ({:.2}): {}", p.pattern_type, p.confidence, p.description)?;
        }
        writeln!(f)?;
    }
    writeln!(f, "---\n")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DetectedPattern, PatternType, TokenMetrics, TokenStatus, TradingSignal};
    use chrono::Utc;

    fn outcome(patterns: Vec<DetectedPattern>) -> AnalysisOutcome {
        AnalysisOutcome {
            risk_score: 75.0,
            trading_signal: TradingSignal::Sell,
            status: TokenStatus::Suspicious,
            metrics: TokenMetrics::default(),
            patterns,
            natural_chart: false,
            chart_confidence: 0.4,
            flagged_addresses: vec![],
        }
    }

    #[test]
    fn writes_one_entry_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.md");
        let token = Token::new("Mint1", "One", "Dev1");
        let t = Utc::now();
        let pump = DetectedPattern::new(PatternType::PumpAndDump, 0.8, t, t, 0.4, "40% drop after peak");

        append_analysis(&path, "UTC", &token, &outcome(vec![pump])).unwrap();
        append_analysis(&path, "UTC", &token, &outcome(vec![])).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.matches("## One (Mint1)").count(), 2);
        assert_eq!(raw.matches("### Patterns").count(), 1);
        assert!(raw.contains("- Risk score: 75.0"));
        assert!(raw.contains("PumpAndDump (0.80): 40% drop after peak"));
    }

    #[test]
    fn bad_timezone_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let token = Token::new("Mint1", "One", "Dev1");
        assert!(append_analysis(dir.path().join("a.md"), "Nowhere/Town", &token, &outcome(vec![])).is_err());
    }
}
