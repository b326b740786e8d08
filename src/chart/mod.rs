//! Price/volume pattern detection and the naturalness score.

pub mod cluster;
pub mod detectors;
pub mod indicators;

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DetectionParams;
use crate::domain::{DetectedPattern, PatternType, PricePoint, Transaction};
use crate::error::DetectorError;

use self::cluster::{members, select_backend};
use self::detectors::{
    Accumulation, Distribution, LiquidityManipulation, MomentumDivergence, PumpAndDump, RepeatedMoves,
    UnusualVolume, WhaleActivity,
};
use self::indicators::{coefficient_of_variation, pct_changes, std_dev};

/// A named detector over a read-only price/volume series.
pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, series: &[PricePoint]) -> Result<Vec<DetectedPattern>, DetectorError>;
}

#[derive(Default)]
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard(params: &DetectionParams) -> Self {
        let mut registry = Self::new();
        registry
            .register(PumpAndDump { threshold: params.pump_dump_threshold })
            .register(UnusualVolume { multiplier: params.volume_spike_multiplier })
            .register(RepeatedMoves)
            .register(Accumulation)
            .register(Distribution)
            .register(LiquidityManipulation)
            .register(MomentumDivergence)
            .register(WhaleActivity);
        registry
    }

    pub fn register(&mut self, detector: impl PatternDetector + 'static) -> &mut Self {
        self.detectors.push(Box::new(detector));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartReport {
    pub natural_chart: bool,
    /// The naturalness score; 0.5 when there was not enough data to judge.
    pub confidence: f64,
    pub patterns: Vec<DetectedPattern>,
}

impl ChartReport {
    pub fn insufficient() -> Self {
        Self { natural_chart: true, confidence: 0.5, patterns: vec![] }
    }
}

pub struct ChartDetector {
    min_points: usize,
    registry: DetectorRegistry,
}

impl ChartDetector {
    pub fn new(params: &DetectionParams) -> Self {
        Self::with_registry(params.min_chart_points, DetectorRegistry::standard(params))
    }

    pub fn with_registry(min_points: usize, registry: DetectorRegistry) -> Self {
        Self { min_points, registry }
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    /// Runs every registered detector in registration order. A detector that
    /// errors or panics is logged and contributes nothing.
    pub fn analyze(&self, series: &[PricePoint]) -> ChartReport {
        if series.len() < self.min_points {
            return ChartReport::insufficient();
        }

        let mut patterns = vec![];
        for d in &self.registry.detectors {
            let name = d.name();
            match panic::catch_unwind(AssertUnwindSafe(|| d.detect(series))) {
                Ok(Ok(found)) => {
                    debug!(detector = name, hits = found.len(), "chart.detector");
                    patterns.extend(found);
                }
                Ok(Err(err)) => warn!(detector = name, %err, "chart.detector_failed"),
                Err(_) => warn!(detector = name, "chart.detector_panicked"),
            }
        }

        let score = naturalness(patterns.len(), series);
        ChartReport { natural_chart: score > 0.7, confidence: score, patterns }
    }
}

/// 1.0 minus 0.1 per pattern, 0.2 for any >50% single-step move, 0.1 for volume CV above 2.
pub fn naturalness(pattern_count: usize, series: &[PricePoint]) -> f64 {
    let prices: Vec<f64> = series.iter().map(|p| p.price).collect();
    let volumes: Vec<f64> = series.iter().map(|p| p.volume).collect();

    let mut score = 1.0 - pattern_count as f64 * 0.1;
    if pct_changes(&prices).iter().any(|c| c.abs() > 0.5) {
        score -= 0.2;
    }
    if coefficient_of_variation(&volumes).is_some_and(|cv| cv > 2.0) {
        score -= 0.1;
    }
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

/// Wash trading from per-trade sizes: dense clusters of near-identical amounts.
#[derive(Debug, Clone)]
pub struct ClusterWashDetector {
    pub fast_clustering: bool,
    pub eps_factor: f64,
    pub min_samples: usize,
    pub min_cluster: usize,
}

impl ClusterWashDetector {
    pub fn new(fast_clustering: bool) -> Self {
        Self { fast_clustering, eps_factor: 0.1, min_samples: 5, min_cluster: 10 }
    }

    pub fn detect(&self, trades: &[Transaction]) -> Vec<DetectedPattern> {
        if trades.len() <= self.min_cluster {
            return vec![];
        }
        let amounts: Vec<f64> = trades.iter().map(|t| t.amount).collect();
        let eps = std_dev(&amounts).unwrap_or(0.0) * self.eps_factor;
        let backend = select_backend(&amounts, self.fast_clustering);
        let labels = backend.cluster(&amounts, eps, self.min_samples);
        debug!(backend = backend.name(), trades = trades.len(), eps, "chart.cluster");

        members(&labels)
            .into_iter()
            .filter(|group| group.len() > self.min_cluster)
            .filter_map(|group| {
                let start = group.iter().map(|&i| trades[i].timestamp).min()?;
                let end = group.iter().map(|&i| trades[i].timestamp).max()?;
                Some(DetectedPattern::new(
                    PatternType::WashTrading,
                    0.9,
                    start,
                    end,
                    group.len() as f64 / trades.len() as f64,
                    format!("{} similar-sized trades", group.len()),
                ))
            })
            .collect()
    }
}
