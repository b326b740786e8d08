use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::indicators::{
    argmax, argmin, coefficient_of_variation, diffs, linear_slope, mean, momentum, moving_average, pct_changes,
    std_dev,
};
use super::PatternDetector;
use crate::domain::{DetectedPattern, PatternType, PricePoint};
use crate::error::DetectorError;

const ACC_DIST_WINDOW: usize = 12;
const LIQUIDITY_WINDOW: usize = 5;
const MOMENTUM_PERIOD: usize = 20;
const DIVERGENCE_SPAN: usize = 5;

struct Columns {
    times: Vec<DateTime<Utc>>,
    prices: Vec<f64>,
    volumes: Vec<f64>,
}

/// Window start offsets. The final full window is never scanned.
fn window_starts(len: usize, window: usize) -> std::ops::Range<usize> {
    0..len.saturating_sub(window)
}

/// Splits the series and rejects values every detector would choke on.
fn columns(series: &[PricePoint]) -> Result<Columns, DetectorError> {
    for (i, p) in series.iter().enumerate() {
        if !p.price.is_finite() || !p.volume.is_finite() {
            return Err(DetectorError::NonFinite(i));
        }
        if p.price <= 0.0 {
            return Err(DetectorError::Degenerate("non-positive price"));
        }
    }
    Ok(Columns {
        times: series.iter().map(|p| p.timestamp).collect(),
        prices: series.iter().map(|p| p.price).collect(),
        volumes: series.iter().map(|p| p.volume).collect(),
    })
}

/// Rise then fall of more than `threshold` inside a sliding window.
#[derive(Debug, Clone)]
pub struct PumpAndDump {
    pub threshold: f64,
}

impl PatternDetector for PumpAndDump {
    fn name(&self) -> &'static str {
        "pump_and_dump"
    }

    fn detect(&self, series: &[PricePoint]) -> Result<Vec<DetectedPattern>, DetectorError> {
        let c = columns(series)?;
        let window = (c.prices.len() / 4).min(20);
        if window < 2 {
            return Err(DetectorError::InsufficientData { needed: 8, got: c.prices.len() });
        }

        let mut out = vec![];
        for i in window_starts(c.prices.len(), window) {
            let w = &c.prices[i..i + window];
            let (Some(hi), Some(lo)) = (argmax(w), argmin(w)) else {
                continue;
            };
            if hi >= lo {
                continue;
            }
            let drop = (w[hi] - w[lo]) / w[hi];
            if drop > self.threshold {
                out.push(DetectedPattern::new(
                    PatternType::PumpAndDump,
                    0.8,
                    c.times[i + hi],
                    c.times[i + lo],
                    drop,
                    format!("price fell {:.0}% from a local peak", drop * 100.0),
                ));
            }
        }
        Ok(out)
    }
}

/// Volume above `multiplier` times its 5-point trailing average. One pattern per run.
#[derive(Debug, Clone)]
pub struct UnusualVolume {
    pub multiplier: f64,
}

impl PatternDetector for UnusualVolume {
    fn name(&self) -> &'static str {
        "unusual_volume"
    }

    fn detect(&self, series: &[PricePoint]) -> Result<Vec<DetectedPattern>, DetectorError> {
        let c = columns(series)?;
        let averages = moving_average(&c.volumes, 5);

        let spikes: Vec<(usize, f64)> = averages
            .iter()
            .enumerate()
            .filter_map(|(j, avg)| {
                let i = j + 4;
                (c.volumes[i] > avg * self.multiplier).then(|| (i, c.volumes[i] / avg))
            })
            .collect();

        let (Some(first), Some(last)) = (spikes.first(), spikes.last()) else {
            return Ok(vec![]);
        };
        let peak = spikes.iter().map(|(_, r)| *r).fold(0.0, f64::max);
        Ok(vec![DetectedPattern::new(
            PatternType::UnusualVolume,
            0.7,
            c.times[first.0],
            c.times[last.0],
            peak,
            format!("{} volume spikes above {:.1}x the 5-point average", spikes.len(), self.multiplier),
        )])
    }
}

/// Too few distinct price steps: trades replaying the same moves.
#[derive(Debug, Clone, Default)]
pub struct RepeatedMoves;

impl PatternDetector for RepeatedMoves {
    fn name(&self) -> &'static str {
        "wash_trading_repeats"
    }

    fn detect(&self, series: &[PricePoint]) -> Result<Vec<DetectedPattern>, DetectorError> {
        if series.len() < 10 {
            return Err(DetectorError::InsufficientData { needed: 10, got: series.len() });
        }
        let c = columns(series)?;
        let moves = diffs(&c.prices);
        // +0.0 folds -0.0 into 0.0 so both count as the same move.
        let unique: HashSet<u64> = moves.iter().map(|d| (d + 0.0).to_bits()).collect();
        let unique_ratio = unique.len() as f64 / moves.len() as f64;
        if unique_ratio >= 0.3 {
            return Ok(vec![]);
        }
        Ok(vec![DetectedPattern::new(
            PatternType::WashTrading,
            0.7,
            c.times[0],
            c.times[c.times.len() - 1],
            1.0 - unique_ratio,
            format!("only {} distinct price moves across {} steps", unique.len(), moves.len()),
        )])
    }
}

/// Sideways price with rising volume.
#[derive(Debug, Clone, Default)]
pub struct Accumulation;

impl PatternDetector for Accumulation {
    fn name(&self) -> &'static str {
        "accumulation"
    }

    fn detect(&self, series: &[PricePoint]) -> Result<Vec<DetectedPattern>, DetectorError> {
        let c = columns(series)?;
        let mut out = vec![];
        for i in window_starts(c.prices.len(), ACC_DIST_WINDOW) {
            let (wp, wv) = (&c.prices[i..i + ACC_DIST_WINDOW], &c.volumes[i..i + ACC_DIST_WINDOW]);
            let (Some(volatility), Some(v_slope), Some(v_mean)) =
                (coefficient_of_variation(wp), linear_slope(wv), mean(wv))
            else {
                continue;
            };
            if volatility < 0.05 && v_slope > 0.0 && v_mean > 0.0 {
                out.push(DetectedPattern::new(
                    PatternType::Accumulation,
                    0.7,
                    c.times[i],
                    c.times[i + ACC_DIST_WINDOW - 1],
                    v_slope / v_mean,
                    "sideways price with increasing volume",
                ));
            }
        }
        Ok(out)
    }
}

/// Falling price with rising volume, weighted against the series' mean volume.
#[derive(Debug, Clone, Default)]
pub struct Distribution;

impl PatternDetector for Distribution {
    fn name(&self) -> &'static str {
        "distribution"
    }

    fn detect(&self, series: &[PricePoint]) -> Result<Vec<DetectedPattern>, DetectorError> {
        let c = columns(series)?;
        let mean_volume = mean(&c.volumes).unwrap_or(0.0);
        if mean_volume <= 0.0 {
            return Err(DetectorError::Degenerate("zero mean volume"));
        }

        let mut out = vec![];
        for i in window_starts(c.prices.len(), ACC_DIST_WINDOW) {
            let (wp, wv) = (&c.prices[i..i + ACC_DIST_WINDOW], &c.volumes[i..i + ACC_DIST_WINDOW]);
            let (Some(p_slope), Some(v_slope)) = (linear_slope(wp), linear_slope(wv)) else {
                continue;
            };
            if p_slope >= 0.0 || v_slope <= 0.0 {
                continue;
            }
            let strength = p_slope.abs() * v_slope;
            if strength > mean_volume * 0.1 {
                out.push(DetectedPattern::new(
                    PatternType::Distribution,
                    (strength / mean_volume).min(0.9),
                    c.times[i],
                    c.times[i + ACC_DIST_WINDOW - 1],
                    strength,
                    "declining price with increasing volume",
                ));
            }
        }
        Ok(out)
    }
}

/// Spread widening while volume dries up.
#[derive(Debug, Clone, Default)]
pub struct LiquidityManipulation;

impl PatternDetector for LiquidityManipulation {
    fn name(&self) -> &'static str {
        "liquidity_manipulation"
    }

    fn detect(&self, series: &[PricePoint]) -> Result<Vec<DetectedPattern>, DetectorError> {
        let c = columns(series)?;
        let spreads: Vec<f64> = series.iter().map(PricePoint::spread).collect();

        let mut out = vec![];
        for i in window_starts(spreads.len(), LIQUIDITY_WINDOW) {
            let last = i + LIQUIDITY_WINDOW - 1;
            let (s0, s1) = (spreads[i], spreads[last]);
            let (v0, v1) = (c.volumes[i], c.volumes[last]);
            if s0 < 0.0 || v0 <= 0.0 {
                continue;
            }
            // A spread opening from zero is an unbounded increase; its severity is the new spread.
            let (spread_increase, severity) = if s0 > 0.0 {
                let rel = (s1 - s0) / s0;
                (rel, rel)
            } else if s1 > 0.0 {
                (f64::INFINITY, s1)
            } else {
                continue;
            };
            let volume_change = (v1 - v0) / v0;
            if spread_increase > 0.3 && volume_change < -0.3 {
                out.push(DetectedPattern::new(
                    PatternType::LiquidityManipulation,
                    0.7,
                    c.times[i],
                    c.times[last],
                    severity,
                    "spread widening on declining volume",
                ));
            }
        }
        Ok(out)
    }
}

/// Price and 20-step momentum moving in opposite directions, beyond 2 sigma of momentum change.
#[derive(Debug, Clone, Default)]
pub struct MomentumDivergence;

impl PatternDetector for MomentumDivergence {
    fn name(&self) -> &'static str {
        "momentum_divergence"
    }

    fn detect(&self, series: &[PricePoint]) -> Result<Vec<DetectedPattern>, DetectorError> {
        let c = columns(series)?;
        if c.prices.len() <= MOMENTUM_PERIOD + 1 {
            return Ok(vec![]);
        }
        let m = momentum(&c.prices, MOMENTUM_PERIOD);
        let price_changes = pct_changes(&c.prices);
        let momentum_changes = diffs(&m);
        let sigma = std_dev(&momentum_changes).unwrap_or(0.0);

        let mut out = vec![];
        for i in 0..momentum_changes.len().saturating_sub(DIVERGENCE_SPAN) {
            let (pc, mc) = (price_changes[i], momentum_changes[i]);
            if mc.abs() <= sigma * 2.0 {
                continue;
            }
            let (kind, description) = if pc > 0.0 && mc < 0.0 {
                (PatternType::BearishDivergence, "price rising while momentum declines")
            } else if pc < 0.0 && mc > 0.0 {
                (PatternType::BullishDivergence, "price falling while momentum improves")
            } else {
                continue;
            };
            out.push(DetectedPattern::new(
                kind,
                0.8,
                c.times[i],
                c.times[i + DIVERGENCE_SPAN],
                mc.abs(),
                description,
            ));
        }
        Ok(out)
    }
}

/// Single points with volume beyond mean + 3 sigma; severity is the price impact.
#[derive(Debug, Clone, Default)]
pub struct WhaleActivity;

impl PatternDetector for WhaleActivity {
    fn name(&self) -> &'static str {
        "whale_activity"
    }

    fn detect(&self, series: &[PricePoint]) -> Result<Vec<DetectedPattern>, DetectorError> {
        let c = columns(series)?;
        let (Some(mean_volume), Some(sigma)) = (mean(&c.volumes), std_dev(&c.volumes)) else {
            return Ok(vec![]);
        };
        let threshold = mean_volume + sigma * 3.0;

        let mut out = vec![];
        for i in 1..c.volumes.len() {
            let v = c.volumes[i];
            if v <= threshold {
                continue;
            }
            let impact = (c.prices[i] - c.prices[i - 1]).abs() / c.prices[i - 1];
            out.push(DetectedPattern::new(
                PatternType::WhaleActivity,
                (v / threshold).min(0.95),
                c.times[i],
                c.times[i],
                impact,
                format!("whale activity at {:.1}x average volume", v / mean_volume),
            ));
        }
        Ok(out)
    }
}
