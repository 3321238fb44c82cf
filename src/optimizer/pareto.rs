//! Multi-objective trade-off sweep.
//!
//! Re-runs the sectoral allocation across a grid of sustainability weights
//! and records one (supply ratio, sustainability score) sample per weight.
//! Every sampled point is retained; `pareto_front` applies the
//! non-dominance filter, and only its output should be called a front.

use anyhow::Result;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::domain::DemandBatch;
use crate::optimizer::sectoral::SectoralAllocator;
use crate::optimizer::types::AllocationStrategy;

#[derive(Debug, Clone, Copy)]
pub struct WeightSweep {
    /// Number of evenly spaced sustainability weights in `[0, 1]`.
    pub points: usize,
}

impl Default for WeightSweep {
    fn default() -> Self {
        Self { points: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeOffPoint {
    pub sustainability_weight: f64,
    /// Mean per-node supply ratio at this weight.
    pub supply_ratio: f64,
    /// `1 - mean(projected level / safe threshold)`; higher means more of
    /// the safety margin is preserved.
    pub sustainability_score: f64,
}

impl TradeOffPoint {
    fn dominated_by(&self, other: &TradeOffPoint) -> bool {
        other.supply_ratio >= self.supply_ratio
            && other.sustainability_score >= self.sustainability_score
            && (other.supply_ratio > self.supply_ratio
                || other.sustainability_score > self.sustainability_score)
    }
}

impl WeightSweep {
    /// Sample the trade-off curve. Weights of failed runs are skipped.
    pub fn sweep(&self, batch: &DemandBatch, config: &RunConfig) -> Result<Vec<TradeOffPoint>> {
        let allocator = SectoralAllocator::default();
        let mut samples = Vec::with_capacity(self.points);
        for k in 0..self.points {
            let weight = if self.points > 1 {
                k as f64 / (self.points - 1) as f64
            } else {
                0.0
            };
            let mut point_config = config.clone();
            point_config.sustainability_weight = weight;

            let run = allocator.allocate(batch, &point_config)?;
            if run.summary.status.is_failure() {
                warn!(weight, status = %run.summary.status, "sweep point skipped");
                continue;
            }

            let n = run.results.len() as f64;
            let supply_ratio = run.results.iter().map(|r| r.supply_ratio).sum::<f64>() / n;
            let margin_used = batch
                .nodes()
                .iter()
                .zip(&run.results)
                .map(|(node, r)| r.projected_groundwater_level_m / node.safe_threshold_m)
                .sum::<f64>()
                / n;
            samples.push(TradeOffPoint {
                sustainability_weight: weight,
                supply_ratio,
                sustainability_score: 1.0 - margin_used,
            });
        }
        info!(
            points = samples.len(),
            requested = self.points,
            "trade-off sweep complete"
        );
        Ok(samples)
    }

    /// Non-dominated subset of `points` (both axes maximized), sorted by
    /// descending supply ratio.
    pub fn pareto_front(points: &[TradeOffPoint]) -> Vec<TradeOffPoint> {
        let mut front: Vec<TradeOffPoint> = points
            .iter()
            .filter(|p| !points.iter().any(|q| p.dominated_by(q)))
            .copied()
            .collect();
        front.sort_by_key(|p| std::cmp::Reverse(OrderedFloat(p.supply_ratio)));
        front.dedup();
        front
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::test_node;

    fn point(supply: f64, sustain: f64) -> TradeOffPoint {
        TradeOffPoint {
            sustainability_weight: 0.5,
            supply_ratio: supply,
            sustainability_score: sustain,
        }
    }

    #[test]
    fn front_drops_dominated_points() {
        let points = vec![point(0.9, 0.5), point(0.8, 0.4), point(0.6, 0.7)];
        let front = WeightSweep::pareto_front(&points);
        assert_eq!(front.len(), 2);
        assert!((front[0].supply_ratio - 0.9).abs() < 1e-12);
        assert!((front[1].supply_ratio - 0.6).abs() < 1e-12);
    }

    #[test]
    fn front_keeps_all_incomparable_points() {
        let points = vec![point(0.9, 0.1), point(0.7, 0.5), point(0.5, 0.9)];
        assert_eq!(WeightSweep::pareto_front(&points).len(), 3);
    }

    #[test]
    fn sweep_covers_the_weight_grid() {
        let batch = DemandBatch::new(vec![test_node()]).unwrap();
        let samples = WeightSweep::default()
            .sweep(&batch, &RunConfig::default())
            .unwrap();
        assert_eq!(samples.len(), 10);
        assert!(samples[0].sustainability_weight.abs() < 1e-12);
        assert!((samples[9].sustainability_weight - 1.0).abs() < 1e-12);
        for s in &samples {
            assert!((0.0..=1.0 + 1e-9).contains(&s.supply_ratio), "{s:?}");
        }
    }

    #[test]
    fn heavier_weight_never_increases_extraction() {
        let mut node = test_node();
        node.available_surface_m3 = 2_000.0; // force reliance on the aquifer
        let batch = DemandBatch::new(vec![node]).unwrap();
        let samples = WeightSweep::default()
            .sweep(&batch, &RunConfig::default())
            .unwrap();
        for pair in samples.windows(2) {
            assert!(
                pair[1].supply_ratio <= pair[0].supply_ratio + 1e-9,
                "{pair:?}"
            );
        }
    }
}
