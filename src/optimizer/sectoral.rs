//! Sectoral dynamic allocation strategy.
//!
//! Nodes sharing one (location, date) pair describe sector demands drawing
//! on a single supply pool: the location's surface availability plus one
//! joint groundwater extraction decision. Hydrology fields are per location
//! and repeated across its sector rows; the first row is authoritative.
//!
//! Per scenario, two stages:
//!
//! 1. A scalar grid search picks the joint extraction volume, trading
//!    supply coverage against a sustainability penalty (projected drop
//!    below the safe threshold plus recharge strain). Extraction beyond
//!    the safety bound carries a large additive penalty, waived only when
//!    drought and a tier-1 sector coincide. Drought or tier-1 presence
//!    inflates the nominal extraction limit by the emergency multiplier.
//! 2. The pool is split across sectors. Surplus is the trivial case; under
//!    scarcity a small constrained program minimizes priority-weighted
//!    shortfall (multiplier 3 for tier-1 sectors), seeded from a
//!    demand-proportional guess. If it fails to converge, a strict
//!    priority-order fill takes over and the scenario is tagged
//!    `DegradedFallback` rather than silently swapped.
//!
//! One scenario failing never aborts the batch; each result carries its
//! own status.

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::domain::{AllocationResult, AllocationRun, DemandBatch, DemandNode, SolverStatus};
use crate::optimizer::nlp::{NlpConstraint, NlpProblem, NlpSolver, NlpStatus};
use crate::optimizer::types::{node_result, AllocationStrategy};
use crate::safety;

/// Shortfall weight for tier-1 sectors in the scarcity split.
const TIER1_MULTIPLIER: f64 = 3.0;
/// Coarse grid resolution for the extraction search.
const GRID_STEPS: usize = 200;

#[derive(Debug, Clone, Copy, Default)]
pub struct SectoralAllocator {
    pub solver: NlpSolver,
}

struct ScenarioOutcome {
    /// Total volume per sector member, scenario order.
    allocations: Vec<f64>,
    extraction_m3: f64,
    supply_m3: f64,
    status: SolverStatus,
    iterations: usize,
}

impl SectoralAllocator {
    fn solve_scenario(&self, scenario: &[&DemandNode], config: &RunConfig) -> ScenarioOutcome {
        let head = scenario[0];
        let demands: Vec<f64> = scenario.iter().map(|n| n.demand_m3).collect();
        let demand_total: f64 = demands.iter().sum();
        let surface = head.available_surface_m3;

        let is_drought = scenario.iter().any(|n| n.is_drought);
        let has_tier1 = scenario.iter().any(|n| n.priority_tier == 1);
        let emergency = is_drought || has_tier1;
        let effective_limit = if emergency {
            head.extraction_limit_m3 * config.emergency_threshold
        } else {
            head.extraction_limit_m3
        };
        let safe_bound = safety::safe_extraction_limit(
            effective_limit,
            head.groundwater_level_m,
            head.critical_threshold_m,
            head.safe_threshold_m,
            config.safety_buffer,
        );
        let waive_safety = is_drought && has_tier1;

        let cost = |e: f64| -> f64 {
            let supply_score = if demand_total > 0.0 {
                (surface + e).min(demand_total) / demand_total
            } else {
                1.0
            };
            let level_after = head.groundwater_level_m - e / config.drawdown_m3_per_m;
            let deficit_m = (head.safe_threshold_m - level_after).max(0.0);
            let strain = e / head.recharge_rate_m3_per_day.max(1.0);
            let mut c = -supply_score
                + config.sustainability_weight * (deficit_m * deficit_m * 100.0 + strain);
            if !waive_safety {
                c += 1000.0 * (e - safe_bound).max(0.0);
            }
            c
        };

        // Coarse grid over [0, effective_limit], then one refinement pass
        // around the best coarse point. Ties resolve to the lower volume.
        let mut best_e = 0.0;
        let mut best_c = cost(0.0);
        if effective_limit > 0.0 {
            for s in 0..=GRID_STEPS {
                let e = effective_limit * s as f64 / GRID_STEPS as f64;
                let c = cost(e);
                if c < best_c - 1e-12 {
                    best_c = c;
                    best_e = e;
                }
            }
            let window = effective_limit / GRID_STEPS as f64;
            let lo = (best_e - window).max(0.0);
            let hi = (best_e + window).min(effective_limit);
            for s in 0..=40 {
                let e = lo + (hi - lo) * s as f64 / 40.0;
                let c = cost(e);
                if c < best_c - 1e-12 {
                    best_c = c;
                    best_e = e;
                }
            }
        }

        let supply = surface + best_e;
        let n = scenario.len();

        if supply + 1e-9 >= demand_total {
            return ScenarioOutcome {
                allocations: demands,
                extraction_m3: best_e,
                supply_m3: supply,
                status: SolverStatus::Optimal,
                iterations: 0,
            };
        }
        if supply <= 0.0 {
            return ScenarioOutcome {
                allocations: vec![0.0; n],
                extraction_m3: best_e,
                supply_m3: supply,
                status: SolverStatus::Optimal,
                iterations: 0,
            };
        }

        let multipliers: Vec<f64> = scenario
            .iter()
            .map(|node| {
                if node.priority_tier == 1 {
                    TIER1_MULTIPLIER
                } else {
                    1.0
                }
            })
            .collect();

        let objective_demands = demands.clone();
        let objective_multipliers = multipliers.clone();
        let problem = NlpProblem {
            objective: Box::new(move |x: &[f64]| {
                x.iter()
                    .zip(&objective_demands)
                    .zip(&objective_multipliers)
                    .map(|((a, d), m)| (d - a) * m)
                    .sum()
            }),
            constraints: vec![NlpConstraint::ineq(move |x: &[f64]| {
                supply - x.iter().sum::<f64>()
            })],
            lower: vec![0.0; n],
            upper: demands.clone(),
        };
        let seed: Vec<f64> = demands.iter().map(|d| d * supply / demand_total).collect();

        let solution = self.solver.solve(&problem, &seed);
        let (mut allocations, status, iterations) = match solution.status {
            NlpStatus::Converged => (solution.x, SolverStatus::Optimal, solution.iterations),
            NlpStatus::Failed => {
                // Strict priority-order fill, deterministic and always
                // available. Stable sort keeps input order within a tier.
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by_key(|&k| scenario[k].priority_tier);
                let mut remaining = supply;
                let mut a = vec![0.0; n];
                for k in order {
                    let take = remaining.min(demands[k]);
                    a[k] = take;
                    remaining -= take;
                }
                (a, SolverStatus::DegradedFallback, solution.iterations)
            }
        };

        for (a, d) in allocations.iter_mut().zip(&demands) {
            *a = a.clamp(0.0, *d);
        }
        let allocated: f64 = allocations.iter().sum();
        if allocated > supply && allocated > 0.0 {
            let scale = supply / allocated;
            for a in &mut allocations {
                *a *= scale;
            }
        }

        ScenarioOutcome {
            allocations,
            extraction_m3: best_e,
            supply_m3: supply,
            status,
            iterations,
        }
    }
}

impl AllocationStrategy for SectoralAllocator {
    fn name(&self) -> &'static str {
        "sectoral"
    }

    fn allocate(&self, batch: &DemandBatch, config: &RunConfig) -> Result<AllocationRun> {
        let started = Instant::now();
        let nodes = batch.nodes();

        let mut groups: BTreeMap<(String, NaiveDate), Vec<usize>> = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            groups
                .entry((node.location_id.clone(), node.date))
                .or_default()
                .push(i);
        }

        // Results land back in input order regardless of grouping.
        let mut slots: Vec<Option<AllocationResult>> = (0..nodes.len()).map(|_| None).collect();
        let mut iterations = 0usize;
        for ((location, date), members) in &groups {
            let scenario: Vec<&DemandNode> = members.iter().map(|&i| &nodes[i]).collect();
            let outcome = self.solve_scenario(&scenario, config);
            iterations += outcome.iterations;
            debug!(
                %location,
                %date,
                sectors = scenario.len(),
                extraction_m3 = outcome.extraction_m3,
                supply_m3 = outcome.supply_m3,
                status = %outcome.status,
                "scenario solved"
            );

            let surface_share = if outcome.supply_m3 > 0.0 {
                scenario[0].available_surface_m3 / outcome.supply_m3
            } else {
                0.0
            };
            let groundwater_share = if outcome.supply_m3 > 0.0 {
                outcome.extraction_m3 / outcome.supply_m3
            } else {
                0.0
            };
            for (k, &i) in members.iter().enumerate() {
                let total = outcome.allocations[k];
                slots[i] = Some(node_result(
                    &nodes[i],
                    total * surface_share,
                    total * groundwater_share,
                    outcome.status,
                    config,
                ));
            }
        }

        let results: Vec<AllocationResult> = slots.into_iter().flatten().collect();
        let objective_value = results.iter().map(|r| r.objective.net_benefit()).sum();
        let run = AllocationRun::from_results(
            self.name(),
            results,
            objective_value,
            iterations,
            started.elapsed().as_millis() as u64,
        );
        info!(
            run_id = %run.summary.run_id,
            status = %run.summary.status,
            scenarios = groups.len(),
            nodes = nodes.len(),
            fulfillment_pct = run.summary.overall_fulfillment_rate_pct,
            "sectoral allocation complete"
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::test_node;
    use crate::domain::Sector;

    fn scenario_node(sector: Sector, tier: u8, demand: f64) -> DemandNode {
        let mut node = test_node();
        node.sector = sector;
        node.priority_tier = tier;
        node.demand_m3 = demand;
        node
    }

    #[test]
    fn surplus_fills_every_sector() {
        let mut a = scenario_node(Sector::Municipal, 1, 2_000.0);
        let mut b = scenario_node(Sector::Agricultural, 3, 3_000.0);
        a.available_surface_m3 = 6_000.0;
        b.available_surface_m3 = 6_000.0;
        let batch = DemandBatch::new(vec![a, b]).unwrap();
        let run = SectoralAllocator::default()
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        assert_eq!(run.summary.status, SolverStatus::Optimal);
        for r in &run.results {
            assert!((r.fulfillment_rate_pct - 100.0).abs() < 1e-6, "{r:?}");
        }
    }

    #[test]
    fn scarcity_serves_tier_one_first() {
        // Shared pool of 500 (groundwater shut off below critical) against
        // sector demands of 400 + 400.
        let mut a = scenario_node(Sector::Municipal, 1, 400.0);
        let mut b = scenario_node(Sector::Agricultural, 3, 400.0);
        for node in [&mut a, &mut b] {
            node.available_surface_m3 = 500.0;
            node.groundwater_level_m = 29.0; // below critical 30
        }
        let batch = DemandBatch::new(vec![a, b]).unwrap();
        let run = SectoralAllocator::default()
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        assert!(!run.summary.status.is_failure());
        let municipal = &run.results[0];
        let agricultural = &run.results[1];
        assert!(
            municipal.total_allocated_m3 > 395.0,
            "tier-1 got {}",
            municipal.total_allocated_m3
        );
        assert!(
            (agricultural.total_allocated_m3 - 100.0).abs() < 5.0,
            "tier-3 got {}",
            agricultural.total_allocated_m3
        );
        let pool: f64 = run.results.iter().map(|r| r.total_allocated_m3).sum();
        assert!(pool <= 500.0 + 1e-6);
    }

    #[test]
    fn drought_emergency_extracts_past_safety_bound() {
        let mut node = scenario_node(Sector::Municipal, 1, 3_000.0);
        node.is_drought = true;
        node.available_surface_m3 = 0.0;
        node.extraction_limit_m3 = 1_000.0;
        node.recharge_rate_m3_per_day = 50_000.0; // fast aquifer, cheap strain
        let batch = DemandBatch::new(vec![node]).unwrap();
        let run = SectoralAllocator::default()
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        let r = &run.results[0];
        // Safety bound on the inflated limit: 1500 * 0.9 = 1350. With the
        // drought + tier-1 waiver the search runs to the emergency cap.
        assert!(
            r.groundwater_allocated_m3 > 1_350.0,
            "extracted only {}",
            r.groundwater_allocated_m3
        );
        assert!(r.groundwater_allocated_m3 <= 1_500.0 + 1e-6);
    }

    #[test]
    fn no_emergency_keeps_extraction_within_safety_bound() {
        let mut node = scenario_node(Sector::Industrial, 2, 10_000.0);
        node.available_surface_m3 = 1_000.0;
        node.recharge_rate_m3_per_day = 100_000.0;
        let batch = DemandBatch::new(vec![node]).unwrap();
        let run = SectoralAllocator::default()
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        // level 45 > safe 40: bound is 3000 * 0.9 = 2700. The excess penalty
        // stops the search exactly there despite unmet demand.
        let gw = run.results[0].groundwater_allocated_m3;
        assert!(gw > 2_000.0, "extracted only {gw}");
        assert!(gw <= 2_700.0 + 1e-6);
    }

    #[test]
    fn slow_recharge_suppresses_extraction() {
        let mut node = scenario_node(Sector::Industrial, 2, 10_000.0);
        node.available_surface_m3 = 1_000.0;
        node.recharge_rate_m3_per_day = 500.0;
        let batch = DemandBatch::new(vec![node]).unwrap();
        let run = SectoralAllocator::default()
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        // Strain of 1/500 per m3 outweighs the supply gain of 1/10000.
        assert!(
            run.results[0].groundwater_allocated_m3 < 1e-6,
            "{:?}",
            run.results[0]
        );
    }

    #[test]
    fn results_keep_input_order_across_locations() {
        let a = scenario_node(Sector::Municipal, 1, 1_000.0);
        let mut b = scenario_node(Sector::Municipal, 1, 1_000.0);
        b.location_id = "AAA001".to_string(); // sorts before a's LOC001
        let batch = DemandBatch::new(vec![a.clone(), b]).unwrap();
        let run = SectoralAllocator::default()
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        assert_eq!(run.results[0].location_id, a.location_id);
        assert_eq!(run.results[1].location_id, "AAA001");
    }
}
