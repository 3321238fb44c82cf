//! Linear-programming allocation strategy.
//!
//! Per node, three non-negative decision variables: surface allocation,
//! groundwater allocation and unmet demand (slack). The maximization
//! objective is implemented as the minimization of its negation:
//!
//! ```text
//! maximize  sum_i  priority_i * w_p * (sw_i + gw_i)
//!         - sum_i  penalty_i * w_u * drought_i * u_i
//!         - sum_i  depletion_i * w_d * gw_i
//! ```
//!
//! subject to, per node: demand balance `sw + gw + u = d` (equality),
//! `sw <= available surface`, `gw <= safe extraction limit`. Nodes share no
//! constraints; the joint solve is an implementation convenience and yields
//! the same optimum as per-node solves.

use std::time::Instant;

use anyhow::Result;
use good_lp::{constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::domain::{AllocationRun, DemandBatch, SolverStatus};
use crate::optimizer::types::{node_result, AllocationStrategy};
use crate::safety;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinearAllocator;

impl AllocationStrategy for LinearAllocator {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn allocate(&self, batch: &DemandBatch, config: &RunConfig) -> Result<AllocationRun> {
        let started = Instant::now();
        let nodes = batch.nodes();

        let mut vars = ProblemVariables::new();
        let sw = vars.add_vector(variable().min(0.0), nodes.len());
        let gw = vars.add_vector(variable().min(0.0), nodes.len());
        let unmet = vars.add_vector(variable().min(0.0), nodes.len());

        let objective: Expression = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let drought_factor = if node.is_drought {
                    config.drought_multiplier
                } else {
                    1.0
                };
                let benefit = node.priority_factor() * config.priority_weight;
                let sw_coeff = -benefit;
                let gw_coeff =
                    -benefit + node.depletion_cost_per_m3 * config.depletion_weight;
                let unmet_coeff =
                    node.unmet_penalty_cost_per_m3 * config.penalty_weight * drought_factor;
                sw_coeff * sw[i] + gw_coeff * gw[i] + unmet_coeff * unmet[i]
            })
            .sum();

        let mut model = vars.minimise(objective.clone()).using(default_solver);
        for (i, node) in nodes.iter().enumerate() {
            let safe_limit = safety::safe_extraction_limit(
                node.extraction_limit_m3,
                node.groundwater_level_m,
                node.critical_threshold_m,
                node.safe_threshold_m,
                config.safety_buffer,
            );
            model = model
                .with(constraint!(sw[i] + gw[i] + unmet[i] == node.demand_m3))
                .with(constraint!(sw[i] <= node.available_surface_m3))
                .with(constraint!(gw[i] <= safe_limit));
        }

        let solution = match model.solve() {
            Ok(solution) => solution,
            Err(err) => {
                let status = match err {
                    ResolutionError::Infeasible => SolverStatus::Infeasible,
                    _ => SolverStatus::Failed,
                };
                warn!(%err, ?status, "linear solve produced no solution");
                return Ok(AllocationRun::failed(
                    self.name(),
                    status,
                    nodes.iter().map(|n| n.location_id.clone()),
                    started.elapsed().as_millis() as u64,
                ));
            }
        };

        let objective_value = -objective.eval_with(&solution);
        let results = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                node_result(
                    node,
                    solution.value(sw[i]),
                    solution.value(gw[i]),
                    SolverStatus::Optimal,
                    config,
                )
            })
            .collect();

        let run = AllocationRun::from_results(
            self.name(),
            results,
            objective_value,
            0,
            started.elapsed().as_millis() as u64,
        );
        info!(
            run_id = %run.summary.run_id,
            status = %run.summary.status,
            nodes = batch.len(),
            fulfillment_pct = run.summary.overall_fulfillment_rate_pct,
            solve_time_ms = run.summary.solve_time_ms,
            "linear allocation complete"
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::test_node;
    use crate::domain::{DemandBatch, RiskTier};

    fn batch_of(nodes: Vec<crate::domain::DemandNode>) -> DemandBatch {
        DemandBatch::new(nodes).unwrap()
    }

    #[test]
    fn reference_scenario_fills_demand_from_both_sources() {
        // demand 10000, surface 8000, safe limit 2700 -> 8000 + 2000 + 0
        let batch = batch_of(vec![test_node()]);
        let run = LinearAllocator
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        assert_eq!(run.summary.status, SolverStatus::Optimal);
        let r = &run.results[0];
        assert!((r.surface_allocated_m3 - 8_000.0).abs() < 1e-4, "{r:?}");
        assert!((r.groundwater_allocated_m3 - 2_000.0).abs() < 1e-4, "{r:?}");
        assert!(r.unmet_demand_m3.abs() < 1e-4);
        assert!(r.groundwater_allocated_m3 <= 2_700.0 + 1e-6);
    }

    #[test]
    fn demand_balance_holds_for_every_node() {
        let mut scarce = test_node();
        scarce.location_id = "LOC002".to_string();
        scarce.available_surface_m3 = 1_000.0;
        scarce.groundwater_level_m = 32.0; // low level shrinks the safe cap
        let batch = batch_of(vec![test_node(), scarce]);
        let run = LinearAllocator
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        for r in &run.results {
            let balance =
                r.surface_allocated_m3 + r.groundwater_allocated_m3 + r.unmet_demand_m3;
            assert!((balance - r.demand_m3).abs() < 1e-6, "{r:?}");
            assert!(r.surface_allocated_m3 <= r.demand_m3.max(8_000.0) + 1e-6);
        }
    }

    #[test]
    fn critical_level_shuts_off_groundwater() {
        let mut node = test_node();
        node.groundwater_level_m = 29.0; // below critical threshold 30
        node.available_surface_m3 = 4_000.0;
        let batch = batch_of(vec![node]);
        let run = LinearAllocator
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        let r = &run.results[0];
        assert!(r.groundwater_allocated_m3.abs() < 1e-6);
        assert!((r.unmet_demand_m3 - 6_000.0).abs() < 1e-4);
    }

    #[test]
    fn surplus_supply_yields_low_risk() {
        let mut node = test_node();
        node.demand_m3 = 5_000.0;
        node.available_surface_m3 = 8_000.0;
        let batch = batch_of(vec![node]);
        let run = LinearAllocator
            .allocate(&batch, &RunConfig::default())
            .unwrap();
        let r = &run.results[0];
        assert!(r.groundwater_allocated_m3.abs() < 1e-6);
        assert_eq!(r.risk_tier, RiskTier::Low);
        assert!((r.fulfillment_rate_pct - 100.0).abs() < 1e-6);
    }

    #[test]
    fn rerun_is_idempotent() {
        let batch = batch_of(vec![test_node()]);
        let cfg = RunConfig::default();
        let a = LinearAllocator.allocate(&batch, &cfg).unwrap();
        let b = LinearAllocator.allocate(&batch, &cfg).unwrap();
        for (ra, rb) in a.results.iter().zip(&b.results) {
            assert_eq!(ra.surface_allocated_m3, rb.surface_allocated_m3);
            assert_eq!(ra.groundwater_allocated_m3, rb.groundwater_allocated_m3);
            assert_eq!(ra.unmet_demand_m3, rb.unmet_demand_m3);
        }
    }
}
