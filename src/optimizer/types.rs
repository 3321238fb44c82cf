use anyhow::Result;

use crate::config::RunConfig;
use crate::domain::{
    AllocationResult, AllocationRun, DemandBatch, DemandNode, ObjectiveTerms, SolverStatus,
};
use crate::{energy, safety};

/// One interface over the optimizer paths and the heuristic fallback, so
/// callers are agnostic to which strategy executed. Results carry a tagged
/// status (`Optimal` vs `DegradedFallback`) rather than silently swapping
/// behavior.
pub trait AllocationStrategy {
    fn name(&self) -> &'static str;

    /// Run one allocation over the batch. Synchronous and pure: the batch
    /// and configuration are read-only, the result batch is the only output.
    fn allocate(&self, batch: &DemandBatch, config: &RunConfig) -> Result<AllocationRun>;
}

/// Assemble the per-node result record from solved source volumes.
///
/// Enforces the demand-balance identity exactly: allocations are clamped to
/// the demand and `unmet` is recomputed as the residual, so
/// `surface + groundwater + unmet == demand` holds to numerical tolerance
/// regardless of solver noise.
pub(crate) fn node_result(
    node: &DemandNode,
    surface_m3: f64,
    groundwater_m3: f64,
    status: SolverStatus,
    config: &RunConfig,
) -> AllocationResult {
    let mut surface = surface_m3.max(0.0);
    let mut groundwater = groundwater_m3.max(0.0);
    let total_raw = surface + groundwater;
    if total_raw > node.demand_m3 && total_raw > 0.0 {
        let scale = node.demand_m3 / total_raw;
        surface *= scale;
        groundwater *= scale;
    }
    let total = surface + groundwater;
    let unmet = (node.demand_m3 - total).max(0.0);

    let supply_ratio = if node.demand_m3 > 0.0 {
        total / node.demand_m3
    } else {
        1.0
    };

    let projected = safety::projected_level(
        node.groundwater_level_m,
        groundwater,
        node.critical_threshold_m,
        config.drawdown_m3_per_m,
    );
    let risk_tier = safety::classify_risk(
        projected,
        node.critical_threshold_m,
        node.safe_threshold_m,
        groundwater,
        node.extraction_limit_m3,
    );

    let drought_factor = if node.is_drought {
        config.drought_multiplier
    } else {
        1.0
    };
    let objective = ObjectiveTerms {
        priority_value: node.priority_factor() * total * config.priority_weight,
        penalty_cost: unmet
            * node.unmet_penalty_cost_per_m3
            * config.penalty_weight
            * drought_factor,
        depletion_cost: groundwater * node.depletion_cost_per_m3 * config.depletion_weight,
    };

    AllocationResult {
        date: node.date,
        location_id: node.location_id.clone(),
        sector: node.sector,
        priority_tier: node.priority_tier,
        demand_m3: node.demand_m3,
        surface_allocated_m3: surface,
        groundwater_allocated_m3: groundwater,
        unmet_demand_m3: unmet,
        total_allocated_m3: total,
        supply_ratio,
        fulfillment_rate_pct: supply_ratio * 100.0,
        projected_groundwater_level_m: projected,
        risk_tier,
        energy_required_kwh: energy::pumping_energy_kwh(
            groundwater,
            node.groundwater_level_m,
            node.surface_level_m,
        ),
        pumping_cost: energy::pumping_cost(
            groundwater,
            node.groundwater_level_m,
            node.surface_level_m,
            config.pumping_cost_base,
            config.depth_cost_factor,
        ),
        objective,
        status,
    }
}
