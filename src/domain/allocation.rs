use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Sector;

/// Post-extraction groundwater safety classification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

/// How a result was produced.
///
/// `DegradedFallback` is not an error: the sectoral optimizer did not
/// converge and the deterministic priority-order heuristic was used instead.
/// It is reported distinctly so callers know an approximation was used.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum SolverStatus {
    Optimal,
    DegradedFallback,
    Infeasible,
    Failed,
}

impl SolverStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, SolverStatus::Infeasible | SolverStatus::Failed)
    }
}

/// Objective decomposition for one node.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ObjectiveTerms {
    pub priority_value: f64,
    pub penalty_cost: f64,
    pub depletion_cost: f64,
}

impl ObjectiveTerms {
    pub fn net_benefit(&self) -> f64 {
        self.priority_value - self.penalty_cost - self.depletion_cost
    }
}

/// One allocation outcome per demand node (or per node × sector member for
/// grouped runs). Produced once per run and never re-mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    pub date: NaiveDate,
    pub location_id: String,
    pub sector: Sector,
    pub priority_tier: u8,
    pub demand_m3: f64,
    pub surface_allocated_m3: f64,
    pub groundwater_allocated_m3: f64,
    pub unmet_demand_m3: f64,
    pub total_allocated_m3: f64,
    /// total_allocated / demand, 1.0 for zero demand.
    pub supply_ratio: f64,
    pub fulfillment_rate_pct: f64,
    pub projected_groundwater_level_m: f64,
    pub risk_tier: RiskTier,
    pub energy_required_kwh: f64,
    pub pumping_cost: f64,
    pub objective: ObjectiveTerms,
    pub status: SolverStatus,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RiskCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl RiskCounts {
    fn add(&mut self, tier: RiskTier) {
        match tier {
            RiskTier::Low => self.low += 1,
            RiskTier::Medium => self.medium += 1,
            RiskTier::High => self.high += 1,
            RiskTier::Critical => self.critical += 1,
        }
    }
}

/// Run-level aggregation over the result batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub strategy: String,
    pub status: SolverStatus,
    pub objective_value: f64,
    pub solve_time_ms: u64,
    pub iterations: usize,
    pub total_demand_m3: f64,
    pub total_allocated_m3: f64,
    pub total_surface_m3: f64,
    pub total_groundwater_m3: f64,
    pub total_unmet_m3: f64,
    pub overall_fulfillment_rate_pct: f64,
    pub risk_counts: RiskCounts,
    pub optimal_count: usize,
    pub degraded_count: usize,
    pub failed_count: usize,
    /// Node identifiers whose scenario ended Infeasible or Failed.
    pub failed_nodes: Vec<String>,
}

/// Complete output of one allocation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRun {
    pub summary: RunSummary,
    pub results: Vec<AllocationResult>,
}

impl AllocationRun {
    /// Aggregate per-node results into the run summary. The run status is
    /// `Failed`/`Infeasible` if any scenario carries that status,
    /// `DegradedFallback` if any scenario fell back, otherwise `Optimal`.
    pub fn from_results(
        strategy: &str,
        results: Vec<AllocationResult>,
        objective_value: f64,
        iterations: usize,
        solve_time_ms: u64,
    ) -> Self {
        let mut risk_counts = RiskCounts::default();
        let mut optimal_count = 0;
        let mut degraded_count = 0;
        let mut failed_count = 0;
        let mut failed_nodes = Vec::new();
        let mut total_demand = 0.0;
        let mut total_surface = 0.0;
        let mut total_groundwater = 0.0;
        let mut total_unmet = 0.0;

        for r in &results {
            risk_counts.add(r.risk_tier);
            match r.status {
                SolverStatus::Optimal => optimal_count += 1,
                SolverStatus::DegradedFallback => degraded_count += 1,
                SolverStatus::Infeasible | SolverStatus::Failed => {
                    failed_count += 1;
                    failed_nodes.push(r.location_id.clone());
                }
            }
            total_demand += r.demand_m3;
            total_surface += r.surface_allocated_m3;
            total_groundwater += r.groundwater_allocated_m3;
            total_unmet += r.unmet_demand_m3;
        }
        failed_nodes.sort();
        failed_nodes.dedup();

        let total_allocated = total_surface + total_groundwater;
        let status = if results.iter().any(|r| r.status == SolverStatus::Infeasible) {
            SolverStatus::Infeasible
        } else if failed_count > 0 {
            SolverStatus::Failed
        } else if degraded_count > 0 {
            SolverStatus::DegradedFallback
        } else {
            SolverStatus::Optimal
        };

        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            strategy: strategy.to_string(),
            status,
            objective_value,
            solve_time_ms,
            iterations,
            total_demand_m3: total_demand,
            total_allocated_m3: total_allocated,
            total_surface_m3: total_surface,
            total_groundwater_m3: total_groundwater,
            total_unmet_m3: total_unmet,
            overall_fulfillment_rate_pct: if total_demand > 0.0 {
                total_allocated / total_demand * 100.0
            } else {
                100.0
            },
            risk_counts,
            optimal_count,
            degraded_count,
            failed_count,
            failed_nodes,
        };

        Self { summary, results }
    }

    /// Run outcome for a joint solve that produced no usable solution.
    /// No partial allocations are reported; every node is enumerated as
    /// affected.
    pub fn failed(
        strategy: &str,
        status: SolverStatus,
        node_ids: impl IntoIterator<Item = String>,
        solve_time_ms: u64,
    ) -> Self {
        let failed_nodes: Vec<String> = node_ids.into_iter().sorted().dedup().collect();
        Self {
            summary: RunSummary {
                run_id: Uuid::new_v4(),
                strategy: strategy.to_string(),
                status,
                objective_value: 0.0,
                solve_time_ms,
                iterations: 0,
                total_demand_m3: 0.0,
                total_allocated_m3: 0.0,
                total_surface_m3: 0.0,
                total_groundwater_m3: 0.0,
                total_unmet_m3: 0.0,
                overall_fulfillment_rate_pct: 0.0,
                risk_counts: RiskCounts::default(),
                optimal_count: 0,
                degraded_count: 0,
                failed_count: failed_nodes.len(),
                failed_nodes,
            },
            results: Vec::new(),
        }
    }
}
