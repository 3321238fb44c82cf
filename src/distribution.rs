//! Proportional distribution, the solver-free simulation mode.
//!
//! Closed-form: disruption losses shrink the nominal source volumes, a
//! single distribution factor scales every consumer's requirement down to
//! the available total, and each consumer draws from the two sources
//! according to its configured ratio. Consumers are processed in input
//! order, decrementing the remaining source capacities as they go; results
//! are therefore order-dependent, which is intended for this mode.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Fraction of the surface volume lost to a pipe leak.
pub const PIPE_LEAK_LOSS: f64 = 0.10;
/// Fraction of the surface volume lost to river pollution.
pub const RIVER_POLLUTION_LOSS: f64 = 0.20;
/// Fraction of the groundwater volume lost when wells run dry.
pub const WELL_DRY_LOSS: f64 = 0.15;
/// Fraction of the combined volume lost to a pump failure.
pub const PUMP_FAILURE_LOSS: f64 = 0.12;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Disruptions {
    #[serde(default)]
    pub pipe_leak: bool,
    #[serde(default)]
    pub river_pollution: bool,
    #[serde(default)]
    pub well_dry: bool,
    #[serde(default)]
    pub pump_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consumer {
    pub id: String,
    pub demand_m3: f64,
    /// Preferred share drawn from surface water.
    #[serde(default = "default_surface_ratio")]
    pub surface_ratio: f64,
    /// Preferred share drawn from groundwater.
    #[serde(default = "default_groundwater_ratio")]
    pub groundwater_ratio: f64,
    /// Pre-approved volume delivered on top of the scaled requirement.
    #[serde(default)]
    pub extra_approved_m3: f64,
}

fn default_surface_ratio() -> f64 {
    0.6
}

fn default_groundwater_ratio() -> f64 {
    0.4
}

impl Consumer {
    pub fn new(id: impl Into<String>, demand_m3: f64) -> Self {
        Self {
            id: id.into(),
            demand_m3,
            surface_ratio: default_surface_ratio(),
            groundwater_ratio: default_groundwater_ratio(),
            extra_approved_m3: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub surface_supply_m3: f64,
    pub groundwater_supply_m3: f64,
    pub consumers: Vec<Consumer>,
    #[serde(default)]
    pub disruptions: Disruptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerAllocation {
    pub id: String,
    pub demand_m3: f64,
    /// Demand scaled by the distribution factor.
    pub proportional_requirement_m3: f64,
    pub surface_allocated_m3: f64,
    pub groundwater_allocated_m3: f64,
    pub extra_allocated_m3: f64,
    pub total_allocated_m3: f64,
    pub shortage_m3: f64,
    pub excess_m3: f64,
    pub satisfaction_pct: f64,
    pub requirement_met: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Wastage {
    pub pipe_leak_m3: f64,
    pub river_pollution_m3: f64,
    pub well_dry_m3: f64,
    pub pump_failure_m3: f64,
}

impl Wastage {
    pub fn total_m3(&self) -> f64 {
        self.pipe_leak_m3 + self.river_pollution_m3 + self.well_dry_m3 + self.pump_failure_m3
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionOutcome {
    pub distribution_factor: f64,
    pub total_required_m3: f64,
    pub total_available_m3: f64,
    pub total_delivered_m3: f64,
    /// Supply left over after every requirement is met.
    pub reservoir_storage_m3: f64,
    pub efficiency_pct: f64,
    pub served_count: usize,
    pub shortfall_count: usize,
    pub wastage: Wastage,
    pub allocations: Vec<ConsumerAllocation>,
}

/// Run the distribution over one request.
pub fn distribute(request: &DistributionRequest) -> DistributionOutcome {
    let d = &request.disruptions;
    let surface = request.surface_supply_m3.max(0.0);
    let groundwater = request.groundwater_supply_m3.max(0.0);

    let wastage = Wastage {
        pipe_leak_m3: if d.pipe_leak { surface * PIPE_LEAK_LOSS } else { 0.0 },
        river_pollution_m3: if d.river_pollution {
            surface * RIVER_POLLUTION_LOSS
        } else {
            0.0
        },
        well_dry_m3: if d.well_dry { groundwater * WELL_DRY_LOSS } else { 0.0 },
        pump_failure_m3: if d.pump_failure {
            (surface + groundwater) * PUMP_FAILURE_LOSS
        } else {
            0.0
        },
    };
    let pump_loss = if d.pump_failure { PUMP_FAILURE_LOSS } else { 0.0 };
    let mut remaining_surface =
        (surface - wastage.pipe_leak_m3 - wastage.river_pollution_m3 - surface * pump_loss)
            .max(0.0);
    let mut remaining_groundwater =
        (groundwater - wastage.well_dry_m3 - groundwater * pump_loss).max(0.0);

    let total_available = remaining_surface + remaining_groundwater;
    let total_required: f64 = request
        .consumers
        .iter()
        .map(|c| c.demand_m3 + c.extra_approved_m3)
        .sum();
    let distribution_factor = if total_required > 0.0 {
        (total_available / total_required).min(1.0)
    } else {
        1.0
    };

    let surface_out = remaining_surface <= 0.0;
    let groundwater_out = remaining_groundwater <= 0.0;

    let mut allocations = Vec::with_capacity(request.consumers.len());
    for consumer in &request.consumers {
        let proportional = consumer.demand_m3 * distribution_factor;

        // Configured split, overridden to a single source when the other is
        // fully disrupted.
        let (surface_ratio, groundwater_ratio) = if surface_out {
            (0.0, 1.0)
        } else if groundwater_out {
            (1.0, 0.0)
        } else {
            (consumer.surface_ratio, consumer.groundwater_ratio)
        };

        let from_surface = remaining_surface.min(proportional * surface_ratio);
        remaining_surface -= from_surface;
        let from_groundwater = remaining_groundwater.min(proportional * groundwater_ratio);
        remaining_groundwater -= from_groundwater;

        // Extra approved volume rides on top, surface first.
        let mut extra = remaining_surface.min(consumer.extra_approved_m3);
        remaining_surface -= extra;
        let extra_gw = remaining_groundwater.min(consumer.extra_approved_m3 - extra);
        remaining_groundwater -= extra_gw;
        extra += extra_gw;

        let total = from_surface + from_groundwater + extra;
        let shortage = (consumer.demand_m3 - total).max(0.0);
        let satisfaction_pct = if consumer.demand_m3 > 0.0 {
            (total / consumer.demand_m3 * 100.0).min(100.0)
        } else {
            100.0
        };
        allocations.push(ConsumerAllocation {
            id: consumer.id.clone(),
            demand_m3: consumer.demand_m3,
            proportional_requirement_m3: proportional,
            surface_allocated_m3: from_surface,
            groundwater_allocated_m3: from_groundwater,
            extra_allocated_m3: extra,
            total_allocated_m3: total,
            shortage_m3: shortage,
            excess_m3: (total - consumer.demand_m3).max(0.0),
            satisfaction_pct,
            requirement_met: shortage < 1e-6,
        });
    }

    let total_delivered: f64 = allocations.iter().map(|a| a.total_allocated_m3).sum();
    let served_count = allocations.iter().filter(|a| a.requirement_met).count();
    let outcome = DistributionOutcome {
        distribution_factor,
        total_required_m3: total_required,
        total_available_m3: total_available,
        total_delivered_m3: total_delivered,
        reservoir_storage_m3: (total_available - total_required).max(0.0),
        efficiency_pct: if total_required > 0.0 {
            total_delivered / total_required * 100.0
        } else {
            100.0
        },
        served_count,
        shortfall_count: allocations.len() - served_count,
        wastage,
        allocations,
    };
    info!(
        consumers = outcome.allocations.len(),
        distribution_factor = outcome.distribution_factor,
        delivered_m3 = outcome.total_delivered_m3,
        wastage_m3 = outcome.wastage.total_m3(),
        served = outcome.served_count,
        "distribution complete"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(surface: f64, groundwater: f64, consumers: Vec<Consumer>) -> DistributionRequest {
        DistributionRequest {
            surface_supply_m3: surface,
            groundwater_supply_m3: groundwater,
            consumers,
            disruptions: Disruptions::default(),
        }
    }

    #[test]
    fn ample_supply_leaves_no_shortage() {
        let out = distribute(&request(
            600.0,
            400.0,
            vec![Consumer::new("C1", 300.0), Consumer::new("C2", 500.0)],
        ));
        assert_eq!(out.distribution_factor, 1.0);
        assert_eq!(out.shortfall_count, 0);
        for a in &out.allocations {
            assert!(a.requirement_met, "{a:?}");
            assert!(a.shortage_m3.abs() < 1e-9);
            assert!((a.satisfaction_pct - 100.0).abs() < 1e-9);
        }
        assert!((out.reservoir_storage_m3 - 200.0).abs() < 1e-9);
    }

    #[test]
    fn scarcity_scales_requirements_by_the_factor() {
        // required 1000 against available 800: factor 0.8, so a demand of
        // 200 receives 160.
        let out = distribute(&request(
            480.0,
            320.0,
            vec![Consumer::new("C1", 200.0), Consumer::new("C2", 800.0)],
        ));
        assert!((out.distribution_factor - 0.8).abs() < 1e-9);
        let c1 = &out.allocations[0];
        assert!((c1.proportional_requirement_m3 - 160.0).abs() < 1e-9);
        assert!((c1.total_allocated_m3 - 160.0).abs() < 1e-9, "{c1:?}");
        assert!((c1.shortage_m3 - 40.0).abs() < 1e-9);
        assert!((c1.satisfaction_pct - 80.0).abs() < 1e-9);
    }

    #[test]
    fn empty_source_redirects_the_split() {
        let out = distribute(&request(500.0, 0.0, vec![Consumer::new("C1", 400.0)]));
        let a = &out.allocations[0];
        assert!((a.surface_allocated_m3 - 400.0).abs() < 1e-9);
        assert_eq!(a.groundwater_allocated_m3, 0.0);
        assert!(a.requirement_met);
    }

    #[test]
    fn disruption_losses_reduce_the_pool() {
        let mut req = request(1_000.0, 500.0, vec![Consumer::new("C1", 100.0)]);
        req.disruptions = Disruptions {
            pipe_leak: true,
            river_pollution: true,
            well_dry: true,
            pump_failure: true,
        };
        let out = distribute(&req);
        assert!((out.wastage.pipe_leak_m3 - 100.0).abs() < 1e-9);
        assert!((out.wastage.river_pollution_m3 - 200.0).abs() < 1e-9);
        assert!((out.wastage.well_dry_m3 - 75.0).abs() < 1e-9);
        assert!((out.wastage.pump_failure_m3 - 180.0).abs() < 1e-9);
        // surface 1000 - 100 - 200 - 120 = 580; groundwater 500 - 75 - 60 = 365
        assert!((out.total_available_m3 - 945.0).abs() < 1e-9);
    }

    #[test]
    fn extra_approved_volume_rides_on_top() {
        let mut consumer = Consumer::new("C1", 100.0);
        consumer.extra_approved_m3 = 50.0;
        let out = distribute(&request(600.0, 400.0, vec![consumer]));
        let a = &out.allocations[0];
        assert!((a.extra_allocated_m3 - 50.0).abs() < 1e-9);
        assert!((a.total_allocated_m3 - 150.0).abs() < 1e-9);
        assert!((a.excess_m3 - 50.0).abs() < 1e-9);
        // extras count toward the requirement total
        assert!((out.total_required_m3 - 150.0).abs() < 1e-9);
    }

    #[test]
    fn zero_demand_is_fully_satisfied() {
        let out = distribute(&request(100.0, 0.0, vec![Consumer::new("C1", 0.0)]));
        let a = &out.allocations[0];
        assert_eq!(a.satisfaction_pct, 100.0);
        assert!(a.requirement_met);
        assert_eq!(out.distribution_factor, 1.0);
    }
}
