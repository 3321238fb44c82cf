use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Demand sector at a location. Priority tiers default to the conventional
/// ordering (municipal first) but each node carries its own tier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Sector {
    Municipal,
    Industrial,
    Agricultural,
}

impl Sector {
    /// Conventional priority tier for the sector (1 = highest).
    pub fn default_priority_tier(&self) -> u8 {
        match self {
            Sector::Municipal => 1,
            Sector::Industrial => 2,
            Sector::Agricultural => 3,
        }
    }
}

/// Batch validation errors.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("empty input batch")]
    Empty,
    #[error("invalid node {index} ({location_id}/{sector}): {reason}")]
    InvalidNode {
        index: usize,
        location_id: String,
        sector: Sector,
        reason: String,
    },
}

/// One (location, sector, date) demand record. Immutable during a run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DemandNode {
    pub date: NaiveDate,
    pub location_id: String,
    pub sector: Sector,
    /// 1 = highest priority, 3 = lowest.
    #[validate(range(min = 1, max = 3))]
    pub priority_tier: u8,
    #[validate(range(min = 0.0))]
    pub demand_m3: f64,
    #[validate(range(min = 0.0))]
    pub available_surface_m3: f64,
    pub groundwater_level_m: f64,
    pub safe_threshold_m: f64,
    pub critical_threshold_m: f64,
    pub recharge_rate_m3_per_day: f64,
    /// Nominal extraction cap before safety adjustment.
    #[validate(range(min = 0.0))]
    pub extraction_limit_m3: f64,
    #[validate(range(min = 0.0))]
    pub unmet_penalty_cost_per_m3: f64,
    #[validate(range(min = 0.0))]
    pub depletion_cost_per_m3: f64,
    pub is_drought: bool,
    /// Ground surface reference elevation for pumping-depth computation.
    pub surface_level_m: f64,
}

impl DemandNode {
    /// Objective weight for the node's priority tier.
    pub fn priority_factor(&self) -> f64 {
        match self.priority_tier {
            1 => 1.0,
            2 => 0.7,
            _ => 0.4,
        }
    }

    fn check(&self, index: usize) -> Result<(), BatchError> {
        let invalid = |reason: String| BatchError::InvalidNode {
            index,
            location_id: self.location_id.clone(),
            sector: self.sector,
            reason,
        };

        self.validate()
            .map_err(|e| invalid(e.to_string().replace('\n', "; ")))?;

        if self.critical_threshold_m >= self.safe_threshold_m {
            return Err(invalid(format!(
                "critical threshold {} must be below safe threshold {}",
                self.critical_threshold_m, self.safe_threshold_m
            )));
        }
        for (name, v) in [
            ("demand_m3", self.demand_m3),
            ("available_surface_m3", self.available_surface_m3),
            ("groundwater_level_m", self.groundwater_level_m),
            ("safe_threshold_m", self.safe_threshold_m),
            ("critical_threshold_m", self.critical_threshold_m),
            ("extraction_limit_m3", self.extraction_limit_m3),
            ("surface_level_m", self.surface_level_m),
        ] {
            if !v.is_finite() {
                return Err(invalid(format!("{name} is not finite")));
            }
        }
        Ok(())
    }
}

/// Validated, immutable input batch. Constructed once per run; allocators
/// only ever read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandBatch {
    nodes: Vec<DemandNode>,
}

impl DemandBatch {
    /// Validate every node and reject the batch on the first violation,
    /// rather than letting bad bounds surface later as solver anomalies.
    pub fn new(nodes: Vec<DemandNode>) -> Result<Self, BatchError> {
        if nodes.is_empty() {
            return Err(BatchError::Empty);
        }
        for (index, node) in nodes.iter().enumerate() {
            node.check(index)?;
        }
        Ok(Self { nodes })
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let nodes: Vec<DemandNode> = serde_json::from_str(json)?;
        Ok(Self::new(nodes)?)
    }

    pub fn nodes(&self) -> &[DemandNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_demand_m3(&self) -> f64 {
        self.nodes.iter().map(|n| n.demand_m3).sum()
    }
}

#[cfg(test)]
pub(crate) fn test_node() -> DemandNode {
    DemandNode {
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        location_id: "LOC001".to_string(),
        sector: Sector::Municipal,
        priority_tier: 1,
        demand_m3: 10_000.0,
        available_surface_m3: 8_000.0,
        groundwater_level_m: 45.0,
        safe_threshold_m: 40.0,
        critical_threshold_m: 30.0,
        recharge_rate_m3_per_day: 500.0,
        extraction_limit_m3: 3_000.0,
        unmet_penalty_cost_per_m3: 15.0,
        depletion_cost_per_m3: 25.0,
        is_drought: false,
        surface_level_m: 0.0,
    }
}
