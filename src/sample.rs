//! Seeded demand-batch generator for demos and simulation runs.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::domain::{DemandBatch, DemandNode, Sector};

const LOCATIONS: [&str; 3] = ["LOC001", "LOC002", "LOC003"];
const SECTORS: [Sector; 3] = [Sector::Municipal, Sector::Industrial, Sector::Agricultural];
const DROUGHT_PROBABILITY: f64 = 0.1;

/// Generate `days` of demand nodes for every location and sector.
/// Deterministic for a fixed seed.
pub fn sample_batch(seed: u64, days: usize) -> Result<DemandBatch> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).context("start date")?;

    let demand_dist: Normal<f64> = Normal::new(800.0, 150.0)?;
    let surface_dist: Normal<f64> = Normal::new(600.0, 200.0)?;
    let level_dist: Normal<f64> = Normal::new(15.0, 2.0)?;
    let recharge_dist: Normal<f64> = Normal::new(300.0, 50.0)?;
    let penalty_dist: Normal<f64> = Normal::new(15.0, 3.0)?;
    let depletion_dist: Normal<f64> = Normal::new(25.0, 5.0)?;

    let mut nodes = Vec::with_capacity(days * LOCATIONS.len() * SECTORS.len());
    for day in 0..days {
        let date = start + Duration::days(day as i64);
        let seasonal = 1.0 + 0.3 * (2.0 * std::f64::consts::PI * day as f64 / 365.0).sin();
        for location in LOCATIONS {
            let is_drought = rng.gen_bool(DROUGHT_PROBABILITY);
            let mut surface = surface_dist.sample(&mut rng).max(0.0);
            if is_drought {
                surface *= 0.5;
            }
            let level = level_dist.sample(&mut rng).max(6.0);
            for sector in SECTORS {
                nodes.push(DemandNode {
                    date,
                    location_id: location.to_string(),
                    sector,
                    priority_tier: sector.default_priority_tier(),
                    demand_m3: (demand_dist.sample(&mut rng) * seasonal).max(100.0),
                    available_surface_m3: surface,
                    groundwater_level_m: level,
                    safe_threshold_m: 10.0,
                    critical_threshold_m: 5.0,
                    recharge_rate_m3_per_day: recharge_dist.sample(&mut rng).max(0.0),
                    extraction_limit_m3: 500.0,
                    unmet_penalty_cost_per_m3: penalty_dist.sample(&mut rng).max(1.0),
                    depletion_cost_per_m3: depletion_dist.sample(&mut rng).max(1.0),
                    is_drought,
                    surface_level_m: level + 10.0,
                });
            }
        }
    }
    DemandBatch::new(nodes).map_err(Into::into)
}
