use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
}

/// Scalar weights and thresholds chosen once per optimization invocation.
/// Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RunConfig {
    /// Weight for priority-based allocation benefit.
    #[validate(range(min = 0.0))]
    pub priority_weight: f64,
    /// Penalty coefficient for unmet demand.
    #[validate(range(min = 0.0))]
    pub penalty_weight: f64,
    /// Cost coefficient for groundwater depletion.
    #[validate(range(min = 0.0))]
    pub depletion_weight: f64,
    /// Multiplier applied to unmet-demand penalties during drought.
    #[validate(range(min = 1.0))]
    pub drought_multiplier: f64,
    /// Fractional reserve kept below the nominal safe extraction bound.
    #[validate(range(min = 0.0, max = 0.5))]
    pub safety_buffer: f64,
    /// Extraction-limit multiplier during drought or top-priority demand.
    #[validate(range(min = 1.0))]
    pub emergency_threshold: f64,
    /// Weight of the sustainability objective in the sectoral/nonlinear paths.
    #[validate(range(min = 0.0, max = 2.0))]
    pub sustainability_weight: f64,
    /// Base pumping cost per cubic metre.
    #[validate(range(min = 0.0))]
    pub pumping_cost_base: f64,
    /// Additional pumping cost per cubic metre per metre of depth.
    #[validate(range(min = 0.0))]
    pub depth_cost_factor: f64,
    /// Drawdown model constant: extracted volume per metre of level drop.
    #[validate(range(min = 1.0))]
    pub drawdown_m3_per_m: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            priority_weight: 1.0,
            penalty_weight: 1000.0,
            depletion_weight: 500.0,
            drought_multiplier: 2.0,
            safety_buffer: 0.1,
            emergency_threshold: 1.5,
            sustainability_weight: 1.0,
            pumping_cost_base: 0.5,
            depth_cost_factor: 0.05,
            drawdown_m3_per_m: 1000.0,
        }
    }
}

impl RunConfig {
    /// Check the documented option ranges, returning the config on success.
    pub fn validated(self) -> Result<Self> {
        self.validate().context("run configuration out of range")?;
        Ok(self)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("WRO__").split("__"));
        let cfg: Config = figment.extract()?;
        cfg.run.validate().context("run configuration out of range")?;
        Ok(cfg)
    }
}
