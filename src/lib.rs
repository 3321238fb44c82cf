//! # Water Resource Optimizer
//!
//! Allocation engine that splits a scarce two-source water supply (surface
//! water and groundwater) across competing demand nodes (location × sector ×
//! date), subject to physical capacity limits, groundwater-safety bounds and
//! sector priority rules.
//!
//! ## Components
//!
//! - **safety**: groundwater-safety model (safe extraction bound, drawdown
//!   projection, risk classification)
//! - **energy**: pumping-energy and pumping-cost proxies
//! - **optimizer**: the LP, NLP and sectoral allocation strategies plus the
//!   multi-objective weight sweep
//! - **distribution**: the closed-form proportional distributor used by the
//!   fast simulation mode
//! - **domain**: typed demand/allocation records with invariants enforced at
//!   construction
//!
//! All allocators are synchronous, pure batch computations: input batch and
//! configuration in, result batch out, no ambient state between runs.

pub mod config;
pub mod distribution;
pub mod domain;
pub mod energy;
pub mod optimizer;
pub mod safety;
pub mod sample;
pub mod telemetry;

pub use config::{Config, RunConfig};
pub use domain::{
    AllocationResult, AllocationRun, BatchError, DemandBatch, DemandNode, RiskTier, RunSummary,
    Sector, SolverStatus,
};
pub use optimizer::{
    AllocationStrategy, LinearAllocator, NonlinearAllocator, SectoralAllocator, WeightSweep,
};
