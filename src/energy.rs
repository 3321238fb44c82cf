//! Pumping-energy model.
//!
//! A linear-in-depth proxy, not a hydraulic head calculation: energy scales
//! with lift depth times extracted volume.

/// Minimum depth in metres; avoids division artifacts for wells whose level
/// sits at or above the surface reference.
pub const MIN_DEPTH_M: f64 = 0.1;

/// Energy (kWh) required to lift `extraction_m3` from `level_m` up to
/// `surface_level_m`. Zero when nothing is extracted.
pub fn pumping_energy_kwh(extraction_m3: f64, level_m: f64, surface_level_m: f64) -> f64 {
    if extraction_m3 <= 0.0 {
        return 0.0;
    }
    let depth = (surface_level_m - level_m).max(MIN_DEPTH_M);
    depth * extraction_m3
}

/// Monetary pumping cost: a per-volume base rate plus a depth surcharge.
pub fn pumping_cost(
    extraction_m3: f64,
    level_m: f64,
    surface_level_m: f64,
    base_cost_per_m3: f64,
    depth_cost_factor: f64,
) -> f64 {
    if extraction_m3 <= 0.0 {
        return 0.0;
    }
    let depth = (surface_level_m - level_m).max(MIN_DEPTH_M);
    extraction_m3 * (base_cost_per_m3 + depth_cost_factor * depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_extraction_needs_no_energy() {
        assert_eq!(pumping_energy_kwh(0.0, 10.0, 50.0), 0.0);
        assert_eq!(pumping_energy_kwh(-5.0, 10.0, 50.0), 0.0);
    }

    #[test]
    fn energy_scales_with_depth_and_volume() {
        // 40 m lift, 100 m3
        assert!((pumping_energy_kwh(100.0, 10.0, 50.0) - 4_000.0).abs() < 1e-9);
    }

    #[test]
    fn depth_floor_applies_above_surface() {
        // level above the surface reference still pays the 0.1 m floor
        assert!((pumping_energy_kwh(100.0, 60.0, 50.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn cost_includes_depth_surcharge() {
        // depth 20 m, base 0.5, factor 0.05 -> 0.5 + 1.0 per m3
        let cost = pumping_cost(200.0, 30.0, 50.0, 0.5, 0.05);
        assert!((cost - 300.0).abs() < 1e-9);
    }
}
