//! Groundwater-safety model.
//!
//! Maps the current groundwater state to a safe extraction bound, projects
//! the post-extraction level through a simplified linear drawdown model, and
//! classifies the resulting risk tier. All functions are pure.

use crate::domain::RiskTier;

/// Utilization of the nominal limit above which extraction is flagged
/// Medium risk even when levels stay safe.
pub const MEDIUM_RISK_UTILIZATION: f64 = 0.7;

/// Fraction of the extraction limit that may be used safely given the
/// current level. Returns a value in `[0, 1 - buffer]`:
///
/// - at or below the critical threshold, no extraction is allowed;
/// - between critical and safe, a linear ramp scaled by `1 - buffer`;
/// - above safe, the full buffered fraction.
pub fn safe_extraction_fraction(level_m: f64, critical_m: f64, safe_m: f64, buffer: f64) -> f64 {
    debug_assert!(critical_m < safe_m, "critical threshold must be below safe");
    if level_m <= critical_m {
        return 0.0;
    }
    if level_m <= safe_m {
        (level_m - critical_m) / (safe_m - critical_m) * (1.0 - buffer)
    } else {
        1.0 - buffer
    }
}

/// Safety-adjusted extraction cap in cubic metres.
pub fn safe_extraction_limit(
    extraction_limit_m3: f64,
    level_m: f64,
    critical_m: f64,
    safe_m: f64,
    buffer: f64,
) -> f64 {
    extraction_limit_m3 * safe_extraction_fraction(level_m, critical_m, safe_m, buffer)
}

/// Project the groundwater level after extraction.
///
/// Drawdown is `extraction / volume_per_metre`. The projection is clamped at
/// 90% of the critical threshold to keep downstream arithmetic bounded; the
/// clamp is not a physical limit.
pub fn projected_level(
    level_m: f64,
    extraction_m3: f64,
    critical_m: f64,
    volume_per_metre_m3: f64,
) -> f64 {
    let drawdown = if extraction_m3 > 0.0 {
        extraction_m3 / volume_per_metre_m3
    } else {
        0.0
    };
    (level_m - drawdown).max(0.9 * critical_m)
}

/// Risk classification from a projected level and extraction utilization.
/// The Medium tier keys off the nominal (not safety-adjusted) limit.
pub fn classify_risk(
    projected_m: f64,
    critical_m: f64,
    safe_m: f64,
    extraction_m3: f64,
    extraction_limit_m3: f64,
) -> RiskTier {
    if projected_m <= critical_m {
        RiskTier::Critical
    } else if projected_m <= safe_m {
        RiskTier::High
    } else if extraction_m3 > MEDIUM_RISK_UTILIZATION * extraction_limit_m3 {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(30.0, 0.0)] // at critical: shut off
    #[case(25.0, 0.0)] // below critical: shut off
    #[case(35.0, 0.45)] // halfway up the ramp, scaled by 1 - 0.1
    #[case(40.0, 0.9)] // at safe threshold
    #[case(45.0, 0.9)] // above safe: buffered maximum
    fn fraction_follows_linear_ramp(#[case] level: f64, #[case] expected: f64) {
        let f = safe_extraction_fraction(level, 30.0, 40.0, 0.1);
        assert!((f - expected).abs() < 1e-9, "level {level}: got {f}");
    }

    #[test]
    fn reference_scenario_limit() {
        // demand 10000 / level 45 / safe 40 / critical 30 / limit 3000 / buffer 0.1
        let limit = safe_extraction_limit(3_000.0, 45.0, 30.0, 40.0, 0.1);
        assert!((limit - 2_700.0).abs() < 1e-9);
    }

    #[test]
    fn projection_clamps_at_ninety_percent_of_critical() {
        // 50_000 m3 over 1000 m3/m would be a 50 m drawdown
        let p = projected_level(45.0, 50_000.0, 30.0, 1000.0);
        assert!((p - 27.0).abs() < 1e-9);
    }

    #[test]
    fn zero_extraction_leaves_level_unchanged() {
        assert_eq!(projected_level(45.0, 0.0, 30.0, 1000.0), 45.0);
    }

    #[rstest]
    #[case(27.0, 0.0, RiskTier::Critical)]
    #[case(35.0, 0.0, RiskTier::High)]
    #[case(44.0, 2_500.0, RiskTier::Medium)] // > 70% of 3000
    #[case(44.0, 2_000.0, RiskTier::Low)]
    fn risk_tiers(#[case] projected: f64, #[case] extraction: f64, #[case] expected: RiskTier) {
        let tier = classify_risk(projected, 30.0, 40.0, extraction, 3_000.0);
        assert_eq!(tier, expected);
    }

    proptest! {
        #[test]
        fn fraction_zero_at_or_below_critical(
            level in -100.0..30.0f64,
            buffer in 0.0..0.5f64,
        ) {
            prop_assert_eq!(safe_extraction_fraction(level, 30.0, 40.0, buffer), 0.0);
        }

        #[test]
        fn fraction_bounded_by_buffer(
            level in -50.0..150.0f64,
            buffer in 0.0..0.5f64,
        ) {
            let f = safe_extraction_fraction(level, 30.0, 40.0, buffer);
            prop_assert!(f >= 0.0);
            prop_assert!(f <= 1.0 - buffer + 1e-12);
        }

        #[test]
        fn fraction_non_decreasing_in_level(
            a in -50.0..150.0f64,
            b in -50.0..150.0f64,
            buffer in 0.0..0.5f64,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let f_lo = safe_extraction_fraction(lo, 30.0, 40.0, buffer);
            let f_hi = safe_extraction_fraction(hi, 30.0, 40.0, buffer);
            prop_assert!(f_lo <= f_hi + 1e-12);
        }
    }
}
