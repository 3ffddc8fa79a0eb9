//! Regime-driven allocation across stock classes A..D.
//!
//! ```text
//! base(regime) -> normalize -> FPS tilt -> normalize -> GPS tie-break -> normalize
//! ```
//!
//! Every intermediate split is a 1-dp allocation summing to exactly 100. The
//! tilt works in whole tenths of a percent so that no rounding happens inside
//! it; only the tie-break can produce finer amounts, which normalization rounds.

use crate::config::{AllocationConfig, TieBreakConfig};
use crate::domain::{Allocation, AllocationResult, AllocationStep, Regime, StepKind};

const TOTAL_TENTHS: i64 = 1000;

pub struct AllocationEngine<'a> {
    config: &'a AllocationConfig,
}

impl<'a> AllocationEngine<'a> {
    pub fn new(config: &'a AllocationConfig) -> Self {
        Self { config }
    }

    /// Configured starting split for a regime (uniform if the table lacks it).
    pub fn base_allocation(&self, regime: Regime) -> Allocation {
        match self.config.base.get(&regime) {
            Some(base) => *base,
            None => {
                tracing::warn!(regime = %regime, "no base allocation configured; using neutral split");
                Allocation::uniform()
            }
        }
    }

    pub fn calculate(&self, regime: Regime, fps: f64, gps: f64) -> AllocationResult {
        let base = self.base_allocation(regime);
        self.run(Some(regime), regime.label(), base, fps, gps)
    }

    /// Same as [`calculate`](Self::calculate) for a free-form regime label.
    ///
    /// An unrecognized label degrades to 25/25/25/25 with a warning; the
    /// tie-break is skipped since the regime is not known to be in-between.
    pub fn calculate_for_label(&self, label: &str, fps: f64, gps: f64) -> AllocationResult {
        match label.parse::<Regime>() {
            Ok(regime) => self.calculate(regime, fps, gps),
            Err(_) => {
                tracing::warn!(label, "unknown regime; using neutral allocation");
                self.run(None, label, Allocation::uniform(), fps, gps)
            }
        }
    }

    fn run(&self, regime: Option<Regime>, label: &str, base: Allocation, fps: f64, gps: f64) -> AllocationResult {
        let base = normalize_allocation(base);
        let mut steps = vec![AllocationStep {
            step: StepKind::Base,
            allocation: base,
            regime: Some(label.to_string()),
            fps: None,
            tilt: None,
            gps: None,
        }];

        let (tilted, tilt) = apply_fps_tilt(base, fps, self.config.tilt_magnitude, self.config.min_tilt);
        let tilted = normalize_allocation(tilted);
        if tilted != base {
            steps.push(AllocationStep {
                step: StepKind::FpsTilt,
                allocation: tilted,
                regime: None,
                fps: Some(fps),
                tilt: Some(tilt),
                gps: None,
            });
        }

        let broken = normalize_allocation(apply_gps_tie_break(tilted, regime, fps, gps, &self.config.tie_break));
        if broken != tilted {
            steps.push(AllocationStep {
                step: StepKind::GpsTieBreak,
                allocation: broken,
                regime: None,
                fps: None,
                tilt: None,
                gps: Some(gps),
            });
        }

        tracing::debug!(
            regime = label,
            fps,
            gps,
            a = broken.a,
            b = broken.b,
            c = broken.c,
            d = broken.d,
            steps = steps.len(),
            "calculated allocation"
        );

        AllocationResult { allocation: broken, steps }
    }
}

/// Shift `fps * magnitude * 100` percentage points between risk ends.
///
/// Expects a normalized (1-dp) split. Returns the new split and the signed
/// tilt that was requested (0 when below `min_tilt`).
///
/// Positive tilt drains D, then C, then B, each down to zero at most. What is
/// taken from a class goes only to the classes safer than it:
///
/// - from D: 1/2 to A, 1/4 to B, 1/4 to C
/// - from C: 2/3 to A, 1/3 to B
/// - from B: all to A
///
/// Negative tilt is the mirror image (drain A, B, C; D gains most). Amounts
/// that cannot be drained are not shifted.
pub fn apply_fps_tilt(allocation: Allocation, fps: f64, magnitude: f64, min_tilt: f64) -> (Allocation, f64) {
    let tilt = fps * magnitude * 100.0;
    if !tilt.is_finite() || tilt.abs() < min_tilt {
        return (allocation, 0.0);
    }

    let [a, b, c, d] = to_tenths(allocation);
    let amount = (tilt.abs() * 10.0).round() as i64;

    let shifted = if tilt > 0.0 {
        let [d, c, b, a] = drain_toward_safety([d, c, b, a], amount);
        [a, b, c, d]
    } else {
        drain_toward_safety([a, b, c, d], amount)
    };

    (from_tenths(shifted), tilt)
}

/// Drain `amount` tenths from `classes[0]`, then `[1]`, then `[2]`, ordered
/// from the end being drained to the end gaining. Returns the same order.
fn drain_toward_safety(classes: [i64; 4], amount: i64) -> [i64; 4] {
    let [mut far, mut next, mut near, mut safe] = classes;

    let from_far = far.min(amount).max(0);
    let from_next = next.min(amount - from_far).max(0);
    let from_near = near.min(amount - from_far - from_next).max(0);
    far -= from_far;
    next -= from_next;
    near -= from_near;

    // From the far end: a quarter to each middle class, rest to safe. Odd
    // tenths go to the middle class nearer the safe end.
    let quarter_down = from_far / 4;
    let quarter_up = (from_far + 3) / 4;
    next += quarter_down;
    near += quarter_up;
    safe += from_far - quarter_down - quarter_up;

    // From the next class: a third to the near class, rest to safe.
    let third = from_next / 3;
    near += third;
    safe += from_next - third;

    safe += from_near;

    [far, next, near, safe]
}

/// Move weight between B and C when FPS is neutral in an in-between regime.
///
/// `gps > threshold` moves `min(B * fraction, max_shift)` from B to C;
/// `gps < -threshold` moves `min(C * fraction, max_shift)` from C to B. Any
/// other case returns the input unchanged.
pub fn apply_gps_tie_break(
    allocation: Allocation,
    regime: Option<Regime>,
    fps: f64,
    gps: f64,
    config: &TieBreakConfig,
) -> Allocation {
    let in_between = regime.is_some_and(Regime::is_in_between);
    if !in_between || !(fps.abs() <= config.fps_neutral_band) {
        return allocation;
    }

    let mut out = allocation;
    if gps > config.gps_threshold {
        let shift = (out.b * config.shift_fraction).min(config.max_shift);
        out.b -= shift;
        out.c += shift;
    } else if gps < -config.gps_threshold {
        let shift = (out.c * config.shift_fraction).min(config.max_shift);
        out.c -= shift;
        out.b += shift;
    }
    out
}

/// Rescale to 100, round each class to 1 dp and give the rounding residual to A.
///
/// Negative or non-finite parts count as zero. A split with no positive part
/// falls back to 25/25/25/25.
pub fn normalize_allocation(allocation: Allocation) -> Allocation {
    let parts = [allocation.a, allocation.b, allocation.c, allocation.d]
        .map(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 });
    let total: f64 = parts.iter().sum();
    if total <= 0.0 {
        tracing::warn!("allocation has no positive weight; using neutral split");
        return Allocation::uniform();
    }

    let mut tenths = parts.map(|v| (v / total * TOTAL_TENTHS as f64).round() as i64);
    let residual = TOTAL_TENTHS - tenths.iter().sum::<i64>();
    tenths[0] += residual;
    from_tenths(tenths)
}

fn to_tenths(allocation: Allocation) -> [i64; 4] {
    [allocation.a, allocation.b, allocation.c, allocation.d].map(|v| (v * 10.0).round() as i64)
}

fn from_tenths([a, b, c, d]: [i64; 4]) -> Allocation {
    Allocation::new(a as f64 / 10.0, b as f64 / 10.0, c as f64 / 10.0, d as f64 / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_config() -> AllocationConfig {
        AllocationConfig::default()
    }

    fn assert_alloc(got: Allocation, a: f64, b: f64, c: f64, d: f64) {
        let ok = (got.a - a).abs() < 1e-9
            && (got.b - b).abs() < 1e-9
            && (got.c - c).abs() < 1e-9
            && (got.d - d).abs() < 1e-9;
        assert!(ok, "got {got:?}, want A={a} B={b} C={c} D={d}");
    }

    #[test]
    fn most_liquid_hawkish_tilt_drains_d() {
        let config = engine_config();
        let result = AllocationEngine::new(&config).calculate(Regime::MostLiquid, 0.4, 0.0);

        assert_alloc(result.allocation, 15.0, 22.5, 32.5, 30.0);
        assert_eq!(result.allocation.a + result.allocation.b + result.allocation.c + result.allocation.d, 100.0);

        let kinds: Vec<StepKind> = result.steps.iter().map(|s| s.step).collect();
        assert_eq!(kinds, vec![StepKind::Base, StepKind::FpsTilt]);
        assert_eq!(result.steps[0].regime.as_deref(), Some("Most Liquid"));
        assert_alloc(result.steps[0].allocation, 10.0, 20.0, 30.0, 40.0);
        assert!((result.steps[1].tilt.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn small_tilt_is_ignored() {
        let config = engine_config();
        // 0.01 * 0.25 * 100 = 0.25 < 0.5
        let result = AllocationEngine::new(&config).calculate(Regime::LeastLiquid, 0.01, 0.0);
        assert_eq!(result.steps.len(), 1);
        assert_alloc(result.allocation, 60.0, 30.0, 10.0, 0.0);
    }

    #[test]
    fn hawkish_tilt_spills_into_c_when_d_is_empty() {
        // Least Liquid has D = 0, so a +25 tilt drains C (10) and then B (15).
        let (out, tilt) = apply_fps_tilt(Allocation::new(60.0, 30.0, 10.0, 0.0), 1.0, 0.25, 0.5);
        assert_eq!(tilt, 25.0);
        // C: 10 -> 0, 1/3 (3.3) to B, rest to A. B: 15 to A.
        assert_alloc(out, 60.0 + 6.7 + 15.0, 30.0 + 3.3 - 15.0, 0.0, 0.0);
        assert_eq!(out.total_tenths(), 1000);
    }

    #[test]
    fn dovish_tilt_mirrors_hawkish_tilt() {
        let (out, tilt) = apply_fps_tilt(Allocation::new(10.0, 20.0, 30.0, 40.0), -0.4, 0.25, 0.5);
        assert_eq!(tilt, -10.0);
        // A 10 -> 0: 2.5 to B, 2.5 to C, 5 to D.
        assert_alloc(out, 0.0, 22.5, 32.5, 45.0);

        // A exhausted: the remaining 5 comes from B, 1/3 to C and 2/3 to D.
        let (out, _) = apply_fps_tilt(Allocation::new(10.0, 20.0, 30.0, 40.0), -0.6, 0.25, 0.5);
        assert_alloc(out, 0.0, 22.5 - 5.0, 32.5 + 1.6, 45.0 + 3.4);
    }

    #[test]
    fn tilt_never_goes_negative() {
        let (out, _) = apply_fps_tilt(Allocation::new(100.0, 0.0, 0.0, 0.0), 1.0, 0.25, 0.5);
        assert_alloc(out, 100.0, 0.0, 0.0, 0.0);
        let (out, _) = apply_fps_tilt(Allocation::new(0.0, 0.0, 0.0, 100.0), -1.0, 0.25, 0.5);
        assert_alloc(out, 0.0, 0.0, 0.0, 100.0);
    }

    #[test]
    fn normalized_total_is_exactly_100() {
        let inputs = [
            Allocation::new(1.0, 1.0, 1.0, 0.0),
            Allocation::new(33.33, 33.33, 33.33, 0.01),
            Allocation::new(7.0, 13.0, 0.3, 91.0),
            Allocation::new(0.05, 0.05, 0.05, 0.05),
            Allocation::new(10.0, 20.0, 30.0, 40.0),
            Allocation::new(1e-3, 2e6, 3.7, 9.99),
        ];
        for input in inputs {
            let out = normalize_allocation(input);
            assert_eq!(out.total_tenths(), 1000, "{input:?} -> {out:?}");
            assert_eq!(out.total(), 100.0);
            for v in [out.a, out.b, out.c, out.d] {
                assert!(v >= 0.0);
                assert!(((v * 10.0).round() - v * 10.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn one_third_split_puts_residual_on_a() {
        let out = normalize_allocation(Allocation::new(1.0, 1.0, 1.0, 0.0));
        assert_alloc(out, 33.4, 33.3, 33.3, 0.0);
    }

    #[test]
    fn empty_allocation_normalizes_to_uniform() {
        assert_eq!(normalize_allocation(Allocation::new(0.0, 0.0, 0.0, 0.0)), Allocation::uniform());
        assert_eq!(normalize_allocation(Allocation::new(-5.0, f64::NAN, 0.0, 0.0)), Allocation::uniform());
    }

    #[test]
    fn rising_fps_never_adds_to_c_plus_d() {
        let config = engine_config();
        let engine = AllocationEngine::new(&config);
        for regime in Regime::ALL {
            for gps in [0.0, 0.5] {
                let mut previous = i64::MAX;
                for step in 0..=200 {
                    let fps = step as f64 / 200.0;
                    let out = engine.calculate(regime, fps, gps).allocation;
                    let cd = (out.c * 10.0).round() as i64 + (out.d * 10.0).round() as i64;
                    assert!(cd <= previous, "{regime} gps={gps} fps={fps}: C+D rose to {cd}");
                    previous = cd;
                }
            }
        }
    }

    #[test]
    fn tie_break_skips_extreme_regimes_and_non_neutral_fps() {
        let config = engine_config();
        let engine = AllocationEngine::new(&config);

        for regime in [Regime::MostLiquid, Regime::LeastLiquid] {
            let result = engine.calculate(regime, 0.1, 0.9);
            assert!(result.steps.iter().all(|s| s.step != StepKind::GpsTieBreak));
        }

        let result = engine.calculate(Regime::InBetweenPreferB, 0.3, 0.9);
        let tilted = result.steps.last().unwrap();
        assert_eq!(tilted.step, StepKind::FpsTilt);
        assert_eq!(result.allocation, tilted.allocation);
    }

    #[test]
    fn strong_growth_moves_b_to_c() {
        let config = engine_config();
        let result = AllocationEngine::new(&config).calculate(Regime::InBetweenPreferB, 0.0, 0.5);
        // B = 40: min(8, 7.5) = 7.5 moves to C.
        assert_alloc(result.allocation, 15.0, 32.5, 37.5, 15.0);
        let kinds: Vec<StepKind> = result.steps.iter().map(|s| s.step).collect();
        assert_eq!(kinds, vec![StepKind::Base, StepKind::GpsTieBreak]);
        assert_eq!(result.steps[1].gps, Some(0.5));
    }

    #[test]
    fn weak_growth_moves_c_to_b() {
        let config = engine_config();
        let result = AllocationEngine::new(&config).calculate(Regime::InBetweenPreferC, -0.1, -0.4);
        // fps -0.1 -> tilt -2.5: A 15 -> 12.5, the 25 tenths split 6/7/12 to
        // B/C/D: B 25.6, C 40.7, D 21.2. Then C -> B by min(40.7 * 0.2, 7.5).
        assert_alloc(result.allocation, 12.5, 33.1, 33.2, 21.2);
        assert_eq!(result.allocation.total_tenths(), 1000);
    }

    #[test]
    fn weak_gps_within_threshold_changes_nothing() {
        let out = apply_gps_tie_break(
            Allocation::new(15.0, 40.0, 30.0, 15.0),
            Some(Regime::InBetweenPreferB),
            0.0,
            0.3,
            &TieBreakConfig::default(),
        );
        assert_eq!(out, Allocation::new(15.0, 40.0, 30.0, 15.0));
    }

    #[test]
    fn unknown_label_falls_back_to_uniform() {
        let config = engine_config();
        let engine = AllocationEngine::new(&config);
        let result = engine.calculate_for_label("Sideways", 0.0, 0.9);
        assert_eq!(result.allocation, Allocation::uniform());
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].regime.as_deref(), Some("Sideways"));

        let parsed = engine.calculate_for_label("most-liquid", 0.4, 0.0);
        assert_alloc(parsed.allocation, 15.0, 22.5, 32.5, 30.0);
    }

    #[test]
    fn short_label_selects_the_regime_table() {
        let config = engine_config();
        let result = AllocationEngine::new(&config).calculate_for_label("Prefer B", 0.0, 0.5);
        assert_alloc(result.allocation, 15.0, 32.5, 37.5, 15.0);
        assert_eq!(result.steps[0].regime.as_deref(), Some("In Between (prefer B)"));
    }

    #[test]
    fn regime_missing_from_table_is_uniform() {
        let mut config = engine_config();
        config.base.remove(&Regime::LeastLiquid);
        let result = AllocationEngine::new(&config).calculate(Regime::LeastLiquid, 0.0, 0.0);
        assert_eq!(result.allocation, Allocation::uniform());
    }

    #[test]
    fn identical_inputs_give_identical_output() {
        let config = engine_config();
        let engine = AllocationEngine::new(&config);
        let a = engine.calculate(Regime::InBetweenPreferC, 0.13, 0.42);
        let b = engine.calculate(Regime::InBetweenPreferC, 0.13, 0.42);
        assert_eq!(a, b);
    }
}
