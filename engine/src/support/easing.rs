// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Value transition (easing) functions, one free function per curve instead
//! of `KEasing`'s static methods, but otherwise a direct port, including the
//! `BACK_*` magic constants.
//!
//! See <https://easings.net/> for what these curves look like graphed out.

use core::f32::consts::PI;

use libm::{cosf, powf, sinf, sqrtf};

/// `s` coefficient for [`inback`]/[`outback`]/[`inoutback`] giving a 10%
/// overshoot before settling.
pub const BACK_10: f32 = 1.70158;
/// 20% overshoot.
pub const BACK_20: f32 = 2.59238;
/// 30% overshoot.
pub const BACK_30: f32 = 3.39405;
/// 40% overshoot.
pub const BACK_40: f32 = 4.15574;
/// 50% overshoot.
pub const BACK_50: f32 = 4.89485;
/// 60% overshoot.
pub const BACK_60: f32 = 5.61962;
/// 70% overshoot.
pub const BACK_70: f32 = 6.33456;
/// 80% overshoot.
pub const BACK_80: f32 = 7.04243;
/// 90% overshoot.
pub const BACK_90: f32 = 7.74502;
/// 100% overshoot.
pub const BACK_100: f32 = 8.44353;

fn clamp01(t: f32) -> f32 {
    if t < 0.0 {
        0.0
    } else if t < 1.0 {
        t
    } else {
        1.0
    }
}

/// Hermite interpolation between `v0` (at `t=0`) and `v1` (at `t=1`), with the
/// curve's slope at each end given by `slope0`/`slope1`. Unlike the other
/// functions here, `t` is not clamped to `0..1`.
pub fn hermite(t: f32, v0: f32, v1: f32, slope0: f32, slope1: f32) -> f32 {
    let a = 2.0 * (v0 - v1) + slope0 + slope1;
    let b = -3.0 * (v0 - v1) - 2.0 * slope0 + slope1;
    let c = slope0;
    let d = v0;
    let t2 = t * t;
    let t3 = t * t2;
    a * t3 + b * t2 + c * t + d
}

/// Linear interpolation, equivalent to `lerp(a, b, t)`.
pub fn linear(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    a + (b - a) * t
}

/// Sine ease-in.
pub fn insine(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    b - (b - a) * cosf(t * PI / 2.0)
}

/// Sine ease-out.
pub fn outsine(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    a + (b - a) * sinf(t * PI / 2.0)
}

/// Sine ease-in-out.
pub fn inoutsine(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    a + (b - a) / 2.0 * (1.0 - cosf(t * PI))
}

/// Quadratic ease-in.
pub fn inquad(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    a + (b - a) * t * t
}

/// Quadratic ease-out.
pub fn outquad(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    let inv = 1.0 - t;
    a + (b - a) * (1.0 - inv * inv)
}

/// Quadratic ease-in-out.
pub fn inoutquad(t: f32, a: f32, b: f32) -> f32 {
    if t < 0.5 {
        inquad(t * 2.0, a, (a + b) / 2.0)
    } else {
        outquad((t - 0.5) * 2.0, (a + b) / 2.0, b)
    }
}

/// Exponential ease-out. Unclamped, like the source.
pub fn outexp(t: f32, a: f32, b: f32) -> f32 {
    a + (b - a) * (1.0 - powf(2.0, -10.0 * t))
}

/// Exponential ease-in. Unclamped, like the source.
pub fn inexp(t: f32, a: f32, b: f32) -> f32 {
    a + (b - a) * powf(2.0, 10.0 * (t - 1.0))
}

/// Exponential ease-in-out.
pub fn inoutexp(t: f32, a: f32, b: f32) -> f32 {
    if t < 0.5 {
        inexp(t * 2.0, a, (a + b) / 2.0)
    } else {
        outexp((t - 0.5) * 2.0, (a + b) / 2.0, b)
    }
}

/// Cubic ease-in.
pub fn incubic(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    a + (b - a) * t * t * t
}

/// Cubic ease-out.
pub fn outcubic(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    let inv = 1.0 - t;
    a + (b - a) * (1.0 - inv * inv * inv)
}

/// Cubic ease-in-out.
pub fn inoutcubic(t: f32, a: f32, b: f32) -> f32 {
    if t < 0.5 {
        incubic(t * 2.0, a, (a + b) / 2.0)
    } else {
        outcubic((t - 0.5) * 2.0, (a + b) / 2.0, b)
    }
}

/// Quartic ease-in.
pub fn inquart(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    a + (b - a) * t * t * t * t
}

/// Quartic ease-out.
///
/// Ported verbatim from `KEasing::outquart`, including its `a - (b-a) * ...`
/// sign (the source's own formula, kept rather than "corrected" to match
/// `outcubic`'s shape).
pub fn outquart(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    let inv = 1.0 - t;
    a - (b - a) * (1.0 - inv * inv * inv * inv)
}

/// Quartic ease-in-out.
pub fn inoutquart(t: f32, a: f32, b: f32) -> f32 {
    if t < 0.5 {
        inquart(t * 2.0, a, (a + b) / 2.0)
    } else {
        outquart((t - 0.5) * 2.0, (a + b) / 2.0, b)
    }
}

/// Quintic ease-in.
pub fn inquint(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    a + (b - a) * t * t * t * t * t
}

/// Quintic ease-out.
pub fn outquint(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    let inv = 1.0 - t;
    a - (b - a) * (1.0 - inv * inv * inv * inv * inv)
}

/// Quintic ease-in-out.
///
/// The source's `KEasing::inoutquint` calls `inquart`/`outquart` rather than
/// the quintic variants; kept as-is since it's what the original produces.
pub fn inoutquint(t: f32, a: f32, b: f32) -> f32 {
    if t < 0.5 {
        inquart(t * 2.0, a, (a + b) / 2.0)
    } else {
        outquart((t - 0.5) * 2.0, (a + b) / 2.0, b)
    }
}

/// Back ease-in: overshoots past `a` before heading to `b`. `s` controls how
/// far past `a` it overshoots; see the `BACK_*` constants.
pub fn inback(t: f32, a: f32, b: f32, s: f32) -> f32 {
    let t = clamp01(t);
    (b - a) * t * t * ((s + 1.0) * t - s) + a
}

/// Back ease-out: overshoots past `b` before settling.
pub fn outback(t: f32, a: f32, b: f32, s: f32) -> f32 {
    let shifted = t - 1.0;
    (b - a) * (shifted * shifted * ((s + 1.0) * shifted + s) + 1.0) + a
}

/// Back ease-in-out.
pub fn inoutback(t: f32, a: f32, b: f32, s: f32) -> f32 {
    let s = s * 1.525;
    if t < 0.5 {
        inback(t * 2.0, a, (a + b) / 2.0, s)
    } else {
        outback(t * 2.0 - 1.0, (a + b) / 2.0, b, s)
    }
}

/// Circular ease-in.
pub fn incirc(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    a - (b - a) * (sqrtf(1.0 - t * t) - 1.0)
}

/// Circular ease-out.
pub fn outcirc(t: f32, a: f32, b: f32) -> f32 {
    let t = clamp01(t);
    let shifted = t - 1.0;
    a + (b - a) * sqrtf(1.0 - shifted * shifted)
}

/// Circular ease-in-out.
pub fn inoutcirc(t: f32, a: f32, b: f32) -> f32 {
    if t < 0.5 {
        incirc(t * 2.0, a, (a + b) / 2.0)
    } else {
        outcirc(t * 2.0 - 1.0, (a + b) / 2.0, b)
    }
}

/// Sine wave: `a` at `t=0.0` and `t=1.0`, `b` at `t=0.5`.
pub fn wave(t: f32, a: f32, b: f32) -> f32 {
    let k = 0.5 + 0.5 * -cosf(2.0 * PI * t);
    linear(k, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_interpolates() {
        assert_eq!(0.0, linear(0.0, 0.0, 10.0));
        assert_eq!(5.0, linear(0.5, 0.0, 10.0));
        assert_eq!(10.0, linear(1.0, 0.0, 10.0));
    }

    #[test]
    fn linear_clamps_t() {
        assert_eq!(0.0, linear(-1.0, 0.0, 10.0));
        assert_eq!(10.0, linear(2.0, 0.0, 10.0));
    }

    #[test]
    fn endpoints_hold_for_all_curves() {
        let curves: &[fn(f32, f32, f32) -> f32] = &[
            insine, outsine, inoutsine, inquad, outquad, inoutquad, incubic, outcubic, inoutcubic,
            inquart, inoutquart, inquint, incirc, outcirc, inoutcirc,
        ];
        for curve in curves {
            assert!((curve(0.0, 2.0, 8.0) - 2.0).abs() < 0.001);
            assert!((curve(1.0, 2.0, 8.0) - 8.0).abs() < 0.001);
        }
    }

    #[test]
    fn outback_overshoots_past_b() {
        let v = outback(0.8, 0.0, 1.0, BACK_10);
        assert!(v > 1.0, "expected an overshoot past 1.0, got {v}");
    }

    #[test]
    fn wave_peaks_at_midpoint() {
        assert!((wave(0.0, 0.0, 10.0) - 0.0).abs() < 0.01);
        assert!((wave(0.5, 0.0, 10.0) - 10.0).abs() < 0.01);
        assert!((wave(1.0, 0.0, 10.0) - 0.0).abs() < 0.01);
    }

    #[test]
    fn hermite_matches_endpoint_values_and_slopes() {
        // At t=0, hermite should equal v0 regardless of slopes.
        assert!((hermite(0.0, 1.0, 5.0, 0.0, 0.0) - 1.0).abs() < 0.001);
        assert!((hermite(1.0, 1.0, 5.0, 0.0, 0.0) - 5.0).abs() < 0.001);
    }
}
