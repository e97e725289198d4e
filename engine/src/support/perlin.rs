// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Perlin (gradient) noise.
//!
//! Grounded on `KPerlin`: Ken Perlin's 2002 "improved noise" reference
//! permutation table and fade curve, with the addition of wrapping the
//! lattice coordinates for tileable noise (`*_wrap` parameters, `0` meaning
//! "don't wrap"). The raw noise (nominally in `-1.0..=1.0`, though the
//! improved-noise gradient set can slightly overshoot that range) is remapped
//! into `lower..upper` before being returned, so callers never see the raw
//! range.

use libm::floorf;

// Ken Perlin's reference permutation table, duplicated so lookups never need
// to wrap the index themselves.
#[rustfmt::skip]
const PERM: [u8; 256] = [
    151,160,137,91,90,15,131,13,201,95,96,53,194,233,7,225,
    140,36,103,30,69,142,8,99,37,240,21,10,23,190,6,148,
    247,120,234,75,0,26,197,62,94,252,219,203,117,35,11,32,
    57,177,33,88,237,149,56,87,174,20,125,136,171,168,68,175,
    74,165,71,134,139,48,27,166,77,146,158,231,83,111,229,122,
    60,211,133,230,220,105,92,41,55,46,245,40,244,102,143,54,
    65,25,63,161,1,216,80,73,209,76,132,187,208,89,18,169,
    200,196,135,130,116,188,159,86,164,100,109,198,173,186,3,64,
    52,217,226,250,124,123,5,202,38,147,118,126,255,82,85,212,
    207,206,59,227,47,16,58,17,182,189,28,42,223,183,170,213,
    119,248,152,2,44,154,163,70,221,153,101,155,167,43,172,9,
    129,22,39,253,19,98,108,110,79,113,224,232,178,185,112,104,
    218,246,97,228,251,34,242,193,238,210,144,12,191,179,162,241,
    81,51,145,235,249,14,239,107,49,192,214,31,181,199,106,157,
    184,84,204,176,215,61,156,180,151,160,137,91,90,15,131,13,
    201,95,96,53,194,233,7,225,140,36,103,30,69,142,8,99,
];

fn perm(i: i32) -> i32 {
    PERM[(i & 255) as usize] as i32
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

/// Gradient function for the 12 cube-edge-midpoint directions used by Ken
/// Perlin's reference implementation (`grad` in the 2002 SIGGRAPH paper).
fn grad(hash: i32, x: f32, y: f32, z: f32) -> f32 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

fn wrap_coord(i: i32, wrap: i32) -> i32 {
    if wrap > 0 {
        i.rem_euclid(wrap)
    } else {
        i
    }
}

/// Raw 3D improved Perlin noise, nominally in `-1.0..=1.0`. `x_wrap`/`y_wrap`/
/// `z_wrap` make the lattice repeat with that period along the respective
/// axis; `0` means no wrapping.
fn raw_noise3(x: f32, y: f32, z: f32, x_wrap: i32, y_wrap: i32, z_wrap: i32) -> f32 {
    let xi0 = wrap_coord(floorf(x) as i32, x_wrap);
    let yi0 = wrap_coord(floorf(y) as i32, y_wrap);
    let zi0 = wrap_coord(floorf(z) as i32, z_wrap);
    let xi1 = wrap_coord(xi0 + 1, x_wrap);
    let yi1 = wrap_coord(yi0 + 1, y_wrap);
    let zi1 = wrap_coord(zi0 + 1, z_wrap);

    let xf = x - floorf(x);
    let yf = y - floorf(y);
    let zf = z - floorf(z);

    let u = fade(xf);
    let v = fade(yf);
    let w = fade(zf);

    // Hash each of the 8 cube corners surrounding (x, y, z) down to a
    // permutation-table index, using the explicitly wrapped lattice
    // coordinates rather than the reference implementation's unwrapped
    // `+1`s (which only works because its wrap period is fixed at 256).
    let a0 = perm(xi0) + yi0;
    let a1 = perm(xi0) + yi1;
    let b0 = perm(xi1) + yi0;
    let b1 = perm(xi1) + yi1;

    let aaa = perm(perm(a0) + zi0);
    let aba = perm(perm(a1) + zi0);
    let baa = perm(perm(b0) + zi0);
    let bba = perm(perm(b1) + zi0);
    let aab = perm(perm(a0) + zi1);
    let abb = perm(perm(a1) + zi1);
    let bab = perm(perm(b0) + zi1);
    let bbb = perm(perm(b1) + zi1);

    lerp(
        w,
        lerp(
            v,
            lerp(u, grad(aaa, xf, yf, zf), grad(baa, xf - 1.0, yf, zf)),
            lerp(u, grad(aba, xf, yf - 1.0, zf), grad(bba, xf - 1.0, yf - 1.0, zf)),
        ),
        lerp(
            v,
            lerp(u, grad(aab, xf, yf, zf - 1.0), grad(bab, xf - 1.0, yf, zf - 1.0)),
            lerp(u, grad(abb, xf, yf - 1.0, zf - 1.0), grad(bbb, xf - 1.0, yf - 1.0, zf - 1.0)),
        ),
    )
}

fn remap(raw: f32, lower: f32, upper: f32) -> f32 {
    let clamped = raw.clamp(-1.0, 1.0);
    lower + (upper - lower) * (clamped + 1.0) / 2.0
}

/// 1D Perlin noise (evaluated as a slice of the 3D field at `y = z = 0`),
/// remapped from its nominal `-1.0..=1.0` range into `lower..upper`.
pub fn perlin1d(lower: f32, upper: f32, x: f32, x_wrap: i32) -> f32 {
    remap(raw_noise3(x, 0.0, 0.0, x_wrap, 0, 0), lower, upper)
}

/// 2D Perlin noise, remapped into `lower..upper`.
pub fn perlin2d(lower: f32, upper: f32, x: f32, y: f32, x_wrap: i32, y_wrap: i32) -> f32 {
    remap(raw_noise3(x, y, 0.0, x_wrap, y_wrap, 0), lower, upper)
}

/// 3D Perlin noise, remapped into `lower..upper`.
pub fn perlin3d(
    lower: f32,
    upper: f32,
    x: f32,
    y: f32,
    z: f32,
    x_wrap: i32,
    y_wrap: i32,
    z_wrap: i32,
) -> f32 {
    remap(raw_noise3(x, y, z, x_wrap, y_wrap, z_wrap), lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_remapped_bounds() {
        let mut x = 0.0;
        while x < 20.0 {
            let v = perlin1d(-5.0, 5.0, x, 0);
            assert!((-5.0..=5.0).contains(&v), "{v} out of bounds at x={x}");
            x += 0.37;
        }
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(perlin2d(0.0, 1.0, 1.25, 3.5, 0, 0), perlin2d(0.0, 1.0, 1.25, 3.5, 0, 0));
    }

    #[test]
    fn lattice_points_are_zero() {
        // Ken Perlin's improved noise is zero at integer lattice points,
        // since the gradient contributions from each corner vanish there.
        let v = raw_noise3(4.0, -2.0, 7.0, 0, 0, 0);
        assert!(v.abs() < 1e-5, "expected ~0 at a lattice point, got {v}");
    }

    #[test]
    fn wrapping_repeats_the_field() {
        let a = perlin2d(0.0, 1.0, 0.3, 0.7, 4, 4);
        let b = perlin2d(0.0, 1.0, 4.3, 0.7, 4, 4);
        assert!((a - b).abs() < 1e-4, "expected period-4 wrap to repeat, {a} vs {b}");
    }

    #[test]
    fn varies_smoothly_over_small_steps() {
        let a = perlin3d(0.0, 1.0, 0.1, 0.1, 0.1, 0, 0, 0);
        let b = perlin3d(0.0, 1.0, 0.11, 0.1, 0.1, 0, 0, 0);
        assert!((a - b).abs() < 0.1, "small step produced a large jump: {a} vs {b}");
    }
}
