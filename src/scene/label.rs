// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Duration labels shown on note bodies

/// Largest denominator a label will show
const MAX_DENOMINATOR: i64 = 16;

/// Format a length in beats as a reduced fraction: `1`, `3/4`, `5/2`.
pub fn beats_label(beats: f64) -> String {
    if !beats.is_finite() {
        return "?".to_string();
    }

    let (mut num, mut den) = (beats.round() as i64, 1i64);
    let mut best_err = (beats - num as f64).abs();
    for d in 2..=MAX_DENOMINATOR {
        let n = (beats * d as f64).round() as i64;
        let err = (beats - n as f64 / d as f64).abs();
        if err + 1e-9 < best_err {
            best_err = err;
            num = n;
            den = d;
        }
    }

    let g = gcd(num.abs(), den);
    if g > 1 {
        num /= g;
        den /= g;
    }
    if den == 1 {
        num.to_string()
    } else {
        format!("{num}/{den}")
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}
