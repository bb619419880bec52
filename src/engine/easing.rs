//! Easing curves mapping segment progress `t ∈ [0, 1]` to blend weight.

use crate::model::{EasingParams, InterpolationSegment, InterpolationType};

/// Newton iterations before falling back to bisection.
const NEWTON_ITERATIONS: usize = 8;

/// Bisection iterations for the fallback solve.
const BISECTION_ITERATIONS: usize = 40;

/// Solve tolerance on the curve's x coordinate.
const EPSILON: f64 = 1e-7;

/// Blend weight for a segment at progress `t`.
pub fn ease(segment: &InterpolationSegment, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    match segment.kind {
        InterpolationType::Linear => t,
        InterpolationType::Hold => {
            if t >= 1.0 {
                1.0
            } else {
                0.0
            }
        }
        _ => match segment.effective_easing() {
            Some(params) => cubic_bezier(&params, t),
            None => t,
        },
    }
}

/// Evaluate a CSS-style cubic Bézier timing curve at time `t`.
///
/// The curve is parameterised by `s`; we first find `s` with `x(s) = t`, then
/// return `y(s)`. `x1`/`x2` are clamped to `[0, 1]` so `x(s)` is monotonic.
pub fn cubic_bezier(params: &EasingParams, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let x1 = params.x1.clamp(0.0, 1.0);
    let x2 = params.x2.clamp(0.0, 1.0);
    let s = solve_curve_x(x1, x2, t);
    bezier_component(params.y1, params.y2, s)
}

/// One coordinate of a cubic Bézier from 0 to 1 with inner control values `c1`, `c2`.
fn bezier_component(c1: f64, c2: f64, s: f64) -> f64 {
    let inv = 1.0 - s;
    3.0 * inv * inv * s * c1 + 3.0 * inv * s * s * c2 + s * s * s
}

fn bezier_derivative(c1: f64, c2: f64, s: f64) -> f64 {
    let inv = 1.0 - s;
    3.0 * inv * inv * c1 + 6.0 * inv * s * (c2 - c1) + 3.0 * s * s * (1.0 - c2)
}

fn solve_curve_x(x1: f64, x2: f64, t: f64) -> f64 {
    let mut s = t;
    for _ in 0..NEWTON_ITERATIONS {
        let err = bezier_component(x1, x2, s) - t;
        if err.abs() < EPSILON {
            return s;
        }
        let d = bezier_derivative(x1, x2, s);
        if d.abs() < 1e-6 {
            break;
        }
        s -= err / d;
    }

    let (mut lo, mut hi) = (0.0, 1.0);
    s = t;
    for _ in 0..BISECTION_ITERATIONS {
        let x = bezier_component(x1, x2, s);
        if (x - t).abs() < EPSILON {
            break;
        }
        if x < t {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) / 2.0;
    }
    s
}
