//! Cubic polynomial segments.
//!
//! A `CubicCurve` is one segment of a spline: a polynomial
//! `y(x) = c0 + c1*x + c2*x^2 + c3*x^3` over local `x` in `[0, width_x]`,
//! initialized from the values and derivatives at both endpoints.

use serde::{Deserialize, Serialize};

/// Endpoint conditions for one cubic segment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CubicInit {
    pub start_y: f32,
    pub start_derivative: f32,
    pub end_y: f32,
    pub end_derivative: f32,
    /// Segment width in spline-local x. Non-positive widths degenerate to a
    /// constant curve at `start_y`.
    pub width_x: f32,
}

/// One cubic segment, evaluated in local x (0 at the segment start).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CubicCurve {
    c0: f32,
    c1: f32,
    c2: f32,
    c3: f32,
}

impl CubicCurve {
    /// Solve the coefficients that satisfy `init` at both endpoints.
    pub fn new(init: &CubicInit) -> Self {
        let w = init.width_x;
        if w <= 0.0 || !w.is_finite() {
            return Self {
                c0: init.start_y,
                ..Self::default()
            };
        }
        let c0 = init.start_y;
        let c1 = init.start_derivative;
        // Remaining rise after the linear term, and the two tail conditions.
        let d = init.end_y - c0 - c1 * w;
        let c3 = (init.end_derivative - c1 - 2.0 * d / w) / (w * w);
        let c2 = d / (w * w) - c3 * w;
        Self { c0, c1, c2, c3 }
    }

    #[inline]
    pub fn evaluate(&self, x: f32) -> f32 {
        self.c0 + x * (self.c1 + x * (self.c2 + x * self.c3))
    }

    #[inline]
    pub fn derivative(&self, x: f32) -> f32 {
        self.c1 + x * (2.0 * self.c2 + 3.0 * self.c3 * x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    /// it should hit both endpoint values and derivatives
    #[test]
    fn endpoint_conditions_hold() {
        let init = CubicInit {
            start_y: 1.0,
            start_derivative: 0.5,
            end_y: 4.0,
            end_derivative: -2.0,
            width_x: 3.0,
        };
        let c = CubicCurve::new(&init);
        approx(c.evaluate(0.0), 1.0, 1e-5);
        approx(c.derivative(0.0), 0.5, 1e-5);
        approx(c.evaluate(3.0), 4.0, 1e-4);
        approx(c.derivative(3.0), -2.0, 1e-4);
    }

    /// it should degenerate to a constant when the width is not positive
    #[test]
    fn zero_width_is_constant() {
        let init = CubicInit {
            start_y: 7.0,
            start_derivative: 1.0,
            end_y: 9.0,
            end_derivative: 1.0,
            width_x: 0.0,
        };
        let c = CubicCurve::new(&init);
        approx(c.evaluate(0.0), 7.0, 0.0);
        approx(c.evaluate(10.0), 7.0, 0.0);
    }

    /// it should reduce to a straight line when derivatives match the slope
    #[test]
    fn linear_when_derivatives_agree() {
        let init = CubicInit {
            start_y: 0.0,
            start_derivative: 2.0,
            end_y: 2.0,
            end_derivative: 2.0,
            width_x: 1.0,
        };
        let c = CubicCurve::new(&init);
        approx(c.evaluate(0.25), 0.5, 1e-5);
        approx(c.evaluate(0.75), 1.5, 1e-5);
        approx(c.derivative(0.5), 2.0, 1e-5);
    }
}
