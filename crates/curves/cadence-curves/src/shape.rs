//! Curve shapes and the quadratic ease trajectory.
//!
//! A `CurveShape` describes the feel of a transition without pinning its
//! duration: how far a typical transition travels, how long that typical
//! transition takes, and how the acceleration is biased between the in and
//! out halves. `QuadraticEase` turns (current state, target state, shape)
//! into a concrete two-segment trajectory.

use serde::{Deserialize, Serialize};

/// Easing descriptor: typical travel, typical duration, in/out bias.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CurveShape {
    /// Distance a "typical" transition covers. Larger actual deltas get
    /// proportionally (square-root) more time.
    pub typical_delta_value: f32,
    /// Duration of that typical transition, in caller time units.
    pub typical_total_time: f32,
    /// Fraction of the duration spent accelerating, in (0, 1). 0.5 is a
    /// symmetric ease-in-ease-out.
    pub bias: f32,
}

impl Default for CurveShape {
    fn default() -> Self {
        Self {
            typical_delta_value: 1.0,
            typical_total_time: 1.0,
            bias: 0.5,
        }
    }
}

impl CurveShape {
    /// Duration for a transition of `delta` under this shape. Time scales
    /// with the square root of distance, the natural scaling for a
    /// bounded-acceleration trajectory.
    pub fn total_time_for(&self, delta: f32) -> f32 {
        if self.typical_delta_value <= 0.0 || self.typical_total_time <= 0.0 {
            return 0.0;
        }
        let scale = (delta.abs() / self.typical_delta_value).sqrt();
        self.typical_total_time * scale
    }
}

/// A two-segment piecewise-quadratic trajectory: accelerate to a peak
/// velocity over the biased first span, decelerate to the target velocity
/// over the rest. Evaluated in time local to the transition start.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuadraticEase {
    start_value: f32,
    start_velocity: f32,
    target_value: f32,
    target_velocity: f32,
    peak_velocity: f32,
    /// End of the acceleration segment.
    t_mid: f32,
    total_time: f32,
}

impl QuadraticEase {
    /// Build the trajectory from `(value, velocity)` toward
    /// `(target_value, target_velocity)` with the duration chosen by `shape`.
    pub fn between(
        value: f32,
        velocity: f32,
        target_value: f32,
        target_velocity: f32,
        shape: &CurveShape,
    ) -> Self {
        let delta = target_value - value;
        let total_time = shape.total_time_for(delta);
        if total_time <= 0.0 {
            // Degenerate shape or zero travel: arrive immediately.
            return Self {
                start_value: target_value,
                target_value,
                target_velocity,
                ..Self::default()
            };
        }
        let bias = shape.bias.clamp(0.01, 0.99);
        let t_mid = total_time * bias;
        // Peak velocity that makes the two quadratic spans cover `delta`:
        //   (v0 + vp)/2 * t_mid + (vp + v1)/2 * (total - t_mid) == delta
        let peak_velocity = 2.0 * delta / total_time
            - velocity * bias
            - target_velocity * (1.0 - bias);
        Self {
            start_value: value,
            start_velocity: velocity,
            target_value,
            target_velocity,
            peak_velocity,
            t_mid,
            total_time,
        }
    }

    #[inline]
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    #[inline]
    pub fn target_value(&self) -> f32 {
        self.target_value
    }

    #[inline]
    pub fn target_velocity(&self) -> f32 {
        self.target_velocity
    }

    /// Position at local time `t`. Past `total_time` holds the target.
    pub fn evaluate(&self, t: f32) -> f32 {
        if t <= 0.0 {
            return self.start_value;
        }
        if t >= self.total_time {
            return self.target_value;
        }
        if t < self.t_mid {
            let a = self.accel_in();
            self.start_value + self.start_velocity * t + 0.5 * a * t * t
        } else {
            // Integrate the deceleration span backward from the target so
            // the endpoint is exact.
            let r = self.total_time - t;
            let a = self.accel_out();
            self.target_value - self.target_velocity * r - 0.5 * a * r * r
        }
    }

    /// Velocity at local time `t`. Past `total_time` holds the target
    /// velocity.
    pub fn velocity(&self, t: f32) -> f32 {
        if t <= 0.0 {
            return self.start_velocity;
        }
        if t >= self.total_time {
            return self.target_velocity;
        }
        if t < self.t_mid {
            self.start_velocity + self.accel_in() * t
        } else {
            self.peak_velocity + self.accel_out() * (t - self.t_mid)
        }
    }

    #[inline]
    fn accel_in(&self) -> f32 {
        if self.t_mid <= 0.0 {
            0.0
        } else {
            (self.peak_velocity - self.start_velocity) / self.t_mid
        }
    }

    #[inline]
    fn accel_out(&self) -> f32 {
        let span = self.total_time - self.t_mid;
        if span <= 0.0 {
            0.0
        } else {
            (self.target_velocity - self.peak_velocity) / span
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    /// it should start and end on the requested states
    #[test]
    fn endpoints_exact() {
        let shape = CurveShape {
            typical_delta_value: 4.0,
            typical_total_time: 2.0,
            bias: 0.5,
        };
        let e = QuadraticEase::between(1.0, 0.5, 5.0, 0.0, &shape);
        approx(e.evaluate(0.0), 1.0, 1e-6);
        approx(e.velocity(0.0), 0.5, 1e-6);
        approx(e.evaluate(e.total_time()), 5.0, 1e-4);
        approx(e.velocity(e.total_time()), 0.0, 1e-4);
    }

    /// it should pass the midpoint of a symmetric rest-to-rest ease
    #[test]
    fn symmetric_midpoint() {
        let shape = CurveShape::default();
        let e = QuadraticEase::between(0.0, 0.0, 1.0, 0.0, &shape);
        approx(e.total_time(), 1.0, 1e-6);
        approx(e.evaluate(0.5), 0.5, 1e-5);
        // Peak velocity of the symmetric case is 2*delta/total.
        approx(e.velocity(0.5), 2.0, 1e-5);
    }

    /// it should scale duration with the square root of travel distance
    #[test]
    fn duration_scales_with_distance() {
        let shape = CurveShape::default();
        let near = QuadraticEase::between(0.0, 0.0, 1.0, 0.0, &shape);
        let far = QuadraticEase::between(0.0, 0.0, 4.0, 0.0, &shape);
        approx(far.total_time() / near.total_time(), 2.0, 1e-5);
    }

    /// it should arrive immediately when already at the target
    #[test]
    fn zero_travel_is_immediate() {
        let e = QuadraticEase::between(3.0, 0.0, 3.0, 0.0, &CurveShape::default());
        approx(e.total_time(), 0.0, 0.0);
        approx(e.evaluate(0.0), 3.0, 0.0);
        approx(e.evaluate(1.0), 3.0, 0.0);
    }

    /// it should hold the target past the end of the trajectory
    #[test]
    fn holds_after_completion() {
        let e = QuadraticEase::between(0.0, 0.0, 2.0, 0.0, &CurveShape::default());
        let t = e.total_time() + 5.0;
        approx(e.evaluate(t), 2.0, 0.0);
        approx(e.velocity(t), 0.0, 0.0);
    }
}
