//! Common types and traits for container-local geometry.
//!
//! Positions use the loading planner's axis convention: `x` runs along the
//! container length, `y` is height and `z` runs across the width.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Relative slack applied to inclusive tolerance checks.
///
/// Scaled by the magnitude of the limit being compared against.
pub const EPSILON_BOUNDARY: f64 = 1e-9;

/// Represents a 3D vector or point in container-local space.
///
/// # Examples
/// ```
/// use freight_cg::types::Vec3;
///
/// let position = Vec3::new(3.0, 0.0, 1.2);
/// assert_eq!(position.floor_xz(), (3.0, 1.2));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "x": 3.0, "y": 0.0, "z": 1.2 }))]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - X component (length axis)
    /// * `y` - Y component (height)
    /// * `z` - Z component (width axis)
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Projects the point onto the floor plane (length × width).
    #[inline]
    pub const fn floor_xz(&self) -> (f64, f64) {
        (self.x, self.z)
    }
}

/// Trait for objects with a position in container space.
pub trait Positioned {
    /// Returns the reference point used for moment calculations.
    fn position(&self) -> Vec3;
}

/// Trait for objects with weight.
pub trait Weighted {
    /// Returns the effective weight in kg (zero when unknown).
    fn weight(&self) -> f64;
}

/// Floor-plane moment accumulator.
///
/// Collects weighted `x`/`z` positions; points without positive weight are
/// ignored so that they never contribute to the centroid.
#[derive(Clone, Debug, Default)]
pub struct MomentAccumulator {
    moment_x: f64,
    moment_z: f64,
    total_weight: f64,
}

impl MomentAccumulator {
    /// Creates a new accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a weighted point, skipping non-positive or non-finite weights.
    ///
    /// # Returns
    /// `true` if the point contributed to the moments
    pub fn add_point(&mut self, x: f64, z: f64, weight: f64) -> bool {
        if !(weight.is_finite() && weight > 0.0) {
            return false;
        }
        self.moment_x += weight * x;
        self.moment_z += weight * z;
        self.total_weight += weight;
        true
    }

    /// Adds anything that has both a position and a weight.
    pub fn add<T: Positioned + Weighted + ?Sized>(&mut self, item: &T) -> bool {
        let (x, z) = item.position().floor_xz();
        self.add_point(x, z, item.weight())
    }

    /// Sum of all accepted weights.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Calculates the weighted centroid.
    ///
    /// # Returns
    /// `Some((x, z))` for a loaded floor, `None` if no weight is present
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.total_weight <= 0.0 {
            None
        } else {
            Some((
                self.moment_x / self.total_weight,
                self.moment_z / self.total_weight,
            ))
        }
    }
}

/// Inclusive `|value| <= limit` check with a small relative slack.
#[inline]
pub fn within_inclusive(value: f64, limit: f64) -> bool {
    value.abs() <= limit + EPSILON_BOUNDARY * limit.abs().max(1.0)
}
