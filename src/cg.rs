//! Center-of-gravity engine.
//!
//! Aggregates the weight and floor position of every placed item into a
//! weighted centroid and classifies the load as balanced or unbalanced:
//! - Items without positive weight are inert (kept, but skipped in the moments)
//! - An empty or weightless load reports the container center and is balanced
//! - Both axes must stay inside their tolerance band for a balanced verdict
//!
//! The engine is a pure function, linear in the number of items and cheap
//! enough to run on every layout change.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::model::{ContainerDimensions, PlacedItem, ValidationError};
use crate::types::{MomentAccumulator, within_inclusive};

/// Allowed CG offset from the container center, as a share of each dimension.
///
/// The length band (axle loads) is narrower than the lateral band.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "length_ratio": 0.15, "width_ratio": 0.2 }))]
pub struct BalanceTolerance {
    /// Share of the container length the CG may drift along `x`
    pub length_ratio: f64,
    /// Share of the container width the CG may drift along `z`
    pub width_ratio: f64,
}

impl BalanceTolerance {
    pub const DEFAULT_LENGTH_RATIO: f64 = 0.15;
    pub const DEFAULT_WIDTH_RATIO: f64 = 0.20;

    /// Creates a validated tolerance; both ratios must lie within `[0, 1]`.
    pub fn new(length_ratio: f64, width_ratio: f64) -> Result<Self, ValidationError> {
        let tolerance = Self {
            length_ratio,
            width_ratio,
        };
        tolerance.validate()?;
        Ok(tolerance)
    }

    /// Checks that both ratios lie within `[0, 1]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, ratio) in [
            ("Length ratio", self.length_ratio),
            ("Width ratio", self.width_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ValidationError::InvalidTolerance(format!(
                    "{} must be between 0 and 1, got: {}",
                    name, ratio
                )));
            }
        }
        Ok(())
    }

    /// Absolute tolerances `(x, z)` for the given container.
    #[inline]
    pub fn axis_limits(&self, dims: &ContainerDimensions) -> (f64, f64) {
        (
            dims.length * self.length_ratio,
            dims.width * self.width_ratio,
        )
    }
}

impl Default for BalanceTolerance {
    fn default() -> Self {
        Self {
            length_ratio: Self::DEFAULT_LENGTH_RATIO,
            width_ratio: Self::DEFAULT_WIDTH_RATIO,
        }
    }
}

/// Signed CG offset from the container center, in percent of each dimension.
///
/// Positive `x` means the CG moved toward the far (rear) end, positive `z`
/// toward the far side wall.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Deviation {
    pub x: f64,
    pub z: f64,
}

/// Per-axis outcome of the tolerance check.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AxisBalance {
    pub x: bool,
    pub z: bool,
}

/// Center of gravity of a load.
///
/// # Fields
/// * `x` - CG along the container length
/// * `z` - CG across the container width
/// * `total_weight` - Sum of all positive item weights in kg
/// * `is_balanced` - Both axes within tolerance
/// * `deviation` - Signed offset in percent, absent for a weightless load
#[derive(Copy, Clone, Debug, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "x": 6.0,
    "z": 1.2,
    "total_weight": 1000.0,
    "is_balanced": true,
    "deviation": { "x": 0.0, "z": 0.0 }
}))]
pub struct CgResult {
    pub x: f64,
    pub z: f64,
    pub total_weight: f64,
    pub is_balanced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<Deviation>,
}

impl CgResult {
    /// Neutral result for a load without weight: the floor center, balanced.
    fn unloaded(dims: &ContainerDimensions) -> Self {
        let (x, z) = dims.floor_center();
        Self {
            x,
            z,
            total_weight: 0.0,
            is_balanced: true,
            deviation: None,
        }
    }

    /// Whether any item contributed weight.
    pub fn is_loaded(&self) -> bool {
        self.total_weight > 0.0
    }

    /// Re-evaluates the tolerance check for each axis separately.
    pub fn axis_balance(
        &self,
        dims: &ContainerDimensions,
        tolerance: &BalanceTolerance,
    ) -> AxisBalance {
        if !self.is_loaded() {
            return AxisBalance { x: true, z: true };
        }
        let (ideal_x, ideal_z) = dims.floor_center();
        let (tolerance_x, tolerance_z) = tolerance.axis_limits(dims);
        AxisBalance {
            x: within_inclusive(self.x - ideal_x, tolerance_x),
            z: within_inclusive(self.z - ideal_z, tolerance_z),
        }
    }
}

/// Computes the center of gravity with the default tolerances (15 % / 20 %).
///
/// # Parameters
/// * `items` - Placed items; weights are resolved per item
/// * `dims` - Container dimensions, assumed positive
pub fn compute_center_of_gravity(items: &[PlacedItem], dims: &ContainerDimensions) -> CgResult {
    compute_center_of_gravity_with(items, dims, &BalanceTolerance::default())
}

/// Computes the center of gravity with explicit tolerance ratios.
///
/// Dimensions are not validated here; zero or negative lengths produce
/// meaningless centroids and must be rejected by the caller.
pub fn compute_center_of_gravity_with(
    items: &[PlacedItem],
    dims: &ContainerDimensions,
    tolerance: &BalanceTolerance,
) -> CgResult {
    let mut moments = MomentAccumulator::new();
    for item in items {
        moments.add(item);
    }

    let Some((cg_x, cg_z)) = moments.centroid() else {
        return CgResult::unloaded(dims);
    };

    let (ideal_x, ideal_z) = dims.floor_center();
    let (tolerance_x, tolerance_z) = tolerance.axis_limits(dims);

    let is_balanced = within_inclusive(cg_x - ideal_x, tolerance_x)
        && within_inclusive(cg_z - ideal_z, tolerance_z);

    CgResult {
        x: cg_x,
        z: cg_z,
        total_weight: moments.total_weight(),
        is_balanced,
        deviation: Some(Deviation {
            x: (cg_x - ideal_x) / dims.length * 100.0,
            z: (cg_z - ideal_z) / dims.width * 100.0,
        }),
    }
}
