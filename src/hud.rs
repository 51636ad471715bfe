//! Heads-up display projection of a center-of-gravity result.
//!
//! Converts the engine output into the values the planner overlay renders:
//! counts, total weight, the CG as clamped percentage coordinates and a
//! balance badge with per-axis warnings.

use serde::Serialize;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::cg::{AxisBalance, BalanceTolerance, CgResult};
use crate::model::{ContainerDimensions, PlacedItem};
use crate::types::Weighted;

/// Badge shown next to the CG marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BalanceBadge {
    Balanced,
    Unbalanced,
}

impl BalanceBadge {
    pub fn code(&self) -> &'static str {
        match self {
            BalanceBadge::Balanced => "balanced",
            BalanceBadge::Unbalanced => "unbalanced",
        }
    }
}

impl std::fmt::Display for BalanceBadge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceBadge::Balanced => write!(f, "Load balanced"),
            BalanceBadge::Unbalanced => write!(f, "Load unbalanced"),
        }
    }
}

/// Direction in which the CG left its tolerance band.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BalanceWarning {
    ShiftedTowardFront,
    ShiftedTowardRear,
    ShiftedLeft,
    ShiftedRight,
}

impl BalanceWarning {
    pub fn code(&self) -> &'static str {
        match self {
            BalanceWarning::ShiftedTowardFront => "shifted_toward_front",
            BalanceWarning::ShiftedTowardRear => "shifted_toward_rear",
            BalanceWarning::ShiftedLeft => "shifted_left",
            BalanceWarning::ShiftedRight => "shifted_right",
        }
    }
}

impl std::fmt::Display for BalanceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceWarning::ShiftedTowardFront => {
                write!(f, "Center of gravity too far toward the front")
            }
            BalanceWarning::ShiftedTowardRear => {
                write!(f, "Center of gravity too far toward the rear")
            }
            BalanceWarning::ShiftedLeft => write!(f, "Center of gravity too far to the left"),
            BalanceWarning::ShiftedRight => write!(f, "Center of gravity too far to the right"),
        }
    }
}

/// CG position in percent of the container floor, clamped to `[0, 100]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct OverlayPosition {
    pub x: f64,
    pub z: f64,
}

/// Everything the HUD overlay needs for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "item_count": 2,
    "weighted_item_count": 2,
    "total_weight": 1000.0,
    "cg_percent": { "x": 50.0, "z": 50.0 },
    "badge": "balanced",
    "axes": { "x": true, "z": true },
    "warnings": []
}))]
pub struct HudSnapshot {
    pub item_count: usize,
    pub weighted_item_count: usize,
    pub total_weight: f64,
    pub cg_percent: OverlayPosition,
    pub badge: BalanceBadge,
    pub axes: AxisBalance,
    pub warnings: Vec<BalanceWarning>,
}

impl HudSnapshot {
    /// Builds the HUD values for a computed result.
    ///
    /// # Parameters
    /// * `items` - The items the result was computed from
    /// * `dims` - Container dimensions used for the computation
    /// * `result` - Engine output
    /// * `tolerance` - Tolerance the result was classified with
    pub fn from_result(
        items: &[PlacedItem],
        dims: &ContainerDimensions,
        result: &CgResult,
        tolerance: &BalanceTolerance,
    ) -> Self {
        let weighted_item_count = items.iter().filter(|item| item.weight() > 0.0).count();

        let badge = if result.is_balanced {
            BalanceBadge::Balanced
        } else {
            BalanceBadge::Unbalanced
        };
        let axes = result.axis_balance(dims, tolerance);

        Self {
            item_count: items.len(),
            weighted_item_count,
            total_weight: result.total_weight,
            cg_percent: OverlayPosition {
                x: overlay_percent(result.x, dims.length),
                z: overlay_percent(result.z, dims.width),
            },
            badge,
            axes,
            warnings: collect_warnings(result, axes),
        }
    }
}

/// Maps a coordinate along an axis to a percentage clamped to `[0, 100]`.
pub fn overlay_percent(value: f64, extent: f64) -> f64 {
    let pct = value / extent * 100.0;
    if pct.is_nan() {
        return 0.0;
    }
    pct.clamp(0.0, 100.0)
}

fn collect_warnings(result: &CgResult, axes: AxisBalance) -> Vec<BalanceWarning> {
    let Some(deviation) = result.deviation else {
        return Vec::new();
    };

    let mut warnings = Vec::new();
    if !axes.x {
        warnings.push(if deviation.x < 0.0 {
            BalanceWarning::ShiftedTowardFront
        } else {
            BalanceWarning::ShiftedTowardRear
        });
    }
    if !axes.z {
        warnings.push(if deviation.z < 0.0 {
            BalanceWarning::ShiftedLeft
        } else {
            BalanceWarning::ShiftedRight
        });
    }
    warnings
}
