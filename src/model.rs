//! Data models for the load planner.
//!
//! This module defines the records the center-of-gravity engine works on:
//! - `PlacedItem`: a cargo item with a position and one or more weight fields
//! - `WeightValue`: a raw weight as delivered by the scene (number or text)
//! - `ContainerDimensions`: the truck/container box (length, height, width)
//!
//! Weight lookup is an explicit ordered list of accessors (`WEIGHT_SOURCES`).

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Positioned, Vec3, Weighted};

/// Validation error for container and balance parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid tolerance: {0}")]
    InvalidTolerance(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// Raw weight as it arrives from the scene state.
///
/// Front ends store weights typed in form fields, so a value may be a number
/// or a numeric string. Any other JSON value is kept as `Invalid` and weighs
/// nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum WeightValue {
    Number(f64),
    Text(String),
    Invalid(serde_json::Value),
}

impl WeightValue {
    /// Coerces the raw value to a usable weight in kg.
    ///
    /// Blank text counts as `0`; unparseable text, non-finite and
    /// non-positive values all resolve to `0`.
    pub fn coerce(&self) -> f64 {
        let raw = match self {
            WeightValue::Number(value) => *value,
            WeightValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            WeightValue::Invalid(_) => 0.0,
        };

        if raw.is_finite() && raw > 0.0 { raw } else { 0.0 }
    }
}

impl From<f64> for WeightValue {
    fn from(value: f64) -> Self {
        WeightValue::Number(value)
    }
}

impl From<&str> for WeightValue {
    fn from(value: &str) -> Self {
        WeightValue::Text(value.to_string())
    }
}

/// Item metadata carried by the load plan document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<WeightValue>,
}

/// User data attached to the item's visual representation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MeshUserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<WeightValue>,
}

/// Visual representation of an item, reduced to what the balance logic reads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MeshData {
    #[serde(default, alias = "userData", skip_serializing_if = "Option::is_none")]
    pub user_data: Option<MeshUserData>,
}

/// A cargo item placed in the container.
///
/// # Fields
/// * `id` - Identifier assigned by the scene
/// * `weight` - Primary weight field
/// * `metadata` - Load plan metadata, may carry a weight
/// * `mesh` - Visual representation, may carry a weight in its user data
/// * `position` - Container-local reference point of the item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "pallet-1",
    "weight": 500.0,
    "position": { "x": 3.0, "y": 0.0, "z": 1.2 }
}))]
pub struct PlacedItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<WeightValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ItemMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshData>,
    pub position: Vec3,
}

impl PlacedItem {
    /// Creates an item without any weight information.
    pub fn new(id: impl Into<String>, position: Vec3) -> Self {
        Self {
            id: id.into(),
            weight: None,
            metadata: None,
            mesh: None,
            position,
        }
    }

    /// Sets the primary weight field.
    pub fn with_weight(mut self, weight: impl Into<WeightValue>) -> Self {
        self.weight = Some(weight.into());
        self
    }

    /// Sets the weight stored in the item metadata.
    pub fn with_metadata_weight(mut self, weight: impl Into<WeightValue>) -> Self {
        self.metadata = Some(ItemMetadata {
            weight: Some(weight.into()),
        });
        self
    }

    /// Sets the weight stored on the visual representation.
    pub fn with_mesh_weight(mut self, weight: impl Into<WeightValue>) -> Self {
        self.mesh = Some(MeshData {
            user_data: Some(MeshUserData {
                weight: Some(weight.into()),
            }),
        });
        self
    }

    /// Resolves the effective weight through `WEIGHT_SOURCES`.
    pub fn resolve_weight(&self) -> ResolvedWeight {
        resolve_weight(self)
    }
}

impl Positioned for PlacedItem {
    fn position(&self) -> Vec3 {
        self.position
    }
}

impl Weighted for PlacedItem {
    fn weight(&self) -> f64 {
        self.resolve_weight().kg
    }
}

/// Field a weight was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightSource {
    Primary,
    Metadata,
    MeshUserData,
}

/// Reads one candidate weight field of an item.
pub type WeightAccessor = fn(&PlacedItem) -> Option<&WeightValue>;

fn primary_weight(item: &PlacedItem) -> Option<&WeightValue> {
    item.weight.as_ref()
}

fn metadata_weight(item: &PlacedItem) -> Option<&WeightValue> {
    item.metadata.as_ref()?.weight.as_ref()
}

fn mesh_weight(item: &PlacedItem) -> Option<&WeightValue> {
    item.mesh.as_ref()?.user_data.as_ref()?.weight.as_ref()
}

/// Weight fields in priority order. The first present field wins.
pub const WEIGHT_SOURCES: [(WeightSource, WeightAccessor); 3] = [
    (WeightSource::Primary, primary_weight as WeightAccessor),
    (WeightSource::Metadata, metadata_weight as WeightAccessor),
    (WeightSource::MeshUserData, mesh_weight as WeightAccessor),
];

/// Outcome of the weight lookup for one item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedWeight {
    /// Field the value came from, `None` if no field was present.
    pub source: Option<WeightSource>,
    /// Coerced weight in kg, `0.0` for missing or malformed values.
    pub kg: f64,
}

impl ResolvedWeight {
    /// Whether the item contributes to the moment sums.
    pub fn is_effective(&self) -> bool {
        self.kg > 0.0
    }
}

/// Resolves an item's weight by trying each accessor of `WEIGHT_SOURCES`.
///
/// A present but malformed value still wins over later fields and then
/// degrades to zero.
pub fn resolve_weight(item: &PlacedItem) -> ResolvedWeight {
    WEIGHT_SOURCES
        .iter()
        .find_map(|(source, accessor)| {
            accessor(item).map(|value| ResolvedWeight {
                source: Some(*source),
                kg: value.coerce(),
            })
        })
        .unwrap_or(ResolvedWeight {
            source: None,
            kg: 0.0,
        })
}

/// Interior dimensions of the truck or container.
///
/// `length` runs along `x`, `width` along `z`; `height` is carried for the
/// shared shape but does not influence balance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "length": 12.0, "height": 2.6, "width": 2.4 }))]
pub struct ContainerDimensions {
    pub length: f64,
    pub height: f64,
    pub width: f64,
}

impl ContainerDimensions {
    /// Creates validated container dimensions.
    ///
    /// # Returns
    /// `Ok(ContainerDimensions)` for positive finite values, otherwise `Err(ValidationError)`
    pub fn new(length: f64, height: f64, width: f64) -> Result<Self, ValidationError> {
        let dims = Self {
            length,
            height,
            width,
        };
        dims.validate()?;
        Ok(dims)
    }

    /// Checks that all three dimensions are positive and finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.length, "Length")?;
        validate_dimension(self.height, "Height")?;
        validate_dimension(self.width, "Width")?;
        Ok(())
    }

    /// Geometric center of the floor plane `(length / 2, width / 2)`.
    #[inline]
    pub fn floor_center(&self) -> (f64, f64) {
        (self.length / 2.0, self.width / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_origin(id: &str) -> PlacedItem {
        PlacedItem::new(id, Vec3::zero())
    }

    #[test]
    fn primary_weight_wins_over_fallbacks() {
        let item = at_origin("a")
            .with_weight(10.0)
            .with_metadata_weight(20.0)
            .with_mesh_weight(30.0);

        let resolved = item.resolve_weight();
        assert_eq!(resolved.source, Some(WeightSource::Primary));
        assert_eq!(resolved.kg, 10.0);
    }

    #[test]
    fn metadata_weight_used_when_primary_missing() {
        let item = at_origin("a").with_metadata_weight(20.0).with_mesh_weight(30.0);

        let resolved = item.resolve_weight();
        assert_eq!(resolved.source, Some(WeightSource::Metadata));
        assert_eq!(resolved.kg, 20.0);
    }

    #[test]
    fn mesh_weight_used_as_last_resort() {
        let item = at_origin("a").with_mesh_weight(30.0);

        let resolved = item.resolve_weight();
        assert_eq!(resolved.source, Some(WeightSource::MeshUserData));
        assert_eq!(resolved.kg, 30.0);
    }

    #[test]
    fn empty_metadata_does_not_shadow_mesh_weight() {
        let mut item = at_origin("a").with_mesh_weight(12.5);
        item.metadata = Some(ItemMetadata::default());

        assert_eq!(item.weight(), 12.5);
    }

    #[test]
    fn present_but_malformed_primary_degrades_to_zero() {
        let item = at_origin("a").with_weight("heavy").with_metadata_weight(20.0);

        let resolved = item.resolve_weight();
        assert_eq!(resolved.source, Some(WeightSource::Primary));
        assert_eq!(resolved.kg, 0.0);
        assert!(!resolved.is_effective());
    }

    #[test]
    fn non_numeric_json_weight_is_kept_but_weighs_nothing() {
        let json = r#"[
            {"id": "bool", "weight": true, "metadata": {"weight": 20}, "position": {"x": 1.0, "y": 0.0, "z": 1.0}},
            {"id": "object", "weight": {}, "position": {"x": 1.0, "y": 0.0, "z": 1.0}},
            {"id": "array", "mesh": {"userData": {"weight": [1, 2]}}, "position": {"x": 1.0, "y": 0.0, "z": 1.0}}
        ]"#;
        let items: Vec<PlacedItem> = serde_json::from_str(json).expect("Should parse items");
        assert_eq!(items.len(), 3);

        let bool_weight = items[0].resolve_weight();
        assert_eq!(bool_weight.source, Some(WeightSource::Primary));
        assert_eq!(bool_weight.kg, 0.0);

        assert_eq!(items[1].weight(), 0.0);
        assert_eq!(
            items[2].resolve_weight().source,
            Some(WeightSource::MeshUserData)
        );
        assert_eq!(items[2].weight(), 0.0);
    }

    #[test]
    fn missing_weight_resolves_to_zero_without_source() {
        let resolved = at_origin("a").resolve_weight();
        assert_eq!(resolved.source, None);
        assert_eq!(resolved.kg, 0.0);
    }

    #[test]
    fn weight_value_coercion() {
        assert_eq!(WeightValue::from(12.5).coerce(), 12.5);
        assert_eq!(WeightValue::from(" 42 ").coerce(), 42.0);
        assert_eq!(WeightValue::from("").coerce(), 0.0);
        assert_eq!(WeightValue::from("abc").coerce(), 0.0);
        assert_eq!(WeightValue::from(-3.0).coerce(), 0.0);
        assert_eq!(WeightValue::from(f64::NAN).coerce(), 0.0);
        assert_eq!(WeightValue::from(f64::INFINITY).coerce(), 0.0);
    }

    #[test]
    fn placed_item_deserializes_all_weight_shapes() {
        let json = r#"[
            {"id": "a", "weight": 5, "position": {"x": 1.0, "y": 0.0, "z": 1.0}},
            {"id": "b", "metadata": {"weight": "7.5"}, "position": {"x": 1.0, "y": 0.0, "z": 1.0}},
            {"id": "c", "mesh": {"userData": {"weight": 9}}, "position": {"x": 1.0, "y": 0.0, "z": 1.0}},
            {"id": "d", "weight": null, "position": {"x": 1.0, "y": 0.0, "z": 1.0}}
        ]"#;
        let items: Vec<PlacedItem> = serde_json::from_str(json).expect("Should parse items");

        let weights: Vec<f64> = items.iter().map(|item| item.weight()).collect();
        assert_eq!(weights, vec![5.0, 7.5, 9.0, 0.0]);
    }

    #[test]
    fn container_dimensions_validation() {
        assert!(ContainerDimensions::new(12.0, 2.6, 2.4).is_ok());
        assert!(ContainerDimensions::new(0.0, 2.6, 2.4).is_err());
        assert!(ContainerDimensions::new(12.0, -1.0, 2.4).is_err());
        assert!(ContainerDimensions::new(12.0, 2.6, f64::NAN).is_err());
        assert!(ContainerDimensions::new(f64::INFINITY, 2.6, 2.4).is_err());
    }

    #[test]
    fn floor_center_is_half_length_and_width() {
        let dims = ContainerDimensions::new(12.0, 2.6, 2.4).unwrap();
        assert_eq!(dims.floor_center(), (6.0, 1.2));
    }
}
