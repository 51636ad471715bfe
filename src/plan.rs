//! Load plan state with explicit recomputation.
//!
//! The planner front end reports every layout change (item placed, moved,
//! removed, weight edited, container resized) as a `PlanEvent`. The plan
//! applies the event and the host asks for a fresh center of gravity
//! afterwards; nothing is recomputed implicitly.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

use crate::cg::{BalanceTolerance, CgResult, compute_center_of_gravity_with};
use crate::hud::HudSnapshot;
use crate::model::{ContainerDimensions, PlacedItem, ValidationError, WeightValue};
use crate::types::Vec3;

/// Reasons an event could not be applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Item '{0}' is not part of the load plan")]
    UnknownItem(String),
    #[error("Item '{0}' is already placed")]
    DuplicateItem(String),
    #[error(transparent)]
    InvalidContainer(#[from] ValidationError),
}

impl PlanError {
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::UnknownItem(_) => "unknown_item",
            PlanError::DuplicateItem(_) => "duplicate_item",
            PlanError::InvalidContainer(_) => "invalid_container",
        }
    }
}

/// Layout change reported by the planner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    /// An item was dropped into the container.
    Place { item: PlacedItem },
    /// An item was dragged to a new position.
    Move { id: String, position: Vec3 },
    /// An item was deleted.
    Remove { id: String },
    /// The weight of an item was edited; replaces the primary weight field.
    SetWeight { id: String, weight: Option<WeightValue> },
    /// A different truck or container was selected.
    Resize { dims: ContainerDimensions },
}

/// Outcome of one replayed event.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    /// The event was applied and the CG recomputed.
    Applied {
        index: usize,
        result: CgResult,
        hud: HudSnapshot,
    },
    /// The event was rejected; the plan is unchanged.
    Rejected {
        index: usize,
        reason_code: String,
        reason: String,
    },
    /// Replay finished.
    Finished {
        applied: usize,
        rejected: usize,
        result: CgResult,
    },
}

/// Items currently placed in a container.
#[derive(Clone, Debug)]
pub struct LoadPlan {
    dims: ContainerDimensions,
    items: Vec<PlacedItem>,
}

impl LoadPlan {
    /// Creates an empty plan for validated dimensions.
    pub fn new(dims: ContainerDimensions) -> Result<Self, PlanError> {
        dims.validate()?;
        Ok(Self {
            dims,
            items: Vec::new(),
        })
    }

    /// Creates a plan with an initial set of items.
    ///
    /// Item ids must be unique.
    pub fn with_items(
        dims: ContainerDimensions,
        items: impl IntoIterator<Item = PlacedItem>,
    ) -> Result<Self, PlanError> {
        let mut plan = Self::new(dims)?;
        for item in items {
            plan.apply(&PlanEvent::Place { item })?;
        }
        Ok(plan)
    }

    pub fn dims(&self) -> &ContainerDimensions {
        &self.dims
    }

    pub fn items(&self) -> &[PlacedItem] {
        &self.items
    }

    fn position_of(&self, id: &str) -> Result<usize, PlanError> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| PlanError::UnknownItem(id.to_string()))
    }

    /// Applies a single event. On error the plan is left unchanged.
    pub fn apply(&mut self, event: &PlanEvent) -> Result<(), PlanError> {
        match event {
            PlanEvent::Place { item } => {
                if self.items.iter().any(|existing| existing.id == item.id) {
                    return Err(PlanError::DuplicateItem(item.id.clone()));
                }
                self.items.push(item.clone());
            }
            PlanEvent::Move { id, position } => {
                let idx = self.position_of(id)?;
                self.items[idx].position = *position;
            }
            PlanEvent::Remove { id } => {
                let idx = self.position_of(id)?;
                self.items.remove(idx);
            }
            PlanEvent::SetWeight { id, weight } => {
                let idx = self.position_of(id)?;
                self.items[idx].weight = weight.clone();
            }
            PlanEvent::Resize { dims } => {
                dims.validate()?;
                self.dims = *dims;
            }
        }
        Ok(())
    }

    /// Recomputes the center of gravity for the current layout.
    pub fn center_of_gravity(&self, tolerance: &BalanceTolerance) -> CgResult {
        compute_center_of_gravity_with(&self.items, &self.dims, tolerance)
    }

    /// Recomputes the CG and projects it for the HUD.
    pub fn snapshot(&self, tolerance: &BalanceTolerance) -> (CgResult, HudSnapshot) {
        let result = self.center_of_gravity(tolerance);
        let hud = HudSnapshot::from_result(&self.items, &self.dims, &result, tolerance);
        (result, hud)
    }

    /// Applies events in order and reports a step after each one.
    ///
    /// Rejected events are reported and skipped; the replay continues with
    /// the next event.
    pub fn replay(
        &mut self,
        events: &[PlanEvent],
        tolerance: &BalanceTolerance,
        mut on_step: impl FnMut(&PlanStep),
    ) -> CgResult {
        let mut applied = 0;
        let mut rejected = 0;

        for (index, event) in events.iter().enumerate() {
            match self.apply(event) {
                Ok(()) => {
                    applied += 1;
                    let (result, hud) = self.snapshot(tolerance);
                    debug!(
                        index,
                        cg_x = result.x,
                        cg_z = result.z,
                        balanced = result.is_balanced,
                        "plan event applied"
                    );
                    on_step(&PlanStep::Applied { index, result, hud });
                }
                Err(err) => {
                    rejected += 1;
                    debug!(index, error = %err, "plan event rejected");
                    on_step(&PlanStep::Rejected {
                        index,
                        reason_code: err.code().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let result = self.center_of_gravity(tolerance);
        on_step(&PlanStep::Finished {
            applied,
            rejected,
            result,
        });
        result
    }
}
