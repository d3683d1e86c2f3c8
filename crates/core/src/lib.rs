//! `vendstock-core` — stock domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no storage concerns):
//! strongly-typed identifiers, the unified stock error, actor identity and
//! units of measure.

pub mod actor;
pub mod error;
pub mod id;
pub mod unit;

pub use actor::Actor;
pub use error::{StockError, StockResult};
pub use id::{CanisterId, IngredientId, MachineId, RecipeId, SkuId, SlotId, TrayId};
pub use unit::UnitOfMeasure;
