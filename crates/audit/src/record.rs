use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendstock_core::{
    Actor, CanisterId, IngredientId, MachineId, RecipeId, SkuId, SlotId, StockError, StockResult,
    TrayId, UnitOfMeasure,
};

/// What a single audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    MachineCreated,
    SkuSold,
    SkuRestocked,
    IngredientConsumed,
    CanisterRefilled,
    InventoryUpdated,
    SaleRefunded,
    CoffeeAvailabilityChecked,
    LowStockChecked,
}

/// All the fields an audit entry may carry, before validation.
///
/// The machine reference and actor are mandatory for every action; the
/// rest depends on the action kind. Prefer the named constructors on
/// [`AuditRecord`], which fill a draft correctly by signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditDraft {
    pub action: AuditAction,
    pub machine_id: MachineId,
    pub sku_id: Option<SkuId>,
    pub ingredient_id: Option<IngredientId>,
    pub recipe_id: Option<RecipeId>,
    pub canister_id: Option<CanisterId>,
    pub tray_id: Option<TrayId>,
    pub slot_id: Option<SlotId>,
    pub quantity: Option<u32>,
    pub unit: Option<UnitOfMeasure>,
    pub previous_value: Option<u32>,
    pub new_value: Option<u32>,
    pub actor: Actor,
    pub recorded_at: DateTime<Utc>,
}

impl AuditDraft {
    /// A draft with only the always-mandatory fields set.
    pub fn bare(
        action: AuditAction,
        machine_id: MachineId,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            machine_id,
            sku_id: None,
            ingredient_id: None,
            recipe_id: None,
            canister_id: None,
            tray_id: None,
            slot_id: None,
            quantity: None,
            unit: None,
            previous_value: None,
            new_value: None,
            actor,
            recorded_at,
        }
    }
}

/// One validated, immutable audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    action: AuditAction,
    machine_id: MachineId,
    sku_id: Option<SkuId>,
    ingredient_id: Option<IngredientId>,
    recipe_id: Option<RecipeId>,
    canister_id: Option<CanisterId>,
    tray_id: Option<TrayId>,
    slot_id: Option<SlotId>,
    quantity: Option<u32>,
    unit: Option<UnitOfMeasure>,
    previous_value: Option<u32>,
    new_value: Option<u32>,
    actor: Actor,
    recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Validate a draft against the per-action required-field matrix.
    pub fn from_draft(draft: AuditDraft) -> StockResult<Self> {
        if draft.actor.as_str().trim().is_empty() {
            return Err(StockError::invalid_input("audit actor cannot be empty"));
        }

        let action = draft.action;
        let require = |ok: bool, what: &str| -> StockResult<()> {
            if ok {
                Ok(())
            } else {
                Err(StockError::invalid_input(format!(
                    "{what} is required for {action:?} audit entries"
                )))
            }
        };

        let positive_quantity = draft.quantity.is_some_and(|q| q > 0);
        match draft.action {
            AuditAction::SkuSold | AuditAction::SkuRestocked => {
                require(draft.sku_id.is_some(), "sku_id")?;
                require(positive_quantity, "a positive quantity")?;
                require(draft.unit.is_some(), "unit")?;
            }
            AuditAction::CanisterRefilled => {
                require(draft.canister_id.is_some(), "canister_id")?;
                require(positive_quantity, "a positive quantity")?;
                require(draft.unit.is_some(), "unit")?;
            }
            AuditAction::IngredientConsumed => {
                require(draft.ingredient_id.is_some(), "ingredient_id")?;
                require(positive_quantity, "a positive quantity")?;
                require(draft.unit.is_some(), "unit")?;
            }
            AuditAction::InventoryUpdated => {
                require(draft.sku_id.is_some(), "sku_id")?;
                require(draft.tray_id.is_some(), "tray_id")?;
                require(draft.slot_id.is_some(), "slot_id")?;
                require(draft.quantity.is_some(), "quantity")?;
            }
            AuditAction::CoffeeAvailabilityChecked => {
                require(draft.recipe_id.is_some(), "recipe_id")?;
            }
            AuditAction::MachineCreated
            | AuditAction::SaleRefunded
            | AuditAction::LowStockChecked => {}
        }

        Ok(Self {
            action: draft.action,
            machine_id: draft.machine_id,
            sku_id: draft.sku_id,
            ingredient_id: draft.ingredient_id,
            recipe_id: draft.recipe_id,
            canister_id: draft.canister_id,
            tray_id: draft.tray_id,
            slot_id: draft.slot_id,
            quantity: draft.quantity,
            unit: draft.unit,
            previous_value: draft.previous_value,
            new_value: draft.new_value,
            actor: draft.actor,
            recorded_at: draft.recorded_at,
        })
    }

    pub fn machine_created(
        machine_id: MachineId,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        Self::from_draft(AuditDraft::bare(
            AuditAction::MachineCreated,
            machine_id,
            actor,
            recorded_at,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sku_sold(
        machine_id: MachineId,
        tray_id: TrayId,
        slot_id: SlotId,
        sku_id: SkuId,
        quantity: u32,
        previous_value: u32,
        new_value: u32,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        Self::from_draft(AuditDraft {
            sku_id: Some(sku_id),
            tray_id: Some(tray_id),
            slot_id: Some(slot_id),
            quantity: Some(quantity),
            unit: Some(UnitOfMeasure::Items),
            previous_value: Some(previous_value),
            new_value: Some(new_value),
            ..AuditDraft::bare(AuditAction::SkuSold, machine_id, actor, recorded_at)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sku_restocked(
        machine_id: MachineId,
        tray_id: TrayId,
        slot_id: SlotId,
        sku_id: SkuId,
        quantity: u32,
        previous_value: u32,
        new_value: u32,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        Self::from_draft(AuditDraft {
            sku_id: Some(sku_id),
            tray_id: Some(tray_id),
            slot_id: Some(slot_id),
            quantity: Some(quantity),
            unit: Some(UnitOfMeasure::Items),
            previous_value: Some(previous_value),
            new_value: Some(new_value),
            ..AuditDraft::bare(AuditAction::SkuRestocked, machine_id, actor, recorded_at)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ingredient_consumed(
        machine_id: MachineId,
        canister_id: CanisterId,
        ingredient_id: IngredientId,
        quantity: u32,
        unit: UnitOfMeasure,
        previous_value: u32,
        new_value: u32,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        Self::from_draft(AuditDraft {
            ingredient_id: Some(ingredient_id),
            canister_id: Some(canister_id),
            quantity: Some(quantity),
            unit: Some(unit),
            previous_value: Some(previous_value),
            new_value: Some(new_value),
            ..AuditDraft::bare(AuditAction::IngredientConsumed, machine_id, actor, recorded_at)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn canister_refilled(
        machine_id: MachineId,
        canister_id: CanisterId,
        quantity: u32,
        unit: UnitOfMeasure,
        previous_value: u32,
        new_value: u32,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        Self::from_draft(AuditDraft {
            canister_id: Some(canister_id),
            quantity: Some(quantity),
            unit: Some(unit),
            previous_value: Some(previous_value),
            new_value: Some(new_value),
            ..AuditDraft::bare(AuditAction::CanisterRefilled, machine_id, actor, recorded_at)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn inventory_updated(
        machine_id: MachineId,
        tray_id: TrayId,
        slot_id: SlotId,
        sku_id: SkuId,
        quantity: u32,
        previous_value: Option<u32>,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        Self::from_draft(AuditDraft {
            sku_id: Some(sku_id),
            tray_id: Some(tray_id),
            slot_id: Some(slot_id),
            quantity: Some(quantity),
            previous_value,
            new_value: Some(quantity),
            ..AuditDraft::bare(AuditAction::InventoryUpdated, machine_id, actor, recorded_at)
        })
    }

    pub fn sale_refunded(
        machine_id: MachineId,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        Self::from_draft(AuditDraft::bare(
            AuditAction::SaleRefunded,
            machine_id,
            actor,
            recorded_at,
        ))
    }

    pub fn availability_checked(
        machine_id: MachineId,
        recipe_id: RecipeId,
        max_cups_possible: u32,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        Self::from_draft(AuditDraft {
            recipe_id: Some(recipe_id),
            new_value: Some(max_cups_possible),
            ..AuditDraft::bare(
                AuditAction::CoffeeAvailabilityChecked,
                machine_id,
                actor,
                recorded_at,
            )
        })
    }

    pub fn low_stock_checked(
        machine_id: MachineId,
        warning_count: u32,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        Self::from_draft(AuditDraft {
            new_value: Some(warning_count),
            ..AuditDraft::bare(AuditAction::LowStockChecked, machine_id, actor, recorded_at)
        })
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    pub fn machine_id(&self) -> MachineId {
        self.machine_id
    }

    pub fn sku_id(&self) -> Option<SkuId> {
        self.sku_id
    }

    pub fn ingredient_id(&self) -> Option<IngredientId> {
        self.ingredient_id
    }

    pub fn recipe_id(&self) -> Option<RecipeId> {
        self.recipe_id
    }

    pub fn canister_id(&self) -> Option<CanisterId> {
        self.canister_id
    }

    pub fn tray_id(&self) -> Option<TrayId> {
        self.tray_id
    }

    pub fn slot_id(&self) -> Option<SlotId> {
        self.slot_id
    }

    pub fn quantity(&self) -> Option<u32> {
        self.quantity
    }

    pub fn unit(&self) -> Option<UnitOfMeasure> {
        self.unit
    }

    pub fn previous_value(&self) -> Option<u32> {
        self.previous_value
    }

    pub fn new_value(&self) -> Option<u32> {
        self.new_value
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
