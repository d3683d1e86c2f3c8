//! Ledger commands over canisters and slot inventory.
//!
//! Consumption and refill are CAS-disciplined: the level used for the
//! arithmetic is the one the commit guard pins, so a writer that lost the
//! race gets `ConcurrentModification` instead of silently clobbering.
//! `SetSlotInventory` is the exception: an administrative full replace that
//! deliberately skips the guard.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use vendstock_audit::AuditRecord;
use vendstock_core::{
    Actor, CanisterId, IngredientId, MachineId, SkuId, SlotId, StockError, StockResult, TrayId,
    UnitOfMeasure,
};
use vendstock_model::{SlotInventory, SlotKey, canister_lookup};
use vendstock_store::{ExpectedVersion, InMemoryStockStore, Transaction};

use crate::retry::{RetryPolicy, with_retries};

/// Post-update levels of one canister draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionReceipt {
    pub canister_id: CanisterId,
    pub ingredient_id: IngredientId,
    pub previous_level: u32,
    pub new_level: u32,
}

/// Post-update quantities of one slot decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotReceipt {
    pub key: SlotKey,
    pub previous_quantity: u32,
    pub new_quantity: u32,
}

/// Result of a refill attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefillOutcome {
    /// The canister took `applied` units, capped at the available headroom.
    Refilled {
        previous_level: u32,
        new_level: u32,
        applied: u32,
    },
    /// The canister was already at capacity; nothing changed, nothing is
    /// audited.
    AlreadyFull { level: u32 },
}

/// Conditional canister decrement.
///
/// The ingredient is an explicit parameter: audit entries record which
/// ingredient the draw served, and callers resolve the canister from an
/// ingredient to begin with.
#[derive(Debug, Clone)]
pub struct ConsumeCanister {
    pub canister_id: CanisterId,
    pub ingredient_id: IngredientId,
    pub amount: u32,
    pub actor: Actor,
}

impl ConsumeCanister {
    /// Stage the decrement and its audit entry on `tx`.
    pub fn apply(&self, tx: &mut Transaction<'_>) -> StockResult<ConsumptionReceipt> {
        if self.amount == 0 {
            return Err(StockError::invalid_input("amount must be greater than 0"));
        }
        let mut canister = tx.canister(self.canister_id)?;
        if !canister.holds(self.ingredient_id) {
            return Err(StockError::invalid_input(format!(
                "canister {} does not hold ingredient {}",
                self.canister_id, self.ingredient_id
            )));
        }
        let unit = tx.ingredient(self.ingredient_id)?.unit();
        let previous_level = canister.current_level();
        canister.consume(self.amount)?;
        let new_level = canister.current_level();
        let machine_id = canister.machine_id();
        tx.stage_canister(canister);
        tx.record(AuditRecord::ingredient_consumed(
            machine_id,
            self.canister_id,
            self.ingredient_id,
            self.amount,
            unit,
            previous_level,
            new_level,
            self.actor.clone(),
            Utc::now(),
        )?);
        Ok(ConsumptionReceipt {
            canister_id: self.canister_id,
            ingredient_id: self.ingredient_id,
            previous_level,
            new_level,
        })
    }

    /// Run in a one-shot transaction.
    pub fn execute(&self, store: &InMemoryStockStore) -> StockResult<ConsumptionReceipt> {
        let mut tx = store.begin();
        let receipt = self.apply(&mut tx)?;
        tx.commit()?;
        tracing::debug!(
            "canister {} consumed {} ({} -> {})",
            self.canister_id,
            self.amount,
            receipt.previous_level,
            receipt.new_level
        );
        Ok(receipt)
    }
}

/// Capped canister refill.
///
/// Never overfills: the delta is capped at the remaining headroom, and a
/// full canister reports [`RefillOutcome::AlreadyFull`] instead of erroring.
#[derive(Debug, Clone)]
pub struct RefillCanister {
    pub canister_id: CanisterId,
    pub amount: u32,
    pub actor: Actor,
}

impl RefillCanister {
    /// Stage the capped refill and its audit entry on `tx`.
    pub fn apply(&self, tx: &mut Transaction<'_>) -> StockResult<RefillOutcome> {
        if self.amount == 0 {
            return Err(StockError::invalid_input("amount must be greater than 0"));
        }
        let mut canister = tx.canister(self.canister_id)?;
        if canister.is_full() {
            return Ok(RefillOutcome::AlreadyFull {
                level: canister.current_level(),
            });
        }
        // Unassigned canisters have no ingredient to borrow a unit from;
        // fall back to milliliters.
        let unit = match canister.ingredient_ids().iter().next() {
            Some(ingredient_id) => tx.ingredient(*ingredient_id)?.unit(),
            None => UnitOfMeasure::Milliliters,
        };
        let previous_level = canister.current_level();
        let applied = canister.refill_capped(self.amount);
        let new_level = canister.current_level();
        let machine_id = canister.machine_id();
        tx.stage_canister(canister);
        tx.record(AuditRecord::canister_refilled(
            machine_id,
            self.canister_id,
            applied,
            unit,
            previous_level,
            new_level,
            self.actor.clone(),
            Utc::now(),
        )?);
        Ok(RefillOutcome::Refilled {
            previous_level,
            new_level,
            applied,
        })
    }

    /// Run in a one-shot transaction, re-reading once after a lost race.
    pub fn execute(&self, store: &InMemoryStockStore) -> StockResult<RefillOutcome> {
        with_retries("refill canister", &RetryPolicy::refill(), || {
            let mut tx = store.begin();
            let outcome = self.apply(&mut tx)?;
            tx.commit()?;
            Ok(outcome)
        })
    }
}

/// Conditional slot decrement. A missing row reads as zero stock, so the
/// failure is `InsufficientStock`, not `NotFound`.
#[derive(Debug, Clone)]
pub struct ConsumeSlot {
    pub machine_id: MachineId,
    pub tray_id: TrayId,
    pub slot_id: SlotId,
    pub sku_id: SkuId,
    pub quantity: u32,
    pub actor: Actor,
}

impl ConsumeSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            machine_id: self.machine_id,
            tray_id: self.tray_id,
            slot_id: self.slot_id,
            sku_id: self.sku_id,
        }
    }

    /// Stage the decrement and its audit entry on `tx`.
    pub fn apply(&self, tx: &mut Transaction<'_>) -> StockResult<SlotReceipt> {
        if self.quantity == 0 {
            return Err(StockError::invalid_input("quantity must be greater than 0"));
        }
        let key = self.key();
        let mut row = match tx.slot_inventory(&key)? {
            Some(row) => row,
            None => return Err(StockError::insufficient(self.quantity, 0)),
        };
        let previous_quantity = row.quantity_on_hand();
        row.consume(self.quantity)?;
        let new_quantity = row.quantity_on_hand();
        tx.stage_slot_inventory(row);
        tx.record(AuditRecord::sku_sold(
            self.machine_id,
            self.tray_id,
            self.slot_id,
            self.sku_id,
            self.quantity,
            previous_quantity,
            new_quantity,
            self.actor.clone(),
            Utc::now(),
        )?);
        Ok(SlotReceipt {
            key,
            previous_quantity,
            new_quantity,
        })
    }

    /// Run in a one-shot transaction.
    pub fn execute(&self, store: &InMemoryStockStore) -> StockResult<SlotReceipt> {
        let mut tx = store.begin();
        let receipt = self.apply(&mut tx)?;
        tx.commit()?;
        tracing::debug!(
            "slot {} sold {} of sku {} ({} -> {})",
            self.slot_id,
            self.quantity,
            self.sku_id,
            receipt.previous_quantity,
            receipt.new_quantity
        );
        Ok(receipt)
    }
}

/// Administrative full replace of one slot inventory row.
///
/// Validates referential integrity (machine exists, tray belongs to it,
/// slot belongs to the tray, SKU exists) before writing, then upserts with
/// no version guard: the last administrative write wins.
#[derive(Debug, Clone)]
pub struct SetSlotInventory {
    pub machine_id: MachineId,
    pub tray_id: TrayId,
    pub slot_id: SlotId,
    pub sku_id: SkuId,
    pub quantity: u32,
    pub actor: Actor,
}

impl SetSlotInventory {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            machine_id: self.machine_id,
            tray_id: self.tray_id,
            slot_id: self.slot_id,
            sku_id: self.sku_id,
        }
    }

    /// Stage the replace and its audit entry on `tx`.
    pub fn apply(&self, tx: &mut Transaction<'_>) -> StockResult<SlotInventory> {
        tx.machine(self.machine_id)?;
        let tray = tx.tray(self.tray_id)?;
        if tray.machine_id() != self.machine_id {
            return Err(StockError::invalid_input(format!(
                "tray {} does not belong to machine {}",
                self.tray_id, self.machine_id
            )));
        }
        let slot = tx.slot(self.slot_id)?;
        if slot.tray_id() != self.tray_id {
            return Err(StockError::invalid_input(format!(
                "slot {} does not belong to tray {}",
                self.slot_id, self.tray_id
            )));
        }
        tx.sku(self.sku_id)?;

        let key = self.key();
        let previous = tx.slot_inventory(&key)?.map(|row| row.quantity_on_hand());
        let row = SlotInventory::new(key, self.quantity);
        tx.stage_slot_inventory_with(row.clone(), ExpectedVersion::Any);
        tx.record(AuditRecord::inventory_updated(
            self.machine_id,
            self.tray_id,
            self.slot_id,
            self.sku_id,
            self.quantity,
            previous,
            self.actor.clone(),
            Utc::now(),
        )?);
        Ok(row)
    }

    /// Run in a one-shot transaction.
    pub fn execute(&self, store: &InMemoryStockStore) -> StockResult<SlotInventory> {
        let mut tx = store.begin();
        let row = self.apply(&mut tx)?;
        tx.commit()?;
        tracing::debug!(
            "slot {} inventory set to {} for sku {}",
            self.slot_id,
            self.quantity,
            self.sku_id
        );
        Ok(row)
    }
}

/// One requested ingredient draw within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientDraw {
    pub ingredient_id: IngredientId,
    pub quantity: u32,
}

/// Batch consumption across one machine's canisters.
///
/// Resolves every draw through the machine's ingredient lookup (first
/// canister in id order wins) and consumes the mapped canister; any failure
/// aborts the whole batch. Zero-quantity draws bind nothing and are skipped
/// without resolving a canister.
#[derive(Debug, Clone)]
pub struct ConsumeIngredients {
    pub machine_id: MachineId,
    pub draws: Vec<IngredientDraw>,
    pub actor: Actor,
}

impl ConsumeIngredients {
    /// Stage every draw and its audit entry on `tx`, in draw order.
    pub fn apply(&self, tx: &mut Transaction<'_>) -> StockResult<Vec<ConsumptionReceipt>> {
        tx.machine(self.machine_id)?;
        let canisters = tx.canisters_for_machine(self.machine_id)?;
        let lookup = canister_lookup(&canisters);

        let mut receipts = Vec::new();
        for draw in &self.draws {
            if draw.quantity == 0 {
                continue;
            }
            let canister_id = match lookup.get(&draw.ingredient_id) {
                Some(id) => *id,
                None => {
                    return Err(StockError::not_found(format!(
                        "no canister on machine {} holds ingredient {}",
                        self.machine_id, draw.ingredient_id
                    )));
                }
            };
            let receipt = ConsumeCanister {
                canister_id,
                ingredient_id: draw.ingredient_id,
                amount: draw.quantity,
                actor: self.actor.clone(),
            }
            .apply(tx)?;
            receipts.push(receipt);
        }
        Ok(receipts)
    }

    /// Run in a one-shot transaction.
    pub fn execute(&self, store: &InMemoryStockStore) -> StockResult<Vec<ConsumptionReceipt>> {
        let mut tx = store.begin();
        let receipts = self.apply(&mut tx)?;
        tx.commit()?;
        tracing::debug!(
            "machine {} drew {} ingredient(s)",
            self.machine_id,
            receipts.len()
        );
        Ok(receipts)
    }
}
