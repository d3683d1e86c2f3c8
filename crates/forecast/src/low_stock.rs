//! Canister and slot low-stock classification.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use vendstock_audit::AuditRecord;
use vendstock_core::{Actor, CanisterId, IngredientId, MachineId, StockResult};
use vendstock_model::SlotInventory;
use vendstock_store::InMemoryStockStore;

/// Canisters at or below this fill percentage are reported.
pub const DEFAULT_LOW_STOCK_PERCENTAGE: f64 = 20.0;
/// At or below this fill percentage a warning escalates to critical.
pub const CRITICAL_PERCENTAGE: f64 = 5.0;
/// Slot rows at or below this quantity count as low stock.
pub const DEFAULT_SLOT_THRESHOLD: u32 = 5;

/// Severity of a low-stock warning. Canisters above the threshold get no
/// status at all; they are simply omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Low,
    Critical,
}

/// One canister running low.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockWarning {
    pub canister_id: CanisterId,
    pub canister_name: String,
    pub current_level: u32,
    pub capacity: u32,
    /// Rounded to two decimals for reporting; classification always uses
    /// the unrounded value.
    pub stock_percentage: f64,
    pub status: StockStatus,
    pub ingredient_ids: Vec<IngredientId>,
}

/// Warning counts. `low_stock_canisters` and `critical_stock_canisters`
/// partition the warning list exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockSummary {
    pub total_canisters: u32,
    pub low_stock_canisters: u32,
    pub critical_stock_canisters: u32,
}

/// Low-stock warnings for one machine's canisters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockReport {
    pub machine_id: MachineId,
    pub warnings: Vec<LowStockWarning>,
    pub summary: LowStockSummary,
}

/// Classify every canister of the machine against `threshold_percentage`.
///
/// Appends one `LOW_STOCK_CHECKED` audit entry carrying the warning count.
/// A machine without canisters yields an empty report, not an error.
pub fn low_stock_report(
    store: &InMemoryStockStore,
    machine_id: MachineId,
    threshold_percentage: f64,
    actor: &Actor,
) -> StockResult<LowStockReport> {
    let mut tx = store.begin();
    tx.machine(machine_id)?;
    let canisters = tx.canisters_for_machine(machine_id)?;

    let mut warnings = Vec::new();
    let mut low_stock_canisters = 0;
    let mut critical_stock_canisters = 0;
    for canister in &canisters {
        let percentage = canister.stock_percentage();
        if percentage > threshold_percentage {
            continue;
        }
        let status = if percentage <= CRITICAL_PERCENTAGE {
            critical_stock_canisters += 1;
            StockStatus::Critical
        } else {
            low_stock_canisters += 1;
            StockStatus::Low
        };
        warnings.push(LowStockWarning {
            canister_id: canister.id(),
            canister_name: canister.name().to_string(),
            current_level: canister.current_level(),
            capacity: canister.capacity(),
            stock_percentage: (percentage * 100.0).round() / 100.0,
            status,
            ingredient_ids: canister.ingredient_ids().iter().copied().collect(),
        });
    }

    tx.record(AuditRecord::low_stock_checked(
        machine_id,
        warnings.len() as u32,
        actor.clone(),
        Utc::now(),
    )?);
    tx.commit()?;
    tracing::debug!(
        "machine {} low stock check: {} warning(s), {} critical",
        machine_id,
        warnings.len(),
        critical_stock_canisters
    );
    Ok(LowStockReport {
        machine_id,
        warnings,
        summary: LowStockSummary {
            total_canisters: canisters.len() as u32,
            low_stock_canisters,
            critical_stock_canisters,
        },
    })
}

/// Slot rows at or below `threshold` units, across every machine. Slots
/// have no capacity to percentage against, so this is a plain listing.
pub fn low_stock_slots(
    store: &InMemoryStockStore,
    threshold: u32,
) -> StockResult<Vec<SlotInventory>> {
    Ok(store
        .slot_inventory()?
        .into_iter()
        .filter(|row| row.quantity_on_hand() <= threshold)
        .collect())
}
