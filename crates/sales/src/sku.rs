//! SKU sale orchestration and the read-only availability check.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use vendstock_core::{Actor, MachineId, SkuId, SlotId, StockError, StockResult, TrayId};
use vendstock_ledger::{ConsumeSlot, SlotReceipt};
use vendstock_model::{
    PaymentMethod, SaleLine, SaleRecord, SaleType, SkuLine, SlotKey, TransactionId,
};
use vendstock_store::{InMemoryStockStore, Transaction};

use crate::error::{SaleError, SaleResult};

/// One requested slot/SKU line of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub sku_id: SkuId,
    pub tray_id: TrayId,
    pub slot_id: SlotId,
    pub quantity: u32,
}

impl SaleLineRequest {
    fn key(&self, machine_id: MachineId) -> SlotKey {
        SlotKey {
            machine_id,
            tray_id: self.tray_id,
            slot_id: self.slot_id,
            sku_id: self.sku_id,
        }
    }
}

/// Priced availability of one requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityLine {
    pub sku_id: SkuId,
    pub slot_id: SlotId,
    pub sku_name: String,
    pub requested_quantity: u32,
    pub available_quantity: u32,
    pub unit_price: u64,
    pub line_total: u64,
}

/// The would-be sale, priced line by line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub total_amount: u64,
    pub lines: Vec<AvailabilityLine>,
}

/// A completed SKU sale: the persisted record plus the slot decrements that
/// fulfilled it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuSaleReceipt {
    pub sale: SaleRecord,
    pub receipts: Vec<SlotReceipt>,
}

/// Price and check every line, erroring rather than reporting when a line
/// cannot be fulfilled. Reads go through the transaction so the rows and
/// levels checked here are the same ones later guards pin.
fn check_lines(
    tx: &mut Transaction<'_>,
    machine_id: MachineId,
    lines: &[SaleLineRequest],
) -> StockResult<AvailabilityReport> {
    let mut report_lines = Vec::with_capacity(lines.len());
    let mut total_amount = 0u64;
    for line in lines {
        if line.quantity == 0 {
            return Err(StockError::invalid_input(
                "line quantity must be greater than 0",
            ));
        }
        let sku = tx.sku(line.sku_id)?;
        let row = tx.slot_inventory(&line.key(machine_id))?.ok_or_else(|| {
            StockError::not_found(format!(
                "no inventory for sku '{}' in slot {}",
                sku.name(),
                line.slot_id
            ))
        })?;
        let available = row.quantity_on_hand();
        if available < line.quantity {
            return Err(StockError::insufficient(line.quantity, available));
        }
        let line_total = sku
            .price()
            .checked_mul(u64::from(line.quantity))
            .ok_or_else(|| StockError::invariant("sale line total overflow"))?;
        total_amount = total_amount
            .checked_add(line_total)
            .ok_or_else(|| StockError::invariant("sale total overflow"))?;
        report_lines.push(AvailabilityLine {
            sku_id: line.sku_id,
            slot_id: line.slot_id,
            sku_name: sku.name().to_string(),
            requested_quantity: line.quantity,
            available_quantity: available,
            unit_price: sku.price(),
            line_total,
        });
    }
    Ok(AvailabilityReport {
        total_amount,
        lines: report_lines,
    })
}

/// Price a prospective SKU sale without touching stock.
///
/// This is the validation pass of [`SkuSale`] exposed on its own; it errors
/// on unknown or short lines instead of reporting them, so an `Ok` report
/// means every line was fulfillable at the moment it was read.
pub fn check_availability(
    store: &InMemoryStockStore,
    machine_id: MachineId,
    lines: &[SaleLineRequest],
) -> StockResult<AvailabilityReport> {
    let mut tx = store.begin();
    tx.machine(machine_id)?;
    check_lines(&mut tx, machine_id, lines)
}

/// One SKU sale attempt over any number of slot lines.
///
/// Two passes: validate and price every line without mutating anything, then
/// stage every decrement plus the sale record on one transaction and commit.
/// A failure on any line aborts the whole attempt.
#[derive(Debug, Clone)]
pub struct SkuSale {
    pub machine_id: MachineId,
    pub lines: Vec<SaleLineRequest>,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<String>,
    pub actor: Actor,
}

impl SkuSale {
    pub fn execute(&self, store: &InMemoryStockStore) -> SaleResult<SkuSaleReceipt> {
        let transaction_id = TransactionId::generate();
        let timestamp = Utc::now();
        let mut tx = store.begin();

        if self.lines.is_empty() {
            return Err(SaleError::validating(StockError::invalid_input(
                "sale needs at least one line",
            )));
        }
        tx.machine(self.machine_id).map_err(SaleError::validating)?;
        let report =
            check_lines(&mut tx, self.machine_id, &self.lines).map_err(SaleError::validating)?;

        let mut receipts = Vec::with_capacity(self.lines.len());
        let mut sale_lines = Vec::with_capacity(self.lines.len());
        for (line, priced) in self.lines.iter().zip(report.lines.iter()) {
            let receipt = ConsumeSlot {
                machine_id: self.machine_id,
                tray_id: line.tray_id,
                slot_id: line.slot_id,
                sku_id: line.sku_id,
                quantity: line.quantity,
                actor: self.actor.clone(),
            }
            .apply(&mut tx)
            .map_err(SaleError::reserving)?;
            receipts.push(receipt);
            sale_lines.push(SaleLine::Sku(SkuLine {
                sku_id: line.sku_id,
                tray_id: line.tray_id,
                slot_id: line.slot_id,
                quantity: line.quantity,
                unit_price: priced.unit_price,
                total_price: priced.line_total,
            }));
        }
        let sale = SaleRecord::new(
            transaction_id,
            self.machine_id,
            SaleType::Sku,
            sale_lines,
            report.total_amount,
            self.payment_method,
            self.customer_id.clone(),
            timestamp,
        )
        .map_err(SaleError::reserving)?;
        tx.stage_sale(sale.clone());

        tx.commit().map_err(SaleError::committing)?;
        tracing::info!(
            "sku sale {} completed on machine {} ({} line(s))",
            sale.transaction_id(),
            self.machine_id,
            sale.lines().len()
        );
        Ok(SkuSaleReceipt { sale, receipts })
    }
}

#[cfg(test)]
mod tests {
    use vendstock_audit::{AuditAction, AuditQuery};
    use vendstock_ledger::SetSlotInventory;
    use vendstock_model::{MachineKind, SaleStatus, SkuProduct, Slot, Tray, VendingMachine};

    use super::*;
    use crate::error::SalePhase;

    fn test_actor() -> Actor {
        Actor::new("kiosk-1")
    }

    struct ShelfFixture {
        store: InMemoryStockStore,
        machine_id: MachineId,
        tray_id: TrayId,
        cola_slot: SlotId,
        cola_id: SkuId,
        chips_slot: SlotId,
        chips_id: SkuId,
    }

    /// Slot machine with one tray, cola (250) in slot A1 and chips (180) in
    /// slot A2, stocked at the given quantities.
    fn shelf_fixture(cola_quantity: u32, chips_quantity: u32) -> ShelfFixture {
        let store = InMemoryStockStore::new();
        let machine = VendingMachine::new(
            MachineId::new(),
            "Snack wall",
            MachineKind::Slot,
            "Ground floor",
        )
        .unwrap();
        let machine_id = machine.id();
        store.insert_machine(machine, &test_actor()).unwrap();

        let tray = Tray::new(TrayId::new(), "Tray A", machine_id).unwrap();
        let tray_id = tray.id();
        store.insert_tray(tray).unwrap();

        let slot_a1 = Slot::new(SlotId::new(), "A1", tray_id).unwrap();
        let cola_slot = slot_a1.id();
        store.insert_slot(slot_a1).unwrap();
        let slot_a2 = Slot::new(SlotId::new(), "A2", tray_id).unwrap();
        let chips_slot = slot_a2.id();
        store.insert_slot(slot_a2).unwrap();

        let cola = SkuProduct::new(SkuId::new(), "SKU-001", "Cola can", 250).unwrap();
        let cola_id = cola.id();
        store.insert_sku(cola).unwrap();
        let chips = SkuProduct::new(SkuId::new(), "SKU-002", "Chips", 180).unwrap();
        let chips_id = chips.id();
        store.insert_sku(chips).unwrap();

        for (slot_id, sku_id, quantity) in [
            (cola_slot, cola_id, cola_quantity),
            (chips_slot, chips_id, chips_quantity),
        ] {
            if quantity > 0 {
                SetSlotInventory {
                    machine_id,
                    tray_id,
                    slot_id,
                    sku_id,
                    quantity,
                    actor: test_actor(),
                }
                .execute(&store)
                .unwrap();
            }
        }

        ShelfFixture {
            store,
            machine_id,
            tray_id,
            cola_slot,
            cola_id,
            chips_slot,
            chips_id,
        }
    }

    fn cola_line(fixture: &ShelfFixture, quantity: u32) -> SaleLineRequest {
        SaleLineRequest {
            sku_id: fixture.cola_id,
            tray_id: fixture.tray_id,
            slot_id: fixture.cola_slot,
            quantity,
        }
    }

    fn chips_line(fixture: &ShelfFixture, quantity: u32) -> SaleLineRequest {
        SaleLineRequest {
            sku_id: fixture.chips_id,
            tray_id: fixture.tray_id,
            slot_id: fixture.chips_slot,
            quantity,
        }
    }

    fn row_quantity(fixture: &ShelfFixture, line: &SaleLineRequest) -> u32 {
        fixture
            .store
            .slot_inventory_row(&line.key(fixture.machine_id))
            .unwrap()
            .map(|row| row.quantity_on_hand())
            .unwrap_or(0)
    }

    fn sale(fixture: &ShelfFixture, lines: Vec<SaleLineRequest>) -> SkuSale {
        SkuSale {
            machine_id: fixture.machine_id,
            lines,
            payment_method: PaymentMethod::Cash,
            customer_id: None,
            actor: test_actor(),
        }
    }

    #[test]
    fn multi_line_sale_decrements_every_slot() {
        let fixture = shelf_fixture(10, 6);
        let receipt = sale(
            &fixture,
            vec![cola_line(&fixture, 2), chips_line(&fixture, 1)],
        )
        .execute(&fixture.store)
        .unwrap();

        assert_eq!(receipt.sale.total_amount(), 2 * 250 + 180);
        assert_eq!(receipt.sale.sale_type(), SaleType::Sku);
        assert_eq!(receipt.sale.status(), SaleStatus::Completed);
        assert_eq!(receipt.receipts.len(), 2);
        assert_eq!(row_quantity(&fixture, &cola_line(&fixture, 0)), 8);
        assert_eq!(row_quantity(&fixture, &chips_line(&fixture, 0)), 5);

        let persisted = fixture.store.sale(receipt.sale.transaction_id()).unwrap();
        assert_eq!(persisted, receipt.sale);

        let log = fixture
            .store
            .audit_log(&AuditQuery::for_action(AuditAction::SkuSold))
            .unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn failed_line_leaves_every_slot_untouched() {
        // Chips are out; the cola line must not move either.
        let fixture = shelf_fixture(10, 0);
        let err = sale(
            &fixture,
            vec![cola_line(&fixture, 2), chips_line(&fixture, 1)],
        )
        .execute(&fixture.store)
        .unwrap_err();

        assert_eq!(err.phase, SalePhase::Validating);
        assert!(matches!(err.source, StockError::NotFound(_)));
        assert_eq!(row_quantity(&fixture, &cola_line(&fixture, 0)), 10);
        assert!(
            fixture
                .store
                .sales_for_machine(fixture.machine_id)
                .unwrap()
                .is_empty()
        );
        assert!(
            fixture
                .store
                .audit_log(&AuditQuery::for_action(AuditAction::SkuSold))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn duplicate_lines_are_checked_against_staged_stock() {
        // Each line alone clears the per-line check; together they overdraw
        // the slot, and the second staged read sees the first decrement.
        let fixture = shelf_fixture(10, 6);
        let err = sale(
            &fixture,
            vec![cola_line(&fixture, 6), cola_line(&fixture, 6)],
        )
        .execute(&fixture.store)
        .unwrap_err();

        assert_eq!(err.phase, SalePhase::Reserving);
        assert_eq!(err.source, StockError::insufficient(6, 4));
        assert_eq!(row_quantity(&fixture, &cola_line(&fixture, 0)), 10);
        assert!(
            fixture
                .store
                .sales_for_machine(fixture.machine_id)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn short_line_reports_requested_and_available() {
        let fixture = shelf_fixture(3, 6);
        let err = sale(&fixture, vec![cola_line(&fixture, 5)])
            .execute(&fixture.store)
            .unwrap_err();

        assert_eq!(err.phase, SalePhase::Validating);
        assert_eq!(err.source, StockError::insufficient(5, 3));
    }

    #[test]
    fn empty_sale_is_rejected() {
        let fixture = shelf_fixture(10, 6);
        let err = sale(&fixture, vec![]).execute(&fixture.store).unwrap_err();
        assert_eq!(err.phase, SalePhase::Validating);
        assert!(matches!(err.source, StockError::InvalidInput(_)));
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let fixture = shelf_fixture(10, 6);
        let err = sale(&fixture, vec![cola_line(&fixture, 0)])
            .execute(&fixture.store)
            .unwrap_err();
        assert_eq!(err.phase, SalePhase::Validating);
        assert!(matches!(err.source, StockError::InvalidInput(_)));
    }

    #[test]
    fn unknown_sku_is_rejected() {
        let fixture = shelf_fixture(10, 6);
        let mut line = cola_line(&fixture, 1);
        line.sku_id = SkuId::new();
        let err = sale(&fixture, vec![line])
            .execute(&fixture.store)
            .unwrap_err();
        assert_eq!(err.phase, SalePhase::Validating);
        assert!(matches!(err.source, StockError::NotFound(_)));
    }

    #[test]
    fn check_availability_prices_without_touching_stock() {
        let fixture = shelf_fixture(10, 6);
        let report = check_availability(
            &fixture.store,
            fixture.machine_id,
            &[cola_line(&fixture, 3), chips_line(&fixture, 2)],
        )
        .unwrap();

        assert_eq!(report.total_amount, 3 * 250 + 2 * 180);
        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.lines[0].sku_name, "Cola can");
        assert_eq!(report.lines[0].requested_quantity, 3);
        assert_eq!(report.lines[0].available_quantity, 10);
        assert_eq!(report.lines[0].unit_price, 250);
        assert_eq!(report.lines[0].line_total, 750);

        assert_eq!(row_quantity(&fixture, &cola_line(&fixture, 0)), 10);
        assert_eq!(row_quantity(&fixture, &chips_line(&fixture, 0)), 6);
        assert!(
            fixture
                .store
                .sales_for_machine(fixture.machine_id)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn check_availability_errors_on_a_short_line() {
        let fixture = shelf_fixture(2, 6);
        let err = check_availability(
            &fixture.store,
            fixture.machine_id,
            &[cola_line(&fixture, 4)],
        )
        .unwrap_err();
        assert_eq!(err, StockError::insufficient(4, 2));
    }

    #[test]
    fn check_availability_requires_the_machine() {
        let fixture = shelf_fixture(10, 6);
        let err = check_availability(&fixture.store, MachineId::new(), &[cola_line(&fixture, 1)])
            .unwrap_err();
        assert!(matches!(err, StockError::NotFound(_)));
    }

    #[test]
    fn overflowing_price_aborts_while_validating() {
        // Any u64 is a valid unit price, so line math can overflow the
        // cents range; it must error, never wrap into a plausible total.
        let fixture = shelf_fixture(10, 6);
        let slot_a3 = Slot::new(SlotId::new(), "A3", fixture.tray_id).unwrap();
        let gold_slot = slot_a3.id();
        fixture.store.insert_slot(slot_a3).unwrap();
        let gold = SkuProduct::new(SkuId::new(), "SKU-003", "Gold bar", u64::MAX / 2 + 1).unwrap();
        let gold_id = gold.id();
        fixture.store.insert_sku(gold).unwrap();
        SetSlotInventory {
            machine_id: fixture.machine_id,
            tray_id: fixture.tray_id,
            slot_id: gold_slot,
            sku_id: gold_id,
            quantity: 5,
            actor: test_actor(),
        }
        .execute(&fixture.store)
        .unwrap();
        let gold_line = SaleLineRequest {
            sku_id: gold_id,
            tray_id: fixture.tray_id,
            slot_id: gold_slot,
            quantity: 3,
        };

        let err =
            check_availability(&fixture.store, fixture.machine_id, &[gold_line]).unwrap_err();
        assert!(matches!(err, StockError::InvariantViolation(_)));

        // Two lines that are each fine on their own overflow the sale total.
        let one_bar = SaleLineRequest {
            quantity: 1,
            ..gold_line
        };
        let err = check_availability(&fixture.store, fixture.machine_id, &[one_bar, one_bar])
            .unwrap_err();
        assert!(matches!(err, StockError::InvariantViolation(_)));

        let err = sale(&fixture, vec![gold_line])
            .execute(&fixture.store)
            .unwrap_err();
        assert_eq!(err.phase, SalePhase::Validating);
        assert!(matches!(err.source, StockError::InvariantViolation(_)));
        assert_eq!(row_quantity(&fixture, &gold_line), 5);
        assert!(
            fixture
                .store
                .sales_for_machine(fixture.machine_id)
                .unwrap()
                .is_empty()
        );
    }
}
