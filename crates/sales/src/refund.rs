//! Sale refunds.

use chrono::Utc;

use vendstock_audit::AuditRecord;
use vendstock_core::Actor;
use vendstock_model::{SaleLine, SaleRecord, SaleType, SlotInventory, SlotKey, TransactionId};
use vendstock_store::InMemoryStockStore;

use crate::error::{SaleError, SaleResult};

/// Refund a completed sale by transaction id.
///
/// SKU sales restore every line's quantity into the slot it came from; the
/// line retains tray and slot for exactly this purpose, and a row that was
/// deleted since the sale is re-created rather than dropped. Coffee sales
/// only transition status, since brewed ingredients are gone. Restores, the
/// per-line `SKU_RESTOCKED` entries, the `SALE_REFUNDED` entry and the
/// status flip commit together or not at all.
#[derive(Debug, Clone)]
pub struct RefundSale {
    pub transaction_id: TransactionId,
    pub actor: Actor,
}

impl RefundSale {
    pub fn execute(&self, store: &InMemoryStockStore) -> SaleResult<SaleRecord> {
        let mut tx = store.begin();
        let mut sale = tx
            .sale(&self.transaction_id)
            .map_err(SaleError::validating)?;
        sale.mark_refunded().map_err(SaleError::validating)?;

        if sale.sale_type() == SaleType::Sku {
            for line in sale.lines() {
                if let SaleLine::Sku(line) = line {
                    let key = SlotKey {
                        machine_id: sale.machine_id(),
                        tray_id: line.tray_id,
                        slot_id: line.slot_id,
                        sku_id: line.sku_id,
                    };
                    let (previous, row) =
                        match tx.slot_inventory(&key).map_err(SaleError::reserving)? {
                            Some(mut row) => {
                                let previous = row.quantity_on_hand();
                                row.restock(line.quantity);
                                (previous, row)
                            }
                            None => (0, SlotInventory::new(key, line.quantity)),
                        };
                    let restored = row.quantity_on_hand();
                    tx.stage_slot_inventory(row);
                    tx.record(
                        AuditRecord::sku_restocked(
                            sale.machine_id(),
                            line.tray_id,
                            line.slot_id,
                            line.sku_id,
                            line.quantity,
                            previous,
                            restored,
                            self.actor.clone(),
                            Utc::now(),
                        )
                        .map_err(SaleError::reserving)?,
                    );
                }
            }
        }

        tx.record(
            AuditRecord::sale_refunded(sale.machine_id(), self.actor.clone(), Utc::now())
                .map_err(SaleError::reserving)?,
        );
        tx.stage_sale(sale.clone());
        tx.commit().map_err(SaleError::committing)?;
        tracing::info!("sale {} refunded", self.transaction_id);
        Ok(sale)
    }
}
