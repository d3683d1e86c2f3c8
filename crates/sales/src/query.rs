//! Sale listings and aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendstock_core::{MachineId, StockError, StockResult};
use vendstock_model::{SaleRecord, SaleStatus, SaleType};
use vendstock_store::InMemoryStockStore;

/// Time window and cap for sale queries. Bounds are inclusive; `limit` caps
/// listings and is ignored by aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SalesWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl SalesWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if at > end {
                return false;
            }
        }
        true
    }
}

/// Aggregates over completed sales. Refunded and failed sales are excluded
/// from every figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    /// Sum of completed sale totals, in smallest currency unit.
    pub total_sales: u64,
    pub total_transactions: u32,
    pub avg_transaction_value: f64,
    pub sku_sales: u32,
    pub coffee_sales: u32,
}

impl SalesSummary {
    fn empty() -> Self {
        Self {
            total_sales: 0,
            total_transactions: 0,
            avg_transaction_value: 0.0,
            sku_sales: 0,
            coffee_sales: 0,
        }
    }
}

/// Sales of one machine inside the window, newest first.
pub fn sales_for_machine(
    store: &InMemoryStockStore,
    machine_id: MachineId,
    window: &SalesWindow,
) -> StockResult<Vec<SaleRecord>> {
    let mut sales: Vec<SaleRecord> = store
        .sales_for_machine(machine_id)?
        .into_iter()
        .filter(|sale| window.contains(sale.timestamp()))
        .collect();
    if let Some(limit) = window.limit {
        sales.truncate(limit);
    }
    Ok(sales)
}

/// Summarize completed sales, optionally scoped to one machine.
pub fn sales_summary(
    store: &InMemoryStockStore,
    machine_id: Option<MachineId>,
    window: &SalesWindow,
) -> StockResult<SalesSummary> {
    let sales = match machine_id {
        Some(machine_id) => store.sales_for_machine(machine_id)?,
        None => store.sales()?,
    };
    let completed: Vec<&SaleRecord> = sales
        .iter()
        .filter(|sale| {
            sale.status() == SaleStatus::Completed && window.contains(sale.timestamp())
        })
        .collect();
    if completed.is_empty() {
        return Ok(SalesSummary::empty());
    }

    let total_sales = completed
        .iter()
        .try_fold(0u64, |sum, sale| sum.checked_add(sale.total_amount()))
        .ok_or_else(|| StockError::invariant("summary total overflow"))?;
    let sku_sales = completed
        .iter()
        .filter(|sale| sale.sale_type() == SaleType::Sku)
        .count() as u32;
    let coffee_sales = completed
        .iter()
        .filter(|sale| sale.sale_type() == SaleType::Coffee)
        .count() as u32;
    Ok(SalesSummary {
        total_sales,
        total_transactions: completed.len() as u32,
        avg_transaction_value: total_sales as f64 / completed.len() as f64,
        sku_sales,
        coffee_sales,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use vendstock_core::{Actor, RecipeId, SkuId, SlotId, TrayId};
    use vendstock_model::{
        CoffeeLine, MachineKind, PaymentMethod, SaleLine, SkuLine, TransactionId, VendingMachine,
    };

    use super::*;

    fn seeded_machine(store: &InMemoryStockStore) -> MachineId {
        let machine = VendingMachine::new(
            MachineId::new(),
            "Snack wall",
            MachineKind::Slot,
            "Ground floor",
        )
        .unwrap();
        let machine_id = machine.id();
        store
            .insert_machine(machine, &Actor::new("operator-7"))
            .unwrap();
        machine_id
    }

    fn sku_sale(machine_id: MachineId, total: u64, at: DateTime<Utc>) -> SaleRecord {
        SaleRecord::new(
            TransactionId::generate(),
            machine_id,
            SaleType::Sku,
            vec![SaleLine::Sku(SkuLine {
                sku_id: SkuId::new(),
                tray_id: TrayId::new(),
                slot_id: SlotId::new(),
                quantity: 1,
                unit_price: total,
                total_price: total,
            })],
            total,
            PaymentMethod::Cash,
            None,
            at,
        )
        .unwrap()
    }

    fn coffee_sale(machine_id: MachineId, total: u64, at: DateTime<Utc>) -> SaleRecord {
        SaleRecord::new(
            TransactionId::generate(),
            machine_id,
            SaleType::Coffee,
            vec![SaleLine::Coffee(CoffeeLine {
                recipe_id: RecipeId::new(),
                quantity: 1,
                unit_price: total,
                total_price: total,
            })],
            total,
            PaymentMethod::Card,
            None,
            at,
        )
        .unwrap()
    }

    fn persist(store: &InMemoryStockStore, sale: SaleRecord) {
        let mut tx = store.begin();
        tx.stage_sale(sale);
        tx.commit().unwrap();
    }

    #[test]
    fn listing_is_newest_first_and_capped() {
        let store = InMemoryStockStore::new();
        let machine_id = seeded_machine(&store);
        let base = Utc::now();
        for minutes_ago in [3, 2, 1] {
            persist(
                &store,
                sku_sale(machine_id, 100, base - Duration::minutes(minutes_ago)),
            );
        }

        let listed = sales_for_machine(
            &store,
            machine_id,
            &SalesWindow {
                limit: Some(2),
                ..SalesWindow::default()
            },
        )
        .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].timestamp(), base - Duration::minutes(1));
        assert_eq!(listed[1].timestamp(), base - Duration::minutes(2));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let store = InMemoryStockStore::new();
        let machine_id = seeded_machine(&store);
        let base = Utc::now();
        for minutes_ago in [3, 2, 1] {
            persist(
                &store,
                sku_sale(machine_id, 100, base - Duration::minutes(minutes_ago)),
            );
        }

        let listed = sales_for_machine(
            &store,
            machine_id,
            &SalesWindow {
                start: Some(base - Duration::minutes(2)),
                end: Some(base - Duration::minutes(1)),
                limit: None,
            },
        )
        .unwrap();
        assert_eq!(listed.len(), 2, "both boundary timestamps are included");
    }

    #[test]
    fn summary_counts_only_completed_sales() {
        let store = InMemoryStockStore::new();
        let machine_id = seeded_machine(&store);
        let now = Utc::now();
        persist(&store, sku_sale(machine_id, 500, now));
        persist(&store, coffee_sale(machine_id, 250, now));
        let mut refunded = sku_sale(machine_id, 300, now);
        refunded.mark_refunded().unwrap();
        persist(&store, refunded);

        let summary = sales_summary(&store, Some(machine_id), &SalesWindow::default()).unwrap();
        assert_eq!(summary.total_sales, 750);
        assert_eq!(summary.total_transactions, 2);
        assert_eq!(summary.avg_transaction_value, 375.0);
        assert_eq!(summary.sku_sales, 1);
        assert_eq!(summary.coffee_sales, 1);
    }

    #[test]
    fn empty_summary_is_all_zeros() {
        let store = InMemoryStockStore::new();
        let machine_id = seeded_machine(&store);
        let summary = sales_summary(&store, Some(machine_id), &SalesWindow::default()).unwrap();
        assert_eq!(summary.total_transactions, 0);
        assert_eq!(summary.total_sales, 0);
        assert_eq!(summary.avg_transaction_value, 0.0);
    }

    #[test]
    fn summary_scopes_to_one_machine_when_asked() {
        let store = InMemoryStockStore::new();
        let first = seeded_machine(&store);
        let second = seeded_machine(&store);
        let now = Utc::now();
        persist(&store, sku_sale(first, 500, now));
        persist(&store, sku_sale(second, 900, now));

        let scoped = sales_summary(&store, Some(first), &SalesWindow::default()).unwrap();
        assert_eq!(scoped.total_sales, 500);

        let fleet = sales_summary(&store, None, &SalesWindow::default()).unwrap();
        assert_eq!(fleet.total_sales, 1400);
        assert_eq!(fleet.total_transactions, 2);
    }

    #[test]
    fn summary_total_overflow_is_an_invariant_error() {
        // Valid sales can still sum past u64; the summary must error
        // rather than report a wrapped figure.
        let store = InMemoryStockStore::new();
        let machine_id = seeded_machine(&store);
        let now = Utc::now();
        persist(&store, sku_sale(machine_id, u64::MAX, now));
        persist(&store, sku_sale(machine_id, 1, now));

        let err = sales_summary(&store, Some(machine_id), &SalesWindow::default()).unwrap_err();
        assert!(matches!(err, StockError::InvariantViolation(_)));
    }
}
