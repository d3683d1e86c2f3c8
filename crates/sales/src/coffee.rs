//! Coffee sale orchestration.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use vendstock_core::{Actor, MachineId, RecipeId, StockError};
use vendstock_ledger::{ConsumeIngredients, ConsumptionReceipt, IngredientDraw};
use vendstock_model::{
    CoffeeLine, PaymentMethod, SaleLine, SaleRecord, SaleType, TransactionId, canister_lookup,
};
use vendstock_store::InMemoryStockStore;

use crate::error::{SaleError, SaleResult};

/// A completed coffee sale: the persisted record plus the canister draws
/// that paid for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeeSaleReceipt {
    pub sale: SaleRecord,
    pub consumed: Vec<ConsumptionReceipt>,
}

/// One coffee sale attempt: a single cup of one recipe.
///
/// The transaction id is generated before anything else so a failed attempt
/// can still be reported under a stable id; the receipt and the persisted
/// record always carry the same one.
#[derive(Debug, Clone)]
pub struct CoffeeSale {
    pub machine_id: MachineId,
    pub recipe_id: RecipeId,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<String>,
    pub actor: Actor,
}

impl CoffeeSale {
    pub fn execute(&self, store: &InMemoryStockStore) -> SaleResult<CoffeeSaleReceipt> {
        let transaction_id = TransactionId::generate();
        let timestamp = Utc::now();
        let mut tx = store.begin();

        tx.machine(self.machine_id).map_err(SaleError::validating)?;
        let recipe = tx.recipe(self.recipe_id).map_err(SaleError::validating)?;
        if recipe.machine_id() != self.machine_id {
            return Err(SaleError::validating(StockError::not_found(format!(
                "recipe {} does not belong to machine {}",
                self.recipe_id, self.machine_id
            ))));
        }
        if !recipe.is_active() {
            return Err(SaleError::validating(StockError::invalid_input(format!(
                "recipe {} is not active",
                self.recipe_id
            ))));
        }

        // Every ingredient must clear before the first draw is staged. The
        // levels read here are the ones the commit guards pin, so a check
        // that passes and then loses a race fails at commit, not silently.
        let canisters = tx
            .canisters_for_machine(self.machine_id)
            .map_err(SaleError::validating)?;
        let lookup = canister_lookup(&canisters);
        for line in recipe.lines() {
            if line.quantity == 0 {
                continue;
            }
            let canister = lookup
                .get(&line.ingredient_id)
                .and_then(|id| canisters.iter().find(|canister| canister.id() == *id))
                .ok_or_else(|| {
                    SaleError::validating(StockError::not_found(format!(
                        "no canister on machine {} holds ingredient {}",
                        self.machine_id, line.ingredient_id
                    )))
                })?;
            if canister.current_level() < line.quantity {
                return Err(SaleError::validating(StockError::insufficient(
                    line.quantity,
                    canister.current_level(),
                )));
            }
        }

        let consumed = ConsumeIngredients {
            machine_id: self.machine_id,
            draws: recipe
                .lines()
                .iter()
                .map(|line| IngredientDraw {
                    ingredient_id: line.ingredient_id,
                    quantity: line.quantity,
                })
                .collect(),
            actor: self.actor.clone(),
        }
        .apply(&mut tx)
        .map_err(SaleError::reserving)?;

        let line = CoffeeLine {
            recipe_id: self.recipe_id,
            quantity: 1,
            unit_price: recipe.price(),
            total_price: recipe.price(),
        };
        let sale = SaleRecord::new(
            transaction_id,
            self.machine_id,
            SaleType::Coffee,
            vec![SaleLine::Coffee(line)],
            recipe.price(),
            self.payment_method,
            self.customer_id.clone(),
            timestamp,
        )
        .map_err(SaleError::reserving)?;
        tx.stage_sale(sale.clone());

        tx.commit().map_err(SaleError::committing)?;
        tracing::info!(
            "coffee sale {} completed on machine {} ({} draw(s))",
            sale.transaction_id(),
            self.machine_id,
            consumed.len()
        );
        Ok(CoffeeSaleReceipt { sale, consumed })
    }
}
