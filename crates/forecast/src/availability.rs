//! Coffee availability forecasting.
//!
//! Availability is the number of cups a recipe can still serve, limited by
//! the emptiest mapped canister. Unmapped ingredients short-circuit to
//! "not available" without evaluating the rest, and a machine owning no
//! canisters is just the everything-unmapped case, not an error.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use vendstock_audit::AuditRecord;
use vendstock_core::{
    Actor, CanisterId, IngredientId, MachineId, RecipeId, StockError, StockResult, UnitOfMeasure,
};
use vendstock_model::canister_lookup;
use vendstock_store::InMemoryStockStore;

/// Stock status of one recipe ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngredientStatus {
    /// The mapped canister covers at least one cup.
    Available,
    /// Mapped, but the canister cannot cover a single cup.
    Insufficient,
    /// No canister on the machine holds this ingredient.
    NotAvailable,
}

/// Per-ingredient availability detail. Canister capacity and level read as
/// zero when no canister maps to the ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAvailability {
    pub ingredient_id: IngredientId,
    pub ingredient_name: String,
    pub required_quantity: u32,
    pub required_unit: UnitOfMeasure,
    pub canister_id: Option<CanisterId>,
    pub canister_capacity: u32,
    pub current_level: u32,
    pub cups_possible: u32,
    pub status: IngredientStatus,
}

/// Availability of one recipe on one machine at the moment of the check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeAvailability {
    pub machine_id: MachineId,
    pub recipe_id: RecipeId,
    pub recipe_name: String,
    pub recipe_price: u64,
    pub max_cups_possible: u32,
    pub is_out_of_stock: bool,
    /// The ingredient whose canister binds `max_cups_possible`; first
    /// occurrence wins on ties.
    pub limiting_ingredient: Option<IngredientId>,
    pub ingredients: Vec<IngredientAvailability>,
}

/// Compute how many cups of `recipe_id` the machine can still serve.
///
/// Appends one `COFFEE_AVAILABILITY_CHECKED` audit entry recording the
/// outcome. Zero-quantity recipe lines draw nothing, bind nothing and
/// produce no detail row.
pub fn recipe_availability(
    store: &InMemoryStockStore,
    machine_id: MachineId,
    recipe_id: RecipeId,
    actor: &Actor,
) -> StockResult<RecipeAvailability> {
    let mut tx = store.begin();
    let machine = tx.machine(machine_id)?;
    if !machine.is_coffee_capable() {
        return Err(StockError::invalid_input(format!(
            "machine {machine_id} does not brew coffee"
        )));
    }
    let recipe = tx.recipe(recipe_id)?;
    if recipe.machine_id() != machine_id {
        return Err(StockError::not_found(format!(
            "recipe {recipe_id} does not belong to machine {machine_id}"
        )));
    }
    if !recipe.is_active() {
        return Err(StockError::invalid_input(format!(
            "recipe {recipe_id} is not active"
        )));
    }

    let canisters = tx.canisters_for_machine(machine_id)?;
    let lookup = canister_lookup(&canisters);

    let mut rows = Vec::new();
    let mut max_cups: Option<u32> = None;
    let mut limiting: Option<IngredientId> = None;
    let mut unmapped = false;
    for line in recipe.lines() {
        if line.quantity == 0 {
            continue;
        }
        let ingredient = tx.ingredient(line.ingredient_id)?;
        let canister = lookup
            .get(&line.ingredient_id)
            .and_then(|id| canisters.iter().find(|canister| canister.id() == *id));
        match canister {
            Some(canister) => {
                let cups = canister.current_level() / line.quantity;
                rows.push(IngredientAvailability {
                    ingredient_id: line.ingredient_id,
                    ingredient_name: ingredient.name().to_string(),
                    required_quantity: line.quantity,
                    required_unit: line.unit,
                    canister_id: Some(canister.id()),
                    canister_capacity: canister.capacity(),
                    current_level: canister.current_level(),
                    cups_possible: cups,
                    status: if cups > 0 {
                        IngredientStatus::Available
                    } else {
                        IngredientStatus::Insufficient
                    },
                });
                if max_cups.is_none_or(|current| cups < current) {
                    max_cups = Some(cups);
                    limiting = Some(line.ingredient_id);
                }
            }
            None => {
                rows.push(IngredientAvailability {
                    ingredient_id: line.ingredient_id,
                    ingredient_name: ingredient.name().to_string(),
                    required_quantity: line.quantity,
                    required_unit: line.unit,
                    canister_id: None,
                    canister_capacity: 0,
                    current_level: 0,
                    cups_possible: 0,
                    status: IngredientStatus::NotAvailable,
                });
                limiting = Some(line.ingredient_id);
                unmapped = true;
                break;
            }
        }
    }

    // A recipe whose every line binds nothing is never stock-limited.
    let max_cups_possible = if unmapped {
        0
    } else {
        max_cups.unwrap_or(u32::MAX)
    };
    let availability = RecipeAvailability {
        machine_id,
        recipe_id,
        recipe_name: recipe.name().to_string(),
        recipe_price: recipe.price(),
        max_cups_possible,
        is_out_of_stock: max_cups_possible < 1,
        limiting_ingredient: limiting,
        ingredients: rows,
    };

    tx.record(AuditRecord::availability_checked(
        machine_id,
        recipe_id,
        max_cups_possible,
        actor.clone(),
        Utc::now(),
    )?);
    tx.commit()?;
    tracing::debug!(
        "recipe {} on machine {}: {} cup(s) possible",
        recipe_id,
        machine_id,
        max_cups_possible
    );
    Ok(availability)
}

/// One recipe's row in a machine forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipeForecast {
    /// The availability check ran to completion.
    Computed(RecipeAvailability),
    /// The check itself failed; the recipe counts as out of stock.
    Failed {
        recipe_id: RecipeId,
        recipe_name: String,
        error: String,
    },
}

impl RecipeForecast {
    pub fn recipe_id(&self) -> RecipeId {
        match self {
            Self::Computed(availability) => availability.recipe_id,
            Self::Failed { recipe_id, .. } => *recipe_id,
        }
    }

    pub fn is_out_of_stock(&self) -> bool {
        match self {
            Self::Computed(availability) => availability.is_out_of_stock,
            Self::Failed { .. } => true,
        }
    }
}

/// Recipe counts for one machine. `available_recipes` and
/// `out_of_stock_recipes` always sum to `total_recipes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub total_recipes: u32,
    pub available_recipes: u32,
    pub out_of_stock_recipes: u32,
}

/// Availability of every active recipe on one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineForecast {
    pub machine_id: MachineId,
    pub recipes: Vec<RecipeForecast>,
    pub summary: ForecastSummary,
}

/// Run the availability check for every active recipe of the machine.
///
/// A per-recipe failure is captured as an error-carrying row instead of
/// aborting the rest of the forecast.
pub fn machine_forecast(
    store: &InMemoryStockStore,
    machine_id: MachineId,
    actor: &Actor,
) -> StockResult<MachineForecast> {
    let machine = store.machine(machine_id)?;
    if !machine.is_coffee_capable() {
        return Err(StockError::invalid_input(format!(
            "machine {machine_id} does not brew coffee"
        )));
    }

    let recipes: Vec<_> = store
        .recipes_for_machine(machine_id)?
        .into_iter()
        .filter(|recipe| recipe.is_active())
        .collect();
    let mut rows = Vec::with_capacity(recipes.len());
    let mut available_recipes = 0;
    let mut out_of_stock_recipes = 0;
    for recipe in &recipes {
        match recipe_availability(store, machine_id, recipe.id(), actor) {
            Ok(availability) => {
                if availability.is_out_of_stock {
                    out_of_stock_recipes += 1;
                } else {
                    available_recipes += 1;
                }
                rows.push(RecipeForecast::Computed(availability));
            }
            Err(err) => {
                out_of_stock_recipes += 1;
                rows.push(RecipeForecast::Failed {
                    recipe_id: recipe.id(),
                    recipe_name: recipe.name().to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    let summary = ForecastSummary {
        total_recipes: recipes.len() as u32,
        available_recipes,
        out_of_stock_recipes,
    };
    tracing::debug!(
        "machine {} forecast: {}/{} recipes available",
        machine_id,
        available_recipes,
        summary.total_recipes
    );
    Ok(MachineForecast {
        machine_id,
        recipes: rows,
        summary,
    })
}

/// Fleet-wide recipe counts. `overall_availability` is a percentage and is
/// `None` when no machine owns any active recipe, so callers must handle
/// the empty fleet instead of receiving a NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total_machines: u32,
    pub total_available_recipes: u32,
    pub total_out_of_stock_recipes: u32,
    pub overall_availability: Option<f64>,
}

/// Machine forecasts for every coffee-capable machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetForecast {
    pub machines: Vec<MachineForecast>,
    pub summary: FleetSummary,
}

/// Run the machine forecast for every coffee-capable machine and aggregate.
pub fn all_machines_forecast(
    store: &InMemoryStockStore,
    actor: &Actor,
) -> StockResult<FleetForecast> {
    let machines = store.machines()?;
    let mut forecasts = Vec::new();
    let mut total_available_recipes = 0u32;
    let mut total_out_of_stock_recipes = 0u32;
    for machine in machines.iter().filter(|machine| machine.is_coffee_capable()) {
        let forecast = machine_forecast(store, machine.id(), actor)?;
        total_available_recipes += forecast.summary.available_recipes;
        total_out_of_stock_recipes += forecast.summary.out_of_stock_recipes;
        forecasts.push(forecast);
    }

    let denominator = total_available_recipes + total_out_of_stock_recipes;
    let overall_availability = if denominator == 0 {
        None
    } else {
        Some(100.0 * f64::from(total_available_recipes) / f64::from(denominator))
    };
    Ok(FleetForecast {
        summary: FleetSummary {
            total_machines: forecasts.len() as u32,
            total_available_recipes,
            total_out_of_stock_recipes,
            overall_availability,
        },
        machines: forecasts,
    })
}
