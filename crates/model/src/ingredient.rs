use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use vendstock_core::{CanisterId, IngredientId, MachineId, StockError, StockResult, UnitOfMeasure};

/// A bulk ingredient definition. Stock lives in canisters, never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    id: IngredientId,
    name: String,
    unit: UnitOfMeasure,
}

impl Ingredient {
    pub fn new(id: IngredientId, name: impl Into<String>, unit: UnitOfMeasure) -> StockResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StockError::invalid_input("ingredient name cannot be empty"));
        }
        Ok(Self { id, name, unit })
    }

    pub fn id(&self) -> IngredientId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> UnitOfMeasure {
        self.unit
    }
}

/// A bulk reservoir mounted on one machine, feeding zero or more
/// ingredients.
///
/// Invariant: `current_level <= capacity`, with `capacity > 0`. Both bounds
/// hold after every mutation; the only ways to move the level are
/// [`Canister::consume`] and [`Canister::refill_capped`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canister {
    id: CanisterId,
    name: String,
    machine_id: MachineId,
    ingredient_ids: BTreeSet<IngredientId>,
    capacity: u32,
    current_level: u32,
}

impl Canister {
    pub fn new(
        id: CanisterId,
        name: impl Into<String>,
        machine_id: MachineId,
        capacity: u32,
        current_level: u32,
    ) -> StockResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StockError::invalid_input("canister name cannot be empty"));
        }
        if capacity == 0 {
            return Err(StockError::invalid_input("capacity must be greater than 0"));
        }
        if current_level > capacity {
            return Err(StockError::invalid_input(
                "current level must be between 0 and capacity",
            ));
        }
        Ok(Self {
            id,
            name,
            machine_id,
            ingredient_ids: BTreeSet::new(),
            capacity,
            current_level,
        })
    }

    pub fn id(&self) -> CanisterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn machine_id(&self) -> MachineId {
        self.machine_id
    }

    pub fn ingredient_ids(&self) -> &BTreeSet<IngredientId> {
        &self.ingredient_ids
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    pub fn holds(&self, ingredient_id: IngredientId) -> bool {
        self.ingredient_ids.contains(&ingredient_id)
    }

    /// Room left before the canister is full.
    pub fn headroom(&self) -> u32 {
        self.capacity - self.current_level
    }

    pub fn is_full(&self) -> bool {
        self.current_level == self.capacity
    }

    /// Fill level as a percentage of capacity. Unrounded; round at the
    /// reporting edge only.
    pub fn stock_percentage(&self) -> f64 {
        (f64::from(self.current_level) / f64::from(self.capacity)) * 100.0
    }

    pub fn assign_ingredient(&mut self, ingredient_id: IngredientId) -> StockResult<()> {
        if !self.ingredient_ids.insert(ingredient_id) {
            return Err(StockError::invalid_input(
                "ingredient is already assigned to this canister",
            ));
        }
        Ok(())
    }

    /// Draw `amount` from the canister, failing when the level is short.
    pub fn consume(&mut self, amount: u32) -> StockResult<()> {
        match self.current_level.checked_sub(amount) {
            Some(level) => {
                self.current_level = level;
                Ok(())
            }
            None => Err(StockError::insufficient(amount, self.current_level)),
        }
    }

    /// Add up to `amount`, never past capacity. Returns the quantity
    /// actually applied (zero when already full).
    pub fn refill_capped(&mut self, amount: u32) -> u32 {
        let applied = amount.min(self.headroom());
        self.current_level += applied;
        applied
    }
}

/// Ingredient-to-canister lookup over one machine's canisters.
///
/// Canisters feed zero or more ingredients, and nothing stops two canisters
/// from feeding the same one. Callers pass the canisters sorted by id; when
/// several hold an ingredient, the first in that order wins.
pub fn canister_lookup(canisters: &[Canister]) -> HashMap<IngredientId, CanisterId> {
    let mut lookup = HashMap::new();
    for canister in canisters {
        for ingredient_id in canister.ingredient_ids() {
            lookup.entry(*ingredient_id).or_insert(canister.id());
        }
    }
    lookup
}
