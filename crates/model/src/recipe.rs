use serde::{Deserialize, Serialize};

use vendstock_core::{IngredientId, MachineId, RecipeId, StockError, StockResult, UnitOfMeasure};

/// One ingredient draw in a recipe. A zero quantity is legal and imposes
/// no limit on availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub ingredient_id: IngredientId,
    pub quantity: u32,
    pub unit: UnitOfMeasure,
}

/// A beverage recipe owned by one machine.
///
/// Availability is always recomputed from live canister levels; nothing on
/// the recipe caches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    id: RecipeId,
    name: String,
    /// Price in smallest currency unit (e.g., cents).
    price: u64,
    lines: Vec<RecipeLine>,
    machine_id: MachineId,
    is_active: bool,
}

impl Recipe {
    pub fn new(
        id: RecipeId,
        name: impl Into<String>,
        price: u64,
        lines: Vec<RecipeLine>,
        machine_id: MachineId,
    ) -> StockResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StockError::invalid_input("recipe name cannot be empty"));
        }
        if lines.is_empty() {
            return Err(StockError::invalid_input(
                "recipe needs at least one ingredient line",
            ));
        }
        Ok(Self {
            id,
            name,
            price,
            lines,
            machine_id,
            is_active: true,
        })
    }

    pub fn id(&self) -> RecipeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn lines(&self) -> &[RecipeLine] {
        &self.lines
    }

    pub fn machine_id(&self) -> MachineId {
        self.machine_id
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_line(quantity: u32) -> RecipeLine {
        RecipeLine {
            ingredient_id: IngredientId::new(),
            quantity,
            unit: UnitOfMeasure::Grams,
        }
    }

    #[test]
    fn new_recipe_starts_active() {
        let recipe = Recipe::new(
            RecipeId::new(),
            "Espresso",
            250,
            vec![test_line(10)],
            MachineId::new(),
        )
        .unwrap();
        assert!(recipe.is_active());
        assert_eq!(recipe.lines().len(), 1);
    }

    #[test]
    fn new_recipe_rejects_empty_lines() {
        let err =
            Recipe::new(RecipeId::new(), "Espresso", 250, vec![], MachineId::new()).unwrap_err();
        match err {
            StockError::InvalidInput(msg) if msg.contains("ingredient line") => {}
            _ => panic!("Expected InvalidInput for empty ingredient lines"),
        }
    }

    #[test]
    fn new_recipe_rejects_blank_name() {
        let err = Recipe::new(
            RecipeId::new(),
            "  ",
            250,
            vec![test_line(10)],
            MachineId::new(),
        )
        .unwrap_err();
        match err {
            StockError::InvalidInput(_) => {}
            _ => panic!("Expected InvalidInput for blank name"),
        }
    }

    #[test]
    fn deactivate_and_activate_toggle() {
        let mut recipe = Recipe::new(
            RecipeId::new(),
            "Latte",
            350,
            vec![test_line(10)],
            MachineId::new(),
        )
        .unwrap();
        recipe.deactivate();
        assert!(!recipe.is_active());
        recipe.activate();
        assert!(recipe.is_active());
    }
}
