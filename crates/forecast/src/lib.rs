//! vendstock-forecast — read-side availability and stock classification.
//!
//! Everything here recomputes from live store state; nothing is cached. The
//! only side effect is the read-event audit entry each check appends.

pub mod availability;
pub mod low_stock;

pub use availability::{
    FleetForecast, FleetSummary, ForecastSummary, IngredientAvailability, IngredientStatus,
    MachineForecast, RecipeAvailability, RecipeForecast, all_machines_forecast, machine_forecast,
    recipe_availability,
};
pub use low_stock::{
    CRITICAL_PERCENTAGE, DEFAULT_LOW_STOCK_PERCENTAGE, DEFAULT_SLOT_THRESHOLD, LowStockReport,
    LowStockSummary, LowStockWarning, StockStatus, low_stock_report, low_stock_slots,
};
