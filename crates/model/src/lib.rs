//! `vendstock-model` — typed records for vending-machine stock.
//!
//! Every record enforces its structural invariants in its constructor and
//! mutation helpers; counters can only move in ways that keep
//! `0 <= level <= capacity` true. Level changes are driven by the ledger,
//! never by writing fields directly.

pub mod ingredient;
pub mod machine;
pub mod recipe;
pub mod sale;
pub mod sku;

pub use ingredient::{Canister, Ingredient, canister_lookup};
pub use machine::{MachineKind, MachineStatus, Slot, Tray, VendingMachine};
pub use recipe::{Recipe, RecipeLine};
pub use sale::{
    CoffeeLine, PaymentMethod, SaleLine, SaleRecord, SaleStatus, SaleType, SkuLine, TransactionId,
};
pub use sku::{SkuProduct, SlotInventory, SlotKey};
