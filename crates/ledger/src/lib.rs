//! vendstock-ledger — atomic, audited stock mutations.
//!
//! Each command stages its counter write and exactly one audit entry on a
//! store transaction; the commit applies both or neither. Commands come in
//! two forms: `apply` composes onto a caller's transaction, `execute` runs
//! in a one-shot transaction of its own.

pub mod commands;
pub mod retry;

pub use commands::{
    ConsumeCanister, ConsumeIngredients, ConsumeSlot, ConsumptionReceipt, IngredientDraw,
    RefillCanister, RefillOutcome, SetSlotInventory, SlotReceipt,
};
pub use retry::{RetryPolicy, with_retries};
