//! vendstock-sales — two-phase sale orchestration.
//!
//! A sale attempt validates everything it can read, stages every conditional
//! decrement together with its audit entries on one transaction, then commits.
//! A failure in any phase aborts the whole attempt, so the store never holds a
//! partially applied sale.

pub mod coffee;
pub mod error;
pub mod query;
pub mod refund;
pub mod sku;


pub use coffee::{CoffeeSale, CoffeeSaleReceipt};
pub use error::{SaleError, SalePhase, SaleResult};
pub use query::{SalesSummary, SalesWindow, sales_for_machine, sales_summary};
pub use refund::RefundSale;
pub use sku::{
    AvailabilityLine, AvailabilityReport, SaleLineRequest, SkuSale, SkuSaleReceipt,
    check_availability,
};
