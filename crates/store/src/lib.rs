//! vendstock-store — transactional store for stock records.
//!
//! Every record lives behind one lock; mutation happens through optimistic
//! [`Transaction`] handles. Reads of contended records pin the version
//! observed, staged writes are guarded on those pins, and `commit` applies
//! writes and audit records together, all or nothing.

pub mod memory;
pub mod version;

pub use memory::{InMemoryStockStore, Transaction};
pub use version::{ExpectedVersion, Versioned};
