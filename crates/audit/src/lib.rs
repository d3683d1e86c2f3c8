//! `vendstock-audit` — append-only audit trail records.
//!
//! Every mutating ledger operation writes exactly one [`AuditRecord`] in the
//! same transaction as the mutation it describes. Records are validated at
//! construction: the required-field set varies by [`AuditAction`], and an
//! invalid record fails the enclosing operation before anything is written.

pub mod query;
pub mod record;

pub use query::AuditQuery;
pub use record::{AuditAction, AuditDraft, AuditRecord};
