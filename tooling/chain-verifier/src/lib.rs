//! Offline integrity checks for a persisted biochain ledger.
//!
//! The verifier works on raw JSON values rather than typed blocks so that a damaged
//! ledger (missing fields, wrong types, unknown channels) is still walked end to end and
//! every problem is reported against the block where it occurs.

pub mod loader;
pub mod report;
pub mod stats;
pub mod verifier;

pub use loader::{LoadError, load_ledger};
pub use stats::LedgerStats;
pub use verifier::{BlockFinding, LedgerVerifier, VerificationReport, Violation};
