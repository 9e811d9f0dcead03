//! Shared primitives for the confinement support runtime: path-safe
//! descriptor-relative filesystem I/O, the error object, and the
//! identifier/security-tag validation contract.

pub mod error;
pub mod fd;
pub mod safe_path;
pub mod snapname;

pub use error::{ConfineError, Domain, Kind};
