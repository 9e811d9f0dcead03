//! Freezer and device (v1) cgroup controllers for the confinement runtime.
//!
//! Only v1 is implemented; a v2 backend behind the same `DeviceCgroup`/
//! freezer shape is future work (see `DESIGN.md`).

#[cfg(feature = "v1")]
pub mod v1;

#[cfg(feature = "v1")]
pub mod facade;
