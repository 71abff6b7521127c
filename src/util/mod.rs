//! Utility modules for revfs-rs.

pub mod inflight;

pub use inflight::Inflight;
