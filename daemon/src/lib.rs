//! Call-tree monitoring daemon
//!
//! Pulls call-tree snapshots from a monitored process, flattens them into
//! per-action intervals and serves time-bucketed latency quantiles over a
//! Unix socket.

pub mod config;
pub mod daemon;
pub mod histogram;
pub mod payload;
pub mod protocol;
pub mod refresh;
pub mod socket;
pub mod source;
pub mod state;
pub mod tree;
