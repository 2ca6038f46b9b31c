//! Scrapes MARTA's realtime-arrivals feeds, archives the raw responses to
//! pluggable sinks, and reconstructs per-train runs in Postgres by
//! correlating repeated observations of the same vehicle across time and
//! stations.

pub mod classify;
pub mod config;
pub mod db;
pub mod errors;
pub mod marta;
pub mod services;
pub mod sinks;
pub mod taxonomy;
