//! Earnings engine for ride-hailing drivers: live trip tracking, per-trip
//! cost allocation, distance-based reward accrual, and offline-first
//! persistence of the resulting financial records.

pub mod config;
pub mod error;
pub mod persistence;
pub mod telemetry;
pub mod tracking;
