//! Distributed Conway's Game of Life (B3/S23) with skip-scheduled halo
//! exchange.

pub mod halolife;
pub use halolife::{ExecutionMode, HaloLifeConfig, Pattern, RenderMode};
