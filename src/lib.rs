//! Core of the EXES explorer: instrument files, HITRAN line overlays and
//! the peak analysis behind the dashboard.

pub mod analysis;
pub mod config;
pub mod data;
pub mod hitran;
