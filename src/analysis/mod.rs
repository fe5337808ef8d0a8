//! Sub-region analysis of a spectrum: selection, dip detection and
//! line-shape fitting.

pub mod fit;
pub mod peaks;
pub mod selection;
