//! Data layer: instrument files, the atmosphere table and the observation
//! catalogue.
//!
//! Architecture:
//! ```text
//!  *.fits
//!        │
//!        ▼
//!   ┌──────────┐
//!   │   fits    │  header cards + big-endian array → PrimaryHdu
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │   exes    │  rows + header → ExesSpectrum (norm, smoothing)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ catalog   │  directory scan → ObservationSummary list
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  selected objects → visible indices
//!   └──────────┘
//!
//!  model_atmosphere.csv ──► atmosphere ──► column densities
//! ```

pub mod atmosphere;
pub mod catalog;
pub mod exes;
pub mod filter;
pub mod fits;
pub mod model;
