//! HITRAN side: line tables, molecule catalogue, partition sums and the
//! strength physics that turns them into overlays.
//!
//! ```text
//!   lines ──┐
//!   partition ──► strength ──► overlay ──► stem traces
//!   data::atmosphere ──┘
//! ```

pub mod lines;
pub mod molecules;
pub mod overlay;
pub mod partition;
pub mod strength;
