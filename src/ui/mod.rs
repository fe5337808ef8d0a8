pub mod map;
pub mod panels;
pub mod peaks;
pub mod plot;
