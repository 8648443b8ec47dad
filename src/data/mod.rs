//! Input loading and subgraph extraction

pub mod loader;
pub mod layout;
pub mod preprocessing;

pub use layout::SpatialLayout;
