//! Progressive masonry grid loader.
//!
//! A manifest of photos is shuffled into columns, numbered in row-major
//! visual order, and revealed in batches: placeholders show at once, full
//! assets are fetched only for entries behind the eligibility frontier, and
//! the frontier moves on a timer or when the viewport nears its trailing
//! marker.

pub mod config;
pub mod error;
pub mod grid;
pub mod item;
pub mod layout;
pub mod manifest;
pub mod observer;
pub mod scheduler;
pub mod transport;

pub use config::{GridConfig, TriggerPolicy};
pub use grid::{Grid, GridStats};
pub use item::{ItemLoadState, TileSource, TileView};
pub use layout::{Layout, LayoutEntry};
pub use manifest::{Manifest, ManifestSource, MediaDescriptor, MediaId};
pub use observer::{Marker, ProximityObserver, SimulatedViewport};
