//! Per-entry load state machine and the render view derived from it.
//!
//! ```text
//! Placeholder ──eligible──▶ Loading ──fetch ok──▶ Loaded
//!                              └──────fetch err──▶ Failed
//! ```
//!
//! No transition goes backwards, and re-evaluating a settled entry never
//! issues another fetch.

use crate::error::FetchError;
use crate::layout::LayoutEntry;
use crate::manifest::MediaId;
use crate::transport::AssetResolver;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ItemLoadState {
    #[default]
    Placeholder,
    Loading,
    Loaded,
    /// Full asset could not be fetched. Terminal; keeps the placeholder.
    Failed,
}

impl ItemLoadState {
    pub fn is_settled(self) -> bool {
        matches!(self, ItemLoadState::Loaded | ItemLoadState::Failed)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ItemSlot {
    state: ItemLoadState,
}

impl ItemSlot {
    pub fn new() -> Self {
        ItemSlot::default()
    }

    pub fn state(&self) -> ItemLoadState {
        self.state
    }

    /// Re-evaluate against the frontier. Returns true exactly once, on the
    /// `Placeholder → Loading` edge, meaning the caller must start the fetch.
    pub fn evaluate(&mut self, visual_index: usize, loaded_count: usize) -> bool {
        if self.state != ItemLoadState::Placeholder || visual_index >= loaded_count {
            return false;
        }
        self.state = ItemLoadState::Loading;
        true
    }

    /// Apply a fetch result. Ignored unless the entry is `Loading`.
    pub fn complete(&mut self, result: &Result<(), FetchError>) -> bool {
        if self.state != ItemLoadState::Loading {
            return false;
        }
        self.state = match result {
            Ok(()) => ItemLoadState::Loaded,
            Err(_) => ItemLoadState::Failed,
        };
        true
    }

    pub fn view(&self, entry: &LayoutEntry, resolver: &AssetResolver) -> TileView {
        let filename = &entry.descriptor.processed_filename;
        let placeholder = || match resolver.placeholder_url(filename) {
            Some(url) => TileSource::Placeholder(url),
            None => TileSource::Uniform,
        };
        let (source, blurred) = match self.state {
            ItemLoadState::Placeholder | ItemLoadState::Loading => (placeholder(), true),
            ItemLoadState::Loaded => (TileSource::Full(resolver.full_url(filename)), false),
            ItemLoadState::Failed => (placeholder(), false),
        };
        TileView {
            id: entry.descriptor.id.clone(),
            column: entry.column,
            row: entry.row,
            visual_index: entry.visual_index,
            state: self.state,
            source,
            blurred,
            cross_fade: self.state == ItemLoadState::Loaded,
            broken: self.state == ItemLoadState::Failed,
        }
    }
}

// ── Presentation ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TileSource {
    /// Pre-generated low-resolution asset.
    Placeholder(String),
    /// No placeholder exists: a flat blurred block.
    Uniform,
    Full(String),
}

/// What the presentation layer draws for one tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileView {
    pub id: MediaId,
    pub column: usize,
    pub row: usize,
    pub visual_index: usize,
    pub state: ItemLoadState,
    pub source: TileSource,
    pub blurred: bool,
    /// Swap to the full asset with a short cross-fade.
    pub cross_fade: bool,
    pub broken: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MediaDescriptor;
    use std::sync::Arc;

    fn entry(i: usize) -> LayoutEntry {
        LayoutEntry {
            descriptor: Arc::new(MediaDescriptor::new(
                MediaId::Index(i as u64),
                format!("{}.jpg", i),
            )),
            column: i % 3,
            row: i / 3,
            visual_index: i,
        }
    }

    fn resolver() -> AssetResolver {
        AssetResolver::new("photos", Some("thumbs".into()))
    }

    #[test]
    fn beyond_frontier_stays_placeholder() {
        let mut slot = ItemSlot::new();
        assert!(!slot.evaluate(6, 6));
        assert_eq!(slot.state(), ItemLoadState::Placeholder);
    }

    #[test]
    fn eligible_entry_starts_loading_once() {
        let mut slot = ItemSlot::new();
        assert!(slot.evaluate(2, 6));
        assert_eq!(slot.state(), ItemLoadState::Loading);
        assert!(!slot.evaluate(2, 6));
        assert!(!slot.evaluate(2, 12));
    }

    #[test]
    fn success_reaches_loaded_and_sticks() {
        let mut slot = ItemSlot::new();
        slot.evaluate(0, 6);
        assert!(slot.complete(&Ok(())));
        assert_eq!(slot.state(), ItemLoadState::Loaded);
        assert!(!slot.evaluate(0, 6));
        assert!(!slot.evaluate(0, 60));
        assert!(!slot.complete(&Err(FetchError::Status(500))));
        assert_eq!(slot.state(), ItemLoadState::Loaded);
    }

    #[test]
    fn failure_is_terminal() {
        let mut slot = ItemSlot::new();
        slot.evaluate(0, 6);
        assert!(slot.complete(&Err(FetchError::Status(404))));
        assert_eq!(slot.state(), ItemLoadState::Failed);
        assert!(slot.state().is_settled());
        assert!(!slot.evaluate(0, 12));
    }

    #[test]
    fn completion_before_loading_is_ignored() {
        let mut slot = ItemSlot::new();
        assert!(!slot.complete(&Ok(())));
        assert_eq!(slot.state(), ItemLoadState::Placeholder);
    }

    #[test]
    fn views_follow_state() {
        let e = entry(4);
        let r = resolver();
        let mut slot = ItemSlot::new();

        let v = slot.view(&e, &r);
        assert_eq!(v.source, TileSource::Placeholder("thumbs/4.jpg".into()));
        assert!(v.blurred);
        assert!(!v.cross_fade);
        assert_eq!((v.column, v.row), (1, 1));

        slot.evaluate(4, 6);
        let v = slot.view(&e, &r);
        assert_eq!(v.state, ItemLoadState::Loading);
        assert!(v.blurred);

        slot.complete(&Ok(()));
        let v = slot.view(&e, &r);
        assert_eq!(v.source, TileSource::Full("photos/4.jpg".into()));
        assert!(!v.blurred);
        assert!(v.cross_fade);
    }

    #[test]
    fn failed_view_is_broken_placeholder() {
        let e = entry(1);
        let mut slot = ItemSlot::new();
        slot.evaluate(1, 6);
        slot.complete(&Err(FetchError::Transport("reset".into())));
        let v = slot.view(&e, &resolver());
        assert_eq!(v.source, TileSource::Placeholder("thumbs/1.jpg".into()));
        assert!(v.broken);
        assert!(!v.blurred);
    }

    #[test]
    fn uniform_placeholder_without_thumbnails() {
        let e = entry(0);
        let v = ItemSlot::new().view(&e, &AssetResolver::new("photos", None));
        assert_eq!(v.source, TileSource::Uniform);
        assert!(v.blurred);
    }
}
