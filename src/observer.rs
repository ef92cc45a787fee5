//! Viewport observer manager: keeps exactly one proximity watch on the
//! marker just behind the loading frontier.
//!
//! The host supplies the proximity mechanism through [`ProximityObserver`]
//! (a browser IntersectionObserver, a scroll container, or the headless
//! [`SimulatedViewport`]). Reports are pulled with `take_reports` on the
//! grid's own thread.

/// A watched position in the layout. `generation` ties it to one planned
/// layout so reports for an old layout can be told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Marker {
    pub generation: u64,
    pub visual_index: usize,
    pub row: usize,
}

pub trait ProximityObserver {
    fn is_supported(&self) -> bool {
        true
    }
    /// Start watching `marker`; report once it comes within `margin_px` of the viewport.
    fn observe(&mut self, marker: Marker, margin_px: u32);
    fn release(&mut self, marker: Marker);
    /// Reports delivered since the last call, oldest first.
    fn take_reports(&mut self) -> Vec<Marker>;
}

/// Host without any proximity mechanism.
#[derive(Debug, Default)]
pub struct Unsupported;

impl ProximityObserver for Unsupported {
    fn is_supported(&self) -> bool {
        false
    }
    fn observe(&mut self, _marker: Marker, _margin_px: u32) {}
    fn release(&mut self, _marker: Marker) {}
    fn take_reports(&mut self) -> Vec<Marker> {
        Vec::new()
    }
}

// ── Manager ─────────────────────────────────────────────────────────────

pub struct WatcherManager<O: ProximityObserver> {
    observer: O,
    margin_px: u32,
    current: Option<Marker>,
}

impl<O: ProximityObserver> WatcherManager<O> {
    pub fn new(observer: O, margin_px: u32) -> Self {
        WatcherManager {
            observer,
            margin_px,
            current: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.observer.is_supported()
    }

    pub fn current(&self) -> Option<Marker> {
        self.current
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Move the single watch to `desired`, releasing whatever was watched before.
    pub fn sync(&mut self, desired: Option<Marker>) {
        if self.current == desired {
            return;
        }
        if let Some(old) = self.current.take() {
            self.observer.release(old);
            tracing::debug!("observer: -watch #{}", old.visual_index);
        }
        if let Some(new) = desired {
            self.observer.observe(new, self.margin_px);
            self.current = Some(new);
            tracing::debug!(
                "observer: +watch #{} (row {}, margin {}px)",
                new.visual_index,
                new.row,
                self.margin_px
            );
        }
    }

    pub fn release_all(&mut self) {
        self.sync(None);
    }

    pub fn take_reports(&mut self) -> Vec<Marker> {
        self.observer.take_reports()
    }
}

impl<O: ProximityObserver> Drop for WatcherManager<O> {
    fn drop(&mut self) {
        self.release_all();
    }
}

// ── Simulated viewport ──────────────────────────────────────────────────

/// Headless stand-in for a scrolling viewport over fixed-height rows.
///
/// A marker on row `r` is "near" once `r * row_height <= scroll + viewport_height + margin`.
/// Each watch reports once, when it first becomes near (including at observe time).
#[derive(Debug)]
pub struct SimulatedViewport {
    row_height_px: u32,
    viewport_height_px: u32,
    scroll_px: u32,
    watched: Vec<(Marker, u32, bool)>,
    reports: Vec<Marker>,
}

impl SimulatedViewport {
    pub fn new(row_height_px: u32, viewport_height_px: u32) -> Self {
        SimulatedViewport {
            row_height_px,
            viewport_height_px,
            scroll_px: 0,
            watched: Vec::new(),
            reports: Vec::new(),
        }
    }

    pub fn scroll_px(&self) -> u32 {
        self.scroll_px
    }

    pub fn watch_count(&self) -> usize {
        self.watched.len()
    }

    pub fn scroll_by(&mut self, px: u32) {
        self.scroll_px = self.scroll_px.saturating_add(px);
        self.check();
    }

    fn is_near(&self, marker: &Marker, margin_px: u32) -> bool {
        let top = (marker.row as u64) * self.row_height_px as u64;
        let reach = self.scroll_px as u64 + self.viewport_height_px as u64 + margin_px as u64;
        top <= reach
    }

    fn check(&mut self) {
        for i in 0..self.watched.len() {
            let (marker, margin, reported) = self.watched[i];
            if !reported && self.is_near(&marker, margin) {
                self.watched[i].2 = true;
                self.reports.push(marker);
            }
        }
    }
}

impl ProximityObserver for SimulatedViewport {
    fn observe(&mut self, marker: Marker, margin_px: u32) {
        self.watched.push((marker, margin_px, false));
        self.check();
    }

    fn release(&mut self, marker: Marker) {
        self.watched.retain(|(m, _, _)| *m != marker);
    }

    fn take_reports(&mut self) -> Vec<Marker> {
        std::mem::take(&mut self.reports)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records observe/release calls; reports fire only when a test says so.
    #[derive(Debug, Default)]
    pub(crate) struct FakeObserver {
        pub(crate) observed: Vec<Marker>,
        pub(crate) released: Vec<Marker>,
        pub(crate) reports: Vec<Marker>,
        pub(crate) margin: Option<u32>,
    }

    impl FakeObserver {
        pub(crate) fn outstanding(&self) -> usize {
            self.observed.len() - self.released.len()
        }

        pub(crate) fn fire(&mut self, marker: Marker) {
            self.reports.push(marker);
        }

        pub(crate) fn last_observed(&self) -> Option<Marker> {
            self.observed.last().copied()
        }
    }

    impl ProximityObserver for FakeObserver {
        fn observe(&mut self, marker: Marker, margin_px: u32) {
            self.observed.push(marker);
            self.margin = Some(margin_px);
        }

        fn release(&mut self, marker: Marker) {
            self.released.push(marker);
        }

        fn take_reports(&mut self) -> Vec<Marker> {
            std::mem::take(&mut self.reports)
        }
    }
}
