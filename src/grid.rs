//! The grid instance: sole owner of the layout, the frontier and every
//! entry's load state.
//!
//! Hosts drive it from a single thread:
//!   1. `mount(manifest)` plans a layout and makes the first batch eligible
//!   2. `pump(now)` applies finished fetches, fires the timer and drains
//!      proximity reports
//!   3. `columns()` gives the presentation layer a snapshot to draw
//!   4. `unmount()` (or drop) cancels the timer and releases the watch
//!
//! Re-mounting swaps in a whole new layout at once and bumps the generation,
//! so completions and reports for the previous layout are ignored.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::{GridConfig, TriggerPolicy};
use crate::error::ObserverUnsupported;
use crate::item::{ItemLoadState, ItemSlot, TileView};
use crate::layout::{self, Layout};
use crate::manifest::Manifest;
use crate::observer::{Marker, ProximityObserver, WatcherManager};
use crate::scheduler::{BatchScheduler, TimerTrigger};
use crate::transport::{AssetFetcher, AssetResolver, FetchDone, Loader};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridStats {
    pub total: usize,
    pub eligible: usize,
    pub placeholder: usize,
    pub loading: usize,
    pub loaded: usize,
    pub failed: usize,
}

impl GridStats {
    pub fn settled(&self) -> usize {
        self.loaded + self.failed
    }
}

pub struct Grid<O: ProximityObserver> {
    config: GridConfig,
    resolver: AssetResolver,
    policy: TriggerPolicy,
    generation: u64,
    mounted: bool,
    layout: Layout,
    scheduler: BatchScheduler,
    items: Vec<ItemSlot>,
    loader: Loader,
    watchers: WatcherManager<O>,
    timer: Option<TimerTrigger>,
}

impl<O: ProximityObserver> Grid<O> {
    pub fn new(config: GridConfig, fetcher: Arc<dyn AssetFetcher>, observer: O) -> Self {
        let mut policy = config.trigger_policy;
        if policy == TriggerPolicy::Proximity && !observer.is_supported() {
            tracing::warn!("grid: {}, falling back to timer policy", ObserverUnsupported);
            policy = TriggerPolicy::Timer;
        }
        Grid {
            resolver: AssetResolver::new(
                config.asset_base_url.clone(),
                config.placeholder_base_url.clone(),
            ),
            watchers: WatcherManager::new(observer, config.proximity_margin_px),
            scheduler: BatchScheduler::new(0, config.batch_size),
            loader: Loader::new(fetcher),
            config,
            policy,
            generation: 0,
            mounted: false,
            layout: Layout::default(),
            items: Vec::new(),
            timer: None,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Plan `manifest` with the given random source and make it current.
    pub fn mount<R: Rng + ?Sized>(&mut self, manifest: &Manifest, rng: &mut R, now: Instant) {
        let planned = layout::plan(manifest, self.config.column_count, rng);
        self.install(planned, now);
    }

    pub fn mount_random(&mut self, manifest: &Manifest, now: Instant) {
        self.mount(manifest, &mut rand::rng(), now);
    }

    fn install(&mut self, planned: Layout, now: Instant) {
        self.teardown();
        self.generation += 1;
        self.scheduler = BatchScheduler::new(planned.len(), self.config.batch_size);
        self.items = vec![ItemSlot::new(); planned.len()];
        self.layout = planned;
        self.mounted = true;
        if self.policy == TriggerPolicy::Timer {
            self.timer = Some(TimerTrigger::start(self.config.timer_interval(), now));
        }
        tracing::info!(
            "grid: mounted generation {} ({} entries, first batch {})",
            self.generation,
            self.layout.len(),
            self.scheduler.loaded_count()
        );
        self.refresh();
    }

    /// Stop timers and watches; in-flight fetches finish but are ignored.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.teardown();
        self.generation += 1;
        self.mounted = false;
        tracing::info!("grid: unmounted");
    }

    fn teardown(&mut self) {
        if let Some(mut t) = self.timer.take() {
            t.cancel();
        }
        self.watchers.release_all();
        self.loader.forget_pending();
    }

    // ── Driving ─────────────────────────────────────────────────────────

    /// Process everything that is ready at `now`. Returns true if any
    /// entry changed state or the frontier moved.
    pub fn pump(&mut self, now: Instant) -> bool {
        if !self.mounted {
            return false;
        }
        let mut changed = false;

        while let Some(done) = self.loader.try_take() {
            changed |= self.apply(done);
        }

        let fired = match self.timer.as_mut() {
            Some(timer) => timer.poll(now, &mut self.scheduler),
            None => false,
        };
        if fired {
            changed = true;
            self.refresh();
        }

        for marker in self.watchers.take_reports() {
            changed |= self.on_proximity(marker);
        }

        changed
    }

    /// Block up to `timeout` for one fetch to finish and apply it.
    pub fn wait_for_fetch(&mut self, timeout: Duration) -> bool {
        if !self.mounted || self.loader.in_flight() == 0 {
            return false;
        }
        match self.loader.wait(timeout) {
            Some(done) => self.apply(done),
            None => false,
        }
    }

    /// A proximity report from the host. Advances the frontier when the
    /// marker is the one currently watched and sits inside the trailing window.
    pub fn on_proximity(&mut self, marker: Marker) -> bool {
        if !self.mounted || marker.generation != self.generation {
            return false;
        }
        if self.watchers.current() != Some(marker) {
            tracing::debug!("grid: report for released marker #{}", marker.visual_index);
            return false;
        }
        if !self.scheduler.on_proximity(marker.visual_index) {
            return false;
        }
        self.refresh();
        true
    }

    fn apply(&mut self, done: FetchDone) -> bool {
        if done.generation != self.generation {
            tracing::debug!("grid: dropping stale fetch of {}", done.url);
            return false;
        }
        let Some(slot) = self.items.get_mut(done.index) else {
            return false;
        };
        if let Err(e) = &done.result {
            tracing::warn!("grid: asset {} failed: {}", done.url, e);
        }
        slot.complete(&done.result)
    }

    /// Start fetches for newly eligible entries and move the watch.
    fn refresh(&mut self) {
        let loaded_count = self.scheduler.loaded_count();
        for (i, slot) in self.items.iter_mut().enumerate().take(loaded_count) {
            if !slot.evaluate(i, loaded_count) {
                continue;
            }
            if let Some(entry) = self.layout.entry(i) {
                let url = self.resolver.full_url(&entry.descriptor.processed_filename);
                self.loader.schedule(self.generation, i, url);
            }
        }

        if self.policy == TriggerPolicy::Proximity {
            let desired = self.scheduler.trailing_marker().and_then(|i| {
                self.layout.entry(i).map(|e| Marker {
                    generation: self.generation,
                    visual_index: i,
                    row: e.row,
                })
            });
            self.watchers.sync(desired);
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn loaded_count(&self) -> usize {
        self.scheduler.loaded_count()
    }

    pub fn in_flight(&self) -> usize {
        self.loader.in_flight()
    }

    pub fn state(&self, visual_index: usize) -> Option<ItemLoadState> {
        self.items.get(visual_index).map(ItemSlot::state)
    }

    pub fn watched_marker(&self) -> Option<Marker> {
        self.watchers.current()
    }

    pub fn next_timer_due(&self) -> Option<Instant> {
        self.timer.as_ref().and_then(TimerTrigger::next_due)
    }

    pub fn observer(&self) -> &O {
        self.watchers.observer()
    }

    pub fn observer_mut(&mut self) -> &mut O {
        self.watchers.observer_mut()
    }

    /// Every entry is eligible and has either loaded or failed.
    pub fn is_settled(&self) -> bool {
        self.scheduler.is_exhausted() && self.items.iter().all(|s| s.state().is_settled())
    }

    pub fn stats(&self) -> GridStats {
        let mut stats = GridStats {
            total: self.items.len(),
            eligible: self.scheduler.loaded_count(),
            ..GridStats::default()
        };
        for slot in &self.items {
            match slot.state() {
                ItemLoadState::Placeholder => stats.placeholder += 1,
                ItemLoadState::Loading => stats.loading += 1,
                ItemLoadState::Loaded => stats.loaded += 1,
                ItemLoadState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Per column, top to bottom, what each tile should show right now.
    pub fn columns(&self) -> Vec<Vec<TileView>> {
        self.layout
            .columns()
            .iter()
            .map(|cells| {
                cells
                    .iter()
                    .filter_map(|&i| {
                        let entry = self.layout.entry(i)?;
                        Some(self.items[i].view(entry, &self.resolver))
                    })
                    .collect()
            })
            .collect()
    }
}

impl<O: ProximityObserver> Drop for Grid<O> {
    fn drop(&mut self) {
        self.unmount();
    }
}
