//! Layout planner: shuffle the manifest, deal it round-robin into columns and
//! number the result in row-major "visual order".
//!
//! Visual order is what the scheduler counts against: every entry on row `r`
//! comes before every entry on row `r + 1`, and within a row columns are
//! visited left to right. Short columns simply have no cell on the last row.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::manifest::{Manifest, MediaDescriptor};

#[derive(Clone, Debug)]
pub struct LayoutEntry {
    pub descriptor: Arc<MediaDescriptor>,
    pub column: usize,
    pub row: usize,
    pub visual_index: usize,
}

/// A planned layout. Entries are stored in visual order, so
/// `entries()[i].visual_index == i`.
#[derive(Clone, Debug, Default)]
pub struct Layout {
    entries: Vec<LayoutEntry>,
    /// Per column, the visual indices of its cells from top to bottom.
    columns: Vec<Vec<usize>>,
}

impl Layout {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn entry(&self, visual_index: usize) -> Option<&LayoutEntry> {
        self.entries.get(visual_index)
    }

    pub fn columns(&self) -> &[Vec<usize>] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Plan with the thread-local RNG. Reshuffles on every call.
pub fn plan_random(manifest: &Manifest, col_count: usize) -> Layout {
    plan(manifest, col_count, &mut rand::rng())
}

/// Plan with an injected random source. A `col_count` of 0 is treated as 1.
pub fn plan<R: Rng + ?Sized>(manifest: &Manifest, col_count: usize, rng: &mut R) -> Layout {
    let col_count = col_count.max(1);

    let mut permuted: Vec<Arc<MediaDescriptor>> = manifest.iter().cloned().collect();
    permuted.shuffle(rng);

    // Round-robin deal; a descriptor's row is its rank within its column.
    let mut dealt: Vec<Vec<Arc<MediaDescriptor>>> = vec![Vec::new(); col_count];
    for (i, d) in permuted.into_iter().enumerate() {
        dealt[i % col_count].push(d);
    }

    let rows = dealt.iter().map(Vec::len).max().unwrap_or(0);
    let mut entries = Vec::with_capacity(manifest.len());
    let mut columns = vec![Vec::with_capacity(rows); col_count];

    for row in 0..rows {
        for (column, cells) in dealt.iter().enumerate() {
            let Some(descriptor) = cells.get(row) else {
                continue;
            };
            let visual_index = entries.len();
            columns[column].push(visual_index);
            entries.push(LayoutEntry {
                descriptor: descriptor.clone(),
                column,
                row,
                visual_index,
            });
        }
    }

    tracing::debug!(
        "layout: {} entries in {} columns, {} rows",
        entries.len(),
        col_count,
        rows
    );

    Layout { entries, columns }
}
