//! # Pointer Geometry
//!
//! Resolves pointer positions to block ids for drag selection.
//!
//! Measuring rendered block positions is a host concern behind
//! [`GeometryProvider`]. Everything else here is pure: [`GeometryMap`] maps a
//! vertical offset to the block that starts above it, [`PointerThrottle`]
//! coalesces move events and [`DragSelection`] turns resolved blocks into
//! range updates.

use crate::selection::Selection;
use folio_blocks::BlockId;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// Host-side measurement of rendered blocks
pub trait GeometryProvider {
    /// Top offset of each of `blocks`, relative to `anchor`'s container.
    /// Blocks that are not rendered may be omitted.
    fn measure(&self, anchor: &BlockId, blocks: &[BlockId]) -> Vec<(BlockId, f32)>;
}

/// Sorted offset → block lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryMap {
    offsets: BTreeMap<OrderedFloat<f32>, BlockId>,
}

impl GeometryMap {
    pub fn from_measurements(measurements: impl IntoIterator<Item = (BlockId, f32)>) -> Self {
        let offsets = measurements
            .into_iter()
            .filter(|(_, offset)| offset.is_finite())
            .map(|(id, offset)| (OrderedFloat(offset), id))
            .collect();
        Self { offsets }
    }

    /// The block with the greatest offset strictly less than `y`
    pub fn resolve(&self, y: f32) -> Option<&BlockId> {
        if y.is_nan() {
            return None;
        }
        self.offsets
            .range(..OrderedFloat(y))
            .next_back()
            .map(|(_, id)| id)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Coalesces pointer samples to at most one per interval.
///
/// A sample arriving inside the interval replaces any pending one; the
/// latest pending sample is released by [`PointerThrottle::flush`] once the
/// interval has elapsed.
#[derive(Debug, Clone)]
pub struct PointerThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<f32>,
}

impl PointerThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
        }
    }

    pub fn offer(&mut self, y: f32, now: Instant) -> Option<f32> {
        if self.is_open(now) {
            self.last_emit = Some(now);
            self.pending = None;
            Some(y)
        } else {
            self.pending = Some(y);
            None
        }
    }

    pub fn flush(&mut self, now: Instant) -> Option<f32> {
        if self.pending.is_some() && self.is_open(now) {
            self.last_emit = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn reset(&mut self) {
        self.last_emit = None;
        self.pending = None;
    }

    fn is_open(&self, now: Instant) -> bool {
        self.last_emit
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }
}

/// Range update produced by a resolved pointer position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragStep {
    /// Pointer is back over the anchor: collapse to a single selection
    Collapse(BlockId),
    /// Extend the range from the anchor to the resolved block
    Extend { start: BlockId, end: BlockId },
}

/// An in-progress pointer drag anchored at one block
#[derive(Debug, Clone)]
pub struct DragSelection {
    anchor: BlockId,
    geometry: GeometryMap,
    moved: bool,
}

impl DragSelection {
    pub fn new(anchor: BlockId, geometry: GeometryMap) -> Self {
        Self {
            anchor,
            geometry,
            moved: false,
        }
    }

    pub fn anchor(&self) -> &BlockId {
        &self.anchor
    }

    pub fn has_moved(&self) -> bool {
        self.moved
    }

    /// Resolve a pointer offset against the cached geometry
    pub fn step(&mut self, y: f32, selection: &Selection) -> Option<DragStep> {
        self.moved = true;
        let resolved = self.geometry.resolve(y)?;

        if *resolved == self.anchor {
            if selection.start.is_some() && selection.single() != Some(&self.anchor) {
                return Some(DragStep::Collapse(self.anchor.clone()));
            }
            return None;
        }

        if selection.end.as_ref() != Some(resolved) {
            return Some(DragStep::Extend {
                start: self.anchor.clone(),
                end: resolved.clone(),
            });
        }
        None
    }
}
