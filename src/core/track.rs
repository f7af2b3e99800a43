//! Bonus items laid out on the track

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fraction of the distance over which items may be placed
const PLACEMENT_SPAN: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusItem {
    pub lane: usize,
    pub position: f64,
}

/// Active bonus items of one race. An item is removed as soon as it is consumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackEnvironment {
    items: Vec<BonusItem>,
    tolerance: f64,
}

impl TrackEnvironment {
    pub fn new(tolerance: f64) -> Self {
        Self {
            items: Vec::new(),
            tolerance,
        }
    }

    pub fn with_items(tolerance: f64, items: Vec<BonusItem>) -> Self {
        Self { items, tolerance }
    }

    /// Place `count` items on random lanes within the first 90% of the track
    pub fn scatter<R: Rng + ?Sized>(&mut self, rng: &mut R, count: usize, lanes: usize, distance: u32) {
        if lanes == 0 {
            return;
        }
        let span = distance as f64 * PLACEMENT_SPAN;
        for _ in 0..count {
            let lane = rng.gen_range(0..lanes);
            let position = rng.gen::<f64>() * span;
            self.items.push(BonusItem { lane, position });
        }
    }

    /// Remove and return the first item within tolerance of `(lane, position)`
    pub fn take_at(&mut self, lane: usize, position: f64) -> Option<BonusItem> {
        let index = self.items.iter().position(|item| self.reaches(item, lane, position))?;
        Some(self.items.remove(index))
    }

    /// Whether `take_at(lane, position)` would find an item
    pub fn has_item_at(&self, lane: usize, position: f64) -> bool {
        self.items.iter().any(|item| self.reaches(item, lane, position))
    }

    fn reaches(&self, item: &BonusItem, lane: usize, position: f64) -> bool {
        item.lane == lane && (item.position - position).abs() <= self.tolerance
    }

    pub fn items(&self) -> &[BonusItem] {
        &self.items
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
