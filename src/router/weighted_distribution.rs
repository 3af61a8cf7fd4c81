//! Cumulative weight tables for splitting a trigger's traffic across
//! function versions.
//!
//! Entries keep the order in which the trigger declared its functions. Each
//! entry carries the prefix sum of all weights up to and including itself, so
//! a draw `r` in `[0, total)` selects the first entry whose prefix sum is
//! greater than `r`.
//!
//! Weights are stored as given. Zero weights are legal and never selected.
//! Negative weights are accepted without complaint here (validation belongs to
//! trigger admission), but they make the prefix sums non-monotonic and the
//! table is then reported as unusable by [`WeightedDistribution::is_usable`].

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedEntry {
    pub name: String,
    pub weight: i32,
    pub sum_prefix: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightedDistribution {
    entries: Vec<WeightedEntry>,
}

impl WeightedDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from `(name, weight)` pairs in iteration order.
    pub fn from_weights<'a, I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, i32)>,
    {
        let mut distribution = Self::new();
        for (name, weight) in weights {
            distribution.push(name, weight);
        }
        distribution
    }

    /// Appends an entry, extending the running prefix sum.
    pub fn push(&mut self, name: &str, weight: i32) -> &WeightedEntry {
        let sum_prefix = self.total_weight() + i64::from(weight);
        self.entries.push(WeightedEntry {
            name: name.to_string(),
            weight,
            sum_prefix,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[WeightedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> i64 {
        self.entries.last().map(|e| e.sum_prefix).unwrap_or(0)
    }

    /// True when the table can be sampled: non-empty, no negative weight and a
    /// positive total.
    pub fn is_usable(&self) -> bool {
        !self.entries.is_empty()
            && self.entries.iter().all(|e| e.weight >= 0)
            && self.total_weight() > 0
    }

    /// First entry whose prefix sum exceeds `r`.
    pub fn select(&self, r: i64) -> Option<&WeightedEntry> {
        if !self.is_usable() || r < 0 || r >= self.total_weight() {
            return None;
        }
        // prefix sums are sorted here, binary search is safe
        let idx = self.entries.partition_point(|e| e.sum_prefix <= r);
        self.entries.get(idx)
    }

    /// Draws `r` uniformly from `[0, total)` and selects with it.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&WeightedEntry> {
        if !self.is_usable() {
            return None;
        }
        let r = rng.gen_range(0..self.total_weight());
        self.select(r)
    }
}
