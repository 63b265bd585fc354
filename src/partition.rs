/*!
The partition of comparisons into divergence events.

Events live in an arena owned by [`EventPartition`]; comparisons refer to
events by index only. After every structural change the partition is brought
back to canonical form: events are numbered by the first comparison that maps
to them, and events without comparisons are dropped. Two partitions are
therefore equal exactly when their assignment vectors are equal.

```rust
use popdiv_mcmc::partition::EventPartition;

let mut p = EventPartition::new(vec![3, 3, 1], vec![0.0, 0.2, 0.0, 0.5]).unwrap();
assert_eq!(p.assignments(), &[0, 0, 1]);
assert_eq!(p.height(0), 0.5);

p.merge(1, 0);
assert_eq!(p.number_of_events(), 1);
```
*/

use crate::error::{McmcError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct EventPartition {
    assignments: Vec<usize>,
    heights: Vec<f64>,
}

impl EventPartition {
    /// Builds a partition from raw labels and per-label heights, then relabels
    /// it canonically. Labels without comparisons are discarded.
    pub fn new(assignments: Vec<usize>, heights: Vec<f64>) -> Result<Self> {
        if assignments.is_empty() {
            return Err(McmcError::config("a partition needs at least one comparison"));
        }
        if let Some(&bad) = assignments.iter().find(|&&e| e >= heights.len()) {
            return Err(McmcError::config(format!(
                "event label {bad} has no height ({} heights given)",
                heights.len()
            )));
        }
        let mut partition = Self {
            assignments,
            heights,
        };
        partition.canonicalize();
        Ok(partition)
    }

    /// Every comparison in its own event.
    pub fn general(heights: Vec<f64>) -> Result<Self> {
        let assignments = (0..heights.len()).collect();
        Self::new(assignments, heights)
    }

    /// Number of comparisons.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn number_of_events(&self) -> usize {
        self.heights.len()
    }

    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    pub fn event_of(&self, comparison: usize) -> usize {
        self.assignments[comparison]
    }

    pub fn height(&self, event: usize) -> f64 {
        self.heights[event]
    }

    pub fn height_of_comparison(&self, comparison: usize) -> f64 {
        self.heights[self.assignments[comparison]]
    }

    pub fn set_height(&mut self, event: usize, height: f64) {
        self.heights[event] = height;
    }

    pub fn multiplicity(&self, event: usize) -> usize {
        self.assignments.iter().filter(|&&e| e == event).count()
    }

    /// Number of comparisons mapped to each event, indexed by event.
    pub fn multiplicities(&self) -> Vec<usize> {
        let mut counts = vec![0; self.heights.len()];
        for &e in &self.assignments {
            counts[e] += 1;
        }
        counts
    }

    /// Comparisons mapped to `event`, ascending.
    pub fn comparisons_in(&self, event: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, &e)| e == event)
            .map(|(i, _)| i)
            .collect()
    }

    /// Events shared by more than one comparison.
    pub fn shared_events(&self) -> Vec<usize> {
        self.multiplicities()
            .into_iter()
            .enumerate()
            .filter(|(_, m)| *m > 1)
            .map(|(e, _)| e)
            .collect()
    }

    /// All comparisons share a single event.
    pub fn is_fully_shared(&self) -> bool {
        self.heights.len() == 1
    }

    /// Every comparison has its own event.
    pub fn is_fully_general(&self) -> bool {
        self.heights.len() == self.assignments.len()
    }

    /// Moves a comparison to an existing event. The partition may be left
    /// with an empty event until [`canonicalize`](Self::canonicalize) runs.
    pub fn assign(&mut self, comparison: usize, event: usize) {
        self.assignments[comparison] = event;
    }

    /// Moves a comparison to a new event at `height` and returns its index.
    /// The partition may need canonicalizing afterwards.
    pub fn assign_new_event(&mut self, comparison: usize, height: f64) -> usize {
        self.heights.push(height);
        let event = self.heights.len() - 1;
        self.assignments[comparison] = event;
        event
    }

    /// Moves `moving` comparisons into a new event at `height`.
    pub fn split(&mut self, moving: &[usize], height: f64) {
        self.heights.push(height);
        let event = self.heights.len() - 1;
        for &c in moving {
            self.assignments[c] = event;
        }
        self.canonicalize();
    }

    /// Moves every comparison of `from` into `into` and drops `from`.
    /// Returns the height of the discarded event.
    pub fn merge(&mut self, from: usize, into: usize) -> f64 {
        let discarded = self.heights[from];
        for e in self.assignments.iter_mut() {
            if *e == from {
                *e = into;
            }
        }
        self.canonicalize();
        discarded
    }

    /// Renumbers events by first appearance and drops empty ones.
    pub fn canonicalize(&mut self) {
        let mut relabel: Vec<Option<usize>> = vec![None; self.heights.len()];
        let mut heights = Vec::with_capacity(self.heights.len());
        for e in self.assignments.iter_mut() {
            let new = match relabel[*e] {
                Some(new) => new,
                None => {
                    heights.push(self.heights[*e]);
                    let new = heights.len() - 1;
                    relabel[*e] = Some(new);
                    new
                }
            };
            *e = new;
        }
        self.heights = heights;
    }
}
