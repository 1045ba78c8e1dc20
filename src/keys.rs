//! Key edge detection
//!
//! The device reports which keys are held, not transitions. Comparing
//! successive snapshots yields down, up and press events.

use speededitor_transport::{Key, KeySet};

/// A single key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Down(Key),
    Up(Key),
    /// A completed down/up cycle, emitted right after the matching `Up`
    Press(Key),
}

#[derive(Debug, Clone, Default)]
pub struct KeyEdgeDetector {
    held: KeySet,
}

impl KeyEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys held as of the last snapshot
    pub fn held(&self) -> &KeySet {
        &self.held
    }

    /// Forget held keys without emitting anything (new session)
    pub fn reset(&mut self) {
        self.held.clear();
    }

    /// Diff `keys` against the previous snapshot.
    ///
    /// All downs come first, then an `Up` + `Press` pair per released key.
    pub fn update(&mut self, keys: KeySet) -> Vec<KeyEdge> {
        let mut edges: Vec<KeyEdge> = keys
            .difference(&self.held)
            .map(|&k| KeyEdge::Down(k))
            .collect();
        for &key in self.held.difference(&keys) {
            edges.push(KeyEdge::Up(key));
            edges.push(KeyEdge::Press(key));
        }
        self.held = keys;
        edges
    }
}
