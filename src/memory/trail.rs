//! Undo log of the backtrackable environment.

/// A raw stored value, as saved on the trail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Word {
    Int(i64),
    Bool(bool),
    Double(f64),
}

/// Location of a stored cell inside the environment arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellRef {
    /// A scalar cell.
    Scalar(usize),
    /// One element of a vector cell: (vector, element).
    Element(usize, usize),
}

/// One undo record: the value and world stamp a cell had before it was
/// first modified in the current world.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrailEntry {
    pub(crate) cell: CellRef,
    pub(crate) old: Word,
    pub(crate) stamp: usize,
}

/// Append-only log of [`TrailEntry`], segmented by world.
///
/// `world_starts[w - 1]` holds the trail length at the moment world `w`
/// was pushed. Everything at or beyond that offset belongs to world `w`.
#[derive(Debug, Default)]
pub(crate) struct Trail {
    entries: Vec<TrailEntry>,
    world_starts: Vec<usize>,
}

impl Trail {
    pub(crate) fn with_capacity(updates: usize, worlds: usize) -> Self {
        Self {
            entries: Vec::with_capacity(updates),
            world_starts: Vec::with_capacity(worlds),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn save(&mut self, entry: TrailEntry) {
        self.entries.push(entry);
    }

    /// Opens the segment of a new world.
    pub(crate) fn open_world(&mut self) {
        self.world_starts.push(self.entries.len());
    }

    /// Closes the top segment and hands back its entries, most recent first.
    pub(crate) fn close_world(&mut self) -> std::iter::Rev<std::vec::IntoIter<TrailEntry>> {
        let start = self
            .world_starts
            .pop()
            .expect("trail corrupted: no open world segment");
        self.entries.split_off(start).into_iter().rev()
    }

    /// Closes the top segment and hands back its entries in insertion order,
    /// leaving the caller to re-save the ones that stay reachable.
    pub(crate) fn merge_world(&mut self) -> Vec<TrailEntry> {
        let start = self
            .world_starts
            .pop()
            .expect("trail corrupted: no open world segment");
        self.entries.split_off(start)
    }
}
