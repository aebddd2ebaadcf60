//! Backtrackable environment: worlds, stored cells and their trail.

use super::trail::{CellRef, Trail, TrailEntry, Word};
use std::fmt;
use std::marker::PhantomData;

/// Value and world stamp of one stored cell.
#[derive(Debug, Clone, Copy)]
pub struct Slot<T> {
    value: T,
    stamp: usize,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i64 {}
    impl Sealed for bool {}
    impl Sealed for f64 {}
}

/// Value types that can live in a backtrackable cell.
///
/// Implemented for `i64`, `bool` and `f64`; the set is closed.
pub trait Trailable: Copy + PartialEq + fmt::Debug + sealed::Sealed + 'static {
    #[doc(hidden)]
    fn to_word(self) -> Word;
    #[doc(hidden)]
    fn slots(env: &Environment) -> &Vec<Slot<Self>>;
    #[doc(hidden)]
    fn slots_mut(env: &mut Environment) -> &mut Vec<Slot<Self>>;
    #[doc(hidden)]
    fn vectors(env: &Environment) -> &Vec<Vec<Slot<Self>>>;
    #[doc(hidden)]
    fn vectors_mut(env: &mut Environment) -> &mut Vec<Vec<Slot<Self>>>;
}

macro_rules! impl_trailable {
    ($ty:ty, $variant:ident, $slots:ident, $vectors:ident) => {
        impl Trailable for $ty {
            fn to_word(self) -> Word {
                Word::$variant(self)
            }
            fn slots(env: &Environment) -> &Vec<Slot<Self>> {
                &env.$slots
            }
            fn slots_mut(env: &mut Environment) -> &mut Vec<Slot<Self>> {
                &mut env.$slots
            }
            fn vectors(env: &Environment) -> &Vec<Vec<Slot<Self>>> {
                &env.$vectors
            }
            fn vectors_mut(env: &mut Environment) -> &mut Vec<Vec<Slot<Self>>> {
                &mut env.$vectors
            }
        }
    };
}

impl_trailable!(i64, Int, ints, int_vectors);
impl_trailable!(bool, Bool, bools, bool_vectors);
impl_trailable!(f64, Double, doubles, double_vectors);

/// Handle to a backtrackable scalar cell owned by an [`Environment`].
pub struct Stored<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

/// Handle to a backtrackable vector whose elements are trailed one by one.
pub struct StoredVector<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

/// A backtrackable `i64`.
pub type StoredInt = Stored<i64>;
/// A backtrackable `bool`.
pub type StoredBool = Stored<bool>;
/// A backtrackable `f64`.
pub type StoredDouble = Stored<f64>;

macro_rules! impl_handle {
    ($name:ident) => {
        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }
        impl<T> Copy for $name<T> {}
        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.index == other.index
            }
        }
        impl<T> Eq for $name<T> {}
        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.index)
            }
        }
        impl<T> $name<T> {
            fn new(index: usize) -> Self {
                Self {
                    index,
                    _marker: PhantomData,
                }
            }
        }
    };
}

impl_handle!(Stored);
impl_handle!(StoredVector);

/// Owner of every backtrackable cell of a solver.
///
/// The environment is a stack of *worlds*. World 0 is the initial state;
/// [`world_push`](Self::world_push) opens world `w + 1` and
/// [`world_pop`](Self::world_pop) rewinds every cell to the value it had
/// when that world was opened.
///
/// A cell records its previous value on the trail only the first time it is
/// written in a given world (its stamp differs from the current world), so a
/// write costs O(1) amortized however often a propagator touches the cell.
///
/// # Examples
///
/// ```
/// use u_cpsolve::memory::Environment;
///
/// let mut env = Environment::new();
/// let x = env.make(10_i64);
///
/// env.world_push();
/// env.set(x, 3);
/// env.set(x, 4);
/// assert_eq!(env.get(x), 4);
///
/// env.world_pop();
/// assert_eq!(env.get(x), 10);
/// ```
pub struct Environment {
    world: usize,
    trail: Trail,
    ints: Vec<Slot<i64>>,
    bools: Vec<Slot<bool>>,
    doubles: Vec<Slot<f64>>,
    int_vectors: Vec<Vec<Slot<i64>>>,
    bool_vectors: Vec<Vec<Slot<bool>>>,
    double_vectors: Vec<Vec<Slot<f64>>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("world", &self.world)
            .field("trail_len", &self.trail.len())
            .field("cells", &self.cell_count())
            .finish()
    }
}

impl Environment {
    /// Creates an environment at world 0.
    pub fn new() -> Self {
        Self::with_capacity(1024, 64)
    }

    /// Creates an environment with pre-sized trail and world stacks.
    ///
    /// Both stacks still grow geometrically when exceeded.
    pub fn with_capacity(updates: usize, worlds: usize) -> Self {
        Self {
            world: 0,
            trail: Trail::with_capacity(updates, worlds),
            ints: Vec::new(),
            bools: Vec::new(),
            doubles: Vec::new(),
            int_vectors: Vec::new(),
            bool_vectors: Vec::new(),
            double_vectors: Vec::new(),
        }
    }

    /// Current world index.
    pub fn world_index(&self) -> usize {
        self.world
    }

    /// Number of undo records currently on the trail.
    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    /// Total number of scalar cells and vector elements.
    pub fn cell_count(&self) -> usize {
        self.ints.len()
            + self.bools.len()
            + self.doubles.len()
            + self.int_vectors.iter().map(Vec::len).sum::<usize>()
            + self.bool_vectors.iter().map(Vec::len).sum::<usize>()
            + self.double_vectors.iter().map(Vec::len).sum::<usize>()
    }

    /// Opens a new world.
    pub fn world_push(&mut self) {
        self.trail.open_world();
        self.world += 1;
    }

    /// Discards the current world, restoring every cell modified in it.
    ///
    /// # Panics
    ///
    /// Panics at world 0: there is no checkpoint below the initial one.
    pub fn world_pop(&mut self) {
        assert!(self.world > 0, "world_pop below the initial world");
        for entry in self.trail.close_world() {
            self.restore(entry);
        }
        self.world -= 1;
    }

    /// Pops worlds until the current world is `world`.
    ///
    /// # Panics
    ///
    /// Panics if `world` is above the current world.
    pub fn world_pop_until(&mut self, world: usize) {
        assert!(
            world <= self.world,
            "cannot pop up to world {world} from world {}",
            self.world
        );
        while self.world > world {
            self.world_pop();
        }
    }

    /// Merges the current world into its parent.
    ///
    /// Every modification made in the current world becomes part of the
    /// parent world: undo records whose saved stamp is the parent world are
    /// dropped (the parent value they would restore has been overwritten for
    /// good), the others are kept so that popping the parent still restores
    /// older worlds correctly.
    ///
    /// # Panics
    ///
    /// Panics at world 0.
    pub fn world_commit(&mut self) {
        assert!(self.world > 0, "world_commit at the initial world");
        let parent = self.world - 1;
        for entry in self.trail.merge_world() {
            self.restamp(&entry, parent);
            if entry.stamp != parent {
                self.trail.save(entry);
            }
        }
        self.world = parent;
    }

    /// Creates a scalar cell holding `initial`.
    ///
    /// The cell is stamped with the initial world wherever it is created, so
    /// backtracking below the creation world still restores `initial`.
    pub fn make<T: Trailable>(&mut self, initial: T) -> Stored<T> {
        let slots = T::slots_mut(self);
        slots.push(Slot {
            value: initial,
            stamp: 0,
        });
        Stored::new(slots.len() - 1)
    }

    /// Shorthand for `make::<i64>`.
    pub fn make_int(&mut self, initial: i64) -> StoredInt {
        self.make(initial)
    }

    /// Shorthand for `make::<bool>`.
    pub fn make_bool(&mut self, initial: bool) -> StoredBool {
        self.make(initial)
    }

    /// Shorthand for `make::<f64>`.
    pub fn make_double(&mut self, initial: f64) -> StoredDouble {
        self.make(initial)
    }

    /// Reads a scalar cell.
    #[inline]
    pub fn get<T: Trailable>(&self, cell: Stored<T>) -> T {
        T::slots(self)[cell.index].value
    }

    /// World in which a scalar cell was last written.
    pub fn stamp<T: Trailable>(&self, cell: Stored<T>) -> usize {
        T::slots(self)[cell.index].stamp
    }

    /// Writes a scalar cell, saving its previous value if this is the first
    /// write in the current world.
    pub fn set<T: Trailable>(&mut self, cell: Stored<T>, value: T) {
        let world = self.world;
        let slot = &mut T::slots_mut(self)[cell.index];
        if slot.value == value {
            return;
        }
        let saved = (slot.stamp != world).then(|| TrailEntry {
            cell: CellRef::Scalar(cell.index),
            old: slot.value.to_word(),
            stamp: slot.stamp,
        });
        slot.value = value;
        slot.stamp = world;
        if let Some(entry) = saved {
            self.trail.save(entry);
        }
    }

    /// Adds `delta` to an integer cell and returns the new value.
    pub fn add(&mut self, cell: StoredInt, delta: i64) -> i64 {
        let value = self
            .get(cell)
            .checked_add(delta)
            .unwrap_or_else(|| panic!("stored integer overflow adding {delta}"));
        self.set(cell, value);
        value
    }

    /// Creates a vector cell of `len` copies of `initial`.
    pub fn make_vector<T: Trailable>(&mut self, len: usize, initial: T) -> StoredVector<T> {
        let vectors = T::vectors_mut(self);
        vectors.push(vec![
            Slot {
                value: initial,
                stamp: 0
            };
            len
        ]);
        StoredVector::new(vectors.len() - 1)
    }

    /// Length of a vector cell.
    pub fn vector_len<T: Trailable>(&self, vector: StoredVector<T>) -> usize {
        T::vectors(self)[vector.index].len()
    }

    /// Reads one element of a vector cell.
    #[inline]
    pub fn get_at<T: Trailable>(&self, vector: StoredVector<T>, index: usize) -> T {
        T::vectors(self)[vector.index][index].value
    }

    /// Writes one element of a vector cell, trailing it like a scalar.
    pub fn set_at<T: Trailable>(&mut self, vector: StoredVector<T>, index: usize, value: T) {
        let world = self.world;
        let slot = &mut T::vectors_mut(self)[vector.index][index];
        if slot.value == value {
            return;
        }
        let saved = (slot.stamp != world).then(|| TrailEntry {
            cell: CellRef::Element(vector.index, index),
            old: slot.value.to_word(),
            stamp: slot.stamp,
        });
        slot.value = value;
        slot.stamp = world;
        if let Some(entry) = saved {
            self.trail.save(entry);
        }
    }

    fn slot_mut<T: Trailable>(&mut self, cell: CellRef) -> &mut Slot<T> {
        match cell {
            CellRef::Scalar(i) => &mut T::slots_mut(self)[i],
            CellRef::Element(v, i) => &mut T::vectors_mut(self)[v][i],
        }
    }

    fn restore(&mut self, entry: TrailEntry) {
        match entry.old {
            Word::Int(value) => {
                *self.slot_mut::<i64>(entry.cell) = Slot {
                    value,
                    stamp: entry.stamp,
                }
            }
            Word::Bool(value) => {
                *self.slot_mut::<bool>(entry.cell) = Slot {
                    value,
                    stamp: entry.stamp,
                }
            }
            Word::Double(value) => {
                *self.slot_mut::<f64>(entry.cell) = Slot {
                    value,
                    stamp: entry.stamp,
                }
            }
        }
    }

    fn restamp(&mut self, entry: &TrailEntry, stamp: usize) {
        // The saved word tells which arena the cell lives in.
        match entry.old {
            Word::Int(_) => self.slot_mut::<i64>(entry.cell).stamp = stamp,
            Word::Bool(_) => self.slot_mut::<bool>(entry.cell).stamp = stamp,
            Word::Double(_) => self.slot_mut::<f64>(entry.cell).stamp = stamp,
        }
    }
}
