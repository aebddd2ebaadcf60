//! Integer domains built on stored cells.

use super::events::EventKind;
use crate::memory::{Environment, StoredInt, StoredVector};
use std::sync::Arc;

/// Returned by a domain mutator that would leave the domain empty.
///
/// The domain itself is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyDomain;

/// Outcome of a domain mutation: the event it produced, if anything changed.
pub type DomainUpdate = Result<Option<EventKind>, EmptyDomain>;

const WORD: usize = 64;

/// Value sets sparser than this many values per bit-word are stored with
/// an explicit sorted value table instead of a bitset over the whole span.
const DENSE_VALUES_PER_WORD: i128 = WORD as i128;

/// Maps the bits of an enumerated domain to values.
#[derive(Debug, Clone)]
pub enum Universe {
    /// Bit `i` is the value `offset + i`.
    Dense { offset: i64, len: usize },
    /// Bit `i` is `values[i]`; the table is sorted and deduplicated.
    Sparse(Arc<[i64]>),
}

impl Universe {
    fn new(values: &[i64]) -> Self {
        let (lb, ub) = (values[0], values[values.len() - 1]);
        let span = ub as i128 - lb as i128 + 1;
        if span <= values.len() as i128 * DENSE_VALUES_PER_WORD {
            Universe::Dense {
                offset: lb,
                len: span as usize,
            }
        } else {
            Universe::Sparse(values.into())
        }
    }

    fn len(&self) -> usize {
        match self {
            Universe::Dense { len, .. } => *len,
            Universe::Sparse(values) => values.len(),
        }
    }

    fn value(&self, i: usize) -> i64 {
        match self {
            Universe::Dense { offset, .. } => offset + i as i64,
            Universe::Sparse(values) => values[i],
        }
    }

    /// Bit of `value`, if it belongs to the universe.
    fn index(&self, value: i64) -> Option<usize> {
        match self {
            Universe::Dense { offset, len } => {
                let d = value as i128 - *offset as i128;
                (0..*len as i128).contains(&d).then_some(d as usize)
            }
            Universe::Sparse(values) => values.binary_search(&value).ok(),
        }
    }

    /// Bit of a value known to belong to the universe.
    fn pos(&self, value: i64) -> usize {
        self.index(value)
            .unwrap_or_else(|| panic!("domain bound {value} outside its universe"))
    }

    /// Number of universe values `<= value`.
    fn count_le(&self, value: i64) -> usize {
        match self {
            Universe::Dense { offset, len } => {
                (value as i128 - *offset as i128 + 1).clamp(0, *len as i128) as usize
            }
            Universe::Sparse(values) => values.partition_point(|&v| v <= value),
        }
    }

    /// Number of universe values `< value`.
    fn count_lt(&self, value: i64) -> usize {
        match self {
            Universe::Dense { offset, len } => {
                (value as i128 - *offset as i128).clamp(0, *len as i128) as usize
            }
            Universe::Sparse(values) => values.partition_point(|&v| v < value),
        }
    }
}

/// Finite integer domain.
///
/// - `Bounded`: an interval `[lb, ub]`; interior removals are ignored.
/// - `Enumerated`: an arbitrary set backed by a stored bitset over its
///   [`Universe`]. Bits below `lb` or above `ub` are stale and never read;
///   `size` counts the set bits inside `[lb, ub]`.
#[derive(Debug, Clone)]
pub enum IntDomain {
    Bounded {
        lb: StoredInt,
        ub: StoredInt,
    },
    Enumerated {
        lb: StoredInt,
        ub: StoredInt,
        size: StoredInt,
        universe: Universe,
        words: StoredVector<i64>,
    },
}

impl IntDomain {
    pub(crate) fn bounded(env: &mut Environment, lb: i64, ub: i64) -> Self {
        IntDomain::Bounded {
            lb: env.make_int(lb),
            ub: env.make_int(ub),
        }
    }

    /// Enumerated domain over a sorted, deduplicated, non-empty value list.
    pub(crate) fn enumerated(env: &mut Environment, values: &[i64]) -> Self {
        let universe = Universe::new(values);
        let words = env.make_vector(universe.len().div_ceil(WORD), 0_i64);
        for &v in values {
            let i = universe.pos(v);
            let w = env.get_at(words, i / WORD) as u64 | (1u64 << (i % WORD));
            env.set_at(words, i / WORD, w as i64);
        }
        IntDomain::Enumerated {
            lb: env.make_int(values[0]),
            ub: env.make_int(values[values.len() - 1]),
            size: env.make_int(values.len() as i64),
            universe,
            words,
        }
    }

    pub fn is_enumerated(&self) -> bool {
        matches!(self, IntDomain::Enumerated { .. })
    }

    #[inline]
    pub fn lb(&self, env: &Environment) -> i64 {
        match self {
            IntDomain::Bounded { lb, .. } | IntDomain::Enumerated { lb, .. } => env.get(*lb),
        }
    }

    #[inline]
    pub fn ub(&self, env: &Environment) -> i64 {
        match self {
            IntDomain::Bounded { ub, .. } | IntDomain::Enumerated { ub, .. } => env.get(*ub),
        }
    }

    /// Number of values, saturating at `i64::MAX`.
    pub fn size(&self, env: &Environment) -> i64 {
        match self {
            IntDomain::Bounded { lb, ub } => env
                .get(*ub)
                .saturating_sub(env.get(*lb))
                .saturating_add(1),
            IntDomain::Enumerated { size, .. } => env.get(*size),
        }
    }

    pub fn is_instantiated(&self, env: &Environment) -> bool {
        self.lb(env) == self.ub(env)
    }

    pub fn contains(&self, env: &Environment, value: i64) -> bool {
        if value < self.lb(env) || value > self.ub(env) {
            return false;
        }
        match self {
            IntDomain::Bounded { .. } => true,
            IntDomain::Enumerated {
                universe, words, ..
            } => universe
                .index(value)
                .is_some_and(|i| (env.get_at(*words, i / WORD) as u64) >> (i % WORD) & 1 == 1),
        }
    }

    /// Smallest value of the domain strictly greater than `value`.
    pub fn next_value(&self, env: &Environment, value: i64) -> Option<i64> {
        let (lb, ub) = (self.lb(env), self.ub(env));
        if value >= ub {
            return None;
        }
        match self {
            IntDomain::Bounded { .. } => Some((value + 1).max(lb)),
            IntDomain::Enumerated {
                universe, words, ..
            } => {
                let from = universe.count_le(value).max(universe.pos(lb));
                next_set(env, *words, from, universe.pos(ub)).map(|i| universe.value(i))
            }
        }
    }

    /// Largest value of the domain strictly smaller than `value`.
    pub fn previous_value(&self, env: &Environment, value: i64) -> Option<i64> {
        let (lb, ub) = (self.lb(env), self.ub(env));
        if value <= lb {
            return None;
        }
        match self {
            IntDomain::Bounded { .. } => Some((value - 1).min(ub)),
            IntDomain::Enumerated {
                universe, words, ..
            } => {
                // lb < value, so at least one universe value lies below it
                let from = (universe.count_lt(value) - 1).min(universe.pos(ub));
                prev_set(env, *words, from, universe.pos(lb)).map(|i| universe.value(i))
            }
        }
    }

    /// All current values, in increasing order.
    pub fn values(&self, env: &Environment) -> Vec<i64> {
        let mut out = Vec::with_capacity(self.size(env).clamp(0, 1 << 16) as usize);
        let mut v = Some(self.lb(env));
        while let Some(x) = v {
            out.push(x);
            v = self.next_value(env, x);
        }
        out
    }

    pub fn update_lower_bound(&self, env: &mut Environment, value: i64) -> DomainUpdate {
        let (lb, ub) = (self.lb(env), self.ub(env));
        if value <= lb {
            return Ok(None);
        }
        if value > ub {
            return Err(EmptyDomain);
        }
        match self {
            IntDomain::Bounded { lb: lb_cell, .. } => env.set(*lb_cell, value),
            IntDomain::Enumerated {
                lb: lb_cell,
                size,
                universe,
                words,
                ..
            } => {
                let new_lb = if self.contains(env, value) {
                    value
                } else {
                    self.next_value(env, value).ok_or(EmptyDomain)?
                };
                let removed = count_set(env, *words, universe.pos(lb), universe.pos(new_lb) - 1);
                env.add(*size, -removed);
                env.set(*lb_cell, new_lb);
            }
        }
        Ok(Some(self.bound_event(env, EventKind::IncLow)))
    }

    pub fn update_upper_bound(&self, env: &mut Environment, value: i64) -> DomainUpdate {
        let (lb, ub) = (self.lb(env), self.ub(env));
        if value >= ub {
            return Ok(None);
        }
        if value < lb {
            return Err(EmptyDomain);
        }
        match self {
            IntDomain::Bounded { ub: ub_cell, .. } => env.set(*ub_cell, value),
            IntDomain::Enumerated {
                ub: ub_cell,
                size,
                universe,
                words,
                ..
            } => {
                let new_ub = if self.contains(env, value) {
                    value
                } else {
                    self.previous_value(env, value).ok_or(EmptyDomain)?
                };
                let removed = count_set(env, *words, universe.pos(new_ub) + 1, universe.pos(ub));
                env.add(*size, -removed);
                env.set(*ub_cell, new_ub);
            }
        }
        Ok(Some(self.bound_event(env, EventKind::DecUpp)))
    }

    pub fn update_bounds(&self, env: &mut Environment, lo: i64, hi: i64) -> DomainUpdate {
        if lo > hi || lo > self.ub(env) || hi < self.lb(env) {
            return Err(EmptyDomain);
        }
        // Check emptiness before touching anything.
        if self.is_enumerated() {
            let first = if self.contains(env, lo) {
                Some(lo)
            } else {
                self.next_value(env, lo)
            };
            if !matches!(first, Some(v) if v <= hi) {
                return Err(EmptyDomain);
            }
        }
        let low = self.update_lower_bound(env, lo)?;
        let high = self.update_upper_bound(env, hi)?;
        Ok(match (low, high) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            (a, b) => a.or(b),
        })
    }

    /// Removes `value`. On a bounded domain only a bound can be removed;
    /// an interior value is left in place.
    pub fn remove_value(&self, env: &mut Environment, value: i64) -> DomainUpdate {
        if !self.contains(env, value) {
            return Ok(None);
        }
        let (lb, ub) = (self.lb(env), self.ub(env));
        if lb == ub {
            return Err(EmptyDomain);
        }
        if value == lb {
            return self.update_lower_bound(env, value + 1);
        }
        if value == ub {
            return self.update_upper_bound(env, value - 1);
        }
        match self {
            IntDomain::Bounded { .. } => Ok(None),
            IntDomain::Enumerated {
                size,
                universe,
                words,
                ..
            } => {
                let i = universe.pos(value);
                let w = env.get_at(*words, i / WORD) as u64 & !(1u64 << (i % WORD));
                env.set_at(*words, i / WORD, w as i64);
                env.add(*size, -1);
                Ok(Some(EventKind::Remove))
            }
        }
    }

    /// Removes every value in `[from, to]`.
    pub fn remove_interval(&self, env: &mut Environment, from: i64, to: i64) -> DomainUpdate {
        let (lb, ub) = (self.lb(env), self.ub(env));
        if from > to || to < lb || from > ub {
            return Ok(None);
        }
        if from <= lb {
            if to >= ub {
                return Err(EmptyDomain);
            }
            return self.update_lower_bound(env, to + 1);
        }
        if to >= ub {
            return self.update_upper_bound(env, from - 1);
        }
        if !self.is_enumerated() {
            return Ok(None);
        }
        let mut event: Option<EventKind> = None;
        let mut v = self.next_value(env, from - 1);
        while let Some(x) = v.filter(|&x| x <= to) {
            if let Some(e) = self.remove_value(env, x)? {
                event = Some(event.map_or(e, |prev| prev.merge(e)));
            }
            v = self.next_value(env, x);
        }
        Ok(event)
    }

    pub fn instantiate_to(&self, env: &mut Environment, value: i64) -> DomainUpdate {
        if !self.contains(env, value) {
            return Err(EmptyDomain);
        }
        if self.is_instantiated(env) {
            return Ok(None);
        }
        match self {
            IntDomain::Bounded { lb, ub } => {
                env.set(*lb, value);
                env.set(*ub, value);
            }
            IntDomain::Enumerated { lb, ub, size, .. } => {
                env.set(*lb, value);
                env.set(*ub, value);
                env.set(*size, 1);
            }
        }
        Ok(Some(EventKind::Instantiate))
    }

    fn bound_event(&self, env: &Environment, kind: EventKind) -> EventKind {
        if self.is_instantiated(env) {
            EventKind::Instantiate
        } else {
            kind
        }
    }
}

#[inline]
fn word(env: &Environment, words: StoredVector<i64>, w: usize) -> u64 {
    env.get_at(words, w) as u64
}

/// First set bit in `[from, limit]`.
fn next_set(
    env: &Environment,
    words: StoredVector<i64>,
    from: usize,
    limit: usize,
) -> Option<usize> {
    if from > limit {
        return None;
    }
    let mut w = from / WORD;
    let mut bits = word(env, words, w) & (u64::MAX << (from % WORD));
    loop {
        if bits != 0 {
            let i = w * WORD + bits.trailing_zeros() as usize;
            return (i <= limit).then_some(i);
        }
        w += 1;
        if w * WORD > limit {
            return None;
        }
        bits = word(env, words, w);
    }
}

/// Last set bit in `[low, from]`.
fn prev_set(
    env: &Environment,
    words: StoredVector<i64>,
    from: usize,
    low: usize,
) -> Option<usize> {
    if from < low {
        return None;
    }
    let mut w = from / WORD;
    let mut bits = word(env, words, w) & (u64::MAX >> (WORD - 1 - from % WORD));
    loop {
        if bits != 0 {
            let i = w * WORD + (WORD - 1 - bits.leading_zeros() as usize);
            return (i >= low).then_some(i);
        }
        if w == 0 || w * WORD <= low {
            return None;
        }
        w -= 1;
        bits = word(env, words, w);
    }
}

/// Number of set bits in `[from, to]`.
fn count_set(env: &Environment, words: StoredVector<i64>, from: usize, to: usize) -> i64 {
    if from > to {
        return 0;
    }
    let (first, last) = (from / WORD, to / WORD);
    (first..=last)
        .map(|w| {
            let mut bits = word(env, words, w);
            if w == first {
                bits &= u64::MAX << (from % WORD);
            }
            if w == last {
                bits &= u64::MAX >> (WORD - 1 - to % WORD);
            }
            bits.count_ones() as i64
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enumerated(env: &mut Environment, values: &[i64]) -> IntDomain {
        IntDomain::enumerated(env, values)
    }

    #[test]
    fn test_bounded_basics() {
        let mut env = Environment::new();
        let d = IntDomain::bounded(&mut env, 0, 10);
        assert_eq!(d.size(&env), 11);
        assert!(d.contains(&env, 5));
        assert_eq!(d.update_lower_bound(&mut env, 3), Ok(Some(EventKind::IncLow)));
        assert_eq!(d.update_lower_bound(&mut env, 2), Ok(None));
        assert_eq!(d.remove_value(&mut env, 5), Ok(None));
        assert_eq!(d.remove_value(&mut env, 10), Ok(Some(EventKind::DecUpp)));
        assert_eq!(d.ub(&env), 9);
        assert_eq!(d.update_upper_bound(&mut env, 1), Err(EmptyDomain));
        assert_eq!(d.ub(&env), 9);
    }

    #[test]
    fn test_enumerated_holes() {
        let mut env = Environment::new();
        let d = enumerated(&mut env, &[1, 3, 4, 70, 130]);
        assert_eq!(d.size(&env), 5);
        assert!(!d.contains(&env, 2));
        assert_eq!(d.next_value(&env, 4), Some(70));
        assert_eq!(d.next_value(&env, 70), Some(130));
        assert_eq!(d.previous_value(&env, 130), Some(70));
        assert_eq!(d.previous_value(&env, 3), Some(1));
        assert_eq!(d.values(&env), vec![1, 3, 4, 70, 130]);
    }

    #[test]
    fn test_enumerated_bound_skips_holes() {
        let mut env = Environment::new();
        let d = enumerated(&mut env, &[1, 3, 4, 70, 130]);
        assert_eq!(d.update_lower_bound(&mut env, 5), Ok(Some(EventKind::IncLow)));
        assert_eq!(d.lb(&env), 70);
        assert_eq!(d.size(&env), 2);
        assert_eq!(d.update_upper_bound(&mut env, 100), Ok(Some(EventKind::Instantiate)));
        assert_eq!(d.ub(&env), 70);
        assert!(d.is_instantiated(&env));
    }

    #[test]
    fn test_enumerated_remove() {
        let mut env = Environment::new();
        let d = enumerated(&mut env, &[0, 1, 2, 3]);
        assert_eq!(d.remove_value(&mut env, 2), Ok(Some(EventKind::Remove)));
        assert_eq!(d.size(&env), 3);
        assert_eq!(d.remove_value(&mut env, 3), Ok(Some(EventKind::DecUpp)));
        assert_eq!(d.ub(&env), 1);
        assert_eq!(d.remove_value(&mut env, 0), Ok(Some(EventKind::Instantiate)));
        assert_eq!(d.remove_value(&mut env, 1), Err(EmptyDomain));
        assert_eq!(d.lb(&env), 1);
    }

    #[test]
    fn test_remove_interval() {
        let mut env = Environment::new();
        let d = enumerated(&mut env, &[0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(d.remove_interval(&mut env, 2, 4), Ok(Some(EventKind::Remove)));
        assert_eq!(d.values(&env), vec![0, 1, 5, 6]);
        assert_eq!(d.remove_interval(&mut env, -3, 1), Ok(Some(EventKind::IncLow)));
        assert_eq!(d.lb(&env), 5);
    }

    #[test]
    fn test_update_bounds_empty_window() {
        let mut env = Environment::new();
        let d = enumerated(&mut env, &[0, 5, 10]);
        assert_eq!(d.update_bounds(&mut env, 1, 4), Err(EmptyDomain));
        assert_eq!(d.size(&env), 3);
        assert_eq!(d.update_bounds(&mut env, 1, 9), Ok(Some(EventKind::Instantiate)));
    }

    #[test]
    fn test_sparse_values() {
        let mut env = Environment::new();
        let d = enumerated(&mut env, &[-5, 0, 10_000_000_000, i64::MAX]);
        assert!(matches!(
            d,
            IntDomain::Enumerated {
                universe: Universe::Sparse(_),
                ..
            }
        ));
        assert_eq!(d.size(&env), 4);
        assert!(d.contains(&env, 10_000_000_000));
        assert!(!d.contains(&env, 1));
        assert_eq!(d.next_value(&env, 1), Some(10_000_000_000));
        assert_eq!(d.previous_value(&env, 10_000_000_000), Some(0));

        env.world_push();
        assert_eq!(d.remove_value(&mut env, 0), Ok(Some(EventKind::Remove)));
        assert_eq!(d.update_lower_bound(&mut env, -4), Ok(Some(EventKind::IncLow)));
        assert_eq!(d.lb(&env), 10_000_000_000);
        assert_eq!(d.size(&env), 2);
        env.world_pop();
        assert_eq!(d.values(&env), vec![-5, 0, 10_000_000_000, i64::MAX]);
    }

    #[test]
    fn test_full_range_bounded_size_saturates() {
        let mut env = Environment::new();
        let d = IntDomain::bounded(&mut env, i64::MIN, i64::MAX);
        assert_eq!(d.size(&env), i64::MAX);
        assert_eq!(d.next_value(&env, i64::MIN), Some(i64::MIN + 1));
        assert_eq!(d.remove_interval(&mut env, -3, 3), Ok(None));
    }

    #[test]
    fn test_instantiate_and_backtrack() {
        let mut env = Environment::new();
        let d = enumerated(&mut env, &[0, 1, 2, 3]);
        env.world_push();
        assert_eq!(d.instantiate_to(&mut env, 2), Ok(Some(EventKind::Instantiate)));
        assert_eq!(d.instantiate_to(&mut env, 2), Ok(None));
        assert_eq!(d.instantiate_to(&mut env, 3), Err(EmptyDomain));
        env.world_pop();
        assert_eq!(d.values(&env), vec![0, 1, 2, 3]);
        assert_eq!(d.size(&env), 4);
    }
}
