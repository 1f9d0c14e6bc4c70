use core::ops::{Index, IndexMut};

use crate::state::State;

/// Model of an operand stack. For well-formed code the stack depth is the
/// same on every path reaching a merge point, so merging two stacks is just
/// merging their values slot by slot.
///
/// Indexing starts at the top of the stack, `stack[0]` is the top value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AbstractStack<V> {
    // The top of the stack is the last element.
    values: Vec<V>,
}

impl<V> Default for AbstractStack<V> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<V: State> AbstractStack<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: V) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> V {
        self.values
            .pop()
            .expect("Cannot pop from an empty abstract stack.")
    }

    /// Removes the top `num` values.
    pub fn pop_n(&mut self, num: usize) {
        assert!(
            num <= self.depth(),
            "Cannot pop {num} values from an abstract stack of depth {}.",
            self.depth()
        );
        self.values.truncate(self.depth() - num);
    }

    pub fn top(&self) -> &V {
        self.values
            .last()
            .expect("An empty abstract stack has no top.")
    }

    pub fn top_mut(&mut self) -> &mut V {
        self.values
            .last_mut()
            .expect("An empty abstract stack has no top.")
    }

    /// Returns the `idx`-th value counting from the top, if there is one.
    pub fn get(&self, idx: usize) -> Option<&V> {
        let pos = self.values.len().checked_sub(idx + 1)?;
        self.values.get(pos)
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates the values starting from the top of the stack.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator {
        self.values.iter().rev()
    }
}

impl<V: State> State for AbstractStack<V> {
    /// Merges the other stack slot by slot.
    ///
    /// Panics when the depths differ, that can only happen for malformed code.
    fn merge_with(&mut self, other: &Self) -> bool {
        assert_eq!(
            self.depth(),
            other.depth(),
            "Stacks must have the same depth at merge points."
        );
        let mut changed = false;
        for (own, theirs) in self.values.iter_mut().zip(&other.values) {
            changed |= own.merge_with(theirs);
        }
        changed
    }
}

impl<V: State> Index<usize> for AbstractStack<V> {
    type Output = V;

    fn index(&self, idx: usize) -> &Self::Output {
        self.get(idx).unwrap_or_else(|| {
            panic!(
                "Index {idx} is out of range for an abstract stack of depth {}.",
                self.depth()
            )
        })
    }
}

impl<V: State> IndexMut<usize> for AbstractStack<V> {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        let depth = self.depth();
        assert!(
            idx < depth,
            "Index {idx} is out of range for an abstract stack of depth {depth}."
        );
        &mut self.values[depth - idx - 1]
    }
}
