use core::ops::{Index, IndexMut};

use crate::state::{AbstractEnvironment, AbstractStack, AbstractValue, NoGlobal, State};

/// The usual abstract state of a stack machine: an operand stack, an
/// environment of bindings, and an extra `global` component for facts that
/// do not fit either, like the possible return values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AbstractState<K, V, G = NoGlobal> {
    pub stack: AbstractStack<V>,
    pub env: AbstractEnvironment<K, V>,
    pub global: G,
}

impl<K, V, G: Default> Default for AbstractState<K, V, G> {
    fn default() -> Self {
        Self {
            stack: AbstractStack::default(),
            env: AbstractEnvironment::default(),
            global: G::default(),
        }
    }
}

impl<K, V, G> AbstractState<K, V, G>
where
    K: Ord + Clone + core::fmt::Debug,
    V: AbstractValue,
    G: State,
{
    pub fn new(stack: AbstractStack<V>, env: AbstractEnvironment<K, V>, global: G) -> Self {
        Self { stack, env, global }
    }

    pub fn stack(&self) -> &AbstractStack<V> {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut AbstractStack<V> {
        &mut self.stack
    }

    pub fn env(&self) -> &AbstractEnvironment<K, V> {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut AbstractEnvironment<K, V> {
        &mut self.env
    }

    pub fn global(&self) -> &G {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut G {
        &mut self.global
    }

    // Shorthands for the operations used by most transfer functions.

    pub fn push(&mut self, value: V) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> V {
        self.stack.pop()
    }

    pub fn pop_n(&mut self, num: usize) {
        self.stack.pop_n(num);
    }

    pub fn top(&self) -> &V {
        self.stack.top()
    }

    pub fn top_mut(&mut self) -> &mut V {
        self.stack.top_mut()
    }

    pub fn find(&self, key: &K) -> V {
        self.env.find(key)
    }

    pub fn get_or_top(&self, key: &K) -> V {
        self.env.get_or_top(key)
    }

    pub fn get_mut_or_top(&mut self, key: K) -> &mut V {
        self.env.get_mut_or_top(key)
    }

    pub fn set(&mut self, key: K, value: V) {
        self.env.set(key, value);
    }

    /// Merges `value` into every local binding of the environment.
    pub fn merge_all_env(&mut self, value: &V) {
        self.env.merge_all(value);
    }
}

impl<K, V: AbstractValue, G> Index<usize> for AbstractState<K, V, G> {
    type Output = V;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.stack[idx]
    }
}

impl<K, V: AbstractValue, G> IndexMut<usize> for AbstractState<K, V, G> {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.stack[idx]
    }
}

impl<K, V, G> State for AbstractState<K, V, G>
where
    K: Ord + Clone + core::fmt::Debug,
    V: AbstractValue,
    G: State,
{
    /// Merges all the components. Every component is merged even if an
    /// earlier one already reported a change.
    fn merge_with(&mut self, other: &Self) -> bool {
        let mut changed = self.global.merge_with(&other.global);
        changed |= self.stack.merge_with(&other.stack);
        changed |= self.env.merge_with(&other.env);
        changed
    }
}
