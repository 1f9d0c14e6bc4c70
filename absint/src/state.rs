use core::fmt::Debug;

/////////////////////////
// Traits for states.  //
/////////////////////////

/// An abstract state is an approximation of the program state at a given
/// point of the code. The drivers clone states when the control flow forks,
/// and merge them where it joins.
///
/// The drivers stop following a branch as soon as merging its state at a
/// merge point does not change the stored information. This only computes a
/// fixpoint, and only terminates, when the merge is monotone (the merged
/// state over approximates both inputs) and the ascending chains of the
/// domain are finite. Domains with infinite ascending chains need to widen
/// inside [`State::merge_with`].
pub trait State: Clone + Debug {
    /// Merges the information from `other` into `self`. Returns true when
    /// `self` changed.
    ///
    /// Requirements:
    /// * Idempotent: merging a state with itself reports no change.
    /// * Monotone: after the merge, merging `other` again reports no change.
    fn merge_with(&mut self, other: &Self) -> bool;
}

/// The leaf values stored on abstract stacks and in abstract environments.
pub trait AbstractValue: State {
    /// The least precise value, used for bindings that were never recorded.
    fn top() -> Self;

    /// Stands for a binding that does not exist along one of the merged
    /// paths. Absence is information on its own, so it is not necessarily the
    /// same as the bottom value of the domain. An analysis that does not care
    /// about the difference can return bottom.
    fn absent() -> Self;
}

/// Placeholder for the extra component of an [`AbstractState`] when an
/// analysis does not need one. It holds no information, and merging never
/// changes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NoGlobal;

impl State for NoGlobal {
    fn merge_with(&mut self, _other: &Self) -> bool {
        false
    }
}

mod stack;
pub use stack::*;

mod environment;
pub use environment::*;

mod composite;
pub use composite::*;

#[cfg(test)]
mod state_tests;
