use core::cmp::Reverse;

use priority_queue::PriorityQueue;
use thiserror::Error;

use crate::code::{CodeSequence, Position};
use crate::dispatch::Dispatcher;
use crate::state::State;

/// Glues a state type and the transfer functions together. The drivers are
/// generic over the analysis, and call back into it for the seed state and
/// the dispatcher.
pub trait Analysis<C: CodeSequence + ?Sized> {
    type State: State + Default;
    type Dispatcher: Dispatcher<C, Self::State>;

    /// The state at the start of the analysis. For forward analyses this is
    /// the state at the entry point, for backward analyses the state at every
    /// exit point.
    fn initial_state(&self, _code: &C) -> Self::State {
        Default::default()
    }

    fn dispatcher(&mut self) -> &mut Self::Dispatcher;

    /// Drops whatever the analysis collected outside of the states, e.g.,
    /// facts recorded by the receiver. Called whenever the driver discards
    /// its results, including right before every run.
    fn reset(&mut self) {}
}

/// Knobs for the worklist drivers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct FixpointConfig {
    /// Set the approximate number of visits per instruction. If the limit is
    /// reached the driver gives up and returns
    /// [`AnalysisError::DidNotConverge`]. Zero means no limit, termination
    /// is then up to the abstract domain.
    pub visit_limit: usize,
}

impl FixpointConfig {
    fn step_limit(&self, len: usize) -> Option<usize> {
        (self.visit_limit > 0).then(|| self.visit_limit.saturating_mul(len))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("Cannot analyze an empty instruction sequence.")]
    EmptySequence,
    #[error("The analysis did not converge after {steps} steps.")]
    DidNotConverge { steps: usize },
}

/// The fixpoint states at the merge points, indexed by position. A slot is
/// empty until a branch reaches the merge point for the first time.
#[derive(Clone, Debug)]
pub struct MergePoints<S> {
    states: Vec<Option<S>>,
}

impl<S> Default for MergePoints<S> {
    fn default() -> Self {
        Self { states: Vec::new() }
    }
}

impl<S: State> MergePoints<S> {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            states: vec![None; len],
        }
    }

    pub fn get(&self, pos: Position) -> Option<&S> {
        self.states.get(pos).and_then(Option::as_ref)
    }

    /// Iterates the positions with a stored state.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &S)> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(pos, state)| state.as_ref().map(|state| (pos, state)))
    }

    /// Number of merge points with a stored state.
    pub fn len(&self) -> usize {
        self.states.iter().filter(|state| state.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.states.iter().all(Option::is_none)
    }

    /// A branch enters the merge point at `pos` with the `incoming` state
    /// (`None` when the branch was not walking, e.g., it starts here).
    /// Returns the state to continue with, or `None` if the branch brings no
    /// new information and should be abandoned.
    pub(crate) fn enter(&mut self, pos: Position, incoming: Option<S>) -> Option<S> {
        let slot = &mut self.states[pos];
        if let Some(stored) = slot.as_mut() {
            return match incoming {
                None => Some(stored.clone()),
                Some(incoming) => stored.merge_with(&incoming).then(|| stored.clone()),
            };
        }
        let Some(incoming) = incoming else {
            panic!("Merge point {pos} has neither a stored nor an incoming state.");
        };
        *slot = Some(incoming.clone());
        Some(incoming)
    }

    /// Merges the state of a control flow edge into the merge point at `pos`
    /// without entering it. Returns true if the stored state changed, i.e.,
    /// the merge point needs to be (re)visited.
    pub(crate) fn absorb(&mut self, pos: Position, incoming: &S) -> bool {
        let slot = &mut self.states[pos];
        match slot.as_mut() {
            Some(stored) => stored.merge_with(incoming),
            None => {
                *slot = Some(incoming.clone());
                true
            }
        }
    }
}

/// Merges the state at the end of a branch into the summary of the analysis.
fn accumulate<S: State>(summary: &mut Option<S>, state: S) {
    match summary {
        Some(summary) => {
            summary.merge_with(&state);
        }
        None => *summary = Some(state),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// A worklist of positions that visits the positions in code order for
/// forward analyses and in reverse code order for backward analyses. A
/// position is only queued once.
#[derive(Clone, Debug)]
struct Worklist {
    direction: Direction,
    queue: PriorityQueue<Position, Reverse<usize>>,
}

impl Worklist {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            queue: PriorityQueue::new(),
        }
    }

    fn push(&mut self, pos: Position) {
        let rank = match self.direction {
            Direction::Forward => pos,
            Direction::Backward => usize::MAX - pos,
        };
        self.queue.push(pos, Reverse(rank));
    }

    fn pop(&mut self) -> Option<Position> {
        self.queue.pop().map(|(pos, _)| pos)
    }
}

/// Counts the instruction visits of a single run against the configured
/// limit.
struct StepCounter {
    steps: usize,
    limit: Option<usize>,
}

impl StepCounter {
    fn new(config: &FixpointConfig, len: usize) -> Self {
        Self {
            steps: 0,
            limit: config.step_limit(len),
        }
    }

    fn step(&mut self) -> Result<(), AnalysisError> {
        self.steps += 1;
        match self.limit {
            Some(limit) if self.steps > limit => Err(AnalysisError::DidNotConverge {
                steps: self.steps - 1,
            }),
            _ => Ok(()),
        }
    }
}

mod forward;
pub use forward::*;

mod backward;
pub use backward::*;
