use fixedbitset::FixedBitSet;
use tracing::{debug, trace};

use super::{
    Analysis, AnalysisError, Direction, FixpointConfig, MergePoints, StepCounter, Worklist,
    accumulate,
};
use crate::code::{CodeSequence, Cursor, Position};
use crate::dispatch::Dispatcher;

/// Computes the fixpoint of a forward analysis. The merge points are the
/// labels, the analysis starts at the first instruction and the summary is
/// the merge of the states at every exit point.
///
/// Requirements:
/// * The code is well-formed, see [`CodeSequence`].
/// * The merge of the state is monotone, see [`crate::state::State`].
pub struct ForwardDriver<'code, C: CodeSequence + ?Sized, A: Analysis<C>> {
    analysis: A,
    config: FixpointConfig,
    code: Option<&'code C>,
    initial: Option<A::State>,
    summary: Option<A::State>,
    merge_points: MergePoints<A::State>,
    reached: FixedBitSet,
}

impl<'code, C, A> ForwardDriver<'code, C, A>
where
    C: CodeSequence + ?Sized,
    A: Analysis<C>,
{
    pub fn new(analysis: A) -> Self {
        Self::with_config(analysis, FixpointConfig::default())
    }

    pub fn with_config(analysis: A, config: FixpointConfig) -> Self {
        Self {
            analysis,
            config,
            code: None,
            initial: None,
            summary: None,
            merge_points: MergePoints::default(),
            reached: FixedBitSet::new(),
        }
    }

    /// Runs the analysis to a fixpoint, discarding the results of any previous
    /// run first. When an error is returned, the driver holds no results.
    pub fn analyze(&mut self, code: &'code C) -> Result<(), AnalysisError> {
        self.invalidate();
        if code.is_empty() {
            return Err(AnalysisError::EmptySequence);
        }
        let result = self.solve(code);
        match result {
            Ok(()) => self.code = Some(code),
            Err(_) => self.invalidate(),
        }
        result
    }

    fn solve(&mut self, code: &'code C) -> Result<(), AnalysisError> {
        let len = code.len();
        debug!(len, "Starting forward analysis.");

        let initial = self.analysis.initial_state(code);
        let mut current = Some(initial.clone());
        self.initial = Some(initial);
        self.merge_points = MergePoints::new(len);
        self.reached = FixedBitSet::with_capacity(len);

        let mut counter = StepCounter::new(&self.config, len);
        let mut worklist = Worklist::new(Direction::Forward);
        worklist.push(0);

        while let Some(start) = worklist.pop() {
            let mut pos = start;
            loop {
                if code.is_label(pos) {
                    current = self.merge_points.enter(pos, current.take());
                    if current.is_none() {
                        trace!(pos, "No new information at merge point, abandoning branch.");
                        break;
                    }
                }
                counter.step()?;
                self.reached.insert(pos);

                let state = current
                    .as_mut()
                    .expect("Only merge points can start a branch.");
                if !self
                    .analysis
                    .dispatcher()
                    .dispatch(Cursor::new(code, pos), state)
                {
                    trace!(pos, "Instruction was not handled by the dispatcher.");
                }

                if code.is_jump(pos) {
                    for &target in code.targets(pos) {
                        assert!(
                            code.is_label(target),
                            "Jump at {pos} targets {target}, which is not a label."
                        );
                        if self.merge_points.absorb(target, state) {
                            worklist.push(target);
                        }
                    }
                    if code.is_unconditional_jump(pos) {
                        current = None;
                        break;
                    }
                }

                if code.is_exit_point(pos) {
                    if let Some(state) = current.take() {
                        accumulate(&mut self.summary, state);
                    }
                    break;
                }

                pos += 1;
                assert!(pos < len, "Execution falls off the end of the code.");
            }
        }

        debug!(
            steps = counter.steps,
            merge_points = self.merge_points.len(),
            "Forward analysis reached a fixpoint."
        );
        Ok(())
    }

    /// Drops every state computed by the last run. Calling it repeatedly, or
    /// before any run, is harmless.
    pub fn invalidate(&mut self) {
        self.code = None;
        self.initial = None;
        self.summary = None;
        self.merge_points = MergePoints::default();
        self.reached.clear();
        self.analysis.reset();
    }

    /// Returns true if the driver holds the results of a successful run.
    pub fn is_good(&self) -> bool {
        self.code.is_some()
    }

    pub fn code(&self) -> Option<&'code C> {
        self.code
    }

    pub fn initial_state(&self) -> Option<&A::State> {
        self.initial.as_ref()
    }

    /// The merge of the states at all the exit points. `None` when no exit
    /// point is reachable.
    pub fn summary(&self) -> Option<&A::State> {
        self.summary.as_ref()
    }

    /// The fixpoint at a label, i.e., the state before the label is
    /// dispatched.
    pub fn merge_point(&self, pos: Position) -> Option<&A::State> {
        self.merge_points.get(pos)
    }

    pub fn merge_points(&self) -> &MergePoints<A::State> {
        &self.merge_points
    }

    /// Returns true if any branch reached `pos` during the last run.
    pub fn is_reachable(&self, pos: Position) -> bool {
        self.reached.contains(pos)
    }

    pub fn config(&self) -> &FixpointConfig {
        &self.config
    }

    pub fn analysis(&self) -> &A {
        &self.analysis
    }
}

/// A forward analysis that only keeps the summary at the exit points.
pub struct ForwardFinal<'code, C: CodeSequence + ?Sized, A: Analysis<C>> {
    driver: ForwardDriver<'code, C, A>,
}

impl<'code, C, A> ForwardFinal<'code, C, A>
where
    C: CodeSequence + ?Sized,
    A: Analysis<C>,
{
    pub fn new(analysis: A) -> Self {
        Self {
            driver: ForwardDriver::new(analysis),
        }
    }

    pub fn with_config(analysis: A, config: FixpointConfig) -> Self {
        Self {
            driver: ForwardDriver::with_config(analysis, config),
        }
    }

    pub fn analyze(&mut self, code: &'code C) -> Result<(), AnalysisError> {
        self.driver.analyze(code)
    }

    pub fn invalidate(&mut self) {
        self.driver.invalidate();
    }

    pub fn final_state(&self) -> Option<&A::State> {
        self.driver.summary()
    }

    pub fn driver(&self) -> &ForwardDriver<'code, C, A> {
        &self.driver
    }
}

/// A forward analysis that can also tell the state after any instruction.
///
/// Only the fixpoints at the merge points are stored. A lookup replays the
/// transfer functions from the closest merge point, continuing from the
/// previous lookup when possible. Looking up the positions in code order
/// visits every instruction once, random access might replay from the start
/// of the code.
pub struct ForwardIndexed<'code, C: CodeSequence + ?Sized, A: Analysis<C>> {
    driver: ForwardDriver<'code, C, A>,
    replay: Option<A::State>,
    cursor: Position,
}

impl<'code, C, A> ForwardIndexed<'code, C, A>
where
    C: CodeSequence + ?Sized,
    A: Analysis<C>,
{
    pub fn new(analysis: A) -> Self {
        Self::with_config(analysis, FixpointConfig::default())
    }

    pub fn with_config(analysis: A, config: FixpointConfig) -> Self {
        Self {
            driver: ForwardDriver::with_config(analysis, config),
            replay: None,
            cursor: 0,
        }
    }

    pub fn analyze(&mut self, code: &'code C) -> Result<(), AnalysisError> {
        self.replay = None;
        self.cursor = 0;
        self.driver.analyze(code)
    }

    pub fn invalidate(&mut self) {
        self.driver.invalidate();
        self.replay = None;
        self.cursor = 0;
    }

    pub fn final_state(&self) -> Option<&A::State> {
        self.driver.summary()
    }

    pub fn driver(&self) -> &ForwardDriver<'code, C, A> {
        &self.driver
    }

    /// The state right after the instruction at `at` was executed. Returns
    /// `None` before a successful run, or when no branch reached the
    /// instruction.
    ///
    /// Panics when the position is outside of the analyzed code.
    pub fn state_after(&mut self, target: Position) -> Option<&A::State> {
        let code = self.driver.code?;
        assert!(
            target < code.len(),
            "Position {target} is outside of the analyzed code."
        );
        if !self.driver.is_reachable(target) {
            return None;
        }
        self.seek(code, target);
        self.replay.as_ref()
    }

    /// Like [`ForwardIndexed::state_after`], addressed by a cursor.
    pub fn state_after_cursor(&mut self, at: Cursor<'_, C>) -> Option<&A::State> {
        self.state_after(at.position())
    }

    fn seek(&mut self, code: &'code C, target: Position) {
        if self.replay.is_some() && self.cursor == target {
            return;
        }
        if self.replay.is_none() || target < self.cursor {
            trace!(from = self.cursor, target, "Restarting replay from the entry.");
            self.replay = self.driver.initial.clone();
            self.cursor = 0;
            self.step(code);
        }
        while self.cursor < target {
            self.cursor += 1;
            self.step(code);
        }
    }

    /// Applies the instruction under the replay cursor. Merge points replace
    /// the replayed state with their fixpoint. Instructions that no branch
    /// reached are skipped.
    fn step(&mut self, code: &'code C) {
        let pos = self.cursor;
        if !self.driver.is_reachable(pos) {
            return;
        }
        if let Some(fixpoint) = self.driver.merge_points.get(pos) {
            self.replay = Some(fixpoint.clone());
        }
        if let Some(state) = self.replay.as_mut() {
            self.driver
                .analysis
                .dispatcher()
                .dispatch(Cursor::new(code, pos), state);
        }
    }
}
