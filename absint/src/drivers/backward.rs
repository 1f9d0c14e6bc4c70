use std::collections::HashMap;

use fixedbitset::FixedBitSet;
use tracing::{debug, trace};

use super::{
    Analysis, AnalysisError, Direction, FixpointConfig, MergePoints, StepCounter, Worklist,
    accumulate,
};
use crate::code::{CodeSequence, Cursor, Position};
use crate::dispatch::Dispatcher;

/// Computes the fixpoint of a backward analysis. Every exit point starts a
/// walk with the initial state, the merge points are the jumps, and the
/// summary is the merge of the states at the entry points.
///
/// The transfer functions are called in reverse code order, they need to
/// compute the state before an instruction from the state after it.
pub struct BackwardDriver<'code, C: CodeSequence + ?Sized, A: Analysis<C>> {
    analysis: A,
    config: FixpointConfig,
    code: Option<&'code C>,
    initial: Option<A::State>,
    summary: Option<A::State>,
    merge_points: MergePoints<A::State>,
    // For each label, the positions of the jumps targeting it.
    jump_origins: HashMap<Position, Vec<Position>>,
    reached: FixedBitSet,
}

impl<'code, C, A> BackwardDriver<'code, C, A>
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
            jump_origins: HashMap::new(),
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
        debug!(len, "Starting backward analysis.");

        let initial = self.analysis.initial_state(code);
        self.merge_points = MergePoints::new(len);
        self.reached = FixedBitSet::with_capacity(len);

        let mut counter = StepCounter::new(&self.config, len);
        let mut worklist = Worklist::new(Direction::Backward);
        for pos in 0..len {
            if code.is_jump(pos) {
                for &target in code.targets(pos) {
                    assert!(
                        code.is_label(target),
                        "Jump at {pos} targets {target}, which is not a label."
                    );
                    self.jump_origins.entry(target).or_default().push(pos);
                }
            }
            if code.is_exit_point(pos) {
                worklist.push(pos);
            }
        }

        let mut current: Option<A::State> = None;
        while let Some(start) = worklist.pop() {
            let mut pos = start;
            loop {
                if code.is_exit_point(pos) {
                    assert!(
                        current.is_none(),
                        "Exit point at {pos} reached by a walk from its successor."
                    );
                    current = Some(initial.clone());
                } else if code.is_jump(pos) {
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
                    .expect("Only exits and merge points can start a branch.");
                if !self
                    .analysis
                    .dispatcher()
                    .dispatch(Cursor::new(code, pos), state)
                {
                    trace!(pos, "Instruction was not handled by the dispatcher.");
                }

                if code.is_label(pos) {
                    for &origin in self.jump_origins.get(&pos).into_iter().flatten() {
                        if self.merge_points.absorb(origin, state) {
                            worklist.push(origin);
                        }
                    }
                }

                if code.is_entry_point(pos) {
                    if let Some(state) = current.take() {
                        accumulate(&mut self.summary, state);
                    }
                    break;
                }

                if !code.has_fall_through(pos) {
                    current = None;
                    break;
                }
                pos -= 1;
            }
        }

        self.initial = Some(initial);
        debug!(
            steps = counter.steps,
            merge_points = self.merge_points.len(),
            "Backward analysis reached a fixpoint."
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
        self.jump_origins.clear();
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

    /// The merge of the states at all the entry points. `None` when no entry
    /// point is reachable walking backwards from the exits.
    pub fn summary(&self) -> Option<&A::State> {
        self.summary.as_ref()
    }

    /// The fixpoint at a jump, i.e., the state after the jump is executed.
    pub fn merge_point(&self, pos: Position) -> Option<&A::State> {
        self.merge_points.get(pos)
    }

    pub fn merge_points(&self) -> &MergePoints<A::State> {
        &self.merge_points
    }

    /// The positions of the jumps targeting the label at `label`.
    pub fn jump_origins(&self, label: Position) -> &[Position] {
        self.jump_origins
            .get(&label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns true if any backward walk reached `pos` during the last run.
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

/// A backward analysis that only keeps the summary at the entry points.
pub struct BackwardFinal<'code, C: CodeSequence + ?Sized, A: Analysis<C>> {
    driver: BackwardDriver<'code, C, A>,
}

impl<'code, C, A> BackwardFinal<'code, C, A>
where
    C: CodeSequence + ?Sized,
    A: Analysis<C>,
{
    pub fn new(analysis: A) -> Self {
        Self {
            driver: BackwardDriver::new(analysis),
        }
    }

    pub fn with_config(analysis: A, config: FixpointConfig) -> Self {
        Self {
            driver: BackwardDriver::with_config(analysis, config),
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

    pub fn driver(&self) -> &BackwardDriver<'code, C, A> {
        &self.driver
    }
}

/// A backward analysis that can also tell the state before any instruction.
/// The replay starts from the end of the code, so looking up the positions in
/// reverse code order is the cheapest.
pub struct BackwardIndexed<'code, C: CodeSequence + ?Sized, A: Analysis<C>> {
    driver: BackwardDriver<'code, C, A>,
    replay: Option<A::State>,
    cursor: Position,
}

impl<'code, C, A> BackwardIndexed<'code, C, A>
where
    C: CodeSequence + ?Sized,
    A: Analysis<C>,
{
    pub fn new(analysis: A) -> Self {
        Self::with_config(analysis, FixpointConfig::default())
    }

    pub fn with_config(analysis: A, config: FixpointConfig) -> Self {
        Self {
            driver: BackwardDriver::with_config(analysis, config),
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

    pub fn driver(&self) -> &BackwardDriver<'code, C, A> {
        &self.driver
    }

    /// The state right before the instruction at `at` is executed. Returns
    /// `None` before a successful run, or when no backward walk reached the
    /// instruction.
    ///
    /// Panics when the position is outside of the analyzed code.
    pub fn state_before(&mut self, target: Position) -> Option<&A::State> {
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

    /// Like [`BackwardIndexed::state_before`], addressed by a cursor.
    pub fn state_before_cursor(&mut self, at: Cursor<'_, C>) -> Option<&A::State> {
        self.state_before(at.position())
    }

    fn seek(&mut self, code: &'code C, target: Position) {
        if self.replay.is_some() && self.cursor == target {
            return;
        }
        if self.replay.is_none() || target > self.cursor {
            trace!(from = self.cursor, target, "Restarting replay from the end.");
            self.replay = self.driver.initial.clone();
            self.cursor = code.len() - 1;
            self.step(code);
        }
        while self.cursor > target {
            self.cursor -= 1;
            self.step(code);
        }
    }

    /// Applies the instruction under the replay cursor. Exit points restart
    /// from the initial state, merge points replace the replayed state with
    /// their fixpoint. Instructions that no walk reached are skipped.
    fn step(&mut self, code: &'code C) {
        let pos = self.cursor;
        if !self.driver.is_reachable(pos) {
            return;
        }
        if code.is_exit_point(pos) {
            self.replay = self.driver.initial.clone();
        } else if let Some(fixpoint) = self.driver.merge_points.get(pos) {
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
