//! A tiny stack machine to test the engine with. Variables are single
//! characters, values are integers approximated by a flat lattice.

use crate::code::{CodeSequence, InstrKind, Position};
use crate::dispatch::{Decode, DispatchContext, InstructionDispatcher};
use crate::drivers::Analysis;
use crate::state::{AbstractEnvironment, AbstractState, AbstractValue, State};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestInstr {
    Label,
    Nop,
    Push(i64),
    Pop,
    Add,
    Load(char),
    Store(char),
    Jump(Vec<Position>),
    // Pops the condition, falls through when the branch is not taken.
    Branch(Vec<Position>),
    Exit,
}

crate::receiver! {
    pub enum TestOpcode;
    pub trait TestReceiver {
        label: Label,
        Nop,
        Push,
        Pop,
        Add,
        Load,
        Store,
        Jump,
        Branch,
        Exit,
    }
}

impl Decode for TestInstr {
    type Opcode = TestOpcode;

    fn opcode(&self) -> TestOpcode {
        match self {
            TestInstr::Label => TestOpcode::Label,
            TestInstr::Nop => TestOpcode::Nop,
            TestInstr::Push(_) => TestOpcode::Push,
            TestInstr::Pop => TestOpcode::Pop,
            TestInstr::Add => TestOpcode::Add,
            TestInstr::Load(_) => TestOpcode::Load,
            TestInstr::Store(_) => TestOpcode::Store,
            TestInstr::Jump(_) => TestOpcode::Jump,
            TestInstr::Branch(_) => TestOpcode::Branch,
            TestInstr::Exit => TestOpcode::Exit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCode {
    instrs: Vec<TestInstr>,
}

impl TestCode {
    pub fn new(instrs: Vec<TestInstr>) -> Self {
        Self { instrs }
    }
}

impl CodeSequence for TestCode {
    type Instruction = TestInstr;

    fn len(&self) -> usize {
        self.instrs.len()
    }

    fn instruction(&self, pos: Position) -> &TestInstr {
        &self.instrs[pos]
    }

    fn kind(&self, pos: Position) -> InstrKind {
        match &self.instrs[pos] {
            TestInstr::Label => InstrKind::Label,
            TestInstr::Jump(_) => InstrKind::UnconditionalJump,
            TestInstr::Branch(_) => InstrKind::Jump,
            TestInstr::Exit => InstrKind::Exit,
            _ => InstrKind::Plain,
        }
    }

    fn targets(&self, pos: Position) -> &[Position] {
        match &self.instrs[pos] {
            TestInstr::Jump(targets) | TestInstr::Branch(targets) => targets.as_slice(),
            _ => &[],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flat {
    Bottom,
    Value(i64),
    Top,
}

impl State for Flat {
    fn merge_with(&mut self, other: &Self) -> bool {
        match (*self, *other) {
            (_, Flat::Bottom) | (Flat::Top, _) => false,
            (Flat::Value(a), Flat::Value(b)) if a == b => false,
            (Flat::Bottom, other) => {
                *self = other;
                true
            }
            _ => {
                *self = Flat::Top;
                true
            }
        }
    }
}

impl AbstractValue for Flat {
    fn top() -> Self {
        Flat::Top
    }

    // Unbound variables have an unknown value.
    fn absent() -> Self {
        Flat::Top
    }
}

impl Flat {
    pub fn add(self, other: Self) -> Self {
        match (self, other) {
            (Flat::Bottom, _) | (_, Flat::Bottom) => Flat::Bottom,
            (Flat::Value(a), Flat::Value(b)) => Flat::Value(a.wrapping_add(b)),
            _ => Flat::Top,
        }
    }
}

pub type TestState = AbstractState<char, Flat>;

/// The forward semantics of a single instruction.
pub fn apply(instr: &TestInstr, state: &mut TestState) {
    match instr {
        TestInstr::Push(value) => state.push(Flat::Value(*value)),
        TestInstr::Pop | TestInstr::Branch(_) => {
            state.pop();
        }
        TestInstr::Add => {
            let rhs = state.pop();
            let lhs = state.pop();
            state.push(lhs.add(rhs));
        }
        TestInstr::Load(var) => {
            let value = state.find(var);
            state.push(value);
        }
        TestInstr::Store(var) => {
            let value = state.pop();
            state.set(*var, value);
        }
        TestInstr::Label | TestInstr::Nop | TestInstr::Jump(_) | TestInstr::Exit => {}
    }
}

/// Forward constant propagation, recording every visited position.
#[derive(Clone, Debug, Default)]
pub struct Constants {
    pub visits: Vec<Position>,
}

impl TestReceiver<TestCode, TestState> for Constants {
    fn any(&mut self, cx: &mut DispatchContext<'_, '_, TestCode, TestState>) {
        self.visits.push(cx.position());
        apply(cx.instruction(), cx.state_mut());
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConstantAnalysis {
    pub initial: TestState,
    pub dispatcher: InstructionDispatcher<Constants>,
}

impl ConstantAnalysis {
    pub fn with_initial(initial: TestState) -> Self {
        Self {
            initial,
            dispatcher: InstructionDispatcher::default(),
        }
    }

    pub fn visits(&self) -> &[Position] {
        &self.dispatcher.receiver().visits
    }

    pub fn visit_count(&self, pos: Position) -> usize {
        self.visits().iter().filter(|&&visited| visited == pos).count()
    }
}

impl Analysis<TestCode> for ConstantAnalysis {
    type State = TestState;
    type Dispatcher = InstructionDispatcher<Constants>;

    fn initial_state(&self, _code: &TestCode) -> TestState {
        self.initial.clone()
    }

    fn dispatcher(&mut self) -> &mut Self::Dispatcher {
        &mut self.dispatcher
    }

    fn reset(&mut self) {
        self.dispatcher.receiver_mut().visits.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Liveness {
    Dead,
    Live,
}

impl State for Liveness {
    fn merge_with(&mut self, other: &Self) -> bool {
        if *self == Liveness::Dead && *other == Liveness::Live {
            *self = Liveness::Live;
            return true;
        }
        false
    }
}

impl AbstractValue for Liveness {
    fn top() -> Self {
        Liveness::Live
    }

    fn absent() -> Self {
        Liveness::Dead
    }
}

pub type LiveVars = AbstractEnvironment<char, Liveness>;

/// Backward liveness of variables, recording every visited position.
#[derive(Clone, Debug, Default)]
pub struct LiveVariables {
    pub visits: Vec<Position>,
}

impl TestReceiver<TestCode, LiveVars> for LiveVariables {
    fn any(&mut self, cx: &mut DispatchContext<'_, '_, TestCode, LiveVars>) {
        self.visits.push(cx.position());
    }

    fn load(&mut self, cx: &mut DispatchContext<'_, '_, TestCode, LiveVars>) {
        self.any(cx);
        if let TestInstr::Load(var) = cx.instruction() {
            cx.state_mut().set(*var, Liveness::Live);
        }
    }

    fn store(&mut self, cx: &mut DispatchContext<'_, '_, TestCode, LiveVars>) {
        self.any(cx);
        if let TestInstr::Store(var) = cx.instruction() {
            cx.state_mut().set(*var, Liveness::Dead);
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LivenessAnalysis {
    pub dispatcher: InstructionDispatcher<LiveVariables>,
}

impl LivenessAnalysis {
    pub fn visit_count(&self, pos: Position) -> usize {
        self.dispatcher
            .receiver()
            .visits
            .iter()
            .filter(|&&visited| visited == pos)
            .count()
    }
}

impl Analysis<TestCode> for LivenessAnalysis {
    type State = LiveVars;
    type Dispatcher = InstructionDispatcher<LiveVariables>;

    fn dispatcher(&mut self) -> &mut Self::Dispatcher {
        &mut self.dispatcher
    }

    fn reset(&mut self) {
        self.dispatcher.receiver_mut().visits.clear();
    }
}

/// Returns the variables marked live.
pub fn live(vars: &LiveVars) -> Vec<char> {
    vars.iter()
        .filter(|(_, liveness)| **liveness == Liveness::Live)
        .map(|(var, _)| *var)
        .collect()
}

/// The backward liveness semantics of a single instruction.
pub fn apply_liveness(instr: &TestInstr, vars: &mut LiveVars) {
    match instr {
        TestInstr::Load(var) => vars.set(*var, Liveness::Live),
        TestInstr::Store(var) => vars.set(*var, Liveness::Dead),
        _ => {}
    }
}

fn join_into<S: State + Clone>(slot: &mut Option<S>, state: &S) -> bool {
    match slot {
        Some(stored) => stored.merge_with(state),
        None => {
            *slot = Some(state.clone());
            true
        }
    }
}

/// Computes the state after every position by sweeping the code until no
/// state changes, joining along every edge returned by `successors`. `None`
/// marks positions no path reaches.
pub fn iterate_forward(code: &TestCode, initial: &TestState) -> Vec<Option<TestState>> {
    let len = code.len();
    let mut before: Vec<Option<TestState>> = vec![None; len];
    let mut after = vec![None; len];
    before[0] = Some(initial.clone());
    let mut changed = true;
    while changed {
        changed = false;
        for pos in 0..len {
            let Some(mut state) = before[pos].clone() else {
                continue;
            };
            apply(code.instruction(pos), &mut state);
            for succ in code.successors(pos) {
                changed |= join_into(&mut before[succ], &state);
            }
            after[pos] = Some(state);
        }
    }
    after
}

/// Computes the live variables before every position the same way, in
/// reverse. Exits start from no live variables. `None` marks positions
/// with no path to an exit.
pub fn iterate_backward(code: &TestCode) -> Vec<Option<LiveVars>> {
    let len = code.len();
    let mut before: Vec<Option<LiveVars>> = vec![None; len];
    let mut changed = true;
    while changed {
        changed = false;
        for pos in (0..len).rev() {
            let mut after = None;
            if code.is_exit_point(pos) {
                after = Some(LiveVars::default());
            }
            for succ in code.successors(pos) {
                if let Some(state) = &before[succ] {
                    join_into(&mut after, state);
                }
            }
            let Some(mut state) = after else {
                continue;
            };
            apply_liveness(code.instruction(pos), &mut state);
            changed |= join_into(&mut before[pos], &state);
        }
    }
    before
}
