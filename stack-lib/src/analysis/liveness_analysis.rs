use core::fmt::Display;

use absint::code::CodeSequence;
use absint::dispatch::{DispatchContext, InstructionDispatcher};
use absint::drivers::{Analysis, AnalysisError, BackwardFinal, BackwardIndexed};
use absint::state::{AbstractEnvironment, AbstractValue, State};
use itertools::Itertools;

use super::{AnalysisResult, Analyzer};
use crate::ir::{Annotations, Instruction, Name, Program, StackReceiver};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Liveness {
    #[default]
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

impl Display for Liveness {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Liveness::Dead => write!(f, "dead"),
            Liveness::Live => write!(f, "live"),
        }
    }
}

/// Variables without a binding are dead.
pub type LiveVariables = AbstractEnvironment<Name, Liveness>;

/// The names of the live variables in alphabetical order.
pub fn live_names(vars: &LiveVariables) -> Vec<&Name> {
    vars.iter()
        .filter(|(_, liveness)| **liveness == Liveness::Live)
        .map(|(name, _)| name)
        .collect()
}

/// Transfer functions running backwards, from the state after an
/// instruction to the state before it. The operand stack does not matter.
#[derive(Default)]
pub struct LivenessSemantics;

type Context<'a, 'code> = DispatchContext<'a, 'code, Program, LiveVariables>;

impl StackReceiver<Program, LiveVariables> for LivenessSemantics {
    fn load(&mut self, cx: &mut Context<'_, '_>) {
        if let Instruction::Load(var) = cx.instruction() {
            cx.state_mut().set(var.clone(), Liveness::Live);
        }
    }

    fn store(&mut self, cx: &mut Context<'_, '_>) {
        if let Instruction::Store(var) = cx.instruction() {
            cx.state_mut().set(var.clone(), Liveness::Dead);
        }
    }

    // The callee might read any of the variables.
    fn call(&mut self, cx: &mut Context<'_, '_>) {
        cx.state_mut().merge_all(&Liveness::Live);
    }
}

#[derive(Default)]
pub struct LivenessPropagation {
    dispatcher: InstructionDispatcher<LivenessSemantics>,
}

impl Analysis<Program> for LivenessPropagation {
    type State = LiveVariables;
    type Dispatcher = InstructionDispatcher<LivenessSemantics>;

    fn dispatcher(&mut self) -> &mut Self::Dispatcher {
        &mut self.dispatcher
    }
}

fn describe(vars: &LiveVariables) -> String {
    format!("live: {{{}}}", live_names(vars).iter().join(", "))
}

// No state at the entry when the program never terminates.
fn describe_inputs(entry: Option<&LiveVariables>) -> String {
    let inputs = entry
        .map(|vars| live_names(vars).iter().join(", "))
        .unwrap_or_default();
    format!("Inputs: {{{inputs}}}")
}

/// Annotates every instruction with the variables live right before it.
pub struct LivenessAnalysis;

impl Analyzer for LivenessAnalysis {
    fn analyze(&self, program: &Program) -> Result<AnalysisResult, AnalysisError> {
        let mut driver = BackwardIndexed::new(LivenessPropagation::default());
        driver.analyze(program)?;

        let mut annotations = Annotations::new();
        for pos in (0..program.len()).rev() {
            let described = match driver.state_before(pos) {
                Some(vars) => describe(vars),
                None => "never returns".to_owned(),
            };
            annotations.pre.insert(pos, vec![described]);
        }
        Ok(AnalysisResult {
            annotations,
            summary: Some(describe_inputs(driver.final_state())),
        })
    }
}

/// The variables the program might read before writing them.
pub struct InputsAnalysis;

impl Analyzer for InputsAnalysis {
    fn analyze(&self, program: &Program) -> Result<AnalysisResult, AnalysisError> {
        let mut driver = BackwardFinal::new(LivenessPropagation::default());
        driver.analyze(program)?;
        Ok(AnalysisResult {
            annotations: Annotations::new(),
            summary: Some(describe_inputs(driver.final_state())),
        })
    }
}
