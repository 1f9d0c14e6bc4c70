use core::fmt::Display;

use absint::code::CodeSequence;
use absint::dispatch::{DispatchContext, InstructionDispatcher};
use absint::drivers::{Analysis, AnalysisError, ForwardFinal, ForwardIndexed};
use absint::state::{AbstractState, AbstractValue, State};
use itertools::Itertools;

use super::{AnalysisResult, Analyzer};
use crate::ir::{Annotations, Instruction, Name, Program, StackReceiver};

/// A flat lattice of integer constants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Constant {
    /// No value yet, e.g., no return value on any path so far.
    #[default]
    Bottom,
    Value(i64),
    Top,
}

impl State for Constant {
    fn merge_with(&mut self, other: &Self) -> bool {
        match (*self, *other) {
            (_, Constant::Bottom) | (Constant::Top, _) => false,
            (Constant::Value(a), Constant::Value(b)) if a == b => false,
            (Constant::Bottom, other) => {
                *self = other;
                true
            }
            _ => {
                *self = Constant::Top;
                true
            }
        }
    }
}

impl AbstractValue for Constant {
    fn top() -> Self {
        Constant::Top
    }

    // A variable that is not assigned on some path can hold anything.
    fn absent() -> Self {
        Constant::Top
    }
}

impl Constant {
    fn combine(self, other: Self, op: impl Fn(i64, i64) -> i64) -> Self {
        match (self, other) {
            (Constant::Bottom, _) | (_, Constant::Bottom) => Constant::Bottom,
            (Constant::Value(lhs), Constant::Value(rhs)) => Constant::Value(op(lhs, rhs)),
            _ => Constant::Top,
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Constant::Bottom => write!(f, "Bottom"),
            Constant::Value(value) => write!(f, "{value}"),
            Constant::Top => write!(f, "Top"),
        }
    }
}

/// The operand stack and the variables, the extra component is the merged
/// return value.
pub type ConstantState = AbstractState<Name, Constant, Constant>;

#[derive(Default)]
pub struct ConstantSemantics;

type Context<'a, 'code> = DispatchContext<'a, 'code, Program, ConstantState>;

impl ConstantSemantics {
    fn arithmetic(cx: &mut Context<'_, '_>, op: impl Fn(i64, i64) -> i64) {
        let state = cx.state_mut();
        let rhs = state.pop();
        let lhs = state.pop();
        state.push(lhs.combine(rhs, op));
    }
}

impl StackReceiver<Program, ConstantState> for ConstantSemantics {
    fn push(&mut self, cx: &mut Context<'_, '_>) {
        if let Instruction::Push(value) = cx.instruction() {
            cx.state_mut().push(Constant::Value(*value));
        }
    }

    fn pop(&mut self, cx: &mut Context<'_, '_>) {
        cx.state_mut().pop();
    }

    fn dup(&mut self, cx: &mut Context<'_, '_>) {
        let top = *cx.state().top();
        cx.state_mut().push(top);
    }

    fn swap(&mut self, cx: &mut Context<'_, '_>) {
        let state = cx.state_mut();
        let top = state.pop();
        let below = state.pop();
        state.push(top);
        state.push(below);
    }

    fn add(&mut self, cx: &mut Context<'_, '_>) {
        Self::arithmetic(cx, i64::wrapping_add);
    }

    fn sub(&mut self, cx: &mut Context<'_, '_>) {
        Self::arithmetic(cx, i64::wrapping_sub);
    }

    fn mul(&mut self, cx: &mut Context<'_, '_>) {
        Self::arithmetic(cx, i64::wrapping_mul);
    }

    fn load(&mut self, cx: &mut Context<'_, '_>) {
        if let Instruction::Load(var) = cx.instruction() {
            let value = cx.state().find(var);
            cx.state_mut().push(value);
        }
    }

    fn store(&mut self, cx: &mut Context<'_, '_>) {
        if let Instruction::Store(var) = cx.instruction() {
            let state = cx.state_mut();
            let value = state.pop();
            state.set(var.clone(), value);
        }
    }

    // The callee might modify any of the variables.
    fn call(&mut self, cx: &mut Context<'_, '_>) {
        if let Instruction::Call { arity, .. } = cx.instruction() {
            let state = cx.state_mut();
            state.pop_n(*arity);
            state.push(Constant::Top);
            state.merge_all_env(&Constant::Top);
        }
    }

    fn branch_true(&mut self, cx: &mut Context<'_, '_>) {
        cx.state_mut().pop();
    }

    fn branch_false(&mut self, cx: &mut Context<'_, '_>) {
        cx.state_mut().pop();
    }

    fn switch(&mut self, cx: &mut Context<'_, '_>) {
        cx.state_mut().pop();
    }

    fn ret(&mut self, cx: &mut Context<'_, '_>) {
        let state = cx.state_mut();
        let value = state.pop();
        state.global_mut().merge_with(&value);
    }
}

#[derive(Default)]
pub struct ConstantPropagation {
    dispatcher: InstructionDispatcher<ConstantSemantics>,
}

impl Analysis<Program> for ConstantPropagation {
    type State = ConstantState;
    type Dispatcher = InstructionDispatcher<ConstantSemantics>;

    fn dispatcher(&mut self) -> &mut Self::Dispatcher {
        &mut self.dispatcher
    }
}

fn describe(state: &ConstantState) -> Vec<String> {
    let mut result = vec![format!("stack: [{}]", state.stack().iter().rev().join(", "))];
    result.extend(state.env().iter().map(|(var, value)| format!("{var}: {value}")));
    result
}

fn describe_return(state: Option<&ConstantState>) -> String {
    match state {
        Some(state) => format!("Return value: {}", state.global()),
        None => "Return value: none, the program never returns".to_owned(),
    }
}

/// Annotates every instruction with the operand stack and the variables
/// right after it.
pub struct ConstantAnalysis;

impl Analyzer for ConstantAnalysis {
    fn analyze(&self, program: &Program) -> Result<AnalysisResult, AnalysisError> {
        let mut driver = ForwardIndexed::new(ConstantPropagation::default());
        driver.analyze(program)?;

        let mut annotations = Annotations::new();
        for pos in 0..program.len() {
            let described = match driver.state_after(pos) {
                Some(state) => describe(state),
                None => vec!["unreachable".to_owned()],
            };
            annotations.post.insert(pos, described);
        }
        Ok(AnalysisResult {
            annotations,
            summary: Some(describe_return(driver.final_state())),
        })
    }
}

/// Only computes the possible return values of the program.
pub struct ReturnValueAnalysis;

impl Analyzer for ReturnValueAnalysis {
    fn analyze(&self, program: &Program) -> Result<AnalysisResult, AnalysisError> {
        let mut driver = ForwardFinal::new(ConstantPropagation::default());
        driver.analyze(program)?;
        Ok(AnalysisResult {
            annotations: Annotations::new(),
            summary: Some(describe_return(driver.final_state())),
        })
    }
}
