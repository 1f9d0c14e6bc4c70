//! Checks that the operand stack never underflows and that every label is
//! reached with the same stack depth on all paths. The value analyses rely
//! on both, so the driver runs this check first.

use std::collections::BTreeMap;

use absint::code::Position;
use absint::dispatch::{DispatchContext, InstructionDispatcher};
use absint::drivers::{Analysis, ForwardDriver};
use absint::state::State;
use tracing::debug;
use utils::DiagnosticEmitter;

use crate::ir::{Instruction, Program, StackReceiver};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Depth {
    Known(usize),
    /// Paths with different depths met, or the stack underflowed.
    Invalid,
}

impl Default for Depth {
    fn default() -> Self {
        Depth::Known(0)
    }
}

impl State for Depth {
    fn merge_with(&mut self, other: &Self) -> bool {
        if *self == *other || *self == Depth::Invalid {
            return false;
        }
        *self = Depth::Invalid;
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Underflow {
    pub needed: usize,
    pub available: usize,
}

#[derive(Default)]
pub struct DepthChecker {
    underflows: BTreeMap<Position, Underflow>,
}

impl DepthChecker {
    pub fn underflows(&self) -> &BTreeMap<Position, Underflow> {
        &self.underflows
    }
}

impl StackReceiver<Program, Depth> for DepthChecker {
    fn any(&mut self, cx: &mut DispatchContext<'_, '_, Program, Depth>) {
        let Depth::Known(depth) = *cx.state() else {
            return;
        };
        let (pops, pushes) = cx.instruction().stack_effect();
        if depth < pops {
            self.underflows.insert(
                cx.position(),
                Underflow {
                    needed: pops,
                    available: depth,
                },
            );
            *cx.state_mut() = Depth::Invalid;
            return;
        }
        *cx.state_mut() = Depth::Known(depth - pops + pushes);
    }
}

#[derive(Default)]
pub struct DepthAnalysis {
    dispatcher: InstructionDispatcher<DepthChecker>,
}

impl DepthAnalysis {
    pub fn checker(&self) -> &DepthChecker {
        self.dispatcher.receiver()
    }
}

impl Analysis<Program> for DepthAnalysis {
    type State = Depth;
    type Dispatcher = InstructionDispatcher<DepthChecker>;

    fn dispatcher(&mut self) -> &mut Self::Dispatcher {
        &mut self.dispatcher
    }

    fn reset(&mut self) {
        self.dispatcher.receiver_mut().underflows.clear();
    }
}

/// Reports every stack underflow to `diag`. Inconsistent depths at labels
/// are only reported when nothing underflowed, as an underflow makes every
/// label after it inconsistent.
pub fn verify_stack_depth(program: &Program, diag: &mut DiagnosticEmitter) -> Option<()> {
    let mut driver = ForwardDriver::new(DepthAnalysis::default());
    if let Err(err) = driver.analyze(program) {
        diag.error(program.line(0), &err.to_string());
        return None;
    }

    let underflows = driver.analysis().checker().underflows();
    for (&pos, underflow) in underflows {
        let instr = &program.instructions()[pos];
        diag.report(
            program.line(pos),
            &format!("at '{instr}'"),
            &format!(
                "stack underflow, needs {} value(s) but the stack has {}.",
                underflow.needed, underflow.available
            ),
        );
    }
    if !underflows.is_empty() {
        debug!(count = underflows.len(), "Found stack underflows.");
        return None;
    }

    let mut valid = true;
    for (pos, depth) in driver.merge_points().iter() {
        if *depth != Depth::Invalid {
            continue;
        }
        if let Instruction::Label(name) = &program.instructions()[pos] {
            diag.report(
                program.line(pos),
                &format!("at '{name}'"),
                "the stack depth differs between the paths reaching the label.",
            );
        }
        valid = false;
    }
    valid.then_some(())
}
