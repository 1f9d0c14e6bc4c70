use core::fmt::Display;
use std::collections::BTreeMap;

use absint::code::{CodeSequence, InstrKind, Position};
use absint::dispatch::Decode;
use itertools::Itertools;

pub type Name = String;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Instruction {
    Label(Name),
    Nop,
    Push(i64),
    Pop,
    Dup,
    Swap,
    Add,
    Sub,
    Mul,
    Load(Name),
    Store(Name),
    /// Pops `arity` arguments and pushes the result of the call.
    Call {
        callee: Name,
        arity: usize,
    },
    Jump(Name),
    /// Pops the condition, jumps when it is non-zero.
    BranchTrue(Name),
    /// Pops the condition, jumps when it is zero.
    BranchFalse(Name),
    /// Pops an index and jumps to the label at that index. Falls through
    /// when the index is out of range.
    Switch(Vec<Name>),
    /// Pops the return value and leaves the program.
    Ret,
}

absint::receiver! {
    /// The opcodes of the stack machine.
    pub enum Opcode;
    /// Transfer functions for the instructions of the stack machine.
    pub trait StackReceiver {
        label: Label,
        Nop,
        Push,
        Pop,
        Dup,
        Swap,
        Add,
        Sub,
        Mul,
        Load,
        Store,
        Call,
        Jump,
        BranchTrue,
        BranchFalse,
        Switch,
        Ret,
    }
}

impl Decode for Instruction {
    type Opcode = Opcode;

    fn opcode(&self) -> Opcode {
        match self {
            Instruction::Label(_) => Opcode::Label,
            Instruction::Nop => Opcode::Nop,
            Instruction::Push(_) => Opcode::Push,
            Instruction::Pop => Opcode::Pop,
            Instruction::Dup => Opcode::Dup,
            Instruction::Swap => Opcode::Swap,
            Instruction::Add => Opcode::Add,
            Instruction::Sub => Opcode::Sub,
            Instruction::Mul => Opcode::Mul,
            Instruction::Load(_) => Opcode::Load,
            Instruction::Store(_) => Opcode::Store,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Jump(_) => Opcode::Jump,
            Instruction::BranchTrue(_) => Opcode::BranchTrue,
            Instruction::BranchFalse(_) => Opcode::BranchFalse,
            Instruction::Switch(_) => Opcode::Switch,
            Instruction::Ret => Opcode::Ret,
        }
    }
}

impl Instruction {
    /// The labels this instruction can jump to.
    pub fn jump_labels(&self) -> &[Name] {
        match self {
            Instruction::Jump(label)
            | Instruction::BranchTrue(label)
            | Instruction::BranchFalse(label) => core::slice::from_ref(label),
            Instruction::Switch(labels) => labels,
            _ => &[],
        }
    }

    /// The number of values popped and pushed by the instruction.
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Instruction::Label(_)
            | Instruction::Nop
            | Instruction::Jump(_) => (0, 0),
            Instruction::Push(_) | Instruction::Load(_) => (0, 1),
            Instruction::Pop
            | Instruction::Store(_)
            | Instruction::BranchTrue(_)
            | Instruction::BranchFalse(_)
            | Instruction::Switch(_)
            | Instruction::Ret => (1, 0),
            Instruction::Dup => (1, 2),
            Instruction::Swap => (2, 2),
            Instruction::Add | Instruction::Sub | Instruction::Mul => (2, 1),
            Instruction::Call { arity, .. } => (*arity, 1),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Instruction::Label(name) => write!(f, "{name}:"),
            Instruction::Nop => write!(f, "nop"),
            Instruction::Push(value) => write!(f, "push {value}"),
            Instruction::Pop => write!(f, "pop"),
            Instruction::Dup => write!(f, "dup"),
            Instruction::Swap => write!(f, "swap"),
            Instruction::Add => write!(f, "add"),
            Instruction::Sub => write!(f, "sub"),
            Instruction::Mul => write!(f, "mul"),
            Instruction::Load(var) => write!(f, "load {var}"),
            Instruction::Store(var) => write!(f, "store {var}"),
            Instruction::Call { callee, arity } => write!(f, "call {callee} {arity}"),
            Instruction::Jump(label) => write!(f, "jmp {label}"),
            Instruction::BranchTrue(label) => write!(f, "brtrue {label}"),
            Instruction::BranchFalse(label) => write!(f, "brfalse {label}"),
            Instruction::Switch(labels) => write!(f, "switch {}", labels.iter().join(" ")),
            Instruction::Ret => write!(f, "ret"),
        }
    }
}

/// A parsed program with resolved jump targets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    pub(crate) instructions: Vec<Instruction>,
    // Source line of each instruction.
    pub(crate) lines: Vec<u32>,
    pub(crate) targets: Vec<Vec<Position>>,
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn line(&self, pos: Position) -> u32 {
        self.lines[pos]
    }
}

impl CodeSequence for Program {
    type Instruction = Instruction;

    fn len(&self) -> usize {
        self.instructions.len()
    }

    fn instruction(&self, pos: Position) -> &Instruction {
        &self.instructions[pos]
    }

    fn kind(&self, pos: Position) -> InstrKind {
        match &self.instructions[pos] {
            Instruction::Label(_) => InstrKind::Label,
            Instruction::Jump(_) => InstrKind::UnconditionalJump,
            Instruction::BranchTrue(_) | Instruction::BranchFalse(_) | Instruction::Switch(_) => {
                InstrKind::Jump
            }
            Instruction::Ret => InstrKind::Exit,
            _ => InstrKind::Plain,
        }
    }

    fn targets(&self, pos: Position) -> &[Position] {
        &self.targets[pos]
    }
}

/// Comments attached to instructions by an analysis. Pre annotations are
/// printed before the instruction, post annotations after it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotations {
    pub pre: BTreeMap<Position, Vec<String>>,
    pub post: BTreeMap<Position, Vec<String>>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }
}

fn render_annotations(annotations: Option<&Vec<String>>) -> Option<String> {
    annotations
        .filter(|anns| !anns.is_empty())
        .map(|anns| format!("/* {} */", anns.join(" ")))
}

/// Prints the program one instruction per line, labels unindented.
pub fn print(program: &Program, annotations: &Annotations) -> String {
    let mut result = String::new();
    for (pos, instr) in program.instructions.iter().enumerate() {
        if !matches!(instr, Instruction::Label(_)) {
            result.push_str("  ");
        }
        if let Some(pre) = render_annotations(annotations.pre.get(&pos)) {
            result.push_str(&pre);
            result.push(' ');
        }
        result.push_str(&instr.to_string());
        if let Some(post) = render_annotations(annotations.post.get(&pos)) {
            result.push(' ');
            result.push_str(&post);
        }
        result.push('\n');
    }
    result
}
