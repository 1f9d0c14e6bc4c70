//! This crate contains a fixpoint engine to build static analysis tools based
//! on [abstract interpretation](https://en.wikipedia.org/wiki/Abstract_interpretation)
//! over linear instruction streams, like the bytecode of a stack based
//! virtual machine. Control flow is explicit in the stream: labels mark merge
//! points, jumps name their targets, and exit points leave the analyzed code.
//!
//! The building blocks include:
//! * A composable abstract state: an abstract operand stack, a scoped
//!   environment of bindings, and an extra component for analysis specific
//!   facts.
//! * Dispatchers that route each instruction to a transfer function. The
//!   [`receiver!`] macro generates an exhaustive, opcode indexed visitor from
//!   a list of opcodes.
//! * Forward and backward worklist drivers computing the fixpoint at merge
//!   points, and indexed variants that can reconstruct the abstract state at
//!   any instruction by replaying from the closest merge point.
//!
//! The engine does not know anything about the concrete instructions or
//! abstract values. Look at the stack-lib crate for an example how to define
//! analyses using the helpers in this crate.
//!
//! Some resources to learn more about abstract interpretation:
//! * [Static Program Analysis, Anders Møller and Michael I. Schwartzbach](https://cs.au.dk/~amoeller/spa/)
//! * [Introduction to Static Analysis, Xavier Rival and Kwangkeun Yi](https://mitpress.mit.edu/9780262043410/introduction-to-static-analysis/)
//! * [Data flow analysis: an informal introduction](https://clang.llvm.org/docs/DataFlowAnalysisIntro.html)

/// The navigation contract between the drivers and the analyzed code.
pub mod code;

/// Dispatchers routing instructions to transfer functions, including the
/// opcode indexed visitor.
pub mod dispatch;

/// Worklist algorithms computing fixpoints in both directions, and the
/// per-instruction retrieval layers built on top of them.
pub mod drivers;

/// Abstract states: stacks, environments, and their composition.
pub mod state;

#[doc(hidden)]
pub use paste;

#[cfg(test)]
mod test_code;
