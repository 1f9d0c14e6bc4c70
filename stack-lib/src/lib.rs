//! A small stack machine with an assembler, a printer, and dataflow analyses
//! built on the fixpoint engine of the absint crate.

pub mod analysis;
pub mod ir;
pub mod parser;
