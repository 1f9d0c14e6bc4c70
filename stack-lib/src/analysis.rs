pub mod constant_analysis;
pub mod liveness_analysis;
pub mod stack_depth;

use std::collections::HashMap;
use std::sync::OnceLock;

use absint::drivers::AnalysisError;
use tracing::debug;

use crate::ir::{Annotations, Program};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub annotations: Annotations,
    /// A one line verdict about the whole program, if the analysis has one.
    pub summary: Option<String>,
}

pub trait Analyzer: Send + Sync {
    fn analyze(&self, program: &Program) -> Result<AnalysisResult, AnalysisError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Analyses {
    Constants,
    Liveness,
    Returns,
    Inputs,
}

static ANALYSES: OnceLock<HashMap<Analyses, Box<dyn Analyzer>>> = OnceLock::new();
fn init_analyses() -> HashMap<Analyses, Box<dyn Analyzer>> {
    let mut m = HashMap::<Analyses, Box<dyn Analyzer>>::new();
    m.insert(
        Analyses::Constants,
        Box::new(constant_analysis::ConstantAnalysis),
    );
    m.insert(
        Analyses::Liveness,
        Box::new(liveness_analysis::LivenessAnalysis),
    );
    m.insert(
        Analyses::Returns,
        Box::new(constant_analysis::ReturnValueAnalysis),
    );
    m.insert(Analyses::Inputs, Box::new(liveness_analysis::InputsAnalysis));
    m
}

pub fn get_analysis_results(
    analysis: Analyses,
    program: &Program,
) -> Result<AnalysisResult, AnalysisError> {
    debug!(?analysis, "Running analysis.");
    let analyzer = ANALYSES
        .get_or_init(init_analyses)
        .get(&analysis)
        .expect("Unimplemented analysis!");
    analyzer.analyze(program)
}
