use clap::{Parser as CommandLineParser, ValueEnum};
use stack_lib::analysis::stack_depth::verify_stack_depth;
use stack_lib::analysis::{Analyses, AnalysisResult, get_analysis_results};
use stack_lib::ir;
use stack_lib::parser::Parser;
use tracing::info;
use utils::DiagnosticEmitter;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum CLIAnalyses {
    /// Constant propagation, annotates the state after each instruction.
    Constants,
    /// Live variables, annotates the state before each instruction.
    Liveness,
    /// Only the possible return values.
    Returns,
    /// Only the variables read before written.
    Inputs,
}

impl From<CLIAnalyses> for Analyses {
    fn from(value: CLIAnalyses) -> Self {
        match value {
            CLIAnalyses::Constants => Self::Constants,
            CLIAnalyses::Liveness => Self::Liveness,
            CLIAnalyses::Returns => Self::Returns,
            CLIAnalyses::Inputs => Self::Inputs,
        }
    }
}

#[derive(Debug, Default, CommandLineParser)]
#[command(
    name = "stack",
    version,
    about = "Assembler and dataflow analyses for a small stack machine."
)]
pub struct Opt {
    /// Name of the analysis to execute
    #[arg(long, value_name = "ANALYSIS_NAME")]
    pub analyze: Option<CLIAnalyses>,

    /// File containing the assembly of the program.
    pub filename: String,
}

pub fn process_source(src: &str, diag: &mut DiagnosticEmitter, opts: &Opt) -> Option<()> {
    let parser = Parser::new(src, diag);
    let program = parser.parse()?;
    verify_stack_depth(&program, diag)?;

    let Some(analysis) = opts.analyze else {
        diag.out(&ir::print(&program, &ir::Annotations::new()));
        return Some(());
    };

    let AnalysisResult {
        annotations,
        summary,
    } = match get_analysis_results(Analyses::from(analysis), &program) {
        Ok(result) => result,
        Err(err) => {
            diag.err_ln(&format!("Error: {err}"));
            return None;
        }
    };
    info!(?analysis, "Analysis finished.");

    if !annotations.pre.is_empty() || !annotations.post.is_empty() {
        diag.out(&ir::print(&program, &annotations));
    }
    if let Some(summary) = summary {
        diag.out_ln(&summary);
    }
    Some(())
}

#[cfg(test)]
mod driver_tests;
