use utils::DiagnosticEmitter;

use clap::Parser;
use stack_driver::Opt;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opt::parse();
    let mut diag = DiagnosticEmitter::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()));
    let contents = match std::fs::read_to_string(&opts.filename) {
        Ok(contents) => contents,
        Err(err) => {
            diag.err_ln(&format!("Failed to read '{}': {err}", opts.filename));
            return ExitCode::from(1);
        }
    };

    if stack_driver::process_source(&contents, &mut diag, &opts).is_none() {
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}
