use crate::*;

fn run_driver(source: &str, opts: Opt) -> Option<String> {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    process_source(source, &mut diag, &opts)?;
    Some(diag.out_buffer().unwrap() + &diag.err_buffer().unwrap())
}

fn run_driver_errors(source: &str, opts: Opt) -> String {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    assert!(process_source(source, &mut diag, &opts).is_none());
    diag.err_buffer().unwrap()
}

#[test]
fn pretty_print() {
    let source = r"# doubles the input
load x
dup
add
ret";
    let expected = "  load x\n  dup\n  add\n  ret\n";
    let output = run_driver(source, Opt::default()).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn parse_options() {
    let opts = Opt::parse_from(["stack-driver", "--analyze", "returns", "prog.s"].iter());
    assert_eq!(opts.analyze, Some(CLIAnalyses::Returns));
    assert_eq!(opts.filename, "prog.s");
}

#[test]
fn analyze_constants() {
    let source = r"push 6
push 7
mul
ret";
    let expected = r"  push 6 /* stack: [6] */
  push 7 /* stack: [6, 7] */
  mul /* stack: [42] */
  ret /* stack: [] */
Return value: 42
";
    let opts = Opt {
        analyze: Some(CLIAnalyses::Constants),
        ..Opt::default()
    };
    let output = run_driver(source, opts).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn analyze_liveness() {
    let source = r"load a
store b
load b
ret";
    let expected = r"  /* live: {a} */ load a
  /* live: {} */ store b
  /* live: {b} */ load b
  /* live: {} */ ret
Inputs: {a}
";
    let opts = Opt {
        analyze: Some(CLIAnalyses::Liveness),
        ..Opt::default()
    };
    let output = run_driver(source, opts).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn summaries_only() {
    let source = r"load a
brtrue one
push 2
ret
one:
push 1
ret";
    let opts = Opt {
        analyze: Some(CLIAnalyses::Returns),
        ..Opt::default()
    };
    assert_eq!(run_driver(source, opts).unwrap(), "Return value: Top\n");

    let opts = Opt {
        analyze: Some(CLIAnalyses::Inputs),
        ..Opt::default()
    };
    assert_eq!(run_driver(source, opts).unwrap(), "Inputs: {a}\n");
}

#[test]
fn syntax_error() {
    let source = "push 1\npush\nret";
    assert_eq!(
        run_driver_errors(source, Opt::default()),
        "[line 2] Error at 'push': expected 1 operand(s), found 0.\n"
    );
}

#[test]
fn stack_errors_stop_the_analysis() {
    let source = "push 1\nadd\nret";
    let opts = Opt {
        analyze: Some(CLIAnalyses::Constants),
        ..Opt::default()
    };
    assert_eq!(
        run_driver_errors(source, opts),
        "[line 2] Error at 'add': stack underflow, needs 2 value(s) but the stack has 1.\n"
    );
}
