use std::collections::HashMap;

use utils::DiagnosticEmitter;

use crate::ir::{Instruction, Name, Program};

/// Assembler for the textual form of the stack machine. Every line holds a
/// single instruction or a label definition (`name:`). Everything after a
/// `#` is a comment.
pub struct Parser<'src> {
    source: &'src str,
    instructions: Vec<Instruction>,
    lines: Vec<u32>,
    labels: HashMap<Name, usize>,
    diag: &'src mut DiagnosticEmitter,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, diag: &'src mut DiagnosticEmitter) -> Self {
        Self {
            source,
            instructions: Vec::new(),
            lines: Vec::new(),
            labels: HashMap::new(),
            diag,
        }
    }

    /// Parses the whole source. Reports the first error to the diagnostic
    /// emitter and returns `None` on failure.
    pub fn parse(mut self) -> Option<Program> {
        let source = self.source;
        let mut last_line = 1;
        for (idx, line) in source.lines().enumerate() {
            let line_num = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            last_line = line_num;
            let code = line.split('#').next().unwrap_or_default().trim();
            if code.is_empty() {
                continue;
            }
            self.parse_line(line_num, code)?;
        }

        let Some(last) = self.instructions.last() else {
            self.diag
                .report(last_line, "at end of file", "the program has no instructions.");
            return None;
        };
        if !matches!(last, Instruction::Ret | Instruction::Jump(_)) {
            let line = self.lines[self.lines.len() - 1];
            let item = format!("at '{last}'");
            self.diag.report(
                line,
                &item,
                "the last instruction must be 'ret' or 'jmp'.",
            );
            return None;
        }

        let targets = self.resolve_targets()?;
        Some(Program {
            instructions: self.instructions,
            lines: self.lines,
            targets,
        })
    }

    fn parse_line(&mut self, line: u32, code: &str) -> Option<()> {
        if let Some(label) = code.strip_suffix(':') {
            let label = label.trim();
            self.check_name(line, label)?;
            if self.labels.contains_key(label) {
                self.diag.report(
                    line,
                    &format!("at '{label}'"),
                    "the label is already defined.",
                );
                return None;
            }
            self.labels.insert(label.to_owned(), self.instructions.len());
            self.push(line, Instruction::Label(label.to_owned()));
            return Some(());
        }

        let mut tokens = code.split_whitespace();
        let mnemonic = tokens.next()?;
        let operands: Vec<_> = tokens.collect();
        let instr = match mnemonic {
            "nop" => self.nullary(line, mnemonic, &operands, Instruction::Nop)?,
            "pop" => self.nullary(line, mnemonic, &operands, Instruction::Pop)?,
            "dup" => self.nullary(line, mnemonic, &operands, Instruction::Dup)?,
            "swap" => self.nullary(line, mnemonic, &operands, Instruction::Swap)?,
            "add" => self.nullary(line, mnemonic, &operands, Instruction::Add)?,
            "sub" => self.nullary(line, mnemonic, &operands, Instruction::Sub)?,
            "mul" => self.nullary(line, mnemonic, &operands, Instruction::Mul)?,
            "ret" => self.nullary(line, mnemonic, &operands, Instruction::Ret)?,
            "push" => {
                self.expect_operands(line, mnemonic, &operands, 1)?;
                Instruction::Push(self.integer(line, operands[0])?)
            }
            "load" => Instruction::Load(self.unary_name(line, mnemonic, &operands)?),
            "store" => Instruction::Store(self.unary_name(line, mnemonic, &operands)?),
            "jmp" => Instruction::Jump(self.unary_name(line, mnemonic, &operands)?),
            "brtrue" => Instruction::BranchTrue(self.unary_name(line, mnemonic, &operands)?),
            "brfalse" => Instruction::BranchFalse(self.unary_name(line, mnemonic, &operands)?),
            "call" => {
                self.expect_operands(line, mnemonic, &operands, 2)?;
                self.check_name(line, operands[0])?;
                let Ok(arity) = operands[1].parse::<usize>() else {
                    self.diag.report(
                        line,
                        &format!("at '{}'", operands[1]),
                        "the arity must be a non-negative integer.",
                    );
                    return None;
                };
                Instruction::Call {
                    callee: operands[0].to_owned(),
                    arity,
                }
            }
            "switch" => {
                if operands.is_empty() {
                    self.diag.report(
                        line,
                        "at 'switch'",
                        "expected at least one label.",
                    );
                    return None;
                }
                let mut labels = Vec::new();
                for operand in operands {
                    self.check_name(line, operand)?;
                    labels.push(operand.to_owned());
                }
                Instruction::Switch(labels)
            }
            _ => {
                self.diag.report(
                    line,
                    &format!("at '{mnemonic}'"),
                    "unknown instruction.",
                );
                return None;
            }
        };
        self.push(line, instr);
        Some(())
    }

    fn push(&mut self, line: u32, instr: Instruction) {
        self.instructions.push(instr);
        self.lines.push(line);
    }

    fn expect_operands(
        &mut self,
        line: u32,
        mnemonic: &str,
        operands: &[&str],
        expected: usize,
    ) -> Option<()> {
        if operands.len() == expected {
            return Some(());
        }
        self.diag.report(
            line,
            &format!("at '{mnemonic}'"),
            &format!("expected {expected} operand(s), found {}.", operands.len()),
        );
        None
    }

    fn nullary(
        &mut self,
        line: u32,
        mnemonic: &str,
        operands: &[&str],
        instr: Instruction,
    ) -> Option<Instruction> {
        self.expect_operands(line, mnemonic, operands, 0)?;
        Some(instr)
    }

    fn unary_name(&mut self, line: u32, mnemonic: &str, operands: &[&str]) -> Option<Name> {
        self.expect_operands(line, mnemonic, operands, 1)?;
        self.check_name(line, operands[0])?;
        Some(operands[0].to_owned())
    }

    fn integer(&mut self, line: u32, operand: &str) -> Option<i64> {
        match operand.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.diag.report(
                    line,
                    &format!("at '{operand}'"),
                    "expected an integer.",
                );
                None
            }
        }
    }

    fn check_name(&mut self, line: u32, name: &str) -> Option<()> {
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            return Some(());
        }
        self.diag
            .report(line, &format!("at '{name}'"), "invalid name.");
        None
    }

    fn resolve_targets(&mut self) -> Option<Vec<Vec<usize>>> {
        let mut targets = Vec::with_capacity(self.instructions.len());
        for (pos, instr) in self.instructions.iter().enumerate() {
            let mut resolved = Vec::new();
            for label in instr.jump_labels() {
                let Some(&target) = self.labels.get(label) else {
                    self.diag.report(
                        self.lines[pos],
                        &format!("at '{label}'"),
                        "undefined label.",
                    );
                    return None;
                };
                if !resolved.contains(&target) {
                    resolved.push(target);
                }
            }
            targets.push(resolved);
        }
        Some(targets)
    }
}
