use core::fmt::Debug;

/// Index of an instruction within a [`CodeSequence`]. Positions are stable
/// for as long as the code is borrowed by a driver. The first instruction is
/// at `0`, and `len()` is the end sentinel.
pub type Position = usize;

/// Control flow classification of a single instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrKind {
    /// A pseudo-instruction marking a merge point. Jumps always target labels.
    Label,
    /// A jump that never continues with the next instruction.
    UnconditionalJump,
    /// A jump with at least one target that might also fall through, e.g.,
    /// conditional branches or multi-way jumps with a default case.
    Jump,
    /// Leaves the analyzed code, e.g., a return.
    Exit,
    Plain,
}

/// The driver's view of the analyzed code: a linear, bidirectionally
/// steppable sequence of instructions with explicit control flow.
///
/// Well-formed code has the following properties:
/// * Every jump target is a label.
/// * Execution never falls off the end of the sequence, i.e., the last
///   instruction is an exit or an unconditional jump.
/// * The stack depth is the same on every incoming edge of a label.
pub trait CodeSequence {
    type Instruction: Debug;

    /// Number of instructions, also the end sentinel position.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn instruction(&self, pos: Position) -> &Self::Instruction;

    fn kind(&self, pos: Position) -> InstrKind;

    /// The jump targets of the instruction at `pos`. Empty for everything
    /// that is not a jump.
    fn targets(&self, pos: Position) -> &[Position];

    /// Positions where a backward analysis terminates. By default, the first
    /// instruction is the only entry point.
    fn is_entry_point(&self, pos: Position) -> bool {
        pos == 0
    }

    /// All the positions that can execute right after `pos`. The default
    /// implementation derives them from [`CodeSequence::kind`] and
    /// [`CodeSequence::targets`].
    fn successors(&self, pos: Position) -> Vec<Position> {
        let mut result = Vec::new();
        let next = pos + 1;
        match self.kind(pos) {
            InstrKind::Exit => {}
            InstrKind::UnconditionalJump => result.extend_from_slice(self.targets(pos)),
            InstrKind::Jump => {
                result.extend_from_slice(self.targets(pos));
                if next < self.len() && !result.contains(&next) {
                    result.push(next);
                }
            }
            InstrKind::Label | InstrKind::Plain => {
                if next < self.len() {
                    result.push(next);
                }
            }
        }
        result
    }

    fn is_label(&self, pos: Position) -> bool {
        self.kind(pos) == InstrKind::Label
    }

    fn is_jump(&self, pos: Position) -> bool {
        matches!(
            self.kind(pos),
            InstrKind::Jump | InstrKind::UnconditionalJump
        )
    }

    fn is_unconditional_jump(&self, pos: Position) -> bool {
        self.kind(pos) == InstrKind::UnconditionalJump
    }

    fn is_exit_point(&self, pos: Position) -> bool {
        self.kind(pos) == InstrKind::Exit
    }

    /// Returns true when the instruction at `to` can be reached from the one
    /// right before it without a jump.
    fn has_fall_through(&self, to: Position) -> bool {
        let Some(from) = to.checked_sub(1) else {
            return false;
        };
        !self.is_exit_point(from) && self.successors(from).contains(&to)
    }
}

/// A read-only editing cursor: a position paired with the code it points
/// into. Cursors are cheap to copy, so handing one to a dispatcher can never
/// move the cursor of the driver.
pub struct Cursor<'code, C: ?Sized> {
    code: &'code C,
    pos: Position,
}

impl<C: ?Sized> Clone for Cursor<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for Cursor<'_, C> {}

impl<C: ?Sized> PartialEq for Cursor<'_, C> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.code, other.code) && self.pos == other.pos
    }
}

impl<C: ?Sized> Eq for Cursor<'_, C> {}

impl<C: ?Sized> Debug for Cursor<'_, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Cursor({})", self.pos)
    }
}

impl<C: ?Sized> From<Cursor<'_, C>> for Position {
    fn from(cursor: Cursor<'_, C>) -> Self {
        cursor.pos
    }
}

impl<'code, C: CodeSequence + ?Sized> Cursor<'code, C> {
    pub fn new(code: &'code C, pos: Position) -> Self {
        Self { code, pos }
    }

    pub fn end(code: &'code C) -> Self {
        Self::new(code, code.len())
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn code(&self) -> &'code C {
        self.code
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    pub fn instruction(&self) -> &'code C::Instruction {
        self.code.instruction(self.pos)
    }

    pub fn kind(&self) -> InstrKind {
        self.code.kind(self.pos)
    }

    pub fn targets(&self) -> &'code [Position] {
        self.code.targets(self.pos)
    }

    /// Moves to the next instruction.
    pub fn advance(&mut self) {
        assert!(!self.is_end(), "Cannot advance past the end of the code.");
        self.pos += 1;
    }

    /// Moves to the previous instruction. Returns false at the first
    /// instruction, leaving the cursor unchanged.
    pub fn retreat(&mut self) -> bool {
        match self.pos.checked_sub(1) {
            Some(prev) => {
                self.pos = prev;
                true
            }
            None => false,
        }
    }
}
