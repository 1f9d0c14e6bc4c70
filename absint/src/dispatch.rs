use crate::code::{CodeSequence, Cursor, Position};

/// Everything a transfer function can see while handling one instruction:
/// a copy of the driver's cursor, the state to update, and the success flag.
pub struct DispatchContext<'a, 'code, C: ?Sized, S> {
    ins: Cursor<'code, C>,
    state: &'a mut S,
    success: bool,
}

impl<'a, 'code, C: CodeSequence + ?Sized, S> DispatchContext<'a, 'code, C, S> {
    pub fn new(ins: Cursor<'code, C>, state: &'a mut S) -> Self {
        Self {
            ins,
            state,
            success: true,
        }
    }

    pub fn cursor(&self) -> Cursor<'code, C> {
        self.ins
    }

    pub fn position(&self) -> Position {
        self.ins.position()
    }

    /// The instruction under the cursor. The reference is not tied to the
    /// context, so the state can be updated while it is alive.
    pub fn instruction(&self) -> &'code C::Instruction {
        self.ins.instruction()
    }

    pub fn state(&self) -> &S {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        self.state
    }

    /// Reports that the instruction was not handled. This is not an error,
    /// the caller decides what to do, e.g., try another dispatcher.
    pub fn fail(&mut self) {
        self.success = false;
    }

    pub fn succeeded(&self) -> bool {
        self.success
    }
}

/// Applies the transfer function of a single instruction to a state.
pub trait Dispatcher<C: CodeSequence + ?Sized, S> {
    /// Runs [`Dispatcher::do_dispatch`] on a fresh context. Returns false if
    /// the hook called [`DispatchContext::fail`].
    ///
    /// The cursor is passed by value, so the dispatcher cannot move the
    /// cursor of the driver.
    fn dispatch(&mut self, ins: Cursor<'_, C>, state: &mut S) -> bool {
        let mut cx = DispatchContext::new(ins, state);
        self.do_dispatch(&mut cx);
        cx.succeeded()
    }

    fn do_dispatch(&mut self, cx: &mut DispatchContext<'_, '_, C, S>);
}

/// Turns a closure into a dispatcher.
pub struct FnDispatcher<F> {
    func: F,
}

impl<F> FnDispatcher<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<C, S, F> Dispatcher<C, S> for FnDispatcher<F>
where
    C: CodeSequence + ?Sized,
    F: FnMut(&mut DispatchContext<'_, '_, C, S>),
{
    fn do_dispatch(&mut self, cx: &mut DispatchContext<'_, '_, C, S>) {
        (self.func)(cx)
    }
}

/// Tries `primary` first and only runs `secondary` when the former declined
/// the instruction. Fails when both of them declined.
///
/// A declining dispatcher should leave the state untouched, the secondary
/// dispatcher sees all the changes the primary made.
pub struct Fallback<A, B> {
    pub primary: A,
    pub secondary: B,
}

impl<A, B> Fallback<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<C, S, A, B> Dispatcher<C, S> for Fallback<A, B>
where
    C: CodeSequence + ?Sized,
    A: Dispatcher<C, S>,
    B: Dispatcher<C, S>,
{
    fn do_dispatch(&mut self, cx: &mut DispatchContext<'_, '_, C, S>) {
        if self.primary.dispatch(cx.cursor(), cx.state_mut()) {
            return;
        }
        if !self.secondary.dispatch(cx.cursor(), cx.state_mut()) {
            cx.fail();
        }
    }
}

/////////////////////////////////////
// Opcode indexed dispatch.        //
/////////////////////////////////////

/// Instructions that can tell their opcode.
pub trait Decode {
    type Opcode: Copy;

    fn opcode(&self) -> Self::Opcode;
}

/// Routes an opcode to the matching handler of a receiver. Implemented by the
/// opcode enums generated by [`crate::receiver!`].
pub trait Visit<R: ?Sized, C: ?Sized, S>: Copy {
    fn visit(self, receiver: &mut R, cx: &mut DispatchContext<'_, '_, C, S>);
}

/// A dispatcher decoding the instruction under the cursor and calling the
/// handler of the receiver for that opcode.
#[derive(Clone, Debug, Default)]
pub struct InstructionDispatcher<R> {
    receiver: R,
}

impl<R> InstructionDispatcher<R> {
    pub fn new(receiver: R) -> Self {
        Self { receiver }
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut R {
        &mut self.receiver
    }
}

impl<R, C, S> Dispatcher<C, S> for InstructionDispatcher<R>
where
    C: CodeSequence + ?Sized,
    C::Instruction: Decode,
    <C::Instruction as Decode>::Opcode: Visit<R, C, S>,
{
    fn do_dispatch(&mut self, cx: &mut DispatchContext<'_, '_, C, S>) {
        let opcode = cx.instruction().opcode();
        opcode.visit(&mut self.receiver, cx);
    }
}

/// Declares an opcode enum and a receiver trait with one handler per opcode.
///
/// ```
/// absint::receiver! {
///     /// The opcodes of a tiny machine.
///     pub enum Opcode;
///     /// Transfer functions for the tiny machine.
///     pub trait Receiver {
///         label: Label,
///         Push,
///         Pop,
///         BranchTrue,
///     }
/// }
/// ```
///
/// The opcode after `label:` is handled by `Receiver::label`. The rest of the
/// opcodes get a handler with the snake_case name of the opcode, e.g.,
/// `Receiver::branch_true`. Every handler defaults to `Receiver::any`, which
/// does nothing. The generated `Visit` implementation matches on every
/// opcode, adding an opcode without updating the list does not compile.
///
/// Pair the receiver with [`InstructionDispatcher`] by implementing
/// [`Decode`] for the instructions.
#[macro_export]
macro_rules! receiver {
    (
        $(#[$opmeta:meta])*
        $vis:vis enum $opcode:ident;
        $(#[$rmeta:meta])*
        $rvis:vis trait $receiver:ident {
            label: $label:ident,
            $($variant:ident),+ $(,)?
        }
    ) => {
        $(#[$opmeta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $opcode {
            $label,
            $($variant),+
        }

        $crate::paste::paste! {
            $(#[$rmeta])*
            $rvis trait $receiver<C: ?Sized, S> {
                /// Handles every opcode without a more specific handler.
                fn any(&mut self, _cx: &mut $crate::dispatch::DispatchContext<'_, '_, C, S>) {}

                fn label(&mut self, cx: &mut $crate::dispatch::DispatchContext<'_, '_, C, S>) {
                    self.any(cx)
                }

                $(
                    fn [<$variant:snake>](
                        &mut self,
                        cx: &mut $crate::dispatch::DispatchContext<'_, '_, C, S>,
                    ) {
                        self.any(cx)
                    }
                )+
            }

            impl<R, C, S> $crate::dispatch::Visit<R, C, S> for $opcode
            where
                R: $receiver<C, S> + ?Sized,
                C: ?Sized,
            {
                fn visit(
                    self,
                    receiver: &mut R,
                    cx: &mut $crate::dispatch::DispatchContext<'_, '_, C, S>,
                ) {
                    match self {
                        $opcode::$label => receiver.label(cx),
                        $($opcode::$variant => receiver.[<$variant:snake>](cx),)+
                    }
                }
            }
        }
    };
}
