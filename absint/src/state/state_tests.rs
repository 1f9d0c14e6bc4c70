use crate::state::*;
use crate::test_code::Flat;

// Tracks whether a variable is assigned on every path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Assigned {
    Never,
    Maybe,
    Always,
}

impl State for Assigned {
    fn merge_with(&mut self, other: &Self) -> bool {
        if *self == *other || *self == Assigned::Maybe {
            return false;
        }
        *self = Assigned::Maybe;
        true
    }
}

impl AbstractValue for Assigned {
    fn top() -> Self {
        Assigned::Maybe
    }

    fn absent() -> Self {
        Assigned::Never
    }
}

fn env(bindings: &[(char, Flat)]) -> AbstractEnvironment<char, Flat> {
    let mut env = AbstractEnvironment::new();
    for &(key, value) in bindings {
        env.set(key, value);
    }
    env
}

fn stack(values: &[Flat]) -> AbstractStack<Flat> {
    let mut stack = AbstractStack::new();
    for &value in values {
        stack.push(value);
    }
    stack
}

#[test]
fn test_stack_operations() {
    let mut stack = stack(&[Flat::Value(1), Flat::Value(2), Flat::Value(3)]);
    assert_eq!(stack.depth(), 3);
    assert_eq!(*stack.top(), Flat::Value(3));
    assert_eq!(stack[0], Flat::Value(3));
    assert_eq!(stack[2], Flat::Value(1));
    assert_eq!(stack.get(3), None);
    assert_eq!(
        stack.iter().copied().collect::<Vec<_>>(),
        vec![Flat::Value(3), Flat::Value(2), Flat::Value(1)]
    );

    stack[1] = Flat::Top;
    *stack.top_mut() = Flat::Bottom;
    assert_eq!(stack.pop(), Flat::Bottom);
    assert_eq!(stack.pop(), Flat::Top);
    stack.pop_n(1);
    assert!(stack.is_empty());
}

#[test]
#[should_panic]
fn test_stack_pop_empty() {
    let mut stack = AbstractStack::<Flat>::new();
    stack.pop();
}

#[test]
#[should_panic]
fn test_stack_pop_n_too_many() {
    let mut stack = stack(&[Flat::Top]);
    stack.pop_n(2);
}

#[test]
fn test_stack_merge() {
    let mut left = stack(&[Flat::Value(1), Flat::Value(2)]);
    let right = stack(&[Flat::Value(1), Flat::Value(3)]);
    assert!(left.merge_with(&right));
    assert_eq!(left, stack(&[Flat::Value(1), Flat::Top]));
    assert!(!left.merge_with(&right));
}

#[test]
fn test_stack_merge_every_slot() {
    let mut left = stack(&[Flat::Bottom, Flat::Value(1)]);
    let right = stack(&[Flat::Value(7), Flat::Value(2)]);
    assert!(left.merge_with(&right));
    assert_eq!(left, stack(&[Flat::Value(7), Flat::Top]));
}

#[test]
#[should_panic]
fn test_stack_merge_depth_mismatch() {
    let mut left = stack(&[Flat::Value(1)]);
    let right = stack(&[Flat::Value(1), Flat::Value(2)]);
    left.merge_with(&right);
}

#[test]
fn test_environment_lookup() {
    let mut parent = env(&[('x', Flat::Value(1)), ('y', Flat::Value(2))]);
    parent.set('z', Flat::Bottom);
    let mut child = AbstractEnvironment::with_parent(parent);
    child.set('x', Flat::Value(10));

    assert!(child.has_parent());
    assert_eq!(child.find(&'x'), Flat::Value(10));
    assert_eq!(child.find(&'y'), Flat::Value(2));
    assert_eq!(child.find(&'w'), Flat::Top);
    assert_eq!(child.get(&'y'), None);
    assert_eq!(child.get_or_top(&'y'), Flat::Top);
    assert!(child.contains(&'x'));
    assert!(!child.contains(&'y'));
    assert_eq!(child.len(), 1);
    assert_eq!(child.parent().map(AbstractEnvironment::len), Some(3));

    *child.get_mut_or_top('v') = Flat::Value(5);
    assert_eq!(child.get(&'v'), Some(&Flat::Value(5)));
    assert_eq!(*child.get_mut_or_top('u'), Flat::Top);

    if let Some(parent) = child.parent_mut() {
        parent.set('y', Flat::Value(3));
    }
    assert_eq!(child.find(&'y'), Flat::Value(3));
}

#[test]
fn test_environment_clone_owns_parent() {
    let child = AbstractEnvironment::with_parent(env(&[('x', Flat::Value(1))]));
    let mut copy = child.clone();
    if let Some(parent) = copy.parent_mut() {
        parent.set('x', Flat::Value(2));
    }
    assert_eq!(child.find(&'x'), Flat::Value(1));
    assert_eq!(copy.find(&'x'), Flat::Value(2));
}

#[test]
fn test_environment_merge_missing_binding() {
    let mut left = env(&[('x', Flat::Value(5))]);
    let right = env(&[]);

    let mut expected = Flat::Value(5);
    expected.merge_with(&Flat::absent());

    left.merge_with(&right);
    assert_eq!(left.get(&'x'), Some(&expected));
    assert_ne!(left.get(&'x'), Some(&Flat::Bottom));

    let mut left = env(&[]);
    let right = env(&[('x', Flat::Value(5))]);
    assert!(left.merge_with(&right));
    assert_eq!(left.get(&'x'), Some(&expected));
}

#[test]
fn test_environment_absent_is_not_bottom() {
    let mut left = AbstractEnvironment::new();
    left.set('x', Assigned::Always);
    left.set('y', Assigned::Always);
    let mut right = AbstractEnvironment::new();
    right.set('y', Assigned::Always);
    right.set('z', Assigned::Always);

    assert!(left.merge_with(&right));
    assert_eq!(left.get(&'x'), Some(&Assigned::Maybe));
    assert_eq!(left.get(&'y'), Some(&Assigned::Always));
    assert_eq!(left.get(&'z'), Some(&Assigned::Maybe));
    assert!(!left.merge_with(&right));
}

#[test]
fn test_environment_merge_parents() {
    let mut left = AbstractEnvironment::with_parent(env(&[('x', Flat::Value(1))]));
    let right = AbstractEnvironment::with_parent(env(&[('x', Flat::Value(2))]));
    assert!(left.merge_with(&right));
    assert_eq!(left.find(&'x'), Flat::Top);

    let mut orphan = env(&[]);
    assert!(orphan.merge_with(&right));
    assert_eq!(orphan.find(&'x'), Flat::Value(2));
    assert!(!orphan.merge_with(&right));
}

#[test]
fn test_environment_merge_all() {
    let mut vars = env(&[('x', Flat::Value(1)), ('y', Flat::Bottom)]);
    vars.merge_all(&Flat::Value(1));
    assert_eq!(
        vars.iter().map(|(&k, &v)| (k, v)).collect::<Vec<_>>(),
        vec![('x', Flat::Value(1)), ('y', Flat::Value(1))]
    );
    vars.merge_all(&Flat::Top);
    assert!(vars.iter().all(|(_, &v)| v == Flat::Top));
}

#[test]
fn test_merge_commutative() {
    let first = env(&[('x', Flat::Value(1)), ('y', Flat::Value(2)), ('z', Flat::Bottom)]);
    let second = env(&[('x', Flat::Value(1)), ('y', Flat::Value(3)), ('w', Flat::Value(4))]);

    let mut left = first.clone();
    left.merge_with(&second);
    let mut right = second.clone();
    right.merge_with(&first);
    assert_eq!(left, right);
}

#[test]
fn test_merge_idempotent() {
    let vars = env(&[('x', Flat::Value(1)), ('y', Flat::Top)]);
    let mut copy = vars.clone();
    assert!(!copy.merge_with(&vars));
    assert_eq!(copy, vars);

    let mut state = AbstractState::new(stack(&[Flat::Value(1)]), vars, NoGlobal);
    let same = state.clone();
    assert!(!state.merge_with(&same));
}

#[test]
fn test_composite_merges_every_component() {
    let mut left: AbstractState<char, Flat> =
        AbstractState::new(stack(&[Flat::Value(1)]), env(&[('x', Flat::Value(1))]), NoGlobal);
    let right = AbstractState::new(stack(&[Flat::Value(2)]), env(&[('x', Flat::Value(2))]), NoGlobal);
    assert!(left.merge_with(&right));
    assert_eq!(left[0], Flat::Top);
    assert_eq!(left.find(&'x'), Flat::Top);

    // Only the environment changes.
    let mut left: AbstractState<char, Flat> =
        AbstractState::new(stack(&[Flat::Value(1)]), env(&[('x', Flat::Value(1))]), NoGlobal);
    let right = AbstractState::new(stack(&[Flat::Value(1)]), env(&[('x', Flat::Value(2))]), NoGlobal);
    assert!(left.merge_with(&right));
    assert_eq!(*left.top(), Flat::Value(1));
    assert_eq!(left.find(&'x'), Flat::Top);
}

#[test]
fn test_composite_global_component() {
    let mut left = AbstractState::new(AbstractStack::new(), env(&[]), Flat::Value(1));
    let right = AbstractState::new(AbstractStack::new(), env(&[]), Flat::Value(2));
    assert!(left.merge_with(&right));
    assert_eq!(*left.global(), Flat::Top);
}

#[test]
fn test_composite_shorthands() {
    let mut state = AbstractState::<char, Flat>::default();
    state.push(Flat::Value(1));
    state.push(Flat::Value(2));
    state[1] = Flat::Value(3);
    *state.top_mut() = Flat::Value(4);
    assert_eq!(state.stack().depth(), 2);
    assert_eq!(state.pop(), Flat::Value(4));
    state.pop_n(1);
    assert!(state.stack().is_empty());

    state.set('x', Flat::Value(1));
    *state.get_mut_or_top('y') = Flat::Value(2);
    assert_eq!(state.get_or_top(&'x'), Flat::Value(1));
    assert_eq!(state.get_or_top(&'z'), Flat::Top);
    state.merge_all_env(&Flat::Value(2));
    assert_eq!(state.find(&'x'), Flat::Top);
    assert_eq!(state.find(&'y'), Flat::Value(2));
    assert_eq!(state.env().len(), 2);
}
