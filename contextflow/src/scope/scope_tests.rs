//! Behavioral tests for scope stacks: LIFO restore, out-of-order
//! closes, and per-thread isolation.

use super::{ContextStack, ScopedContext};
use pretty_assertions::assert_eq;

fn push_str(stack: &ContextStack<String>, value: &str) -> ScopedContext {
    stack.push(Some(value.to_string()))
}

#[test]
fn test_push_and_current() {
    let stack = ContextStack::<String>::new();
    assert!(stack.current().is_none());

    let scope = push_str(&stack, "en");
    assert_eq!(stack.current_value(), Some("en".to_string()));

    scope.close();
    assert!(stack.current().is_none());
    assert!(stack.current_value().is_none());
}

#[test]
fn test_lifo_restore() {
    // P1: closing in reverse order restores, step by step, the value
    // active just before the corresponding activation.
    let stack = ContextStack::<String>::new();

    let a = push_str(&stack, "a");
    let b = push_str(&stack, "b");
    let c = push_str(&stack, "c");
    assert_eq!(stack.current_value(), Some("c".to_string()));

    c.close();
    assert_eq!(stack.current_value(), Some("b".to_string()));
    b.close();
    assert_eq!(stack.current_value(), Some("a".to_string()));
    a.close();
    assert!(stack.current_value().is_none());
}

#[test]
fn test_out_of_order_close_unwinds_to_open_ancestor() {
    // P2: closing B before C is absorbed; closing C lands on A.
    let stack = ContextStack::<String>::new();

    let _a = push_str(&stack, "a");
    let b = push_str(&stack, "b");
    let c = push_str(&stack, "c");

    b.close();
    // B is not the head, so nothing visible changes yet.
    assert_eq!(stack.current_value(), Some("c".to_string()));

    c.close();
    assert_eq!(stack.current_value(), Some("a".to_string()));
}

#[test]
fn test_skip_closes_unwind_through_whole_chain() {
    // Closing B, then A (neither the head), then C empties the stack.
    let stack = ContextStack::<String>::new();

    let a = push_str(&stack, "a");
    let b = push_str(&stack, "b");
    let c = push_str(&stack, "c");

    b.close();
    a.close();
    assert_eq!(stack.current_value(), Some("c".to_string()));

    c.close();
    assert!(stack.current().is_none());
}

#[test]
fn test_close_idempotent_on_stacked_scope() {
    // P3: repeated closes of the same scope have no further effect.
    let stack = ContextStack::<String>::new();

    let a = push_str(&stack, "a");
    let b = push_str(&stack, "b");

    b.close();
    b.close();
    assert_eq!(stack.current_value(), Some("a".to_string()));

    a.close();
    a.close();
    assert!(stack.current().is_none());
}

#[test]
fn test_push_after_unwind_records_open_parent() {
    let stack = ContextStack::<String>::new();

    let _a = push_str(&stack, "a");
    let b = push_str(&stack, "b");
    b.close();

    // The push unwinds first, so the new scope's parent is A, not B.
    let c = push_str(&stack, "c");
    assert_eq!(stack.current_value(), Some("c".to_string()));

    c.close();
    assert_eq!(stack.current_value(), Some("a".to_string()));
}

#[test]
fn test_push_none_value() {
    let stack = ContextStack::<String>::new();

    let _a = push_str(&stack, "a");
    let empty = stack.push(None);

    // The head is the empty scope; its value is absent.
    assert!(stack.current_value().is_none());
    assert!(stack.current().is_some());

    empty.close();
    assert_eq!(stack.current_value(), Some("a".to_string()));
}

#[test]
fn test_stacks_are_independent() {
    let locale = ContextStack::<String>::new();
    let tenant = ContextStack::<u64>::new();

    let _l = locale.push(Some("en".to_string()));
    let t = tenant.push(Some(7));

    assert_eq!(locale.current_value(), Some("en".to_string()));
    assert_eq!(tenant.current_value(), Some(7));

    t.close();
    assert_eq!(locale.current_value(), Some("en".to_string()));
    assert!(tenant.current_value().is_none());
}

#[test]
fn test_threads_do_not_share_stacks() {
    let stack = std::sync::Arc::new(ContextStack::<String>::new());
    let _main = stack.push(Some("main".to_string()));

    let stack_clone = stack.clone();
    let seen = std::thread::spawn(move || {
        let before = stack_clone.current_value();
        let scope = stack_clone.push(Some("worker".to_string()));
        let during = stack_clone.current_value();
        scope.close();
        (before, during)
    })
    .join()
    .unwrap();

    assert_eq!(seen, (None, Some("worker".to_string())));
    assert_eq!(stack.current_value(), Some("main".to_string()));
}

#[test]
fn test_clear_drops_unclosed_scopes() {
    let stack = ContextStack::<String>::new();

    let _a = push_str(&stack, "a");
    let _b = push_str(&stack, "b");
    assert_eq!(stack.depth(), 2);

    stack.clear();
    assert!(stack.current().is_none());
    assert_eq!(stack.depth(), 0);
}

#[test]
fn test_depth_skips_closed_ancestors() {
    let stack = ContextStack::<String>::new();

    let _a = push_str(&stack, "a");
    let b = push_str(&stack, "b");
    let _c = push_str(&stack, "c");

    assert_eq!(stack.depth(), 3);
    b.close();
    assert_eq!(stack.depth(), 2);
}
