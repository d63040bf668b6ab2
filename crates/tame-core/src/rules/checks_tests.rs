use super::*;
use crate::ast::Node;
use crate::parser::parse_program;
use crate::rewrite::messages::{MessageKind, MessageQueue};
use crate::rules::{new_checks, new_strict};

fn sweep(program: &Node) -> MessageQueue {
    let mut messages = MessageQueue::new();
    new_checks().rewrite(program, &mut messages);
    messages
}

#[test]
fn test_author_written_reserved_identifier_is_flagged() {
    let program = parse_program("x__;").unwrap();
    let messages = sweep(&program);
    assert!(messages.has_fatal());
    assert!(messages.iter().any(|m| {
        m.kind.is_internal() && matches!(m.kind, MessageKind::IllegalIdentifierLeftOver { .. })
    }));
}

#[test]
fn test_synthetic_reserved_identifiers_pass() {
    let program = Node::block(vec![Node::expr_stmt(Node::reference_to(
        Node::ident("x0___").synthetic(),
    ))]);
    let messages = sweep(&program);
    assert!(!messages.has_fatal());
}

#[test]
fn test_non_ascii_identifier_is_flagged() {
    let program = parse_program("café;").unwrap();
    let messages = sweep(&program);
    assert!(messages
        .iter()
        .any(|m| matches!(m.kind, MessageKind::NonAsciiIdentifier { .. })));
}

#[test]
fn test_strict_output_passes_the_sweep() {
    let program = parse_program("var o = 1; o.p = o.q + 2; function f(a) { return a; } f(o);")
        .unwrap();
    let mut messages = MessageQueue::new();
    let rewritten = new_strict().rewrite(&program, &mut messages);
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let sweep_messages = sweep(&rewritten);
    assert!(!sweep_messages.has_fatal(), "{:?}", sweep_messages.messages());
}

#[test]
fn test_sweep_leaves_the_tree_unchanged() {
    let program = parse_program("var a = 1; a + 2;").unwrap();
    let mut messages = MessageQueue::new();
    let out = new_checks().rewrite(&program, &mut messages);
    assert_eq!(out, program);
}
