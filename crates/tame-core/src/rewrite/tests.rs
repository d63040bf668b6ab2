use super::messages::{MessageKind, MessageQueue};
use super::*;
use crate::ast::{Node, NodeKind};
use crate::parser::parse_program;
use crate::scope::ScopeArena;

fn fire_mark_first(
    _rule: &Rule,
    node: &Node,
    _scope: Option<crate::scope::ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    if node.is_reference() {
        return Some(Node::reference("first"));
    }
    None
}

fn fire_mark_second(
    _rule: &Rule,
    node: &Node,
    _scope: Option<crate::scope::ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    if node.is_reference() {
        return Some(Node::reference("second"));
    }
    None
}

fn fire_reject_with(
    rule: &Rule,
    node: &Node,
    _scope: Option<crate::scope::ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    if node.kind == NodeKind::WithStmt {
        cx.messages
            .add(MessageKind::WithBlocksNotAllowed, node.pos, Some(rule.name));
        return Some(node.clone());
    }
    None
}

fn fire_recurse_all(
    _rule: &Rule,
    node: &Node,
    scope: Option<crate::scope::ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    Some(rw.expand_all(node, scope, cx))
}

fn run(rewriter: &Rewriter, node: &Node) -> (Node, MessageQueue) {
    let mut messages = MessageQueue::new();
    let out = rewriter.rewrite(node, &mut messages);
    (out, messages)
}

#[test]
fn test_first_match_wins() {
    let chain = Rewriter::new(
        "test",
        vec![
            Rule::new("first", None, fire_mark_first),
            Rule::new("second", None, fire_mark_second),
            Rule::new("recurse", None, fire_recurse_all),
        ],
    );
    let program = parse_program("x;").unwrap();
    let (out, messages) = run(&chain, &program);
    assert!(!messages.has_fatal());
    assert!(out.children[0].children[0].is_reference_to("first"));
}

#[test]
fn test_rule_order_is_significant() {
    let chain = Rewriter::new(
        "test",
        vec![
            Rule::new("second", None, fire_mark_second),
            Rule::new("first", None, fire_mark_first),
            Rule::new("recurse", None, fire_recurse_all),
        ],
    );
    let program = parse_program("x;").unwrap();
    let (out, _messages) = run(&chain, &program);
    assert!(out.children[0].children[0].is_reference_to("second"));
}

#[test]
fn test_unmatched_node_is_an_internal_error() {
    let chain = Rewriter::new("test", vec![Rule::new("first", None, fire_mark_first)]);
    let program = parse_program("1;").unwrap();
    let (out, messages) = run(&chain, &program);
    // The node is returned unchanged and a distinct internal error is
    // recorded.
    assert_eq!(out, program);
    assert!(messages.has_fatal());
    assert!(messages
        .iter()
        .any(|m| m.kind.is_internal()
            && matches!(m.kind, MessageKind::UnmatchedNodeLeftOver { .. })));
}

#[test]
fn test_rejection_returns_original_and_records_fatal() {
    let chain = Rewriter::new(
        "test",
        vec![
            Rule::new("with", None, fire_reject_with),
            Rule::new("recurse", None, fire_recurse_all),
        ],
    );
    let program = parse_program("with (x) { y; }").unwrap();
    let (out, messages) = run(&chain, &program);
    assert_eq!(out, program);
    assert!(messages.has_fatal());
    assert_eq!(messages.len(), 1);
    assert_eq!(messages.messages()[0].rule, Some("with"));
}

#[test]
fn test_expand_all_rebuilds_same_kind() {
    let chain = Rewriter::new(
        "test",
        vec![
            Rule::new("first", None, fire_mark_first),
            Rule::new("recurse", None, fire_recurse_all),
        ],
    );
    let program = parse_program("f(a, b);").unwrap();
    let (out, _messages) = run(&chain, &program);
    let call = &out.children[0].children[0];
    assert_eq!(call.kind, program.children[0].children[0].kind);
    assert_eq!(call.children.len(), 3);
    // Every reference, including the callee, went through the first rule.
    assert!(call.children[0].is_reference_to("first"));
    assert!(call.children[2].is_reference_to("first"));
}

#[test]
#[should_panic(expected = "duplicate rule name")]
fn test_duplicate_rule_names_are_rejected() {
    Rewriter::new(
        "test",
        vec![
            Rule::new("dup", None, fire_mark_first),
            Rule::new("dup", None, fire_mark_second),
        ],
    );
}

#[test]
fn test_match_node_uses_declared_pattern() {
    fn fire_pattern(
        rule: &Rule,
        node: &Node,
        _scope: Option<crate::scope::ScopeId>,
        _rw: &Rewriter,
        _cx: &mut Context,
    ) -> Option<Node> {
        let bindings = rule.match_node(node)?;
        Some(bindings["x"].clone())
    }
    let chain = Rewriter::new(
        "test",
        vec![
            Rule::new("unwrapAdd", Some("@x + 0"), fire_pattern),
            Rule::new("recurse", None, fire_recurse_all),
        ],
    );
    let program = parse_program("y + 0;").unwrap();
    let mut scopes = ScopeArena::new();
    let mut messages = MessageQueue::new();
    let mut cx = Context {
        scopes: &mut scopes,
        messages: &mut messages,
    };
    let out = chain.expand(&program.children[0].children[0], None, &mut cx);
    assert!(out.is_reference_to("y"));
}
