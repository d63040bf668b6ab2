use super::*;
use crate::ast::{Node, NodeKind, ToSource};
use crate::parser::parse_program;
use crate::rewrite::messages::MessageQueue;
use crate::rules::new_compat;
use crate::{rewrite, Dialect};

fn rewrite_compat(src: &str) -> (Node, MessageQueue) {
    let program = parse_program(src).unwrap_or_else(|e| panic!("parse failed for {src:?}: {e}"));
    let mut messages = MessageQueue::new();
    let out = new_compat().rewrite(&program, &mut messages);
    (out, messages)
}

#[test]
fn test_module_preamble_binds_outers() {
    let (out, messages) = rewrite_compat("");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("var $dis = $v.getOuters();"), "{rendered}");
    assert!(rendered.contains("$v.initOuter('onerror');"), "{rendered}");
}

#[test]
fn test_top_level_this_becomes_dis() {
    let (out, messages) = rewrite_compat("this;");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("$dis;"));
}

#[test]
fn test_undeclared_assignment_goes_through_outers() {
    let (out, messages) = rewrite_compat("x = 1;");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("$v.so('x', 1)"));
}

#[test]
fn test_outer_declaration_and_read() {
    let (out, messages) = rewrite_compat("var y = 2; y;");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("$v.so('y', 2)"), "{rendered}");
    assert!(rendered.contains("$v.ro('y')"), "{rendered}");
}

#[test]
fn test_bare_outer_declaration() {
    let (out, messages) = rewrite_compat("var z;");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("$v.initOuter('z')"));
}

#[test]
fn test_local_variables_stay_plain() {
    let (out, messages) = rewrite_compat("function f() { var a = 1; a = 2; return a; }");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let rendered = out.to_source();
    assert!(rendered.contains("var a = 1"), "{rendered}");
    assert!(rendered.contains("a = 2"), "{rendered}");
}

#[test]
fn test_functions_become_disfunctions() {
    let (out, messages) = rewrite_compat("var f = function (a) { return a; };");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("$v.dis(function ($dis, a)"), "{rendered}");
}

#[test]
fn test_named_function_declaration_initializes_outer() {
    let (out, messages) = rewrite_compat("function f(a) { return a; }");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("$v.so('f', $v.dis(function ($dis, a)"), "{rendered}");
}

#[test]
fn test_property_access_routes_through_broker() {
    let (out, messages) = rewrite_compat("function f(o) { return o.p; }");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("$v.r(o, 'p')"));
}

#[test]
fn test_property_write_and_calls() {
    let (out, messages) = rewrite_compat("function f(o, k) { o.p = 1; o.m(2); o[k](3); g(4); }");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let rendered = out.to_source();
    assert!(rendered.contains("$v.s(o, 'p', 1)"), "{rendered}");
    assert!(rendered.contains("$v.cm(o, 'm', [2])"), "{rendered}");
    assert!(rendered.contains("$v.cm(o, k, [3])"), "{rendered}");
    assert!(rendered.contains("$v.cf($v.ro('g'), [4])"), "{rendered}");
}

#[test]
fn test_construction_routes_through_broker() {
    let (out, messages) = rewrite_compat("function f(C) { return new C(1); }");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("$v.construct(C, [1])"));
}

#[test]
fn test_arguments_skip_the_dis_slot() {
    let (out, messages) = rewrite_compat("var f = function () { return arguments; };");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("Array.slice(arguments, 1)"));
}

#[test]
fn test_for_in_iterates_over_keys() {
    let (out, messages) = rewrite_compat("function f(o) { for (var k in o) { k; } }");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let rendered = out.to_source();
    assert!(rendered.contains("$v.keys(o)"), "{rendered}");
}

#[test]
fn test_typeof_undeclared_outer() {
    let (out, messages) = rewrite_compat("typeof q;");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("$v.typeOf($v.ros('q'))"));
}

#[test]
fn test_unquote_strips_the_wrapper_without_expansion() {
    let inner = Node::reference("raw");
    let quoted = Node::new(NodeKind::QuotedExpression, vec![inner.clone()]);
    let chain = new_compat();
    let mut messages = MessageQueue::new();
    let program = parse_program("").unwrap();
    let mut arena = crate::scope::ScopeArena::new();
    let root = arena.from_program(&program, &mut messages);
    let mut cx = crate::rewrite::Context {
        scopes: &mut arena,
        messages: &mut messages,
    };
    let out = chain.expand(&quoted, Some(root), &mut cx);
    assert_eq!(out, inner);
}

#[test]
fn test_compat_output_survives_the_strict_pass() {
    let program = parse_program("x = 1; this.y = 2;").unwrap();
    let mut messages = MessageQueue::new();
    let out = rewrite(&program, Dialect::Compat, &mut messages);
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let rendered = out.to_source();
    // The outers broker itself is now an import of the strict module.
    assert!(rendered.contains("___.readImport(IMPORTS___, '$v')"), "{rendered}");
}
