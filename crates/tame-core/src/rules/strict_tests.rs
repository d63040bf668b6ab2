use super::*;
use crate::ast::{Node, NodeKind, Op, ToSource};
use crate::parser::parse_program;
use crate::rewrite::messages::{MessageKind, MessageQueue};
use crate::rewrite::Context;
use crate::rules::new_strict;
use crate::scope::ScopeArena;

fn rewrite_strict(src: &str) -> (Node, MessageQueue) {
    let program = parse_program(src).unwrap_or_else(|e| panic!("parse failed for {src:?}: {e}"));
    let mut messages = MessageQueue::new();
    let out = new_strict().rewrite(&program, &mut messages);
    (out, messages)
}

fn count_kind(messages: &MessageQueue, want: &MessageKind) -> usize {
    messages.iter().filter(|m| m.kind == *want).count()
}

fn count_nodes(root: &Node, pred: &dyn Fn(&Node) -> bool) -> usize {
    let mut count = 0;
    root.walk_pre_order(&mut |node| {
        if pred(node) {
            count += 1;
        }
        true
    });
    count
}

#[test]
fn test_with_statement_is_rejected_once() {
    let (out, messages) = rewrite_strict("with (x) { y; }");
    assert!(messages.has_fatal());
    assert_eq!(count_kind(&messages, &MessageKind::WithBlocksNotAllowed), 1);
    // The construct survives structurally for diagnosis.
    assert_eq!(
        count_nodes(&out, &|n| n.kind == NodeKind::WithStmt),
        1
    );
}

#[test]
fn test_reserved_suffix_reference_is_rejected() {
    let (_out, messages) = rewrite_strict("x__;");
    assert!(messages.has_fatal());
    assert!(count_kind(&messages, &MessageKind::VariablesCannotEndInDoubleUnderscore) >= 1);
}

#[test]
fn test_reserved_suffix_declaration_is_rejected() {
    let (_out, messages) = rewrite_strict("var x__ = 1;");
    assert!(messages.has_fatal());
}

#[test]
fn test_multi_declaration_preserves_order_and_values() {
    let (out, messages) = rewrite_strict("var x = 3, y = x + 1;");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    assert!(out.to_source().contains("var x = 3, y = x + 1;"));
}

#[test]
fn test_free_variables_are_imported() {
    let (out, messages) = rewrite_strict("y;");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("___.readImport(IMPORTS___, 'y')"), "{rendered}");
}

#[test]
fn test_this_at_top_level_is_fatal() {
    let (_out, messages) = rewrite_strict("this;");
    assert_eq!(count_kind(&messages, &MessageKind::ThisInGlobalContext), 1);
}

#[test]
fn test_nested_function_declaration_hoists_once() {
    let (out, messages) = rewrite_strict("{ function foo() {} }");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    // Exactly one hoisted declaration of foo, at the top of the module.
    let decls = count_nodes(&out, &|n| {
        n.kind == NodeKind::Declaration && n.identifier_name() == Some("foo") && n.children.len() == 1
    });
    assert_eq!(decls, 1);
    assert_eq!(out.children[0].identifier_name(), Some("foo"));
    // The block re-initializes the name; no function declaration survives.
    let rendered = out.to_source();
    assert!(rendered.contains("foo = ___.simpleFunc("), "{rendered}");
    assert_eq!(
        count_nodes(&out, &|n| n.kind == NodeKind::FunctionDeclaration),
        0
    );
}

#[test]
fn test_property_read_routes_through_runtime() {
    let (out, messages) = rewrite_strict("a.b;");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("___.readPub("), "{rendered}");
    assert!(rendered.contains("b_canRead___"), "{rendered}");
    // The temporary pinning the receiver was hoisted.
    assert!(rendered.contains("var x0___;"), "{rendered}");
}

#[test]
fn test_internal_read_uses_protected_flavor() {
    let (out, messages) = rewrite_strict("function f() { return this.p; }");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let rendered = out.to_source();
    assert!(rendered.contains("___.readProp(t___, 'p')"), "{rendered}");
    assert!(rendered.contains("var t___ = this;"), "{rendered}");
}

#[test]
fn test_property_write_routes_through_runtime() {
    let (out, messages) = rewrite_strict("var o = 1; o.x = 2;");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("___.setPub("), "{rendered}");
    assert!(rendered.contains("x_canSet___"), "{rendered}");
}

#[test]
fn test_indexed_access() {
    let (out, messages) = rewrite_strict("var o = 1, k = 2; o[k]; o[k] = 3;");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("___.readPub(o, k)"), "{rendered}");
    assert!(rendered.contains("___.setPub(o, k, 3)"), "{rendered}");
}

#[test]
fn test_delete_property() {
    let (out, messages) = rewrite_strict("var o = 1; delete o.p;");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("___.deletePub(o, 'p')"));
}

#[test]
fn test_delete_of_value_of_is_rejected() {
    let (_out, messages) = rewrite_strict("var o = 1; delete o.valueOf;");
    assert_eq!(
        count_kind(&messages, &MessageKind::ValueOfPropertyMustNotBeDeleted),
        1
    );
}

#[test]
fn test_delete_of_variable_is_rejected() {
    let (_out, messages) = rewrite_strict("var x = 1; delete x;");
    assert_eq!(count_kind(&messages, &MessageKind::NotDeletable), 1);
}

#[test]
fn test_assignment_to_value_of_is_rejected() {
    let (_out, messages) = rewrite_strict("var o = 1; o.valueOf = 2;");
    assert_eq!(count_kind(&messages, &MessageKind::ValueOfPropertyMustNotBeSet), 1);
}

#[test]
fn test_assignment_to_free_variable_is_rejected() {
    let (_out, messages) = rewrite_strict("y = 1;");
    assert_eq!(count_kind(&messages, &MessageKind::CannotAssignToFreeVariable), 1);
}

#[test]
fn test_assignment_to_function_name_is_rejected() {
    let (_out, messages) = rewrite_strict("function foo() {} foo = 1;");
    assert_eq!(count_kind(&messages, &MessageKind::CannotAssignToFunctionName), 1);
}

#[test]
fn test_escaping_function_name_is_frozen() {
    let (out, messages) = rewrite_strict("function foo() {} foo;");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("___.primFreeze(foo)"));
}

#[test]
fn test_method_call_uses_call_flavors() {
    let (out, messages) = rewrite_strict("var o = 1; o.m(2);");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("m_canCall___"), "{rendered}");
    assert!(rendered.contains("___.callPub("), "{rendered}");
}

#[test]
fn test_plain_call_is_wrapped() {
    let (out, messages) = rewrite_strict("var f = 1; f(2);");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("___.asSimpleFunc(f)(2)"));
}

#[test]
fn test_new_routes_through_as_ctor() {
    let (out, messages) = rewrite_strict("var C = 1; new C(1);");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("new (___.asCtor(C))(1)"));
}

#[test]
fn test_object_literal_is_initialized_via_runtime() {
    let (out, messages) = rewrite_strict("var m = {a: 1};");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("___.initializeMap(['a', 1])"));
}

#[test]
fn test_object_literal_reserved_keys_rejected() {
    let (_out, messages) = rewrite_strict("var m = {a_: 1};");
    assert_eq!(count_kind(&messages, &MessageKind::KeyMayNotEndInUnderscore), 1);

    let (_out, messages) = rewrite_strict("var m = {valueOf: 1};");
    assert_eq!(count_kind(&messages, &MessageKind::ValueOfPropertyMustNotBeSet), 1);
}

#[test]
fn test_try_catch_tames_exceptions() {
    let (out, messages) = rewrite_strict("try { f(); } catch (e) { e; }");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let rendered = out.to_source();
    assert!(rendered.contains("___.tameException(ex___)"), "{rendered}");
    assert!(rendered.contains("catch (ex___)"), "{rendered}");
}

#[test]
fn test_for_in_guards_enumeration() {
    let (out, messages) = rewrite_strict("var o = 1; for (var k in o) { k; }");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let rendered = out.to_source();
    assert!(rendered.contains("___.canEnumPub("), "{rendered}");
    assert!(rendered.contains("var k;"), "{rendered}");
}

#[test]
fn test_arguments_snapshot_at_function_head() {
    let (out, messages) = rewrite_strict("function f() { return arguments; }");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("var a___ = ___.args(arguments);"), "{rendered}");
    assert!(rendered.contains("return a___;"), "{rendered}");
}

#[test]
fn test_simple_increment_is_preserved() {
    let (out, messages) = rewrite_strict("var i = 0; i++;");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("i++"));
}

#[test]
fn test_compound_assignment_decomposes() {
    let (out, messages) = rewrite_strict("var o = 1; o.x += 2;");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("___.setPub(o, 'x'"), "{rendered}");
    assert!(rendered.contains("___.readPub(o, 'x')"), "{rendered}");
}

#[test]
fn test_constructor_function_is_split() {
    let (out, messages) = rewrite_strict("function Point(x) { this.x = x; }");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let rendered = out.to_source();
    assert!(rendered.contains("___.splitCtor("), "{rendered}");
    assert!(rendered.contains("Point_init___"), "{rendered}");
}

#[test]
fn test_anonymous_function_with_receiver_is_rejected() {
    let (_out, messages) = rewrite_strict("var f = function () { return this.x; };");
    assert_eq!(
        count_kind(&messages, &MessageKind::AnonymousFunctionReferencesThis),
        1
    );
}

#[test]
fn test_prototype_member_becomes_set_member() {
    let (out, messages) =
        rewrite_strict("function Point(x) { this.x = x; } Point.prototype.norm = function () { return this.x; };");
    assert!(!messages.has_fatal(), "{:?}", messages.messages());
    let rendered = out.to_source();
    assert!(rendered.contains("___.setMember(Point, 'norm'"), "{rendered}");
    assert!(rendered.contains("___.method(function ("), "{rendered}");
}

#[test]
fn test_labeled_statement_with_reserved_label() {
    let (_out, messages) = rewrite_strict("bad__: while (true) { break bad__; }");
    assert!(messages
        .iter()
        .any(|m| matches!(m.kind, MessageKind::LabelsCannotEndInDoubleUnderscore { .. })));
}

#[test]
fn test_regex_literal_is_reinstantiated() {
    let (out, messages) = rewrite_strict("var r = /a+/g;");
    assert!(!messages.has_fatal());
    assert!(out.to_source().contains("new ___.RegExp('a+', 'g')"));
}

#[test]
fn test_typeof_in_and_comma_forward() {
    let (out, messages) = rewrite_strict("var a = 1, b = 2; typeof a; 'x' in b; (a, b);");
    assert!(!messages.has_fatal());
    let rendered = out.to_source();
    assert!(rendered.contains("typeof a"), "{rendered}");
    assert!(rendered.contains("___.canReadPubRev('x', b)"), "{rendered}");
}

#[test]
fn test_synthetic_pass_through_is_idempotent() {
    let mut arena = ScopeArena::new();
    let mut messages = MessageQueue::new();
    let empty = parse_program("").unwrap();
    let root = arena.from_program(&empty, &mut messages);
    let chain = new_strict();

    // A synthetic assignment to a reserved-suffix temporary, as produced by
    // the engine's own substitutions.
    let assignment = Node::operation(
        Op::Assign,
        vec![
            Node::reference_to(Node::ident("x0___").synthetic()).synthetic(),
            Node::num_lit(1.0),
        ],
    )
    .synthetic();

    let mut cx = Context {
        scopes: &mut arena,
        messages: &mut messages,
    };
    let once = chain.expand(&assignment, Some(root), &mut cx);
    let twice = chain.expand(&once, Some(root), &mut cx);
    assert_eq!(once, assignment);
    assert_eq!(twice, once);
    assert!(!cx.messages.has_fatal());
}

#[test]
fn test_rewrite_collects_multiple_violations() {
    let (_out, messages) = rewrite_strict("with (a) { b; } x__; y = 1;");
    assert_eq!(count_kind(&messages, &MessageKind::WithBlocksNotAllowed), 1);
    assert!(count_kind(&messages, &MessageKind::VariablesCannotEndInDoubleUnderscore) >= 1);
    assert_eq!(count_kind(&messages, &MessageKind::CannotAssignToFreeVariable), 1);
}
