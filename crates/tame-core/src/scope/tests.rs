use super::*;
use crate::ast::NodeKind;
use crate::parser::parse_program;
use crate::rewrite::messages::{MessageKind, MessageLevel, MessageQueue};

fn program_scope(src: &str) -> (ScopeArena, ScopeId, MessageQueue) {
    let program = parse_program(src).unwrap();
    let mut arena = ScopeArena::new();
    let mut messages = MessageQueue::new();
    let root = arena.from_program(&program, &mut messages);
    (arena, root, messages)
}

#[test]
fn test_free_variables_become_imports() {
    let (arena, root, _mq) = program_scope("var x = 1; y(x);");
    assert!(arena.is_imported(root, "y"));
    assert!(!arena.is_imported(root, "x"));
    assert_eq!(arena.imported_variables(root), vec!["y".to_string()]);
}

#[test]
fn test_property_names_are_not_variable_uses() {
    let (arena, root, _mq) = program_scope("var a = 1; a.length;");
    assert!(!arena.is_imported(root, "length"));
}

#[test]
fn test_free_variable_inside_nested_function() {
    let (arena, root, _mq) = program_scope("function f(a) { return a + b; }");
    assert!(arena.is_imported(root, "b"));
    assert!(!arena.is_imported(root, "a"));
    assert!(arena.is_declared_function(root, "f"));
}

#[test]
fn test_function_scope_binds_formals_and_self_name() {
    let program = parse_program("function f(a) { var c = a; return g(c); }").unwrap();
    let ctor = program.children[0].children[1].clone();
    let mut arena = ScopeArena::new();
    let mut mq = MessageQueue::new();
    let root = arena.from_program(&program, &mut mq);
    let fn_scope = arena.from_function_constructor(root, &ctor, &mut mq);
    assert!(arena.is_declared(fn_scope, "a"));
    assert!(arena.is_declared(fn_scope, "c"));
    assert!(arena.is_declared(fn_scope, "f"));
    assert!(arena.is_imported(fn_scope, "g"));
}

#[test]
fn test_free_this_and_arguments_detection() {
    let program =
        parse_program("function f() { this.x = 1; } function g() { return arguments; }").unwrap();
    let mut arena = ScopeArena::new();
    let mut mq = MessageQueue::new();
    let root = arena.from_program(&program, &mut mq);

    let f_ctor = program.children[0].children[1].clone();
    let f_scope = arena.from_function_constructor(root, &f_ctor, &mut mq);
    assert!(arena.has_free_this(f_scope));
    assert!(!arena.has_free_arguments(f_scope));

    let g_ctor = program.children[1].children[1].clone();
    let g_scope = arena.from_function_constructor(root, &g_ctor, &mut mq);
    assert!(!arena.has_free_this(g_scope));
    assert!(arena.has_free_arguments(g_scope));
}

#[test]
fn test_nested_function_shadows_this_and_arguments() {
    let program = parse_program("function f() { var g = function () { return this; }; }").unwrap();
    let mut arena = ScopeArena::new();
    let mut mq = MessageQueue::new();
    let root = arena.from_program(&program, &mut mq);
    let f_ctor = program.children[0].children[1].clone();
    let f_scope = arena.from_function_constructor(root, &f_ctor, &mut mq);
    // The inner function's receiver use does not leak outward.
    assert!(!arena.has_free_this(f_scope));
}

#[test]
fn test_temp_variables_are_fresh_and_synthetic() {
    let (mut arena, root, _mq) = program_scope("");
    let first = arena.declare_start_of_scope_temp_variable(root);
    let second = arena.declare_start_of_scope_temp_variable(root);
    assert_eq!(first.kind, NodeKind::Identifier("x0___".to_string()));
    assert_eq!(second.kind, NodeKind::Identifier("x1___".to_string()));
    assert!(first.is_synthetic());
    assert!(arena.is_declared(root, "x0___"));
}

#[test]
fn test_take_start_statements_emits_hoisted_declarations_once() {
    let (mut arena, root, _mq) = program_scope("");
    arena.declare_start_of_scope_variable(root, "foo");
    arena.declare_start_of_scope_variable(root, "foo");
    let stmts = arena.take_start_statements(root);
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].kind, NodeKind::Declaration);
    assert_eq!(stmts[0].identifier_name(), Some("foo"));
    // Drained exactly once.
    assert!(arena.take_start_statements(root).is_empty());
}

#[test]
fn test_start_of_scope_statements_hoist_past_blocks() {
    let (mut arena, root, _mq) = program_scope("");
    let block = arena.from_plain_block(root);
    arena.add_start_of_scope_statement(block, crate::ast::Node::noop());
    arena.add_start_of_block_statement(block, crate::ast::Node::noop());
    // The block drains only its own queue; the scope statement surfaced at
    // the program record.
    assert_eq!(arena.take_start_statements(block).len(), 1);
    assert_eq!(arena.take_start_statements(root).len(), 1);
}

#[test]
fn test_is_global_and_is_outer() {
    let program = parse_program("var x = 1; function f(a) { var b = 1; }").unwrap();
    let mut arena = ScopeArena::new();
    let mut mq = MessageQueue::new();
    let root = arena.from_program(&program, &mut mq);
    let ctor = program.children[1].children[1].clone();
    let fn_scope = arena.from_function_constructor(root, &ctor, &mut mq);
    assert!(arena.is_global(root, "x"));
    assert!(arena.is_outer(fn_scope, "x"));
    assert!(!arena.is_outer(fn_scope, "b"));
    assert!(arena.is_outer_scope(root));
    assert!(!arena.is_outer_scope(fn_scope));
}

#[test]
fn test_function_name_masking_by_local() {
    let program = parse_program("function f() {} function g(f) { f(); }").unwrap();
    let mut arena = ScopeArena::new();
    let mut mq = MessageQueue::new();
    let root = arena.from_program(&program, &mut mq);
    assert!(arena.is_function(root, "f"));
    let g_ctor = program.children[1].children[1].clone();
    let g_scope = arena.from_function_constructor(root, &g_ctor, &mut mq);
    // The formal parameter f masks the outer function name.
    assert!(!arena.is_function(g_scope, "f"));
}

#[test]
fn test_catch_scope_binds_exception_and_flags_masking() {
    let program = parse_program("var e = 1; try { f(); } catch (e) { g(); }").unwrap();
    let catch_clause = program.children[1].children[1].clone();
    let mut arena = ScopeArena::new();
    let mut mq = MessageQueue::new();
    let root = arena.from_program(&program, &mut mq);
    let catch_scope = arena.from_catch_stmt(root, &catch_clause, &mut mq);
    assert!(arena.is_declared(catch_scope, "e"));
    assert!(mq
        .iter()
        .any(|m| matches!(m.kind, MessageKind::MaskedVariable { .. })
            && m.level == MessageLevel::Lint));
}

#[test]
fn test_masking_a_reserved_name_is_fatal() {
    let program = parse_program("try { f(); } catch (t___) { g(); }").unwrap();
    let catch_clause = program.children[0].children[1].clone();
    let mut arena = ScopeArena::new();
    let mut mq = MessageQueue::new();
    let root = arena.from_program(&program, &mut mq);
    arena.from_catch_stmt(root, &catch_clause, &mut mq);
    assert!(mq.has_fatal());
    assert!(mq
        .iter()
        .any(|m| matches!(m.kind, MessageKind::CannotMaskReservedName { .. })));
}
