use super::*;
use crate::ast::{Node, NodeKind, Op};

fn parse(src: &str) -> Node {
    parse_program(src).unwrap_or_else(|e| panic!("parse failed for {src:?}: {e}"))
}

fn first_stmt(src: &str) -> Node {
    parse(src).children.into_iter().next().expect("no statements")
}

fn first_expr(src: &str) -> Node {
    let stmt = first_stmt(src);
    assert_eq!(stmt.kind, NodeKind::ExpressionStmt, "not an expression statement");
    stmt.children.into_iter().next().unwrap()
}

#[test]
fn test_parse_var_declaration() {
    let decl = first_stmt("var x = 3;");
    assert_eq!(decl.kind, NodeKind::Declaration);
    assert_eq!(decl.children[0].kind, NodeKind::Identifier("x".to_string()));
    assert_eq!(decl.children[1].kind, NodeKind::LitNum(3.0));
}

#[test]
fn test_parse_multi_declaration() {
    let decl = first_stmt("var x = 3, y, z = 4;");
    assert_eq!(decl.kind, NodeKind::MultiDeclaration);
    assert_eq!(decl.children.len(), 3);
    assert_eq!(decl.children[1].children.len(), 1); // y has no initializer
}

#[test]
fn test_member_access_shape() {
    let expr = first_expr("a.b.c;");
    // (a.b).c with the property as a Reference
    assert_eq!(expr.kind, NodeKind::Operation(Op::Member));
    assert_eq!(expr.children[1].identifier_name(), Some("c"));
    assert_eq!(expr.children[0].kind, NodeKind::Operation(Op::Member));
}

#[test]
fn test_index_access() {
    let expr = first_expr("a[b + 1];");
    assert_eq!(expr.kind, NodeKind::Operation(Op::Index));
    assert_eq!(expr.children[1].kind, NodeKind::Operation(Op::Add));
}

#[test]
fn test_call_arguments() {
    let expr = first_expr("f(1, x, 'y');");
    assert_eq!(expr.kind, NodeKind::Operation(Op::Call));
    assert_eq!(expr.children.len(), 4);
    assert!(expr.children[0].is_reference_to("f"));
}

#[test]
fn test_new_with_and_without_args() {
    let with_args = first_expr("new Foo(1);");
    assert_eq!(with_args.kind, NodeKind::Operation(Op::New));
    assert_eq!(with_args.children.len(), 2);

    let without = first_expr("new Foo;");
    assert_eq!(without.kind, NodeKind::Operation(Op::New));
    assert_eq!(without.children.len(), 1);
}

#[test]
fn test_operator_precedence() {
    let expr = first_expr("1 + 2 * 3;");
    assert_eq!(expr.kind, NodeKind::Operation(Op::Add));
    assert_eq!(expr.children[1].kind, NodeKind::Operation(Op::Mul));
}

#[test]
fn test_assignment_is_right_associative() {
    let expr = first_expr("a = b = 1;");
    assert_eq!(expr.kind, NodeKind::Operation(Op::Assign));
    assert_eq!(expr.children[1].kind, NodeKind::Operation(Op::Assign));
}

#[test]
fn test_this_is_a_plain_reference() {
    let expr = first_expr("this;");
    assert!(expr.is_reference_to("this"));
}

#[test]
fn test_for_in_with_declaration() {
    let stmt = first_stmt("for (var k in o) { k; }");
    assert_eq!(stmt.kind, NodeKind::ForEachLoop);
    assert_eq!(stmt.children[0].kind, NodeKind::Declaration);
}

#[test]
fn test_for_in_with_expression_key() {
    let stmt = first_stmt("for (k in o) { }");
    assert_eq!(stmt.kind, NodeKind::ForEachLoop);
    assert_eq!(stmt.children[0].kind, NodeKind::ExpressionStmt);
}

#[test]
fn test_plain_for_loop() {
    let stmt = first_stmt("for (var i = 0; i < 10; i++) { }");
    assert_eq!(stmt.kind, NodeKind::ForLoop);
    assert_eq!(stmt.children.len(), 4);
}

#[test]
fn test_in_operator_outside_for() {
    let expr = first_expr("'x' in o;");
    assert_eq!(expr.kind, NodeKind::Operation(Op::In));
}

#[test]
fn test_try_catch_finally_shape() {
    let stmt = first_stmt("try { f(); } catch (e) { g(); } finally { h(); }");
    assert_eq!(stmt.kind, NodeKind::TryStmt);
    assert_eq!(stmt.children.len(), 3);
    assert_eq!(stmt.children[1].kind, NodeKind::CatchClause);
    assert_eq!(stmt.children[1].children[0].identifier_name(), Some("e"));
    assert_eq!(stmt.children[2].kind, NodeKind::FinallyClause);
}

#[test]
fn test_with_statement() {
    let stmt = first_stmt("with (x) { y; }");
    assert_eq!(stmt.kind, NodeKind::WithStmt);
}

#[test]
fn test_labeled_statement() {
    let stmt = first_stmt("loop: while (true) { break loop; }");
    assert_eq!(stmt.kind, NodeKind::LabeledStmt("loop".to_string()));
    let body = &stmt.children[0].children[1];
    assert_eq!(body.children[0].kind, NodeKind::BreakStmt("loop".to_string()));
}

#[test]
fn test_object_literal_keys_normalize_to_strings() {
    let expr = first_expr("({a: 1, 'b': 2});");
    assert_eq!(expr.kind, NodeKind::ObjectCtor);
    assert_eq!(expr.children[0].kind, NodeKind::LitStr("a".to_string()));
    assert_eq!(expr.children[2].kind, NodeKind::LitStr("b".to_string()));
}

#[test]
fn test_function_expression_and_declaration() {
    let decl = first_stmt("function f(a, b) { return a; }");
    assert_eq!(decl.kind, NodeKind::FunctionDeclaration);
    let ctor = &decl.children[1];
    assert_eq!(ctor.children[1].children.len(), 2);

    let expr = first_expr("(function (a) { return a; });");
    assert_eq!(expr.kind, NodeKind::FunctionConstructor);
    assert_eq!(expr.children[0].identifier_name(), Some(""));
}

#[test]
fn test_anonymous_function_declaration_is_rejected() {
    assert!(parse_program("function () { }").is_err());
}

#[test]
fn test_regex_literal_vs_division() {
    let expr = first_expr("a / b;");
    assert_eq!(expr.kind, NodeKind::Operation(Op::Div));

    let regex = first_expr("x = /ab+c/g;");
    assert_eq!(
        regex.children[1].kind,
        NodeKind::LitRegex {
            body: "ab+c".to_string(),
            flags: "g".to_string()
        }
    );
}

#[test]
fn test_comments_are_skipped() {
    let program = parse("// line\n/* block */ var x = 1;");
    assert_eq!(program.children.len(), 1);
}

#[test]
fn test_semicolon_elision_before_brace_and_eof() {
    let program = parse("{ x }\ny");
    assert_eq!(program.children.len(), 2);
}

#[test]
fn test_quasi_holes_rejected_outside_quasi_mode() {
    assert!(parse_program("@x;").is_err());
}

#[test]
fn test_quasi_holes_parse_in_quasi_mode() {
    let program = parse_quasi_program("@x + @y*;").unwrap();
    let expr = &program.children[0].children[0];
    assert_eq!(expr.kind, NodeKind::Operation(Op::Add));
    assert_eq!(expr.children[0].identifier_name(), Some("@x"));
    assert_eq!(expr.children[1].identifier_name(), Some("@y*"));
}

#[test]
fn test_adversarial_nesting_is_bounded() {
    let src = format!("{}1{};", "(".repeat(1000), ")".repeat(1000));
    assert!(matches!(
        parse_program(&src),
        Err(ParseError::NestingTooDeep { .. })
    ));
}

#[test]
fn test_positions_are_tracked() {
    let stmt = first_stmt("\n  x;");
    assert_eq!(stmt.pos.line, 2);
    assert_eq!(stmt.pos.column, 3);
}

#[test]
fn test_ternary_and_comma() {
    let expr = first_expr("a ? b : c, d;");
    assert_eq!(expr.kind, NodeKind::Operation(Op::Comma));
    assert_eq!(expr.children[0].kind, NodeKind::Operation(Op::Ternary));
}
