use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::ast::{Node, NodeKind, Op};
use crate::parser::parse_program;

fn expr(src: &str) -> Node {
    let program = parse_program(src).unwrap();
    program.children[0].children[0].clone()
}

fn stmt(src: &str) -> Node {
    parse_program(src).unwrap().children.into_iter().next().unwrap()
}

#[test]
fn test_simple_expression_match() {
    let bindings = QuasiBuilder::match_text("@x + @y", &expr("1 + f(2);")).unwrap();
    assert_eq!(bindings["x"].kind, NodeKind::LitNum(1.0));
    assert_eq!(bindings["y"].kind, NodeKind::Operation(Op::Call));
}

#[test]
fn test_structural_mismatch() {
    assert!(QuasiBuilder::match_text("@x + @y", &expr("1 - 2;")).is_none());
}

#[test]
fn test_repeated_hole_requires_deep_equality() {
    // The same hole name in two positions matches only identical subtrees.
    assert!(QuasiBuilder::match_text("@x.@p = @x.@p", &expr("a.b = a.b;")).is_some());
    assert!(QuasiBuilder::match_text("@x.@p = @x.@p", &expr("a.b = c.b;")).is_none());
    assert!(QuasiBuilder::match_text("@x.@p = @x.@p", &expr("a.b = a.c;")).is_none());
}

#[test]
fn test_zero_or_more_matches_empty_run() {
    let bindings = QuasiBuilder::match_text("{@ss*;}", &stmt("{ }")).unwrap();
    assert_eq!(bindings["ss"].kind, NodeKind::List);
    assert!(bindings["ss"].children.is_empty());
}

#[test]
fn test_one_or_more_rejects_empty_run() {
    assert!(QuasiBuilder::match_text("{@ss+;}", &stmt("{ }")).is_none());
    let bindings = QuasiBuilder::match_text("{@ss+;}", &stmt("{ f(); g(); }")).unwrap();
    assert_eq!(bindings["ss"].children.len(), 2);
}

#[test]
fn test_optional_hole_absence_still_matches() {
    let bindings = QuasiBuilder::match_text("var @v = @initial?;", &stmt("var x;")).unwrap();
    assert_eq!(bindings["v"].identifier_name(), Some("x"));
    assert!(bindings.get("initial").is_none());

    let bindings = QuasiBuilder::match_text("var @v = @initial?;", &stmt("var x = 1;")).unwrap();
    assert_eq!(bindings["initial"].kind, NodeKind::LitNum(1.0));
}

#[test]
fn test_optional_hole_substitutes_to_nothing_when_unbound() {
    let mut bindings = Bindings::new();
    bindings.insert("pattern".to_string(), Node::string_lit("a+"));
    let built = QuasiBuilder::subst("new ___.RegExp(@pattern, @modifiers?)", &bindings);
    // Only the pattern argument is present.
    assert_eq!(built.kind, NodeKind::Operation(Op::New));
    assert_eq!(built.children.len(), 2);
}

#[test]
fn test_call_arguments_bind_as_container() {
    let bindings = QuasiBuilder::match_text("@o.@m(@args*)", &expr("a.b(1, 2);")).unwrap();
    assert!(bindings["o"].is_reference_to("a"));
    assert!(bindings["m"].is_reference_to("b"));
    assert_eq!(bindings["args"].children.len(), 2);
}

#[test]
fn test_round_trip_substitution_without_holes() {
    let specimen = expr("a.b(1);");
    let pattern = QuasiBuilder::compile("a.b(1)").unwrap();
    let bindings = pattern.match_here(&specimen).unwrap();
    assert!(bindings.is_empty());
    assert_eq!(pattern.substitute(&bindings).unwrap(), specimen);
}

#[test]
fn test_round_trip_substitution_with_holes() {
    let specimen = expr("a.b(1, c);");
    let pattern = QuasiBuilder::compile("@o.@m(@args*)").unwrap();
    let bindings = pattern.match_here(&specimen).unwrap();
    assert_eq!(pattern.substitute(&bindings).unwrap(), specimen);
}

#[test]
fn test_multi_hole_splices_flat() {
    let mut bindings = Bindings::new();
    bindings.insert(
        "ss".to_string(),
        Node::list(vec![stmt("f();"), stmt("g();")]),
    );
    let built = QuasiBuilder::subst("{@ss*;}", &bindings);
    assert_eq!(built.kind, NodeKind::Block);
    assert_eq!(built.children.len(), 2);
}

#[test]
fn test_suffix_hole_binds_the_identifier() {
    let bindings = QuasiBuilder::match_text("@v__", &expr("x__;")).unwrap();
    assert_eq!(bindings["v"].kind, NodeKind::Identifier("x__".to_string()));
    // A single trailing underscore does not satisfy the double-underscore
    // constraint.
    assert!(QuasiBuilder::match_text("@v__", &expr("x_;")).is_none());
}

#[test]
fn test_member_suffix_hole() {
    assert!(QuasiBuilder::match_text("@x.@p__", &expr("a.b__;")).is_some());
    assert!(QuasiBuilder::match_text("@x.@p__", &expr("a.b;")).is_none());
}

#[test]
fn test_statement_hole_binds_any_statement() {
    let bindings = QuasiBuilder::match_text("with (@scope) @body;", &stmt("with (x) { y; }"))
        .unwrap();
    assert_eq!(bindings["body"].kind, NodeKind::Block);
}

#[test]
fn test_object_pair_holes() {
    let bindings =
        QuasiBuilder::match_text("({@keys*: @vals*})", &expr("({a: 1, b: 2});")).unwrap();
    assert_eq!(bindings["keys"].children.len(), 2);
    assert_eq!(bindings["keys"].children[0].kind, NodeKind::LitStr("a".to_string()));
    assert_eq!(bindings["vals"].children[1].kind, NodeKind::LitNum(2.0));

    let rebuilt = QuasiBuilder::subst("({@keys*: @vals*})", &bindings);
    assert_eq!(rebuilt, expr("({a: 1, b: 2});"));
}

#[test]
fn test_search_reports_all_positions_pre_order() {
    let program = parse_program("1 + 2; f(3 + 4);").unwrap();
    let pattern = QuasiBuilder::compile("@x + @y").unwrap();
    let matches = pattern.search(&program);
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].bindings["x"].kind, NodeKind::LitNum(1.0));
    assert_eq!(matches[1].bindings["x"].kind, NodeKind::LitNum(3.0));
}

#[test]
fn test_substituted_pattern_nodes_are_synthetic() {
    let bindings = Bindings::new();
    let built = QuasiBuilder::subst("t___", &bindings);
    assert!(built.is_synthetic());
    assert!(built.children[0].is_synthetic());
}

#[test]
fn test_bound_subtrees_keep_their_flags() {
    let mut bindings = Bindings::new();
    bindings.insert("x".to_string(), expr("a;"));
    let built = QuasiBuilder::subst("@x + 1", &bindings);
    assert!(!built.children[0].is_synthetic());
    assert!(built.is_synthetic());
}

#[test]
fn test_unbound_required_hole_is_an_error() {
    let pattern = QuasiBuilder::compile("@x + @y").unwrap();
    let err = pattern.substitute(&Bindings::new()).unwrap_err();
    assert!(matches!(err, PatternError::UnboundHole { .. }));
}

#[test]
fn test_compiled_patterns_are_cached() {
    let a = QuasiBuilder::compile("@cachedPatternProbe + 1").unwrap();
    let b = QuasiBuilder::compile("@cachedPatternProbe + 1").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_malformed_pattern_is_a_compile_error() {
    assert!(QuasiBuilder::compile("var = ;").is_err());
}
