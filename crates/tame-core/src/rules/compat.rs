// The legacy-compat dialect chain. It tolerates constructs the strict
// dialect rejects outright (top-level receiver use, undeclared outer
// variables, constructors invoked as values) by routing them through the
// `$v` outers broker, and its output is meant to be run through the strict
// chain afterwards. Shares the synthetic pass-through family and block
// hoisting with the strict chain.

use crate::ast::{Node, NodeKind};
use crate::quasi::QuasiBuilder;
use crate::rewrite::messages::MessageKind;
use crate::rewrite::{
    check_formals, function_head_declarations, ident_is_synthetic, new_comma_operation,
    to_string_literal, Context, Rewriter, Rule,
};
use crate::scope::ScopeId;
use crate::substv;

use super::strict::{
    fire_block, fire_synthetic_calls, fire_synthetic_catches, fire_synthetic_declaration,
    fire_synthetic_deletes, fire_synthetic_fn_declaration, fire_synthetic_reads,
    fire_synthetic_reference, fire_synthetic_set_member,
};

pub fn new_compat() -> Rewriter {
    Rewriter::new("compat", compat_rules())
}

pub fn compat_rules() -> Vec<Rule> {
    vec![
        Rule::new("syntheticReference", None, fire_synthetic_reference),
        Rule::new("syntheticCalls", Some("@o.@m(@args*)"), fire_synthetic_calls),
        Rule::new("syntheticDeletes", Some("delete @o.@m"), fire_synthetic_deletes),
        Rule::new("syntheticReads", Some("@o.@m"), fire_synthetic_reads),
        Rule::new("syntheticSetMember", Some("@o.@m = @v"), fire_synthetic_set_member),
        Rule::new("syntheticSetVar", Some("@lhs = @rhs"), fire_synthetic_set_var),
        Rule::new(
            "syntheticDeclaration",
            Some("var @v = @initial?;"),
            fire_synthetic_declaration,
        ),
        Rule::new("syntheticFnDeclaration", None, fire_synthetic_fn_declaration),
        Rule::new(
            "syntheticCatches1",
            Some("try { @body*; } catch (@ex___) { @handler*; }"),
            fire_synthetic_catches,
        ),
        Rule::new(
            "syntheticCatches2",
            Some("try { @body*; } catch (@ex___) { @handler*; } finally { @cleanup*; }"),
            fire_synthetic_catches,
        ),
        Rule::new("module", None, fire_module),
        Rule::new("block", None, fire_block),
        Rule::new("foreachExpr", Some("for (@k in @o) @ss;"), fire_foreach_expr),
        Rule::new("foreach", Some("for (var @k in @o) @ss;"), fire_foreach),
        Rule::new(
            "tryCatch",
            Some("try { @s0*; } catch (@x) { @s1*; }"),
            fire_try_catch,
        ),
        Rule::new(
            "tryCatchFinally",
            Some("try { @s0*; } catch (@x) { @s1*; } finally { @s2*; }"),
            fire_try_catch_finally,
        ),
        Rule::new(
            "tryFinally",
            Some("try { @s0*; } finally { @s1*; }"),
            fire_try_finally,
        ),
        Rule::new("this", Some("this"), fire_this),
        Rule::new("initGlobalVar", Some("var @v = @r"), fire_init_global_var),
        Rule::new("setGlobalVar", Some("@v = @r"), fire_set_global_var),
        Rule::new("declGlobalVar", Some("var @v"), fire_decl_global_var),
        Rule::new("readArguments", Some("arguments"), fire_read_arguments),
        Rule::new("readGlobalVar", Some("@v"), fire_read_global_var),
        Rule::new("initLocalVar", Some("var @v = @r"), fire_init_local_var),
        Rule::new("setLocalVar", Some("@v = @r"), fire_set_local_var),
        Rule::new("readPublic", Some("@o.@p"), fire_read_public),
        Rule::new("readIndexPublic", Some("@o[@p]"), fire_read_index_public),
        Rule::new("setPublic", Some("@o.@p = @r"), fire_set_public),
        Rule::new("setIndexPublic", Some("@o[@p] = @r"), fire_set_index_public),
        Rule::new("construct", Some("new @c(@args*)"), fire_construct),
        Rule::new("callNamed", Some("@o.@p(@args*)"), fire_call_named),
        Rule::new("callMethod", Some("@o[@p](@args*)"), fire_call_method),
        Rule::new("callFunc", Some("@f(@args*)"), fire_call_func),
        Rule::new("disfuncAnon", Some("(function (@ps*) { @bs*; })"), fire_disfunc_anon),
        Rule::new(
            "disfuncNamedDecl",
            Some("(function @fname(@ps*) { @bs*; })"),
            fire_disfunc_named_decl,
        ),
        Rule::new(
            "disfuncNamedValue",
            Some("(function @fname(@ps*) { @bs*; })"),
            fire_disfunc_named_value,
        ),
        Rule::new("multiDeclaration", None, fire_multi_declaration),
        Rule::new("map", Some("({@keys*: @vals*})"), fire_map),
        Rule::new("outerTypeof", Some("typeof @f"), fire_outer_typeof),
        Rule::new("otherTypeof", Some("typeof @f"), fire_other_typeof),
        Rule::new("otherInstanceof", Some("@o instanceof @f"), fire_other_instanceof),
        Rule::new("unquote", None, fire_unquote),
        Rule::new("recurse", None, fire_recurse),
    ]
}

fn fire_synthetic_set_var(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    let lhs = &bindings["lhs"];
    if lhs.is_reference() && ident_is_synthetic(lhs) {
        return Some(rw.expand_all(node, scope, cx));
    }
    None
}

// Assume an imported "$v" that knows our shared outers; bind it to $dis so
// top-level uses of the receiver keyword work.
fn fire_module(
    _rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    if scope.is_some() || node.kind != NodeKind::Block {
        return None;
    }
    let s2 = cx.scopes.from_program(node, cx.messages);
    let expanded: Vec<Node> = node
        .children
        .iter()
        .map(|child| rw.expand(child, Some(s2), cx))
        .collect();
    Some(substv!(
        "var $dis = $v.getOuters(); $v.initOuter('onerror'); @startStmts*; @ss*;",
        startStmts = Node::list(cx.scopes.take_start_statements(s2)),
        ss = Node::list(expanded),
    ))
}

// Get the keys up front, then iterate over them by index.
fn fire_foreach_expr(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    if bindings["k"].kind != NodeKind::ExpressionStmt {
        return None;
    }
    let key = bindings["k"].children[0].clone();
    let t1 = new_temp_var(scope, cx);
    let t2 = new_temp_var(scope, cx);
    let mut assignment = substv!(
        "@k = @t3;",
        k = key,
        t3 = quoted(substv!("@t1[@t2]", t1 = t1.clone(), t2 = t2.clone())),
    );
    assignment.synthetic = false;
    let assign = rw.expand(&assignment, Some(scope), cx);
    Some(substv!(
        "@t1 = $v.keys(@o); for (@t2 = 0; @t2 < @t1.length; ++@t2) { @assign; @ss; }",
        t1 = t1.clone(),
        o = rw.expand(&bindings["o"], Some(scope), cx),
        t2 = t2,
        assign = Node::expr_stmt(assign).synthetic(),
        ss = rw.expand(&bindings["ss"], Some(scope), cx),
    ))
}

fn fire_foreach(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let t1 = new_temp_var(scope, cx);
    let t2 = new_temp_var(scope, cx);
    let mut assignment = substv!(
        "var @k = @t3;",
        k = bindings["k"].clone(),
        t3 = quoted(substv!("@t1[@t2]", t1 = t1.clone(), t2 = t2.clone())),
    );
    assignment.synthetic = false;
    let mut assign = rw.expand(&assignment, Some(scope), cx);
    assign.synthetic = true;
    Some(substv!(
        "@t1 = $v.keys(@o); for (@t2 = 0; @t2 < @t1.length; ++@t2) { @assign; @ss; }",
        t1 = t1.clone(),
        o = rw.expand(&bindings["o"], Some(scope), cx),
        t2 = t2,
        assign = assign,
        ss = rw.expand(&bindings["ss"], Some(scope), cx),
    ))
}

fn fire_try_catch(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let catch_scope = cx.scopes.from_catch_stmt(scope, &node.children[1], cx.messages);
    Some(substv!(
        "try { @s0*; } catch (@x) { @s1*; }",
        s0 = rw.expand(&bindings["s0"], Some(scope), cx),
        x = bindings["x"].clone(),
        s1 = rw.expand(&bindings["s1"], Some(catch_scope), cx),
    ))
}

fn fire_try_catch_finally(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let catch_scope = cx.scopes.from_catch_stmt(scope, &node.children[1], cx.messages);
    Some(substv!(
        "try { @s0*; } catch (@x) { @s1*; } finally { @s2*; }",
        s0 = rw.expand(&bindings["s0"], Some(scope), cx),
        x = bindings["x"].clone(),
        s1 = rw.expand(&bindings["s1"], Some(catch_scope), cx),
        s2 = rw.expand(&bindings["s2"], Some(scope), cx),
    ))
}

fn fire_try_finally(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "try { @s0*; } finally { @s1*; }",
        s0 = rw.expand(&bindings["s0"], Some(scope), cx),
        s1 = rw.expand(&bindings["s1"], Some(scope), cx),
    ))
}

// Every occurrence of the receiver keyword becomes $dis.
fn fire_this(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    Some(QuasiBuilder::subst("$dis", &bindings))
}

fn fire_init_global_var(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let v = bindings["v"].clone();
    let name = v.identifier_name().unwrap_or_default();
    if !cx.scopes.is_outer(scope, name) {
        return None;
    }
    Some(Node::expr_stmt(substv!(
        "$v.so(@vName, @r)",
        vName = to_string_literal(&v),
        r = rw.expand(&bindings["r"], Some(scope), cx),
    ))
    .synthetic())
}

fn fire_set_global_var(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let v = &bindings["v"];
    if !v.is_reference() || !cx.scopes.is_outer(scope, v.identifier_name().unwrap_or_default()) {
        return None;
    }
    Some(substv!(
        "$v.so(@vName, @r)",
        vName = to_string_literal(v),
        r = rw.expand(&bindings["r"], Some(scope), cx),
    ))
}

fn fire_decl_global_var(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let v = bindings["v"].clone();
    if !cx
        .scopes
        .is_outer(scope, v.identifier_name().unwrap_or_default())
    {
        return None;
    }
    Some(Node::expr_stmt(substv!("$v.initOuter(@vName)", vName = to_string_literal(&v))).synthetic())
}

// The first argument slot of a disfunction carries $dis.
fn fire_read_arguments(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    Some(QuasiBuilder::subst("Array.slice(arguments, 1)", &bindings))
}

fn fire_read_global_var(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let v = &bindings["v"];
    if !v.is_reference() || !cx.scopes.is_outer(scope, v.identifier_name().unwrap_or_default()) {
        return None;
    }
    Some(substv!("$v.ro(@vName)", vName = to_string_literal(v)))
}

fn fire_init_local_var(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let v = bindings["v"].clone();
    if cx
        .scopes
        .is_outer(scope, v.identifier_name().unwrap_or_default())
    {
        return None;
    }
    Some(substv!(
        "var @v = @r",
        v = v,
        r = rw.expand(&bindings["r"], Some(scope), cx),
    ))
}

fn fire_set_local_var(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let v = &bindings["v"];
    if !v.is_reference() || cx.scopes.is_outer(scope, v.identifier_name().unwrap_or_default()) {
        return None;
    }
    Some(substv!(
        "@v = @r",
        v = v.clone(),
        r = rw.expand(&bindings["r"], Some(scope), cx),
    ))
}

// Read @p from @o or @o's personal-override table.
fn fire_read_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "$v.r(@o, @rp)",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        rp = to_string_literal(&bindings["p"]),
    ))
}

fn fire_read_index_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "$v.r(@o, @p)",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        p = rw.expand(&bindings["p"], Some(scope), cx),
    ))
}

fn fire_set_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "$v.s(@o, @rp, @r)",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        rp = to_string_literal(&bindings["p"]),
        r = rw.expand(&bindings["r"], Some(scope), cx),
    ))
}

fn fire_set_index_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "$v.s(@o, @p, @r)",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        p = rw.expand(&bindings["p"], Some(scope), cx),
        r = rw.expand(&bindings["r"], Some(scope), cx),
    ))
}

fn fire_construct(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "$v.construct(@c, [@args*])",
        c = rw.expand(&bindings["c"], Some(scope), cx),
        args = rw.expand_all(&bindings["args"], Some(scope), cx),
    ))
}

fn fire_call_named(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "$v.cm(@o, @rp, [@args*])",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        rp = to_string_literal(&bindings["p"]),
        args = rw.expand_all(&bindings["args"], Some(scope), cx),
    ))
}

fn fire_call_method(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "$v.cm(@o, @p, [@args*])",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        p = rw.expand(&bindings["p"], Some(scope), cx),
        args = rw.expand_all(&bindings["args"], Some(scope), cx),
    ))
}

fn fire_call_func(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "$v.cf(@f, [@args*])",
        f = rw.expand(&bindings["f"], Some(scope), cx),
        args = rw.expand_all(&bindings["args"], Some(scope), cx),
    ))
}

////////////////////////////////////////////////////////////////////////
// function - transmute functions into disfunctions
////////////////////////////////////////////////////////////////////////

fn fire_disfunc_anon(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let s2 = cx.scopes.from_function_constructor(scope, node, cx.messages);
    check_formals(&bindings["ps"], cx);
    let bs = rw.expand(&bindings["bs"], Some(s2), cx);
    let fh = function_head_declarations(s2, cx);
    let stmts = Node::list(cx.scopes.take_start_statements(s2));
    Some(substv!(
        "$v.dis(function ($dis, @ps*) { @fh*; @stmts*; @bs*; })",
        ps = bindings["ps"].clone(),
        bs = bs,
        fh = fh,
        stmts = stmts,
    ))
}

// A named function declaration hoists like in the strict dialect, but
// outer-scope names initialize through the outers broker.
fn fire_disfunc_named_decl(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    if node.kind != NodeKind::FunctionDeclaration {
        return None;
    }
    let ctor = &node.children[1];
    let bindings = rule.match_node(ctor)?;
    let fname = bindings["fname"].clone();
    let fname_text = fname.identifier_name().unwrap_or_default().to_string();
    if fname_text.is_empty() {
        return None;
    }
    let s2 = cx.scopes.from_function_constructor(scope, ctor, cx.messages);
    check_formals(&bindings["ps"], cx);
    let bs = rw.expand(&bindings["bs"], Some(s2), cx);
    let fh = function_head_declarations(s2, cx);
    let stmts = Node::list(cx.scopes.take_start_statements(s2));
    let value = substv!(
        "$v.dis(function ($dis, @ps*) { @fh*; @stmts*; @bs*; }, @rf)",
        ps = bindings["ps"].clone(),
        bs = bs,
        fh = fh,
        stmts = stmts,
        rf = to_string_literal(&fname),
    );
    let init = if cx.scopes.is_outer(scope, &fname_text) {
        substv!(
            "$v.so(@fnameStr, @r)",
            fnameStr = to_string_literal(&fname),
            r = value,
        )
    } else {
        cx.scopes.declare_start_of_scope_variable(scope, &fname_text);
        substv!(
            "@fname = @r",
            fname = Node::reference_to(fname),
            r = value,
        )
    };
    cx.scopes
        .add_start_of_block_statement(scope, Node::expr_stmt(init).synthetic());
    Some(Node::noop().synthetic())
}

fn fire_disfunc_named_value(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    if node.kind != NodeKind::FunctionConstructor {
        return None;
    }
    let bindings = rule.match_node(node)?;
    let fname = bindings["fname"].clone();
    if fname.identifier_name().unwrap_or_default().is_empty() {
        return None;
    }
    let s2 = cx.scopes.from_function_constructor(scope, node, cx.messages);
    check_formals(&bindings["ps"], cx);
    let bs = rw.expand(&bindings["bs"], Some(s2), cx);
    let fh = function_head_declarations(s2, cx);
    let stmts = Node::list(cx.scopes.take_start_statements(s2));
    Some(substv!(
        "$v.dis(function ($dis, @ps*) { @fh*; @stmts*; @bs*; }, @rf)",
        ps = bindings["ps"].clone(),
        bs = bs,
        fh = fh,
        stmts = stmts,
        rf = to_string_literal(&fname),
    ))
}

// At the outer scope every declaration initializes through the broker, so
// a multi-declaration flattens to a comma expression.
fn fire_multi_declaration(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    if node.kind != NodeKind::MultiDeclaration || !cx.scopes.is_outer_scope(scope) {
        return None;
    }
    let mut initializers = Vec::new();
    for child in &node.children {
        let expanded = rw.expand(child, Some(scope), cx);
        match expanded.kind {
            NodeKind::ExpressionStmt => {
                initializers.push(expanded.children.into_iter().next().unwrap());
            }
            _ => {
                cx.messages.add(
                    MessageKind::UnmatchedNodeLeftOver {
                        kind: expanded.kind.name().to_string(),
                    },
                    node.pos,
                    Some(rule.name),
                );
                return Some(node.clone());
            }
        }
    }
    Some(Node::expr_stmt(new_comma_operation(initializers)).synthetic())
}

// Object literals pass through with their values rewritten.
fn fire_map(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let mut bindings = rule.match_node(node)?;
    let vals = rw.expand(&bindings["vals"], Some(scope), cx);
    bindings.insert("vals".to_string(), vals);
    Some(QuasiBuilder::subst("({@keys*: @vals*})", &bindings))
}

// Typeof of an undeclared outer must not throw.
fn fire_outer_typeof(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let f = &bindings["f"];
    if !f.is_reference() || !cx.scopes.is_outer(scope, f.identifier_name().unwrap_or_default()) {
        return None;
    }
    Some(substv!(
        "$v.typeOf($v.ros(@fName))",
        fName = to_string_literal(f),
    ))
}

fn fire_other_typeof(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "typeof @f",
        f = rw.expand(&bindings["f"], Some(scope), cx),
    ))
}

fn fire_other_instanceof(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "$v.instanceOf(@o, @f)",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        f = rw.expand(&bindings["f"], Some(scope), cx),
    ))
}

// Removes a QuotedExpression wrapper without expanding its contents.
fn fire_unquote(
    _rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    if node.kind == NodeKind::QuotedExpression {
        return Some(node.children[0].clone());
    }
    None
}

// The compat chain recurses into anything not otherwise claimed.
fn fire_recurse(
    _rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    Some(rw.expand_all(node, scope, cx))
}

fn new_temp_var(scope: ScopeId, cx: &mut Context) -> Node {
    let ident = cx.scopes.declare_start_of_scope_temp_variable(scope);
    Node::reference_to(ident).synthetic()
}

fn quoted(expr: Node) -> Node {
    Node::new(NodeKind::QuotedExpression, vec![expr]).synthetic()
}
