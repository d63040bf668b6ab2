// The safe-dialect rule chain. Rule order is contractual: reserved-suffix
// rejections and synthetic pass-throughs run before the general rules that
// would otherwise claim the same shapes, and the terminal recurse rule
// guarantees every structurally transparent node kind is covered.

// A NOTE ABOUT MATCHING MEMBER ACCESS EXPRESSIONS
// When a pattern like '@x.@y' or '@x.@y()' matches a specimen, 'y' binds
// the rightmost component (always a Reference) and 'x' the remaining
// subexpression on the left.

use crate::ast::{Node, NodeKind, Op, OpCategory};
use crate::quasi::QuasiBuilder;
use crate::reserved;
use crate::rewrite::messages::MessageKind;
use crate::rewrite::{
    check_formals, deconstruct_read_assign_operand, expand_entries, expand_member,
    function_head_declarations, ident_is_synthetic, literals_contain, literals_end_with,
    new_comma_operation, new_reference, ref_to, reuse_all, to_string_literal, Context, Rewriter,
    Rule,
};
use crate::scope::ScopeId;
use crate::substv;

use super::reject;

pub fn new_strict() -> Rewriter {
    Rewriter::new("strict", strict_rules())
}

pub fn strict_rules() -> Vec<Rule> {
    vec![
        Rule::new("module", None, fire_module),
        // Pass through anything that is already the result of a translation.
        Rule::new("syntheticReference", None, fire_synthetic_reference),
        Rule::new("syntheticCalls", Some("@o.@m(@args*)"), fire_synthetic_calls),
        Rule::new("syntheticDeletes", Some("delete @o.@m"), fire_synthetic_deletes),
        Rule::new("syntheticReads", Some("@o.@m"), fire_synthetic_reads),
        Rule::new("syntheticSetMember", Some("@o.@m = @v"), fire_synthetic_set_member),
        Rule::new("syntheticSetVar", Some("@lhs___ = @rhs"), fire_synthetic_set_var),
        Rule::new(
            "syntheticDeclaration",
            Some("var @v___ = @initial?;"),
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
        // Hoist named functions to the top of their enclosing block.
        Rule::new("block", None, fire_block),
        Rule::new("with", Some("with (@scope) @body;"), fire_with),
        Rule::new(
            "foreachBadFreeVariable",
            Some("for (@k in @o) @ss;"),
            fire_foreach_bad_free_variable,
        ),
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
        Rule::new("varArgs", Some("arguments"), fire_var_args),
        Rule::new("varThis", Some("this"), fire_var_this),
        Rule::new("varBadSuffix", Some("@v__"), fire_var_bad_suffix),
        Rule::new("varBadSuffixDeclaration", None, fire_var_bad_suffix_declaration),
        Rule::new("varBadImportSuffix", Some("@import_"), fire_var_bad_import_suffix),
        Rule::new("varFuncFreeze", Some("@fname"), fire_var_func_freeze),
        Rule::new("varDefault", Some("@v"), fire_var_default),
        Rule::new("readBadSuffix", Some("@x.@p__"), fire_read_bad_suffix),
        Rule::new("readInternal", Some("this.@p"), fire_read_internal),
        Rule::new("readBadInternal", Some("@x.@p_"), fire_read_bad_internal),
        Rule::new("readPublic", Some("@o.@p"), fire_read_public),
        Rule::new("readIndexInternal", Some("this[@s]"), fire_read_index_internal),
        Rule::new("readIndexPublic", Some("@o[@s]"), fire_read_index_public),
        Rule::new("setBadAssignToFunctionName", None, fire_set_bad_assign_to_function_name),
        Rule::new("setBadThis", Some("this = @z"), fire_set_bad_this),
        Rule::new("setBadFreeVariable", Some("@import = @y"), fire_set_bad_free_variable),
        Rule::new("setBadValueOf", Some("@x.valueOf = @z"), fire_set_bad_value_of),
        Rule::new("setBadSuffix", Some("@x.@p__ = @z"), fire_set_bad_suffix),
        Rule::new("setInternal", Some("this.@p = @r"), fire_set_internal),
        Rule::new("setMember", Some("@df.prototype.@p = @m"), fire_set_member),
        Rule::new("setBadInternal", Some("@x.@y_ = @z"), fire_set_bad_internal),
        Rule::new("setStatic", Some("@fname.@p = @r"), fire_set_static),
        Rule::new("setPublic", Some("@o.@p = @r"), fire_set_public),
        Rule::new("setIndexInternal", Some("this[@s] = @r"), fire_set_index_internal),
        Rule::new("setIndexPublic", Some("@o[@s] = @r"), fire_set_index_public),
        Rule::new("setBadInitialize", Some("var @v__ = @r"), fire_set_bad_initialize),
        Rule::new("setInitialize", Some("var @v = @r"), fire_set_initialize),
        Rule::new("setBadDeclare", Some("var @v__"), fire_set_bad_declare),
        Rule::new("setDeclare", Some("var @v"), fire_set_declare),
        Rule::new("setBadVar", Some("@v__ = @r"), fire_set_bad_var),
        Rule::new("setVar", Some("@v = @r"), fire_set_var),
        Rule::new("setReadModifyWriteLocalVar", None, fire_set_read_modify_write),
        Rule::new("setIncrDecr", None, fire_set_incr_decr),
        Rule::new("newCtor", Some("new @ctor(@args*)"), fire_new_ctor),
        Rule::new("deleteBadValueOf", Some("delete @o.valueOf"), fire_delete_bad_value_of),
        Rule::new("deleteBadSuffix", Some("delete @o.@p__"), fire_delete_bad_suffix),
        Rule::new("deleteInternal", Some("delete this.@p"), fire_delete_internal),
        Rule::new("deleteBadInternal", Some("delete @o.@p_"), fire_delete_bad_internal),
        Rule::new("deletePublic", Some("delete @o.@p"), fire_delete_public),
        Rule::new("deleteIndexInternal", Some("delete this[@s]"), fire_delete_index_internal),
        Rule::new("deleteIndexPublic", Some("delete @o[@s]"), fire_delete_index_public),
        Rule::new("deleteNonProperty", Some("delete @v"), fire_delete_non_property),
        Rule::new("callBadSuffix", Some("@o.@p__(@args*)"), fire_call_bad_suffix),
        Rule::new("callInternal", Some("this.@p(@args*)"), fire_call_internal),
        Rule::new("callBadInternal", Some("@o.@s_(@args*)"), fire_call_bad_internal),
        Rule::new("callPublic", Some("@o.@m(@args*)"), fire_call_public),
        Rule::new("callIndexInternal", Some("this[@s](@args*)"), fire_call_index_internal),
        Rule::new("callIndexPublic", Some("@o[@s](@args*)"), fire_call_index_public),
        Rule::new("callFunc", Some("@f(@args*)"), fire_call_func),
        Rule::new("funcAnonSimple", Some("(function (@ps*) { @bs*; })"), fire_func_anon_simple),
        Rule::new(
            "funcNamedSimpleDecl",
            Some("(function @fname(@ps*) { @bs*; })"),
            fire_func_named_simple_decl,
        ),
        Rule::new(
            "funcNamedSimpleValue",
            Some("(function @fname(@ps*) { @bs*; })"),
            fire_func_named_simple_value,
        ),
        Rule::new(
            "funcCtor",
            Some("(function @fname(@ps*) { @b; @bs*; })"),
            fire_func_ctor,
        ),
        Rule::new("mapBadKeyValueOf", Some("({@keys*: @vals*})"), fire_map_bad_key_value_of),
        Rule::new("mapBadKeySuffix", Some("({@keys*: @vals*})"), fire_map_bad_key_suffix),
        Rule::new("mapNonEmpty", Some("({@keys*: @vals*})"), fire_map_non_empty),
        Rule::new("multiDeclaration", None, fire_multi_declaration),
        Rule::new("otherTypeof", Some("typeof @f"), fire_other_typeof),
        Rule::new("inInternal", Some("@i in this"), fire_in_internal),
        Rule::new("inPublic", Some("@i in @o"), fire_in_public),
        Rule::new("voidOp", Some("void @x"), fire_void_op),
        Rule::new("commaOp", Some("(@a, @b)"), fire_comma_op),
        Rule::new("labeledStatement", None, fire_labeled_statement),
        Rule::new("regexLiteral", None, fire_regex_literal),
        Rule::new("recurse", None, fire_recurse),
    ]
}

////////////////////////////////////////////////////////////////////////
// module - the program top level
////////////////////////////////////////////////////////////////////////

// Disallow top-level "this"; import free variables. At top level "this"
// would be bound to the imports object, but the module is outside that
// object's encapsulation boundary.
fn fire_module(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    if scope.is_some() || node.kind != NodeKind::Block {
        return None;
    }
    let s2 = cx.scopes.from_program(node, cx.messages);
    if cx.scopes.has_free_this(s2) {
        cx.messages
            .add(MessageKind::ThisInGlobalContext, node.pos, Some(rule.name));
    }
    let expanded: Vec<Node> = node
        .children
        .iter()
        .map(|child| rw.expand(child, Some(s2), cx))
        .collect();
    let imported_vars: Vec<Node> = cx
        .scopes
        .imported_variables(s2)
        .iter()
        .map(|name| {
            substv!(
                "var @vIdent = ___.readImport(IMPORTS___, @vName);",
                vIdent = Node::ident(name).synthetic(),
                vName = Node::string_lit(name),
            )
        })
        .collect();
    Some(substv!(
        "@importedvars*; @startStmts*; @expanded*;",
        importedvars = Node::list(imported_vars),
        startStmts = Node::list(cx.scopes.take_start_statements(s2)),
        expanded = Node::list(expanded),
    ))
}

////////////////////////////////////////////////////////////////////////
// Do nothing if the node is already the result of some translation
////////////////////////////////////////////////////////////////////////

pub(crate) fn fire_synthetic_reference(
    _rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    if node.is_reference() && ident_is_synthetic(node) {
        return Some(node.clone());
    }
    None
}

pub(crate) fn fire_synthetic_calls(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if ident_is_synthetic(&bindings["m"]) {
        return Some(rw.expand_all(node, scope, cx));
    }
    None
}

pub(crate) fn fire_synthetic_deletes(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if ident_is_synthetic(&bindings["m"]) {
        return Some(rw.expand_all(node, scope, cx));
    }
    None
}

pub(crate) fn fire_synthetic_reads(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if ident_is_synthetic(&bindings["m"]) {
        return Some(rw.expand_all(node, scope, cx));
    }
    None
}

pub(crate) fn fire_synthetic_set_member(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if ident_is_synthetic(&bindings["m"]) {
        return Some(rw.expand_all(node, scope, cx));
    }
    None
}

fn fire_synthetic_set_var(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if ident_is_synthetic(&bindings["lhs"]) {
        return Some(rw.expand_all(node, scope, cx));
    }
    None
}

pub(crate) fn fire_synthetic_declaration(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if ident_is_synthetic(&bindings["v"]) {
        return Some(rw.expand_all(node, scope, cx));
    }
    None
}

pub(crate) fn fire_synthetic_fn_declaration(
    _rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let ctor = match node.kind {
        NodeKind::FunctionDeclaration => &node.children[1],
        NodeKind::FunctionConstructor => node,
        _ => return None,
    };
    if ctor.is_synthetic() {
        return Some(rw.expand_all(node, scope, cx));
    }
    None
}

pub(crate) fn fire_synthetic_catches(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if ident_is_synthetic(&bindings["ex"]) {
        return Some(rw.expand_all(node, scope, cx));
    }
    None
}

////////////////////////////////////////////////////////////////////////
// Support hoisting of functions to the top of their containing block
////////////////////////////////////////////////////////////////////////

pub(crate) fn fire_block(
    _rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    if node.kind != NodeKind::Block {
        return None;
    }
    let s2 = cx.scopes.from_plain_block(scope);
    let expanded: Vec<Node> = node
        .children
        .iter()
        .map(|child| rw.expand(child, Some(s2), cx))
        .collect();
    Some(substv!(
        "@startStmts*; @ss*;",
        startStmts = Node::list(cx.scopes.take_start_statements(s2)),
        ss = Node::list(expanded),
    ))
}

////////////////////////////////////////////////////////////////////////
// with - disallow the 'with' construct
////////////////////////////////////////////////////////////////////////

// `with` makes the matching of references with declarations undecidable
// before runtime, so no sound scope tracking is possible.
fn fire_with(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(rule, node, MessageKind::WithBlocksNotAllowed, cx)
}

////////////////////////////////////////////////////////////////////////
// foreach - "for ... in" loops
////////////////////////////////////////////////////////////////////////

fn fire_foreach_bad_free_variable(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let key = &bindings["k"];
    if key.kind == NodeKind::ExpressionStmt && key.children[0].is_reference() {
        let name = key.children[0].identifier_name().unwrap_or_default();
        if cx.scopes.is_imported(scope, name) {
            return reject(rule, node, MessageKind::CannotAssignToFreeVariable, cx);
        }
    }
    None
}

// Only enumerate visible and enumerable property names. A for-in on the
// receiver keyword sees public and protected names, otherwise only public
// ones.
fn fire_foreach(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = match rule.match_node(node) {
        Some(bindings) => {
            let key = bindings["k"].clone();
            cx.scopes
                .add_start_of_scope_statement(scope, substv!("var @k;", k = key.clone()));
            let mut bindings = bindings;
            bindings.insert("k".to_string(), Node::reference_to(key));
            bindings
        }
        None => {
            let mut bindings = QuasiBuilder::match_text("for (@k in @o) @ss;", node)?;
            let expr = bindings["k"].children[0].clone();
            bindings.insert("k".to_string(), expr);
            bindings
        }
    };

    let mut decls = Vec::new();
    let o_temp = cx.scopes.declare_start_of_scope_temp_variable(scope);
    decls.push(Node::expr_stmt(substv!(
        "@oTemp = @o;",
        oTemp = ref_to(o_temp.clone()),
        o = rw.expand(&bindings["o"], Some(scope), cx),
    )));

    let k_temp = cx.scopes.declare_start_of_scope_temp_variable(scope);
    let mut k_assignment = substv!(
        "@k = @kTempRef;",
        k = bindings["k"].clone(),
        kTempRef = ref_to(k_temp.clone()),
    );
    // Force real expansion of the author-written lvalue.
    k_assignment.synthetic = false;
    let k_assignment = Node::expr_stmt(rw.expand(&k_assignment, Some(scope), cx));

    let can_enum_name = if QuasiBuilder::match_text("this", &bindings["o"]).is_some() {
        "canEnumProp"
    } else {
        "canEnumPub"
    };

    let ss = rw.expand(&bindings["ss"], Some(scope), cx);
    Some(substv!(
        "@decls*; for (@kTempStmt in @oTempRef) { if (___.@canEnum(@oTempRef, @kTempRef)) { @kAssignment; @ss; } }",
        canEnum = new_reference(can_enum_name),
        decls = Node::list(decls),
        oTempRef = ref_to(o_temp.clone()),
        kTempRef = ref_to(k_temp.clone()),
        kTempStmt = Node::expr_stmt(ref_to(k_temp)),
        kAssignment = k_assignment,
        ss = ss,
    ))
}

////////////////////////////////////////////////////////////////////////
// try - try/catch/finally constructs
////////////////////////////////////////////////////////////////////////

// Only immutable (tamed) exception values may reach author-written catch
// blocks; the intermediate rethrow routes every thrown value through the
// runtime's taming.
fn fire_try_catch(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let exception = bindings["x"].clone();
    if let Some(name) = exception.identifier_name() {
        if reserved::ends_reserved(name) {
            return reject(
                rule,
                node,
                MessageKind::VariablesCannotEndInDoubleUnderscore,
                cx,
            );
        }
    }
    let catch_scope = cx.scopes.from_catch_stmt(scope, &node.children[1], cx.messages);
    Some(substv!(
        "try { @s0*; } catch (@ex) { try { throw ___.tameException(@exRef); } catch (@x) { @s1*; } }",
        s0 = rw.expand(&bindings["s0"], Some(scope), cx),
        ex = Node::ident("ex___").synthetic(),
        exRef = new_reference("ex___"),
        x = exception,
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
    let exception = bindings["x"].clone();
    if let Some(name) = exception.identifier_name() {
        if reserved::ends_reserved(name) {
            return reject(
                rule,
                node,
                MessageKind::VariablesCannotEndInDoubleUnderscore,
                cx,
            );
        }
    }
    let catch_scope = cx.scopes.from_catch_stmt(scope, &node.children[1], cx.messages);
    Some(substv!(
        "try { @s0*; } catch (@ex) { try { throw ___.tameException(@exRef); } catch (@x) { @s1*; } } finally { @s2*; }",
        s0 = rw.expand(&bindings["s0"], Some(scope), cx),
        ex = Node::ident("ex___").synthetic(),
        exRef = new_reference("ex___"),
        x = exception,
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

////////////////////////////////////////////////////////////////////////
// variable - variable name handling
////////////////////////////////////////////////////////////////////////

// References to the implicit arguments object become references to the
// frozen snapshot bound at the function head.
fn fire_var_args(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    Some(QuasiBuilder::subst(reserved::LOCAL_ARGUMENTS, &bindings))
}

fn fire_var_this(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    Some(QuasiBuilder::subst(reserved::LOCAL_THIS, &bindings))
}

fn fire_var_bad_suffix(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::VariablesCannotEndInDoubleUnderscore,
        cx,
    )
}

fn fire_var_bad_suffix_declaration(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    if !matches!(
        node.kind,
        NodeKind::Declaration | NodeKind::FormalParam | NodeKind::FunctionDeclaration
    ) {
        return None;
    }
    let name = node.identifier_name().unwrap_or_default();
    if reserved::ends_reserved(name) {
        return reject(
            rule,
            node,
            MessageKind::VariablesCannotEndInDoubleUnderscore,
            cx,
        );
    }
    None
}

// A module is outside the encapsulation boundary of its imports object,
// so none of that object's protected names are addressable.
fn fire_var_bad_import_suffix(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let name = bindings["import"].identifier_name().unwrap_or_default();
    if cx.scopes.is_imported(scope, name) {
        return reject(
            rule,
            node,
            MessageKind::ImportedSymbolsCannotEndInUnderscore,
            cx,
        );
    }
    None
}

// An escaping occurrence of a function name freezes the function; only
// statically known function names need freezing at potential escape
// points.
fn fire_var_func_freeze(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let fname = &bindings["fname"];
    if fname.is_reference() {
        let name = fname.identifier_name().unwrap_or_default();
        if cx.scopes.is_function(scope, name) {
            return Some(substv!("___.primFreeze(@fname)", fname = fname.clone()));
        }
    }
    None
}

fn fire_var_default(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if bindings["v"].is_reference() {
        return Some(bindings["v"].clone());
    }
    None
}

////////////////////////////////////////////////////////////////////////
// read - reading properties
////////////////////////////////////////////////////////////////////////

fn fire_read_bad_suffix(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::PropertiesCannotEndInDoubleUnderscore,
        cx,
    )
}

// Addressed from the receiver keyword, so the access happens inside the
// object's encapsulation boundary and protected properties are reachable.
fn fire_read_internal(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    let _scope = scope?;
    let bindings = rule.match_node(node)?;
    let p = bindings["p"].clone();
    let property = p.identifier_name().unwrap_or_default().to_string();
    Some(substv!(
        "t___.@fp ? t___.@p : ___.readProp(t___, @rp)",
        p = p.clone(),
        fp = new_reference(&format!("{property}_canRead___")),
        rp = to_string_literal(&p),
    ))
}

fn fire_read_bad_internal(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::PublicPropertiesCannotEndInUnderscore,
        cx,
    )
}

fn fire_read_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let p = bindings["p"].clone();
    let property = p.identifier_name().unwrap_or_default().to_string();
    let tmp = cx.scopes.declare_start_of_scope_temp_variable(scope);
    Some(substv!(
        "@tmpRef = @o, (@tmpRef.@fp ? @tmpRef.@p : ___.readPub(@tmpRef, @rp))",
        tmpRef = ref_to(tmp),
        o = rw.expand(&bindings["o"], Some(scope), cx),
        p = p.clone(),
        fp = new_reference(&format!("{property}_canRead___")),
        rp = to_string_literal(&p),
    ))
}

fn fire_read_index_internal(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "___.readProp(t___, @s)",
        s = rw.expand(&bindings["s"], Some(scope), cx),
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
        "___.readPub(@o, @s)",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        s = rw.expand(&bindings["s"], Some(scope), cx),
    ))
}

////////////////////////////////////////////////////////////////////////
// set - assignments
////////////////////////////////////////////////////////////////////////

fn fire_set_bad_assign_to_function_name(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let NodeKind::Operation(op) = node.kind else {
        return None;
    };
    if !op.is_assignment() {
        return None;
    }
    let target = &node.children[0];
    if target.is_reference()
        && cx
            .scopes
            .is_function(scope, target.identifier_name().unwrap_or_default())
    {
        return reject(rule, node, MessageKind::CannotAssignToFunctionName, cx);
    }
    None
}

fn fire_set_bad_this(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(rule, node, MessageKind::CannotAssignToThis, cx)
}

// Code nested lexically within a module must not introduce mutable state
// outside its local scope via an undeclared name.
fn fire_set_bad_free_variable(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let target = &bindings["import"];
    if target.is_reference()
        && cx
            .scopes
            .is_imported(scope, target.identifier_name().unwrap_or_default())
    {
        return reject(rule, node, MessageKind::CannotAssignToFreeVariable, cx);
    }
    None
}

fn fire_set_bad_value_of(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(rule, node, MessageKind::ValueOfPropertyMustNotBeSet, cx)
}

fn fire_set_bad_suffix(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::PropertiesCannotEndInDoubleUnderscore,
        cx,
    )
}

// Methods and constructors may create new properties on their own object
// directly by assignment.
fn fire_set_internal(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let p = bindings["p"].clone();
    let property = p.identifier_name().unwrap_or_default().to_string();
    let tmp = cx.scopes.declare_start_of_scope_temp_variable(scope);
    Some(substv!(
        "@tmpRef = @r, @target.@fp ? (@target.@p = @tmpRef) : ___.setProp(@target, @rp, @tmpRef)",
        tmpRef = ref_to(tmp),
        r = rw.expand(&bindings["r"], Some(scope), cx),
        target = new_reference(reserved::LOCAL_THIS),
        p = p.clone(),
        fp = new_reference(&format!("{property}_canSet___")),
        rp = to_string_literal(&p),
    ))
}

// Initializing a member of the prototypical object associated with a
// declared function is a method context.
fn fire_set_member(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let class = &bindings["df"];
    if class.is_reference()
        && cx
            .scopes
            .is_declared_function(scope, class.identifier_name().unwrap_or_default())
    {
        let p = bindings["p"].clone();
        return Some(substv!(
            "___.setMember(@df, @rp, @m)",
            df = class.clone(),
            rp = to_string_literal(&p),
            m = expand_member(&bindings["m"], scope, rw, cx),
        ));
    }
    None
}

fn fire_set_bad_internal(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::PublicPropertiesCannotEndInUnderscore,
        cx,
    )
}

// Direct (static) properties of a potentially mutable named function.
fn fire_set_static(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let fname = &bindings["fname"];
    if fname.is_reference()
        && cx
            .scopes
            .is_function(scope, fname.identifier_name().unwrap_or_default())
    {
        let p = bindings["p"].clone();
        return Some(substv!(
            "___.setStatic(@fname, @rp, @r)",
            fname = fname.clone(),
            rp = to_string_literal(&p),
            r = rw.expand(&bindings["r"], Some(scope), cx),
        ));
    }
    None
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
    let p = bindings["p"].clone();
    let property = p.identifier_name().unwrap_or_default().to_string();
    let tmp_o = cx.scopes.declare_start_of_scope_temp_variable(scope);
    let tmp_r = cx.scopes.declare_start_of_scope_temp_variable(scope);
    Some(substv!(
        "@tmpO = @expandO, @tmpR = @expandR, @tmpO.@pCanSet ? (@tmpO.@p = @tmpR) : ___.setPub(@tmpO, @pName, @tmpR)",
        tmpO = ref_to(tmp_o),
        tmpR = ref_to(tmp_r),
        expandO = rw.expand(&bindings["o"], Some(scope), cx),
        expandR = rw.expand(&bindings["r"], Some(scope), cx),
        pCanSet = new_reference(&format!("{property}_canSet___")),
        p = p.clone(),
        pName = to_string_literal(&p),
    ))
}

fn fire_set_index_internal(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "___.setProp(t___, @s, @r)",
        s = rw.expand(&bindings["s"], Some(scope), cx),
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
        "___.setPub(@o, @s, @r)",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        s = rw.expand(&bindings["s"], Some(scope), cx),
        r = rw.expand(&bindings["r"], Some(scope), cx),
    ))
}

fn fire_set_bad_initialize(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::VariablesCannotEndInDoubleUnderscore,
        cx,
    )
}

fn fire_set_initialize(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let name = bindings["v"].identifier_name().unwrap_or_default();
    if cx.scopes.is_function(scope, name) {
        return reject(rule, node, MessageKind::CannotRedeclareFunctionName, cx);
    }
    Some(substv!(
        "var @v = @r",
        v = bindings["v"].clone(),
        r = rw.expand(&bindings["r"], Some(scope), cx),
    ))
}

fn fire_set_bad_declare(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::VariablesCannotEndInDoubleUnderscore,
        cx,
    )
}

fn fire_set_declare(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let name = bindings["v"].identifier_name().unwrap_or_default();
    if cx.scopes.is_function(scope, name) {
        return reject(rule, node, MessageKind::CannotRedeclareFunctionName, cx);
    }
    Some(node.clone())
}

fn fire_set_bad_var(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::VariablesCannotEndInDoubleUnderscore,
        cx,
    )
}

fn fire_set_var(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let target = &bindings["v"];
    if target.is_reference()
        && !cx
            .scopes
            .is_function(scope, target.identifier_name().unwrap_or_default())
    {
        return Some(substv!(
            "@v = @r",
            v = target.clone(),
            r = rw.expand(&bindings["r"], Some(scope), cx),
        ));
    }
    None
}

// Compound assignment (`x += y`) decomposes into read and write through
// the assignment delegate, with temporaries pinning evaluation order.
fn fire_set_read_modify_write(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let NodeKind::Operation(op) = node.kind else {
        return None;
    };
    let delegate = op.binary_of_assign()?;
    let Some(ops) = deconstruct_read_assign_operand(rule, &node.children[0], scope, rw, cx)
    else {
        return Some(node.clone());
    };
    let rhs = Node::operation(
        delegate,
        vec![
            ops.rvalue().clone(),
            rw.expand(&node.children[1], Some(scope), cx),
        ],
    )
    .at(node.pos)
    .synthetic();
    let assignment = ops.make_assignment(rhs);
    if ops.temporaries().is_empty() {
        Some(assignment)
    } else {
        Some(substv!(
            "@tmps, @assign",
            tmps = new_comma_operation(ops.temporaries().to_vec()),
            assign = assignment,
        ))
    }
}

fn fire_set_incr_decr(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let NodeKind::Operation(op) = node.kind else {
        return None;
    };
    if !matches!(op, Op::PreIncr | Op::PreDecr | Op::PostIncr | Op::PostDecr) {
        return None;
    }
    let Some(ops) = deconstruct_read_assign_operand(rule, &node.children[0], scope, rw, cx)
    else {
        return Some(node.clone());
    };

    match op {
        Op::PostIncr | Op::PostDecr => {
            let step = if op == Op::PostIncr { "+ 1" } else { "- 1" };
            if ops.is_simple_lvalue() {
                return Some(Node::operation(op, vec![ops.rvalue().clone()]).synthetic());
            }
            let tmp_val = ref_to(cx.scopes.declare_start_of_scope_temp_variable(scope));
            let assign = ops.make_assignment(substv!(
                &format!("@tmpVal {step}"),
                tmpVal = tmp_val.clone(),
            ));
            Some(substv!(
                "@tmps, @tmpVal = @rvalue - 0, @assign, @tmpVal",
                tmps = new_comma_operation(ops.temporaries().to_vec()),
                tmpVal = tmp_val,
                rvalue = ops.rvalue().clone(),
                assign = assign,
            ))
        }
        Op::PreIncr | Op::PreDecr => {
            // Subtraction coerces to a number the same way the stepping
            // operator does, so `- -1` serves as the increment.
            let step = if op == Op::PreIncr { "- -1" } else { "- 1" };
            if ops.is_simple_lvalue() {
                return Some(Node::operation(op, vec![ops.rvalue().clone()]).synthetic());
            }
            let assign = ops.make_assignment(substv!(
                &format!("@rvalue {step}"),
                rvalue = ops.rvalue().clone(),
            ));
            if ops.temporaries().is_empty() {
                Some(assign)
            } else {
                Some(substv!(
                    "@tmps, @assign",
                    tmps = new_comma_operation(ops.temporaries().to_vec()),
                    assign = assign,
                ))
            }
        }
        _ => None,
    }
}

////////////////////////////////////////////////////////////////////////
// new - new object creation
////////////////////////////////////////////////////////////////////////

fn fire_new_ctor(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "new (___.asCtor(@ctor))(@args*)",
        ctor = rw.expand(&bindings["ctor"], Some(scope), cx),
        args = rw.expand_all(&bindings["args"], Some(scope), cx),
    ))
}

////////////////////////////////////////////////////////////////////////
// delete - property deletion
////////////////////////////////////////////////////////////////////////

fn fire_delete_bad_value_of(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(rule, node, MessageKind::ValueOfPropertyMustNotBeDeleted, cx)
}

fn fire_delete_bad_suffix(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::PropertiesCannotEndInDoubleUnderscore,
        cx,
    )
}

fn fire_delete_internal(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    let _scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "___.deleteProp(t___, @pname)",
        pname = to_string_literal(&bindings["p"]),
    ))
}

fn fire_delete_bad_internal(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::PublicPropertiesCannotEndInUnderscore,
        cx,
    )
}

fn fire_delete_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "___.deletePub(@o, @pname)",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        pname = to_string_literal(&bindings["p"]),
    ))
}

fn fire_delete_index_internal(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "___.deleteProp(t___, @s)",
        s = rw.expand(&bindings["s"], Some(scope), cx),
    ))
}

fn fire_delete_index_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "___.deletePub(@o, @s)",
        o = rw.expand(&bindings["o"], Some(scope), cx),
        s = rw.expand(&bindings["s"], Some(scope), cx),
    ))
}

fn fire_delete_non_property(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(rule, node, MessageKind::NotDeletable, cx)
}

////////////////////////////////////////////////////////////////////////
// call - function calls
////////////////////////////////////////////////////////////////////////

fn fire_call_bad_suffix(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::SelectorsCannotEndInDoubleUnderscore,
        cx,
    )
}

fn fire_call_internal(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let (refs, defs) = reuse_all(&bindings["args"], scope, rw, cx);
    let p = bindings["p"].clone();
    let method = p.identifier_name().unwrap_or_default().to_string();
    Some(substv!(
        "@args0, t___.@fp ? t___.@p(@vs*) : ___.callProp(t___, @pname, [@vs*])",
        args0 = new_comma_operation(defs.children),
        vs = refs,
        p = p.clone(),
        fp = new_reference(&format!("{method}_canCall___")),
        pname = to_string_literal(&p),
    ))
}

fn fire_call_bad_internal(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    reject(
        rule,
        node,
        MessageKind::PublicSelectorsCannotEndInUnderscore,
        cx,
    )
}

fn fire_call_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let (refs, defs) = reuse_all(&bindings["args"], scope, rw, cx);
    let m = bindings["m"].clone();
    let method = m.identifier_name().unwrap_or_default().to_string();
    let tmp = cx.scopes.declare_start_of_scope_temp_variable(scope);
    Some(substv!(
        "@oTmp = @o, @args0, @oTmp.@fm ? @oTmp.@m(@vs*) : ___.callPub(@oTmp, @rm, [@vs*])",
        oTmp = ref_to(tmp),
        o = rw.expand(&bindings["o"], Some(scope), cx),
        args0 = new_comma_operation(defs.children),
        vs = refs,
        m = m.clone(),
        fm = new_reference(&format!("{method}_canCall___")),
        rm = to_string_literal(&m),
    ))
}

fn fire_call_index_internal(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let mut bindings = rule.match_node(node)?;
    expand_entries(&mut bindings, scope, rw, cx);
    Some(QuasiBuilder::subst(
        "___.callProp(t___, @s, [@args*])",
        &bindings,
    ))
}

fn fire_call_index_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let mut bindings = rule.match_node(node)?;
    expand_entries(&mut bindings, scope, rw, cx);
    Some(QuasiBuilder::subst(
        "___.callPub(@o, @s, [@args*])",
        &bindings,
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
        "___.asSimpleFunc(@f)(@args*)",
        f = rw.expand(&bindings["f"], Some(scope), cx),
        args = rw.expand_all(&bindings["args"], Some(scope), cx),
    ))
}

////////////////////////////////////////////////////////////////////////
// function - function definitions
////////////////////////////////////////////////////////////////////////

fn fire_func_anon_simple(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let s2 = cx.scopes.from_function_constructor(scope, node, cx.messages);
    if cx.scopes.has_free_this(s2) {
        return None;
    }
    check_formals(&bindings["ps"], cx);
    // bs must be expanded before the head declarations and queued
    // statements are computed.
    let bs = rw.expand(&bindings["bs"], Some(s2), cx);
    let fh = function_head_declarations(s2, cx);
    let stmts = Node::list(cx.scopes.take_start_statements(s2));
    Some(substv!(
        "___.simpleFrozenFunc(function (@ps*) { @fh*; @stmts*; @bs*; })",
        ps = bindings["ps"].clone(),
        bs = bs,
        fh = fh,
        stmts = stmts,
    ))
}

// A named function declaration hoists its name to the enclosing function
// or module body and re-initializes it at the top of the enclosing block.
fn fire_func_named_simple_decl(
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
    let s2 = cx.scopes.from_function_constructor(scope, ctor, cx.messages);
    if cx.scopes.has_free_this(s2) {
        return None;
    }
    check_formals(&bindings["ps"], cx);
    let fname = bindings["fname"].clone();
    if fname.identifier_name().unwrap_or_default().is_empty() {
        return None;
    }
    cx.scopes
        .declare_start_of_scope_variable(scope, fname.identifier_name().unwrap_or_default());
    let bs = rw.expand(&bindings["bs"], Some(s2), cx);
    let fh = function_head_declarations(s2, cx);
    let stmts = Node::list(cx.scopes.take_start_statements(s2));
    let expr = substv!(
        "@fname = ___.simpleFunc(function (@ps*) { @fh*; @stmts*; @bs*; }, @rf)",
        fname = Node::reference_to(fname.clone()),
        rf = to_string_literal(&fname),
        ps = bindings["ps"].clone(),
        bs = bs,
        fh = fh,
        stmts = stmts,
    );
    cx.scopes
        .add_start_of_block_statement(scope, Node::expr_stmt(expr).synthetic());
    Some(Node::noop().synthetic())
}

fn fire_func_named_simple_value(
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
    if cx.scopes.has_free_this(s2) {
        return None;
    }
    check_formals(&bindings["ps"], cx);
    let bs = rw.expand(&bindings["bs"], Some(s2), cx);
    let fh = function_head_declarations(s2, cx);
    let stmts = Node::list(cx.scopes.take_start_statements(s2));
    Some(substv!(
        "(function () { function @fname(@ps*) { @fh*; @stmts*; @bs*; } return ___.simpleFrozenFunc(@fRef, @rf); })()",
        fname = fname.clone(),
        fRef = Node::reference_to(fname.clone()),
        rf = to_string_literal(&fname),
        ps = bindings["ps"].clone(),
        bs = bs,
        fh = fh,
        stmts = stmts,
    ))
}

// A function mentioning the receiver keyword is a constructor; its body
// splits into a maker and an initializer so instances can be created
// without exposing the raw function.
fn fire_func_ctor(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let declaration = node.kind == NodeKind::FunctionDeclaration;
    let ctor = match node.kind {
        NodeKind::FunctionDeclaration => &node.children[1],
        NodeKind::FunctionConstructor => node,
        _ => return None,
    };
    let bindings = rule.match_node(ctor)?;
    let fname = bindings["fname"].clone();
    let fname_text = fname.identifier_name().unwrap_or_default().to_string();
    if fname_text.is_empty() {
        return reject(rule, node, MessageKind::AnonymousFunctionReferencesThis, cx);
    }
    let s2 = cx.scopes.from_function_constructor(scope, ctor, cx.messages);
    if !cx.scopes.has_free_this(s2) {
        return None;
    }
    check_formals(&bindings["ps"], cx);
    if declaration {
        cx.scopes.declare_start_of_scope_variable(scope, &fname_text);
    }
    let b = rw.expand(&bindings["b"], Some(s2), cx);
    let bs = rw.expand(&bindings["bs"], Some(s2), cx);
    let fh = function_head_declarations(s2, cx);
    let stmts = Node::list(cx.scopes.take_start_statements(s2));
    let f_init = Node::ident(&format!("{fname_text}_init___")).synthetic();
    let result = substv!(
        "(function () { ___.splitCtor(@fRef, @fInitRef); function @fname(var_args) { return new @fRef.make___(arguments); } function @fInit(@ps*) { @fh*; @stmts*; @b; @bs*; } return @fRef; })()",
        fname = fname.clone(),
        fRef = Node::reference_to(fname.clone()),
        fInit = f_init.clone(),
        fInitRef = Node::reference_to(f_init),
        ps = bindings["ps"].clone(),
        b = b,
        bs = bs,
        fh = fh,
        stmts = stmts,
    );
    if declaration {
        let expr = substv!(
            "@fname = @r",
            fname = Node::reference_to(fname),
            r = result,
        );
        cx.scopes
            .add_start_of_block_statement(scope, Node::expr_stmt(expr).synthetic());
        Some(Node::noop().synthetic())
    } else {
        // A constructor used as a value escapes at this point, so freeze.
        Some(substv!("___.primFreeze(@result)", result = result))
    }
}

////////////////////////////////////////////////////////////////////////
// map - object literals
////////////////////////////////////////////////////////////////////////

fn fire_map_bad_key_value_of(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if literals_contain(&bindings["keys"], "valueOf") {
        return reject(rule, node, MessageKind::ValueOfPropertyMustNotBeSet, cx);
    }
    None
}

fn fire_map_bad_key_suffix(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let bindings = rule.match_node(node)?;
    if literals_end_with(&bindings["keys"], "_") {
        return reject(rule, node, MessageKind::KeyMayNotEndInUnderscore, cx);
    }
    None
}

fn fire_map_non_empty(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    let keys = bindings["keys"].children.clone();
    let vals = rw.expand(&bindings["vals"], Some(scope), cx).children;
    let mut items = Vec::new();
    for (key, value) in keys.into_iter().zip(vals.into_iter()) {
        items.push(key);
        items.push(value);
    }
    Some(substv!(
        "___.initializeMap([@items*])",
        items = Node::list(items),
    ))
}

////////////////////////////////////////////////////////////////////////
// multiDeclaration - multiple declarations
////////////////////////////////////////////////////////////////////////

// Consider declarations separately from initializers so rewrites that turn
// an initializer into a runtime call keep executing in source order.
fn fire_multi_declaration(
    _rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    if node.kind != NodeKind::MultiDeclaration {
        return None;
    }
    let mut expanded = Vec::new();
    let mut all_declarations = true;
    for child in &node.children {
        let mut result = rw.expand(child, Some(scope), cx);
        if result.kind == NodeKind::ExpressionStmt {
            result = result.children.into_iter().next().unwrap();
        }
        all_declarations &= result.kind == NodeKind::Declaration;
        expanded.push(result);
    }

    if all_declarations {
        let mut result = Node::new(NodeKind::MultiDeclaration, expanded).at(node.pos);
        result.synthetic = node.synthetic;
        return Some(result);
    }

    // Split initializers out of the declarations so they run in order.
    let mut declarations = Vec::new();
    let mut initializers = Vec::new();
    for item in expanded {
        match item.kind {
            NodeKind::Declaration => {
                let mut children = item.children;
                if children.len() == 2 {
                    let init = children.pop().unwrap();
                    let name = children[0].clone();
                    initializers.push(
                        Node::operation(Op::Assign, vec![Node::reference_to(name), init])
                            .synthetic(),
                    );
                }
                declarations.push(Node::new(NodeKind::Declaration, children).synthetic());
            }
            _ => initializers.push(item),
        }
    }
    if declarations.is_empty() {
        Some(Node::expr_stmt(new_comma_operation(initializers)).synthetic())
    } else {
        Some(substv!(
            "{ @decl; @init; }",
            decl = Node::new(NodeKind::MultiDeclaration, declarations).synthetic(),
            init = Node::expr_stmt(new_comma_operation(initializers)).synthetic(),
        ))
    }
}

////////////////////////////////////////////////////////////////////////
// other - things not otherwise covered
////////////////////////////////////////////////////////////////////////

// Reading a non-existent imported variable yields undefined rather than a
// reference error, so typeof can always evaluate its argument.
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

fn fire_in_internal(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "___.canReadProp(t___, @i)",
        i = rw.expand(&bindings["i"], Some(scope), cx),
    ))
}

fn fire_in_public(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let scope = scope?;
    let bindings = rule.match_node(node)?;
    Some(substv!(
        "___.canReadPubRev(@i, @o)",
        i = rw.expand(&bindings["i"], Some(scope), cx),
        o = rw.expand(&bindings["o"], Some(scope), cx),
    ))
}

fn fire_void_op(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    Some(rw.expand_all(node, scope, cx))
}

fn fire_comma_op(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    rule.match_node(node)?;
    Some(rw.expand_all(node, scope, cx))
}

fn fire_labeled_statement(
    rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let NodeKind::LabeledStmt(label) = &node.kind else {
        return None;
    };
    if reserved::ends_reserved(label) {
        cx.messages.add(
            MessageKind::LabelsCannotEndInDoubleUnderscore {
                label: label.clone(),
            },
            node.pos,
            Some(rule.name),
        );
    }
    let body = rw.expand(&node.children[0], scope, cx);
    Some(Node::new(NodeKind::LabeledStmt(label.clone()), vec![body]).at(node.pos))
}

// Every use of a regex literal creates a new instance, preventing state
// from leaking via interned literals.
fn fire_regex_literal(
    _rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    _cx: &mut Context,
) -> Option<Node> {
    let NodeKind::LitRegex { body, flags } = &node.kind else {
        return None;
    };
    let mut bindings = crate::quasi::Bindings::new();
    bindings.insert("pattern".to_string(), Node::string_lit(body));
    if !flags.is_empty() {
        bindings.insert("modifiers".to_string(), Node::string_lit(flags));
    }
    Some(QuasiBuilder::subst(
        "new ___.RegExp(@pattern, @modifiers?)",
        &bindings,
    ))
}

////////////////////////////////////////////////////////////////////////
// recurse - automatically recurse into some structures
////////////////////////////////////////////////////////////////////////

fn fire_recurse(
    _rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let transparent = match &node.kind {
        NodeKind::List
        | NodeKind::ArrayCtor
        | NodeKind::BreakStmt(_)
        | NodeKind::CaseStmt
        | NodeKind::Conditional
        | NodeKind::ContinueStmt(_)
        | NodeKind::DebuggerStmt
        | NodeKind::DefaultCaseStmt
        | NodeKind::ExpressionStmt
        | NodeKind::FormalParam
        | NodeKind::Identifier(_)
        | NodeKind::LitNum(_)
        | NodeKind::LitStr(_)
        | NodeKind::LitBool(_)
        | NodeKind::LitNull
        | NodeKind::WhileLoop
        | NodeKind::DoWhileLoop
        | NodeKind::ForLoop
        | NodeKind::Noop
        | NodeKind::ReturnStmt
        | NodeKind::SwitchStmt
        | NodeKind::ThrowStmt
        | NodeKind::CatchClause
        | NodeKind::FinallyClause => true,
        NodeKind::Operation(op) => {
            matches!(op.category(), OpCategory::Simple | OpCategory::Control)
        }
        _ => false,
    };
    if transparent {
        Some(rw.expand_all(node, scope, cx))
    } else {
        None
    }
}
