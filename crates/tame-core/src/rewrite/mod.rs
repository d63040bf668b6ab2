// Rule chain and dispatcher.
//
// A rewriter holds an ordered list of named rules. `expand` tries each rule
// in turn and takes the first one that returns `Some` — rule order is part
// of the observable contract, since specific rules (reserved-suffix
// rejections, synthetic pass-throughs) are deliberately placed before the
// general ones. A rule "rejects" a construct by pushing a fatal message and
// returning the input unchanged; the dispatcher does not special-case
// rejection. A node no rule claims is an engine bug and is reported with a
// distinct internal-error message.

pub mod messages;

#[cfg(test)]
mod tests;

use tracing::{debug, trace};

use crate::ast::{Node, NodeKind, Op};
use crate::quasi::{Bindings, QuasiBuilder};
use crate::reserved;
use crate::scope::{ScopeArena, ScopeId};
use crate::substv;
use messages::{MessageKind, MessageQueue};

/// Mutable state threaded through one rewrite pass: the scope arena and
/// the diagnostic sink.
pub struct Context<'a> {
    pub scopes: &'a mut ScopeArena,
    pub messages: &'a mut MessageQueue,
}

/// A rule firing: `Some(replacement)` claims the node (first match wins),
/// `None` passes it to the next rule in the chain.
pub type FireFn = fn(&Rule, &Node, Option<ScopeId>, &Rewriter, &mut Context) -> Option<Node>;

/// One rewrite rule: a name for diagnostics, an optional pattern compiled
/// on first use, and the firing function. Immutable once constructed.
pub struct Rule {
    pub name: &'static str,
    pub pattern: Option<&'static str>,
    fire: FireFn,
}

impl Rule {
    pub const fn new(name: &'static str, pattern: Option<&'static str>, fire: FireFn) -> Self {
        Rule {
            name,
            pattern,
            fire,
        }
    }

    /// Match this rule's declared pattern against `node`.
    ///
    /// # Panics
    /// Panics if the rule declares no pattern; calling this from such a
    /// rule is a programmer error.
    pub fn match_node(&self, node: &Node) -> Option<Bindings> {
        let pattern = self
            .pattern
            .unwrap_or_else(|| panic!("rule {:?} has no pattern", self.name));
        QuasiBuilder::match_text(pattern, node)
    }
}

/// An ordered, named rule chain. Stateless after construction; reusable
/// across any number of rewrites.
pub struct Rewriter {
    pub name: &'static str,
    rules: Vec<Rule>,
}

impl Rewriter {
    /// # Panics
    /// Panics if two rules share a name; duplicate names make diagnostics
    /// ambiguous and always indicate an authoring mistake.
    pub fn new(name: &'static str, rules: Vec<Rule>) -> Self {
        for (i, rule) in rules.iter().enumerate() {
            if rules[..i].iter().any(|other| other.name == rule.name) {
                panic!("duplicate rule name {:?} in rewriter {name:?}", rule.name);
            }
        }
        Rewriter { name, rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Top entry point: rewrite a whole program. The root scope is created
    /// by the chain's module rule when it sees `scope == None`. Callers
    /// must check `messages.has_fatal()` before trusting the result.
    pub fn rewrite(&self, program: &Node, messages: &mut MessageQueue) -> Node {
        debug!(rewriter = self.name, "rewrite pass start");
        let mut scopes = ScopeArena::new();
        let mut cx = Context {
            scopes: &mut scopes,
            messages,
        };
        self.expand(program, None, &mut cx)
    }

    /// Rewrite one node: first matching rule wins. An unclaimed node is an
    /// internal error, reported distinctly from user policy violations.
    pub fn expand(&self, node: &Node, scope: Option<ScopeId>, cx: &mut Context) -> Node {
        for rule in &self.rules {
            if let Some(result) = (rule.fire)(rule, node, scope, self, cx) {
                trace!(rule = rule.name, kind = node.kind.name(), "rule fired");
                return result;
            }
        }
        cx.messages.add(
            MessageKind::UnmatchedNodeLeftOver {
                kind: node.kind.name().to_string(),
            },
            node.pos,
            None,
        );
        node.clone()
    }

    /// Rewrite every child independently and reassemble the same kind of
    /// node around the results.
    pub fn expand_all(&self, node: &Node, scope: Option<ScopeId>, cx: &mut Context) -> Node {
        let children = node
            .children
            .iter()
            .map(|child| self.expand(child, scope, cx))
            .collect();
        let mut result = Node::new(node.kind.clone(), children).at(node.pos);
        result.synthetic = node.synthetic;
        result
    }
}

// ----- helpers shared by the rule sets -----

/// A synthetic reference to `name`, for routing through the runtime API.
pub fn new_reference(name: &str) -> Node {
    Node::reference_to(Node::ident(name).synthetic()).synthetic()
}

/// Wrap an identifier (typically a scope-synthesized temporary) in a
/// synthetic reference.
pub fn ref_to(ident: Node) -> Node {
    Node::reference_to(ident).synthetic()
}

/// String literal carrying the identifier text of a reference,
/// declaration, or bare identifier, at that node's position.
pub fn to_string_literal(node: &Node) -> Node {
    Node::string_lit(node.identifier_name().unwrap_or_default()).at(node.pos)
}

/// Fold expressions into a comma chain; empty input yields `void 0`.
pub fn new_comma_operation(operands: Vec<Node>) -> Node {
    let mut iter = operands.into_iter();
    let Some(first) = iter.next() else {
        return Node::operation(Op::Void, vec![Node::num_lit(0.0)]).synthetic();
    };
    iter.fold(first, |acc, operand| {
        Node::operation(Op::Comma, vec![acc, operand]).synthetic()
    })
}

/// Whether this node's naming identifier is engine-generated. References
/// carry the marker on the identifier inside them.
pub fn ident_is_synthetic(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Identifier(_) => node.is_synthetic(),
        NodeKind::Reference | NodeKind::Declaration | NodeKind::FormalParam => {
            node.children[0].is_synthetic()
        }
        _ => node.is_synthetic(),
    }
}

/// Preamble bindings for a function body: a frozen snapshot of the
/// arguments object and a local receiver binding, each only when the body
/// actually uses it.
pub fn function_head_declarations(scope: ScopeId, cx: &mut Context) -> Node {
    let mut stmts = Vec::new();
    if cx.scopes.has_free_arguments(scope) {
        stmts.push(substv!(
            "var @la = ___.args(@ga);",
            la = Node::ident(reserved::LOCAL_ARGUMENTS).synthetic(),
            ga = new_reference(reserved::ARGUMENTS),
        ));
    }
    if cx.scopes.has_free_this(scope) {
        stmts.push(substv!(
            "var @lt = @gt;",
            lt = Node::ident(reserved::LOCAL_THIS).synthetic(),
            gt = new_reference(reserved::THIS),
        ));
    }
    Node::list(stmts)
}

/// Reject author-written formals that use the reserved suffix.
pub fn check_formals(params: &Node, cx: &mut Context) {
    for param in &params.children {
        if !ident_is_synthetic(param) {
            if let Some(name) = param.identifier_name() {
                if reserved::ends_reserved(name) {
                    cx.messages.add(
                        MessageKind::VariablesCannotEndInDoubleUnderscore,
                        param.pos,
                        None,
                    );
                }
            }
        }
    }
}

/// Whether any string literal in the container ends with `suffix`.
pub fn literals_end_with(container: &Node, suffix: &str) -> bool {
    container.children.iter().any(|child| {
        matches!(&child.kind, NodeKind::LitStr(value) if value.ends_with(suffix))
    })
}

/// Whether any string literal in the container equals `text`.
pub fn literals_contain(container: &Node, text: &str) -> bool {
    container
        .children
        .iter()
        .any(|child| matches!(&child.kind, NodeKind::LitStr(value) if value == text))
}

/// Rewrite every binding in place; used where a substitution wants all
/// matched parts rewritten verbatim.
pub fn expand_entries(
    bindings: &mut Bindings,
    scope: ScopeId,
    rw: &Rewriter,
    cx: &mut Context,
) {
    let keys: Vec<String> = bindings.keys().cloned().collect();
    for key in keys {
        let expanded = rw.expand(&bindings[&key], Some(scope), cx);
        bindings.insert(key, expanded);
    }
}

/// Pin `value` in a start-of-scope temporary: returns the reference to use
/// in its place and the initializing assignment to run first.
pub fn reuse(value: &Node, scope: ScopeId, rw: &Rewriter, cx: &mut Context) -> (Node, Node) {
    let tmp = cx.scopes.declare_start_of_scope_temp_variable(scope);
    let reference = ref_to(tmp);
    let definition = substv!(
        "@tmpRef = @rhs;",
        tmpRef = reference.clone(),
        rhs = rw.expand(value, Some(scope), cx),
    );
    (reference, definition)
}

/// `reuse` over an argument container: (references, initializers).
pub fn reuse_all(
    arguments: &Node,
    scope: ScopeId,
    rw: &Rewriter,
    cx: &mut Context,
) -> (Node, Node) {
    let mut refs = Vec::new();
    let mut definitions = Vec::new();
    for argument in &arguments.children {
        let (reference, definition) = reuse(argument, scope, rw, cx);
        refs.push(reference);
        definitions.push(definition);
    }
    (Node::list(refs), Node::list(definitions))
}

/// Rewrite one member of an object-literal-like position. An anonymous
/// function mentioning the receiver keyword is a method of the enclosing
/// object and is wrapped accordingly; anything else expands normally.
pub fn expand_member(member: &Node, scope: ScopeId, rw: &Rewriter, cx: &mut Context) -> Node {
    if let Some(bindings) = QuasiBuilder::match_text("(function (@ps*) { @bs*; })", member) {
        let member_scope = cx.scopes.from_function_constructor(scope, member, cx.messages);
        if cx.scopes.has_free_this(member_scope) {
            check_formals(&bindings["ps"], cx);
            let bs = rw.expand(&bindings["bs"], Some(member_scope), cx);
            let fh = function_head_declarations(member_scope, cx);
            let stmts = Node::list(cx.scopes.take_start_statements(member_scope));
            return substv!(
                "___.method(function (@ps*) { @fh*; @stmts*; @bs*; });",
                ps = bindings["ps"].clone(),
                bs = bs,
                fh = fh,
                stmts = stmts,
            );
        }
    }
    rw.expand(member, Some(scope), cx)
}

fn is_local_reference(expr: &Node, scope: ScopeId, cx: &Context) -> bool {
    expr.is_reference()
        && !cx
            .scopes
            .is_imported(scope, expr.identifier_name().unwrap_or_default())
}

fn is_imports_reference(expr: &Node) -> bool {
    expr.is_reference_to(reserved::IMPORTS)
}

enum AssignKind {
    /// A plain local reference; assignment stays a raw `=`.
    Simple { lhs: Node },
    /// A keyed property slot; assignment routes through the runtime.
    Keyed {
        set_flavor: &'static str,
        object: Node,
        key: Node,
    },
}

/// The pieces of a read-modify-write target (`x += e`, `o.p++`): rewritten
/// read expression, temporaries needed to evaluate the target exactly
/// once, and a way to build the rewritten store.
pub struct ReadAssignOperands {
    temporaries: Vec<Node>,
    rvalue: Node,
    assign: AssignKind,
}

impl ReadAssignOperands {
    pub fn temporaries(&self) -> &[Node] {
        &self.temporaries
    }

    pub fn temporaries_as_container(&self) -> Node {
        Node::list(self.temporaries.clone())
    }

    pub fn rvalue(&self) -> &Node {
        &self.rvalue
    }

    pub fn is_simple_lvalue(&self) -> bool {
        self.temporaries.is_empty() && matches!(self.assign, AssignKind::Simple { .. })
    }

    /// Build the store of `rvalue` back into the deconstructed target.
    pub fn make_assignment(&self, rvalue: Node) -> Node {
        match &self.assign {
            AssignKind::Simple { lhs } => {
                Node::operation(Op::Assign, vec![lhs.clone(), rvalue]).synthetic()
            }
            AssignKind::Keyed {
                set_flavor,
                object,
                key,
            } => substv!(
                "___.@flavorOfSet(@object, @key, @rvalue)",
                flavorOfSet = new_reference(*set_flavor),
                object = object.clone(),
                key = key.clone(),
                rvalue = rvalue,
            ),
        }
    }
}

/// Split a read/write target into its rewritten read and a store builder,
/// allocating start-of-scope temporaries to pin evaluation order where the
/// target has side effects. Returns `None` (with a message recorded) for
/// an assignment to a free variable, and for operands that are not
/// lvalues.
pub fn deconstruct_read_assign_operand(
    rule: &Rule,
    operand: &Node,
    scope: ScopeId,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<ReadAssignOperands> {
    match &operand.kind {
        NodeKind::Reference => {
            let name = operand.identifier_name().unwrap_or_default();
            if cx.scopes.is_imported(scope, name) {
                cx.messages.add(
                    MessageKind::CannotAssignToFreeVariable,
                    operand.pos,
                    Some(rule.name),
                );
                return None;
            }
            let lhs = rw.expand(operand, Some(scope), cx);
            Some(ReadAssignOperands {
                temporaries: Vec::new(),
                rvalue: lhs.clone(),
                assign: AssignKind::Simple { lhs },
            })
        }
        NodeKind::Operation(Op::Index) => side_effecting_operand(
            &operand.children[0],
            operand.children[1].clone(),
            scope,
            rw,
            cx,
        ),
        NodeKind::Operation(Op::Member) => side_effecting_operand(
            &operand.children[0],
            to_string_literal(&operand.children[1]),
            scope,
            rw,
            cx,
        ),
        _ => {
            // Not an lvalue; the grammar should never produce this, so it
            // is reported as an engine-consistency failure.
            cx.messages.add(
                MessageKind::UnmatchedNodeLeftOver {
                    kind: operand.kind.name().to_string(),
                },
                operand.pos,
                Some(rule.name),
            );
            None
        }
    }
}

fn side_effecting_operand(
    raw_object: &Node,
    raw_key: Node,
    scope: ScopeId,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<ReadAssignOperands> {
    let mut temporaries = Vec::new();
    let left = rw.expand(raw_object, Some(scope), cx);
    let right = rw.expand(&raw_key, Some(scope), cx);

    // A simple key cannot disturb the object, so neither needs pinning; a
    // side-effecting key forces the object into a temporary first.
    let key_is_simple = right.is_literal() || is_local_reference(&right, scope, cx);

    let object = if key_is_simple && (is_local_reference(&left, scope, cx) || is_imports_reference(&left))
    {
        left
    } else {
        let tmp = cx.scopes.declare_start_of_scope_temp_variable(scope);
        temporaries.push(substv!(
            "@tmpVar = @left;",
            tmpVar = ref_to(tmp.clone()),
            left = left,
        ));
        ref_to(tmp)
    };

    let key = if key_is_simple {
        right
    } else {
        let tmp = cx.scopes.declare_start_of_scope_temp_variable(scope);
        temporaries.push(substv!(
            "@tmpVar = @right;",
            tmpVar = ref_to(tmp.clone()),
            right = right,
        ));
        ref_to(tmp)
    };

    // Addressed from the receiver keyword means a protected access.
    let is_prop = raw_object.is_reference_to(reserved::THIS);
    let (read_flavor, set_flavor) = if is_prop {
        ("readProp", "setProp")
    } else {
        ("readPub", "setPub")
    };

    let rvalue = substv!(
        "___.@flavorOfRead(@object, @key)",
        flavorOfRead = new_reference(read_flavor),
        object = object.clone(),
        key = key.clone(),
    );

    Some(ReadAssignOperands {
        temporaries,
        rvalue,
        assign: AssignKind::Keyed {
            set_flavor,
            object,
            key,
        },
    })
}
