// Final verification sweep over rewritten output: no author-written
// identifier using the reserved suffix may survive, and identifiers must
// be ASCII. Violations here are engine-consistency failures, not user
// errors, because the dialect chains are supposed to have eliminated or
// rejected every such name already.

use crate::ast::{Node, NodeKind};
use crate::reserved;
use crate::rewrite::messages::MessageKind;
use crate::rewrite::{Context, Rewriter, Rule};
use crate::scope::ScopeId;

use super::reject;

pub fn new_checks() -> Rewriter {
    Rewriter::new("checks", checks_rules())
}

pub fn checks_rules() -> Vec<Rule> {
    vec![
        Rule::new("illegalIdentifier", None, fire_illegal_identifier),
        Rule::new("nonAsciiIdentifier", None, fire_non_ascii_identifier),
        Rule::new("recurse", None, fire_recurse),
    ]
}

fn fire_illegal_identifier(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let NodeKind::Identifier(name) = &node.kind else {
        return None;
    };
    if !node.is_synthetic() && reserved::ends_reserved(name) {
        return reject(
            rule,
            node,
            MessageKind::IllegalIdentifierLeftOver { name: name.clone() },
            cx,
        );
    }
    None
}

fn fire_non_ascii_identifier(
    rule: &Rule,
    node: &Node,
    _scope: Option<ScopeId>,
    _rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    let NodeKind::Identifier(name) = &node.kind else {
        return None;
    };
    if !name.is_ascii() {
        return reject(
            rule,
            node,
            MessageKind::NonAsciiIdentifier { name: name.clone() },
            cx,
        );
    }
    None
}

// The sweep is structurally total: everything else just recurses.
fn fire_recurse(
    _rule: &Rule,
    node: &Node,
    scope: Option<ScopeId>,
    rw: &Rewriter,
    cx: &mut Context,
) -> Option<Node> {
    Some(rw.expand_all(node, scope, cx))
}
