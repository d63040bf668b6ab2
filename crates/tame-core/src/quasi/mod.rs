// Quasi-pattern engine: compiled pattern trees that can both match a
// specimen parse tree (producing a binding map from hole names to matched
// subtrees) and rebuild a concrete tree from a binding map.
//
// A pattern is ordinary script text in which `@name` marks a hole. A hole
// carries a quantifier (`@x` exactly one, `@x?` optional, `@x*` zero or
// more, `@x+` one or more) and a class inferred from its syntactic
// position (expression, statement, identifier, formal parameter). A hole
// spelled with trailing underscores (`@v__`, `@lhs___`) compiles to an
// identifier-level hole constrained to names ending with that suffix; this
// is how the naming-convention rules express "any reference whose name ends
// in the reserved suffix".

pub mod builder;

#[cfg(test)]
mod tests;

pub use builder::QuasiBuilder;

use std::collections::VecDeque;

use indexmap::IndexMap;
use thiserror::Error;

use crate::ast::{Node, NodeKind};
use crate::parser::ParseError;

/// Hole name -> matched subtree. Multi-holes bind a `List` container.
/// Insertion order is preserved so diagnostics and tests are deterministic.
pub type Bindings = IndexMap<String, Node>;

/// Pattern-authoring failure. These indicate a defective rule, not bad
/// user input, and are never surfaced as user diagnostics.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("pattern {text:?} does not parse: {source}")]
    ParseFailed {
        text: String,
        #[source]
        source: ParseError,
    },

    #[error("pattern {text:?} is empty")]
    EmptyPattern { text: String },

    #[error("substitution references unbound hole @{name}")]
    UnboundHole { name: String },

    #[error("multi-hole @{name} must be bound to a List container")]
    NotAContainer { name: String },

    #[error("non-empty hole @{name} bound to an empty container")]
    EmptyNonemptyHole { name: String },

    #[error("object pattern holes @{keys}/@{vals} bound to containers of different lengths")]
    KeyValueMismatch { keys: String, vals: String },

    #[error("substitution produced {count} roots where one was expected")]
    MultipleRoots { count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Quantifier {
    pub fn suffix(self) -> &'static str {
        match self {
            Quantifier::One => "",
            Quantifier::ZeroOrOne => "?",
            Quantifier::ZeroOrMore => "*",
            Quantifier::OneOrMore => "+",
        }
    }
}

/// What a hole may consume, inferred from where it appears in the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoleClass {
    Expression,
    Statement,
    Identifier,
    FormalParam,
    StringKey,
}

impl HoleClass {
    fn admits(self, node: &Node) -> bool {
        match self {
            HoleClass::Expression => node.is_expression(),
            HoleClass::Statement => node.is_statement(),
            HoleClass::Identifier => matches!(node.kind, NodeKind::Identifier(_)),
            HoleClass::FormalParam => matches!(node.kind, NodeKind::FormalParam),
            HoleClass::StringKey => matches!(node.kind, NodeKind::LitStr(_)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Hole {
    pub name: String,
    pub class: HoleClass,
    pub quantifier: Quantifier,
    /// Underscore-suffix constraint on identifier holes.
    pub suffix: Option<String>,
}

impl Hole {
    fn admits(&self, node: &Node) -> bool {
        if !self.class.admits(node) {
            return false;
        }
        match &self.suffix {
            Some(suffix) => node
                .identifier_name()
                .is_some_and(|name| name.ends_with(suffix.as_str())),
            None => true,
        }
    }
}

/// One compiled pattern node. Immutable after construction; safe to share
/// across rewrites (the builder caches compiled patterns by text).
#[derive(Debug, Clone)]
pub enum QuasiNode {
    /// Requires structural equality of kind/payload and positional match of
    /// all children.
    Literal {
        kind: NodeKind,
        children: Vec<QuasiNode>,
    },
    Hole(Hole),
    /// The paired object-literal form `({@keys*: @vals*})`: keys bind the
    /// even children of an `ObjectCtor`, values the odd ones.
    ObjectPairs { keys: Hole, vals: Hole },
}

/// One position in a searched tree where a pattern matched.
#[derive(Debug)]
pub struct QuasiMatch<'a> {
    pub root: &'a Node,
    pub bindings: Bindings,
}

impl QuasiNode {
    /// Attempt a structural match of this whole pattern against one
    /// specimen node.
    pub fn match_here(&self, specimen: &Node) -> Option<Bindings> {
        let mut bindings = Bindings::new();
        let mut specimens: VecDeque<&Node> = VecDeque::from([specimen]);
        if self.consume(&mut specimens, &mut bindings) && specimens.is_empty() {
            Some(bindings)
        } else {
            None
        }
    }

    /// Report every position (pre-order) in `specimen` where this pattern
    /// matches, each with an independent binding map.
    pub fn search<'a>(&self, specimen: &'a Node) -> Vec<QuasiMatch<'a>> {
        let mut results = Vec::new();
        let mut stack = vec![specimen];
        while let Some(node) = stack.pop() {
            if let Some(bindings) = self.match_here(node) {
                results.push(QuasiMatch {
                    root: node,
                    bindings,
                });
            }
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        results
    }

    /// Rebuild a concrete tree from this pattern and a binding map. Exactly
    /// one root must result.
    pub fn substitute(&self, bindings: &Bindings) -> Result<Node, PatternError> {
        let mut out = Vec::new();
        self.create_substitutes(&mut out, bindings)?;
        if out.len() == 1 {
            Ok(out.pop().unwrap())
        } else {
            Err(PatternError::MultipleRoots { count: out.len() })
        }
    }

    fn consume(&self, specimens: &mut VecDeque<&Node>, bindings: &mut Bindings) -> bool {
        match self {
            QuasiNode::Literal { kind, children } => {
                let Some(front) = specimens.front() else {
                    return false;
                };
                if front.kind != *kind {
                    return false;
                }
                let mut child_specimens: VecDeque<&Node> = front.children.iter().collect();
                for quasi_child in children {
                    if !quasi_child.consume(&mut child_specimens, bindings) {
                        return false;
                    }
                }
                if !child_specimens.is_empty() {
                    return false;
                }
                specimens.pop_front();
                true
            }
            QuasiNode::Hole(hole) => match hole.quantifier {
                Quantifier::One => {
                    let Some(front) = specimens.front() else {
                        return false;
                    };
                    if !hole.admits(front) {
                        return false;
                    }
                    let matched = (*front).clone();
                    if !bind_checked(bindings, &hole.name, matched) {
                        return false;
                    }
                    specimens.pop_front();
                    true
                }
                Quantifier::ZeroOrOne => {
                    if let Some(front) = specimens.front() {
                        if hole.admits(front) {
                            let matched = (*front).clone();
                            if !bind_checked(bindings, &hole.name, matched) {
                                return false;
                            }
                            specimens.pop_front();
                        }
                    }
                    // Absence is not a failure.
                    true
                }
                Quantifier::ZeroOrMore | Quantifier::OneOrMore => {
                    let mut run = Vec::new();
                    while let Some(front) = specimens.front() {
                        if !hole.admits(front) {
                            break;
                        }
                        run.push((*front).clone());
                        specimens.pop_front();
                    }
                    if hole.quantifier == Quantifier::OneOrMore && run.is_empty() {
                        return false;
                    }
                    bind_checked(bindings, &hole.name, Node::list(run))
                }
            },
            QuasiNode::ObjectPairs { keys, vals } => {
                let Some(front) = specimens.front() else {
                    return false;
                };
                if front.kind != NodeKind::ObjectCtor {
                    return false;
                }
                let mut key_nodes = Vec::new();
                let mut val_nodes = Vec::new();
                for pair in front.children.chunks(2) {
                    let [key, value] = pair else {
                        return false;
                    };
                    if !keys.admits(key) || !vals.admits(value) {
                        return false;
                    }
                    key_nodes.push(key.clone());
                    val_nodes.push(value.clone());
                }
                if keys.quantifier == Quantifier::OneOrMore && key_nodes.is_empty() {
                    return false;
                }
                if !bind_checked(bindings, &keys.name, Node::list(key_nodes)) {
                    return false;
                }
                if !bind_checked(bindings, &vals.name, Node::list(val_nodes)) {
                    return false;
                }
                specimens.pop_front();
                true
            }
        }
    }

    fn create_substitutes(
        &self,
        out: &mut Vec<Node>,
        bindings: &Bindings,
    ) -> Result<(), PatternError> {
        match self {
            QuasiNode::Literal { kind, children } => {
                let mut new_children = Vec::new();
                for quasi_child in children {
                    quasi_child.create_substitutes(&mut new_children, bindings)?;
                }
                // Nodes the pattern itself contributes are engine-generated
                // and marked synthetic; bound subtrees keep their own flags.
                let node = Node::new(kind.clone(), new_children).synthetic();
                debug_assert!(node.arity_ok(), "substitution built invalid {}", kind.name());
                out.push(node);
                Ok(())
            }
            QuasiNode::Hole(hole) => match hole.quantifier {
                Quantifier::One => match bindings.get(&hole.name) {
                    Some(node) => {
                        out.push(node.clone());
                        Ok(())
                    }
                    None => Err(PatternError::UnboundHole {
                        name: hole.name.clone(),
                    }),
                },
                Quantifier::ZeroOrOne => {
                    if let Some(node) = bindings.get(&hole.name) {
                        out.push(node.clone());
                    }
                    Ok(())
                }
                Quantifier::ZeroOrMore | Quantifier::OneOrMore => {
                    let container = bindings.get(&hole.name).ok_or(PatternError::UnboundHole {
                        name: hole.name.clone(),
                    })?;
                    if container.kind != NodeKind::List {
                        return Err(PatternError::NotAContainer {
                            name: hole.name.clone(),
                        });
                    }
                    if hole.quantifier == Quantifier::OneOrMore && container.children.is_empty() {
                        return Err(PatternError::EmptyNonemptyHole {
                            name: hole.name.clone(),
                        });
                    }
                    // Splice the container's children flat at this position.
                    out.extend(container.children.iter().cloned());
                    Ok(())
                }
            },
            QuasiNode::ObjectPairs { keys, vals } => {
                let key_container =
                    bindings.get(&keys.name).ok_or(PatternError::UnboundHole {
                        name: keys.name.clone(),
                    })?;
                let val_container =
                    bindings.get(&vals.name).ok_or(PatternError::UnboundHole {
                        name: vals.name.clone(),
                    })?;
                if key_container.kind != NodeKind::List {
                    return Err(PatternError::NotAContainer {
                        name: keys.name.clone(),
                    });
                }
                if val_container.kind != NodeKind::List {
                    return Err(PatternError::NotAContainer {
                        name: vals.name.clone(),
                    });
                }
                if key_container.children.len() != val_container.children.len() {
                    return Err(PatternError::KeyValueMismatch {
                        keys: keys.name.clone(),
                        vals: vals.name.clone(),
                    });
                }
                let mut children = Vec::new();
                for (key, value) in key_container
                    .children
                    .iter()
                    .zip(val_container.children.iter())
                {
                    children.push(key.clone());
                    children.push(value.clone());
                }
                out.push(Node::new(NodeKind::ObjectCtor, children).synthetic());
                Ok(())
            }
        }
    }
}

// A hole name bound twice must bind deep-equal subtrees; this is how a
// pattern expresses "the same subexpression appears in both positions".
fn bind_checked(bindings: &mut Bindings, name: &str, node: Node) -> bool {
    match bindings.get(name) {
        Some(existing) => *existing == node,
        None => {
            bindings.insert(name.to_string(), node);
            true
        }
    }
}
