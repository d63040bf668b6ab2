// Compiles pattern text into `QuasiNode` trees and memoizes the result.
// The same literal pattern string recurs across many rule firings, so
// compilation happens once per distinct text for the life of the process.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::trace;

use crate::ast::{Node, NodeKind};
use crate::parser;
use crate::quasi::{Bindings, Hole, HoleClass, PatternError, Quantifier, QuasiNode};

static PATTERN_CACHE: OnceLock<DashMap<String, Arc<QuasiNode>>> = OnceLock::new();

fn cache() -> &'static DashMap<String, Arc<QuasiNode>> {
    PATTERN_CACHE.get_or_init(DashMap::new)
}

/// Entry points for compiling patterns and matching/substituting by text.
pub struct QuasiBuilder;

impl QuasiBuilder {
    /// Compile pattern text, consulting the global cache first.
    pub fn compile(text: &str) -> Result<Arc<QuasiNode>, PatternError> {
        if let Some(found) = cache().get(text) {
            return Ok(Arc::clone(&found));
        }
        let compiled = Arc::new(compile_uncached(text)?);
        trace!(pattern = text, "compiled quasi pattern");
        cache().insert(text.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Compile a pattern that is a fixed part of a rule definition.
    ///
    /// # Panics
    /// Panics if the text does not compile; a rule shipping a malformed
    /// pattern is a programmer error, not a recoverable condition.
    pub fn pattern(text: &str) -> Arc<QuasiNode> {
        match Self::compile(text) {
            Ok(compiled) => compiled,
            Err(err) => panic!("rule pattern failed to compile: {err}"),
        }
    }

    /// Match `specimen` against the pattern `text`.
    pub fn match_text(text: &str, specimen: &Node) -> Option<Bindings> {
        Self::pattern(text).match_here(specimen)
    }

    /// Substitute `bindings` into the pattern `text`.
    ///
    /// # Panics
    /// Panics on a pattern-authoring error (malformed text, unbound
    /// required hole, multi-rooted result). See `try_subst` for the
    /// fallible form.
    pub fn subst(text: &str, bindings: &Bindings) -> Node {
        match Self::try_subst(text, bindings) {
            Ok(node) => node,
            Err(err) => panic!("substitution into {text:?} failed: {err}"),
        }
    }

    pub fn try_subst(text: &str, bindings: &Bindings) -> Result<Node, PatternError> {
        Self::compile(text)?.substitute(bindings)
    }
}

/// Build a binding map inline and substitute it into a pattern, in the
/// style of `substv!("@a = @b;", a = lhs, b = rhs)`.
#[macro_export]
macro_rules! substv {
    ($text:expr $(, $key:ident = $value:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut bindings = $crate::quasi::Bindings::new();
        $( bindings.insert(stringify!($key).to_string(), $value); )*
        $crate::quasi::QuasiBuilder::subst($text, &bindings)
    }};
}

fn compile_uncached(text: &str) -> Result<QuasiNode, PatternError> {
    let program = parser::parse_quasi_program(text).map_err(|source| PatternError::ParseFailed {
        text: text.to_string(),
        source,
    })?;
    if program.children.is_empty() {
        return Err(PatternError::EmptyPattern {
            text: text.to_string(),
        });
    }
    // A single-statement pattern unwraps so expression patterns match
    // expression nodes directly; explicit braces keep their Block.
    let root = if program.children.len() == 1 {
        let only = program.children.into_iter().next().unwrap();
        if only.kind == NodeKind::ExpressionStmt {
            only.children.into_iter().next().unwrap()
        } else {
            only
        }
    } else {
        program
    };
    Ok(convert(&root))
}

struct HoleSpec {
    stem: String,
    quantifier: Quantifier,
    suffix: Option<String>,
}

// `@name`, `@name?`, `@name*`, `@name+`; trailing underscores on the name
// become a suffix constraint (`@v__` is the hole `v` constrained to names
// ending in `__`).
fn parse_hole_text(name: &str) -> Option<HoleSpec> {
    let body = name.strip_prefix('@')?;
    let (body, quantifier) = match body.as_bytes().last() {
        Some(b'?') => (&body[..body.len() - 1], Quantifier::ZeroOrOne),
        Some(b'*') => (&body[..body.len() - 1], Quantifier::ZeroOrMore),
        Some(b'+') => (&body[..body.len() - 1], Quantifier::OneOrMore),
        _ => (body, Quantifier::One),
    };
    let stem = body.trim_end_matches('_');
    let suffix = &body[stem.len()..];
    Some(HoleSpec {
        stem: stem.to_string(),
        quantifier,
        suffix: if suffix.is_empty() {
            None
        } else {
            Some(suffix.to_string())
        },
    })
}

fn identifier_hole_text(node: &Node) -> Option<&str> {
    match &node.kind {
        NodeKind::Identifier(name) if name.starts_with('@') => Some(name),
        _ => None,
    }
}

// A `Reference` wrapping a plain (suffix-free) hole marker.
fn plain_reference_hole(node: &Node) -> Option<HoleSpec> {
    if node.kind != NodeKind::Reference {
        return None;
    }
    let spec = parse_hole_text(identifier_hole_text(&node.children[0])?)?;
    if spec.suffix.is_some() {
        return None;
    }
    Some(spec)
}

fn convert(node: &Node) -> QuasiNode {
    // A hole marker in identifier position (declaration name, function
    // name, formal-parameter name, catch variable).
    if let Some(text) = identifier_hole_text(node) {
        let spec = parse_hole_text(text).unwrap();
        return QuasiNode::Hole(Hole {
            name: spec.stem,
            class: HoleClass::Identifier,
            quantifier: spec.quantifier,
            suffix: spec.suffix,
        });
    }

    match &node.kind {
        NodeKind::Reference => {
            if let Some(text) = identifier_hole_text(&node.children[0]) {
                let spec = parse_hole_text(text).unwrap();
                if spec.suffix.is_some() {
                    // The reference stays literal; the hole constrains the
                    // identifier inside it and binds that identifier.
                    return QuasiNode::Literal {
                        kind: NodeKind::Reference,
                        children: vec![QuasiNode::Hole(Hole {
                            name: spec.stem,
                            class: HoleClass::Identifier,
                            quantifier: spec.quantifier,
                            suffix: spec.suffix,
                        })],
                    };
                }
                return QuasiNode::Hole(Hole {
                    name: spec.stem,
                    class: HoleClass::Expression,
                    quantifier: spec.quantifier,
                    suffix: None,
                });
            }
        }
        NodeKind::ExpressionStmt => {
            // A statement that is nothing but a hole marker matches any
            // statement, not just expression statements.
            if let Some(spec) = plain_reference_hole(&node.children[0]) {
                return QuasiNode::Hole(Hole {
                    name: spec.stem,
                    class: HoleClass::Statement,
                    quantifier: spec.quantifier,
                    suffix: None,
                });
            }
        }
        NodeKind::FormalParam => {
            if let Some(text) = identifier_hole_text(&node.children[0]) {
                let spec = parse_hole_text(text).unwrap();
                return QuasiNode::Hole(Hole {
                    name: spec.stem,
                    class: HoleClass::FormalParam,
                    quantifier: spec.quantifier,
                    suffix: spec.suffix,
                });
            }
        }
        NodeKind::ObjectCtor => {
            // `({@keys*: @vals*})` pairs the even and odd children.
            if node.children.len() == 2 {
                let key_spec = identifier_hole_text(&node.children[0]).and_then(parse_hole_text);
                let val_spec = plain_reference_hole(&node.children[1]);
                if let (Some(key_spec), Some(val_spec)) = (key_spec, val_spec) {
                    if matches!(
                        key_spec.quantifier,
                        Quantifier::ZeroOrMore | Quantifier::OneOrMore
                    ) {
                        return QuasiNode::ObjectPairs {
                            keys: Hole {
                                name: key_spec.stem,
                                class: HoleClass::StringKey,
                                quantifier: key_spec.quantifier,
                                suffix: key_spec.suffix,
                            },
                            vals: Hole {
                                name: val_spec.stem,
                                class: HoleClass::Expression,
                                quantifier: val_spec.quantifier,
                                suffix: None,
                            },
                        };
                    }
                }
            }
        }
        _ => {}
    }

    QuasiNode::Literal {
        kind: node.kind.clone(),
        children: node.children.iter().map(convert).collect(),
    }
}
