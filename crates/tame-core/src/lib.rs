//! # Tame Core
//!
//! Core implementation of the tame capability-security rewriter, including:
//! - Parse tree definitions for the script dialect
//! - Hand-written lexer and recursive-descent parser (with quasi-hole mode)
//! - Quasi-pattern engine: match and substitute over parse trees
//! - Lexical scope tracker with temporary synthesis and statement hoisting
//! - Rule-chain dispatcher and the strict/compat/checks rule sets
//!
//! This crate provides the foundational components that can be used to
//! build rewriting front ends (CLI, REPL, embedding into a pipeline).

#![warn(clippy::all)]

pub mod ast;
pub mod parser;
pub mod quasi;
pub mod reserved;
pub mod rewrite;
pub mod rules;
pub mod scope;

// Re-export commonly used types
pub use ast::{FilePos, Node, NodeKind, Op, ToSource};
pub use parser::{parse_file, parse_program, ParseError};
pub use quasi::{Bindings, PatternError, QuasiBuilder, QuasiNode};
pub use rewrite::messages::{Message, MessageKind, MessageLevel, MessageQueue};
pub use rewrite::{Context, Rewriter, Rule};
pub use rules::{new_checks, new_compat, new_strict};
pub use scope::{ScopeArena, ScopeId};

/// Rewriter version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for tame core components
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tame_core=info".parse().unwrap()),
        )
        .init();
}

/// Which rule chain to apply to author-written input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// The safe dialect: reject everything outside the discipline.
    Strict,
    /// The legacy-tolerant dialect, layered in front of strict.
    Compat,
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Dialect::Strict),
            "compat" => Ok(Dialect::Compat),
            other => Err(format!("unknown dialect {other:?} (expected strict or compat)")),
        }
    }
}

/// Rewrite a whole program under the chosen dialect, then run the final
/// reference sweep. Callers must treat the output as untrusted whenever
/// `messages.has_fatal()` returns true afterwards.
pub fn rewrite(program: &Node, dialect: Dialect, messages: &mut MessageQueue) -> Node {
    let rewritten = match dialect {
        Dialect::Strict => new_strict().rewrite(program, messages),
        Dialect::Compat => {
            let tolerant = new_compat().rewrite(program, messages);
            if messages.has_fatal() {
                return tolerant;
            }
            new_strict().rewrite(&tolerant, messages)
        }
    };
    if messages.has_fatal() {
        return rewritten;
    }
    new_checks().rewrite(&rewritten, messages)
}
