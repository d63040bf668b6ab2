// Policy content: the concrete rule sets executed by the rewrite engine.
// `strict` is the safe dialect; `compat` is the legacy-tolerant dialect
// whose output is meant to be run through `strict` afterwards; `checks` is
// the final sweep verifying no reserved identifier survived unmarked.

pub mod checks;
pub mod compat;
pub mod strict;

#[cfg(test)]
mod checks_tests;

#[cfg(test)]
mod compat_tests;

#[cfg(test)]
mod strict_tests;

pub use checks::new_checks;
pub use compat::new_compat;
pub use strict::new_strict;

use crate::ast::Node;
use crate::rewrite::messages::MessageKind;
use crate::rewrite::{Context, Rule};

// A rule rejects a construct by recording the message and claiming the
// node unchanged; the caller sees the fatal entry in the queue.
pub(crate) fn reject(rule: &Rule, node: &Node, kind: MessageKind, cx: &mut Context) -> Option<Node> {
    cx.messages.add(kind, node.pos, Some(rule.name));
    Some(node.clone())
}
