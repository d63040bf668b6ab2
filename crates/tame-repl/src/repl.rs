// REPL engine: parses a source fragment, rewrites it under the selected
// dialect, and packages the rewritten source plus diagnostics for display.

use tracing::debug;

use tame_core::{parse_program, rewrite, Dialect, Message, MessageQueue, ToSource};

/// Result of rewriting one source fragment.
pub struct RewriteOutcome {
    /// Rendered rewritten source; absent when parsing failed.
    pub rewritten: Option<String>,
    /// Parse failure, which never reaches the rewrite message queue.
    pub parse_error: Option<String>,
    pub messages: Vec<Message>,
    /// Whether the output must not be trusted.
    pub fatal: bool,
}

pub struct Repl {
    dialect: Dialect,
}

impl Repl {
    pub fn new(dialect: Dialect) -> Self {
        Repl { dialect }
    }

    pub fn set_dialect(&mut self, dialect: Dialect) {
        self.dialect = dialect;
    }

    pub fn rewrite_source(&mut self, source: &str) -> RewriteOutcome {
        debug!(dialect = ?self.dialect, bytes = source.len(), "rewriting fragment");
        let program = match parse_program(source) {
            Ok(program) => program,
            Err(e) => {
                return RewriteOutcome {
                    rewritten: None,
                    parse_error: Some(e.to_string()),
                    messages: Vec::new(),
                    fatal: true,
                }
            }
        };
        let mut messages = MessageQueue::new();
        let output = rewrite(&program, self.dialect, &mut messages);
        RewriteOutcome {
            rewritten: Some(output.to_source()),
            parse_error: None,
            fatal: messages.has_fatal(),
            messages: messages.messages().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violations_surface_as_fatal() {
        let mut repl = Repl::new(Dialect::Strict);
        let outcome = repl.rewrite_source("with (x) { y; }");
        assert!(outcome.fatal);
        assert!(!outcome.messages.is_empty());
        assert!(outcome.rewritten.is_some());
    }

    #[test]
    fn test_parse_errors_do_not_reach_the_queue() {
        let mut repl = Repl::new(Dialect::Strict);
        let outcome = repl.rewrite_source("var = ;");
        assert!(outcome.fatal);
        assert!(outcome.parse_error.is_some());
        assert!(outcome.messages.is_empty());
    }

    #[test]
    fn test_file_input_rewrites_like_source_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.js");
        std::fs::write(&path, "var x = 1; x + 2;").unwrap();
        let program = tame_core::parse_file(&path).unwrap();

        let mut repl = Repl::new(Dialect::Strict);
        let outcome = repl.rewrite_source("var x = 1; x + 2;");
        assert!(!outcome.fatal);
        assert_eq!(program.children.len(), 2);
    }
}
