// Rewrite diagnostics: typed, parameterized message kinds with severity
// levels, collected in an append-only queue. Callers must treat any
// fatal-or-worse entry as "do not trust or execute the output tree".

use serde::Serialize;
use thiserror::Error;

use crate::ast::FilePos;

/// Severity of one message. Ordering is significant: `Fatal` outranks
/// `Error`, and so on down to `Lint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MessageLevel {
    Lint,
    Warning,
    Error,
    Fatal,
}

/// Every message the rewrite engine can emit. The `#[error]` strings are
/// the user-facing templates.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum MessageKind {
    // --- policy violations in user input ---
    #[error("\"with\" blocks are not allowed")]
    WithBlocksNotAllowed,

    #[error("variables cannot end in \"__\"")]
    VariablesCannotEndInDoubleUnderscore,

    #[error("properties cannot end in \"__\"")]
    PropertiesCannotEndInDoubleUnderscore,

    #[error("public properties cannot end in \"_\"")]
    PublicPropertiesCannotEndInUnderscore,

    #[error("imported symbols cannot end in \"_\"")]
    ImportedSymbolsCannotEndInUnderscore,

    #[error("label \"{label}\" cannot end in \"__\"")]
    LabelsCannotEndInDoubleUnderscore { label: String },

    #[error("member key may not end in \"__\"")]
    MemberKeyMayNotEndInDoubleUnderscore,

    #[error("cannot assign to \"this\"")]
    CannotAssignToThis,

    #[error("cannot assign to a free module variable")]
    CannotAssignToFreeVariable,

    #[error("cannot assign to a function name")]
    CannotAssignToFunctionName,

    #[error("the valueOf property must not be set")]
    ValueOfPropertyMustNotBeSet,

    #[error("the valueOf property must not be deleted")]
    ValueOfPropertyMustNotBeDeleted,

    #[error("map expression expected")]
    MapExpressionExpected,

    #[error("invalid operand to delete")]
    NotDeletable,

    #[error("selectors cannot end in \"__\"")]
    SelectorsCannotEndInDoubleUnderscore,

    #[error("public selectors cannot end in \"_\"")]
    PublicSelectorsCannotEndInUnderscore,

    #[error("member key may not end in \"_\"")]
    KeyMayNotEndInUnderscore,

    #[error("cannot redeclare a function name")]
    CannotRedeclareFunctionName,

    #[error("an anonymous function may not mention \"this\"")]
    AnonymousFunctionReferencesThis,

    #[error("cannot invoke \"new\" on an arbitrary expression")]
    NewOnArbitraryExpressionDisallowed,

    #[error("\"this\" cannot be used in the global context")]
    ThisInGlobalContext,

    #[error("identifier \"{name}\" contains non-ASCII characters")]
    NonAsciiIdentifier { name: String },

    #[error("cannot mask reserved name \"{name}\"")]
    CannotMaskReservedName { name: String },

    #[error("declaration of \"{name}\" masks an outer declaration")]
    MaskedVariable { name: String },

    // --- engine-consistency failures (bugs, not bad input) ---
    #[error("INTERNAL ERROR: node {kind} did not match any rule")]
    UnmatchedNodeLeftOver { kind: String },

    #[error("INTERNAL ERROR: illegal identifier \"{name}\" passed through the rewriter")]
    IllegalIdentifierLeftOver { name: String },
}

impl MessageKind {
    pub fn level(&self) -> MessageLevel {
        match self {
            MessageKind::MaskedVariable { .. } => MessageLevel::Lint,
            _ => MessageLevel::Fatal,
        }
    }

    /// True for engine-consistency failures, which indicate a gap in rule
    /// coverage rather than a problem with the input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            MessageKind::UnmatchedNodeLeftOver { .. }
                | MessageKind::IllegalIdentifierLeftOver { .. }
        )
    }
}

/// One recorded diagnostic: kind, severity, source position, and the name
/// of the rule that fired it (when one did).
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub kind: MessageKind,
    pub level: MessageLevel,
    pub pos: FilePos,
    pub rule: Option<&'static str>,
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.level {
            MessageLevel::Lint => "lint",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
            MessageLevel::Fatal => "fatal",
        };
        write!(f, "{level}: {} at {}", self.kind, self.pos)?;
        if let Some(rule) = self.rule {
            write!(f, " [{rule}]")?;
        }
        Ok(())
    }
}

/// Append-only diagnostic sink threaded through every rule firing.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: Vec<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: MessageKind, pos: FilePos, rule: Option<&'static str>) {
        let level = kind.level();
        self.messages.push(Message {
            kind,
            level,
            pos,
            rule,
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_level(&self) -> Option<MessageLevel> {
        self.messages.iter().map(|m| m.level).max()
    }

    /// Whether any fatal-or-worse message has been recorded; the output
    /// tree must not be trusted when this is true.
    pub fn has_fatal(&self) -> bool {
        self.messages.iter().any(|m| m.level >= MessageLevel::Fatal)
    }

    /// Machine-readable rendering of every recorded message.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.messages)
    }
}
