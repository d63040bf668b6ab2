// Source code generation from the parse tree.
// Reconstructs script text from nodes for diagnostics, tests, and the REPL.
// Output is compact (single spaces, no pretty indentation) but fully
// parenthesized where precedence requires it, and re-parses to an equal tree.

use super::{Node, NodeKind, Op};

/// Trait for types that can generate their source code representation
pub trait ToSource {
    fn to_source(&self) -> String;
}

impl ToSource for Node {
    fn to_source(&self) -> String {
        if self.is_expression() {
            expr_source(self, 0)
        } else {
            stmt_source(self)
        }
    }
}

// Expression precedence levels; higher binds tighter.
fn precedence(op: Op) -> u8 {
    use Op::*;
    match op {
        Comma => 1,
        Assign | AssignAdd | AssignSub | AssignMul | AssignDiv | AssignMod => 2,
        Ternary => 3,
        Or => 4,
        And => 5,
        BitOr => 6,
        BitXor => 7,
        BitAnd => 8,
        Eq | Ne | StrictEq | StrictNe => 9,
        Lt | Gt | Le | Ge | In | InstanceOf => 10,
        Shl | Shr | UShr => 11,
        Add | Sub => 12,
        Mul | Div | Mod => 13,
        Not | BitNot | Neg | Pos | TypeOf | Void | Delete | PreIncr | PreDecr => 14,
        PostIncr | PostDecr => 15,
        New => 16,
        Call | Member | Index => 17,
    }
}

fn binary_token(op: Op) -> &'static str {
    use Op::*;
    match op {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Mod => "%",
        Eq => "==",
        Ne => "!=",
        StrictEq => "===",
        StrictNe => "!==",
        Lt => "<",
        Gt => ">",
        Le => "<=",
        Ge => ">=",
        And => "&&",
        Or => "||",
        BitAnd => "&",
        BitOr => "|",
        BitXor => "^",
        Shl => "<<",
        Shr => ">>",
        UShr => ">>>",
        In => "in",
        InstanceOf => "instanceof",
        Comma => ",",
        Assign => "=",
        AssignAdd => "+=",
        AssignSub => "-=",
        AssignMul => "*=",
        AssignDiv => "/=",
        AssignMod => "%=",
        _ => unreachable!("not a binary operator"),
    }
}

fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn number_source(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn expr_source(node: &Node, min_prec: u8) -> String {
    let (text, prec) = match &node.kind {
        NodeKind::Reference => (
            node.identifier_name().unwrap_or_default().to_string(),
            u8::MAX,
        ),
        NodeKind::LitNum(n) => (number_source(*n), u8::MAX),
        NodeKind::LitStr(s) => (escape_string(s), u8::MAX),
        NodeKind::LitBool(b) => (b.to_string(), u8::MAX),
        NodeKind::LitNull => ("null".to_string(), u8::MAX),
        NodeKind::LitRegex { body, flags } => (format!("/{body}/{flags}"), u8::MAX),
        NodeKind::ArrayCtor => {
            let elems: Vec<String> = node.children.iter().map(|c| expr_source(c, 2)).collect();
            (format!("[{}]", elems.join(", ")), u8::MAX)
        }
        NodeKind::ObjectCtor => {
            let mut parts = Vec::new();
            for pair in node.children.chunks(2) {
                if let [key, value] = pair {
                    parts.push(format!(
                        "{}: {}",
                        expr_source(key, u8::MAX),
                        expr_source(value, 2)
                    ));
                }
            }
            // Always parenthesized so an object literal in statement
            // position is not mistaken for a block.
            (format!("({{{}}})", parts.join(", ")), u8::MAX)
        }
        NodeKind::FunctionConstructor => (function_source(node), u8::MAX),
        NodeKind::QuotedExpression => (expr_source(&node.children[0], min_prec), u8::MAX),
        NodeKind::Operation(op) => operation_source(node, *op),
        _ => (stmt_source(node), 0),
    };
    if prec < min_prec {
        format!("({text})")
    } else {
        text
    }
}

// A function expression heading a member access or call would read back as
// a declaration, so it keeps explicit parentheses there.
fn head_source(node: &Node, prec: u8) -> String {
    if matches!(node.kind, NodeKind::FunctionConstructor) {
        format!("({})", expr_source(node, 0))
    } else {
        expr_source(node, prec)
    }
}

fn operation_source(node: &Node, op: Op) -> (String, u8) {
    use Op::*;
    let prec = precedence(op);
    let text = match op {
        Member => format!(
            "{}.{}",
            head_source(&node.children[0], prec),
            node.children[1].identifier_name().unwrap_or_default()
        ),
        Index => format!(
            "{}[{}]",
            head_source(&node.children[0], prec),
            expr_source(&node.children[1], 0)
        ),
        Call => {
            let args: Vec<String> = node.children[1..]
                .iter()
                .map(|a| expr_source(a, 2))
                .collect();
            format!(
                "{}({})",
                head_source(&node.children[0], prec),
                args.join(", ")
            )
        }
        New => {
            let ctor = &node.children[0];
            // A member chain binds to `new` directly; anything else (a
            // call in particular) needs parentheses to keep the argument
            // list attached to this `new`.
            let ctor_text = if matches!(
                ctor.kind,
                NodeKind::Reference
                    | NodeKind::Operation(Op::Member)
                    | NodeKind::Operation(Op::Index)
            ) || ctor.is_literal()
            {
                expr_source(ctor, precedence(New))
            } else {
                format!("({})", expr_source(ctor, 0))
            };
            let args: Vec<String> = node.children[1..]
                .iter()
                .map(|a| expr_source(a, 2))
                .collect();
            format!("new {ctor_text}({})", args.join(", "))
        }
        Delete => format!("delete {}", expr_source(&node.children[0], prec)),
        TypeOf => format!("typeof {}", expr_source(&node.children[0], prec)),
        Void => format!("void {}", expr_source(&node.children[0], prec)),
        Not => format!("!{}", expr_source(&node.children[0], prec)),
        BitNot => format!("~{}", expr_source(&node.children[0], prec)),
        Neg => format!("-{}", expr_source(&node.children[0], prec)),
        Pos => format!("+{}", expr_source(&node.children[0], prec)),
        PreIncr => format!("++{}", expr_source(&node.children[0], prec)),
        PreDecr => format!("--{}", expr_source(&node.children[0], prec)),
        PostIncr => format!("{}++", expr_source(&node.children[0], prec)),
        PostDecr => format!("{}--", expr_source(&node.children[0], prec)),
        Ternary => format!(
            "{} ? {} : {}",
            expr_source(&node.children[0], prec + 1),
            expr_source(&node.children[1], prec),
            expr_source(&node.children[2], prec)
        ),
        Comma => format!(
            "{}, {}",
            expr_source(&node.children[0], prec),
            expr_source(&node.children[1], prec)
        ),
        Assign | AssignAdd | AssignSub | AssignMul | AssignDiv | AssignMod => format!(
            "{} {} {}",
            expr_source(&node.children[0], prec + 1),
            binary_token(op),
            expr_source(&node.children[1], prec)
        ),
        // Left-associative binary operators
        _ => format!(
            "{} {} {}",
            expr_source(&node.children[0], prec),
            binary_token(op),
            expr_source(&node.children[1], prec + 1)
        ),
    };
    (text, prec)
}

fn function_source(ctor: &Node) -> String {
    let name = ctor.children[0].identifier_name().unwrap_or_default();
    let params: Vec<String> = ctor.children[1]
        .children
        .iter()
        .map(|p| p.identifier_name().unwrap_or_default().to_string())
        .collect();
    let header = if name.is_empty() {
        format!("function ({})", params.join(", "))
    } else {
        format!("function {name}({})", params.join(", "))
    };
    format!("{header} {}", stmt_source(&ctor.children[2]))
}

fn declaration_source(decl: &Node) -> String {
    let name = decl.children[0].identifier_name().unwrap_or_default();
    match decl.children.get(1) {
        Some(init) => format!("{name} = {}", expr_source(init, 2)),
        None => name.to_string(),
    }
}

fn stmt_source(node: &Node) -> String {
    match &node.kind {
        NodeKind::Block => {
            let stmts: Vec<String> = node.children.iter().map(stmt_source).collect();
            if stmts.is_empty() {
                "{}".to_string()
            } else {
                format!("{{ {} }}", stmts.join(" "))
            }
        }
        NodeKind::List => {
            // A bare container renders as its members in sequence.
            let stmts: Vec<String> = node.children.iter().map(|c| c.to_source()).collect();
            stmts.join(" ")
        }
        NodeKind::ExpressionStmt => {
            let expr = &node.children[0];
            let text = expr_source(expr, 0);
            // A statement-position function expression would read back as a
            // declaration without the parentheses.
            if matches!(expr.kind, NodeKind::FunctionConstructor) {
                format!("({text});")
            } else {
                format!("{text};")
            }
        }
        NodeKind::Declaration => format!("var {};", declaration_source(node)),
        NodeKind::MultiDeclaration => {
            let decls: Vec<String> = node.children.iter().map(|d| declaration_source(d)).collect();
            format!("var {};", decls.join(", "))
        }
        NodeKind::FunctionDeclaration => function_source(&node.children[1]),
        NodeKind::Conditional => {
            let mut out = format!(
                "if ({}) {}",
                expr_source(&node.children[0], 0),
                stmt_source(&node.children[1])
            );
            if let Some(alt) = node.children.get(2) {
                out.push_str(&format!(" else {}", stmt_source(alt)));
            }
            out
        }
        NodeKind::WhileLoop => format!(
            "while ({}) {}",
            expr_source(&node.children[0], 0),
            stmt_source(&node.children[1])
        ),
        NodeKind::DoWhileLoop => format!(
            "do {} while ({});",
            stmt_source(&node.children[0]),
            expr_source(&node.children[1], 0)
        ),
        NodeKind::ForLoop => {
            let clause = |n: &Node| -> String {
                match &n.kind {
                    NodeKind::Noop => String::new(),
                    NodeKind::ExpressionStmt => expr_source(&n.children[0], 0),
                    NodeKind::Declaration | NodeKind::MultiDeclaration => {
                        let text = stmt_source(n);
                        text.trim_end_matches(';').to_string()
                    }
                    _ => n.to_source(),
                }
            };
            format!(
                "for ({}; {}; {}) {}",
                clause(&node.children[0]),
                clause(&node.children[1]),
                clause(&node.children[2]),
                stmt_source(&node.children[3])
            )
        }
        NodeKind::ForEachLoop => {
            let key = match &node.children[0].kind {
                NodeKind::Declaration => format!(
                    "var {}",
                    node.children[0].children[0]
                        .identifier_name()
                        .unwrap_or_default()
                ),
                NodeKind::ExpressionStmt => expr_source(&node.children[0].children[0], 0),
                _ => node.children[0].to_source(),
            };
            format!(
                "for ({key} in {}) {}",
                expr_source(&node.children[1], 0),
                stmt_source(&node.children[2])
            )
        }
        NodeKind::ReturnStmt => match node.children.first() {
            Some(value) => format!("return {};", expr_source(value, 0)),
            None => "return;".to_string(),
        },
        NodeKind::BreakStmt(label) => {
            if label.is_empty() {
                "break;".to_string()
            } else {
                format!("break {label};")
            }
        }
        NodeKind::ContinueStmt(label) => {
            if label.is_empty() {
                "continue;".to_string()
            } else {
                format!("continue {label};")
            }
        }
        NodeKind::ThrowStmt => format!("throw {};", expr_source(&node.children[0], 0)),
        NodeKind::TryStmt => {
            let mut out = format!("try {}", stmt_source(&node.children[0]));
            for clause in &node.children[1..] {
                match &clause.kind {
                    NodeKind::CatchClause => {
                        let ex = clause.children[0].identifier_name().unwrap_or_default();
                        out.push_str(&format!(" catch ({ex}) {}", stmt_source(&clause.children[1])));
                    }
                    NodeKind::FinallyClause => {
                        out.push_str(&format!(" finally {}", stmt_source(&clause.children[0])));
                    }
                    _ => {}
                }
            }
            out
        }
        NodeKind::SwitchStmt => {
            let mut out = format!("switch ({}) {{", expr_source(&node.children[0], 0));
            for case in &node.children[1..] {
                match &case.kind {
                    NodeKind::CaseStmt => {
                        out.push_str(&format!(
                            " case {}: {}",
                            expr_source(&case.children[0], 0),
                            body_stmts(&case.children[1])
                        ));
                    }
                    NodeKind::DefaultCaseStmt => {
                        out.push_str(&format!(" default: {}", body_stmts(&case.children[0])));
                    }
                    _ => {}
                }
            }
            out.push_str(" }");
            out
        }
        NodeKind::LabeledStmt(label) => format!("{label}: {}", stmt_source(&node.children[0])),
        NodeKind::WithStmt => format!(
            "with ({}) {}",
            expr_source(&node.children[0], 0),
            stmt_source(&node.children[1])
        ),
        NodeKind::Noop => ";".to_string(),
        NodeKind::DebuggerStmt => "debugger;".to_string(),
        _ => expr_source(node, 0),
    }
}

// Case bodies render without the surrounding braces.
fn body_stmts(block: &Node) -> String {
    let stmts: Vec<String> = block.children.iter().map(stmt_source).collect();
    stmts.join(" ")
}
