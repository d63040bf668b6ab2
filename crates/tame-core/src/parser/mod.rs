// Recursive-descent front end for the script dialect.
//
// The same grammar serves two callers: `parse_program` for untrusted input
// trees and `parse_quasi_program` for rewrite-rule pattern texts, which
// additionally admits `@name` hole markers (with `?`/`*`/`+` quantifiers)
// wherever an identifier, expression, statement, formal parameter, or
// object-literal key may appear. Hole markers survive parsing as ordinary
// identifiers spelled with their `@` prefix; the quasi builder recognizes
// and converts them.

pub mod lexer;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::ast::{FilePos, Node, NodeKind, Op};
use self::lexer::{Lexer, Token, TokenKind};

/// Parser failure with source location.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: FilePos },

    #[error("unterminated comment starting at {pos}")]
    UnterminatedComment { pos: FilePos },

    #[error("unterminated string literal at {pos}")]
    UnterminatedString { pos: FilePos },

    #[error("unterminated regex literal at {pos}")]
    UnterminatedRegex { pos: FilePos },

    #[error("malformed number '{text}' at {pos}")]
    BadNumber { text: String, pos: FilePos },

    #[error("malformed quasi hole at {pos}")]
    MalformedQuasi { pos: FilePos },

    #[error("expected {expected}, found {found} at {pos}")]
    UnexpectedToken {
        expected: String,
        found: String,
        pos: FilePos,
    },

    #[error("nesting deeper than {limit} levels at {pos}")]
    NestingTooDeep { limit: u32, pos: FilePos },
}

// Trees are consumed by call-stack-recursive rewriting, so input depth is
// bounded here, at the only place trees enter the system.
const MAX_NESTING: u32 = 500;

/// Parse source text into a `Block` of statements.
pub fn parse_program(src: &str) -> Result<Node, ParseError> {
    Parser::new(src, false)?.program()
}

/// Parse pattern text, admitting `@hole` markers. Used by the quasi builder.
pub fn parse_quasi_program(src: &str) -> Result<Node, ParseError> {
    Parser::new(src, true)?.program()
}

/// Parse a script file from disk.
pub fn parse_file(path: &std::path::Path) -> anyhow::Result<Node> {
    let source = std::fs::read_to_string(path)?;
    Ok(parse_program(&source)?)
}

const KEYWORDS: &[&str] = &[
    "var", "function", "if", "else", "while", "do", "for", "in", "return", "throw", "try",
    "catch", "finally", "switch", "case", "default", "break", "continue", "with", "new",
    "delete", "typeof", "void", "instanceof", "debugger", "true", "false", "null",
];

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    // Set while parsing a for-loop head, where a top-level `in` would be
    // ambiguous with the for-in form.
    no_in: bool,
    depth: u32,
}

impl Parser {
    fn new(src: &str, quasi: bool) -> Result<Self, ParseError> {
        Ok(Parser {
            tokens: Lexer::new(src, quasi).tokenize()?,
            index: 0,
            no_in: false,
            depth: 0,
        })
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING,
                pos: self.peek().pos,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        &self.tokens[(self.index + n).min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn found(&self) -> String {
        match &self.peek().kind {
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::QuasiIdent { name, .. } => format!("'@{name}'"),
            TokenKind::Num(n) => format!("number {n}"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Regex { .. } => "regex literal".to_string(),
            TokenKind::Punct(p) => format!("'{p}'"),
            TokenKind::Eof => "end of input".to_string(),
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.found(),
            pos: self.peek().pos,
        }
    }

    fn expect_punct(&mut self, text: &str) -> Result<Token, ParseError> {
        if self.peek().is_punct(text) {
            Ok(self.bump())
        } else {
            Err(self.error(&format!("'{text}'")))
        }
    }

    fn eat_punct(&mut self, text: &str) -> bool {
        if self.peek().is_punct(text) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.peek().is_ident(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(&format!("'{word}'")))
        }
    }

    // Statement terminator: a `;`, or implicitly before `}` / end of input.
    fn eat_semi(&mut self) -> Result<(), ParseError> {
        if self.eat_punct(";") || self.peek().is_punct("}") || self.at_eof() {
            Ok(())
        } else {
            Err(self.error("';'"))
        }
    }

    /// An identifier-or-hole in a naming position (declaration name,
    /// function name, formal parameter, label, property name).
    fn identifier(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        match self.peek().kind.clone() {
            TokenKind::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                self.bump();
                Ok(Node::ident(&name).at(pos))
            }
            TokenKind::QuasiIdent { name, quantifier } => {
                self.bump();
                Ok(Node::ident(&quasi_text(&name, quantifier)).at(pos))
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn program(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let mut stmts = Vec::new();
        while !self.at_eof() {
            stmts.push(self.statement()?);
        }
        Ok(Node::block(stmts).at(pos))
    }

    fn statement(&mut self) -> Result<Node, ParseError> {
        self.enter()?;
        let result = self.statement_inner();
        self.leave();
        result
    }

    fn statement_inner(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        match self.peek().kind.clone() {
            TokenKind::Punct("{") => self.block(),
            TokenKind::Punct(";") => {
                self.bump();
                Ok(Node::noop().at(pos))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "var" => {
                    let decl = self.var_declaration()?;
                    self.eat_semi()?;
                    Ok(decl)
                }
                "function" => self.function_declaration(),
                "if" => self.if_statement(),
                "while" => self.while_statement(),
                "do" => self.do_while_statement(),
                "for" => self.for_statement(),
                "return" => {
                    self.bump();
                    let mut children = Vec::new();
                    if !self.peek().is_punct(";")
                        && !self.peek().is_punct("}")
                        && !self.at_eof()
                    {
                        children.push(self.expression()?);
                    }
                    self.eat_semi()?;
                    Ok(Node::new(NodeKind::ReturnStmt, children).at(pos))
                }
                "throw" => {
                    self.bump();
                    let value = self.expression()?;
                    self.eat_semi()?;
                    Ok(Node::new(NodeKind::ThrowStmt, vec![value]).at(pos))
                }
                "try" => self.try_statement(),
                "switch" => self.switch_statement(),
                "break" | "continue" => {
                    let is_break = word == "break";
                    self.bump();
                    let label = match &self.peek().kind {
                        TokenKind::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                            name.clone()
                        }
                        _ => String::new(),
                    };
                    if !label.is_empty() {
                        self.bump();
                    }
                    self.eat_semi()?;
                    let kind = if is_break {
                        NodeKind::BreakStmt(label)
                    } else {
                        NodeKind::ContinueStmt(label)
                    };
                    Ok(Node::leaf(kind).at(pos))
                }
                "with" => {
                    self.bump();
                    self.expect_punct("(")?;
                    let scope_expr = self.expression()?;
                    self.expect_punct(")")?;
                    let body = self.statement()?;
                    Ok(Node::new(NodeKind::WithStmt, vec![scope_expr, body]).at(pos))
                }
                "debugger" => {
                    self.bump();
                    self.eat_semi()?;
                    Ok(Node::leaf(NodeKind::DebuggerStmt).at(pos))
                }
                _ => {
                    // Label: identifier followed by ':'
                    if !KEYWORDS.contains(&word.as_str()) && self.peek_ahead(1).is_punct(":") {
                        let label = word.clone();
                        self.bump();
                        self.bump();
                        let body = self.statement()?;
                        return Ok(Node::new(NodeKind::LabeledStmt(label), vec![body]).at(pos));
                    }
                    self.expression_statement()
                }
            },
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let expr = self.expression()?;
        self.eat_semi()?;
        Ok(Node::expr_stmt(expr).at(pos))
    }

    fn block(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_punct("{")?;
        let mut stmts = Vec::new();
        while !self.peek().is_punct("}") && !self.at_eof() {
            stmts.push(self.statement()?);
        }
        self.expect_punct("}")?;
        Ok(Node::block(stmts).at(pos))
    }

    // `var a = 1, b, c = 2` — a lone declaration stays a `Declaration`,
    // two or more become a `MultiDeclaration`.
    fn var_declaration(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_keyword("var")?;
        let mut decls = Vec::new();
        loop {
            let decl_pos = self.peek().pos;
            let name = self.identifier()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            decls.push(Node::var_decl(name, init).at(decl_pos));
            if !self.eat_punct(",") {
                break;
            }
        }
        if decls.len() == 1 {
            Ok(decls.pop().unwrap())
        } else {
            Ok(Node::new(NodeKind::MultiDeclaration, decls).at(pos))
        }
    }

    fn function_declaration(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let ctor = self.function_constructor(true)?;
        let name = ctor.children[0].clone();
        Ok(Node::new(NodeKind::FunctionDeclaration, vec![name, ctor]).at(pos))
    }

    // `function name?(params) { body }`; a statement-position function
    // requires a name, an expression-position one does not.
    fn function_constructor(&mut self, name_required: bool) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_keyword("function")?;
        let name = if self.peek().is_punct("(") {
            if name_required {
                return Err(self.error("function name"));
            }
            Node::ident("")
        } else {
            self.identifier()?
        };
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.peek().is_punct(")") {
            let param_pos = self.peek().pos;
            let ident = self.identifier()?;
            params.push(Node::new(NodeKind::FormalParam, vec![ident]).at(param_pos));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        let body = self.block()?;
        Ok(Node::new(
            NodeKind::FunctionConstructor,
            vec![name, Node::list(params), body],
        )
        .at(pos))
    }

    fn if_statement(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_keyword("if")?;
        self.expect_punct("(")?;
        let cond = self.expression()?;
        self.expect_punct(")")?;
        let then_branch = self.statement()?;
        let mut children = vec![cond, then_branch];
        if self.eat_keyword("else") {
            children.push(self.statement()?);
        }
        Ok(Node::new(NodeKind::Conditional, children).at(pos))
    }

    fn while_statement(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_keyword("while")?;
        self.expect_punct("(")?;
        let cond = self.expression()?;
        self.expect_punct(")")?;
        let body = self.statement()?;
        Ok(Node::new(NodeKind::WhileLoop, vec![cond, body]).at(pos))
    }

    fn do_while_statement(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_keyword("do")?;
        let body = self.statement()?;
        self.expect_keyword("while")?;
        self.expect_punct("(")?;
        let cond = self.expression()?;
        self.expect_punct(")")?;
        self.eat_semi()?;
        Ok(Node::new(NodeKind::DoWhileLoop, vec![body, cond]).at(pos))
    }

    fn for_statement(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_keyword("for")?;
        self.expect_punct("(")?;

        if self.peek().is_ident("var") {
            self.no_in = true;
            let decl = self.var_declaration()?;
            self.no_in = false;
            if matches!(decl.kind, NodeKind::Declaration) && self.eat_keyword("in") {
                let container = self.expression()?;
                self.expect_punct(")")?;
                let body = self.statement()?;
                return Ok(
                    Node::new(NodeKind::ForEachLoop, vec![decl, container, body]).at(pos)
                );
            }
            return self.for_loop_tail(pos, decl);
        }

        if self.eat_punct(";") {
            let init = Node::noop();
            return self.for_loop_rest(pos, init);
        }

        self.no_in = true;
        let first = self.expression()?;
        self.no_in = false;
        if self.eat_keyword("in") {
            let key = Node::expr_stmt(first);
            let container = self.expression()?;
            self.expect_punct(")")?;
            let body = self.statement()?;
            return Ok(Node::new(NodeKind::ForEachLoop, vec![key, container, body]).at(pos));
        }
        self.for_loop_tail(pos, Node::expr_stmt(first))
    }

    fn for_loop_tail(&mut self, pos: FilePos, init: Node) -> Result<Node, ParseError> {
        self.expect_punct(";")?;
        self.for_loop_rest(pos, init)
    }

    fn for_loop_rest(&mut self, pos: FilePos, init: Node) -> Result<Node, ParseError> {
        let cond = if self.peek().is_punct(";") {
            Node::noop()
        } else {
            Node::expr_stmt(self.expression()?)
        };
        self.expect_punct(";")?;
        let incr = if self.peek().is_punct(")") {
            Node::noop()
        } else {
            Node::expr_stmt(self.expression()?)
        };
        self.expect_punct(")")?;
        let body = self.statement()?;
        Ok(Node::new(NodeKind::ForLoop, vec![init, cond, incr, body]).at(pos))
    }

    fn try_statement(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_keyword("try")?;
        let body = self.block()?;
        let mut children = vec![body];
        if self.eat_keyword("catch") {
            self.expect_punct("(")?;
            let ex_pos = self.peek().pos;
            let ex = self.identifier()?;
            self.expect_punct(")")?;
            let handler = self.block()?;
            let decl = Node::var_decl(ex, None).at(ex_pos);
            children.push(Node::new(NodeKind::CatchClause, vec![decl, handler]).at(ex_pos));
        }
        if self.eat_keyword("finally") {
            let cleanup = self.block()?;
            children.push(Node::new(NodeKind::FinallyClause, vec![cleanup]));
        }
        if children.len() == 1 {
            return Err(self.error("'catch' or 'finally'"));
        }
        Ok(Node::new(NodeKind::TryStmt, children).at(pos))
    }

    fn switch_statement(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_keyword("switch")?;
        self.expect_punct("(")?;
        let scrutinee = self.expression()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut children = vec![scrutinee];
        while !self.peek().is_punct("}") && !self.at_eof() {
            let case_pos = self.peek().pos;
            if self.eat_keyword("case") {
                let value = self.expression()?;
                self.expect_punct(":")?;
                let body = self.case_body()?;
                children.push(Node::new(NodeKind::CaseStmt, vec![value, body]).at(case_pos));
            } else if self.eat_keyword("default") {
                self.expect_punct(":")?;
                let body = self.case_body()?;
                children.push(Node::new(NodeKind::DefaultCaseStmt, vec![body]).at(case_pos));
            } else {
                return Err(self.error("'case' or 'default'"));
            }
        }
        self.expect_punct("}")?;
        Ok(Node::new(NodeKind::SwitchStmt, children).at(pos))
    }

    fn case_body(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let mut stmts = Vec::new();
        while !self.peek().is_punct("}")
            && !self.peek().is_ident("case")
            && !self.peek().is_ident("default")
            && !self.at_eof()
        {
            stmts.push(self.statement()?);
        }
        Ok(Node::block(stmts).at(pos))
    }

    // ----- expressions -----

    fn expression(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let mut expr = self.assignment()?;
        while self.peek().is_punct(",") {
            self.bump();
            let rhs = self.assignment()?;
            expr = Node::operation(Op::Comma, vec![expr, rhs]).at(pos);
        }
        Ok(expr)
    }

    fn assignment(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let target = self.conditional()?;
        let op = match &self.peek().kind {
            TokenKind::Punct("=") => Some(Op::Assign),
            TokenKind::Punct("+=") => Some(Op::AssignAdd),
            TokenKind::Punct("-=") => Some(Op::AssignSub),
            TokenKind::Punct("*=") => Some(Op::AssignMul),
            TokenKind::Punct("/=") => Some(Op::AssignDiv),
            TokenKind::Punct("%=") => Some(Op::AssignMod),
            _ => None,
        };
        match op {
            Some(op) => {
                self.bump();
                let value = self.assignment()?;
                Ok(Node::operation(op, vec![target, value]).at(pos))
            }
            None => Ok(target),
        }
    }

    fn conditional(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let cond = self.binary(0)?;
        if self.eat_punct("?") {
            let then_value = self.assignment()?;
            self.expect_punct(":")?;
            let else_value = self.assignment()?;
            Ok(Node::operation(Op::Ternary, vec![cond, then_value, else_value]).at(pos))
        } else {
            Ok(cond)
        }
    }

    fn binary_op(&self) -> Option<(Op, u8)> {
        let op = match &self.peek().kind {
            TokenKind::Punct("||") => (Op::Or, 1),
            TokenKind::Punct("&&") => (Op::And, 2),
            TokenKind::Punct("|") => (Op::BitOr, 3),
            TokenKind::Punct("^") => (Op::BitXor, 4),
            TokenKind::Punct("&") => (Op::BitAnd, 5),
            TokenKind::Punct("==") => (Op::Eq, 6),
            TokenKind::Punct("!=") => (Op::Ne, 6),
            TokenKind::Punct("===") => (Op::StrictEq, 6),
            TokenKind::Punct("!==") => (Op::StrictNe, 6),
            TokenKind::Punct("<") => (Op::Lt, 7),
            TokenKind::Punct(">") => (Op::Gt, 7),
            TokenKind::Punct("<=") => (Op::Le, 7),
            TokenKind::Punct(">=") => (Op::Ge, 7),
            TokenKind::Ident(word) if word == "instanceof" => (Op::InstanceOf, 7),
            TokenKind::Ident(word) if word == "in" => {
                if self.no_in {
                    return None;
                }
                (Op::In, 7)
            }
            TokenKind::Punct("<<") => (Op::Shl, 8),
            TokenKind::Punct(">>") => (Op::Shr, 8),
            TokenKind::Punct(">>>") => (Op::UShr, 8),
            TokenKind::Punct("+") => (Op::Add, 9),
            TokenKind::Punct("-") => (Op::Sub, 9),
            TokenKind::Punct("*") => (Op::Mul, 10),
            TokenKind::Punct("/") => (Op::Div, 10),
            TokenKind::Punct("%") => (Op::Mod, 10),
            _ => return None,
        };
        Some(op)
    }

    fn binary(&mut self, min_prec: u8) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let mut lhs = self.unary()?;
        while let Some((op, prec)) = self.binary_op() {
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self.binary(prec + 1)?;
            lhs = Node::operation(op, vec![lhs, rhs]).at(pos);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, ParseError> {
        self.enter()?;
        let result = self.unary_inner();
        self.leave();
        result
    }

    fn unary_inner(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let op = match &self.peek().kind {
            TokenKind::Punct("!") => Some(Op::Not),
            TokenKind::Punct("~") => Some(Op::BitNot),
            TokenKind::Punct("-") => Some(Op::Neg),
            TokenKind::Punct("+") => Some(Op::Pos),
            TokenKind::Punct("++") => Some(Op::PreIncr),
            TokenKind::Punct("--") => Some(Op::PreDecr),
            TokenKind::Ident(word) => match word.as_str() {
                "typeof" => Some(Op::TypeOf),
                "void" => Some(Op::Void),
                "delete" => Some(Op::Delete),
                _ => None,
            },
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.unary()?;
            return Ok(Node::operation(op, vec![operand]).at(pos));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        let mut expr = self.call_member()?;
        loop {
            if self.peek().is_punct("++") {
                self.bump();
                expr = Node::operation(Op::PostIncr, vec![expr]).at(pos);
            } else if self.peek().is_punct("--") {
                self.bump();
                expr = Node::operation(Op::PostDecr, vec![expr]).at(pos);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn call_member(&mut self) -> Result<Node, ParseError> {
        let mut expr = if self.peek().is_ident("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            let pos = self.peek().pos;
            if self.eat_punct(".") {
                let prop = self.identifier()?;
                let prop_ref = Node::reference_to(prop);
                expr = Node::operation(Op::Member, vec![expr, prop_ref]).at(pos);
            } else if self.eat_punct("[") {
                let key = self.expression()?;
                self.expect_punct("]")?;
                expr = Node::operation(Op::Index, vec![expr, key]).at(pos);
            } else if self.peek().is_punct("(") {
                let args = self.arguments()?;
                let mut children = vec![expr];
                children.extend(args);
                expr = Node::operation(Op::Call, children).at(pos);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn new_expression(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_keyword("new")?;
        // Member chains bind to the constructor before the argument list.
        let mut ctor = if self.peek().is_ident("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            let member_pos = self.peek().pos;
            if self.eat_punct(".") {
                let prop = self.identifier()?;
                ctor = Node::operation(Op::Member, vec![ctor, Node::reference_to(prop)])
                    .at(member_pos);
            } else if self.eat_punct("[") {
                let key = self.expression()?;
                self.expect_punct("]")?;
                ctor = Node::operation(Op::Index, vec![ctor, key]).at(member_pos);
            } else {
                break;
            }
        }
        let mut children = vec![ctor];
        if self.peek().is_punct("(") {
            children.extend(self.arguments()?);
        }
        Ok(Node::operation(Op::New, children).at(pos))
    }

    fn arguments(&mut self) -> Result<Vec<Node>, ParseError> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.peek().is_punct(")") {
            args.push(self.assignment()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        match self.peek().kind.clone() {
            TokenKind::Punct("(") => {
                self.bump();
                let saved_no_in = std::mem::replace(&mut self.no_in, false);
                let expr = self.expression()?;
                self.no_in = saved_no_in;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => self.array_literal(),
            TokenKind::Punct("{") => self.object_literal(),
            TokenKind::Num(value) => {
                self.bump();
                Ok(Node::leaf(NodeKind::LitNum(value)).at(pos))
            }
            TokenKind::Str(value) => {
                self.bump();
                Ok(Node::leaf(NodeKind::LitStr(value)).at(pos))
            }
            TokenKind::Regex { body, flags } => {
                self.bump();
                Ok(Node::leaf(NodeKind::LitRegex { body, flags }).at(pos))
            }
            TokenKind::QuasiIdent { name, quantifier } => {
                self.bump();
                Ok(Node::reference_to(Node::ident(&quasi_text(&name, quantifier))).at(pos))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" | "false" => {
                    self.bump();
                    Ok(Node::leaf(NodeKind::LitBool(word == "true")).at(pos))
                }
                "null" => {
                    self.bump();
                    Ok(Node::leaf(NodeKind::LitNull).at(pos))
                }
                "function" => self.function_constructor(false),
                "this" => {
                    self.bump();
                    Ok(Node::reference("this").at(pos))
                }
                _ if !KEYWORDS.contains(&word.as_str()) => {
                    self.bump();
                    Ok(Node::reference(&word).at(pos))
                }
                _ => Err(self.error("expression")),
            },
            _ => Err(self.error("expression")),
        }
    }

    fn array_literal(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_punct("[")?;
        let mut elems = Vec::new();
        while !self.peek().is_punct("]") {
            elems.push(self.assignment()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(Node::new(NodeKind::ArrayCtor, elems).at(pos))
    }

    // Keys normalize to string literals; quasi keys stay identifiers so the
    // builder can pair them with their value holes.
    fn object_literal(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect_punct("{")?;
        let mut children = Vec::new();
        while !self.peek().is_punct("}") {
            let key_pos = self.peek().pos;
            let key = match self.peek().kind.clone() {
                TokenKind::Ident(name) => Node::string_lit(&name).at(key_pos),
                TokenKind::Str(value) => Node::string_lit(&value).at(key_pos),
                TokenKind::Num(value) => Node::string_lit(&format!("{value}")).at(key_pos),
                TokenKind::QuasiIdent { name, quantifier } => {
                    Node::ident(&quasi_text(&name, quantifier)).at(key_pos)
                }
                _ => return Err(self.error("property key")),
            };
            self.bump();
            self.expect_punct(":")?;
            let value = self.assignment()?;
            children.push(key);
            children.push(value);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Node::new(NodeKind::ObjectCtor, children).at(pos))
    }
}

fn quasi_text(name: &str, quantifier: Option<char>) -> String {
    match quantifier {
        Some(q) => format!("@{name}{q}"),
        None => format!("@{name}"),
    }
}
