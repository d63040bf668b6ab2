// Lexical scope tracking for the rewrite pass.
//
// Scopes live in an arena and are addressed by copyable ids; a record
// holds a back-reference to its parent id, never an owning link. Rules
// mutate the current scope as they run (fresh temporaries, queued
// start-of-scope/start-of-block statements) and the rule owning a function
// body or block drains the queues exactly once when it reassembles.

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::mem;

use tracing::debug;

use crate::ast::{Node, NodeKind, Op};
use crate::reserved;
use crate::rewrite::messages::{MessageKind, MessageQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Function,
    PlainBlock,
    Catch,
}

#[derive(Debug)]
struct ScopeRecord {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    /// Names bound at this level: declarations, formals, the function's own
    /// name, the catch variable.
    locals: HashSet<String>,
    /// Names statically known to be declared functions at this level.
    functions: HashSet<String>,
    /// Free names of the whole program; populated on the program record only.
    imported: HashSet<String>,
    has_free_this: bool,
    has_free_arguments: bool,
    temp_counter: u32,
    /// Names needing a hoisted `var name;` at the top of this scope, in
    /// declaration order, deduplicated.
    hoisted: Vec<String>,
    start_of_scope: Vec<Node>,
    start_of_block: Vec<Node>,
}

impl ScopeRecord {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        ScopeRecord {
            parent,
            kind,
            locals: HashSet::new(),
            functions: HashSet::new(),
            imported: HashSet::new(),
            has_free_this: false,
            has_free_arguments: false,
            temp_counter: 0,
            hoisted: Vec::new(),
            start_of_scope: Vec::new(),
            start_of_block: Vec::new(),
        }
    }
}

/// Arena of scope records for one rewrite pass.
#[derive(Debug, Default)]
pub struct ScopeArena {
    records: Vec<ScopeRecord>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, record: ScopeRecord) -> ScopeId {
        self.records.push(record);
        ScopeId(self.records.len() - 1)
    }

    fn record(&self, id: ScopeId) -> &ScopeRecord {
        &self.records[id.0]
    }

    fn record_mut(&mut self, id: ScopeId) -> &mut ScopeRecord {
        &mut self.records[id.0]
    }

    // ----- derivations -----

    /// Root scope: one pass over the whole program computes the free
    /// (imported) variable set and the top-level declarations.
    pub fn from_program(&mut self, program: &Node, messages: &mut MessageQueue) -> ScopeId {
        let mut record = ScopeRecord::new(ScopeKind::Program, None);
        collect_declared_names(program, &mut record.locals);
        collect_declared_functions(program, &mut record.functions);
        check_masking(&record.locals, program, messages);

        let mut frames = vec![record.locals.clone()];
        collect_free_references(program, &mut frames, &mut record.imported);
        record.has_free_this = uses_name_unshadowed(program, reserved::THIS, &record.locals);
        record.has_free_arguments =
            uses_name_unshadowed(program, reserved::ARGUMENTS, &record.locals);
        debug!(
            imported = record.imported.len(),
            functions = record.functions.len(),
            "derived program scope"
        );
        self.push(record)
    }

    /// Scope of a function body, seeded with its formals and its own name.
    pub fn from_function_constructor(
        &mut self,
        parent: ScopeId,
        ctor: &Node,
        messages: &mut MessageQueue,
    ) -> ScopeId {
        debug_assert!(matches!(ctor.kind, NodeKind::FunctionConstructor));
        let mut record = ScopeRecord::new(ScopeKind::Function, Some(parent));
        if let Some(name) = ctor.children[0].identifier_name() {
            if !name.is_empty() {
                record.locals.insert(name.to_string());
                record.functions.insert(name.to_string());
            }
        }
        for param in &ctor.children[1].children {
            if let Some(name) = param.identifier_name() {
                record.locals.insert(name.to_string());
            }
        }
        let body = &ctor.children[2];
        collect_declared_names(body, &mut record.locals);
        collect_declared_functions(body, &mut record.functions);
        check_masking(&record.locals, ctor, messages);

        record.has_free_this = uses_name_unshadowed(body, reserved::THIS, &record.locals);
        record.has_free_arguments =
            uses_name_unshadowed(body, reserved::ARGUMENTS, &record.locals);
        self.push(record)
    }

    /// Scope of a plain nested block. Variable declarations hoist past it,
    /// so it binds nothing itself; it exists to queue start-of-block
    /// statements.
    pub fn from_plain_block(&mut self, parent: ScopeId) -> ScopeId {
        self.push(ScopeRecord::new(ScopeKind::PlainBlock, Some(parent)))
    }

    /// Scope of a generic node container; binds nothing, like a plain block.
    pub fn from_parse_tree_node_container(&mut self, parent: ScopeId) -> ScopeId {
        self.from_plain_block(parent)
    }

    /// Scope of a catch handler: binds exactly the exception name.
    pub fn from_catch_stmt(
        &mut self,
        parent: ScopeId,
        catch: &Node,
        messages: &mut MessageQueue,
    ) -> ScopeId {
        debug_assert!(matches!(catch.kind, NodeKind::CatchClause));
        let mut record = ScopeRecord::new(ScopeKind::Catch, Some(parent));
        if let Some(name) = catch.children[0].identifier_name() {
            if reserved::is_mask_protected(name) {
                messages.add(
                    MessageKind::CannotMaskReservedName {
                        name: name.to_string(),
                    },
                    catch.pos,
                    None,
                );
            } else if self.is_declared(parent, name) {
                messages.add(
                    MessageKind::MaskedVariable {
                        name: name.to_string(),
                    },
                    catch.pos,
                    None,
                );
            }
            record.locals.insert(name.to_string());
        }
        self.push(record)
    }

    // ----- queries -----

    pub fn kind(&self, id: ScopeId) -> ScopeKind {
        self.record(id).kind
    }

    /// Whether `name` is bound at this level or any enclosing one.
    pub fn is_declared(&self, id: ScopeId, name: &str) -> bool {
        let mut current = Some(id);
        while let Some(scope) = current {
            let record = self.record(scope);
            if record.locals.contains(name) {
                return true;
            }
            current = record.parent;
        }
        false
    }

    /// Whether `name` is free in the program (supplied by the imports
    /// object) and not shadowed by any enclosing declaration.
    pub fn is_imported(&self, id: ScopeId, name: &str) -> bool {
        let mut current = Some(id);
        while let Some(scope) = current {
            let record = self.record(scope);
            if record.locals.contains(name) {
                return false;
            }
            if record.kind == ScopeKind::Program {
                return record.imported.contains(name);
            }
            current = record.parent;
        }
        false
    }

    /// Whether `name` is statically known to be a function name, walking
    /// the chain and respecting masking by plain locals.
    pub fn is_function(&self, id: ScopeId, name: &str) -> bool {
        let mut current = Some(id);
        while let Some(scope) = current {
            let record = self.record(scope);
            if record.functions.contains(name) {
                return true;
            }
            if record.locals.contains(name) {
                return false;
            }
            current = record.parent;
        }
        false
    }

    pub fn is_declared_function(&self, id: ScopeId, name: &str) -> bool {
        self.is_function(id, name)
    }

    /// Whether `name` resolves at program level (declared there or free).
    pub fn is_global(&self, id: ScopeId, name: &str) -> bool {
        let mut current = Some(id);
        while let Some(scope) = current {
            let record = self.record(scope);
            if record.kind == ScopeKind::Program {
                return true;
            }
            if record.locals.contains(name) {
                return false;
            }
            current = record.parent;
        }
        true
    }

    /// The legacy-compat dialect's "outer" test; identical resolution rule.
    pub fn is_outer(&self, id: ScopeId, name: &str) -> bool {
        self.is_global(id, name)
    }

    /// Whether this scope chain reaches the program scope without crossing
    /// a function body, i.e. declarations here are outer declarations.
    pub fn is_outer_scope(&self, id: ScopeId) -> bool {
        let mut current = Some(id);
        while let Some(scope) = current {
            match self.record(scope).kind {
                ScopeKind::Program => return true,
                ScopeKind::Function => return false,
                _ => current = self.record(scope).parent,
            }
        }
        false
    }

    pub fn has_free_this(&self, id: ScopeId) -> bool {
        self.record(id).has_free_this
    }

    pub fn has_free_arguments(&self, id: ScopeId) -> bool {
        self.record(id).has_free_arguments
    }

    pub fn imported_variables(&self, id: ScopeId) -> Vec<String> {
        let mut names: Vec<String> = self.record(id).imported.iter().cloned().collect();
        names.sort();
        names
    }

    // ----- mutation -----

    fn nearest_hoist_scope(&self, id: ScopeId) -> ScopeId {
        let mut current = id;
        loop {
            let record = self.record(current);
            if matches!(record.kind, ScopeKind::Program | ScopeKind::Function) {
                return current;
            }
            current = record.parent.expect("scope chain ends at a program scope");
        }
    }

    /// Hoist `var name;` to the top of the nearest function/program scope.
    /// Declaring the same name twice hoists it once.
    pub fn declare_start_of_scope_variable(&mut self, id: ScopeId, name: &str) {
        let target = self.nearest_hoist_scope(id);
        let record = self.record_mut(target);
        if !record.hoisted.iter().any(|n| n == name) {
            record.hoisted.push(name.to_string());
        }
        record.locals.insert(name.to_string());
    }

    /// Allocate a fresh synthetic temporary in the nearest function/program
    /// scope and hoist its declaration. Returns the new identifier node.
    pub fn declare_start_of_scope_temp_variable(&mut self, id: ScopeId) -> Node {
        let target = self.nearest_hoist_scope(id);
        let record = self.record_mut(target);
        let name = format!("{}{}___", reserved::TEMP_PREFIX, record.temp_counter);
        record.temp_counter += 1;
        record.hoisted.push(name.clone());
        record.locals.insert(name.clone());
        Node::ident(&name).synthetic()
    }

    /// Queue a statement for the top of the nearest function/program body.
    pub fn add_start_of_scope_statement(&mut self, id: ScopeId, stmt: Node) {
        let target = self.nearest_hoist_scope(id);
        self.record_mut(target).start_of_scope.push(stmt);
    }

    /// Queue a statement for the top of the current block.
    pub fn add_start_of_block_statement(&mut self, id: ScopeId, stmt: Node) {
        self.record_mut(id).start_of_block.push(stmt);
    }

    /// Drain everything queued on this scope: hoisted declarations first,
    /// then start-of-scope statements, then start-of-block statements.
    /// Must be called exactly once, by the rule that owns the construct.
    pub fn take_start_statements(&mut self, id: ScopeId) -> Vec<Node> {
        let record = self.record_mut(id);
        let hoisted = mem::take(&mut record.hoisted);
        let of_scope = mem::take(&mut record.start_of_scope);
        let of_block = mem::take(&mut record.start_of_block);
        let mut stmts = Vec::with_capacity(hoisted.len() + of_scope.len() + of_block.len());
        for name in hoisted {
            stmts.push(
                Node::new(NodeKind::Declaration, vec![Node::ident(&name).synthetic()])
                    .synthetic(),
            );
        }
        stmts.extend(of_scope);
        stmts.extend(of_block);
        stmts
    }
}

// Declarations visible at a function/program level: `var` names and
// function-declaration names anywhere in the body, without crossing into
// nested function constructors; catch variables are scoped to their
// handler and excluded.
fn collect_declared_names(node: &Node, names: &mut HashSet<String>) {
    match &node.kind {
        NodeKind::Declaration => {
            if let Some(name) = node.children[0].identifier_name() {
                names.insert(name.to_string());
            }
            for child in node.children.iter().skip(1) {
                collect_declared_names(child, names);
            }
        }
        NodeKind::FunctionDeclaration => {
            if let Some(name) = node.children[0].identifier_name() {
                names.insert(name.to_string());
            }
        }
        NodeKind::FunctionConstructor => {}
        NodeKind::CatchClause => collect_declared_names(&node.children[1], names),
        _ => {
            for child in &node.children {
                collect_declared_names(child, names);
            }
        }
    }
}

fn collect_declared_functions(node: &Node, names: &mut HashSet<String>) {
    match &node.kind {
        NodeKind::FunctionDeclaration => {
            if let Some(name) = node.children[0].identifier_name() {
                names.insert(name.to_string());
            }
        }
        NodeKind::FunctionConstructor => {}
        _ => {
            for child in &node.children {
                collect_declared_functions(child, names);
            }
        }
    }
}

// References not bound by any enclosing declaration. Property names in
// member accesses are not variable uses and are skipped.
fn collect_free_references(
    node: &Node,
    frames: &mut Vec<HashSet<String>>,
    free: &mut HashSet<String>,
) {
    match &node.kind {
        NodeKind::Reference => {
            if let Some(name) = node.identifier_name() {
                if name != reserved::THIS && !frames.iter().any(|frame| frame.contains(name)) {
                    free.insert(name.to_string());
                }
            }
        }
        NodeKind::Operation(Op::Member) => {
            collect_free_references(&node.children[0], frames, free);
        }
        NodeKind::FunctionConstructor => {
            let mut frame = HashSet::new();
            if let Some(name) = node.children[0].identifier_name() {
                if !name.is_empty() {
                    frame.insert(name.to_string());
                }
            }
            for param in &node.children[1].children {
                if let Some(name) = param.identifier_name() {
                    frame.insert(name.to_string());
                }
            }
            // A function body never sees the enclosing arguments object.
            frame.insert(reserved::ARGUMENTS.to_string());
            collect_declared_names(&node.children[2], &mut frame);
            frames.push(frame);
            collect_free_references(&node.children[2], frames, free);
            frames.pop();
        }
        NodeKind::CatchClause => {
            let mut frame = HashSet::new();
            if let Some(name) = node.children[0].identifier_name() {
                frame.insert(name.to_string());
            }
            frames.push(frame);
            collect_free_references(&node.children[1], frames, free);
            frames.pop();
        }
        _ => {
            for child in &node.children {
                collect_free_references(child, frames, free);
            }
        }
    }
}

// Whether `name` is referenced in this body without being shadowed, not
// descending into nested functions (the receiver keyword and the arguments
// object rebind per function).
fn uses_name_unshadowed(body: &Node, name: &str, locals: &HashSet<String>) -> bool {
    if name != reserved::THIS && locals.contains(name) {
        return false;
    }
    fn walk(node: &Node, name: &str) -> bool {
        match &node.kind {
            NodeKind::Reference => node.identifier_name() == Some(name),
            NodeKind::FunctionConstructor => false,
            NodeKind::Operation(Op::Member) => walk(&node.children[0], name),
            _ => node.children.iter().any(|child| walk(child, name)),
        }
    }
    walk(body, name)
}

fn check_masking(locals: &HashSet<String>, node: &Node, messages: &mut MessageQueue) {
    for name in locals {
        if reserved::is_mask_protected(name) {
            messages.add(
                MessageKind::CannotMaskReservedName { name: name.clone() },
                node.pos,
                None,
            );
        }
    }
}
