//! Scope-aware free-name analysis over a tree-sitter Python tree.
//!
//! Module and class bodies bind sequentially, so a read that precedes the
//! first binding is free. Function and lambda bodies follow Python's
//! "assigned anywhere means local" rule; reads that fall through to module
//! scope are checked against the module's final bindings because the body
//! runs after the whole snippet has executed.

use super::builtins::is_builtin;
use crate::domain::SymbolKind;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tree_sitter::Node;

/// How a free name is used inside the snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageHints {
    pub called: bool,
    pub call_arity: Option<usize>,
    pub iterated: bool,
    pub formatted: bool,
    pub subscript_str: bool,
    pub subscript_int: bool,
    pub arithmetic: bool,
    pub float_arithmetic: bool,
    pub len_taken: bool,
    pub context_manager: bool,
    pub subclassed: bool,
    pub decorator: bool,
    pub attributes: BTreeSet<String>,
}

impl UsageHints {
    pub fn symbol_kind(&self, name: &str) -> SymbolKind {
        let capitalized = name.chars().next().is_some_and(char::is_uppercase);
        if self.subclassed || (self.called && capitalized) {
            SymbolKind::Class
        } else if self.called || self.decorator {
            SymbolKind::Function
        } else {
            SymbolKind::Variable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Class,
    Function,
    Comprehension,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    bound: HashSet<String>,
    globals: HashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self { kind, bound: HashSet::new(), globals: HashSet::new() }
    }

    fn function(bound: HashSet<String>, globals: HashSet<String>) -> Self {
        Self { kind: ScopeKind::Function, bound, globals }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Bound,
    /// Falls through to module scope from a deferred body.
    Deferred,
    Free,
}

pub(crate) struct WalkOutput {
    pub free: Vec<String>,
    pub defines: BTreeMap<String, SymbolKind>,
    pub hints: BTreeMap<String, UsageHints>,
}

pub(crate) struct ScopeWalk<'s> {
    src: &'s [u8],
    scopes: Vec<Scope>,
    reads: Vec<(String, Resolution)>,
    defines: BTreeMap<String, SymbolKind>,
    hints: BTreeMap<String, UsageHints>,
}

const COMPREHENSIONS: [&str; 4] =
    ["list_comprehension", "set_comprehension", "dictionary_comprehension", "generator_expression"];

const ARITHMETIC_OPS: [&str; 7] = ["+", "-", "*", "/", "//", "**", "%"];

const ITERATING_CALLS: [&str; 14] = [
    "sum", "sorted", "enumerate", "zip", "list", "tuple", "set", "min", "max", "reversed", "any",
    "all", "iter", "frozenset",
];

fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

impl<'s> ScopeWalk<'s> {
    pub(crate) fn run(root: Node<'_>, src: &'s [u8]) -> WalkOutput {
        let mut walk = ScopeWalk {
            src,
            scopes: vec![Scope::new(ScopeKind::Module)],
            reads: Vec::new(),
            defines: BTreeMap::new(),
            hints: BTreeMap::new(),
        };
        walk.visit_children(root);
        walk.finish()
    }

    fn finish(self) -> WalkOutput {
        let module = &self.scopes[0].bound;
        let mut seen = HashSet::new();
        let mut free = Vec::new();
        for (name, resolution) in &self.reads {
            let is_free = match resolution {
                Resolution::Free => true,
                Resolution::Deferred => !module.contains(name),
                Resolution::Bound => false,
            };
            if is_free && seen.insert(name.clone()) {
                free.push(name.clone());
            }
        }
        let free_set: HashSet<&String> = free.iter().collect();
        let hints = self.hints.into_iter().filter(|(name, _)| free_set.contains(name)).collect();
        WalkOutput { free, defines: self.defines, hints }
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.src).unwrap_or("")
    }

    fn lookup(&self, name: &str) -> Resolution {
        if is_builtin(name) {
            return Resolution::Bound;
        }
        let innermost = self.scopes.len() - 1;
        let mut deferred = false;
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            match scope.kind {
                ScopeKind::Class if depth != innermost => continue,
                ScopeKind::Class | ScopeKind::Comprehension => {
                    if scope.bound.contains(name) {
                        return Resolution::Bound;
                    }
                }
                ScopeKind::Function => {
                    if scope.globals.contains(name) {
                        return Resolution::Deferred;
                    }
                    if scope.bound.contains(name) {
                        return Resolution::Bound;
                    }
                    deferred = true;
                }
                ScopeKind::Module => {
                    if deferred {
                        return Resolution::Deferred;
                    }
                    if scope.bound.contains(name) {
                        return Resolution::Bound;
                    }
                    return Resolution::Free;
                }
            }
        }
        Resolution::Free
    }

    fn read(&mut self, node: Node<'_>) {
        let name = self.text(node);
        if name.is_empty() {
            return;
        }
        let resolution = self.lookup(name);
        if resolution != Resolution::Bound {
            self.reads.push((name.to_string(), resolution));
        }
    }

    /// Record a usage hint when `node` is an identifier that is not locally bound.
    fn note(&mut self, node: Node<'_>, update: impl FnOnce(&mut UsageHints)) {
        if node.kind() != "identifier" {
            return;
        }
        let name = self.text(node);
        if self.lookup(name) == Resolution::Bound {
            return;
        }
        update(self.hints.entry(name.to_string()).or_default());
    }

    fn bind(&mut self, name: &str, kind: SymbolKind) {
        if name.is_empty() {
            return;
        }
        let at_module = self.scopes.len() == 1;
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.kind == ScopeKind::Function && scope.globals.contains(name) {
            return;
        }
        scope.bound.insert(name.to_string());
        if at_module {
            self.defines.insert(name.to_string(), kind);
        }
    }

    fn bind_target(&mut self, node: Node<'_>, kind: SymbolKind) {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                self.bind(name, kind);
            }
            "attribute" | "subscript" => self.visit(node),
            _ => {
                let kids = children(node);
                if kids.is_empty() {
                    let name = self.text(node);
                    if is_identifier(name) {
                        self.bind(name, kind);
                    }
                }
                for child in kids {
                    self.bind_target(child, kind);
                }
            }
        }
    }

    fn visit_children(&mut self, node: Node<'_>) {
        for child in children(node) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "identifier" => self.read(node),
            "attribute" => self.visit_attribute(node),
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
            }
            "call" => self.visit_call(node),
            "assignment" => self.visit_assignment(node),
            "augmented_assignment" => self.visit_augmented(node),
            "named_expression" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
                if let Some(name) = node.child_by_field_name("name") {
                    self.bind_target(name, SymbolKind::Variable);
                }
            }
            "function_definition" => self.visit_function(node),
            "class_definition" => self.visit_class(node),
            "decorated_definition" => self.visit_decorated(node),
            "lambda" => self.visit_lambda(node),
            kind if COMPREHENSIONS.contains(&kind) => self.visit_comprehension(node),
            "for_statement" => self.visit_for(node),
            "with_item" => self.visit_with_item(node),
            "import_statement" | "import_from_statement" => {
                for name in import_bindings(node, self.src) {
                    self.bind(&name, SymbolKind::Import);
                }
            }
            "future_import_statement" | "global_statement" | "nonlocal_statement" => {}
            "except_clause" => self.visit_except(node),
            "interpolation" => {
                if let Some(expr) = node.child_by_field_name("expression") {
                    self.note(expr, |h| h.formatted = true);
                }
                self.visit_children(node);
            }
            "binary_operator" => self.visit_binary(node),
            "comparison_operator" => self.visit_comparison(node),
            "subscript" => self.visit_subscript(node),
            "case_clause" => self.visit_case(node),
            _ => self.visit_children(node),
        }
    }

    fn visit_attribute(&mut self, node: Node<'_>) {
        let Some(object) = node.child_by_field_name("object") else {
            return;
        };
        if let Some(attr) = node.child_by_field_name("attribute") {
            let attr = self.text(attr).to_string();
            self.note(object, |h| {
                h.attributes.insert(attr);
            });
        }
        self.visit(object);
    }

    fn visit_call(&mut self, node: Node<'_>) {
        let function = node.child_by_field_name("function");
        let arguments = node.child_by_field_name("arguments");
        let positional: Vec<Node<'_>> = arguments
            .filter(|args| args.kind() == "argument_list")
            .map(|args| {
                children(args).into_iter().filter(|a| a.kind() != "keyword_argument").collect()
            })
            .unwrap_or_default();
        let arity = arguments.map(|args| children(args).len()).unwrap_or(0);

        if let Some(function) = function {
            match function.kind() {
                "identifier" => {
                    self.note(function, |h| {
                        h.called = true;
                        h.call_arity = Some(arity);
                    });
                    let callee = self.text(function);
                    if callee == "len" {
                        if let Some(first) = positional.first() {
                            self.note(*first, |h| {
                                h.len_taken = true;
                                h.iterated = true;
                            });
                        }
                    } else if ITERATING_CALLS.contains(&callee) {
                        if let Some(first) = positional.first() {
                            self.note(*first, |h| h.iterated = true);
                        }
                    } else if matches!(callee, "map" | "filter") {
                        for arg in positional.iter().skip(1) {
                            self.note(*arg, |h| h.iterated = true);
                        }
                    }
                }
                "attribute" => {
                    let object = function.child_by_field_name("object");
                    let method = function.child_by_field_name("attribute").map(|a| self.text(a));
                    if object.is_some_and(|o| o.kind() == "string") {
                        match method {
                            Some("format") => {
                                for arg in &positional {
                                    self.note(*arg, |h| h.formatted = true);
                                }
                            }
                            Some("join") => {
                                if let Some(first) = positional.first() {
                                    self.note(*first, |h| h.iterated = true);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
            self.visit(function);
        }
        if let Some(arguments) = arguments {
            self.visit(arguments);
        }
    }

    fn visit_assignment(&mut self, node: Node<'_>) {
        let right = node.child_by_field_name("right");
        if let Some(right) = right {
            self.visit(right);
        }
        if let Some(annotation) = node.child_by_field_name("type") {
            self.visit(annotation);
        }
        if let (Some(left), Some(_)) = (node.child_by_field_name("left"), right) {
            self.bind_target(left, SymbolKind::Variable);
        }
    }

    fn visit_augmented(&mut self, node: Node<'_>) {
        let left = node.child_by_field_name("left");
        let right = node.child_by_field_name("right");
        let operator = node.child_by_field_name("operator").map(|op| op.kind()).unwrap_or("");
        if let Some(left) = left {
            let float = right.is_some_and(|r| r.kind() == "float");
            let text_operand = right.is_some_and(|r| is_string_node(r));
            self.note(left, |h| {
                if text_operand && operator == "+=" {
                    h.formatted = true;
                } else if operator != "|=" && operator != "&=" {
                    h.arithmetic = true;
                    h.float_arithmetic |= float;
                }
            });
            self.visit(left);
        }
        if let Some(right) = right {
            self.visit(right);
        }
        if let Some(left) = left.filter(|l| l.kind() == "identifier") {
            self.bind_target(left, SymbolKind::Variable);
        }
    }

    fn visit_parameters(&mut self, params: Node<'_>, names: &mut Vec<String>) {
        for param in children(params) {
            match param.kind() {
                "identifier" => names.push(self.text(param).to_string()),
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(annotation) = param.child_by_field_name("type") {
                        self.visit(annotation);
                    }
                    if let Some(value) = param.child_by_field_name("value") {
                        self.visit(value);
                    }
                    if let Some(name) = param.child_by_field_name("name") {
                        collect_target_names(name, self.src, names);
                    }
                }
                "typed_parameter" => {
                    let annotation = param.child_by_field_name("type");
                    if let Some(annotation) = annotation {
                        self.visit(annotation);
                    }
                    for child in children(param) {
                        if Some(child.id()) != annotation.map(|a| a.id()) {
                            collect_target_names(child, self.src, names);
                        }
                    }
                }
                "list_splat_pattern" | "dictionary_splat_pattern" | "tuple_pattern" => {
                    collect_target_names(param, self.src, names);
                }
                _ => {}
            }
        }
    }

    fn visit_function(&mut self, node: Node<'_>) {
        let mut params = Vec::new();
        if let Some(parameters) = node.child_by_field_name("parameters") {
            self.visit_parameters(parameters, &mut params);
        }
        if let Some(returns) = node.child_by_field_name("return_type") {
            self.visit(returns);
        }
        if let Some(name) = node.child_by_field_name("name") {
            let name = self.text(name);
            self.bind(name, SymbolKind::Function);
        }
        if let Some(body) = node.child_by_field_name("body") {
            let (locals, globals) = function_locals(body, self.src, &params);
            self.scopes.push(Scope::function(locals, globals));
            self.visit_children(body);
            self.scopes.pop();
        }
    }

    fn visit_class(&mut self, node: Node<'_>) {
        if let Some(bases) = node.child_by_field_name("superclasses") {
            for base in children(bases) {
                self.note(base, |h| h.subclassed = true);
            }
            self.visit(bases);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.scopes.push(Scope::new(ScopeKind::Class));
            self.visit_children(body);
            self.scopes.pop();
        }
        if let Some(name) = node.child_by_field_name("name") {
            let name = self.text(name);
            self.bind(name, SymbolKind::Class);
        }
    }

    fn visit_decorated(&mut self, node: Node<'_>) {
        let definition = node.child_by_field_name("definition");
        for child in children(node) {
            if child.kind() == "decorator" {
                for expr in children(child) {
                    self.note(expr, |h| h.decorator = true);
                    self.visit(expr);
                }
            }
        }
        if let Some(definition) = definition {
            self.visit(definition);
        }
    }

    fn visit_lambda(&mut self, node: Node<'_>) {
        let mut params = Vec::new();
        if let Some(parameters) = node.child_by_field_name("parameters") {
            self.visit_parameters(parameters, &mut params);
        }
        self.scopes.push(Scope::function(params.into_iter().collect(), HashSet::new()));
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
        self.scopes.pop();
    }

    fn visit_comprehension(&mut self, node: Node<'_>) {
        let body = node.child_by_field_name("body");
        let body_id = body.map(|b| b.id());
        let mut pushed = false;
        for clause in children(node) {
            if Some(clause.id()) == body_id {
                continue;
            }
            if clause.kind() == "for_in_clause" {
                let rights: Vec<Node<'_>> = {
                    let mut cursor = clause.walk();
                    clause
                        .children_by_field_name("right", &mut cursor)
                        .filter(|r| r.is_named())
                        .collect()
                };
                for right in rights {
                    self.note(right, |h| h.iterated = true);
                    self.visit(right);
                }
                if !pushed {
                    // only the first iterable is evaluated in the enclosing scope
                    self.scopes.push(Scope::new(ScopeKind::Comprehension));
                    pushed = true;
                }
                if let Some(left) = clause.child_by_field_name("left") {
                    self.bind_target(left, SymbolKind::Variable);
                }
            } else {
                if !pushed {
                    self.scopes.push(Scope::new(ScopeKind::Comprehension));
                    pushed = true;
                }
                self.visit(clause);
            }
        }
        if !pushed {
            self.scopes.push(Scope::new(ScopeKind::Comprehension));
        }
        if let Some(body) = body {
            self.visit(body);
        }
        self.scopes.pop();
    }

    fn visit_for(&mut self, node: Node<'_>) {
        if let Some(right) = node.child_by_field_name("right") {
            self.note(right, |h| h.iterated = true);
            self.visit(right);
        }
        if let Some(left) = node.child_by_field_name("left") {
            self.bind_target(left, SymbolKind::Variable);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            self.visit(alternative);
        }
    }

    fn visit_with_item(&mut self, node: Node<'_>) {
        let Some(value) = node.child_by_field_name("value") else {
            return;
        };
        if value.kind() == "as_pattern" {
            let alias = value.child_by_field_name("alias");
            for child in children(value) {
                if Some(child.id()) == alias.map(|a| a.id()) {
                    continue;
                }
                self.note(child, |h| h.context_manager = true);
                self.visit(child);
            }
            if let Some(alias) = alias {
                self.bind_target(alias, SymbolKind::Variable);
            }
        } else {
            self.note(value, |h| h.context_manager = true);
            self.visit(value);
        }
    }

    fn visit_except(&mut self, node: Node<'_>) {
        let alias = node.child_by_field_name("alias");
        for child in children(node) {
            if Some(child.id()) == alias.map(|a| a.id()) {
                self.bind_target(child, SymbolKind::Variable);
            } else {
                self.visit(child);
            }
        }
    }

    fn visit_binary(&mut self, node: Node<'_>) {
        let operator = node.child_by_field_name("operator").map(|op| op.kind()).unwrap_or("");
        let (Some(left), Some(right)) =
            (node.child_by_field_name("left"), node.child_by_field_name("right"))
        else {
            self.visit_children(node);
            return;
        };

        if operator == "%" && is_string_node(left) {
            if right.kind() == "tuple" || right.kind() == "parenthesized_expression" {
                for item in children(right) {
                    self.note(item, |h| h.formatted = true);
                }
            } else {
                self.note(right, |h| h.formatted = true);
            }
        } else if operator == "+" && (is_string_node(left) || is_string_node(right)) {
            self.note(left, |h| h.formatted = true);
            self.note(right, |h| h.formatted = true);
        } else if ARITHMETIC_OPS.contains(&operator) {
            let left_float = left.kind() == "float";
            let right_float = right.kind() == "float";
            self.note(left, |h| {
                h.arithmetic = true;
                h.float_arithmetic |= right_float;
            });
            self.note(right, |h| {
                h.arithmetic = true;
                h.float_arithmetic |= left_float;
            });
        }
        self.visit(left);
        self.visit(right);
    }

    fn visit_comparison(&mut self, node: Node<'_>) {
        let operands = children(node);
        let mut cursor = node.walk();
        let membership = node
            .children(&mut cursor)
            .any(|c| !c.is_named() && matches!(c.kind(), "in" | "not in"));
        if membership {
            if let Some(container) = operands.last() {
                self.note(*container, |h| h.iterated = true);
            }
        }
        for operand in operands {
            self.visit(operand);
        }
    }

    fn visit_subscript(&mut self, node: Node<'_>) {
        let value = node.child_by_field_name("value");
        let subscript = node.child_by_field_name("subscript");
        if let (Some(value), Some(subscript)) = (value, subscript) {
            let by_str = is_string_node(subscript);
            let by_int = matches!(subscript.kind(), "integer" | "slice" | "unary_operator");
            self.note(value, |h| {
                h.subscript_str |= by_str;
                h.subscript_int |= by_int;
            });
        }
        self.visit_children(node);
    }

    fn visit_case(&mut self, node: Node<'_>) {
        for child in children(node) {
            if child.kind() == "case_pattern" {
                self.visit_pattern(child);
            } else {
                self.visit(child);
            }
        }
    }

    /// Capture names in `case` patterns bind; class and value patterns read.
    fn visit_pattern(&mut self, node: Node<'_>) {
        match node.kind() {
            "dotted_name" => {
                let parts = children(node);
                match parts.as_slice() {
                    [single] => {
                        let name = self.text(*single);
                        if name != "_" {
                            self.bind(name, SymbolKind::Variable);
                        }
                    }
                    [first, ..] => self.read(*first),
                    [] => {}
                }
            }
            "class_pattern" => {
                for child in children(node) {
                    if child.kind() == "dotted_name" {
                        if let Some(first) = child.named_child(0) {
                            self.read(first);
                        }
                    } else {
                        self.visit_pattern(child);
                    }
                }
            }
            "keyword_pattern" => {
                for child in children(node).into_iter().skip(1) {
                    self.visit_pattern(child);
                }
            }
            "as_pattern" => {
                let alias = node.child_by_field_name("alias");
                for child in children(node) {
                    if Some(child.id()) == alias.map(|a| a.id()) {
                        self.bind_target(child, SymbolKind::Variable);
                    } else {
                        self.visit_pattern(child);
                    }
                }
            }
            "identifier" => {
                let name = self.text(node);
                self.bind(name, SymbolKind::Variable);
            }
            _ => {
                for child in children(node) {
                    self.visit_pattern(child);
                }
            }
        }
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

fn is_string_node(node: Node<'_>) -> bool {
    matches!(node.kind(), "string" | "concatenated_string")
}

/// Names introduced by an import statement.
pub(crate) fn import_bindings(node: Node<'_>, src: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let bound = match name.kind() {
            "aliased_import" => name.child_by_field_name("alias"),
            _ => Some(name),
        };
        let Some(bound) = bound else { continue };
        let text = bound.utf8_text(src).unwrap_or("");
        let binding = if node.kind() == "import_statement" {
            text.split('.').next().unwrap_or("")
        } else {
            text.rsplit('.').next().unwrap_or("")
        };
        if !binding.is_empty() {
            names.push(binding.trim().to_string());
        }
    }
    names
}

/// Module-level names one root statement binds, in binding order.
pub(crate) fn statement_bindings(node: Node<'_>, src: &[u8]) -> Vec<String> {
    let mut bound = Vec::new();
    match node.kind() {
        "import_statement" | "import_from_statement" => bound = import_bindings(node, src),
        "function_definition" | "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                bound.push(name.utf8_text(src).unwrap_or("").to_string());
            }
        }
        "decorated_definition" => {
            if let Some(definition) = node.child_by_field_name("definition") {
                bound = statement_bindings(definition, src);
            }
        }
        kind => {
            if kind == "for_statement" {
                if let Some(left) = node.child_by_field_name("left") {
                    collect_target_names(left, src, &mut bound);
                }
            }
            let (mut globals, mut nonlocals) = (HashSet::new(), HashSet::new());
            collect_bindings_in(node, src, &mut bound, &mut globals, &mut nonlocals);
        }
    }
    let mut seen = HashSet::new();
    bound.retain(|name| !name.is_empty() && seen.insert(name.clone()));
    bound
}

fn collect_target_names(node: Node<'_>, src: &[u8], out: &mut Vec<String>) {
    match node.kind() {
        "identifier" => out.push(node.utf8_text(src).unwrap_or("").to_string()),
        "attribute" | "subscript" => {}
        _ => {
            let kids = children(node);
            if kids.is_empty() {
                let text = node.utf8_text(src).unwrap_or("");
                if is_identifier(text) {
                    out.push(text.to_string());
                }
            }
            for child in kids {
                collect_target_names(child, src, out);
            }
        }
    }
}

/// Names local to a function body, excluding `global`/`nonlocal` declarations.
fn function_locals(
    body: Node<'_>,
    src: &[u8],
    params: &[String],
) -> (HashSet<String>, HashSet<String>) {
    let mut bound = Vec::new();
    let mut globals = HashSet::new();
    let mut nonlocals = HashSet::new();
    collect_bindings(body, src, &mut bound, &mut globals, &mut nonlocals);

    let locals = params
        .iter()
        .cloned()
        .chain(bound)
        .filter(|name| !globals.contains(name) && !nonlocals.contains(name))
        .collect();
    (locals, globals)
}

fn collect_bindings(
    node: Node<'_>,
    src: &[u8],
    bound: &mut Vec<String>,
    globals: &mut HashSet<String>,
    nonlocals: &mut HashSet<String>,
) {
    for child in children(node) {
        match child.kind() {
            "function_definition" | "class_definition" => {
                if let Some(name) = child.child_by_field_name("name") {
                    bound.push(name.utf8_text(src).unwrap_or("").to_string());
                }
            }
            "lambda" => {}
            kind if COMPREHENSIONS.contains(&kind) => {}
            "assignment" | "augmented_assignment" => {
                if let Some(left) = child.child_by_field_name("left") {
                    collect_target_names(left, src, bound);
                }
                if let Some(right) = child.child_by_field_name("right") {
                    collect_bindings_in(right, src, bound, globals, nonlocals);
                }
            }
            "for_statement" => {
                if let Some(left) = child.child_by_field_name("left") {
                    collect_target_names(left, src, bound);
                }
                collect_bindings(child, src, bound, globals, nonlocals);
            }
            "as_pattern" | "except_clause" => {
                if let Some(alias) = child.child_by_field_name("alias") {
                    collect_target_names(alias, src, bound);
                }
                collect_bindings(child, src, bound, globals, nonlocals);
            }
            "named_expression" => {
                if let Some(name) = child.child_by_field_name("name") {
                    collect_target_names(name, src, bound);
                }
                collect_bindings(child, src, bound, globals, nonlocals);
            }
            "import_statement" | "import_from_statement" => {
                bound.extend(import_bindings(child, src));
            }
            "global_statement" => {
                for name in children(child) {
                    globals.insert(name.utf8_text(src).unwrap_or("").to_string());
                }
            }
            "nonlocal_statement" => {
                for name in children(child) {
                    nonlocals.insert(name.utf8_text(src).unwrap_or("").to_string());
                }
            }
            "delete_statement" => {
                for target in children(child) {
                    collect_target_names(target, src, bound);
                }
            }
            _ => collect_bindings(child, src, bound, globals, nonlocals),
        }
    }
}

/// Like [`collect_bindings`] but also inspects `node` itself.
fn collect_bindings_in(
    node: Node<'_>,
    src: &[u8],
    bound: &mut Vec<String>,
    globals: &mut HashSet<String>,
    nonlocals: &mut HashSet<String>,
) {
    match node.kind() {
        "assignment" | "augmented_assignment" => {
            if let Some(left) = node.child_by_field_name("left") {
                collect_target_names(left, src, bound);
            }
            if let Some(right) = node.child_by_field_name("right") {
                collect_bindings_in(right, src, bound, globals, nonlocals);
            }
        }
        "named_expression" => {
            if let Some(name) = node.child_by_field_name("name") {
                collect_target_names(name, src, bound);
            }
        }
        _ => collect_bindings(node, src, bound, globals, nonlocals),
    }
}
