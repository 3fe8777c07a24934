//! Deny-list matching over the synthesized prelude's syntax tree.
//!
//! Matching is structural rather than textual: a name in a string or a
//! comment never trips a rule, while `from os import system` does. Import
//! aliases are followed, so `import os as o` makes `o.system` read as
//! `os.system`, and a denied operation stored without being called
//! (`runner = os.system`) counts the same as calling it.

use crate::error::UnsafeOperation;
use std::collections::HashMap;
use tree_sitter::{Node, Parser};

const WRITE_SUFFIX: &str = "(write)";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    /// Dotted operation name, matched exactly or as a prefix of a longer path.
    Name(String),
    /// A call that only counts when opened for writing (`open(write)`).
    WriteMode(String),
}

impl Rule {
    fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        match entry.strip_suffix(WRITE_SUFFIX) {
            Some(base) if !base.trim().is_empty() => {
                Some(Rule::WriteMode(base.trim().to_string()))
            }
            Some(_) => None,
            None => Some(Rule::Name(entry.to_string())),
        }
    }

    fn label(&self) -> String {
        match self {
            Rule::Name(name) => name.clone(),
            Rule::WriteMode(base) => format!("{base}{WRITE_SUFFIX}"),
        }
    }
}

fn path_matches(path: &str, rule: &str) -> bool {
    path == rule || path.strip_prefix(rule).is_some_and(|rest| rest.starts_with('.'))
}

#[derive(Debug, Clone, Default)]
pub struct DenyList {
    rules: Vec<Rule>,
}

impl DenyList {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        Self { rules: entries.iter().filter_map(|e| Rule::parse(e.as_ref())).collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every deny-listed operation in `source`, in source order.
    pub fn scan(&self, source: &str) -> Vec<UnsafeOperation> {
        if self.rules.is_empty() || source.trim().is_empty() {
            return Vec::new();
        }
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_python::LANGUAGE.into()).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(source, None) else {
            return Vec::new();
        };

        let src = source.as_bytes();
        let mut aliases = HashMap::new();
        collect_aliases(tree.root_node(), src, &mut aliases);

        let mut walk = Walk { rules: &self.rules, src, aliases, found: Vec::new() };
        walk.visit(tree.root_node());
        walk.found
    }
}

/// Local name -> dotted path it was imported as.
///
/// `import m as a` binds `a` to `m`; `from m import n [as a]` binds the
/// local name to `m.n`. Relative imports are left alone.
fn collect_aliases(node: Node<'_>, src: &[u8], aliases: &mut HashMap<String, String>) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                if name.kind() != "aliased_import" {
                    continue;
                }
                if let (Some(path), Some(alias)) = (imported_path(name, src), alias_of(name, src)) {
                    aliases.insert(alias, path);
                }
            }
        }
        "import_from_statement" => {
            let module = node
                .child_by_field_name("module_name")
                .filter(|m| m.kind() == "dotted_name")
                .and_then(|m| m.utf8_text(src).ok());
            if let Some(module) = module {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    let Some(item) = imported_path(name, src) else {
                        continue;
                    };
                    let local = alias_of(name, src).unwrap_or_else(|| item.clone());
                    aliases.insert(local, format!("{module}.{item}"));
                }
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_aliases(child, src, aliases);
            }
        }
    }
}

struct Walk<'a> {
    rules: &'a [Rule],
    src: &'a [u8],
    aliases: HashMap<String, String>,
    found: Vec<UnsafeOperation>,
}

impl Walk<'_> {
    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "call" => {
                self.check_call(node);
                let function = node.child_by_field_name("function");
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    let is_named_callee = function == Some(child)
                        && dotted_name(child, self.src).is_some();
                    if !is_named_callee {
                        self.visit(child);
                    }
                }
            }
            "import_statement" => {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    if let Some(module) = imported_path(name, self.src) {
                        self.check_path(&module, node);
                    }
                }
            }
            "import_from_statement" => {
                let module = node
                    .child_by_field_name("module_name")
                    .and_then(|m| m.utf8_text(self.src).ok())
                    .unwrap_or("")
                    .to_string();
                if !module.is_empty() {
                    self.check_path(&module, node);
                    let mut cursor = node.walk();
                    for name in node.children_by_field_name("name", &mut cursor) {
                        if let Some(item) = imported_path(name, self.src) {
                            self.check_path(&format!("{module}.{item}"), node);
                        }
                    }
                }
            }
            "identifier" | "attribute" => match dotted_name(node, self.src) {
                Some(path) => self.check_path(&self.resolve(&path), node),
                None => {
                    // Dynamic object such as `make().system`: only the object
                    // can hold a reference.
                    if let Some(object) = node.child_by_field_name("object") {
                        self.visit(object);
                    }
                }
            },
            "keyword_argument" => self.visit_fields(node, &["value"]),
            "function_definition" => {
                self.visit_fields(node, &["parameters", "return_type", "body"])
            }
            "class_definition" => self.visit_fields(node, &["superclasses", "body"]),
            "parameters" | "lambda_parameters" => {
                let mut cursor = node.walk();
                for param in node.named_children(&mut cursor) {
                    self.visit_fields(param, &["type", "value"]);
                }
            }
            "assignment" => {
                let binds_plain_name = node
                    .child_by_field_name("left")
                    .is_some_and(|left| left.kind() == "identifier");
                if binds_plain_name {
                    self.visit_fields(node, &["type", "right"]);
                } else {
                    self.visit_children(node);
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    fn visit_fields(&mut self, node: Node<'_>, fields: &[&str]) {
        for field in fields {
            if let Some(child) = node.child_by_field_name(field) {
                self.visit(child);
            }
        }
    }

    /// Rewrite the leading segment of `path` through the import aliases.
    fn resolve(&self, path: &str) -> String {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match (self.aliases.get(head), rest) {
            (Some(target), Some(rest)) => format!("{target}.{rest}"),
            (Some(target), None) => target.clone(),
            (None, _) => path.to_string(),
        }
    }

    fn check_call(&mut self, node: Node<'_>) {
        let callee = node.child_by_field_name("function").and_then(|f| dotted_name(f, self.src));
        let Some(callee) = callee else {
            return;
        };
        let resolved = self.resolve(&callee);
        let rule = self.rules.iter().find(|rule| match rule {
            Rule::Name(name) => path_matches(&resolved, name),
            Rule::WriteMode(base) => {
                (callee == *base || resolved == *base) && opens_for_write(node, self.src)
            }
        });
        if let Some(rule) = rule {
            self.found.push(violation(&resolved, rule, node));
        }
    }

    fn check_path(&mut self, path: &str, node: Node<'_>) {
        let rule = self.rules.iter().find(|rule| match rule {
            Rule::Name(name) => path_matches(path, name),
            Rule::WriteMode(_) => false,
        });
        if let Some(rule) = rule {
            self.found.push(violation(path, rule, node));
        }
    }
}

fn violation(operation: &str, rule: &Rule, node: Node<'_>) -> UnsafeOperation {
    UnsafeOperation {
        operation: operation.to_string(),
        rule: rule.label(),
        line: node.start_position().row + 1,
    }
}

/// `a.b.c` for identifier/attribute chains; `None` for anything dynamic.
fn dotted_name(node: Node<'_>, src: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => node.utf8_text(src).ok().map(str::to_string),
        "attribute" => {
            let object = dotted_name(node.child_by_field_name("object")?, src)?;
            let attr = node.child_by_field_name("attribute")?.utf8_text(src).ok()?;
            Some(format!("{object}.{attr}"))
        }
        _ => None,
    }
}

fn imported_path(name: Node<'_>, src: &[u8]) -> Option<String> {
    let path = match name.kind() {
        "aliased_import" => name.child_by_field_name("name")?,
        _ => name,
    };
    path.utf8_text(src).ok().map(|t| t.split_whitespace().collect())
}

fn alias_of(name: Node<'_>, src: &[u8]) -> Option<String> {
    if name.kind() != "aliased_import" {
        return None;
    }
    name.child_by_field_name("alias")?.utf8_text(src).ok().map(str::to_string)
}

/// Mode argument (second positional or `mode=`) containing a write flag.
/// A non-literal mode is treated as writable.
fn opens_for_write(call: Node<'_>, src: &[u8]) -> bool {
    let Some(args) = call.child_by_field_name("arguments") else {
        return false;
    };
    let mut cursor = args.walk();
    let mut positional = 0usize;
    let mut mode: Option<Node<'_>> = None;
    for arg in args.named_children(&mut cursor) {
        match arg.kind() {
            "keyword_argument" => {
                let is_mode = arg
                    .child_by_field_name("name")
                    .and_then(|n| n.utf8_text(src).ok())
                    .is_some_and(|n| n == "mode");
                if is_mode {
                    mode = arg.child_by_field_name("value");
                }
            }
            "comment" => {}
            _ => {
                positional += 1;
                if positional == 2 {
                    mode = Some(arg);
                }
            }
        }
    }

    match mode {
        None => false,
        Some(node) if node.kind() == "string" => {
            let text = node.utf8_text(src).unwrap_or("");
            let body = text
                .trim_start_matches(|c: char| c.is_ascii_alphabetic())
                .trim_matches(|c| c == '"' || c == '\'');
            body.chars().any(|c| matches!(c, 'w' | 'a' | 'x' | '+'))
        }
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::default_deny_list;

    fn scan(source: &str) -> Vec<String> {
        DenyList::new(&default_deny_list())
            .scan(source)
            .into_iter()
            .map(|v| v.operation)
            .collect()
    }

    #[test]
    fn flags_calls_by_dotted_name() {
        assert_eq!(scan("import os\nos.system('ls')\n"), vec!["os.system"]);
        assert_eq!(scan("result = eval(expr)"), vec!["eval"]);
        assert!(scan("evaluate(x)\nmy.eval(x)\n").is_empty());
    }

    #[test]
    fn flags_imports_of_denied_modules() {
        assert_eq!(scan("import subprocess"), vec!["subprocess"]);
        assert_eq!(scan("from os import system"), vec!["os.system"]);
        assert_eq!(scan("import urllib.request as r"), vec!["urllib.request"]);
        assert!(scan("import os\nimport json\nfrom urllib import parse\n").is_empty());
    }

    #[test]
    fn submodule_paths_match_their_prefix_rule() {
        assert_eq!(scan("subprocess.run(['ls'])"), vec!["subprocess.run"]);
        assert!(scan("requests_cache.install()").is_empty());
    }

    #[test]
    fn open_only_counts_in_write_mode() {
        assert!(scan("f = open('a.txt')\ng = open('b.txt', 'r')\n").is_empty());
        assert_eq!(scan("open('a.txt', 'w')"), vec!["open"]);
        assert_eq!(scan("open('a.txt', mode='a+')"), vec!["open"]);
        assert_eq!(scan("open(path, flags)"), vec!["open"]);
    }

    #[test]
    fn strings_and_comments_are_inert() {
        assert!(scan("# os.system('rm')\nmsg = 'eval(x)'\n").is_empty());
    }

    #[test]
    fn module_aliases_are_followed() {
        let source = "import os as o\ndef run():\n    o.system('rm -rf /tmp/x')\n";
        assert_eq!(scan(source), vec!["os.system"]);
        assert_eq!(scan("from os import system as sh\nsh('id')\n"), vec!["os.system", "os.system"]);
        assert_eq!(scan("import shutil as su\nsu.rmtree(p)\n"), vec!["shutil.rmtree"]);
    }

    #[test]
    fn from_import_aliases_do_not_leak_onto_builtins() {
        assert!(scan("from re import compile\npattern = compile('a+')\n").is_empty());
        assert_eq!(scan("code = compile(src, 'x', 'exec')"), vec!["compile"]);
    }

    #[test]
    fn stored_references_count_as_uses() {
        assert_eq!(scan("import os\nrunner = os.system\n"), vec!["os.system"]);
        assert_eq!(scan("handlers = {'run': eval}"), vec!["eval"]);
        assert_eq!(scan("results = list(map(eval, exprs))"), vec!["eval"]);
        assert_eq!(scan("import os as o\nrunner = o.popen\n"), vec!["os.popen"]);
    }

    #[test]
    fn bindings_and_unrelated_attributes_are_not_references() {
        assert!(scan("def run(eval=None, *, compile=False):\n    return 1\n").is_empty());
        assert!(scan("configure(eval=True)").is_empty());
        assert!(scan("class Job:\n    pass\nsettings.eval = 3\nitem = job.system\n").is_empty());
        assert!(scan("eval = None").is_empty());
    }

    #[test]
    fn call_results_are_still_searched() {
        assert_eq!(scan("out = subprocess.Popen(cmd).communicate()"), vec!["subprocess.Popen"]);
        assert_eq!(scan("make().system(eval)"), vec!["eval"]);
    }

    #[test]
    fn reports_line_and_rule() {
        let found = DenyList::new(&["os.system"]).scan("x = 1\nimport os\nos.system('id')\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 3);
        assert_eq!(found[0].rule, "os.system");
    }
}
