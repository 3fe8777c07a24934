//! Type-inferred stand-ins for names with no located definition.
//!
//! Inference walks an ordered rule list (explicit overrides, known module
//! aliases, the contextual name table, usage evidence, naming patterns) and
//! falls back to text. The resulting [`ValueCategory`] is looked up in a
//! generator table, so new categories or renderings plug in through
//! [`PlaceholderRegistry::register`] without touching dispatch.

use crate::domain::{Placeholder, ValueCategory};
use crate::scan::UsageHints;
use std::collections::{BTreeMap, HashMap};

/// Confidence attached to every synthesized placeholder.
pub const PLACEHOLDER_CONFIDENCE: f64 = 0.2;

/// What a generator gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderRequest<'a> {
    pub symbol: &'a str,
    pub hints: &'a UsageHints,
}

pub type Generator = fn(&PlaceholderRequest<'_>) -> String;

type InferenceRule = fn(&str, &UsageHints) -> Option<ValueCategory>;

const CONTEXTUAL_VALUES: &[(&str, ValueCategory, &str)] = &[
    ("name", ValueCategory::Text, "\"John Doe\""),
    ("username", ValueCategory::Text, "\"jdoe\""),
    ("email", ValueCategory::Text, "\"john@example.com\""),
    ("age", ValueCategory::Integer, "25"),
    ("price", ValueCategory::Float, "99.99"),
    ("active", ValueCategory::Boolean, "True"),
    ("count", ValueCategory::Integer, "10"),
    ("items", ValueCategory::Sequence, "[\"item1\", \"item2\", \"item3\"]"),
    ("numbers", ValueCategory::Sequence, "[1, 2, 3, 4, 5]"),
    ("data", ValueCategory::Mapping, "{\"id\": 1, \"value\": \"example\"}"),
    ("config", ValueCategory::Mapping, "{\"debug\": True, \"timeout\": 30}"),
];

/// Conventional import aliases; a free `np` almost always means numpy.
const MODULE_ALIASES: &[(&str, &str)] = &[
    ("np", "import numpy as np"),
    ("pd", "import pandas as pd"),
    ("plt", "import matplotlib.pyplot as plt"),
    ("sns", "import seaborn as sns"),
    ("tf", "import tensorflow as tf"),
    ("torch", "import torch"),
    ("os", "import os"),
    ("sys", "import sys"),
    ("json", "import json"),
    ("re", "import re"),
    ("math", "import math"),
    ("random", "import random"),
    ("time", "import time"),
    ("collections", "import collections"),
    ("itertools", "import itertools"),
    ("functools", "import functools"),
    ("pathlib", "import pathlib"),
    ("logging", "import logging"),
    ("csv", "import csv"),
];

const TEXT_METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "split",
    "format",
    "replace",
    "startswith",
    "endswith",
    "join",
    "encode",
];
const SEQUENCE_METHODS: &[&str] =
    &["append", "extend", "pop", "sort", "insert", "remove", "reverse"];
const MAPPING_METHODS: &[&str] = &["keys", "values", "items", "get", "update", "setdefault"];

#[derive(Debug, Clone)]
pub struct PlaceholderRegistry {
    generators: HashMap<ValueCategory, Generator>,
    rules: Vec<InferenceRule>,
    overrides: BTreeMap<String, String>,
}

impl Default for PlaceholderRegistry {
    fn default() -> Self {
        let mut generators: HashMap<ValueCategory, Generator> = HashMap::new();
        generators.insert(ValueCategory::Sequence, |r| format!("{} = [1, 2, 3]", r.symbol));
        generators
            .insert(ValueCategory::Mapping, |r| format!("{} = {{\"key\": \"value\"}}", r.symbol));
        generators.insert(ValueCategory::Text, |r| format!("{} = \"sample_text\"", r.symbol));
        generators.insert(ValueCategory::Integer, |r| format!("{} = 42", r.symbol));
        generators.insert(ValueCategory::Float, |r| format!("{} = 3.14", r.symbol));
        generators.insert(ValueCategory::Boolean, |r| format!("{} = True", r.symbol));
        generators.insert(ValueCategory::Callable, callable_stub);
        generators.insert(ValueCategory::Class, class_stub);
        generators.insert(ValueCategory::Module, module_import);
        generators.insert(ValueCategory::Object, object_stub);

        Self {
            generators,
            rules: vec![module_alias_rule as InferenceRule, usage_rule, naming_rule],
            overrides: BTreeMap::new(),
        }
    }
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbol → literal expression, consulted before any inference.
    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Replace (or add) the generator for a category.
    pub fn register(&mut self, category: ValueCategory, generator: Generator) {
        self.generators.insert(category, generator);
    }

    pub fn infer_category(&self, symbol: &str, hints: &UsageHints) -> ValueCategory {
        if let Some((_, category, _)) = contextual(symbol) {
            return *category;
        }
        self.rules
            .iter()
            .find_map(|rule| rule(symbol, hints))
            .unwrap_or(ValueCategory::Text)
    }

    pub fn synthesize(
        &self,
        symbol: &str,
        hints: &UsageHints,
        required_by: Option<usize>,
    ) -> Placeholder {
        let category = self.infer_category(symbol, hints);

        let code = if let Some(expr) = self.overrides.get(symbol) {
            format!("{symbol} = {}", expr.trim())
        } else if let Some((_, _, literal)) = contextual(symbol) {
            format!("{symbol} = {literal}")
        } else {
            let request = PlaceholderRequest { symbol, hints };
            match self.generators.get(&category) {
                Some(generate) => generate(&request),
                None => format!("{symbol} = None"),
            }
        };

        tracing::debug!(symbol, category = category.as_str(), "synthesized placeholder");
        Placeholder { symbol: symbol.to_string(), category, code, required_by }
    }
}

fn contextual(symbol: &str) -> Option<&'static (&'static str, ValueCategory, &'static str)> {
    let lowered = symbol.to_ascii_lowercase();
    CONTEXTUAL_VALUES.iter().find(|(name, _, _)| *name == lowered)
}

fn module_alias_rule(symbol: &str, hints: &UsageHints) -> Option<ValueCategory> {
    let known = MODULE_ALIASES.iter().any(|(alias, _)| *alias == symbol);
    (known && !hints.called).then_some(ValueCategory::Module)
}

fn usage_rule(symbol: &str, hints: &UsageHints) -> Option<ValueCategory> {
    let capitalized = symbol.chars().next().is_some_and(char::is_uppercase);
    if hints.subclassed || (hints.called && capitalized) {
        return Some(ValueCategory::Class);
    }
    if hints.called || hints.decorator {
        return Some(ValueCategory::Callable);
    }
    if hints.context_manager {
        return Some(ValueCategory::Object);
    }
    if hints.subscript_str {
        return Some(ValueCategory::Mapping);
    }
    if hints.iterated || hints.len_taken || hints.subscript_int {
        return Some(ValueCategory::Sequence);
    }
    if hints.formatted {
        return Some(ValueCategory::Text);
    }
    if hints.float_arithmetic {
        return Some(ValueCategory::Float);
    }
    if hints.arithmetic {
        return Some(ValueCategory::Integer);
    }
    if hints.attributes.is_empty() {
        return None;
    }
    let all_in = |methods: &[&str]| hints.attributes.iter().all(|a| methods.contains(&a.as_str()));
    Some(if all_in(TEXT_METHODS) {
        ValueCategory::Text
    } else if all_in(SEQUENCE_METHODS) {
        ValueCategory::Sequence
    } else if all_in(MAPPING_METHODS) {
        ValueCategory::Mapping
    } else {
        ValueCategory::Object
    })
}

fn naming_rule(symbol: &str, _hints: &UsageHints) -> Option<ValueCategory> {
    let name = symbol.to_ascii_lowercase();
    let ends = |suffixes: &[&str]| suffixes.iter().any(|s| name.ends_with(s));
    let is = |names: &[&str]| names.contains(&name.as_str());

    if ["is_", "has_", "can_", "should_"].iter().any(|p| name.starts_with(p))
        || ends(&["_enabled", "_flag"])
        || is(&["enabled", "debug", "verbose", "flag"])
    {
        return Some(ValueCategory::Boolean);
    }
    if ends(&["_count", "_num", "_size", "_index", "_id", "_total", "_len", "_length"])
        || is(&["n", "i", "j", "k", "total", "size", "index", "idx", "num", "limit", "offset"])
    {
        return Some(ValueCategory::Integer);
    }
    if ends(&["_rate", "_ratio", "_price", "_score", "_amount", "_percent"])
        || is(&["rate", "ratio", "score", "amount", "threshold", "alpha"])
    {
        return Some(ValueCategory::Float);
    }
    if ends(&["_name", "_text", "_msg", "_message", "_path", "_url", "_str", "_title", "_label"])
        || is(&[
            "text", "message", "msg", "path", "url", "title", "label", "prefix", "suffix", "word",
            "line",
        ])
    {
        return Some(ValueCategory::Text);
    }
    if ends(&["_dict", "_map", "_config", "_settings", "_info"])
        || is(&["mapping", "settings", "options", "params", "kwargs", "payload"])
    {
        return Some(ValueCategory::Mapping);
    }
    if ends(&["_list", "_items", "_array", "_values"])
        || (name.len() > 3 && name.ends_with('s') && !name.ends_with("ss"))
    {
        return Some(ValueCategory::Sequence);
    }
    None
}

fn callable_stub(request: &PlaceholderRequest<'_>) -> String {
    format!("def {}(*args, **kwargs):\n    return None", request.symbol)
}

fn class_stub(request: &PlaceholderRequest<'_>) -> String {
    format!(
        "class {}:\n    def __init__(self, *args, **kwargs):\n        self.args = args\n        self.kwargs = kwargs",
        request.symbol
    )
}

fn module_import(request: &PlaceholderRequest<'_>) -> String {
    MODULE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == request.symbol)
        .map(|(_, import)| import.to_string())
        .unwrap_or_else(|| format!("import {}", request.symbol))
}

fn object_stub(request: &PlaceholderRequest<'_>) -> String {
    let mut members: Vec<String> = request
        .hints
        .attributes
        .iter()
        .map(|attr| format!("\"{attr}\": lambda self, *args, **kwargs: None"))
        .collect();
    if request.hints.context_manager {
        members.push("\"__enter__\": lambda self: self".to_string());
        members.push("\"__exit__\": lambda self, *exc: False".to_string());
    }
    format!("{0} = type(\"{0}\", (), {{{1}}})()", request.symbol, members.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> UsageHints {
        UsageHints::default()
    }

    #[test]
    fn unknown_names_fall_back_to_text() {
        let registry = PlaceholderRegistry::new();
        let p = registry.synthesize("unknown_value", &hints(), None);
        assert_eq!(p.category, ValueCategory::Text);
        assert_eq!(p.code, "unknown_value = \"sample_text\"");
    }

    #[test]
    fn contextual_names_get_realistic_values() {
        let registry = PlaceholderRegistry::new();
        assert_eq!(registry.synthesize("name", &hints(), None).code, "name = \"John Doe\"");
        assert_eq!(registry.synthesize("price", &hints(), None).code, "price = 99.99");
        assert_eq!(registry.synthesize("items", &hints(), None).category, ValueCategory::Sequence);
    }

    #[test]
    fn usage_beats_naming() {
        let registry = PlaceholderRegistry::new();
        let iterated = UsageHints { iterated: true, ..hints() };
        assert_eq!(registry.infer_category("user_name", &iterated), ValueCategory::Sequence);
        assert_eq!(registry.infer_category("user_name", &hints()), ValueCategory::Text);

        let called = UsageHints { called: true, call_arity: Some(2), ..hints() };
        assert_eq!(registry.infer_category("compute", &called), ValueCategory::Callable);
        assert_eq!(registry.infer_category("Widget", &called), ValueCategory::Class);

        let keyed = UsageHints { subscript_str: true, ..hints() };
        assert_eq!(registry.infer_category("row", &keyed), ValueCategory::Mapping);
    }

    #[test]
    fn stubs_are_definitions() {
        let registry = PlaceholderRegistry::new();
        let called = UsageHints { called: true, ..hints() };
        let code = registry.synthesize("helper", &called, Some(3)).code;
        assert!(code.starts_with("def helper(*args, **kwargs):"));

        let subclassed = UsageHints { subclassed: true, ..hints() };
        assert!(registry.synthesize("Base", &subclassed, None).code.starts_with("class Base:"));
    }

    #[test]
    fn module_aliases_become_imports() {
        let registry = PlaceholderRegistry::new();
        let attrs = UsageHints { attributes: ["zeros".to_string()].into(), ..hints() };
        let p = registry.synthesize("np", &attrs, None);
        assert_eq!(p.category, ValueCategory::Module);
        assert_eq!(p.code, "import numpy as np");
    }

    #[test]
    fn objects_expose_accessed_attributes() {
        let registry = PlaceholderRegistry::new();
        let used = UsageHints {
            attributes: ["connect".to_string()].into(),
            context_manager: true,
            ..hints()
        };
        let code = registry.synthesize("session", &used, None).code;
        assert!(code.starts_with("session = type(\"session\", (), {"));
        assert!(code.contains("\"connect\": lambda self, *args, **kwargs: None"));
        assert!(code.contains("__enter__"));
    }

    #[test]
    fn overrides_and_registered_generators_take_effect() {
        let mut registry = PlaceholderRegistry::new()
            .with_overrides([("limit".to_string(), "7".to_string())].into());
        assert_eq!(registry.synthesize("limit", &hints(), None).code, "limit = 7");

        registry.register(ValueCategory::Text, |r| format!("{} = 'custom'", r.symbol));
        assert_eq!(registry.synthesize("mystery", &hints(), None).code, "mystery = 'custom'");
    }
}
