//! Structural Query Engine
//!
//! Named, composable predicates over a [`SyntaxTree`]. Rules are written as JSON objects
//! (`kind`, `regex`, `matches`, `has`, `inside`, `not`, `any`, `all`, with `field` and
//! `stopBy` inside relations) and compiled eagerly into a [`RuleSet`]: every name is
//! registered, every reference resolved to a [`RuleId`], and reference cycles rejected
//! before a single node is visited.
//!
//! All keys present in one rule object must hold (conjunction).

use std::cell::RefCell;
use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::syntax::{Node, NodeId, SyntaxTree};

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// One named rule as it appears in a rule catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedRule {
    pub id: String,
    pub rule: RuleConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleConfig {
    pub kind: Option<String>,
    pub regex: Option<String>,
    pub matches: Option<String>,
    pub has: Option<Box<RuleConfig>>,
    pub inside: Option<Box<RuleConfig>>,
    pub not: Option<Box<RuleConfig>>,
    pub any: Option<Vec<RuleConfig>>,
    pub all: Option<Vec<RuleConfig>>,
    /// Only meaningful inside `has` / `inside`.
    pub field: Option<String>,
    /// Only meaningful inside `has` / `inside`.
    pub stop_by: Option<StopByConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StopByConfig {
    Keyword(StopKeyword),
    Rule(Box<RuleConfig>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopKeyword {
    Neighbor,
    End,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILED RULES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(usize);

#[derive(Debug)]
enum Matcher {
    Kind(String),
    Regex(Regex),
    Ref(RuleId),
    Has(Box<Relation>),
    Inside(Box<Relation>),
    Not(Box<Matcher>),
    Any(Vec<Matcher>),
    All(Vec<Matcher>),
}

#[derive(Debug)]
struct Relation {
    rule: Matcher,
    field: Option<String>,
    stop_by: StopBy,
}

impl Relation {
    fn accepts_field(&self, node: Node<'_>) -> bool {
        match &self.field {
            Some(field) => node.field_name() == Some(field.as_str()),
            None => true,
        }
    }
}

#[derive(Debug)]
enum StopBy {
    /// Direct children / parent only.
    Neighbor,
    /// Whole subtree / ancestor chain up to the root.
    End,
    /// Stops at the first node matching this rule, which is still tested.
    Rule(Matcher),
}

#[derive(Debug)]
struct CompiledRule {
    name: String,
    matcher: Matcher,
}

#[derive(Debug)]
pub struct RuleSet {
    names: HashMap<String, RuleId>,
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Parse a JSON array of `{ "id": ..., "rule": {...} }` objects.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let rules: Vec<NamedRule> = serde_json::from_str(json).map_err(ConfigError::MalformedRules)?;
        Self::new(rules)
    }

    pub fn new(rules: Vec<NamedRule>) -> Result<Self, ConfigError> {
        // Pass 1: register names.
        let mut names = HashMap::with_capacity(rules.len());
        for (index, named) in rules.iter().enumerate() {
            if names.insert(named.id.clone(), RuleId(index)).is_some() {
                return Err(ConfigError::DuplicateRule(named.id.clone()));
            }
        }

        // Pass 2: compile bodies, resolving references to ids.
        let mut compiled = Vec::with_capacity(rules.len());
        for named in &rules {
            let compiler = RuleCompiler {
                names: &names,
                rule: &named.id,
            };
            compiled.push(CompiledRule {
                name: named.id.clone(),
                matcher: compiler.compile(&named.rule, false)?,
            });
        }

        let set = RuleSet {
            names,
            rules: compiled,
        };
        set.check_cycles()?;
        Ok(set)
    }

    pub fn rule(&self, name: &str) -> Result<RuleId, ConfigError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownRule(name.to_string()))
    }

    pub fn name(&self, id: RuleId) -> &str {
        &self.rules[id.0].name
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Fresh evaluation context for nodes of `tree`. Reuse one across calls on the same
    /// tree to share memoized results.
    pub fn evaluator<'r, 't>(&'r self, tree: &'t SyntaxTree) -> Evaluator<'r, 't> {
        Evaluator {
            rules: self,
            tree,
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn evaluate(&self, rule: RuleId, node: Node<'_>) -> bool {
        self.evaluator(node.tree()).evaluate(rule, node)
    }

    pub fn find<'t>(&self, rule: RuleId, node: Node<'t>) -> Option<Node<'t>> {
        self.evaluator(node.tree()).find(rule, node)
    }

    pub fn find_all<'t>(&self, rule: RuleId, root: Node<'t>) -> Vec<Node<'t>> {
        self.evaluator(root.tree()).find_all(rule, root)
    }

    fn check_cycles(&self) -> Result<(), ConfigError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Fresh,
            Active,
            Done,
        }

        fn visit(
            set: &RuleSet,
            id: RuleId,
            marks: &mut [Mark],
            path: &mut Vec<RuleId>,
        ) -> Result<(), ConfigError> {
            match marks[id.0] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    let start = path.iter().position(|p| *p == id).unwrap_or(0);
                    let mut names: Vec<&str> = path[start..].iter().map(|p| set.name(*p)).collect();
                    names.push(set.name(id));
                    return Err(ConfigError::CircularReference(names.join(" -> ")));
                }
                Mark::Fresh => {}
            }
            marks[id.0] = Mark::Active;
            path.push(id);
            let mut refs = Vec::new();
            collect_refs(&set.rules[id.0].matcher, &mut refs);
            for next in refs {
                visit(set, next, marks, path)?;
            }
            path.pop();
            marks[id.0] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::Fresh; self.rules.len()];
        let mut path = Vec::new();
        for index in 0..self.rules.len() {
            visit(self, RuleId(index), &mut marks, &mut path)?;
        }
        Ok(())
    }
}

fn collect_refs(matcher: &Matcher, out: &mut Vec<RuleId>) {
    match matcher {
        Matcher::Kind(_) | Matcher::Regex(_) => {}
        Matcher::Ref(id) => out.push(*id),
        Matcher::Has(rel) | Matcher::Inside(rel) => {
            collect_refs(&rel.rule, out);
            if let StopBy::Rule(stop) = &rel.stop_by {
                collect_refs(stop, out);
            }
        }
        Matcher::Not(inner) => collect_refs(inner, out),
        Matcher::Any(list) | Matcher::All(list) => {
            for m in list {
                collect_refs(m, out);
            }
        }
    }
}

struct RuleCompiler<'a> {
    names: &'a HashMap<String, RuleId>,
    rule: &'a str,
}

impl RuleCompiler<'_> {
    fn compile(&self, config: &RuleConfig, in_relation: bool) -> Result<Matcher, ConfigError> {
        if !in_relation {
            if config.field.is_some() {
                return Err(self.misplaced("field"));
            }
            if config.stop_by.is_some() {
                return Err(self.misplaced("stopBy"));
            }
        }

        let mut parts = Vec::new();
        if let Some(kind) = &config.kind {
            parts.push(Matcher::Kind(kind.clone()));
        }
        if let Some(pattern) = &config.regex {
            let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
                rule: self.rule.to_string(),
                source,
            })?;
            parts.push(Matcher::Regex(regex));
        }
        if let Some(name) = &config.matches {
            let id = self.names.get(name).copied().ok_or_else(|| {
                ConfigError::UnknownReference {
                    rule: self.rule.to_string(),
                    reference: name.clone(),
                }
            })?;
            parts.push(Matcher::Ref(id));
        }
        if let Some(has) = &config.has {
            parts.push(Matcher::Has(Box::new(self.relation(has)?)));
        }
        if let Some(inside) = &config.inside {
            parts.push(Matcher::Inside(Box::new(self.relation(inside)?)));
        }
        if let Some(not) = &config.not {
            parts.push(Matcher::Not(Box::new(self.compile(not, false)?)));
        }
        if let Some(any) = &config.any {
            parts.push(Matcher::Any(self.compile_list(any)?));
        }
        if let Some(all) = &config.all {
            parts.push(Matcher::All(self.compile_list(all)?));
        }

        match parts.len() {
            // `has: { field: "x" }` alone means "has a child in field x".
            0 if in_relation && config.field.is_some() => Ok(Matcher::All(Vec::new())),
            0 => Err(ConfigError::EmptyRule {
                rule: self.rule.to_string(),
            }),
            1 => Ok(parts.remove(0)),
            _ => Ok(Matcher::All(parts)),
        }
    }

    fn compile_list(&self, configs: &[RuleConfig]) -> Result<Vec<Matcher>, ConfigError> {
        configs.iter().map(|c| self.compile(c, false)).collect()
    }

    fn relation(&self, config: &RuleConfig) -> Result<Relation, ConfigError> {
        let stop_by = match &config.stop_by {
            None | Some(StopByConfig::Keyword(StopKeyword::Neighbor)) => StopBy::Neighbor,
            Some(StopByConfig::Keyword(StopKeyword::End)) => StopBy::End,
            Some(StopByConfig::Rule(stop)) => StopBy::Rule(self.compile(stop, false)?),
        };
        Ok(Relation {
            rule: self.compile(config, true)?,
            field: config.field.clone(),
            stop_by,
        })
    }

    fn misplaced(&self, key: &'static str) -> ConfigError {
        ConfigError::MisplacedRelationKey {
            rule: self.rule.to_string(),
            key,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Evaluates rules against nodes of a single tree, memoizing named-rule results.
pub struct Evaluator<'r, 't> {
    rules: &'r RuleSet,
    tree: &'t SyntaxTree,
    memo: RefCell<HashMap<(RuleId, NodeId), bool>>,
}

impl<'r, 't> Evaluator<'r, 't> {
    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    pub fn evaluate(&self, rule: RuleId, node: Node<'t>) -> bool {
        debug_assert!(std::ptr::eq(node.tree(), self.tree));
        let key = (rule, node.id());
        if let Some(hit) = self.memo.borrow().get(&key) {
            return *hit;
        }
        let result = self.matches(&self.rules.rules[rule.0].matcher, node);
        self.memo.borrow_mut().insert(key, result);
        result
    }

    /// First node in `node`'s subtree (itself included) matching `rule`, in tree order.
    pub fn find(&self, rule: RuleId, node: Node<'t>) -> Option<Node<'t>> {
        node.descendants().find(|n| self.evaluate(rule, *n))
    }

    /// Every node in `root`'s subtree (itself included) matching `rule`, in tree order.
    pub fn find_all(&self, rule: RuleId, root: Node<'t>) -> Vec<Node<'t>> {
        root.descendants()
            .filter(|n| self.evaluate(rule, *n))
            .collect()
    }

    fn matches(&self, matcher: &Matcher, node: Node<'t>) -> bool {
        match matcher {
            Matcher::Kind(kind) => node.kind() == kind,
            Matcher::Regex(regex) => regex.is_match(node.text()),
            Matcher::Ref(id) => self.evaluate(*id, node),
            Matcher::Has(rel) => self.has(rel, node),
            Matcher::Inside(rel) => self.inside(rel, node),
            Matcher::Not(inner) => !self.matches(inner, node),
            Matcher::Any(list) => list.iter().any(|m| self.matches(m, node)),
            Matcher::All(list) => list.iter().all(|m| self.matches(m, node)),
        }
    }

    fn has(&self, rel: &Relation, node: Node<'t>) -> bool {
        node.children()
            .filter(|child| rel.accepts_field(*child))
            .any(|child| match &rel.stop_by {
                StopBy::Neighbor => self.matches(&rel.rule, child),
                StopBy::End => child.descendants().any(|n| self.matches(&rel.rule, n)),
                StopBy::Rule(stop) => self.has_until(&rel.rule, stop, child),
            })
    }

    fn has_until(&self, target: &Matcher, stop: &Matcher, node: Node<'t>) -> bool {
        if self.matches(target, node) {
            return true;
        }
        if self.matches(stop, node) {
            return false;
        }
        node.children()
            .any(|child| self.has_until(target, stop, child))
    }

    fn inside(&self, rel: &Relation, node: Node<'t>) -> bool {
        let mut child = node;
        while let Some(parent) = child.parent() {
            if rel.accepts_field(child) && self.matches(&rel.rule, parent) {
                return true;
            }
            match &rel.stop_by {
                StopBy::Neighbor => return false,
                StopBy::End => {}
                StopBy::Rule(stop) => {
                    if self.matches(stop, parent) {
                        return false;
                    }
                }
            }
            child = parent;
        }
        false
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
