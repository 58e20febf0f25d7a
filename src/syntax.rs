//! Syntax Module for the Vine Compiler
//!
//! Parses `.vine.ts` sources with oxc and lowers the AST into an owned, immutable tree of
//! generic nodes. Every node carries a kind name, the field it occupies in its parent, a
//! byte span and its source text; this is all the rule engine in [`crate::query`] looks at.
//!
//! Node ids are handed out in pre-order while the oxc visitor enters nodes, so the subtree
//! of a node is the contiguous id range `[id, last_descendant]` and id order is tree order.

use std::fmt;
use std::ops::Range;

use oxc_allocator::Allocator;
use oxc_ast::ast::{ClassType, FunctionType, VariableDeclarationKind};
use oxc_ast::AstKind;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// SPANS & IDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Half-open byte range `[start, end)` into the original source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `other` lies entirely within `self`.
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl From<oxc_span::Span> for Span {
    fn from(span: oxc_span::Span) -> Self {
        Span::new(span.start, span.end)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: &'static str,
    field: Option<&'static str>,
    span: Span,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    last_descendant: NodeId,
}

/// A syntax error reported by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SYNTAX TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: String,
    nodes: Vec<NodeData>,
}

impl SyntaxTree {
    /// Parse TypeScript module source. Syntax errors do not prevent a tree from being
    /// produced; they are returned alongside it.
    pub fn parse(source: &str) -> (Self, Vec<ParseError>) {
        let allocator = Allocator::default();
        let source_type = SourceType::default()
            .with_typescript(true)
            .with_module(true);
        let ret = Parser::new(&allocator, source, source_type).parse();

        let errors = ret
            .errors
            .iter()
            .map(|error| ParseError {
                message: error.to_string(),
            })
            .collect();

        let mut builder = TreeBuilder::default();
        builder.visit_program(&ret.program);
        let tree = SyntaxTree {
            source: source.to_string(),
            nodes: builder.finish(source.len()),
        };
        (tree, errors)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: NodeId(0),
        }
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Source text covered by `span`, or the empty string when the span is out of range.
    pub fn slice(&self, span: Span) -> &str {
        self.source.get(span.range()).unwrap_or("")
    }
}

/// Immutable handle to one node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    fn data(&self) -> &'t NodeData {
        &self.tree.nodes[self.id.index()]
    }

    fn wrap(&self, id: NodeId) -> Node<'t> {
        Node {
            tree: self.tree,
            id,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    pub fn kind(&self) -> &'static str {
        self.data().kind
    }

    /// Name of the field this node occupies in its parent, if any.
    pub fn field_name(&self) -> Option<&'static str> {
        self.data().field
    }

    pub fn span(&self) -> Span {
        self.data().span
    }

    pub fn text(&self) -> &'t str {
        self.tree.slice(self.span())
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.data().parent.map(|id| self.wrap(id))
    }

    pub fn is_root(&self) -> bool {
        self.data().parent.is_none()
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |&id| Node { tree, id })
    }

    /// First child stored under `name`.
    pub fn field(&self, name: &str) -> Option<Node<'t>> {
        self.children().find(|child| child.field_name() == Some(name))
    }

    /// Every child stored under `name`, in source order (`argument` repeats).
    pub fn fields(&self, name: &'t str) -> impl Iterator<Item = Node<'t>> + 't {
        self.children()
            .filter(move |child| child.field_name() == Some(name))
    }

    /// Parent, grandparent, ... up to the program root.
    pub fn ancestors(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        std::iter::successors(self.parent(), move |node| {
            node.data().parent.map(|id| Node { tree, id })
        })
    }

    /// This node followed by all of its descendants in pre-order.
    pub fn descendants(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        let first = self.id.0;
        let last = self.data().last_descendant.0;
        (first..=last).map(move |id| Node {
            tree,
            id: NodeId(id),
        })
    }

    /// True when `self` sits strictly below `other`.
    pub fn is_descendant_of(&self, other: Node<'_>) -> bool {
        let last = other.data().last_descendant;
        self.id > other.id && self.id <= last
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}..{}",
            self.kind(),
            self.span().start,
            self.span().end
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

struct OpenNode {
    id: NodeId,
    /// Field spans of the typed AST node, claimed by the first child with the same span.
    fields: Vec<(&'static str, Span)>,
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<NodeData>,
    stack: Vec<OpenNode>,
}

impl TreeBuilder {
    fn finish(mut self, source_len: usize) -> Vec<NodeData> {
        if self.nodes.is_empty() {
            let id = NodeId(0);
            self.nodes.push(NodeData {
                kind: "program",
                field: None,
                span: Span::new(0, source_len as u32),
                parent: None,
                children: Vec::new(),
                last_descendant: id,
            });
        }
        self.nodes
    }
}

impl<'a> Visit<'a> for TreeBuilder {
    fn enter_node(&mut self, kind: AstKind<'a>) {
        let (name, fields) = describe(&kind);
        let span = Span::from(kind.span());
        let id = NodeId(self.nodes.len() as u32);

        let mut field = None;
        let parent = self.stack.last_mut().map(|open| {
            if let Some(pos) = open.fields.iter().position(|(_, s)| *s == span) {
                field = Some(open.fields.remove(pos).0);
            }
            open.id
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }

        self.nodes.push(NodeData {
            kind: name,
            field,
            span,
            parent,
            children: Vec::new(),
            last_descendant: id,
        });
        self.stack.push(OpenNode { id, fields });
    }

    fn leave_node(&mut self, _kind: AstKind<'a>) {
        if let Some(open) = self.stack.pop() {
            let last = NodeId(self.nodes.len().saturating_sub(1) as u32);
            self.nodes[open.id.index()].last_descendant = last;
        }
    }
}

/// Kind name and field spans for one oxc node.
fn describe(kind: &AstKind<'_>) -> (&'static str, Vec<(&'static str, Span)>) {
    let mut fields: Vec<(&'static str, Span)> = Vec::new();
    let name = match kind {
        AstKind::Program(_) => "program",
        AstKind::Hashbang(_) => "hashbang",
        AstKind::Directive(_) => "directive",
        AstKind::ImportDeclaration(_) => "import_declaration",
        AstKind::ExportNamedDeclaration(decl) => {
            if let Some(declaration) = &decl.declaration {
                fields.push(("declaration", declaration.span().into()));
            }
            "export_named_declaration"
        }
        AstKind::ExportDefaultDeclaration(decl) => {
            fields.push(("declaration", decl.declaration.span().into()));
            "export_default_declaration"
        }
        AstKind::ExportAllDeclaration(_) => "export_all_declaration",
        AstKind::Function(func) => {
            if let Some(id) = &func.id {
                fields.push(("id", id.span.into()));
            }
            fields.push(("params", func.params.span.into()));
            if let Some(body) = &func.body {
                fields.push(("body", body.span.into()));
            }
            match func.r#type {
                FunctionType::FunctionDeclaration | FunctionType::TSDeclareFunction => {
                    "function_declaration"
                }
                _ => "function_expression",
            }
        }
        AstKind::ArrowFunctionExpression(arrow) => {
            fields.push(("params", arrow.params.span.into()));
            fields.push(("body", arrow.body.span.into()));
            "arrow_function_expression"
        }
        AstKind::FunctionBody(_) => "function_body",
        AstKind::FormalParameters(_) => "formal_parameters",
        AstKind::FormalParameter(_) => "formal_parameter",
        AstKind::VariableDeclaration(decl) => match decl.kind {
            VariableDeclarationKind::Var => "variable_declaration",
            _ => "lexical_declaration",
        },
        AstKind::VariableDeclarator(decl) => {
            fields.push(("id", decl.id.span().into()));
            if let Some(init) = &decl.init {
                fields.push(("init", init.span().into()));
            }
            "variable_declarator"
        }
        AstKind::CallExpression(call) => {
            fields.push(("callee", call.callee.span().into()));
            for argument in &call.arguments {
                fields.push(("argument", argument.span().into()));
            }
            "call_expression"
        }
        AstKind::TaggedTemplateExpression(tagged) => {
            fields.push(("tag", tagged.tag.span().into()));
            fields.push(("quasi", tagged.quasi.span.into()));
            "tagged_template_expression"
        }
        AstKind::TemplateLiteral(_) => "template_literal",
        AstKind::StaticMemberExpression(member) => {
            fields.push(("object", member.object.span().into()));
            fields.push(("property", member.property.span.into()));
            "member_expression"
        }
        AstKind::IdentifierReference(_) | AstKind::BindingIdentifier(_) => "identifier",
        AstKind::IdentifierName(_) => "property_identifier",
        AstKind::StringLiteral(_) => "string_literal",
        AstKind::NumericLiteral(_) => "number_literal",
        AstKind::BooleanLiteral(_) => "boolean_literal",
        AstKind::ArrayExpression(_) => "array_expression",
        AstKind::ObjectExpression(_) => "object_expression",
        AstKind::ObjectProperty(prop) => {
            fields.push(("key", prop.key.span().into()));
            fields.push(("value", prop.value.span().into()));
            "pair"
        }
        AstKind::ObjectPattern(_) => "object_pattern",
        AstKind::BindingProperty(prop) => {
            fields.push(("key", prop.key.span().into()));
            fields.push(("value", prop.value.span().into()));
            "binding_property"
        }
        AstKind::ExpressionStatement(stmt) => {
            fields.push(("expression", stmt.expression.span().into()));
            "expression_statement"
        }
        AstKind::ReturnStatement(stmt) => {
            if let Some(argument) = &stmt.argument {
                fields.push(("argument", argument.span().into()));
            }
            "return_statement"
        }
        AstKind::BlockStatement(_) => "statement_block",
        AstKind::IfStatement(_) => "if_statement",
        AstKind::ForStatement(_) | AstKind::ForInStatement(_) | AstKind::ForOfStatement(_) => {
            "for_statement"
        }
        AstKind::WhileStatement(_) | AstKind::DoWhileStatement(_) => "while_statement",
        AstKind::Class(class) => {
            if let Some(id) = &class.id {
                fields.push(("id", id.span.into()));
            }
            match class.r#type {
                ClassType::ClassDeclaration => "class_declaration",
                ClassType::ClassExpression => "class_expression",
            }
        }
        AstKind::TSTypeAliasDeclaration(_) => "type_alias_declaration",
        AstKind::TSInterfaceDeclaration(_) => "interface_declaration",
        AstKind::TSEnumDeclaration(_) => "enum_declaration",
        AstKind::TSModuleDeclaration(_) => "module_declaration",
        AstKind::TSTypeLiteral(_) => "object_type",
        AstKind::TSPropertySignature(sig) => {
            fields.push(("key", sig.key.span().into()));
            if let Some(annotation) = &sig.type_annotation {
                fields.push(("type", annotation.span.into()));
            }
            "property_signature"
        }
        AstKind::TSTypeAnnotation(annotation) => {
            fields.push(("type", annotation.type_annotation.span().into()));
            "type_annotation"
        }
        AstKind::TSTypeParameterInstantiation(_) => "type_arguments",
        _ => "other",
    };
    (name, fields)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
