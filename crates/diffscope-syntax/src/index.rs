//! Package, primary type, and method extraction for Java sources.

use diffscope_core::{DiffError, MethodKey, MethodRecord};
use tree_sitter::{Node, Parser};

use crate::tokens::{self, fingerprint, render};

/// Kind of a file's primary type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A `class` declaration.
    Class,
    /// An `interface` declaration.
    Interface,
}

/// The first top-level class or interface of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    /// Simple name.
    pub name: String,
    /// Class or interface.
    pub kind: TypeKind,
    /// Methods and constructors declared directly in the body, in order.
    pub methods: Vec<MethodRecord>,
}

/// Everything diffscope needs from one parsed source file.
///
/// # Examples
///
/// ```
/// use diffscope_syntax::{JavaIndexer, TypeKind};
///
/// let mut indexer = JavaIndexer::new().unwrap();
/// let index = indexer
///     .index("package com.acme;\npublic class A { void m() {} }\n")
///     .unwrap();
/// assert_eq!(index.package_name, "com.acme");
/// assert_eq!(index.class_name(), Some("A"));
/// assert_eq!(index.methods().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyntaxIndex {
    /// Declared package, empty for the default package.
    pub package_name: String,
    /// The file's primary type, if it has one.
    pub primary_type: Option<TypeDeclaration>,
}

impl SyntaxIndex {
    /// Name of the primary type.
    pub fn class_name(&self) -> Option<&str> {
        self.primary_type.as_ref().map(|t| t.name.as_str())
    }

    /// Methods of the primary type; empty when there is none.
    pub fn methods(&self) -> &[MethodRecord] {
        self.primary_type
            .as_ref()
            .map(|t| t.methods.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the primary type is an interface.
    pub fn is_interface(&self) -> bool {
        matches!(
            self.primary_type,
            Some(TypeDeclaration {
                kind: TypeKind::Interface,
                ..
            })
        )
    }
}

/// Reusable Java parser.
///
/// Holds one tree-sitter parser; callers running in parallel each create
/// their own indexer.
pub struct JavaIndexer {
    parser: Parser,
}

impl JavaIndexer {
    /// Create an indexer with the Java grammar loaded.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Parse`] if the grammar is incompatible with the
    /// linked tree-sitter runtime.
    pub fn new() -> Result<Self, DiffError> {
        let language: tree_sitter::Language = tree_sitter_java::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| DiffError::Parse(format!("failed to set language: {e}")))?;
        Ok(Self { parser })
    }

    /// Parse `source` and extract its [`SyntaxIndex`].
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Parse`] if the source contains syntax errors.
    pub fn index(&mut self, source: &str) -> Result<SyntaxIndex, DiffError> {
        let Some(tree) = self.parser.parse(source, None) else {
            return Err(DiffError::Parse("parser produced no tree".into()));
        };
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error(root).map_or(0, |n| n.start_position().row + 1);
            return Err(DiffError::Parse(format!("syntax error near line {line}")));
        }

        let bytes = source.as_bytes();
        let mut index = SyntaxIndex::default();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "package_declaration" if index.package_name.is_empty() => {
                    index.package_name = package_name(child, bytes);
                }
                "class_declaration" if index.primary_type.is_none() => {
                    index.primary_type = type_declaration(child, TypeKind::Class, bytes);
                }
                "interface_declaration" if index.primary_type.is_none() => {
                    index.primary_type = type_declaration(child, TypeKind::Interface, bytes);
                }
                _ => {}
            }
        }

        tracing::trace!(
            package = %index.package_name,
            class = index.class_name().unwrap_or("-"),
            methods = index.methods().len(),
            "indexed source"
        );
        Ok(index)
    }
}

fn package_name(node: Node, source: &[u8]) -> String {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"));
    found
        .map(|n| render(&tokens::tokens_of(n, source)))
        .unwrap_or_default()
}

fn type_declaration(node: Node, kind: TypeKind, source: &[u8]) -> Option<TypeDeclaration> {
    let name = node
        .child_by_field_name("name")
        .map(|n| tokens::node_text(&n, source))?;
    let methods = node
        .child_by_field_name("body")
        .map(|body| collect_methods(body, source))
        .unwrap_or_default();
    Some(TypeDeclaration {
        name,
        kind,
        methods,
    })
}

fn collect_methods(body: Node, source: &[u8]) -> Vec<MethodRecord> {
    let mut methods = Vec::new();
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if !matches!(
            member.kind(),
            "method_declaration" | "constructor_declaration"
        ) {
            continue;
        }
        let Some(name) = member.child_by_field_name("name") else {
            continue;
        };
        let parameters = member
            .child_by_field_name("parameters")
            .map(|p| render(&tokens::tokens_of(p, source)))
            .unwrap_or_else(|| "()".to_string());

        methods.push(MethodRecord {
            key: MethodKey::new(tokens::node_text(&name, source), parameters),
            fingerprint: fingerprint(&tokens::tokens_of(member, source)),
        });
    }
    methods
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error)
}
