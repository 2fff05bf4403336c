// SPDX-License-Identifier: GPL-3.0-only

//! Minimal XML writer for attribute-heavy documents.
//!
//! The SMS Backup & Restore format is a flat, attribute-rich XML dialect:
//! almost all data lives in attributes, elements nest at most three levels
//! deep, and absent values are carried as the literal string `null` rather
//! than omitted. This module models exactly that shape — an ordered
//! attribute list per element, ordered children, and a document declaration —
//! and serializes it with indentation.
//!
//! # Example
//!
//! ```
//! use hangouts2sms::xml::{Document, Element};
//!
//! let root = Element::new("smses")
//!     .attr("count", 1)
//!     .child(Element::new("sms").attr("body", "hi & bye"));
//!
//! let doc = Document::new(root);
//! let out = doc.to_string();
//!
//! assert!(out.starts_with("<?xml version=\"1.0\""));
//! assert!(out.contains("body=\"hi &amp; bye\""));
//! ```

use std::fmt::{self, Display};

/// The `<?xml ...?>` declaration at the top of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// XML version, normally `1.0`.
    pub version: String,
    /// Document encoding, normally `utf-8`.
    pub encoding: String,
    /// Standalone flag, normally `yes`.
    pub standalone: String,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_owned(),
            encoding: "utf-8".to_owned(),
            standalone: "yes".to_owned(),
        }
    }
}

/// One element: a tag name, ordered attributes, and ordered children.
///
/// Attribute values are stored unescaped; escaping happens once, at write
/// time. An attribute added with [`Element::attr_opt`] and no value renders
/// as `null`, matching the consuming format's convention for unset fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, Option<String>)>,
    children: Vec<Element>,
}

impl Element {
    /// Creates an element with no attributes or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Appends an attribute.
    #[must_use]
    pub fn attr(mut self, name: &str, value: impl Display) -> Self {
        self.attributes
            .push((name.to_owned(), Some(value.to_string())));
        self
    }

    /// Appends an attribute whose value may be absent.
    ///
    /// `None` renders as the literal `null`.
    #[must_use]
    pub fn attr_opt(mut self, name: &str, value: Option<impl Display>) -> Self {
        self.attributes
            .push((name.to_owned(), value.map(|v| v.to_string())));
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Appends several child elements.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// The tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up an attribute value by name.
    ///
    /// Absent-valued attributes report as `"null"`, the form they take in
    /// the serialized output.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref().unwrap_or("null"))
    }

    /// The child elements, in insertion order.
    #[must_use]
    pub fn child_elements(&self) -> &[Element] {
        &self.children
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = " ".repeat(depth * 4);
        write!(f, "{pad}<{}", self.name)?;
        for (name, value) in &self.attributes {
            let value = value.as_deref().unwrap_or("null");
            write!(f, " {name}=\"{}\"", escape(value))?;
        }
        if self.children.is_empty() {
            writeln!(f, "/>")
        } else {
            writeln!(f, ">")?;
            for child in &self.children {
                child.write_indented(f, depth + 1)?;
            }
            writeln!(f, "{pad}</{}>", self.name)
        }
    }
}

/// A complete document: declaration plus root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// The XML declaration.
    pub declaration: Declaration,
    /// The root element.
    pub root: Element,
}

impl Document {
    /// Creates a document with the default declaration.
    #[must_use]
    pub fn new(root: Element) -> Self {
        Self {
            declaration: Declaration::default(),
            root,
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "<?xml version=\"{}\" encoding=\"{}\" standalone=\"{}\"?>",
            self.declaration.version, self.declaration.encoding, self.declaration.standalone
        )?;
        self.root.write_indented(f, 0)
    }
}

/// Escapes a string for use in an XML attribute value.
#[must_use]
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
