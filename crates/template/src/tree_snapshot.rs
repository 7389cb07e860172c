//! Deterministic text rendering of a parsed tree for golden tests.
//! Not a stable format.
//!
//! One line per node, two spaces of indentation per level:
//! - elements as `<prefix:name a="v">`, with ` (force-closed)` when left open
//!   at end of input;
//! - template-valued attributes as `@name` lines followed by their subtree;
//! - text and comments debug-quoted so line breaks stay visible;
//! - entities as `&path;`.

use std::fmt::{self, Write};

use crate::tree_builder::{AttrValue, Document, NodeId, NodeKind};

#[derive(Debug)]
pub struct TreeSnapshot {
    lines: Vec<String>,
}

impl TreeSnapshot {
    pub fn new(document: &Document) -> Self {
        let mut lines = vec!["#document".to_string()];
        for child in document.children(document.root()) {
            walk(document, *child, 0, &mut lines).expect("formatting into a String cannot fail");
        }
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for TreeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

fn walk(document: &Document, id: NodeId, depth: usize, lines: &mut Vec<String>) -> fmt::Result {
    let Some(node) = document.node(id) else {
        return Ok(());
    };
    let mut line = "  ".repeat(depth);
    match &node.kind {
        NodeKind::Document { .. } => line.push_str("#document"),
        NodeKind::Text { value } => write!(line, "{value:?}")?,
        NodeKind::Comment { value } => write!(line, "<!-- {value:?} -->")?,
        NodeKind::Entity { name } => write!(line, "&{name};")?,
        NodeKind::Element(element) => {
            let qualified = document.qualified_name(id).unwrap_or_default();
            line.push('<');
            line.push_str(&qualified);
            for attribute in element.attributes.iter() {
                if let AttrValue::Literal(value) = &attribute.value {
                    write!(line, " {}={value:?}", attribute.name)?;
                }
            }
            line.push('>');
            if element.force_closed {
                line.push_str(" (force-closed)");
            }
            lines.push(line);
            for attribute in element.attributes.iter() {
                if let AttrValue::Template(template) = attribute.value {
                    lines.push(format!("{}@{}", "  ".repeat(depth + 1), attribute.name));
                    for child in document.children(template) {
                        walk(document, *child, depth + 2, lines)?;
                    }
                }
            }
            for child in &element.children {
                walk(document, *child, depth + 1, lines)?;
            }
            return Ok(());
        }
    }
    lines.push(line);
    Ok(())
}
