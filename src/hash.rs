//! Structural content hashing for document subtrees.
//!
//! A node serializes as `name;key=value,key=value;text`, children follow in
//! document order, each prefixed with `|`. Attributes are taken in document
//! order, so the same attributes written in a different order hash
//! differently. The upstream generator emits a fixed attribute order, so a
//! reordering is treated as a change.
//!
//! Separator characters inside names, values and text are escaped with a
//! backslash, so no two distinct subtrees write the same string.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::upstream::Element;

/// SHA-256 digest of a serialized subtree.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(element: &Element) -> Self {
        let mut hashable = String::new();
        write_subtree(element, &mut hashable);
        Self(Sha256::digest(hashable.as_bytes()).into())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &hex::encode(self.0)[..12])
    }
}

fn write_subtree(element: &Element, out: &mut String) {
    write_node(element, out);
    for child in &element.children {
        out.push('|');
        write_subtree(child, out);
    }
}

fn write_node(element: &Element, out: &mut String) {
    push_escaped(&element.name, out);
    out.push(';');
    for (i, (key, value)) in element.attributes.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_escaped(key, out);
        out.push('=');
        push_escaped(value, out);
    }
    out.push(';');
    push_escaped(&element.text, out);
}

fn push_escaped(raw: &str, out: &mut String) {
    for c in raw.chars() {
        if matches!(c, '\\' | ';' | ',' | '=' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
}
