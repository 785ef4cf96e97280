//! Token streams, their canonical rendering, and fingerprints.

use sha2::{Digest, Sha256};
use tree_sitter::Node;

/// Node kinds whose full text is one token even though the grammar gives them
/// children.
const ATOMIC_KINDS: &[&str] = &["string_literal", "character_literal", "text_block"];

/// Separator fed to the hasher between tokens.
const TOKEN_SEPARATOR: u8 = 0x1F;

/// Collect the leaf tokens under `node` in source order, skipping comments.
pub(crate) fn collect(node: Node, source: &[u8], out: &mut Vec<String>) {
    if node.is_extra() || node.kind().ends_with("comment") {
        return;
    }
    if node.child_count() == 0 || ATOMIC_KINDS.contains(&node.kind()) {
        let text = node_text(&node, source);
        if !text.is_empty() {
            out.push(text);
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(child, source, out);
    }
}

/// The tokens of `node`.
pub(crate) fn tokens_of(node: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    collect(node, source, &mut out);
    out
}

pub(crate) fn node_text(node: &Node, source: &[u8]) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    if start >= source.len() || end > source.len() {
        return String::new();
    }
    String::from_utf8_lossy(&source[start..end]).to_string()
}

/// Hex SHA-256 over a token stream.
///
/// Each token is followed by a unit separator byte, so `["ab", "c"]` and
/// `["a", "bc"]` hash differently.
///
/// # Examples
///
/// ```
/// use diffscope_syntax::fingerprint;
///
/// let a = fingerprint(&["int", "x", ";"]);
/// let b = fingerprint(&["int", "x", ";"]);
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// assert_ne!(fingerprint(&["ab", "c"]), fingerprint(&["a", "bc"]));
/// ```
pub fn fingerprint<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut hasher = Sha256::new();
    for token in tokens {
        hasher.update(token.as_ref().as_bytes());
        hasher.update([TOKEN_SEPARATOR]);
    }
    format!("{:x}", hasher.finalize())
}

/// Join tokens into a single-spaced canonical form.
///
/// Punctuation hugs its neighbours the way Java is conventionally written, so
/// the same declaration always renders the same regardless of its layout.
///
/// # Examples
///
/// ```
/// use diffscope_syntax::render;
///
/// let tokens = ["(", "Map", "<", "K", ",", "V", ">", "m", ",", "String", "...", "rest", ")"];
/// assert_eq!(render(&tokens), "(Map<K, V> m, String... rest)");
/// ```
pub fn render<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut out = String::new();
    let mut prev: Option<&str> = None;
    for token in tokens {
        let token = token.as_ref();
        if let Some(p) = prev {
            if !no_space_after(p) && !no_space_before(token) {
                out.push(' ');
            }
        }
        out.push_str(token);
        prev = Some(token);
    }
    out
}

fn no_space_before(token: &str) -> bool {
    matches!(
        token,
        "," | ";" | ")" | "]" | "." | "(" | "[" | "..." | "::" | "<" | ">"
    )
}

fn no_space_after(token: &str) -> bool {
    matches!(token, "(" | "[" | "." | "<" | "@" | "::")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stream_renders_empty() {
        let tokens: [&str; 0] = [];
        assert_eq!(render(&tokens), "");
    }

    #[test]
    fn render_arrays_and_annotations() {
        let tokens = ["(", "@", "Nullable", "String", "[", "]", "args", ",", "int", "n", ")"];
        assert_eq!(render(&tokens), "(@Nullable String[] args, int n)");
    }

    #[test]
    fn render_wildcard_generics() {
        let tokens = ["(", "List", "<", "?", "extends", "T", ">", "xs", ")"];
        assert_eq!(render(&tokens), "(List<? extends T> xs)");
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        assert_ne!(fingerprint(&["a", "b"]), fingerprint(&["b", "a"]));
    }

    #[test]
    fn fingerprint_of_empty_stream_is_stable() {
        let tokens: [&str; 0] = [];
        assert_eq!(
            fingerprint(&tokens),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
