//! Splitting of absolute paths into the segments the handlers interpret.
use crate::descriptor::{parse_decimal, MAX_LAYERS};

pub const SEPARATOR: char = '/';

/// The maximum number of segments [tokenize] returns.
///
/// This leaves room for the root descriptor, one selector per layer, and
/// one more, so a path that is too deep stays too deep after tokenizing.
pub const MAX_PATH_TOKENS: usize = MAX_LAYERS + 2;

/// Splits a path into its non-empty segments, up to [MAX_PATH_TOKENS].
pub fn tokenize(path: &str) -> Vec<&str> {
    path.split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .take(MAX_PATH_TOKENS)
        .collect()
}

/// Joins segments back into an absolute path, without redundant separators.
pub fn canonical(tokens: &[&str]) -> String {
    let mut out = String::with_capacity(tokens.iter().map(|t| t.len() + 1).sum());
    for token in tokens {
        out.push(SEPARATOR);
        out.push_str(token);
    }
    out
}

/// Parses a segment selecting a child, which is a decimal index.
pub fn parse_selector(segment: &str) -> Option<u64> {
    parse_decimal(segment)
}

/// Appends a child name to a directory path.
/// The mount root is represented by the empty string.
pub fn join(parent: &str, name: &str) -> String {
    let mut out = String::with_capacity(parent.len() + name.len() + 1);
    out.push_str(parent);
    out.push(SEPARATOR);
    out.push_str(name);
    out
}

/// Returns the path without its last segment.
/// For paths directly below the mount root, this is the empty string.
pub fn parent(path: &str) -> &str {
    match path.rsplit_once(SEPARATOR) {
        Some((parent, _)) => parent,
        None => "",
    }
}
