//! Format grammar.
//!
//! A format says how an object is laid out under its key: `segment ('/'
//! segment)*`, where a segment is a literal key component, the `{key}`
//! token (one key component per map entry), or a trailing empty segment
//! meaning "store the children recursively from here". A format that does
//! not end with an empty segment stores the object as a single blob.
//!
//! - `"/here"`: the object is one value at key `/here`
//! - `"/here/"`: each field `F` is stored under `/here/F`
//! - `"map/{key}/s1/"`: entry `k` of a map is stored under `map/k/s1/`

use std::collections::VecDeque;
use std::fmt;

use crate::error::{EncodingError, EncodingResult};

/// One element of a [`Format`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// A fixed key component.
    Literal(String),
    /// `{key}`: one key component naming a map entry.
    Key,
    /// `{index}`: one key component naming a sequence element.
    Index,
    /// The trailing empty segment.
    End,
}

impl Segment {
    fn parse(text: &str, last: bool) -> Segment {
        match text {
            "" if last => Segment::End,
            "{key}" => Segment::Key,
            "{index}" => Segment::Index,
            s => Segment::Literal(s.to_string()),
        }
    }

    /// Textual form of the segment inside a key.
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Literal(s) => s,
            Segment::Key => "{key}",
            Segment::Index => "{index}",
            Segment::End => "",
        }
    }
}

/// The remaining layout of an object, consumed front to back by the walker.
///
/// An empty format means the object is a blob at the current key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Format {
    segments: VecDeque<Segment>,
}

impl Format {
    /// Parses a format string. Parsing cannot fail: every string is a format.
    pub fn parse(text: &str) -> Format {
        let parts: Vec<&str> = text.split('/').collect();
        let last = parts.len() - 1;
        Format {
            segments: parts
                .iter()
                .enumerate()
                .map(|(i, p)| Segment::parse(p, i == last))
                .collect(),
        }
    }

    /// Parses a per-field format tag, which must be relative.
    pub fn parse_tag(tag: &str) -> EncodingResult<Format> {
        if tag.starts_with('/') {
            return Err(EncodingError::TagFirstSlash(tag.to_string()));
        }
        Ok(Format::parse(tag))
    }

    /// A format made of a single literal: a blob stored under `name`.
    pub fn literal(name: &str) -> Format {
        Format {
            segments: VecDeque::from([Segment::Literal(name.to_string())]),
        }
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.front()
    }

    /// Consumes the first segment.
    pub fn pop_front(&mut self) -> Option<Segment> {
        self.segments.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the object is stored recursively right here.
    pub fn is_end(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == Segment::End
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// The leading literal components, up to the first token or end marker.
    pub fn literal_prefix(&self) -> Vec<&str> {
        self.segments
            .iter()
            .map_while(|s| match s {
                Segment::Literal(l) => Some(l.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Drops a leading root marker (`/a/b` and `a/b` address the same keys).
    pub fn strip_root(&mut self) {
        if self.segments.len() > 1 && self.segments[0] == Segment::Literal(String::new()) {
            self.segments.pop_front();
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.segments.iter().map(Segment::as_str).collect();
        f.write_str(&parts.join("/"))
    }
}

/// Splits a literal key-path into components.
pub fn split_key(key: &str) -> Vec<String> {
    key.split('/').map(str::to_string).collect()
}

/// Splits a key-path for a Key-mode walk, ignoring a leading `/`.
pub(crate) fn split_relative_key(key: &str) -> Vec<String> {
    split_key(key.strip_prefix('/').unwrap_or(key))
}

/// Whether two formats address overlapping key spaces: one literal prefix
/// is a component-wise prefix of the other. Rooted and unrooted formats
/// address the same keys.
pub fn prefix_collision(a: &Format, b: &Format) -> bool {
    let (mut a, mut b) = (a.clone(), b.clone());
    a.strip_root();
    b.strip_root();
    let (a, b) = (a.literal_prefix(), b.literal_prefix());
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    long.iter().zip(short.iter()).all(|(x, y)| x == y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Segment {
        Segment::Literal(s.to_string())
    }

    #[test]
    fn trailing_slash_means_recursive() {
        let f = Format::parse("/here/");
        let segs: Vec<_> = f.segments().cloned().collect();
        assert_eq!(segs, vec![lit(""), lit("here"), Segment::End]);
    }

    #[test]
    fn no_trailing_slash_means_blob() {
        let f = Format::parse("/here");
        let segs: Vec<_> = f.segments().cloned().collect();
        assert_eq!(segs, vec![lit(""), lit("here")]);
    }

    #[test]
    fn empty_format_is_recursive_root() {
        assert!(Format::parse("").is_end());
    }

    #[test]
    fn key_tokens() {
        let f = Format::parse("map/{key}/s1/");
        let segs: Vec<_> = f.segments().cloned().collect();
        assert_eq!(segs, vec![lit("map"), Segment::Key, lit("s1"), Segment::End]);
        assert_eq!(f.literal_prefix(), vec!["map"]);
        assert_eq!(f.to_string(), "map/{key}/s1/");
    }

    #[test]
    fn tag_cannot_be_rooted() {
        assert_eq!(
            Format::parse_tag("/abs"),
            Err(EncodingError::TagFirstSlash("/abs".into()))
        );
        assert!(Format::parse_tag("rel/").is_ok());
    }

    #[test]
    fn strip_root_only_removes_leading_marker() {
        let mut f = Format::parse("/o/");
        f.strip_root();
        assert_eq!(f.to_string(), "o/");
        let mut f = Format::parse("");
        f.strip_root();
        assert!(f.is_end());
    }

    #[test]
    fn collisions() {
        let p = Format::parse;
        assert!(prefix_collision(&p("/a/"), &p("/a/b/")));
        assert!(prefix_collision(&p("/a/b/"), &p("/a/")));
        assert!(!prefix_collision(&p("/a/"), &p("/b/")));
        assert!(!prefix_collision(&p("/test/key"), &p("/test/key2")));
        assert!(prefix_collision(&p("/here"), &p("/here/")));
        assert!(prefix_collision(&p("/a/"), &p("a/")));
        assert!(prefix_collision(&p("a/b/"), &p("/a/")));
        assert!(!prefix_collision(&p("/a/"), &p("b/")));
    }

    #[test]
    fn relative_key_split() {
        assert_eq!(split_relative_key("/o/B"), vec!["o", "B"]);
        assert_eq!(split_relative_key("o/B/"), vec!["o", "B", ""]);
    }
}
