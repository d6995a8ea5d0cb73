//! `Sec-WebSocket-Extensions` header tokenizer and serializer (RFC 6455 §9.1).
//!
//! A header value is a comma-separated list of segments. Each segment is an
//! extension name followed by `;`-separated parameters, each of which is a
//! bare name, `name=token` or `name="quoted-string"`:
//!
//! ```text
//! permessage-deflate; client_max_window_bits, permessage-bzip2; server_max_compress_level=6
//! ```
//!
//! Extension and parameter names are case-insensitive and are lowercased on
//! parse. Segment order is preserved, since the first acceptable offer wins.

use std::fmt;

use crate::error::{Error, Result};

/// Value of a single extension parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamValue {
    /// The parameter appeared without `=`.
    Present,
    /// The parameter carried a token or (unescaped) quoted-string value.
    Token(String),
}

impl ParamValue {
    /// The value text, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Present => None,
            ParamValue::Token(s) => Some(s),
        }
    }
}

/// Ordered multimap from parameter name to the values it appeared with.
///
/// Headers produced by [`parse_header`] never hold more than one value per
/// name; maps built by hand may, and the algorithm parsers reject them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    entries: Vec<(String, Vec<ParamValue>)>,
}

impl ParamMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name` (lowercased), keeping first-seen order.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into().to_ascii_lowercase();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Insert a parameter without a value.
    pub fn insert_flag(&mut self, name: impl Into<String>) {
        self.insert(name, ParamValue::Present);
    }

    /// Insert a parameter with a value.
    pub fn insert_value(&mut self, name: impl Into<String>, value: impl ToString) {
        self.insert(name, ParamValue::Token(value.to_string()));
    }

    /// All values recorded for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// Check if `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over `(name, values)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ParamValue])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Number of distinct parameter names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map holds no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One comma-separated entry of an extensions header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Extension name, lowercased.
    pub name: String,
    /// Parameters in wire order.
    pub params: ParamMap,
}

impl Segment {
    /// Create a segment with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            params: ParamMap::new(),
        }
    }

    /// Create a segment with the given parameters.
    pub fn with_params(name: impl Into<String>, params: ParamMap) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            params,
        }
    }

    /// Parse a header value holding exactly one segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the text is malformed or holds zero or
    /// several segments.
    pub fn parse(s: &str) -> Result<Self> {
        let mut segments = parse_header(s)?;
        if segments.len() != 1 {
            return Err(Error::Parse(format!(
                "expected one extension, found {}",
                segments.len()
            )));
        }
        Ok(segments.remove(0))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (name, values) in self.params.iter() {
            for value in values {
                match value {
                    ParamValue::Present => write!(f, "; {name}")?,
                    ParamValue::Token(v) if is_token(v) => write!(f, "; {name}={v}")?,
                    ParamValue::Token(v) => {
                        write!(f, "; {name}=\"")?;
                        for c in v.chars() {
                            if c == '"' || c == '\\' {
                                write!(f, "\\")?;
                            }
                            write!(f, "{c}")?;
                        }
                        write!(f, "\"")?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parse a full `Sec-WebSocket-Extensions` header value.
///
/// Empty list elements (`a, , b`) are ignored, as RFC 7230's `#rule` allows.
/// A blank header yields an empty list.
///
/// # Errors
///
/// Returns [`Error::Parse`] for a missing extension or parameter name, a `=`
/// with no value, an unterminated quoted string, stray characters, or a
/// parameter name repeated within one segment.
pub fn parse_header(header: &str) -> Result<Vec<Segment>> {
    let mut cursor = Cursor::new(header);
    let mut segments = Vec::new();

    loop {
        cursor.skip_ows();
        match cursor.peek() {
            None => break,
            Some(b',') => {
                cursor.bump();
                continue;
            }
            Some(_) => {}
        }

        let name = cursor.token();
        if name.is_empty() {
            return Err(cursor.unexpected("extension name"));
        }
        let mut segment = Segment::new(name);

        cursor.skip_ows();
        while cursor.peek() == Some(b';') {
            cursor.bump();
            cursor.skip_ows();

            let param = cursor.token().to_ascii_lowercase();
            if param.is_empty() {
                return Err(cursor.unexpected("parameter name"));
            }
            cursor.skip_ows();

            let value = if cursor.peek() == Some(b'=') {
                cursor.bump();
                cursor.skip_ows();
                if cursor.peek() == Some(b'"') {
                    ParamValue::Token(cursor.quoted_string()?)
                } else {
                    let token = cursor.token();
                    if token.is_empty() {
                        return Err(Error::Parse(format!(
                            "empty value for parameter '{param}' in '{}'",
                            segment.name
                        )));
                    }
                    ParamValue::Token(token.to_string())
                }
            } else {
                ParamValue::Present
            };

            if segment.params.contains(&param) {
                return Err(Error::Parse(format!(
                    "repeated parameter '{param}' in '{}'",
                    segment.name
                )));
            }
            segment.params.insert(param, value);
            cursor.skip_ows();
        }

        match cursor.peek() {
            None | Some(b',') => segments.push(segment),
            Some(_) => return Err(cursor.unexpected("',' or ';'")),
        }
    }

    Ok(segments)
}

/// Join segments into one header value, in order.
#[must_use]
pub fn serialize(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// RFC 7230 `tchar`.
const fn is_tchar(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~')
        || b.is_ascii_alphanumeric()
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_tchar)
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_ows(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.bump();
        }
    }

    fn token(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_tchar) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn quoted_string(&mut self) -> Result<String> {
        // Opening quote.
        self.bump();
        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err(Error::Parse("unterminated quoted string".into()))
    }

    fn unexpected(&self, expected: &str) -> Error {
        match self.src[self.pos..].chars().next() {
            Some(c) => Error::Parse(format!(
                "expected {expected} at offset {}, found '{c}'",
                self.pos
            )),
            None => Error::Parse(format!("expected {expected}, found end of header")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> ParamValue {
        ParamValue::Token(s.to_string())
    }

    #[test]
    fn test_parse_simple() {
        let segments = parse_header("permessage-deflate").unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].name, "permessage-deflate");
        assert!(segments[0].params.is_empty());
    }

    #[test]
    fn test_parse_with_params() {
        let segments = parse_header(
            "permessage-deflate; client_max_window_bits; server_max_window_bits=10",
        )
        .unwrap();
        let params = &segments[0].params;
        assert_eq!(params.len(), 2);
        assert_eq!(
            params.get("client_max_window_bits"),
            Some(&[ParamValue::Present][..])
        );
        assert_eq!(
            params.get("server_max_window_bits"),
            Some(&[value("10")][..])
        );
    }

    #[test]
    fn test_parse_preserves_order() {
        let segments =
            parse_header("permessage-bzip2, permessage-deflate; client_max_window_bits, x-foo")
                .unwrap();
        let names: Vec<_> = segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["permessage-bzip2", "permessage-deflate", "x-foo"]);
    }

    #[test]
    fn test_parse_lowercases_names() {
        let segments = parse_header("PerMessage-Deflate; Server_No_Context_Takeover").unwrap();
        assert_eq!(segments[0].name, "permessage-deflate");
        assert!(segments[0].params.contains("server_no_context_takeover"));
    }

    #[test]
    fn test_parse_whitespace() {
        let segments =
            parse_header("  permessage-deflate ;\tserver_max_window_bits = 12 ,x-foo  ").unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[0].params.get("server_max_window_bits"),
            Some(&[value("12")][..])
        );
    }

    #[test]
    fn test_parse_quoted_string_with_escapes() {
        let segments = parse_header(r#"x-foo; a="10"; b="say \"hi\", ok""#).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].params.get("a"), Some(&[value("10")][..]));
        assert_eq!(
            segments[0].params.get("b"),
            Some(&[value("say \"hi\", ok")][..])
        );
    }

    #[test]
    fn test_parse_empty_quoted_string_is_value() {
        let segments = parse_header(r#"x-foo; a="""#).unwrap();
        assert_eq!(segments[0].params.get("a"), Some(&[value("")][..]));
    }

    #[test]
    fn test_parse_empty_header() {
        assert!(parse_header("").unwrap().is_empty());
        assert!(parse_header("  ,  ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_missing_name() {
        assert!(parse_header("; client_max_window_bits").is_err());
        assert!(parse_header("permessage-deflate; ").is_err());
        assert!(parse_header("permessage-deflate; =1").is_err());
    }

    #[test]
    fn test_parse_empty_value() {
        let err = parse_header("permessage-deflate; server_max_window_bits=").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_parse_repeated_param() {
        let err = parse_header(
            "permessage-deflate; client_max_window_bits; client_max_window_bits=10",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_repeated_param_across_segments_is_fine() {
        let segments = parse_header(
            "permessage-deflate; client_max_window_bits, permessage-deflate; client_max_window_bits",
        )
        .unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_parse_unterminated_quote() {
        assert!(parse_header(r#"x-foo; a="abc"#).is_err());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_header("permessage-deflate foo").is_err());
        assert!(parse_header("permessage-deflate; a=1 2").is_err());
    }

    #[test]
    fn test_display_segment() {
        let mut params = ParamMap::new();
        params.insert_flag("server_no_context_takeover");
        params.insert_value("client_max_window_bits", 12);
        let segment = Segment::with_params("permessage-deflate", params);
        assert_eq!(
            segment.to_string(),
            "permessage-deflate; server_no_context_takeover; client_max_window_bits=12"
        );
    }

    #[test]
    fn test_display_quotes_non_tokens() {
        let mut params = ParamMap::new();
        params.insert_value("a", "x y\"z");
        params.insert_value("b", "");
        let segment = Segment::with_params("x-foo", params);
        assert_eq!(segment.to_string(), r#"x-foo; a="x y\"z"; b="""#);
        assert_eq!(Segment::parse(&segment.to_string()).unwrap(), segment);
    }

    #[test]
    fn test_serialize_list() {
        let header = serialize(&[Segment::new("permessage-deflate"), Segment::new("x-foo")]);
        assert_eq!(header, "permessage-deflate, x-foo");
    }

    #[test]
    fn test_param_map_multimap() {
        let mut params = ParamMap::new();
        params.insert_value("Level", 1);
        params.insert_value("level", 2);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("LEVEL").map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_segment_parse_single() {
        assert!(Segment::parse("a, b").is_err());
        assert!(Segment::parse("").is_err());
        assert_eq!(Segment::parse("a").unwrap().name, "a");
    }
}
