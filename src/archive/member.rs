//! Member path tokenizer
//!
//! Parses a raw tar member path into segments using an explicit allow-list
//! of rules instead of a regular expression. The same rules apply to
//! user-supplied backup names.

use std::fmt;

/// Characters that must never appear in a member path or backup name
pub const FORBIDDEN_CHARS: [char; 11] = ['$', '|', ';', '&', '`', '(', ')', '<', '>', '{', '}'];

/// Rounds of percent-decoding applied when looking for encoded traversal
const MAX_DECODE_ROUNDS: usize = 3;

/// Why a path was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathViolation {
    Empty,
    NotUtf8,
    ControlCharacter,
    Absolute,
    Backslash,
    ForbiddenCharacter(char),
    EmptySegment,
    ParentTraversal,
    EncodedTraversal,
}

impl fmt::Display for PathViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathViolation::Empty => write!(f, "empty path"),
            PathViolation::NotUtf8 => write!(f, "path is not valid UTF-8"),
            PathViolation::ControlCharacter => write!(f, "path contains a control character"),
            PathViolation::Absolute => write!(f, "absolute path"),
            PathViolation::Backslash => write!(f, "path contains a backslash"),
            PathViolation::ForbiddenCharacter(c) => {
                write!(f, "path contains forbidden character '{}'", c)
            }
            PathViolation::EmptySegment => write!(f, "path contains an empty segment"),
            PathViolation::ParentTraversal => write!(f, "path contains a '..' segment"),
            PathViolation::EncodedTraversal => {
                write!(f, "path contains an encoded '..' segment")
            }
        }
    }
}

/// A member path that passed every rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPath {
    raw: String,
    segments: Vec<String>,
    is_dir: bool,
}

impl MemberPath {
    /// Parse raw path bytes as stored in a tar header
    pub fn parse(raw: &[u8]) -> Result<Self, PathViolation> {
        if raw.is_empty() {
            return Err(PathViolation::Empty);
        }

        let text = std::str::from_utf8(raw).map_err(|_| PathViolation::NotUtf8)?;

        // NUL is a control character, so embedded terminators end up here too
        if text.chars().any(char::is_control) {
            return Err(PathViolation::ControlCharacter);
        }
        if text.starts_with('/') {
            return Err(PathViolation::Absolute);
        }
        if text.contains('\\') {
            return Err(PathViolation::Backslash);
        }
        if let Some(c) = text.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(PathViolation::ForbiddenCharacter(c));
        }

        let (body, is_dir) = match text.strip_suffix('/') {
            Some(body) => (body, true),
            None => (text, false),
        };
        if body.is_empty() {
            return Err(PathViolation::EmptySegment);
        }

        let mut segments = Vec::new();
        for segment in body.split('/') {
            check_segment(segment)?;
            segments.push(segment.to_string());
        }

        Ok(Self {
            raw: text.to_string(),
            segments,
            is_dir,
        })
    }

    /// The path exactly as stored
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Path segments, without the trailing directory slash
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First path segment (the archive's top-level entry)
    pub fn top_level(&self) -> &str {
        // parse() never produces an empty segment list
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    /// Whether the path had a trailing slash
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// True for `<prefix>/` and anything below it
    ///
    /// A bare `<prefix>` only counts when it names a directory; pass
    /// `dir_entry` when the archive header says so even without the slash.
    pub fn is_under(&self, prefix: &str, dir_entry: bool) -> bool {
        if self.top_level() != prefix {
            return false;
        }
        self.segments.len() > 1 || self.is_dir || dir_entry
    }
}

fn check_segment(segment: &str) -> Result<(), PathViolation> {
    if segment.is_empty() {
        return Err(PathViolation::EmptySegment);
    }
    if segment == ".." {
        return Err(PathViolation::ParentTraversal);
    }

    let mut current = segment.to_string();
    for _ in 0..MAX_DECODE_ROUNDS {
        if !current.contains('%') {
            break;
        }
        let decoded = percent_decode(&current);
        if decoded == current {
            break;
        }
        if decoded
            .split(|c| c == '/' || c == '\\')
            .any(|part| part == "..")
        {
            return Err(PathViolation::EncodedTraversal);
        }
        current = decoded;
    }

    Ok(())
}

/// Decode `%XX` escapes; malformed escapes are kept literally
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
