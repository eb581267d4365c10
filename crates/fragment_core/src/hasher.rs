//! Canonical content hashing for fragments.
//!
//! The digest is BLAKE3 over this field sequence:
//!
//! 1. kind name
//! 2. description
//! 3. short description, present only in a snapshot's digest
//! 4. one is-text byte (`1` or `0`)
//! 5. syntax style
//! 6. text bytes, or image bytes
//! 7. originating variant tag, present only in a snapshot's digest
//! 8. referenced files, sorted by absolute path, joined with `,`
//! 9. metadata pairs, sorted by key, rendered `key=value`, joined with `,`
//!
//! A present string is written followed by `0x00`; an absent string is
//! written as the single byte `0xFF`, which never occurs in UTF-8, so
//! absent and empty hash differently.
//!
//! A live content-fixed fragment and its snapshot therefore never share an
//! id, even when every other field agrees.

use crate::fragment::FragmentKind;
use crate::ids::ContentHash;
use std::path::Path;

const DELIMITER: u8 = 0x00;
const ABSENT: u8 = 0xFF;

/// Borrowed payload of a fragment for hashing.
#[derive(Debug, Clone, Copy)]
pub enum PayloadRef<'a> {
    Text(Option<&'a str>),
    Image(&'a [u8]),
}

impl PayloadRef<'_> {
    fn is_text(&self) -> bool {
        matches!(self, PayloadRef::Text(_))
    }
}

/// The scalar content-defining fields of a fragment.
#[derive(Debug, Clone, Copy)]
pub struct HashFields<'a> {
    pub kind: FragmentKind,
    pub description: Option<&'a str>,
    /// Recorded by snapshots only; live ids leave it absent.
    pub short_description: Option<&'a str>,
    pub syntax_style: Option<&'a str>,
    pub payload: PayloadRef<'a>,
}

impl<'a> HashFields<'a> {
    /// Fields of a text fragment.
    pub fn text(kind: FragmentKind, description: &'a str, text: &'a str, syntax_style: &'a str) -> Self {
        Self {
            kind,
            description: Some(description),
            short_description: None,
            syntax_style: Some(syntax_style),
            payload: PayloadRef::Text(Some(text)),
        }
    }

    /// The id of a content-fixed live fragment: no originating variant, no
    /// referenced files and no metadata.
    pub fn content_id(&self) -> ContentHash {
        self.fold(None, Vec::new(), Vec::new())
    }

    /// Snapshot digest. `files` and `meta` may arrive in any order.
    pub fn digest<F, P, M, K, V>(&self, files: F, meta: M) -> ContentHash
    where
        F: IntoIterator<Item = P>,
        P: AsRef<Path>,
        M: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut paths: Vec<String> = files
            .into_iter()
            .map(|p| p.as_ref().to_string_lossy().into_owned())
            .collect();
        paths.sort();

        let mut pairs: Vec<(String, String)> = meta
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        pairs.sort();

        self.fold(Some(self.kind.variant_tag()), paths, pairs)
    }

    fn fold(&self, origin: Option<&str>, paths: Vec<String>, pairs: Vec<(String, String)>) -> ContentHash {
        let mut hasher = ContentHasher::new();
        hasher.string(Some(self.kind.as_str()));
        hasher.string(self.description);
        hasher.string(self.short_description);
        hasher.flag(self.payload.is_text());
        hasher.string(self.syntax_style);
        match self.payload {
            PayloadRef::Text(text) => hasher.string(text),
            PayloadRef::Image(bytes) => hasher.bytes(bytes),
        }
        hasher.string(origin);
        hasher.string(Some(&paths.join(",")));
        let rendered: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        hasher.string(Some(&rendered.join(",")));
        hasher.finish()
    }
}

/// Incremental writer of delimited fields into a BLAKE3 hasher.
pub struct ContentHasher {
    inner: blake3::Hasher,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Writes a possibly absent string field.
    pub fn string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.inner.update(s.as_bytes());
                self.inner.update(&[DELIMITER]);
            }
            None => {
                self.inner.update(&[ABSENT]);
            }
        }
    }

    /// Writes a raw byte field.
    pub fn bytes(&mut self, value: &[u8]) {
        self.inner.update(value);
        self.inner.update(&[DELIMITER]);
    }

    /// Writes a one-byte flag.
    pub fn flag(&mut self, value: bool) {
        self.inner.update(&[u8::from(value)]);
    }

    pub fn finish(self) -> ContentHash {
        ContentHash::from_bytes(*self.inner.finalize().as_bytes())
    }
}
