//! Fragment identity: dynamic ids, content hashes and the id allocator.
//!
//! Every fragment id is one of two disjoint shapes:
//!
//! - a **dynamic id**, a decimal number of at most 20 digits handed out by
//!   the [`IdAllocator`] when a live fragment is constructed;
//! - a **content hash**, exactly 64 lowercase hex characters derived from
//!   the fragment's content-defining fields.
//!
//! The lengths never overlap, so a string parses into at most one shape.

use crate::error::{FragmentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// A 32-byte BLAKE3 digest identifying content-fixed fragments.
///
/// # Examples
///
/// ```
/// use fragment_core::ContentHash;
///
/// let hash = ContentHash::from_bytes([0xab; 32]);
/// assert_eq!(hash.as_hex().len(), 64);
/// assert_eq!(ContentHash::from_hex(&hash.as_hex()).unwrap(), hash);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// The length of a ContentHash in bytes.
    pub const LEN: usize = 32;

    /// The length of a ContentHash as a hex string.
    pub const HEX_LEN: usize = 64;

    /// Creates a ContentHash from raw bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns a reference to the underlying digest.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns this hash as a lowercase hex string of exactly 64 characters.
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hash from its hex form.
    ///
    /// Only lowercase hex is accepted; the id space is canonical so that two
    /// spellings of the same hash can never be cached as different fragments.
    ///
    /// # Errors
    ///
    /// Returns `FragmentError::ExpectedContentHash` if the string is not
    /// exactly 64 lowercase hex characters.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != Self::HEX_LEN || !is_lower_hex(s) {
            return Err(FragmentError::ExpectedContentHash(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|_| FragmentError::ExpectedContentHash(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| FragmentError::ExpectedContentHash(s.to_string()))?;
        Ok(Self(arr))
    }
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}...)", &self.as_hex()[..12])
    }
}

/// Identifier of a fragment.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FragmentId {
    /// Allocated from the [`IdAllocator`]; identifies a live, mutable fragment.
    Dynamic(u64),
    /// Derived from content; equal content yields equal ids.
    Content(ContentHash),
}

impl FragmentId {
    /// Longest decimal rendering of a u64.
    const MAX_DYNAMIC_DIGITS: usize = 20;

    pub fn is_dynamic(&self) -> bool {
        matches!(self, FragmentId::Dynamic(_))
    }

    /// Returns the content hash, if this id is one.
    pub fn content_hash(&self) -> Option<ContentHash> {
        match self {
            FragmentId::Content(hash) => Some(*hash),
            FragmentId::Dynamic(_) => None,
        }
    }

    /// Parses an id that must be dynamic and below
    /// [`IdAllocator::CLAIM_LIMIT`].
    pub fn parse_dynamic(s: &str) -> Result<Self> {
        match s.parse::<FragmentId>() {
            Ok(FragmentId::Dynamic(n)) if n < IdAllocator::CLAIM_LIMIT => Ok(FragmentId::Dynamic(n)),
            _ => Err(FragmentError::ExpectedDynamicId(s.to_string())),
        }
    }

    /// Parses an id that must be a content hash.
    pub fn parse_content(s: &str) -> Result<Self> {
        ContentHash::from_hex(s).map(FragmentId::Content)
    }
}

impl FromStr for FragmentId {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() == ContentHash::HEX_LEN {
            return ContentHash::from_hex(s)
                .map(FragmentId::Content)
                .map_err(|_| FragmentError::InvalidFragmentId(s.to_string()));
        }
        if s.is_empty()
            || s.len() > Self::MAX_DYNAMIC_DIGITS
            || !s.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(FragmentError::InvalidFragmentId(s.to_string()));
        }
        s.parse::<u64>()
            .map(FragmentId::Dynamic)
            .map_err(|_| FragmentError::InvalidFragmentId(s.to_string()))
    }
}

impl TryFrom<String> for FragmentId {
    type Error = FragmentError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FragmentId> for String {
    fn from(id: FragmentId) -> Self {
        id.to_string()
    }
}

impl From<ContentHash> for FragmentId {
    fn from(hash: ContentHash) -> Self {
        FragmentId::Content(hash)
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentId::Dynamic(n) => write!(f, "{}", n),
            FragmentId::Content(hash) => write!(f, "{}", hash),
        }
    }
}

impl fmt::Debug for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentId::Dynamic(n) => write!(f, "FragmentId({})", n),
            FragmentId::Content(hash) => write!(f, "FragmentId({}...)", &hash.as_hex()[..12]),
        }
    }
}

/// Monotonic source of dynamic fragment ids.
///
/// One allocator is shared by every fragment of a session. Ids start at 1.
///
/// The watermark never moves past [`IdAllocator::CLAIM_LIMIT`], which
/// leaves 2^63 fresh ids after any load, so allocation cannot wrap.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// Dynamic ids read from persisted state must be below this value.
    pub const CLAIM_LIMIT: u64 = 1 << 63;

    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns a fresh id, strictly greater than every id handed out or
    /// observed before.
    pub fn next_dynamic_id(&self) -> FragmentId {
        FragmentId::Dynamic(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// The value the next call to [`next_dynamic_id`](Self::next_dynamic_id) will return.
    pub fn current_watermark(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Ensures future ids are at least `n + 1`, with `n` capped at
    /// `CLAIM_LIMIT - 1`.
    pub fn advance_watermark_to(&self, n: u64) {
        let floor = n.min(Self::CLAIM_LIMIT - 1) + 1;
        self.next.fetch_max(floor, Ordering::SeqCst);
    }

    /// Advances the watermark past an id seen in persisted state.
    ///
    /// Content-hash ids, out-of-range numbers and anything else that is not
    /// a claimable dynamic id are ignored.
    pub fn observe(&self, id: &str) {
        if let Ok(FragmentId::Dynamic(n)) = FragmentId::parse_dynamic(id) {
            self.advance_watermark_to(n);
        }
    }

    /// Rewinds the allocator to its initial state. Only meaningful between
    /// sessions, when no fragment of the previous session is still in use.
    pub fn reset(&self) {
        self.next.store(1, Ordering::SeqCst);
    }
}
