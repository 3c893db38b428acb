//! Bounded, NUL-terminated text fields.
//!
//! `BoundedText<N>` owns exactly `N` bytes. At most `N - 1` bytes of text are
//! stored; the rest is zero padding, so a well-formed field always carries its
//! terminator inside the bound. Writes truncate on a UTF-8 character boundary.
//! Reads stop at the first NUL or at the bound, whichever comes first, so a
//! field received from a peer is never read past its end.

use crate::consts::MAX_SENDER_BYTES;
use std::borrow::Cow;
use std::fmt;

/// Fixed-capacity text stored as a zero-padded byte array.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct BoundedText<const N: usize>([u8; N]);

/// A participant's display name, bounded to what the `sender` field can carry.
pub type DisplayName = heapless::String<MAX_SENDER_BYTES>;

impl<const N: usize> BoundedText<N> {
    /// Largest number of text bytes the field accepts.
    pub const MAX_LEN: usize = N - 1;

    /// Empty (all-zero) field.
    pub const fn new() -> Self {
        Self([0; N])
    }

    /// Build a field from `text`, truncating to [`Self::MAX_LEN`] bytes.
    pub fn from_str_truncated(text: &str) -> Self {
        let mut field = Self::new();
        field.set(text);
        field
    }

    /// Wrap raw bytes as received from a transport. No validation is done;
    /// use [`is_terminated`](Self::is_terminated) to check the terminator.
    pub const fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Replace the content with `text`, truncated to fit.
    ///
    /// Returns `true` when the whole of `text` was stored.
    pub fn set(&mut self, text: &str) -> bool {
        let kept = truncate_to_boundary(text, Self::MAX_LEN);
        self.0 = [0; N];
        self.0[..kept.len()].copy_from_slice(kept.as_bytes());
        kept.len() == text.len()
    }

    /// Raw field bytes, padding included.
    pub const fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Text bytes up to the first NUL (or the whole field if there is none).
    pub fn text_bytes(&self) -> &[u8] {
        &self.0[..self.len()]
    }

    /// Text content. Invalid UTF-8 from a peer is replaced, never trusted.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.text_bytes())
    }

    /// Number of text bytes before the terminator.
    pub fn len(&self) -> usize {
        self.0.iter().position(|&b| b == 0).unwrap_or(N)
    }

    /// `true` when the first byte is the terminator.
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    /// `true` when a terminator exists within the bound.
    pub fn is_terminated(&self) -> bool {
        self.0.contains(&0)
    }

    /// Zero the whole field.
    pub fn clear(&mut self) {
        self.0 = [0; N];
    }
}

impl<const N: usize> Default for BoundedText<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl<const N: usize> From<&str> for BoundedText<N> {
    fn from(text: &str) -> Self {
        Self::from_str_truncated(text)
    }
}

/// Longest prefix of `text` that is at most `max` bytes and ends on a char boundary.
pub fn truncate_to_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Build a [`DisplayName`], truncating on a char boundary.
pub fn display_name(name: &str) -> DisplayName {
    let mut out = DisplayName::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
