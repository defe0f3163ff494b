//! Bit-level packing of events into 64-bit words.
//!
//! Layout, bit 0 least significant:
//!
//! ```text
//!  63                              33  32  31             16  15              0
//! +----------------------------------+---+-----------------+-----------------+
//! |             t (31 bits)          | p |    y (16 bits)  |    x (16 bits)  |
//! +----------------------------------+---+-----------------+-----------------+
//! ```
//!
//! Each word is stored little-endian, so the same bytes read as two
//! consecutive `u32` values give `word0 = x | (y << 16)` and
//! `word1 = (t << 1) | p`.

use crate::error::CodecError;
use crate::types::{Event, OverflowPolicy};

/// Size of one packed event on disk.
pub const WORD_SIZE: usize = 8;

// ============================================================================
// Field geometry
// ============================================================================

pub const X_SHIFT: u32 = 0;
pub const X_BITS: u32 = 16;
pub const Y_SHIFT: u32 = 16;
pub const Y_BITS: u32 = 16;
pub const POLARITY_SHIFT: u32 = 32;
pub const POLARITY_BITS: u32 = 1;
pub const TIME_SHIFT: u32 = 33;
pub const TIME_BITS: u32 = 31;

pub const X_MASK: u64 = (1 << X_BITS) - 1;
pub const Y_MASK: u64 = (1 << Y_BITS) - 1;
pub const POLARITY_MASK: u64 = (1 << POLARITY_BITS) - 1;
pub const TIME_MASK: u64 = (1 << TIME_BITS) - 1;

/// Largest timestamp representable in a packed word (2^31 - 1 µs).
pub const MAX_TIMESTAMP: u64 = TIME_MASK;

// ============================================================================
// Packing
// ============================================================================

/// Packs already range-checked fields. Each field is masked to its width so
/// an oversized value can never bleed into its neighbour.
#[inline]
pub fn pack_fields(x: u16, y: u16, polarity: u8, timestamp: u64) -> u64 {
    ((x as u64 & X_MASK) << X_SHIFT)
        | ((y as u64 & Y_MASK) << Y_SHIFT)
        | ((polarity as u64 & POLARITY_MASK) << POLARITY_SHIFT)
        | ((timestamp & TIME_MASK) << TIME_SHIFT)
}

/// Returns the first field of `event` that does not fit the packed layout.
#[inline]
pub fn check_event(event: &Event) -> Option<(&'static str, u64)> {
    if event.timestamp > MAX_TIMESTAMP {
        return Some(("t", event.timestamp));
    }
    if event.polarity as u64 > POLARITY_MASK {
        return Some(("p", event.polarity as u64));
    }
    None
}

/// Packs one event according to `policy`.
///
/// `index` is only used for error reporting and diagnostics.
#[inline]
pub fn pack_event(event: &Event, index: usize, policy: OverflowPolicy) -> Result<u64, CodecError> {
    if let Some((field, value)) = check_event(event) {
        match policy {
            OverflowPolicy::Reject => {
                return Err(CodecError::FieldOverflow {
                    field,
                    value,
                    index: Some(index),
                })
            }
            OverflowPolicy::Mask => {
                log::warn!(
                    "event {}: field `{}` value {} masked to {} bits",
                    index,
                    field,
                    value,
                    if field == "t" { TIME_BITS } else { POLARITY_BITS }
                );
            }
        }
    }
    Ok(pack_fields(event.x, event.y, event.polarity, event.timestamp))
}

// ============================================================================
// Unpacking
// ============================================================================

#[inline]
pub fn word_get_x(word: u64) -> u16 {
    ((word >> X_SHIFT) & X_MASK) as u16
}

#[inline]
pub fn word_get_y(word: u64) -> u16 {
    ((word >> Y_SHIFT) & Y_MASK) as u16
}

#[inline]
pub fn word_get_polarity(word: u64) -> u8 {
    ((word >> POLARITY_SHIFT) & POLARITY_MASK) as u8
}

#[inline]
pub fn word_get_time(word: u64) -> u64 {
    (word >> TIME_SHIFT) & TIME_MASK
}

/// Unpacks a word into an event.
#[inline]
pub fn unpack_word(word: u64) -> Event {
    Event::new(
        word_get_x(word),
        word_get_y(word),
        word_get_polarity(word),
        word_get_time(word),
    )
}

// ============================================================================
// Two-u32 view
// ============================================================================

/// Splits a word into the `[word0, word1]` pair seen by a reader that loads
/// the payload as little-endian `u32` values.
#[inline]
pub fn split_word(word: u64) -> [u32; 2] {
    [word as u32, (word >> 32) as u32]
}

/// Inverse of [`split_word`].
#[inline]
pub fn join_words(words: [u32; 2]) -> u64 {
    words[0] as u64 | ((words[1] as u64) << 32)
}

/// Unpacks the `[word0, word1]` pair directly:
/// `x = word0 & 0xFFFF`, `y = word0 >> 16`, `p = word1 & 1`, `t = word1 >> 1`.
#[inline]
pub fn unpack_pair(words: [u32; 2]) -> Event {
    Event::new(
        (words[0] & 0xFFFF) as u16,
        (words[0] >> 16) as u16,
        (words[1] & 0x1) as u8,
        (words[1] >> 1) as u64,
    )
}
