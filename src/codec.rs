//! Conversion between host integers and device byte sequences.
//!
//! Values are 1, 2, 4 or 8 bytes wide and use one of four [`ByteOrder`]s. The two swapped orders
//! model buses that move 32-bit units as two independently ordered 16-bit words in reversed word
//! order: the value is converted with the plain order, then the 16-bit words of every 32-bit unit
//! are exchanged. An 8-byte value `(w0, w1, w2, w3)` therefore goes out as `(w1, w0, w3, w2)`.
//!
//! [`decode`] and [`encode`] treat an unsupported width/order combination as a programming error
//! and panic. Use [`check`] first on anything that comes from outside.

use crate::error::{
    Error,
    Result,
};
use num_derive::FromPrimitive;
use std::{
    fmt::Display,
    str::FromStr,
};

/// The byte order of values on the device side
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ByteOrder {
    Big = 0,
    Little = 1,
    /// Big endian 16-bit words, least significant word first
    BigSwapped = 2,
    /// Little endian 16-bit words, most significant word first
    LittleSwapped = 3,
}

impl ByteOrder {
    /// Whether the underlying per-word order is big endian
    #[must_use]
    pub fn is_big(self) -> bool {
        matches!(self, ByteOrder::Big | ByteOrder::BigSwapped)
    }

    /// Whether 16-bit words are exchanged after the byte order conversion
    #[must_use]
    pub fn is_swapped(self) -> bool {
        matches!(self, ByteOrder::BigSwapped | ByteOrder::LittleSwapped)
    }
}

impl Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ByteOrder::Big => "big endian",
                ByteOrder::Little => "little endian",
                ByteOrder::BigSwapped => "word swapped big endian",
                ByteOrder::LittleSwapped => "word swapped little endian",
            }
        )
    }
}

impl FromStr for ByteOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "be" | "big" => ByteOrder::Big,
            "le" | "little" => ByteOrder::Little,
            "bes" | "big-swapped" => ByteOrder::BigSwapped,
            "les" | "little-swapped" => ByteOrder::LittleSwapped,
            _ => return Err(Error::BadByteOrder(s.to_owned())),
        })
    }
}

/// Whether values `width` bytes wide can be converted with `order`
#[must_use]
pub fn is_supported(width: usize, order: ByteOrder) -> bool {
    match width {
        1 | 4 | 8 => true,
        // A single word has nothing to swap with
        2 => !order.is_swapped(),
        _ => false,
    }
}

/// Check that values `width` bytes wide can be converted with `order`
/// # Errors
/// Returns [`Error::UnsupportedEncoding`] otherwise
pub fn check(width: usize, order: ByteOrder) -> Result<()> {
    if is_supported(width, order) {
        Ok(())
    } else {
        Err(Error::UnsupportedEncoding { width, order })
    }
}

/// Whether `value` survives being encoded into `width` bytes
#[must_use]
pub fn fits(value: u64, width: usize) -> bool {
    width >= 8 || value >> (width * 8) == 0
}

fn assert_supported(width: usize, order: ByteOrder) {
    assert!(
        is_supported(width, order),
        "Unsupported encoding: {width} byte {order} values"
    );
}

fn swap_words(bytes: &mut [u8]) {
    for unit in bytes.chunks_exact_mut(4) {
        unit.rotate_left(2);
    }
}

/// Convert the device bytes in `bytes` to a host integer. The width is `bytes.len()`.
/// # Panics
/// Panics if the width and order combination is unsupported
#[must_use]
pub fn decode(bytes: &[u8], order: ByteOrder) -> u64 {
    let width = bytes.len();
    assert_supported(width, order);
    let mut buf = [0u8; 8];
    let buf = &mut buf[..width];
    buf.copy_from_slice(bytes);
    if order.is_swapped() {
        swap_words(buf);
    }
    if order.is_big() {
        buf.iter().fold(0, |acc, &b| acc << 8 | u64::from(b))
    } else {
        buf.iter().rev().fold(0, |acc, &b| acc << 8 | u64::from(b))
    }
}

/// Convert `value` into device bytes, filling all of `bytes`. The width is `bytes.len()` and only
/// the low `width` bytes of `value` are kept.
/// # Panics
/// Panics if the width and order combination is unsupported
pub fn encode(value: u64, order: ByteOrder, bytes: &mut [u8]) {
    let width = bytes.len();
    assert_supported(width, order);
    let le = value.to_le_bytes();
    if order.is_big() {
        for (dst, src) in bytes.iter_mut().zip(le[..width].iter().rev()) {
            *dst = *src;
        }
    } else {
        bytes.copy_from_slice(&le[..width]);
    }
    if order.is_swapped() {
        swap_words(bytes);
    }
}
