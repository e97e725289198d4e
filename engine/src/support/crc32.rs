// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! CRC-32/ISO-3309 ("crc32b"), the checksum used throughout `container::zip`.
//!
//! Grounded on `KCrc32`: a table-based implementation, with the table built at
//! compile time so this module has no initialization step. Separate from the
//! `crc32fast` crate used behind the `zip` feature, since this module needs to
//! be usable without pulling in `std`/`zip`'s allocator requirements.

const POLY: u32 = 0xEDB88320;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLY ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

/// The initial value to pass as `prev_crc` to [`update`] for a fresh checksum,
/// matching `KCrc32::INIT`.
pub const INIT: u32 = u32::MAX;

/// Feeds one byte into a running CRC-32/ISO-3309 checksum.
pub fn update_byte(prev_crc: u32, value: u8) -> u32 {
    TABLE[((prev_crc ^ value as u32) & 0xFF) as usize] ^ (prev_crc >> 8)
}

/// Computes the CRC-32/ISO-3309 checksum of `data`, continuing from
/// `prev_crc` (pass [`INIT`] to start a new checksum).
///
/// The returned value is the final checksum (already XORed with `0xFFFFFFFF`);
/// to keep accumulating across multiple calls, pass the *previous* return
/// value (not [`INIT`]) back in as `prev_crc`, but note this function
/// internally un-XORs and re-XORs for that, matching `KCrc32::compute`'s
/// `prev_crc` parameter semantics of always taking/returning a "plain" CRC
/// (i.e. `compute(data, compute(prefix))` producing the checksum of `prefix +
/// data` requires passing the raw, non-finalized running value -- see
/// [`Hasher`] for an accumulator that gets this right without the caller
/// needing to think about it).
pub fn compute(data: &[u8], prev_crc: u32) -> u32 {
    let mut crc = !prev_crc;
    for &b in data {
        crc = update_byte(crc, b);
    }
    !crc
}

/// Incremental CRC-32/ISO-3309 accumulator, for checksumming data that arrives
/// in more than one piece (e.g. streamed decompression output).
#[derive(Debug, Clone, Copy)]
pub struct Hasher(u32);

impl Hasher {
    /// Creates a new, empty accumulator.
    pub fn new() -> Hasher {
        Hasher(INIT)
    }

    /// Feeds more data into the checksum.
    pub fn write(&mut self, data: &[u8]) {
        for &b in data {
            self.0 = update_byte(self.0, b);
        }
    }

    /// Returns the checksum of all the data written so far.
    pub fn finish(&self) -> u32 {
        !self.0
    }
}

impl Default for Hasher {
    fn default() -> Hasher {
        Hasher::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{compute, Hasher, INIT};

    #[test]
    fn known_vector() {
        // "123456789" is the standard CRC-32/ISO-3309 test vector.
        assert_eq!(0xCBF43926, compute(b"123456789", INIT));
    }

    #[test]
    fn empty_input() {
        assert_eq!(0, compute(b"", INIT));
    }

    #[test]
    fn hasher_matches_one_shot() {
        let mut hasher = Hasher::new();
        hasher.write(b"123456789");
        assert_eq!(compute(b"123456789", INIT), hasher.finish());
    }

    #[test]
    fn hasher_split_writes_match_one_shot() {
        let mut hasher = Hasher::new();
        hasher.write(b"1234");
        hasher.write(b"56789");
        assert_eq!(compute(b"123456789", INIT), hasher.finish());
    }
}
