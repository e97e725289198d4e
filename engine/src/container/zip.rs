// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! PKZIP-compatible archive reader and writer.
//!
//! Grounded on `KZipFileReader`/`KZipFileWriter`: Deflate (raw, no zlib
//! wrapper) compression, optional per-entry PKZIP classic-cipher passwords,
//! UTF-8 filenames flagged via general-purpose-flag bit 11, and NTFS 64-bit
//! timestamps carried as an extra field. Needs an allocator-backed working
//! set for the central directory and the inflate/deflate windows, so this
//! module (and the `zip` feature gating it) requires `std`.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::support::crc32;

const LOCAL_FILE_SIG: u32 = 0x0403_4b50;
const CENTRAL_DIR_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const NTFS_EXTRA_SIG: u16 = 0x000A;

const GPBF_ENCRYPTED: u16 = 1 << 0;
const GPBF_DATA_DESCRIPTOR: u16 = 1 << 3;
const GPBF_UTF8: u16 = 1 << 11;

/// Failure mode for [`Archive::open`]/[`Archive::extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ZipError {
    /// A signature didn't match, a size was inconsistent, the stream was
    /// truncated, or a decompressed entry's CRC-32 didn't match the one
    /// recorded in the central directory.
    #[error("corrupt zip archive")]
    Corrupt,
    /// The entry is encrypted and the supplied password's derived check byte
    /// didn't match the entry's recorded CRC-32.
    #[error("wrong password")]
    BadPassword,
}

/// Storage method of a zip entry's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// No compression; the payload is stored verbatim.
    Store,
    /// Raw Deflate (RFC 1951), no zlib wrapper.
    Deflate,
}

/// Unix timestamps (seconds since epoch) for a written entry. `mtime` is
/// always recorded (as local-DOS-time, the only timestamp every zip reader
/// understands); `ctime`/`atime` are additionally recorded as an NTFS extra
/// field when present.
#[derive(Debug, Clone, Copy)]
pub struct Timestamps {
    pub mtime: i64,
    pub ctime: Option<i64>,
    pub atime: Option<i64>,
}

impl Timestamps {
    /// Convenience constructor for callers that only have one clock reading
    /// to hand (e.g. "now"), used for all three fields.
    pub fn all(time: i64) -> Timestamps {
        Timestamps { mtime: time, ctime: Some(time), atime: Some(time) }
    }
}

/// One entry read from a [`Archive`]'s central directory.
#[derive(Debug, Clone)]
pub struct Entry {
    name: String,
    utf8_name: bool,
    crc32: u32,
    uncompressed_size: u32,
    compressed_size: u32,
    method: Method,
    flags: u16,
    mtime_dos_time: u16,
    mtime_dos_date: u16,
    ctime: Option<i64>,
    atime: Option<i64>,
    extras: Vec<(u16, Vec<u8>)>,
    comment: Vec<u8>,
    data_offset: usize,
}

impl Entry {
    /// The entry's name, decoded per its UTF-8/OEM flag (bit 11 of the
    /// general-purpose flags).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if the name/comment are recorded as UTF-8 (general-purpose-flag
    /// bit 11); otherwise they're the host's OEM encoding, approximated here
    /// as Latin-1.
    pub fn is_utf8(&self) -> bool {
        self.utf8_name
    }

    /// True if general-purpose-flag bit 0 (encrypted) is set.
    pub fn is_encrypted(&self) -> bool {
        self.flags & GPBF_ENCRYPTED != 0
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    pub fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Modification time as a raw local-DOS `(date, time)` pair, matching
    /// the data model's `mtime: local-DOS-time`.
    pub fn mtime_dos(&self) -> (u16, u16) {
        (self.mtime_dos_date, self.mtime_dos_time)
    }

    /// Creation time in Unix epoch seconds, if an NTFS extra was present.
    pub fn ctime(&self) -> Option<i64> {
        self.ctime
    }

    /// Last-access time in Unix epoch seconds, if an NTFS extra was present.
    pub fn atime(&self) -> Option<i64> {
        self.atime
    }

    /// Per-entry comment bytes (`getEntryCommentBin` in the source), decoded
    /// under the same UTF-8/OEM flag as the name.
    pub fn comment_bin(&self) -> &[u8] {
        &self.comment
    }

    /// Linear scan of this entry's extra fields by 16-bit signature
    /// (`findEntryExtraBySignature` in the source).
    pub fn find_extra(&self, signature: u16) -> Option<&[u8]> {
        self.extras.iter().find(|(sig, _)| *sig == signature).map(|(_, data)| data.as_slice())
    }
}

fn decode_name(bytes: &[u8], utf8: bool) -> String {
    if utf8 {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        // Approximate the host OEM code page as Latin-1: every byte maps
        // directly to the Unicode code point of the same value.
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn name_matches(entry_name: &str, query: &str, ignore_case: bool, ignore_path: bool) -> bool {
    let a = if ignore_path { file_name_of(entry_name) } else { entry_name };
    let b = if ignore_path { file_name_of(query) } else { query };
    if ignore_case {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

fn file_name_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

// --- DOS date/time <-> Unix epoch seconds -----------------------------------

fn civil_from_days(days_since_epoch: i64) -> (i64, u32, u32) {
    // Howard Hinnant's days_from_civil algorithm, inverted. `days_since_epoch`
    // is days since 1970-01-01.
    let z = days_since_epoch + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // [0, 399]
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32; // [1, 31]
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32; // [1, 12]
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64; // [0, 399]
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) as u64 + 2) / 5 + d as u64 - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]
    era * 146097 + doe as i64 - 719468
}

/// Converts Unix epoch seconds to a local-DOS `(date, time)` pair. Treats the
/// input as already being in the zone the caller wants recorded (this module
/// has no timezone database; callers pass local or UTC seconds as desired).
pub fn unix_to_dos_datetime(unix_secs: i64) -> (u16, u16) {
    let unix_secs = unix_secs.max(315_532_800); // clamp to 1980-01-01, DOS epoch
    let days = unix_secs.div_euclid(86400);
    let secs_of_day = unix_secs.rem_euclid(86400);
    let (year, month, day) = civil_from_days(days);
    let hour = secs_of_day / 3600;
    let minute = (secs_of_day % 3600) / 60;
    let second = secs_of_day % 60;

    let dos_date = (((year - 1980).max(0) as u16) << 9) | ((month as u16) << 5) | (day as u16);
    let dos_time = ((hour as u16) << 11) | ((minute as u16) << 5) | ((second / 2) as u16);
    (dos_date, dos_time)
}

/// Converts a local-DOS `(date, time)` pair to Unix epoch seconds.
pub fn dos_datetime_to_unix(date: u16, time: u16) -> i64 {
    let year = 1980 + (date >> 9) as i64;
    let month = ((date >> 5) & 0xF) as u32;
    let day = (date & 0x1F) as u32;
    let hour = (time >> 11) as i64;
    let minute = ((time >> 5) & 0x3F) as i64;
    let second = (time & 0x1F) as i64 * 2;
    days_from_civil(year, month.max(1), day.max(1)) * 86400 + hour * 3600 + minute * 60 + second
}

const NTFS_EPOCH_OFFSET_SECS: i64 = 11_644_473_600; // 1601-01-01 to 1970-01-01
const NTFS_TICKS_PER_SEC: i64 = 10_000_000; // 100ns intervals

fn unix_to_ntfs_time(unix_secs: i64) -> u64 {
    ((unix_secs + NTFS_EPOCH_OFFSET_SECS) * NTFS_TICKS_PER_SEC) as u64
}

fn ntfs_time_to_unix(ntfs: u64) -> i64 {
    (ntfs as i64) / NTFS_TICKS_PER_SEC - NTFS_EPOCH_OFFSET_SECS
}

// --- PKZIP classic stream cipher --------------------------------------------

struct ZipCrypto {
    key0: u32,
    key1: u32,
    key2: u32,
}

impl ZipCrypto {
    fn new(password: &[u8]) -> ZipCrypto {
        let mut keys = ZipCrypto { key0: 0x1234_5678, key1: 0x2345_6789, key2: 0x3456_7890 };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    fn update(&mut self, plain_byte: u8) {
        self.key0 = crc32::update_byte(self.key0, plain_byte);
        self.key1 = self.key1.wrapping_add(self.key0 & 0xFF);
        self.key1 = self.key1.wrapping_mul(134_775_813).wrapping_add(1);
        self.key2 = crc32::update_byte(self.key2, (self.key1 >> 24) as u8);
    }

    fn keystream_byte(&self) -> u8 {
        let temp = (self.key2 | 2) as u16;
        ((temp as u32 * (temp as u32 ^ 1)) >> 8) as u8
    }

    fn decrypt_byte(&mut self, cipher_byte: u8) -> u8 {
        let plain = cipher_byte ^ self.keystream_byte();
        self.update(plain);
        plain
    }

    fn encrypt_byte(&mut self, plain_byte: u8) -> u8 {
        let cipher = plain_byte ^ self.keystream_byte();
        self.update(plain_byte);
        cipher
    }
}

/// A simple, non-cryptographic PRNG used only to fill the 12-byte PKZIP
/// crypto header's first 11 bytes (the header exists to validate the
/// password quickly, not to provide real secrecy for this format).
struct HeaderRng(u32);

impl HeaderRng {
    fn next_byte(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (self.0 >> 16) as u8
    }
}

// --- Writer ------------------------------------------------------------------

struct WrittenEntry {
    name: Vec<u8>,
    crc32: u32,
    uncompressed_size: u32,
    compressed_size: u32,
    method: Method,
    flags: u16,
    dos_date: u16,
    dos_time: u16,
    ntfs_extra: Option<Vec<u8>>,
    local_header_offset: u32,
    comment: Vec<u8>,
}

/// Builds a zip archive in memory.
pub struct Writer {
    buf: Vec<u8>,
    compress_level: i8,
    password: Vec<u8>,
    comment: Vec<u8>,
    entries: Vec<WrittenEntry>,
    rng: HeaderRng,
}

impl Writer {
    /// Creates an empty archive builder. Default compression level is -1
    /// (zlib's "default"), no password, no comment.
    pub fn new() -> Writer {
        Writer {
            buf: Vec::new(),
            compress_level: -1,
            password: Vec::new(),
            comment: Vec::new(),
            entries: Vec::new(),
            rng: HeaderRng(0x2F6E_2B15),
        }
    }

    /// Sets the Deflate level used by subsequent [`Writer::add_entry`] calls.
    /// `0` stores entries uncompressed; `-1` requests a default level;
    /// `1..=9` request increasing compression at the cost of speed.
    pub fn set_compress_level(&mut self, level: i8) {
        self.compress_level = level;
    }

    /// Sets (or clears, with an empty string) the password applied to
    /// subsequent entries.
    pub fn set_password(&mut self, password: &str) {
        self.password = password.as_bytes().to_vec();
    }

    /// Sets the archive-level comment, written into the end-of-central-
    /// directory record.
    pub fn set_zip_comment(&mut self, comment: &str) {
        self.comment = comment.as_bytes().to_vec();
    }

    fn compress(&self, data: &[u8]) -> (Method, Vec<u8>) {
        if self.compress_level == 0 {
            (Method::Store, data.to_vec())
        } else {
            let level = if self.compress_level < 0 { 6 } else { self.compress_level as u8 };
            (Method::Deflate, miniz_oxide::deflate::compress_to_vec(data, level))
        }
    }

    /// Adds an entry with the writer's current compression level and
    /// password, recording `timestamps` as the entry's modification time
    /// (and, if `ctime`/`atime` are present, an NTFS extra field).
    pub fn add_entry(&mut self, name: &str, data: &[u8], timestamps: Timestamps) {
        let crc = crc32fast::hash(data);
        let (method, mut payload) = self.compress(data);

        let mut flags = GPBF_UTF8;
        if !self.password.is_empty() {
            flags |= GPBF_ENCRYPTED;
            let mut header = [0u8; 12];
            for b in header.iter_mut().take(11) {
                *b = self.rng.next_byte();
            }
            header[11] = (crc >> 24) as u8;

            let mut cipher = ZipCrypto::new(&self.password);
            for b in header.iter_mut() {
                *b = cipher.encrypt_byte(*b);
            }
            for b in payload.iter_mut() {
                *b = cipher.encrypt_byte(*b);
            }
            let mut with_header = Vec::with_capacity(header.len() + payload.len());
            with_header.extend_from_slice(&header);
            with_header.extend_from_slice(&payload);
            payload = with_header;
        }

        let (dos_date, dos_time) = unix_to_dos_datetime(timestamps.mtime);
        let ntfs_extra = if timestamps.ctime.is_some() || timestamps.atime.is_some() {
            let mtime_ntfs = unix_to_ntfs_time(timestamps.mtime);
            let ctime_ntfs = unix_to_ntfs_time(timestamps.ctime.unwrap_or(timestamps.mtime));
            let atime_ntfs = unix_to_ntfs_time(timestamps.atime.unwrap_or(timestamps.mtime));
            let mut extra = vec![0u8; 4]; // reserved
            extra.extend_from_slice(&1u16.to_le_bytes()); // sub-tag 1: file times
            extra.extend_from_slice(&24u16.to_le_bytes()); // sub-tag size
            extra.extend_from_slice(&mtime_ntfs.to_le_bytes());
            extra.extend_from_slice(&atime_ntfs.to_le_bytes());
            extra.extend_from_slice(&ctime_ntfs.to_le_bytes());
            Some(extra)
        } else {
            None
        };

        let local_header_offset = self.buf.len() as u32;
        let name_bytes = name.as_bytes().to_vec();
        let method_id: u16 = match method {
            Method::Store => 0,
            Method::Deflate => 8,
        };
        let extra_len = ntfs_extra.as_ref().map_or(0, |e| e.len()) as u16;

        self.buf.extend_from_slice(&LOCAL_FILE_SIG.to_le_bytes());
        self.buf.extend_from_slice(&20u16.to_le_bytes()); // version needed
        self.buf.extend_from_slice(&flags.to_le_bytes());
        self.buf.extend_from_slice(&method_id.to_le_bytes());
        self.buf.extend_from_slice(&dos_time.to_le_bytes());
        self.buf.extend_from_slice(&dos_date.to_le_bytes());
        self.buf.extend_from_slice(&crc.to_le_bytes());
        self.buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(&extra_len.to_le_bytes());
        self.buf.extend_from_slice(&name_bytes);
        if let Some(extra) = &ntfs_extra {
            self.buf.extend_from_slice(&NTFS_EXTRA_SIG.to_le_bytes());
            self.buf.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            self.buf.extend_from_slice(extra);
        }
        self.buf.extend_from_slice(&payload);

        self.entries.push(WrittenEntry {
            name: name_bytes,
            crc32: crc,
            uncompressed_size: data.len() as u32,
            compressed_size: payload.len() as u32,
            method,
            flags,
            dos_date,
            dos_time,
            ntfs_extra,
            local_header_offset,
            comment: Vec::new(),
        });
    }

    /// Finalizes the archive: writes the central directory and
    /// end-of-central-directory record, and returns the complete file bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let cd_offset = self.buf.len() as u32;

        for entry in &self.entries {
            let method_id: u16 = match entry.method {
                Method::Store => 0,
                Method::Deflate => 8,
            };
            let extra_len = entry.ntfs_extra.as_ref().map_or(0, |e| e.len()) as u16;
            self.buf.extend_from_slice(&CENTRAL_DIR_SIG.to_le_bytes());
            self.buf.extend_from_slice(&0x0314u16.to_le_bytes()); // version made by (unix, 2.0)
            self.buf.extend_from_slice(&20u16.to_le_bytes()); // version needed
            self.buf.extend_from_slice(&entry.flags.to_le_bytes());
            self.buf.extend_from_slice(&method_id.to_le_bytes());
            self.buf.extend_from_slice(&entry.dos_time.to_le_bytes());
            self.buf.extend_from_slice(&entry.dos_date.to_le_bytes());
            self.buf.extend_from_slice(&entry.crc32.to_le_bytes());
            self.buf.extend_from_slice(&entry.compressed_size.to_le_bytes());
            self.buf.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            self.buf.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            self.buf.extend_from_slice(&extra_len.to_le_bytes());
            self.buf.extend_from_slice(&(entry.comment.len() as u16).to_le_bytes());
            self.buf.extend_from_slice(&0u16.to_le_bytes()); // disk number start
            self.buf.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            self.buf.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            self.buf.extend_from_slice(&entry.local_header_offset.to_le_bytes());
            self.buf.extend_from_slice(&entry.name);
            if let Some(extra) = &entry.ntfs_extra {
                self.buf.extend_from_slice(&NTFS_EXTRA_SIG.to_le_bytes());
                self.buf.extend_from_slice(&(extra.len() as u16).to_le_bytes());
                self.buf.extend_from_slice(extra);
            }
            self.buf.extend_from_slice(&entry.comment);
        }

        let cd_size = self.buf.len() as u32 - cd_offset;
        let entry_count = self.entries.len() as u16;

        self.buf.extend_from_slice(&EOCD_SIG.to_le_bytes());
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // disk number
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // disk with central dir
        self.buf.extend_from_slice(&entry_count.to_le_bytes());
        self.buf.extend_from_slice(&entry_count.to_le_bytes());
        self.buf.extend_from_slice(&cd_size.to_le_bytes());
        self.buf.extend_from_slice(&cd_offset.to_le_bytes());
        self.buf.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(&self.comment);

        self.buf
    }
}

impl Default for Writer {
    fn default() -> Writer {
        Writer::new()
    }
}

// --- Reader ------------------------------------------------------------------

/// An opened zip archive: the central directory, parsed and held in memory,
/// borrowing the original file bytes for entry payloads.
pub struct Archive<'a> {
    data: &'a [u8],
    comment: Vec<u8>,
    entries: Vec<Entry>,
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

impl<'a> Archive<'a> {
    /// Parses `data` as a zip archive: locates the end-of-central-directory
    /// record, then reads every central directory entry and its matching
    /// local file header (to find the actual payload offset, since writers
    /// may have used a data descriptor and zeroed the local header's size
    /// fields per the general-purpose-flag bit 3 peculiarity).
    pub fn open(data: &'a [u8]) -> Result<Archive<'a>, ZipError> {
        let eocd_offset = find_eocd(data)?;
        let comment_len = read_u16(data, eocd_offset + 20).ok_or(ZipError::Corrupt)? as usize;
        let comment = data
            .get(eocd_offset + 22..eocd_offset + 22 + comment_len)
            .ok_or(ZipError::Corrupt)?
            .to_vec();

        let entry_count = read_u16(data, eocd_offset + 10).ok_or(ZipError::Corrupt)? as usize;
        let cd_offset = read_u32(data, eocd_offset + 16).ok_or(ZipError::Corrupt)? as usize;

        let mut entries = Vec::with_capacity(entry_count);
        let mut cursor = cd_offset;
        for _ in 0..entry_count {
            let (entry, next) = parse_central_entry(data, cursor)?;
            entries.push(entry);
            cursor = next;
        }

        Ok(Archive { data, comment, entries })
    }

    /// Number of entries in the archive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in central-directory (== original insertion) order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// The archive-level comment from the end-of-central-directory record.
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Finds the first entry whose name matches `name` under the given
    /// comparison rules. Linear scan, as in the source.
    pub fn find_entry(&self, name: &str, ignore_case: bool, ignore_path: bool) -> Option<&Entry> {
        self.entries.iter().find(|e| name_matches(&e.name, name, ignore_case, ignore_path))
    }

    /// Decompresses (and, if encrypted, decrypts) an entry's payload,
    /// verifying both the decompressed length and its CRC-32 against the
    /// values recorded in the central directory.
    pub fn extract(&self, entry: &Entry, password: Option<&str>) -> Result<Vec<u8>, ZipError> {
        let stored = self
            .data
            .get(entry.data_offset..entry.data_offset + entry.compressed_size as usize)
            .ok_or(ZipError::Corrupt)?;

        let compressed = if entry.is_encrypted() {
            let password = password.ok_or(ZipError::BadPassword)?;
            if stored.len() < 12 {
                return Err(ZipError::Corrupt);
            }
            let mut cipher = ZipCrypto::new(password.as_bytes());
            let mut decrypted = stored.to_vec();
            for b in decrypted.iter_mut() {
                *b = cipher.decrypt_byte(*b);
            }
            let header = &decrypted[..12];
            if header[11] != (entry.crc32 >> 24) as u8 {
                return Err(ZipError::BadPassword);
            }
            decrypted[12..].to_vec()
        } else {
            stored.to_vec()
        };

        let decompressed = match entry.method {
            Method::Store => compressed,
            Method::Deflate => {
                miniz_oxide::inflate::decompress_to_vec(&compressed).map_err(|_| ZipError::Corrupt)?
            }
        };

        if decompressed.len() as u32 != entry.uncompressed_size {
            return Err(ZipError::Corrupt);
        }
        if crc32fast::hash(&decompressed) != entry.crc32 {
            return Err(ZipError::Corrupt);
        }
        Ok(decompressed)
    }

    /// Finds and extracts in one call (`getEntryDataByName` in the source).
    pub fn extract_by_name(
        &self,
        name: &str,
        ignore_case: bool,
        ignore_path: bool,
        password: Option<&str>,
    ) -> Result<Vec<u8>, ZipError> {
        let entry = self.find_entry(name, ignore_case, ignore_path).ok_or(ZipError::Corrupt)?;
        self.extract(entry, password)
    }
}

fn find_eocd(data: &[u8]) -> Result<usize, ZipError> {
    if data.len() < 22 {
        return Err(ZipError::Corrupt);
    }
    // The comment can be up to 65535 bytes, so scan back that far (plus the
    // fixed 22-byte record) looking for the signature.
    let search_start = data.len().saturating_sub(22 + 65535);
    let mut i = data.len() - 22;
    loop {
        if read_u32(data, i) == Some(EOCD_SIG) {
            let comment_len = read_u16(data, i + 20).unwrap_or(0) as usize;
            if i + 22 + comment_len == data.len() {
                return Ok(i);
            }
        }
        if i == search_start {
            break;
        }
        i -= 1;
    }
    Err(ZipError::Corrupt)
}

fn parse_extras(data: &[u8]) -> Vec<(u16, Vec<u8>)> {
    let mut extras = Vec::new();
    let mut pos = 0;
    while pos + 4 <= data.len() {
        let sig = u16::from_le_bytes([data[pos], data[pos + 1]]);
        let len = u16::from_le_bytes([data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;
        if pos + len > data.len() {
            break;
        }
        extras.push((sig, data[pos..pos + len].to_vec()));
        pos += len;
    }
    extras
}

fn parse_ntfs_times(extra: &[u8]) -> (Option<i64>, Option<i64>) {
    // Sub-tag 1 ("file times"), laid out as reserved(4) + tag(2) + size(2) +
    // mtime(8) + atime(8) + ctime(8), all little-endian.
    if extra.len() < 4 {
        return (None, None);
    }
    let mut pos = 4;
    while pos + 4 <= extra.len() {
        let tag = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let size = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        pos += 4;
        if tag == 1 && size >= 24 && pos + 24 <= extra.len() {
            let mtime = u64::from_le_bytes(extra[pos..pos + 8].try_into().unwrap());
            let atime = u64::from_le_bytes(extra[pos + 8..pos + 16].try_into().unwrap());
            let ctime = u64::from_le_bytes(extra[pos + 16..pos + 24].try_into().unwrap());
            let _ = mtime;
            return (Some(ntfs_time_to_unix(ctime)), Some(ntfs_time_to_unix(atime)));
        }
        pos += size;
    }
    (None, None)
}

fn parse_central_entry(data: &[u8], offset: usize) -> Result<(Entry, usize), ZipError> {
    if read_u32(data, offset) != Some(CENTRAL_DIR_SIG) {
        return Err(ZipError::Corrupt);
    }
    let flags = read_u16(data, offset + 8).ok_or(ZipError::Corrupt)?;
    let method_id = read_u16(data, offset + 10).ok_or(ZipError::Corrupt)?;
    let mtime_dos_time = read_u16(data, offset + 12).ok_or(ZipError::Corrupt)?;
    let mtime_dos_date = read_u16(data, offset + 14).ok_or(ZipError::Corrupt)?;
    let crc = read_u32(data, offset + 16).ok_or(ZipError::Corrupt)?;
    let compressed_size = read_u32(data, offset + 20).ok_or(ZipError::Corrupt)?;
    let uncompressed_size = read_u32(data, offset + 24).ok_or(ZipError::Corrupt)?;
    let name_len = read_u16(data, offset + 28).ok_or(ZipError::Corrupt)? as usize;
    let extra_len = read_u16(data, offset + 30).ok_or(ZipError::Corrupt)? as usize;
    let comment_len = read_u16(data, offset + 32).ok_or(ZipError::Corrupt)? as usize;
    let local_header_offset = read_u32(data, offset + 42).ok_or(ZipError::Corrupt)? as usize;

    let name_start = offset + 46;
    let extra_start = name_start + name_len;
    let comment_start = extra_start + extra_len;
    let next_entry = comment_start + comment_len;
    if next_entry > data.len() {
        return Err(ZipError::Corrupt);
    }

    let utf8_name = flags & GPBF_UTF8 != 0;
    let name = decode_name(&data[name_start..extra_start], utf8_name);
    let extras = parse_extras(&data[extra_start..comment_start]);
    let comment = data[comment_start..next_entry].to_vec();
    let (ctime, atime) = extras
        .iter()
        .find(|(sig, _)| *sig == NTFS_EXTRA_SIG)
        .map(|(_, bytes)| parse_ntfs_times(bytes))
        .unwrap_or((None, None));

    let method = match method_id {
        0 => Method::Store,
        8 => Method::Deflate,
        _ => return Err(ZipError::Corrupt),
    };

    let data_offset = local_data_offset(data, local_header_offset)?;

    Ok((
        Entry {
            name,
            utf8_name,
            crc32: crc,
            uncompressed_size,
            compressed_size,
            method,
            flags,
            mtime_dos_time,
            mtime_dos_date,
            ctime,
            atime,
            extras,
            comment,
            data_offset,
        },
        next_entry,
    ))
}

// Follows a central directory entry's relative offset to its local file
// header and returns where the entry's payload actually starts. Trusts only
// the local header's name/extra lengths (needed to know how far to skip) —
// not its size fields, since a data-descriptor writer (general-purpose-flag
// bit 3) may have zeroed those.
fn local_data_offset(data: &[u8], local_header_offset: usize) -> Result<usize, ZipError> {
    if read_u32(data, local_header_offset) != Some(LOCAL_FILE_SIG) {
        return Err(ZipError::Corrupt);
    }
    let name_len = read_u16(data, local_header_offset + 26).ok_or(ZipError::Corrupt)? as usize;
    let extra_len = read_u16(data, local_header_offset + 28).ok_or(ZipError::Corrupt)? as usize;
    let data_offset = local_header_offset + 30 + name_len + extra_len;
    if data_offset > data.len() {
        return Err(ZipError::Corrupt);
    }
    Ok(data_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_round_trip_with_comment_and_subdirs() {
        let mut w = Writer::new();
        w.set_zip_comment("COMMENT");
        w.add_entry("a.txt", b"AAA\n", Timestamps::all(1_700_000_000));
        w.add_entry("b.txt", b"BBB\n", Timestamps::all(1_700_000_000));
        w.add_entry("c.txt", b"CCC\n", Timestamps::all(1_700_000_000));
        w.add_entry("sub/d.txt", b"DDD\n", Timestamps::all(1_700_000_000));
        let bytes = w.finish();

        let archive = Archive::open(&bytes).unwrap();
        assert_eq!(b"COMMENT", archive.comment());
        assert_eq!(4, archive.len());

        let d = archive.find_entry("sub/d.txt", false, false).unwrap();
        assert_eq!(b"DDD\n".to_vec(), archive.extract(d, None).unwrap());

        let d_by_name = archive.find_entry("d.txt", false, true).unwrap();
        assert_eq!(b"DDD\n".to_vec(), archive.extract(d_by_name, None).unwrap());
    }

    #[test]
    fn per_entry_passwords_round_trip_and_reject_wrong_password() {
        let mut w = Writer::new();
        w.set_password("passa");
        w.add_entry("a.txt", b"secret a", Timestamps::all(0));
        w.set_password("passb");
        w.add_entry("b.txt", b"secret b", Timestamps::all(0));
        w.set_password("passc");
        w.add_entry("c.txt", b"secret c", Timestamps::all(0));
        let bytes = w.finish();

        let archive = Archive::open(&bytes).unwrap();
        let a = archive.find_entry("a.txt", false, false).unwrap();
        assert_eq!(ZipError::BadPassword, archive.extract(a, Some("wrong")).unwrap_err());
        assert_eq!(b"secret a".to_vec(), archive.extract(a, Some("passa")).unwrap());

        let b = archive.find_entry("b.txt", false, false).unwrap();
        assert_eq!(b"secret b".to_vec(), archive.extract(b, Some("passb")).unwrap());

        let c = archive.find_entry("c.txt", false, false).unwrap();
        assert_eq!(b"secret c".to_vec(), archive.extract(c, Some("passc")).unwrap());
    }

    #[test]
    fn store_level_zero_round_trips() {
        let mut w = Writer::new();
        w.set_compress_level(0);
        w.add_entry("raw.bin", b"not compressed", Timestamps::all(0));
        let bytes = w.finish();
        let archive = Archive::open(&bytes).unwrap();
        let entry = archive.find_entry("raw.bin", false, false).unwrap();
        assert_eq!(Method::Store, entry.method());
        assert_eq!(b"not compressed".to_vec(), archive.extract(entry, None).unwrap());
    }

    #[test]
    fn ntfs_timestamps_round_trip() {
        let mut w = Writer::new();
        w.add_entry(
            "f.txt",
            b"hi",
            Timestamps { mtime: 1_700_000_000, ctime: Some(1_699_000_000), atime: Some(1_701_000_000) },
        );
        let bytes = w.finish();
        let archive = Archive::open(&bytes).unwrap();
        let entry = archive.find_entry("f.txt", false, false).unwrap();
        assert_eq!(Some(1_699_000_000), entry.ctime());
        assert_eq!(Some(1_701_000_000), entry.atime());
    }

    #[test]
    fn truncated_archive_is_corrupt() {
        let mut w = Writer::new();
        w.add_entry("x", b"y", Timestamps::all(0));
        let mut bytes = w.finish();
        bytes.truncate(bytes.len() - 4);
        assert_eq!(Err(ZipError::Corrupt), Archive::open(&bytes).map(|_| ()));
    }

    #[test]
    fn dos_time_round_trips_to_the_minute() {
        let (date, time) = unix_to_dos_datetime(1_700_000_000);
        let back = dos_datetime_to_unix(date, time);
        assert!((back - 1_700_000_000).abs() <= 2, "DOS time has 2-second resolution");
    }
}
