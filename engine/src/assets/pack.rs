// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use alloc::string::String;
use alloc::vec::Vec;

use platform::Platform;

use crate::container::zip::{self, Archive};
use crate::support::AssetPath;

use super::{ByteStream, Provider};

/// Resolves asset names against a [`zip::Archive`], for packs built with
/// compression. Grounded on `KFileLoader`'s `CPacFile` callback, generalized
/// to the engine's own `container::zip` reader rather than the original's
/// bespoke `KPacFileReader`.
///
/// The archive's backing bytes are leaked to `'static` on construction (see
/// [`PackProvider::open`]): asset packs are expected to live for the rest of
/// the program, the same way other long-lived engine allocations are never
/// freed.
pub struct PackProvider {
    archive: Archive<'static>,
    password: Option<String>,
}

impl PackProvider {
    /// Parses `data` as a zip archive, optionally decrypting entries with
    /// `password` where they're encrypted.
    pub fn open(data: Vec<u8>, password: Option<&str>) -> Result<PackProvider, zip::ZipError> {
        let data: &'static [u8] = data.leak();
        let archive = Archive::open(data)?;
        Ok(PackProvider {
            archive,
            password: password.map(String::from),
        })
    }
}

impl Provider for PackProvider {
    fn exists(&self, _platform: &dyn Platform, name: &AssetPath) -> bool {
        self.archive
            .find_entry(name.as_str(), false, false)
            .is_some()
    }

    fn open<'a>(&'a self, _platform: &dyn Platform, name: &AssetPath) -> Option<ByteStream<'a>> {
        let entry = self.archive.find_entry(name.as_str(), false, false)?;
        let bytes = self
            .archive
            .extract(entry, self.password.as_deref())
            .ok()?;
        Some(ByteStream::Owned(bytes))
    }
}

/// Length in bytes of a pac-format entry's name field, XOR-scrambled the same
/// way `KPacFile`'s writer scrambles it. Fixed at 128 for format
/// compatibility, deliberately smaller than [`crate::support::paths::MAX_PATH_LENGTH`].
const PAC_LABEL_LEN: usize = 128;

/// Resolves asset names against the uncompressed "pac" index format
/// (`original_source/core/KPacFile.cpp`), the simpler, store-only precursor
/// to the engine's ZIP-based packs. Used by [`super::AssetLoader`] when a
/// pack was built with `compression = store` (see SPEC_FULL.md §3).
///
/// Unlike the original (which zlib-compresses each entry and scans linearly
/// on every lookup), entries here are always stored raw, and the whole index
/// is scanned once at [`PacIndexProvider::open`] time into an in-memory
/// table, trading a little memory for O(1) lookups later.
pub struct PacIndexProvider {
    data: &'static [u8],
    /// `(name, offset of entry payload, length of entry payload)`.
    index: Vec<(String, usize, usize)>,
}

impl PacIndexProvider {
    /// Parses `data` as a pac-format index, returning `None` if a record's
    /// header is truncated or its name isn't valid UTF-8.
    pub fn open(data: Vec<u8>) -> Option<PacIndexProvider> {
        let data: &'static [u8] = data.leak();
        let mut index = Vec::new();
        let mut cursor = 0usize;

        while cursor < data.len() {
            let record = data.get(cursor..)?;
            let label = record.get(..PAC_LABEL_LEN)?;

            let mut name_bytes = [0u8; PAC_LABEL_LEN];
            for (i, byte) in label.iter().enumerate() {
                name_bytes[i] = byte ^ (i as u8);
            }
            let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(PAC_LABEL_LEN);
            let name = core::str::from_utf8(&name_bytes[..nul]).ok()?.into();

            let header = record.get(PAC_LABEL_LEN..PAC_LABEL_LEN + 16)?;
            let orig_size = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
            let stored_size = u32::from_le_bytes(header[8..12].try_into().unwrap()) as usize;
            debug_assert_eq!(
                orig_size, stored_size,
                "pac entries must be stored uncompressed"
            );

            let payload_offset = cursor + PAC_LABEL_LEN + 16;
            if payload_offset + stored_size > data.len() {
                return None;
            }

            index.push((name, payload_offset, stored_size));
            cursor = payload_offset + stored_size;
        }

        Some(PacIndexProvider { data, index })
    }

    fn find(&self, name: &AssetPath) -> Option<&[u8]> {
        self.index
            .iter()
            .find(|(entry_name, _, _)| entry_name == name.as_str())
            .map(|(_, offset, len)| &self.data[*offset..*offset + len])
    }
}

impl Provider for PacIndexProvider {
    fn exists(&self, _platform: &dyn Platform, name: &AssetPath) -> bool {
        self.find(name).is_some()
    }

    fn open<'a>(&'a self, _platform: &dyn Platform, name: &AssetPath) -> Option<ByteStream<'a>> {
        self.find(name).map(ByteStream::Borrowed)
    }
}

#[cfg(test)]
mod tests {
    use super::{PacIndexProvider, PackProvider};
    use crate::{assets::Provider, container::zip, support::AssetPath, test_platform::TestPlatform};
    use alloc::vec::Vec;

    fn scrambled_label(name: &str) -> [u8; super::PAC_LABEL_LEN] {
        let mut label = [0u8; super::PAC_LABEL_LEN];
        label[..name.len()].copy_from_slice(name.as_bytes());
        for (i, byte) in label.iter_mut().enumerate() {
            *byte ^= i as u8;
        }
        label
    }

    fn build_pac(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        for (name, bytes) in entries {
            data.extend_from_slice(&scrambled_label(name));
            data.extend_from_slice(&0u32.to_le_bytes()); // hash
            data.extend_from_slice(&(bytes.len() as u32).to_le_bytes()); // orig size
            data.extend_from_slice(&(bytes.len() as u32).to_le_bytes()); // stored size
            data.extend_from_slice(&0u32.to_le_bytes()); // flags
            data.extend_from_slice(bytes);
        }
        data
    }

    #[test]
    fn pac_index_resolves_entries() {
        let data = build_pac(&[("a.txt", b"AAA"), ("dir/b.txt", b"BBB")]);
        let provider = PacIndexProvider::open(data).unwrap();
        let platform = TestPlatform::new(false);

        let a = AssetPath::new("a.txt").unwrap();
        let b = AssetPath::new("dir/b.txt").unwrap();
        assert_eq!(b"AAA", &*provider.open(&platform, &a).unwrap());
        assert_eq!(b"BBB", &*provider.open(&platform, &b).unwrap());
        assert!(!provider.exists(&platform, &AssetPath::new("missing").unwrap()));
    }

    #[test]
    fn zip_pack_resolves_entries() {
        let mut writer = zip::Writer::new();
        writer.add_entry("a.txt", b"AAA\n", zip::Timestamps::all(0));
        writer.add_entry("sub/b.txt", b"BBB\n", zip::Timestamps::all(0));
        let bytes = writer.finish();

        let provider = PackProvider::open(bytes, None).unwrap();
        let platform = TestPlatform::new(false);

        let name = AssetPath::new("sub/b.txt").unwrap();
        assert_eq!(b"BBB\n", &*provider.open(&platform, &name).unwrap());
    }
}
