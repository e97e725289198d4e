// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use platform::Platform;

use crate::support::AssetPath;

use super::{ByteStream, Provider};

/// Resolves asset names against a fixed, compiled-in table of name/bytes
/// pairs, e.g. `include_bytes!` output baked into the binary.
///
/// Grounded on `KFileLoader`'s `CResourceFiles`/`KEmbeddedFiles` callback,
/// minus the codegen: this engine takes the table as-is rather than
/// generating it from a build step.
pub struct EmbeddedProvider {
    files: &'static [(&'static str, &'static [u8])],
}

impl EmbeddedProvider {
    /// Creates a provider backed by `files`, a `(name, bytes)` table.
    pub const fn new(files: &'static [(&'static str, &'static [u8])]) -> EmbeddedProvider {
        EmbeddedProvider { files }
    }

    fn find(&self, name: &AssetPath) -> Option<&'static [u8]> {
        self.files
            .iter()
            .find(|(file_name, _)| *file_name == name.as_str())
            .map(|(_, bytes)| *bytes)
    }
}

impl Provider for EmbeddedProvider {
    fn exists(&self, _platform: &dyn Platform, name: &AssetPath) -> bool {
        self.find(name).is_some()
    }

    fn open<'a>(&'a self, _platform: &dyn Platform, name: &AssetPath) -> Option<ByteStream<'a>> {
        self.find(name).map(ByteStream::Borrowed)
    }
}

#[cfg(test)]
mod tests {
    use super::EmbeddedProvider;
    use crate::{assets::Provider, support::AssetPath, test_platform::TestPlatform};

    const FILES: &[(&str, &[u8])] = &[("icon.png", b"ICON"), ("readme.txt", b"README")];

    #[test]
    fn resolves_from_table() {
        let platform = TestPlatform::new(false);
        let provider = EmbeddedProvider::new(FILES);

        let name = AssetPath::new("readme.txt").unwrap();
        assert!(provider.exists(&platform, &name));
        assert_eq!(b"README", &*provider.open(&platform, &name).unwrap());
    }

    #[test]
    fn unlisted_name_does_not_resolve() {
        let platform = TestPlatform::new(false);
        let provider = EmbeddedProvider::new(FILES);
        let name = AssetPath::new("nope.bin").unwrap();
        assert!(!provider.exists(&platform, &name));
        assert!(provider.open(&platform, &name).is_none());
    }
}
