// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Ordered chain of named byte-blob providers.
//!
//! Grounded on `KFileLoader`: a list of [`Provider`]s is tried in insertion
//! order, and the first one that resolves a name wins. If no provider is
//! registered, [`AssetLoader::open`] falls back to reading straight off the
//! [`Platform`]'s filesystem, matching `KFileLoader::getInputFile`'s
//! "archives_ is empty" fallback.

mod directory;
mod embedded;
#[cfg(feature = "zip")]
mod pack;

pub use directory::DirectoryProvider;
pub use embedded::EmbeddedProvider;
#[cfg(feature = "zip")]
pub use pack::{PacIndexProvider, PackProvider};

use core::ops::Deref;

use alloc::vec::Vec;
use platform::{Box as PBox, Platform};

use crate::support::AssetPath;

/// A byte blob resolved by an [`AssetLoader`], either borrowed from whatever
/// is backing the provider that resolved it, or an owned platform allocation
/// for data that had to be read or decompressed on the spot.
pub enum ByteStream<'a> {
    /// Data borrowed directly from the provider (e.g. an embedded resource,
    /// or a slice into an already-open archive).
    Borrowed(&'a [u8]),
    /// Data read into a platform-allocated, 'static-lived buffer (e.g. a
    /// whole file read off disk).
    Boxed(PBox<[u8]>),
    /// Data produced by decompression or re-encoding, owned on the heap.
    #[cfg(feature = "std")]
    Owned(Vec<u8>),
}

impl Deref for ByteStream<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ByteStream::Borrowed(bytes) => bytes,
            ByteStream::Boxed(bytes) => bytes,
            #[cfg(feature = "std")]
            ByteStream::Owned(bytes) => bytes,
        }
    }
}

/// A named source of byte blobs, tried in order by [`AssetLoader`].
///
/// Grounded on `KFileLoaderCallback`: two operations, existence and open,
/// both keyed by an [`AssetPath`].
pub trait Provider {
    /// Returns true if `name` resolves to a readable blob through this
    /// provider.
    fn exists(&self, platform: &dyn Platform, name: &AssetPath) -> bool;

    /// Opens `name`, or returns `None` if this provider doesn't have it.
    fn open<'a>(&'a self, platform: &dyn Platform, name: &AssetPath) -> Option<ByteStream<'a>>;
}

/// Ordered chain of [`Provider`]s. See spec component 4.A (`AssetLoader`).
///
/// Lookup is a linear scan in insertion order, stopping at the first
/// provider that resolves the name. Providers are held by reference: they're
/// expected to be owned by whatever assembles the engine (directories, packs,
/// embedded tables), outliving the loader itself.
pub struct AssetLoader<'p> {
    providers: Vec<&'p dyn Provider>,
}

impl<'p> AssetLoader<'p> {
    /// Creates an empty asset loader. With no providers registered,
    /// [`AssetLoader::open`]/[`AssetLoader::exists`] fall back to reading
    /// straight off the platform's filesystem.
    pub fn new() -> AssetLoader<'p> {
        AssetLoader {
            providers: Vec::new(),
        }
    }

    /// Appends a provider to the end of the search chain.
    pub fn add_provider(&mut self, provider: &'p dyn Provider) {
        self.providers.push(provider);
    }

    /// Returns true if `name` resolves through any registered provider (or,
    /// with none registered, through the host filesystem).
    pub fn exists(&self, platform: &dyn Platform, name: &AssetPath) -> bool {
        if self.providers.is_empty() {
            return platform.open_file(name.as_str()).is_some();
        }
        self.providers.iter().any(|p| p.exists(platform, name))
    }

    /// Opens `name` against the first provider (in insertion order) that has
    /// it, or reads it straight from the host filesystem if no providers are
    /// registered. Returns `None` if nothing resolves it (a "not found",
    /// never an error).
    pub fn open<'a>(&'a self, platform: &'a dyn Platform, name: &AssetPath) -> Option<ByteStream<'a>>
    where
        'p: 'a,
    {
        for provider in &self.providers {
            if let Some(stream) = provider.open(platform, name) {
                return Some(stream);
            }
        }
        if self.providers.is_empty() {
            return directory::read_whole_file(platform, name.as_str());
        }
        None
    }

    /// Reads `name` in full. Equivalent to [`AssetLoader::open`] plus
    /// collecting the resulting stream into an owned buffer.
    pub fn load_all(&self, platform: &dyn Platform, name: &AssetPath) -> Option<Vec<u8>> {
        self.open(platform, name).map(|stream| stream.to_vec())
    }
}

impl Default for AssetLoader<'_> {
    fn default() -> Self {
        AssetLoader::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{AssetLoader, DirectoryProvider, EmbeddedProvider};
    use crate::{support::AssetPath, test_platform::TestPlatform};

    #[test]
    fn falls_back_to_filesystem_with_no_providers() {
        let platform = TestPlatform::new(false);
        platform.set_file("save.json", b"{}".to_vec());

        let loader = AssetLoader::new();
        let name = AssetPath::new("save.json").unwrap();
        assert!(loader.exists(&platform, &name));
        assert_eq!(b"{}", &*loader.open(&platform, &name).unwrap());
    }

    #[test]
    fn missing_asset_resolves_to_none() {
        let platform = TestPlatform::new(false);
        let loader = AssetLoader::new();
        let name = AssetPath::new("nope.json").unwrap();
        assert!(!loader.exists(&platform, &name));
        assert!(loader.open(&platform, &name).is_none());
    }

    #[test]
    fn providers_are_tried_in_order() {
        let platform = TestPlatform::new(false);
        platform.set_file("assets/sprite.png", b"from disk".to_vec());

        let embedded = EmbeddedProvider::new(&[("sprite.png", b"from memory")]);
        let directory = DirectoryProvider::new(AssetPath::new("assets").unwrap());

        let mut loader = AssetLoader::new();
        loader.add_provider(&embedded);
        loader.add_provider(&directory);

        let name = AssetPath::new("sprite.png").unwrap();
        assert_eq!(b"from memory", &*loader.open(&platform, &name).unwrap());
    }

    #[test]
    fn later_provider_is_used_if_earlier_misses() {
        let platform = TestPlatform::new(false);
        platform.set_file("assets/only-on-disk.txt", b"disk contents".to_vec());

        let embedded = EmbeddedProvider::new(&[("sprite.png", b"from memory")]);
        let directory = DirectoryProvider::new(AssetPath::new("assets").unwrap());

        let mut loader = AssetLoader::new();
        loader.add_provider(&embedded);
        loader.add_provider(&directory);

        let name = AssetPath::new("only-on-disk.txt").unwrap();
        assert_eq!(
            b"disk contents",
            &*loader.open(&platform, &name).unwrap()
        );
    }
}
