// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use alloc::vec;

use platform::{Box as PBox, Platform};

use crate::support::AssetPath;

use super::{ByteStream, Provider};

/// Reads a whole file off `platform`'s filesystem, blocking until the read
/// finishes.
///
/// This is a blocking suspension point (spec §5 item 3), bounded by the
/// file's size: the buffer is allocated up front from [`Platform::file_size`],
/// so there's exactly one read, never a retry loop over a growing buffer.
pub(super) fn read_whole_file<'a>(platform: &dyn Platform, path: &str) -> Option<ByteStream<'a>> {
    let file = platform.open_file(path)?;
    let size = platform.file_size(file)? as usize;

    // Leaked rather than arena-allocated: asset blobs are expected to live for
    // the remainder of the program, the same way `Platform::create_sprite`
    // documents its sprites as never freed.
    let buffer = PBox::from_mut(vec![0u8; size].leak());

    let task = platform.begin_file_read(file, 0, buffer);
    while !platform.is_file_read_finished(&task) {
        // Busy-wait: real platforms either finish synchronously (as
        // `TestPlatform` does) or complete the task on another thread while
        // this one spins, which is fine for a blocking call.
        core::hint::spin_loop();
    }

    match platform.finish_file_read(task) {
        Ok(buffer) => Some(ByteStream::Boxed(buffer)),
        Err(_) => None,
    }
}

/// Resolves asset names against a directory on the host filesystem.
///
/// Grounded on `KFileLoader`'s `CFolder` callback: joins the provider's root
/// with the requested name and defers to the platform's file I/O.
pub struct DirectoryProvider {
    root: AssetPath,
}

impl DirectoryProvider {
    /// Creates a provider rooted at `root`. Asset names are resolved relative
    /// to this directory.
    pub fn new(root: AssetPath) -> DirectoryProvider {
        DirectoryProvider { root }
    }

    fn resolve(&self, name: &AssetPath) -> Option<AssetPath> {
        self.root.join(name.as_str())
    }
}

impl Provider for DirectoryProvider {
    fn exists(&self, platform: &dyn Platform, name: &AssetPath) -> bool {
        let Some(path) = self.resolve(name) else {
            return false;
        };
        platform.open_file(path.as_str()).is_some()
    }

    fn open<'a>(&'a self, platform: &dyn Platform, name: &AssetPath) -> Option<ByteStream<'a>> {
        let path = self.resolve(name)?;
        read_whole_file(platform, path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::DirectoryProvider;
    use crate::{assets::Provider, support::AssetPath, test_platform::TestPlatform};

    #[test]
    fn resolves_relative_to_root() {
        let platform = TestPlatform::new(false);
        platform.set_file("data/levels/1.json", b"level one".to_vec());

        let provider = DirectoryProvider::new(AssetPath::new("data").unwrap());
        let name = AssetPath::new("levels/1.json").unwrap();

        assert!(provider.exists(&platform, &name));
        assert_eq!(b"level one", &*provider.open(&platform, &name).unwrap());
    }

    #[test]
    fn missing_file_does_not_resolve() {
        let platform = TestPlatform::new(false);
        let provider = DirectoryProvider::new(AssetPath::new("data").unwrap());
        let name = AssetPath::new("missing.json").unwrap();

        assert!(!provider.exists(&platform, &name));
        assert!(provider.open(&platform, &name).is_none());
    }
}
