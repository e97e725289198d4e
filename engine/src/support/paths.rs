// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Asset path normalization and comparison.
//!
//! Grounded on the original engine's `KPath`: paths are always stored with
//! forward slashes internally regardless of what delimiter the caller used,
//! and comparisons can optionally ignore case and/or the directory part.

use arrayvec::ArrayString;

/// Maximum length of a normalized asset path.
pub const MAX_PATH_LENGTH: usize = 255;

const SLASH: char = '/';

/// A normalized, fixed-capacity asset path.
///
/// Backslashes are converted to forward slashes on construction, and
/// sequences of repeated slashes are collapsed, matching
/// `KPath`'s `Path_normalize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetPath(ArrayString<MAX_PATH_LENGTH>);

impl AssetPath {
    /// Normalizes `path` into an [`AssetPath`]. Returns `None` if it doesn't
    /// fit within [`MAX_PATH_LENGTH`] bytes.
    pub fn new(path: &str) -> Option<AssetPath> {
        let mut out = ArrayString::<MAX_PATH_LENGTH>::new();
        let mut prev_was_slash = false;
        for c in path.chars() {
            let c = if c == '\\' { SLASH } else { c };
            if c == SLASH {
                if prev_was_slash {
                    continue;
                }
                prev_was_slash = true;
            } else {
                prev_was_slash = false;
            }
            out.try_push(c).ok()?;
        }
        // A trailing slash (other than the root) isn't meaningful for asset
        // names, so it's trimmed, matching directories being joined without
        // doubling the delimiter.
        if out.len() > 1 && out.ends_with(SLASH) {
            out.truncate(out.len() - 1);
        }
        Some(AssetPath(out))
    }

    /// Returns the path as a `&str`, always using forward slashes.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the directory part of the path, i.e. everything before the
    /// last slash. Empty if the path has no directory component.
    pub fn directory(&self) -> &str {
        match self.0.rfind(SLASH) {
            Some(i) => &self.0[..i],
            None => "",
        }
    }

    /// Returns the file name part of the path, i.e. everything after the
    /// last slash.
    pub fn file_name(&self) -> &str {
        match self.0.rfind(SLASH) {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    /// Returns the extension of the file name (without the leading period),
    /// or an empty string if there is none.
    pub fn extension(&self) -> &str {
        let file_name = self.file_name();
        match file_name.rfind('.') {
            // A leading period (e.g. ".gitignore") isn't treated as an
            // extension separator.
            Some(i) if i > 0 => &file_name[i + 1..],
            _ => "",
        }
    }

    /// Joins this path with `more`, inserting a single slash between them.
    /// Returns `None` if the result doesn't fit.
    pub fn join(&self, more: &str) -> Option<AssetPath> {
        let mut joined = ArrayString::<{ MAX_PATH_LENGTH * 2 }>::new();
        joined.try_push_str(self.as_str()).ok()?;
        if !joined.is_empty() && !joined.ends_with(SLASH) {
            joined.try_push(SLASH).ok()?;
        }
        joined.try_push_str(more).ok()?;
        AssetPath::new(&joined)
    }

    /// Compares two paths, with the given case and path-component
    /// sensitivity, matching `KPath::compare`'s `ignore_case`/`ignore_path`
    /// flags.
    pub fn compare(&self, other: &AssetPath, ignore_case: bool, ignore_path: bool) -> bool {
        let a = if ignore_path { self.file_name() } else { self.as_str() };
        let b = if ignore_path { other.file_name() } else { other.as_str() };
        if ignore_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    /// Returns true if `self`'s path components start with all of `prefix`'s
    /// path components (not just a string prefix: `a/bb` does not start with
    /// `a/b`).
    pub fn starts_with_path(&self, prefix: &AssetPath) -> bool {
        if prefix.as_str().is_empty() {
            return true;
        }
        let mut self_components = self.as_str().split(SLASH);
        for prefix_component in prefix.as_str().split(SLASH) {
            match self_components.next() {
                Some(c) if c == prefix_component => continue,
                _ => return false,
            }
        }
        true
    }
}

impl core::fmt::Display for AssetPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::AssetPath;

    #[test]
    fn normalizes_backslashes_and_repeats() {
        let path = AssetPath::new(r"textures\\ui//button.png").unwrap();
        assert_eq!("textures/ui/button.png", path.as_str());
    }

    #[test]
    fn splits_directory_and_file_name() {
        let path = AssetPath::new("sounds/sfx/jump.ogg").unwrap();
        assert_eq!("sounds/sfx", path.directory());
        assert_eq!("jump.ogg", path.file_name());
        assert_eq!("ogg", path.extension());
    }

    #[test]
    fn no_extension_is_empty() {
        let path = AssetPath::new("README").unwrap();
        assert_eq!("", path.extension());
    }

    #[test]
    fn join_inserts_one_slash() {
        let base = AssetPath::new("textures/").unwrap();
        let joined = base.join("ui/button.png").unwrap();
        assert_eq!("textures/ui/button.png", joined.as_str());
    }

    #[test]
    fn compare_respects_flags() {
        let a = AssetPath::new("Textures/UI/Button.PNG").unwrap();
        let b = AssetPath::new("textures/ui/button.png").unwrap();
        assert!(!a.compare(&b, false, false));
        assert!(a.compare(&b, true, false));

        let c = AssetPath::new("button.png").unwrap();
        assert!(!b.compare(&c, true, false));
        assert!(b.compare(&c, true, true));
    }

    #[test]
    fn starts_with_path_is_component_aware() {
        let full = AssetPath::new("a/bb/c").unwrap();
        assert!(full.starts_with_path(&AssetPath::new("a/bb").unwrap()));
        assert!(!full.starts_with_path(&AssetPath::new("a/b").unwrap()));
    }
}
