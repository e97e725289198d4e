// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Context;
use engine::container::zip::{self, Archive, Timestamps};
use tracing::debug;

/// The in-memory editable version of the asset pack, loaded on startup,
/// written back to disk as a fresh zip archive at the end.
///
/// Unlike a general-purpose archive, entries here are plain conditioned
/// asset bytes (a re-encoded PNG, a re-encoded WAV) addressed by the asset
/// name the game will load them under, matching what `assets::PackProvider`
/// expects to find.
pub struct Database {
    pub entries: BTreeMap<String, Vec<u8>>,
}

impl Database {
    pub fn new(pack_file: Option<&[u8]>, password: Option<&str>) -> anyhow::Result<Database> {
        let mut entries = BTreeMap::new();
        if let Some(data) = pack_file {
            debug!("Parsing the existing asset pack.");
            let archive = Archive::open(data).context("Failed to parse the asset pack as a zip archive")?;
            for entry in archive.entries() {
                let bytes = archive
                    .extract(entry, password)
                    .with_context(|| format!("Failed to extract existing entry \"{}\"", entry.name()))?;
                entries.insert(entry.name().to_string(), bytes);
            }
        }
        Ok(Database { entries })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn write_into(self, pack_file: &mut impl Write, password: Option<&str>) -> anyhow::Result<()> {
        debug!("Writing {} entries into the asset pack.", self.entries.len());
        let mut writer = zip::Writer::new();
        if let Some(password) = password {
            writer.set_password(password);
        }
        for (name, data) in &self.entries {
            writer.add_entry(name, data, Timestamps::all(0));
        }
        pack_file
            .write_all(&writer.finish())
            .context("Failed to write the asset pack")?;
        Ok(())
    }
}
