// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{path::PathBuf, str::FromStr};

use bpaf::{batteries::verbose_by_slice, Bpaf, Parser, ShellComp};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Bpaf)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Reimports all assets in the settings file
    #[bpaf(command("reimport"))]
    Reimport {},
    /// Adds a new texture into the asset pack
    #[bpaf(command("add-texture"))]
    AddTexture {
        /// The name of the texture (used to load it in game code)
        name: String,
        /// The image file to import
        #[bpaf(argument("FILE"), complete_shell(ShellComp::File { mask: None }))]
        file: PathBuf,
        /// Downscales the image so that neither dimension exceeds this many
        /// pixels, preserving aspect ratio (defaults to no downscaling)
        #[bpaf(argument("PIXELS"))]
        max_dimension: Option<u32>,
    },
    /// Adds a new audio clip into the asset pack
    #[bpaf(command("add-audio"))]
    AddAudioClip {
        /// The name of the audio clip (used to load it in game code)
        name: String,
        /// The audio file to import
        #[bpaf(argument("FILE"), complete_shell(ShellComp::File { mask: None }))]
        file: PathBuf,
        /// The track number to import from the audio file, with the first track
        /// being number 0 (defaults to a format-dependent "default track")
        #[bpaf(argument("NUMBER"))]
        track: Option<usize>,
    },
}

impl Command {
    /// Returns the name of the asset this command imports. Used to match up two
    /// commands operating on the same asset.
    pub fn asset_name(&self) -> Option<&str> {
        match self {
            Command::Reimport {} => None,
            Command::AddTexture { name, .. } => Some(name),
            Command::AddAudioClip { name, .. } => Some(name),
        }
    }
}

/// Asset importer for the engine. Without any arguments, simply reimports all
/// assets in the import-settings.json file, and writes out the pack file into
/// assets.pac.
#[derive(Debug, Clone, Bpaf)]
#[bpaf(options)]
pub struct Options {
    #[bpaf(external(verbosity_parser))]
    pub verbosity_level: LevelFilter,
    /// Selects the asset pack file to overwrite (default: assets.pac)
    #[bpaf(
        argument("FILE"),
        fallback_with(|| PathBuf::from_str("assets.pac")),
        complete_shell(ShellComp::File { mask: Some("*.pac") }),
    )]
    pub database: PathBuf,
    /// Selects the import settings file to use (default: import-settings.json)
    #[bpaf(
        argument("FILE"),
        fallback_with(|| PathBuf::from_str("import-settings.json")),
        complete_shell(ShellComp::File { mask: Some("*.json") }),
    )]
    pub settings: PathBuf,
    /// Sets a password used to encrypt every entry written into the pack
    /// (defaults to no encryption)
    #[bpaf(argument("PASSWORD"))]
    pub password: Option<String>,
    #[bpaf(external)]
    pub command: Command,
}

fn verbosity_parser() -> impl Parser<LevelFilter> {
    verbose_by_slice(
        3,
        [
            LevelFilter::OFF,
            LevelFilter::ERROR,
            LevelFilter::WARN,
            LevelFilter::INFO,
            LevelFilter::DEBUG,
            LevelFilter::TRACE,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::options;

    #[test]
    fn check_bpaf_invariants() {
        options().check_invariants(true);
    }
}
