// SPDX-FileCopyrightText: 2024 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

mod cli;
mod database;
mod importers;
mod settings;

use std::{
    fs::{self, File},
    io::BufWriter,
};

use anyhow::Context;
use cli::Command;
use database::Database;
use settings::ImportSettings;
use tracing::{info, warn};
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> anyhow::Result<()> {
    let opts = cli::options().run();

    tracing_subscriber::fmt()
        .with_max_level(opts.verbosity_level)
        .finish()
        .init();

    let mut settings = settings::read(&opts.settings)?;
    let original_settings = settings.clone();

    info!("Reading asset pack from: {}", opts.database.display());
    let pack_file = fs::read(&opts.database).ok();
    let mut database = Database::new(pack_file.as_deref(), opts.password.as_deref())
        .context("Failed to read asset pack file")?;

    process_command(&opts.command, &mut settings, &mut database)?;

    info!("Writing asset pack to: {}", opts.database.display());
    let mut pack_file = BufWriter::new(
        File::create(&opts.database).context("Failed to open asset pack file for writing")?,
    );
    database
        .write_into(&mut pack_file, opts.password.as_deref())
        .context("Failed to write the asset pack back into the file")?;

    if original_settings != settings {
        info!("Saving new settings to: {}", opts.settings.display());
        let new_settings_str = serde_json::to_string_pretty(&settings)
            .context("Failed to serialize new import settings")?;
        fs::write(&opts.settings, new_settings_str)
            .context("Failed to write the new import settings file")?;
    }

    info!("All done! No fatal errors, but check the logs above for less severe issues.");

    Ok(())
}

fn process_command(
    command: &Command,
    settings: &mut ImportSettings,
    db: &mut Database,
) -> anyhow::Result<()> {
    let ImportSettings::V1 { imports } = settings;

    match command {
        Command::Reimport {} => {
            let pre_reimport_settings = settings.clone();
            let ImportSettings::V1 { imports } = &pre_reimport_settings;

            info!("Reimporting {} assets.", imports.len());

            db.clear();
            for command in imports {
                process_command(command, settings, db)?;
            }

            if settings != &pre_reimport_settings {
                warn!("Import settings changed during reimport - check if the changes make sense.");
            }

            return Ok(());
        }

        Command::AddTexture { name, file, max_dimension } => {
            info!("Importing texture \"{}\" from: {}", name, file.display());
            let png_bytes = importers::texture::import(file, *max_dimension)
                .context("Failed to import texture")?;
            db.entries.insert(name.clone(), png_bytes);
        }

        Command::AddAudioClip { name, file, track } => {
            info!("Importing audio clip \"{}\" from: {}", name, file.display());
            let wav_bytes = importers::audio_clip::import(file, *track)
                .context("Failed to import audio clip")?;
            db.entries.insert(name.clone(), wav_bytes);
        }
    }

    // In case the command operated on an asset, update the command in the import settings.
    if let Some(name) = command.asset_name() {
        if let Some(import) = imports.iter_mut().find(|c| c.asset_name() == Some(name)) {
            *import = command.clone();
        } else {
            imports.push(command.clone());
        }
    }

    Ok(())
}
