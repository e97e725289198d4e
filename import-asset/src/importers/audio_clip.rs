// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{fs::File, io::ErrorKind, path::Path};

use anyhow::Context;
use platform::{AUDIO_CHANNELS, AUDIO_SAMPLE_RATE};
use symphonia::{
    core::{
        audio::{AudioBuffer, Channels, Signal, SignalSpec},
        codecs::DecoderOptions,
        errors::Error as SymphoniaError,
        formats::FormatOptions,
        io::{MediaSourceStream, MediaSourceStreamOptions},
        meta::MetadataOptions,
        probe::Hint,
    },
    default,
};
use tracing::{debug, trace};

/// Conditions an audio clip: decodes whatever format `audio_path` is in via
/// `symphonia`, converts it to the engine's native stereo i16 signal, and
/// re-encodes it as a WAV file so [`engine::audio::SoundDecoder`] can read it
/// back without needing the rest of the `symphonia` registry at runtime.
pub fn import(audio_path: &Path, track: Option<usize>) -> anyhow::Result<Vec<u8>> {
    let samples = read_audio_file(audio_path, track).context("Failed to read the audio file")?;
    debug!(
        "Conditioned {} frames of audio from {}.",
        samples.len(),
        audio_path.display(),
    );
    Ok(encode_wav(&samples))
}

fn read_audio_file(
    path: &Path,
    track: Option<usize>,
) -> anyhow::Result<Vec<[i16; AUDIO_CHANNELS]>> {
    debug!("Reading audio data from: {}", path.display());

    let codecs = default::get_codecs();
    let probe = default::get_probe();

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().map(|s| s.to_string_lossy()) {
        hint.with_extension(&extension);
    }

    let file = File::open(path).context("Could not open audio file for reading")?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());
    let mut source = probe
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Could not recognize audio format")?;

    let track_count = source.format.tracks().len();
    if track_count == 0 {
        return Err(anyhow::anyhow!(
            "The file appears to be an audio file, but without any tracks?"
        ));
    }
    let track = if let Some(track) = track {
        if track >= track_count {
            return Err(anyhow::anyhow!("Track number {track} wasn't found in this audio file, it only has {track_count} tracks. Note the numbering starts at 0."));
        }
        &source.format.tracks()[track]
    } else {
        source.format.default_track().unwrap()
    };

    let mut decoder = codecs
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create a decoder for the audio")?;

    let mut samples = Vec::new();
    loop {
        let packet = match source.format.next_packet() {
            Ok(packet) => packet,

            // This seems to signal that we're done, as "end of stream" means
            // "read finished" according to the docs, but there doesn't seem to
            // be a properly typed end of stream error.
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,

            // These are recoverable according to Decode::decoder docs.
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
            Err(SymphoniaError::ResetRequired) => {
                samples.clear();
                decoder = codecs
                    .make(decoder.codec_params(), &DecoderOptions::default())
                    .context("Failed to recreate a decoder for the audio")?;
                continue;
            }

            Err(err) => Err(err).context("Failed to read audio data packet")?,
        };

        let decoded = decoder
            .decode(&packet)
            .context("Failed to decode audio data packet")?;

        trace!(
            "Decoded audio data, {} frames of: {:?}",
            decoded.frames(),
            decoded.spec(),
        );

        assert_eq!(
            2, AUDIO_CHANNELS,
            "this conversion step assumes simple stereo audio buffers",
        );
        let mut converted = AudioBuffer::<i16>::new(
            decoded.capacity() as u64,
            SignalSpec {
                rate: AUDIO_SAMPLE_RATE,
                channels: Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
            },
        );
        decoded.convert(&mut converted);

        samples.reserve(converted.frames());
        for (&left, &right) in converted.chan(0).iter().zip(converted.chan(1)) {
            samples.push([left, right]);
        }
    }

    Ok(samples)
}

/// Writes `frames` out as a minimal PCM WAV file, the format
/// [`engine::audio::SoundDecoder`] recognizes via its "RIFF"/"WAVE" probe.
fn encode_wav(frames: &[[i16; AUDIO_CHANNELS]]) -> Vec<u8> {
    let data_len = frames.len() * AUDIO_CHANNELS * size_of::<i16>();
    let block_align = (AUDIO_CHANNELS * size_of::<i16>()) as u16;
    let byte_rate = AUDIO_SAMPLE_RATE * block_align as u32;

    let mut out = Vec::with_capacity(44 + data_len);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&(AUDIO_CHANNELS as u16).to_le_bytes());
    out.extend_from_slice(&AUDIO_SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_len as u32).to_le_bytes());
    for frame in frames {
        for sample in frame {
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::encode_wav;

    #[test]
    fn encoded_wav_header_reports_the_correct_data_length() {
        let frames = [[1i16, -1], [2, -2], [3, -3]];
        let wav = encode_wav(&frames);
        let riff_chunk_size = u32::from_le_bytes(wav[4..8].try_into().unwrap());
        assert_eq!(riff_chunk_size as usize, wav.len() - 8);
        let data_len = u32::from_le_bytes(wav[40..44].try_into().unwrap());
        assert_eq!(data_len as usize, frames.len() * 4);
    }
}
