// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Decodes WAV and Ogg Vorbis audio into the engine's native stereo i16
//! signal, polymorphically, via `symphonia`.
//!
//! Grounded on `import-asset/src/importers/audio_clip.rs`'s decode loop (same
//! crate, same `probe`/`codecs`/`AudioBuffer::<i16>::convert` pipeline), but
//! kept open for incremental, seekable reads instead of decoding a whole file
//! up front, since [`SoundBuffer`](super::sound_buffer::SoundBuffer)'s
//! streaming variant only ever wants one block at a time.

use std::collections::VecDeque;
use std::io::{Cursor, ErrorKind};

use platform::AUDIO_CHANNELS;
use symphonia::core::audio::{AudioBuffer, Channels, Signal, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Errors [`SoundDecoder::open`] and mid-stream reads can produce.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    /// Neither the Ogg Vorbis nor the WAV demuxer in the `symphonia` registry
    /// recognized the byte stream (its signature-based probe tries the
    /// "OggS" then "RIFF"/"WAVE" magic in turn).
    #[error("unrecognized audio format")]
    UnrecognizedFormat,
    /// The stream was recognized but a packet couldn't be decoded, including
    /// mid-stream after previously-successful reads (a truncated or otherwise
    /// damaged file).
    #[error("corrupt audio stream")]
    Corrupt,
}

/// A polymorphic, seekable PCM decoder over a whole in-memory audio file.
pub struct SoundDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: u16,
    sample_rate: u32,
    total_samples: u64,
    position: u64,
    pending: VecDeque<[i16; AUDIO_CHANNELS]>,
}

impl SoundDecoder {
    /// Opens `bytes` as a WAV or Ogg Vorbis file. `bytes` should already be
    /// the entire file, e.g. from [`AssetLoader`](crate::assets::AssetLoader).
    pub fn open(bytes: &'static [u8]) -> Result<SoundDecoder, DecoderError> {
        let source = MediaSourceStream::new(
            Box::new(Cursor::new(bytes)),
            MediaSourceStreamOptions::default(),
        );
        let probed = symphonia::default::get_probe()
            .format(
                &Hint::new(),
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|_| DecoderError::UnrecognizedFormat)?;
        let format = probed.format;

        let track = format
            .default_track()
            .ok_or(DecoderError::UnrecognizedFormat)?;
        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(platform::AUDIO_SAMPLE_RATE);
        let total_samples = track.codec_params.n_frames.unwrap_or(0);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|_| DecoderError::UnrecognizedFormat)?;

        Ok(SoundDecoder {
            format,
            decoder,
            track_id,
            channels: AUDIO_CHANNELS as u16,
            sample_rate,
            total_samples,
            position: 0,
            pending: VecDeque::new(),
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total sample count, if the container states it up front. Some Vorbis
    /// streams don't, in which case this is 0; callers needing an exact
    /// length should track it from their own full-file playthrough instead.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Seeks to `sample`, discarding any pending decoded-but-unread samples.
    pub fn seek(&mut self, sample: u64) -> Result<(), DecoderError> {
        self.pending.clear();
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: sample,
                    track_id: self.track_id,
                },
            )
            .map_err(|_| DecoderError::Corrupt)?;
        self.position = seeked.actual_ts;
        self.decoder.reset();
        Ok(())
    }

    /// Decodes the next audio packet(s) for this track into `self.pending`.
    /// Returns `Ok(false)` at a clean end of stream, `Err` on a genuine
    /// decode failure.
    fn decode_more(&mut self) -> Result<bool, DecoderError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(false)
                }
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder = symphonia::default::get_codecs()
                        .make(self.decoder.codec_params(), &DecoderOptions::default())
                        .map_err(|_| DecoderError::Corrupt)?;
                    continue;
                }
                Err(_) => return Err(DecoderError::Corrupt),
            };

            if packet.track_id != self.track_id {
                continue;
            }

            let decoded = self.decoder.decode(&packet).map_err(|_| DecoderError::Corrupt)?;

            let mut converted = AudioBuffer::<i16>::new(
                decoded.capacity() as u64,
                SignalSpec {
                    rate: self.sample_rate,
                    channels: Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
                },
            );
            decoded.convert(&mut converted);

            let frames = converted.frames();
            if frames == 0 {
                continue;
            }
            self.pending.reserve(frames);
            for (&left, &right) in converted.chan(0).iter().zip(converted.chan(1)) {
                self.pending.push_back([left, right]);
            }
            return Ok(true);
        }
    }

    /// Fills `buffer[..n]` with the next `n` samples (or fewer at end of
    /// stream), returning how many were actually written.
    pub fn read(&mut self, buffer: &mut [[i16; AUDIO_CHANNELS]], n: usize) -> Result<usize, DecoderError> {
        let n = n.min(buffer.len());
        let mut written = 0;
        while written < n {
            if self.pending.is_empty() && !self.decode_more()? {
                break;
            }
            while written < n {
                let Some(sample) = self.pending.pop_front() else {
                    break;
                };
                buffer[written] = sample;
                written += 1;
            }
        }
        self.position += written as u64;
        Ok(written)
    }

    /// Like [`SoundDecoder::read`], but wraps reads past `loop_end` back to
    /// `loop_start` instead of stopping.
    pub fn read_loop(
        &mut self,
        buffer: &mut [[i16; AUDIO_CHANNELS]],
        n: usize,
        loop_start: u64,
        loop_end: u64,
    ) -> Result<usize, DecoderError> {
        let n = n.min(buffer.len());
        let mut written = 0;
        while written < n {
            if self.position >= loop_end {
                self.seek(loop_start)?;
            }
            let remaining_in_loop = (loop_end - self.position).min((n - written) as u64) as usize;
            if remaining_in_loop == 0 {
                self.seek(loop_start)?;
                continue;
            }
            let got = self.read(&mut buffer[written..written + remaining_in_loop], remaining_in_loop)?;
            if got == 0 {
                // Decoder hit real end of stream before loop_end; treat as
                // the loop point to avoid spinning forever.
                self.seek(loop_start)?;
                continue;
            }
            written += got;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal 16-bit stereo PCM WAV file containing a short ramp,
    /// so decoding can be exercised without a checked-in asset.
    fn make_wav(frames: &[[i16; 2]]) -> std::vec::Vec<u8> {
        let data_len = frames.len() * 4;
        let mut out = std::vec::Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&2u16.to_le_bytes()); // channels
        out.extend_from_slice(&44100u32.to_le_bytes()); // sample rate
        out.extend_from_slice(&(44100 * 4).to_le_bytes()); // byte rate
        out.extend_from_slice(&4u16.to_le_bytes()); // block align
        out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data_len as u32).to_le_bytes());
        for frame in frames {
            out.extend_from_slice(&frame[0].to_le_bytes());
            out.extend_from_slice(&frame[1].to_le_bytes());
        }
        out
    }

    #[test]
    fn decodes_a_short_wav_file() {
        let frames: std::vec::Vec<[i16; 2]> = (0..256).map(|i| [i as i16, -(i as i16)]).collect();
        let bytes: &'static [u8] = std::boxed::Box::leak(make_wav(&frames).into_boxed_slice());
        let mut decoder = SoundDecoder::open(bytes).expect("valid wav");
        assert_eq!(decoder.sample_rate(), 44100);

        let mut buffer = [[0i16; 2]; 256];
        let n = decoder.read(&mut buffer, 256).expect("decode succeeds");
        assert_eq!(n, 256);
        assert_eq!(buffer[0], [0, 0]);
        assert_eq!(buffer[10], [10, -10]);

        let n = decoder.read(&mut buffer, 256).expect("decode succeeds");
        assert_eq!(n, 0, "stream should be exhausted");
    }

    #[test]
    fn rejects_garbage() {
        let bytes: &'static [u8] = &[0u8; 64];
        assert!(matches!(SoundDecoder::open(bytes), Err(DecoderError::UnrecognizedFormat)));
    }

    #[test]
    fn seek_and_loop_read() {
        let frames: std::vec::Vec<[i16; 2]> = (0..100).map(|i| [i as i16, i as i16]).collect();
        let bytes: &'static [u8] = std::boxed::Box::leak(make_wav(&frames).into_boxed_slice());
        let mut decoder = SoundDecoder::open(bytes).expect("valid wav");

        let mut buffer = [[0i16; 2]; 150];
        let n = decoder.read_loop(&mut buffer, 150, 0, 100).expect("loop decode succeeds");
        assert_eq!(n, 150);
        assert_eq!(buffer[0], [0, 0]);
        assert_eq!(buffer[99], [99, 99]);
        assert_eq!(buffer[100], [0, 0], "should have looped back to the start");
    }
}
