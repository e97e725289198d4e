// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sound playback: the mixer, the two playable sound buffer variants, and
//! the WAV/Ogg Vorbis decoder backing them.

pub mod mixer;
pub mod sound_buffer;
pub mod sound_decoder;

pub use mixer::{GroupId, PlaybackError, SoundGroup, SoundHandle, SoundMixer, SoundMixerLimits};
pub use sound_buffer::{SoundBuffer, StaticSoundBuffer, StreamingSoundBuffer};
pub use sound_decoder::{DecoderError, SoundDecoder};
