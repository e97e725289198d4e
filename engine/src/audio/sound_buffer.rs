// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Static (fully decoded) and streaming (double-buffered) playable sound
//! sources.
//!
//! Grounded on `KSound.h`/`KSoundInput.h`'s split between one-shot/short
//! sounds decoded up front and longer music/voice streamed off a decoder a
//! block at a time.

use std::vec::Vec;

use platform::AUDIO_CHANNELS;

use super::sound_decoder::{DecoderError, SoundDecoder};

/// How many seconds of audio each streaming block holds. Two blocks are kept
/// around at once, so a streaming buffer always holds `2 *
/// STREAMING_SECONDS` seconds of decoded audio, one block playing while the
/// other either already holds the next block or is being refilled.
pub const STREAMING_SECONDS: f32 = 1.0;

/// Simple linear stereo pan law: `pan` -1.0 is hard left, 1.0 is hard right.
fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    (1.0 - pan.max(0.0), 1.0 + pan.min(0.0))
}

/// Shared playback controls and the actual sample production entry point for
/// both sound buffer variants.
///
/// `Send` so [`super::mixer::SoundMixer`] can hand handles' backends between
/// the main thread and its streaming-refill worker behind one mutex.
pub trait SoundBuffer: Send {
    fn play(&mut self);
    fn stop(&mut self);
    /// Suspends playback without releasing resources or repositioning the
    /// playback cursor, so a later [`SoundBuffer::play`] continues from where
    /// it left off. Unlike [`SoundBuffer::stop`], which is also used to
    /// discard a buffer for good, this is the pause/resume half of the pair.
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;
    fn set_pan(&mut self, pan: f32);
    fn pan(&self) -> f32;
    fn set_pitch(&mut self, pitch: f32);
    fn pitch(&self) -> f32;
    fn set_looping(&mut self, looping: bool);
    fn looping(&self) -> bool;
    fn position_seconds(&self) -> f32;
    fn set_position_seconds(&mut self, seconds: f32);
    fn length_seconds(&self) -> f32;

    /// Streaming buffers use this to observe their playback cursor and
    /// refill the block it just vacated; static buffers have nothing to do
    /// here. Called periodically by [`super::mixer::SoundMixer`], both from
    /// its per-frame `update` and its background worker.
    fn service(&mut self) -> Result<(), DecoderError>;

    /// Mixes up to `out.len()` stereo frames, scaled by `gain` and this
    /// buffer's own volume/pan, additively into `out` (an i32 accumulator, so
    /// multiple handles can sum before the mixer clamps to i16). Returns the
    /// number of frames actually produced; fewer than `out.len()` means
    /// playback ended partway through (a non-looping buffer ran out).
    fn mix_into(&mut self, out: &mut [[i32; AUDIO_CHANNELS]], gain: f32) -> usize;
}

/// A sound fully decoded into memory up front. Used for short one-shot
/// sounds, where streaming overhead isn't worth it.
pub struct StaticSoundBuffer {
    samples: Vec<[i16; AUDIO_CHANNELS]>,
    sample_rate: u32,
    cursor: f64,
    playing: bool,
    looping: bool,
    volume: f32,
    pan: f32,
    pitch: f32,
}

impl StaticSoundBuffer {
    /// Fully decodes `decoder` into memory.
    pub fn new(mut decoder: SoundDecoder) -> Result<StaticSoundBuffer, DecoderError> {
        let sample_rate = decoder.sample_rate();
        let mut samples = Vec::new();
        let mut chunk = [[0i16; AUDIO_CHANNELS]; 4096];
        loop {
            let n = decoder.read(&mut chunk, chunk.len())?;
            if n == 0 {
                break;
            }
            samples.extend_from_slice(&chunk[..n]);
        }
        Ok(StaticSoundBuffer {
            samples,
            sample_rate,
            cursor: 0.0,
            playing: false,
            looping: false,
            volume: 1.0,
            pan: 0.0,
            pitch: 1.0,
        })
    }

    /// Unwraps the buffer into its decoded samples and sample rate, for
    /// callers that want to pool the decode (e.g.
    /// [`super::mixer::SoundMixer::play_one_shot`]) rather than own this
    /// buffer directly.
    pub(super) fn into_samples(self) -> (Vec<[i16; AUDIO_CHANNELS]>, u32) {
        (self.samples, self.sample_rate)
    }
}

impl SoundBuffer for StaticSoundBuffer {
    fn play(&mut self) {
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.cursor = 0.0;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_pan(&mut self, pan: f32) {
        self.pan = pan;
    }

    fn pan(&self) -> f32 {
        self.pan
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
    }

    fn pitch(&self) -> f32 {
        self.pitch
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn looping(&self) -> bool {
        self.looping
    }

    fn position_seconds(&self) -> f32 {
        self.cursor as f32 / self.sample_rate as f32
    }

    fn set_position_seconds(&mut self, seconds: f32) {
        self.cursor = (seconds as f64 * self.sample_rate as f64).max(0.0);
    }

    fn length_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    fn service(&mut self) -> Result<(), DecoderError> {
        Ok(())
    }

    fn mix_into(&mut self, out: &mut [[i32; AUDIO_CHANNELS]], gain: f32) -> usize {
        if !self.playing || self.samples.is_empty() {
            return 0;
        }
        let (gain_l, gain_r) = pan_gains(self.pan);
        let gain_l = gain * self.volume * gain_l;
        let gain_r = gain * self.volume * gain_r;

        let mut produced = 0;
        for slot in out.iter_mut() {
            if self.cursor >= self.samples.len() as f64 {
                if self.looping {
                    self.cursor %= self.samples.len() as f64;
                } else {
                    self.playing = false;
                    break;
                }
            }
            let sample = self.samples[self.cursor as usize];
            slot[0] += (sample[0] as f32 * gain_l) as i32;
            slot[1] += (sample[1] as f32 * gain_r) as i32;
            self.cursor += self.pitch as f64;
            produced += 1;
        }
        produced
    }
}

struct Block {
    samples: Vec<[i16; AUDIO_CHANNELS]>,
    /// The decoder-relative sample offset of `samples[0]`, used to compute
    /// [`SoundBuffer::position_seconds`] without separately tracking playback
    /// history.
    base_sample: u64,
}

/// A sound streamed from a [`SoundDecoder`] a block at a time. Used for music
/// and long voice clips, where decoding the whole thing up front would waste
/// memory.
pub struct StreamingSoundBuffer {
    decoder: SoundDecoder,
    blocks: [Block; 2],
    block_len: usize,
    current_block: usize,
    cursor_in_block: f64,
    playing: bool,
    looping: bool,
    loop_start: u64,
    loop_end: u64,
    /// Set once the decoder has hit a non-looping end of stream; playback
    /// continues until the cursor drains the already-decoded block, then
    /// stops, rather than cutting off mid-block.
    stop_next: bool,
    volume: f32,
    pan: f32,
    pitch: f32,
}

impl StreamingSoundBuffer {
    /// Creates a streaming buffer over `decoder`, looping between
    /// `loop_start` and `loop_end` (in samples) if `looping` is enabled.
    /// `loop_end` of 0 means "the end of the stream".
    pub fn new(mut decoder: SoundDecoder, loop_start: u64, loop_end: u64) -> Result<StreamingSoundBuffer, DecoderError> {
        let block_len = (STREAMING_SECONDS * decoder.sample_rate() as f32) as usize;
        let loop_end = if loop_end == 0 {
            decoder.total_samples()
        } else {
            loop_end
        };

        let mut first = alloc_block(block_len);
        let n = decoder.read(first.samples_mut_scratch(block_len), block_len)?;
        first.samples.truncate(n);
        first.base_sample = 0;

        let mut second = alloc_block(block_len);
        let n = decoder.read(second.samples_mut_scratch(block_len), block_len)?;
        second.samples.truncate(n);
        second.base_sample = first.samples.len() as u64;

        Ok(StreamingSoundBuffer {
            decoder,
            blocks: [first, second],
            block_len,
            current_block: 0,
            cursor_in_block: 0.0,
            playing: false,
            looping: false,
            loop_start,
            loop_end,
            stop_next: false,
            volume: 1.0,
            pan: 0.0,
            pitch: 1.0,
        })
    }

    fn refill(&mut self, block_index: usize) -> Result<(), DecoderError> {
        let other = 1 - block_index;
        let base_sample = self.blocks[other].base_sample + self.blocks[other].samples.len() as u64;

        let block_len = self.block_len;
        let scratch = self.blocks[block_index].samples_mut_scratch(block_len);
        let n = if self.looping {
            self.decoder.read_loop(scratch, block_len, self.loop_start, self.loop_end)?
        } else {
            self.decoder.read(scratch, block_len)?
        };

        self.blocks[block_index].samples.truncate(n);
        self.blocks[block_index].base_sample = base_sample;
        if n == 0 {
            self.stop_next = true;
        }
        Ok(())
    }
}

impl Block {
    /// Resizes `samples` up to `block_len` (zero-filled scratch space) and
    /// returns it for the decoder to write into; the real length is set
    /// afterward by truncating to however many frames were actually decoded.
    fn samples_mut_scratch(&mut self, block_len: usize) -> &mut [[i16; AUDIO_CHANNELS]] {
        self.samples.resize(block_len, [0, 0]);
        &mut self.samples
    }
}

fn alloc_block(block_len: usize) -> Block {
    Block {
        samples: Vec::with_capacity(block_len),
        base_sample: 0,
    }
}

impl SoundBuffer for StreamingSoundBuffer {
    fn play(&mut self) {
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_pan(&mut self, pan: f32) {
        self.pan = pan;
    }

    fn pan(&self) -> f32 {
        self.pan
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
    }

    fn pitch(&self) -> f32 {
        self.pitch
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn looping(&self) -> bool {
        self.looping
    }

    fn position_seconds(&self) -> f32 {
        let block = &self.blocks[self.current_block];
        (block.base_sample as f64 + self.cursor_in_block) as f32 / self.decoder.sample_rate() as f32
    }

    fn set_position_seconds(&mut self, seconds: f32) {
        let sample = (seconds as f64 * self.decoder.sample_rate() as f64).max(0.0) as u64;
        if self.decoder.seek(sample).is_err() {
            return;
        }
        self.current_block = 0;
        self.cursor_in_block = 0.0;
        self.stop_next = false;

        if let Ok(n) = self
            .decoder
            .read(self.blocks[0].samples_mut_scratch(self.block_len), self.block_len)
        {
            self.blocks[0].samples.truncate(n);
        }
        self.blocks[0].base_sample = sample;

        let next_base = sample + self.blocks[0].samples.len() as u64;
        if let Ok(n) = self
            .decoder
            .read(self.blocks[1].samples_mut_scratch(self.block_len), self.block_len)
        {
            self.blocks[1].samples.truncate(n);
        } else {
            self.blocks[1].samples.clear();
        }
        self.blocks[1].base_sample = next_base;
    }

    fn length_seconds(&self) -> f32 {
        self.decoder.total_samples() as f32 / self.decoder.sample_rate() as f32
    }

    fn service(&mut self) -> Result<(), DecoderError> {
        // Once the cursor has fully drained the current block, swap to the
        // other (already-decoded-ahead) block and refill the one just
        // vacated.
        let current_len = self.blocks[self.current_block].samples.len();
        if self.cursor_in_block as usize >= current_len && !self.stop_next {
            let vacated = self.current_block;
            self.cursor_in_block -= current_len as f64;
            self.current_block = 1 - self.current_block;
            self.refill(vacated)?;
        }
        Ok(())
    }

    fn mix_into(&mut self, out: &mut [[i32; AUDIO_CHANNELS]], gain: f32) -> usize {
        if !self.playing {
            return 0;
        }
        let (gain_l, gain_r) = pan_gains(self.pan);
        let gain_l = gain * self.volume * gain_l;
        let gain_r = gain * self.volume * gain_r;

        let mut produced = 0;
        for slot in out.iter_mut() {
            let block = &self.blocks[self.current_block];
            if self.cursor_in_block as usize >= block.samples.len() {
                if self.stop_next {
                    self.playing = false;
                    break;
                }
                // Caller is expected to have called `service` often enough
                // that this doesn't happen mid-mix; if it does anyway (a
                // slow refill), just hold silence for this frame.
                produced += 1;
                continue;
            }
            let sample = block.samples[self.cursor_in_block as usize];
            slot[0] += (sample[0] as f32 * gain_l) as i32;
            slot[1] += (sample[1] as f32 * gain_r) as i32;
            self.cursor_in_block += self.pitch as f64;
            produced += 1;
        }
        produced
    }
}
