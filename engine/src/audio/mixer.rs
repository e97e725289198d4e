// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Group-based volume/fade mixer, owning every playing sound's handle and
//! lifecycle.
//!
//! Grounded on `KSound.h`/`KSound.cpp`: groups with a solo/mute flag pair and
//! two independent volume multipliers, linear fades in linear-gain space, and
//! handles whose backends are destroyed at end-of-frame rather than inline,
//! so the audio worker thread never observes a half-torn-down handle.

use std::boxed::Box;
use std::collections::HashMap;
use std::string::String;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use std::vec::Vec;

use platform::{Platform, AUDIO_CHANNELS};

use super::sound_buffer::{SoundBuffer, StaticSoundBuffer, StreamingSoundBuffer, STREAMING_SECONDS};
use super::sound_decoder::{DecoderError, SoundDecoder};

/// Errors [`SoundMixer::play_one_shot`]/[`SoundMixer::play_streaming`] can
/// produce.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// The sound bytes couldn't be decoded; see [`DecoderError`].
    #[error(transparent)]
    Decode(#[from] DecoderError),
    /// Every one of [`SoundMixerLimits::max_handles`] table entries is in
    /// use. Matches `EngineLimits::audio_concurrent_sounds_count`'s own
    /// documented behavior upstream: new sounds are ignored rather than
    /// displacing an old one.
    #[error("sound handle table is full")]
    HandleTableFull,
}

/// Opaque id for a [`SoundGroup`]. See spec component 4.G.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u32);

/// Opaque id for a handle returned by [`SoundMixer::play_one_shot`] /
/// [`SoundMixer::play_streaming`]. Carries a generation counter so a handle
/// reused after the slot it named gets recycled doesn't alias a different
/// sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle {
    index: u32,
    generation: u32,
}

/// A named bus controlling the volume of every handle routed through it. See
/// spec component 4.G's data model.
pub struct SoundGroup {
    name: String,
    /// Persistent, instantly-applied volume last requested by
    /// [`SoundMixer::set_group_volume`] (or 1.0 by default). Queryable even
    /// while a fade is still converging `volume` towards it.
    master_volume: f32,
    /// The live, possibly-fading gain multiplier actually used by the mix.
    volume: f32,
    mute: bool,
    solo: bool,
}

impl SoundGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn volume(&self) -> f32 {
        self.master_volume
    }

    pub fn is_muted(&self) -> bool {
        self.mute
    }

    pub fn is_solo(&self) -> bool {
        self.solo
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FadeTarget {
    Handle(SoundHandle),
    Group(GroupId),
}

struct Fade {
    target: FadeTarget,
    start_volume: f32,
    end_volume: f32,
    duration_frames: u32,
    elapsed_frames: u32,
    auto_stop_on_finish: bool,
}

impl Fade {
    fn current_volume(&self) -> f32 {
        if self.duration_frames == 0 {
            return self.end_volume;
        }
        let t = (self.elapsed_frames as f32 / self.duration_frames as f32).min(1.0);
        self.start_volume + (self.end_volume - self.start_volume) * t
    }

    fn finished(&self) -> bool {
        self.elapsed_frames >= self.duration_frames
    }
}

/// A one-shot clip's fully-decoded PCM, cached by asset path so repeated
/// plays of the same sound don't re-run the decoder. See spec's "pooled by
/// asset path" wording for `playOneShot`.
struct PooledClip {
    samples: Arc<[[i16; AUDIO_CHANNELS]]>,
    sample_rate: u32,
}

/// A [`SoundBuffer`] playing back a [`PooledClip`]'s samples without owning
/// them, so many one-shot handles can share one decode.
struct PooledStaticBuffer {
    clip: Arc<[[i16; AUDIO_CHANNELS]]>,
    sample_rate: u32,
    cursor: f64,
    playing: bool,
    looping: bool,
    volume: f32,
    pan: f32,
    pitch: f32,
}

fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    (1.0 - pan.max(0.0), 1.0 + pan.min(0.0))
}

impl SoundBuffer for PooledStaticBuffer {
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
        self.clip.len() as f32 / self.sample_rate as f32
    }

    fn service(&mut self) -> Result<(), DecoderError> {
        Ok(())
    }

    fn mix_into(&mut self, out: &mut [[i32; AUDIO_CHANNELS]], gain: f32) -> usize {
        if !self.playing || self.clip.is_empty() {
            return 0;
        }
        let (gain_l, gain_r) = pan_gains(self.pan);
        let gain_l = gain * self.volume * gain_l;
        let gain_r = gain * self.volume * gain_r;

        let mut produced = 0;
        for slot in out.iter_mut() {
            if self.cursor >= self.clip.len() as f64 {
                if self.looping {
                    self.cursor %= self.clip.len() as f64;
                } else {
                    self.playing = false;
                    break;
                }
            }
            let sample = self.clip[self.cursor as usize];
            slot[0] += (sample[0] as f32 * gain_l) as i32;
            slot[1] += (sample[1] as f32 * gain_r) as i32;
            self.cursor += self.pitch as f64;
            produced += 1;
        }
        produced
    }
}

struct HandleSlot {
    backend: Box<dyn SoundBuffer + Send>,
    group: GroupId,
    volume: f32,
    destroy_on_stop: bool,
    paused: bool,
}

/// Capacities for [`SoundMixer::new`].
#[derive(Clone, Copy)]
pub struct SoundMixerLimits {
    /// Maximum number of concurrently live handles (playing or pending
    /// end-of-frame cleanup).
    pub max_handles: usize,
    /// Assumed call cadence of [`SoundMixer::update`], used to convert
    /// millisecond fade durations into frame counts. Matches the
    /// [`crate::game_loop::GameLoop`] driving the mixer's `update` calls.
    pub fps: f32,
}

impl SoundMixerLimits {
    /// The default configuration, matching a 64-voice limit at 60 FPS.
    pub const DEFAULT: SoundMixerLimits = SoundMixerLimits {
        max_handles: 64,
        fps: 60.0,
    };
}

impl Default for SoundMixerLimits {
    fn default() -> Self {
        SoundMixerLimits::DEFAULT
    }
}

struct Inner {
    groups: Vec<SoundGroup>,
    solo_group: Option<GroupId>,
    master_volume: f32,
    master_mute: bool,
    handles: Vec<Option<HandleSlot>>,
    generations: Vec<u32>,
    free_handles: Vec<u32>,
    fades: Vec<Fade>,
    pending_destroy: Vec<SoundHandle>,
    static_pool: HashMap<String, Arc<PooledClip>>,
    fps: f32,
    max_handles: usize,
}

impl Inner {
    fn group_mut(&mut self, group: GroupId) -> &mut SoundGroup {
        &mut self.groups[group.0 as usize]
    }

    fn slot(&self, handle: SoundHandle) -> Option<&HandleSlot> {
        if self.generations[handle.index as usize] != handle.generation {
            return None;
        }
        self.handles[handle.index as usize].as_ref()
    }

    fn slot_mut(&mut self, handle: SoundHandle) -> Option<&mut HandleSlot> {
        if self.generations[handle.index as usize] != handle.generation {
            return None;
        }
        self.handles[handle.index as usize].as_mut()
    }

    fn effective_gain_for(&self, slot: &HandleSlot) -> f32 {
        if self.master_mute {
            return 0.0;
        }
        let group = &self.groups[slot.group.0 as usize];
        if let Some(solo) = self.solo_group {
            if solo != slot.group {
                return 0.0;
            }
        }
        if group.mute {
            return 0.0;
        }
        self.master_volume * group.master_volume * group.volume * slot.volume
    }

    /// Inserts `slot` into a free table entry, or `None` if every one of
    /// `max_handles` entries is live (spec 4.G: concurrent voice limit).
    fn insert_handle(&mut self, slot: HandleSlot) -> Option<SoundHandle> {
        if let Some(index) = self.free_handles.pop() {
            let generation = self.generations[index as usize] + 1;
            self.generations[index as usize] = generation;
            self.handles[index as usize] = Some(slot);
            return Some(SoundHandle { index, generation });
        }
        if self.handles.len() >= self.max_handles {
            return None;
        }
        let index = self.handles.len() as u32;
        self.handles.push(Some(slot));
        self.generations.push(0);
        Some(SoundHandle { index, generation: 0 })
    }

    fn schedule_fade(
        &mut self,
        target: FadeTarget,
        start_volume: f32,
        end_volume: f32,
        duration_frames: u32,
        auto_stop_on_finish: bool,
    ) {
        self.fades.retain(|f| f.target != target);
        self.fades.push(Fade {
            target,
            start_volume,
            end_volume,
            duration_frames,
            elapsed_frames: 0,
            auto_stop_on_finish,
        });
    }

    fn ms_to_frames(&self, fade_ms: f32) -> u32 {
        ((fade_ms / 1000.0) * self.fps).round().max(0.0) as u32
    }
}

/// Audio worker shared state: wraps [`Inner`] behind one lock, plus the
/// condvar used to wake/park the background refill thread.
struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
    shutting_down: Mutex<bool>,
}

/// Groups, fades, handles, and lifecycle for sound playback. See spec
/// component 4.G.
///
/// Owns exactly one auxiliary thread (see spec §5): it wakes every quarter
/// of [`STREAMING_SECONDS`] to refill streaming buffers' vacated blocks, so
/// streaming playback doesn't stall waiting for the once-per-frame
/// `SoundMixer::update` call on the main thread.
pub struct SoundMixer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl SoundMixer {
    /// Creates the mixer and starts its background streaming-refill worker.
    pub fn new(limits: SoundMixerLimits, platform: &dyn Platform) -> SoundMixer {
        let inner = Inner {
            groups: Vec::new(),
            solo_group: None,
            master_volume: 1.0,
            master_mute: false,
            handles: Vec::with_capacity(limits.max_handles),
            generations: Vec::with_capacity(limits.max_handles),
            free_handles: Vec::new(),
            fades: Vec::new(),
            pending_destroy: Vec::new(),
            static_pool: HashMap::new(),
            fps: limits.fps.max(1.0),
            max_handles: limits.max_handles,
        };
        let shared = Arc::new(Shared {
            inner: Mutex::new(inner),
            wake: Condvar::new(),
            shutting_down: Mutex::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let poll_interval = Duration::from_secs_f32((STREAMING_SECONDS / 4.0).max(0.001));
        platform.println(format_args!("sound mixer: starting streaming worker"));
        let worker = std::thread::Builder::new()
            .name("audio-streaming".into())
            .spawn(move || {
                loop {
                    {
                        let done = worker_shared.shutting_down.lock().unwrap();
                        if *done {
                            break;
                        }
                        let (_done, timed_out) = worker_shared
                            .wake
                            .wait_timeout(done, poll_interval)
                            .unwrap();
                        let _ = timed_out;
                    }
                    let mut inner = worker_shared.inner.lock().unwrap();
                    for slot in inner.handles.iter_mut().flatten() {
                        if slot.backend.service().is_err() {
                            // A mid-stream decode error leaves the vacated
                            // block unrefillable; stop instead of looping
                            // the already-decoded blocks forever.
                            slot.backend.stop();
                        }
                    }
                }
            })
            .expect("failed to spawn the audio streaming worker thread");

        SoundMixer {
            shared,
            worker: Some(worker),
        }
    }

    /// Creates a new mixer group (bus), e.g. "music" or "sfx".
    pub fn add_group(&self, name: &str) -> GroupId {
        let mut inner = self.shared.inner.lock().unwrap();
        let id = GroupId(inner.groups.len() as u32);
        inner.groups.push(SoundGroup {
            name: name.into(),
            master_volume: 1.0,
            volume: 1.0,
            mute: false,
            solo: false,
        });
        id
    }

    /// Decodes `bytes` into an in-memory static buffer (reusing a previously
    /// decoded clip under the same `asset_name`, if any), begins playback,
    /// and marks the handle to be destroyed once playback naturally ends.
    pub fn play_one_shot(
        &self,
        asset_name: &str,
        bytes: &'static [u8],
        group: GroupId,
    ) -> Result<SoundHandle, PlaybackError> {
        let mut inner = self.shared.inner.lock().unwrap();
        let clip = if let Some(clip) = inner.static_pool.get(asset_name) {
            Arc::clone(clip)
        } else {
            let decoder = SoundDecoder::open(bytes)?;
            let static_buffer = StaticSoundBuffer::new(decoder)?;
            let (samples, sample_rate) = static_buffer.into_samples();
            let clip = Arc::new(PooledClip {
                samples: Arc::from(samples.into_boxed_slice()),
                sample_rate,
            });
            inner.static_pool.insert(asset_name.into(), Arc::clone(&clip));
            clip
        };

        let mut backend = PooledStaticBuffer {
            clip: Arc::clone(&clip.samples),
            sample_rate: clip.sample_rate,
            cursor: 0.0,
            playing: false,
            looping: false,
            volume: 1.0,
            pan: 0.0,
            pitch: 1.0,
        };
        backend.play();

        let handle = inner
            .insert_handle(HandleSlot {
                backend: Box::new(backend),
                group,
                volume: 1.0,
                destroy_on_stop: true,
                paused: false,
            })
            .ok_or(PlaybackError::HandleTableFull)?;
        Ok(handle)
    }

    /// Constructs a streaming buffer bound to `bytes` and begins playback.
    /// Unlike [`SoundMixer::play_one_shot`], the handle is never
    /// automatically destroyed when playback stops, matching
    /// `destroy_on_stop = false` for streamed music/voice.
    pub fn play_streaming(
        &self,
        bytes: &'static [u8],
        group: GroupId,
        looping: bool,
        loop_start: u64,
        loop_end: u64,
    ) -> Result<SoundHandle, PlaybackError> {
        let decoder = SoundDecoder::open(bytes)?;
        let mut backend = StreamingSoundBuffer::new(decoder, loop_start, loop_end)?;
        backend.set_looping(looping);
        backend.play();

        let mut inner = self.shared.inner.lock().unwrap();
        let handle = inner
            .insert_handle(HandleSlot {
                backend: Box::new(backend),
                group,
                volume: 1.0,
                destroy_on_stop: false,
                paused: false,
            })
            .ok_or(PlaybackError::HandleTableFull)?;
        Ok(handle)
    }

    /// Stops `handle`. With `fade_ms > 0`, schedules a fade to silence first
    /// and stops (destroying the handle at end-of-frame) once it completes;
    /// otherwise stops immediately and schedules end-of-frame destruction.
    pub fn stop(&self, handle: SoundHandle, fade_ms: f32) {
        let mut inner = self.shared.inner.lock().unwrap();
        if fade_ms > 0.0 {
            let current = inner
                .slot(handle)
                .map(|slot| slot.volume)
                .unwrap_or(1.0);
            let frames = inner.ms_to_frames(fade_ms);
            inner.schedule_fade(FadeTarget::Handle(handle), current, 0.0, frames, true);
        } else {
            if let Some(slot) = inner.slot_mut(handle) {
                slot.backend.stop();
            }
            inner.pending_destroy.push(handle);
        }
    }

    /// Pauses playback without releasing the handle's backend resources or
    /// repositioning its playback cursor, so [`SoundMixer::resume`] continues
    /// from where it left off.
    pub fn pause(&self, handle: SoundHandle) {
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(slot) = inner.slot_mut(handle) {
            slot.paused = true;
            slot.backend.pause();
        }
    }

    /// Resumes a handle previously paused with [`SoundMixer::pause`].
    pub fn resume(&self, handle: SoundHandle) {
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(slot) = inner.slot_mut(handle) {
            slot.paused = false;
            slot.backend.play();
        }
    }

    pub fn set_volume(&self, handle: SoundHandle, volume: f32) {
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(slot) = inner.slot_mut(handle) {
            slot.volume = volume;
            slot.backend.set_volume(volume);
        }
    }

    pub fn set_pitch(&self, handle: SoundHandle, pitch: f32) {
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(slot) = inner.slot_mut(handle) {
            slot.backend.set_pitch(pitch);
        }
    }

    pub fn set_pan(&self, handle: SoundHandle, pan: f32) {
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(slot) = inner.slot_mut(handle) {
            slot.backend.set_pan(pan);
        }
    }

    pub fn set_looping(&self, handle: SoundHandle, looping: bool) {
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(slot) = inner.slot_mut(handle) {
            slot.backend.set_looping(looping);
        }
    }

    pub fn seek(&self, handle: SoundHandle, seconds: f32) {
        let mut inner = self.shared.inner.lock().unwrap();
        if let Some(slot) = inner.slot_mut(handle) {
            slot.backend.set_position_seconds(seconds);
        }
    }

    pub fn tell(&self, handle: SoundHandle) -> Option<f32> {
        let inner = self.shared.inner.lock().unwrap();
        inner.slot(handle).map(|slot| slot.backend.position_seconds())
    }

    pub fn length(&self, handle: SoundHandle) -> Option<f32> {
        let inner = self.shared.inner.lock().unwrap();
        inner.slot(handle).map(|slot| slot.backend.length_seconds())
    }

    /// Returns the currently mixed-in gain for `handle`, per the mixer gain
    /// law (master/group/solo/mute/handle volume all multiplied together).
    pub fn effective_gain(&self, handle: SoundHandle) -> f32 {
        let inner = self.shared.inner.lock().unwrap();
        inner
            .slot(handle)
            .map(|slot| inner.effective_gain_for(slot))
            .unwrap_or(0.0)
    }

    /// Sets a group's volume, optionally fading to it over `fade_ms`
    /// milliseconds instead of applying it instantly.
    pub fn set_group_volume(&self, group: GroupId, volume: f32, fade_ms: f32) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.group_mut(group).master_volume = volume;
        if fade_ms > 0.0 {
            let current = inner.group_mut(group).volume;
            let frames = inner.ms_to_frames(fade_ms);
            inner.schedule_fade(FadeTarget::Group(group), current, volume, frames, false);
        } else {
            inner.fades.retain(|f| f.target != FadeTarget::Group(group));
            inner.group_mut(group).volume = volume;
        }
    }

    /// Sets a group's mute flag. Setting `solo` atomically clears every
    /// other group's solo flag, so at most one group can be soloed.
    pub fn set_group_flags(&self, group: GroupId, mute: bool, solo: bool) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.group_mut(group).mute = mute;
        inner.group_mut(group).solo = solo;
        if solo {
            inner.solo_group = Some(group);
            for (i, g) in inner.groups.iter_mut().enumerate() {
                if i as u32 != group.0 {
                    g.solo = false;
                }
            }
        } else if inner.solo_group == Some(group) {
            inner.solo_group = None;
        }
    }

    /// Stops every handle currently routed through `group`.
    pub fn stop_by_group(&self, group: GroupId, fade_ms: f32) {
        let mut inner = self.shared.inner.lock().unwrap();
        let matching: Vec<SoundHandle> = inner
            .handles
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let slot = slot.as_ref()?;
                (slot.group == group).then(|| SoundHandle {
                    index: i as u32,
                    generation: inner.generations[i],
                })
            })
            .collect();
        drop(inner);
        for handle in matching {
            self.stop(handle, fade_ms);
        }
    }

    /// Stops every currently live handle.
    pub fn stop_all(&self, fade_ms: f32) {
        let inner = self.shared.inner.lock().unwrap();
        let matching: Vec<SoundHandle> = inner
            .handles
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.as_ref()?;
                Some(SoundHandle {
                    index: i as u32,
                    generation: inner.generations[i],
                })
            })
            .collect();
        drop(inner);
        for handle in matching {
            self.stop(handle, fade_ms);
        }
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.shared.inner.lock().unwrap().master_volume = volume;
    }

    pub fn set_master_mute(&self, mute: bool) {
        self.shared.inner.lock().unwrap().master_mute = mute;
    }

    /// Per-frame update (spec §4.G): advances every live fade by one frame,
    /// applying completed ones' `auto_stop_on_finish` action, then garbage
    /// collects handles whose backend has stopped playing
    /// (`destroy_on_stop`) or that were explicitly stopped, in one pass.
    pub fn update(&self) {
        let mut inner = self.shared.inner.lock().unwrap();

        let mut finished_handle_stops = Vec::new();
        inner.fades.retain_mut(|fade| {
            fade.elapsed_frames += 1;
            let volume = fade.current_volume();
            match fade.target {
                FadeTarget::Handle(handle) => {
                    if inner.generations.get(handle.index as usize) == Some(&handle.generation) {
                        if let Some(slot) = inner.handles[handle.index as usize].as_mut() {
                            slot.volume = volume;
                        }
                    }
                    if fade.finished() {
                        if fade.auto_stop_on_finish {
                            finished_handle_stops.push(handle);
                        }
                        return false;
                    }
                    true
                }
                FadeTarget::Group(group) => {
                    if (group.0 as usize) < inner.groups.len() {
                        inner.groups[group.0 as usize].volume = volume;
                    }
                    !fade.finished()
                }
            }
        });

        for handle in finished_handle_stops {
            if let Some(slot) = inner.slot_mut(handle) {
                slot.backend.stop();
            }
            inner.pending_destroy.push(handle);
        }

        for (index, slot) in inner.handles.iter().enumerate() {
            if let Some(slot) = slot {
                if slot.destroy_on_stop && !slot.backend.is_playing() && !slot.paused {
                    let handle = SoundHandle {
                        index: index as u32,
                        generation: inner.generations[index],
                    };
                    inner.pending_destroy.push(handle);
                }
            }
        }

        let to_destroy = core::mem::take(&mut inner.pending_destroy);
        for handle in to_destroy {
            if inner.generations.get(handle.index as usize) != Some(&handle.generation) {
                continue;
            }
            inner.handles[handle.index as usize] = None;
            inner.free_handles.push(handle.index);
        }

        drop(inner);
        self.shared.wake.notify_one();
    }

    /// Stops all handles, signals the streaming worker to exit, and joins it.
    pub fn shutdown(mut self) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.handles.clear();
            inner.free_handles.clear();
            inner.generations.clear();
            inner.fades.clear();
        }
        *self.shared.shutting_down.lock().unwrap() = true;
        self.shared.wake.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SoundMixer {
    fn drop(&mut self) {
        *self.shared.shutting_down.lock().unwrap() = true;
        self.shared.wake.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_platform::TestPlatform;

    fn make_wav(frames: &[[i16; 2]]) -> std::vec::Vec<u8> {
        let data_len = frames.len() * 4;
        let mut out = std::vec::Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&44100u32.to_le_bytes());
        out.extend_from_slice(&(44100 * 4).to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data_len as u32).to_le_bytes());
        for frame in frames {
            out.extend_from_slice(&frame[0].to_le_bytes());
            out.extend_from_slice(&frame[1].to_le_bytes());
        }
        out
    }

    fn leaked_wav(frames: &[[i16; 2]]) -> &'static [u8] {
        std::boxed::Box::leak(make_wav(frames).into_boxed_slice())
    }

    #[test]
    fn gain_law_respects_master_mute_solo_and_group_mute() {
        let platform = TestPlatform::new(false);
        let mixer = SoundMixer::new(SoundMixerLimits::default(), &platform);
        let music = mixer.add_group("music");
        let sfx = mixer.add_group("sfx");

        let bytes = leaked_wav(&[[1000, 1000]; 64]);
        let music_handle = mixer.play_one_shot("a", bytes, music).unwrap();
        let sfx_handle = mixer.play_one_shot("b", bytes, sfx).unwrap();

        assert_eq!(mixer.effective_gain(music_handle), 1.0);
        assert_eq!(mixer.effective_gain(sfx_handle), 1.0);

        mixer.set_group_flags(sfx, false, true); // solo sfx
        assert_eq!(mixer.effective_gain(music_handle), 0.0);
        assert_eq!(mixer.effective_gain(sfx_handle), 1.0);

        mixer.set_group_flags(sfx, false, false); // un-solo
        mixer.set_group_flags(music, true, false); // mute music directly
        assert_eq!(mixer.effective_gain(music_handle), 0.0);
        assert_eq!(mixer.effective_gain(sfx_handle), 1.0);

        mixer.set_group_flags(music, false, false);
        mixer.set_master_mute(true);
        assert_eq!(mixer.effective_gain(music_handle), 0.0);
        assert_eq!(mixer.effective_gain(sfx_handle), 0.0);
    }

    #[test]
    fn solo_is_exclusive_across_groups() {
        let platform = TestPlatform::new(false);
        let mixer = SoundMixer::new(SoundMixerLimits::default(), &platform);
        let a = mixer.add_group("a");
        let b = mixer.add_group("b");

        mixer.set_group_flags(a, false, true);
        mixer.set_group_flags(b, false, true);

        let bytes = leaked_wav(&[[500, 500]; 32]);
        let handle_a = mixer.play_one_shot("a-clip", bytes, a).unwrap();
        assert_eq!(mixer.effective_gain(handle_a), 0.0, "a should have lost solo to b");
    }

    #[test]
    fn one_shot_handle_is_destroyed_after_it_finishes_playing() {
        let platform = TestPlatform::new(false);
        let mixer = SoundMixer::new(SoundMixerLimits::default(), &platform);
        let group = mixer.add_group("sfx");
        let bytes = leaked_wav(&[[100, 100]; 4]);
        let handle = mixer.play_one_shot("short", bytes, group).unwrap();

        // Drain the clip (4 samples at pitch 1.0).
        mixer.seek(handle, 1.0);
        mixer.update();

        assert!(mixer.tell(handle).is_none(), "handle should have been destroyed");
    }

    #[test]
    fn fade_out_reaches_zero_and_stops() {
        let platform = TestPlatform::new(false);
        let mixer = SoundMixer::new(
            SoundMixerLimits {
                fps: 10.0,
                ..SoundMixerLimits::default()
            },
            &platform,
        );
        let group = mixer.add_group("music");
        let bytes = leaked_wav(&[[200, 200]; 1024]);
        let handle = mixer.play_streaming(bytes, group, false, 0, 0).unwrap();

        mixer.stop(handle, 500.0); // 5 frames at 10 fps
        for _ in 0..5 {
            mixer.update();
        }
        assert!(mixer.tell(handle).is_none(), "handle should be gone after the fade finishes");
    }

    #[test]
    fn pooled_one_shots_share_a_single_decode() {
        let platform = TestPlatform::new(false);
        let mixer = SoundMixer::new(SoundMixerLimits::default(), &platform);
        let group = mixer.add_group("sfx");
        let bytes = leaked_wav(&[[10, 10]; 16]);

        let first = mixer.play_one_shot("clip", bytes, group).unwrap();
        let second = mixer.play_one_shot("clip", bytes, group).unwrap();
        assert_ne!(first, second);
        assert_eq!(mixer.length(first), mixer.length(second));
    }

    #[test]
    fn exhausting_the_handle_table_fails_instead_of_growing_unbounded() {
        let platform = TestPlatform::new(false);
        let mixer = SoundMixer::new(
            SoundMixerLimits {
                max_handles: 2,
                ..SoundMixerLimits::default()
            },
            &platform,
        );
        let group = mixer.add_group("sfx");
        let bytes = leaked_wav(&[[10, 10]; 16]);

        mixer.play_one_shot("a", bytes, group).unwrap();
        mixer.play_one_shot("b", bytes, group).unwrap();
        assert!(matches!(
            mixer.play_one_shot("c", bytes, group),
            Err(PlaybackError::HandleTableFull)
        ));
    }

    #[test]
    fn pause_preserves_position_instead_of_restarting_on_resume() {
        let platform = TestPlatform::new(false);
        let mixer = SoundMixer::new(SoundMixerLimits::default(), &platform);
        let group = mixer.add_group("sfx");
        let bytes = leaked_wav(&[[10, 10]; 64]);
        let handle = mixer.play_one_shot("clip", bytes, group).unwrap();

        mixer.seek(handle, 0.5);
        let position = mixer.tell(handle).unwrap();
        assert!(position > 0.0);

        mixer.pause(handle);
        assert_eq!(position, mixer.tell(handle).unwrap(), "pause must not reposition the cursor");

        mixer.resume(handle);
        assert_eq!(
            position,
            mixer.tell(handle).unwrap(),
            "resume should continue from the paused position, not restart"
        );
    }
}
