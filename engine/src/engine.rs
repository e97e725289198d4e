// SPDX-FileCopyrightText: 2024 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use core::ops::ControlFlow;

use arrayvec::ArrayVec;
use platform::{thread_pool::ThreadPool, EngineCallbacks, Event, Instant, Platform};

use crate::{
    allocators::LinearAllocator,
    assets::{AssetLoader, EmbeddedProvider, Provider},
    input::{EventQueue, QueuedEvent},
    multithreading,
    renderer::DrawQueue,
};

#[cfg(feature = "audio")]
use crate::audio::{SoundMixer, SoundMixerLimits};

/// Parameters affecting the memory usage of the engine, used in
/// [`Engine::new`].
///
/// Note that while this does cover most persistent memory allocations made by
/// the engine during initialization, it doesn't (currently) cover everything.
/// For example, the memory required for loaded assets is entirely dependent
/// on what the game loads at runtime.
#[derive(Clone, Copy)]
pub struct EngineLimits {
    /// The size of the frame arena allocator, in bytes. The frame arena is
    /// used for per-frame memory allocations in rendering and other
    /// game-specific uses.
    ///
    /// Defaults to 8 MiB (`8 * 1024 * 1024`).
    pub frame_arena_size: usize,
    /// The maximum amount of quads [`DrawQueue`] can hold in a single frame.
    ///
    /// Defaults to 100,000.
    pub max_draw_quads: usize,
    /// Limits for the [`SoundMixer`], gated behind the `audio` feature.
    ///
    /// Defaults to [`SoundMixerLimits::DEFAULT`].
    #[cfg(feature = "audio")]
    pub audio: SoundMixerLimits,
}

impl EngineLimits {
    /// The default configuration for the engine, used in its unit tests.
    pub const DEFAULT: EngineLimits = EngineLimits {
        frame_arena_size: 8 * 1024 * 1024,
        max_draw_quads: 100_000,
        #[cfg(feature = "audio")]
        audio: SoundMixerLimits::DEFAULT,
    };
}

impl Default for EngineLimits {
    fn default() -> Self {
        EngineLimits::DEFAULT
    }
}

/// The top-level structure of the game engine which owns all the runtime
/// state of the game engine and has methods for running the engine.
pub struct Engine<'a> {
    /// Linear allocator for any frame-internal dynamic allocation needs.
    frame_arena: LinearAllocator<'a>,
    /// Thread pool for splitting compute-heavy workloads to multiple threads.
    thread_pool: ThreadPool,
    /// Asset names baked into the binary at compile time. The fallback tried
    /// last by [`Engine::asset_loader`], behind whatever providers the game
    /// passes in for that call.
    embedded_assets: EmbeddedProvider,
    /// Mixer for playing back audio, gated the same way the rest of the
    /// `audio` subsystem is.
    #[cfg(feature = "audio")]
    audio_mixer: SoundMixer,
    /// Queued up events from the platform layer. Discarded after being used by
    /// the game to trigger an action, or after a timeout if not.
    event_queue: EventQueue,
    /// How many quads [`DrawQueue`] can hold in a single frame.
    max_draw_quads: usize,
}

impl Engine<'_> {
    /// Creates a new instance of the engine.
    ///
    /// - `platform`: the platform implementation to be used for this instance
    ///   of the engine.
    /// - `arena`: an arena for all the persistent memory the engine requires.
    /// - `limits`: defines the limits for the various subsystems of the
    ///   engine, for dialing in the appropriate tradeoffs between memory usage
    ///   and game requirements.
    /// - `embedded_assets`: a `(name, bytes)` table of assets baked into the
    ///   binary, e.g. via `include_bytes!`. Resolved by [`Engine::asset_loader`]
    ///   behind whatever providers the game supplies for that call.
    pub fn new(
        platform: &dyn Platform,
        arena: &'static LinearAllocator,
        limits: EngineLimits,
        embedded_assets: &'static [(&'static str, &'static [u8])],
    ) -> Self {
        let thread_pool = multithreading::create_thread_pool(arena, platform, 1)
            .expect("engine arena should have enough memory for the thread pool");

        let frame_arena = LinearAllocator::new(arena, limits.frame_arena_size)
            .expect("should have enough memory for the frame arena");

        #[cfg(feature = "audio")]
        let audio_mixer = SoundMixer::new(limits.audio, platform);

        Engine {
            frame_arena,
            thread_pool,
            embedded_assets: EmbeddedProvider::new(embedded_assets),
            #[cfg(feature = "audio")]
            audio_mixer,
            event_queue: ArrayVec::new(),
            max_draw_quads: limits.max_draw_quads,
        }
    }

    /// Builds an [`AssetLoader`] chaining `game_providers` (in order) ahead of
    /// the engine's own compiled-in [`EmbeddedProvider`], so a game's
    /// directory or zip-pack providers take priority over it.
    pub fn asset_loader<'e>(&'e self, game_providers: &[&'e dyn Provider]) -> AssetLoader<'e> {
        let mut loader = AssetLoader::new();
        for provider in game_providers {
            loader.add_provider(*provider);
        }
        loader.add_provider(&self.embedded_assets as &dyn Provider);
        loader
    }

    /// The mixer used to play back audio. See spec component 4.G.
    #[cfg(feature = "audio")]
    pub fn audio_mixer(&self) -> &SoundMixer {
        &self.audio_mixer
    }

    /// The thread pool used for splitting up compute-heavy per-frame work,
    /// e.g. [`crate::multithreading::parallelize`].
    pub fn thread_pool(&mut self) -> &mut ThreadPool {
        &mut self.thread_pool
    }
}

impl EngineCallbacks for Engine<'_> {
    type InitParams = ();
    type Arena = ();

    fn init(&mut self, _params: (), _arena: &mut ()) {}

    fn run_frame(&mut self, platform: &dyn Platform) -> ControlFlow<Option<()>> {
        let timestamp = platform.now();
        self.frame_arena.reset();

        let scale_factor = platform.draw_scale_factor();
        let mut draw_queue =
            DrawQueue::new(&self.frame_arena, self.max_draw_quads, scale_factor).unwrap();

        #[cfg(feature = "audio")]
        self.audio_mixer.update();

        // The rest of a frame's work (stepping game state, queuing sprites
        // into `draw_queue`) is up to the game using this engine; this is
        // just the plumbing that has to run every frame regardless.

        let timestamp = timestamp
            .duration_since(Instant::reference())
            .unwrap_or_default();
        self.event_queue.retain(|queued| !queued.timed_out(timestamp));

        draw_queue.dispatch_draw(&self.frame_arena, platform);

        ControlFlow::Continue(())
    }

    fn event(&mut self, event: Event, timestamp: Instant) {
        match event {
            Event::DigitalInputPressed(..) | Event::DigitalInputReleased(..) => {
                self.event_queue.push(QueuedEvent {
                    event,
                    timestamp: timestamp
                        .duration_since(Instant::reference())
                        .unwrap_or_default(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use platform::{ActionCategory, EngineCallbacks, Event, Platform};

    use crate::{
        allocators::LinearAllocator,
        input::{ActionKind, ActionState, InputDeviceState},
        static_allocator,
        test_platform::TestPlatform,
    };

    use super::{Engine, EngineLimits};

    #[repr(usize)]
    enum TestAction {
        Act,
        _Count,
    }

    /// Initializes the engine and simulates 4 seconds of running the engine,
    /// with a burst of mashing the "ActPrimary" button in the middle, driving
    /// a sound through the mixer whenever the action is pressed.
    fn run_smoke_test(platform: &TestPlatform, persistent_arena: &'static LinearAllocator) {
        let device = platform.input_devices()[0];
        let button = platform
            .default_button_for_action(ActionCategory::ActPrimary, device)
            .unwrap();

        let mut engine = Engine::new(platform, persistent_arena, EngineLimits::DEFAULT, &[]);

        let mut input = InputDeviceState {
            device,
            actions: [ActionState {
                kind: ActionKind::Instant,
                mapping: Some(button),
                disabled: false,
                pressed: false,
            }],
        };

        #[cfg(feature = "audio")]
        let sfx_group = engine.audio_mixer().add_group("sfx");

        let fps = 10;
        for current_frame in 0..(4 * fps) {
            platform.set_elapsed_millis(current_frame * 1000 / fps);

            if 2 * fps < current_frame && current_frame < 3 * fps {
                // every three frames, either press down or release the button
                if current_frame % 3 == 0 {
                    engine.event(
                        if current_frame % 2 == 0 {
                            Event::DigitalInputPressed(device, button)
                        } else {
                            Event::DigitalInputReleased(device, button)
                        },
                        platform.now(),
                    );
                }
            }

            input.update(&mut engine.event_queue);
            #[cfg(feature = "audio")]
            if input.actions[TestAction::Act as usize].pressed {
                let _ = engine
                    .audio_mixer()
                    .play_one_shot("beep.wav", short_beep(), sfx_group);
            }
            #[cfg(not(feature = "audio"))]
            let _ = input.actions[TestAction::Act as usize].pressed;

            engine.run_frame(platform);
        }
    }

    #[cfg(feature = "audio")]
    fn short_beep() -> &'static [u8] {
        // A minimal valid mono 16-bit PCM WAV file, built once and leaked for
        // the `'static` lifetime `SoundMixer::play_one_shot` requires.
        fn make_wav(frames: &[i16]) -> std::vec::Vec<u8> {
            let data_len = frames.len() * 2;
            let mut out = std::vec::Vec::new();
            out.extend_from_slice(b"RIFF");
            out.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
            out.extend_from_slice(b"WAVE");
            out.extend_from_slice(b"fmt ");
            out.extend_from_slice(&16u32.to_le_bytes());
            out.extend_from_slice(&1u16.to_le_bytes());
            out.extend_from_slice(&1u16.to_le_bytes());
            out.extend_from_slice(&44100u32.to_le_bytes());
            out.extend_from_slice(&(44100 * 2).to_le_bytes());
            out.extend_from_slice(&2u16.to_le_bytes());
            out.extend_from_slice(&16u16.to_le_bytes());
            out.extend_from_slice(b"data");
            out.extend_from_slice(&(data_len as u32).to_le_bytes());
            for frame in frames {
                out.extend_from_slice(&frame.to_le_bytes());
            }
            out
        }
        let frames: std::vec::Vec<i16> = (0..256).map(|i| i as i16).collect();
        std::boxed::Box::leak(make_wav(&frames).into_boxed_slice())
    }

    #[test]
    #[cfg(not(target_os = "emscripten"))]
    fn smoke_test_multithreaded() {
        static PERSISTENT_ARENA: &LinearAllocator = static_allocator!(64 * 1024 * 1024);
        run_smoke_test(&TestPlatform::new(true), PERSISTENT_ARENA);
    }

    #[test]
    #[ignore = "the emscripten target doesn't support multithreading"]
    #[cfg(target_os = "emscripten")]
    fn smoke_test_multithreaded() {}

    #[test]
    fn smoke_test_singlethreaded() {
        static PERSISTENT_ARENA: &LinearAllocator = static_allocator!(64 * 1024 * 1024);
        run_smoke_test(&TestPlatform::new(false), PERSISTENT_ARENA);
    }
}
