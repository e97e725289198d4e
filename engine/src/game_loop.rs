// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Fixed-timestep scheduler with frame skip, slow motion, and pause.
//!
//! Grounded on `KLoop`/`KLoopCallback`: an app clock that never stops while
//! the loop runs, and a game clock that stops while paused and advances only
//! every `slow_motion_interval`th frame during slow motion. `GameLoop::step`
//! is a single iteration of `KLoop::stepFrame`, meant to be called once per
//! host frame (e.g. from inside [`platform::EngineCallbacks::run_frame`]);
//! [`GameLoop::run`] additionally drives the loop to completion for hosts
//! that don't already pace calls externally (vsync, event pump, …).

use core::ops::ControlFlow;
use core::time::Duration;

use platform::{Instant, Platform};

/// Per-frame hooks driven by [`GameLoop`]. All methods default to a no-op (or
/// `true`, for the two predicates), matching `KLoopCallback`'s
/// virtuals-with-defaults.
pub trait GameLoopCallbacks {
    /// Called at the top of every iteration. Returning false stops the loop.
    fn on_loop_top(&mut self) -> bool {
        true
    }
    /// Called after [`GameLoopCallbacks::on_loop_top`]. Returning false skips
    /// the rest of this iteration (no frame-start/update/render/frame-end),
    /// but the loop keeps running.
    fn on_loop_can_update(&mut self) -> bool {
        true
    }
    /// Called once per iteration that passes both predicates above.
    fn on_loop_frame_start(&mut self) {}
    /// Called when this iteration's game clock advances.
    fn on_loop_update(&mut self) {}
    /// Called when this iteration is due to render (see [`GameLoop::step`]'s
    /// frame-skip accounting).
    fn on_loop_render(&mut self) {}
    /// Called once per iteration that passed both predicates, after update
    /// and render.
    fn on_loop_frame_end(&mut self) {}
}

/// Scheduling state for a fixed-timestep loop. See spec component 4.J.
pub struct GameLoop {
    app_clock: u64,
    game_clock: u64,
    fps_target: u32,
    fps_observed_update: u32,
    fps_observed_render: u32,
    num_update_this_second: u32,
    num_render_this_second: u32,
    num_skips: u32,
    max_skip_frames: u32,
    max_skip_msec: u32,
    slow_motion_timer: u32,
    slow_motion_interval: u32,
    paused: bool,
    step_once: bool,
    last_render: Instant,
    fps_sample_start: Instant,
}

impl GameLoop {
    /// Creates a loop targeting `fps_target` frames per second, with frame
    /// skipping disabled (`max_skip_frames = 0`, `max_skip_msec = 0`) until
    /// configured with [`GameLoop::set_frame_skips`].
    pub fn new(platform: &dyn Platform, fps_target: u32) -> GameLoop {
        let now = platform.now();
        GameLoop {
            app_clock: 0,
            game_clock: 0,
            fps_target: fps_target.max(1),
            fps_observed_update: 0,
            fps_observed_render: 0,
            num_update_this_second: 0,
            num_render_this_second: 0,
            num_skips: 0,
            max_skip_frames: 0,
            max_skip_msec: 0,
            slow_motion_timer: 0,
            slow_motion_interval: 2,
            paused: false,
            step_once: false,
            last_render: now,
            fps_sample_start: now,
        }
    }

    /// Runs one iteration: the top/can-update predicates, clock advancement,
    /// the conditional update and render calls, and frame-end bookkeeping.
    /// Returns [`ControlFlow::Break`] when [`GameLoopCallbacks::on_loop_top`]
    /// asks the loop to stop.
    pub fn step(
        &mut self,
        platform: &dyn Platform,
        callbacks: &mut dyn GameLoopCallbacks,
    ) -> ControlFlow<()> {
        if !callbacks.on_loop_top() {
            return ControlFlow::Break(());
        }
        if !callbacks.on_loop_can_update() {
            return ControlFlow::Continue(());
        }

        self.app_clock += 1;
        callbacks.on_loop_frame_start();

        let mut update_this_frame = !self.paused;
        if update_this_frame && self.slow_motion_timer > 0 {
            update_this_frame = self.slow_motion_timer % self.slow_motion_interval == 0;
            self.slow_motion_timer -= 1;
        }

        if update_this_frame {
            self.game_clock += 1;
            if self.step_once {
                self.step_once = false;
                self.paused = true;
            }
            callbacks.on_loop_update();
            self.num_update_this_second += 1;
        }

        let now = platform.now();
        if self.should_render(now) {
            callbacks.on_loop_render();
            self.num_render_this_second += 1;
        }

        callbacks.on_loop_frame_end();
        self.sample_fps(now);

        ControlFlow::Continue(())
    }

    /// Drives [`GameLoop::step`] until it breaks, sleeping between
    /// iterations to hold `fps_target` via `wait_msec`. Intended for hosts
    /// that don't already pace `step` calls externally (a vsync'd present,
    /// an event pump); `platform-sdl2` calls [`GameLoop::step`] directly
    /// instead, once per vsync.
    pub fn run(
        &mut self,
        platform: &dyn Platform,
        callbacks: &mut dyn GameLoopCallbacks,
        mut wait_msec: impl FnMut(u32),
    ) {
        let frame_period = Duration::from_millis(1000 / self.fps_target as u64);
        // Tolerance for "the next deadline is implausibly far in the
        // future", i.e. the clock jumped backwards or the loop was
        // suspended for a while: rather than try to catch up, the deadline
        // is reset relative to now.
        let skew_tolerance = Duration::from_millis(500);
        let mut next_deadline = platform.now() + frame_period;

        loop {
            if self.step(platform, callbacks).is_break() {
                return;
            }

            let now = platform.now();
            let too_far_future = now + skew_tolerance < next_deadline;
            let already_late = next_deadline + frame_period < now;
            if too_far_future || already_late {
                next_deadline = now + frame_period;
                continue;
            }
            if next_deadline <= now {
                next_deadline = next_deadline + frame_period;
                continue;
            }
            let remaining = next_deadline.duration_since(now).unwrap_or_default();
            let remaining_msec = remaining.as_millis().min(u32::MAX as u128) as u32;
            if remaining_msec > 0 {
                wait_msec(remaining_msec);
            }
            next_deadline = next_deadline + frame_period;
        }
    }

    /// Decides whether to render this frame, tracking consecutive skips.
    ///
    /// Render happens unless all of: the time since the last render is
    /// within this frame's formal budget (`1000 * updates-this-second /
    /// fps_target`), the consecutive skip count hasn't hit
    /// `max_skip_frames`, and the time since the last render hasn't hit
    /// `max_skip_msec`.
    fn should_render(&mut self, now: Instant) -> bool {
        let msec_formal = 1000 * self.num_update_this_second / self.fps_target;
        let msec_since_last_render = now
            .duration_since(self.last_render)
            .map(|d| d.as_millis().min(u32::MAX as u128) as u32)
            .unwrap_or(0);

        let within_budget = msec_since_last_render <= msec_formal;
        let under_skip_cap = self.num_skips < self.max_skip_frames;
        let under_skip_timeout = msec_since_last_render < self.max_skip_msec;

        if within_budget && under_skip_cap && under_skip_timeout {
            self.num_skips += 1;
            return false;
        }

        self.num_skips = 0;
        self.last_render = now;
        true
    }

    fn sample_fps(&mut self, now: Instant) {
        if let Some(elapsed) = now.duration_since(self.fps_sample_start) {
            if elapsed.as_millis() >= 1000 {
                self.fps_observed_update = self.num_update_this_second;
                self.fps_observed_render = self.num_render_this_second;
                self.num_update_this_second = 0;
                self.num_render_this_second = 0;
                self.fps_sample_start = now;
            }
        }
    }

    /// Sets the consecutive-skip and time-since-last-render caps beyond
    /// which a frame is always rendered.
    pub fn set_frame_skips(&mut self, max_skip_frames: u32, max_skip_msec: u32) {
        self.max_skip_frames = max_skip_frames;
        self.max_skip_msec = max_skip_msec;
    }

    /// Sets the target frame rate. Takes effect on the next call to
    /// [`GameLoop::step`]/[`GameLoop::run`].
    pub fn set_fps_target(&mut self, fps_target: u32) {
        self.fps_target = fps_target.max(1);
    }

    /// Enables forced slow motion: the game clock advances only on every
    /// `interval`th app frame, for `duration` such slow frames. `interval`
    /// below 2 is ignored (no slow motion change); `duration` of 0 leaves
    /// any already-scheduled slow motion alone.
    pub fn set_slow_motion(&mut self, interval: u32, duration: u32) {
        if interval >= 2 {
            self.slow_motion_interval = interval;
        }
        if duration > 0 {
            self.slow_motion_timer = duration * self.slow_motion_interval;
        }
    }

    /// Freezes the game clock; the app clock and rendering continue.
    pub fn pause(&mut self) {
        self.step_once = false;
        self.paused = true;
    }

    /// Resumes the game clock.
    pub fn play(&mut self) {
        self.step_once = false;
        self.paused = false;
    }

    /// Allows exactly one more update tick, then re-pauses. If not currently
    /// paused, pauses instead (matching `KLoop::playStep`).
    pub fn play_step(&mut self) {
        if self.paused {
            self.paused = false;
            self.step_once = true;
        } else {
            self.pause();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn app_frames(&self) -> u64 {
        self.app_clock
    }

    pub fn game_frames(&self) -> u64 {
        self.game_clock
    }

    pub fn app_time_seconds(&self) -> f32 {
        self.app_clock as f32 / self.fps_target as f32
    }

    pub fn game_time_seconds(&self) -> f32 {
        self.game_clock as f32 / self.fps_target as f32
    }

    /// Returns `(fps_target, observed update fps, observed render fps)`,
    /// the latter two sampled once per second of wall time.
    pub fn fps(&self) -> (u32, u32, u32) {
        (self.fps_target, self.fps_observed_update, self.fps_observed_render)
    }
}

#[cfg(test)]
mod tests {
    use super::{GameLoop, GameLoopCallbacks};
    use crate::test_platform::TestPlatform;

    #[derive(Default)]
    struct CountingCallbacks {
        updates: u32,
        renders: u32,
    }

    impl GameLoopCallbacks for CountingCallbacks {
        fn on_loop_update(&mut self) {
            self.updates += 1;
        }
        fn on_loop_render(&mut self) {
            self.renders += 1;
        }
    }

    #[test]
    fn app_clock_always_advances_game_clock_only_when_unpaused() {
        let platform = TestPlatform::new(false);
        let mut loop_ = GameLoop::new(&platform, 60);
        let mut callbacks = CountingCallbacks::default();

        for _ in 0..5 {
            loop_.step(&platform, &mut callbacks);
        }
        assert_eq!(5, loop_.app_frames());
        assert_eq!(5, loop_.game_frames());

        loop_.pause();
        for _ in 0..3 {
            loop_.step(&platform, &mut callbacks);
        }
        assert_eq!(8, loop_.app_frames());
        assert_eq!(5, loop_.game_frames());
    }

    #[test]
    fn play_step_advances_exactly_one_tick_then_repauses() {
        let platform = TestPlatform::new(false);
        let mut loop_ = GameLoop::new(&platform, 60);
        let mut callbacks = CountingCallbacks::default();

        loop_.pause();
        loop_.play_step();
        loop_.step(&platform, &mut callbacks);
        assert_eq!(1, loop_.game_frames());
        assert!(loop_.is_paused());

        loop_.step(&platform, &mut callbacks);
        assert_eq!(1, loop_.game_frames());
    }

    #[test]
    fn slow_motion_divides_game_clock_advancement() {
        let platform = TestPlatform::new(false);
        let mut loop_ = GameLoop::new(&platform, 60);
        let mut callbacks = CountingCallbacks::default();

        loop_.set_slow_motion(3, 9);
        for _ in 0..9 {
            loop_.step(&platform, &mut callbacks);
        }

        assert_eq!(9, loop_.app_frames());
        assert_eq!(3, loop_.game_frames());
    }

    #[test]
    fn on_loop_top_false_stops_the_loop() {
        struct StopAfterTwo {
            frames: u32,
        }
        impl GameLoopCallbacks for StopAfterTwo {
            fn on_loop_top(&mut self) -> bool {
                self.frames < 2
            }
            fn on_loop_frame_start(&mut self) {
                self.frames += 1;
            }
        }

        let platform = TestPlatform::new(false);
        let mut loop_ = GameLoop::new(&platform, 60);
        let mut callbacks = StopAfterTwo { frames: 0 };

        let mut waits = 0;
        loop_.run(&platform, &mut callbacks, |_| waits += 1);
        assert_eq!(2, callbacks.frames);
        let _ = waits;
    }
}
