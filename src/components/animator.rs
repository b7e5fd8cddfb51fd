//! Frame timing and playback state for animated sprites.
//!
//! An [`Animator`] owns one [`FrameDuration`] per frame and selects the frame
//! that should be visible at a given point of the editor clock (milliseconds,
//! see [`WorldTime::elapsed_millis`](crate::resources::worldtime::WorldTime::elapsed_millis)).
//!
//! # Playback
//!
//! - [`AnimationMode::Loop`] walks `0..frame_count` and wraps to 0.
//! - [`AnimationMode::PingPong`] walks forward to the last frame, then back to
//!   0. One loop is a forward sweep plus a backward sweep.
//! - A finite `loop_count` completes the animation once that many loops have
//!   been played; values below 1 (conventionally [`INFINITE_LOOPS`]) never
//!   complete.
//!
//! # Synchronous vs asynchronous
//!
//! Asynchronous animators keep their own duration counter and draw a random
//! duration per frame pass. Synchronous animators derive the frame purely from
//! the shared clock modulo the cycle length (using each frame's `max`), so
//! every instance of the same asset shows the same frame.
//!
//! The random source is an injected [`fastrand::Rng`]; seed it for
//! deterministic playback.

use bevy_ecs::prelude::Component;
use fastrand::Rng;
use smallvec::SmallVec;

/// Default duration of an item animation frame in milliseconds.
pub const ITEM_FRAME_DURATION: u32 = 500;
/// Loop count meaning "play forever".
pub const INFINITE_LOOPS: i32 = -1;
/// `set_frame` value that restarts an animation at frame 0.
pub const ASYNC_RESTART: usize = 255;
/// `set_frame` value that jumps to a random frame.
pub const RANDOM_FRAME: usize = 254;

const MAX_CATCH_UP_FRAMES: usize = 4096;

/// Inclusive millisecond range a single frame stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDuration {
    pub min: u32,
    pub max: u32,
}

impl FrameDuration {
    /// Create a duration range. `min` must not exceed `max`.
    pub fn new(min: u32, max: u32) -> Self {
        assert!(min <= max, "frame duration min {min} exceeds max {max}");
        Self { min, max }
    }

    /// Draw a duration for one pass through the frame.
    ///
    /// Degenerate ranges always return `min` without touching the rng.
    pub fn duration(&self, rng: &mut Rng) -> u32 {
        if self.min == self.max {
            return self.min;
        }
        rng.u32(self.min..=self.max)
    }

    /// Replace both bounds. `min` must not exceed `max`.
    pub fn set_values(&mut self, min: u32, max: u32) {
        assert!(min <= max, "frame duration min {min} exceeds max {max}");
        self.min = min;
        self.max = max;
    }
}

impl Default for FrameDuration {
    fn default() -> Self {
        Self::new(ITEM_FRAME_DURATION, ITEM_FRAME_DURATION)
    }
}

/// Direction of travel for ping-pong playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationDirection {
    #[default]
    Forward,
    Backward,
}

/// How the animator moves between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationMode {
    #[default]
    Loop,
    PingPong,
}

/// Per-frame timing and play-state machine.
///
/// Also usable as a component on placed sprites that animate independently
/// of their shared definition.
#[derive(Component, Debug, Clone)]
pub struct Animator {
    frame_count: usize,
    start_frame: Option<usize>,
    loop_count: i32,
    mode: AnimationMode,
    synchronous: bool,
    durations: SmallVec<[FrameDuration; 8]>,
    current_frame: usize,
    current_loop: u32,
    /// Milliseconds the current frame still has to run.
    current_duration: u64,
    total_duration: u64,
    direction: AnimationDirection,
    last_time: u64,
    started_at: u64,
    is_complete: bool,
    rng: Rng,
}

impl Animator {
    /// Create an animator positioned at its start frame at time 0.
    ///
    /// `start_frame = None` picks a random start frame on every reset.
    pub fn new(
        frame_count: usize,
        start_frame: Option<usize>,
        loop_count: i32,
        mode: AnimationMode,
        synchronous: bool,
        rng: Rng,
    ) -> Self {
        let frame_count = frame_count.max(1);
        let mut animator = Self {
            frame_count,
            start_frame: start_frame.map(|f| f.min(frame_count - 1)),
            loop_count,
            mode,
            synchronous,
            durations: (0..frame_count).map(|_| FrameDuration::default()).collect(),
            current_frame: 0,
            current_loop: 0,
            current_duration: 0,
            total_duration: 0,
            direction: AnimationDirection::Forward,
            last_time: 0,
            started_at: 0,
            is_complete: false,
            rng,
        };
        animator.reset(0);
        animator
    }

    /// A fresh asynchronous copy of this definition with its own random source.
    ///
    /// Used for placed sprites that must not stay in phase with the shared
    /// animator.
    pub fn instance(&self, rng: Rng, now: u64) -> Self {
        let mut copy = self.clone();
        copy.rng = rng;
        copy.synchronous = false;
        copy.reset(now);
        copy
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }

    pub fn mode(&self) -> AnimationMode {
        self.mode
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn direction(&self) -> AnimationDirection {
        self.direction
    }

    /// Frame shown after the last call to [`frame`](Self::frame) or
    /// [`set_frame`](Self::set_frame).
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Length of one full cycle in milliseconds, using each frame's `max`.
    pub fn total_duration(&self) -> u64 {
        self.total_duration
    }

    /// Resolve the start frame, drawing a random one when none is configured.
    pub fn start_frame(&mut self) -> usize {
        match self.start_frame {
            Some(frame) => frame,
            None => self.rng.usize(0..self.frame_count),
        }
    }

    pub fn frame_duration(&self, frame: usize) -> Option<&FrameDuration> {
        self.durations.get(frame)
    }

    /// Set the duration range of one frame.
    ///
    /// Returns false and leaves the animator untouched if the frame is out of
    /// range or `min > max`.
    pub fn set_frame_duration(&mut self, frame: usize, min: u32, max: u32) -> bool {
        if min > max {
            return false;
        }
        let Some(duration) = self.durations.get_mut(frame) else {
            return false;
        };
        duration.set_values(min, max);
        self.total_duration = self.compute_total_duration();
        true
    }

    /// Draw a duration for `frame`; frames out of range last 0 ms.
    pub fn duration(&mut self, frame: usize) -> u32 {
        match self.durations.get(frame) {
            Some(d) => d.duration(&mut self.rng),
            None => 0,
        }
    }

    /// Advance to `now` and return the frame that should be visible.
    pub fn frame(&mut self, now: u64) -> usize {
        if self.is_complete || now == self.last_time {
            return self.current_frame;
        }
        if self.synchronous {
            self.calculate_synchronous(now);
            return self.current_frame;
        }

        let mut elapsed = now.saturating_sub(self.last_time);
        self.last_time = now;
        if elapsed < self.current_duration {
            self.current_duration -= elapsed;
            return self.current_frame;
        }

        elapsed -= self.current_duration;
        if self.is_infinite() && self.total_duration > 0 {
            elapsed %= self.total_duration;
        }

        for _ in 0..MAX_CATCH_UP_FRAMES {
            match self.next_frame() {
                Some(next) => {
                    self.current_frame = next;
                    let duration = u64::from(self.duration(next));
                    if elapsed < duration {
                        self.current_duration = duration - elapsed;
                        return self.current_frame;
                    }
                    elapsed -= duration;
                }
                None => {
                    self.is_complete = true;
                    self.current_duration = 0;
                    return self.current_frame;
                }
            }
        }
        self.current_duration = 0;
        self.current_frame
    }

    /// Force a frame, bypassing the timer.
    ///
    /// [`ASYNC_RESTART`] restarts at frame 0, [`RANDOM_FRAME`] jumps to a
    /// random frame and any other out-of-range value falls back to the start
    /// frame. Synchronous animators pick up the shared clock again on the next
    /// [`frame`](Self::frame) call.
    pub fn set_frame(&mut self, frame: usize, now: u64) {
        let frame = match frame {
            ASYNC_RESTART => 0,
            RANDOM_FRAME => self.rng.usize(0..self.frame_count),
            f if f < self.frame_count => f,
            _ => self.start_frame(),
        };
        self.current_frame = frame;
        self.current_duration = u64::from(self.duration(frame));
        self.current_loop = 0;
        self.is_complete = false;
        self.last_time = now;
    }

    /// Return to the start frame and clear loop and completion state.
    pub fn reset(&mut self, now: u64) {
        self.total_duration = self.compute_total_duration();
        self.is_complete = false;
        self.direction = AnimationDirection::Forward;
        self.current_loop = 0;
        self.started_at = now;
        let start = self.start_frame();
        self.current_frame = start;
        self.current_duration = u64::from(self.duration(start));
        self.last_time = now;
        if self.synchronous {
            self.calculate_synchronous(now);
        }
    }

    fn is_infinite(&self) -> bool {
        self.loop_count < 1
    }

    /// Frames of one cycle paired with the direction they are played in.
    fn cycle(&self) -> impl Iterator<Item = (usize, AnimationDirection)> + use<> {
        let forward = (0..self.frame_count).map(|f| (f, AnimationDirection::Forward));
        let backward_len = match self.mode {
            AnimationMode::PingPong if self.frame_count > 2 => self.frame_count - 2,
            _ => 0,
        };
        let backward = (1..=backward_len)
            .rev()
            .map(|f| (f, AnimationDirection::Backward));
        forward.chain(backward)
    }

    fn compute_total_duration(&self) -> u64 {
        self.cycle()
            .map(|(frame, _)| u64::from(self.durations[frame].max))
            .sum()
    }

    fn final_frame(&self) -> usize {
        match self.mode {
            AnimationMode::Loop => self.frame_count - 1,
            AnimationMode::PingPong => 0,
        }
    }

    /// Count a finished loop; true if playback continues.
    fn finish_loop(&mut self) -> bool {
        self.current_loop = self.current_loop.saturating_add(1);
        self.is_infinite() || i64::from(self.current_loop) < i64::from(self.loop_count)
    }

    fn next_frame(&mut self) -> Option<usize> {
        let last = self.frame_count - 1;
        match self.mode {
            AnimationMode::Loop => {
                if self.current_frame < last {
                    return Some(self.current_frame + 1);
                }
                self.finish_loop().then_some(0)
            }
            AnimationMode::PingPong => {
                if last == 0 {
                    return self.finish_loop().then_some(0);
                }
                match self.direction {
                    AnimationDirection::Forward => {
                        if self.current_frame < last {
                            Some(self.current_frame + 1)
                        } else {
                            self.direction = AnimationDirection::Backward;
                            Some(last - 1)
                        }
                    }
                    AnimationDirection::Backward => {
                        if self.current_frame > 0 {
                            Some(self.current_frame - 1)
                        } else if self.finish_loop() {
                            self.direction = AnimationDirection::Forward;
                            Some(1)
                        } else {
                            None
                        }
                    }
                }
            }
        }
    }

    fn calculate_synchronous(&mut self, now: u64) {
        self.last_time = now;
        if self.total_duration == 0 {
            return;
        }
        if !self.is_infinite() {
            let cycles = now.saturating_sub(self.started_at) / self.total_duration;
            if cycles >= self.loop_count as u64 {
                self.current_frame = self.final_frame();
                self.current_duration = 0;
                self.is_complete = true;
                return;
            }
        }

        let mut phase = now % self.total_duration;
        let mut found = None;
        for (frame, direction) in self.cycle() {
            let duration = u64::from(self.durations[frame].max);
            if phase < duration {
                found = Some((frame, direction, duration - phase));
                break;
            }
            phase -= duration;
        }
        if let Some((frame, direction, remaining)) = found {
            self.current_frame = frame;
            self.direction = direction;
            self.current_duration = remaining;
        }
    }
}
