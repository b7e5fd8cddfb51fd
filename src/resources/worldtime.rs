//! Process-wide editor clock.
//!
//! Animation phase and texture garbage collection both read the elapsed time
//! in milliseconds from this resource.
use bevy_ecs::prelude::Resource;

#[derive(Resource, Clone, Copy, Debug)]
pub struct WorldTime {
    pub elapsed: f32,
    pub delta: f32,
    pub time_scale: f32,
}

impl Default for WorldTime {
    fn default() -> Self {
        WorldTime {
            elapsed: 0.0,
            delta: 0.0,
            time_scale: 1.0,
        }
    }
}

impl WorldTime {
    /// Elapsed time in whole milliseconds.
    pub fn elapsed_millis(&self) -> u64 {
        (self.elapsed.max(0.0) as f64 * 1000.0) as u64
    }
}
