//! Clock update.
//!
//! Advances [`WorldTime`](crate::resources::worldtime::WorldTime) once per
//! frame. Animators and the texture garbage collector read their
//! milliseconds from it, so run this before either.
use bevy_ecs::prelude::*;

use crate::resources::worldtime::WorldTime;

/// Advance the clock by `dt` seconds, scaled by `time_scale`.
pub fn update_world_time(world: &mut World, dt: f32) {
    let mut wt = world.resource_mut::<WorldTime>();
    let scaled_dt = dt * wt.time_scale;
    wt.elapsed += scaled_dt;
    wt.delta = scaled_dt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_delta_accumulates() {
        let mut world = World::new();
        world.insert_resource(WorldTime {
            time_scale: 0.5,
            ..Default::default()
        });
        update_world_time(&mut world, 1.0);
        update_world_time(&mut world, 1.0);
        let wt = world.resource::<WorldTime>();
        assert_eq!(wt.elapsed, 1.0);
        assert_eq!(wt.delta, 0.5);
        assert_eq!(wt.elapsed_millis(), 1000);
    }
}
