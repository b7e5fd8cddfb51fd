//! Sprite render pass.

use bevy_ecs::prelude::*;

use crate::components::outfit::{Direction, Outfit};
use crate::components::spriteinstance::SpriteInstance;
use crate::resources::gpu::{DrawSurface, GpuContext};
use crate::resources::graphicmanager::GraphicManager;
use crate::resources::worldtime::WorldTime;

/// Draw every [`SpriteInstance`] onto `surface`, lowest `z` first.
///
/// Entities with an [`Outfit`] are drawn as creatures facing their
/// [`Direction`] (south when absent). Textures missing from `gpu` are
/// uploaded on the way. Returns the number of instances actually drawn;
/// instances whose sprite is not registered are skipped.
pub fn render_sprite_instances(
    world: &mut World,
    surface: &mut dyn DrawSurface,
    gpu: &mut dyn GpuContext,
) -> usize {
    let now = world
        .get_resource::<WorldTime>()
        .map_or(0, |t| t.elapsed_millis());

    // Collect, sort by z, then draw.
    let mut to_draw: Vec<(SpriteInstance, Option<Outfit>, Direction)> = {
        let mut q = world.query::<(&SpriteInstance, Option<&Outfit>, Option<&Direction>)>();
        q.iter(world)
            .map(|(s, o, d)| (*s, o.copied(), d.copied().unwrap_or_default()))
            .collect()
    };
    to_draw.sort_by_key(|(s, _, _)| s.z);

    let Some(mut manager) = world.get_non_send_resource_mut::<GraphicManager>() else {
        return 0;
    };
    let mut drawn = 0;
    for (instance, outfit, direction) in &to_draw {
        let ok = match outfit {
            Some(outfit) => manager.draw_creature(
                outfit,
                *direction,
                surface,
                instance.size,
                instance.x,
                instance.y,
                instance.frame(),
                now,
                gpu,
            ),
            None => manager.draw_sprite_frame(
                instance.sprite_id,
                surface,
                instance.size,
                instance.x,
                instance.y,
                None,
                None,
                instance.frame(),
                now,
                gpu,
            ),
        };
        if ok {
            drawn += 1;
        }
    }
    drawn
}
