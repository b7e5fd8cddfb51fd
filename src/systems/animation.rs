//! Per-entity sprite animation.
//!
//! Sprites share one animator per definition. Entities that carry their own
//! [`Animator`] (see `GraphicManager::instance_animator`) are advanced here
//! and the resulting frame is written to
//! [`SpriteInstance::animated_frame`], which the render pass prefers over the
//! shared animator.

use bevy_ecs::prelude::*;

use crate::components::animator::Animator;
use crate::components::spriteinstance::SpriteInstance;
use crate::resources::worldtime::WorldTime;

/// Advance entity animators and publish their frame.
pub fn sprite_instance_animation(
    mut query: Query<(&mut SpriteInstance, &mut Animator)>,
    time: Res<WorldTime>,
) {
    let now = time.elapsed_millis();
    for (mut instance, mut animator) in query.iter_mut() {
        let frame = animator.frame(now);
        if instance.animated_frame != Some(frame) {
            instance.animated_frame = Some(frame);
        }
    }
}
