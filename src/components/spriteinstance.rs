//! A sprite placed on the map.
//!
//! Entities carrying a [`SpriteInstance`] are drawn by
//! [`render_sprite_instances`](crate::systems::render::render_sprite_instances).
//! Creatures add an [`Outfit`](crate::components::outfit::Outfit) and a
//! [`Direction`](crate::components::outfit::Direction); entities that should
//! animate out of phase with the shared sprite animator add an
//! [`Animator`](crate::components::animator::Animator) obtained from
//! `GraphicManager::instance_animator`.

use bevy_ecs::prelude::Component;

use crate::resources::gpu::SpriteSize;

/// Placement of a sprite. Higher `z` draws later.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteInstance {
    /// Item id, outfit look type for creatures, or a negative editor id.
    pub sprite_id: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub size: SpriteSize,
    /// Pins the frame regardless of animation.
    pub forced_frame: Option<usize>,
    /// Written by the per-entity animation system.
    pub animated_frame: Option<usize>,
}

impl SpriteInstance {
    pub fn new(sprite_id: i32, x: i32, y: i32, size: SpriteSize) -> Self {
        Self {
            sprite_id,
            x,
            y,
            z: 0,
            size,
            forced_frame: None,
            animated_frame: None,
        }
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    pub fn with_frame(mut self, frame: usize) -> Self {
        self.forced_frame = Some(frame);
        self
    }

    /// Frame to draw: forced first, then the entity's own animation.
    /// `None` defers to the sprite's shared animator.
    pub fn frame(&self) -> Option<usize> {
        self.forced_frame.or(self.animated_frame)
    }
}
