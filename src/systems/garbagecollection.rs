//! Texture garbage collection.
//!
//! Runs [`GraphicManager::garbage_collection`] against the GPU context
//! stored as a non-send resource of type `G`. The manager decides on its own
//! whether a pass is due (texture management enabled, enough resident
//! textures, pulse interval elapsed), so the system can run every frame.

use bevy_ecs::prelude::*;
use log::debug;

use crate::resources::gpu::GpuContext;
use crate::resources::graphicmanager::GraphicManager;
use crate::resources::worldtime::WorldTime;

pub fn sprite_garbage_collection<G: GpuContext + 'static>(
    mut manager: NonSendMut<GraphicManager>,
    mut gpu: NonSendMut<G>,
    time: Res<WorldTime>,
) {
    let released = manager.garbage_collection(time.elapsed_millis(), &mut *gpu);
    if released > 0 {
        debug!(
            "Released {} textures, {} still resident",
            released,
            manager.loaded_textures()
        );
    }
}
