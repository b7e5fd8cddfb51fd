//! Sprite loading, caching and drawing for a tile map editor.
//!
//! Sprite sheets are decoded on demand (optionally on a background thread),
//! sliced into per-sprite RGBA buffers, uploaded to the GPU through a
//! [`GpuContext`](resources::gpu::GpuContext) and released again by a
//! time-based garbage collector. Creature outfits are recoloured from a mask
//! template and cached per colour combination.

pub mod components;
pub mod events;
pub mod palette;
pub mod resources;
pub mod systems;
