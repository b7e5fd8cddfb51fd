//! Systems.
//!
//! - [`animation`]: advance per-entity animators
//! - [`garbagecollection`]: release idle textures
//! - [`render`]: draw placed sprites and creatures
//! - [`sheetloader`]: background sheet decoding and its polling system
//! - [`time`]: advance the editor clock

pub mod animation;
pub mod garbagecollection;
pub mod render;
pub mod sheetloader;
pub mod time;
