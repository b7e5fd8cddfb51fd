//! ECS components.
//!
//! - [`animator`]: frame timing for animated sprites.
//! - [`outfit`]: creature look type, colours and facing.
//! - [`spriteinstance`]: a sprite placed on the map.

pub mod animator;
pub mod outfit;
pub mod spriteinstance;
