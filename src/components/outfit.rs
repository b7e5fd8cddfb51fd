//! Creature appearance: look type, colour recipe and facing.

use bevy_ecs::prelude::Component;

/// Look type plus the four palette indices used to recolour an outfit
/// template.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Outfit {
    pub look_type: u16,
    pub head: u8,
    pub body: u8,
    pub legs: u8,
    pub feet: u8,
}

impl Outfit {
    pub fn new(look_type: u16, head: u8, body: u8, legs: u8, feet: u8) -> Self {
        Self {
            look_type,
            head,
            body,
            legs,
            feet,
        }
    }

    /// The four colour channels packed into one key.
    pub fn color_hash(&self) -> u32 {
        u32::from_be_bytes([self.head, self.body, self.legs, self.feet])
    }
}

/// Facing of a creature; selects the `pattern_x` column of its sprite.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    North,
    East,
    #[default]
    South,
    West,
}

impl Direction {
    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }
}
