//! Parsed sprite metadata records.
//!
//! Item and outfit appearances arrive as already-parsed records; this module
//! defines their shape (serde, so they can also be read from JSON) and the
//! validation applied before a [`GameSprite`](crate::resources::gamesprite::GameSprite)
//! is built from them. Missing geometry is a hard error, anything wrong with
//! an optional field turns into a warning and a default.

use fastrand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::animator::{AnimationMode, Animator, INFINITE_LOOPS};

/// How an animation repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    #[default]
    Infinite,
    PingPong,
    Counted(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDurationRecord {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AnimationRecord {
    #[serde(default)]
    pub loop_type: LoopType,
    /// `None` or a negative value starts on a random frame.
    #[serde(default)]
    pub start_frame: Option<i32>,
    #[serde(default)]
    pub synchronous: bool,
    #[serde(default)]
    pub durations: Vec<FrameDurationRecord>,
}

/// One item or outfit appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SpriteRecord {
    pub id: u32,
    #[serde(default)]
    pub sprite_ids: Vec<u32>,
    pub width: Option<u8>,
    pub height: Option<u8>,
    pub layers: Option<u8>,
    pub pattern_x: Option<u8>,
    pub pattern_y: Option<u8>,
    pub pattern_z: Option<u8>,
    pub frames: Option<u8>,
    #[serde(default)]
    pub animation: Option<AnimationRecord>,
    #[serde(default)]
    pub draw_offset: Option<[i32; 2]>,
    #[serde(default)]
    pub draw_height: Option<i32>,
    #[serde(default)]
    pub minimap_color: Option<u32>,
}

impl SpriteRecord {
    /// Parse a JSON array of records.
    pub fn list_from_json(json: &str) -> Result<Vec<SpriteRecord>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Required geometry, validated.
    pub fn geometry(&self) -> Result<Geometry, MetadataError> {
        let field = |value: Option<u8>, name: &'static str| match value {
            Some(v) if v > 0 => Ok(v),
            _ => Err(MetadataError::MissingGeometry {
                id: self.id,
                field: name,
            }),
        };
        Ok(Geometry {
            width: field(self.width, "width")?,
            height: field(self.height, "height")?,
            layers: field(self.layers, "layers")?,
            pattern_x: field(self.pattern_x, "pattern_x")?,
            pattern_y: field(self.pattern_y, "pattern_y")?,
            pattern_z: field(self.pattern_z, "pattern_z")?,
            frames: field(self.frames, "frames")?,
        })
    }

    /// Displacement, or `(0, 0)`.
    pub fn draw_offset(&self) -> (i32, i32) {
        self.draw_offset.map_or((0, 0), |[x, y]| (x, y))
    }

    /// Draw height, clamped to zero with a warning when negative.
    pub fn draw_height(&self, warnings: &mut Vec<String>) -> i32 {
        match self.draw_height {
            Some(h) if h < 0 => {
                warnings.push(format!("sprite {}: negative draw height {}", self.id, h));
                0
            }
            Some(h) => h,
            None => 0,
        }
    }

    /// Minimap palette byte, zero with a warning when out of range.
    pub fn minimap_color(&self, warnings: &mut Vec<String>) -> u8 {
        match self.minimap_color {
            Some(c) => u8::try_from(c).unwrap_or_else(|_| {
                warnings.push(format!("sprite {}: minimap color {} out of range", self.id, c));
                0
            }),
            None => 0,
        }
    }

    /// Animator for a multi-frame record. Single-frame records have none.
    pub fn animator(&self, frames: u8, rng: &mut Rng, warnings: &mut Vec<String>) -> Option<Animator> {
        if frames <= 1 {
            if self.animation.is_some() {
                warnings.push(format!("sprite {}: animation block on a single frame", self.id));
            }
            return None;
        }
        let frame_count = frames as usize;
        let Some(animation) = &self.animation else {
            return Some(Animator::new(
                frame_count,
                Some(0),
                INFINITE_LOOPS,
                AnimationMode::Loop,
                false,
                rng.fork(),
            ));
        };

        let (mode, loop_count) = match animation.loop_type {
            LoopType::Infinite => (AnimationMode::Loop, INFINITE_LOOPS),
            LoopType::PingPong => (AnimationMode::PingPong, INFINITE_LOOPS),
            LoopType::Counted(n) => (AnimationMode::Loop, n),
        };
        let start_frame = match animation.start_frame {
            Some(f) if f >= 0 && (f as usize) < frame_count => Some(f as usize),
            Some(f) if f >= 0 => {
                warnings.push(format!(
                    "sprite {}: start frame {} outside {} frames",
                    self.id, f, frame_count
                ));
                Some(0)
            }
            _ => None,
        };

        let mut animator = Animator::new(
            frame_count,
            start_frame,
            loop_count,
            mode,
            animation.synchronous,
            rng.fork(),
        );
        if !animation.durations.is_empty() && animation.durations.len() != frame_count {
            warnings.push(format!(
                "sprite {}: {} frame durations for {} frames",
                self.id,
                animation.durations.len(),
                frame_count
            ));
        }
        for (frame, d) in animation.durations.iter().enumerate().take(frame_count) {
            if d.min > d.max {
                warnings.push(format!(
                    "sprite {}: frame {} duration {}..{} is inverted",
                    self.id, frame, d.min, d.max
                ));
                continue;
            }
            animator.set_frame_duration(frame, d.min, d.max);
        }
        Some(animator)
    }
}

/// Validated cell geometry of a sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u8,
    pub height: u8,
    pub layers: u8,
    pub pattern_x: u8,
    pub pattern_y: u8,
    pub pattern_z: u8,
    pub frames: u8,
}

impl Geometry {
    /// Number of sprite ids the geometry addresses.
    pub fn sprite_count(&self) -> usize {
        [
            self.width,
            self.height,
            self.layers,
            self.pattern_x,
            self.pattern_y,
            self.pattern_z,
            self.frames,
        ]
        .iter()
        .map(|&v| v as usize)
        .product()
    }
}

/// Hard failures while loading metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    MissingGeometry { id: u32, field: &'static str },
    SpriteCountMismatch { id: u32, expected: usize, found: usize },
    IdOutOfRange { id: u32 },
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::MissingGeometry { id, field } => {
                write!(f, "sprite {} is missing required field '{}'", id, field)
            }
            MetadataError::SpriteCountMismatch {
                id,
                expected,
                found,
            } => write!(
                f,
                "sprite {} needs {} sprite ids but has {}",
                id, expected, found
            ),
            MetadataError::IdOutOfRange { id } => write!(f, "sprite id {} out of range", id),
        }
    }
}

impl std::error::Error for MetadataError {}
