//! GPU context and drawing surface seams.
//!
//! The sprite core never talks to a graphics API directly. It allocates
//! texture handles itself (see
//! [`GraphicManager::free_texture_id`](crate::resources::graphicmanager::GraphicManager::free_texture_id))
//! and asks a [`GpuContext`] to upload pixel data to a handle or release it.
//! Drawing goes through a [`DrawSurface`] that receives a pixel source, the
//! requested [`SpriteSize`] and a destination rectangle.
//!
//! [`HeadlessGpu`] keeps uploaded textures in memory; it backs the command
//! line tooling and the test-suite. The raylib backend lives in
//! [`crate::resources::texturestore`].

use rustc_hash::FxHashMap;

use crate::resources::spriteappearances::SpritePixels;

/// Handle of an uploaded texture.
pub type TextureId = u32;

/// Native edge length of one sprite cell in pixels.
pub const SPRITE_CELL_SIZE: i32 = 32;

/// Discrete size variant a sprite is rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpriteSize {
    /// 16×16 pixels per cell.
    Small,
    /// 32×32 pixels per cell.
    #[default]
    Medium,
    /// 64×64 pixels per cell.
    Large,
}

impl SpriteSize {
    /// Edge length of one cell at this size.
    pub fn pixels(self) -> i32 {
        match self {
            SpriteSize::Small => 16,
            SpriteSize::Medium => 32,
            SpriteSize::Large => 64,
        }
    }

    /// Scale a length given in native (32px cell) pixels to this size.
    pub fn scale(self, native: i32) -> i32 {
        native * self.pixels() / SPRITE_CELL_SIZE
    }
}

/// Failure of a GPU operation. Contained to the draw call that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// No texture could be allocated.
    Exhausted,
    /// Pixel buffer length does not match `width * height * 4`.
    InvalidSize {
        width: u32,
        height: u32,
        len: usize,
    },
    /// Backend specific failure.
    Backend(String),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuError::Exhausted => write!(f, "texture memory exhausted"),
            GpuError::InvalidSize { width, height, len } => write!(
                f,
                "pixel buffer of {} bytes does not match {}x{} RGBA",
                len, width, height
            ),
            GpuError::Backend(msg) => write!(f, "gpu backend error: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {}

/// Upload/release interface of the rendering context.
///
/// Must only be used from the thread that owns the rendering context.
pub trait GpuContext {
    /// Upload RGBA pixels to `handle`, replacing any previous content.
    fn upload(
        &mut self,
        handle: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), GpuError>;

    /// Release `handle`. Releasing an unknown handle is a no-op.
    fn release(&mut self, handle: TextureId);
}

/// Check that `rgba` holds exactly `width * height` RGBA pixels.
pub fn check_rgba_len(width: u32, height: u32, rgba: &[u8]) -> Result<(), GpuError> {
    if rgba.len() != width as usize * height as usize * 4 {
        return Err(GpuError::InvalidSize {
            width,
            height,
            len: rgba.len(),
        });
    }
    Ok(())
}

/// A texture held by [`HeadlessGpu`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessTexture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// In-memory GPU used by tooling and tests.
///
/// An optional capacity makes uploads of new handles fail with
/// [`GpuError::Exhausted`] once that many textures are resident.
#[derive(Debug, Default)]
pub struct HeadlessGpu {
    textures: FxHashMap<TextureId, HeadlessTexture>,
    capacity: Option<usize>,
    uploads: usize,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of resident textures.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            capacity: Some(limit),
            ..Self::default()
        }
    }

    pub fn get(&self, handle: TextureId) -> Option<&HeadlessTexture> {
        self.textures.get(&handle)
    }

    pub fn contains(&self, handle: TextureId) -> bool {
        self.textures.contains_key(&handle)
    }

    /// Number of resident textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Total number of successful uploads since creation.
    pub fn upload_count(&self) -> usize {
        self.uploads
    }
}

impl GpuContext for HeadlessGpu {
    fn upload(
        &mut self,
        handle: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), GpuError> {
        check_rgba_len(width, height, rgba)?;
        if let Some(limit) = self.capacity
            && !self.textures.contains_key(&handle)
            && self.textures.len() >= limit
        {
            return Err(GpuError::Exhausted);
        }
        self.textures.insert(
            handle,
            HeadlessTexture {
                width,
                height,
                rgba: rgba.to_vec(),
            },
        );
        self.uploads += 1;
        Ok(())
    }

    fn release(&mut self, handle: TextureId) {
        self.textures.remove(&handle);
    }
}

/// What a surface is asked to blit.
#[derive(Debug, Clone, Copy)]
pub enum PixelSource<'a> {
    /// A GPU-resident texture.
    Texture(TextureId),
    /// A CPU bitmap owned by the caller (editor sprites).
    Pixels(&'a SpritePixels),
}

/// Destination rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Opaque drawing target.
pub trait DrawSurface {
    fn blit(&mut self, source: PixelSource<'_>, size: SpriteSize, rect: DrawRect);
}

/// One recorded blit of a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blit {
    Texture {
        handle: TextureId,
        size: SpriteSize,
        rect: DrawRect,
    },
    Pixels {
        width: u32,
        height: u32,
        size: SpriteSize,
        rect: DrawRect,
    },
}

/// Surface that records every blit instead of drawing it.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub blits: Vec<Blit>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawSurface for RecordingSurface {
    fn blit(&mut self, source: PixelSource<'_>, size: SpriteSize, rect: DrawRect) {
        let blit = match source {
            PixelSource::Texture(handle) => Blit::Texture { handle, size, rect },
            PixelSource::Pixels(pixels) => Blit::Pixels {
                width: pixels.size.width,
                height: pixels.size.height,
                size,
                rect,
            },
        };
        self.blits.push(blit);
    }
}
