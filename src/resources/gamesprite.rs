//! Drawable sprites.
//!
//! [`Sprite`] is either an [`EditorSprite`] (two fixed bitmaps for editor
//! overlays) or a [`GameSprite`] (an animated, multi-cell asset built from
//! metadata). Game sprites only store sprite ids; the images behind them live
//! in the graphic manager's image space and are reached through an
//! [`ImageContext`] borrowed for the duration of a call.

use std::cell::RefCell;
use std::rc::Rc;

use log::warn;
use rustc_hash::FxHashMap;

use crate::components::animator::Animator;
use crate::components::outfit::{Direction, Outfit};
use crate::resources::gpu::{
    DrawRect, DrawSurface, GpuContext, GpuError, PixelSource, SPRITE_CELL_SIZE, SpriteSize,
    TextureId,
};
use crate::resources::image::{Image, NormalImage, OutfitImage};
use crate::resources::metadata::Geometry;
use crate::resources::spriteappearances::{SpriteAppearances, SpritePixels};
use crate::resources::spriteconfig::EvictionPolicy;

/// Manager state borrowed by a sprite while it resolves textures.
pub struct ImageContext<'a> {
    pub images: &'a mut FxHashMap<u32, NormalImage>,
    pub appearances: &'a mut SpriteAppearances,
    pub gpu: &'a mut dyn GpuContext,
    /// Incremented for every texture uploaded through this context.
    pub uploads: usize,
    pub now: u64,
}

impl ImageContext<'_> {
    /// Texture of a sheet sprite, uploading on first use.
    pub fn texture(&mut self, sprite_id: u32) -> Result<TextureId, GpuError> {
        let image = self
            .images
            .entry(sprite_id)
            .or_insert_with(|| NormalImage::new(sprite_id));
        let was_loaded = image.is_gpu_loaded();
        let texture = image.texture(self.now, self.appearances, &mut *self.gpu)?;
        if !was_loaded {
            self.uploads += 1;
        }
        Ok(texture)
    }

    /// Texture of a recoloured outfit, uploading on first use.
    pub fn outfit_texture(&mut self, image: &mut OutfitImage) -> Result<TextureId, GpuError> {
        let was_loaded = image.is_gpu_loaded();
        let texture = image.texture(self.now, self.appearances, &mut *self.gpu)?;
        if !was_loaded {
            self.uploads += 1;
        }
        Ok(texture)
    }
}

/// Result of a garbage collection pass over one sprite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOutcome {
    /// Textures released by this pass.
    pub released: usize,
    /// Textures still resident afterwards.
    pub resident: usize,
}

/// Static sprite made of a 16px and a 32px bitmap.
#[derive(Debug, Clone)]
pub struct EditorSprite {
    small: SpritePixels,
    large: SpritePixels,
}

impl EditorSprite {
    pub fn new(small: SpritePixels, large: SpritePixels) -> Self {
        Self { small, large }
    }

    pub fn draw_to(
        &self,
        surface: &mut dyn DrawSurface,
        size: SpriteSize,
        x: i32,
        y: i32,
        width: Option<i32>,
        height: Option<i32>,
    ) {
        let pixels = match size {
            SpriteSize::Small => &self.small,
            _ => &self.large,
        };
        let rect = DrawRect {
            x,
            y,
            width: width.unwrap_or(size.pixels()),
            height: height.unwrap_or(size.pixels()),
        };
        surface.blit(PixelSource::Pixels(pixels), size, rect);
    }
}

/// Pattern column/row/depth selection for a draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pattern {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

/// Animated multi-cell sprite built from metadata.
#[derive(Debug, Clone, Default)]
pub struct GameSprite {
    pub width: u8,
    pub height: u8,
    pub layers: u8,
    pub pattern_x: u8,
    pub pattern_y: u8,
    pub pattern_z: u8,
    pub frames: u8,
    pub numsprites: u32,
    pub draw_height: i32,
    /// Displacement from metadata, before the sheet size adjustment.
    pub metadata_offset: (i32, i32),
    draw_offset: Option<(i32, i32)>,
    pub minimap_color: u8,
    pub animator: Option<Animator>,
    pub sprite_list: Vec<u32>,
    pub instanced_templates: Vec<Rc<RefCell<OutfitImage>>>,
}

impl GameSprite {
    pub fn new(geometry: Geometry, sprite_list: Vec<u32>) -> Self {
        Self {
            width: geometry.width,
            height: geometry.height,
            layers: geometry.layers,
            pattern_x: geometry.pattern_x,
            pattern_y: geometry.pattern_y,
            pattern_z: geometry.pattern_z,
            frames: geometry.frames,
            numsprites: sprite_list.len() as u32,
            sprite_list,
            ..Default::default()
        }
    }

    /// Flatten a cell coordinate into a `sprite_list` index.
    ///
    /// `frame` wraps by the frame count; the other coordinates must lie inside
    /// the declared extents.
    #[allow(clippy::too_many_arguments)]
    pub fn get_index(
        &self,
        width: usize,
        height: usize,
        layer: usize,
        pattern_x: usize,
        pattern_y: usize,
        pattern_z: usize,
        frame: usize,
    ) -> usize {
        let frames = self.frames.max(1) as usize;
        ((((((frame % frames) * self.pattern_z as usize + pattern_z) * self.pattern_y as usize
            + pattern_y)
            * self.pattern_x as usize
            + pattern_x)
            * self.layers as usize
            + layer)
            * self.height as usize
            + height)
            * self.width as usize
            + width
    }

    /// Slot in `sprite_list` for a draw request.
    ///
    /// A non-negative `subtype` picks the slot directly. Slots past the end
    /// wrap around the sprite count.
    pub fn sprite_index(&self, layer: usize, subtype: i32, pattern: Pattern, frame: usize) -> usize {
        let index = if subtype >= 0 {
            subtype as usize
        } else {
            self.get_index(0, 0, layer, pattern.x, pattern.y, pattern.z, frame)
        };
        let count = self.sprite_list.len().max(1);
        if index >= count { index % count } else { index }
    }

    /// Sprite id behind a draw request.
    pub fn sprite_id(&self, layer: usize, subtype: i32, pattern: Pattern, frame: usize) -> Option<u32> {
        self.sprite_list
            .get(self.sprite_index(layer, subtype, pattern, frame))
            .copied()
    }

    /// Anchor displacement in native pixels.
    ///
    /// Computed once: sprites larger than one cell are shifted by the extra
    /// width and height of their sheet layout.
    pub fn draw_offset(&mut self, appearances: &SpriteAppearances) -> (i32, i32) {
        if let Some(offset) = self.draw_offset {
            return offset;
        }
        let size = self
            .sprite_list
            .first()
            .and_then(|&id| appearances.sprite_size(id))
            .unwrap_or_default();
        let offset = (
            self.metadata_offset.0 + size.width as i32 - SPRITE_CELL_SIZE,
            self.metadata_offset.1 + size.height as i32 - SPRITE_CELL_SIZE,
        );
        self.draw_offset = Some(offset);
        offset
    }

    /// Frame to draw now: the forced one, else the animator's, else 0.
    pub fn current_frame(&mut self, now: u64, forced: Option<usize>) -> usize {
        if let Some(frame) = forced {
            return frame;
        }
        self.animator.as_mut().map_or(0, |a| a.frame(now))
    }

    /// Draw every layer and cell of the sprite.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_to(
        &mut self,
        ctx: &mut ImageContext<'_>,
        surface: &mut dyn DrawSurface,
        size: SpriteSize,
        x: i32,
        y: i32,
        width: Option<i32>,
        height: Option<i32>,
        pattern: Pattern,
        forced_frame: Option<usize>,
    ) {
        let frame = self.current_frame(ctx.now, forced_frame);
        let (offset_x, offset_y) = self.draw_offset(ctx.appearances);
        for layer in 0..self.layers as usize {
            for cx in 0..self.width as usize {
                for cy in 0..self.height as usize {
                    let index =
                        self.get_index(cx, cy, layer, pattern.x, pattern.y, pattern.z, frame);
                    let Some(&sprite_id) = self.sprite_list.get(index) else {
                        continue;
                    };
                    let texture = match ctx.texture(sprite_id) {
                        Ok(t) => t,
                        Err(e) => {
                            warn!("Skipping sprite {}: {}", sprite_id, e);
                            continue;
                        }
                    };
                    let cell = ctx
                        .appearances
                        .sprite_size(sprite_id)
                        .unwrap_or_default();
                    let rect = DrawRect {
                        x: x - size.scale(cx as i32 * SPRITE_CELL_SIZE + offset_x),
                        y: y - size.scale(cy as i32 * SPRITE_CELL_SIZE + offset_y),
                        width: width.unwrap_or(size.scale(cell.width as i32)),
                        height: height.unwrap_or(size.scale(cell.height as i32)),
                    };
                    surface.blit(PixelSource::Texture(texture), size, rect);
                }
            }
        }
    }

    /// Cached recoloured image for `base_index`, created on first request.
    ///
    /// The layer-1 slot of the same cell is used as the colour mask when the
    /// sprite has more than one layer.
    pub fn get_outfit_image(
        &mut self,
        parent_id: i32,
        base_index: usize,
        outfit: &Outfit,
        allocate: impl FnOnce() -> TextureId,
    ) -> Option<Rc<RefCell<OutfitImage>>> {
        let base_sprite_id = *self.sprite_list.get(base_index)?;
        if let Some(found) = self
            .instanced_templates
            .iter()
            .find(|img| img.borrow().matches(base_sprite_id, outfit))
        {
            return Some(Rc::clone(found));
        }
        let template_sprite_id = if self.layers > 1 {
            let cells = self.width as usize * self.height as usize;
            self.sprite_list.get(base_index + cells).copied()
        } else {
            None
        };
        let image = Rc::new(RefCell::new(OutfitImage::new(
            parent_id,
            base_sprite_id,
            template_sprite_id,
            *outfit,
            allocate(),
        )));
        self.instanced_templates.push(Rc::clone(&image));
        Some(image)
    }

    /// Base slot of a creature facing `direction` at `frame`.
    pub fn outfit_base_index(&self, direction: Direction, frame: usize) -> usize {
        let pattern_x = direction.index() % self.pattern_x.max(1) as usize;
        self.get_index(0, 0, 0, pattern_x, 0, 0, frame)
    }

    /// Draw a recoloured creature facing `direction`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_outfit_to(
        &mut self,
        parent_id: i32,
        ctx: &mut ImageContext<'_>,
        surface: &mut dyn DrawSurface,
        size: SpriteSize,
        x: i32,
        y: i32,
        direction: Direction,
        outfit: &Outfit,
        allocate: impl FnOnce() -> TextureId,
        forced_frame: Option<usize>,
    ) {
        let frame = self.current_frame(ctx.now, forced_frame);
        let (offset_x, offset_y) = self.draw_offset(ctx.appearances);
        let base_index = self.outfit_base_index(direction, frame);
        let Some(image) = self.get_outfit_image(parent_id, base_index, outfit, allocate) else {
            return;
        };
        let mut image = image.borrow_mut();
        let texture = match ctx.outfit_texture(&mut image) {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping outfit {}: {}", outfit.look_type, e);
                return;
            }
        };
        let cell = ctx
            .appearances
            .sprite_size(image.sprite_id())
            .unwrap_or_default();
        let rect = DrawRect {
            x: x - size.scale(offset_x),
            y: y - size.scale(offset_y),
            width: size.scale(cell.width as i32),
            height: size.scale(cell.height as i32),
        };
        surface.blit(PixelSource::Texture(texture), size, rect);
    }

    /// Release idle textures of this sprite.
    pub fn clean(
        &mut self,
        ctx: &mut ImageContext<'_>,
        longevity: u64,
        policy: EvictionPolicy,
    ) -> CleanOutcome {
        let mut outcome = CleanOutcome::default();
        let mut dropped = Vec::new();
        for id in &self.sprite_list {
            let Some(image) = ctx.images.get_mut(id) else {
                continue;
            };
            if image.clean(ctx.now, longevity, policy, &mut *ctx.gpu) {
                outcome.released += 1;
                if policy.drops_pixels() {
                    dropped.push(image.sprite_id());
                }
            }
            if image.is_gpu_loaded() {
                outcome.resident += 1;
            }
        }
        for id in dropped {
            ctx.appearances.forget_sprite(id);
        }
        for template in &self.instanced_templates {
            let mut template = template.borrow_mut();
            if template.clean(ctx.now, longevity, policy, &mut *ctx.gpu) {
                outcome.released += 1;
            }
            if template.is_gpu_loaded() {
                outcome.resident += 1;
            }
        }
        outcome
    }

    /// Release every texture of this sprite. Returns how many were resident.
    pub fn unload_gpu(&mut self, ctx: &mut ImageContext<'_>) -> usize {
        let mut released = 0;
        for id in &self.sprite_list {
            let Some(image) = ctx.images.get_mut(id) else {
                continue;
            };
            if image.unload_gpu(&mut *ctx.gpu) {
                released += 1;
            }
        }
        for template in &self.instanced_templates {
            if template.borrow_mut().unload_gpu(&mut *ctx.gpu) {
                released += 1;
            }
        }
        released
    }
}

/// Anything registered in the graphic manager's sprite space.
#[derive(Debug, Clone)]
pub enum Sprite {
    Editor(EditorSprite),
    Game(GameSprite),
}

impl Sprite {
    pub fn as_game(&self) -> Option<&GameSprite> {
        match self {
            Sprite::Game(g) => Some(g),
            Sprite::Editor(_) => None,
        }
    }

    pub fn as_game_mut(&mut self) -> Option<&mut GameSprite> {
        match self {
            Sprite::Game(g) => Some(g),
            Sprite::Editor(_) => None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_to(
        &mut self,
        ctx: &mut ImageContext<'_>,
        surface: &mut dyn DrawSurface,
        size: SpriteSize,
        x: i32,
        y: i32,
        width: Option<i32>,
        height: Option<i32>,
    ) {
        match self {
            Sprite::Editor(e) => e.draw_to(surface, size, x, y, width, height),
            Sprite::Game(g) => {
                g.draw_to(ctx, surface, size, x, y, width, height, Pattern::default(), None)
            }
        }
    }

    /// Release all textures. Editor sprites hold none.
    pub fn unload_gpu(&mut self, ctx: &mut ImageContext<'_>) -> usize {
        match self {
            Sprite::Editor(_) => 0,
            Sprite::Game(g) => g.unload_gpu(ctx),
        }
    }
}
