//! Decoded-pixel and GPU-residency units.
//!
//! An image is one drawable bitmap with a texture handle. [`NormalImage`] is
//! a sprite straight out of its sheet; [`OutfitImage`] is a creature sprite
//! recoloured through the layer-1 colour mask of the same frame.
//!
//! Both upload lazily: the first [`texture`](NormalImage::texture) request
//! decodes the pixels (or falls back to a transparent placeholder when decode
//! fails) and pushes them to the [`GpuContext`]. [`Image::clean`] releases the
//! handle again once the image has been idle longer than the configured
//! longevity.

use std::rc::Rc;

use log::{debug, warn};

use crate::components::outfit::Outfit;
use crate::palette::outfit_color;
use crate::resources::gpu::{GpuContext, GpuError, TextureId};
use crate::resources::spriteappearances::{PixelSize, SpriteAppearances, SpritePixels};
use crate::resources::spriteconfig::EvictionPolicy;

/// GPU residency bookkeeping shared by both image kinds.
pub trait Image {
    /// Sprite id of the source pixels.
    fn sprite_id(&self) -> u32;
    fn texture_id(&self) -> TextureId;
    fn is_gpu_loaded(&self) -> bool;
    /// Time of the last draw, in elapsed milliseconds.
    fn last_access(&self) -> u64;
    fn visit(&mut self, now: u64);
    /// Release the texture when idle for more than `longevity` ms.
    ///
    /// Returns true if a texture was released.
    fn clean(
        &mut self,
        now: u64,
        longevity: u64,
        policy: EvictionPolicy,
        gpu: &mut dyn GpuContext,
    ) -> bool;
    /// Release the texture unconditionally. Returns true if one was resident.
    fn unload_gpu(&mut self, gpu: &mut dyn GpuContext) -> bool;
}

fn upload(
    gpu: &mut dyn GpuContext,
    handle: TextureId,
    pixels: Option<&SpritePixels>,
    fallback: PixelSize,
) -> Result<(), GpuError> {
    match pixels {
        Some(p) => gpu.upload(handle, p.size.width, p.size.height, &p.pixels),
        None => {
            let blank = SpritePixels::blank(fallback);
            gpu.upload(handle, fallback.width, fallback.height, &blank.pixels)
        }
    }
}

fn is_idle(last_access: u64, now: u64, longevity: u64) -> bool {
    now.saturating_sub(last_access) > longevity
}

/// One sprite of a sheet. The texture handle equals the sprite id.
#[derive(Debug, Clone)]
pub struct NormalImage {
    sprite_id: u32,
    gpu_loaded: bool,
    last_access: u64,
    pixels: Option<Rc<SpritePixels>>,
}

impl NormalImage {
    pub fn new(sprite_id: u32) -> Self {
        Self {
            sprite_id,
            gpu_loaded: false,
            last_access: 0,
            pixels: None,
        }
    }

    /// Decoded pixels, fetched from the sheet on first use.
    pub fn rgba_data(&mut self, appearances: &mut SpriteAppearances) -> Option<Rc<SpritePixels>> {
        if self.pixels.is_none() {
            self.pixels = appearances.get_sprite(self.sprite_id);
        }
        self.pixels.clone()
    }

    pub fn has_pixels(&self) -> bool {
        self.pixels.is_some()
    }

    /// Texture handle for drawing, uploading first if needed.
    pub fn texture(
        &mut self,
        now: u64,
        appearances: &mut SpriteAppearances,
        gpu: &mut dyn GpuContext,
    ) -> Result<TextureId, GpuError> {
        if !self.gpu_loaded {
            let pixels = self.rgba_data(appearances);
            if pixels.is_none() {
                warn!("Sprite {} has no pixels, uploading placeholder", self.sprite_id);
            }
            let fallback = appearances.sprite_size(self.sprite_id).unwrap_or_default();
            upload(gpu, self.sprite_id, pixels.as_deref(), fallback)?;
            debug!("Uploaded sprite {}", self.sprite_id);
            self.gpu_loaded = true;
        }
        self.visit(now);
        Ok(self.sprite_id)
    }

    /// Forget the decoded pixels; the next upload decodes again.
    pub fn drop_pixels(&mut self) {
        self.pixels = None;
    }
}

impl Image for NormalImage {
    fn sprite_id(&self) -> u32 {
        self.sprite_id
    }

    fn texture_id(&self) -> TextureId {
        self.sprite_id
    }

    fn is_gpu_loaded(&self) -> bool {
        self.gpu_loaded
    }

    fn last_access(&self) -> u64 {
        self.last_access
    }

    fn visit(&mut self, now: u64) {
        self.last_access = now;
    }

    fn clean(
        &mut self,
        now: u64,
        longevity: u64,
        policy: EvictionPolicy,
        gpu: &mut dyn GpuContext,
    ) -> bool {
        if !self.gpu_loaded || !is_idle(self.last_access, now, longevity) {
            return false;
        }
        self.unload_gpu(gpu);
        if policy.drops_pixels() {
            self.drop_pixels();
        }
        true
    }

    fn unload_gpu(&mut self, gpu: &mut dyn GpuContext) -> bool {
        if !self.gpu_loaded {
            return false;
        }
        gpu.release(self.sprite_id);
        self.gpu_loaded = false;
        true
    }
}

/// Mask class of a template pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskChannel {
    Head,
    Body,
    Legs,
    Feet,
}

impl MaskChannel {
    /// Classify a mask pixel; black and mixed colours are unmasked.
    pub fn classify(r: u8, g: u8, b: u8) -> Option<Self> {
        match (r != 0, g != 0, b != 0) {
            (true, true, false) => Some(MaskChannel::Head),
            (true, false, false) => Some(MaskChannel::Body),
            (false, true, false) => Some(MaskChannel::Legs),
            (false, false, true) => Some(MaskChannel::Feet),
            _ => None,
        }
    }

    pub fn palette_index(self, outfit: &Outfit) -> u8 {
        match self {
            MaskChannel::Head => outfit.head,
            MaskChannel::Body => outfit.body,
            MaskChannel::Legs => outfit.legs,
            MaskChannel::Feet => outfit.feet,
        }
    }
}

/// Multiply one pixel by an outfit palette colour.
pub fn colorize_pixel(color: u8, r: &mut u8, g: &mut u8, b: &mut u8) {
    let tint = outfit_color(color);
    *r = (*r as u32 * tint.r as u32 / 255) as u8;
    *g = (*g as u32 * tint.g as u32 / 255) as u8;
    *b = (*b as u32 * tint.b as u32 / 255) as u8;
}

/// Recolour `rgba` in place through `mask`. Alpha is never touched.
pub fn colorize(rgba: &mut [u8], mask: &[u8], outfit: &Outfit) {
    for (px, m) in rgba.chunks_exact_mut(4).zip(mask.chunks_exact(4)) {
        if let Some(channel) = MaskChannel::classify(m[0], m[1], m[2]) {
            let [r, g, b, _] = px else { continue };
            colorize_pixel(channel.palette_index(outfit), r, g, b);
        }
    }
}

/// A creature sprite recoloured by an outfit.
///
/// `parent_id` names the owning game sprite in the graphic manager; it is a
/// plain key, not a reference.
#[derive(Debug, Clone)]
pub struct OutfitImage {
    parent_id: i32,
    base_sprite_id: u32,
    template_sprite_id: Option<u32>,
    outfit: Outfit,
    texture_id: TextureId,
    gpu_loaded: bool,
    last_access: u64,
    pixels: Option<SpritePixels>,
}

impl OutfitImage {
    pub fn new(
        parent_id: i32,
        base_sprite_id: u32,
        template_sprite_id: Option<u32>,
        outfit: Outfit,
        texture_id: TextureId,
    ) -> Self {
        Self {
            parent_id,
            base_sprite_id,
            template_sprite_id,
            outfit,
            texture_id,
            gpu_loaded: false,
            last_access: 0,
            pixels: None,
        }
    }

    pub fn parent_id(&self) -> i32 {
        self.parent_id
    }

    pub fn outfit(&self) -> &Outfit {
        &self.outfit
    }

    pub fn template_sprite_id(&self) -> Option<u32> {
        self.template_sprite_id
    }

    /// True if this image renders `base_sprite_id` with the colours of `outfit`.
    pub fn matches(&self, base_sprite_id: u32, outfit: &Outfit) -> bool {
        self.base_sprite_id == base_sprite_id && self.outfit.color_hash() == outfit.color_hash()
    }

    /// Recoloured pixels, derived on first use.
    ///
    /// Without a template, or when the template size differs from the base,
    /// the base pixels are returned unchanged.
    pub fn rgba_data(&mut self, appearances: &mut SpriteAppearances) -> Option<&SpritePixels> {
        if self.pixels.is_none() {
            let base = appearances.get_sprite(self.base_sprite_id)?;
            let mut pixels = (*base).clone();
            if let Some(template_id) = self.template_sprite_id {
                match appearances.get_sprite(template_id) {
                    Some(mask) if mask.size == base.size => {
                        colorize(&mut pixels.pixels, &mask.pixels, &self.outfit)
                    }
                    Some(_) => warn!(
                        "Outfit mask {} does not match sprite {}",
                        template_id, self.base_sprite_id
                    ),
                    None => warn!("Outfit mask {} unavailable", template_id),
                }
            }
            self.pixels = Some(pixels);
        }
        self.pixels.as_ref()
    }

    /// Texture handle for drawing, uploading first if needed.
    pub fn texture(
        &mut self,
        now: u64,
        appearances: &mut SpriteAppearances,
        gpu: &mut dyn GpuContext,
    ) -> Result<TextureId, GpuError> {
        if !self.gpu_loaded {
            let fallback = appearances
                .sprite_size(self.base_sprite_id)
                .unwrap_or_default();
            let handle = self.texture_id;
            let base_id = self.base_sprite_id;
            let pixels = self.rgba_data(appearances);
            if pixels.is_none() {
                warn!("Outfit sprite {} has no pixels, uploading placeholder", base_id);
            }
            upload(gpu, handle, pixels, fallback)?;
            debug!("Uploaded outfit sprite {} as texture {:#x}", base_id, handle);
            self.gpu_loaded = true;
        }
        self.visit(now);
        Ok(self.texture_id)
    }
}

impl Image for OutfitImage {
    fn sprite_id(&self) -> u32 {
        self.base_sprite_id
    }

    fn texture_id(&self) -> TextureId {
        self.texture_id
    }

    fn is_gpu_loaded(&self) -> bool {
        self.gpu_loaded
    }

    fn last_access(&self) -> u64 {
        self.last_access
    }

    fn visit(&mut self, now: u64) {
        self.last_access = now;
    }

    fn clean(
        &mut self,
        now: u64,
        longevity: u64,
        policy: EvictionPolicy,
        gpu: &mut dyn GpuContext,
    ) -> bool {
        if !self.gpu_loaded || !is_idle(self.last_access, now, longevity) {
            return false;
        }
        self.unload_gpu(gpu);
        if policy.drops_pixels() {
            self.pixels = None;
        }
        true
    }

    fn unload_gpu(&mut self, gpu: &mut dyn GpuContext) -> bool {
        if !self.gpu_loaded {
            return false;
        }
        gpu.release(self.texture_id);
        self.gpu_loaded = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::gpu::HeadlessGpu;
    use crate::resources::spriteappearances::{
        MemorySheetSource, SPRITE_SHEET_BYTES, SpriteLayout, SpriteSheet,
    };
    use std::sync::Arc;

    /// Sheet whose first sprite is grey and whose second sprite is a mask
    /// split into head / body / legs / feet / unmasked rows.
    fn appearances() -> SpriteAppearances {
        let mut appearances = SpriteAppearances::new(Arc::new(MemorySheetSource::new()));
        appearances
            .set_sheets(vec![SpriteSheet::new(1, 10, SpriteLayout::OneByOne, "s.bmp")])
            .unwrap();
        let mut data = vec![0u8; SPRITE_SHEET_BYTES];
        for y in 0..32usize {
            for x in 0..64usize {
                let i = (y * 384 + x) * 4;
                let px: [u8; 4] = if x < 32 {
                    [200, 100, 50, 255]
                } else {
                    match y / 8 {
                        0 => [255, 255, 0, 255],
                        1 => [255, 0, 0, 255],
                        2 => [0, 255, 0, 255],
                        _ if y < 28 => [0, 0, 255, 255],
                        _ => [0, 0, 0, 255],
                    }
                };
                data[i..i + 4].copy_from_slice(&px);
            }
        }
        assert!(appearances.install_decoded_sheet(0, data));
        appearances
    }

    #[test]
    fn classify_mask_pixels() {
        assert_eq!(MaskChannel::classify(255, 255, 0), Some(MaskChannel::Head));
        assert_eq!(MaskChannel::classify(255, 0, 0), Some(MaskChannel::Body));
        assert_eq!(MaskChannel::classify(0, 255, 0), Some(MaskChannel::Legs));
        assert_eq!(MaskChannel::classify(0, 0, 255), Some(MaskChannel::Feet));
        assert_eq!(MaskChannel::classify(0, 0, 0), None);
        assert_eq!(MaskChannel::classify(255, 0, 255), None);
    }

    #[test]
    fn colorize_pixel_multiplies() {
        let (mut r, mut g, mut b) = (200, 100, 50);
        // entry 94 is pure red
        colorize_pixel(94, &mut r, &mut g, &mut b);
        assert_eq!((r, g, b), (200, 0, 0));
        let (mut r, mut g, mut b) = (200, 100, 50);
        colorize_pixel(0, &mut r, &mut g, &mut b);
        assert_eq!((r, g, b), (200, 100, 50));
    }

    #[test]
    fn outfit_recolours_masked_rows_only() {
        let mut appearances = appearances();
        let outfit = Outfit::new(1, 94, 132, 19, 0);
        let mut image = OutfitImage::new(5, 1, Some(2), outfit, 0x1000_0000);
        let base = appearances.get_sprite(1).unwrap();
        let pixels = image.rgba_data(&mut appearances).unwrap().clone();
        let at = |y: usize| &pixels.pixels[y * 32 * 4..y * 32 * 4 + 4];
        assert_eq!(at(0), &[200, 0, 0, 255]); // head, red
        assert_eq!(at(8), &[99, 0, 0, 255]); // body, dark red
        assert_eq!(at(16), &[170, 85, 42, 255]); // legs, grey 218
        assert_eq!(at(24), &[200, 100, 50, 255]); // feet, white
        // unmasked rows equal the base
        assert_eq!(&pixels.pixels[28 * 128..], &base.pixels[28 * 128..]);
    }

    #[test]
    fn normal_image_uploads_once_and_cleans_when_idle() {
        let mut appearances = appearances();
        let mut gpu = HeadlessGpu::new();
        let mut image = NormalImage::new(1);
        assert_eq!(image.texture(100, &mut appearances, &mut gpu), Ok(1));
        assert_eq!(image.texture(200, &mut appearances, &mut gpu), Ok(1));
        assert_eq!(gpu.upload_count(), 1);
        assert_eq!(image.last_access(), 200);

        assert!(!image.clean(1000, 1000, EvictionPolicy::Gpu, &mut gpu));
        assert!(image.clean(1201, 1000, EvictionPolicy::Gpu, &mut gpu));
        assert!(!image.is_gpu_loaded());
        assert!(!gpu.contains(1));
        assert!(image.has_pixels());
    }

    #[test]
    fn gpu_and_pixels_policy_drops_buffer() {
        let mut appearances = appearances();
        let mut gpu = HeadlessGpu::new();
        let mut image = NormalImage::new(3);
        image.texture(0, &mut appearances, &mut gpu).unwrap();
        assert!(image.clean(10, 5, EvictionPolicy::GpuAndPixels, &mut gpu));
        assert!(!image.has_pixels());
    }

    #[test]
    fn missing_sprite_uploads_placeholder() {
        let mut appearances = appearances();
        let mut gpu = HeadlessGpu::new();
        let mut image = NormalImage::new(40);
        assert_eq!(image.texture(0, &mut appearances, &mut gpu), Ok(40));
        let texture = gpu.get(40).unwrap();
        assert_eq!((texture.width, texture.height), (32, 32));
        assert!(texture.rgba.iter().all(|&b| b == 0));
    }

    #[test]
    fn gpu_failure_leaves_image_unloaded() {
        let mut appearances = appearances();
        let mut gpu = HeadlessGpu::with_capacity_limit(0);
        let mut image = NormalImage::new(1);
        assert_eq!(
            image.texture(0, &mut appearances, &mut gpu),
            Err(GpuError::Exhausted)
        );
        assert!(!image.is_gpu_loaded());
    }
}
