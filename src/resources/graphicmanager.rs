//! Sprite registry, texture residency and eviction.
//!
//! The [`GraphicManager`] owns every sprite and sheet image the editor knows
//! about:
//! - `sprite_space` maps ids to [`Sprite`]s. Items sit at their item id,
//!   creatures at `outfit id + item count`, editor overlays at negative ids.
//! - `image_space` maps sprite ids to [`NormalImage`]s, created the first
//!   time a sprite id is drawn.
//! - `cleanup_list` holds the game sprites that have uploaded at least one
//!   texture. [`garbage_collection`](GraphicManager::garbage_collection)
//!   walks it to release textures that have been idle too long.
//!
//! The manager lives on the thread that owns the rendering context. Insert it
//! with `World::insert_non_send_resource` and access it through
//! `NonSend<GraphicManager>` / `NonSendMut<GraphicManager>`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use fastrand::Rng;
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::components::animator::Animator;
use crate::components::outfit::{Direction, Outfit};
use crate::resources::gamesprite::{EditorSprite, GameSprite, ImageContext, Pattern, Sprite};
use crate::resources::gpu::{DrawSurface, GpuContext, SpriteSize, TextureId};
use crate::resources::image::{NormalImage, OutfitImage};
use crate::resources::metadata::{MetadataError, SpriteRecord};
use crate::resources::spriteappearances::SpriteAppearances;
use crate::resources::spriteconfig::SpriteConfig;

/// First handle handed out by [`GraphicManager::free_texture_id`]. Sheet
/// sprites use their sprite id as handle and stay below it.
pub const FIRST_FREE_TEXTURE_ID: TextureId = 0x1000_0000;

/// Reserved editor sprite ids.
pub mod editor_sprites {
    pub const SELECTION_MARKER: i32 = -1;
    pub const SPAWN: i32 = -2;
    pub const HOUSE_EXIT: i32 = -3;
    pub const WAYPOINT: i32 = -4;
}

/// Registry of sprites and owner of their GPU residency.
pub struct GraphicManager {
    appearances: SpriteAppearances,
    sprite_space: FxHashMap<i32, Sprite>,
    image_space: FxHashMap<u32, NormalImage>,
    cleanup_list: VecDeque<i32>,
    cleanup_set: FxHashSet<i32>,
    item_count: u32,
    creature_count: u32,
    loaded_textures: usize,
    last_clean: u64,
    next_texture_id: TextureId,
    config: SpriteConfig,
    rng: Rng,
}

fn allocate_texture_id(counter: &mut TextureId) -> TextureId {
    let id = *counter;
    *counter += 1;
    id
}

impl GraphicManager {
    pub fn new(config: SpriteConfig, appearances: SpriteAppearances) -> Self {
        Self::with_rng(config, appearances, Rng::new())
    }

    /// Manager whose animators fork from `rng`.
    pub fn with_rng(config: SpriteConfig, appearances: SpriteAppearances, rng: Rng) -> Self {
        Self {
            appearances,
            sprite_space: FxHashMap::default(),
            image_space: FxHashMap::default(),
            cleanup_list: VecDeque::new(),
            cleanup_set: FxHashSet::default(),
            item_count: 0,
            creature_count: 0,
            loaded_textures: 0,
            last_clean: 0,
            next_texture_id: FIRST_FREE_TEXTURE_ID,
            config,
            rng,
        }
    }

    pub fn appearances(&self) -> &SpriteAppearances {
        &self.appearances
    }

    pub fn appearances_mut(&mut self) -> &mut SpriteAppearances {
        &mut self.appearances
    }

    pub fn config(&self) -> &SpriteConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SpriteConfig) {
        self.config = config;
    }

    /// Number of textures currently resident.
    pub fn loaded_textures(&self) -> usize {
        self.loaded_textures
    }

    pub fn cleanup_len(&self) -> usize {
        self.cleanup_list.len()
    }

    pub fn is_in_cleanup(&self, id: i32) -> bool {
        self.cleanup_set.contains(&id)
    }

    pub fn item_sprite_max_id(&self) -> u32 {
        self.item_count
    }

    pub fn creature_sprite_max_id(&self) -> u32 {
        self.creature_count
    }

    pub fn image(&self, sprite_id: u32) -> Option<&NormalImage> {
        self.image_space.get(&sprite_id)
    }

    /// Next texture handle outside the sheet sprite range.
    pub fn free_texture_id(&mut self) -> TextureId {
        allocate_texture_id(&mut self.next_texture_id)
    }

    fn build_sprites(
        &mut self,
        records: &[SpriteRecord],
        warnings: &mut Vec<String>,
    ) -> Result<Vec<(u32, GameSprite)>, MetadataError> {
        let mut built = Vec::with_capacity(records.len());
        for record in records {
            if record.id == 0 || record.id > i32::MAX as u32 {
                return Err(MetadataError::IdOutOfRange { id: record.id });
            }
            let geometry = record.geometry()?;
            let expected = geometry.sprite_count();
            let found = record.sprite_ids.len();
            if found < expected {
                return Err(MetadataError::SpriteCountMismatch {
                    id: record.id,
                    expected,
                    found,
                });
            }
            if found > expected {
                warnings.push(format!(
                    "sprite {}: {} sprite ids for {} slots, extra ids ignored",
                    record.id, found, expected
                ));
            }
            let mut sprite = GameSprite::new(geometry, record.sprite_ids[..expected].to_vec());
            sprite.metadata_offset = record.draw_offset();
            sprite.draw_height = record.draw_height(warnings);
            sprite.minimap_color = record.minimap_color(warnings);
            sprite.animator = record.animator(geometry.frames, &mut self.rng, warnings);
            built.push((record.id, sprite));
        }
        Ok(built)
    }

    /// Register item sprites at their item ids.
    ///
    /// Nothing is registered if any record lacks required geometry.
    pub fn load_item_sprite_metadata(
        &mut self,
        records: &[SpriteRecord],
        warnings: &mut Vec<String>,
    ) -> Result<(), MetadataError> {
        let built = self.build_sprites(records, warnings)?;
        for (id, sprite) in built {
            self.item_count = self.item_count.max(id);
            self.sprite_space.insert(id as i32, Sprite::Game(sprite));
        }
        info!(
            "Loaded {} item sprites, max id {}",
            records.len(),
            self.item_count
        );
        Ok(())
    }

    /// Register outfit sprites after the item range.
    ///
    /// Items must be loaded first; outfit ids are offset by the item count.
    pub fn load_outfit_sprite_metadata(
        &mut self,
        records: &[SpriteRecord],
        warnings: &mut Vec<String>,
    ) -> Result<(), MetadataError> {
        let built = self.build_sprites(records, warnings)?;
        let offset = self.item_count as u64;
        let keyed = built
            .into_iter()
            .map(|(id, sprite)| {
                i32::try_from(id as u64 + offset)
                    .map(|key| (id, key, sprite))
                    .map_err(|_| MetadataError::IdOutOfRange { id })
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (id, key, sprite) in keyed {
            self.creature_count = self.creature_count.max(id);
            self.sprite_space.insert(key, Sprite::Game(sprite));
        }
        info!(
            "Loaded {} outfit sprites, max id {}",
            records.len(),
            self.creature_count
        );
        Ok(())
    }

    /// Register an editor overlay. Only negative ids are accepted.
    pub fn register_editor_sprite(&mut self, id: i32, sprite: EditorSprite) -> bool {
        if id >= 0 {
            warn!("Editor sprite id {} is not in the reserved range", id);
            return false;
        }
        self.sprite_space.insert(id, Sprite::Editor(sprite));
        true
    }

    pub fn sprite(&self, id: i32) -> Option<&Sprite> {
        self.sprite_space.get(&id)
    }

    pub fn sprite_mut(&mut self, id: i32) -> Option<&mut Sprite> {
        self.sprite_space.get_mut(&id)
    }

    fn creature_key(&self, id: i32) -> Option<i32> {
        if id < 0 {
            return None;
        }
        i32::try_from(id as i64 + self.item_count as i64).ok()
    }

    pub fn creature_sprite(&self, id: i32) -> Option<&Sprite> {
        self.creature_key(id).and_then(|key| self.sprite(key))
    }

    pub fn creature_sprite_mut(&mut self, id: i32) -> Option<&mut Sprite> {
        let key = self.creature_key(id)?;
        self.sprite_mut(key)
    }

    /// Per-entity animator for sprite `id`.
    ///
    /// Returns `None` for synchronous or static sprites, which animate
    /// through the shared animator on the sprite itself.
    pub fn instance_animator(&mut self, id: i32, now: u64) -> Option<Animator> {
        let animator = self.sprite_space.get(&id)?.as_game()?.animator.as_ref()?;
        if animator.is_synchronous() {
            return None;
        }
        Some(animator.instance(self.rng.fork(), now))
    }

    /// Account for textures uploaded while drawing sprite `id`.
    fn note_uploads(&mut self, id: i32, uploads: usize, gpu: &mut dyn GpuContext) {
        if uploads > 0 {
            self.loaded_textures += uploads;
            self.add_sprite_to_cleanup(id, gpu);
        }
    }

    /// Texture of one sprite slot, uploading it if needed.
    #[allow(clippy::too_many_arguments)]
    pub fn sprite_texture(
        &mut self,
        id: i32,
        layer: usize,
        subtype: i32,
        pattern: Pattern,
        frame: usize,
        now: u64,
        gpu: &mut dyn GpuContext,
    ) -> Option<TextureId> {
        let Some(Sprite::Game(sprite)) = self.sprite_space.get(&id) else {
            return None;
        };
        let sprite_id = sprite.sprite_id(layer, subtype, pattern, frame)?;
        let mut ctx = ImageContext {
            images: &mut self.image_space,
            appearances: &mut self.appearances,
            gpu: &mut *gpu,
            uploads: 0,
            now,
        };
        let texture = match ctx.texture(sprite_id) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("Texture for sprite {} unavailable: {}", sprite_id, e);
                None
            }
        };
        let uploads = ctx.uploads;
        self.note_uploads(id, uploads, gpu);
        texture
    }

    /// Shared recoloured image of a creature facing `direction`.
    pub fn outfit_image(
        &mut self,
        creature_id: i32,
        direction: Direction,
        outfit: &Outfit,
    ) -> Option<Rc<RefCell<OutfitImage>>> {
        let key = self.creature_key(creature_id)?;
        let Some(Sprite::Game(sprite)) = self.sprite_space.get_mut(&key) else {
            return None;
        };
        let base_index = sprite.outfit_base_index(direction, 0);
        let counter = &mut self.next_texture_id;
        sprite.get_outfit_image(key, base_index, outfit, || allocate_texture_id(counter))
    }

    /// Draw sprite `id`. Unknown ids draw nothing and return false.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_sprite(
        &mut self,
        id: i32,
        surface: &mut dyn DrawSurface,
        size: SpriteSize,
        x: i32,
        y: i32,
        width: Option<i32>,
        height: Option<i32>,
        now: u64,
        gpu: &mut dyn GpuContext,
    ) -> bool {
        self.draw_sprite_frame(id, surface, size, x, y, width, height, None, now, gpu)
    }

    /// Like [`draw_sprite`](Self::draw_sprite) with an optional forced frame.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_sprite_frame(
        &mut self,
        id: i32,
        surface: &mut dyn DrawSurface,
        size: SpriteSize,
        x: i32,
        y: i32,
        width: Option<i32>,
        height: Option<i32>,
        frame: Option<usize>,
        now: u64,
        gpu: &mut dyn GpuContext,
    ) -> bool {
        let Some(sprite) = self.sprite_space.get_mut(&id) else {
            return false;
        };
        let mut ctx = ImageContext {
            images: &mut self.image_space,
            appearances: &mut self.appearances,
            gpu: &mut *gpu,
            uploads: 0,
            now,
        };
        match sprite {
            Sprite::Editor(e) => e.draw_to(surface, size, x, y, width, height),
            Sprite::Game(g) => g.draw_to(
                &mut ctx,
                surface,
                size,
                x,
                y,
                width,
                height,
                Pattern::default(),
                frame,
            ),
        }
        let uploads = ctx.uploads;
        self.note_uploads(id, uploads, gpu);
        true
    }

    /// Draw a recoloured creature. Unknown creatures draw nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_creature(
        &mut self,
        outfit: &Outfit,
        direction: Direction,
        surface: &mut dyn DrawSurface,
        size: SpriteSize,
        x: i32,
        y: i32,
        frame: Option<usize>,
        now: u64,
        gpu: &mut dyn GpuContext,
    ) -> bool {
        let Some(key) = self.creature_key(outfit.look_type as i32) else {
            return false;
        };
        let Some(Sprite::Game(sprite)) = self.sprite_space.get_mut(&key) else {
            return false;
        };
        let counter = &mut self.next_texture_id;
        let mut ctx = ImageContext {
            images: &mut self.image_space,
            appearances: &mut self.appearances,
            gpu: &mut *gpu,
            uploads: 0,
            now,
        };
        sprite.draw_outfit_to(
            key,
            &mut ctx,
            surface,
            size,
            x,
            y,
            direction,
            outfit,
            || allocate_texture_id(counter),
            frame,
        );
        let uploads = ctx.uploads;
        self.note_uploads(key, uploads, gpu);
        true
    }

    /// Track a game sprite for garbage collection.
    ///
    /// Registering a tracked sprite again is a no-op. When the list grows
    /// past its bound the oldest entries lose all their textures and leave
    /// the list.
    pub fn add_sprite_to_cleanup(&mut self, id: i32, gpu: &mut dyn GpuContext) {
        if !self.cleanup_set.insert(id) {
            return;
        }
        self.cleanup_list.push_back(id);
        if self.cleanup_list.len() <= self.config.cleanup_list_bound() {
            return;
        }
        // the entry just pushed is being drawn and must survive the sweep
        let evict = self
            .config
            .software_clean_size
            .min(self.cleanup_list.len() - 1);
        let mut released = 0;
        for _ in 0..evict {
            let Some(old) = self.cleanup_list.pop_front() else {
                break;
            };
            self.cleanup_set.remove(&old);
            if let Some(sprite) = self.sprite_space.get_mut(&old) {
                let mut ctx = ImageContext {
                    images: &mut self.image_space,
                    appearances: &mut self.appearances,
                    gpu: &mut *gpu,
                    uploads: 0,
                    now: 0,
                };
                released += sprite.unload_gpu(&mut ctx);
            }
        }
        self.loaded_textures = self.loaded_textures.saturating_sub(released);
        debug!(
            "Cleanup list overflow: evicted {} sprites, released {} textures",
            evict, released
        );
    }

    /// Release textures idle longer than the configured longevity.
    ///
    /// Runs only when texture management is enabled, more textures than the
    /// clean threshold are resident and the clean pulse has elapsed since the
    /// previous sweep. Sprites left without resident textures leave the
    /// cleanup list. Returns the number of released textures.
    pub fn garbage_collection(&mut self, now: u64, gpu: &mut dyn GpuContext) -> usize {
        if !self.config.texture_management
            || self.loaded_textures <= self.config.texture_clean_threshold
            || now.saturating_sub(self.last_clean) <= self.config.clean_pulse_ms()
        {
            return 0;
        }
        let longevity = self.config.longevity_ms();
        let policy = self.config.eviction;
        let mut released = 0;
        let mut ctx = ImageContext {
            images: &mut self.image_space,
            appearances: &mut self.appearances,
            gpu,
            uploads: 0,
            now,
        };
        let sprite_space = &mut self.sprite_space;
        let cleanup_set = &mut self.cleanup_set;
        self.cleanup_list.retain(|id| {
            let outcome = match sprite_space.get_mut(id) {
                Some(Sprite::Game(sprite)) => sprite.clean(&mut ctx, longevity, policy),
                _ => Default::default(),
            };
            released += outcome.released;
            if outcome.resident == 0 {
                cleanup_set.remove(id);
                false
            } else {
                true
            }
        });
        self.loaded_textures = self.loaded_textures.saturating_sub(released);
        self.last_clean = now;
        debug!(
            "Garbage collection released {} textures, {} still resident",
            released, self.loaded_textures
        );
        released
    }

    /// Release the textures of every sprite and empty the cleanup list.
    pub fn clean_software_sprites(&mut self, gpu: &mut dyn GpuContext) {
        let mut ctx = ImageContext {
            images: &mut self.image_space,
            appearances: &mut self.appearances,
            gpu,
            uploads: 0,
            now: 0,
        };
        let mut released = 0;
        for sprite in self.sprite_space.values_mut() {
            released += sprite.unload_gpu(&mut ctx);
        }
        self.cleanup_list.clear();
        self.cleanup_set.clear();
        self.loaded_textures = self.loaded_textures.saturating_sub(released);
    }

    /// Drop every sprite, image and counter. Decoded sheets are unloaded but
    /// the catalog is kept.
    pub fn clear(&mut self, gpu: &mut dyn GpuContext) {
        self.clean_software_sprites(gpu);
        self.sprite_space.clear();
        self.image_space.clear();
        self.appearances.unload();
        self.item_count = 0;
        self.creature_count = 0;
        self.loaded_textures = 0;
        self.last_clean = 0;
        info!("Graphic manager cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::gpu::{Blit, HeadlessGpu, RecordingSurface};
    use crate::resources::image::Image;
    use crate::resources::spriteappearances::{
        MemorySheetSource, PixelSize, SpriteLayout, SpriteSheet, SpritePixels,
    };
    use std::sync::Arc;

    fn record(id: u32, sprite_ids: Vec<u32>) -> SpriteRecord {
        SpriteRecord {
            id,
            width: Some(1),
            height: Some(1),
            layers: Some(1),
            pattern_x: Some(1),
            pattern_y: Some(1),
            pattern_z: Some(1),
            frames: Some(sprite_ids.len() as u8),
            sprite_ids,
            ..Default::default()
        }
    }

    fn manager(config: SpriteConfig) -> GraphicManager {
        let mut appearances = SpriteAppearances::new(Arc::new(MemorySheetSource::new()));
        appearances
            .set_sheets(vec![SpriteSheet::new(1, 144, SpriteLayout::OneByOne, "s.bmp")])
            .unwrap();
        GraphicManager::with_rng(config, appearances, Rng::with_seed(1))
    }

    #[test]
    fn free_texture_ids_are_monotonic() {
        let mut gm = manager(SpriteConfig::new());
        assert_eq!(gm.free_texture_id(), FIRST_FREE_TEXTURE_ID);
        assert_eq!(gm.free_texture_id(), FIRST_FREE_TEXTURE_ID + 1);
    }

    #[test]
    fn bad_record_registers_nothing() {
        let mut gm = manager(SpriteConfig::new());
        let mut warnings = Vec::new();
        let mut broken = record(101, vec![5]);
        broken.layers = None;
        let err = gm
            .load_item_sprite_metadata(&[record(100, vec![4]), broken], &mut warnings)
            .unwrap_err();
        assert_eq!(
            err,
            MetadataError::MissingGeometry {
                id: 101,
                field: "layers"
            }
        );
        assert!(gm.sprite(100).is_none());

        let mut short = record(102, vec![1, 2]);
        short.frames = Some(3);
        assert!(matches!(
            gm.load_item_sprite_metadata(&[short], &mut warnings),
            Err(MetadataError::SpriteCountMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn extra_sprite_ids_are_truncated() {
        let mut gm = manager(SpriteConfig::new());
        let mut warnings = Vec::new();
        let mut r = record(100, vec![1, 2, 3]);
        r.frames = Some(1);
        gm.load_item_sprite_metadata(&[r], &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);
        let sprite = gm.sprite(100).and_then(Sprite::as_game).unwrap();
        assert_eq!(sprite.sprite_list, vec![1]);
        assert!(sprite.animator.is_none());
    }

    #[test]
    fn creatures_follow_items() {
        let mut gm = manager(SpriteConfig::new());
        let mut warnings = Vec::new();
        gm.load_item_sprite_metadata(&[record(100, vec![1]), record(250, vec![2])], &mut warnings)
            .unwrap();
        gm.load_outfit_sprite_metadata(&[record(3, vec![9])], &mut warnings)
            .unwrap();
        assert_eq!(gm.item_sprite_max_id(), 250);
        assert_eq!(gm.creature_sprite_max_id(), 3);
        assert!(gm.sprite(253).is_some());
        assert!(gm.creature_sprite(3).is_some());
        assert!(gm.creature_sprite(-1).is_none());
        assert!(gm.creature_sprite(4).is_none());
    }

    #[test]
    fn editor_sprites_use_negative_ids() {
        let mut gm = manager(SpriteConfig::new());
        let sprite = EditorSprite::new(
            SpritePixels::blank(PixelSize::new(16, 16)),
            SpritePixels::blank(PixelSize::new(32, 32)),
        );
        assert!(!gm.register_editor_sprite(5, sprite.clone()));
        assert!(gm.register_editor_sprite(editor_sprites::SPAWN, sprite));
        let mut gpu = HeadlessGpu::new();
        let mut surface = RecordingSurface::new();
        assert!(gm.draw_sprite(editor_sprites::SPAWN, &mut surface, SpriteSize::Medium, 0, 0, None, None, 0, &mut gpu));
        assert_eq!(surface.blits.len(), 1);
        assert_eq!(gm.loaded_textures(), 0);
        assert_eq!(gm.cleanup_len(), 0);
    }

    #[test]
    fn unknown_sprite_draws_nothing() {
        let mut gm = manager(SpriteConfig::new());
        let mut gpu = HeadlessGpu::new();
        let mut surface = RecordingSurface::new();
        assert!(!gm.draw_sprite(42, &mut surface, SpriteSize::Medium, 0, 0, None, None, 0, &mut gpu));
        assert!(surface.blits.is_empty());
        assert_eq!(gm.sprite_texture(42, 0, -1, Pattern::default(), 0, 0, &mut gpu), None);
    }

    #[test]
    fn drawing_registers_for_cleanup_once() {
        let mut gm = manager(SpriteConfig::new());
        let mut warnings = Vec::new();
        gm.load_item_sprite_metadata(&[record(100, vec![1, 2])], &mut warnings)
            .unwrap();
        let mut gpu = HeadlessGpu::new();
        let mut surface = RecordingSurface::new();
        for now in [0, 10, 20] {
            gm.draw_sprite_frame(100, &mut surface, SpriteSize::Medium, 0, 0, None, None, Some(0), now, &mut gpu);
        }
        assert_eq!(gm.cleanup_len(), 1);
        assert_eq!(gm.loaded_textures(), 1);
        gm.draw_sprite_frame(100, &mut surface, SpriteSize::Medium, 0, 0, None, None, Some(1), 30, &mut gpu);
        assert_eq!(gm.loaded_textures(), 2);
        assert_eq!(gm.cleanup_len(), 1);
        assert_eq!(gpu.len(), 2);
    }

    #[test]
    fn cleanup_overflow_releases_oldest() {
        let config = SpriteConfig {
            software_clean_threshold: 0,
            software_clean_size: 10,
            ..SpriteConfig::new()
        };
        let mut gm = manager(config);
        let mut warnings = Vec::new();
        let records: Vec<_> = (0..101).map(|i| record(100 + i, vec![1 + i % 144])).collect();
        gm.load_item_sprite_metadata(&records, &mut warnings).unwrap();
        let mut gpu = HeadlessGpu::new();
        for i in 0..101 {
            gm.sprite_texture(100 + i, 0, -1, Pattern::default(), 0, 0, &mut gpu);
        }
        // bound is max(100, 0); the 101st entry evicts the ten oldest
        assert_eq!(gm.cleanup_len(), 91);
        assert!(!gm.is_in_cleanup(100));
        assert!(gm.is_in_cleanup(110));
        assert_eq!(gm.loaded_textures(), 91);
        assert!(!gpu.contains(1));
        assert!(gpu.contains(11));
    }

    #[test]
    fn cleanup_overflow_keeps_the_sprite_being_drawn() {
        let config = SpriteConfig {
            software_clean_threshold: 100,
            software_clean_size: 500,
            ..SpriteConfig::new()
        };
        let mut gm = manager(config);
        let mut warnings = Vec::new();
        let records: Vec<_> = (0..101).map(|i| record(100 + i, vec![1 + i])).collect();
        gm.load_item_sprite_metadata(&records, &mut warnings).unwrap();
        let mut gpu = HeadlessGpu::new();
        for i in 0..100 {
            gm.sprite_texture(100 + i, 0, -1, Pattern::default(), 0, 0, &mut gpu);
        }
        assert_eq!(gm.cleanup_len(), 100);

        let mut surface = RecordingSurface::new();
        assert!(gm.draw_sprite(200, &mut surface, SpriteSize::Medium, 0, 0, None, None, 0, &mut gpu));
        let Some(Blit::Texture { handle, .. }) = surface.blits.first() else {
            panic!("expected a texture blit");
        };
        assert!(gpu.contains(*handle));
        assert_eq!(gm.cleanup_len(), 1);
        assert!(gm.is_in_cleanup(200));
        assert_eq!(gm.loaded_textures(), 1);
        assert!(!gpu.contains(1));
    }

    #[test]
    fn garbage_collection_is_gated() {
        let config = SpriteConfig {
            texture_clean_threshold: 0,
            texture_longevity: 1,
            texture_clean_pulse: 1,
            ..SpriteConfig::new()
        };
        let mut gm = manager(config.clone());
        let mut warnings = Vec::new();
        gm.load_item_sprite_metadata(&[record(100, vec![1])], &mut warnings)
            .unwrap();
        let mut gpu = HeadlessGpu::new();
        gm.sprite_texture(100, 0, -1, Pattern::default(), 0, 0, &mut gpu);

        // pulse not elapsed since start
        assert_eq!(gm.garbage_collection(1000, &mut gpu), 0);
        assert_eq!(gm.garbage_collection(5000, &mut gpu), 1);
        assert_eq!(gm.loaded_textures(), 0);
        assert_eq!(gm.cleanup_len(), 0);
        assert!(!gm.image(1).unwrap().is_gpu_loaded());

        gm.set_config(SpriteConfig {
            texture_management: false,
            ..config
        });
        gm.sprite_texture(100, 0, -1, Pattern::default(), 0, 6000, &mut gpu);
        assert_eq!(gm.garbage_collection(60_000, &mut gpu), 0);
        assert_eq!(gm.loaded_textures(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let mut gm = manager(SpriteConfig::new());
        let mut warnings = Vec::new();
        gm.load_item_sprite_metadata(&[record(100, vec![1])], &mut warnings)
            .unwrap();
        let mut gpu = HeadlessGpu::new();
        gm.sprite_texture(100, 0, -1, Pattern::default(), 0, 0, &mut gpu);
        gm.clear(&mut gpu);
        assert!(gpu.is_empty());
        assert!(gm.sprite(100).is_none());
        assert_eq!(gm.loaded_textures(), 0);
        assert_eq!(gm.item_sprite_max_id(), 0);
        assert_eq!(gm.appearances().sheets().len(), 1);
    }
}
