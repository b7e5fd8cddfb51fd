//! Sprite pipeline integration tests.
//!
//! Exercise the path a map editor takes through the crate without a window:
//! catalog JSON and sheet files come from an in-memory source, textures land
//! in a [`HeadlessGpu`] and draws are captured by a [`RecordingSurface`].
//!
//! ```sh
//! cargo test --test sprite_pipeline_integration
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fastrand::Rng;
use rustc_hash::FxHashSet;

use mapsprites::components::outfit::{Direction, Outfit};
use mapsprites::resources::gamesprite::{GameSprite, Sprite};
use mapsprites::resources::gpu::{Blit, HeadlessGpu, RecordingSurface, SpriteSize};
use mapsprites::resources::graphicmanager::{FIRST_FREE_TEXTURE_ID, GraphicManager};
use mapsprites::resources::metadata::{Geometry, SpriteRecord};
use mapsprites::resources::spriteappearances::{
    CATALOG_FILE, MemorySheetSource, SPRITE_SHEET_BYTES, SPRITE_SHEET_SIZE, SpriteAppearances,
    encode_sheet,
};
use mapsprites::resources::spriteconfig::SpriteConfig;

// =============================================================================
// Fixtures
// =============================================================================

const GREY: [u8; 4] = [200, 200, 200, 255];
const YELLOW: [u8; 4] = [255, 255, 0, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];
const MAGENTA: [u8; 4] = [255, 0, 255, 255];

/// A 384×384 sheet of 32×32 cells, filled black.
struct SheetBuilder {
    rgba: Vec<u8>,
}

impl SheetBuilder {
    fn new() -> Self {
        let mut rgba = vec![0u8; SPRITE_SHEET_BYTES];
        for px in rgba.chunks_exact_mut(4) {
            px.copy_from_slice(&BLACK);
        }
        Self { rgba }
    }

    /// Paint pixel (x, y) of cell `cell` (row-major, 12 columns).
    fn set(&mut self, cell: u32, x: u32, y: u32, color: [u8; 4]) {
        let sheet_x = (cell % 12) * 32 + x;
        let sheet_y = (cell / 12) * 32 + y;
        let start = ((sheet_y * SPRITE_SHEET_SIZE + sheet_x) * 4) as usize;
        self.rgba[start..start + 4].copy_from_slice(&color);
    }

    fn fill(&mut self, cell: u32, rows: std::ops::Range<u32>, color: [u8; 4]) {
        for y in rows {
            for x in 0..32 {
                self.set(cell, x, y, color);
            }
        }
    }

    fn encode(&self) -> Vec<u8> {
        encode_sheet(&self.rgba).unwrap()
    }
}

/// Catalog under `assets/` with sprites 1..=144 in one sheet.
fn appearances_with(sheet: &SheetBuilder) -> SpriteAppearances {
    let mut source = MemorySheetSource::new();
    source.insert(
        Path::new("assets").join(CATALOG_FILE),
        br#"[
            {"type": "appearances", "file": "appearances.dat"},
            {"type": "sprite", "file": "sprites-1.bmp", "spritetype": 0,
             "firstspriteid": 1, "lastspriteid": 144}
        ]"#
        .to_vec(),
    );
    source.insert("assets/sprites-1.bmp", sheet.encode());
    let mut appearances = SpriteAppearances::new(Arc::new(source));
    appearances
        .load_catalog_content(Path::new("assets"), false)
        .unwrap();
    appearances
}

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

/// Creature with two layers and four facings: ids 10..=17.
fn creature_record(id: u32) -> SpriteRecord {
    SpriteRecord {
        id,
        layers: Some(2),
        pattern_x: Some(4),
        frames: Some(1),
        ..record(id, (10..=17).collect())
    }
}

fn temp_png(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("mapsprites-{}-{}.png", std::process::id(), name))
}

// =============================================================================
// Catalog
// =============================================================================

#[test]
fn catalog_json_resolves_sheet_paths() {
    let appearances = appearances_with(&SheetBuilder::new());
    assert_eq!(appearances.appearance_file_name(), "appearances.dat");
    assert_eq!(appearances.sheets().len(), 1);
    assert_eq!(
        appearances.sheets()[0].path,
        Path::new("assets").join("sprites-1.bmp")
    );
    assert_eq!(appearances.sheet_index(144), Some(0));
    assert_eq!(appearances.sheet_index(145), None);
    // nothing decoded until a sprite is asked for
    assert!(!appearances.sheets()[0].is_loaded());
}

// =============================================================================
// Geometry
// =============================================================================

#[test]
fn index_is_a_bijection_over_the_geometry() {
    let geometry = Geometry {
        width: 2,
        height: 2,
        layers: 2,
        pattern_x: 3,
        pattern_y: 2,
        pattern_z: 1,
        frames: 3,
    };
    let count = geometry.sprite_count();
    let sprite = GameSprite::new(geometry, (0..count as u32).collect());
    let mut seen = FxHashSet::default();
    for f in 0..3 {
        for pz in 0..1 {
            for py in 0..2 {
                for px in 0..3 {
                    for l in 0..2 {
                        for h in 0..2 {
                            for w in 0..2 {
                                let index = sprite.get_index(w, h, l, px, py, pz, f);
                                assert!(index < count);
                                assert!(seen.insert(index), "index {} repeated", index);
                            }
                        }
                    }
                }
            }
        }
    }
    assert_eq!(seen.len(), count);
}

// =============================================================================
// Textures and garbage collection
// =============================================================================

#[test]
fn idle_textures_are_collected_and_visited_ones_stay() {
    let mut config = SpriteConfig::new();
    config.texture_longevity = 1;
    config.texture_clean_pulse = 0;
    config.texture_clean_threshold = 0;
    let mut gm = GraphicManager::with_rng(config, appearances_with(&SheetBuilder::new()), Rng::with_seed(5));
    let mut warnings = Vec::new();
    gm.load_item_sprite_metadata(&[record(100, vec![1]), record(101, vec![2])], &mut warnings)
        .unwrap();
    assert!(warnings.is_empty());

    let mut gpu = HeadlessGpu::new();
    let mut surface = RecordingSurface::new();
    assert!(gm.draw_sprite(100, &mut surface, SpriteSize::Medium, 0, 0, None, None, 100, &mut gpu));
    assert!(gm.draw_sprite(101, &mut surface, SpriteSize::Medium, 32, 0, None, None, 100, &mut gpu));
    assert_eq!(gm.loaded_textures(), 2);
    assert_eq!(gm.cleanup_len(), 2);

    // 100 is drawn again, 101 is not
    gm.draw_sprite(100, &mut surface, SpriteSize::Medium, 0, 0, None, None, 1500, &mut gpu);
    assert_eq!(gpu.upload_count(), 2);

    let released = gm.garbage_collection(2000, &mut gpu);
    assert_eq!(released, 1);
    assert!(gpu.contains(1));
    assert!(!gpu.contains(2));
    assert_eq!(gm.loaded_textures(), 1);
    assert!(gm.is_in_cleanup(100));
    assert!(!gm.is_in_cleanup(101));

    // a released texture comes back on demand
    gm.draw_sprite(101, &mut surface, SpriteSize::Medium, 32, 0, None, None, 2100, &mut gpu);
    assert!(gpu.contains(2));
    assert_eq!(gm.loaded_textures(), 2);
}

#[test]
fn missing_sheet_sprite_draws_a_placeholder() {
    let mut gm = GraphicManager::with_rng(
        SpriteConfig::new(),
        appearances_with(&SheetBuilder::new()),
        Rng::with_seed(5),
    );
    let mut warnings = Vec::new();
    // 500 is outside every sheet
    gm.load_item_sprite_metadata(&[record(100, vec![500])], &mut warnings)
        .unwrap();
    let mut gpu = HeadlessGpu::new();
    let mut surface = RecordingSurface::new();
    assert!(gm.draw_sprite(100, &mut surface, SpriteSize::Medium, 0, 0, None, None, 0, &mut gpu));
    let texture = gpu.get(500).unwrap();
    assert!(texture.rgba.iter().all(|&b| b == 0));
    assert_eq!(surface.blits.len(), 1);
}

// =============================================================================
// Outfits
// =============================================================================

fn outfit_manager() -> GraphicManager {
    let mut sheet = SheetBuilder::new();
    // south-facing base (slot 4) is sprite 14, its mask (slot 5) sprite 15
    sheet.fill(13, 0..32, GREY);
    sheet.fill(14, 0..16, YELLOW);
    let mut gm = GraphicManager::with_rng(SpriteConfig::new(), appearances_with(&sheet), Rng::with_seed(9));
    let mut warnings = Vec::new();
    gm.load_item_sprite_metadata(&[record(100, vec![1])], &mut warnings)
        .unwrap();
    gm.load_outfit_sprite_metadata(&[creature_record(1)], &mut warnings)
        .unwrap();
    gm
}

fn pixel(rgba: &[u8], x: usize, y: usize) -> &[u8] {
    let start = (y * 32 + x) * 4;
    &rgba[start..start + 4]
}

#[test]
fn outfit_recolours_masked_pixels_only() {
    let mut gm = outfit_manager();
    let mut gpu = HeadlessGpu::new();
    let mut surface = RecordingSurface::new();
    // head colour 94 is pure red
    let outfit = Outfit::new(1, 94, 0, 0, 0);
    assert!(gm.draw_creature(&outfit, Direction::South, &mut surface, SpriteSize::Medium, 64, 64, None, 0, &mut gpu));

    let texture = gpu.get(FIRST_FREE_TEXTURE_ID).unwrap();
    assert_eq!(pixel(&texture.rgba, 5, 3), &[200u8, 0, 0, 255]);
    assert_eq!(pixel(&texture.rgba, 5, 20), &GREY);
    assert!(matches!(
        surface.blits[0],
        Blit::Texture { handle, .. } if handle == FIRST_FREE_TEXTURE_ID
    ));
    assert!(gm.is_in_cleanup(100 + 1));
}

#[test]
fn outfit_images_are_cached_per_colour_recipe() {
    let mut gm = outfit_manager();
    let mut gpu = HeadlessGpu::new();
    let mut surface = RecordingSurface::new();
    let outfit = Outfit::new(1, 94, 0, 0, 0);
    gm.draw_creature(&outfit, Direction::South, &mut surface, SpriteSize::Medium, 0, 0, None, 0, &mut gpu);
    gm.draw_creature(&outfit, Direction::South, &mut surface, SpriteSize::Medium, 0, 0, None, 10, &mut gpu);
    assert_eq!(gpu.upload_count(), 1);

    let first = gm.outfit_image(1, Direction::South, &outfit).unwrap();
    let again = gm.outfit_image(1, Direction::South, &outfit).unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &again));

    let other = Outfit { head: 19, ..outfit };
    gm.draw_creature(&other, Direction::South, &mut surface, SpriteSize::Medium, 0, 0, None, 20, &mut gpu);
    assert!(gpu.contains(FIRST_FREE_TEXTURE_ID + 1));
    let sprite = gm.creature_sprite(1).and_then(Sprite::as_game).unwrap();
    assert_eq!(sprite.instanced_templates.len(), 2);
}

#[test]
fn unknown_creature_draws_nothing() {
    let mut gm = outfit_manager();
    let mut gpu = HeadlessGpu::new();
    let mut surface = RecordingSurface::new();
    let outfit = Outfit::new(99, 1, 1, 1, 1);
    assert!(!gm.draw_creature(&outfit, Direction::North, &mut surface, SpriteSize::Small, 0, 0, None, 0, &mut gpu));
    assert!(surface.blits.is_empty());
    assert!(gpu.is_empty());
}

// =============================================================================
// Export
// =============================================================================

#[test]
fn png_export_keeps_or_clears_magenta() {
    let mut sheet = SheetBuilder::new();
    sheet.fill(29, 0..32, GREY);
    sheet.set(29, 0, 0, MAGENTA);
    let mut appearances = appearances_with(&sheet);

    let kept = temp_png("kept");
    let fixed = temp_png("fixed");
    appearances.export_sprite_image(30, &kept, false).unwrap();
    appearances.export_sprite_image(30, &fixed, true).unwrap();

    let kept_img = image::open(&kept).unwrap().to_rgba8();
    let fixed_img = image::open(&fixed).unwrap().to_rgba8();
    assert_eq!(kept_img.dimensions(), (32, 32));
    assert_eq!(kept_img.get_pixel(0, 0).0, MAGENTA);
    assert_eq!(fixed_img.get_pixel(0, 0).0[3], 0);
    // other pixels are untouched either way
    assert_eq!(fixed_img.get_pixel(1, 0).0, GREY);
    assert_eq!(kept_img.get_pixel(31, 31).0, GREY);

    let _ = std::fs::remove_file(kept);
    let _ = std::fs::remove_file(fixed);
}

#[test]
fn export_reproduces_every_pixel_in_lossless_formats() {
    let mut sheet = SheetBuilder::new();
    for y in 0..32 {
        for x in 0..32 {
            let alpha = ((x + y * 32) % 256) as u8;
            sheet.set(40, x, y, [(x * 8) as u8, (y * 8) as u8, (x ^ y) as u8, alpha]);
        }
    }
    let mut appearances = appearances_with(&sheet);
    let sprite = appearances.get_sprite(41).unwrap();
    assert!(sprite.pixels.chunks_exact(4).any(|px| px[3] != 0 && px[3] != 255));

    for ext in ["png", "bmp"] {
        let path = temp_png("lossless").with_extension(ext);
        appearances.export_sprite_image(41, &path, false).unwrap();
        let read = image::open(&path).unwrap().to_rgba8();
        assert_eq!(read.dimensions(), (32, 32), "{}", ext);
        assert_eq!(read.as_raw(), &sprite.pixels, "{} pixels differ", ext);
        let _ = std::fs::remove_file(path);
    }
}

#[test]
fn export_of_unknown_sprite_fails() {
    let mut appearances = appearances_with(&SheetBuilder::new());
    let path = temp_png("unknown");
    assert!(appearances.export_sprite_image(9999, &path, false).is_err());
    assert!(!path.exists());
}

#[test]
fn sheet_export_writes_full_sheet() {
    let mut appearances = appearances_with(&SheetBuilder::new());
    let path = temp_png("sheet");
    appearances
        .save_sheet_to_file_by_sprite(77, &path, false)
        .unwrap();
    let img = image::open(&path).unwrap();
    assert_eq!(img.width(), SPRITE_SHEET_SIZE);
    assert_eq!(img.height(), SPRITE_SHEET_SIZE);
    let _ = std::fs::remove_file(path);
}
