//! Sprite sheet registry and atlas decoding.
//!
//! Client sprites are packed into 384×384 RGBA atlases ("sheets"). Each sheet
//! covers an inclusive range of sprite ids and uses one [`SpriteLayout`] for
//! all of its cells. [`SpriteAppearances`] owns the sheet descriptors, decodes
//! a sheet the first time one of its sprites is requested and caches the
//! cropped per-sprite buffers ([`SpritePixels`]) by sprite id.
//!
//! Raw file access goes through a [`SheetSource`] so the registry can be fed
//! from disk ([`FsSheetSource`]) or from memory ([`MemorySheetSource`]).
//!
//! # Catalog format
//!
//! `catalog-content.json` is an array of entries:
//!
//! ```json
//! [
//!   { "type": "appearances", "file": "appearances.dat" },
//!   { "type": "sprite", "file": "sprites-1.bmp", "spritetype": 0,
//!     "firstspriteid": 1, "lastspriteid": 144 }
//! ]
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use image::{ImageFormat, Rgba, RgbaImage};
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use serde::Deserialize;

/// Edge length of a sheet in pixels.
pub const SPRITE_SHEET_SIZE: u32 = 384;
/// Size of a decoded sheet in bytes.
pub const SPRITE_SHEET_BYTES: usize = (SPRITE_SHEET_SIZE * SPRITE_SHEET_SIZE * 4) as usize;
/// Name of the catalog index inside a catalog directory.
pub const CATALOG_FILE: &str = "catalog-content.json";

/// Reserved colour mapped to transparent on request when exporting.
const MAGENTA: [u8; 3] = [0xFF, 0x00, 0xFF];

/// Cell footprint of every sprite in a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpriteLayout {
    #[default]
    OneByOne,
    OneByTwo,
    TwoByOne,
    TwoByTwo,
}

impl SpriteLayout {
    /// Map the catalog `spritetype` value to a layout.
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(SpriteLayout::OneByOne),
            1 => Some(SpriteLayout::OneByTwo),
            2 => Some(SpriteLayout::TwoByOne),
            3 => Some(SpriteLayout::TwoByTwo),
            _ => None,
        }
    }

    /// Pixel size of one sprite in this layout.
    pub fn sprite_size(self) -> PixelSize {
        match self {
            SpriteLayout::OneByOne => PixelSize::new(32, 32),
            SpriteLayout::OneByTwo => PixelSize::new(32, 64),
            SpriteLayout::TwoByOne => PixelSize::new(64, 32),
            SpriteLayout::TwoByTwo => PixelSize::new(64, 64),
        }
    }

    /// Number of sprites one sheet can hold in this layout.
    pub fn capacity(self) -> u32 {
        let size = self.sprite_size();
        (SPRITE_SHEET_SIZE / size.width) * (SPRITE_SHEET_SIZE / size.height)
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for PixelSize {
    fn default() -> Self {
        Self::new(32, 32)
    }
}

/// One decoded sprite: RGBA pixels plus their dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpritePixels {
    pub pixels: Vec<u8>,
    pub size: PixelSize,
}

impl SpritePixels {
    /// Fully transparent buffer.
    pub fn blank(size: PixelSize) -> Self {
        Self {
            pixels: vec![0; size.area() * 4],
            size,
        }
    }

    /// Wrap an RGBA buffer, checking its length.
    pub fn from_rgba(size: PixelSize, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == size.area() * 4).then_some(Self { pixels, size })
    }

    /// Write the sprite to a raster file; format follows the extension.
    pub fn save(&self, path: &Path, fix_magenta: bool) -> Result<(), SheetError> {
        write_rgba(path, self.size, &self.pixels, fix_magenta)
    }
}

/// Errors raised while reading, decoding or exporting sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetError {
    Io { path: PathBuf, message: String },
    Decode(String),
    BadDimensions { width: u32, height: u32 },
    UnknownSprite(u32),
    /// The sprite's cell does not fit inside its sheet.
    OutOfSheet(u32),
    NotLoaded,
    Export(String),
}

impl std::fmt::Display for SheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetError::Io { path, message } => {
                write!(f, "failed to read {}: {}", path.display(), message)
            }
            SheetError::Decode(msg) => write!(f, "failed to decode sheet: {}", msg),
            SheetError::BadDimensions { width, height } => write!(
                f,
                "sheet is {}x{}, expected {}x{}",
                width, height, SPRITE_SHEET_SIZE, SPRITE_SHEET_SIZE
            ),
            SheetError::UnknownSprite(id) => write!(f, "sprite {} is not in any sheet", id),
            SheetError::OutOfSheet(id) => write!(f, "sprite {} lies outside its sheet", id),
            SheetError::NotLoaded => write!(f, "sheet is not loaded"),
            SheetError::Export(msg) => write!(f, "failed to export image: {}", msg),
        }
    }
}

impl std::error::Error for SheetError {}

/// Errors raised while building the sheet catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    Io { path: PathBuf, message: String },
    Json(String),
    EmptyRange { first: u32, last: u32 },
    OverlappingRanges { first: (u32, u32), second: (u32, u32) },
    OversizedRange { first: u32, last: u32, capacity: u32 },
    IdOverflow { last: u32 },
    UnknownLayout { file: String, layout: u32 },
    Sheet(SheetError),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io { path, message } => {
                write!(f, "failed to read {}: {}", path.display(), message)
            }
            CatalogError::Json(msg) => write!(f, "malformed catalog: {}", msg),
            CatalogError::EmptyRange { first, last } => {
                write!(f, "sheet range [{}, {}] is empty", first, last)
            }
            CatalogError::OverlappingRanges { first, second } => write!(
                f,
                "sheet ranges [{}, {}] and [{}, {}] overlap",
                first.0, first.1, second.0, second.1
            ),
            CatalogError::OversizedRange {
                first,
                last,
                capacity,
            } => write!(
                f,
                "sheet range [{}, {}] exceeds the {} sprites a sheet holds",
                first, last, capacity
            ),
            CatalogError::IdOverflow { last } => {
                write!(f, "sprite id {} leaves no room for the sprite count", last)
            }
            CatalogError::UnknownLayout { file, layout } => {
                write!(f, "sheet {} has unknown sprite type {}", file, layout)
            }
            CatalogError::Sheet(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<SheetError> for CatalogError {
    fn from(e: SheetError) -> Self {
        CatalogError::Sheet(e)
    }
}

/// Byte source for catalog and sheet files.
pub trait SheetSource: Send + Sync {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// Reads files from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSheetSource;

impl SheetSource for FsSheetSource {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Serves files from memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySheetSource {
    files: FxHashMap<PathBuf, Vec<u8>>,
}

impl MemorySheetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }
}

impl SheetSource for MemorySheetSource {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }
}

/// Descriptor of one packed atlas.
#[derive(Debug, Clone)]
pub struct SpriteSheet {
    pub first_id: u32,
    pub last_id: u32,
    pub layout: SpriteLayout,
    pub path: PathBuf,
    data: Option<Vec<u8>>,
}

impl SpriteSheet {
    pub fn new(first_id: u32, last_id: u32, layout: SpriteLayout, path: impl Into<PathBuf>) -> Self {
        Self {
            first_id,
            last_id,
            layout,
            path: path.into(),
            data: None,
        }
    }

    pub fn sprite_size(&self) -> PixelSize {
        self.layout.sprite_size()
    }

    pub fn contains(&self, id: u32) -> bool {
        (self.first_id..=self.last_id).contains(&id)
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// Decoded RGBA atlas, if loaded.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Write the whole atlas to a raster file.
    pub fn export_sheet_image(&self, path: &Path, fix_magenta: bool) -> Result<(), SheetError> {
        let data = self.data.as_deref().ok_or(SheetError::NotLoaded)?;
        write_rgba(
            path,
            PixelSize::new(SPRITE_SHEET_SIZE, SPRITE_SHEET_SIZE),
            data,
            fix_magenta,
        )
    }

    /// Copy one sprite's sub-rectangle out of the atlas.
    fn crop(&self, id: u32) -> Result<SpritePixels, SheetError> {
        if !self.contains(id) {
            return Err(SheetError::UnknownSprite(id));
        }
        let data = self.data.as_deref().ok_or(SheetError::NotLoaded)?;
        let size = self.sprite_size();
        let offset = (id - self.first_id) as usize;
        let columns = (SPRITE_SHEET_SIZE / size.width) as usize;
        let row = offset / columns;
        let column = offset % columns;
        let height = size.height as usize;
        if row >= SPRITE_SHEET_SIZE as usize / height {
            return Err(SheetError::OutOfSheet(id));
        }

        let row_bytes = size.width as usize * 4;
        let sheet_row_bytes = SPRITE_SHEET_SIZE as usize * 4;
        let mut pixels = Vec::with_capacity(size.area() * 4);
        for y in 0..height {
            let sheet_y = row * height + y;
            let start = sheet_y * sheet_row_bytes + column * row_bytes;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }
        Ok(SpritePixels { pixels, size })
    }
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    kind: String,
    file: String,
    #[serde(default)]
    spritetype: u32,
    #[serde(default)]
    firstspriteid: u32,
    #[serde(default)]
    lastspriteid: u32,
}

/// Check a sorted sheet list and return the resulting sprites count.
fn validate_sheets(sheets: &[SpriteSheet]) -> Result<u32, CatalogError> {
    for sheet in sheets {
        if sheet.first_id > sheet.last_id {
            return Err(CatalogError::EmptyRange {
                first: sheet.first_id,
                last: sheet.last_id,
            });
        }
        let capacity = sheet.layout.capacity();
        if sheet.last_id - sheet.first_id >= capacity {
            return Err(CatalogError::OversizedRange {
                first: sheet.first_id,
                last: sheet.last_id,
                capacity,
            });
        }
    }
    for pair in sheets.windows(2) {
        if pair[0].last_id >= pair[1].first_id {
            return Err(CatalogError::OverlappingRanges {
                first: (pair[0].first_id, pair[0].last_id),
                second: (pair[1].first_id, pair[1].last_id),
            });
        }
    }
    match sheets.last() {
        Some(last) => last
            .last_id
            .checked_add(1)
            .ok_or(CatalogError::IdOverflow { last: last.last_id }),
        None => Ok(0),
    }
}

/// Decode a packed sheet file into a 384×384 RGBA buffer.
pub fn decode_sheet(bytes: &[u8]) -> Result<Vec<u8>, SheetError> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Bmp)
        .map_err(|e| SheetError::Decode(e.to_string()))?;
    let rgba = image.to_rgba8();
    if rgba.width() != SPRITE_SHEET_SIZE || rgba.height() != SPRITE_SHEET_SIZE {
        return Err(SheetError::BadDimensions {
            width: rgba.width(),
            height: rgba.height(),
        });
    }
    Ok(rgba.into_raw())
}

/// Encode a 384×384 RGBA buffer the way sheets are stored on disk.
pub fn encode_sheet(rgba: &[u8]) -> Result<Vec<u8>, SheetError> {
    let image = RgbaImage::from_raw(SPRITE_SHEET_SIZE, SPRITE_SHEET_SIZE, rgba.to_vec()).ok_or(
        SheetError::BadDimensions {
            width: SPRITE_SHEET_SIZE,
            height: (rgba.len() / (SPRITE_SHEET_SIZE as usize * 4)) as u32,
        },
    )?;
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Bmp)
        .map_err(|e| SheetError::Export(e.to_string()))?;
    Ok(out.into_inner())
}

fn write_rgba(path: &Path, size: PixelSize, pixels: &[u8], fix_magenta: bool) -> Result<(), SheetError> {
    let mut image = RgbaImage::from_raw(size.width, size.height, pixels.to_vec()).ok_or(
        SheetError::BadDimensions {
            width: size.width,
            height: size.height,
        },
    )?;
    if fix_magenta {
        for px in image.pixels_mut() {
            if px.0[..3] == MAGENTA {
                *px = Rgba([0, 0, 0, 0]);
            }
        }
    }
    image
        .save(path)
        .map_err(|e| SheetError::Export(e.to_string()))
}

/// Registry of sprite sheets keyed by sprite-id ranges.
pub struct SpriteAppearances {
    source: Arc<dyn SheetSource>,
    sheets: Vec<SpriteSheet>,
    sprites: FxHashMap<u32, Rc<SpritePixels>>,
    sprites_count: u32,
    appearance_file: String,
}

impl Default for SpriteAppearances {
    fn default() -> Self {
        Self::new(Arc::new(FsSheetSource))
    }
}

impl SpriteAppearances {
    pub fn new(source: Arc<dyn SheetSource>) -> Self {
        Self {
            source,
            sheets: Vec::new(),
            sprites: FxHashMap::default(),
            sprites_count: 0,
            appearance_file: String::new(),
        }
    }

    /// Shared handle to the byte source, for background loading.
    pub fn source(&self) -> Arc<dyn SheetSource> {
        Arc::clone(&self.source)
    }

    pub fn sprites_count(&self) -> u32 {
        self.sprites_count
    }

    pub fn set_sprites_count(&mut self, count: u32) {
        self.sprites_count = count;
    }

    pub fn appearance_file_name(&self) -> &str {
        &self.appearance_file
    }

    pub fn sheets(&self) -> &[SpriteSheet] {
        &self.sheets
    }

    /// Number of decoded sprites currently cached.
    pub fn cached_sprites(&self) -> usize {
        self.sprites.len()
    }

    /// Parse `catalog-content.json` in `dir` and register its sheets.
    ///
    /// With `load_data` every sheet is decoded immediately; otherwise sheets
    /// decode lazily on first use.
    pub fn load_catalog_content(&mut self, dir: &Path, load_data: bool) -> Result<(), CatalogError> {
        let catalog_path = dir.join(CATALOG_FILE);
        let bytes = self.source.read(&catalog_path).map_err(|e| CatalogError::Io {
            path: catalog_path.clone(),
            message: e.to_string(),
        })?;
        let entries: Vec<CatalogEntry> =
            serde_json::from_slice(&bytes).map_err(|e| CatalogError::Json(e.to_string()))?;

        let mut sheets = Vec::new();
        for entry in entries {
            match entry.kind.as_str() {
                "appearances" => self.appearance_file = entry.file,
                "sprite" => {
                    let layout = SpriteLayout::from_index(entry.spritetype).ok_or_else(|| {
                        CatalogError::UnknownLayout {
                            file: entry.file.clone(),
                            layout: entry.spritetype,
                        }
                    })?;
                    sheets.push(SpriteSheet::new(
                        entry.firstspriteid,
                        entry.lastspriteid,
                        layout,
                        dir.join(&entry.file),
                    ));
                }
                other => debug!("Ignoring catalog entry of type '{}'", other),
            }
        }
        self.set_sheets(sheets)?;

        info!(
            "Loaded catalog {}: {} sheets, {} sprites",
            catalog_path.display(),
            self.sheets.len(),
            self.sprites_count
        );

        if load_data {
            for index in 0..self.sheets.len() {
                self.load_sprite_sheet(index)?;
            }
        }
        Ok(())
    }

    /// Replace the sheet list, sorting by first id and validating that the
    /// ranges do not overlap and fit their layout.
    pub fn set_sheets(&mut self, mut sheets: Vec<SpriteSheet>) -> Result<(), CatalogError> {
        sheets.sort_by_key(|s| s.first_id);
        self.sprites_count = validate_sheets(&sheets)?;
        self.sheets = sheets;
        self.sprites.clear();
        Ok(())
    }

    /// Register one more sheet, keeping the catalog sorted and validated.
    /// On error the catalog is left as it was.
    pub fn add_sprite_sheet(&mut self, sheet: SpriteSheet) -> Result<(), CatalogError> {
        let index = self.sheets.partition_point(|s| s.first_id <= sheet.first_id);
        self.sheets.insert(index, sheet);
        match validate_sheets(&self.sheets) {
            Ok(count) => {
                self.sprites_count = count;
                Ok(())
            }
            Err(e) => {
                self.sheets.remove(index);
                Err(e)
            }
        }
    }

    /// Index of the sheet whose range contains `id`.
    pub fn sheet_index(&self, id: u32) -> Option<usize> {
        let index = self.sheets.partition_point(|s| s.last_id < id);
        self.sheets
            .get(index)
            .filter(|s| s.contains(id))
            .map(|_| index)
    }

    /// Sheet whose range contains `id`, optionally decoding it first.
    pub fn sheet_by_sprite_id(&mut self, id: u32, load: bool) -> Option<&SpriteSheet> {
        let index = self.sheet_index(id)?;
        if load && let Err(e) = self.load_sprite_sheet(index) {
            warn!("Failed to load sheet for sprite {}: {}", id, e);
        }
        self.sheets.get(index)
    }

    /// Pixel size of a sprite according to its sheet layout, without decoding.
    pub fn sprite_size(&self, id: u32) -> Option<PixelSize> {
        self.sheet_index(id).map(|i| self.sheets[i].sprite_size())
    }

    /// Decode the sheet at `index` once; later calls are no-ops.
    pub fn load_sprite_sheet(&mut self, index: usize) -> Result<(), SheetError> {
        let Some(sheet) = self.sheets.get(index) else {
            return Err(SheetError::NotLoaded);
        };
        if sheet.is_loaded() {
            return Ok(());
        }
        let bytes = self.source.read(&sheet.path).map_err(|e| SheetError::Io {
            path: sheet.path.clone(),
            message: e.to_string(),
        })?;
        let data = decode_sheet(&bytes)?;
        debug!(
            "Decoded sheet {} [{}, {}]",
            sheet.path.display(),
            sheet.first_id,
            sheet.last_id
        );
        self.sheets[index].data = Some(data);
        Ok(())
    }

    /// Store a sheet decoded elsewhere (background loader).
    ///
    /// Returns false if the index is unknown, the buffer has the wrong size or
    /// the sheet was already loaded.
    pub fn install_decoded_sheet(&mut self, index: usize, data: Vec<u8>) -> bool {
        match self.sheets.get_mut(index) {
            Some(sheet) if !sheet.is_loaded() && data.len() == SPRITE_SHEET_BYTES => {
                sheet.data = Some(data);
                true
            }
            _ => false,
        }
    }

    /// Decoded pixels of one sprite, cached by id.
    ///
    /// Returns `None` for ids outside every sheet and for sprites whose sheet
    /// fails to decode; the failure is logged.
    pub fn get_sprite(&mut self, id: u32) -> Option<Rc<SpritePixels>> {
        if let Some(sprite) = self.sprites.get(&id) {
            return Some(Rc::clone(sprite));
        }
        let index = self.sheet_index(id)?;
        if let Err(e) = self.load_sprite_sheet(index) {
            warn!("Sprite {} unavailable: {}", id, e);
            return None;
        }
        match self.sheets[index].crop(id) {
            Ok(pixels) => {
                let pixels = Rc::new(pixels);
                self.sprites.insert(id, Rc::clone(&pixels));
                Some(pixels)
            }
            Err(e) => {
                warn!("Sprite {} unavailable: {}", id, e);
                None
            }
        }
    }

    /// Export one sprite to a raster file.
    pub fn export_sprite_image(&mut self, id: u32, path: &Path, fix_magenta: bool) -> Result<(), SheetError> {
        let sprite = self.get_sprite(id).ok_or(SheetError::UnknownSprite(id))?;
        sprite.save(path, fix_magenta)
    }

    /// Drop one sprite from the decoded cache. The sheet stays loaded.
    pub fn forget_sprite(&mut self, id: u32) {
        self.sprites.remove(&id);
    }

    /// Write a sprite's pixels exactly as decoded.
    pub fn save_sprite_to_file(&mut self, id: u32, path: &Path) -> Result<(), SheetError> {
        self.export_sprite_image(id, path, false)
    }

    /// Export the sheet at `index` to a raster file.
    pub fn save_sheet_to_file(&mut self, index: usize, path: &Path, fix_magenta: bool) -> Result<(), SheetError> {
        self.load_sprite_sheet(index)?;
        self.sheets[index].export_sheet_image(path, fix_magenta)
    }

    /// Export the sheet containing sprite `id`.
    pub fn save_sheet_to_file_by_sprite(&mut self, id: u32, path: &Path, fix_magenta: bool) -> Result<(), SheetError> {
        let index = self.sheet_index(id).ok_or(SheetError::UnknownSprite(id))?;
        self.save_sheet_to_file(index, path, fix_magenta)
    }

    /// Drop decoded data but keep the sheet descriptors.
    pub fn unload(&mut self) {
        for sheet in &mut self.sheets {
            sheet.data = None;
        }
        self.sprites.clear();
    }

    /// Drop everything.
    pub fn terminate(&mut self) {
        self.unload();
        self.sheets.clear();
        self.sprites_count = 0;
        self.appearance_file.clear();
    }
}
