//! Process-wide colour tables.
//!
//! Two read-only palettes are used by the sprite core:
//! - [`MINIMAP_COLORS`] – the 256-entry minimap palette. Indices 0..216 form a
//!   6×6×6 colour cube in steps of 51, the remainder is black.
//! - [`OUTFIT_COLORS`] – the 133-entry outfit palette (19 hues × 7
//!   saturation/intensity rows) used to recolour creature templates.
//!
//! Both are plain constants; nothing here is ever mutated.

/// An opaque RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packs the colour as `0x00RRGGBB`.
    pub const fn to_u32(self) -> u32 {
        (self.b as u32) | ((self.g as u32) << 8) | ((self.r as u32) << 16)
    }

    /// True unless the colour is pure black.
    pub const fn is_set(self) -> bool {
        self.r != 0 || self.g != 0 || self.b != 0
    }
}

/// Number of hue steps in the outfit palette.
pub const OUTFIT_HUE_STEPS: usize = 19;
/// Number of saturation/intensity rows in the outfit palette.
pub const OUTFIT_SI_VALUES: usize = 7;
/// Size of the outfit palette; indices at or above this fall back to 0.
pub const OUTFIT_COLOR_COUNT: usize = OUTFIT_HUE_STEPS * OUTFIT_SI_VALUES;

const fn build_minimap_colors() -> [Rgb; 256] {
    let mut table = [Rgb::new(0, 0, 0); 256];
    let mut i = 0;
    while i < 216 {
        table[i] = Rgb::new((i / 36 * 51) as u8, (i / 6 % 6 * 51) as u8, (i % 6 * 51) as u8);
        i += 1;
    }
    table
}

/// The 256-entry minimap palette.
pub const MINIMAP_COLORS: [Rgb; 256] = build_minimap_colors();

/// Look up a minimap colour by palette byte.
pub fn minimap_color(index: u8) -> Rgb {
    MINIMAP_COLORS[index as usize]
}

/// The outfit palette. Column 0 of every row is a grey ramp, the other 18
/// columns walk the hue circle.
pub const OUTFIT_COLORS: [Rgb; OUTFIT_COLOR_COUNT] = [
    // row 0
    Rgb::new(255, 255, 255), Rgb::new(255, 212, 191), Rgb::new(255, 233, 191), Rgb::new(255, 255, 191),
    Rgb::new(233, 255, 191), Rgb::new(212, 255, 191), Rgb::new(191, 255, 191), Rgb::new(191, 255, 212),
    Rgb::new(191, 255, 233), Rgb::new(191, 255, 255), Rgb::new(191, 233, 255), Rgb::new(191, 212, 255),
    Rgb::new(191, 191, 255), Rgb::new(212, 191, 255), Rgb::new(233, 191, 255), Rgb::new(255, 191, 255),
    Rgb::new(255, 191, 233), Rgb::new(255, 191, 212), Rgb::new(255, 191, 191),
    // row 1
    Rgb::new(218, 218, 218), Rgb::new(191, 159, 143), Rgb::new(191, 175, 143), Rgb::new(191, 191, 143),
    Rgb::new(175, 191, 143), Rgb::new(159, 191, 143), Rgb::new(143, 191, 143), Rgb::new(143, 191, 159),
    Rgb::new(143, 191, 175), Rgb::new(143, 191, 191), Rgb::new(143, 175, 191), Rgb::new(143, 159, 191),
    Rgb::new(143, 143, 191), Rgb::new(159, 143, 191), Rgb::new(175, 143, 191), Rgb::new(191, 143, 191),
    Rgb::new(191, 143, 175), Rgb::new(191, 143, 159), Rgb::new(191, 143, 143),
    // row 2
    Rgb::new(182, 182, 182), Rgb::new(191, 127, 95), Rgb::new(191, 159, 95), Rgb::new(191, 191, 95),
    Rgb::new(159, 191, 95), Rgb::new(127, 191, 95), Rgb::new(95, 191, 95), Rgb::new(95, 191, 127),
    Rgb::new(95, 191, 159), Rgb::new(95, 191, 191), Rgb::new(95, 159, 191), Rgb::new(95, 127, 191),
    Rgb::new(95, 95, 191), Rgb::new(127, 95, 191), Rgb::new(159, 95, 191), Rgb::new(191, 95, 191),
    Rgb::new(191, 95, 159), Rgb::new(191, 95, 127), Rgb::new(191, 95, 95),
    // row 3
    Rgb::new(145, 145, 145), Rgb::new(191, 106, 63), Rgb::new(191, 148, 63), Rgb::new(191, 191, 63),
    Rgb::new(148, 191, 63), Rgb::new(106, 191, 63), Rgb::new(63, 191, 63), Rgb::new(63, 191, 106),
    Rgb::new(63, 191, 148), Rgb::new(63, 191, 191), Rgb::new(63, 148, 191), Rgb::new(63, 106, 191),
    Rgb::new(63, 63, 191), Rgb::new(106, 63, 191), Rgb::new(148, 63, 191), Rgb::new(191, 63, 191),
    Rgb::new(191, 63, 148), Rgb::new(191, 63, 106), Rgb::new(191, 63, 63),
    // row 4
    Rgb::new(109, 109, 109), Rgb::new(255, 85, 0), Rgb::new(255, 170, 0), Rgb::new(255, 255, 0),
    Rgb::new(170, 255, 0), Rgb::new(84, 255, 0), Rgb::new(0, 255, 0), Rgb::new(0, 255, 85),
    Rgb::new(0, 255, 169), Rgb::new(0, 255, 255), Rgb::new(0, 169, 255), Rgb::new(0, 84, 255),
    Rgb::new(0, 0, 255), Rgb::new(84, 0, 255), Rgb::new(170, 0, 255), Rgb::new(255, 0, 255),
    Rgb::new(255, 0, 170), Rgb::new(255, 0, 85), Rgb::new(255, 0, 0),
    // row 5
    Rgb::new(72, 72, 72), Rgb::new(191, 63, 0), Rgb::new(191, 127, 0), Rgb::new(191, 191, 0),
    Rgb::new(127, 191, 0), Rgb::new(63, 191, 0), Rgb::new(0, 191, 0), Rgb::new(0, 191, 63),
    Rgb::new(0, 191, 127), Rgb::new(0, 191, 191), Rgb::new(0, 127, 191), Rgb::new(0, 63, 191),
    Rgb::new(0, 0, 191), Rgb::new(63, 0, 191), Rgb::new(127, 0, 191), Rgb::new(191, 0, 191),
    Rgb::new(191, 0, 127), Rgb::new(191, 0, 63), Rgb::new(191, 0, 0),
    // row 6
    Rgb::new(36, 36, 36), Rgb::new(127, 42, 0), Rgb::new(127, 85, 0), Rgb::new(127, 127, 0),
    Rgb::new(85, 127, 0), Rgb::new(42, 127, 0), Rgb::new(0, 127, 0), Rgb::new(0, 127, 42),
    Rgb::new(0, 127, 84), Rgb::new(0, 127, 127), Rgb::new(0, 84, 127), Rgb::new(0, 42, 127),
    Rgb::new(0, 0, 127), Rgb::new(42, 0, 127), Rgb::new(85, 0, 127), Rgb::new(127, 0, 127),
    Rgb::new(127, 0, 85), Rgb::new(127, 0, 42), Rgb::new(127, 0, 0),
];

/// Look up an outfit colour; out-of-range indices resolve to entry 0.
pub fn outfit_color(index: u8) -> Rgb {
    OUTFIT_COLORS
        .get(index as usize)
        .copied()
        .unwrap_or(OUTFIT_COLORS[0])
}
