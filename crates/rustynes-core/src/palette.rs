//! 2C02 NTSC master palette.
//!
//! The PPU only ever produces palette *indices* (0x00-0x3F); converting
//! those into the RGB triples a host actually draws is the core crate's
//! job, not the PPU's, since different hosts may want different palette
//! tables (NTSC vs. a custom one) without touching the renderer.
//!
//! Indices `$0D`, `$1D`, `$2D`, `$3D` are the well known "blacker than
//! black" entries that can desync NTSC sync on real hardware; indices
//! `$0E-$0F`, `$1E-$1F`, `$2E-$2F`, `$3E-$3F` are unused and render as
//! black. Both are represented here as plain black rather than special-cased,
//! matching how the rest of the emulation community's palette tables treat them.

/// NES master palette, 64 entries, `(R, G, B)`.
#[rustfmt::skip]
pub const NES_PALETTE: [(u8, u8, u8); 64] = [
    (0x75, 0x75, 0x75), (0x27, 0x1B, 0x8F), (0x00, 0x00, 0xAB), (0x47, 0x00, 0x9F),
    (0x8F, 0x00, 0x77), (0xAB, 0x00, 0x13), (0xA7, 0x00, 0x00), (0x7F, 0x0B, 0x00),
    (0x43, 0x2F, 0x00), (0x00, 0x47, 0x00), (0x00, 0x51, 0x00), (0x00, 0x3F, 0x17),
    (0x1B, 0x3F, 0x5F), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00),

    (0xBC, 0xBC, 0xBC), (0x00, 0x73, 0xEF), (0x23, 0x3B, 0xEF), (0x83, 0x00, 0xF3),
    (0xBF, 0x00, 0xBF), (0xE7, 0x00, 0x5B), (0xDB, 0x2B, 0x00), (0xCB, 0x4F, 0x0F),
    (0x8B, 0x73, 0x00), (0x00, 0x97, 0x00), (0x00, 0xAB, 0x00), (0x00, 0x93, 0x3B),
    (0x00, 0x83, 0x8B), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00),

    (0xFF, 0xFF, 0xFF), (0x3F, 0xBF, 0xFF), (0x5F, 0x97, 0xFF), (0xA7, 0x8B, 0xFD),
    (0xF7, 0x7B, 0xFF), (0xFF, 0x77, 0xB7), (0xFF, 0x77, 0x63), (0xFF, 0x9B, 0x3B),
    (0xF3, 0xBF, 0x3F), (0x83, 0xD3, 0x13), (0x4F, 0xDF, 0x4B), (0x58, 0xF8, 0x98),
    (0x00, 0xEB, 0xDB), (0x75, 0x75, 0x75), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00),

    (0xFF, 0xFF, 0xFF), (0xAB, 0xE7, 0xFF), (0xC7, 0xD7, 0xFF), (0xD7, 0xCB, 0xFF),
    (0xFF, 0xC7, 0xFF), (0xFF, 0xC7, 0xDB), (0xFF, 0xBF, 0xB3), (0xFF, 0xDB, 0xAB),
    (0xFF, 0xE7, 0xA3), (0xE3, 0xFF, 0xA3), (0xAB, 0xF3, 0xBF), (0xB3, 0xFF, 0xCF),
    (0x9F, 0xFF, 0xF3), (0xBC, 0xBC, 0xBC), (0x00, 0x00, 0x00), (0x00, 0x00, 0x00),
];

/// Emphasis darkening factor applied to non-emphasized channels, per the
/// PPUMASK emphasis bits ($2001 bits 5-7). Values follow the commonly cited
/// 2C02 emphasis behavior: emphasized channels pass through unchanged,
/// non-emphasized channels are attenuated by ~74.6%.
const EMPHASIS_ATTENUATION: f32 = 0.746;

/// Convert a NES palette index (0x00-0x3F) to an `(R, G, B)` triple.
///
/// Indices are masked to 6 bits so any stray high bits (e.g. from open bus)
/// still land on a valid table entry rather than panicking.
#[must_use]
pub fn palette_to_rgb(index: u8) -> (u8, u8, u8) {
    NES_PALETTE[(index & 0x3F) as usize]
}

/// Apply PPUMASK color-emphasis bits to an RGB triple.
///
/// `emphasis` is the raw 3-bit field from PPUMASK bits 5-7 (red, green, blue).
/// Channels *not* named by a set emphasis bit are attenuated; if no bits are
/// set the color passes through unchanged.
#[must_use]
pub fn apply_emphasis(rgb: (u8, u8, u8), emphasis: u8) -> (u8, u8, u8) {
    if emphasis == 0 {
        return rgb;
    }

    let red_emphasized = emphasis & 0x01 != 0;
    let green_emphasized = emphasis & 0x02 != 0;
    let blue_emphasized = emphasis & 0x04 != 0;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let attenuate = |channel: u8, emphasized: bool| -> u8 {
        if emphasized {
            channel
        } else {
            (f32::from(channel) * EMPHASIS_ATTENUATION) as u8
        }
    };

    (
        attenuate(rgb.0, red_emphasized),
        attenuate(rgb.1, green_emphasized),
        attenuate(rgb.2, blue_emphasized),
    )
}
