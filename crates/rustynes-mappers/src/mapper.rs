//! Mapper Trait Definition.
//!
//! This module defines the core `Mapper` trait that all NES cartridge mappers
//! must implement. Mappers handle memory banking for PRG-ROM, CHR-ROM/RAM,
//! and provide mirroring control.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nametable mirroring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mirroring {
    /// Horizontal mirroring (vertical arrangement).
    #[default]
    Horizontal,
    /// Vertical mirroring (horizontal arrangement).
    Vertical,
    /// Single-screen, lower bank.
    SingleScreenLower,
    /// Single-screen, upper bank.
    SingleScreenUpper,
    /// Four-screen (uses extra VRAM).
    FourScreen,
}

impl Mirroring {
    /// Convert a nametable address ($2000-$2FFF) to a physical VRAM offset.
    ///
    /// Returns an offset into a 2KB VRAM array for `Horizontal`, `Vertical`,
    /// `SingleScreenLower`, and `SingleScreenUpper`. For `FourScreen`, the
    /// offset spans the full 4KB nametable range (0-0xFFF) and the caller
    /// must back it with cartridge-provided VRAM rather than the PPU's 2KB.
    ///
    /// # Examples
    ///
    /// ```
    /// use rustynes_mappers::Mirroring;
    ///
    /// let mirror = Mirroring::Horizontal;
    /// assert_eq!(mirror.map_address(0x2000), 0x0000); // Nametable 0 -> A
    /// assert_eq!(mirror.map_address(0x2400), 0x0000); // Nametable 1 -> A
    /// assert_eq!(mirror.map_address(0x2800), 0x0400); // Nametable 2 -> B
    /// assert_eq!(mirror.map_address(0x2C00), 0x0400); // Nametable 3 -> B
    /// ```
    #[must_use]
    pub fn map_address(self, addr: u16) -> u16 {
        let addr = addr & 0x0FFF;
        let nametable = (addr >> 10) & 0x03;
        let offset = addr & 0x03FF;

        let bank = match self {
            Mirroring::Horizontal => match nametable {
                0 | 1 => 0,
                2 | 3 => 1,
                _ => unreachable!(),
            },
            Mirroring::Vertical => match nametable {
                0 | 2 => 0,
                1 | 3 => 1,
                _ => unreachable!(),
            },
            Mirroring::SingleScreenLower => 0,
            Mirroring::SingleScreenUpper => 1,
            Mirroring::FourScreen => nametable,
        };

        (bank << 10) | offset
    }

    /// Returns true if this mirroring mode requires the full 4KB of
    /// cartridge-provided nametable VRAM rather than the PPU's internal 2KB.
    ///
    /// # Examples
    ///
    /// ```
    /// use rustynes_mappers::Mirroring;
    ///
    /// assert!(!Mirroring::Horizontal.is_four_screen());
    /// assert!(Mirroring::FourScreen.is_four_screen());
    /// ```
    #[must_use]
    pub const fn is_four_screen(self) -> bool {
        matches!(self, Mirroring::FourScreen)
    }
}

/// Mapper trait.
///
/// All NES cartridge mappers must implement this trait. The mapper handles:
/// - PRG-ROM/RAM memory access (CPU $8000-$FFFF, optionally $6000-$7FFF)
/// - CHR-ROM/RAM memory access (PPU $0000-$1FFF)
/// - Nametable mirroring control
/// - Optional IRQ generation
/// - Optional scanline counting
pub trait Mapper: Send + Sync {
    /// Read a byte from PRG memory (CPU address space).
    ///
    /// Address range: $6000-$FFFF
    /// - $6000-$7FFF: PRG-RAM (battery-backed or work RAM)
    /// - $8000-$FFFF: PRG-ROM (banked)
    fn read_prg(&self, addr: u16) -> u8;

    /// Write a byte to PRG memory (CPU address space).
    ///
    /// Address range: $6000-$FFFF
    /// - $6000-$7FFF: PRG-RAM writes (if present)
    /// - $8000-$FFFF: Mapper register writes
    fn write_prg(&mut self, addr: u16, val: u8);

    /// Read a byte from CHR memory (PPU address space).
    ///
    /// Address range: $0000-$1FFF
    fn read_chr(&self, addr: u16) -> u8;

    /// Write a byte to CHR memory (PPU address space).
    ///
    /// Only works if the cartridge has CHR-RAM instead of CHR-ROM.
    fn write_chr(&mut self, addr: u16, val: u8);

    /// Get the current nametable mirroring mode.
    fn mirroring(&self) -> Mirroring;

    /// Check if the mapper has a pending IRQ.
    fn irq_pending(&self) -> bool {
        false
    }

    /// Acknowledge/clear the IRQ.
    fn irq_acknowledge(&mut self) {}

    /// Clock the mapper (called every CPU cycle).
    ///
    /// Some mappers (like MMC3) count CPU cycles for IRQ timing.
    fn clock(&mut self, _cycles: u8) {}

    /// Notify the mapper of a scanline (called every PPU scanline).
    ///
    /// Some mappers (like MMC3) count scanlines for IRQ timing.
    fn scanline(&mut self) {}

    /// Notify the mapper of PPU A12 rising edge.
    ///
    /// MMC3 uses A12 for IRQ timing.
    fn ppu_a12_rising(&mut self) {}

    /// Get the mapper number (iNES mapper ID).
    fn mapper_number(&self) -> u16;

    /// Get the mapper name.
    fn mapper_name(&self) -> &'static str;

    /// Check if the mapper has battery-backed RAM.
    fn has_battery(&self) -> bool {
        false
    }

    /// Get a reference to the battery-backed RAM for saving.
    fn battery_ram(&self) -> Option<&[u8]> {
        None
    }

    /// Set the battery-backed RAM content (for loading saves).
    fn set_battery_ram(&mut self, _data: &[u8]) {}

    /// Reset the mapper to its initial state.
    fn reset(&mut self) {}

    /// Clone this mapper into a fresh boxed trait object.
    ///
    /// Used by the save-state engine to snapshot cartridge-side state
    /// (bank registers, CHR-RAM, PRG-RAM) without knowing the concrete
    /// mapper type.
    fn clone_mapper(&self) -> Box<dyn Mapper>;

    /// Serialize the mapper's mutable runtime state (bank registers, IRQ
    /// counters, CHR/PRG-RAM contents) into a flat byte buffer.
    ///
    /// PRG-ROM/CHR-ROM are not included since they come from the cartridge
    /// and are validated separately by the save state's ROM hash; mappers
    /// with no mutable state beyond what `Rom` already determines can rely
    /// on the default empty buffer.
    fn save_state(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Restore mutable runtime state from a buffer produced by `save_state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is truncated or malformed.
    fn load_state(&mut self, _data: &[u8]) -> Result<(), &'static str> {
        Ok(())
    }
}
