//! NES 2C02 PPU (Picture Processing Unit) emulation.
//!
//! This crate provides a cycle-accurate implementation of the NES PPU,
//! responsible for all graphics rendering.
//!
//! # Overview
//!
//! The PPU operates at 3x the CPU clock rate and generates a 256x240 pixel
//! image. It consists of several subsystems:
//!
//! - **Registers**: Control, Mask, Status, OAM Address, Scroll, Address, Data
//! - **Background rendering**: Nametables, pattern tables, attribute tables
//! - **Sprite rendering**: OAM, sprite evaluation, sprite 0 hit detection
//! - **Palette**: 32-byte palette RAM with mirroring
//!
//! # Timing
//!
//! NTSC timing (the primary target):
//! - Master clock: 21.477272 MHz
//! - PPU clock: 5.369318 MHz (master / 4)
//! - 341 dots per scanline
//! - 262 scanlines per frame
//! - 89,341-89,342 dots per frame (odd frame skip)
//!
//! # Usage
//!
//! ```no_run
//! use rustynes_ppu::{Mirroring, Ppu};
//!
//! let mut ppu = Ppu::new(Mirroring::Vertical);
//!
//! // CHR reads/writes are routed through a closure so the cartridge
//! // mapper (which owns CHR ROM/RAM and A12 bank switching) decides
//! // what pattern-table data comes back.
//! let (frame_complete, nmi) = ppu.step_with_chr(|_addr| 0);
//! if nmi {
//!     // Trigger NMI in the CPU core.
//! }
//! let _ = frame_complete;
//!
//! // Access registers from the CPU-side bus.
//! ppu.write_register(0x2000, 0x80, |_addr, _value| {}); // Enable NMI
//! let _status = ppu.read_register(0x2002, |_addr| 0);
//! ```
//!
//! # Features
//!
//! - `serde`: Enable serialization support for save states

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod background;
mod oam;
mod ppu;
mod registers;
mod scroll;
mod sprites;
mod timing;
mod vram;

pub use background::Background;
pub use oam::{Oam, SecondaryOam, Sprite, SpriteAttributes};
pub use ppu::{FRAME_HEIGHT, FRAME_SIZE, FRAME_WIDTH, Ppu};
pub use registers::{PpuCtrl, PpuMask, PpuStatus};
pub use scroll::ScrollRegisters;
pub use sprites::{SpriteEvaluator, SpriteRenderer};
pub use timing::{
    DOTS_PER_SCANLINE, PRE_RENDER_SCANLINE, SCANLINES_PER_FRAME, Timing, VBLANK_START_SCANLINE,
};
pub use vram::{Mirroring, Vram};
