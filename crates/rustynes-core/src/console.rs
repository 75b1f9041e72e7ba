//! NES Console Implementation.
//!
//! The Console struct provides the high-level emulation API, managing the
//! CPU, PPU, APU, and mapper integration with proper timing.

use crate::bus::{ControllerState, NesBus};
use rustynes_cpu::Cpu;
use rustynes_mappers::{Mapper, Rom, RomError, create_mapper};

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

/// NES emulation timing constants.
pub mod timing {
    /// Master clock frequency (NTSC).
    pub const MASTER_CLOCK_NTSC: u32 = 21_477_272;
    /// CPU clock frequency (NTSC).
    pub const CPU_CLOCK_NTSC: u32 = MASTER_CLOCK_NTSC / 12;
    /// PPU clock frequency (NTSC).
    pub const PPU_CLOCK_NTSC: u32 = MASTER_CLOCK_NTSC / 4;
    /// CPU cycles per frame (NTSC).
    pub const CPU_CYCLES_PER_FRAME: u32 = 29_780;
    /// PPU dots per scanline.
    pub const PPU_DOTS_PER_SCANLINE: u16 = 341;
    /// Total scanlines (including vblank).
    pub const PPU_SCANLINES: u16 = 262;
    /// Target frame rate (NTSC).
    pub const FRAME_RATE_NTSC: f64 = 60.0988;
}

/// Console error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsoleError {
    /// ROM loading error.
    #[error("ROM error: {0}")]
    RomError(#[from] RomError),
    /// Invalid state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Address outside the windows exposed by `read`/`write` ($0000-$1FFF, $6000-$7FFF).
    #[error("address ${0:04X} is outside the readable/writable window")]
    InvalidAddress(u16),
    /// The CPU has jammed on an illegal opcode; the machine no longer executes instructions.
    #[error("console has crashed (CPU jammed)")]
    Crashed,
}

/// NES console emulator.
pub struct Console {
    /// 6502 CPU.
    pub(crate) cpu: Cpu,
    /// System bus (PPU, APU, mapper, RAM).
    pub(crate) bus: NesBus,
    /// Frame buffer (256x240 RGBA).
    framebuffer: Vec<u8>,
    /// Frame buffer (256x240 RGB), the literal byte layout the host-facing
    /// `step` returns; kept alongside the RGBA buffer rather than computed
    /// per access so `step` can hand back a borrow.
    rgb_framebuffer: Vec<u8>,
    /// Audio sample buffer.
    audio_buffer: Vec<f32>,
    /// Total CPU cycles executed.
    pub(crate) total_cycles: u64,
    /// Frame counter.
    pub(crate) frame_count: u64,
    /// Is emulation running?
    pub(crate) running: bool,
}

impl Console {
    /// Create a new console with the given ROM.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM cannot be loaded or uses an unsupported mapper.
    pub fn new(rom_data: &[u8]) -> Result<Self, ConsoleError> {
        let rom = Rom::load(rom_data)?;
        let mapper = create_mapper(&rom)?;
        Self::with_mapper(mapper)
    }

    /// Create a new console from ROM bytes (alias for `new`).
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM cannot be loaded or uses an unsupported mapper.
    pub fn from_rom_bytes(rom_data: &[u8]) -> Result<Self, ConsoleError> {
        Self::new(rom_data)
    }

    /// Create a new console from ROM bytes with sample rate configuration.
    ///
    /// Note: The sample rate is currently unused as the APU handles resampling internally.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM cannot be loaded or uses an unsupported mapper.
    pub fn from_rom_bytes_with_sample_rate(
        rom_data: &[u8],
        _sample_rate: u32,
    ) -> Result<Self, ConsoleError> {
        Self::new(rom_data)
    }

    /// Create a console with a pre-created mapper.
    ///
    /// # Errors
    ///
    /// Returns an error if the console cannot be initialized.
    pub fn with_mapper(mapper: Box<dyn Mapper>) -> Result<Self, ConsoleError> {
        let bus = NesBus::new(mapper);
        let cpu = Cpu::new();

        Ok(Self {
            cpu,
            bus,
            framebuffer: vec![0; 256 * 240 * 4],
            rgb_framebuffer: vec![0; 256 * 240 * 3],
            audio_buffer: Vec::with_capacity(2048),
            total_cycles: 0,
            frame_count: 0,
            running: true,
        })
    }

    /// Reset the console to initial state.
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
        self.bus.reset();
        self.total_cycles = 0;
        self.running = true;
    }

    /// Power on the console (cold boot).
    pub fn power_on(&mut self) {
        self.reset();
    }

    /// Run emulation for one CPU instruction.
    ///
    /// Returns the number of CPU cycles executed. This is the lower-level,
    /// instruction-granular building block that [`Console::step_frame`] and
    /// the frame-count-oriented [`Console::step`] drive in a loop; it is not
    /// part of the host-facing surface but stays public for tests and tools
    /// that want per-instruction visibility.
    pub fn step_instruction(&mut self) -> u8 {
        if !self.running {
            return 0;
        }

        // Handle DMC DMA stall
        if self.bus.dmc_stall_active() {
            self.bus.decrement_dmc_stall();
            self.step_components(1);
            return 1;
        }

        // Handle OAM DMA
        if self.bus.oam_dma_pending() {
            let dma_cycles = self.bus.execute_oam_dma();
            self.step_components(dma_cycles);
            return dma_cycles as u8;
        }

        // Handle interrupts. The IRQ line is level-triggered: re-sample it
        // every instruction boundary rather than latching it once, and let
        // the CPU's own I-flag/penultimate-cycle polling decide whether to
        // service it.
        if self.bus.nmi_pending() {
            self.bus.acknowledge_nmi();
            self.cpu.trigger_nmi();
        }
        self.cpu.set_irq(self.bus.irq_pending());

        // Execute one CPU instruction
        let cycles = self.cpu.step(&mut self.bus);
        self.step_components(u16::from(cycles));
        self.bus.add_cpu_cycles(cycles);
        self.total_cycles += u64::from(cycles);

        cycles
    }

    /// Step PPU and APU for the given number of CPU cycles.
    fn step_components(&mut self, cpu_cycles: u16) {
        for _ in 0..cpu_cycles {
            // Step PPU (3 dots per CPU cycle)
            self.bus.step_ppu();

            // Step APU (1:1 with CPU)
            if let Some(sample) = self.bus.step_apu() {
                self.audio_buffer.push(sample);
            }
        }
    }

    /// Run emulation for one frame (approximately 29,780 CPU cycles).
    ///
    /// Returns the actual number of CPU cycles executed.
    pub fn step_frame(&mut self) -> u64 {
        let start_cycles = self.total_cycles;
        let target_cycles = self.total_cycles + u64::from(timing::CPU_CYCLES_PER_FRAME);

        while self.total_cycles < target_cycles && self.running {
            self.step_instruction();
        }

        // Copy PPU framebuffer
        self.update_framebuffer();
        self.frame_count += 1;

        self.total_cycles - start_cycles
    }

    /// Run emulation for one frame with cycle-accurate timing.
    ///
    /// This is an alias for `step_frame()` for API compatibility.
    /// Returns the actual number of CPU cycles executed.
    pub fn step_frame_accurate(&mut self) -> u64 {
        self.step_frame()
    }

    /// Update the framebuffer from PPU output.
    fn update_framebuffer(&mut self) {
        let ppu_buffer = self.bus.ppu.frame_buffer();
        let emphasis = self.bus.ppu.mask_bits() >> 5;

        // Convert PPU palette indices to RGBA and RGB
        for (i, &palette_idx) in ppu_buffer.iter().enumerate() {
            let rgb = crate::palette::palette_to_rgb(palette_idx);
            let rgb = crate::palette::apply_emphasis(rgb, emphasis);
            let rgba_offset = i * 4;
            self.framebuffer[rgba_offset] = rgb.0;
            self.framebuffer[rgba_offset + 1] = rgb.1;
            self.framebuffer[rgba_offset + 2] = rgb.2;
            self.framebuffer[rgba_offset + 3] = 255;

            let rgb_offset = i * 3;
            self.rgb_framebuffer[rgb_offset] = rgb.0;
            self.rgb_framebuffer[rgb_offset + 1] = rgb.1;
            self.rgb_framebuffer[rgb_offset + 2] = rgb.2;
        }
    }

    /// Get the current framebuffer (256x240 RGBA).
    #[must_use]
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    /// Get the current frame as tight 256x240x3 RGB, the literal byte
    /// layout the host-facing `step` returns.
    #[must_use]
    pub fn framebuffer_rgb(&self) -> &[u8] {
        &self.rgb_framebuffer
    }

    /// Take the audio buffer (drains accumulated samples).
    pub fn take_audio(&mut self) -> Vec<f32> {
        core::mem::take(&mut self.audio_buffer)
    }

    /// Get the audio buffer without draining.
    #[must_use]
    pub fn audio_buffer(&self) -> &[f32] {
        &self.audio_buffer
    }

    /// Get audio samples (alias for `audio_buffer`).
    #[must_use]
    pub fn audio_samples(&self) -> &[f32] {
        &self.audio_buffer
    }

    /// Clear the audio sample buffer.
    pub fn clear_audio_samples(&mut self) {
        self.audio_buffer.clear();
    }

    /// Set controller 1 state from button byte.
    pub fn set_controller_1(&mut self, buttons: u8) {
        self.bus.controller1 = ControllerState { buttons };
    }

    /// Set controller 2 state from button byte.
    pub fn set_controller_2(&mut self, buttons: u8) {
        self.bus.controller2 = ControllerState { buttons };
    }

    /// Set controller 1 state.
    pub fn set_controller1(&mut self, state: ControllerState) {
        self.bus.controller1 = state;
    }

    /// Set controller 2 state.
    pub fn set_controller2(&mut self, state: ControllerState) {
        self.bus.controller2 = state;
    }

    /// Get controller 1 state.
    #[must_use]
    pub fn controller1(&self) -> ControllerState {
        self.bus.controller1
    }

    /// Get controller 2 state.
    #[must_use]
    pub fn controller2(&self) -> ControllerState {
        self.bus.controller2
    }

    /// Get the total CPU cycles executed.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Get the frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Check if emulation is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Pause emulation.
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Resume emulation.
    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Get a reference to the CPU for debugging.
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Get a reference to the PPU for debugging.
    #[must_use]
    pub fn ppu(&self) -> &rustynes_ppu::Ppu {
        &self.bus.ppu
    }

    /// Get a reference to the APU for debugging.
    #[must_use]
    pub fn apu(&self) -> &rustynes_apu::Apu {
        &self.bus.apu
    }

    /// Get the total CPU cycles (alias for `total_cycles`).
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Peek at memory without side effects.
    ///
    /// This is useful for debugging/display purposes where we don't want
    /// to trigger PPU register side effects or mapper state changes.
    #[must_use]
    pub fn peek_memory(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    /// Get a reference to the bus for debugging.
    #[must_use]
    pub fn bus(&self) -> &NesBus {
        &self.bus
    }

    /// Get a mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut NesBus {
        &mut self.bus
    }

    /// Get the mapper number.
    #[must_use]
    pub fn mapper_number(&self) -> u16 {
        self.bus.mapper.mapper_number()
    }

    /// Get the mapper name.
    #[must_use]
    pub fn mapper_name(&self) -> &'static str {
        self.bus.mapper.mapper_name()
    }

    /// Check if the ROM has battery-backed RAM.
    #[must_use]
    pub fn has_battery(&self) -> bool {
        self.bus.mapper.has_battery()
    }

    /// Get battery-backed RAM for saving.
    #[must_use]
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.bus.mapper.battery_ram()
    }

    /// Load battery-backed RAM.
    pub fn load_battery_ram(&mut self, data: &[u8]) {
        self.bus.mapper.set_battery_ram(data);
    }

    /// Open a ROM file from disk and build a console from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the header is malformed,
    /// or the mapper is unsupported.
    #[cfg(feature = "std")]
    pub fn open<P: AsRef<std::path::Path>>(rom_path: P) -> Result<Self, ConsoleError> {
        let data = std::fs::read(rom_path)
            .map_err(|e| ConsoleError::InvalidState(format!("failed to read ROM file: {e}")))?;
        Self::new(&data)
    }

    /// Whether the CPU has jammed on an illegal opcode and stopped executing.
    ///
    /// Once jammed the machine never recovers short of a `reset`; `step`
    /// keeps returning the last-rendered frame rather than erroring every call.
    #[must_use]
    pub fn has_crashed(&self) -> bool {
        self.cpu.is_jammed()
    }

    /// Run `frames` whole frames with `controller` latched as controller 1's
    /// input for each of them, returning the freshly rendered RGB frame buffer.
    ///
    /// `controller` follows the bit layout `A=0x80, B=0x40, SELECT=0x20,
    /// START=0x10, UP=0x08, DOWN=0x04, LEFT=0x02, RIGHT=0x01`; it is converted
    /// to the shift register's native bit order internally. If the CPU has
    /// already jammed this is a no-op and the previous frame is returned.
    pub fn step(&mut self, frames: u32, controller: u8) -> &[u8] {
        if !self.has_crashed() {
            self.set_controller_1(controller.reverse_bits());
            for _ in 0..frames.max(1) {
                self.step_frame();
                if self.has_crashed() {
                    break;
                }
            }
        }
        self.framebuffer_rgb()
    }

    /// Read a byte from the address windows exposed to host programs:
    /// internal RAM (`$0000-$1FFF`, mirrored) and cartridge PRG-RAM
    /// (`$6000-$7FFF`).
    ///
    /// # Errors
    ///
    /// Returns `ConsoleError::InvalidAddress` outside those windows.
    pub fn read(&self, addr: u16) -> Result<u8, ConsoleError> {
        match addr {
            0x0000..=0x1FFF | 0x6000..=0x7FFF => Ok(self.bus.peek(addr)),
            _ => Err(ConsoleError::InvalidAddress(addr)),
        }
    }

    /// Write a byte into the address windows exposed to host programs:
    /// internal RAM (`$0000-$1FFF`, mirrored) and cartridge PRG-RAM
    /// (`$6000-$7FFF`).
    ///
    /// # Errors
    ///
    /// Returns `ConsoleError::InvalidAddress` outside those windows.
    pub fn write(&mut self, addr: u16, byte: u8) -> Result<(), ConsoleError> {
        match addr {
            0x0000..=0x1FFF | 0x6000..=0x7FFF => {
                rustynes_cpu::Bus::write(&mut self.bus, addr, byte);
                Ok(())
            }
            _ => Err(ConsoleError::InvalidAddress(addr)),
        }
    }

    /// Serialize the entire machine state into a save-state buffer.
    #[must_use]
    pub fn save_state(&self) -> Vec<u8> {
        crate::save_state::save(self)
    }

    /// Restore machine state from a buffer produced by `save_state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer's magic, version, or mapper tag don't
    /// match, or if it is truncated. On error the console is left unchanged.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), ConsoleError> {
        crate::save_state::load(self, data)
            .map_err(|e| ConsoleError::InvalidState(e.to_string()))
    }

    /// Size in bytes of the buffer `save_state` would currently produce.
    #[must_use]
    pub fn save_state_size(&self) -> usize {
        crate::save_state::encoded_size(self)
    }
}
