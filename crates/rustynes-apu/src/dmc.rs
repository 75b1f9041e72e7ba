// DMC (Delta Modulation Channel) - 1-bit delta-encoded sample playback
//
// The DMC channel plays 1-bit delta-encoded samples from CPU memory via DMA.
// Unlike other channels, it reads sample data directly from memory, which
// stalls the CPU for 1-4 cycles per byte fetched. The channel itself only
// tracks *when* a byte is needed; the bus drives the actual memory read and
// charges the CPU stall, then hands the fetched byte back via
// `fill_sample_buffer`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// DMC rate table for NTSC (CPU cycles per timer tick)
const DMC_RATE_NTSC: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// DMC channel implementation
///
/// The DMC (Delta Modulation Channel) plays 1-bit delta-encoded samples from CPU memory.
/// It uses DMA to read sample bytes, which stalls the CPU for 1-4 cycles per byte.
///
/// # Registers
///
/// - `$4010`: IRQ enable, Loop flag, Rate index
/// - `$4011`: Direct load (7-bit output level)
/// - `$4012`: Sample address = $C000 + (A × $40)
/// - `$4013`: Sample length = (L × $10) + 1 bytes
///
/// # Delta Modulation
///
/// The DMC stores only changes (+2 or -2 to output level) instead of absolute
/// sample values. Each bit in a sample byte represents increment (1) or decrement (0).
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dmc {
    // Configuration
    irq_enabled: bool,
    loop_enabled: bool,
    rate_index: u8,

    // Sample playback state
    sample_address: u8,   // Register value ($4012)
    sample_length: u8,    // Register value ($4013)
    current_address: u16, // Current read address (internal)
    bytes_remaining: u16, // Bytes left to read (internal)

    // Output units
    sample_buffer: u8,         // 8-bit sample buffer
    sample_buffer_empty: bool, // Buffer empty flag
    sample_pending: bool,      // Waiting on the bus to fill the buffer via DMA
    bits_remaining: u8,        // Bits remaining in buffer (0-8)
    output_level: u8,          // 7-bit output level (0-127)

    // Timer
    timer: u16,
    timer_counter: u16,

    // IRQ flag
    irq_flag: bool,

    // Enable flag (from $4015)
    enabled: bool,
}

impl Dmc {
    /// Create a new DMC channel.
    #[must_use]
    pub fn new() -> Self {
        let initial_timer = DMC_RATE_NTSC[0];

        Self {
            irq_enabled: false,
            loop_enabled: false,
            rate_index: 0,
            sample_address: 0,
            sample_length: 0,
            current_address: 0xC000,
            bytes_remaining: 0,
            sample_buffer: 0,
            sample_buffer_empty: true,
            sample_pending: false,
            bits_remaining: 0,
            output_level: 0,
            timer: initial_timer,
            timer_counter: initial_timer,
            irq_flag: false,
            enabled: false,
        }
    }

    /// Write to register $4010 (IRQ enable, loop, rate index).
    pub fn write_ctrl(&mut self, value: u8) {
        // IL-- RRRR
        // I = IRQ enable
        // L = Loop enable
        // R = Rate index
        self.irq_enabled = (value & 0x80) != 0;
        self.loop_enabled = (value & 0x40) != 0;
        self.rate_index = value & 0x0F;

        self.timer = DMC_RATE_NTSC[self.rate_index as usize];

        // Clearing IRQ enable clears the IRQ flag
        if !self.irq_enabled {
            self.irq_flag = false;
        }
    }

    /// Write to register $4011 (direct load / output level).
    pub fn write_direct_load(&mut self, value: u8) {
        self.output_level = value & 0x7F;
    }

    /// Write to register $4012 (sample address).
    pub fn write_sample_address(&mut self, value: u8) {
        self.sample_address = value;
    }

    /// Write to register $4013 (sample length).
    pub fn write_sample_length(&mut self, value: u8) {
        self.sample_length = value;
    }

    /// Set channel enable state (called from $4015 write)
    ///
    /// When enabled, starts sample playback if bytes remaining is 0.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;

        if enabled {
            if self.bytes_remaining == 0 {
                self.restart_sample();
            }
        } else {
            self.bytes_remaining = 0;
            self.sample_pending = false;
        }
    }

    /// Clock the timer (called every CPU cycle).
    ///
    /// When the timer reaches 0, clocks the output shifter and, if the
    /// sample buffer is empty and bytes remain, raises `needs_sample()` so
    /// the bus can perform the DMA fetch and stall the CPU.
    pub fn clock_timer(&mut self) {
        if self.timer_counter == 0 {
            self.timer_counter = self.timer;

            if self.bits_remaining > 0 {
                self.clock_output_shifter();
            }

            if self.sample_buffer_empty && self.bytes_remaining > 0 {
                self.sample_pending = true;
            }
        } else {
            self.timer_counter -= 1;
        }
    }

    /// Clock the output shifter
    ///
    /// Processes one bit from the sample buffer:
    /// - If bit is 1: increment output level by 2 (clamped to 127)
    /// - If bit is 0: decrement output level by 2 (clamped to 0)
    /// - If buffer empty: use silence bit (0) and decrement
    fn clock_output_shifter(&mut self) {
        if self.sample_buffer_empty {
            // Silence bit (always 0) → decrement
            if self.output_level >= 2 {
                self.output_level -= 2;
            }
        } else {
            // Process LSB of sample buffer
            if (self.sample_buffer & 1) == 1 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }

            self.sample_buffer >>= 1;
        }

        self.bits_remaining -= 1;

        if self.bits_remaining == 0 {
            self.sample_buffer_empty = true;
        }
    }

    /// Whether the channel is waiting for a DMA-fetched sample byte.
    #[must_use]
    pub fn needs_sample(&self) -> bool {
        self.sample_pending
    }

    /// Address the next sample byte should be read from.
    #[must_use]
    pub fn sample_addr(&self) -> u16 {
        self.current_address
    }

    /// Hand a DMA-fetched byte to the channel, advancing playback state.
    ///
    /// Called by the bus once it has read the byte at `sample_addr()` and
    /// charged the CPU for the DMA stall.
    pub fn fill_sample_buffer(&mut self, byte: u8) {
        self.sample_buffer = byte;
        self.sample_buffer_empty = false;
        self.bits_remaining = 8;
        self.sample_pending = false;

        // Increment address with wrap ($FFFF → $8000, not $0000!)
        if self.current_address == 0xFFFF {
            self.current_address = 0x8000;
        } else {
            self.current_address += 1;
        }

        self.bytes_remaining -= 1;

        if self.bytes_remaining == 0 {
            if self.loop_enabled {
                self.restart_sample();
            } else if self.irq_enabled {
                self.irq_flag = true;
            }
        }
    }

    /// Restart sample playback
    ///
    /// Reloads address and length from register values.
    fn restart_sample(&mut self) {
        // Sample address = $C000 + (sample_address × $40)
        self.current_address = 0xC000 | (u16::from(self.sample_address) << 6);

        // Sample length = (sample_length × $10) + 1
        self.bytes_remaining = (u16::from(self.sample_length) << 4) | 1;
    }

    /// Get current output value (0-127)
    ///
    /// Returns 0 if channel is disabled.
    #[must_use]
    pub fn output(&self) -> u8 {
        if self.enabled {
            self.output_level
        } else {
            0
        }
    }

    /// Check if DMC IRQ flag is set
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.irq_flag
    }

    /// Clear DMC IRQ flag (called when $4015 is read)
    pub fn clear_irq(&mut self) {
        self.irq_flag = false;
    }

    /// Check if bytes remaining > 0 (for $4015 status read)
    #[must_use]
    pub fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    /// Bytes left in the current sample.
    #[must_use]
    pub fn bytes_remaining(&self) -> u16 {
        self.bytes_remaining
    }

    pub(crate) fn save_state(&self, out: &mut Vec<u8>) {
        out.push(u8::from(self.irq_enabled));
        out.push(u8::from(self.loop_enabled));
        out.push(self.rate_index);
        out.push(self.sample_address);
        out.push(self.sample_length);
        out.extend_from_slice(&self.current_address.to_le_bytes());
        out.extend_from_slice(&self.bytes_remaining.to_le_bytes());
        out.push(self.sample_buffer);
        out.push(u8::from(self.sample_buffer_empty));
        out.push(u8::from(self.sample_pending));
        out.push(self.bits_remaining);
        out.push(self.output_level);
        out.extend_from_slice(&self.timer.to_le_bytes());
        out.extend_from_slice(&self.timer_counter.to_le_bytes());
        out.push(u8::from(self.irq_flag));
        out.push(u8::from(self.enabled));
    }

    pub(crate) fn load_state(&mut self, cursor: &mut crate::save::Cursor) -> Result<(), &'static str> {
        self.irq_enabled = cursor.bool()?;
        self.loop_enabled = cursor.bool()?;
        self.rate_index = cursor.u8()?;
        self.sample_address = cursor.u8()?;
        self.sample_length = cursor.u8()?;
        self.current_address = cursor.u16()?;
        self.bytes_remaining = cursor.u16()?;
        self.sample_buffer = cursor.u8()?;
        self.sample_buffer_empty = cursor.bool()?;
        self.sample_pending = cursor.bool()?;
        self.bits_remaining = cursor.u8()?;
        self.output_level = cursor.u8()?;
        self.timer = cursor.u16()?;
        self.timer_counter = cursor.u16()?;
        self.irq_flag = cursor.bool()?;
        self.enabled = cursor.bool()?;
        Ok(())
    }
}

impl Default for Dmc {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::large_stack_arrays)]
mod tests {
    use super::*;

    #[test]
    fn test_dmc_new() {
        let dmc = Dmc::new();
        assert_eq!(dmc.output_level, 0);
        assert!(!dmc.enabled);
        assert!(!dmc.irq_enabled);
        assert!(!dmc.loop_enabled);
        assert_eq!(dmc.rate_index, 0);
        assert_eq!(dmc.bytes_remaining, 0);
        assert!(dmc.sample_buffer_empty);
    }

    #[test]
    fn test_rate_table() {
        let dmc = Dmc::new();
        assert_eq!(DMC_RATE_NTSC[dmc.rate_index as usize], 428);
    }

    #[test]
    fn test_direct_load() {
        let mut dmc = Dmc::new();
        dmc.set_enabled(true);

        dmc.write_direct_load(0x7F); // Max value (127)
        assert_eq!(dmc.output_level, 127);
        assert_eq!(dmc.output(), 127);

        // Only 7 bits are used
        dmc.write_direct_load(0xFF);
        assert_eq!(dmc.output_level, 127);
    }

    #[test]
    fn test_rate_index() {
        let mut dmc = Dmc::new();

        dmc.write_ctrl(0x0F); // Rate 15 (fastest)
        assert_eq!(dmc.rate_index, 15);
        assert_eq!(dmc.timer, DMC_RATE_NTSC[15]);

        dmc.write_ctrl(0x00); // Rate 0 (slowest)
        assert_eq!(dmc.rate_index, 0);
        assert_eq!(dmc.timer, DMC_RATE_NTSC[0]);
    }

    #[test]
    fn test_irq_enable_clears_flag() {
        let mut dmc = Dmc::new();

        dmc.irq_flag = true;
        assert!(dmc.irq_pending());

        dmc.write_ctrl(0x00); // IRQ disabled
        assert!(!dmc.irq_pending());
    }

    #[test]
    fn test_loop_flag() {
        let mut dmc = Dmc::new();

        dmc.write_ctrl(0x40); // Loop enabled
        assert!(dmc.loop_enabled);
        assert!(!dmc.irq_enabled);

        dmc.write_ctrl(0x00);
        assert!(!dmc.loop_enabled);
    }

    #[test]
    fn test_sample_address_calculation() {
        let mut dmc = Dmc::new();

        dmc.write_sample_address(0x00); // Address = $C000
        dmc.restart_sample();
        assert_eq!(dmc.current_address, 0xC000);

        dmc.write_sample_address(0x01); // Address = $C040
        dmc.restart_sample();
        assert_eq!(dmc.current_address, 0xC040);

        dmc.write_sample_address(0xFF); // Address = $FFC0
        dmc.restart_sample();
        assert_eq!(dmc.current_address, 0xFFC0);
    }

    #[test]
    fn test_sample_length_calculation() {
        let mut dmc = Dmc::new();

        dmc.write_sample_length(0x00); // Length = 1
        dmc.restart_sample();
        assert_eq!(dmc.bytes_remaining, 1);

        dmc.write_sample_length(0x01); // Length = 17
        dmc.restart_sample();
        assert_eq!(dmc.bytes_remaining, 17);

        dmc.write_sample_length(0xFF); // Length = 4081
        dmc.restart_sample();
        assert_eq!(dmc.bytes_remaining, 4081);
    }

    #[test]
    fn test_output_shifter_increment() {
        let mut dmc = Dmc::new();
        dmc.output_level = 64;
        dmc.sample_buffer = 0xFF; // All 1s
        dmc.sample_buffer_empty = false;
        dmc.bits_remaining = 8;

        dmc.clock_output_shifter();
        assert_eq!(dmc.output_level, 66);
        assert_eq!(dmc.bits_remaining, 7);
    }

    #[test]
    fn test_output_shifter_decrement() {
        let mut dmc = Dmc::new();
        dmc.output_level = 64;
        dmc.sample_buffer = 0x00; // All 0s
        dmc.sample_buffer_empty = false;
        dmc.bits_remaining = 8;

        dmc.clock_output_shifter();
        assert_eq!(dmc.output_level, 62);
        assert_eq!(dmc.bits_remaining, 7);
    }

    #[test]
    fn test_output_clamping_high() {
        let mut dmc = Dmc::new();
        dmc.output_level = 127; // Max
        dmc.sample_buffer = 0xFF;
        dmc.sample_buffer_empty = false;
        dmc.bits_remaining = 8;

        dmc.clock_output_shifter();
        assert_eq!(dmc.output_level, 127); // Clamped at max
    }

    #[test]
    fn test_output_clamping_low() {
        let mut dmc = Dmc::new();
        dmc.output_level = 0; // Min
        dmc.sample_buffer = 0x00;
        dmc.sample_buffer_empty = false;
        dmc.bits_remaining = 8;

        dmc.clock_output_shifter();
        assert_eq!(dmc.output_level, 0); // Clamped at min
    }

    #[test]
    fn test_silence_bit() {
        let mut dmc = Dmc::new();
        dmc.output_level = 64;
        dmc.sample_buffer_empty = true;
        dmc.bits_remaining = 1;

        dmc.clock_output_shifter();
        assert_eq!(dmc.output_level, 62);
    }

    #[test]
    fn test_address_wrap() {
        let mut dmc = Dmc::new();
        dmc.current_address = 0xFFFF;
        dmc.bytes_remaining = 2;
        dmc.enabled = true;

        dmc.fill_sample_buffer(0xAA);
        assert_eq!(dmc.current_address, 0x8000); // Wrapped
    }

    #[test]
    fn test_sample_completion_with_irq() {
        let mut dmc = Dmc::new();
        dmc.write_ctrl(0x80); // IRQ enabled, no loop
        dmc.bytes_remaining = 1;
        dmc.enabled = true;

        dmc.fill_sample_buffer(0);
        assert_eq!(dmc.bytes_remaining, 0);
        assert!(dmc.irq_pending());
    }

    #[test]
    fn test_sample_completion_with_loop() {
        let mut dmc = Dmc::new();
        dmc.write_ctrl(0x40); // Loop enabled, no IRQ
        dmc.write_sample_address(0x01); // Address = $C040
        dmc.write_sample_length(0x01); // Length = 17 bytes
        dmc.bytes_remaining = 1;
        dmc.current_address = 0xD000;
        dmc.enabled = true;

        dmc.fill_sample_buffer(0);
        assert_eq!(dmc.bytes_remaining, 17); // Reloaded
        assert_eq!(dmc.current_address, 0xC040); // Reset
        assert!(!dmc.irq_pending()); // No IRQ
    }

    #[test]
    fn test_enable_starts_sample() {
        let mut dmc = Dmc::new();
        dmc.write_sample_address(0x00);
        dmc.write_sample_length(0x10); // Length = 257
        assert_eq!(dmc.bytes_remaining, 0);

        dmc.set_enabled(true);
        assert_eq!(dmc.bytes_remaining, 257);
        assert_eq!(dmc.current_address, 0xC000);
    }

    #[test]
    fn test_disable_clears_bytes_remaining() {
        let mut dmc = Dmc::new();
        dmc.set_enabled(true);
        dmc.bytes_remaining = 100;

        dmc.set_enabled(false);
        assert_eq!(dmc.bytes_remaining, 0);
    }

    #[test]
    fn test_timer_clocking_and_needs_sample() {
        let mut dmc = Dmc::new();
        dmc.write_ctrl(0x0F); // Rate 15 (fastest, 54 cycles)
        dmc.timer_counter = 2;
        dmc.bits_remaining = 0;
        dmc.bytes_remaining = 1;
        dmc.sample_buffer_empty = true;

        dmc.clock_timer();
        assert_eq!(dmc.timer_counter, 1);
        assert!(!dmc.needs_sample());

        dmc.clock_timer();
        assert_eq!(dmc.timer_counter, 0);

        // Next clock reloads timer and should request a sample
        dmc.clock_timer();
        assert_eq!(dmc.timer_counter, 54);
        assert!(dmc.needs_sample());
    }

    #[test]
    fn test_output_disabled() {
        let mut dmc = Dmc::new();
        dmc.output_level = 64;

        assert_eq!(dmc.output(), 0);

        dmc.set_enabled(true);
        assert_eq!(dmc.output(), 64);
    }

    #[test]
    fn test_clear_irq() {
        let mut dmc = Dmc::new();
        dmc.irq_flag = true;

        dmc.clear_irq();
        assert!(!dmc.irq_pending());
    }

    #[test]
    fn test_is_active() {
        let mut dmc = Dmc::new();

        assert!(!dmc.active()); // No bytes remaining

        dmc.bytes_remaining = 10;
        assert!(dmc.active());

        dmc.bytes_remaining = 0;
        assert!(!dmc.active());
    }

    #[test]
    fn test_save_state_round_trip() {
        let mut dmc = Dmc::new();
        dmc.write_ctrl(0x4F);
        dmc.write_sample_address(0x20);
        dmc.write_sample_length(0x05);
        dmc.set_enabled(true);
        dmc.clock_timer();

        let mut buf = Vec::new();
        dmc.save_state(&mut buf);

        let mut restored = Dmc::new();
        let mut cursor = crate::save::Cursor::new(&buf);
        restored.load_state(&mut cursor).unwrap();

        assert_eq!(restored.current_address, dmc.current_address);
        assert_eq!(restored.bytes_remaining, dmc.bytes_remaining);
        assert_eq!(restored.enabled, dmc.enabled);
    }
}
