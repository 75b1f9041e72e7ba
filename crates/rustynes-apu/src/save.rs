//! Shared byte-cursor helper for component save-state encoding.
//!
//! Each channel and sub-unit appends its own fields to a flat `Vec<u8>` on
//! save and reads them back in the same order via a `Cursor` on load; there
//! is no per-field tagging, so the write and read order in each
//! `save_state`/`load_state` pair must stay in lockstep.

/// Read cursor over a save-state byte buffer.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], &'static str> {
        let end = self.pos + len;
        let slice = self.data.get(self.pos..end).ok_or("APU save state truncated")?;
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, &'static str> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn bool(&mut self) -> Result<bool, &'static str> {
        Ok(self.u8()? != 0)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, &'static str> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, &'static str> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
}
