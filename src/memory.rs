use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of the real-mode address space (20 address lines).
pub const MEMORY_SIZE: usize = 0x10_0000;
/// Size of the I/O port space.
pub const PORT_SPACE: usize = 0x1_0000;

const ADDRESS_MASK: u32 = 0xF_FFFF;

/// A real-mode `segment:offset` pointer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FarPtr {
    pub disp: u16,
    pub seg: u16,
}

impl FarPtr {
    pub const fn new(disp: u16, seg: u16) -> Self {
        Self { disp, seg }
    }

    /// Linear 20-bit effective address: `(seg * 16 + disp) mod 2^20`.
    pub const fn ea(self) -> u32 {
        (((self.seg as u32) << 4) + self.disp as u32) & ADDRESS_MASK
    }

    /// Moves the offset by `diff`, wrapping inside the segment.
    pub const fn offset(self, diff: i16) -> Self {
        Self {
            disp: self.disp.wrapping_add(diff as u16),
            seg: self.seg,
        }
    }
}

impl fmt::Display for FarPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.seg, self.disp)
    }
}

/// Memory and port space seen by the CPU.
///
/// Every access the interpreter makes goes through this trait; the core never
/// owns storage of its own. Words are little-endian, and the second byte of a
/// word lives at `addr.offset(1)`, so a word at offset `0xFFFF` wraps to offset
/// `0` of the same segment.
pub trait Bus {
    fn read_byte(&mut self, addr: FarPtr) -> u8;
    fn write_byte(&mut self, addr: FarPtr, val: u8);

    fn read_word(&mut self, addr: FarPtr) -> u16 {
        let lo = self.read_byte(addr);
        let hi = self.read_byte(addr.offset(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write_word(&mut self, addr: FarPtr, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.write_byte(addr, lo);
        self.write_byte(addr.offset(1), hi);
    }

    fn in_byte(&mut self, port: u16) -> u8;
    fn out_byte(&mut self, port: u16, val: u8);
    fn in_word(&mut self, port: u16) -> u16;
    fn out_word(&mut self, port: u16, val: u16);
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MemoryError {
    #[error("image of {len} bytes does not fit in {capacity} bytes of memory")]
    ImageTooLarge { len: usize, capacity: usize },
    #[error("image of {len} bytes at {addr:#07x} runs past the end of memory")]
    OutOfRange { addr: u32, len: usize },
}

/// Flat 1 MiB memory with a latched port space.
///
/// Port writes are stored and read back by later port reads; there are no
/// devices behind them.
#[derive(Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
    pub io: Vec<u8>,
}

impl Default for LinearMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearMemory {
    pub fn new() -> Self {
        Self {
            mem: vec![0; MEMORY_SIZE],
            io: vec![0; PORT_SPACE],
        }
    }

    /// Copies `bytes` so that the image ends at the top of the address space,
    /// the way a BIOS ROM is mapped.
    pub fn load_top(&mut self, bytes: &[u8]) -> Result<(), MemoryError> {
        let capacity = self.mem.len();
        let offset = capacity
            .checked_sub(bytes.len())
            .ok_or(MemoryError::ImageTooLarge {
                len: bytes.len(),
                capacity,
            })?;
        self.mem[offset..].copy_from_slice(bytes);
        Ok(())
    }

    /// Copies `bytes` starting at linear address `addr`.
    pub fn load_at(&mut self, addr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let start = addr as usize;
        let end = start
            .checked_add(bytes.len())
            .filter(|&end| end <= self.mem.len())
            .ok_or(MemoryError::OutOfRange {
                addr,
                len: bytes.len(),
            })?;
        self.mem[start..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Byte at a linear address.
    pub fn byte(&self, ea: u32) -> u8 {
        self.mem[(ea & ADDRESS_MASK) as usize]
    }

    /// Little-endian word at a linear address.
    pub fn word(&self, ea: u32) -> u16 {
        u16::from_le_bytes([self.byte(ea), self.byte(ea.wrapping_add(1))])
    }
}

impl Bus for LinearMemory {
    fn read_byte(&mut self, addr: FarPtr) -> u8 {
        self.mem[addr.ea() as usize]
    }

    fn write_byte(&mut self, addr: FarPtr, val: u8) {
        self.mem[addr.ea() as usize] = val;
    }

    fn in_byte(&mut self, port: u16) -> u8 {
        self.io[port as usize]
    }

    fn out_byte(&mut self, port: u16, val: u8) {
        self.io[port as usize] = val;
    }

    fn in_word(&mut self, port: u16) -> u16 {
        let lo = self.io[port as usize];
        let hi = self.io[port.wrapping_add(1) as usize];
        u16::from_le_bytes([lo, hi])
    }

    fn out_word(&mut self, port: u16, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.io[port as usize] = lo;
        self.io[port.wrapping_add(1) as usize] = hi;
    }
}
