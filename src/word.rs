use std::fmt;

use num_traits::PrimInt;

use crate::cpu::Cpu;
use crate::memory::{Bus, FarPtr};

/// Operand width of an instruction: implemented for `u8` and `u16`.
///
/// Register indices follow the ModRM encoding. For bytes, `0..=3` name the low
/// halves of AX/CX/DX/BX and `4..=7` their high halves; for words the index
/// names the full register.
pub trait Word: PrimInt + Into<u32> + fmt::Debug + fmt::UpperHex {
    /// Width in bits.
    const WIDTH: u32;
    /// Width in bytes, also the stack and string step.
    const BYTES: u8;
    /// Register index of the high half of the accumulator pair (AH or DX).
    const HI_INDEX: u8;

    /// Keeps the low `WIDTH` bits of `v`.
    fn truncate(v: u32) -> Self;

    fn zero_extend(self) -> u32 {
        self.into()
    }

    fn sign_extend(self) -> i32;

    fn msb(self) -> bool {
        (self.zero_extend() >> (Self::WIDTH - 1)) & 1 != 0
    }

    fn read_reg(cpu: &Cpu, idx: u8) -> Self;
    fn write_reg(cpu: &mut Cpu, idx: u8, val: Self);

    fn read_mem<B: Bus + ?Sized>(bus: &mut B, addr: FarPtr) -> Self;
    fn write_mem<B: Bus + ?Sized>(bus: &mut B, addr: FarPtr, val: Self);

    fn port_in<B: Bus + ?Sized>(bus: &mut B, port: u16) -> Self;
    fn port_out<B: Bus + ?Sized>(bus: &mut B, port: u16, val: Self);
}

impl Word for u8 {
    const WIDTH: u32 = 8;
    const BYTES: u8 = 1;
    const HI_INDEX: u8 = 4;

    fn truncate(v: u32) -> Self {
        v as u8
    }

    fn sign_extend(self) -> i32 {
        i32::from(self as i8)
    }

    fn read_reg(cpu: &Cpu, idx: u8) -> Self {
        let full = cpu.regs[usize::from(idx & 3)];
        if idx & 4 != 0 {
            (full >> 8) as u8
        } else {
            full as u8
        }
    }

    fn write_reg(cpu: &mut Cpu, idx: u8, val: Self) {
        let slot = &mut cpu.regs[usize::from(idx & 3)];
        *slot = if idx & 4 != 0 {
            (*slot & 0x00FF) | (u16::from(val) << 8)
        } else {
            (*slot & 0xFF00) | u16::from(val)
        };
    }

    fn read_mem<B: Bus + ?Sized>(bus: &mut B, addr: FarPtr) -> Self {
        bus.read_byte(addr)
    }

    fn write_mem<B: Bus + ?Sized>(bus: &mut B, addr: FarPtr, val: Self) {
        bus.write_byte(addr, val)
    }

    fn port_in<B: Bus + ?Sized>(bus: &mut B, port: u16) -> Self {
        bus.in_byte(port)
    }

    fn port_out<B: Bus + ?Sized>(bus: &mut B, port: u16, val: Self) {
        bus.out_byte(port, val)
    }
}

impl Word for u16 {
    const WIDTH: u32 = 16;
    const BYTES: u8 = 2;
    const HI_INDEX: u8 = 2;

    fn truncate(v: u32) -> Self {
        v as u16
    }

    fn sign_extend(self) -> i32 {
        i32::from(self as i16)
    }

    fn read_reg(cpu: &Cpu, idx: u8) -> Self {
        cpu.regs[usize::from(idx)]
    }

    fn write_reg(cpu: &mut Cpu, idx: u8, val: Self) {
        cpu.regs[usize::from(idx)] = val;
    }

    fn read_mem<B: Bus + ?Sized>(bus: &mut B, addr: FarPtr) -> Self {
        bus.read_word(addr)
    }

    fn write_mem<B: Bus + ?Sized>(bus: &mut B, addr: FarPtr, val: Self) {
        bus.write_word(addr, val)
    }

    fn port_in<B: Bus + ?Sized>(bus: &mut B, port: u16) -> Self {
        bus.in_word(port)
    }

    fn port_out<B: Bus + ?Sized>(bus: &mut B, port: u16, val: Self) {
        bus.out_word(port, val)
    }
}
