use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::context::{Ctx, Step};
use crate::exec;
use crate::instructions;
use crate::memory::Bus;
use crate::word::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub reset_cs: u16,
    pub reset_ip: u16,
    pub reset_sp: u16,
    /// Prefix bytes at or beyond this length raise the invalid-opcode trap.
    pub max_instruction_len: u8,
    /// Byte-sized `INC`/`DEC` in the FE group store their result zero-extended
    /// through the 16-bit accessor, so `INC AH` lands in SP.
    pub wide_incdec_writeback: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            reset_cs: 0xF000,
            reset_ip: 0xFFF0,
            reset_sp: 0xFFF0,
            max_instruction_len: 15,
            wide_incdec_writeback: true,
        }
    }
}

/// General registers, in ModRM encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Reg {
    Ax = 0,
    Cx = 1,
    Dx = 2,
    Bx = 3,
    Sp = 4,
    Bp = 5,
    Si = 6,
    Di = 7,
    Ip = 8,
}

/// Byte halves of AX, CX, DX and BX, in ModRM encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Reg8 {
    Al = 0,
    Cl = 1,
    Dl = 2,
    Bl = 3,
    Ah = 4,
    Ch = 5,
    Dh = 6,
    Bh = 7,
}

/// Segment registers, in ModRM encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SReg {
    Es = 0,
    Cs = 1,
    Ss = 2,
    Ds = 3,
}

impl From<u8> for SReg {
    fn from(value: u8) -> Self {
        match value & 3 {
            0 => SReg::Es,
            1 => SReg::Cs,
            2 => SReg::Ss,
            _ => SReg::Ds,
        }
    }
}

bitflags! {
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flags: u16 {
const CARRY = 1 << 0;
const PARITY = 1 << 2;
const AUXILIARY = 1 << 4;
const ZERO = 1 << 6;
const SIGN = 1 << 7;
const TRAP = 1 << 8;
const INTERRUPT = 1 << 9;
const DIRECTION = 1 << 10;
const OVERFLOW = 1 << 11;
}
}

impl Flags {
    /// Bit 1 of the packed register always reads as set.
    pub const RESERVED: u16 = 1 << 1;
    const LOW_BYTE: Flags = Flags::CARRY
        .union(Flags::PARITY)
        .union(Flags::AUXILIARY)
        .union(Flags::ZERO)
        .union(Flags::SIGN);

    /// Packed 16-bit form, as pushed by `PUSHF` and interrupts.
    pub fn to_word(self) -> u16 {
        self.bits() | Self::RESERVED
    }

    pub fn from_word(value: u16) -> Self {
        Self::from_bits_truncate(value)
    }

    /// Packed low byte, as loaded by `LAHF`.
    pub fn to_byte(self) -> u8 {
        (self.intersection(Self::LOW_BYTE).bits() | Self::RESERVED) as u8
    }

    /// Replaces the five arithmetic flags of the low byte, as `SAHF` does.
    pub fn with_byte(self, value: u8) -> Self {
        let low = Self::from_bits_truncate(u16::from(value)).intersection(Self::LOW_BYTE);
        self.difference(Self::LOW_BYTE).union(low)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rep {
    /// `REPNE`/`REPNZ` (F2).
    NotZero,
    /// `REP`/`REPE`/`REPZ` (F3).
    Zero,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Prefix {
    pub lock: bool,
    pub seg: Option<SReg>,
    pub rep: Option<Rep>,
}

/// Result of executing one instruction, as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Normal,
    Halted,
    Waiting,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CpuError {
    #[error("no halt within {limit} steps (stopped at {cs:04X}:{ip:04X})")]
    StepLimit { limit: u64, cs: u16, ip: u16 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// AX, CX, DX, BX, SP, BP, SI, DI, IP.
    pub regs: [u16; 9],
    /// ES, CS, SS, DS.
    pub segs: [u16; 4],
    pub flags: Flags,
    pub cfg: CpuConfig,
    #[serde(skip)]
    pub(crate) prefix: Prefix,
    #[serde(skip)]
    pub(crate) inst_len: u8,
}

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        let mut cpu = Self {
            regs: [0; 9],
            segs: [0; 4],
            flags: Flags::empty(),
            cfg,
            prefix: Prefix::default(),
            inst_len: 0,
        };
        cpu.reset();
        cpu
    }

    /// Restores the architectural reset state from the configuration.
    pub fn reset(&mut self) {
        self.regs = [0; 9];
        self.segs = [0; 4];
        self.regs[Reg::Ip as usize] = self.cfg.reset_ip;
        self.regs[Reg::Sp as usize] = self.cfg.reset_sp;
        self.segs[SReg::Cs as usize] = self.cfg.reset_cs;
        self.flags = Flags::empty();
        self.prefix = Prefix::default();
        self.inst_len = 0;
    }

    pub fn reg(&self, reg: Reg) -> u16 {
        self.regs[reg as usize]
    }

    pub fn set_reg(&mut self, reg: Reg, val: u16) {
        self.regs[reg as usize] = val;
    }

    pub fn reg8(&self, reg: Reg8) -> u8 {
        u8::read_reg(self, reg as u8)
    }

    pub fn set_reg8(&mut self, reg: Reg8, val: u8) {
        u8::write_reg(self, reg as u8, val);
    }

    pub fn sreg(&self, seg: SReg) -> u16 {
        self.segs[seg as usize]
    }

    pub fn set_sreg(&mut self, seg: SReg, val: u16) {
        self.segs[seg as usize] = val;
    }

    /// Executes one instruction, including any prefixes in front of it.
    ///
    /// When the trap flag is set after the instruction completes, the
    /// single-step interrupt (vector 1) is taken before returning.
    pub fn step<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Outcome {
        let mut ctx = Ctx::new(self, bus);
        loop {
            let cs = ctx.cpu.sreg(SReg::Cs);
            let ip = ctx.cpu.reg(Reg::Ip);
            let op = ctx.fetch::<u8>();
            trace!(
                "{cs:04X}:{ip:04X} {op:02X} {}",
                instructions::describe(op).mnemonic
            );
            let step = exec::dispatch(&mut ctx, op);
            let outcome = match step {
                Step::Prefix => continue,
                Step::Done => Outcome::Normal,
                Step::Halt => Outcome::Halted,
                Step::Wait => Outcome::Waiting,
            };
            if ctx.flags().contains(Flags::TRAP) {
                ctx.push_frame_interrupt();
                let _ = ctx.end_interrupt(1);
            }
            return outcome;
        }
    }

    /// Steps until the program halts or waits, or `limit` instructions ran.
    pub fn run<B: Bus + ?Sized>(&mut self, bus: &mut B, limit: u64) -> Result<Outcome, CpuError> {
        for _ in 0..limit {
            match self.step(bus) {
                Outcome::Normal => {}
                outcome => {
                    debug!(?outcome, "stopped");
                    return Ok(outcome);
                }
            }
        }
        Err(CpuError::StepLimit {
            limit,
            cs: self.sreg(SReg::Cs),
            ip: self.reg(Reg::Ip),
        })
    }

    /// Delivers a maskable interrupt. Returns `false` without side effects
    /// when the interrupt-enable flag is clear.
    pub fn interrupt<B: Bus + ?Sized>(&mut self, bus: &mut B, vector: u8) -> bool {
        if !self.flags.contains(Flags::INTERRUPT) {
            return false;
        }
        let mut ctx = Ctx::new(self, bus);
        ctx.push_frame_interrupt();
        let _ = ctx.end_interrupt(vector);
        true
    }

    /// Delivers the non-maskable interrupt (vector 2).
    pub fn nmi<B: Bus + ?Sized>(&mut self, bus: &mut B) {
        let mut ctx = Ctx::new(self, bus);
        ctx.push_frame_interrupt();
        let _ = ctx.end_interrupt(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_state() {
        let cpu = Cpu::new(CpuConfig::default());
        assert_eq!(cpu.sreg(SReg::Cs), 0xF000);
        assert_eq!(cpu.reg(Reg::Ip), 0xFFF0);
        assert_eq!(cpu.reg(Reg::Sp), 0xFFF0);
        assert_eq!(cpu.reg(Reg::Ax), 0);
        assert_eq!(cpu.flags.to_word(), 0x0002);
    }

    #[test]
    fn byte_registers_alias_word_halves() {
        let mut cpu = Cpu::new(CpuConfig::default());
        cpu.set_reg(Reg::Bx, 0x1234);
        assert_eq!(cpu.reg8(Reg8::Bl), 0x34);
        assert_eq!(cpu.reg8(Reg8::Bh), 0x12);
        cpu.set_reg8(Reg8::Ch, 0xAB);
        assert_eq!(cpu.reg(Reg::Cx), 0xAB00);
        assert_eq!(cpu.reg(Reg::Sp), 0xFFF0);
    }

    #[test]
    fn flags_pack_and_unpack() {
        let flags = Flags::CARRY | Flags::ZERO | Flags::OVERFLOW | Flags::TRAP;
        assert_eq!(flags.to_word(), 0x0943);
        assert_eq!(flags.to_byte(), 0x43);
        assert_eq!(Flags::from_word(0xFFFF).to_word(), 0x0FD7);

        let merged = flags.with_byte(0x84);
        assert_eq!(merged, Flags::SIGN | Flags::PARITY | Flags::OVERFLOW | Flags::TRAP);
    }

    #[test]
    fn config_defaults_fill_missing_json_fields() {
        let cfg: CpuConfig = serde_json::from_str(r#"{ "reset_ip": 256 }"#).unwrap();
        assert_eq!(cfg.reset_ip, 0x100);
        assert_eq!(cfg.reset_cs, 0xF000);
        assert_eq!(cfg.max_instruction_len, 15);
    }
}
