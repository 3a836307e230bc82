//! Extended opcode groups selected by the ModRM `reg` field: F6/F7 and FE/FF.

use crate::alu;
use crate::context::{Ctx, Step};
use crate::cpu::{Reg, SReg};
use crate::decoder::Rm;
use crate::memory::Bus;
use crate::word::Word;

/// F6/F7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group1Op {
    Test,
    /// `reg == 1`, undocumented alias of `Test`.
    TestAlias,
    Not,
    Neg,
    Mul,
    Imul,
    Div,
    Idiv,
}

impl From<u8> for Group1Op {
    fn from(value: u8) -> Self {
        match value & 7 {
            0 => Group1Op::Test,
            1 => Group1Op::TestAlias,
            2 => Group1Op::Not,
            3 => Group1Op::Neg,
            4 => Group1Op::Mul,
            5 => Group1Op::Imul,
            6 => Group1Op::Div,
            _ => Group1Op::Idiv,
        }
    }
}

/// FE/FF. Only `Inc` and `Dec` are valid for byte operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group2Op {
    Inc,
    Dec,
    CallNear,
    CallFar,
    JmpNear,
    JmpFar,
    Push,
    Reserved,
}

impl From<u8> for Group2Op {
    fn from(value: u8) -> Self {
        match value & 7 {
            0 => Group2Op::Inc,
            1 => Group2Op::Dec,
            2 => Group2Op::CallNear,
            3 => Group2Op::CallFar,
            4 => Group2Op::JmpNear,
            5 => Group2Op::JmpFar,
            6 => Group2Op::Push,
            _ => Group2Op::Reserved,
        }
    }
}

pub(crate) fn group1<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, op: Group1Op, rm: Rm) -> Step {
    let flags = ctx.flags();
    match op {
        Group1Op::Test | Group1Op::TestAlias => {
            let imm: T = ctx.fetch();
            let lhs = ctx.read_rm(rm);
            ctx.set_flags(alu::test(flags, lhs, imm).flags);
        }
        Group1Op::Not => {
            let value: T = ctx.read_rm(rm);
            ctx.write_rm(rm, !value);
        }
        Group1Op::Neg => {
            let value: T = ctx.read_rm(rm);
            let res = alu::neg(flags, value);
            ctx.set_flags(res.flags);
            ctx.write_rm(rm, res.value);
        }
        Group1Op::Mul | Group1Op::Imul => {
            let lhs: T = ctx.read_reg(0);
            let rhs = ctx.read_rm(rm);
            let res = if op == Group1Op::Mul {
                alu::mul(flags, lhs, rhs)
            } else {
                alu::imul(flags, lhs, rhs)
            };
            ctx.set_flags(res.flags);
            ctx.set_pair(res.lo, res.hi);
        }
        Group1Op::Div | Group1Op::Idiv => {
            let (lo, hi) = ctx.pair::<T>();
            let divisor = ctx.read_rm(rm);
            let res = if op == Group1Op::Div {
                alu::div(flags, lo, hi, divisor)
            } else {
                alu::idiv(flags, lo, hi, divisor)
            };
            let Ok(res) = res else {
                return ctx.end_divide_error();
            };
            ctx.set_flags(res.flags);
            ctx.set_pair(res.lo, res.hi);
        }
    }
    ctx.end_next()
}

pub(crate) fn group2<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, op: Group2Op, rm: Rm) -> Step {
    match op {
        Group2Op::Inc | Group2Op::Dec => {
            let value: T = ctx.read_rm(rm);
            let res = if op == Group2Op::Inc {
                alu::inc(ctx.flags(), value)
            } else {
                alu::dec(ctx.flags(), value)
            };
            ctx.set_flags(res.flags);
            if ctx.cpu.cfg.wide_incdec_writeback {
                ctx.write_rm(rm, res.value.zero_extend() as u16);
            } else {
                ctx.write_rm(rm, res.value);
            }
            ctx.end_next()
        }
        Group2Op::Reserved => ctx.end_bad(),
        _ if T::WIDTH != 16 => ctx.end_bad(),
        Group2Op::CallNear => {
            let target = ctx.read_rm(rm);
            ctx.push_frame_near();
            ctx.end_jmp_near(target)
        }
        Group2Op::JmpNear => {
            let target = ctx.read_rm(rm);
            ctx.end_jmp_near(target)
        }
        Group2Op::CallFar => match ctx.rm_far(rm) {
            Some(target) => {
                ctx.push_frame_far();
                ctx.end_jmp_far(target)
            }
            None => ctx.end_bad(),
        },
        Group2Op::JmpFar => match ctx.rm_far(rm) {
            Some(target) => ctx.end_jmp_far(target),
            None => ctx.end_bad(),
        },
        Group2Op::Push => {
            // SP moves before the operand is read
            let addr = ctx.ptr_pre_inc(Reg::Sp, SReg::Ss, -2);
            let value: u16 = ctx.read_rm(rm);
            ctx.write(addr, value);
            ctx.end_next()
        }
    }
}
