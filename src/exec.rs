//! The 256-entry first-byte opcode dispatch.
//!
//! Opcodes are grouped by their variable bit fields: `w` (bit 0, or bit 3 for
//! `MOV r, imm`) selects the operand width, `reg`/`sr` fields select a
//! register, and ALU/rotate/group sub-operations come from 3-bit fields.

use crate::alu::{self, AluOp, RotOp};
use crate::bcd;
use crate::context::{Ctx, SegSel, Step};
use crate::cpu::{Flags, Rep, Reg, SReg};
use crate::decoder::{self, ModRm, Rm};
use crate::group::{group1, group2, Group1Op, Group2Op};
use crate::memory::{Bus, FarPtr};
use crate::word::Word;

/// Calls `$handler::<u16, _>` when `$wide` is set and `$handler::<u8, _>`
/// otherwise.
macro_rules! by_width {
    ($wide:expr, $handler:ident, $($arg:expr),* $(,)?) => {
        if $wide {
            $handler::<u16, B>($($arg),*)
        } else {
            $handler::<u8, B>($($arg),*)
        }
    };
}

pub(crate) fn dispatch<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, op: u8) -> Step {
    let wide = op & 1 != 0;
    match op {
        0x00..=0x05 | 0x08..=0x0D | 0x10..=0x15 | 0x18..=0x1D | 0x20..=0x25 | 0x28..=0x2D
        | 0x30..=0x35 | 0x38..=0x3D => {
            let alu = AluOp::from(op >> 3);
            match op & 0b110 {
                0b000 => by_width!(wide, alu_rm_reg, ctx, alu),
                0b010 => by_width!(wide, alu_reg_rm, ctx, alu),
                _ => by_width!(wide, alu_acc_imm, ctx, alu),
            }
        }
        0x06 | 0x0E | 0x16 | 0x1E => {
            let value = ctx.seg(SReg::from(op >> 3));
            ctx.push(value);
            ctx.end_next()
        }
        // 0x0F is POP CS
        0x07 | 0x0F | 0x17 | 0x1F => {
            let value = ctx.pop();
            ctx.set_seg(SReg::from(op >> 3), value);
            ctx.end_next()
        }
        0x26 | 0x2E | 0x36 | 0x3E => ctx.end_prefix_seg(SReg::from(op >> 3)),
        0x27 | 0x2F => {
            let al = ctx.read_reg(0);
            let res = if op == 0x27 {
                bcd::daa(ctx.flags(), al)
            } else {
                bcd::das(ctx.flags(), al)
            };
            ctx.set_flags(res.flags);
            ctx.write_reg(0, res.value);
            ctx.end_next()
        }
        0x37 | 0x3F => {
            let (al, ah) = ctx.pair::<u8>();
            let res = if op == 0x37 {
                bcd::aaa(ctx.flags(), al, ah)
            } else {
                bcd::aas(ctx.flags(), al, ah)
            };
            ctx.set_flags(res.flags);
            ctx.set_pair(res.lo, res.hi);
            ctx.end_next()
        }
        0x40..=0x4F => {
            let idx = op & 7;
            let value: u16 = ctx.read_reg(idx);
            let res = if op < 0x48 {
                alu::inc(ctx.flags(), value)
            } else {
                alu::dec(ctx.flags(), value)
            };
            ctx.set_flags(res.flags);
            ctx.write_reg(idx, res.value);
            ctx.end_next()
        }
        0x50..=0x57 => {
            // PUSH SP stores the decremented value
            let addr = ctx.ptr_pre_inc(Reg::Sp, SReg::Ss, -2);
            let value: u16 = ctx.read_reg(op & 7);
            ctx.write(addr, value);
            ctx.end_next()
        }
        0x58..=0x5F => {
            let value: u16 = ctx.pop();
            ctx.write_reg(op & 7, value);
            ctx.end_next()
        }
        0x60 => pusha(ctx),
        0x61 => popa(ctx),
        0x62 => bound(ctx),
        0x63..=0x67 => ctx.end_bad(),
        0x68 => push_imm::<u16, B>(ctx),
        0x6A => push_imm::<u8, B>(ctx),
        0x69 | 0x6B => imul_imm(ctx, op == 0x6B),
        0x6C | 0x6D => by_width!(wide, ins, ctx),
        0x6E | 0x6F => by_width!(wide, outs, ctx),
        0x70..=0x7F => {
            let disp = decoder::rel8(ctx);
            if condition(ctx.flags(), op >> 1) == wide {
                ctx.end_jmp_rel(disp)
            } else {
                ctx.end_next()
            }
        }
        0x80 | 0x82 => {
            let ModRm { opt, rm } = decoder::modrm(ctx);
            let imm: u8 = ctx.fetch();
            alu_rm(ctx, AluOp::from(opt), rm, imm)
        }
        0x81 | 0x83 => {
            let ModRm { opt, rm } = decoder::modrm(ctx);
            let imm = if op == 0x83 {
                decoder::simm8(ctx)
            } else {
                ctx.fetch()
            };
            alu_rm(ctx, AluOp::from(opt), rm, imm)
        }
        0x84 | 0x85 => by_width!(wide, test_rm_reg, ctx),
        0x86 | 0x87 => by_width!(wide, xchg_rm_reg, ctx),
        0x88 | 0x89 => by_width!(wide, mov_rm_reg, ctx),
        0x8A | 0x8B => by_width!(wide, mov_reg_rm, ctx),
        0x8C => {
            let ModRm { opt, rm } = decoder::modrm(ctx);
            let value = ctx.seg(SReg::from(opt));
            ctx.write_rm(rm, value);
            ctx.end_next()
        }
        0x8D => {
            let ModRm { opt, rm } = decoder::modrm(ctx);
            match rm {
                Rm::Mem(addr) => {
                    ctx.write_reg(opt, addr.disp);
                    ctx.end_next()
                }
                Rm::Reg(_) => ctx.end_bad(),
            }
        }
        0x8E => {
            let ModRm { opt, rm } = decoder::modrm(ctx);
            let value = ctx.read_rm(rm);
            ctx.set_seg(SReg::from(opt), value);
            ctx.end_next()
        }
        0x8F => {
            let ModRm { rm, .. } = decoder::modrm(ctx);
            let value: u16 = ctx.pop();
            ctx.write_rm(rm, value);
            ctx.end_next()
        }
        0x90..=0x97 => {
            let idx = op & 7;
            let ax = ctx.reg(Reg::Ax);
            let other: u16 = ctx.read_reg(idx);
            ctx.set_reg(Reg::Ax, other);
            ctx.write_reg(idx, ax);
            ctx.end_next()
        }
        0x98 => {
            let al: u8 = ctx.read_reg(0);
            ctx.write_reg(4, if al.msb() { 0xFFu8 } else { 0 });
            ctx.end_next()
        }
        0x99 => {
            let dx = if ctx.reg(Reg::Ax).msb() { 0xFFFF } else { 0 };
            ctx.set_reg(Reg::Dx, dx);
            ctx.end_next()
        }
        0x9A => {
            let target = decoder::far(ctx);
            ctx.push_frame_far();
            ctx.end_jmp_far(target)
        }
        0x9B => ctx.end_wait(),
        0x9C => {
            let flags = ctx.flags_word();
            ctx.push(flags);
            ctx.end_next()
        }
        0x9D => {
            let flags = ctx.pop();
            ctx.set_flags_word(flags);
            ctx.end_next()
        }
        0x9E => {
            let ah = ctx.read_reg(4);
            ctx.set_flags_byte(ah);
            ctx.end_next()
        }
        0x9F => {
            let flags = ctx.flags_byte();
            ctx.write_reg(4, flags);
            ctx.end_next()
        }
        0xA0 | 0xA1 => by_width!(wide, mov_acc_mem, ctx),
        0xA2 | 0xA3 => by_width!(wide, mov_mem_acc, ctx),
        0xA4 | 0xA5 => by_width!(wide, movs, ctx),
        0xA6 | 0xA7 => by_width!(wide, cmps, ctx),
        0xA8 | 0xA9 => by_width!(wide, test_acc_imm, ctx),
        0xAA | 0xAB => by_width!(wide, stos, ctx),
        0xAC | 0xAD => by_width!(wide, lods, ctx),
        0xAE | 0xAF => by_width!(wide, scas, ctx),
        0xB0..=0xBF => by_width!(op & 0b1000 != 0, mov_reg_imm, ctx, op & 7),
        0xC0 | 0xC1 => by_width!(wide, rot, ctx, RotCount::Imm),
        0xC2 | 0xC3 => {
            let release = if op == 0xC2 { decoder::rel16(ctx) } else { 0 };
            let target = ctx.pop_frame_near();
            ctx.reg_add(Reg::Sp, release);
            ctx.end_jmp_near(target)
        }
        0xC4 | 0xC5 => {
            let ModRm { opt, rm } = decoder::modrm(ctx);
            let Some(ptr) = ctx.rm_far(rm) else {
                return ctx.end_bad();
            };
            ctx.write_reg(opt, ptr.disp);
            let seg = if op == 0xC4 { SReg::Es } else { SReg::Ds };
            ctx.set_seg(seg, ptr.seg);
            ctx.end_next()
        }
        0xC6 | 0xC7 => by_width!(wide, mov_rm_imm, ctx),
        0xC8 => {
            let size = ctx.fetch();
            let level = ctx.fetch();
            ctx.push_frame_local(size, level);
            ctx.end_next()
        }
        0xC9 => {
            ctx.pop_frame_local();
            ctx.end_next()
        }
        0xCA | 0xCB => {
            let release = if op == 0xCA { decoder::rel16(ctx) } else { 0 };
            let target = ctx.pop_frame_far();
            ctx.reg_add(Reg::Sp, release);
            ctx.end_jmp_far(target)
        }
        0xCC => software_interrupt(ctx, 3),
        0xCD => {
            let vector = ctx.fetch();
            software_interrupt(ctx, vector)
        }
        0xCE => {
            if ctx.flags().contains(Flags::OVERFLOW) {
                software_interrupt(ctx, 4)
            } else {
                ctx.end_next()
            }
        }
        0xCF => {
            let target = ctx.pop_frame_interrupt();
            ctx.end_jmp_far(target)
        }
        0xD0 | 0xD1 => by_width!(wide, rot, ctx, RotCount::One),
        0xD2 | 0xD3 => by_width!(wide, rot, ctx, RotCount::Cl),
        0xD4 => {
            let base = ctx.fetch();
            let al = ctx.read_reg(0);
            match bcd::aam(ctx.flags(), al, base) {
                Ok(res) => {
                    ctx.set_flags(res.flags);
                    ctx.set_pair(res.lo, res.hi);
                    ctx.end_next()
                }
                Err(_) => ctx.end_divide_error(),
            }
        }
        0xD5 => {
            let base = ctx.fetch();
            let (al, ah) = ctx.pair::<u8>();
            let res = bcd::aad(ctx.flags(), al, ah, base);
            ctx.set_flags(res.flags);
            ctx.set_pair(res.lo, res.hi);
            ctx.end_next()
        }
        0xD6 => {
            let al = if ctx.flags().contains(Flags::CARRY) { 0xFFu8 } else { 0 };
            ctx.write_reg(0, al);
            ctx.end_next()
        }
        0xD7 => {
            let al: u8 = ctx.read_reg(0);
            let disp = ctx.reg(Reg::Bx).wrapping_add(u16::from(al));
            let addr = FarPtr::new(disp, ctx.seg(SegSel::Default(SReg::Ds)));
            let value: u8 = ctx.read(addr);
            ctx.write_reg(0, value);
            ctx.end_next()
        }
        // ESC: coprocessor escape, the operand is decoded and ignored
        0xD8..=0xDF => {
            let _ = decoder::modrm(ctx);
            ctx.end_next()
        }
        0xE0 | 0xE1 | 0xE2 => {
            let disp = decoder::rel8(ctx);
            let count = ctx.reg(Reg::Cx).wrapping_sub(1);
            ctx.set_reg(Reg::Cx, count);
            let zero = ctx.flags().contains(Flags::ZERO);
            let taken = count != 0 && (op == 0xE2 || zero == wide);
            if taken {
                ctx.end_jmp_rel(disp)
            } else {
                ctx.end_next()
            }
        }
        0xE3 => {
            let disp = decoder::rel8(ctx);
            if ctx.reg(Reg::Cx) == 0 {
                ctx.end_jmp_rel(disp)
            } else {
                ctx.end_next()
            }
        }
        0xE4 | 0xE5 => {
            let port = u16::from(ctx.fetch::<u8>());
            by_width!(wide, port_in, ctx, port)
        }
        0xE6 | 0xE7 => {
            let port = u16::from(ctx.fetch::<u8>());
            by_width!(wide, port_out, ctx, port)
        }
        0xE8 => {
            let disp = decoder::rel16(ctx);
            ctx.push_frame_near();
            ctx.end_jmp_rel(disp)
        }
        0xE9 => {
            let disp = decoder::rel16(ctx);
            ctx.end_jmp_rel(disp)
        }
        0xEA => {
            let target = decoder::far(ctx);
            ctx.end_jmp_far(target)
        }
        0xEB => {
            let disp = decoder::rel8(ctx);
            ctx.end_jmp_rel(disp)
        }
        0xEC | 0xED => {
            let port = ctx.reg(Reg::Dx);
            by_width!(wide, port_in, ctx, port)
        }
        0xEE | 0xEF => {
            let port = ctx.reg(Reg::Dx);
            by_width!(wide, port_out, ctx, port)
        }
        0xF0 => ctx.end_prefix_lock(),
        0xF1 => ctx.end_bad(),
        0xF2 => ctx.end_prefix_rep(Rep::NotZero),
        0xF3 => ctx.end_prefix_rep(Rep::Zero),
        0xF4 => ctx.end_halt(),
        0xF5 => update_flags(ctx, |f| f.toggle(Flags::CARRY)),
        0xF6 | 0xF7 => {
            let ModRm { opt, rm } = decoder::modrm(ctx);
            by_width!(wide, group1, ctx, Group1Op::from(opt), rm)
        }
        0xF8 => update_flags(ctx, |f| f.remove(Flags::CARRY)),
        0xF9 => update_flags(ctx, |f| f.insert(Flags::CARRY)),
        0xFA => update_flags(ctx, |f| f.remove(Flags::INTERRUPT)),
        0xFB => update_flags(ctx, |f| f.insert(Flags::INTERRUPT)),
        0xFC => update_flags(ctx, |f| f.remove(Flags::DIRECTION)),
        0xFD => update_flags(ctx, |f| f.insert(Flags::DIRECTION)),
        0xFE | 0xFF => {
            let ModRm { opt, rm } = decoder::modrm(ctx);
            by_width!(wide, group2, ctx, Group2Op::from(opt), rm)
        }
    }
}

/// Jcc condition selected by bits 1..3 of the opcode; bit 0 of the opcode
/// negates it (even opcodes jump when the condition is false).
fn condition(flags: Flags, cc: u8) -> bool {
    let f = |flag| flags.contains(flag);
    match cc & 7 {
        0 => !f(Flags::OVERFLOW),
        1 => !f(Flags::CARRY),
        2 => !f(Flags::ZERO),
        3 => !f(Flags::CARRY) && !f(Flags::ZERO),
        4 => !f(Flags::SIGN),
        5 => !f(Flags::PARITY),
        6 => f(Flags::SIGN) == f(Flags::OVERFLOW),
        _ => !f(Flags::ZERO) && f(Flags::SIGN) == f(Flags::OVERFLOW),
    }
}

fn update_flags<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, change: impl FnOnce(&mut Flags)) -> Step {
    let mut flags = ctx.flags();
    change(&mut flags);
    ctx.set_flags(flags);
    ctx.end_next()
}

fn software_interrupt<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, vector: u8) -> Step {
    ctx.push_frame_interrupt();
    ctx.end_interrupt(vector)
}

fn alu_rm<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, alu: AluOp, rm: Rm, rhs: T) -> Step {
    let lhs = ctx.read_rm(rm);
    let res = alu.apply(ctx.flags(), lhs, rhs);
    ctx.set_flags(res.flags);
    if alu.writes_back() {
        ctx.write_rm(rm, res.value);
    }
    ctx.end_next()
}

fn alu_rm_reg<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, alu: AluOp) -> Step {
    let ModRm { opt, rm } = decoder::modrm(ctx);
    let rhs: T = ctx.read_reg(opt);
    alu_rm(ctx, alu, rm, rhs)
}

fn alu_reg_rm<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, alu: AluOp) -> Step {
    let ModRm { opt, rm } = decoder::modrm(ctx);
    let lhs: T = ctx.read_reg(opt);
    let rhs = ctx.read_rm(rm);
    let res = alu.apply(ctx.flags(), lhs, rhs);
    ctx.set_flags(res.flags);
    if alu.writes_back() {
        ctx.write_reg(opt, res.value);
    }
    ctx.end_next()
}

fn alu_acc_imm<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, alu: AluOp) -> Step {
    let imm: T = ctx.fetch();
    alu_rm(ctx, alu, Rm::Reg(0), imm)
}

fn test_rm_reg<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let ModRm { opt, rm } = decoder::modrm(ctx);
    let lhs: T = ctx.read_reg(opt);
    let rhs = ctx.read_rm(rm);
    let res = alu::test(ctx.flags(), lhs, rhs);
    ctx.set_flags(res.flags);
    ctx.end_next()
}

fn test_acc_imm<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let imm: T = ctx.fetch();
    let acc = ctx.read_reg(0);
    let res = alu::test(ctx.flags(), imm, acc);
    ctx.set_flags(res.flags);
    ctx.end_next()
}

fn xchg_rm_reg<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let ModRm { opt, rm } = decoder::modrm(ctx);
    let reg: T = ctx.read_reg(opt);
    let other: T = ctx.read_rm(rm);
    ctx.write_rm(rm, reg);
    ctx.write_reg(opt, other);
    ctx.end_next()
}

fn mov_rm_reg<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let ModRm { opt, rm } = decoder::modrm(ctx);
    let value: T = ctx.read_reg(opt);
    ctx.write_rm(rm, value);
    ctx.end_next()
}

fn mov_reg_rm<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let ModRm { opt, rm } = decoder::modrm(ctx);
    let value: T = ctx.read_rm(rm);
    ctx.write_reg(opt, value);
    ctx.end_next()
}

fn mov_rm_imm<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let ModRm { rm, .. } = decoder::modrm(ctx);
    let imm: T = ctx.fetch();
    ctx.write_rm(rm, imm);
    ctx.end_next()
}

fn mov_reg_imm<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, idx: u8) -> Step {
    let imm: T = ctx.fetch();
    ctx.write_reg(idx, imm);
    ctx.end_next()
}

fn moffs<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> FarPtr {
    let disp = ctx.fetch();
    FarPtr::new(disp, ctx.seg(SegSel::Default(SReg::Ds)))
}

fn mov_acc_mem<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let addr = moffs(ctx);
    let value: T = ctx.read(addr);
    ctx.write_reg(0, value);
    ctx.end_next()
}

fn mov_mem_acc<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let addr = moffs(ctx);
    let value: T = ctx.read_reg(0);
    ctx.write(addr, value);
    ctx.end_next()
}

fn port_in<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, port: u16) -> Step {
    let value: T = ctx.port_in(port);
    ctx.write_reg(0, value);
    ctx.end_next()
}

fn port_out<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, port: u16) -> Step {
    let value: T = ctx.read_reg(0);
    ctx.port_out(port, value);
    ctx.end_next()
}

#[derive(Debug, Clone, Copy)]
enum RotCount {
    One,
    Cl,
    Imm,
}

fn rot<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, count: RotCount) -> Step {
    let ModRm { opt, rm } = decoder::modrm(ctx);
    let count = match count {
        RotCount::One => 1,
        RotCount::Cl => ctx.read_reg(1),
        RotCount::Imm => ctx.fetch(),
    };
    let value: T = ctx.read_rm(rm);
    let res = RotOp::from(opt).apply(ctx.flags(), value, count);
    ctx.set_flags(res.flags);
    ctx.write_rm(rm, res.value);
    ctx.end_next()
}

fn movs<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    ctx.end_repeat(|ctx| {
        let src = ctx.str_src::<T>();
        let dst = ctx.str_dst::<T>();
        let value: T = ctx.read(src);
        ctx.write(dst, value);
        true
    })
}

fn cmps<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    ctx.end_repeat(|ctx| {
        let src = ctx.str_src::<T>();
        let dst = ctx.str_dst::<T>();
        let lhs: T = ctx.read(src);
        let rhs = ctx.read(dst);
        let res = alu::cmp(ctx.flags(), lhs, rhs);
        ctx.set_flags(res.flags);
        ctx.str_rep()
    })
}

fn scas<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    ctx.end_repeat(|ctx| {
        let dst = ctx.str_dst::<T>();
        let lhs: T = ctx.read_reg(0);
        let rhs = ctx.read(dst);
        let res = alu::cmp(ctx.flags(), lhs, rhs);
        ctx.set_flags(res.flags);
        ctx.str_rep()
    })
}

fn lods<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    ctx.end_repeat(|ctx| {
        let src = ctx.str_src::<T>();
        let value: T = ctx.read(src);
        ctx.write_reg(0, value);
        true
    })
}

fn stos<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    ctx.end_repeat(|ctx| {
        let dst = ctx.str_dst::<T>();
        let value: T = ctx.read_reg(0);
        ctx.write(dst, value);
        true
    })
}

fn ins<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    ctx.end_repeat(|ctx| {
        let port = ctx.reg(Reg::Dx);
        let dst = ctx.str_dst::<T>();
        let value: T = ctx.port_in(port);
        ctx.write(dst, value);
        true
    })
}

fn outs<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    ctx.end_repeat(|ctx| {
        let port = ctx.reg(Reg::Dx);
        let src = ctx.str_src::<T>();
        let value: T = ctx.read(src);
        ctx.port_out(port, value);
        true
    })
}

const PUSHA_ORDER: [Reg; 8] = [
    Reg::Ax,
    Reg::Cx,
    Reg::Dx,
    Reg::Bx,
    Reg::Sp,
    Reg::Bp,
    Reg::Si,
    Reg::Di,
];

fn pusha<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let values = PUSHA_ORDER.map(|reg| ctx.reg(reg));
    for value in values {
        ctx.push(value);
    }
    ctx.end_next()
}

/// Restores SP from the stack image as well.
fn popa<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let mut values = [0u16; 8];
    for value in values.iter_mut().rev() {
        *value = ctx.pop();
    }
    for (reg, value) in PUSHA_ORDER.into_iter().zip(values) {
        ctx.set_reg(reg, value);
    }
    ctx.end_next()
}

/// Unsigned comparison against the `[lower, upper]` pair in memory.
fn bound<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let ModRm { opt, rm } = decoder::modrm(ctx);
    let Rm::Mem(addr) = rm else {
        return ctx.end_bad();
    };
    let value: u16 = ctx.read_reg(opt);
    let lower: u16 = ctx.read(addr);
    let upper: u16 = ctx.read(addr.offset(2));
    if (lower..=upper).contains(&value) {
        ctx.end_next()
    } else {
        software_interrupt(ctx, 5)
    }
}

fn push_imm<T: Word, B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> Step {
    let imm: T = ctx.fetch();
    ctx.push(imm);
    ctx.end_next()
}

/// `IMUL r16, r/m16, imm`: the 8-bit form sign-extends its immediate.
fn imul_imm<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>, short: bool) -> Step {
    let ModRm { opt, rm } = decoder::modrm(ctx);
    let imm = if short {
        decoder::simm8(ctx)
    } else {
        ctx.fetch()
    };
    let lhs: u16 = ctx.read_rm(rm);
    let res = alu::imul(ctx.flags(), lhs, imm);
    ctx.set_flags(res.flags);
    ctx.write_reg(opt, res.lo);
    ctx.end_next()
}
