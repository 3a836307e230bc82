use crate::context::{Ctx, SegSel};
use crate::cpu::{Reg, SReg};
use crate::memory::{Bus, FarPtr};

/// Register-or-memory operand, resolved once per instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rm {
    /// ModRM register index; its meaning depends on the operand width.
    Reg(u8),
    Mem(FarPtr),
}

/// A decoded ModRM byte: the `reg` field (register or sub-opcode) plus the
/// resolved `r/m` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    pub opt: u8,
    pub rm: Rm,
}

struct Formula {
    base: Option<Reg>,
    index: Option<Reg>,
    seg: SReg,
}

const fn formula(base: Option<Reg>, index: Option<Reg>, seg: SReg) -> Formula {
    Formula { base, index, seg }
}

/// Memory addressing by `r/m`. Entry 6 with `mod == 0` is a direct address.
const FORMULAS: [Formula; 8] = [
    formula(Some(Reg::Bx), Some(Reg::Si), SReg::Ds),
    formula(Some(Reg::Bx), Some(Reg::Di), SReg::Ds),
    formula(Some(Reg::Bp), Some(Reg::Si), SReg::Ss),
    formula(Some(Reg::Bp), Some(Reg::Di), SReg::Ss),
    formula(None, Some(Reg::Si), SReg::Ds),
    formula(None, Some(Reg::Di), SReg::Ds),
    formula(Some(Reg::Bp), None, SReg::Ss),
    formula(Some(Reg::Bx), None, SReg::Ds),
];

/// Fetches a ModRM byte and any displacement that follows it.
pub fn modrm<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> ModRm {
    let byte: u8 = ctx.fetch();
    let mode = byte >> 6;
    let opt = (byte >> 3) & 7;
    let reg = byte & 7;
    let rm = match (mode, reg) {
        (0b11, _) => Rm::Reg(reg),
        (0b00, 6) => {
            let disp = ctx.fetch();
            Rm::Mem(FarPtr::new(disp, ctx.seg(SegSel::Default(SReg::Ds))))
        }
        _ => {
            let f = &FORMULAS[usize::from(reg)];
            let mut disp = 0u16;
            if let Some(base) = f.base {
                disp = disp.wrapping_add(ctx.reg(base));
            }
            if let Some(index) = f.index {
                disp = disp.wrapping_add(ctx.reg(index));
            }
            disp = match mode {
                0b01 => disp.wrapping_add(rel8(ctx) as u16),
                0b10 => disp.wrapping_add(ctx.fetch::<u16>()),
                _ => disp,
            };
            Rm::Mem(FarPtr::new(disp, ctx.seg(SegSel::Default(f.seg))))
        }
    };
    ModRm { opt, rm }
}

/// Sign-extended 8-bit displacement.
pub fn rel8<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> i16 {
    i16::from(ctx.fetch::<u8>() as i8)
}

pub fn rel16<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> i16 {
    ctx.fetch::<u16>() as i16
}

/// 8-bit immediate sign-extended to a word.
pub fn simm8<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> u16 {
    rel8(ctx) as u16
}

/// Immediate `offset:segment` pointer.
pub fn far<B: Bus + ?Sized>(ctx: &mut Ctx<'_, B>) -> FarPtr {
    let disp = ctx.fetch();
    let seg = ctx.fetch();
    FarPtr::new(disp, seg)
}
