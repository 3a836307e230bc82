//! Flag-exact arithmetic, logic, shift and rotate microcode.
//!
//! Every operation takes the incoming flags and returns the updated flags
//! together with its result. Arithmetic is carried out in a 32-bit domain so
//! that the carry out of the operand width is available as bit `WIDTH`.

use crate::cpu::Flags;
use crate::word::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult<T> {
    pub flags: Flags,
    pub value: T,
}

/// Result of a widening multiply or divide. For division `lo` holds the
/// quotient and `hi` the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideResult<T> {
    pub flags: Flags,
    pub lo: T,
    pub hi: T,
}

/// Divisor is zero or the quotient does not fit the destination.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("divide error")]
pub struct DivideError;

/// Even parity of the low byte.
pub fn parity(value: u32) -> bool {
    (value as u8).count_ones() % 2 == 0
}

pub(crate) fn with_parity_zero_sign<T: Word>(mut flags: Flags, value: T) -> AluResult<T> {
    flags.set(Flags::PARITY, parity(value.zero_extend()));
    flags.set(Flags::ZERO, value.is_zero());
    flags.set(Flags::SIGN, value.msb());
    AluResult { flags, value }
}

fn bit(value: u32, n: u32) -> bool {
    (value >> n) & 1 != 0
}

fn clear_msb<T: Word>(value: u32) -> u32 {
    value & !(1 << (T::WIDTH - 1))
}

/// Shared tail of the add/subtract family: `raw` is the full result,
/// `low` the same operation without the top operand bits, `nibble` the
/// operation on the low nibbles.
fn arith<T: Word>(mut flags: Flags, raw: u32, low: u32, nibble: u32, keep_carry: bool) -> AluResult<T> {
    let carry = bit(raw, T::WIDTH);
    if !keep_carry {
        flags.set(Flags::CARRY, carry);
    }
    flags.set(Flags::OVERFLOW, bit(low, T::WIDTH - 1) ^ carry);
    flags.set(Flags::AUXILIARY, bit(nibble, 4));
    with_parity_zero_sign(flags, T::truncate(raw))
}

fn add_with<T: Word>(flags: Flags, lhs: T, rhs: T, cin: u32, keep_carry: bool) -> AluResult<T> {
    let (l, r) = (lhs.zero_extend(), rhs.zero_extend());
    arith::<T>(
        flags,
        l + r + cin,
        clear_msb::<T>(l) + clear_msb::<T>(r) + cin,
        (l & 0xF) + (r & 0xF) + cin,
        keep_carry,
    )
}

fn sub_with<T: Word>(flags: Flags, lhs: T, rhs: T, bin: u32, keep_carry: bool) -> AluResult<T> {
    let (l, r) = (lhs.zero_extend(), rhs.zero_extend());
    arith::<T>(
        flags,
        l.wrapping_sub(r).wrapping_sub(bin),
        clear_msb::<T>(l)
            .wrapping_sub(clear_msb::<T>(r))
            .wrapping_sub(bin),
        (l & 0xF).wrapping_sub(r & 0xF).wrapping_sub(bin),
        keep_carry,
    )
}

fn carry_in(flags: Flags) -> u32 {
    u32::from(flags.contains(Flags::CARRY))
}

fn logic<T: Word>(mut flags: Flags, value: T) -> AluResult<T> {
    flags.remove(Flags::CARRY | Flags::OVERFLOW);
    with_parity_zero_sign(flags, value)
}

pub fn add<T: Word>(flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
    add_with(flags, lhs, rhs, 0, false)
}

pub fn adc<T: Word>(flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
    add_with(flags, lhs, rhs, carry_in(flags), false)
}

pub fn sub<T: Word>(flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
    sub_with(flags, lhs, rhs, 0, false)
}

pub fn sbb<T: Word>(flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
    sub_with(flags, lhs, rhs, carry_in(flags), false)
}

pub fn cmp<T: Word>(flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
    sub(flags, lhs, rhs)
}

pub fn or<T: Word>(flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
    logic(flags, lhs | rhs)
}

pub fn and<T: Word>(flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
    logic(flags, lhs & rhs)
}

pub fn xor<T: Word>(flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
    logic(flags, lhs ^ rhs)
}

pub fn test<T: Word>(flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
    and(flags, lhs, rhs)
}

pub fn neg<T: Word>(flags: Flags, value: T) -> AluResult<T> {
    sub(flags, T::zero(), value)
}

/// Like `add(v, 1)` but the carry flag is preserved.
pub fn inc<T: Word>(flags: Flags, value: T) -> AluResult<T> {
    add_with(flags, value, T::one(), 0, true)
}

/// Like `sub(v, 1)` but the carry flag is preserved.
pub fn dec<T: Word>(flags: Flags, value: T) -> AluResult<T> {
    sub_with(flags, value, T::one(), 0, true)
}

// Rotates and shifts reduce the count modulo 32 first; a zero count leaves
// both the operand and the flags untouched. Overflow is computed with the
// single-bit formula for every count.

fn unchanged<T: Word>(flags: Flags, value: T) -> AluResult<T> {
    AluResult { flags, value }
}

pub fn rol<T: Word>(mut flags: Flags, value: T, count: u8) -> AluResult<T> {
    let count = u32::from(count % 32);
    if count == 0 {
        return unchanged(flags, value);
    }
    let value = value.rotate_left(count % T::WIDTH);
    let carry = bit(value.zero_extend(), 0);
    flags.set(Flags::CARRY, carry);
    flags.set(Flags::OVERFLOW, carry ^ value.msb());
    AluResult { flags, value }
}

pub fn ror<T: Word>(mut flags: Flags, value: T, count: u8) -> AluResult<T> {
    let count = u32::from(count % 32);
    if count == 0 {
        return unchanged(flags, value);
    }
    let value = value.rotate_right(count % T::WIDTH);
    let raw = value.zero_extend();
    flags.set(Flags::CARRY, value.msb());
    flags.set(
        Flags::OVERFLOW,
        bit(raw, T::WIDTH - 1) ^ bit(raw, T::WIDTH - 2),
    );
    AluResult { flags, value }
}

pub fn rcl<T: Word>(mut flags: Flags, value: T, count: u8) -> AluResult<T> {
    let count = u32::from(count % 32);
    if count == 0 {
        return unchanged(flags, value);
    }
    let n = count % (T::WIDTH + 1);
    let wide = (carry_in(flags) << T::WIDTH) | value.zero_extend();
    let raw = (wide << n) | (wide >> (T::WIDTH + 1 - n));
    let carry = bit(raw, T::WIDTH);
    let value = T::truncate(raw);
    flags.set(Flags::CARRY, carry);
    flags.set(Flags::OVERFLOW, carry ^ value.msb());
    AluResult { flags, value }
}

pub fn rcr<T: Word>(mut flags: Flags, value: T, count: u8) -> AluResult<T> {
    let count = u32::from(count % 32);
    if count == 0 {
        return unchanged(flags, value);
    }
    let n = count % (T::WIDTH + 1);
    let wide = (carry_in(flags) << T::WIDTH) | value.zero_extend();
    let raw = (wide >> n) | (wide << (T::WIDTH + 1 - n));
    flags.set(Flags::CARRY, bit(raw, T::WIDTH));
    flags.set(
        Flags::OVERFLOW,
        bit(raw, T::WIDTH - 1) ^ bit(raw, T::WIDTH - 2),
    );
    AluResult {
        flags,
        value: T::truncate(raw),
    }
}

fn shift_count<T: Word>(count: u8) -> Option<u32> {
    match u32::from(count % 32) {
        0 => None,
        n => Some(n.min(T::WIDTH + 1)),
    }
}

pub fn shl<T: Word>(mut flags: Flags, value: T, count: u8) -> AluResult<T> {
    let Some(n) = shift_count::<T>(count) else {
        return unchanged(flags, value);
    };
    let raw = value.zero_extend() << n;
    let carry = bit(raw, T::WIDTH);
    flags.set(Flags::CARRY, carry);
    flags.set(Flags::OVERFLOW, bit(raw, T::WIDTH - 1) ^ carry);
    flags.remove(Flags::AUXILIARY);
    with_parity_zero_sign(flags, T::truncate(raw))
}

pub fn sal<T: Word>(flags: Flags, value: T, count: u8) -> AluResult<T> {
    shl(flags, value, count)
}

pub fn shr<T: Word>(mut flags: Flags, value: T, count: u8) -> AluResult<T> {
    let Some(n) = shift_count::<T>(count) else {
        return unchanged(flags, value);
    };
    let raw = value.zero_extend();
    flags.set(Flags::CARRY, bit(raw, n - 1));
    flags.set(Flags::OVERFLOW, value.msb());
    flags.remove(Flags::AUXILIARY);
    with_parity_zero_sign(flags, T::truncate(raw >> n))
}

pub fn sar<T: Word>(mut flags: Flags, value: T, count: u8) -> AluResult<T> {
    let Some(n) = shift_count::<T>(count) else {
        return unchanged(flags, value);
    };
    let signed = value.sign_extend();
    flags.set(Flags::CARRY, (signed >> (n - 1)) & 1 != 0);
    flags.remove(Flags::OVERFLOW | Flags::AUXILIARY);
    with_parity_zero_sign(flags, T::truncate((signed >> n) as u32))
}

fn signed_range<T: Word>() -> (i64, i64) {
    let half = 1i64 << (T::WIDTH - 1);
    (-half, half - 1)
}

fn wide_flags<T: Word>(mut flags: Flags, lo: T, overflow: bool) -> Flags {
    flags.set(Flags::CARRY, overflow);
    flags.set(Flags::OVERFLOW, overflow);
    flags.set(Flags::PARITY, lo.count_ones() % 2 == 0);
    flags.set(Flags::ZERO, lo.is_zero());
    flags.set(Flags::SIGN, lo.msb());
    flags
}

/// Unsigned widening multiply. Carry and overflow report a non-zero high half.
pub fn mul<T: Word>(flags: Flags, lhs: T, rhs: T) -> WideResult<T> {
    let full = lhs.zero_extend() * rhs.zero_extend();
    let lo = T::truncate(full);
    let hi = T::truncate(full >> T::WIDTH);
    WideResult {
        flags: wide_flags(flags, lo, !hi.is_zero()),
        lo,
        hi,
    }
}

/// Signed widening multiply. Carry and overflow report a product that does
/// not fit the signed low half.
pub fn imul<T: Word>(flags: Flags, lhs: T, rhs: T) -> WideResult<T> {
    let full = lhs.sign_extend() * rhs.sign_extend();
    let (min, max) = signed_range::<T>();
    let overflow = i64::from(full) < min || i64::from(full) > max;
    let lo = T::truncate(full as u32);
    let hi = T::truncate((full >> T::WIDTH) as u32);
    WideResult {
        flags: wide_flags(flags, lo, overflow),
        lo,
        hi,
    }
}

/// Unsigned divide of `hi:lo` by `divisor`. Flags pass through unchanged.
pub fn div<T: Word>(flags: Flags, lo: T, hi: T, divisor: T) -> Result<WideResult<T>, DivideError> {
    if divisor.is_zero() {
        return Err(DivideError);
    }
    let dividend = (hi.zero_extend() << T::WIDTH) | lo.zero_extend();
    let quotient = dividend / divisor.zero_extend();
    let remainder = dividend % divisor.zero_extend();
    if quotient >> T::WIDTH != 0 {
        return Err(DivideError);
    }
    Ok(WideResult {
        flags,
        lo: T::truncate(quotient),
        hi: T::truncate(remainder),
    })
}

/// Signed divide of `hi:lo` by `divisor`, truncating toward zero.
pub fn idiv<T: Word>(flags: Flags, lo: T, hi: T, divisor: T) -> Result<WideResult<T>, DivideError> {
    let divisor = i64::from(divisor.sign_extend());
    if divisor == 0 {
        return Err(DivideError);
    }
    let dividend = (i64::from(hi.sign_extend()) << T::WIDTH) | i64::from(lo.zero_extend());
    let quotient = dividend / divisor;
    let remainder = dividend % divisor;
    let (min, max) = signed_range::<T>();
    if quotient < min || quotient > max {
        return Err(DivideError);
    }
    Ok(WideResult {
        flags,
        lo: T::truncate(quotient as u32),
        hi: T::truncate(remainder as u32),
    })
}

/// The eight two-operand operations selected by bits 3..5 of the opcode or
/// the ModRM `reg` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

impl From<u8> for AluOp {
    fn from(value: u8) -> Self {
        match value & 7 {
            0 => AluOp::Add,
            1 => AluOp::Or,
            2 => AluOp::Adc,
            3 => AluOp::Sbb,
            4 => AluOp::And,
            5 => AluOp::Sub,
            6 => AluOp::Xor,
            _ => AluOp::Cmp,
        }
    }
}

impl AluOp {
    pub fn apply<T: Word>(self, flags: Flags, lhs: T, rhs: T) -> AluResult<T> {
        match self {
            AluOp::Add => add(flags, lhs, rhs),
            AluOp::Or => or(flags, lhs, rhs),
            AluOp::Adc => adc(flags, lhs, rhs),
            AluOp::Sbb => sbb(flags, lhs, rhs),
            AluOp::And => and(flags, lhs, rhs),
            AluOp::Sub => sub(flags, lhs, rhs),
            AluOp::Xor => xor(flags, lhs, rhs),
            AluOp::Cmp => cmp(flags, lhs, rhs),
        }
    }

    /// `CMP` only updates flags.
    pub fn writes_back(self) -> bool {
        self != AluOp::Cmp
    }
}

/// The eight shift/rotate operations selected by the ModRM `reg` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotOp {
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sal,
    Sar,
}

impl From<u8> for RotOp {
    fn from(value: u8) -> Self {
        match value & 7 {
            0 => RotOp::Rol,
            1 => RotOp::Ror,
            2 => RotOp::Rcl,
            3 => RotOp::Rcr,
            4 => RotOp::Shl,
            5 => RotOp::Shr,
            6 => RotOp::Sal,
            _ => RotOp::Sar,
        }
    }
}

impl RotOp {
    pub fn apply<T: Word>(self, flags: Flags, value: T, count: u8) -> AluResult<T> {
        match self {
            RotOp::Rol => rol(flags, value, count),
            RotOp::Ror => ror(flags, value, count),
            RotOp::Rcl => rcl(flags, value, count),
            RotOp::Rcr => rcr(flags, value, count),
            RotOp::Shl => shl(flags, value, count),
            RotOp::Shr => shr(flags, value, count),
            RotOp::Sal => sal(flags, value, count),
            RotOp::Sar => sar(flags, value, count),
        }
    }
}
