//! ASCII and packed BCD adjustments on AL/AH.

use crate::alu::{parity, with_parity_zero_sign, AluResult, DivideError, WideResult};
use crate::cpu::Flags;

fn adjust_needed(flags: Flags, al: u8) -> bool {
    (al & 0xF) > 9 || flags.contains(Flags::AUXILIARY)
}

fn unpacked(mut flags: Flags, al: u8, ah: u8, adjust: bool) -> WideResult<u8> {
    flags.set(Flags::AUXILIARY, adjust);
    flags.set(Flags::CARRY, adjust);
    let al = al & 0xF;
    flags.set(Flags::PARITY, parity(u32::from(al)));
    flags.set(Flags::ZERO, al == 0);
    flags.remove(Flags::SIGN);
    WideResult { flags, lo: al, hi: ah }
}

/// ASCII adjust after addition. Returns the new AL in `lo`, AH in `hi`.
pub fn aaa(flags: Flags, al: u8, ah: u8) -> WideResult<u8> {
    if adjust_needed(flags, al) {
        unpacked(flags, al.wrapping_add(6), ah.wrapping_add(1), true)
    } else {
        unpacked(flags, al, ah, false)
    }
}

/// ASCII adjust after subtraction.
pub fn aas(flags: Flags, al: u8, ah: u8) -> WideResult<u8> {
    if adjust_needed(flags, al) {
        unpacked(flags, al.wrapping_sub(6), ah.wrapping_sub(1), true)
    } else {
        unpacked(flags, al, ah, false)
    }
}

/// Decimal adjust after addition.
pub fn daa(mut flags: Flags, mut al: u8) -> AluResult<u8> {
    let low = adjust_needed(flags, al);
    if al > 0x99 || flags.contains(Flags::CARRY) {
        al = al.wrapping_add(0x60);
        flags.insert(Flags::CARRY);
    } else {
        flags.remove(Flags::CARRY);
    }
    if low {
        al = al.wrapping_add(0x06);
    }
    flags.set(Flags::AUXILIARY, low);
    with_parity_zero_sign(flags, al)
}

/// Decimal adjust after subtraction.
pub fn das(mut flags: Flags, mut al: u8) -> AluResult<u8> {
    let low = adjust_needed(flags, al);
    if al > 0x99 || flags.contains(Flags::CARRY) {
        al = al.wrapping_sub(0x60);
        flags.insert(Flags::CARRY);
    } else {
        // borrow out of the low digit
        flags.set(Flags::CARRY, low && al <= 0x05);
    }
    if low {
        al = al.wrapping_sub(0x06);
    }
    flags.set(Flags::AUXILIARY, low);
    with_parity_zero_sign(flags, al)
}

fn packed(mut flags: Flags, value: u8) -> Flags {
    flags.remove(Flags::CARRY | Flags::OVERFLOW | Flags::AUXILIARY);
    flags.set(Flags::PARITY, parity(u32::from(value)));
    flags.set(Flags::ZERO, value == 0);
    flags.set(Flags::SIGN, value & 0x80 != 0);
    flags
}

/// ASCII adjust after multiply: AH = AL / base, AL = AL % base.
/// Parity, zero and sign describe the quotient.
pub fn aam(flags: Flags, al: u8, base: u8) -> Result<WideResult<u8>, DivideError> {
    if base == 0 {
        return Err(DivideError);
    }
    let quotient = al / base;
    Ok(WideResult {
        flags: packed(flags, quotient),
        lo: al % base,
        hi: quotient,
    })
}

/// ASCII adjust before division: AL = AL + AH * base, AH = 0.
pub fn aad(flags: Flags, al: u8, ah: u8, base: u8) -> WideResult<u8> {
    let value = al.wrapping_add(ah.wrapping_mul(base));
    WideResult {
        flags: packed(flags, value),
        lo: value,
        hi: 0,
    }
}
