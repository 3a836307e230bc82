/// Operand encoding that follows the opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    /// No operand bytes.
    Implied,
    /// A ModRM byte, possibly followed by a displacement.
    ModRm,
    /// A ModRM byte followed by an immediate.
    ModRmImm,
    /// An immediate byte or word.
    Imm,
    /// A relative branch displacement.
    PcRel,
    /// An `offset:segment` pair or a direct memory offset.
    Direct,
    /// A prefix byte that modifies the next opcode.
    Prefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrDesc {
    pub mnemonic: &'static str,
    pub mode: AddrMode,
}

const fn desc(mnemonic: &'static str, mode: AddrMode) -> InstrDesc {
    InstrDesc { mnemonic, mode }
}

const ALU: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];

const JCC: [&str; 16] = [
    "jo", "jno", "jb", "jnb", "jz", "jnz", "jbe", "ja", "js", "jns", "jp", "jnp", "jl", "jnl",
    "jle", "jg",
];

/// Describes an opcode by its first byte. Group opcodes (80-83, C0/C1,
/// D0-D3, F6/F7, FE/FF) report the group name since the operation depends on
/// the ModRM byte.
pub fn describe(op: u8) -> InstrDesc {
    use AddrMode::*;
    match op {
        0x00..=0x3F if op & 7 < 6 => {
            let mnemonic = ALU[usize::from(op >> 3)];
            match op & 7 {
                0..=3 => desc(mnemonic, ModRm),
                _ => desc(mnemonic, Imm),
            }
        }
        0x06 | 0x0E | 0x16 | 0x1E => desc("push", Implied),
        0x07 | 0x0F | 0x17 | 0x1F => desc("pop", Implied),
        0x26 => desc("es:", Prefix),
        0x2E => desc("cs:", Prefix),
        0x36 => desc("ss:", Prefix),
        0x3E => desc("ds:", Prefix),
        0x27 => desc("daa", Implied),
        0x2F => desc("das", Implied),
        0x37 => desc("aaa", Implied),
        0x3F => desc("aas", Implied),
        0x40..=0x47 => desc("inc", Implied),
        0x48..=0x4F => desc("dec", Implied),
        0x50..=0x57 => desc("push", Implied),
        0x58..=0x5F => desc("pop", Implied),
        0x60 => desc("pusha", Implied),
        0x61 => desc("popa", Implied),
        0x62 => desc("bound", ModRm),
        0x68 | 0x6A => desc("push", Imm),
        0x69 | 0x6B => desc("imul", ModRmImm),
        0x6C => desc("insb", Implied),
        0x6D => desc("insw", Implied),
        0x6E => desc("outsb", Implied),
        0x6F => desc("outsw", Implied),
        0x70..=0x7F => desc(JCC[usize::from(op & 0xF)], PcRel),
        0x80..=0x83 => desc("grp1", ModRmImm),
        0x84 | 0x85 => desc("test", ModRm),
        0x86 | 0x87 => desc("xchg", ModRm),
        0x88..=0x8C | 0x8E => desc("mov", ModRm),
        0x8D => desc("lea", ModRm),
        0x8F => desc("pop", ModRm),
        0x90 => desc("nop", Implied),
        0x91..=0x97 => desc("xchg", Implied),
        0x98 => desc("cbw", Implied),
        0x99 => desc("cwd", Implied),
        0x9A => desc("call", Direct),
        0x9B => desc("wait", Implied),
        0x9C => desc("pushf", Implied),
        0x9D => desc("popf", Implied),
        0x9E => desc("sahf", Implied),
        0x9F => desc("lahf", Implied),
        0xA0..=0xA3 => desc("mov", Direct),
        0xA4 => desc("movsb", Implied),
        0xA5 => desc("movsw", Implied),
        0xA6 => desc("cmpsb", Implied),
        0xA7 => desc("cmpsw", Implied),
        0xA8 | 0xA9 => desc("test", Imm),
        0xAA => desc("stosb", Implied),
        0xAB => desc("stosw", Implied),
        0xAC => desc("lodsb", Implied),
        0xAD => desc("lodsw", Implied),
        0xAE => desc("scasb", Implied),
        0xAF => desc("scasw", Implied),
        0xB0..=0xBF => desc("mov", Imm),
        0xC0 | 0xC1 => desc("grp2", ModRmImm),
        0xC2 | 0xC3 => desc("ret", if op == 0xC2 { Imm } else { Implied }),
        0xC4 => desc("les", ModRm),
        0xC5 => desc("lds", ModRm),
        0xC6 | 0xC7 => desc("mov", ModRmImm),
        0xC8 => desc("enter", Imm),
        0xC9 => desc("leave", Implied),
        0xCA | 0xCB => desc("retf", if op == 0xCA { Imm } else { Implied }),
        0xCC => desc("int3", Implied),
        0xCD => desc("int", Imm),
        0xCE => desc("into", Implied),
        0xCF => desc("iret", Implied),
        0xD0..=0xD3 => desc("grp2", ModRm),
        0xD4 => desc("aam", Imm),
        0xD5 => desc("aad", Imm),
        0xD6 => desc("salc", Implied),
        0xD7 => desc("xlat", Implied),
        0xD8..=0xDF => desc("esc", ModRm),
        0xE0 => desc("loopnz", PcRel),
        0xE1 => desc("loopz", PcRel),
        0xE2 => desc("loop", PcRel),
        0xE3 => desc("jcxz", PcRel),
        0xE4 | 0xE5 => desc("in", Imm),
        0xE6 | 0xE7 => desc("out", Imm),
        0xE8 => desc("call", PcRel),
        0xE9 | 0xEB => desc("jmp", PcRel),
        0xEA => desc("jmp", Direct),
        0xEC | 0xED => desc("in", Implied),
        0xEE | 0xEF => desc("out", Implied),
        0xF0 => desc("lock", Prefix),
        0xF2 => desc("repnz", Prefix),
        0xF3 => desc("repz", Prefix),
        0xF4 => desc("hlt", Implied),
        0xF5 => desc("cmc", Implied),
        0xF6 | 0xF7 => desc("grp3", ModRm),
        0xF8 => desc("clc", Implied),
        0xF9 => desc("stc", Implied),
        0xFA => desc("cli", Implied),
        0xFB => desc("sti", Implied),
        0xFC => desc("cld", Implied),
        0xFD => desc("std", Implied),
        0xFE | 0xFF => desc("grp4", ModRm),
        // 63-67, F1
        _ => desc("(bad)", Implied),
    }
}
