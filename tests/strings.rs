use pretty_assertions::assert_eq;

use i186_rs::{Cpu, CpuConfig, Flags, LinearMemory, Outcome, Reg, SReg};

fn boot(code: &[u8]) -> (Cpu, LinearMemory) {
    let cfg = CpuConfig {
        reset_cs: 0,
        reset_ip: 0x100,
        ..CpuConfig::default()
    };
    let mut mem = LinearMemory::new();
    mem.load_at(0x100, code).unwrap();
    (Cpu::new(cfg), mem)
}

#[test]
fn rep_movsb_copies_forward() {
    // mov cx,4 / mov si,2000 / mov di,3000 / cld / rep movsb / hlt
    let (mut cpu, mut mem) = boot(&[
        0xB9, 0x04, 0x00, 0xBE, 0x00, 0x20, 0xBF, 0x00, 0x30, 0xFC, 0xF3, 0xA4, 0xF4,
    ]);
    mem.load_at(0x2000, b"ABCD").unwrap();
    assert_eq!(cpu.run(&mut mem, 100), Ok(Outcome::Halted));
    assert_eq!(&mem.mem[0x3000..0x3004], b"ABCD");
    assert_eq!(cpu.reg(Reg::Cx), 0);
    assert_eq!(cpu.reg(Reg::Si), 0x2004);
    assert_eq!(cpu.reg(Reg::Di), 0x3004);
}

#[test]
fn repe_cmpsb_stops_at_first_difference() {
    // mov cx,4 / mov si,2000 / mov di,3000 / repe cmpsb / hlt
    let (mut cpu, mut mem) = boot(&[
        0xB9, 0x04, 0x00, 0xBE, 0x00, 0x20, 0xBF, 0x00, 0x30, 0xF3, 0xA6, 0xF4,
    ]);
    mem.load_at(0x2000, b"AXCD").unwrap();
    mem.load_at(0x3000, b"ABCD").unwrap();
    assert_eq!(cpu.run(&mut mem, 100), Ok(Outcome::Halted));
    assert_eq!(cpu.reg(Reg::Cx), 2);
    assert_eq!(cpu.reg(Reg::Si), 0x2002);
    assert_eq!(cpu.reg(Reg::Di), 0x3002);
    assert!(!cpu.flags.contains(Flags::ZERO));
    assert!(!cpu.flags.contains(Flags::CARRY));
}

#[test]
fn repne_scasb_finds_the_accumulator() {
    // mov al,'C' / mov cx,10 / mov di,3000 / repne scasb / hlt
    let (mut cpu, mut mem) = boot(&[
        0xB0, 0x43, 0xB9, 0x0A, 0x00, 0xBF, 0x00, 0x30, 0xF2, 0xAE, 0xF4,
    ]);
    mem.load_at(0x3000, b"ABCD").unwrap();
    assert_eq!(cpu.run(&mut mem, 100), Ok(Outcome::Halted));
    assert_eq!(cpu.reg(Reg::Cx), 7);
    assert_eq!(cpu.reg(Reg::Di), 0x3003);
    assert!(cpu.flags.contains(Flags::ZERO));
}

#[test]
fn std_rep_stosw_fills_backwards() {
    // mov ax,BEEF / mov di,3006 / mov cx,3 / std / rep stosw / hlt
    let (mut cpu, mut mem) = boot(&[
        0xB8, 0xEF, 0xBE, 0xBF, 0x06, 0x30, 0xB9, 0x03, 0x00, 0xFD, 0xF3, 0xAB, 0xF4,
    ]);
    assert_eq!(cpu.run(&mut mem, 100), Ok(Outcome::Halted));
    assert_eq!(mem.word(0x3006), 0xBEEF);
    assert_eq!(mem.word(0x3004), 0xBEEF);
    assert_eq!(mem.word(0x3002), 0xBEEF);
    assert_eq!(mem.word(0x3000), 0x0000);
    assert_eq!(cpu.reg(Reg::Di), 0x3000);
    assert!(cpu.flags.contains(Flags::DIRECTION));
}

#[test]
fn source_segment_can_be_overridden() {
    // mov si,2000 / cs: lodsb / hlt
    let (mut cpu, mut mem) = boot(&[0xBE, 0x00, 0x20, 0x2E, 0xAC, 0xF4]);
    cpu.set_sreg(SReg::Ds, 0x0100);
    mem.load_at(0x2000, &[0x11]).unwrap();
    mem.load_at(0x3000, &[0x22]).unwrap();
    assert_eq!(cpu.run(&mut mem, 10), Ok(Outcome::Halted));
    assert_eq!(cpu.reg(Reg::Ax), 0x0011);

    // without the override DS applies
    let (mut cpu, mut mem) = boot(&[0xBE, 0x00, 0x20, 0xAC, 0xF4]);
    cpu.set_sreg(SReg::Ds, 0x0100);
    mem.load_at(0x3000, &[0x22]).unwrap();
    assert_eq!(cpu.run(&mut mem, 10), Ok(Outcome::Halted));
    assert_eq!(cpu.reg(Reg::Ax), 0x0022);
}

#[test]
fn destination_ignores_segment_override() {
    // ds: stosb
    let (mut cpu, mut mem) = boot(&[0x3E, 0xAA]);
    cpu.set_sreg(SReg::Ds, 0x0100);
    cpu.set_sreg(SReg::Es, 0x0200);
    cpu.set_reg(Reg::Ax, 0x0077);
    cpu.step(&mut mem);
    assert_eq!(mem.byte(0x2000), 0x77);
    assert_eq!(mem.byte(0x1000), 0x00);
}

#[test]
fn unprefixed_string_op_ignores_cx() {
    let (mut cpu, mut mem) = boot(&[0xA4]);
    cpu.set_reg(Reg::Si, 0x2000);
    cpu.set_reg(Reg::Di, 0x3000);
    mem.load_at(0x2000, &[0x5A]).unwrap();
    cpu.step(&mut mem);
    assert_eq!(mem.byte(0x3000), 0x5A);
    assert_eq!(cpu.reg(Reg::Cx), 0);
}

#[test]
fn rep_with_zero_count_does_nothing() {
    let (mut cpu, mut mem) = boot(&[0xF3, 0xA4]);
    cpu.set_reg(Reg::Si, 0x2000);
    cpu.set_reg(Reg::Di, 0x3000);
    mem.load_at(0x2000, &[0x5A]).unwrap();
    assert_eq!(cpu.step(&mut mem), Outcome::Normal);
    assert_eq!(mem.byte(0x3000), 0x00);
    assert_eq!(cpu.reg(Reg::Si), 0x2000);
    assert_eq!(cpu.reg(Reg::Ip), 0x102);
}

#[test]
fn port_string_transfers() {
    // mov dx,60 / insb ; outsw
    let (mut cpu, mut mem) = boot(&[0xBA, 0x60, 0x00, 0x6C, 0x6F]);
    mem.io[0x60] = 0x99;
    cpu.set_reg(Reg::Di, 0x3000);
    cpu.set_reg(Reg::Si, 0x2000);
    mem.load_at(0x2000, &[0x34, 0x12]).unwrap();
    cpu.step(&mut mem);
    cpu.step(&mut mem);
    assert_eq!(mem.byte(0x3000), 0x99);
    assert_eq!(cpu.reg(Reg::Di), 0x3001);
    cpu.step(&mut mem);
    assert_eq!(&mem.io[0x60..0x62], &[0x34, 0x12]);
    assert_eq!(cpu.reg(Reg::Si), 0x2002);
}
