use pretty_assertions::assert_eq;

use i186_rs::{Cpu, CpuConfig, CpuError, Flags, LinearMemory, Outcome, Reg, SReg};

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
fn add_two_registers_and_halt() {
    // mov ax,5 / mov bx,3 / add ax,bx / hlt
    let (mut cpu, mut mem) = boot(&[0xB8, 0x05, 0x00, 0xBB, 0x03, 0x00, 0x01, 0xD8, 0xF4]);
    assert_eq!(cpu.run(&mut mem, 100), Ok(Outcome::Halted));
    assert_eq!(cpu.reg(Reg::Ax), 8);
    assert_eq!(cpu.reg(Reg::Bx), 3);
    assert_eq!(cpu.reg(Reg::Ip), 0x109);
    assert_eq!(cpu.flags, Flags::empty());
}

#[test]
fn starts_at_the_reset_vector() {
    let mut mem = LinearMemory::new();
    let mut rom = [0u8; 16];
    rom[0] = 0xF4;
    mem.load_top(&rom).unwrap();

    let mut cpu = Cpu::new(CpuConfig::default());
    assert_eq!(cpu.step(&mut mem), Outcome::Halted);
    assert_eq!(cpu.sreg(SReg::Cs), 0xF000);
    assert_eq!(cpu.reg(Reg::Ip), 0xFFF1);
}

#[test]
fn far_jump_out_of_the_reset_vector() {
    // jmp 0000:0100 at FFFF0, hlt at 00100
    let mut mem = LinearMemory::new();
    let mut rom = [0u8; 16];
    rom[..5].copy_from_slice(&[0xEA, 0x00, 0x01, 0x00, 0x00]);
    mem.load_top(&rom).unwrap();
    mem.load_at(0x100, &[0xF4]).unwrap();

    let mut cpu = Cpu::new(CpuConfig::default());
    assert_eq!(cpu.run(&mut mem, 10), Ok(Outcome::Halted));
    assert_eq!((cpu.sreg(SReg::Cs), cpu.reg(Reg::Ip)), (0, 0x101));
}

#[test]
fn step_limit_is_reported() {
    // jmp $
    let (mut cpu, mut mem) = boot(&[0xEB, 0xFE]);
    assert_eq!(
        cpu.run(&mut mem, 10),
        Err(CpuError::StepLimit {
            limit: 10,
            cs: 0,
            ip: 0x100
        })
    );
}

#[test]
fn wait_stops_the_run_loop() {
    let (mut cpu, mut mem) = boot(&[0x90, 0x9B, 0xF4]);
    assert_eq!(cpu.run(&mut mem, 10), Ok(Outcome::Waiting));
    assert_eq!(cpu.reg(Reg::Ip), 0x102);
}

#[test]
fn ports_latch_through_in_and_out() {
    // mov al,5A / out 10,al / mov al,0 / in al,10
    // mov dx,0300 / mov ax,1234 / out dx,ax / hlt
    let (mut cpu, mut mem) = boot(&[
        0xB0, 0x5A, 0xE6, 0x10, 0xB0, 0x00, 0xE4, 0x10, 0xBA, 0x00, 0x03, 0xB8, 0x34, 0x12,
        0xEF, 0xF4,
    ]);
    assert_eq!(cpu.run(&mut mem, 100), Ok(Outcome::Halted));
    assert_eq!(mem.io[0x10], 0x5A);
    assert_eq!(&mem.io[0x300..0x302], &[0x34, 0x12]);
}

#[test]
fn esc_and_lock_are_consumed() {
    // lock nop / esc [bx+si+12h] / hlt
    let (mut cpu, mut mem) = boot(&[0xF0, 0x90, 0xD8, 0x40, 0x12, 0xF4]);
    assert_eq!(cpu.step(&mut mem), Outcome::Normal);
    assert_eq!(cpu.reg(Reg::Ip), 0x102);
    assert_eq!(cpu.step(&mut mem), Outcome::Normal);
    assert_eq!(cpu.reg(Reg::Ip), 0x105);
    assert_eq!(cpu.step(&mut mem), Outcome::Halted);
}

#[test]
fn state_dumps_as_json() {
    let (mut cpu, mut mem) = boot(&[0xB8, 0x34, 0x12, 0xF4]);
    cpu.run(&mut mem, 10).unwrap();
    let json = serde_json::to_value(&cpu).unwrap();
    assert_eq!(json["regs"][0], 0x1234);
    assert_eq!(json["segs"][1], 0);
    assert_eq!(json["cfg"]["reset_ip"], 0x100);
}
