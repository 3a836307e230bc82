use pretty_assertions::assert_eq;

use i186_rs::{Cpu, CpuConfig, Flags, LinearMemory, Outcome, Reg, SReg};

const HANDLER: u16 = 0x0500;

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

/// Points every vector at a HLT at 0000:0500.
fn install_handlers(mem: &mut LinearMemory) {
    for vector in 0..=255u32 {
        let [lo, hi] = HANDLER.to_le_bytes();
        mem.load_at(vector * 4, &[lo, hi, 0, 0]).unwrap();
    }
    mem.load_at(u32::from(HANDLER), &[0xF4]).unwrap();
}

/// Interrupt frame on top of the stack as (ip, cs, flags).
fn frame(cpu: &Cpu, mem: &LinearMemory) -> (u16, u16, u16) {
    let sp = u32::from(cpu.reg(Reg::Sp));
    (mem.word(sp), mem.word(sp + 2), mem.word(sp + 4))
}

fn entered_handler(cpu: &Cpu) -> bool {
    cpu.sreg(SReg::Cs) == 0 && cpu.reg(Reg::Ip) == HANDLER
}

#[test]
fn reserved_opcode_traps_to_vector_6() {
    let (mut cpu, mut mem) = boot(&[0x63]);
    install_handlers(&mut mem);
    mem.load_at(6 * 4, &[0x00, 0x00, 0x50, 0x00]).unwrap();
    cpu.flags = Flags::INTERRUPT | Flags::CARRY;

    assert_eq!(cpu.step(&mut mem), Outcome::Normal);
    assert_eq!((cpu.sreg(SReg::Cs), cpu.reg(Reg::Ip)), (0x0050, 0x0000));
    assert_eq!(cpu.reg(Reg::Sp), 0xFFEA);
    assert_eq!(frame(&cpu, &mem), (0x0101, 0x0000, 0x0203));
    assert_eq!(cpu.flags, Flags::CARRY);

    // the handler at 0050:0000 is the shared HLT
    assert_eq!(cpu.step(&mut mem), Outcome::Halted);
}

#[test]
fn all_reserved_opcodes_trap() {
    for op in [0x63, 0x64, 0x65, 0x66, 0x67, 0xF1] {
        let (mut cpu, mut mem) = boot(&[op]);
        install_handlers(&mut mem);
        cpu.step(&mut mem);
        assert!(entered_handler(&cpu), "opcode {op:02X}");
    }
}

#[test]
fn register_operand_where_memory_is_required() {
    // lea ax,ax / les ax,ax / bound ax,ax / jmp far bx / call far bx
    for code in [
        &[0x8D, 0xC0][..],
        &[0xC4, 0xC0],
        &[0x62, 0xC0],
        &[0xFF, 0xEB],
        &[0xFF, 0xDB],
    ] {
        let (mut cpu, mut mem) = boot(code);
        install_handlers(&mut mem);
        cpu.step(&mut mem);
        assert!(entered_handler(&cpu), "{code:02X?}");
        assert_eq!(frame(&cpu, &mem).0, 0x0102);
    }
}

#[test]
fn prefix_chain_length_limit() {
    let mut code = vec![0x26; 14];
    code.push(0x90);
    let (mut cpu, mut mem) = boot(&code);
    install_handlers(&mut mem);
    assert_eq!(cpu.step(&mut mem), Outcome::Normal);
    assert_eq!(cpu.reg(Reg::Ip), 0x10F);

    let mut code = vec![0x26; 15];
    code.push(0x90);
    let (mut cpu, mut mem) = boot(&code);
    install_handlers(&mut mem);
    cpu.step(&mut mem);
    assert!(entered_handler(&cpu));
    assert_eq!(frame(&cpu, &mem).0, 0x010F);
}

#[test]
fn divide_by_zero_restarts_the_instruction() {
    // div bl
    let (mut cpu, mut mem) = boot(&[0xF6, 0xF3]);
    install_handlers(&mut mem);
    cpu.set_reg(Reg::Ax, 0x0007);
    cpu.step(&mut mem);
    assert!(entered_handler(&cpu));
    assert_eq!(frame(&cpu, &mem).0, 0x0100);
    assert_eq!(cpu.reg(Reg::Ax), 0x0007);
}

#[test]
fn divide_overflow_includes_prefixes_in_the_restart() {
    // es: div bl with a quotient that does not fit
    let (mut cpu, mut mem) = boot(&[0x26, 0xF6, 0xF3]);
    install_handlers(&mut mem);
    cpu.set_reg(Reg::Ax, 0x1000);
    cpu.set_reg(Reg::Bx, 0x0002);
    cpu.step(&mut mem);
    assert!(entered_handler(&cpu));
    assert_eq!(frame(&cpu, &mem).0, 0x0100);
}

#[test]
fn bound_checks_unsigned_range() {
    // bound ax,[2000]
    let code = [0x62, 0x06, 0x00, 0x20];
    let bounds = [0x10, 0x00, 0x20, 0x00];

    let (mut cpu, mut mem) = boot(&code);
    install_handlers(&mut mem);
    mem.load_at(0x2000, &bounds).unwrap();
    cpu.set_reg(Reg::Ax, 0x0015);
    cpu.step(&mut mem);
    assert_eq!(cpu.reg(Reg::Ip), 0x0104);

    let (mut cpu, mut mem) = boot(&code);
    install_handlers(&mut mem);
    mem.load_at(5 * 4, &[0x00, 0x06, 0x00, 0x00]).unwrap();
    mem.load_at(0x2000, &bounds).unwrap();
    cpu.set_reg(Reg::Ax, 0xFFF0);
    cpu.step(&mut mem);
    assert_eq!(cpu.reg(Reg::Ip), 0x0600);
    assert_eq!(frame(&cpu, &mem).0, 0x0104);
}

#[test]
fn software_interrupt_and_iret() {
    // int 21 / hlt ; iret at the handler
    let (mut cpu, mut mem) = boot(&[0xCD, 0x21, 0xF4]);
    install_handlers(&mut mem);
    mem.load_at(u32::from(HANDLER), &[0xCF]).unwrap();
    cpu.flags = Flags::INTERRUPT | Flags::CARRY;

    cpu.step(&mut mem);
    assert!(entered_handler(&cpu));
    assert_eq!(cpu.flags, Flags::CARRY);
    assert_eq!(frame(&cpu, &mem), (0x0102, 0x0000, 0x0203));

    cpu.step(&mut mem);
    assert_eq!(cpu.reg(Reg::Ip), 0x0102);
    assert_eq!(cpu.reg(Reg::Sp), 0xFFF0);
    assert_eq!(cpu.flags, Flags::INTERRUPT | Flags::CARRY);
    assert_eq!(cpu.step(&mut mem), Outcome::Halted);
}

#[test]
fn int3_and_into() {
    let (mut cpu, mut mem) = boot(&[0xCC]);
    install_handlers(&mut mem);
    mem.load_at(3 * 4, &[0x00, 0x07, 0x00, 0x00]).unwrap();
    cpu.step(&mut mem);
    assert_eq!(cpu.reg(Reg::Ip), 0x0700);
    assert_eq!(frame(&cpu, &mem).0, 0x0101);

    let (mut cpu, mut mem) = boot(&[0xCE]);
    install_handlers(&mut mem);
    cpu.step(&mut mem);
    assert_eq!(cpu.reg(Reg::Ip), 0x0101);

    let (mut cpu, mut mem) = boot(&[0xCE]);
    install_handlers(&mut mem);
    mem.load_at(4 * 4, &[0x00, 0x08, 0x00, 0x00]).unwrap();
    cpu.flags = Flags::OVERFLOW;
    cpu.step(&mut mem);
    assert_eq!(cpu.reg(Reg::Ip), 0x0800);
}

#[test]
fn trap_flag_single_steps() {
    let (mut cpu, mut mem) = boot(&[0x90, 0x90]);
    install_handlers(&mut mem);
    mem.load_at(4, &[0x00, 0x09, 0x00, 0x00]).unwrap();
    cpu.flags = Flags::TRAP;

    assert_eq!(cpu.step(&mut mem), Outcome::Normal);
    assert_eq!(cpu.reg(Reg::Ip), 0x0900);
    assert_eq!(frame(&cpu, &mem), (0x0101, 0x0000, 0x0102));
    assert!(!cpu.flags.contains(Flags::TRAP));
}

#[test]
fn trap_flag_fires_after_halt() {
    let (mut cpu, mut mem) = boot(&[0xF4]);
    install_handlers(&mut mem);
    mem.load_at(4, &[0x00, 0x09, 0x00, 0x00]).unwrap();
    cpu.flags = Flags::TRAP;

    assert_eq!(cpu.step(&mut mem), Outcome::Halted);
    assert_eq!(cpu.reg(Reg::Ip), 0x0900);
    assert_eq!(frame(&cpu, &mem).0, 0x0101);
}

#[test]
fn external_interrupts() {
    let (mut cpu, mut mem) = boot(&[0x90]);
    install_handlers(&mut mem);

    assert!(!cpu.interrupt(&mut mem, 8));
    assert_eq!(cpu.reg(Reg::Ip), 0x0100);
    assert_eq!(cpu.reg(Reg::Sp), 0xFFF0);

    cpu.flags = Flags::INTERRUPT;
    assert!(cpu.interrupt(&mut mem, 8));
    assert!(entered_handler(&cpu));
    assert_eq!(frame(&cpu, &mem), (0x0100, 0x0000, 0x0202));
    assert!(!cpu.flags.contains(Flags::INTERRUPT));

    // NMI ignores IF
    let (mut cpu, mut mem) = boot(&[0x90]);
    install_handlers(&mut mem);
    mem.load_at(2 * 4, &[0x00, 0x0A, 0x00, 0x00]).unwrap();
    cpu.nmi(&mut mem);
    assert_eq!(cpu.reg(Reg::Ip), 0x0A00);
}
