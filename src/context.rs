use tracing::debug;

use crate::cpu::{Cpu, Flags, Prefix, Rep, Reg, SReg};
use crate::decoder::Rm;
use crate::memory::{Bus, FarPtr};
use crate::word::Word;

/// How an opcode handler finished.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A prefix byte was consumed; keep fetching the same instruction.
    Prefix,
    Done,
    Halt,
    Wait,
}

/// Segment selection for an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegSel {
    /// Always this register.
    Exact(SReg),
    /// This register unless a segment-override prefix is active.
    Default(SReg),
}

impl From<SReg> for SegSel {
    fn from(seg: SReg) -> Self {
        SegSel::Exact(seg)
    }
}

/// Execution context: the CPU state and the bus for the duration of one
/// `Cpu::step`. Every register, memory, port and stack access made by an
/// opcode handler goes through here.
pub struct Ctx<'a, B: Bus + ?Sized> {
    pub(crate) cpu: &'a mut Cpu,
    pub(crate) bus: &'a mut B,
}

impl<'a, B: Bus + ?Sized> Ctx<'a, B> {
    pub fn new(cpu: &'a mut Cpu, bus: &'a mut B) -> Self {
        Self { cpu, bus }
    }

    // flags

    pub fn flags(&self) -> Flags {
        self.cpu.flags
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.cpu.flags = flags;
    }

    pub fn flags_byte(&self) -> u8 {
        self.cpu.flags.to_byte()
    }

    pub fn set_flags_byte(&mut self, value: u8) {
        self.cpu.flags = self.cpu.flags.with_byte(value);
    }

    pub fn flags_word(&self) -> u16 {
        self.cpu.flags.to_word()
    }

    pub fn set_flags_word(&mut self, value: u16) {
        self.cpu.flags = Flags::from_word(value);
    }

    // segments

    fn resolve(&self, sel: SegSel) -> SReg {
        match sel {
            SegSel::Exact(seg) => seg,
            SegSel::Default(seg) => self.cpu.prefix.seg.unwrap_or(seg),
        }
    }

    pub fn seg(&self, sel: impl Into<SegSel>) -> u16 {
        self.cpu.sreg(self.resolve(sel.into()))
    }

    pub fn set_seg(&mut self, sel: impl Into<SegSel>, val: u16) {
        let seg = self.resolve(sel.into());
        self.cpu.set_sreg(seg, val);
    }

    // registers

    pub fn reg(&self, reg: Reg) -> u16 {
        self.cpu.reg(reg)
    }

    pub fn set_reg(&mut self, reg: Reg, val: u16) {
        self.cpu.set_reg(reg, val);
    }

    pub fn reg_add(&mut self, reg: Reg, diff: i16) {
        let val = self.reg(reg).wrapping_add(diff as u16);
        self.set_reg(reg, val);
    }

    /// Register by ModRM index at width `T`.
    pub fn read_reg<T: Word>(&self, idx: u8) -> T {
        T::read_reg(self.cpu, idx)
    }

    pub fn write_reg<T: Word>(&mut self, idx: u8, val: T) {
        T::write_reg(self.cpu, idx, val);
    }

    /// The accumulator pair used by widening multiply and divide:
    /// AL:AH for bytes, AX:DX for words.
    pub fn pair<T: Word>(&self) -> (T, T) {
        (self.read_reg(0), self.read_reg(T::HI_INDEX))
    }

    pub fn set_pair<T: Word>(&mut self, lo: T, hi: T) {
        self.write_reg(0, lo);
        self.write_reg(T::HI_INDEX, hi);
    }

    // pointers

    pub fn ptr(&self, reg: Reg, sel: impl Into<SegSel>) -> FarPtr {
        FarPtr::new(self.reg(reg), self.seg(sel))
    }

    pub fn set_ptr(&mut self, reg: Reg, sel: impl Into<SegSel>, addr: FarPtr) {
        self.set_reg(reg, addr.disp);
        self.set_seg(sel, addr.seg);
    }

    /// Returns the pointer, then moves the register by `diff`.
    pub fn ptr_post_inc(&mut self, reg: Reg, sel: impl Into<SegSel>, diff: i16) -> FarPtr {
        let addr = self.ptr(reg, sel);
        self.reg_add(reg, diff);
        addr
    }

    /// Moves the register by `diff`, then returns the pointer.
    pub fn ptr_pre_inc(&mut self, reg: Reg, sel: impl Into<SegSel>, diff: i16) -> FarPtr {
        self.reg_add(reg, diff);
        self.ptr(reg, sel)
    }

    // ports and memory

    pub fn port_in<T: Word>(&mut self, port: u16) -> T {
        T::port_in(self.bus, port)
    }

    pub fn port_out<T: Word>(&mut self, port: u16, val: T) {
        T::port_out(self.bus, port, val);
    }

    pub fn read<T: Word>(&mut self, addr: FarPtr) -> T {
        T::read_mem(self.bus, addr)
    }

    pub fn write<T: Word>(&mut self, addr: FarPtr, val: T) {
        T::write_mem(self.bus, addr, val);
    }

    /// Far pointer stored as offset word then segment word.
    pub fn read_far(&mut self, addr: FarPtr) -> FarPtr {
        let disp = self.read(addr);
        let seg = self.read(addr.offset(2));
        FarPtr::new(disp, seg)
    }

    pub fn read_rm<T: Word>(&mut self, rm: Rm) -> T {
        match rm {
            Rm::Reg(idx) => self.read_reg(idx),
            Rm::Mem(addr) => self.read(addr),
        }
    }

    pub fn write_rm<T: Word>(&mut self, rm: Rm, val: T) {
        match rm {
            Rm::Reg(idx) => self.write_reg(idx, val),
            Rm::Mem(addr) => self.write(addr, val),
        }
    }

    /// Far pointer operand. Registers cannot hold one.
    pub fn rm_far(&mut self, rm: Rm) -> Option<FarPtr> {
        match rm {
            Rm::Reg(_) => None,
            Rm::Mem(addr) => Some(self.read_far(addr)),
        }
    }

    // stack

    pub fn push<T: Word>(&mut self, val: T) {
        let addr = self.ptr_pre_inc(Reg::Sp, SReg::Ss, -i16::from(T::BYTES));
        self.write(addr, val);
    }

    pub fn pop<T: Word>(&mut self) -> T {
        let addr = self.ptr_post_inc(Reg::Sp, SReg::Ss, i16::from(T::BYTES));
        self.read(addr)
    }

    pub fn push_frame_near(&mut self) {
        let ip = self.reg(Reg::Ip);
        self.push(ip);
    }

    pub fn pop_frame_near(&mut self) -> u16 {
        self.pop()
    }

    /// Pushes CS then IP.
    pub fn push_frame_far(&mut self) {
        let ret = self.ptr(Reg::Ip, SReg::Cs);
        self.push(ret.seg);
        self.push(ret.disp);
    }

    pub fn pop_frame_far(&mut self) -> FarPtr {
        let disp = self.pop();
        let seg = self.pop();
        FarPtr::new(disp, seg)
    }

    /// Pushes FLAGS, CS then IP.
    pub fn push_frame_interrupt(&mut self) {
        let flags = self.flags_word();
        self.push(flags);
        self.push_frame_far();
    }

    /// Pops IP, CS then FLAGS; returns the return address.
    pub fn pop_frame_interrupt(&mut self) -> FarPtr {
        let ret = self.pop_frame_far();
        let flags = self.pop();
        self.set_flags_word(flags);
        ret
    }

    /// `ENTER size, level`: nested frames copy `level - 1` display
    /// pointers from the enclosing frame.
    pub fn push_frame_local(&mut self, size: u16, level: u8) {
        let old_bp = self.reg(Reg::Bp);
        self.push(old_bp);
        let frame = self.reg(Reg::Sp);
        let level = level % 32;
        if level > 0 {
            for _ in 1..level {
                let addr = self.ptr_pre_inc(Reg::Bp, SReg::Ss, -2);
                let display: u16 = self.read(addr);
                self.push(display);
            }
            self.push(frame);
        }
        self.set_reg(Reg::Bp, frame);
        self.reg_add(Reg::Sp, (size as i16).wrapping_neg());
    }

    /// `LEAVE`.
    pub fn pop_frame_local(&mut self) {
        let bp = self.reg(Reg::Bp);
        self.set_reg(Reg::Sp, bp);
        let old_bp = self.pop();
        self.set_reg(Reg::Bp, old_bp);
    }

    /// Rewinds IP to the first byte of the current instruction.
    pub fn inst_repeat(&mut self) {
        let len = i16::from(self.cpu.inst_len);
        self.reg_add(Reg::Ip, -len);
    }

    // string addressing

    fn str_step<T: Word>(&self) -> i16 {
        let step = i16::from(T::BYTES);
        if self.flags().contains(Flags::DIRECTION) {
            -step
        } else {
            step
        }
    }

    /// `DS:SI` (segment overridable), post-stepped by the direction flag.
    pub fn str_src<T: Word>(&mut self) -> FarPtr {
        let step = self.str_step::<T>();
        self.ptr_post_inc(Reg::Si, SegSel::Default(SReg::Ds), step)
    }

    /// `ES:DI`, post-stepped by the direction flag.
    pub fn str_dst<T: Word>(&mut self) -> FarPtr {
        let step = self.str_step::<T>();
        self.ptr_post_inc(Reg::Di, SReg::Es, step)
    }

    /// Continuation test for `CMPS`/`SCAS` under a repeat prefix.
    pub fn str_rep(&self) -> bool {
        let zero = self.flags().contains(Flags::ZERO);
        match self.cpu.prefix.rep {
            Some(Rep::NotZero) => !zero,
            Some(Rep::Zero) => zero,
            None => false,
        }
    }

    /// Fetches the next instruction byte or word at `CS:IP`.
    pub fn fetch<T: Word>(&mut self) -> T {
        self.cpu.inst_len = self.cpu.inst_len.saturating_add(T::BYTES);
        let addr = self.ptr_post_inc(Reg::Ip, SReg::Cs, i16::from(T::BYTES));
        self.read(addr)
    }

    // end of instruction

    fn finish(&mut self) {
        self.cpu.prefix = Prefix::default();
        self.cpu.inst_len = 0;
    }

    /// Invalid opcode or operand form: vector 6.
    pub fn end_bad(&mut self) -> Step {
        debug!(
            cs = self.seg(SReg::Cs),
            ip = self.reg(Reg::Ip),
            "invalid instruction"
        );
        self.finish();
        self.push_frame_interrupt();
        self.end_interrupt(6)
    }

    fn prefix_room(&self) -> bool {
        self.cpu.inst_len < self.cpu.cfg.max_instruction_len
    }

    pub fn end_prefix_seg(&mut self, seg: SReg) -> Step {
        if !self.prefix_room() {
            return self.end_bad();
        }
        self.cpu.prefix.seg = Some(seg);
        Step::Prefix
    }

    pub(crate) fn end_prefix_rep(&mut self, rep: Rep) -> Step {
        if !self.prefix_room() {
            return self.end_bad();
        }
        self.cpu.prefix.rep = Some(rep);
        Step::Prefix
    }

    pub fn end_prefix_lock(&mut self) -> Step {
        if !self.prefix_room() {
            return self.end_bad();
        }
        self.cpu.prefix.lock = true;
        Step::Prefix
    }

    pub fn end_next(&mut self) -> Step {
        self.finish();
        Step::Done
    }

    pub fn end_halt(&mut self) -> Step {
        debug!(cs = self.seg(SReg::Cs), ip = self.reg(Reg::Ip), "halt");
        self.finish();
        Step::Halt
    }

    pub fn end_wait(&mut self) -> Step {
        self.finish();
        Step::Wait
    }

    pub fn end_jmp_rel(&mut self, diff: i16) -> Step {
        self.reg_add(Reg::Ip, diff);
        self.end_next()
    }

    pub fn end_jmp_near(&mut self, ip: u16) -> Step {
        self.set_reg(Reg::Ip, ip);
        self.end_next()
    }

    pub fn end_jmp_far(&mut self, addr: FarPtr) -> Step {
        self.set_ptr(Reg::Ip, SReg::Cs, addr);
        self.end_next()
    }

    /// Clears IF and TF and jumps through the vector table entry at
    /// `0000:vector*4`. The caller pushes the interrupt frame.
    pub fn end_interrupt(&mut self, vector: u8) -> Step {
        let mut flags = self.flags();
        flags.remove(Flags::INTERRUPT | Flags::TRAP);
        self.set_flags(flags);
        let target = self.read_far(FarPtr::new(u16::from(vector) * 4, 0));
        debug!(vector, %target, "interrupt");
        self.end_jmp_far(target)
    }

    /// Divide fault: the frame points back at the faulting instruction.
    pub fn end_divide_error(&mut self) -> Step {
        self.inst_repeat();
        self.push_frame_interrupt();
        self.end_interrupt(0)
    }

    /// Runs `body` once, or under a repeat prefix once per CX count until CX
    /// reaches zero or `body` returns `false`. CX is written back afterwards.
    pub fn end_repeat<F>(&mut self, mut body: F) -> Step
    where
        F: FnMut(&mut Self) -> bool,
    {
        if self.cpu.prefix.rep.is_none() {
            body(self);
            return self.end_next();
        }
        let mut count = self.reg(Reg::Cx);
        while count != 0 {
            count -= 1;
            if !body(self) {
                break;
            }
        }
        self.set_reg(Reg::Cx, count);
        self.end_next()
    }
}
