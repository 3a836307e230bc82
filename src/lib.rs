pub mod alu;
pub mod bcd;
pub mod context;
pub mod cpu;
pub mod decoder;
pub mod exec;
pub mod group;
pub mod instructions;
pub mod memory;
pub mod word;

pub use cpu::{Cpu, CpuConfig, CpuError, Flags, Outcome, Reg, Reg8, SReg};
pub use memory::{Bus, FarPtr, LinearMemory, MemoryError};
