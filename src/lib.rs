pub mod cpu;
pub mod decoder;
pub mod exec;
pub mod host;
pub mod image;
pub mod memory;

pub use cpu::{Cpu, Flags, Trap};
pub use host::run_with_host;
pub use memory::{UlpRam, RAM_WORDS};
