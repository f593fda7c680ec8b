use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ulp_asm::Assembler;
use ulp_rs::{run_with_host, Cpu, UlpRam};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assembler and emulator for the ESP32 ULP coprocessor"
)]
struct Opts {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Assemble a ULP source file into a loadable binary
    Asm {
        /// Input assembly file
        file: PathBuf,
        /// Number of bytes reserved for the ULP
        #[arg(short, long, default_value_t = 8176)]
        reserved: usize,
        /// Name of the output file
        #[arg(short, long, default_value = "out.bin")]
        out: PathBuf,
        /// Print the size of all sections
        #[arg(short, long)]
        size: bool,
        /// Emit a textual listing rather than a binary
        #[arg(long = "output_assembly")]
        output_assembly: bool,
        /// Fold repeated instruction tails into jumps
        #[arg(long)]
        reduce: bool,
    },
    /// Run a compiled image on the emulator, printing its host output
    Run {
        /// Compiled binary image
        file: PathBuf,
        /// Cycle budget before giving up
        #[arg(long, default_value_t = 8_000_000)]
        cycles: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Opts::parse().cmd {
        Cmd::Asm {
            file,
            reserved,
            out,
            size,
            output_assembly,
            reduce,
        } => {
            let content = fs::read_to_string(&file)?;
            let name = file.display().to_string();
            let mut asm = Assembler::new();
            if output_assembly {
                let listing = asm.build_listing(&content, &name, reserved, reduce)?;
                fs::write(&out, listing)?;
            } else {
                let bin = asm.build_binary(&content, &name, reserved, reduce)?;
                fs::write(&out, bin)?;
            }
            if size {
                println!("{}", asm.compiler.format_sections());
            }
        }
        Cmd::Run { file, cycles } => {
            let bin = fs::read(&file)?;
            let mut cpu = Cpu::new();
            let mut ram = UlpRam::new();
            cpu.load(&mut ram, &bin)?;
            let out = run_with_host(&mut cpu, &mut ram, cycles)?;
            print!("{out}");
        }
    }
    Ok(())
}
