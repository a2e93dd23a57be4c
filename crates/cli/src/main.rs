//! Control-program CLI for the two simulation cores.
//!
//! This binary stands in for the out-of-scope GUI: it loads a program image,
//! steps a core a fixed number of cycles (or to completion), and prints the
//! final snapshot as JSON so a renderer or a human can inspect it without
//! linking against `archsim-core` directly.

use std::fs;
use std::process;

use clap::{Parser, Subcommand};

use archsim_core::config::{MesiConfig, TomasuloConfig};
use archsim_core::mesi::types::CpuRequest;
use archsim_core::mesi::MesiSystem;
use archsim_core::tomasulo::TomasuloCore;

#[derive(Parser, Debug)]
#[command(name = "archsimctl", author, version, about = "Step either simulation core and print its state")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the Tomasulo out-of-order core on a raw instruction image.
    RunTomasulo {
        /// Path to a binary file of little-endian 64-bit instruction words.
        #[arg(short, long)]
        program: String,

        /// Maximum cycles to step before giving up (ignored if the core halts first).
        #[arg(short, long, default_value_t = 100_000)]
        cycles: u64,
    },

    /// Run the MESI multiprocessor on a fixed scripted sequence of per-PE requests.
    RunMesi {
        /// Path to a JSON array of `{pe, address, write, data, size}` requests.
        #[arg(short, long)]
        requests: String,

        /// Maximum cycles to step before giving up (ignored if the system quiesces first).
        #[arg(short, long, default_value_t = 10_000)]
        cycles: u64,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::RunTomasulo { program, cycles } => cmd_run_tomasulo(&program, cycles),
        Commands::RunMesi { requests, cycles } => cmd_run_mesi(&requests, cycles),
    }
}

/// Loads `path` as a flat binary of little-endian 64-bit words, runs the
/// core until it halts or `max_cycles` is exhausted, then prints the final
/// snapshot.
fn cmd_run_tomasulo(path: &str, max_cycles: u64) {
    let bytes = fs::read(path).unwrap_or_else(|e| {
        eprintln!("error reading {path}: {e}");
        process::exit(1);
    });
    if bytes.len() % 8 != 0 {
        eprintln!("error: {path} is not a whole number of 64-bit words ({} bytes)", bytes.len());
        process::exit(1);
    }
    let words: Vec<u64> = bytes.chunks_exact(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())).collect();

    let mut core = TomasuloCore::new(TomasuloConfig::default());
    core.load_program(&words);

    let mut cycles_run = 0;
    loop {
        match core.step() {
            Ok(outcome) => {
                cycles_run += 1;
                if outcome.halted || cycles_run >= max_cycles {
                    break;
                }
            }
            Err(e) => {
                eprintln!("simulation fault: {e}");
                process::exit(1);
            }
        }
    }

    print_json(&core.snapshot());
}

#[derive(serde::Deserialize)]
struct ScriptedRequest {
    pe: usize,
    address: u16,
    write: bool,
    #[serde(default)]
    data: u64,
    size: u8,
}

/// Loads `path` as a JSON array of scripted requests, submits each to its
/// PE up front, steps the system to quiescence (or `max_cycles`), then
/// prints the final snapshot.
fn cmd_run_mesi(path: &str, max_cycles: u64) {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error reading {path}: {e}");
        process::exit(1);
    });
    let requests: Vec<ScriptedRequest> = serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("error parsing {path}: {e}");
        process::exit(1);
    });

    let mut system = MesiSystem::new(MesiConfig::default());
    for r in requests {
        system.submit(
            r.pe,
            CpuRequest {
                address: r.address,
                write: r.write,
                data: r.data,
                size: r.size,
            },
        );
    }

    let mut cycles_run = 0;
    while !system.is_quiescent() && cycles_run < max_cycles {
        system.step();
        cycles_run += 1;
    }

    print_json(&system.snapshot());
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error serializing snapshot: {e}");
            process::exit(1);
        }
    }
}
