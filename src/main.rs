//! TRON GPU vanity address search CLI.
//!
//! Usage:
//!   tron_vanity -L                       # search for a "lucky number" address, random seed
//!   tron_vanity -z <128-hex-pubkey> -R    # search for repeated-trailing-char addresses from a fixed seed
//!   tron_vanity -T 888,999 -s 1           # suffix search, skipping GPU index 1

use std::fs;
use std::process;

use clap::Parser;

use tron_vanity::dispatcher::KernelSources;
use tron_vanity::{Config, CoreError, Dispatcher, SeedKey};

fn main() {
    let config = Config::parse();

    if let Err(e) = run(config) {
        eprintln!("runtime error: {}", e);
        process::exit(1);
    }
}

fn run(config: Config) -> Result<(), CoreError> {
    config.validate()?;
    let mode = config.resolve_mode()?;

    let seed = match &config.public_key {
        Some(hex) => tron_vanity::SeedKey::from_public_hex(hex)?,
        None => {
            println!("no public key provided, generating a seed key pair...");
            let seed = SeedKey::generate();
            println!("seed public key:  {}", hex::encode(&seed.uncompressed_bytes()[1..]));
            println!();
            seed
        }
    };

    println!("mode: {}", mode.name);

    let sources = read_kernel_sources()?;
    let cache_dir = tron_vanity::dispatcher::default_cache_dir();

    println!("devices:");
    let dispatcher = Dispatcher::new(seed, mode, &sources, &config, &cache_dir)?;
    println!(
        "running on {} device(s), press Ctrl+C to stop",
        dispatcher.device_count()
    );
    println!();

    let stop_flag = dispatcher.stop_flag_clone();
    ctrlc::set_handler(move || {
        stop_flag.store(true, std::sync::atomic::Ordering::Relaxed);
    })
    .expect("failed to set Ctrl-C handler");

    while let Some(hit) = dispatcher.next_hit() {
        print_hit(&hit);
    }

    dispatcher.join();
    Ok(())
}

fn read_kernel_sources() -> Result<KernelSources, CoreError> {
    let keccak = fs::read_to_string("keccak.cl")
        .map_err(|e| CoreError::Runtime(format!("reading keccak.cl: {}", e)))?;
    let profanity = fs::read_to_string("profanity.cl")
        .map_err(|e| CoreError::Runtime(format!("reading profanity.cl: {}", e)))?;
    Ok(KernelSources { keccak, profanity })
}

fn print_hit(hit: &tron_vanity::Hit) {
    println!("=== hit (score {}) ===", hit.score);
    println!("address:     {}", hit.address);
    match hit.private_key {
        Some(key) => println!("private key: 0x{}", hex::encode(key)),
        None => println!("private key: unknown (seed was a bare public key; offset {})", hit.offset),
    }
    println!("device:      {}", hit.device_label);
    println!("round:       {}", hit.round);
    println!();
}
