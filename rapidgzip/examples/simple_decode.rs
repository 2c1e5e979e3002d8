//! Minimal example: decompress a file given on the command line to stdout
//! or to a second path argument, without any of the CLI crate's argument
//! parsing, progress bar, or index handling.

use anyhow::Result;
use std::env;
use std::fs::File;
use std::io::{Read, Write};

use rapidgzip::{open, ChunkConfiguration};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <input.gz> [output]", args[0]);
        return Ok(());
    }

    let input_path = &args[1];
    let mut decoder = open(input_path, ChunkConfiguration::default())?;

    let mut buffer = [0u8; 8192];
    let mut out: Box<dyn Write> = if args.len() > 2 {
        Box::new(File::create(&args[2])?)
    } else {
        Box::new(std::io::stdout())
    };

    loop {
        let n = decoder.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])?;
    }

    Ok(())
}
