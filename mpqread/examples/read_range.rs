//! Read a byte range from a file inside an archive and show the decode work
//!
//! Usage: cargo run --example read_range -- <archive> <file> [offset] [length]

use mpqread::{Archive, Result};
use std::io::SeekFrom;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <archive> <file> [offset] [length]", args[0]);
        std::process::exit(1);
    }

    let offset: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
    let length: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(256);

    let archive = Archive::open(&args[1])?;
    let mut file = archive.open_file(&args[2])?;
    println!(
        "{}: {} bytes, flags {:?}",
        args[2],
        file.size()?,
        file.block().map(|block| block.flags)
    );

    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; length];
    let outcome = file.read(&mut buf)?;
    println!(
        "Read {} bytes at {} (eof: {})",
        outcome.bytes_read,
        offset,
        outcome.is_eof()
    );

    for (i, line) in buf[..outcome.bytes_read].chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{:08x}  {}", offset as usize + i * 16, hex.join(" "));
    }

    let stats = file.stats();
    println!(
        "cache hits {}, cache fills {}, batched runs {}, sectors {}, stream reads {}",
        stats.cache_hits,
        stats.cache_fills,
        stats.batched_runs,
        stats.sectors_decoded,
        stats.stream_reads
    );
    Ok(())
}
