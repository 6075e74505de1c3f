// CLASSIFICATION: COMMUNITY
// Filename: create_sha1.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

use clap::Parser;
use std::path::PathBuf;

use tgrub::boot::file_hash::{format_hash_line, hash_file};
use tgrub::bootloader::storage::HostStorage;
use tgrub::config::TCG_BUFFER_SIZE;

#[derive(Parser)]
#[command(about = "Print checkfile lines (`<sha1>  <path>`) for FILES")]
struct Cli {
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let storage = HostStorage::new("/");
    for file in &cli.files {
        let full = cwd.join(file).display().to_string();
        let digest = hash_file(&storage, &full, TCG_BUFFER_SIZE)?;
        print!("{}", format_hash_line(&digest, &file.display().to_string()));
    }
    Ok(())
}
