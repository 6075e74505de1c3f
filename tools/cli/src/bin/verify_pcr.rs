// CLASSIFICATION: COMMUNITY
// Filename: verify_pcr.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;

use tgrub::boot::offline::{chain_files, format_result};
use tgrub::bootloader::storage::{HostStorage, Storage};
use tgrub::config::TCG_BUFFER_SIZE;
use tgrub::PcrValue;

#[derive(Parser)]
#[command(about = "Compute the PCR value a measured boot of FILES would produce")]
struct Cli {
    /// Initial PCR value: NULL or 40 lowercase hex digits
    initial: String,
    /// Files in measurement order
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let initial: PcrValue = match cli.initial.parse() {
        Ok(v) => v,
        Err(e) => bail!("{e}\nusage: verify_pcr <NULL|40 hex digits> <file>..."),
    };

    let cwd = std::env::current_dir()?;
    let paths: Vec<String> = cli.files.iter().map(|p| cwd.join(p).display().to_string()).collect();
    let storage = HostStorage::new("/");
    for path in &paths {
        if !storage.exists(path) {
            bail!("file {path} does not exist\nusage: verify_pcr <NULL|40 hex digits> <file>...");
        }
    }

    let pcr = chain_files(initial, &storage, &paths, TCG_BUFFER_SIZE)?;
    print!("{}", format_result(&pcr));
    Ok(())
}
