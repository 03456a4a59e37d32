//! Generate an Ed25519 keypair for artifact signing.
//!
//! ```bash
//! generate_keypair --out-seed keys/signing.seed --out-pub keys/verifying.pub
//! ```
//!
//! The seed file is created with 0600 permissions on Unix. Point
//! `sign_model --key-file` at the seed and `verifying_key_b64_file` in the
//! runtime configuration at the public key.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use clap::Parser;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use zeroize::{Zeroize, Zeroizing};

#[derive(Parser)]
#[command(name = "generate_keypair", about = "Create an artifact signing keypair")]
struct Args {
    /// Where to write the base64 seed (secret).
    #[arg(long = "out-seed", value_name = "PATH")]
    out_seed: PathBuf,

    /// Where to write the base64 verifying key.
    #[arg(long = "out-pub", value_name = "PATH")]
    out_pub: Option<PathBuf>,

    /// Overwrite existing files.
    #[arg(long)]
    force: bool,
}

fn write_line(path: &Path, contents: &str, mode: u32, force: bool) -> Result<()> {
    ensure!(
        force || !path.exists(),
        "refusing to overwrite existing file {}; use --force",
        path.display()
    );
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = opts
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(contents.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let signing_key = SigningKey::from_bytes(&seed);
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed));
    seed.zeroize();

    let pub_b64 = general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes());

    write_line(&args.out_seed, &seed_b64, 0o600, args.force)?;
    println!("Wrote signing seed to {}", args.out_seed.display());

    if let Some(out_pub) = &args.out_pub {
        write_line(out_pub, &pub_b64, 0o644, args.force)?;
        println!("Wrote verifying key to {}", out_pub.display());
    }

    // Only non-secret material goes to stdout.
    println!("Verifying key (base64): {pub_b64}");
    Ok(())
}
