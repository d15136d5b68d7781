//! Model signing utility for Cardiorisk model artifacts.
//!
//! Creates a signed manifest (`manifest.json`) and Ed25519 signature
//! (`model.sig`) for a model artifact, so the server can verify it
//! when `CARDIORISK_MODEL_PUBKEY_B64_FILE` is set.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sign_model -- keygen <out_dir>
//! cargo run --bin sign_model -- sign <model_dir | model_file>
//! ```
//!
//! `keygen` writes `signing_key.b64` (0600) and `verifying_key.b64`.
//! `sign` reads the seed from `CARDIORISK_MODEL_SIGNING_KEY_B64_FILE`, or in
//! debug builds from `CARDIORISK_MODEL_SIGNING_KEY_B64`.

use std::env;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use cardiorisk::adapters::logistic::{sign_artifact, MANIFEST_FILE, SIGNATURE_FILE};

const KEY_FILE_ENV: &str = "CARDIORISK_MODEL_SIGNING_KEY_B64_FILE";
const KEY_ENV_DEV: &str = "CARDIORISK_MODEL_SIGNING_KEY_B64";
const SEED_FILE: &str = "signing_key.b64";
const PUBKEY_FILE: &str = "verifying_key.b64";

fn usage() -> anyhow::Error {
    anyhow!("Usage: sign_model keygen <out_dir> | sign_model sign <model_dir>")
}

fn read_signing_seed() -> Result<SigningKey> {
    let b64: Zeroizing<String> = if let Ok(path) = env::var(KEY_FILE_ENV) {
        Zeroizing::new(
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
        )
    } else if cfg!(debug_assertions) {
        // Dev-only fallback for convenience.
        Zeroizing::new(env::var(KEY_ENV_DEV).map_err(|_| {
            anyhow!("Missing signing key: set {KEY_FILE_ENV} (or {KEY_ENV_DEV} in debug builds)")
        })?)
    } else {
        bail!("Missing signing key: set {KEY_FILE_ENV}");
    };

    let mut raw = general_purpose::STANDARD
        .decode(b64.trim())
        .context("Invalid base64 in signing key")?;
    let seed: Result<[u8; 32], _> = raw.as_slice().try_into();
    let len = raw.len();
    raw.zeroize();

    let mut seed = seed.map_err(|_| {
        anyhow!("Signing key seed must be 32 bytes after base64 decode (got {len})")
    })?;
    let key = SigningKey::from_bytes(&seed);
    seed.zeroize();
    Ok(key)
}

fn keygen(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("Cannot create {out_dir:?}"))?;

    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let signing_key = SigningKey::from_bytes(&seed);
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed));
    seed.zeroize();

    let seed_path = out_dir.join(SEED_FILE);
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options
        .open(&seed_path)
        .with_context(|| format!("Refusing to overwrite or cannot create {seed_path:?}"))?;
    file.write_all(seed_b64.as_bytes())?;
    file.write_all(b"\n")?;

    let pub_b64 = general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes());
    let pub_path = out_dir.join(PUBKEY_FILE);
    fs::write(&pub_path, format!("{pub_b64}\n"))
        .with_context(|| format!("Cannot write {pub_path:?}"))?;

    println!("Wrote signing seed to {seed_path:?}");
    println!("Wrote verifying key to {pub_path:?}");
    println!("Verifying key (base64): {pub_b64}");
    Ok(())
}

fn sign(model_path: &Path) -> Result<()> {
    let signing_key = read_signing_seed()?;
    let manifest = sign_artifact(model_path, &signing_key)?;

    for name in manifest.files.keys() {
        println!("Signed {name} ({MANIFEST_FILE}, {SIGNATURE_FILE}) under {model_path:?}");
    }
    println!(
        "Verifying key (base64): {}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes())
    );
    Ok(())
}

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let command = args.next().ok_or_else(usage)?;
    let path = args.next().map(PathBuf::from).ok_or_else(usage)?;
    if args.next().is_some() {
        return Err(usage());
    }

    match command.as_str() {
        "keygen" => keygen(&path),
        "sign" => sign(&path),
        _ => Err(usage()),
    }
}
