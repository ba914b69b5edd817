//! Compiles every WAT fixture to a Wasm binary in OUT_DIR and generates
//! `mod.rs` with one `pub const NAME: &[u8]` per fixture.

use anyhow::{Context, Result};
use heck::ToShoutySnakeCase;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let dirs = [Path::new("data/wat"), Path::new("../../demos")];

    let mut fixtures = Vec::new();
    for dir in dirs {
        println!("cargo:rerun-if-changed={}", dir.display());
        for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "wat") {
                fixtures.push(path);
            }
        }
    }
    fixtures.sort();

    let mut generated = String::new();
    for path in &fixtures {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("bad fixture name {}", path.display()))?;
        let wasm = wat::parse_file(path).with_context(|| format!("compiling {}", path.display()))?;
        let file = format!("{}.wasm", stem);
        fs::write(out_dir.join(&file), wasm)?;
        writeln!(
            generated,
            "/// Compiled from `{}`.\npub const {}: &[u8] = include_bytes!(concat!(env!(\"OUT_DIR\"), \"/{}\"));",
            path.display(),
            stem.to_shouty_snake_case(),
            file
        )?;
        println!("cargo:rerun-if-changed={}", path.display());
    }

    fs::write(out_dir.join("mod.rs"), generated)?;
    Ok(())
}
