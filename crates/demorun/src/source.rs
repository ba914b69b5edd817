//! Module sources: WAT text or Wasm binary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Read a module from disk, compiling WAT text to a Wasm binary if needed.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    to_wasm(&bytes).with_context(|| format!("failed to compile {}", path.display()))
}

/// Binary input is passed through unchanged; anything else is parsed as WAT.
pub fn to_wasm(bytes: &[u8]) -> Result<Vec<u8>> {
    let wasm = wat::parse_bytes(bytes)?;
    Ok(wasm.into_owned())
}

/// Default output path for `build`: the input with a `.wasm` extension.
pub fn default_output(input: &Path) -> PathBuf {
    input.with_extension("wasm")
}

/// Compile `input` to a Wasm binary at `output`. Returns the byte count.
pub fn build(input: &Path, output: &Path) -> Result<usize> {
    let wasm = load(input)?;
    fs::write(output, &wasm)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        bytes = wasm.len(),
        "built module"
    );
    Ok(wasm.len())
}
