//! ShaderFX effect compiler.
//!
//! `.kfx` source → [`frontend::parse`] → [`semantic::validate`] → [`backend::compile`] →
//! [`binary::serialize`]. [`binary::deserialize`] loads the artifact back and
//! [`roundtrip::assert_equal`] checks the two agree.

pub mod backend;
pub mod batch;
pub mod binary;
pub mod config;
pub mod effect;
pub mod error;
pub mod frontend;
pub mod roundtrip;
pub mod semantic;

use std::path::Path;

pub use backend::{CompileContext, NagaCompiler, ShaderCompiler};
pub use config::Config;
pub use effect::{CompiledEffect, Effect};
pub use error::Error;

/// Parses and validates one effect.
///
/// `source_path` is recorded in the effect and names it when the source has no
/// `Shader <name>` block.
pub fn load_effect(source: &str, source_path: &Path) -> Result<Effect, Error> {
    let mut effect = frontend::parse(source)?;
    effect.source_path = source_path.to_string_lossy().into_owned();
    if effect.name.is_empty() {
        if let Some(stem) = source_path.file_stem() {
            effect.name = stem.to_string_lossy().into_owned();
        }
    }
    semantic::validate(&mut effect)?;
    Ok(effect)
}

pub fn compile_source(
    source: &str,
    source_path: &Path,
    ctx: &CompileContext,
) -> Result<CompiledEffect, Error> {
    let effect = load_effect(source, source_path)?;
    Ok(backend::compile(effect, ctx)?)
}

pub fn compile_file(path: &Path, ctx: &CompileContext) -> Result<CompiledEffect, Error> {
    let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    compile_source(&source, path, ctx)
}
