//! Compile driver: hands every (pass, stage) pair to an external GLSL→SPIR-V compiler.
//!
//! The compiler itself is a collaborator behind [`ShaderCompiler`]; [`NagaCompiler`] is
//! the default implementation. Each stage call can be bounded by a timeout, in which case
//! it runs on its own thread and a hung compiler only leaks that thread.

pub mod glsl;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use crossbeam_channel::RecvTimeoutError;

use crate::{
    effect::{CompiledEffect, Effect, StageKind},
    error::CompileError,
};

pub use glsl::NagaCompiler;

/// Loads the text of an `#include`d file.
pub trait IncludeResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Result<String, String>;
}

/// Resolves includes relative to a directory, normally the effect's own.
#[derive(Clone, Debug)]
pub struct FsIncludeResolver {
    root: PathBuf,
}

impl FsIncludeResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn for_effect(source_path: &Path) -> Self {
        let root = source_path
            .parent()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(root)
    }
}

impl IncludeResolver for FsIncludeResolver {
    fn resolve(&self, path: &str) -> Result<String, String> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full)
            .map_err(|e| format!("cannot include {}: {e}", full.display()))
    }
}

/// One stage compile job handed to the external compiler.
#[derive(Clone, Debug)]
pub struct StageRequest {
    pub source: String,
    pub stage: StageKind,
    pub entry_point: String,
    pub defines: Vec<(String, String)>,
    /// Used in diagnostics only.
    pub file_name: String,
}

pub trait ShaderCompiler: Send + Sync {
    /// Returns SPIR-V words or the compiler's diagnostic text.
    fn compile(
        &self,
        request: &StageRequest,
        includes: &dyn IncludeResolver,
    ) -> Result<Vec<u32>, String>;
}

pub struct CompileContext {
    pub compiler: Arc<dyn ShaderCompiler>,
    pub includes: Arc<dyn IncludeResolver>,
    pub entry_point: String,
    pub stage_timeout: Option<Duration>,
}

impl CompileContext {
    /// Naga-backed context resolving includes next to `source_path`.
    pub fn for_source(source_path: &Path) -> Self {
        Self {
            compiler: Arc::new(NagaCompiler::default()),
            includes: Arc::new(FsIncludeResolver::for_effect(source_path)),
            entry_point: "main".to_string(),
            stage_timeout: None,
        }
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn ShaderCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }
}

enum StageFailure {
    Message(String),
    TimedOut(Duration),
}

/// Compiles every stage of every pass, in declaration order.
///
/// Expects an effect that went through `semantic::validate`.
pub fn compile(mut effect: Effect, ctx: &CompileContext) -> Result<CompiledEffect, CompileError> {
    for pass_index in 0..effect.passes.len() {
        for stage_index in 0..effect.passes[pass_index].stages.len() {
            let pass = &effect.passes[pass_index];
            let stage = &pass.stages[stage_index];
            let fragment = stage
                .fragment
                .target
                .and_then(|h| effect.code_fragment(h))
                .ok_or_else(|| CompileError::UnboundFragment {
                    pass: pass.name.clone(),
                    stage_index,
                    fragment: stage.fragment.name.clone(),
                })?;

            let request = StageRequest {
                source: fragment.source.clone(),
                stage: stage.kind,
                entry_point: ctx.entry_point.clone(),
                defines: vec![(stage.kind.define().to_string(), "1".to_string())],
                file_name: format!("{}:{}", effect.source_path, fragment.name),
            };
            log::debug!(
                "compiling pass `{}` stage {stage_index} ({}) from `{}`",
                pass.name,
                stage.kind,
                fragment.name
            );

            let bytecode = run_stage(ctx, request).map_err(|failure| match failure {
                StageFailure::Message(message) => CompileError::Stage {
                    pass: pass.name.clone(),
                    stage_index,
                    stage: stage.kind,
                    message,
                },
                StageFailure::TimedOut(after) => CompileError::Timeout {
                    pass: pass.name.clone(),
                    stage_index,
                    stage: stage.kind,
                    after,
                },
            })?;

            effect.passes[pass_index].stages[stage_index]
                .bytecode
                .extend(bytecode);
        }
    }
    Ok(CompiledEffect { effect })
}

fn run_stage(ctx: &CompileContext, request: StageRequest) -> Result<Vec<u32>, StageFailure> {
    let Some(timeout) = ctx.stage_timeout else {
        return ctx
            .compiler
            .compile(&request, ctx.includes.as_ref())
            .map_err(StageFailure::Message);
    };

    let (tx, rx) = crossbeam_channel::bounded(1);
    let compiler = Arc::clone(&ctx.compiler);
    let includes = Arc::clone(&ctx.includes);
    thread::Builder::new()
        .name(format!("shaderfx-{}", request.stage.short_name()))
        .spawn(move || {
            let _ = tx.send(compiler.compile(&request, includes.as_ref()));
        })
        .map_err(|e| StageFailure::Message(format!("failed to spawn compiler thread: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result.map_err(StageFailure::Message),
        Err(RecvTimeoutError::Timeout) => Err(StageFailure::TimedOut(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(StageFailure::Message(
            "compiler thread exited without a result".to_string(),
        )),
    }
}
