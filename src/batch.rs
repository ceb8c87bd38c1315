//! Compiles a file or a directory of effects on a pool of worker threads.
//!
//! Every file gets its own pipeline and its own `Effect`; nothing mutable is shared
//! between jobs. A failing file is logged and recorded, the rest keep going.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use anyhow::{Context, Result, bail};

use crate::{
    backend::{self, CompileContext, FsIncludeResolver, NagaCompiler, ShaderCompiler},
    binary,
    config::Config,
    load_effect,
};

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Artifacts written, in source order.
    pub written: Vec<PathBuf>,
    /// Sources that passed validation in check-only mode.
    pub checked: Vec<PathBuf>,
    /// Source path and the rendered error chain.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Written(PathBuf),
    Checked,
}

pub fn compile_path(path: &Path, config: &Config) -> Result<BatchReport> {
    compile_path_with(path, config, Arc::new(NagaCompiler::default()))
}

/// Same as [`compile_path`] with an explicit shader compiler.
pub fn compile_path_with(
    path: &Path,
    config: &Config,
    compiler: Arc<dyn ShaderCompiler>,
) -> Result<BatchReport> {
    let sources = collect_sources(path, &config.source_extension)?;
    if sources.is_empty() {
        bail!(
            "no .{} files found in {}",
            config.source_extension,
            path.display()
        );
    }

    let workers = config.worker_count().clamp(1, sources.len());
    log::info!("compiling {} effect(s) on {workers} worker(s)", sources.len());

    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, PathBuf)>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded();
    for job in sources.into_iter().enumerate() {
        job_tx
            .send(job)
            .context("batch job queue closed unexpectedly")?;
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let compiler = &compiler;
            scope.spawn(move || {
                for (index, source) in job_rx.iter() {
                    let outcome = compile_one(&source, config, compiler);
                    if result_tx.send((index, source, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut results: Vec<_> = result_rx.iter().collect();
    results.sort_by_key(|(index, _, _)| *index);

    let mut report = BatchReport::default();
    for (_, source, outcome) in results {
        match outcome {
            Ok(Outcome::Written(artifact)) => report.written.push(artifact),
            Ok(Outcome::Checked) => report.checked.push(source),
            Err(e) => {
                log::error!("{}: {e:#}", source.display());
                report.failed.push((source, format!("{e:#}")));
            }
        }
    }
    Ok(report)
}

/// A single file, or the matching files directly inside a directory, sorted.
fn collect_sources(path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_owned()]);
    }
    if !path.is_dir() {
        bail!("{} is neither a file nor a directory", path.display());
    }

    let mut sources = Vec::new();
    for entry in
        fs::read_dir(path).with_context(|| format!("failed to list {}", path.display()))?
    {
        let entry = entry.with_context(|| format!("failed to list {}", path.display()))?;
        let p = entry.path();
        if p.is_file() && p.extension().is_some_and(|ext| ext == extension) {
            sources.push(p);
        }
    }
    sources.sort();
    Ok(sources)
}

fn compile_one(
    source_path: &Path,
    config: &Config,
    compiler: &Arc<dyn ShaderCompiler>,
) -> Result<Outcome> {
    let source = fs::read_to_string(source_path)
        .with_context(|| format!("failed to read {}", source_path.display()))?;
    let effect = load_effect(&source, source_path)?;
    if config.check_only {
        log::info!("[check] {}: ok ({} passes)", source_path.display(), effect.passes.len());
        return Ok(Outcome::Checked);
    }

    let ctx = CompileContext {
        compiler: Arc::clone(compiler),
        includes: Arc::new(FsIncludeResolver::for_effect(source_path)),
        entry_point: config.entry_point.clone(),
        stage_timeout: config.stage_timeout(),
    };
    let compiled = backend::compile(effect, &ctx)?;
    let bytes = binary::serialize(&compiled)?;

    let out_dir = match &config.output_dir {
        Some(dir) => dir.clone(),
        None => source_path
            .parent()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create output dir {}", out_dir.display()))?;

    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| compiled.name.clone());
    let artifact = out_dir.join(format!("{stem}.{}", config.artifact_extension));
    fs::write(&artifact, &bytes)
        .with_context(|| format!("failed to write {}", artifact.display()))?;

    if config.emit_spirv {
        for pass in &compiled.passes {
            for stage in &pass.stages {
                let spv = out_dir.join(format!(
                    "{stem}.{}.{}.spv",
                    pass.name,
                    stage.kind.short_name()
                ));
                fs::write(&spv, bytemuck::cast_slice::<u32, u8>(&stage.bytecode))
                    .with_context(|| format!("failed to write {}", spv.display()))?;
            }
        }
    }

    log::info!(
        "{} -> {} ({} bytes)",
        source_path.display(),
        artifact.display(),
        bytes.len()
    );
    Ok(Outcome::Written(artifact))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shaderfx-batch-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn collects_only_matching_extension_sorted() {
        let dir = scratch_dir("collect");
        for name in ["b.kfx", "a.kfx", "notes.txt", "c.kfxb"] {
            fs::write(dir.join(name), "").unwrap();
        }
        let found = collect_sources(&dir, "kfx").unwrap();
        assert_eq!(found, vec![dir.join("a.kfx"), dir.join("b.kfx")]);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_path_is_an_error() {
        let err = collect_sources(Path::new("/definitely/not/here.kfx"), "kfx").unwrap_err();
        assert!(err.to_string().contains("neither a file nor a directory"));
    }

    #[test]
    fn check_only_continues_past_broken_file() {
        let dir = scratch_dir("check");
        fs::write(dir.join("good.kfx"), "Pass P { FragmentShader F } GLSL F { void main() {} }")
            .unwrap();
        fs::write(dir.join("bad.kfx"), "Pass P { RenderState Missing }").unwrap();

        let config = Config {
            check_only: true,
            jobs: 2,
            ..Config::default()
        };
        let report = compile_path(&dir, &config).unwrap();
        assert_eq!(report.checked, vec![dir.join("good.kfx")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, dir.join("bad.kfx"));
        assert!(report.failed[0].1.contains("Missing"), "{}", report.failed[0].1);
        assert!(!report.is_success());
        fs::remove_dir_all(&dir).ok();
    }
}
