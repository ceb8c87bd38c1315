//! GLSL → SPIR-V through naga's GLSL front-end and SPIR-V writer.

use crate::effect::StageKind;

use super::{IncludeResolver, ShaderCompiler, StageRequest};

const DEFAULT_VERSION: &str = "#version 450";

/// In-process [`ShaderCompiler`] backed by naga.
///
/// naga has no geometry stage, so geometry requests fail with a diagnostic.
#[derive(Clone, Debug)]
pub struct NagaCompiler {
    pub max_include_depth: usize,
}

impl Default for NagaCompiler {
    fn default() -> Self {
        Self {
            max_include_depth: 16,
        }
    }
}

impl ShaderCompiler for NagaCompiler {
    fn compile(
        &self,
        request: &StageRequest,
        includes: &dyn IncludeResolver,
    ) -> Result<Vec<u32>, String> {
        let shader_stage = match request.stage {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
            StageKind::Compute => naga::ShaderStage::Compute,
            StageKind::Geometry => {
                return Err(format!(
                    "{}: geometry shaders are not supported by the naga backend",
                    request.file_name
                ));
            }
        };

        let mut source = String::new();
        expand_includes(
            &request.source,
            includes,
            0,
            self.max_include_depth,
            &mut source,
        )?;
        let source = with_version(source);

        let mut defines = naga::FastHashMap::default();
        for (name, value) in &request.defines {
            defines.insert(name.clone(), value.clone());
        }

        let mut parser = naga::front::glsl::Frontend::default();
        let options = naga::front::glsl::Options {
            stage: shader_stage,
            defines,
        };
        let module = parser
            .parse(&options, &source)
            .map_err(|e| format!("{}: GLSL parse failed: {e:?}", request.file_name))?;

        let info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| format!("{}: GLSL validation failed: {e:?}", request.file_name))?;

        let pipeline = naga::back::spv::PipelineOptions {
            shader_stage,
            entry_point: request.entry_point.clone(),
        };
        naga::back::spv::write_vec(
            &module,
            &info,
            &naga::back::spv::Options::default(),
            Some(&pipeline),
        )
        .map_err(|e| format!("{}: SPIR-V writer failed: {e:?}", request.file_name))
    }
}

/// Splices `#include "file"` / `#include <file>` lines in place.
fn expand_includes(
    source: &str,
    includes: &dyn IncludeResolver,
    depth: usize,
    max_depth: usize,
    out: &mut String,
) -> Result<(), String> {
    if depth > max_depth {
        return Err(format!("#include nesting deeper than {max_depth}"));
    }
    for line in source.lines() {
        match include_target(line) {
            Some(path) => {
                let text = includes.resolve(path)?;
                expand_includes(&text, includes, depth + 1, max_depth, out)?;
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    Ok(())
}

fn include_target(line: &str) -> Option<&str> {
    let rest = line
        .trim_start()
        .strip_prefix('#')?
        .trim_start()
        .strip_prefix("include")?
        .trim();
    rest.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| rest.strip_prefix('<').and_then(|r| r.strip_suffix('>')))
}

fn with_version(source: String) -> String {
    let has_version = source
        .lines()
        .any(|line| line.trim_start().starts_with("#version"));
    if has_version {
        source
    } else {
        format!("{DEFAULT_VERSION}\n{source}")
    }
}
