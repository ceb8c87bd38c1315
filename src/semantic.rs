//! Second resolution pass over a parsed [`Effect`].
//!
//! The parser only records names. Once every sibling array exists this pass turns each
//! name into a [`Handle`](crate::effect::Handle) and re-checks the declared size of every
//! buffer binding against the buffer it links to.

use crate::{
    effect::{Effect, Link, Named, ResourceKind, UniformBufferDefinition, find_by_name},
    error::SemanticError,
};

type Result<T> = std::result::Result<T, SemanticError>;

pub fn validate(effect: &mut Effect) -> Result<()> {
    resolve_pass_links(effect)?;
    resolve_buffer_bindings(effect)?;
    log::debug!(
        "effect `{}`: {} passes, {} local / {} global resource blocks validated",
        effect.name,
        effect.passes.len(),
        effect.local_resources.len(),
        effect.global_resources.len()
    );
    Ok(())
}

fn resolve<T: Named>(
    link: &mut Link<T>,
    items: &[T],
    kind: &'static str,
    scope: &str,
) -> Result<()> {
    let target =
        find_by_name(items, &link.name).ok_or_else(|| SemanticError::UnresolvedReference {
            kind,
            name: link.name.clone(),
            scope: scope.to_string(),
        })?;
    link.target = Some(target);
    Ok(())
}

fn resolve_pass_links(effect: &mut Effect) -> Result<()> {
    let Effect {
        vertex_layouts,
        local_resources,
        constant_buffers,
        render_states,
        passes,
        code_fragments,
        ..
    } = effect;

    for pass in passes.iter_mut() {
        let scope = pass.name.clone();
        if let Some(link) = pass.vertex_layout.as_mut() {
            resolve(link, vertex_layouts, "vertex layout", &scope)?;
        }
        if local_resources.is_empty() {
            if let Some(link) = pass.resources.take() {
                log::debug!(
                    "pass `{scope}`: no local resource blocks declared, ignoring Resources `{}`",
                    link.name
                );
            }
        } else if let Some(link) = pass.resources.as_mut() {
            resolve(link, local_resources, "resource block", &scope)?;
        }
        if let Some(link) = pass.constant_buffer.as_mut() {
            resolve(link, constant_buffers, "constant buffer", &scope)?;
        }
        if let Some(link) = pass.render_state.as_mut() {
            resolve(link, render_states, "render state", &scope)?;
        }
        for stage in &mut pass.stages {
            resolve(&mut stage.fragment, code_fragments, "GLSL fragment", &scope)?;
        }
    }
    Ok(())
}

fn resolve_buffer_bindings(effect: &mut Effect) -> Result<()> {
    let Effect {
        local_resources,
        global_resources,
        uniform_buffers,
        storage_buffers,
        ..
    } = effect;

    for block in local_resources.iter_mut().chain(global_resources.iter_mut()) {
        for binding in &mut block.bindings {
            let (buffers, kind): (&[UniformBufferDefinition], _) = match binding.kind {
                ResourceKind::UniformBuffer => (uniform_buffers.as_slice(), "uniform buffer"),
                ResourceKind::StorageBuffer => (storage_buffers.as_slice(), "storage buffer"),
                ResourceKind::Sampler => {
                    binding.buffer = None;
                    continue;
                }
            };

            let handle = find_by_name(buffers, &binding.name).ok_or_else(|| {
                SemanticError::UnresolvedReference {
                    kind,
                    name: binding.name.clone(),
                    scope: block.name.clone(),
                }
            })?;
            let buffer = &buffers[handle.index()];
            let computed = buffer.size().ok_or_else(|| SemanticError::BufferTooLarge {
                buffer: buffer.name.clone(),
            })?;
            match binding.size {
                Some(declared) if declared != computed => {
                    return Err(SemanticError::BufferSizeMismatch {
                        buffer: buffer.name.clone(),
                        declared,
                        computed,
                    });
                }
                Some(_) => {}
                None => binding.size = Some(computed),
            }
            binding.buffer = Some(handle);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse;

    fn validated(source: &str) -> Result<Effect> {
        let mut effect = parse(source).expect("parse");
        validate(&mut effect)?;
        Ok(effect)
    }

    #[test]
    fn size_mismatch_names_buffer_and_sizes() {
        let err = validated(
            "Layout { UniformBuffer Bar { Float4 a; Float4 b; } Resource R { UniformBuffer Bar Size(64); } }",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SemanticError::BufferSizeMismatch {
                buffer: "Bar".to_string(),
                declared: 64,
                computed: 32,
            }
        );
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let err = validated(
            "Layout { UniformBuffer Big { Mat4[67108864] m; } Resource R { UniformBuffer Big; } }",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SemanticError::BufferTooLarge {
                buffer: "Big".to_string()
            }
        );
    }

    #[test]
    fn omitted_size_is_filled_in() {
        let effect = validated(
            "Layout { StorageBuffer Particles { Float4[16] pos; UInt count; } global Resource G { StorageBuffer Particles Binding(1); } }",
        )
        .unwrap();
        let b = &effect.global_resources[0].bindings[0];
        assert_eq!(b.size, Some(16 * 16 + 4));
        assert_eq!(b.buffer.map(|h| h.index()), Some(0));
    }

    #[test]
    fn storage_binding_does_not_link_to_uniform_buffer() {
        let err = validated(
            "Layout { UniformBuffer Bar { Float a; } Resource R { StorageBuffer Bar; } }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SemanticError::UnresolvedReference { kind: "storage buffer", .. }
        ));
    }

    #[test]
    fn pass_links_resolve_regardless_of_declaration_order() {
        let effect = validated(
            "Pass P { VertexLayout V RenderState S VertexShader F } RenderState S { } GLSL F { } Layout { Vertex V { } }",
        )
        .unwrap();
        let p = &effect.passes[0];
        assert!(p.vertex_layout.as_ref().unwrap().target.is_some());
        assert!(p.render_state.as_ref().unwrap().target.is_some());
        assert_eq!(p.stages[0].fragment.target.map(|h| h.index()), Some(0));
    }

    #[test]
    fn resources_link_is_dropped_without_local_blocks() {
        let effect = validated("Pass P { Resources Missing }").unwrap();
        assert!(effect.passes[0].resources.is_none());

        let err = validated("Layout { Resource R { } } Pass P { Resources Missing }").unwrap_err();
        assert!(matches!(err, SemanticError::UnresolvedReference { kind: "resource block", .. }));
    }

    #[test]
    fn missing_fragment_is_unresolved() {
        let err = validated("Pass P { FragmentShader Nope }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::UnresolvedReference {
                kind: "GLSL fragment",
                name: "Nope".to_string(),
                scope: "P".to_string(),
            }
        );
    }
}
