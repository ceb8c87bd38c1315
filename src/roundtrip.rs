//! Structural equality between two compiled effects, reporting the first differing path.
//!
//! Used as a test oracle for the binary format: `assert_equal(&compiled,
//! &deserialize(&serialize(&compiled)?)?)`.

use std::fmt::{self, Debug};

use crate::effect::{
    BufferField, CompiledEffect, Link, RenderPassDefinition, RenderStateDefinition,
    ResourceBindingsDefinition, UniformBufferDefinition, VertexLayoutDefinition,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    /// e.g. `passes[0].stages[1].bytecode`
    pub path: String,
    pub left: String,
    pub right: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} != {}", self.path, self.left, self.right)
    }
}

impl std::error::Error for Mismatch {}

type Result = std::result::Result<(), Mismatch>;

pub fn assert_equal(a: &CompiledEffect, b: &CompiledEffect) -> Result {
    let (a, b) = (&a.effect, &b.effect);
    same("name", &a.name, &b.name)?;
    same("source_path", &a.source_path, &b.source_path)?;
    each(
        "vertex_layouts",
        &a.vertex_layouts,
        &b.vertex_layouts,
        vertex_layout,
    )?;
    each(
        "local_resources",
        &a.local_resources,
        &b.local_resources,
        resource_block,
    )?;
    each(
        "global_resources",
        &a.global_resources,
        &b.global_resources,
        resource_block,
    )?;
    each("constant_buffers", &a.constant_buffers, &b.constant_buffers, |p, x, y| {
        same(&format!("{p}.name"), &x.name, &y.name)?;
        each(&format!("{p}.fields"), &x.fields, &y.fields, field)
    })?;
    each(
        "uniform_buffers",
        &a.uniform_buffers,
        &b.uniform_buffers,
        buffer,
    )?;
    each(
        "storage_buffers",
        &a.storage_buffers,
        &b.storage_buffers,
        buffer,
    )?;
    each(
        "render_states",
        &a.render_states,
        &b.render_states,
        render_state,
    )?;
    each("code_fragments", &a.code_fragments, &b.code_fragments, |p, x, y| {
        same(&format!("{p}.name"), &x.name, &y.name)?;
        same(&format!("{p}.source"), &x.source, &y.source)
    })?;
    each("passes", &a.passes, &b.passes, pass)
}

fn same<T: PartialEq + Debug + ?Sized>(path: &str, a: &T, b: &T) -> Result {
    if a == b {
        Ok(())
    } else {
        Err(Mismatch {
            path: path.to_string(),
            left: format!("{a:?}"),
            right: format!("{b:?}"),
        })
    }
}

fn each<T>(path: &str, a: &[T], b: &[T], mut cmp: impl FnMut(&str, &T, &T) -> Result) -> Result {
    same(&format!("{path}.len()"), &a.len(), &b.len())?;
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        cmp(&format!("{path}[{i}]"), x, y)?;
    }
    Ok(())
}

fn vertex_layout(p: &str, a: &VertexLayoutDefinition, b: &VertexLayoutDefinition) -> Result {
    same(&format!("{p}.name"), &a.name, &b.name)?;
    each(&format!("{p}.attributes"), &a.attributes, &b.attributes, |p, x, y| {
        same(&format!("{p}.format"), &x.format, &y.format)?;
        same(&format!("{p}.binding"), &x.binding, &y.binding)?;
        same(&format!("{p}.location"), &x.location, &y.location)?;
        same(&format!("{p}.offset"), &x.offset, &y.offset)
    })?;
    each(&format!("{p}.bindings"), &a.bindings, &b.bindings, |p, x, y| {
        same(&format!("{p}.binding"), &x.binding, &y.binding)?;
        same(&format!("{p}.stride"), &x.stride, &y.stride)?;
        same(&format!("{p}.rate"), &x.rate, &y.rate)
    })
}

fn resource_block(
    p: &str,
    a: &ResourceBindingsDefinition,
    b: &ResourceBindingsDefinition,
) -> Result {
    same(&format!("{p}.name"), &a.name, &b.name)?;
    each(&format!("{p}.bindings"), &a.bindings, &b.bindings, |p, x, y| {
        same(&format!("{p}.name"), &x.name, &y.name)?;
        same(&format!("{p}.kind"), &x.kind, &y.kind)?;
        same(&format!("{p}.stages"), &x.stages, &y.stages)?;
        same(&format!("{p}.binding"), &x.binding, &y.binding)?;
        same(&format!("{p}.set"), &x.set, &y.set)?;
        same(&format!("{p}.size"), &x.size, &y.size)?;
        same(&format!("{p}.buffer"), &x.buffer, &y.buffer)
    })
}

fn field(p: &str, a: &BufferField, b: &BufferField) -> Result {
    same(&format!("{p}.ty"), &a.ty, &b.ty)?;
    same(&format!("{p}.name"), &a.name, &b.name)?;
    same(&format!("{p}.stages"), &a.stages, &b.stages)
}

fn buffer(p: &str, a: &UniformBufferDefinition, b: &UniformBufferDefinition) -> Result {
    same(&format!("{p}.name"), &a.name, &b.name)?;
    each(&format!("{p}.fields"), &a.fields, &b.fields, field)
}

fn render_state(p: &str, a: &RenderStateDefinition, b: &RenderStateDefinition) -> Result {
    same(&format!("{p}.name"), &a.name, &b.name)?;
    same(&format!("{p}.cull"), &a.cull, &b.cull)?;
    same(&format!("{p}.depth_test"), &a.depth_test, &b.depth_test)?;
    same(&format!("{p}.depth_write"), &a.depth_write, &b.depth_write)?;
    let (x, y) = (&a.blend, &b.blend);
    same(&format!("{p}.blend.enabled"), &x.enabled, &y.enabled)?;
    same(&format!("{p}.blend.src_color"), &x.src_color, &y.src_color)?;
    same(&format!("{p}.blend.dst_color"), &x.dst_color, &y.dst_color)?;
    same(&format!("{p}.blend.src_alpha"), &x.src_alpha, &y.src_alpha)?;
    same(&format!("{p}.blend.dst_alpha"), &x.dst_alpha, &y.dst_alpha)?;
    same(&format!("{p}.blend.color_op"), &x.color_op, &y.color_op)?;
    same(&format!("{p}.blend.alpha_op"), &x.alpha_op, &y.alpha_op)?;
    same(
        &format!("{p}.polygon_mode"),
        &a.polygon_mode,
        &b.polygon_mode,
    )?;
    // Bitwise, so NaN widths still compare equal to themselves.
    same(
        &format!("{p}.line_width"),
        &a.line_width.to_bits(),
        &b.line_width.to_bits(),
    )
}

fn link<T>(path: &str, a: &Option<Link<T>>, b: &Option<Link<T>>) -> Result {
    same(
        path,
        &a.as_ref().map(|l| &l.name),
        &b.as_ref().map(|l| &l.name),
    )?;
    same(
        &format!("{path}.target"),
        &a.as_ref().and_then(|l| l.target).map(|h| h.index()),
        &b.as_ref().and_then(|l| l.target).map(|h| h.index()),
    )
}

fn pass(p: &str, a: &RenderPassDefinition, b: &RenderPassDefinition) -> Result {
    same(&format!("{p}.name"), &a.name, &b.name)?;
    link(
        &format!("{p}.vertex_layout"),
        &a.vertex_layout,
        &b.vertex_layout,
    )?;
    link(&format!("{p}.resources"), &a.resources, &b.resources)?;
    link(
        &format!("{p}.constant_buffer"),
        &a.constant_buffer,
        &b.constant_buffer,
    )?;
    link(
        &format!("{p}.render_state"),
        &a.render_state,
        &b.render_state,
    )?;
    each(&format!("{p}.stages"), &a.stages, &b.stages, |p, x, y| {
        same(&format!("{p}.kind"), &x.kind, &y.kind)?;
        same(&format!("{p}.fragment"), &x.fragment.name, &y.fragment.name)?;
        same(&format!("{p}.bytecode"), &x.bytecode, &y.bytecode)
    })
}
