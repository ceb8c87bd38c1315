use crate::{
    effect::{
        BufferField, CompiledEffect, Handle, Link, RenderPassDefinition, RenderStateDefinition,
        ResourceBindingsDefinition, ShaderDataType, UniformBufferDefinition,
        VertexLayoutDefinition,
    },
    error::FormatError,
};

use super::{FORMAT_VERSION, MAGIC, WireEnum};

/// Encodes a compiled effect into a `.kfxb` byte stream.
///
/// Links that never resolved are written as absent; stage fragments are always resolved
/// after compilation. Fails with [`FormatError::FieldOverflow`] when a length or index does
/// not fit in the format's `u32` fields.
pub fn serialize(compiled: &CompiledEffect) -> Result<Vec<u8>, FormatError> {
    let effect = &compiled.effect;
    let mut w = Writer::default();

    w.bytes(&MAGIC);
    w.u32(FORMAT_VERSION);
    w.str(&effect.name);
    w.str(&effect.source_path);

    w.seq(&effect.vertex_layouts, Writer::vertex_layout);
    w.seq(&effect.local_resources, Writer::resource_block);
    w.seq(&effect.global_resources, Writer::resource_block);
    w.seq(&effect.constant_buffers, |w, cb| {
        w.str(&cb.name);
        w.seq(&cb.fields, Writer::field);
    });
    w.seq(&effect.uniform_buffers, Writer::buffer);
    w.seq(&effect.storage_buffers, Writer::buffer);
    w.seq(&effect.render_states, Writer::render_state);
    w.seq(&effect.code_fragments, |w, fragment| {
        w.str(&fragment.name);
        w.str(&fragment.source);
    });
    w.seq(&effect.passes, Writer::pass);

    match w.overflow {
        Some(value) => Err(FormatError::FieldOverflow { value }),
        None => Ok(w.out),
    }
}

#[derive(Default)]
struct Writer {
    out: Vec<u8>,
    /// First length or index that did not fit in a `u32`.
    overflow: Option<usize>,
}

impl Writer {
    fn bytes(&mut self, b: &[u8]) {
        self.out.extend_from_slice(b);
    }

    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.u32(v.to_bits());
    }

    fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    fn len(&mut self, n: usize) {
        match u32::try_from(n) {
            Ok(v) => self.u32(v),
            Err(_) => {
                self.overflow.get_or_insert(n);
                self.u32(u32::MAX);
            }
        }
    }

    fn str(&mut self, s: &str) {
        self.len(s.len());
        self.bytes(s.as_bytes());
    }

    fn tag<T: WireEnum>(&mut self, v: T) {
        self.u8(v.tag());
    }

    fn opt_u32(&mut self, v: Option<u32>) {
        match v {
            Some(v) => {
                self.u8(1);
                self.u32(v);
            }
            None => self.u8(0),
        }
    }

    fn opt_handle<T>(&mut self, h: Option<Handle<T>>) {
        match h {
            Some(h) => {
                self.u8(1);
                self.len(h.index());
            }
            None => self.u8(0),
        }
    }

    fn opt_link<T>(&mut self, link: &Option<Link<T>>) {
        self.opt_handle(link.as_ref().and_then(|l| l.target));
    }

    fn seq<T>(&mut self, items: &[T], mut each: impl FnMut(&mut Self, &T)) {
        self.len(items.len());
        for item in items {
            each(self, item);
        }
    }

    fn data_type(&mut self, ty: &ShaderDataType) {
        self.tag(ty.kind);
        self.u32(ty.array_len);
    }

    fn vertex_layout(&mut self, layout: &VertexLayoutDefinition) {
        self.str(&layout.name);
        self.seq(&layout.attributes, |w, a| {
            w.data_type(&a.format);
            w.u32(a.binding);
            w.u32(a.location);
            w.u32(a.offset);
        });
        self.seq(&layout.bindings, |w, b| {
            w.u32(b.binding);
            w.u32(b.stride);
            w.tag(b.rate);
        });
    }

    fn resource_block(&mut self, block: &ResourceBindingsDefinition) {
        self.str(&block.name);
        self.seq(&block.bindings, |w, b| {
            w.str(&b.name);
            w.tag(b.kind);
            w.u8(b.stages.bits());
            w.u32(b.binding);
            w.u32(b.set);
            w.opt_u32(b.size);
            w.opt_handle(b.buffer);
        });
    }

    fn field(&mut self, field: &BufferField) {
        self.data_type(&field.ty);
        self.str(&field.name);
        match field.stages {
            Some(mask) => {
                self.u8(1);
                self.u8(mask.bits());
            }
            None => self.u8(0),
        }
    }

    fn buffer(&mut self, buffer: &UniformBufferDefinition) {
        self.str(&buffer.name);
        self.seq(&buffer.fields, Writer::field);
    }

    fn render_state(&mut self, state: &RenderStateDefinition) {
        self.str(&state.name);
        self.tag(state.cull);
        self.tag(state.depth_test);
        self.bool(state.depth_write);
        let blend = &state.blend;
        self.bool(blend.enabled);
        self.tag(blend.src_color);
        self.tag(blend.dst_color);
        self.tag(blend.src_alpha);
        self.tag(blend.dst_alpha);
        self.tag(blend.color_op);
        self.tag(blend.alpha_op);
        self.tag(state.polygon_mode);
        self.f32(state.line_width);
    }

    fn pass(&mut self, pass: &RenderPassDefinition) {
        self.str(&pass.name);
        self.opt_link(&pass.vertex_layout);
        self.opt_link(&pass.resources);
        self.opt_link(&pass.constant_buffer);
        self.opt_link(&pass.render_state);
        self.seq(&pass.stages, |w, stage| {
            w.tag(stage.kind);
            w.opt_handle(stage.fragment.target);
            w.len(stage.bytecode.len());
            for word in &stage.bytecode {
                w.u32(*word);
            }
        });
    }
}
