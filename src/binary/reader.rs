use crate::{
    effect::{
        BlendMode, BufferField, CompiledEffect, ConstantBufferDefinition, Effect, Handle, Link,
        Named, RenderPassDefinition, RenderStateDefinition, ResourceBinding,
        ResourceBindingsDefinition, ResourceKind, ShaderCodeFragment, ShaderDataType,
        ShaderStage, StageMask, UniformBufferDefinition, VertexAttribute, VertexInputBinding,
        VertexLayoutDefinition,
    },
    error::FormatError,
};

use super::{FORMAT_VERSION, MAGIC, WireEnum};

type Result<T> = std::result::Result<T, FormatError>;

/// Decodes a `.kfxb` byte stream produced by [`serialize`](super::serialize).
///
/// Flat arrays are rebuilt first; link names are then rehydrated from the definitions
/// their indices point at.
pub fn deserialize(bytes: &[u8]) -> Result<CompiledEffect> {
    let mut r = Reader { bytes, pos: 0 };

    let magic: [u8; 4] = r.array()?;
    if magic != MAGIC {
        return Err(FormatError::BadMagic { found: magic });
    }
    let version = r.u32()?;
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let mut effect = Effect {
        name: r.string()?,
        source_path: r.string()?,
        vertex_layouts: r.seq(Reader::vertex_layout)?,
        local_resources: r.seq(Reader::resource_block)?,
        global_resources: r.seq(Reader::resource_block)?,
        constant_buffers: r.seq(|r| {
            Ok(ConstantBufferDefinition {
                name: r.string()?,
                fields: r.seq(Reader::field)?,
            })
        })?,
        uniform_buffers: r.seq(Reader::buffer)?,
        storage_buffers: r.seq(Reader::buffer)?,
        render_states: r.seq(Reader::render_state)?,
        code_fragments: r.seq(|r| {
            Ok(ShaderCodeFragment {
                name: r.string()?,
                source: r.string()?,
            })
        })?,
        passes: r.seq(Reader::pass)?,
    };

    let remaining = bytes.len() - r.pos;
    if remaining != 0 {
        return Err(FormatError::TrailingBytes { count: remaining });
    }

    rehydrate(&mut effect)?;
    Ok(CompiledEffect { effect })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.bytes.len() - self.pos;
        if n > available {
            return Err(FormatError::UnexpectedEof {
                offset: self.pos,
                needed: n - available,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    /// A 0/1 byte; anything else is malformed.
    fn flag(&mut self, what: &'static str) -> Result<bool> {
        let offset = self.pos;
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(FormatError::InvalidTag {
                what,
                value: value.into(),
                offset,
            }),
        }
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.len()?;
        let offset = self.pos;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| FormatError::InvalidUtf8 { offset })
    }

    fn tag<T: WireEnum>(&mut self) -> Result<T> {
        let offset = self.pos;
        let value = self.u8()?;
        T::from_tag(value).ok_or(FormatError::InvalidTag {
            what: T::WHAT,
            value: value.into(),
            offset,
        })
    }

    fn stage_mask(&mut self) -> Result<StageMask> {
        let offset = self.pos;
        let bits = self.u8()?;
        StageMask::from_bits(bits).ok_or(FormatError::InvalidTag {
            what: "stage mask",
            value: bits.into(),
            offset,
        })
    }

    fn opt_u32(&mut self) -> Result<Option<u32>> {
        if self.flag("presence flag")? {
            Ok(Some(self.u32()?))
        } else {
            Ok(None)
        }
    }

    /// Element counts are bounded by the remaining input before allocating.
    fn seq<T>(&mut self, mut each: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.len()?;
        let mut items = Vec::with_capacity(count.min(self.bytes.len() - self.pos));
        for _ in 0..count {
            items.push(each(self)?);
        }
        Ok(items)
    }

    fn data_type(&mut self) -> Result<ShaderDataType> {
        Ok(ShaderDataType {
            kind: self.tag()?,
            array_len: self.u32()?,
        })
    }

    fn vertex_layout(&mut self) -> Result<VertexLayoutDefinition> {
        Ok(VertexLayoutDefinition {
            name: self.string()?,
            attributes: self.seq(|r| {
                Ok(VertexAttribute {
                    format: r.data_type()?,
                    binding: r.u32()?,
                    location: r.u32()?,
                    offset: r.u32()?,
                })
            })?,
            bindings: self.seq(|r| {
                Ok(VertexInputBinding {
                    binding: r.u32()?,
                    stride: r.u32()?,
                    rate: r.tag()?,
                })
            })?,
        })
    }

    fn resource_block(&mut self) -> Result<ResourceBindingsDefinition> {
        Ok(ResourceBindingsDefinition {
            name: self.string()?,
            bindings: self.seq(|r| {
                Ok(ResourceBinding {
                    name: r.string()?,
                    kind: r.tag()?,
                    stages: r.stage_mask()?,
                    binding: r.u32()?,
                    set: r.u32()?,
                    size: r.opt_u32()?,
                    buffer: r.opt_u32()?.map(|i| Handle::new(i as usize)),
                })
            })?,
        })
    }

    fn field(&mut self) -> Result<BufferField> {
        Ok(BufferField {
            ty: self.data_type()?,
            name: self.string()?,
            stages: if self.flag("presence flag")? {
                Some(self.stage_mask()?)
            } else {
                None
            },
        })
    }

    fn buffer(&mut self) -> Result<UniformBufferDefinition> {
        Ok(UniformBufferDefinition {
            name: self.string()?,
            fields: self.seq(Reader::field)?,
        })
    }

    fn render_state(&mut self) -> Result<RenderStateDefinition> {
        Ok(RenderStateDefinition {
            name: self.string()?,
            cull: self.tag()?,
            depth_test: self.tag()?,
            depth_write: self.flag("depth write")?,
            blend: BlendMode {
                enabled: self.flag("blend enable")?,
                src_color: self.tag()?,
                dst_color: self.tag()?,
                src_alpha: self.tag()?,
                dst_alpha: self.tag()?,
                color_op: self.tag()?,
                alpha_op: self.tag()?,
            },
            polygon_mode: self.tag()?,
            line_width: self.f32()?,
        })
    }

    fn pass(&mut self) -> Result<RenderPassDefinition> {
        Ok(RenderPassDefinition {
            name: self.string()?,
            vertex_layout: self.opt_link()?,
            resources: self.opt_link()?,
            constant_buffer: self.opt_link()?,
            render_state: self.opt_link()?,
            stages: self.seq(|r| {
                Ok(ShaderStage {
                    kind: r.tag()?,
                    fragment: Link {
                        name: String::new(),
                        target: r.opt_u32()?.map(|i| Handle::new(i as usize)),
                    },
                    bytecode: r.seq(Reader::u32)?,
                })
            })?,
        })
    }

    /// Index only; the name is filled in by [`rehydrate`].
    fn opt_link<T>(&mut self) -> Result<Option<Link<T>>> {
        Ok(self
            .opt_u32()?
            .map(|i| Link::resolved(String::new(), Handle::new(i as usize))))
    }
}

fn checked<'a, T>(handle: Handle<T>, items: &'a [T], what: &'static str) -> Result<&'a T> {
    handle.get(items).ok_or(FormatError::IndexOutOfRange {
        what,
        index: handle.index() as u32,
        len: items.len(),
    })
}

fn fill_name<T: Named>(link: &mut Link<T>, items: &[T], what: &'static str) -> Result<()> {
    if let Some(target) = link.target {
        link.name = checked(target, items, what)?.name().to_string();
    }
    Ok(())
}

fn rehydrate(effect: &mut Effect) -> Result<()> {
    let Effect {
        vertex_layouts,
        local_resources,
        global_resources,
        constant_buffers,
        uniform_buffers,
        storage_buffers,
        render_states,
        passes,
        code_fragments,
        ..
    } = effect;

    for binding in local_resources
        .iter()
        .chain(global_resources.iter())
        .flat_map(|block| &block.bindings)
    {
        let Some(handle) = binding.buffer else {
            continue;
        };
        let buffers: &[UniformBufferDefinition] = match binding.kind {
            ResourceKind::UniformBuffer => uniform_buffers.as_slice(),
            ResourceKind::StorageBuffer => storage_buffers.as_slice(),
            ResourceKind::Sampler => &[],
        };
        checked(handle, buffers, "buffer")?;
    }

    for pass in passes.iter_mut() {
        if let Some(link) = pass.vertex_layout.as_mut() {
            fill_name(link, vertex_layouts, "vertex layout")?;
        }
        if let Some(link) = pass.resources.as_mut() {
            fill_name(link, local_resources, "resource block")?;
        }
        if let Some(link) = pass.constant_buffer.as_mut() {
            fill_name(link, constant_buffers, "constant buffer")?;
        }
        if let Some(link) = pass.render_state.as_mut() {
            fill_name(link, render_states, "render state")?;
        }
        for stage in &mut pass.stages {
            fill_name(&mut stage.fragment, code_fragments, "code fragment")?;
        }
    }
    Ok(())
}
