//! In-memory representation of one ShaderFX effect.
//!
//! Cross-references between sibling definitions are stored as [`Handle`]s (indices into the
//! owning array of the [`Effect`]) rather than pointers, so arrays can grow while the tree
//! is being built. References written by name in the source are kept as [`Link`]s until
//! the semantic pass resolves them.

use std::{fmt, marker::PhantomData, ops::Deref};

use bitflags::bitflags;

/// 1-based line/column position in a source file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub const START: SourcePos = SourcePos { line: 1, column: 1 };
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Typed index into one of the arrays owned by an [`Effect`].
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn new(index: usize) -> Self {
        Self {
            index: index as u32,
            _marker: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn get(self, items: &[T]) -> Option<&T> {
        items.get(self.index())
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// A by-name reference to a sibling definition.
///
/// `target` is `None` until the semantic pass has resolved `name`.
#[derive(Debug)]
pub struct Link<T> {
    pub name: String,
    pub target: Option<Handle<T>>,
}

impl<T> Link<T> {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
        }
    }

    pub fn resolved(name: impl Into<String>, target: Handle<T>) -> Self {
        Self {
            name: name.into(),
            target: Some(target),
        }
    }
}

impl<T> Clone for Link<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            target: self.target,
        }
    }
}

impl<T> PartialEq for Link<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.target == other.target
    }
}

/// Anything stored in an effect array that can be looked up by name.
pub trait Named {
    fn name(&self) -> &str;
}

/// First-match-wins linear scan by name.
pub fn find_by_name<T: Named>(items: &[T], name: &str) -> Option<Handle<T>> {
    items
        .iter()
        .position(|item| item.name() == name)
        .map(Handle::new)
}

macro_rules! impl_named {
    ($($ty:ty),* $(,)?) => {
        $(impl Named for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

impl_named!(
    VertexLayoutDefinition,
    ResourceBindingsDefinition,
    ConstantBufferDefinition,
    UniformBufferDefinition,
    RenderStateDefinition,
    RenderPassDefinition,
    ShaderCodeFragment,
);

/// Base kind of a shader-visible value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataKind {
    Float,
    Float2,
    Float3,
    Float4,
    Mat4,
    Byte,
    Byte4N,
    UByte,
    UByte4N,
    UInt,
    UInt2,
    UInt3,
    UInt4,
    Short2,
    Short2N,
    Short4,
    Short4N,
    TextureId,
}

impl DataKind {
    pub const ALL: [DataKind; 18] = [
        DataKind::Float,
        DataKind::Float2,
        DataKind::Float3,
        DataKind::Float4,
        DataKind::Mat4,
        DataKind::Byte,
        DataKind::Byte4N,
        DataKind::UByte,
        DataKind::UByte4N,
        DataKind::UInt,
        DataKind::UInt2,
        DataKind::UInt3,
        DataKind::UInt4,
        DataKind::Short2,
        DataKind::Short2N,
        DataKind::Short4,
        DataKind::Short4N,
        DataKind::TextureId,
    ];

    /// Source keyword. Keywords are case-sensitive.
    pub fn keyword(self) -> &'static str {
        match self {
            DataKind::Float => "Float",
            DataKind::Float2 => "Float2",
            DataKind::Float3 => "Float3",
            DataKind::Float4 => "Float4",
            DataKind::Mat4 => "Mat4",
            DataKind::Byte => "Byte",
            DataKind::Byte4N => "Byte4N",
            DataKind::UByte => "UByte",
            DataKind::UByte4N => "UByte4N",
            DataKind::UInt => "UInt",
            DataKind::UInt2 => "UInt2",
            DataKind::UInt3 => "UInt3",
            DataKind::UInt4 => "UInt4",
            DataKind::Short2 => "Short2",
            DataKind::Short2N => "Short2N",
            DataKind::Short4 => "Short4",
            DataKind::Short4N => "Short4N",
            DataKind::TextureId => "TextureID",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == s)
    }

    /// Size in bytes of one element, without any alignment padding.
    pub fn size(self) -> u32 {
        match self {
            DataKind::Float | DataKind::UInt | DataKind::TextureId => 4,
            DataKind::Float2 | DataKind::UInt2 => 8,
            DataKind::Float3 | DataKind::UInt3 => 12,
            DataKind::Float4 | DataKind::UInt4 => 16,
            DataKind::Mat4 => 64,
            DataKind::Byte | DataKind::UByte => 1,
            DataKind::Byte4N | DataKind::UByte4N => 4,
            DataKind::Short2 | DataKind::Short2N => 4,
            DataKind::Short4 | DataKind::Short4N => 8,
        }
    }
}

/// A data kind plus array length. `array_len` is 1 for scalars and 0 for `T[]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderDataType {
    pub kind: DataKind,
    pub array_len: u32,
}

impl ShaderDataType {
    pub fn scalar(kind: DataKind) -> Self {
        Self { kind, array_len: 1 }
    }

    pub fn array(kind: DataKind, array_len: u32) -> Self {
        Self { kind, array_len }
    }

    /// `None` when the byte size does not fit in a `u32`.
    pub fn size(self) -> Option<u32> {
        self.kind.size().checked_mul(self.array_len)
    }
}

impl fmt::Display for ShaderDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.array_len {
            1 => f.write_str(self.kind.keyword()),
            0 => write!(f, "{}[]", self.kind.keyword()),
            n => write!(f, "{}[{n}]", self.kind.keyword()),
        }
    }
}

bitflags! {
    /// Shader stages a binding or field is visible to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct StageMask: u8 {
        const VERTEX = 1 << 0;
        const GEOMETRY = 1 << 1;
        const FRAGMENT = 1 << 2;
        const COMPUTE = 1 << 3;
    }
}

impl From<StageKind> for StageMask {
    fn from(kind: StageKind) -> Self {
        match kind {
            StageKind::Vertex => StageMask::VERTEX,
            StageKind::Geometry => StageMask::GEOMETRY,
            StageKind::Fragment => StageMask::FRAGMENT,
            StageKind::Compute => StageMask::COMPUTE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Geometry,
    Fragment,
    Compute,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Vertex,
        StageKind::Geometry,
        StageKind::Fragment,
        StageKind::Compute,
    ];

    /// Preprocessor symbol defined to `1` while compiling this stage.
    pub fn define(self) -> &'static str {
        match self {
            StageKind::Vertex => "VERTEX",
            StageKind::Geometry => "GEOMETRY",
            StageKind::Fragment => "FRAGMENT",
            StageKind::Compute => "COMPUTE",
        }
    }

    /// Pass-body keyword that declares a stage of this kind.
    pub fn pass_keyword(self) -> &'static str {
        match self {
            StageKind::Vertex => "VertexShader",
            StageKind::Geometry => "GeometryShader",
            StageKind::Fragment => "FragmentShader",
            StageKind::Compute => "ComputeShader",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            StageKind::Vertex => "vert",
            StageKind::Geometry => "geom",
            StageKind::Fragment => "frag",
            StageKind::Compute => "comp",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.define())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub format: ShaderDataType,
    pub binding: u32,
    pub location: u32,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexInputRate {
    PerVertex,
    PerInstance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexInputBinding {
    pub binding: u32,
    pub stride: u32,
    pub rate: VertexInputRate,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexLayoutDefinition {
    pub name: String,
    pub attributes: Vec<VertexAttribute>,
    pub bindings: Vec<VertexInputBinding>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    UniformBuffer,
    StorageBuffer,
    Sampler,
}

impl ResourceKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ResourceKind::UniformBuffer => "UniformBuffer",
            ResourceKind::StorageBuffer => "StorageBuffer",
            ResourceKind::Sampler => "Sampler",
        }
    }

    pub fn is_buffer(self) -> bool {
        !matches!(self, ResourceKind::Sampler)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceBinding {
    /// Also the name of the linked buffer for buffer bindings.
    pub name: String,
    pub kind: ResourceKind,
    pub stages: StageMask,
    pub binding: u32,
    pub set: u32,
    /// Declared byte size. The semantic pass fills in the computed size when omitted.
    pub size: Option<u32>,
    /// Index into `uniform_buffers` or `storage_buffers` depending on `kind`.
    pub buffer: Option<Handle<UniformBufferDefinition>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceBindingsDefinition {
    pub name: String,
    pub bindings: Vec<ResourceBinding>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BufferField {
    pub ty: ShaderDataType,
    pub name: String,
    pub stages: Option<StageMask>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstantBufferDefinition {
    pub name: String,
    pub fields: Vec<BufferField>,
}

/// Layout shared by uniform and storage buffers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniformBufferDefinition {
    pub name: String,
    pub fields: Vec<BufferField>,
}

/// Sum of field sizes, no alignment padding. `None` on `u32` overflow.
pub fn fields_size(fields: &[BufferField]) -> Option<u32> {
    fields
        .iter()
        .try_fold(0u32, |total, f| total.checked_add(f.ty.size()?))
}

impl ConstantBufferDefinition {
    pub fn size(&self) -> Option<u32> {
        fields_size(&self.fields)
    }
}

impl UniformBufferDefinition {
    pub fn size(&self) -> Option<u32> {
        fields_size(&self.fields)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendMode {
    pub enabled: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub color_op: BlendOp,
    pub alpha_op: BlendOp,
}

impl BlendMode {
    pub const REPLACE: BlendMode = BlendMode {
        enabled: false,
        src_color: BlendFactor::One,
        dst_color: BlendFactor::Zero,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
        color_op: BlendOp::Add,
        alpha_op: BlendOp::Add,
    };
}

impl Default for BlendMode {
    fn default() -> Self {
        Self::REPLACE
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderStateDefinition {
    pub name: String,
    pub cull: CullMode,
    pub depth_test: CompareOp,
    pub depth_write: bool,
    pub blend: BlendMode,
    pub polygon_mode: PolygonMode,
    pub line_width: f32,
}

impl RenderStateDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for RenderStateDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            cull: CullMode::Back,
            depth_test: CompareOp::LessOrEqual,
            depth_write: true,
            blend: BlendMode::REPLACE,
            polygon_mode: PolygonMode::Fill,
            line_width: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShaderStage {
    pub kind: StageKind,
    pub fragment: Link<ShaderCodeFragment>,
    /// SPIR-V words; empty until the compile driver has run.
    pub bytecode: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderPassDefinition {
    pub name: String,
    pub vertex_layout: Option<Link<VertexLayoutDefinition>>,
    pub resources: Option<Link<ResourceBindingsDefinition>>,
    pub constant_buffer: Option<Link<ConstantBufferDefinition>>,
    pub render_state: Option<Link<RenderStateDefinition>>,
    pub stages: Vec<ShaderStage>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderCodeFragment {
    pub name: String,
    pub source: String,
}

/// Root of one parsed effect file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Effect {
    pub name: String,
    pub source_path: String,
    pub vertex_layouts: Vec<VertexLayoutDefinition>,
    pub local_resources: Vec<ResourceBindingsDefinition>,
    pub global_resources: Vec<ResourceBindingsDefinition>,
    pub constant_buffers: Vec<ConstantBufferDefinition>,
    pub uniform_buffers: Vec<UniformBufferDefinition>,
    pub storage_buffers: Vec<UniformBufferDefinition>,
    pub render_states: Vec<RenderStateDefinition>,
    pub passes: Vec<RenderPassDefinition>,
    pub code_fragments: Vec<ShaderCodeFragment>,
}

impl Effect {
    pub fn vertex_layout(
        &self,
        h: Handle<VertexLayoutDefinition>,
    ) -> Option<&VertexLayoutDefinition> {
        h.get(&self.vertex_layouts)
    }

    pub fn resources(
        &self,
        h: Handle<ResourceBindingsDefinition>,
    ) -> Option<&ResourceBindingsDefinition> {
        h.get(&self.local_resources)
    }

    pub fn constant_buffer(
        &self,
        h: Handle<ConstantBufferDefinition>,
    ) -> Option<&ConstantBufferDefinition> {
        h.get(&self.constant_buffers)
    }

    pub fn render_state(&self, h: Handle<RenderStateDefinition>) -> Option<&RenderStateDefinition> {
        h.get(&self.render_states)
    }

    pub fn code_fragment(&self, h: Handle<ShaderCodeFragment>) -> Option<&ShaderCodeFragment> {
        h.get(&self.code_fragments)
    }

    /// Buffer array a binding of `kind` links into. `None` for samplers.
    pub fn buffers_for(&self, kind: ResourceKind) -> Option<&[UniformBufferDefinition]> {
        match kind {
            ResourceKind::UniformBuffer => Some(&self.uniform_buffers),
            ResourceKind::StorageBuffer => Some(&self.storage_buffers),
            ResourceKind::Sampler => None,
        }
    }

    pub fn pass(&self, name: &str) -> Option<&RenderPassDefinition> {
        self.passes.iter().find(|p| p.name == name)
    }
}

/// An effect whose every shader stage carries compiled bytecode.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledEffect {
    pub effect: Effect,
}

impl CompiledEffect {
    pub fn into_inner(self) -> Effect {
        self.effect
    }
}

impl Deref for CompiledEffect {
    type Target = Effect;

    fn deref(&self) -> &Effect {
        &self.effect
    }
}
