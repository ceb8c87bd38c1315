//! Relocatable binary artifact (`.kfxb`) for a compiled effect.
//!
//! Layout: `KFXB` magic, `u32` format version, then the effect body. Integers are
//! little-endian, strings and arrays carry a `u32` length prefix. Cross-references are
//! indices into the owning array, preceded by a presence byte when optional. The reader
//! mirrors the writer field for field.

mod reader;
mod writer;

pub use reader::deserialize;
pub use writer::serialize;

use crate::effect::{
    BlendFactor, BlendOp, CompareOp, CullMode, DataKind, PolygonMode, ResourceKind, StageKind,
    VertexInputRate,
};

pub const MAGIC: [u8; 4] = *b"KFXB";
pub const FORMAT_VERSION: u32 = 1;

/// Fieldless enum stored as a one-byte tag equal to its declaration index.
pub(crate) trait WireEnum: Copy + Sized {
    const WHAT: &'static str;

    fn tag(self) -> u8;
    fn from_tag(tag: u8) -> Option<Self>;
}

macro_rules! wire_enum {
    ($ty:ident, $what:literal, [$($variant:ident),+ $(,)?]) => {
        impl WireEnum for $ty {
            const WHAT: &'static str = $what;

            fn tag(self) -> u8 {
                self as u8
            }

            fn from_tag(tag: u8) -> Option<Self> {
                const VARIANTS: &[$ty] = &[$($ty::$variant),+];
                VARIANTS.get(tag as usize).copied()
            }
        }
    };
}

wire_enum!(DataKind, "data type", [
    Float, Float2, Float3, Float4, Mat4, Byte, Byte4N, UByte, UByte4N, UInt, UInt2, UInt3,
    UInt4, Short2, Short2N, Short4, Short4N, TextureId,
]);
wire_enum!(StageKind, "shader stage", [Vertex, Geometry, Fragment, Compute]);
wire_enum!(VertexInputRate, "input rate", [PerVertex, PerInstance]);
wire_enum!(ResourceKind, "resource kind", [UniformBuffer, StorageBuffer, Sampler]);
wire_enum!(CullMode, "cull mode", [None, Front, Back, FrontAndBack]);
wire_enum!(CompareOp, "compare op", [
    Never, Less, Equal, LessOrEqual, Greater, NotEqual, GreaterOrEqual, Always,
]);
wire_enum!(BlendFactor, "blend factor", [
    Zero, One, SrcColor, OneMinusSrcColor, DstColor, OneMinusDstColor, SrcAlpha,
    OneMinusSrcAlpha, DstAlpha, OneMinusDstAlpha, ConstantColor, OneMinusConstantColor,
    ConstantAlpha, OneMinusConstantAlpha, SrcAlphaSaturate,
]);
wire_enum!(BlendOp, "blend op", [Add, Subtract, ReverseSubtract, Min, Max]);
wire_enum!(PolygonMode, "polygon mode", [Fill, Line, Point]);
