//! Keyword tables for render-state and layout enums.

use crate::effect::{
    BlendFactor, BlendOp, CompareOp, CullMode, PolygonMode, ResourceKind, StageKind, StageMask,
    VertexInputRate,
};

pub(crate) fn parse_cull_mode(s: &str) -> Option<CullMode> {
    Some(match s {
        "Back" => CullMode::Back,
        "Front" => CullMode::Front,
        "FrontAndBack" => CullMode::FrontAndBack,
        "Off" | "None" => CullMode::None,
        _ => return None,
    })
}

pub(crate) fn parse_compare_op(s: &str) -> Option<CompareOp> {
    Some(match s {
        "Never" => CompareOp::Never,
        "Less" => CompareOp::Less,
        "Equal" => CompareOp::Equal,
        "LEqual" | "LessEqual" => CompareOp::LessOrEqual,
        "Greater" => CompareOp::Greater,
        "NotEqual" => CompareOp::NotEqual,
        "GEqual" | "GreaterEqual" => CompareOp::GreaterOrEqual,
        // Depth testing switched off still runs the test, it just always passes.
        "Always" | "Off" => CompareOp::Always,
        _ => return None,
    })
}

pub(crate) fn parse_on_off(s: &str) -> Option<bool> {
    match s {
        "On" => Some(true),
        "Off" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_blend_factor(s: &str) -> Option<BlendFactor> {
    Some(match s {
        "Zero" => BlendFactor::Zero,
        "One" => BlendFactor::One,

        "SrcColor" => BlendFactor::SrcColor,
        "OneMinusSrcColor" => BlendFactor::OneMinusSrcColor,
        "DstColor" => BlendFactor::DstColor,
        "OneMinusDstColor" => BlendFactor::OneMinusDstColor,

        "SrcAlpha" => BlendFactor::SrcAlpha,
        "OneMinusSrcAlpha" => BlendFactor::OneMinusSrcAlpha,
        "DstAlpha" => BlendFactor::DstAlpha,
        "OneMinusDstAlpha" => BlendFactor::OneMinusDstAlpha,

        "ConstantColor" => BlendFactor::ConstantColor,
        "OneMinusConstantColor" => BlendFactor::OneMinusConstantColor,
        "ConstantAlpha" => BlendFactor::ConstantAlpha,
        "OneMinusConstantAlpha" => BlendFactor::OneMinusConstantAlpha,
        "SrcAlphaSaturate" => BlendFactor::SrcAlphaSaturate,
        _ => return None,
    })
}

pub(crate) fn parse_blend_op(s: &str) -> Option<BlendOp> {
    Some(match s {
        "Add" => BlendOp::Add,
        "Sub" | "Subtract" => BlendOp::Subtract,
        "RevSub" | "ReverseSubtract" => BlendOp::ReverseSubtract,
        "Min" => BlendOp::Min,
        "Max" => BlendOp::Max,
        _ => return None,
    })
}

pub(crate) fn parse_polygon_mode(s: &str) -> Option<PolygonMode> {
    Some(match s {
        "Fill" => PolygonMode::Fill,
        "Line" => PolygonMode::Line,
        "Point" => PolygonMode::Point,
        _ => return None,
    })
}

pub(crate) fn parse_input_rate(s: &str) -> Option<VertexInputRate> {
    Some(match s {
        "vertex" | "PerVertex" => VertexInputRate::PerVertex,
        "instance" | "PerInstance" => VertexInputRate::PerInstance,
        _ => return None,
    })
}

pub(crate) fn parse_resource_kind(s: &str) -> Option<ResourceKind> {
    Some(match s {
        "UniformBuffer" => ResourceKind::UniformBuffer,
        "StorageBuffer" => ResourceKind::StorageBuffer,
        "Sampler" => ResourceKind::Sampler,
        _ => return None,
    })
}

/// One entry of a `Stage(...)` list.
pub(crate) fn parse_stage_mask(s: &str) -> Option<StageMask> {
    Some(match s {
        "Vertex" => StageMask::VERTEX,
        "Geometry" => StageMask::GEOMETRY,
        "Fragment" => StageMask::FRAGMENT,
        "Compute" => StageMask::COMPUTE,
        "All" => StageMask::all(),
        _ => return None,
    })
}

pub(crate) fn parse_stage_keyword(s: &str) -> Option<StageKind> {
    StageKind::ALL.into_iter().find(|k| k.pass_keyword() == s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_test_aliases() {
        assert_eq!(parse_compare_op("LEqual"), Some(CompareOp::LessOrEqual));
        assert_eq!(parse_compare_op("LessEqual"), Some(CompareOp::LessOrEqual));
        assert_eq!(parse_compare_op("Off"), Some(CompareOp::Always));
        assert_eq!(parse_compare_op("less"), None);
    }

    #[test]
    fn cull_off_and_none_disable_culling() {
        assert_eq!(parse_cull_mode("Off"), Some(CullMode::None));
        assert_eq!(parse_cull_mode("None"), Some(CullMode::None));
        assert_eq!(parse_cull_mode("Sideways"), None);
    }

    #[test]
    fn stage_keywords() {
        assert_eq!(parse_stage_keyword("FragmentShader"), Some(StageKind::Fragment));
        assert_eq!(parse_stage_keyword("PixelShader"), None);
        assert_eq!(parse_stage_mask("All"), Some(StageMask::all()));
    }
}
