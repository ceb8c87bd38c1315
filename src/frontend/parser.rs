//! Recursive-descent parser building an [`Effect`] from ShaderFX source.
//!
//! Parsing is single-shot: the first mismatch aborts with a [`ParseError`]. Names used by
//! passes are recorded as unresolved [`Link`]s; `semantic::validate` resolves them once
//! every sibling array exists, so declarations may appear in any order.

use crate::{
    effect::{
        BlendFactor, BlendOp, BufferField, ConstantBufferDefinition, DataKind, Effect, Link,
        RenderPassDefinition, RenderStateDefinition, ResourceBinding,
        ResourceBindingsDefinition, ShaderCodeFragment, ShaderDataType, ShaderStage, SourcePos,
        StageMask, UniformBufferDefinition, VertexAttribute, VertexInputBinding,
        VertexLayoutDefinition,
    },
    error::ParseError,
    frontend::{
        keywords,
        lexer::{Lexer, Token, TokenKind},
    },
};

type Result<T> = std::result::Result<T, ParseError>;

/// Deepest `Shader { Shader { .. } }` nesting accepted.
pub const MAX_SHADER_NESTING: usize = 64;

/// Parses one effect source file.
pub fn parse(source: &str) -> Result<Effect> {
    Parser::new(source).parse_effect()
}

fn mismatch(expected: impl Into<String>, found: &Token<'_>) -> ParseError {
    ParseError::TokenMismatch {
        expected: expected.into(),
        found: found.to_string(),
        at: found.at,
    }
}

fn invalid_value(what: &'static str, token: &Token<'_>) -> ParseError {
    ParseError::InvalidEnumValue {
        what,
        value: token.text.to_string(),
        at: token.at,
    }
}

fn unknown(context: &'static str, token: &Token<'_>) -> ParseError {
    ParseError::UnknownIdentifier {
        name: token.text.to_string(),
        context,
        at: token.at,
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    effect: Effect,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            effect: Effect::default(),
            depth: 0,
        }
    }

    fn next(&mut self) -> Result<Token<'a>> {
        Ok(self.lexer.next_token()?)
    }

    /// Consumes the next token only if it has `kind`.
    fn eat(&mut self, kind: TokenKind) -> Result<bool> {
        let checkpoint = self.lexer.checkpoint();
        if self.next()?.kind == kind {
            return Ok(true);
        }
        self.lexer.rewind(checkpoint);
        Ok(false)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>> {
        let t = self.next()?;
        if t.kind != kind {
            return Err(mismatch(kind.describe(), &t));
        }
        Ok(t)
    }

    fn expect_identifier(&mut self) -> Result<Token<'a>> {
        self.expect(TokenKind::Identifier)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token<'a>> {
        let t = self.next()?;
        if !t.is_keyword(keyword) {
            return Err(ParseError::KeywordMismatch {
                expected: keyword.to_string(),
                found: t.to_string(),
                at: t.at,
            });
        }
        Ok(t)
    }

    /// A definition name: identifier or quoted string.
    fn expect_name(&mut self) -> Result<String> {
        let t = self.next()?;
        match t.kind {
            TokenKind::Identifier => Ok(t.text.to_string()),
            TokenKind::String => Ok(t.unescaped().into_owned()),
            _ => Err(mismatch("name", &t)),
        }
    }

    fn expect_u32(&mut self, what: &'static str) -> Result<u32> {
        let t = self.next()?;
        if t.kind != TokenKind::Number {
            return Err(mismatch(format!("number ({what})"), &t));
        }
        t.as_integer()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ParseError::InvalidInteger {
                what,
                found: t.to_string(),
                at: t.at,
            })
    }

    fn expect_number(&mut self, what: &'static str) -> Result<f64> {
        let t = self.next()?;
        t.number
            .ok_or_else(|| mismatch(format!("number ({what})"), &t))
    }

    fn parse_effect(mut self) -> Result<Effect> {
        self.parse_items(TokenKind::EndOfStream)?;
        Ok(self.effect)
    }

    /// Top-level item loop, shared by the file and the body of `Shader <name> { }`.
    /// Unrecognized identifiers are skipped.
    fn parse_items(&mut self, terminator: TokenKind) -> Result<()> {
        loop {
            let t = self.next()?;
            if t.kind == terminator {
                return Ok(());
            }
            if t.kind != TokenKind::Identifier {
                return Err(mismatch(
                    format!("identifier or {}", terminator.describe()),
                    &t,
                ));
            }
            match t.text {
                "Shader" => self.parse_shader()?,
                "Layout" => self.parse_layout()?,
                "GLSL" => self.parse_glsl()?,
                "RenderState" => self.parse_render_state_block()?,
                "Pass" => self.parse_pass()?,
                other => log::debug!("skipping top-level identifier `{other}` at {}", t.at),
            }
        }
    }

    fn parse_shader(&mut self) -> Result<()> {
        let name = self.expect_name()?;
        if !self.effect.name.is_empty() && self.effect.name != name {
            log::warn!(
                "effect `{}` renamed to `{name}` by a second Shader block",
                self.effect.name
            );
        }
        self.effect.name = name;
        let open = self.expect(TokenKind::LeftBrace)?;
        if self.depth == MAX_SHADER_NESTING {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_SHADER_NESTING,
                at: open.at,
            });
        }
        self.depth += 1;
        let result = self.parse_items(TokenKind::RightBrace);
        self.depth -= 1;
        result
    }

    fn parse_layout(&mut self) -> Result<()> {
        self.expect(TokenKind::LeftBrace)?;
        loop {
            let t = self.next()?;
            match t.kind {
                TokenKind::RightBrace => return Ok(()),
                TokenKind::Identifier => {}
                _ => return Err(mismatch("layout entry or `}`", &t)),
            }
            match t.text {
                "Vertex" => {
                    let layout = self.parse_vertex_layout()?;
                    self.effect.vertex_layouts.push(layout);
                }
                "local" => {
                    self.expect_keyword("Resource")?;
                    let block = self.parse_resource_block()?;
                    self.effect.local_resources.push(block);
                }
                "global" => {
                    self.expect_keyword("Resource")?;
                    let block = self.parse_resource_block()?;
                    self.effect.global_resources.push(block);
                }
                "Resource" => {
                    let block = self.parse_resource_block()?;
                    self.effect.local_resources.push(block);
                }
                "ConstantBuffer" => {
                    let name = self.expect_name()?;
                    let fields = self.parse_buffer_fields()?;
                    self.effect
                        .constant_buffers
                        .push(ConstantBufferDefinition { name, fields });
                }
                "UniformBuffer" => {
                    let name = self.expect_name()?;
                    let fields = self.parse_buffer_fields()?;
                    self.effect
                        .uniform_buffers
                        .push(UniformBufferDefinition { name, fields });
                }
                "StorageBuffer" => {
                    let name = self.expect_name()?;
                    let fields = self.parse_buffer_fields()?;
                    self.effect
                        .storage_buffers
                        .push(UniformBufferDefinition { name, fields });
                }
                _ => return Err(unknown("Layout block", &t)),
            }
        }
    }

    fn parse_vertex_layout(&mut self) -> Result<VertexLayoutDefinition> {
        let mut layout = VertexLayoutDefinition {
            name: self.expect_name()?,
            ..Default::default()
        };
        self.expect(TokenKind::LeftBrace)?;
        loop {
            let t = self.next()?;
            match t.kind {
                TokenKind::RightBrace => return Ok(layout),
                TokenKind::Identifier => {}
                _ => return Err(mismatch("`Attribute`, `Binding` or `}`", &t)),
            }
            match t.text {
                "Attribute" => {
                    let first = self.next()?;
                    let format = self.parse_data_type(first)?;
                    // The attribute name is documentation only.
                    self.expect_identifier()?;
                    let binding = self.expect_u32("attribute binding")?;
                    let location = self.expect_u32("attribute location")?;
                    let offset = self.expect_u32("attribute offset")?;
                    layout.attributes.push(VertexAttribute {
                        format,
                        binding,
                        location,
                        offset,
                    });
                }
                "Binding" => {
                    let binding = self.expect_u32("vertex binding")?;
                    let stride = self.expect_u32("vertex stride")?;
                    let rate_token = self.expect_identifier()?;
                    let rate = keywords::parse_input_rate(rate_token.text)
                        .ok_or_else(|| invalid_value("vertex input rate", &rate_token))?;
                    layout.bindings.push(VertexInputBinding {
                        binding,
                        stride,
                        rate,
                    });
                }
                _ => return Err(unknown("vertex layout", &t)),
            }
            self.eat(TokenKind::Semicolon)?;
        }
    }

    fn parse_resource_block(&mut self) -> Result<ResourceBindingsDefinition> {
        let mut block = ResourceBindingsDefinition {
            name: self.expect_name()?,
            bindings: Vec::new(),
        };
        self.expect(TokenKind::LeftBrace)?;
        loop {
            let t = self.next()?;
            match t.kind {
                TokenKind::RightBrace => return Ok(block),
                TokenKind::Identifier => {}
                _ => return Err(mismatch("resource binding or `}`", &t)),
            }
            let kind = keywords::parse_resource_kind(t.text)
                .ok_or_else(|| unknown("resource block", &t))?;
            let name = self.expect_identifier()?.text.to_string();
            let mut binding = ResourceBinding {
                name,
                kind,
                stages: StageMask::all(),
                binding: 0,
                set: 0,
                size: None,
                buffer: None,
            };
            self.parse_binding_properties(&mut binding)?;
            block.bindings.push(binding);
        }
    }

    /// `Key(Value)` pairs in any order, terminated by `;`.
    fn parse_binding_properties(&mut self, binding: &mut ResourceBinding) -> Result<()> {
        loop {
            let key = self.next()?;
            match key.kind {
                TokenKind::Semicolon => return Ok(()),
                TokenKind::Identifier => {}
                _ => return Err(mismatch("`Key(Value)` or `;`", &key)),
            }
            self.expect(TokenKind::LeftParen)?;
            match key.text {
                "Stage" => {
                    binding.stages = self.parse_stage_list()?;
                    continue;
                }
                "Binding" => binding.binding = self.expect_u32("Binding")?,
                "Size" => binding.size = Some(self.expect_u32("Size")?),
                "Set" => binding.set = self.expect_u32("Set")?,
                other => {
                    log::warn!(
                        "{}: ignoring unknown property `{other}` on binding `{}`",
                        key.at,
                        binding.name
                    );
                    self.skip_past_paren()?;
                    continue;
                }
            }
            self.expect(TokenKind::RightParen)?;
        }
    }

    fn skip_past_paren(&mut self) -> Result<()> {
        loop {
            let t = self.next()?;
            match t.kind {
                TokenKind::RightParen => return Ok(()),
                TokenKind::EndOfStream => return Err(mismatch("`)`", &t)),
                _ => {}
            }
        }
    }

    /// Stage names after `Stage(`, through the closing `)`.
    fn parse_stage_list(&mut self) -> Result<StageMask> {
        let mut mask = StageMask::empty();
        loop {
            let t = self.expect_identifier()?;
            mask |= keywords::parse_stage_mask(t.text)
                .ok_or_else(|| invalid_value("shader stage", &t))?;
            let sep = self.next()?;
            match sep.kind {
                TokenKind::Comma => {}
                TokenKind::RightParen => return Ok(mask),
                _ => return Err(mismatch("`,` or `)`", &sep)),
            }
        }
    }

    fn parse_buffer_fields(&mut self) -> Result<Vec<BufferField>> {
        self.expect(TokenKind::LeftBrace)?;
        let mut fields = Vec::new();
        loop {
            let t = self.next()?;
            if t.kind == TokenKind::RightBrace {
                return Ok(fields);
            }
            let ty = self.parse_data_type(t)?;
            let name = self.expect_identifier()?.text.to_string();
            let mut stages = None;
            let after = self.next()?;
            if after.is_keyword("Stage") {
                self.expect(TokenKind::LeftParen)?;
                stages = Some(self.parse_stage_list()?);
                self.expect(TokenKind::Semicolon)?;
            } else if after.kind != TokenKind::Semicolon {
                return Err(mismatch("`Stage(...)` or `;`", &after));
            }
            fields.push(BufferField { ty, name, stages });
        }
    }

    /// `Base` or `Base[N]` / `Base[]`, starting at the already-consumed `first` token.
    fn parse_data_type(&mut self, first: Token<'a>) -> Result<ShaderDataType> {
        if first.kind != TokenKind::Identifier {
            return Err(mismatch("data type", &first));
        }
        let kind = DataKind::from_keyword(first.text).ok_or_else(|| unknown("data type", &first))?;

        let checkpoint = self.lexer.checkpoint();
        if self.next()?.kind != TokenKind::LeftBracket {
            self.lexer.rewind(checkpoint);
            return Ok(ShaderDataType::scalar(kind));
        }

        let t = self.next()?;
        let array_len = match t.kind {
            TokenKind::RightBracket => return Ok(ShaderDataType::array(kind, 0)),
            TokenKind::Number => {
                let value = t.number.unwrap_or_default();
                if value < 0.0 {
                    return Err(ParseError::NegativeArraySize { value, at: t.at });
                }
                t.as_integer()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| ParseError::InvalidInteger {
                        what: "array size",
                        found: t.to_string(),
                        at: t.at,
                    })?
            }
            _ => {
                return Err(ParseError::UnterminatedArray {
                    found: t.to_string(),
                    at: t.at,
                });
            }
        };

        let close = self.next()?;
        if close.kind != TokenKind::RightBracket {
            return Err(ParseError::UnterminatedArray {
                found: close.to_string(),
                at: close.at,
            });
        }
        Ok(ShaderDataType::array(kind, array_len))
    }

    /// `RenderState <name> { ... }` or `RenderState { State <name> { ... } ... }`.
    fn parse_render_state_block(&mut self) -> Result<()> {
        let t = self.next()?;
        match t.kind {
            TokenKind::Identifier | TokenKind::String => {
                let name = match t.kind {
                    TokenKind::String => t.unescaped().into_owned(),
                    _ => t.text.to_string(),
                };
                let state = self.parse_render_state(name)?;
                self.effect.render_states.push(state);
                Ok(())
            }
            TokenKind::LeftBrace => loop {
                let t = self.next()?;
                if t.kind == TokenKind::RightBrace {
                    return Ok(());
                }
                if !t.is_keyword("State") {
                    return Err(ParseError::KeywordMismatch {
                        expected: "State".to_string(),
                        found: t.to_string(),
                        at: t.at,
                    });
                }
                let name = self.expect_name()?;
                let state = self.parse_render_state(name)?;
                self.effect.render_states.push(state);
            },
            _ => Err(mismatch("render state name or `{`", &t)),
        }
    }

    fn parse_render_state(&mut self, name: String) -> Result<RenderStateDefinition> {
        let mut state = RenderStateDefinition::named(name);
        self.expect(TokenKind::LeftBrace)?;
        loop {
            let t = self.next()?;
            match t.kind {
                TokenKind::RightBrace => return Ok(state),
                TokenKind::Identifier => {}
                _ => return Err(mismatch("render state entry or `}`", &t)),
            }
            match t.text {
                "Cull" => {
                    let v = self.expect_identifier()?;
                    state.cull = keywords::parse_cull_mode(v.text)
                        .ok_or_else(|| invalid_value("cull mode", &v))?;
                }
                "ZTest" => {
                    let v = self.expect_identifier()?;
                    state.depth_test = keywords::parse_compare_op(v.text)
                        .ok_or_else(|| invalid_value("depth compare op", &v))?;
                }
                "ZWrite" => {
                    let v = self.expect_identifier()?;
                    state.depth_write = keywords::parse_on_off(v.text)
                        .ok_or_else(|| invalid_value("On/Off switch", &v))?;
                }
                "Blend" => self.parse_blend(&mut state)?,
                "BlendOp" => {
                    let color = self.expect_blend_op()?;
                    let alpha = if self.eat(TokenKind::Comma)? {
                        self.expect_blend_op()?
                    } else {
                        color
                    };
                    state.blend.color_op = color;
                    state.blend.alpha_op = alpha;
                }
                "PolygonMode" => {
                    let v = self.expect_identifier()?;
                    state.polygon_mode = keywords::parse_polygon_mode(v.text)
                        .ok_or_else(|| invalid_value("polygon mode", &v))?;
                }
                "LineWidth" => state.line_width = self.expect_number("LineWidth")? as f32,
                _ => return Err(unknown("render state", &t)),
            }
            self.eat(TokenKind::Semicolon)?;
        }
    }

    /// `Blend Off|None` or `Blend src dst[, srcA dstA]`.
    fn parse_blend(&mut self, state: &mut RenderStateDefinition) -> Result<()> {
        let first = self.expect_identifier()?;
        if matches!(first.text, "Off" | "None") {
            state.blend.enabled = false;
            return Ok(());
        }
        let src = keywords::parse_blend_factor(first.text)
            .ok_or_else(|| invalid_value("blend factor", &first))?;
        let dst = self.expect_blend_factor()?;
        let (src_alpha, dst_alpha) = if self.eat(TokenKind::Comma)? {
            (self.expect_blend_factor()?, self.expect_blend_factor()?)
        } else {
            (src, dst)
        };
        state.blend.enabled = true;
        state.blend.src_color = src;
        state.blend.dst_color = dst;
        state.blend.src_alpha = src_alpha;
        state.blend.dst_alpha = dst_alpha;
        Ok(())
    }

    fn expect_blend_factor(&mut self) -> Result<BlendFactor> {
        let t = self.expect_identifier()?;
        keywords::parse_blend_factor(t.text).ok_or_else(|| invalid_value("blend factor", &t))
    }

    fn expect_blend_op(&mut self) -> Result<BlendOp> {
        let t = self.expect_identifier()?;
        keywords::parse_blend_op(t.text).ok_or_else(|| invalid_value("blend op", &t))
    }

    fn parse_pass(&mut self) -> Result<()> {
        let mut pass = RenderPassDefinition {
            name: self.expect_name()?,
            ..Default::default()
        };
        self.expect(TokenKind::LeftBrace)?;
        loop {
            let t = self.next()?;
            match t.kind {
                TokenKind::RightBrace => break,
                TokenKind::Identifier => {}
                _ => return Err(mismatch("pass entry or `}`", &t)),
            }
            match t.text {
                "VertexLayout" => {
                    let link = self.parse_link(
                        &pass,
                        pass.vertex_layout.is_some(),
                        "a vertex layout",
                        t.at,
                    )?;
                    pass.vertex_layout = Some(link);
                }
                "Resources" => {
                    let link = self.parse_link(&pass, pass.resources.is_some(), "resources", t.at)?;
                    pass.resources = Some(link);
                }
                "ConstantBuffer" => {
                    let link = self.parse_link(
                        &pass,
                        pass.constant_buffer.is_some(),
                        "a constant buffer",
                        t.at,
                    )?;
                    pass.constant_buffer = Some(link);
                }
                "RenderState" => {
                    let link = self.parse_link(
                        &pass,
                        pass.render_state.is_some(),
                        "a render state",
                        t.at,
                    )?;
                    pass.render_state = Some(link);
                }
                other => {
                    let kind = keywords::parse_stage_keyword(other)
                        .ok_or_else(|| unknown("pass", &t))?;
                    let fragment = self.expect_name()?;
                    pass.stages.push(ShaderStage {
                        kind,
                        fragment: Link::unresolved(fragment),
                        bytecode: Vec::new(),
                    });
                }
            }
            self.eat(TokenKind::Semicolon)?;
        }
        self.effect.passes.push(pass);
        Ok(())
    }

    fn parse_link<T>(
        &mut self,
        pass: &RenderPassDefinition,
        already_bound: bool,
        what: &'static str,
        at: SourcePos,
    ) -> Result<Link<T>> {
        if already_bound {
            return Err(ParseError::DuplicateLink {
                what,
                pass: pass.name.clone(),
                at,
            });
        }
        Ok(Link::unresolved(self.expect_name()?))
    }

    fn parse_glsl(&mut self) -> Result<()> {
        let name = self.expect_name()?;
        let (source, _) = self.lexer.capture_braced()?;
        self.effect.code_fragments.push(ShaderCodeFragment {
            name,
            source: source.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{CompareOp, CullMode, StageKind, VertexInputRate};

    fn parse_layout_types(body: &str) -> Vec<ShaderDataType> {
        let src = format!("Layout {{ UniformBuffer B {{ {body} }} }}");
        parse(&src)
            .expect("parse")
            .uniform_buffers
            .remove(0)
            .fields
            .into_iter()
            .map(|f| f.ty)
            .collect()
    }

    #[test]
    fn array_suffix_is_optional() {
        assert_eq!(
            parse_layout_types("UInt[4] a; UInt b; Float4[] c;"),
            vec![
                ShaderDataType::array(DataKind::UInt, 4),
                ShaderDataType::scalar(DataKind::UInt),
                ShaderDataType::array(DataKind::Float4, 0),
            ]
        );
    }

    fn nested_shaders(depth: usize) -> String {
        format!("{}{}", "Shader a { ".repeat(depth), "}".repeat(depth))
    }

    #[test]
    fn shader_nesting_is_bounded() {
        assert_eq!(parse(&nested_shaders(MAX_SHADER_NESTING)).unwrap().name, "a");

        let err = parse(&nested_shaders(MAX_SHADER_NESTING + 1)).unwrap_err();
        assert!(
            matches!(err, ParseError::NestingTooDeep { limit: MAX_SHADER_NESTING, .. }),
            "{err:?}"
        );

        let err = parse(&nested_shaders(200_000)).unwrap_err();
        assert_eq!(err.position().column, 11 * MAX_SHADER_NESTING as u32 + 10);
    }

    #[test]
    fn negative_array_size_is_rejected() {
        let err = parse("Layout { UniformBuffer B { UInt[-2] a; } }").unwrap_err();
        assert!(matches!(err, ParseError::NegativeArraySize { value, .. } if value == -2.0));
    }

    #[test]
    fn missing_close_bracket_is_unterminated_array() {
        let err = parse("Layout { UniformBuffer B { UInt[4 a; } }").unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedArray { .. }), "{err:?}");
    }

    #[test]
    fn misspelled_type_is_unknown_identifier() {
        let err = parse("Layout { UniformBuffer B { Float3x a; } }").unwrap_err();
        assert!(
            matches!(&err, ParseError::UnknownIdentifier { name, .. } if name == "Float3x"),
            "{err:?}"
        );
    }

    #[test]
    fn buffer_field_stage_masks() {
        let effect = parse(
            "Layout { ConstantBuffer C { Mat4 mvp Stage(Vertex); Float4 tint Stage(Fragment, Vertex); Float t; } }",
        )
        .unwrap();
        let fields = &effect.constant_buffers[0].fields;
        assert_eq!(fields[0].stages, Some(StageMask::VERTEX));
        assert_eq!(fields[1].stages, Some(StageMask::VERTEX | StageMask::FRAGMENT));
        assert_eq!(fields[2].stages, None);
    }

    #[test]
    fn vertex_layout_body() {
        let effect = parse(
            "Layout { Vertex V { Attribute Float3 Pos 0 0 0 Attribute UByte4N Color 1 1 12 Binding 0 16 vertex Binding 1 4 instance } }",
        )
        .unwrap();
        let v = &effect.vertex_layouts[0];
        assert_eq!(v.name, "V");
        assert_eq!(v.attributes.len(), 2);
        assert_eq!(v.attributes[1].format, ShaderDataType::scalar(DataKind::UByte4N));
        let color = v.attributes[1];
        assert_eq!((color.binding, color.location, color.offset), (1, 1, 12));
        assert_eq!(v.bindings[1].rate, VertexInputRate::PerInstance);
        assert_eq!(v.bindings[0].stride, 16);
    }

    #[test]
    fn resource_properties_are_order_independent() {
        let effect = parse(
            "Layout { local Resource R { UniformBuffer Bar Size(32) Set(1) Stage(Vertex) Binding(2); Sampler Tex Binding(3) Flavor(x y); } global Resource G { StorageBuffer S Binding(0); } }",
        )
        .unwrap();
        let bar = &effect.local_resources[0].bindings[0];
        assert_eq!(bar.name, "Bar");
        assert_eq!(bar.size, Some(32));
        assert_eq!((bar.binding, bar.set), (2, 1));
        assert_eq!(bar.stages, StageMask::VERTEX);
        let tex = &effect.local_resources[0].bindings[1];
        assert_eq!(tex.binding, 3);
        assert_eq!(tex.stages, StageMask::all());
        assert_eq!(effect.global_resources[0].bindings[0].name, "S");
    }

    #[test]
    fn missing_semicolon_after_binding_fails() {
        let err = parse("Layout { Resource R { UniformBuffer Bar Binding(0) } }").unwrap_err();
        assert!(matches!(err, ParseError::TokenMismatch { .. }), "{err:?}");
    }

    #[test]
    fn render_state_entries() {
        let effect = parse(
            "RenderState Alpha { Cull Off ZTest GEqual ZWrite Off Blend SrcAlpha OneMinusSrcAlpha, One Zero BlendOp Add, Max PolygonMode Line LineWidth 2.5 }",
        )
        .unwrap();
        let s = &effect.render_states[0];
        assert_eq!(s.cull, CullMode::None);
        assert_eq!(s.depth_test, CompareOp::GreaterOrEqual);
        assert!(!s.depth_write);
        assert!(s.blend.enabled);
        assert_eq!(s.blend.src_color, BlendFactor::SrcAlpha);
        assert_eq!(s.blend.dst_color, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(s.blend.src_alpha, BlendFactor::One);
        assert_eq!(s.blend.dst_alpha, BlendFactor::Zero);
        assert_eq!((s.blend.color_op, s.blend.alpha_op), (BlendOp::Add, BlendOp::Max));
        assert_eq!(s.line_width, 2.5);
    }

    #[test]
    fn blend_off_stops_the_entry() {
        let effect = parse("RenderState S { Blend Off ZWrite Off }").unwrap();
        let s = &effect.render_states[0];
        assert!(!s.blend.enabled);
        assert!(!s.depth_write);
    }

    #[test]
    fn grouped_render_states() {
        let effect = parse("RenderState { State A { Cull Front } State B { } }").unwrap();
        let names: Vec<_> = effect.render_states.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(effect.render_states[0].cull, CullMode::Front);
    }

    #[test]
    fn invalid_enum_value_reports_position() {
        let err = parse("RenderState S {\n  Cull Sideways }").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidEnumValue {
                what: "cull mode",
                value: "Sideways".to_string(),
                at: SourcePos { line: 2, column: 8 },
            }
        );
    }

    #[test]
    fn pass_records_unresolved_links_in_order() {
        let effect = parse(
            "Pass P { VertexLayout V Resources R ConstantBuffer C RenderState S VertexShader A FragmentShader B }",
        )
        .unwrap();
        let p = &effect.passes[0];
        assert_eq!(p.vertex_layout.as_ref().unwrap().name, "V");
        assert_eq!(p.resources.as_ref().unwrap().name, "R");
        assert_eq!(p.constant_buffer.as_ref().unwrap().name, "C");
        assert!(p.render_state.as_ref().unwrap().target.is_none());
        let stages: Vec<_> = p.stages.iter().map(|s| (s.kind, s.fragment.name.as_str())).collect();
        assert_eq!(stages, [(StageKind::Vertex, "A"), (StageKind::Fragment, "B")]);
    }

    #[test]
    fn pass_rejects_duplicate_links() {
        let err = parse("Pass P { RenderState A RenderState B }").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateLink { .. }), "{err:?}");
    }

    #[test]
    fn unknown_top_level_identifiers_are_skipped() {
        let effect =
            parse("Tags Queue Shader X { Fallback Off GLSL F { void main() {} } }").unwrap();
        assert_eq!(effect.name, "X");
        assert_eq!(effect.code_fragments[0].source.trim(), "void main() {}");
    }

    #[test]
    fn unknown_layout_entry_is_an_error() {
        let err = parse("Layout { Texture T { } }").unwrap_err();
        assert!(matches!(err, ParseError::UnknownIdentifier { context: "Layout block", .. }));
    }

    #[test]
    fn local_requires_resource_keyword() {
        let err = parse("Layout { local Buffer R { } }").unwrap_err();
        assert!(matches!(err, ParseError::KeywordMismatch { .. }), "{err:?}");
    }

    #[test]
    fn unterminated_shader_block_fails() {
        let err = parse("Shader X { Pass P { }").unwrap_err();
        assert!(matches!(err, ParseError::TokenMismatch { .. }), "{err:?}");
    }
}
