use crate::{prepare::Primitive, OutputAttachments};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compare {
    Less,
    LessEqual,
    Equal,
    NotEqual,
    Always,
}

impl Compare {
    #[inline]
    pub fn for_depth_test_equal(depth_test_equal: bool) -> Self {
        if depth_test_equal {
            Compare::LessEqual
        } else {
            Compare::Less
        }
    }

    fn to_wgpu(self) -> wgpu::CompareFunction {
        match self {
            Compare::Less => wgpu::CompareFunction::Less,
            Compare::LessEqual => wgpu::CompareFunction::LessEqual,
            Compare::Equal => wgpu::CompareFunction::Equal,
            Compare::NotEqual => wgpu::CompareFunction::NotEqual,
            Compare::Always => wgpu::CompareFunction::Always,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Invert,
}

impl StencilOp {
    fn to_wgpu(self) -> wgpu::StencilOperation {
        match self {
            StencilOp::Keep => wgpu::StencilOperation::Keep,
            StencilOp::Zero => wgpu::StencilOperation::Zero,
            StencilOp::Replace => wgpu::StencilOperation::Replace,
            StencilOp::Invert => wgpu::StencilOperation::Invert,
        }
    }
}

bitflags::bitflags! {
    /// Channels of the attribute buffer a pass may write.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AttrWrite: u8 {
        const OPAQUE_ID = 1 << 0;
        const EDGE = 1 << 1;
        const FOG = 1 << 2;
    }
}

impl AttrWrite {
    fn to_wgpu(self) -> wgpu::ColorWrites {
        let mut writes = wgpu::ColorWrites::empty();
        if self.contains(AttrWrite::OPAQUE_ID) {
            writes |= wgpu::ColorWrites::RED;
        }
        if self.contains(AttrWrite::EDGE) {
            writes |= wgpu::ColorWrites::GREEN;
        }
        if self.contains(AttrWrite::FOG) {
            writes |= wgpu::ColorWrites::BLUE;
        }
        writes
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Blend {
    Off,
    /// Source color replaces the destination, alpha keeps the maximum.
    Replace,
    /// Alpha blending on color, maximum on alpha.
    Alpha,
}

impl Blend {
    #[inline]
    pub fn translucent(alpha_blending_enabled: bool) -> Self {
        if alpha_blending_enabled {
            Blend::Alpha
        } else {
            Blend::Replace
        }
    }

    fn to_wgpu(self) -> Option<wgpu::BlendState> {
        let max_alpha = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Max,
        };
        match self {
            Blend::Off => None,
            Blend::Replace => Some(wgpu::BlendState {
                color: wgpu::BlendComponent::REPLACE,
                alpha: max_alpha,
            }),
            Blend::Alpha => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: max_alpha,
            }),
        }
    }
}

/// The fragment program a pass state draws with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    Opaque,
    Translucent,
    ShadowMask,
    EdgeFlag,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub compare: Compare,
    pub reference: u8,
    pub read_mask: u8,
    pub write_mask: u8,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
}

impl StencilState {
    pub const KEEP: Self = StencilState {
        compare: Compare::Always,
        reference: 0,
        read_mask: 0,
        write_mask: 0,
        depth_fail_op: StencilOp::Keep,
        pass_op: StencilOp::Keep,
    };
}

/// Fixed-function state for a group of draws. Everything except the stencil reference is baked
/// into the render pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PassState {
    pub program: Program,
    pub depth_compare: Compare,
    pub depth_write: bool,
    pub stencil: StencilState,
    pub color_write: bool,
    pub attr_write: AttrWrite,
    pub blend: Blend,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub state: PassState,
    pub prim: Primitive,
    pub w_buffering: bool,
}

impl PassState {
    #[inline]
    pub fn pipeline_key(self, prim: Primitive, w_buffering: bool) -> PipelineKey {
        let mut state = self;
        state.stencil.reference = 0;
        PipelineKey {
            state,
            prim,
            w_buffering,
        }
    }

    pub(crate) fn depth_stencil_state(self) -> wgpu::DepthStencilState {
        let face = wgpu::StencilFaceState {
            compare: self.stencil.compare.to_wgpu(),
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: self.stencil.depth_fail_op.to_wgpu(),
            pass_op: self.stencil.pass_op.to_wgpu(),
        };
        wgpu::DepthStencilState {
            format: OutputAttachments::DEPTH_FORMAT,
            depth_write_enabled: self.depth_write,
            depth_compare: self.depth_compare.to_wgpu(),
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask: self.stencil.read_mask as u32,
                write_mask: self.stencil.write_mask as u32,
            },
            bias: wgpu::DepthBiasState::default(),
        }
    }

    pub(crate) fn color_targets(self) -> [Option<wgpu::ColorTargetState>; 2] {
        [
            Some(wgpu::ColorTargetState {
                format: OutputAttachments::COLOR_FORMAT,
                blend: self.blend.to_wgpu(),
                write_mask: if self.color_write {
                    wgpu::ColorWrites::ALL
                } else {
                    wgpu::ColorWrites::empty()
                },
            }),
            Some(wgpu::ColorTargetState {
                format: OutputAttachments::ATTRS_FORMAT,
                blend: None,
                write_mask: self.attr_write.to_wgpu(),
            }),
        ]
    }
}

impl Primitive {
    pub(crate) fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Primitive::Lines => wgpu::PrimitiveTopology::LineList,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_keys_ignore_the_stencil_reference() {
        let mut state = PassState {
            program: Program::Opaque,
            depth_compare: Compare::Less,
            depth_write: true,
            stencil: StencilState {
                compare: Compare::Always,
                reference: 3,
                read_mask: 0xFF,
                write_mask: 0xFF,
                depth_fail_op: StencilOp::Keep,
                pass_op: StencilOp::Replace,
            },
            color_write: true,
            attr_write: AttrWrite::all(),
            blend: Blend::Off,
        };
        let key = state.pipeline_key(Primitive::Triangles, false);
        state.stencil.reference = 4;
        assert_eq!(key, state.pipeline_key(Primitive::Triangles, false));
        assert_ne!(key, state.pipeline_key(Primitive::Lines, false));
        assert_ne!(key, state.pipeline_key(Primitive::Triangles, true));
    }

    #[test]
    fn attr_write_masks() {
        assert_eq!(
            (AttrWrite::OPAQUE_ID | AttrWrite::FOG).to_wgpu(),
            wgpu::ColorWrites::RED | wgpu::ColorWrites::BLUE
        );
        assert_eq!(AttrWrite::empty().to_wgpu(), wgpu::ColorWrites::empty());
    }
}
