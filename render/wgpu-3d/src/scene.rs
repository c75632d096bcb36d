use crate::{
    batch::{draw_single, merge_edge_run, merge_run, Draw},
    key::RenderKey,
    prepare::RendererPolygon,
    state::{AttrWrite, Blend, Compare, PassState, Program, StencilOp, StencilState},
};
use hires_core::gpu::engine_3d::RenderingState;

/// Frame-wide values that affect pass states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneParams {
    pub clear_alpha: u8,
    pub clear_poly_id: u8,
    pub fog_enabled: bool,
    pub edge_marking_enabled: bool,
    pub alpha_blending_enabled: bool,
    pub replace_active: bool,
}

impl SceneParams {
    pub fn new(state: &RenderingState, replace_active: bool) -> Self {
        SceneParams {
            clear_alpha: state.clear_attrs.alpha(),
            clear_poly_id: state.clear_attrs.poly_id(),
            fog_enabled: state.control.fog_enabled(),
            edge_marking_enabled: state.control.edge_marking_enabled(),
            alpha_blending_enabled: state.control.alpha_blending_enabled(),
            replace_active,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Command {
    SetState(PassState),
    Draw(Draw),
    /// Resets the shadow bit (bit 7) of the whole stencil buffer.
    ClearShadowBits,
}

const SHADOW_BIT: u8 = 0x80;
const TRANS_DRAWN_BIT: u8 = 0x40;

fn opaque_state(depth_test_equal: bool, id: u8, params: &SceneParams) -> PassState {
    let mut attr_write = AttrWrite::OPAQUE_ID | AttrWrite::EDGE;
    if params.fog_enabled {
        attr_write |= AttrWrite::FOG;
    }
    PassState {
        program: Program::Opaque,
        depth_compare: Compare::for_depth_test_equal(depth_test_equal),
        depth_write: true,
        stencil: StencilState {
            compare: Compare::Always,
            reference: id,
            read_mask: 0xFF,
            write_mask: 0xFF,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Replace,
        },
        color_write: true,
        attr_write,
        blend: Blend::Off,
    }
}

fn edge_flag_state() -> PassState {
    PassState {
        program: Program::EdgeFlag,
        depth_compare: Compare::Always,
        depth_write: false,
        stencil: StencilState::KEEP,
        color_write: false,
        attr_write: AttrWrite::EDGE,
        blend: Blend::Off,
    }
}

fn shadow_mask_state(stencil: StencilState) -> PassState {
    PassState {
        program: Program::ShadowMask,
        depth_compare: Compare::Less,
        depth_write: false,
        stencil,
        color_write: false,
        attr_write: AttrWrite::empty(),
        blend: Blend::Off,
    }
}

struct Translucent {
    depth_test_equal: bool,
    depth_write: bool,
    fog: bool,
}

impl Translucent {
    fn from_key(key: RenderKey) -> Option<Self> {
        match key {
            RenderKey::Translucent {
                depth_test_equal,
                depth_write,
                fog,
                ..
            } => Some(Translucent {
                depth_test_equal,
                depth_write,
                fog,
            }),
            _ => None,
        }
    }

    fn state(&self, stencil: StencilState, blend: Blend, params: &SceneParams) -> PassState {
        // Translucent pixels keep the fog flag below them only if they're fogged themselves
        let attr_write = if params.fog_enabled && !self.fog {
            AttrWrite::FOG
        } else {
            AttrWrite::empty()
        };
        PassState {
            program: Program::Translucent,
            depth_compare: Compare::for_depth_test_equal(self.depth_test_equal),
            depth_write: self.depth_write,
            stencil,
            color_write: true,
            attr_write,
            blend,
        }
    }
}

/// Builds the ordered state changes and draws for a frame's polygons.
pub struct ScenePlanner<'a> {
    polys: &'a [RendererPolygon],
    params: SceneParams,
    commands: Vec<Command>,
}

impl<'a> ScenePlanner<'a> {
    pub fn new(polys: &'a [RendererPolygon], params: SceneParams) -> Self {
        ScenePlanner {
            polys,
            params,
            commands: Vec::new(),
        }
    }

    #[inline]
    fn set_state(&mut self, state: PassState) {
        self.commands.push(Command::SetState(state));
    }

    fn batch(&mut self, i: usize) -> usize {
        let draw = merge_run(self.polys, i, self.params.replace_active);
        let len = draw.polys_len();
        self.commands.push(Command::Draw(draw));
        len
    }

    fn single(&mut self, i: usize) -> usize {
        self.commands
            .push(Command::Draw(draw_single(self.polys, i, self.params.replace_active)));
        1
    }

    fn opaque_pass(&mut self) {
        let mut i = 0;
        while i < self.polys.len() {
            let poly = &self.polys[i];
            let RenderKey::Opaque {
                depth_test_equal, ..
            } = poly.key
            else {
                i += 1;
                continue;
            };
            self.set_state(opaque_state(depth_test_equal, poly.id, &self.params));
            i += self.batch(i);
        }
    }

    fn edge_flag_pass(&mut self) {
        self.set_state(edge_flag_state());
        let mut i = 0;
        while i < self.polys.len() {
            if self.polys[i].key.is_shadow_mask() {
                i += 1;
                continue;
            }
            let draw = merge_edge_run(self.polys, i);
            i += draw.polys_len();
            self.commands.push(Command::Draw(draw));
        }
    }

    /// Draws `i` as opaque ahead of its translucent draw if it has maximum alpha.
    fn opaque_backing(&mut self, i: usize, trans: &Translucent) {
        let poly = &self.polys[i];
        if poly.key.needs_opaque() {
            self.set_state(opaque_state(trans.depth_test_equal, poly.id, &self.params));
            self.single(i);
        }
    }

    fn trans_draw(&mut self, i: usize) -> usize {
        if self.polys[i].key.needs_opaque() {
            self.single(i)
        } else {
            self.batch(i)
        }
    }

    /// Translucent pixels drawn directly over a clear plane with zero alpha, without blending.
    fn background_pass(&mut self) {
        let blend = Blend::translucent(self.params.alpha_blending_enabled);
        let mut i = 0;
        while i < self.polys.len() {
            let poly = &self.polys[i];
            if poly.key.is_shadow_mask() {
                self.set_state(shadow_mask_state(StencilState {
                    compare: Compare::Equal,
                    reference: 0xFF,
                    read_mask: 0xFF,
                    write_mask: 0x01,
                    depth_fail_op: StencilOp::Invert,
                    pass_op: StencilOp::Keep,
                }));
                i += self.batch(i);
                continue;
            }
            let Some(trans) = Translucent::from_key(poly.key) else {
                i += 1;
                continue;
            };
            let (id, is_shadow) = (poly.id, poly.key.is_shadow());

            self.opaque_backing(i, &trans);

            let drawn_mask = !(TRANS_DRAWN_BIT | id);
            if is_shadow {
                // Shadows only fall onto the clear plane if it has the same ID
                if id != self.params.clear_poly_id {
                    i += 1;
                    continue;
                }
                self.set_state(trans.state(
                    StencilState {
                        compare: Compare::Equal,
                        reference: 0xFE,
                        read_mask: 0xFF,
                        write_mask: drawn_mask,
                        depth_fail_op: StencilOp::Keep,
                        pass_op: StencilOp::Invert,
                    },
                    blend,
                    &self.params,
                ));
            } else {
                self.set_state(trans.state(
                    StencilState {
                        compare: Compare::Equal,
                        reference: 0xFF,
                        read_mask: 0xFE,
                        write_mask: drawn_mask,
                        depth_fail_op: StencilOp::Keep,
                        pass_op: StencilOp::Invert,
                    },
                    Blend::Off,
                    &self.params,
                ));
            }
            i += self.trans_draw(i);
        }
    }

    fn translucent_pass(&mut self) {
        let blend = Blend::translucent(self.params.alpha_blending_enabled);
        let mut i = 0;
        while i < self.polys.len() {
            let poly = &self.polys[i];
            if poly.key.is_shadow_mask() {
                self.commands.push(Command::ClearShadowBits);
                self.set_state(shadow_mask_state(StencilState {
                    compare: Compare::Always,
                    reference: SHADOW_BIT,
                    read_mask: SHADOW_BIT,
                    write_mask: SHADOW_BIT,
                    depth_fail_op: StencilOp::Replace,
                    pass_op: StencilOp::Keep,
                }));
                i += self.batch(i);
                continue;
            }
            let Some(trans) = Translucent::from_key(poly.key) else {
                i += 1;
                continue;
            };
            let (id, is_shadow) = (poly.id, poly.key.is_shadow());

            self.opaque_backing(i, &trans);

            if is_shadow {
                // Shadows don't fall onto pixels with their own ID
                let mut unmark = trans.state(
                    StencilState {
                        compare: Compare::Equal,
                        reference: id,
                        read_mask: 0x3F,
                        write_mask: SHADOW_BIT,
                        depth_fail_op: StencilOp::Keep,
                        pass_op: StencilOp::Zero,
                    },
                    Blend::Off,
                    &self.params,
                );
                unmark.color_write = false;
                unmark.attr_write = AttrWrite::empty();
                unmark.depth_write = false;
                self.set_state(unmark);
                self.single(i);

                self.set_state(trans.state(
                    StencilState {
                        compare: Compare::Equal,
                        reference: SHADOW_BIT | TRANS_DRAWN_BIT | id,
                        read_mask: SHADOW_BIT,
                        write_mask: 0x7F,
                        depth_fail_op: StencilOp::Keep,
                        pass_op: StencilOp::Replace,
                    },
                    blend,
                    &self.params,
                ));
                i += self.single(i);
            } else {
                self.set_state(trans.state(
                    StencilState {
                        compare: Compare::NotEqual,
                        reference: TRANS_DRAWN_BIT | id,
                        read_mask: 0x7F,
                        write_mask: 0x7F,
                        depth_fail_op: StencilOp::Keep,
                        pass_op: StencilOp::Replace,
                    },
                    blend,
                    &self.params,
                ));
                i += self.trans_draw(i);
            }
        }
    }

    /// Produces the full command list: the opaque pass, the optional edge flag pass, and the
    /// translucent passes if any polygon needs them.
    pub fn plan(mut self) -> Vec<Command> {
        self.opaque_pass();
        if self.params.edge_marking_enabled {
            self.edge_flag_pass();
        }
        let has_translucent = self
            .polys
            .iter()
            .any(|poly| poly.key.is_translucent() || poly.key.is_shadow_mask());
        if has_translucent {
            if self.params.clear_alpha == 0 {
                self.background_pass();
            }
            self.translucent_pass();
        }
        self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        prepare::{
            tests::{poly, screen_vert},
            PolygonPreparer,
        },
        RenderSettings,
    };
    use hires_core::gpu::engine_3d::{Polygon, PolygonAttrs};

    /// A polygon together with the fragment it produces at the simulated pixel, if it covers it.
    struct SimPoly {
        poly: Polygon,
        fragment: Option<Fragment>,
    }

    #[derive(Clone, Copy)]
    struct Fragment {
        depth: f32,
        color: [f32; 3],
        /// Final 5-bit fragment alpha, after texturing.
        alpha: u8,
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Pixel {
        color: [f32; 4],
        depth: f32,
        stencil: u8,
    }

    const CLEAR: Pixel = Pixel {
        color: [0.0; 4],
        depth: 1.0,
        stencil: 0xFF,
    };

    fn test_u8(compare: Compare, a: u8, b: u8) -> bool {
        match compare {
            Compare::Less => a < b,
            Compare::LessEqual => a <= b,
            Compare::Equal => a == b,
            Compare::NotEqual => a != b,
            Compare::Always => true,
        }
    }

    fn test_f32(compare: Compare, a: f32, b: f32) -> bool {
        match compare {
            Compare::Less => a < b,
            Compare::LessEqual => a <= b,
            Compare::Equal => a == b,
            Compare::NotEqual => a != b,
            Compare::Always => true,
        }
    }

    fn apply_stencil(op: StencilOp, stencil: &StencilState, value: &mut u8) {
        let new = match op {
            StencilOp::Keep => return,
            StencilOp::Zero => 0,
            StencilOp::Replace => stencil.reference,
            StencilOp::Invert => !*value,
        };
        *value = (*value & !stencil.write_mask) | (new & stencil.write_mask);
    }

    fn discards(program: Program, alpha: u8) -> bool {
        match program {
            Program::Opaque => alpha < 31,
            Program::Translucent => alpha == 0 || alpha == 31,
            Program::ShadowMask | Program::EdgeFlag => false,
        }
    }

    fn shade(pixel: &mut Pixel, state: &PassState, fragment: Fragment) {
        let src_alpha = fragment.alpha as f32 / 31.0;
        for (dst, src) in pixel.color[..3].iter_mut().zip(fragment.color) {
            *dst = match state.blend {
                Blend::Off | Blend::Replace => src,
                Blend::Alpha => src * src_alpha + *dst * (1.0 - src_alpha),
            };
        }
        pixel.color[3] = match state.blend {
            Blend::Off => src_alpha,
            Blend::Replace | Blend::Alpha => pixel.color[3].max(src_alpha),
        };
    }

    fn simulate(commands: &[Command], fragments: &[Option<Fragment>], pixel: &mut Pixel) {
        let mut state = None;
        for command in commands {
            match command {
                Command::SetState(new_state) => state = Some(*new_state),
                Command::ClearShadowBits => pixel.stencil &= !SHADOW_BIT,
                Command::Draw(draw) => {
                    let state: &PassState = state.as_ref().unwrap();
                    if draw.edges {
                        continue;
                    }
                    for fragment in draw.polys.clone().filter_map(|i| fragments[i]) {
                        if discards(state.program, fragment.alpha) {
                            continue;
                        }
                        let stencil = &state.stencil;
                        if !test_u8(
                            stencil.compare,
                            stencil.reference & stencil.read_mask,
                            pixel.stencil & stencil.read_mask,
                        ) {
                            continue;
                        }
                        if !test_f32(state.depth_compare, fragment.depth, pixel.depth) {
                            apply_stencil(stencil.depth_fail_op, stencil, &mut pixel.stencil);
                            continue;
                        }
                        apply_stencil(stencil.pass_op, stencil, &mut pixel.stencil);
                        if state.depth_write {
                            pixel.depth = fragment.depth;
                        }
                        if state.color_write {
                            shade(pixel, state, fragment);
                        }
                    }
                }
            }
        }
    }

    fn run(sim_polys: &[SimPoly], params: SceneParams, split_batches: bool) -> (Pixel, usize) {
        let verts = [screen_vert(0, 0), screen_vert(8, 0), screen_vert(8, 8)];
        let polys: Vec<Polygon> = sim_polys.iter().map(|sim| sim.poly).collect();
        let mut preparer = PolygonPreparer::new();
        preparer.prepare(&verts, &polys, false, &RenderSettings::default(), |_| None);
        let fragments: Vec<_> = sim_polys.iter().map(|sim| sim.fragment).collect();

        let mut commands = ScenePlanner::new(&preparer.polys, params).plan();
        if split_batches {
            commands = commands
                .into_iter()
                .flat_map(|command| match command {
                    Command::Draw(draw) if !draw.edges => draw
                        .polys
                        .clone()
                        .map(|i| Command::Draw(draw_single(&preparer.polys, i, false)))
                        .collect(),
                    command => vec![command],
                })
                .collect();
        }
        let drawn_indices = commands
            .iter()
            .map(|command| match command {
                Command::Draw(draw) if !draw.edges => draw.indices_len() as usize,
                _ => 0,
            })
            .sum();

        let mut pixel = CLEAR;
        simulate(&commands, &fragments, &mut pixel);
        (pixel, drawn_indices)
    }

    fn params(clear_alpha: u8) -> SceneParams {
        SceneParams {
            clear_alpha,
            clear_poly_id: 0,
            fog_enabled: false,
            edge_marking_enabled: false,
            alpha_blending_enabled: true,
            replace_active: false,
        }
    }

    fn opaque(id: u8, depth: f32, color: [f32; 3]) -> SimPoly {
        SimPoly {
            poly: poly(0, 3, PolygonAttrs(0).with_alpha(31).with_id(id)),
            fragment: Some(Fragment {
                depth,
                color,
                alpha: 31,
            }),
        }
    }

    fn translucent(attrs: PolygonAttrs, depth: f32, color: [f32; 3], alpha: u8) -> SimPoly {
        SimPoly {
            poly: Polygon {
                is_translucent: true,
                ..poly(0, 3, attrs)
            },
            fragment: Some(Fragment {
                depth,
                color,
                alpha,
            }),
        }
    }

    fn shadow_mask(depth: f32) -> SimPoly {
        translucent(
            PolygonAttrs(0)
                .with_alpha(16)
                .with_mode(PolygonAttrs::MODE_SHADOW),
            depth,
            [0.0; 3],
            16,
        )
    }

    fn shadow(id: u8, depth: f32) -> SimPoly {
        translucent(
            PolygonAttrs(0)
                .with_alpha(16)
                .with_id(id)
                .with_mode(PolygonAttrs::MODE_SHADOW),
            depth,
            [0.0; 3],
            16,
        )
    }

    fn approx_eq(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b).all(|(a, b)| (a - b).abs() < 1e-5)
    }

    fn blend(dst: [f32; 3], src: [f32; 3], alpha: u8) -> [f32; 3] {
        let a = alpha as f32 / 31.0;
        [0, 1, 2].map(|i| src[i] * a + dst[i] * (1.0 - a))
    }

    #[test]
    fn opaque_only_frames_skip_translucent_passes() {
        let polys = [opaque(1, 0.5, [1.0, 0.0, 0.0]), opaque(1, 0.4, [0.0, 1.0, 0.0])];
        let verts = [screen_vert(0, 0), screen_vert(8, 0), screen_vert(8, 8)];
        let mut preparer = PolygonPreparer::new();
        let raw: Vec<_> = polys.iter().map(|sim| sim.poly).collect();
        preparer.prepare(&verts, &raw, false, &RenderSettings::default(), |_| None);
        let commands = ScenePlanner::new(&preparer.polys, params(0)).plan();

        assert_eq!(commands.len(), 2);
        assert!(matches!(
            &commands[0],
            Command::SetState(state) if state.program == Program::Opaque
                && state.stencil.reference == 1
                && state.depth_compare == Compare::Less
        ));
        assert!(matches!(&commands[1], Command::Draw(draw) if draw.polys == (0..2)));

        let (pixel, _) = run(&polys, params(0), false);
        assert_eq!(pixel.color, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(pixel.stencil, 1);
    }

    #[test]
    fn translucent_ids_composite_once_per_pixel() {
        let orange = [1.0, 0.5, 0.0];
        let blue = [0.0, 0.0, 1.0];
        let attrs = PolygonAttrs(0).with_alpha(31).with_id(3);
        let polys = [
            opaque(3, 0.8, orange),
            translucent(attrs, 0.5, blue, 16),
            translucent(attrs, 0.4, blue, 16),
        ];
        let (pixel, _) = run(&polys, params(0), false);

        let expected = blend(orange, blue, 16);
        assert!(approx_eq(
            pixel.color,
            [expected[0], expected[1], expected[2], 1.0]
        ));
        assert_eq!(pixel.depth, 0.8);
        assert_eq!(pixel.stencil & 0x7F, 0x43);
    }

    #[test]
    fn needs_opaque_translucent_polygons_are_backed_by_an_opaque_draw() {
        let red = [1.0, 0.0, 0.0];
        let polys = [
            opaque(3, 0.8, [0.0, 1.0, 0.0]),
            translucent(PolygonAttrs(0).with_alpha(31).with_id(3), 0.5, red, 31),
        ];
        let (pixel, _) = run(&polys, params(31), false);
        assert_eq!(pixel.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(pixel.depth, 0.5);
        assert_eq!(pixel.stencil, 3);
    }

    #[test]
    fn different_translucent_ids_layer() {
        let white = [1.0; 3];
        let red = [1.0, 0.0, 0.0];
        let green = [0.0, 1.0, 0.0];
        let polys = [
            opaque(1, 0.8, white),
            translucent(PolygonAttrs(0).with_alpha(10).with_id(3), 0.5, red, 10),
            translucent(PolygonAttrs(0).with_alpha(10).with_id(4), 0.4, green, 10),
        ];
        let (pixel, _) = run(&polys, params(31), false);
        let expected = blend(blend(white, red, 10), green, 10);
        assert!(approx_eq(
            pixel.color,
            [expected[0], expected[1], expected[2], 1.0]
        ));
        assert_eq!(pixel.stencil & 0x7F, 0x44);
    }

    #[test]
    fn translucent_depth_writes_follow_the_polygon_attribute() {
        let attrs = PolygonAttrs(0).with_alpha(10).with_id(3);
        let (pixel, _) = run(
            &[opaque(1, 0.8, [1.0; 3]), translucent(attrs, 0.5, [0.0; 3], 10)],
            params(31),
            false,
        );
        assert_eq!(pixel.depth, 0.8);

        let (pixel, _) = run(
            &[
                opaque(1, 0.8, [1.0; 3]),
                translucent(attrs.with_update_depth_for_translucent(true), 0.5, [0.0; 3], 10),
            ],
            params(31),
            false,
        );
        assert_eq!(pixel.depth, 0.5);
    }

    #[test]
    fn translucent_pixels_over_transparent_clear_plane_are_drawn_unblended() {
        let blue = [0.0, 0.0, 1.0];
        let attrs = PolygonAttrs(0).with_alpha(16).with_id(3);
        let polys = [
            translucent(attrs, 0.5, blue, 16),
            translucent(attrs, 0.4, [1.0; 3], 16),
        ];
        let (pixel, _) = run(&polys, params(0), false);
        assert!(approx_eq(pixel.color, [0.0, 0.0, 1.0, 16.0 / 31.0]));
        assert_eq!(pixel.stencil & 0x7F, 0x43);
    }

    #[test]
    fn shadows_fall_where_the_mask_fails_the_depth_test() {
        let white = [1.0; 3];
        let polys = [opaque(1, 0.5, white), shadow_mask(0.7), shadow(2, 0.4)];
        let (pixel, _) = run(&polys, params(31), false);
        let expected = blend(white, [0.0; 3], 16);
        assert!(approx_eq(
            pixel.color,
            [expected[0], expected[1], expected[2], 1.0]
        ));

        // In front of the opaque polygon, the mask doesn't mark the pixel
        let polys = [opaque(1, 0.5, white), shadow_mask(0.3), shadow(2, 0.2)];
        let (pixel, _) = run(&polys, params(31), false);
        assert_eq!(pixel.color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn shadows_dont_fall_onto_their_own_id() {
        let white = [1.0; 3];
        let polys = [opaque(2, 0.5, white), shadow_mask(0.7), shadow(2, 0.4)];
        let (pixel, _) = run(&polys, params(31), false);
        assert_eq!(pixel.color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn shadows_on_transparent_clear_plane_need_a_matching_id() {
        let plan_has_shadow_draw = |clear_poly_id| {
            let polys = [shadow_mask(0.7), shadow(2, 0.4)];
            let verts = [screen_vert(0, 0), screen_vert(8, 0), screen_vert(8, 8)];
            let raw: Vec<_> = polys.iter().map(|sim| sim.poly).collect();
            let mut preparer = PolygonPreparer::new();
            preparer.prepare(&verts, &raw, false, &RenderSettings::default(), |_| None);
            let commands = ScenePlanner::new(
                &preparer.polys,
                SceneParams {
                    clear_poly_id,
                    ..params(0)
                },
            )
            .plan();
            commands.iter().any(|command| {
                matches!(
                    command,
                    Command::SetState(state) if state.stencil.reference == 0xFE
                )
            })
        };
        assert!(plan_has_shadow_draw(2));
        assert!(!plan_has_shadow_draw(5));
    }

    #[test]
    fn batching_doesnt_change_the_result() {
        let attrs = PolygonAttrs(0).with_alpha(12).with_id(6);
        let polys = [
            opaque(1, 0.9, [0.2, 0.4, 0.6]),
            opaque(1, 0.7, [0.8, 0.4, 0.2]),
            translucent(attrs, 0.6, [1.0, 0.0, 0.0], 12),
            translucent(attrs, 0.5, [0.0, 1.0, 0.0], 12),
            translucent(attrs.with_id(7), 0.4, [0.0, 0.0, 1.0], 12),
            SimPoly {
                fragment: None,
                ..translucent(attrs.with_id(7), 0.3, [0.0; 3], 12)
            },
        ];
        for clear_alpha in [0, 31] {
            let (merged, merged_indices) = run(&polys, params(clear_alpha), false);
            let (split, split_indices) = run(&polys, params(clear_alpha), true);
            assert_eq!(merged, split);
            assert_eq!(merged_indices, split_indices);
        }
    }

    #[test]
    fn edge_flags_are_drawn_after_the_opaque_pass() {
        let polys = [opaque(1, 0.5, [1.0; 3]), shadow_mask(0.7), opaque(2, 0.5, [1.0; 3])];
        let verts = [screen_vert(0, 0), screen_vert(8, 0), screen_vert(8, 8)];
        let raw: Vec<_> = polys.iter().map(|sim| sim.poly).collect();
        let mut preparer = PolygonPreparer::new();
        preparer.prepare(&verts, &raw, false, &RenderSettings::default(), |_| None);
        let commands = ScenePlanner::new(
            &preparer.polys,
            SceneParams {
                edge_marking_enabled: true,
                ..params(31)
            },
        )
        .plan();

        let edge_state = commands
            .iter()
            .position(|command| {
                matches!(command, Command::SetState(state) if state.program == Program::EdgeFlag)
            })
            .unwrap();
        let edge_draws: Vec<_> = commands[edge_state..]
            .iter()
            .filter_map(|command| match command {
                Command::Draw(draw) if draw.edges => Some(draw.polys.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(edge_draws, [0..1, 2..3]);
        assert!(commands[..edge_state]
            .iter()
            .all(|command| !matches!(command, Command::Draw(draw) if draw.edges)));
    }
}
