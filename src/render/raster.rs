use std::sync::Arc;

use kurbo::{Affine, BezPath, PathEl, Shape};

use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{PulseError, PulseResult};

/// Flattening tolerance for curved shapes, in pixels.
pub(crate) const PATH_TOLERANCE: f64 = 0.1;

pub(crate) fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

pub(crate) fn color_to_cpu(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

pub(crate) fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

pub(crate) fn shape_to_cpu(shape: &impl Shape) -> vello_cpu::kurbo::BezPath {
    bezpath_to_cpu(&shape.path_elements(PATH_TOLERANCE).collect())
}

/// Region between two shapes centred on the origin, filled with the non-zero rule.
///
/// The inner outline is mirrored about the y axis, which reverses its winding without moving it
/// (both shapes must be symmetric about that axis).
pub(crate) fn annulus(outer: &impl Shape, inner: &impl Shape) -> vello_cpu::kurbo::BezPath {
    let mut path: BezPath = outer.path_elements(PATH_TOLERANCE).collect();
    let mut hole: BezPath = inner.path_elements(PATH_TOLERANCE).collect();
    hole.apply_affine(Affine::FLIP_X);
    for &el in hole.elements() {
        path.push(el);
    }
    bezpath_to_cpu(&path)
}

/// Fill `path` with a straight-alpha colour under `transform`.
pub(crate) fn fill_shape(
    ctx: &mut vello_cpu::RenderContext,
    transform: Affine,
    path: &vello_cpu::kurbo::BezPath,
    color: Rgba8,
) {
    if color.a == 0 {
        return;
    }
    ctx.set_transform(affine_to_cpu(transform));
    ctx.set_paint(color_to_cpu(color));
    ctx.fill_path(path);
}

pub(crate) fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> PulseResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| PulseError::validation("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| PulseError::validation("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(PulseError::validation("pixmap byte len mismatch"));
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect::<Vec<_>>();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

pub(crate) fn rgba_premul_to_image(
    bytes_premul: &[u8],
    width: u32,
    height: u32,
) -> PulseResult<vello_cpu::Image> {
    let pixmap = pixmap_from_premul_bytes(bytes_premul, width, height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

/// Premultiplied radial gradient: `center` at the canvas centre fading to opaque black at the
/// farthest corner.
pub(crate) fn radial_backdrop_bytes(canvas: Canvas, center: Rgba8) -> Vec<u8> {
    let w = canvas.width as usize;
    let h = canvas.height as usize;
    let mut bytes = vec![0u8; canvas.frame_len_bytes()];
    let c = canvas.center();
    let max_d = (c.x * c.x + c.y * c.y).sqrt().max(f64::EPSILON);
    let black = Rgba8::rgb(0, 0, 0);
    let inner = Rgba8 { a: 255, ..center };

    for y in 0..h {
        let dy = (y as f64 + 0.5) - c.y;
        for x in 0..w {
            let dx = (x as f64 + 0.5) - c.x;
            let t = (dx * dx + dy * dy).sqrt() / max_d;
            let px = inner.lerp(black, t).to_premul().to_array();
            let idx = (y * w + x) * 4;
            bytes[idx..idx + 4].copy_from_slice(&px);
        }
    }
    bytes
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
