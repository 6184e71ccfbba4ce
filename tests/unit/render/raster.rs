use super::*;

use kurbo::Circle;

fn render_single(path: &vello_cpu::kurbo::BezPath, transform: Affine, color: Rgba8) -> Vec<u8> {
    let mut ctx = vello_cpu::RenderContext::new(64, 64);
    fill_shape(&mut ctx, transform, path, color);
    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(64, 64);
    ctx.render_to_pixmap(&mut pixmap);
    pixmap.data_as_u8_slice().to_vec()
}

fn px(bytes: &[u8], x: usize, y: usize) -> [u8; 4] {
    let i = (y * 64 + x) * 4;
    [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]
}

#[test]
fn annulus_leaves_the_middle_empty() {
    let ring = annulus(
        &Circle::new((0.0, 0.0), 24.0),
        &Circle::new((0.0, 0.0), 12.0),
    );
    let bytes = render_single(&ring, Affine::translate((32.0, 32.0)), Rgba8::rgb(255, 0, 0));

    assert_eq!(px(&bytes, 32, 32)[3], 0);
    assert_eq!(px(&bytes, 32 + 18, 32), [255, 0, 0, 255]);
    assert_eq!(px(&bytes, 1, 1)[3], 0);
}

#[test]
fn transparent_fill_draws_nothing() {
    let disc = shape_to_cpu(&Circle::new((32.0, 32.0), 20.0));
    let bytes = render_single(&disc, Affine::IDENTITY, Rgba8::rgba(255, 255, 255, 0));
    assert!(bytes.iter().all(|&b| b == 0));
}

#[test]
fn pixmap_rejects_wrong_length() {
    assert!(pixmap_from_premul_bytes(&[0u8; 15], 2, 2).is_err());
    assert!(pixmap_from_premul_bytes(&[0u8; 16], 2, 2).is_ok());
    assert!(pixmap_from_premul_bytes(&[], 70_000, 1).is_err());
}

#[test]
fn backdrop_fades_from_centre_colour_to_black() {
    let canvas = Canvas {
        width: 100,
        height: 100,
    };
    let bytes = radial_backdrop_bytes(canvas, Rgba8::rgb(200, 100, 50));
    assert_eq!(bytes.len(), canvas.frame_len_bytes());

    let at = |x: usize, y: usize| {
        let i = (y * 100 + x) * 4;
        [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]
    };
    let mid = at(49, 49);
    assert!(mid[0] >= 195 && mid[1] >= 95 && mid[2] >= 45, "{mid:?}");
    assert_eq!(mid[3], 255);

    let corner = at(0, 0);
    assert!(corner[0] <= 4 && corner[1] <= 4 && corner[2] <= 4, "{corner:?}");
    assert_eq!(corner[3], 255);
}
