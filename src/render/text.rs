use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use kurbo::Affine;

use crate::foundation::core::Rgba8;
use crate::foundation::error::{PulseError, PulseResult};
use crate::render::raster::{affine_to_cpu, color_to_cpu};

const LAYOUT_CACHE_LIMIT: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct LayoutKey {
    text: String,
    size_bits: u32,
    color: Rgba8,
}

/// Single-line text shaping (Parley) and glyph drawing (vello_cpu) for one loaded font.
///
/// Layouts are cached by `(text, size, colour)`; scaling and opacity are applied at draw time.
pub struct TextPainter {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<Rgba8>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
    cache: HashMap<LayoutKey, Arc<parley::Layout<Rgba8>>>,
}

impl std::fmt::Debug for TextPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPainter")
            .field("family_name", &self.family_name)
            .field("cached_layouts", &self.cache.len())
            .finish()
    }
}

impl TextPainter {
    /// Register `font_bytes` (TTF/OTF) and prepare shaping contexts.
    pub fn from_font_bytes(font_bytes: Vec<u8>) -> PulseResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| PulseError::layer("text", "no font families registered from font bytes"))?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| PulseError::layer("text", "registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0);
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
            cache: HashMap::new(),
        })
    }

    /// Load and register a font file.
    pub fn from_path(path: &Path) -> PulseResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            PulseError::layer("text", format!("failed to read font '{}': {e}", path.display()))
        })?;
        Self::from_font_bytes(bytes)
    }

    /// Registered family name.
    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Shape `text` at `size_px` in `color`.
    pub fn layout(
        &mut self,
        text: &str,
        size_px: f32,
        color: Rgba8,
    ) -> PulseResult<Arc<parley::Layout<Rgba8>>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(PulseError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        let key = LayoutKey {
            text: text.to_owned(),
            size_bits: size_px.to_bits(),
            color,
        };
        if let Some(layout) = self.cache.get(&key) {
            return Ok(layout.clone());
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(color));

        let mut layout: parley::Layout<Rgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout.align(
            None,
            parley::Alignment::Start,
            parley::AlignmentOptions::default(),
        );

        if self.cache.len() >= LAYOUT_CACHE_LIMIT {
            self.cache.clear();
        }
        let layout = Arc::new(layout);
        self.cache.insert(key, layout.clone());
        Ok(layout)
    }

    /// Draw a laid-out block under `transform` (layout space has its origin at the top-left).
    pub fn draw(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        layout: &parley::Layout<Rgba8>,
        transform: Affine,
    ) {
        ctx.set_transform(affine_to_cpu(transform));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                ctx.set_paint(color_to_cpu(brush));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&self.font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }
}

/// Width and height of a layout in pixels.
pub fn layout_size(layout: &parley::Layout<Rgba8>) -> (f64, f64) {
    (f64::from(layout.width()), f64::from(layout.height()))
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
