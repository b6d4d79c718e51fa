use std::path::Path;

use ab_glyph::{point, Font, FontVec, GlyphId, OutlinedGlyph, PxScale, ScaleFont};

use crate::overlay::domain::frame_annotator::{FrameAnnotator, OverlayError};
use crate::shared::constants::{OVERLAY_COLOR, OVERLAY_FONT_SIZE, OVERLAY_ORIGIN};
use crate::shared::font_resolver;
use crate::shared::frame::Frame;

/// Pixel rectangle the overlay text may touch, clamped to the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl OverlayRegion {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Rasterizes text with a TrueType/OpenType font and alpha-blends it onto
/// the frame at a fixed top-left origin. No background box is drawn.
pub struct GlyphTimestampOverlay {
    font: FontVec,
    scale: PxScale,
    origin: (u32, u32),
    color: [u8; 3],
}

impl GlyphTimestampOverlay {
    /// Locates the font (explicit path first, then user and system fonts)
    /// and loads it.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, OverlayError> {
        let path = font_resolver::resolve(explicit)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, OverlayError> {
        let bytes = font_resolver::load(path)?;
        let font = FontVec::try_from_vec(bytes).map_err(|_| OverlayError::InvalidFont {
            path: path.to_path_buf(),
        })?;
        log::debug!("Loaded overlay font {}", path.display());
        Ok(Self {
            font,
            scale: PxScale::from(OVERLAY_FONT_SIZE),
            origin: OVERLAY_ORIGIN,
            color: OVERLAY_COLOR,
        })
    }

    /// Bounding box of `text` as it would be drawn on a `width` x `height`
    /// frame, or `None` if nothing visible would be drawn.
    pub fn region(&self, text: &str, width: u32, height: u32) -> Option<OverlayRegion> {
        let glyphs = self.layout(text);
        let mut bounds = glyphs.iter().map(|g| g.px_bounds());
        let first = bounds.next()?;
        let (min_x, min_y, max_x, max_y) = bounds.fold(
            (first.min.x, first.min.y, first.max.x, first.max.y),
            |(x0, y0, x1, y1), b| {
                (
                    x0.min(b.min.x),
                    y0.min(b.min.y),
                    x1.max(b.max.x),
                    y1.max(b.max.y),
                )
            },
        );

        let x0 = (min_x.floor().max(0.0) as u32).min(width);
        let y0 = (min_y.floor().max(0.0) as u32).min(height);
        let x1 = (max_x.ceil().max(0.0) as u32).min(width);
        let y1 = (max_y.ceil().max(0.0) as u32).min(height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(OverlayRegion {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    /// Positions each character along one baseline starting at the origin.
    fn layout(&self, text: &str) -> Vec<OutlinedGlyph> {
        let scaled = self.font.as_scaled(self.scale);
        let baseline = self.origin.1 as f32 + scaled.ascent();
        let mut caret = self.origin.0 as f32;
        let mut previous: Option<GlyphId> = None;

        let mut outlined = Vec::with_capacity(text.len());
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(self.scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            previous = Some(id);

            if let Some(g) = self.font.outline_glyph(glyph) {
                outlined.push(g);
            }
        }
        outlined
    }
}

impl FrameAnnotator for GlyphTimestampOverlay {
    fn annotate(&self, frame: &Frame, text: &str) -> Result<Frame, OverlayError> {
        let (width, height) = (frame.width(), frame.height());
        let expected_len = width as usize * height as usize * 3;
        if frame.channels() != 3 || frame.data().len() != expected_len {
            return Err(OverlayError::UnsupportedFrame(frame.channels()));
        }

        let mut annotated = frame.clone();
        let mut pixels = annotated.as_ndarray_mut();
        for glyph in self.layout(text) {
            let bounds = glyph.px_bounds();
            glyph.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i64 + gx as i64;
                let y = bounds.min.y as i64 + gy as i64;
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 || coverage <= 0.0 {
                    return;
                }
                for (c, &target) in self.color.iter().enumerate() {
                    let channel = &mut pixels[[y as usize, x as usize, c]];
                    *channel = blend(*channel, target, coverage);
                }
            });
        }

        Ok(annotated)
    }
}

fn blend(base: u8, target: u8, coverage: f32) -> u8 {
    let c = coverage.clamp(0.0, 1.0);
    (base as f32 * (1.0 - c) + target as f32 * c).round() as u8
}
