use crate::models::config::PreviewConfig;
use crate::models::detection::{Candidate, Point};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use std::path::Path;
use tracing::debug;

const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Loads an image, outlines candidate regions and shrinks it for display
pub struct PreviewRenderer {
    config: PreviewConfig,
}

impl PreviewRenderer {
    pub fn new(config: PreviewConfig) -> Self {
        Self { config }
    }

    /// Load `image_id` from disk and render its preview
    pub fn render_file(&self, image_id: &str, candidates: &[Candidate]) -> Result<DynamicImage, String> {
        let image = image::open(image_id).map_err(|e| format!("Failed to load image '{}': {}", image_id, e))?;
        Ok(self.render(image, candidates))
    }

    /// Outline every candidate region, then fit into the configured bounds.
    /// Outlines are drawn at full resolution so they scale with the image.
    pub fn render(&self, image: DynamicImage, candidates: &[Candidate]) -> DynamicImage {
        let mut canvas = image.to_rgba8();

        if self.config.highlight_regions {
            for candidate in candidates {
                if let Some(region) = &candidate.region {
                    draw_polygon_outline(&mut canvas, region, HIGHLIGHT);
                }
            }
        }

        let rendered = DynamicImage::ImageRgba8(canvas);
        if rendered.width() <= self.config.max_width && rendered.height() <= self.config.max_height {
            return rendered;
        }
        rendered.thumbnail(self.config.max_width, self.config.max_height)
    }

    /// Render and write the preview as PNG
    pub fn save(&self, image_id: &str, candidates: &[Candidate], output: &Path) -> Result<(), String> {
        let preview = self.render_file(image_id, candidates)?;
        preview
            .save_with_format(output, image::ImageFormat::Png)
            .map_err(|e| format!("Failed to write preview {}: {}", output.display(), e))?;
        debug!(image_id, output = %output.display(), "Preview written");
        Ok(())
    }
}

/// Draw a closed polygon; fewer than two points draws nothing
fn draw_polygon_outline(canvas: &mut RgbaImage, polygon: &[Point], color: Rgba<u8>) {
    if polygon.len() < 2 {
        return;
    }
    for (i, start) in polygon.iter().enumerate() {
        let end = &polygon[(i + 1) % polygon.len()];
        draw_line_segment_mut(
            canvas,
            (start.x as f32, start.y as f32),
            (end.x as f32, end.y as f32),
            color,
        );
    }
}
