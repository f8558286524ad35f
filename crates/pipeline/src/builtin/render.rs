//! PNG slide rendering.
//!
//! Slides are laid out as blocks: a title band, one marker and text bar
//! per bullet, and the optional side panel. Spoken text reaches viewers
//! through the narration and the WebVTT captions. Pixel work runs on the
//! blocking pool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{imageops, Rgb, RgbImage};

use crate::collaborators::{ImageAsset, JobContext, SlideLayout, SlideRenderer, SlideSpec};
use crate::error::StageError;

pub const SLIDE_WIDTH: u32 = 1280;
pub const SLIDE_HEIGHT: u32 = 720;

const BACKGROUND: Rgb<u8> = Rgb([246, 247, 250]);
const TITLE_BAND: Rgb<u8> = Rgb([32, 45, 74]);
const TITLE_TEXT: Rgb<u8> = Rgb([235, 239, 247]);
const BULLET_MARK: Rgb<u8> = Rgb([236, 112, 64]);
const BULLET_TEXT: Rgb<u8> = Rgb([92, 102, 122]);

const MARGIN: u32 = 60;
const TITLE_BAND_HEIGHT: u32 = 120;
const PANEL_SIZE: u32 = 440;
/// Pixels of bar per character of text.
const CHAR_WIDTH: u32 = 14;

/// Fill an axis-aligned rectangle, clipped to the image bounds.
pub(crate) fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = x.saturating_add(w).min(img.width());
    let y_end = y.saturating_add(h).min(img.height());
    for py in y.min(y_end)..y_end {
        for px in x.min(x_end)..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

/// Encode `img` as PNG at `path` on the blocking pool.
pub(crate) async fn save_png(img: RgbImage, path: PathBuf) -> Result<(), StageError> {
    tokio::task::spawn_blocking(move || img.save(&path))
        .await
        .map_err(|e| StageError::Panicked(e.to_string()))??;
    Ok(())
}

fn text_bar_width(text: &str, max: u32) -> u32 {
    let chars = text.chars().count().max(1) as u32;
    chars.saturating_mul(CHAR_WIDTH).min(max)
}

/// Draw a slide onto a fresh canvas. `panel` is composited on the left
/// for [`SlideLayout::LeftImageRightText`].
pub fn draw_slide(slide: &SlideSpec, panel: Option<&RgbImage>) -> RgbImage {
    let mut img = RgbImage::from_pixel(SLIDE_WIDTH, SLIDE_HEIGHT, BACKGROUND);

    fill_rect(&mut img, 0, 0, SLIDE_WIDTH, TITLE_BAND_HEIGHT, TITLE_BAND);
    let title_max = SLIDE_WIDTH - 2 * MARGIN;
    fill_rect(
        &mut img,
        MARGIN,
        TITLE_BAND_HEIGHT / 2 - 14,
        text_bar_width(&slide.title, title_max),
        28,
        TITLE_TEXT,
    );

    let mut text_left = MARGIN;
    if let (SlideLayout::LeftImageRightText, Some(panel)) = (slide.layout, panel) {
        let scaled = imageops::resize(panel, PANEL_SIZE, PANEL_SIZE, imageops::FilterType::Triangle);
        imageops::overlay(&mut img, &scaled, i64::from(MARGIN), i64::from(TITLE_BAND_HEIGHT + 60));
        text_left = MARGIN + PANEL_SIZE + MARGIN;
    }

    let text_max = SLIDE_WIDTH - text_left - MARGIN - 40;
    let mut y = TITLE_BAND_HEIGHT + 80;
    for bullet in &slide.bullets {
        if y + 40 > SLIDE_HEIGHT - MARGIN {
            break;
        }
        fill_rect(&mut img, text_left, y + 6, 16, 16, BULLET_MARK);
        fill_rect(&mut img, text_left + 40, y, text_bar_width(bullet, text_max), 28, BULLET_TEXT);
        y += 70;
    }

    img
}

/// Renders slides as 1280x720 PNG files under the job's `slides/` dir.
#[derive(Debug, Default)]
pub struct PngSlideRenderer;

async fn load_panel(path: &Path) -> Result<RgbImage, StageError> {
    let path = path.to_path_buf();
    let panel = tokio::task::spawn_blocking(move || image::open(path))
        .await
        .map_err(|e| StageError::Panicked(e.to_string()))??;
    Ok(panel.to_rgb8())
}

#[async_trait]
impl SlideRenderer for PngSlideRenderer {
    async fn render(
        &self,
        ctx: &JobContext,
        slide: &SlideSpec,
        panel: Option<&ImageAsset>,
    ) -> Result<ImageAsset, StageError> {
        let dir = ctx.slides_dir();
        ctx.ensure_dir(&dir).await?;

        let panel = match panel {
            Some(asset) => Some(load_panel(&asset.path).await?),
            None => None,
        };

        let path = dir.join(format!("slide_{:02}.png", slide.index));
        let slide = slide.clone();
        let img = tokio::task::spawn_blocking(move || draw_slide(&slide, panel.as_ref()))
            .await
            .map_err(|e| StageError::Panicked(e.to_string()))?;

        save_png(img, path.clone()).await?;
        Ok(ImageAsset {
            path,
            width: SLIDE_WIDTH,
            height: SLIDE_HEIGHT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(layout: SlideLayout) -> SlideSpec {
        SlideSpec {
            index: 3,
            title: "Attention Is All You Need: Results".into(),
            bullets: vec!["Main Result".into(), "Ablations".into()],
            chart: None,
            layout,
            narration: String::new(),
        }
    }

    #[test]
    fn draws_title_band_and_bullets() {
        let img = draw_slide(&slide(SlideLayout::TextBullets), None);
        assert_eq!(img.dimensions(), (SLIDE_WIDTH, SLIDE_HEIGHT));
        assert_eq!(*img.get_pixel(5, 5), TITLE_BAND);
        assert_eq!(*img.get_pixel(MARGIN + 2, TITLE_BAND_HEIGHT / 2), TITLE_TEXT);
        assert_eq!(*img.get_pixel(MARGIN + 4, TITLE_BAND_HEIGHT + 90), BULLET_MARK);
        assert_eq!(*img.get_pixel(SLIDE_WIDTH - 5, SLIDE_HEIGHT - 5), BACKGROUND);
    }

    #[test]
    fn panel_shifts_text_right() {
        let panel = RgbImage::from_pixel(100, 100, Rgb([10, 200, 10]));
        let img = draw_slide(&slide(SlideLayout::LeftImageRightText), Some(&panel));
        assert_eq!(
            *img.get_pixel(MARGIN + 10, TITLE_BAND_HEIGHT + 70),
            Rgb([10, 200, 10])
        );
        let text_left = MARGIN + PANEL_SIZE + MARGIN;
        assert_eq!(*img.get_pixel(text_left + 4, TITLE_BAND_HEIGHT + 90), BULLET_MARK);
    }

    #[test]
    fn fill_rect_clips_to_bounds() {
        let mut img = RgbImage::new(10, 10);
        fill_rect(&mut img, 8, 8, 50, 50, Rgb([1, 2, 3]));
        assert_eq!(*img.get_pixel(9, 9), Rgb([1, 2, 3]));
        fill_rect(&mut img, 20, 20, 5, 5, Rgb([9, 9, 9]));
    }

    #[tokio::test]
    async fn renders_png_into_job_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = JobContext::new(
            slidecast_core::types::JobId::new(),
            tmp.path(),
            tokio_util::sync::CancellationToken::new(),
        );
        let asset = PngSlideRenderer
            .render(&ctx, &slide(SlideLayout::TextBullets), None)
            .await
            .unwrap();
        assert!(asset.path.ends_with("slides/slide_03.png"));
        let decoded = image::open(&asset.path).unwrap();
        assert_eq!(decoded.width(), SLIDE_WIDTH);
    }
}
