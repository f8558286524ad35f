//! Side panels for slides that carry a chart.

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use super::render::{fill_rect, save_png};
use crate::collaborators::{AssetGenerator, Chart, ImageAsset, JobContext, SlideLayout, SlideSpec};
use crate::error::StageError;

pub const PANEL_SIZE: u32 = 480;

const PANEL_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const BAR_COLORS: [Rgb<u8>; 4] = [
    Rgb([66, 133, 244]),
    Rgb([236, 112, 64]),
    Rgb([52, 168, 83]),
    Rgb([251, 188, 5]),
];

/// Draws a bar chart panel for slides with a left-hand panel.
#[derive(Debug, Default)]
pub struct PanelAssetGenerator;

/// Bar chart of `chart.values`, scaled to the largest value.
pub fn draw_bar_chart(chart: &Chart) -> RgbImage {
    let mut img = RgbImage::from_pixel(PANEL_SIZE, PANEL_SIZE, PANEL_BACKGROUND);
    let margin = 40;
    let plot_height = PANEL_SIZE - 2 * margin;
    let baseline = PANEL_SIZE - margin;

    fill_rect(&mut img, margin, margin, 2, plot_height, AXIS);
    fill_rect(&mut img, margin, baseline, PANEL_SIZE - 2 * margin, 2, AXIS);

    let values: Vec<f64> = chart
        .values
        .iter()
        .map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 })
        .collect();
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if values.is_empty() || max <= 0.0 {
        return img;
    }

    let slot = (PANEL_SIZE - 2 * margin) / values.len() as u32;
    let bar_width = (slot * 2 / 3).max(1);
    for (i, value) in values.iter().enumerate() {
        let height = ((value / max) * f64::from(plot_height - 10)).round() as u32;
        let x = margin + 8 + slot * i as u32;
        fill_rect(
            &mut img,
            x,
            baseline - height,
            bar_width,
            height,
            BAR_COLORS[i % BAR_COLORS.len()],
        );
    }
    img
}

#[async_trait]
impl AssetGenerator for PanelAssetGenerator {
    async fn generate(
        &self,
        ctx: &JobContext,
        slide: &SlideSpec,
    ) -> Result<Option<ImageAsset>, StageError> {
        if slide.layout != SlideLayout::LeftImageRightText {
            return Ok(None);
        }
        let Some(chart) = &slide.chart else {
            return Ok(None);
        };

        let dir = ctx.assets_dir();
        ctx.ensure_dir(&dir).await?;
        let path = dir.join(format!("panel_{:02}.png", slide.index));

        let chart = chart.clone();
        let img = tokio::task::spawn_blocking(move || draw_bar_chart(&chart))
            .await
            .map_err(|e| StageError::Panicked(e.to_string()))?;
        save_png(img, path.clone()).await?;

        Ok(Some(ImageAsset {
            path,
            width: PANEL_SIZE,
            height: PANEL_SIZE,
        }))
    }
}
