//! # 声子图表生成
//!
//! 使用 `plotters` 绘制总态密度与能带结构，按扩展名输出 PNG 或 SVG。
//!
//! ## 依赖关系
//! - 被 `workflow/outputs.rs` 调用
//! - 使用 `models/phonon.rs`
//! - 使用 `plotters` 渲染图表

use crate::error::{PhonoflowError, Result};
use crate::models::{BandStructure, Dos};

use plotters::prelude::*;
use std::path::Path;

fn plot_err<E: std::fmt::Debug>(e: E) -> PhonoflowError {
    PhonoflowError::Other(format!("{:?}", e))
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}

/// 数据范围，两端各留 5% 余量
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(1e-3);
    (min - pad, max + pad)
}

/// 绘制总态密度
pub fn plot_dos(dos: &Dos, title: &str, output_path: &Path) -> Result<()> {
    let (width, height) = (800, 600);
    if is_svg(output_path) {
        let root = SVGBackend::new(output_path, (width, height)).into_drawing_area();
        draw_dos(&root, dos, title)?;
        root.present().map_err(plot_err)?;
    } else {
        let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
        draw_dos(&root, dos, title)?;
        root.present().map_err(plot_err)?;
    }
    Ok(())
}

fn draw_dos<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    dos: &Dos,
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_err)?;

    let (x_min, x_max) = padded_range(dos.frequencies.iter().copied());
    let (_, y_max) = padded_range(dos.total_dos.iter().copied());

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max.max(1e-3))
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Frequency (THz)")
        .y_desc("DOS")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(plot_err)?;

    let color = RGBColor(0, 102, 204);
    let points: Vec<(f64, f64)> = dos
        .frequencies
        .iter()
        .copied()
        .zip(dos.total_dos.iter().copied())
        .collect();

    chart
        .draw_series(AreaSeries::new(points.iter().copied(), 0.0, color.mix(0.2)))
        .map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(points, color.stroke_width(2)))
        .map_err(plot_err)?;

    Ok(())
}

/// 绘制能带结构
pub fn plot_band_structure(band: &BandStructure, title: &str, output_path: &Path) -> Result<()> {
    let (width, height) = (800, 600);
    if is_svg(output_path) {
        let root = SVGBackend::new(output_path, (width, height)).into_drawing_area();
        draw_bands(&root, band, title)?;
        root.present().map_err(plot_err)?;
    } else {
        let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
        draw_bands(&root, band, title)?;
        root.present().map_err(plot_err)?;
    }
    Ok(())
}

fn draw_bands<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    band: &BandStructure,
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_err)?;

    let x_max = band.distances.last().copied().unwrap_or(1.0).max(1e-6);
    let (y_min, y_max) = padded_range(band.frequencies.iter().flatten().copied());

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Wave vector")
        .y_desc("Frequency (THz)")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(plot_err)?;

    let color = RGBColor(0, 102, 204);
    for b in 0..band.num_bands() {
        let series = band
            .distances
            .iter()
            .zip(&band.frequencies)
            .filter_map(|(d, freqs)| freqs.get(b).map(|f| (*d, *f)));
        chart
            .draw_series(LineSeries::new(series, color.stroke_width(1)))
            .map_err(plot_err)?;
    }

    // 零频参考线
    if y_min < 0.0 {
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(0.0, 0.0), (x_max, 0.0)],
                BLACK.mix(0.4),
            )))
            .map_err(plot_err)?;
    }

    Ok(())
}
