//! # 图表生成
//!
//! 使用 `plotters` 绘制态密度、能带与热力学曲线，支持 PNG 和 SVG 输出。
//!
//! ## 依赖关系
//! - 被 `commands/post.rs` 调用
//! - 使用 `dos/`, `analysis/` 的结果结构

use crate::analysis::{BandStructure, ThermalProperties};
use crate::dos::DensityOfStates;
use crate::error::{PhononError, Result};

use plotters::prelude::*;
use std::path::Path;

/// 图片选项
#[derive(Debug, Clone, Copy)]
pub struct PlotOptions {
    pub width: u32,
    pub height: u32,
    pub use_svg: bool,
    /// 频率轴范围 (THz)，None 时按数据自动取
    pub frequency_limit: Option<(f64, f64)>,
}

impl Default for PlotOptions {
    fn default() -> Self {
        PlotOptions {
            width: 1300,
            height: 900,
            use_svg: false,
            frequency_limit: None,
        }
    }
}

impl PlotOptions {
    pub fn extension(&self) -> &'static str {
        if self.use_svg {
            "svg"
        } else {
            "png"
        }
    }
}

fn plot_error<E: std::fmt::Debug>(e: E) -> PhononError {
    PhononError::Other(format!("{:?}", e))
}

const LINE_COLOR: RGBColor = RGBColor(255, 127, 14);

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo.is_finite() && hi.is_finite() {
        (lo.floor() - 1.0, hi.ceil() + 1.0)
    } else {
        (0.0, 1.0)
    }
}

// ─────────────────────────────────────────────────────────────
// 态密度
// ─────────────────────────────────────────────────────────────

pub fn plot_dos(dos: &DensityOfStates, path: &Path, options: PlotOptions) -> Result<()> {
    if options.use_svg {
        let root = SVGBackend::new(path, (options.width, options.height)).into_drawing_area();
        draw_dos(&root, dos, options.frequency_limit)?;
        root.present().map_err(plot_error)?;
    } else {
        let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
        draw_dos(&root, dos, options.frequency_limit)?;
        root.present().map_err(plot_error)?;
    }
    Ok(())
}

fn draw_dos<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    dos: &DensityOfStates,
    limit: Option<(f64, f64)>,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_error)?;

    let (x_min, x_max) = limit.unwrap_or_else(|| padded_range(dos.frequencies.iter().copied()));
    let y_max = dos.tdos.iter().copied().fold(0.0, f64::max).max(1e-12) * 1.1;

    let mut chart = ChartBuilder::on(root)
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Frequency (THz)")
        .y_desc("DOS (a.u.)")
        .y_labels(0)
        .x_label_style(("sans-serif", 20))
        .axis_desc_style(("sans-serif", 24))
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(LineSeries::new(
            dos.frequencies.iter().copied().zip(dos.tdos.iter().copied()),
            LINE_COLOR.stroke_width(3),
        ))
        .map_err(plot_error)?
        .label("total dos")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], LINE_COLOR.stroke_width(3)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────
// 能带
// ─────────────────────────────────────────────────────────────

/// `labels` 依次标在高对称点上，数目不足时只标前几个
pub fn plot_band(
    band: &BandStructure,
    labels: &[String],
    path: &Path,
    options: PlotOptions,
) -> Result<()> {
    if options.use_svg {
        let root = SVGBackend::new(path, (options.width, options.height)).into_drawing_area();
        draw_band(&root, band, labels, options.frequency_limit)?;
        root.present().map_err(plot_error)?;
    } else {
        let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
        draw_band(&root, band, labels, options.frequency_limit)?;
        root.present().map_err(plot_error)?;
    }
    Ok(())
}

fn draw_band<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    band: &BandStructure,
    labels: &[String],
    limit: Option<(f64, f64)>,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_error)?;

    let x_max = band.path_length.last().copied().unwrap_or(1.0).max(1e-12);
    let (y_min, y_max) =
        limit.unwrap_or_else(|| padded_range(band.frequencies.iter().flatten().copied()));

    let mut chart = ChartBuilder::on(root)
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .y_desc("Frequency (THz)")
        .y_label_style(("sans-serif", 20))
        .axis_desc_style(("sans-serif", 24))
        .draw()
        .map_err(plot_error)?;

    // 高对称点竖线与标签
    for (n, &i) in band.high_symmetry.iter().enumerate() {
        let x = band.path_length[i];
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(x, y_min), (x, y_max)],
                BLACK.mix(0.4).stroke_width(1),
            )))
            .map_err(plot_error)?;
        if let Some(label) = labels.get(n) {
            let text = if label.eq_ignore_ascii_case("g") || label.eq_ignore_ascii_case("gamma") {
                "Γ".to_string()
            } else {
                label.clone()
            };
            let pixel = chart.backend_coord(&(x, y_min));
            root.draw(&Text::new(
                text,
                (pixel.0 - 6, pixel.1 + 8),
                ("sans-serif", 22).into_font(),
            ))
            .map_err(plot_error)?;
        }
    }

    let num_bands = band.frequencies.first().map_or(0, Vec::len);
    for b in 0..num_bands {
        chart
            .draw_series(LineSeries::new(
                band.path_length
                    .iter()
                    .zip(band.frequencies.iter())
                    .map(|(x, f)| (*x, f[b])),
                LINE_COLOR.stroke_width(2),
            ))
            .map_err(plot_error)?;
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────
// 热力学性质
// ─────────────────────────────────────────────────────────────

pub fn plot_thermal(thermal: &ThermalProperties, path: &Path, options: PlotOptions) -> Result<()> {
    if options.use_svg {
        let root = SVGBackend::new(path, (options.width, options.height)).into_drawing_area();
        draw_thermal(&root, thermal)?;
        root.present().map_err(plot_error)?;
    } else {
        let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
        draw_thermal(&root, thermal)?;
        root.present().map_err(plot_error)?;
    }
    Ok(())
}

fn draw_thermal<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    thermal: &ThermalProperties,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_error)?;

    let t_min = thermal.temperatures.first().copied().unwrap_or(0.0);
    let t_max = thermal.temperatures.last().copied().unwrap_or(1.0).max(t_min + 1.0);
    // 自由能 (eV) 与 T·S (eV) 画在同一坐标
    let ts: Vec<f64> = thermal
        .temperatures
        .iter()
        .zip(thermal.entropy.iter())
        .map(|(t, s)| t * s)
        .collect();
    let all = thermal.free_energy.iter().chain(ts.iter()).copied();
    let (lo, hi) = all.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let (y_min, y_max) = if lo.is_finite() && hi > lo {
        let pad = 0.05 * (hi - lo);
        (lo - pad, hi + pad)
    } else {
        (-1.0, 1.0)
    };

    let mut chart = ChartBuilder::on(root)
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(t_min..t_max, y_min..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Temperature (K)")
        .y_desc("Energy (eV/atom)")
        .x_label_style(("sans-serif", 20))
        .y_label_style(("sans-serif", 20))
        .axis_desc_style(("sans-serif", 24))
        .draw()
        .map_err(plot_error)?;

    let free_color = RGBColor(31, 119, 180);
    chart
        .draw_series(LineSeries::new(
            thermal
                .temperatures
                .iter()
                .copied()
                .zip(thermal.free_energy.iter().copied()),
            free_color.stroke_width(3),
        ))
        .map_err(plot_error)?
        .label("Free energy")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], free_color.stroke_width(3)));

    chart
        .draw_series(LineSeries::new(
            thermal.temperatures.iter().copied().zip(ts.iter().copied()),
            LINE_COLOR.stroke_width(3),
        ))
        .map_err(plot_error)?
        .label("Entropy x T")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], LINE_COLOR.stroke_width(3)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    Ok(())
}
