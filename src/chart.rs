use crate::{
    config,
    error::ReportError,
    fonts::ReportFont,
    input::InputRow,
    stats::CategoryEnvelope,
};
use plotters::coord::ranged1d::{DefaultFormatting, KeyPointHint, Ranged};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::warn;

const LEFT_COLOR: RGBColor = BLUE;
const RIGHT_COLOR: RGBColor = RGBColor(0, 128, 0);
const MEDIAN_COLOR: RGBColor = RED;

/// Upper bound on x-axis ticks; wider ranges get a coarser whole step.
pub const MAX_TICKS: usize = 50;

/// Caption and unit strings shared by every page of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisLabels {
    pub text: String,
    pub unit: String,
}

impl AxisLabels {
    pub fn new(text: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            unit: unit.into(),
        }
    }

    pub fn caption(&self) -> String {
        format!("{} ({})", self.text, self.unit)
    }

    pub fn value(&self, v: f64) -> String {
        format!("{v:.2} {}", self.unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub value: f64,
    pub label: String,
    pub label_x: f64,
}

/// Everything drawn on one row's chart, in data coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLayout {
    pub left: Marker,
    pub right: Marker,
    pub marker_y: f64,
    pub mean: f64,
    pub diff_pct: f64,
    pub diff_label: String,
    pub median: f64,
    pub x_range: (f64, f64),
    pub x_ticks: Vec<f64>,
    pub y_range: (f64, f64),
    pub caption: String,
    pub left_legend: String,
    pub right_legend: String,
    pub median_legend: String,
}

pub fn diff_percent(row: &InputRow) -> Result<f64, ReportError> {
    if row.left_value == 0.0 {
        return Err(ReportError::DivisionByZero {
            name: row.name.clone(),
        });
    }
    Ok(((row.right_value - row.left_value) / row.left_value).abs() * 100.0)
}

impl ChartLayout {
    pub fn build(
        cfg: &config::Chart,
        row: &InputRow,
        envelope: &CategoryEnvelope,
        labels: &AxisLabels,
    ) -> Result<Self, ReportError> {
        let (l, r) = (row.left_value, row.right_value);
        let diff_pct = diff_percent(row)?;

        let offset = cfg.label_offset;
        let (left_x, right_x) = if l > r {
            (l + offset, r - offset)
        } else {
            (l - offset, r + offset)
        };

        Ok(ChartLayout {
            left: Marker {
                value: l,
                label: labels.value(l),
                label_x: left_x,
            },
            right: Marker {
                value: r,
                label: labels.value(r),
                label_x: right_x,
            },
            marker_y: cfg.marker_y,
            mean: (l + r) / 2.0,
            diff_pct,
            diff_label: format!("{diff_pct:.0}% {}", cfg.difference_suffix),
            median: envelope.median,
            x_range: (envelope.min, envelope.max),
            x_ticks: unit_ticks(envelope.min, envelope.max),
            y_range: (0.0, cfg.y_max),
            caption: labels.caption(),
            left_legend: format!("{} ({})", cfg.left_series_name, labels.unit),
            right_legend: format!("{} ({})", cfg.right_series_name, labels.unit),
            median_legend: format!(
                "{} ({})",
                cfg.median_series_name,
                labels.value(envelope.median)
            ),
        })
    }
}

/// Ticks one unit apart starting at `min`, not past `max`. Ranges wider
/// than [`MAX_TICKS`] units step by the smallest whole number that fits.
pub fn unit_ticks(min: f64, max: f64) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite()) || max < min {
        return Vec::new();
    }
    let span = max - min;
    let step = if span + 1.0 > MAX_TICKS as f64 {
        let step = (span / (MAX_TICKS - 1) as f64).ceil();
        warn!("x range {min}..{max} is unusually wide; ticks every {step} units");
        step
    } else {
        1.0
    };
    let count = (span / step + 1e-9).floor() as usize + 1;
    (0..count).map(|k| min + k as f64 * step).collect()
}

/// Linear x axis whose key points are exactly the precomputed ticks.
struct TickedAxis {
    linear: RangedCoordf64,
    ticks: Vec<f64>,
}

impl TickedAxis {
    fn new(range: (f64, f64), ticks: &[f64]) -> Self {
        Self {
            linear: (range.0..range.1).into(),
            ticks: ticks.to_vec(),
        }
    }
}

impl Ranged for TickedAxis {
    type FormatOption = DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.linear.map(value, limit)
    }

    fn key_points<Hint: KeyPointHint>(&self, hint: Hint) -> Vec<f64> {
        let max = hint.max_num_points().max(1);
        let stride = self.ticks.len().div_ceil(max).max(1);
        self.ticks.iter().copied().step_by(stride).collect()
    }

    fn range(&self) -> Range<f64> {
        self.linear.range()
    }
}

fn tick_label(v: &f64) -> String {
    if v.fract().abs() < 1e-9 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

/// Pixel buffer for one chart. Created per render call and consumed by
/// encoding, so nothing survives from one row to the next.
struct RenderContext {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl RenderContext {
    fn acquire(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgb: vec![255; width as usize * height as usize * 3],
        }
    }

    fn encode_png(self) -> Result<Vec<u8>, ReportError> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().map_err(ReportError::image)?;
            writer
                .write_image_data(&self.rgb)
                .map_err(ReportError::image)?;
            writer.finish().map_err(ReportError::image)?;
        }
        Ok(out)
    }
}

pub struct ChartRenderer<'a> {
    cfg: &'a config::Chart,
    font: &'a ReportFont,
}

impl<'a> ChartRenderer<'a> {
    /// Chart text is drawn with `font`'s registered plotters family.
    pub fn new(cfg: &'a config::Chart, font: &'a ReportFont) -> Self {
        Self { cfg, font }
    }

    pub fn size_px(&self) -> (u32, u32) {
        (
            (self.cfg.width_in * self.cfg.dpi).round() as u32,
            (self.cfg.height_in * self.cfg.dpi).round() as u32,
        )
    }

    fn px(&self, points: f64) -> i32 {
        (points * self.cfg.dpi / 72.0).round() as i32
    }

    pub fn render(
        &self,
        row: &InputRow,
        envelope: &CategoryEnvelope,
        labels: &AxisLabels,
    ) -> Result<Vec<u8>, ReportError> {
        let layout = ChartLayout::build(self.cfg, row, envelope, labels)?;
        self.rasterize(&layout)
    }

    pub fn rasterize(&self, layout: &ChartLayout) -> Result<Vec<u8>, ReportError> {
        let (width, height) = self.size_px();
        let mut ctx = RenderContext::acquire(width, height);
        self.draw(layout, &mut ctx)?;
        ctx.encode_png()
    }

    fn draw(&self, layout: &ChartLayout, ctx: &mut RenderContext) -> Result<(), ReportError> {
        let family = self.font.chart_family();
        let font_px = self.px(self.cfg.font_size_pt) as f64;
        let tick_px = font_px * 0.85;
        let half = self.px(self.cfg.marker_size_pt) / 2;
        let legend_half = half * 2 / 3;
        let thin = self.px(1.0).max(1) as u32;
        let dash = self.px(4.0);
        let gap = self.px(2.5);
        let median_width = self.px(self.cfg.median_line_width_pt).max(1) as u32;

        let root = BitMapBackend::with_buffer(&mut ctx.rgb, (ctx.width, ctx.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(ReportError::render)?;

        let (x0, x1) = layout.x_range;
        let (y0, y1) = layout.y_range;
        let mut chart = ChartBuilder::on(&root)
            .margin(self.px(8.0))
            .x_label_area_size(self.px(36.0))
            .y_label_area_size(self.px(24.0))
            .build_cartesian_2d(TickedAxis::new((x0, x1), &layout.x_ticks), y0..y1)
            .map_err(ReportError::render)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_labels(layout.x_ticks.len().max(2))
            .x_label_formatter(&tick_label)
            .x_desc(layout.caption.as_str())
            .label_style((family, tick_px))
            .axis_desc_style((family, font_px))
            .draw()
            .map_err(ReportError::render)?;

        let y = layout.marker_y;
        let (xl, xr) = (layout.left.value, layout.right.value);

        chart
            .draw_series(DashedLineSeries::new(
                vec![(xl, y0), (xl, y)],
                dash,
                gap,
                LEFT_COLOR.stroke_width(thin),
            ))
            .map_err(ReportError::render)?;
        chart
            .draw_series(DashedLineSeries::new(
                vec![(xr, y0), (xr, y)],
                dash,
                gap,
                RIGHT_COLOR.stroke_width(thin),
            ))
            .map_err(ReportError::render)?;
        chart
            .draw_series(DashedLineSeries::new(
                vec![(xl, y), (xr, y)],
                dash,
                gap,
                BLACK.stroke_width(thin),
            ))
            .map_err(ReportError::render)?;

        chart
            .draw_series(std::iter::once(
                EmptyElement::at((xl, y))
                    + Rectangle::new([(-half, -half), (half, half)], LEFT_COLOR.filled()),
            ))
            .map_err(ReportError::render)?
            .label(layout.left_legend.as_str())
            .legend(move |(lx, ly)| {
                Rectangle::new(
                    [(lx - legend_half, ly - legend_half), (lx + legend_half, ly + legend_half)],
                    LEFT_COLOR.filled(),
                )
            });

        chart
            .draw_series(std::iter::once(
                EmptyElement::at((xr, y))
                    + Polygon::new(vec![(-half, -half), (half, -half), (0, half)], RIGHT_COLOR.filled()),
            ))
            .map_err(ReportError::render)?
            .label(layout.right_legend.as_str())
            .legend(move |(lx, ly)| {
                Polygon::new(
                    vec![
                        (lx - legend_half, ly - legend_half),
                        (lx + legend_half, ly - legend_half),
                        (lx, ly + legend_half),
                    ],
                    RIGHT_COLOR.filled(),
                )
            });

        chart
            .draw_series(LineSeries::new(
                vec![(layout.median, y0), (layout.median, y1)],
                MEDIAN_COLOR.stroke_width(median_width),
            ))
            .map_err(ReportError::render)?
            .label(layout.median_legend.as_str())
            .legend(move |(lx, ly)| {
                PathElement::new(
                    vec![(lx - legend_half * 2, ly), (lx + legend_half * 2, ly)],
                    MEDIAN_COLOR.stroke_width(median_width),
                )
            });

        let anchored = Pos::new(HPos::Center, VPos::Bottom);
        let value_style = |color: &'static RGBColor| {
            TextStyle::from((family, font_px).into_font())
                .color(color)
                .pos(anchored)
        };
        chart
            .draw_series([
                Text::new(
                    layout.left.label.clone(),
                    (layout.left.label_x, y),
                    value_style(&LEFT_COLOR),
                ),
                Text::new(
                    layout.right.label.clone(),
                    (layout.right.label_x, y),
                    value_style(&RIGHT_COLOR),
                ),
                Text::new(
                    layout.diff_label.clone(),
                    (layout.mean, y + 1.0),
                    value_style(&BLACK),
                ),
            ])
            .map_err(ReportError::render)?;

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .margin(self.px(4.0))
            .legend_area_size(self.px(20.0))
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK.mix(0.3))
            .label_font((family, font_px * 0.9))
            .draw()
            .map_err(ReportError::render)?;

        root.present().map_err(ReportError::render)?;
        Ok(())
    }
}
