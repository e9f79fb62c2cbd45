use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::config::HeatmapConfig;
use crate::cooccurrence::{CoOccurrenceMatrix, PositionSummary};
use crate::error::AppError;

/// Lower and upper bound of the colour scale, in percent.
pub const SCALE_MIN: f64 = 0.0;
pub const SCALE_MAX: f64 = 100.0;

/// Width of the side panel, in cells.
const STATS_CELLS: f64 = 2.0;
/// Offset of the side-panel text from the grid edge, in cells.
const STATS_TEXT_OFFSET: f64 = 0.3;
const COLORBAR_TICKS: [f64; 6] = [0.0, 20.0, 40.0, 60.0, 80.0, 100.0];

// Viridis sampled every 0.1
const VIRIDIS: [(u8, u8, u8); 11] = [
    (68, 1, 84),
    (72, 36, 117),
    (65, 68, 135),
    (53, 95, 141),
    (42, 120, 142),
    (33, 145, 140),
    (34, 168, 132),
    (68, 191, 112),
    (122, 209, 81),
    (189, 223, 38),
    (253, 231, 37),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScale {
    Viridis,
    /// White -> yellow -> orange -> red
    Heat,
}

impl ColorScale {
    pub fn from_name(name: &str) -> Result<Self, AppError> {
        match name.trim().to_lowercase().as_str() {
            "viridis" => Ok(ColorScale::Viridis),
            "heat" => Ok(ColorScale::Heat),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown color scale: {}. Supported scales: viridis, heat",
                other
            ))),
        }
    }

    /// Colour for a percentage; values outside [0, 100] are clamped.
    pub fn color(&self, value: f64) -> RGBColor {
        let normalized = ((value - SCALE_MIN) / (SCALE_MAX - SCALE_MIN)).clamp(0.0, 1.0);
        match self {
            ColorScale::Viridis => {
                let scaled = normalized * (VIRIDIS.len() - 1) as f64;
                let idx = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
                let t = scaled - idx as f64;
                let (r0, g0, b0) = VIRIDIS[idx];
                let (r1, g1, b1) = VIRIDIS[idx + 1];
                RGBColor(lerp(r0, r1, t), lerp(g0, g1, t), lerp(b0, b1, t))
            }
            ColorScale::Heat => {
                if normalized < 0.33 {
                    let t = normalized / 0.33;
                    RGBColor(255, 255, ((1.0 - t) * 255.0) as u8)
                } else if normalized < 0.67 {
                    let t = (normalized - 0.33) / 0.34;
                    RGBColor(255, (255.0 - t * 90.0) as u8, 0)
                } else {
                    let t = (normalized - 0.67) / 0.33;
                    RGBColor(255, (165.0 * (1.0 - t)) as u8, 0)
                }
            }
        }
    }
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round() as u8
}

/// WCAG relative luminance of an sRGB colour.
pub fn relative_luminance(color: &RGBColor) -> f64 {
    let channel = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * channel(color.0) + 0.7152 * channel(color.1) + 0.0722 * channel(color.2)
}

/// Dark text on light cells, white text on dark cells.
pub fn annotation_color(cell: &RGBColor) -> RGBColor {
    if relative_luminance(cell) > 0.408 {
        RGBColor(38, 38, 38)
    } else {
        WHITE
    }
}

/// Pixel geometry of the figure.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapLayout {
    pub canvas: (u32, u32),
    pub n: usize,
    /// Side length of a (square) cell
    pub cell: f64,
    pub grid_left: f64,
    pub grid_top: f64,
    /// x where the per-row count text starts
    pub stats_x: f64,
    /// (x0, y0, x1, y1) of the colour bar
    pub colorbar: (f64, f64, f64, f64),
    pub title_y: Option<f64>,
}

impl HeatmapLayout {
    pub fn compute(n: usize, cfg: &HeatmapConfig) -> Self {
        let canvas = cfg.canvas_px();
        let (width, height) = (canvas.0 as f64, canvas.1 as f64);
        let s = cfg.px_per_pt();
        let tick_px = cfg.tick_font_pt * s;

        let margin = 12.0 * s;
        let title_h = if cfg.title.is_some() { 2.2 * tick_px } else { 0.0 };
        let x_axis_h = 2.0 * tick_px;
        let y_axis_w = 2.5 * tick_px;
        let gap = 0.5 * tick_px;

        let available_h = (height - 2.0 * margin - title_h - x_axis_h).max(1.0);
        // colour bar width is bounded by the tallest grid that could fit
        let colorbar_w_max = cfg.colorbar_shrink * available_h / cfg.colorbar_aspect;
        let colorbar_zone = colorbar_w_max + 4.5 * tick_px + 2.0 * tick_px;
        let available_w = (width - 2.0 * margin - y_axis_w - gap - colorbar_zone).max(1.0);

        let n_f = n.max(1) as f64;
        let cell = (available_h / n_f).min(available_w / (n_f + STATS_CELLS));
        let grid_size = cell * n_f;

        let grid_left = margin + y_axis_w;
        let grid_top = margin + title_h + (available_h - grid_size) / 2.0;
        let grid_right = grid_left + grid_size;

        let colorbar_h = cfg.colorbar_shrink * grid_size;
        let colorbar_w = colorbar_h / cfg.colorbar_aspect;
        let colorbar_x0 = grid_right + STATS_CELLS * cell + gap;
        let colorbar_y0 = grid_top + (grid_size - colorbar_h) / 2.0;

        Self {
            canvas,
            n,
            cell,
            grid_left,
            grid_top,
            stats_x: grid_right + STATS_TEXT_OFFSET * cell,
            colorbar: (
                colorbar_x0,
                colorbar_y0,
                colorbar_x0 + colorbar_w,
                colorbar_y0 + colorbar_h,
            ),
            title_y: cfg.title.as_ref().map(|_| margin + title_h / 2.0),
        }
    }

    pub fn grid_size(&self) -> f64 {
        self.cell * self.n as f64
    }

    /// Top-left and bottom-right corners of cell (row, col).
    pub fn cell_rect(&self, row: usize, col: usize) -> ((f64, f64), (f64, f64)) {
        let x0 = self.grid_left + col as f64 * self.cell;
        let y0 = self.grid_top + row as f64 * self.cell;
        ((x0, y0), (x0 + self.cell, y0 + self.cell))
    }

    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let ((x0, y0), (x1, y1)) = self.cell_rect(row, col);
        ((x0 + x1) / 2.0, (y0 + y1) / 2.0)
    }
}

fn px(v: f64) -> i32 {
    v.round() as i32
}

/// Render the annotated heatmap to `path`. `.svg` paths use the SVG backend,
/// anything else is written as a PNG bitmap.
pub fn render_heatmap<P: AsRef<Path>>(
    matrix: &CoOccurrenceMatrix,
    summaries: &[PositionSummary],
    cfg: &HeatmapConfig,
    path: P,
) -> Result<(), AppError> {
    let path = path.as_ref();
    cfg.validate()?;
    let scale = ColorScale::from_name(&cfg.color_scale)?;
    if summaries.len() != matrix.size() {
        return Err(AppError::InvalidArgument(format!(
            "Expected {} position summaries, got {}",
            matrix.size(),
            summaries.len()
        )));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let layout = HeatmapLayout::compute(matrix.size(), cfg);
    let is_svg = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);

    let result = if is_svg {
        let root = SVGBackend::new(path, layout.canvas).into_drawing_area();
        draw_heatmap(&root, matrix, summaries, cfg, scale, &layout)
    } else {
        let root = BitMapBackend::new(path, layout.canvas).into_drawing_area();
        draw_heatmap(&root, matrix, summaries, cfg, scale, &layout)
    };
    result.map_err(|e| AppError::Render(e.to_string()))
}

fn draw_heatmap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    matrix: &CoOccurrenceMatrix,
    summaries: &[PositionSummary],
    cfg: &HeatmapConfig,
    scale: ColorScale,
    layout: &HeatmapLayout,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let s = cfg.px_per_pt();
    let family = cfg.font_family.as_str();
    let annot_font = (family, cfg.annotation_font_pt * s).into_font();
    let stats_font = (family, cfg.stats_font_pt * s).into_font();
    let tick_font = (family, cfg.tick_font_pt * s).into_font();
    let inset = cfg.line_width_pt * s / 2.0;

    root.fill(&WHITE)?;

    if let (Some(title), Some(y)) = (&cfg.title, layout.title_y) {
        root.draw(&Text::new(
            title.clone(),
            (px(layout.grid_left + layout.grid_size() / 2.0), px(y)),
            tick_font.clone().color(&BLACK).pos(centered_pos()),
        ))?;
    }

    // Undefined cells are left blank
    for (row, col, value) in matrix.defined_cells() {
        let ((x0, y0), (x1, y1)) = layout.cell_rect(row, col);
        let color = scale.color(value);
        root.draw(&Rectangle::new(
            [(px(x0 + inset), px(y0 + inset)), (px(x1 - inset), px(y1 - inset))],
            color.filled(),
        ))?;
        let (cx, cy) = layout.cell_center(row, col);
        root.draw(&Text::new(
            format!("{:.2}", value),
            (px(cx), px(cy)),
            annot_font.clone().color(&annotation_color(&color)).pos(centered_pos()),
        ))?;
    }

    // Position labels on both axes
    let grid_bottom = layout.grid_top + layout.grid_size();
    for (idx, label) in matrix.labels().iter().enumerate() {
        let (cx, cy) = layout.cell_center(idx, idx);
        root.draw(&Text::new(
            label.clone(),
            (px(cx), px(grid_bottom + 0.4 * cfg.tick_font_pt * s)),
            tick_font.clone().color(&BLACK).pos(Pos::new(HPos::Center, VPos::Top)),
        ))?;
        root.draw(&Text::new(
            label.clone(),
            (px(layout.grid_left - 0.4 * cfg.tick_font_pt * s), px(cy)),
            tick_font.clone().color(&BLACK).pos(Pos::new(HPos::Right, VPos::Center)),
        ))?;
    }

    // Per-row count and overall percentage beside the grid
    for (idx, summary) in summaries.iter().enumerate() {
        let (_, cy) = layout.cell_center(idx, 0);
        root.draw(&Text::new(
            summary.annotation(),
            (px(layout.stats_x), px(cy)),
            stats_font.clone().color(&BLACK).pos(Pos::new(HPos::Left, VPos::Center)),
        ))?;
    }

    draw_colorbar(root, cfg, scale, layout)?;

    root.present()?;
    Ok(())
}

fn draw_colorbar<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    cfg: &HeatmapConfig,
    scale: ColorScale,
    layout: &HeatmapLayout,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let s = cfg.px_per_pt();
    let (x0, y0, x1, y1) = layout.colorbar;
    let height = y1 - y0;
    let steps = 200;
    let step = height / steps as f64;

    for i in 0..steps {
        // top of the bar is SCALE_MAX
        let value = SCALE_MAX - (i as f64 + 0.5) / steps as f64 * (SCALE_MAX - SCALE_MIN);
        let top = y0 + i as f64 * step;
        root.draw(&Rectangle::new(
            [(px(x0), px(top)), (px(x1), px(top + step) + 1)],
            scale.color(value).filled(),
        ))?;
    }
    root.draw(&Rectangle::new(
        [(px(x0), px(y0)), (px(x1), px(y1))],
        BLACK.stroke_width((0.8 * s).round().max(1.0) as u32),
    ))?;

    let tick_font = (cfg.font_family.as_str(), cfg.tick_font_pt * s).into_font();
    let tick_len = 3.5 * s;
    let mut label_right = x1 + tick_len;
    for value in COLORBAR_TICKS {
        let y = y1 - (value - SCALE_MIN) / (SCALE_MAX - SCALE_MIN) * height;
        root.draw(&PathElement::new(
            vec![(px(x1), px(y)), (px(x1 + tick_len), px(y))],
            BLACK.stroke_width((0.8 * s).round().max(1.0) as u32),
        ))?;
        let text = format!("{}", value as i64);
        root.draw(&Text::new(
            text.clone(),
            (px(x1 + tick_len + 2.0 * s), px(y)),
            tick_font.clone().color(&BLACK).pos(Pos::new(HPos::Left, VPos::Center)),
        ))?;
        // digit advance is about 0.6 em in common sans-serif faces
        let w = text.chars().count() as f64 * 0.6 * cfg.tick_font_pt * s;
        label_right = label_right.max(x1 + tick_len + 2.0 * s + w);
    }

    root.draw(&Text::new(
        cfg.colorbar_label.clone(),
        (px(label_right + cfg.tick_font_pt * s), px((y0 + y1) / 2.0)),
        tick_font
            .transform(FontTransform::Rotate270)
            .color(&BLACK)
            .pos(centered_pos()),
    ))?;
    Ok(())
}

fn centered_pos() -> Pos {
    Pos::new(HPos::Center, VPos::Center)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooccurrence::{HeatmapBuilder, PositionSet};
    use crate::corpus::example_corpus;
    use crate::table::ObservationTable;

    #[test]
    fn scale_endpoints() {
        assert_eq!(ColorScale::Viridis.color(0.0), RGBColor(68, 1, 84));
        assert_eq!(ColorScale::Viridis.color(100.0), RGBColor(253, 231, 37));
        assert_eq!(ColorScale::Viridis.color(50.0), RGBColor(33, 145, 140));
        assert_eq!(ColorScale::Heat.color(0.0), RGBColor(255, 255, 255));
        assert_eq!(ColorScale::Heat.color(100.0), RGBColor(255, 0, 0));
    }

    #[test]
    fn scale_clamps_out_of_range_values() {
        assert_eq!(ColorScale::Viridis.color(-5.0), ColorScale::Viridis.color(0.0));
        assert_eq!(ColorScale::Viridis.color(250.0), ColorScale::Viridis.color(100.0));
    }

    #[test]
    fn scale_names() {
        assert_eq!(ColorScale::from_name("Viridis").unwrap(), ColorScale::Viridis);
        assert_eq!(ColorScale::from_name("heat").unwrap(), ColorScale::Heat);
        assert!(ColorScale::from_name("jet").is_err());
    }

    #[test]
    fn annotation_text_contrasts_with_cell() {
        assert_eq!(annotation_color(&ColorScale::Viridis.color(0.0)), WHITE);
        assert_eq!(
            annotation_color(&ColorScale::Viridis.color(100.0)),
            RGBColor(38, 38, 38)
        );
    }

    #[test]
    fn layout_fits_canvas() {
        let cfg = HeatmapConfig::default();
        let layout = HeatmapLayout::compute(10, &cfg);
        let (w, h) = (layout.canvas.0 as f64, layout.canvas.1 as f64);
        assert_eq!(layout.canvas, (4800, 3600));
        assert!(layout.cell > 0.0);
        assert!(layout.grid_left > 0.0 && layout.grid_top > 0.0);
        assert!(layout.grid_top + layout.grid_size() < h);

        let grid_right = layout.grid_left + layout.grid_size();
        assert!((layout.stats_x - (grid_right + 0.3 * layout.cell)).abs() < 1e-9);
        let (x0, y0, x1, y1) = layout.colorbar;
        assert!(x0 >= grid_right + 2.0 * layout.cell);
        assert!(x1 < w && y0 >= layout.grid_top && y1 <= layout.grid_top + layout.grid_size());
        assert!(((y1 - y0) - 0.6 * layout.grid_size()).abs() < 1e-9);
        assert!(((y1 - y0) / (x1 - x0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn layout_reserves_title_band() {
        let mut cfg = HeatmapConfig::default();
        let untitled = HeatmapLayout::compute(10, &cfg);
        cfg.title = Some("Tonicitat".to_string());
        let titled = HeatmapLayout::compute(10, &cfg);
        assert!(titled.title_y.is_some());
        assert!(titled.title_y.unwrap() < titled.grid_top);
        assert!(titled.cell <= untitled.cell);
    }

    #[test]
    fn cells_are_square_and_contiguous() {
        let layout = HeatmapLayout::compute(10, &HeatmapConfig::default());
        let ((x0, y0), (x1, y1)) = layout.cell_rect(3, 4);
        assert!(((x1 - x0) - (y1 - y0)).abs() < 1e-9);
        let ((nx0, _), _) = layout.cell_rect(3, 5);
        assert!((nx0 - x1).abs() < 1e-9);
    }

    #[test]
    fn render_fails_on_unwritable_path() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        // a regular file cannot act as a directory
        let path = blocker.path().join("out").join("heatmap.png");
        let table = ObservationTable::from_rows(PositionSet::syllables().labels(), &[vec![1.0; 10]]);
        let (matrix, summaries) = HeatmapBuilder::new()
            .build(&table, &PositionSet::syllables())
            .unwrap();
        let err = render_heatmap(&matrix, &summaries, &HeatmapConfig::default(), &path).unwrap_err();
        assert!(matches!(err, AppError::Io(_) | AppError::Render(_)));
    }

    #[test]
    fn render_rejects_unknown_scale_before_drawing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.png");
        let table = ObservationTable::from_rows(PositionSet::syllables().labels(), &[]);
        let (matrix, summaries) = HeatmapBuilder::new()
            .build(&table, &PositionSet::syllables())
            .unwrap();
        let cfg = HeatmapConfig {
            color_scale: "rainbow".to_string(),
            ..HeatmapConfig::default()
        };
        let err = render_heatmap(&matrix, &summaries, &cfg, &path).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert!(!path.exists());
    }

    #[test]
    fn example_corpus_renders_to_png_and_svg() {
        let dir = tempfile::tempdir().unwrap();
        let table = example_corpus().unwrap();
        let (matrix, summaries) = HeatmapBuilder::new()
            .build(&table, &PositionSet::syllables())
            .unwrap();
        let cfg = HeatmapConfig {
            dpi: 50,
            ..HeatmapConfig::default()
        };

        for name in ["h.png", "h.svg"] {
            let path = dir.path().join(name);
            assert!(render_heatmap(&matrix, &summaries, &cfg, &path).is_ok());
            assert!(path.exists());
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }

        let svg = std::fs::read_to_string(dir.path().join("h.svg")).unwrap();
        assert!(svg.contains("40 (20.00%)"));
        assert!(svg.contains("percentatge (%)"));
    }
}
