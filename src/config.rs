use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Rendering configuration. Every field has a default so a config file only
/// needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Figure width in inches
    pub width_in: f64,
    /// Figure height in inches
    pub height_in: f64,
    /// Output resolution; fonts are given in points and scaled by dpi / 72
    pub dpi: u32,
    /// Colour scale name: viridis or heat
    pub color_scale: String,
    pub colorbar_label: String,
    /// Optional title drawn above the grid
    pub title: Option<String>,
    pub font_family: String,
    /// Cell annotation font size (pt)
    pub annotation_font_pt: f64,
    /// Side-panel count/percentage font size (pt)
    pub stats_font_pt: f64,
    /// Tick label font size (pt)
    pub tick_font_pt: f64,
    /// Separator line width between cells (pt)
    pub line_width_pt: f64,
    /// Colour bar height as a fraction of the grid height
    pub colorbar_shrink: f64,
    /// Colour bar height / width ratio
    pub colorbar_aspect: f64,
    /// Default image path when none is given on the command line
    pub output: String,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            width_in: 8.0,
            height_in: 6.0,
            dpi: 600,
            color_scale: "viridis".to_string(),
            colorbar_label: "percentatge (%)".to_string(),
            title: None,
            font_family: "sans-serif".to_string(),
            annotation_font_pt: 10.0,
            stats_font_pt: 11.0,
            tick_font_pt: 10.0,
            line_width_pt: 0.5,
            colorbar_shrink: 0.6,
            colorbar_aspect: 20.0,
            output: "heatmap_tonicitat_metrica.png".to_string(),
        }
    }
}

impl HeatmapConfig {
    /// Load from an optional TOML file, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(AppError::InvalidArgument(format!(
                    "Config file does not exist: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }
        let cfg: HeatmapConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.dpi == 0 {
            return Err(AppError::InvalidArgument("dpi must be positive".to_string()));
        }
        if !(self.width_in > 0.0 && self.height_in > 0.0) {
            return Err(AppError::InvalidArgument(format!(
                "Figure size must be positive, current: {}x{}",
                self.width_in, self.height_in
            )));
        }
        if !(self.colorbar_shrink > 0.0 && self.colorbar_shrink <= 1.0) {
            return Err(AppError::InvalidArgument(format!(
                "colorbar_shrink must be in (0, 1], current: {}",
                self.colorbar_shrink
            )));
        }
        if self.colorbar_aspect <= 0.0 {
            return Err(AppError::InvalidArgument(format!(
                "colorbar_aspect must be positive, current: {}",
                self.colorbar_aspect
            )));
        }
        for (name, pt) in [
            ("annotation_font_pt", self.annotation_font_pt),
            ("stats_font_pt", self.stats_font_pt),
            ("tick_font_pt", self.tick_font_pt),
        ] {
            if pt <= 0.0 {
                return Err(AppError::InvalidArgument(format!("{} must be positive, current: {}", name, pt)));
            }
        }
        if self.line_width_pt < 0.0 {
            return Err(AppError::InvalidArgument("line_width_pt cannot be negative".to_string()));
        }
        Ok(())
    }

    /// Canvas size in pixels.
    pub fn canvas_px(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi as f64).round() as u32,
            (self.height_in * self.dpi as f64).round() as u32,
        )
    }

    /// Pixels per typographic point.
    pub fn px_per_pt(&self) -> f64 {
        self.dpi as f64 / 72.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_print_resolution() {
        let cfg = HeatmapConfig::load(None).unwrap();
        assert_eq!(cfg, HeatmapConfig::default());
        assert_eq!(cfg.canvas_px(), (4800, 3600));
        assert!((cfg.px_per_pt() - 600.0 / 72.0).abs() < 1e-12);
    }

    #[test]
    fn toml_file_overrides_selected_keys() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "dpi = 150").unwrap();
        writeln!(file, "color_scale = \"heat\"").unwrap();
        writeln!(file, "title = \"Tonicitat\"").unwrap();
        let cfg = HeatmapConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.dpi, 150);
        assert_eq!(cfg.color_scale, "heat");
        assert_eq!(cfg.title.as_deref(), Some("Tonicitat"));
        assert_eq!(cfg.width_in, 8.0);
        assert_eq!(cfg.canvas_px(), (1200, 900));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "colorbar_shrink = 1.5").unwrap();
        assert!(matches!(
            HeatmapConfig::load(Some(file.path())),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = HeatmapConfig::load(Some(Path::new("/nonexistent/heatmap.toml"))).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}
