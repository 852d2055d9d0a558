//! Original series vs. training and testing fits

use crate::error::{ForecastError, Result};
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A named line of `(row index, value)` points
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub name: String,
    pub points: Vec<(usize, f64)>,
}

impl PlotSeries {
    pub fn new(name: &str, points: Vec<(usize, f64)>) -> Self {
        Self {
            name: name.to_string(),
            points,
        }
    }

    /// Place consecutive values starting at row `offset`
    pub fn from_offset(name: &str, offset: usize, values: &[f64]) -> Self {
        Self::new(
            name,
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (offset + i, v))
                .collect(),
        )
    }
}

/// The three lines drawn for one feature to predict
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPlot {
    pub target: String,
    pub original: PlotSeries,
    pub training_fit: PlotSeries,
    pub testing_fit: PlotSeries,
}

impl ForecastPlot {
    /// Build the plot of one target.
    ///
    /// Training predictions start at row `window_size`, testing predictions at
    /// row `split_index + window_size`.
    pub fn new(
        target: &str,
        original: &[f64],
        training_fit: &[f64],
        testing_fit: &[f64],
        window_size: usize,
        split_index: usize,
    ) -> Self {
        Self {
            target: target.to_string(),
            original: PlotSeries::from_offset("original series", 0, original),
            training_fit: PlotSeries::from_offset("training fit", window_size, training_fit),
            testing_fit: PlotSeries::from_offset(
                "testing fit",
                split_index + window_size,
                testing_fit,
            ),
        }
    }

    pub fn series(&self) -> [&PlotSeries; 3] {
        [&self.original, &self.training_fit, &self.testing_fit]
    }

    fn bounds(&self) -> Result<(usize, f64, f64)> {
        let points: Vec<&(usize, f64)> = self
            .series()
            .into_iter()
            .flat_map(|s| s.points.iter())
            .collect();
        if points.is_empty() {
            return Err(ForecastError::PlotError(format!(
                "Nothing to plot for {}",
                self.target
            )));
        }

        let x_max = points.iter().map(|(x, _)| *x).max().unwrap_or(0);
        let mut y_min = points.iter().map(|(_, y)| *y).fold(f64::INFINITY, f64::min);
        let mut y_max = points.iter().map(|(_, y)| *y).fold(f64::NEG_INFINITY, f64::max);
        if (y_max - y_min).abs() < f64::EPSILON {
            y_min -= 1.0;
            y_max += 1.0;
        }
        Ok((x_max, y_min, y_max))
    }

    /// Draw the three lines with a legend into an SVG file
    pub fn render_svg<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let (x_max, y_min, y_max) = self.bounds()?;
        let margin = (y_max - y_min) * 0.05;

        let root = SVGBackend::new(path, (1024, 600)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&self.target, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..(x_max.max(1) as f64), (y_min - margin)..(y_max + margin))
            .map_err(plot_error)?;
        chart
            .configure_mesh()
            .x_desc("row")
            .y_desc(self.target.as_str())
            .draw()
            .map_err(plot_error)?;

        for (series, color) in self.series().into_iter().zip([BLACK, BLUE, RED]) {
            chart
                .draw_series(LineSeries::new(
                    series.points.iter().map(|&(x, y)| (x as f64, y)),
                    &color,
                ))
                .map_err(plot_error)?
                .label(series.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(plot_error)?;
        root.present().map_err(plot_error)?;
        Ok(())
    }

    /// Write the lines side by side, one row per index, blanks where a line has no point
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut rows: BTreeMap<usize, [Option<f64>; 3]> = BTreeMap::new();
        for (column, series) in self.series().into_iter().enumerate() {
            for &(x, y) in &series.points {
                rows.entry(x).or_default()[column] = Some(y);
            }
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["index", "original", "training_fit", "testing_fit"])?;
        for (index, values) in rows {
            let mut record = vec![index.to_string()];
            record.extend(values.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn plot_error<E: std::fmt::Display>(err: E) -> ForecastError {
    ForecastError::PlotError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sample_plot() -> ForecastPlot {
        let original: Vec<f64> = (0..10).map(|i| i as f64).collect();
        ForecastPlot::new("close", &original, &[3.1, 4.2, 5.0], &[8.9, 9.8], 3, 5)
    }

    #[test]
    fn test_fit_offsets() {
        let plot = sample_plot();

        assert_eq!(plot.training_fit.points[0], (3, 3.1));
        assert_eq!(plot.testing_fit.points[0], (8, 8.9));
        assert_eq!(plot.testing_fit.points[1], (9, 9.8));
        assert_eq!(plot.original.name, "original series");
    }

    #[test]
    fn test_render_svg_writes_legend() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plots").join("close.svg");

        sample_plot().render_svg(&path).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("training fit"));
        assert!(svg.contains("testing fit"));
    }

    #[test]
    fn test_write_csv_aligns_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("close.csv");

        sample_plot().write_csv(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "index,original,training_fit,testing_fit");
        assert_eq!(lines[1], "0,0,,");
        assert_eq!(lines[9], "8,8,,8.9");
        assert_eq!(lines.len(), 11);
    }

    #[test]
    fn test_empty_plot_is_an_error() {
        let plot = ForecastPlot::new("close", &[], &[], &[], 3, 0);
        let dir = tempdir().unwrap();

        let result = plot.render_svg(dir.path().join("empty.svg"));

        assert!(matches!(result, Err(ForecastError::PlotError(_))));
    }
}
