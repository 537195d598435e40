use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use common::{
    config::Settings,
    record::{Field, StoreRecord},
    select::{Point, Selection, Series, select_series},
    util::{write_pdf, write_plot_data},
};
use eyre::Result;
use plotters::{
    coord::{Shift, ranged1d::ValueFormatter},
    element::DashedPathElement,
    prelude::*,
    series::DashedLineSeries,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const NODE_COLORS: [RGBColor; 4] = [BLACK, RED, RGBColor(0, 128, 0), BLUE];
const CATEGORY_DASHES: [LineDash; 3] = [LineDash::Solid, LineDash::Dashed, LineDash::Dotted];
const LEGEND_LINE_LENGTH: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDash {
    Solid,
    Dashed,
    Dotted,
}

pub fn node_color(node_index: usize) -> RGBColor {
    NODE_COLORS[node_index % NODE_COLORS.len()]
}

pub fn category_dash(category_index: usize) -> LineDash {
    CATEGORY_DASHES[category_index % CATEGORY_DASHES.len()]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Linear,
    #[default]
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegendPosition {
    UpperRight,
    LowerRight,
}

impl LegendPosition {
    fn series_label_position(self) -> SeriesLabelPosition {
        match self {
            LegendPosition::UpperRight => SeriesLabelPosition::UpperRight,
            LegendPosition::LowerRight => SeriesLabelPosition::LowerRight,
        }
    }
}

/// One chart of a figure. The y axis is always logarithmic.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub x: Field,
    pub y: Field,
    pub err: Field,
    pub x_desc: &'static str,
    pub y_desc: &'static str,
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
    pub x_scale: Scale,
    /// Tick labels above the chart instead of below
    pub x_top: bool,
    /// Tick labels right of the chart instead of left
    pub y_right: bool,
    pub legend: Option<LegendPosition>,
}

/// The write/read throughput grid shared by every figure: records/s on the left,
/// MB/s on the right, writes on top and reads below. Only the first panel gets a legend.
pub fn throughput_panels(
    x: Field,
    x_desc: &'static str,
    x_range: Range<f64>,
    x_scale: Scale,
    legend: Option<LegendPosition>,
) -> [Panel; 4] {
    let rows = [
        (
            Field::WriteRecords,
            Field::SigmaWriteRecords,
            "Number of Records Written / s",
            10.0..3e4,
        ),
        (Field::WriteMb, Field::SigmaWriteMb, "MB Written / s", 1e-3..30.0),
        (
            Field::ReadRecords,
            Field::SigmaReadRecords,
            "Number of Records Read / s",
            5e3..1.4e5,
        ),
        (Field::ReadMb, Field::SigmaReadMb, "MB Read / s", 0.3..50.0),
    ];
    std::array::from_fn(|i| {
        let (y, err, y_desc, y_range) = rows[i].clone();
        Panel {
            x,
            y,
            err,
            x_desc,
            y_desc,
            x_range: x_range.clone(),
            y_range,
            x_scale,
            x_top: i < 2,
            y_right: i % 2 == 1,
            legend: if i == 0 { legend } else { None },
        }
    })
}

/// A store drawn into a figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default = "default_line_width")]
    pub line_width: u32,
}

pub fn default_line_width() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSeries {
    pub line_width: u32,
    #[serde(flatten)]
    pub series: Series,
}

#[derive(Serialize)]
struct PanelData<'a> {
    x: Field,
    y: Field,
    err: Field,
    series: &'a [PanelSeries],
}

/// A titled 2x2 grid written to a single pdf page
#[derive(Debug, Clone)]
pub struct Figure<'a> {
    pub title: String,
    pub filename: String,
    pub panels: [Panel; 4],
    pub layers: Vec<Layer>,
    pub node_counts: &'a [u32],
    pub category: Field,
    pub categories: &'a [u64],
}

impl Figure<'_> {
    /// The series of every panel, layer by layer
    pub fn select(&self, records: &[StoreRecord]) -> Vec<Vec<PanelSeries>> {
        self.panels
            .iter()
            .map(|panel| {
                self.layers
                    .iter()
                    .flat_map(|layer| {
                        let selection = Selection {
                            store: &layer.name,
                            category: self.category,
                            x: panel.x,
                            y: panel.y,
                            err: panel.err,
                        };
                        let line_width = layer.line_width;
                        select_series(records, &selection, self.node_counts, self.categories)
                            .into_iter()
                            .map(move |series| PanelSeries { line_width, series })
                    })
                    .collect()
            })
            .collect()
    }

    pub fn render(
        &self,
        records: &[StoreRecord],
        plot_path: &Path,
        settings: &Settings,
    ) -> Result<PathBuf> {
        let selected = self.select(records);

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, settings.figure_size).into_drawing_area();
            root.fill(&WHITE)?;
            let root = root.titled(&self.title, (settings.font.as_str(), 28))?;
            for ((area, panel), set) in root
                .split_evenly((2, 2))
                .iter()
                .zip(&self.panels)
                .zip(&selected)
            {
                draw_panel(area, panel, set, settings)?;
            }
            root.present()?;
        }

        let filepath = plot_path.join(&self.filename);
        write_pdf(&svg, &filepath)?;
        if settings.write_plot_data {
            let data = self
                .panels
                .iter()
                .zip(&selected)
                .map(|(panel, set)| PanelData {
                    x: panel.x,
                    y: panel.y,
                    err: panel.err,
                    series: set,
                })
                .collect::<Vec<_>>();
            write_plot_data(&data, &filepath)?;
        }
        debug!("Rendered {}", self.title);
        Ok(filepath)
    }
}

fn draw_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    set: &[PanelSeries],
    settings: &Settings,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_labels = if panel.x_top {
        LabelAreaPosition::Top
    } else {
        LabelAreaPosition::Bottom
    };
    let y_labels = if panel.y_right {
        LabelAreaPosition::Right
    } else {
        LabelAreaPosition::Left
    };

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(15)
        .set_label_area_size(x_labels, 50)
        .set_label_area_size(y_labels, 80);

    let y_range = panel.y_range.clone().log_scale();
    match panel.x_scale {
        Scale::Log => {
            let mut chart =
                builder.build_cartesian_2d(panel.x_range.clone().log_scale(), y_range)?;
            decorate_panel(&mut chart, panel, set, settings)
        }
        Scale::Linear => {
            let mut chart = builder.build_cartesian_2d(panel.x_range.clone(), y_range)?;
            decorate_panel(&mut chart, panel, set, settings)
        }
    }
}

fn decorate_panel<'a, DB, X, Y>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<X, Y>>,
    panel: &Panel,
    set: &[PanelSeries],
    settings: &Settings,
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
    X: Ranged<ValueType = f64> + ValueFormatter<f64>,
    Y: Ranged<ValueType = f64> + ValueFormatter<f64>,
{
    let font = settings.font.as_str();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(panel.x_desc)
        .y_desc(panel.y_desc)
        .label_style((font, 14))
        .axis_desc_style((font, 16))
        .x_label_formatter(&format_tick)
        .y_label_formatter(&format_tick)
        .draw()?;

    draw_series_set(chart, set, Some(panel.y_range.start), settings.band_opacity)?;

    if let Some(position) = panel.legend
        && !set.is_empty()
    {
        chart
            .configure_series_labels()
            .position(position.series_label_position())
            .label_font((font, 12))
            .background_style(TRANSPARENT)
            .border_style(TRANSPARENT)
            .draw()?;
    }
    Ok(())
}

/// Draws a ±err band and a labeled line per series. An empty set draws nothing.
///
/// The y axis is taken as logarithmic: `y_floor` clamps both band edges, and the
/// line breaks around points with a non-positive y.
pub fn draw_series_set<'a, DB, X, Y>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<X, Y>>,
    set: &[PanelSeries],
    y_floor: Option<f64>,
    band_opacity: f64,
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
    X: Ranged<ValueType = f64>,
    Y: Ranged<ValueType = f64>,
{
    for PanelSeries { line_width, series } in set {
        let color = node_color(series.node_index);
        chart.draw_series(std::iter::once(Polygon::new(
            band_polygon(&series.points, y_floor),
            color.mix(band_opacity).filled(),
        )))?;

        let segments = line_segments(&series.points);
        let style = color.stroke_width(*line_width);
        let dash = category_dash(series.category_index);
        let anno = match dash {
            LineDash::Solid => chart.draw_series(
                segments
                    .into_iter()
                    .flat_map(|segment| LineSeries::new(segment, style)),
            )?,
            LineDash::Dashed => chart.draw_series(
                segments
                    .into_iter()
                    .flat_map(|segment| DashedLineSeries::new(segment, 10, 6, style)),
            )?,
            LineDash::Dotted => chart.draw_series(
                segments
                    .into_iter()
                    .flat_map(|segment| DashedLineSeries::new(segment, 2, 4, style)),
            )?,
        };
        anno.label(series.label());
        match dash {
            LineDash::Solid => anno.legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + LEGEND_LINE_LENGTH, y)], style)
            }),
            LineDash::Dashed => anno.legend(move |(x, y)| {
                DashedPathElement::new(vec![(x, y), (x + LEGEND_LINE_LENGTH, y)], 10, 6, style)
            }),
            LineDash::Dotted => anno.legend(move |(x, y)| {
                DashedPathElement::new(vec![(x, y), (x + LEGEND_LINE_LENGTH, y)], 2, 4, style)
            }),
        };
    }
    Ok(())
}

/// Runs of consecutive points with a positive y
fn line_segments(points: &[Point]) -> Vec<Vec<(f64, f64)>> {
    points
        .split(|p| p.y.is_nan() || p.y <= 0.0)
        .filter(|run| !run.is_empty())
        .map(|run| run.iter().map(|p| (p.x, p.y)).collect())
        .collect()
}

/// Outline of the y ± err band: upper edge left to right, lower edge back
fn band_polygon(points: &[Point], y_floor: Option<f64>) -> Vec<(f64, f64)> {
    let clamp = |y: f64| y_floor.map_or(y, |floor| y.max(floor));
    points
        .iter()
        .map(|p| (p.x, clamp(p.y + p.err)))
        .chain(points.iter().rev().map(|p| (p.x, clamp(p.y - p.err))))
        .collect()
}

pub fn format_tick(value: &f64) -> String {
    if value.abs() >= 1.0 {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.4}");
        text.trim_end_matches('0').trim_end_matches('.').to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(node_index: usize, category_index: usize) -> PanelSeries {
        PanelSeries {
            line_width: 1,
            series: Series {
                store: "ETCD".to_owned(),
                node_count: 1,
                category: 1,
                node_index,
                category_index,
                points: vec![
                    Point {
                        x: 128.0,
                        y: 100.0,
                        err: 5.0,
                    },
                    Point {
                        x: 512.0,
                        y: 80.0,
                        err: 4.0,
                    },
                    Point {
                        x: 2048.0,
                        y: 40.0,
                        err: 2.0,
                    },
                ],
            },
        }
    }

    fn render_with(set: &[PanelSeries], legend: bool) -> String {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (400, 300)).into_drawing_area();
            let mut chart = ChartBuilder::on(&root)
                .build_cartesian_2d((64.0..8192.0).log_scale(), (1.0..1000.0).log_scale())
                .unwrap();
            draw_series_set(&mut chart, set, Some(1.0), 0.1).unwrap();
            if legend {
                chart.configure_series_labels().draw().unwrap();
            }
            root.present().unwrap();
        }
        svg
    }

    fn render(set: &[PanelSeries]) -> String {
        render_with(set, false)
    }

    /// Stroke colors of every polyline, in drawing order
    fn polyline_strokes(svg: &str) -> Vec<String> {
        svg.split("<polyline")
            .skip(1)
            .map(|tag| {
                let tag = &tag[..tag.find("/>").unwrap()];
                let stroke = &tag[tag.find("stroke=\"").unwrap() + 8..];
                stroke[..stroke.find('"').unwrap()].to_ascii_lowercase()
            })
            .collect()
    }

    fn coordinates(svg: &str) -> Vec<(f64, f64)> {
        svg.split("points=\"")
            .skip(1)
            .flat_map(|rest| {
                rest[..rest.find('"').unwrap()]
                    .split_whitespace()
                    .map(|pair| {
                        let (x, y) = pair.split_once(',').unwrap();
                        (x.parse().unwrap(), y.parse().unwrap())
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn empty_set_draws_nothing() {
        let svg = render(&[]);
        assert_eq!(svg.matches("<polygon").count(), 0);
        assert_eq!(svg.matches("<polyline").count(), 0);
    }

    #[test]
    fn one_band_and_line_per_series() {
        let svg = render(&[series(0, 0), series(0, 1)]);
        assert_eq!(svg.matches("<polygon").count(), 2);
        assert!(svg.matches("<polyline").count() >= 2);
    }

    #[test]
    fn solid_and_dashed_lines_render_differently() {
        let svg = render(&[series(0, 0), series(1, 1)]);
        let strokes = polyline_strokes(&svg);
        let black = strokes.iter().filter(|s| *s == "#000000").count();
        let red = strokes.iter().filter(|s| *s == "#ff0000").count();
        assert_eq!(black, 1);
        assert!(red > 1, "{strokes:?}");
    }

    #[test]
    #[ignore = "needs system fonts"]
    fn legend_labels_every_line() {
        let mut second = series(0, 1);
        second.series.category = 30;
        let svg = render_with(&[series(0, 0), second], true);
        assert!(svg.contains(">ETCD 1n 1<"), "{svg}");
        assert!(svg.contains(">ETCD 1n 30<"), "{svg}");
    }

    #[test]
    fn zero_throughput_breaks_the_line() {
        let mut set = series(0, 0);
        set.series.points = [
            (128.0, 100.0),
            (256.0, 80.0),
            (512.0, 0.0),
            (1024.0, 40.0),
            (2048.0, 30.0),
        ]
        .into_iter()
        .map(|(x, y)| Point { x, y, err: 0.0 })
        .collect();
        assert_eq!(
            line_segments(&set.series.points),
            vec![
                vec![(128.0, 100.0), (256.0, 80.0)],
                vec![(1024.0, 40.0), (2048.0, 30.0)],
            ]
        );

        let svg = render(&[set]);
        assert_eq!(svg.matches("<polyline").count(), 2);
        for (x, y) in coordinates(&svg) {
            assert!((0.0..=400.0).contains(&x), "x = {x}");
            assert!((0.0..=300.0).contains(&y), "y = {y}");
        }
    }

    #[test]
    fn categories_get_distinct_dashes() {
        assert_eq!(category_dash(0), LineDash::Solid);
        assert_eq!(category_dash(1), LineDash::Dashed);
        assert_eq!(category_dash(2), LineDash::Dotted);
        assert_eq!(category_dash(3), LineDash::Solid);
        assert_eq!(node_color(2), RGBColor(0, 128, 0));
        assert_eq!(node_color(4), BLACK);
    }

    #[test]
    fn band_is_clamped_to_floor() {
        let points = [
            Point {
                x: 1.0,
                y: 10.0,
                err: 2.0,
            },
            Point {
                x: 2.0,
                y: 5.0,
                err: 8.0,
            },
        ];
        assert_eq!(
            band_polygon(&points, Some(1.0)),
            vec![(1.0, 12.0), (2.0, 13.0), (2.0, 1.0), (1.0, 8.0)]
        );
        assert_eq!(band_polygon(&points, None)[2], (2.0, -3.0));

        let flat = [Point {
            x: 1.0,
            y: 0.0,
            err: 0.0,
        }];
        assert_eq!(band_polygon(&flat, Some(1.0)), vec![(1.0, 1.0), (1.0, 1.0)]);
    }

    #[test]
    fn panel_layout() {
        let panels = throughput_panels(
            Field::RecordSize,
            "Record Size (bytes)",
            64.0..8192.0,
            Scale::Log,
            Some(LegendPosition::UpperRight),
        );
        let flags = panels
            .iter()
            .map(|p| (p.x_top, p.y_right, p.legend))
            .collect::<Vec<_>>();
        assert_eq!(
            flags,
            vec![
                (true, false, Some(LegendPosition::UpperRight)),
                (true, true, None),
                (false, false, None),
                (false, true, None),
            ]
        );
        assert_eq!(panels[1].y, Field::WriteMb);
        assert_eq!(panels[1].err, Field::SigmaWriteMb);
        assert_eq!(panels[3].y_range, 0.3..50.0);
    }

    #[test]
    fn ticks() {
        assert_eq!(format_tick(&30000.0), "30000");
        assert_eq!(format_tick(&1.0), "1");
        assert_eq!(format_tick(&0.001), "0.001");
        assert_eq!(format_tick(&0.30000000000000004), "0.3");
        assert_eq!(format_tick(&0.0), "0");
    }
}
