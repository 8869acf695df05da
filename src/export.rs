// export.rs
//
// PNG snapshot of the classified overlay.

use std::error::Error;
use std::path::Path;

use geojson::Value;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;

use crate::geometry::{self, ViewBounds};
use crate::overlay::Overlay;
use crate::ui_state::BaseMap;

const WIDTH: u32 = 1024;
const HEIGHT: u32 = 768;
const GRATICULE_LINES: u32 = 8;

pub fn background(base_map: BaseMap) -> RGBColor {
    match base_map {
        BaseMap::Positron => RGBColor(0xf2, 0xf2, 0xef),
        BaseMap::Dark => RGBColor(0x0f, 0x17, 0x2a),
        BaseMap::Terrain => RGBColor(0xdf, 0xe6, 0xc8),
    }
}

fn mesh_color(base_map: BaseMap) -> RGBColor {
    match base_map {
        BaseMap::Dark => RGBColor(0x47, 0x55, 0x69),
        _ => RGBColor(0xcb, 0xd5, 0xe1),
    }
}

/// Draws every visible feature with its own color, opacity and stroke width.
///
/// The snapshot carries no text, so it does not depend on system fonts.
pub fn export_png(
    path: &Path,
    overlay: &Overlay,
    view: &ViewBounds,
    base_map: BaseMap,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&background(base_map))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(view.x[0]..view.x[1], view.y[0]..view.y[1])?;

    draw_graticule(&mut chart, view, mesh_color(base_map).mix(0.4))?;

    if overlay.visible {
        for feature in overlay.features() {
            let Some(value) = &feature.geometry else {
                continue;
            };
            let color = feature.style.color.mix(feature.style.opacity);
            let width = feature.style.weight.round().max(1.0) as u32;
            draw_value(&mut chart, value, color, width)?;
        }
    }

    root.present()?;
    Ok(())
}

/// Evenly spaced meridians and parallels across the view.
fn draw_graticule(
    chart: &mut MapChart<'_, '_>,
    view: &ViewBounds,
    color: RGBAColor,
) -> Result<(), Box<dyn Error>> {
    for i in 0..=GRATICULE_LINES {
        let t = f64::from(i) / f64::from(GRATICULE_LINES);
        let lon = view.x[0] + t * view.width();
        let lat = view.y[0] + t * view.height();
        chart.draw_series(LineSeries::new(
            [(lon, view.y[0]), (lon, view.y[1])],
            color,
        ))?;
        chart.draw_series(LineSeries::new(
            [(view.x[0], lat), (view.x[1], lat)],
            color,
        ))?;
    }
    Ok(())
}

type MapChart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn draw_value(
    chart: &mut MapChart<'_, '_>,
    value: &Value,
    color: RGBAColor,
    width: u32,
) -> Result<(), Box<dyn Error>> {
    for path in geometry::paths_of(value) {
        if path.len() >= 2 {
            chart.draw_series(LineSeries::new(path, color.stroke_width(width)))?;
        }
    }
    let points = geometry::points_of(value);
    if !points.is_empty() {
        chart.draw_series(PointSeries::of_element(
            points,
            width + 2,
            color.filled(),
            &|c, s, st| EmptyElement::at(c) + Circle::new((0, 0), s, st),
        ))?;
    }
    Ok(())
}
