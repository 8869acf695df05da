// geometry.rs

use geojson::Value;

/// Longitude/latitude extent: [min_lon, min_lat, max_lon, max_lat].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    fn from_point(c: &[f64]) -> Option<Bounds> {
        match c {
            [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Some(Bounds {
                min_lon: *lon,
                min_lat: *lat,
                max_lon: *lon,
                max_lat: *lat,
            }),
            _ => None,
        }
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }
}

fn extend_with(bounds: &mut Option<Bounds>, c: &[f64]) {
    if let Some(point) = Bounds::from_point(c) {
        *bounds = Some(match *bounds {
            Some(b) => b.union(point),
            None => point,
        });
    }
}

/// Grows `bounds` to cover every coordinate of `value`.
pub fn extend_bounds(bounds: &mut Option<Bounds>, value: &Value) {
    match value {
        Value::Point(c) => extend_with(bounds, c),
        Value::MultiPoint(coords) | Value::LineString(coords) => {
            for c in coords {
                extend_with(bounds, c);
            }
        }
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            for line in lines {
                for c in line {
                    extend_with(bounds, c);
                }
            }
        }
        Value::MultiPolygon(polygons) => {
            for polygon in polygons {
                for ring in polygon {
                    for c in ring {
                        extend_with(bounds, c);
                    }
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                extend_bounds(bounds, &geometry.value);
            }
        }
    }
}

/// Polylines to draw for a geometry. Polygons contribute their rings,
/// points are returned separately by [`points_of`].
pub fn paths_of(value: &Value) -> Vec<Vec<(f64, f64)>> {
    fn path(coords: &[Vec<f64>]) -> Vec<(f64, f64)> {
        coords
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| (c[0], c[1]))
            .collect()
    }

    match value {
        Value::Point(_) | Value::MultiPoint(_) => Vec::new(),
        Value::LineString(line) => vec![path(line)],
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            lines.iter().map(|l| path(l)).collect()
        }
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .flat_map(|polygon| polygon.iter().map(|ring| path(ring)))
            .collect(),
        Value::GeometryCollection(geometries) => {
            geometries.iter().flat_map(|g| paths_of(&g.value)).collect()
        }
    }
}

pub fn points_of(value: &Value) -> Vec<(f64, f64)> {
    match value {
        Value::Point(c) if c.len() >= 2 => vec![(c[0], c[1])],
        Value::MultiPoint(coords) => coords
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| (c[0], c[1]))
            .collect(),
        Value::GeometryCollection(geometries) => {
            geometries.iter().flat_map(|g| points_of(&g.value)).collect()
        }
        _ => Vec::new(),
    }
}

fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Planar distance in degrees from `p` to the nearest part of `value`.
pub fn distance_to(value: &Value, p: (f64, f64)) -> Option<f64> {
    let mut best: Option<f64> = None;
    let mut consider = |d: f64| {
        best = Some(best.map_or(d, |b: f64| b.min(d)));
    };

    for (x, y) in points_of(value) {
        consider(((p.0 - x).powi(2) + (p.1 - y).powi(2)).sqrt());
    }
    for path in paths_of(value) {
        match path.as_slice() {
            [] => {}
            [only] => consider(segment_distance(p, *only, *only)),
            _ => {
                for pair in path.windows(2) {
                    consider(segment_distance(p, pair[0], pair[1]));
                }
            }
        }
    }
    best
}

/// The lon/lat window shown on the map canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBounds {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl Default for ViewBounds {
    /// Colombo at roughly city zoom.
    fn default() -> Self {
        ViewBounds {
            x: [79.7612, 79.9612],
            y: [6.8571, 6.9971],
        }
    }
}

impl ViewBounds {
    const PADDING: f64 = 0.1;
    const EPSILON: f64 = 0.001;
    const MIN_SPAN: f64 = 1e-5;

    /// Fits `bounds` with 10% padding, clamped to the globe.
    pub fn fit(bounds: Bounds) -> ViewBounds {
        let lon_range = (bounds.max_lon - bounds.min_lon).max(Self::EPSILON);
        let lat_range = (bounds.max_lat - bounds.min_lat).max(Self::EPSILON);
        let lon_padding = lon_range * Self::PADDING;
        let lat_padding = lat_range * Self::PADDING;

        let center_lon = (bounds.min_lon + bounds.max_lon) / 2.0;
        let center_lat = (bounds.min_lat + bounds.max_lat) / 2.0;
        let half_lon = lon_range / 2.0 + lon_padding;
        let half_lat = lat_range / 2.0 + lat_padding;

        ViewBounds {
            x: [
                (center_lon - half_lon).max(-180.0),
                (center_lon + half_lon).min(180.0),
            ],
            y: [
                (center_lat - half_lat).max(-90.0),
                (center_lat + half_lat).min(90.0),
            ],
        }
    }

    /// Scales the window by `factor` (below 1 zooms in), keeping `anchor`
    /// at the same spot on screen.
    pub fn zoom(&self, factor: f64, anchor: (f64, f64)) -> ViewBounds {
        if !factor.is_finite() || factor <= 0.0 {
            return *self;
        }
        let fx = ((anchor.0 - self.x[0]) / self.width()).clamp(0.0, 1.0);
        let fy = ((anchor.1 - self.y[0]) / self.height()).clamp(0.0, 1.0);
        let width = (self.width() * factor).clamp(Self::MIN_SPAN, 360.0);
        let height = (self.height() * factor).clamp(Self::MIN_SPAN, 180.0);
        let x0 = anchor.0 - fx * width;
        let y0 = anchor.1 - fy * height;
        ViewBounds {
            x: slide_inside(x0, width, 180.0),
            y: slide_inside(y0, height, 90.0),
        }
    }

    /// Moves the window by fractions of its own width and height.
    pub fn pan(&self, dx: f64, dy: f64) -> ViewBounds {
        ViewBounds {
            x: slide_inside(self.x[0] + dx * self.width(), self.width(), 180.0),
            y: slide_inside(self.y[0] + dy * self.height(), self.height(), 90.0),
        }
    }

    /// Ground distance across the window at its middle latitude, in meters.
    pub fn ground_width_m(&self) -> f64 {
        let mid_lat = ((self.y[0] + self.y[1]) / 2.0).to_radians();
        self.width() * METERS_PER_DEGREE * mid_lat.cos()
    }

    pub fn width(&self) -> f64 {
        self.x[1] - self.x[0]
    }

    pub fn height(&self) -> f64 {
        self.y[1] - self.y[0]
    }
}

/// Mean length of one degree of longitude at the equator.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Window of `span` starting at `start`, pushed back inside `[-limit, limit]`.
fn slide_inside(start: f64, span: f64, limit: f64) -> [f64; 2] {
    let span = span.min(2.0 * limit);
    let start = start.clamp(-limit, limit - span);
    [start, start + span]
}
