// palette.rs

use plotters::prelude::RGBColor;

/// Named color ramps offered in the layer panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    Blue,
    Red,
    Green,
    Viridis,
    Magma,
    Plasma,
    Inferno,
    Turbo,
}

impl Ramp {
    pub const ALL: [Ramp; 8] = [
        Ramp::Blue,
        Ramp::Red,
        Ramp::Green,
        Ramp::Viridis,
        Ramp::Magma,
        Ramp::Plasma,
        Ramp::Inferno,
        Ramp::Turbo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Ramp::Blue => "blue",
            Ramp::Red => "red",
            Ramp::Green => "green",
            Ramp::Viridis => "viridis",
            Ramp::Magma => "magma",
            Ramp::Plasma => "plasma",
            Ramp::Inferno => "inferno",
            Ramp::Turbo => "turbo",
        }
    }

    /// Base colors, lightest/darkest first as the ramp is defined.
    pub fn base_colors(self) -> &'static [RGBColor] {
        match self {
            Ramp::Blue => &BLUE,
            Ramp::Red => &RED,
            Ramp::Green => &GREEN,
            Ramp::Viridis => &VIRIDIS,
            Ramp::Magma => &MAGMA,
            Ramp::Plasma => &PLASMA,
            Ramp::Inferno => &INFERNO,
            Ramp::Turbo => &TURBO,
        }
    }

    pub fn next(self) -> Ramp {
        let idx = Ramp::ALL.iter().position(|r| *r == self).unwrap_or(0);
        Ramp::ALL[(idx + 1) % Ramp::ALL.len()]
    }

    pub fn previous(self) -> Ramp {
        let idx = Ramp::ALL.iter().position(|r| *r == self).unwrap_or(0);
        Ramp::ALL[(idx + Ramp::ALL.len() - 1) % Ramp::ALL.len()]
    }
}

const BLUE: [RGBColor; 5] = [
    RGBColor(0xef, 0xf6, 0xff),
    RGBColor(0xbf, 0xdb, 0xfe),
    RGBColor(0x60, 0xa5, 0xfa),
    RGBColor(0x25, 0x63, 0xeb),
    RGBColor(0x1e, 0x3a, 0x8a),
];

const RED: [RGBColor; 5] = [
    RGBColor(0xfe, 0xf2, 0xf2),
    RGBColor(0xfe, 0xca, 0xca),
    RGBColor(0xf8, 0x71, 0x71),
    RGBColor(0xdc, 0x26, 0x26),
    RGBColor(0x99, 0x1b, 0x1b),
];

const GREEN: [RGBColor; 5] = [
    RGBColor(0xf0, 0xfd, 0xf4),
    RGBColor(0xbb, 0xf7, 0xd0),
    RGBColor(0x4a, 0xde, 0x80),
    RGBColor(0x16, 0xa3, 0x4a),
    RGBColor(0x14, 0x53, 0x2d),
];

const VIRIDIS: [RGBColor; 5] = [
    RGBColor(0x44, 0x01, 0x54),
    RGBColor(0x3b, 0x52, 0x8b),
    RGBColor(0x21, 0x91, 0x8c),
    RGBColor(0x5e, 0xc9, 0x62),
    RGBColor(0xfd, 0xe7, 0x25),
];

const MAGMA: [RGBColor; 5] = [
    RGBColor(0x00, 0x00, 0x04),
    RGBColor(0x51, 0x12, 0x7c),
    RGBColor(0xb7, 0x37, 0x79),
    RGBColor(0xfc, 0x89, 0x61),
    RGBColor(0xfc, 0xfd, 0xbf),
];

const PLASMA: [RGBColor; 5] = [
    RGBColor(0x0d, 0x08, 0x87),
    RGBColor(0x6a, 0x00, 0xa8),
    RGBColor(0xb1, 0x2a, 0x90),
    RGBColor(0xe1, 0x64, 0x62),
    RGBColor(0xf0, 0xf9, 0x21),
];

const INFERNO: [RGBColor; 5] = [
    RGBColor(0x00, 0x00, 0x04),
    RGBColor(0x42, 0x0a, 0x68),
    RGBColor(0x93, 0x26, 0x67),
    RGBColor(0xdd, 0x51, 0x3a),
    RGBColor(0xfc, 0xff, 0xa4),
];

const TURBO: [RGBColor; 5] = [
    RGBColor(0x30, 0x12, 0x3b),
    RGBColor(0x46, 0x86, 0xfa),
    RGBColor(0x18, 0xd5, 0x51),
    RGBColor(0xd2, 0xe9, 0x35),
    RGBColor(0xcb, 0x3d, 0x0b),
];

/// Resamples a ramp to `steps` colors by nearest neighbour (no blending).
///
/// Fewer than two steps yields only the ramp's first color. `invert` reverses
/// the resampled sequence.
pub fn interpolated_colors(ramp: Ramp, steps: usize, invert: bool) -> Vec<RGBColor> {
    let base = ramp.base_colors();
    if steps < 2 {
        return vec![base[0]];
    }

    let last = (base.len() - 1) as f64;
    let mut colors: Vec<RGBColor> = (0..steps)
        .map(|i| {
            let t = i as f64 / (steps - 1) as f64;
            let index = (t * last).round() as usize;
            base[index.min(base.len() - 1)]
        })
        .collect();

    if invert {
        colors.reverse();
    }
    colors
}

/// Color for a class id, clamped to the last stop.
pub fn color_for_class(colors: &[RGBColor], class_id: u64) -> RGBColor {
    match colors.len() {
        0 => RGBColor(0x33, 0x33, 0x33),
        len => {
            let idx = usize::try_from(class_id).unwrap_or(usize::MAX).min(len - 1);
            colors[idx]
        }
    }
}
