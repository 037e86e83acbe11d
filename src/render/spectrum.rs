//! Composite (MPX) spectrum: mono, pilot, stereo difference, RDS and HD
//! sub-bands as bars, with the pre-emphasis response and clip threshold as
//! overlays.

use std::f32::consts::PI;

use super::{fill, label, line, palette, DisplayList, DrawCommand, Point, Rect, Rgba, SurfaceSize};
use crate::chain::ProcessingChain;
use crate::registry::ModuleId;
use crate::simulator::SignalSnapshot;

/// Frequency span shown across the surface.
pub const SPAN_HZ: f32 = 80_000.0;
/// Full-scale injection for the pilot and RDS bars.
pub const SUBCARRIER_FULL_SCALE: f32 = 20.0;
/// Top of the pre-emphasis overlay scale.
pub const CURVE_MAX_DB: f32 = 20.0;

const CURVE_MIN_HZ: f32 = 30.0;
const CURVE_MAX_HZ: f32 = 15_000.0;
const CURVE_POINTS: usize = 48;

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumBand {
    pub label: &'static str,
    pub start_hz: f32,
    pub end_hz: f32,
    /// Bar height as a fraction of the surface, 0..1.
    pub level: f32,
    pub color: Rgba,
}

/// Time constant in seconds for a pre-emphasis `type` value.
pub fn time_constant(kind: &str) -> Option<f32> {
    match kind {
        "50us" => Some(50e-6),
        "75us" => Some(75e-6),
        _ => None,
    }
}

pub fn corner_frequency(tau: f32) -> f32 {
    1.0 / (2.0 * PI * tau)
}

/// Single-pole high-frequency boost at `freq` for time constant `tau`.
pub fn preemphasis_boost_db(freq: f32, tau: f32) -> f32 {
    let ratio = freq / corner_frequency(tau);
    10.0 * (1.0 + ratio * ratio).log10()
}

fn x_for(freq: f32, width: f32) -> f32 {
    (freq / SPAN_HZ).clamp(0.0, 1.0) * width
}

pub fn bands(snapshot: &SignalSnapshot) -> Vec<SpectrumBand> {
    let unit = |v: f32, full: f32| (v / full).clamp(0.0, 1.0);
    vec![
        SpectrumBand {
            label: "L+R",
            start_hz: 0.0,
            end_hz: 15_000.0,
            level: unit(snapshot.mono, 100.0),
            color: palette::ACCENT,
        },
        SpectrumBand {
            label: "19k",
            start_hz: 18_500.0,
            end_hz: 19_500.0,
            level: unit(snapshot.pilot, SUBCARRIER_FULL_SCALE),
            color: palette::TRACE,
        },
        SpectrumBand {
            label: "L-R",
            start_hz: 23_000.0,
            end_hz: 53_000.0,
            level: unit(snapshot.difference, 100.0),
            color: palette::ACCENT.with_alpha(180),
        },
        SpectrumBand {
            label: "RDS 57k",
            start_hz: 56_000.0,
            end_hz: 58_000.0,
            level: unit(snapshot.rds, SUBCARRIER_FULL_SCALE),
            color: palette::WARM,
        },
        SpectrumBand {
            label: "HD",
            start_hz: 62_000.0,
            end_hz: 74_500.0,
            level: unit(snapshot.hd, 100.0),
            color: palette::HD,
        },
    ]
}

/// The pre-emphasis time constant in effect, if the module is on and not
/// set to `none`.
pub fn active_time_constant(chain: &ProcessingChain) -> Option<f32> {
    chain
        .active_module(ModuleId::PreEmphasis)
        .and_then(|m| time_constant(m.choice("type")))
}

/// Overlay curve points across the mono band, log-spaced in frequency.
pub fn preemphasis_curve(tau: f32, size: SurfaceSize) -> Vec<Point> {
    let log_min = CURVE_MIN_HZ.ln();
    let log_max = CURVE_MAX_HZ.ln();
    (0..CURVE_POINTS)
        .map(|i| {
            let t = i as f32 / (CURVE_POINTS - 1) as f32;
            let freq = (log_min + t * (log_max - log_min)).exp();
            let unit = (preemphasis_boost_db(freq, tau) / CURVE_MAX_DB).clamp(0.0, 1.0);
            Point::new(x_for(freq, size.width), size.height - unit * size.height)
        })
        .collect()
}

/// Clip threshold on the 0–100 scale when the clipper is on.
pub fn clip_line(chain: &ProcessingChain) -> Option<f32> {
    chain
        .active_module(ModuleId::CompositeClipper)
        .map(|m| m.number("threshold"))
}

pub fn render(chain: &ProcessingChain, snapshot: &SignalSnapshot, size: SurfaceSize) -> DisplayList {
    let width = size.width;
    let height = size.height;
    let mut out = vec![DrawCommand::Clear { color: palette::BG }];

    for i in 0..=6 {
        let y = height * (i as f32 / 6.0);
        out.push(line(Point::new(0.0, y), Point::new(width, y), palette::GRID, 1.0));
    }

    for freq in [0.0, 19_000.0, 38_000.0, 57_000.0, 76_000.0] {
        let x = x_for(freq, width);
        out.push(line(Point::new(x, 0.0), Point::new(x, height), palette::GRID, 1.0));
        out.push(label(format!("{:.0}k", freq / 1000.0), x + 4.0, height - 14.0, 11.0, palette::LABEL));
    }

    let dim = !chain.enabled();
    for band in bands(snapshot) {
        let x0 = x_for(band.start_hz, width);
        let x1 = x_for(band.end_hz, width).max(x0 + 2.0);
        let bar_h = band.level * height * 0.9;
        let color = if dim { palette::MUTED } else { band.color };
        out.push(fill(Rect::new(x0, height - bar_h, x1 - x0, bar_h), color));
        out.push(label(band.label, x0 + 2.0, (height - bar_h - 14.0).max(2.0), 11.0, palette::LABEL));
    }

    if let Some(tau) = active_time_constant(chain) {
        out.push(DrawCommand::Polyline {
            points: preemphasis_curve(tau, size),
            color: palette::WARM,
            width: 2.0,
        });
        out.push(label(
            format!("pre-emph {:.0} µs, fc {:.0} Hz", tau * 1e6, corner_frequency(tau)),
            6.0,
            8.0,
            12.0,
            palette::WARM,
        ));
    }

    if let Some(threshold) = clip_line(chain) {
        let y = height - (threshold / 100.0).clamp(0.0, 1.0) * height;
        out.push(line(Point::new(0.0, y), Point::new(width, y), palette::DANGER, 1.5));
        out.push(label(
            format!("clip {:.1}%", threshold),
            width - 80.0,
            (y - 14.0).max(2.0),
            11.0,
            palette::DANGER,
        ));
    }

    if dim {
        out.push(label("CHAIN OFF", width / 2.0 - 30.0, height / 2.0, 14.0, palette::MUTED));
    }

    out
}
