//! Goniometer trace built from the level history.
//!
//! Each history sample becomes one point of a Lissajous figure: the two
//! channels are unit sines offset by `acos(correlation)`, scaled by their
//! levels, then rotated 45° so mono content is vertical and out-of-phase
//! content horizontal. Side excursion is scaled by the trace spread.

use std::f32::consts::{FRAC_1_SQRT_2, TAU};

use super::{label, line, palette, DisplayList, DrawCommand, Point, SurfaceSize};
use crate::chain::ProcessingChain;
use crate::registry::ModuleId;
use crate::simulator::{stereo_width, SignalSnapshot};

/// Horizontal spread factor: stereo width widened by enhancer intensity.
pub fn trace_spread(chain: &ProcessingChain) -> f32 {
    let width = stereo_width(chain).unwrap_or(100.0);
    let intensity = chain
        .active_module(ModuleId::Enhancer)
        .map(|m| m.number("intensity"))
        .unwrap_or(0.0);
    (width / 100.0) * (1.0 + 0.5 * intensity / 100.0)
}

/// Trace points around `center` with the given radius.
pub fn trace_points(snapshot: &SignalSnapshot, spread: f32, center: Point, radius: f32) -> Vec<Point> {
    let phase = snapshot.correlation.clamp(-1.0, 1.0).acos();
    let count = snapshot.history.len().max(1) as f32;
    snapshot
        .history
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let theta = TAU * 3.0 * i as f32 / count + snapshot.sequence as f32 * 0.21;
            let l = s.left / 100.0 * theta.sin();
            let r = s.right / 100.0 * (theta + phase).sin();
            let side = (l - r) * FRAC_1_SQRT_2 * spread;
            let mid = (l + r) * FRAC_1_SQRT_2;
            Point::new(
                (center.x + side * radius).clamp(center.x - radius, center.x + radius),
                (center.y - mid * radius).clamp(center.y - radius, center.y + radius),
            )
        })
        .collect()
}

pub fn render(chain: &ProcessingChain, snapshot: &SignalSnapshot, size: SurfaceSize) -> DisplayList {
    let center = Point::new(size.width / 2.0, size.height / 2.0);
    let radius = size.width.min(size.height) * 0.42;
    let mut out = vec![
        DrawCommand::Clear { color: palette::BG },
        DrawCommand::Circle {
            center,
            radius,
            color: palette::GRID,
            filled: false,
        },
        line(
            Point::new(center.x - radius, center.y),
            Point::new(center.x + radius, center.y),
            palette::AXIS,
            1.0,
        ),
        line(
            Point::new(center.x, center.y - radius),
            Point::new(center.x, center.y + radius),
            palette::AXIS,
            1.0,
        ),
        label("M", center.x + 4.0, center.y - radius, 11.0, palette::LABEL),
        label("S", center.x + radius - 10.0, center.y + 4.0, 11.0, palette::LABEL),
    ];

    if !chain.enabled() {
        out.push(DrawCommand::Circle {
            center,
            radius: 3.0,
            color: palette::MUTED,
            filled: true,
        });
        out.push(label("OFF", center.x + 8.0, center.y + 8.0, 14.0, palette::MUTED));
        return out;
    }

    let spread = trace_spread(chain);
    let points = trace_points(snapshot, spread, center, radius);
    if let Some(last) = points.last().copied() {
        out.push(DrawCommand::Polyline {
            points,
            color: palette::TRACE.with_alpha(200),
            width: 1.5,
        });
        out.push(DrawCommand::Circle {
            center: last,
            radius: 2.5,
            color: palette::TRACE,
            filled: true,
        });
    }
    out.push(label(
        format!("corr {:+.2}  spread {:.2}", snapshot.correlation, spread),
        6.0,
        8.0,
        12.0,
        palette::LABEL,
    ));
    out
}
