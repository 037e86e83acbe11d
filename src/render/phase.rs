//! Phase-correlation scope: a needle rotated by the phase-correction angle
//! and a horizontal −1..+1 correlation bar.

use super::{fill, label, line, palette, DisplayList, DrawCommand, Point, Rect, SurfaceSize};
use crate::chain::ProcessingChain;
use crate::registry::ModuleId;
use crate::simulator::SignalSnapshot;

pub fn correlation_for_rotation(degrees: f32) -> f32 {
    degrees.to_radians().cos()
}

/// Needle endpoints through `center`. 0° points straight up.
pub fn rotation_line(degrees: f32, center: Point, radius: f32) -> (Point, Point) {
    let rad = degrees.to_radians();
    let dx = rad.sin() * radius;
    let dy = rad.cos() * radius;
    (
        Point::new(center.x - dx, center.y + dy),
        Point::new(center.x + dx, center.y - dy),
    )
}

/// Rotation in degrees when phase correction is present, switched on, and
/// its chain is running.
pub fn active_rotation(chain: &ProcessingChain) -> Option<f32> {
    if !chain.enabled() {
        return None;
    }
    chain
        .active_module(ModuleId::PhaseCorrection)
        .map(|m| m.number("rotation"))
}

/// x position of a correlation value on a bar spanning `left..left+width`.
pub fn correlation_x(correlation: f32, left: f32, width: f32) -> f32 {
    left + (correlation.clamp(-1.0, 1.0) + 1.0) / 2.0 * width
}

pub fn render(chain: &ProcessingChain, snapshot: &SignalSnapshot, size: SurfaceSize) -> DisplayList {
    let w = size.width;
    let h = size.height;
    let bar_h = (h * 0.12).max(6.0);
    let bar = Rect::new(w * 0.08, h - bar_h - 18.0, w * 0.84, bar_h);
    let center = Point::new(w / 2.0, (h - bar_h - 24.0) / 2.0);
    let radius = (w.min(h - bar_h - 24.0) * 0.4).max(1.0);

    let mut out = vec![
        DrawCommand::Clear { color: palette::BG },
        DrawCommand::Circle {
            center,
            radius,
            color: palette::GRID,
            filled: false,
        },
        fill(bar, palette::GRID),
    ];
    for (value, text) in [(-1.0, "-1"), (0.0, "0"), (1.0, "+1")] {
        let x = correlation_x(value, bar.x, bar.width);
        out.push(line(
            Point::new(x, bar.y - 3.0),
            Point::new(x, bar.y + bar.height + 3.0),
            palette::AXIS,
            1.0,
        ));
        out.push(label(text, x - 6.0, bar.y + bar.height + 4.0, 11.0, palette::LABEL));
    }

    let Some(rotation) = active_rotation(chain) else {
        out.push(DrawCommand::Circle {
            center,
            radius: radius * 0.25,
            color: palette::MUTED,
            filled: false,
        });
        out.push(line(
            Point::new(center.x - radius * 0.18, center.y - radius * 0.18),
            Point::new(center.x + radius * 0.18, center.y + radius * 0.18),
            palette::MUTED,
            2.0,
        ));
        out.push(label("DISABLED", center.x - 28.0, center.y + radius * 0.35, 13.0, palette::MUTED));
        return out;
    };

    let correlation = correlation_for_rotation(rotation);
    let (from, to) = rotation_line(rotation, center, radius);
    out.push(line(from, to, palette::ACCENT, 2.5));

    let color = if correlation < 0.0 {
        palette::DANGER
    } else if correlation < 0.5 {
        palette::WARM
    } else {
        palette::TRACE
    };
    let zero = correlation_x(0.0, bar.x, bar.width);
    let marker = correlation_x(correlation, bar.x, bar.width);
    out.push(fill(
        Rect::new(zero.min(marker), bar.y, (marker - zero).abs().max(2.0), bar.height),
        color,
    ));
    out.push(label(
        format!("{:+.0}°  corr {:+.2}", rotation, correlation),
        6.0,
        8.0,
        12.0,
        palette::LABEL,
    ));
    if (snapshot.correlation - correlation).abs() > 1e-3 {
        // snapshot lags one tick behind a fresh parameter write
        out.push(label(
            format!("measured {:+.2}", snapshot.correlation),
            6.0,
            24.0,
            11.0,
            palette::MUTED,
        ));
    }
    out
}
