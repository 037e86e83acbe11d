//! Horizontal level-meter bank.

use super::{fill, label, line, palette, DisplayList, DrawCommand, Point, Rect, Rgba, SurfaceSize};
use crate::chain::ProcessingChain;
use crate::registry::ModuleId;
use crate::simulator::SignalSnapshot;

pub const GRADIENT: [(f32, Rgba); 5] = [
    (0.0, Rgba::rgb(34, 197, 94)),
    (0.5, Rgba::rgb(132, 204, 22)),
    (0.7, Rgba::rgb(234, 179, 8)),
    (0.85, Rgba::rgb(249, 115, 22)),
    (1.0, Rgba::rgb(239, 68, 68)),
];

pub const TICKS: [f32; 5] = [0.0, 25.0, 50.0, 75.0, 100.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub label: &'static str,
    pub value: f32,
    pub full_scale: f32,
}

impl MeterReading {
    pub fn fraction(&self) -> f32 {
        (self.value / self.full_scale).clamp(0.0, 1.0)
    }
}

pub fn readings(snapshot: &SignalSnapshot) -> [MeterReading; 7] {
    let r = |label, value, full_scale| MeterReading {
        label,
        value,
        full_scale,
    };
    [
        r("L", snapshot.left, 100.0),
        r("R", snapshot.right, 100.0),
        r("Mono", snapshot.mono, 100.0),
        r("Diff", snapshot.difference, 100.0),
        r("Comp", snapshot.composite, 100.0),
        r("Pilot", snapshot.pilot, 20.0),
        r("RDS", snapshot.rds, 20.0),
    ]
}

pub fn clip_threshold(chain: &ProcessingChain) -> f32 {
    chain
        .active_module(ModuleId::CompositeClipper)
        .map(|m| m.number("threshold"))
        .unwrap_or(100.0)
}

pub fn is_clipping(chain: &ProcessingChain, snapshot: &SignalSnapshot) -> bool {
    snapshot.composite > clip_threshold(chain)
}

pub fn render(chain: &ProcessingChain, snapshot: &SignalSnapshot, size: SurfaceSize) -> DisplayList {
    let w = size.width;
    let h = size.height;
    let gutter = (w * 0.12).clamp(0.0, 48.0);
    let scale_h = 16.0_f32.min(h * 0.2);
    let track_w = (w - gutter - 8.0).max(1.0);
    let rows = readings(snapshot);
    let row_h = ((h - scale_h) / rows.len() as f32).max(1.0);

    let mut out = vec![DrawCommand::Clear { color: palette::BG }];

    for (i, reading) in rows.iter().enumerate() {
        let y = i as f32 * row_h;
        let bar = Rect::new(gutter, y + row_h * 0.2, track_w, row_h * 0.6);
        out.push(label(reading.label, 4.0, y + row_h * 0.25, 11.0, palette::LABEL));
        out.push(fill(bar, palette::GRID));
        out.push(DrawCommand::GradientRect {
            rect: bar,
            stops: GRADIENT.to_vec(),
            extent: if chain.enabled() { reading.fraction() } else { 0.0 },
        });
    }

    for tick in TICKS {
        let x = gutter + tick / 100.0 * track_w;
        out.push(line(
            Point::new(x, 0.0),
            Point::new(x, h - scale_h),
            palette::AXIS.with_alpha(120),
            1.0,
        ));
        out.push(label(format!("{:.0}", tick), x - 6.0, h - scale_h + 2.0, 10.0, palette::LABEL));
    }

    let threshold = clip_threshold(chain);
    let comp_y = 4.0 * row_h;
    let clip_x = gutter + threshold / 100.0 * track_w;
    out.push(line(
        Point::new(clip_x, comp_y),
        Point::new(clip_x, comp_y + row_h),
        palette::DANGER,
        1.5,
    ));

    if is_clipping(chain, snapshot) {
        out.push(fill(Rect::new(w - 44.0, 4.0, 40.0, 18.0), palette::DANGER));
        out.push(label("CLIP", w - 38.0, 6.0, 12.0, Rgba::rgb(255, 255, 255)));
    }
    out
}
