//! Visualization renderers.
//!
//! Each renderer is a pure function of the chain, its latest snapshot and the
//! surface size, returning a [`DisplayList`] in backing-store pixels. Hosts
//! replay the list onto whatever 2D context they own; the GUI binary paints
//! it on an iced canvas and the CLI just records it.

pub mod meters;
pub mod phase;
pub mod spectrum;
pub mod stereo_field;
pub mod vectorscope;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chain::ProcessingChain;
use crate::simulator::SignalSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect { x, y, width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Rgba { a, ..self }
    }
}

/// Colours shared by every surface.
pub mod palette {
    use super::Rgba;

    pub const BG: Rgba = Rgba::rgb(18, 18, 22);
    pub const GRID: Rgba = Rgba::rgb(50, 40, 60);
    pub const AXIS: Rgba = Rgba::rgb(60, 60, 70);
    pub const LABEL: Rgba = Rgba::rgb(160, 160, 170);
    pub const ACCENT: Rgba = Rgba::rgb(34, 211, 238);
    pub const WARM: Rgba = Rgba::rgb(255, 140, 0);
    pub const TRACE: Rgba = Rgba::rgb(0, 255, 140);
    pub const HD: Rgba = Rgba::rgb(168, 85, 247);
    pub const DANGER: Rgba = Rgba::rgb(239, 68, 68);
    pub const MUTED: Rgba = Rgba::rgb(90, 96, 110);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
}

impl SurfaceSize {
    pub const fn new(width: f32, height: f32) -> Self {
        SurfaceSize { width, height }
    }

    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear {
        color: Rgba,
    },
    FillRect {
        rect: Rect,
        color: Rgba,
    },
    /// Horizontal gradient across `rect`; only the leftmost `extent`
    /// fraction is painted. Stop offsets are relative to the full rect.
    GradientRect {
        rect: Rect,
        stops: Vec<(f32, Rgba)>,
        extent: f32,
    },
    Line {
        from: Point,
        to: Point,
        color: Rgba,
        width: f32,
    },
    Polyline {
        points: Vec<Point>,
        color: Rgba,
        width: f32,
    },
    Circle {
        center: Point,
        radius: f32,
        color: Rgba,
        filled: bool,
    },
    Text {
        content: String,
        position: Point,
        size: f32,
        color: Rgba,
    },
}

pub type DisplayList = Vec<DrawCommand>;

pub(crate) fn line(from: Point, to: Point, color: Rgba, width: f32) -> DrawCommand {
    DrawCommand::Line { from, to, color, width }
}

pub(crate) fn label(content: impl Into<String>, x: f32, y: f32, size: f32, color: Rgba) -> DrawCommand {
    DrawCommand::Text {
        content: content.into(),
        position: Point::new(x, y),
        size,
        color,
    }
}

pub(crate) fn fill(rect: Rect, color: Rgba) -> DrawCommand {
    DrawCommand::FillRect { rect, color }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    Spectrum,
    Vectorscope,
    PhaseCorrelation,
    StereoField,
    LevelMeters,
}

impl RendererKind {
    pub const ALL: [RendererKind; 5] = [
        RendererKind::Spectrum,
        RendererKind::Vectorscope,
        RendererKind::PhaseCorrelation,
        RendererKind::StereoField,
        RendererKind::LevelMeters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RendererKind::Spectrum => "spectrum",
            RendererKind::Vectorscope => "vectorscope",
            RendererKind::PhaseCorrelation => "phase",
            RendererKind::StereoField => "stereo_field",
            RendererKind::LevelMeters => "meters",
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RendererKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "spectrum" => Ok(RendererKind::Spectrum),
            "vectorscope" | "goniometer" => Ok(RendererKind::Vectorscope),
            "phase" | "phase_correlation" => Ok(RendererKind::PhaseCorrelation),
            "stereo_field" | "width" => Ok(RendererKind::StereoField),
            "meters" | "level_meters" => Ok(RendererKind::LevelMeters),
            other => Err(format!("unknown renderer '{}'", other)),
        }
    }
}

pub fn render(
    kind: RendererKind,
    chain: &ProcessingChain,
    snapshot: &SignalSnapshot,
    size: SurfaceSize,
) -> DisplayList {
    if !size.is_drawable() {
        return Vec::new();
    }
    match kind {
        RendererKind::Spectrum => spectrum::render(chain, snapshot, size),
        RendererKind::Vectorscope => vectorscope::render(chain, snapshot, size),
        RendererKind::PhaseCorrelation => phase::render(chain, snapshot, size),
        RendererKind::StereoField => stereo_field::render(chain, snapshot, size),
        RendererKind::LevelMeters => meters::render(chain, snapshot, size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ChainId;
    use crate::simulator::HISTORY_LEN;

    #[test]
    fn test_degenerate_sizes_draw_nothing() {
        let chain = ProcessingChain::new(ChainId::Broadcast);
        let snap = SignalSnapshot::baseline(&chain, HISTORY_LEN);
        for kind in RendererKind::ALL {
            assert!(render(kind, &chain, &snap, SurfaceSize::new(0.0, 100.0)).is_empty());
            assert!(render(kind, &chain, &snap, SurfaceSize::new(f32::NAN, 100.0)).is_empty());
            assert!(render(kind, &chain, &snap, SurfaceSize::new(100.0, -1.0)).is_empty());
        }
    }

    #[test]
    fn test_every_renderer_draws_on_both_chains() {
        for chain_id in ChainId::ALL {
            let chain = ProcessingChain::new(chain_id);
            let snap = SignalSnapshot::baseline(&chain, HISTORY_LEN);
            for kind in RendererKind::ALL {
                let list = render(kind, &chain, &snap, SurfaceSize::new(320.0, 200.0));
                assert!(!list.is_empty(), "{} on {}", kind, chain_id);
            }
        }
    }

    #[test]
    fn test_kind_parses() {
        for kind in RendererKind::ALL {
            assert_eq!(kind.as_str().parse::<RendererKind>().unwrap(), kind);
        }
    }
}
