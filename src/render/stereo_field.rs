//! Stereo-field bar: image width against a log frequency axis, with the
//! bass-kept-mono zone as a narrow strip at the bottom.

use super::{fill, label, line, palette, DisplayList, DrawCommand, Point, Rect, SurfaceSize};
use crate::chain::ProcessingChain;
use crate::registry::{ChainId, ModuleId};
use crate::simulator::{stereo_width, SignalSnapshot};

pub const BASE_WIDTH_RATIO: f32 = 0.45;
pub const MIN_HZ: f32 = 20.0;
pub const MAX_HZ: f32 = 20_000.0;
const MONO_STRIP_RATIO: f32 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldGeometry {
    pub center_x: f32,
    pub half_width: f32,
    /// Row of the mono-bass cutoff; the zone runs from here to the bottom.
    pub bass_zone_top: Option<f32>,
    pub mono_half_width: f32,
}

/// Row for `freq` with 20 Hz at the bottom and 20 kHz at the top.
pub fn frequency_y(freq: f32, height: f32) -> f32 {
    let f = freq.clamp(MIN_HZ, MAX_HZ);
    height - (f / MIN_HZ).ln() / (MAX_HZ / MIN_HZ).ln() * height
}

pub fn field_geometry(chain: &ProcessingChain, size: SurfaceSize) -> FieldGeometry {
    let width = stereo_width(chain).unwrap_or(100.0);
    let image = chain
        .active_module(ModuleId::Enhancer)
        .map(|m| m.number("image_width"))
        .unwrap_or(100.0);
    let position = chain
        .active_module(ModuleId::Panning)
        .map(|m| m.number("position"))
        .unwrap_or(0.0);
    let cutoff = match chain.id() {
        ChainId::Spatial => chain
            .active_module(ModuleId::WidthControl)
            .map(|m| m.number("bass_mono_cutoff")),
        ChainId::Broadcast => None,
    };

    let base = BASE_WIDTH_RATIO * size.width;
    let half_width = (base * (width / 100.0) * (image / 100.0)).clamp(0.0, size.width / 2.0);
    FieldGeometry {
        center_x: size.width / 2.0 + position / 100.0 * size.width / 2.0,
        half_width,
        bass_zone_top: cutoff.map(|f| frequency_y(f, size.height)),
        mono_half_width: (size.width * MONO_STRIP_RATIO).min(half_width.max(1.0)),
    }
}

pub fn render(chain: &ProcessingChain, _snapshot: &SignalSnapshot, size: SurfaceSize) -> DisplayList {
    let w = size.width;
    let h = size.height;
    let geo = field_geometry(chain, size);
    let mut out = vec![DrawCommand::Clear { color: palette::BG }];

    for freq in [100.0, 1_000.0, 10_000.0] {
        let y = frequency_y(freq, h);
        out.push(line(Point::new(0.0, y), Point::new(w, y), palette::GRID, 1.0));
        let text = if freq >= 1_000.0 {
            format!("{:.0}k", freq / 1_000.0)
        } else {
            format!("{:.0}", freq)
        };
        out.push(label(text, 4.0, y - 13.0, 10.0, palette::LABEL));
    }
    out.push(line(Point::new(w / 2.0, 0.0), Point::new(w / 2.0, h), palette::AXIS, 1.0));
    out.push(label("L", 4.0, h / 2.0, 12.0, palette::LABEL));
    out.push(label("R", w - 12.0, h / 2.0, 12.0, palette::LABEL));

    let color = if chain.enabled() { palette::ACCENT } else { palette::MUTED };
    let field_bottom = geo.bass_zone_top.unwrap_or(h);
    out.push(fill(
        Rect::new(geo.center_x - geo.half_width, 0.0, geo.half_width * 2.0, field_bottom),
        color.with_alpha(110),
    ));

    if let Some(top) = geo.bass_zone_top {
        out.push(fill(
            Rect::new(geo.center_x - geo.mono_half_width, top, geo.mono_half_width * 2.0, h - top),
            palette::WARM.with_alpha(170),
        ));
        out.push(line(Point::new(0.0, top), Point::new(w, top), palette::WARM, 1.0));
        out.push(label("mono bass", geo.center_x + geo.mono_half_width + 4.0, top + 2.0, 10.0, palette::WARM));
    }

    out.push(line(
        Point::new(geo.center_x, 0.0),
        Point::new(geo.center_x, h),
        color,
        2.0,
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamValue;
    use approx::assert_relative_eq;

    fn set(chain: &mut ProcessingChain, module: ModuleId, param: &str, v: f32) {
        chain
            .module_mut(module)
            .unwrap()
            .set_parameter(param, ParamValue::Number(v))
            .unwrap();
    }

    #[test]
    fn test_half_width_formula() {
        let mut chain = ProcessingChain::new(ChainId::Spatial);
        set(&mut chain, ModuleId::WidthControl, "width", 120.0);
        set(&mut chain, ModuleId::Enhancer, "image_width", 50.0);
        let geo = field_geometry(&chain, SurfaceSize::new(400.0, 200.0));
        assert_relative_eq!(geo.half_width, 180.0 * 1.2 * 0.5, epsilon = 1e-3);
        assert_relative_eq!(geo.center_x, 200.0);
    }

    #[test]
    fn test_half_width_is_capped() {
        let mut chain = ProcessingChain::new(ChainId::Spatial);
        set(&mut chain, ModuleId::WidthControl, "width", 200.0);
        set(&mut chain, ModuleId::Enhancer, "image_width", 200.0);
        let geo = field_geometry(&chain, SurfaceSize::new(400.0, 200.0));
        assert_relative_eq!(geo.half_width, 200.0);
    }

    #[test]
    fn test_pan_offsets_center() {
        let mut chain = ProcessingChain::new(ChainId::Spatial);
        set(&mut chain, ModuleId::Panning, "position", -50.0);
        let geo = field_geometry(&chain, SurfaceSize::new(400.0, 200.0));
        assert_relative_eq!(geo.center_x, 100.0);
        chain.module_mut(ModuleId::Panning).unwrap().set_enabled(false);
        let geo = field_geometry(&chain, SurfaceSize::new(400.0, 200.0));
        assert_relative_eq!(geo.center_x, 200.0);
    }

    #[test]
    fn test_bass_zone_row() {
        let mut chain = ProcessingChain::new(ChainId::Spatial);
        set(&mut chain, ModuleId::WidthControl, "bass_mono_cutoff", 200.0);
        let geo = field_geometry(&chain, SurfaceSize::new(300.0, 300.0));
        // 200 Hz is one decade above 20 Hz, a third of the way up.
        assert_relative_eq!(geo.bass_zone_top.unwrap(), 200.0, epsilon = 1e-2);

        chain.module_mut(ModuleId::WidthControl).unwrap().set_enabled(false);
        assert!(field_geometry(&chain, SurfaceSize::new(300.0, 300.0)).bass_zone_top.is_none());
    }

    #[test]
    fn test_frequency_axis_ends() {
        assert_relative_eq!(frequency_y(20.0, 100.0), 100.0);
        assert_relative_eq!(frequency_y(20_000.0, 100.0), 0.0, epsilon = 1e-3);
        assert_relative_eq!(frequency_y(5.0, 100.0), 100.0);
    }

    #[test]
    fn test_broadcast_uses_encoder_width() {
        let mut chain = ProcessingChain::new(ChainId::Broadcast);
        set(&mut chain, ModuleId::StereoEncoder, "stereo_width", 50.0);
        let geo = field_geometry(&chain, SurfaceSize::new(400.0, 100.0));
        assert_relative_eq!(geo.half_width, 90.0);
        assert!(geo.bass_zone_top.is_none());
    }
}
