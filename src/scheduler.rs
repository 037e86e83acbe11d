//! Refresh-driven render loop over host drawing surfaces.
//!
//! The scheduler never spins its own loop. The host calls
//! [`Engine::frame`](crate::engine::Engine::frame) from its refresh callback,
//! and the scheduler decides whether anything is drawn. Everything here is
//! single-threaded; the cancellation token is an `Rc<Cell<bool>>`.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info};

use crate::chain::ProcessingChain;
use crate::error::{ChainError, ChainResult};
use crate::registry::ChainId;
use crate::render::{self, DisplayList, RendererKind, SurfaceSize};
use crate::simulator::SignalSnapshot;

/// Host-owned drawing target.
pub trait DrawSurface {
    /// False once the host has destroyed the underlying surface.
    fn is_alive(&self) -> bool;
    /// Resize the backing store. Called synchronously from `resize`.
    fn provision(&mut self, width_px: u32, height_px: u32);
    fn present(&mut self, size: SurfaceSize, list: &DisplayList);
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Backing-store pixels for a logical size at a device scale factor.
pub fn backing_pixels(logical: f32, scale: f32) -> u32 {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    if !logical.is_finite() || logical <= 0.0 {
        return 0;
    }
    (logical * scale).round() as u32
}

pub struct VisualizationSurface {
    id: String,
    chain: ChainId,
    kind: RendererKind,
    handle: Box<dyn DrawSurface>,
    logical_width: f32,
    logical_height: f32,
    scale: f32,
    backing: SurfaceSize,
    last_drawn: Option<(u64, u64, SurfaceSize)>,
}

impl VisualizationSurface {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn kind(&self) -> RendererKind {
        self.kind
    }

    pub fn logical_size(&self) -> SurfaceSize {
        SurfaceSize::new(self.logical_width, self.logical_height)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn backing_size(&self) -> SurfaceSize {
        self.backing
    }

    fn provision(&mut self, width: f32, height: f32, scale: f32) {
        self.logical_width = width;
        self.logical_height = height;
        self.scale = scale;
        let w = backing_pixels(width, scale);
        let h = backing_pixels(height, scale);
        self.handle.provision(w, h);
        self.backing = SurfaceSize::new(w as f32, h as f32);
        self.last_drawn = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameReport {
    pub rendered: usize,
    pub skipped: usize,
    pub unchanged: usize,
}

#[derive(Default)]
pub struct RenderScheduler {
    surfaces: BTreeMap<String, VisualizationSurface>,
    token: Option<CancellationToken>,
    /// Set once the surfaces owned by the current token have been dropped.
    halted: bool,
    skip_unchanged: bool,
}

impl RenderScheduler {
    pub fn new(skip_unchanged: bool) -> Self {
        RenderScheduler {
            skip_unchanged,
            ..RenderScheduler::default()
        }
    }

    /// Registers (or replaces) a surface and provisions its backing store.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        chain: ChainId,
        kind: RendererKind,
        handle: Box<dyn DrawSurface>,
        logical_width: f32,
        logical_height: f32,
        scale: f32,
    ) {
        let id = id.into();
        let mut surface = VisualizationSurface {
            id: id.clone(),
            chain,
            kind,
            handle,
            logical_width,
            logical_height,
            scale,
            backing: SurfaceSize::new(0.0, 0.0),
            last_drawn: None,
        };
        surface.provision(logical_width, logical_height, scale);
        debug!(surface = %id, %chain, %kind, "surface registered");
        self.surfaces.insert(id, surface);
    }

    pub fn unregister(&mut self, id: &str) -> ChainResult<()> {
        if self.surfaces.remove(id).is_none() {
            return Err(ChainError::SurfaceUnavailable(id.to_string()));
        }
        debug!(surface = id, "surface unregistered");
        Ok(())
    }

    pub fn resize(&mut self, id: &str, width: f32, height: f32, scale: f32) -> ChainResult<SurfaceSize> {
        let surface = self
            .surfaces
            .get_mut(id)
            .ok_or_else(|| ChainError::SurfaceUnavailable(id.to_string()))?;
        surface.provision(width, height, scale);
        debug!(surface = id, width = surface.backing.width, height = surface.backing.height, "surface resized");
        Ok(surface.backing)
    }

    pub fn surface(&self, id: &str) -> Option<&VisualizationSurface> {
        self.surfaces.get(id)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &VisualizationSurface> {
        self.surfaces.values()
    }

    /// Arms the scheduler and returns the token that stops it.
    pub fn start(&mut self) -> CancellationToken {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_cancelled()) {
            return token.clone();
        }
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        self.halted = false;
        info!(surfaces = self.surfaces.len(), "render scheduler started");
        token
    }

    /// Cancels the token and drops every surface before returning.
    pub fn stop(&mut self) {
        if let Some(token) = &self.token {
            token.cancel();
        }
        self.surfaces.clear();
        self.halted = true;
        info!("render scheduler stopped");
    }

    /// Reacts to a cancelled token. Surfaces registered before the
    /// cancellation are dropped once; surfaces registered afterwards are
    /// kept for the next `start()`. Returns true while cancelled.
    pub fn halt_if_cancelled(&mut self) -> bool {
        if !self.was_cancelled() {
            return false;
        }
        if !self.halted {
            self.surfaces.clear();
            self.halted = true;
            info!("render scheduler cancelled");
        }
        true
    }

    /// Forgets what was last presented for `chain`, so its surfaces are
    /// redrawn on the next frame even if counters repeat.
    pub fn invalidate_chain(&mut self, chain: ChainId) {
        for surface in self.surfaces.values_mut().filter(|s| s.chain == chain) {
            surface.last_drawn = None;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// True after `stop()` or after any token holder cancelled, until the
    /// next `start()`.
    pub fn was_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(|t| t.is_cancelled())
    }

    pub fn state(&self) -> SchedulerState {
        if self.is_armed() && !self.surfaces.is_empty() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn set_skip_unchanged(&mut self, skip: bool) {
        self.skip_unchanged = skip;
    }

    /// Renders every surface once. `lookup` yields the chain and snapshot
    /// for a chain id, or `None` when that chain has been torn down.
    pub fn render_all<'a, F>(&mut self, lookup: F) -> FrameReport
    where
        F: Fn(ChainId) -> Option<(&'a ProcessingChain, &'a SignalSnapshot)>,
    {
        let mut report = FrameReport::default();
        if !self.is_armed() {
            return report;
        }
        for surface in self.surfaces.values_mut() {
            if !surface.handle.is_alive() {
                debug!(surface = %surface.id, "surface gone, skipping");
                report.skipped += 1;
                continue;
            }
            let Some((chain, snapshot)) = lookup(surface.chain) else {
                debug!(surface = %surface.id, chain = %surface.chain, "chain unavailable, skipping");
                report.skipped += 1;
                continue;
            };
            let stamp = (chain.revision(), snapshot.sequence, surface.backing);
            if self.skip_unchanged && surface.last_drawn == Some(stamp) {
                report.unchanged += 1;
                continue;
            }
            let list = render::render(surface.kind, chain, snapshot, surface.backing);
            surface.handle.present(surface.backing, &list);
            surface.last_drawn = Some(stamp);
            report.rendered += 1;
        }
        report
    }
}

#[derive(Debug, Default)]
pub struct Recording {
    pub alive: bool,
    pub provisioned: Vec<(u32, u32)>,
    pub frames: Vec<SurfaceSize>,
    pub last: DisplayList,
}

/// In-memory surface that keeps what it was asked to draw. Clones share
/// the same recording, so a caller can hand one to the scheduler and keep
/// another to inspect.
#[derive(Debug, Clone)]
pub struct RecordingSurface(Rc<RefCell<Recording>>);

impl Default for RecordingSurface {
    fn default() -> Self {
        RecordingSurface(Rc::new(RefCell::new(Recording {
            alive: true,
            ..Recording::default()
        })))
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        RecordingSurface::default()
    }

    pub fn destroy(&self) {
        self.0.borrow_mut().alive = false;
    }

    pub fn frame_count(&self) -> usize {
        self.0.borrow().frames.len()
    }

    pub fn last_frame_size(&self) -> Option<SurfaceSize> {
        self.0.borrow().frames.last().copied()
    }

    pub fn last_provisioned(&self) -> Option<(u32, u32)> {
        self.0.borrow().provisioned.last().copied()
    }

    pub fn last_list(&self) -> DisplayList {
        self.0.borrow().last.clone()
    }
}

impl DrawSurface for RecordingSurface {
    fn is_alive(&self) -> bool {
        self.0.borrow().alive
    }

    fn provision(&mut self, width_px: u32, height_px: u32) {
        self.0.borrow_mut().provisioned.push((width_px, height_px));
    }

    fn present(&mut self, size: SurfaceSize, list: &DisplayList) {
        let mut rec = self.0.borrow_mut();
        rec.frames.push(size);
        rec.last = list.clone();
    }
}
