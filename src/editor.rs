//! The egui damage editor: toolbar, drawing canvas and a single save output.

use std::sync::Arc;

use eframe::egui;
use tokio::sync::oneshot;
use tracing::error;

use crate::codec::EncodedAnnotation;
use crate::compositor::{self, PriorLayer, RasterCompositor, SurfaceLayers, SurfaceState};
use crate::error::{AnnotateError, Result};
use crate::reference::{ReferenceLoader, ReferenceSource};
use crate::style::{DrawingStyle, PenColor, PenWidth, Point};
use crate::tracker::{GestureEvent, PointerKind, StrokeInputTracker, SurfaceBounds};

/// The only thing the editor reports to its host.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    Save(EncodedAnnotation),
}

pub struct DamageEditor {
    compositor: RasterCompositor,
    tracker: StrokeInputTracker,
    style: DrawingStyle,
    quality: f32,
    pending: Option<oneshot::Receiver<Result<SurfaceLayers>>>,
    texture: Option<egui::TextureHandle>,
    texture_stale: bool,
    notice: Option<String>,
}

impl DamageEditor {
    /// Start loading `reference` (and `prior`, if any) on `runtime`.
    pub fn open(
        runtime: &tokio::runtime::Handle,
        loader: Arc<dyn ReferenceLoader>,
        reference: ReferenceSource,
        prior: Option<EncodedAnnotation>,
        size: (u32, u32),
        quality: f32,
    ) -> Self {
        let (tx, rx) = oneshot::channel();
        let (width, height) = size;
        runtime.spawn(async move {
            let layers =
                compositor::load_layers(&*loader, &reference, prior.as_ref(), width, height).await;
            let _ = tx.send(layers);
        });

        Self {
            compositor: RasterCompositor::new(width, height),
            tracker: StrokeInputTracker::new(),
            style: DrawingStyle::default(),
            quality,
            pending: Some(rx),
            texture: None,
            texture_stale: true,
            notice: None,
        }
    }

    pub fn state(&self) -> &SurfaceState {
        self.compositor.state()
    }

    fn poll_load(&mut self) {
        let Some(rx) = self.pending.as_mut() else {
            return;
        };
        let layers = match rx.try_recv() {
            Ok(layers) => layers,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(AnnotateError::ReferenceImageLoad {
                    source_path: String::new(),
                    reason: "load task ended without a result".into(),
                })
            }
        };
        self.pending = None;

        match self.compositor.install(layers) {
            Ok(PriorLayer::Discarded(reason)) => {
                self.notice = Some(format!("Previous annotation could not be shown: {reason}"));
            }
            Ok(_) => {}
            Err(e) => self.notice = Some(e.to_string()),
        }
        self.texture_stale = true;
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if !self.texture_stale && self.texture.is_some() {
            return;
        }
        let rgba = self.compositor.pixels();
        let size = [rgba.width() as usize, rgba.height() as usize];
        let pixels = rgba.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
        match self.texture.as_mut() {
            Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.texture =
                    Some(ctx.load_texture("damage-surface", color_image, egui::TextureOptions::LINEAR))
            }
        }
        self.texture_stale = false;
    }

    pub fn show(&mut self, ui: &mut egui::Ui) -> Option<EditorEvent> {
        self.poll_load();
        if self.pending.is_some() {
            ui.ctx().request_repaint();
        }

        let event = self.toolbar(ui);

        match self.compositor.state() {
            SurfaceState::Loading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading reference image...");
                });
            }
            SurfaceState::Failed(reason) => {
                ui.colored_label(
                    egui::Color32::from_rgb(200, 40, 40),
                    format!("Reference image failed to load: {reason}"),
                );
            }
            SurfaceState::Ready => {
                if let Some(notice) = &self.notice {
                    ui.colored_label(egui::Color32::from_rgb(200, 140, 0), notice);
                }
            }
        }

        self.canvas(ui);
        event
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) -> Option<EditorEvent> {
        let mut event = None;
        let ready = self.compositor.is_ready();

        ui.horizontal(|ui| {
            for color in PenColor::ALL {
                let label = egui::RichText::new(color.label()).color(color.to_egui());
                ui.selectable_value(&mut self.style.color, color, label);
            }
            ui.separator();
            for width in PenWidth::ALL {
                ui.selectable_value(&mut self.style.width, width, width.label());
            }
            ui.separator();
            if ui.add_enabled(ready, egui::Button::new("Clear")).clicked() {
                self.compositor.clear();
                self.texture_stale = true;
            }
            if ui.add_enabled(ready, egui::Button::new("Save")).clicked() {
                match self.compositor.snapshot(self.quality) {
                    Ok(encoded) => event = Some(EditorEvent::Save(encoded)),
                    Err(e) => error!(error = %e, "Snapshot failed"),
                }
            }
        });
        event
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        self.ensure_texture(ui.ctx());

        let surface = egui::vec2(
            self.compositor.width() as f32,
            self.compositor.height() as f32,
        );
        let available = ui.available_size();
        let scale = (available.x / surface.x).min(available.y / surface.y).clamp(0.1, 1.0);
        let (response, painter) = ui.allocate_painter(surface * scale, egui::Sense::drag());
        let rect = response.rect;

        painter.rect_filled(rect, 0.0, egui::Color32::from_gray(40));
        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        let bounds = SurfaceBounds::new(rect.min.x, rect.min.y, rect.width(), rect.height());
        for gesture in gestures(ui, &response, rect, self.tracker.is_drawing()) {
            let outcome = self
                .tracker
                .handle(gesture, &bounds, &mut self.compositor, self.style);
            if outcome.suppress_default {
                ui.ctx().input_mut(|i| i.smooth_scroll_delta = egui::Vec2::ZERO);
            }
            if matches!(gesture, GestureEvent::Move { .. }) {
                self.texture_stale = true;
            }
        }
    }
}

/// Translate this frame's pointer activity over `rect` into gesture events.
fn gestures(
    ui: &egui::Ui,
    response: &egui::Response,
    rect: egui::Rect,
    drawing: bool,
) -> Vec<GestureEvent> {
    let to_point = |p: egui::Pos2| Point::new(p.x, p.y);
    let pointer = response
        .interact_pointer_pos()
        .or_else(|| ui.input(|i| i.pointer.latest_pos()));
    let mut events = Vec::new();

    if response.drag_started_by(egui::PointerButton::Primary) {
        if let Some(pos) = pointer {
            let kind = if ui.input(|i| i.any_touches()) {
                PointerKind::Touch
            } else {
                PointerKind::Mouse
            };
            events.push(GestureEvent::Start {
                pos: to_point(pos),
                kind,
            });
        }
    }

    if drawing || !events.is_empty() {
        match pointer {
            Some(pos) if !rect.contains(pos) => {
                events.push(GestureEvent::Leave);
                return events;
            }
            Some(pos) if response.dragged_by(egui::PointerButton::Primary) => {
                events.push(GestureEvent::Move { pos: to_point(pos) });
            }
            _ => {}
        }
    }

    if response.drag_stopped() {
        events.push(GestureEvent::End);
    }
    events
}
