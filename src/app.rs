//! Desktop host for the damage editor: one vehicle, one view, save to the store.

use std::path::Path;
use std::sync::Arc;

use eframe::egui;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::codec::{self, EncodedAnnotation};
use crate::editor::{DamageEditor, EditorEvent};
use crate::reference::VehicleView;
use crate::store::{InspectionRecord, InspectionRecordStore, StoreResult};

pub struct EditorApp {
    runtime: tokio::runtime::Handle,
    store: Arc<InspectionRecordStore>,
    vehicle_id: String,
    work_order_id: Option<String>,
    view: VehicleView,
    editor: DamageEditor,
    saving: Option<oneshot::Receiver<StoreResult<InspectionRecord>>>,
    /// The annotation most recently confirmed by the store.
    saved: Option<EncodedAnnotation>,
    status: String,
}

impl EditorApp {
    pub fn new(
        runtime: tokio::runtime::Handle,
        store: Arc<InspectionRecordStore>,
        vehicle_id: String,
        work_order_id: Option<String>,
        view: VehicleView,
        editor: DamageEditor,
    ) -> Self {
        Self {
            runtime,
            store,
            vehicle_id,
            work_order_id,
            view,
            editor,
            saving: None,
            saved: None,
            status: String::new(),
        }
    }

    fn start_save(&mut self, encoded: String) {
        let (tx, rx) = oneshot::channel();
        let store = Arc::clone(&self.store);
        let vehicle_id = self.vehicle_id.clone();
        let work_order_id = self.work_order_id.clone();
        self.runtime.spawn(async move {
            let result = store
                .save(&vehicle_id, work_order_id.as_deref(), &encoded)
                .await;
            let _ = tx.send(result);
        });
        self.saving = Some(rx);
        self.status = "Saving...".into();
    }

    fn poll_save(&mut self) {
        let Some(rx) = self.saving.as_mut() else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.saving = None;
                self.status = "Save was interrupted".into();
                return;
            }
        };
        self.saving = None;
        // the surface is left as-is either way so a failed save can be retried
        self.status = match outcome {
            Ok(record) => {
                info!(record_id = %record.id, "Editor save completed");
                let status = format!("Saved at {}", record.updated_at.format("%Y-%m-%d %H:%M:%S"));
                self.saved = Some(record.image);
                status
            }
            Err(e) => {
                error!(error = %e, "Editor save failed");
                format!("Save failed: {e}")
            }
        };
    }

    /// Write the last saved annotation to a PNG chosen by the user.
    fn export_png(&mut self) {
        let Some(encoded) = &self.saved else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name(format!("{}-{}.png", self.vehicle_id, self.view))
            .save_file()
        else {
            return;
        };
        self.status = match write_png(encoded, &path) {
            Ok(()) => {
                info!(path = %path.display(), "Exported annotation");
                format!("Exported {}", path.display())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Export failed");
                format!("Export failed: {e}")
            }
        };
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_save();
        if self.saving.is_some() {
            ctx.request_repaint();
        }

        let mut export = false;
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("Vehicle {} ({} view)", self.vehicle_id, self.view));
                if let Some(work_order) = &self.work_order_id {
                    ui.separator();
                    ui.label(format!("Work order {work_order}"));
                }
                ui.separator();
                ui.label(&self.status);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let exportable = self.saved.is_some();
                    if ui
                        .add_enabled(exportable, egui::Button::new("Export PNG"))
                        .on_disabled_hover_text("Save first")
                        .clicked()
                    {
                        export = true;
                    }
                });
            });
        });
        if export {
            self.export_png();
        }

        let mut event = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            event = self.editor.show(ui);
        });

        if let Some(EditorEvent::Save(encoded)) = event {
            self.start_save(encoded.into());
        }
    }
}

fn write_png(encoded: &EncodedAnnotation, path: &Path) -> Result<(), String> {
    let pixels = encoded
        .image_bytes()
        .and_then(|bytes| codec::decode_bytes(&bytes))
        .map_err(|e| e.to_string())?;
    pixels.save(path).map_err(|e| e.to_string())
}
