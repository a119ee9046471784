//! Vehicle damage annotation for repair-shop intake.
//!
//! An inspector draws freehand marks over a vehicle outline; the marks are
//! flattened into one JPEG data URI and stored as the vehicle's current
//! inspection record.
//!
//! ```no_run
//! use std::sync::Arc;
//! use damage_annotate::{
//!     FileReferenceLoader, InspectionRecordStore, JsonFileBackend, RasterCompositor,
//!     ReferenceLibrary, VehicleView, DrawingStyle, Point,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let library = ReferenceLibrary::new("assets/views");
//! let mut surface = RasterCompositor::new(800, 500);
//! surface
//!     .initialize(&FileReferenceLoader, &library.source_for(VehicleView::Side), None)
//!     .await?;
//! surface.apply_segment(Point::new(120.0, 80.0), Point::new(160.0, 95.0), DrawingStyle::default());
//!
//! let store = InspectionRecordStore::new(Arc::new(JsonFileBackend::new("data")));
//! let encoded = surface.snapshot(0.8)?;
//! store.save("VIN-123", None, encoded.as_str()).await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod backend;
pub mod codec;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod reference;
pub mod store;
pub mod style;
pub mod tracker;

pub use backend::{BackendError, JsonFileBackend, MemoryBackend, PersistenceBackend};
pub use codec::{decode, encode, EncodedAnnotation, DEFAULT_QUALITY};
pub use compositor::{PriorLayer, RasterCompositor, SurfaceState};
pub use editor::{DamageEditor, EditorEvent};
pub use error::{AnnotateError, Result};
pub use reference::{
    FileReferenceLoader, InMemoryReferenceLoader, ReferenceLibrary, ReferenceLoader,
    ReferenceSource, VehicleView,
};
pub use store::{InspectionRecord, InspectionRecordStore, StoreError, StoreResult};
pub use style::{DrawingStyle, PenColor, PenWidth, Point};
pub use tracker::{GestureEvent, InputResponse, PointerKind, StrokeInputTracker, SurfaceBounds};
