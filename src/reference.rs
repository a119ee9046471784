//! Reference images: which vehicle outline is annotated and how it is fetched.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{AnnotateError, Result};

/// One of the fixed outline drawings of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleView {
    #[default]
    Front,
    Back,
    Side,
    Top,
}

impl VehicleView {
    pub const ALL: [VehicleView; 4] = [
        VehicleView::Front,
        VehicleView::Back,
        VehicleView::Side,
        VehicleView::Top,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleView::Front => "front",
            VehicleView::Back => "back",
            VehicleView::Side => "side",
            VehicleView::Top => "top",
        }
    }
}

impl fmt::Display for VehicleView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleView {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" => Ok(VehicleView::Front),
            "back" | "rear" => Ok(VehicleView::Back),
            "side" => Ok(VehicleView::Side),
            "top" => Ok(VehicleView::Top),
            other => Err(format!("unknown vehicle view {other:?}")),
        }
    }
}

/// Location of a reference image.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceSource(PathBuf);

impl ReferenceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Maps each [`VehicleView`] to `<dir>/<view>.png`.
#[derive(Clone, Debug)]
pub struct ReferenceLibrary {
    dir: PathBuf,
}

impl ReferenceLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn source_for(&self, view: VehicleView) -> ReferenceSource {
        ReferenceSource::new(self.dir.join(format!("{}.png", view.as_str())))
    }
}

/// Asynchronously fetches reference images.
#[async_trait]
pub trait ReferenceLoader: Send + Sync {
    async fn load(&self, source: &ReferenceSource) -> Result<RgbaImage>;
}

/// Reads reference images from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileReferenceLoader;

#[async_trait]
impl ReferenceLoader for FileReferenceLoader {
    async fn load(&self, source: &ReferenceSource) -> Result<RgbaImage> {
        let load_error = |reason: String| AnnotateError::ReferenceImageLoad {
            source_path: source.to_string(),
            reason,
        };

        let bytes = tokio::fs::read(source.path())
            .await
            .map_err(|e| load_error(e.to_string()))?;
        tokio::task::spawn_blocking(move || codec::decode_bytes(&bytes))
            .await
            .map_err(|e| load_error(e.to_string()))?
            .map_err(|e| load_error(e.to_string()))
    }
}

/// Serves reference images registered up front; sources not registered fail
/// to load like a missing file would.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReferenceLoader {
    images: HashMap<ReferenceSource, RgbaImage>,
}

impl InMemoryReferenceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, source: ReferenceSource, image: RgbaImage) -> Self {
        self.images.insert(source, image);
        self
    }
}

#[async_trait]
impl ReferenceLoader for InMemoryReferenceLoader {
    async fn load(&self, source: &ReferenceSource) -> Result<RgbaImage> {
        self.images
            .get(source)
            .cloned()
            .ok_or_else(|| AnnotateError::ReferenceImageLoad {
                source_path: source.to_string(),
                reason: "not registered".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_parsing() {
        assert_eq!("FRONT".parse::<VehicleView>().unwrap(), VehicleView::Front);
        assert_eq!("rear".parse::<VehicleView>().unwrap(), VehicleView::Back);
        assert!("underside".parse::<VehicleView>().is_err());
    }

    #[test]
    fn test_library_maps_views_to_files() {
        let library = ReferenceLibrary::new("/assets/views");
        assert_eq!(
            library.source_for(VehicleView::Top).path(),
            Path::new("/assets/views/top.png")
        );
    }

    #[tokio::test]
    async fn test_file_loader_reports_missing_file() {
        let err = FileReferenceLoader
            .load(&ReferenceSource::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotateError::ReferenceImageLoad { .. }));
    }

    #[tokio::test]
    async fn test_file_loader_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front.png");
        RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();

        let img = FileReferenceLoader
            .load(&ReferenceSource::new(&path))
            .await
            .unwrap();
        assert_eq!(img.dimensions(), (4, 3));
    }
}
