//! Raster compositor for the damage annotation surface.
//!
//! The surface is painted in layers: the reference outline stretched to the
//! surface size, then an optional previously saved annotation stretched over
//! it, then every segment the inspector draws. Segments are burned straight
//! into the pixels; nothing about an individual stroke is retained.

use image::{imageops, imageops::FilterType, Rgba, RgbaImage};
use tracing::{debug, error, info, warn};

use crate::codec::{self, EncodedAnnotation};
use crate::error::{AnnotateError, Result};
use crate::reference::{ReferenceLoader, ReferenceSource};
use crate::style::{DrawingStyle, Point};

/// Lifecycle of a surface. Only `Ready` surfaces accept strokes or snapshots.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceState {
    Loading,
    Ready,
    Failed(String),
}

/// What happened to the prior annotation requested at initialization.
#[derive(Clone, Debug, PartialEq)]
pub enum PriorLayer {
    None,
    Applied,
    Discarded(String),
}

/// Layers fetched for a surface, already scaled to its size.
#[derive(Clone, Debug)]
pub struct SurfaceLayers {
    reference: RgbaImage,
    prior: Option<RgbaImage>,
    prior_status: PriorLayer,
}

/// Fetch the reference image and optional prior annotation for a surface of
/// `width` x `height`.
///
/// This does not touch any compositor, so hosts can run it off the UI thread
/// and hand the result to [`RasterCompositor::install`].
pub async fn load_layers(
    loader: &dyn ReferenceLoader,
    source: &ReferenceSource,
    prior: Option<&EncodedAnnotation>,
    width: u32,
    height: u32,
) -> Result<SurfaceLayers> {
    let reference = loader.load(source).await?;
    let reference = fit(reference, width, height);

    let (prior, prior_status) = match prior {
        None => (None, PriorLayer::None),
        Some(encoded) => match codec::decode(encoded).await {
            Ok(img) => (Some(fit(img, width, height)), PriorLayer::Applied),
            Err(e) => {
                warn!(source = %source, error = %e, "Discarding undecodable prior annotation");
                (None, PriorLayer::Discarded(e.to_string()))
            }
        },
    };

    Ok(SurfaceLayers {
        reference,
        prior,
        prior_status,
    })
}

fn fit(img: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        img
    } else {
        imageops::resize(&img, width, height, FilterType::Triangle)
    }
}

pub struct RasterCompositor {
    width: u32,
    height: u32,
    state: SurfaceState,
    surface: RgbaImage,
    reference: Option<RgbaImage>,
}

impl RasterCompositor {
    /// A blank surface waiting for its reference image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: SurfaceState::Loading,
            surface: RgbaImage::new(width, height),
            reference: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SurfaceState::Ready
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.surface
    }

    /// Load the reference (and optional prior) and paint them.
    ///
    /// A reference failure leaves the surface blank and `Failed` for good.
    pub async fn initialize(
        &mut self,
        loader: &dyn ReferenceLoader,
        source: &ReferenceSource,
        prior: Option<&EncodedAnnotation>,
    ) -> Result<PriorLayer> {
        let layers = load_layers(loader, source, prior, self.width, self.height).await;
        self.install(layers)
    }

    /// Apply the outcome of [`load_layers`].
    pub fn install(&mut self, layers: Result<SurfaceLayers>) -> Result<PriorLayer> {
        if self.state != SurfaceState::Loading {
            return Err(AnnotateError::NotReady);
        }

        let layers = match layers {
            Ok(layers) => layers,
            Err(e) => {
                error!(error = %e, "Reference image failed to load");
                self.state = SurfaceState::Failed(e.to_string());
                return Err(e);
            }
        };

        self.surface = layers.reference.clone();
        if let Some(prior) = &layers.prior {
            imageops::overlay(&mut self.surface, prior, 0, 0);
        }
        self.reference = Some(layers.reference);
        self.state = SurfaceState::Ready;
        info!(
            width = self.width,
            height = self.height,
            prior = ?layers.prior_status,
            "Annotation surface ready"
        );
        Ok(layers.prior_status)
    }

    /// Paint a round-capped segment. Ignored until the surface is ready.
    pub fn apply_segment(&mut self, from: Point, to: Point, style: DrawingStyle) {
        if !self.is_ready() {
            debug!("Dropping segment on surface that is not ready");
            return;
        }
        draw_segment(&mut self.surface, from, to, style.width.pixels(), style.color.rgba());
    }

    /// Back to the bare reference image.
    pub fn clear(&mut self) {
        if let Some(reference) = &self.reference {
            self.surface = reference.clone();
        }
    }

    pub fn snapshot(&self, quality: f32) -> Result<EncodedAnnotation> {
        if !self.is_ready() {
            return Err(AnnotateError::NotReady);
        }
        codec::encode(&self.surface, quality)
    }
}

fn point_to_segment_dist(p: Point, a: Point, b: Point) -> f32 {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let (apx, apy) = (p.x - a.x, p.y - a.y);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq > 0.0 {
        ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.x + abx * t, a.y + aby * t);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Fill every pixel whose centre lies within `thickness / 2` of the segment.
///
/// That capsule shape gives round caps, and consecutive segments sharing an
/// endpoint get round joins for free.
fn draw_segment(img: &mut RgbaImage, from: Point, to: Point, thickness: f32, color: [u8; 4]) {
    let radius = (thickness / 2.0).max(0.5);
    let (w, h) = (img.width() as i64, img.height() as i64);

    let min_x = ((from.x.min(to.x) - radius).floor() as i64).max(0);
    let max_x = ((from.x.max(to.x) + radius).ceil() as i64).min(w - 1);
    let min_y = ((from.y.min(to.y) - radius).floor() as i64).max(0);
    let max_y = ((from.y.max(to.y) + radius).ceil() as i64).min(h - 1);

    for py in min_y..=max_y {
        for px in min_x..=max_x {
            let centre = Point::new(px as f32 + 0.5, py as f32 + 0.5);
            if point_to_segment_dist(centre, from, to) <= radius {
                let pixel = img.get_pixel_mut(px as u32, py as u32);
                blend(pixel, color);
            }
        }
    }
}

fn blend(dst: &mut Rgba<u8>, src: [u8; 4]) {
    let sa = src[3] as u32;
    if sa == 255 {
        dst.0 = src;
        return;
    }
    let da = dst.0[3] as u32;
    let out_a = sa + da * (255 - sa) / 255;
    if out_a == 0 {
        dst.0 = [0, 0, 0, 0];
        return;
    }
    for i in 0..3 {
        let s = src[i] as u32 * sa;
        let d = dst.0[i] as u32 * da * (255 - sa) / 255;
        dst.0[i] = ((s + d) / out_a) as u8;
    }
    dst.0[3] = out_a as u8;
}
