//! End-to-end: draw, save, reopen on top of the saved annotation, draw more, save again.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use damage_annotate::{
    decode, DrawingStyle, GestureEvent, InMemoryReferenceLoader, InspectionRecordStore,
    JsonFileBackend, MemoryBackend, PenColor, PenWidth, Point, PointerKind, PriorLayer,
    RasterCompositor, ReferenceSource, StoreError, StrokeInputTracker, SurfaceBounds,
};

const W: u32 = 120;
const H: u32 = 80;

/// Light background with a dark outline box, standing in for a vehicle drawing.
fn outline() -> RgbaImage {
    RgbaImage::from_fn(W, H, |x, y| {
        let on_box = ((x == 10 || x == W - 10) && (10..H - 10).contains(&y))
            || ((y == 10 || y == H - 10) && (10..W - 10).contains(&x));
        if on_box {
            Rgba([60, 60, 60, 255])
        } else {
            Rgba([245, 245, 245, 255])
        }
    })
}

fn source() -> ReferenceSource {
    ReferenceSource::new("views/side.png")
}

fn loader() -> InMemoryReferenceLoader {
    InMemoryReferenceLoader::new().with_image(source(), outline())
}

/// Channel-wise closeness, tolerant of JPEG drift.
fn close_to(pixel: &Rgba<u8>, expected: [u8; 4], tolerance: i32) -> bool {
    (0..3).all(|i| (pixel.0[i] as i32 - expected[i] as i32).abs() <= tolerance)
}

fn drag(
    compositor: &mut RasterCompositor,
    points: &[(f32, f32)],
    style: DrawingStyle,
) {
    let mut tracker = StrokeInputTracker::new();
    // surface shown at half size, offset on screen
    let bounds = SurfaceBounds::new(200.0, 100.0, W as f32 / 2.0, H as f32 / 2.0);
    let screen = |(x, y): (f32, f32)| Point::new(200.0 + x / 2.0, 100.0 + y / 2.0);

    let (first, rest) = points.split_first().expect("at least one point");
    tracker.handle(
        GestureEvent::Start {
            pos: screen(*first),
            kind: PointerKind::Mouse,
        },
        &bounds,
        compositor,
        style,
    );
    for point in rest {
        tracker.handle(GestureEvent::Move { pos: screen(*point) }, &bounds, compositor, style);
    }
    tracker.handle(GestureEvent::End, &bounds, compositor, style);
}

#[tokio::test]
async fn test_reopen_draw_and_save_keeps_one_record() {
    let backend = Arc::new(MemoryBackend::new());
    let store = InspectionRecordStore::new(backend.clone());
    let red = DrawingStyle::new(PenColor::Red, PenWidth::Thick);
    let blue = DrawingStyle::new(PenColor::Blue, PenWidth::Thick);

    // first session: one red scratch along the top
    let mut first = RasterCompositor::new(W, H);
    first.initialize(&loader(), &source(), None).await.unwrap();
    drag(&mut first, &[(20.0, 30.0), (100.0, 30.0)], red);
    let a = first.snapshot(1.0).unwrap();
    let saved_a = store.save("V1", Some("WO-1"), a.as_str()).await.unwrap();
    assert_eq!(store.get_current("V1").await.unwrap().unwrap().image, a);

    // second session resumes on A and adds a blue dent mark
    let prior = store.get_current("V1").await.unwrap().unwrap().image;
    let mut second = RasterCompositor::new(W, H);
    let status = second
        .initialize(&loader(), &source(), Some(&prior))
        .await
        .unwrap();
    assert_eq!(status, PriorLayer::Applied);
    drag(&mut second, &[(20.0, 60.0), (100.0, 60.0)], blue);
    let b = second.snapshot(1.0).unwrap();
    let saved_b = store.save("V1", Some("WO-1"), b.as_str()).await.unwrap();

    assert_eq!(saved_b.id, saved_a.id);
    assert_eq!(saved_b.created_at, saved_a.created_at);
    assert_eq!(store.get_current("V1").await.unwrap().unwrap().image, b);
    assert_eq!(store.get_history("V1").await.unwrap().len(), 1);

    // B carries both sessions' marks over the outline
    let pixels = decode(&b).await.unwrap();
    assert!(close_to(pixels.get_pixel(60, 30), PenColor::Red.rgba(), 40));
    assert!(close_to(pixels.get_pixel(60, 60), PenColor::Blue.rgba(), 40));
    assert!(close_to(pixels.get_pixel(60, 45), [245, 245, 245, 255], 40));
}

#[tokio::test]
async fn test_rejected_save_touches_nothing() {
    let backend = Arc::new(MemoryBackend::new());
    let store = InspectionRecordStore::new(backend.clone());

    let result = store
        .save("", Some("WO-9"), "data:image/png;base64,AAAA")
        .await;
    assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_records_survive_reopening_the_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut surface = RasterCompositor::new(W, H);
    surface.initialize(&loader(), &source(), None).await.unwrap();
    drag(
        &mut surface,
        &[(30.0, 20.0), (60.0, 50.0), (90.0, 20.0)],
        DrawingStyle::new(PenColor::Black, PenWidth::Medium),
    );
    let encoded = surface.snapshot(0.8).unwrap();

    let store = InspectionRecordStore::new(Arc::new(JsonFileBackend::new(dir.path())));
    let saved = store.save("V7", None, encoded.as_str()).await.unwrap();
    drop(store);

    let reopened = InspectionRecordStore::new(Arc::new(JsonFileBackend::new(dir.path())));
    let current = reopened.get_current("V7").await.unwrap().unwrap();
    assert_eq!(current, saved);
    assert_eq!(current.work_order_id, None);
    assert!(reopened.get_current("V8").await.unwrap().is_none());
}
