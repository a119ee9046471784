//! Pointer and touch gestures to live segments.
//!
//! Only the previous point of the current gesture is kept; each move is
//! painted immediately.

use crate::compositor::RasterCompositor;
use crate::style::{DrawingStyle, Point};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

/// Gesture events in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureEvent {
    Start { pos: Point, kind: PointerKind },
    Move { pos: Point },
    End,
    /// The pointer left the surface area.
    Leave,
}

/// Where the surface currently sits on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceBounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceBounds {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Translate a screen position into surface pixels, accounting for the
    /// surface being displayed at a different size than its pixel buffer.
    pub fn to_local(&self, screen: Point, surface_width: u32, surface_height: u32) -> Point {
        let sx = if self.width > 0.0 {
            surface_width as f32 / self.width
        } else {
            1.0
        };
        let sy = if self.height > 0.0 {
            surface_height as f32 / self.height
        } else {
            1.0
        };
        Point::new((screen.x - self.left) * sx, (screen.y - self.top) * sy)
    }
}

/// What the host should do with the platform event after tracking it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputResponse {
    /// Skip the platform's default scroll/pan handling.
    pub suppress_default: bool,
}

#[derive(Debug, Default)]
pub struct StrokeInputTracker {
    last: Option<Point>,
    kind: Option<PointerKind>,
}

impl StrokeInputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drawing(&self) -> bool {
        self.last.is_some()
    }

    pub fn handle(
        &mut self,
        event: GestureEvent,
        bounds: &SurfaceBounds,
        compositor: &mut RasterCompositor,
        style: DrawingStyle,
    ) -> InputResponse {
        let (w, h) = (compositor.width(), compositor.height());
        match event {
            GestureEvent::Start { pos, kind } => {
                self.last = Some(bounds.to_local(pos, w, h));
                self.kind = Some(kind);
            }
            GestureEvent::Move { pos } => {
                if let Some(last) = self.last {
                    let next = bounds.to_local(pos, w, h);
                    compositor.apply_segment(last, next, style);
                    self.last = Some(next);
                }
            }
            GestureEvent::End | GestureEvent::Leave => {
                let response = self.response();
                self.last = None;
                self.kind = None;
                return response;
            }
        }
        self.response()
    }

    fn response(&self) -> InputResponse {
        InputResponse {
            suppress_default: self.is_drawing() && self.kind == Some(PointerKind::Touch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{InMemoryReferenceLoader, ReferenceSource};
    use crate::style::{PenColor, PenWidth};
    use image::{Rgba, RgbaImage};

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    async fn surface(w: u32, h: u32) -> RasterCompositor {
        let source = ReferenceSource::new("side.png");
        let loader = InMemoryReferenceLoader::new()
            .with_image(source.clone(), RgbaImage::from_pixel(w, h, Rgba(WHITE)));
        let mut compositor = RasterCompositor::new(w, h);
        compositor.initialize(&loader, &source, None).await.unwrap();
        compositor
    }

    fn style() -> DrawingStyle {
        DrawingStyle::new(PenColor::Blue, PenWidth::Medium)
    }

    #[test]
    fn test_to_local_scales_display_size() {
        let bounds = SurfaceBounds::new(100.0, 50.0, 400.0, 250.0);
        let local = bounds.to_local(Point::new(300.0, 175.0), 800, 500);
        assert_eq!(local, Point::new(400.0, 250.0));
    }

    #[tokio::test]
    async fn test_drag_draws_connected_segments() {
        let mut compositor = surface(60, 40).await;
        let mut tracker = StrokeInputTracker::new();
        let bounds = SurfaceBounds::new(10.0, 10.0, 60.0, 40.0);

        let start = GestureEvent::Start {
            pos: Point::new(15.0, 20.0),
            kind: PointerKind::Mouse,
        };
        tracker.handle(start, &bounds, &mut compositor, style());
        assert!(tracker.is_drawing());
        tracker.handle(GestureEvent::Move { pos: Point::new(40.0, 20.0) }, &bounds, &mut compositor, style());
        tracker.handle(GestureEvent::Move { pos: Point::new(40.0, 45.0) }, &bounds, &mut compositor, style());
        tracker.handle(GestureEvent::End, &bounds, &mut compositor, style());
        assert!(!tracker.is_drawing());

        let blue = PenColor::Blue.rgba();
        let px = |x, y| compositor.pixels().get_pixel(x, y).0;
        assert_eq!(px(15, 10), blue);
        assert_eq!(px(30, 10), blue);
        assert_eq!(px(30, 25), blue);
        assert_eq!(px(15, 30), WHITE);
    }

    #[tokio::test]
    async fn test_moves_without_start_draw_nothing() {
        let mut compositor = surface(30, 30).await;
        let mut tracker = StrokeInputTracker::new();
        let bounds = SurfaceBounds::new(0.0, 0.0, 30.0, 30.0);

        tracker.handle(GestureEvent::Move { pos: Point::new(5.0, 5.0) }, &bounds, &mut compositor, style());
        tracker.handle(GestureEvent::Move { pos: Point::new(25.0, 25.0) }, &bounds, &mut compositor, style());
        assert!(compositor.pixels().pixels().all(|p| p.0 == WHITE));
    }

    #[tokio::test]
    async fn test_leave_ends_the_stroke() {
        let mut compositor = surface(30, 30).await;
        let mut tracker = StrokeInputTracker::new();
        let bounds = SurfaceBounds::new(0.0, 0.0, 30.0, 30.0);

        let start = GestureEvent::Start {
            pos: Point::new(2.0, 2.0),
            kind: PointerKind::Mouse,
        };
        tracker.handle(start, &bounds, &mut compositor, style());
        tracker.handle(GestureEvent::Leave, &bounds, &mut compositor, style());
        tracker.handle(GestureEvent::Move { pos: Point::new(28.0, 28.0) }, &bounds, &mut compositor, style());

        assert_eq!(compositor.pixels().get_pixel(15, 15).0, WHITE);
    }

    #[tokio::test]
    async fn test_touch_suppresses_scrolling_while_drawing() {
        let mut compositor = surface(30, 30).await;
        let mut tracker = StrokeInputTracker::new();
        let bounds = SurfaceBounds::new(0.0, 0.0, 30.0, 30.0);

        let touch = GestureEvent::Start {
            pos: Point::new(2.0, 2.0),
            kind: PointerKind::Touch,
        };
        assert!(tracker.handle(touch, &bounds, &mut compositor, style()).suppress_default);
        let moved = tracker.handle(GestureEvent::Move { pos: Point::new(9.0, 9.0) }, &bounds, &mut compositor, style());
        assert!(moved.suppress_default);
        // the final event of the gesture is still part of the stroke
        assert!(tracker.handle(GestureEvent::End, &bounds, &mut compositor, style()).suppress_default);
        let idle = tracker.handle(GestureEvent::Move { pos: Point::new(3.0, 3.0) }, &bounds, &mut compositor, style());
        assert!(!idle.suppress_default);

        let mouse = GestureEvent::Start {
            pos: Point::new(2.0, 2.0),
            kind: PointerKind::Mouse,
        };
        assert!(!tracker.handle(mouse, &bounds, &mut compositor, style()).suppress_default);
    }

    #[test]
    fn test_gestures_on_loading_surface_are_harmless() {
        let mut compositor = RasterCompositor::new(20, 20);
        let mut tracker = StrokeInputTracker::new();
        let bounds = SurfaceBounds::new(0.0, 0.0, 20.0, 20.0);

        let start = GestureEvent::Start {
            pos: Point::new(1.0, 1.0),
            kind: PointerKind::Mouse,
        };
        tracker.handle(start, &bounds, &mut compositor, style());
        tracker.handle(GestureEvent::Move { pos: Point::new(19.0, 19.0) }, &bounds, &mut compositor, style());
        assert!(compositor.pixels().pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }
}
