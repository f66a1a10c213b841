use glance_core::{DrawCommand, Overlay, Point, Recognition, RecordingSurface, Rect, TextElement};
use std::sync::Arc;

#[test]
fn text_result_renders_at_view_scale() {
    let overlay = Overlay::new();
    overlay.set_preview_size(100, 100);

    let result = Recognition::Text(vec![TextElement {
        text: "HELLO".into(),
        bounds: Rect::new(10.0, 10.0, 100.0, 40.0),
    }]);
    overlay.clear();
    for annotation in result.into_annotations() {
        overlay.add(Arc::new(annotation));
    }

    let mut surface = RecordingSurface::new(200, 150);
    assert_eq!(overlay.render_surface(&mut surface), 1);

    let t = overlay.transform();
    assert_eq!((t.width_scale_factor, t.height_scale_factor), (2.0, 1.5));

    match surface.commands() {
        [DrawCommand::StrokeRect { rect, .. }, DrawCommand::Text { text, anchor, .. }] => {
            assert_eq!(*rect, Rect::new(20.0, 15.0, 200.0, 60.0));
            assert_eq!(text, "HELLO");
            assert_eq!(*anchor, Point::new(20.0, 60.0));
        }
        other => panic!("unexpected draw list: {other:?}"),
    }
}

#[test]
fn new_capture_replaces_previous_annotations() {
    let overlay = Overlay::new();
    overlay.set_preview_size(50, 50);
    overlay.add(Arc::new(glance_core::Annotation::Label("old: 0.10".into())));

    overlay.clear();
    overlay.set_preview_size(25, 25);
    let mut surface = RecordingSurface::new(50, 50);
    assert_eq!(overlay.render_surface(&mut surface), 0);
    assert_eq!(overlay.transform().width_scale_factor, 2.0);
}
