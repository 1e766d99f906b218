mod common;

use battlemap::color::Color;
use battlemap::geometry::Rect;
use battlemap::render::Node;
use battlemap::{EventKind, FogOptions, GridOptions, LightSpec, PointerEvent, Vec2};
use common::{Harness, kinds, record};
use futures::future::join3;

// -- background & world -------------------------------------------------------

#[test]
fn scenario_c_fog_follows_the_new_world() {
    let mut h = Harness::ready(50.0);
    h.png("maps/keep.png", [60, 60, 60, 255]);

    let fog = h.pool.run_until(h.map.toggle_fog(true, FogOptions::opacity(0.65))).unwrap();
    assert!(fog.enabled);
    let world = h.pool.run_until(h.map.load_map(Some("maps/keep.png"), 1000.0, 800.0));
    assert_eq!(world, Some(Vec2::new(1000.0, 800.0)));

    let (rect, fill) = h.frame().fog_rect().unwrap();
    assert_eq!(rect, Rect::from_origin_size(Vec2::ZERO, Vec2::new(1000.0, 800.0)));
    assert_eq!(fill, Color::BLACK.with_alpha(0.65));
}

#[test]
fn disabling_fog_hides_its_layer() {
    let mut h = Harness::ready(50.0);
    h.pool.run_until(h.map.toggle_fog(true, FogOptions::default()));
    assert!(h.frame().layer("fog").is_some());
    h.pool.run_until(h.map.toggle_fog(false, FogOptions::default()));
    assert!(h.frame().layer("fog").is_none());
    assert_eq!(h.frame().fog_rect(), None);
}

#[test]
fn loaded_map_replaces_placeholder_and_refits_camera() {
    let mut h = Harness::ready(50.0);
    h.png("maps/keep.png", [60, 60, 60, 255]);
    h.pool.run_until(h.map.center_on(100.0, 100.0, Some(3.0)));

    h.pool.run_until(h.map.load_map(Some("maps/keep.png"), 1600.0, 1200.0));
    let frame = h.frame();
    assert!(!frame.has_placeholder());
    assert!(frame.layer("background").unwrap().nodes().any(|n| *n == Node::Background));

    let cam = h.map.camera_state().unwrap();
    assert_eq!(cam.center, Vec2::new(800.0, 600.0));
    assert_eq!(cam.zoom, 0.5);
}

#[test]
fn missing_map_keeps_placeholder_but_resizes_world() {
    let mut h = Harness::ready(50.0);
    let world = h.pool.run_until(h.map.load_map(Some("maps/missing.png"), 900.0, 700.0));
    assert_eq!(world, Some(Vec2::new(900.0, 700.0)));
    assert!(h.frame().has_placeholder());
}

#[test]
fn newer_map_load_wins() {
    let mut h = Harness::ready(50.0);
    h.png("a.png", [1, 1, 1, 255]);
    h.png("b.png", [2, 2, 2, 255]);
    let gate = h.textures.hold();

    let (first, second, ()) = h.pool.run_until(join3(
        h.map.load_map(Some("a.png"), 1000.0, 800.0),
        h.map.load_map(Some("b.png"), 640.0, 640.0),
        async move {
            let _ = gate.send(());
        },
    ));

    assert_eq!(first, None);
    assert_eq!(second, Some(Vec2::new(640.0, 640.0)));
    assert_eq!(h.map.world_size(), Some(Vec2::new(640.0, 640.0)));
}

#[test]
fn world_never_shrinks_below_minimum() {
    let mut h = Harness::ready(50.0);
    let world = h.pool.run_until(h.map.load_map(None, 100.0, 100.0));
    assert_eq!(world, Some(Vec2::splat(512.0)));
}

// -- grid ---------------------------------------------------------------------

#[test]
fn grid_options_clamp_and_hide() {
    let mut h = Harness::ready(50.0);
    let grid = h
        .pool
        .run_until(h.map.set_grid(GridOptions { cell_size: Some(2.0), opacity: Some(4.0), ..GridOptions::default() }))
        .unwrap();
    assert_eq!(grid.cell_size, 8.0);
    assert_eq!(grid.opacity, 1.0);

    h.pool.run_until(h.map.set_grid(GridOptions { visible: Some(false), ..GridOptions::default() }));
    assert_eq!(h.frame().grid_line_count(), 0);
}

#[test]
fn grid_lines_span_the_world() {
    let mut h = Harness::ready(50.0);
    h.pool.run_until(h.map.load_map(None, 1000.0, 800.0));
    // 21 vertical + 17 horizontal lines.
    assert_eq!(h.frame().grid_line_count(), 38);
}

// -- lights -------------------------------------------------------------------

#[test]
fn lights_upsert_and_remove() {
    let mut h = Harness::ready(50.0);
    let log = record(&h.map, &[EventKind::LightUpdate, EventKind::LightRemove]);

    let rec = h.pool.run_until(h.map.add_light(LightSpec::new("torch").at(200.0, 200.0))).unwrap();
    assert_eq!((rec.bright, rec.dim, rec.layer.as_str()), (100.0, 200.0, "lights"));
    h.pool.run_until(h.map.add_light(LightSpec::new("torch").at(250.0, 200.0).radii(60.0, 30.0)));

    let torch = h.map.get_light("torch").unwrap();
    assert_eq!((torch.x, torch.bright, torch.dim), (250.0, 60.0, 60.0));
    let lights = h.frame().layer("lights").unwrap().commands.len();
    assert_eq!(lights, 2);

    assert!(h.pool.run_until(h.map.remove_light("torch")));
    assert!(!h.pool.run_until(h.map.remove_light("torch")));
    assert!(h.frame().layer("lights").unwrap().commands.is_empty());
    assert_eq!(kinds(&log), [EventKind::LightUpdate, EventKind::LightUpdate, EventKind::LightRemove]);
}

// -- camera -------------------------------------------------------------------

#[test]
fn wheel_zooms_within_limits() {
    let h = Harness::ready(50.0);
    let center = Vec2::new(400.0, 300.0);
    h.map.wheel(center, -10_000.0);
    assert_eq!(h.map.camera_state().unwrap().zoom, 5.0);
    h.map.wheel(center, 10_000.0);
    assert_eq!(h.map.camera_state().unwrap().zoom, 0.2);
}

#[test]
fn background_drag_pans_and_coasts() {
    let mut h = Harness::ready(50.0);
    h.pool.run_until(h.map.center_on(400.0, 300.0, Some(2.0)));
    let start = Vec2::new(400.0, 300.0);

    h.map.pointer_down(PointerEvent::new(7, start).at_time(0.0));
    h.map.pointer_move(PointerEvent::new(7, start + Vec2::new(-50.0, 0.0)).at_time(0.05));
    h.map.pointer_up(PointerEvent::new(7, start + Vec2::new(-50.0, 0.0)).at_time(0.05));

    let after_pan = h.map.camera_state().unwrap().center;
    assert_eq!(after_pan, Vec2::new(425.0, 300.0));
    assert!(h.map.tick(0.1));
    assert!(h.map.camera_state().unwrap().center.x > after_pan.x);
}
