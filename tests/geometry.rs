use battlemap::Vec2;
use battlemap::color::{Color, ColorValue, parse_color, parse_color_str};
use battlemap::geometry::*;
use battlemap::grid::*;

#[test]
fn test_snap_axis() {
    assert_eq!(snap_axis(83.0, 50.0), 75.0);
    assert_eq!(snap_axis(50.0, 50.0), 75.0);
    assert_eq!(snap_axis(49.9, 50.0), 25.0);
    assert_eq!(snap_axis(-1.0, 50.0), -25.0);
}

#[test]
fn test_cell_of_and_center() {
    let p = Vec2::new(130.0, 20.0);
    assert_eq!(cell_of(p, 50.0), (2, 0));
    assert_eq!(cell_center(2, 0, 50.0), Vec2::new(125.0, 25.0));
    assert_eq!(snap_to_cell_center(p, 50.0), cell_center(2, 0, 50.0));
}

#[test]
fn test_clamp_to_world() {
    let world = Vec2::new(150.0, 150.0);
    assert_eq!(snap_within_world(Vec2::new(149.0, 149.0), world, 50.0), Vec2::new(125.0, 125.0));
    assert_eq!(snap_within_world(Vec2::new(400.0, -40.0), world, 50.0), Vec2::new(125.0, 25.0));
}

#[test]
fn test_world_smaller_than_cell() {
    // Inverted range: the half-cell lower bound holds.
    let q = clamp_to_world(Vec2::new(5.0, 5.0), Vec2::new(20.0, 20.0), 50.0);
    assert_eq!(q, Vec2::new(25.0, 25.0));
}

#[test]
fn test_sanitize_cell_size() {
    assert_eq!(sanitize_cell_size(70.0), Some(70.0));
    assert_eq!(sanitize_cell_size(1.0), Some(MIN_CELL_SIZE));
    assert_eq!(sanitize_cell_size(10_000.0), Some(MAX_CELL_SIZE));
    assert_eq!(sanitize_cell_size(0.0), None);
    assert_eq!(sanitize_cell_size(f32::NAN), None);
}

#[test]
fn test_grid_lines_cover_partial_cells() {
    let lines = grid_lines(Vec2::new(120.0, 100.0), 50.0);
    // x: 0, 50, 100, 120  y: 0, 50, 100
    assert_eq!(lines.len(), 7);
    assert!(lines.iter().any(|l| l.from == Vec2::new(120.0, 0.0)));
}

#[test]
fn test_rect_contains_is_half_open() {
    let r = Rect::centered_square(Vec2::new(25.0, 25.0), 50.0);
    assert!(r.contains(Vec2::new(0.0, 0.0)));
    assert!(!r.contains(Vec2::new(50.0, 25.0)));
    assert_eq!(r.center(), Vec2::new(25.0, 25.0));
}

#[test]
fn test_centroid() {
    assert_eq!(centroid(&[]), None);
    let c = centroid(&[Vec2::new(0.0, 0.0), Vec2::new(10.0, 20.0), Vec2::new(f32::NAN, 3.0)]).unwrap();
    assert_eq!(c, Vec2::new(5.0, 10.0));
    let all_bad = centroid(&[Vec2::new(f32::NAN, 4.0), Vec2::new(f32::INFINITY, 8.0)]).unwrap();
    assert_eq!(all_bad, Vec2::new(0.0, 6.0));
}

#[test]
fn test_color_forms() {
    assert_eq!(parse_color_str("#ff0000"), Ok(Color::from_rgb_u32(0xff0000)));
    assert_eq!(parse_color_str("0x00ff00"), Ok(Color::from_rgb_u32(0x00ff00)));
    assert_eq!(parse_color(&ColorValue::Packed(0x0000ff)), Ok(Color::from_rgb_u32(0x0000ff)));
    assert!(parse_color_str("chartreuse-ish").is_err());
    assert_eq!(Color::from_rgb_u32(0x336699).to_hex(), "#336699");
}
