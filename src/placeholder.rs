//! Empty-state visuals drawn on the background layer until a map loads.

use glam::Vec2;

use crate::color::Color;
use crate::geometry::Rect;
use crate::render::Shape;

const BORDER_WIDTH: f32 = 4.0;
const CROSS_WIDTH: f32 = 2.0;

/// A filled world rectangle, a border and both diagonals.
pub fn placeholder_shapes(world: Vec2) -> Vec<Shape> {
    let (w, h) = (world.x, world.y);
    let corners = [Vec2::ZERO, Vec2::new(w, 0.0), Vec2::new(w, h), Vec2::new(0.0, h)];

    let mut shapes = vec![Shape::Rect { rect: Rect::from_origin_size(Vec2::ZERO, world), fill: Color::SLATE }];
    for i in 0..4 {
        shapes.push(Shape::Line {
            from: corners[i],
            to: corners[(i + 1) % 4],
            width: BORDER_WIDTH,
            color: Color::STEEL,
        });
    }
    let diagonal = Color::STEEL.with_alpha(0.5);
    shapes.push(Shape::Line { from: corners[0], to: corners[2], width: CROSS_WIDTH, color: diagonal });
    shapes.push(Shape::Line { from: corners[1], to: corners[3], width: CROSS_WIDTH, color: diagonal });
    shapes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_world_with_border_and_cross() {
        let shapes = placeholder_shapes(Vec2::new(640.0, 480.0));
        assert_eq!(shapes.len(), 7);
        assert!(matches!(shapes[0], Shape::Rect { rect, .. } if rect.max == Vec2::new(640.0, 480.0)));
        let lines = shapes.iter().filter(|s| matches!(s, Shape::Line { .. })).count();
        assert_eq!(lines, 6);
    }
}
