//! Free-spot search for classes created without an explicit position.
//!
//! Candidates are probed on a spiral around the centroid of what is already on the canvas.
//! The search is purely arithmetic, so the same diagram always yields the same spot.

use std::f64::consts::PI;

use crate::{DiagramElement, Position};

pub const ANGLE_STEP: f64 = PI / 6.0;
pub const INITIAL_RADIUS: f64 = 250.0;
pub const RADIUS_STEP: f64 = 100.0;
pub const ATTEMPTS_PER_RING: usize = 12;
pub const MAX_ATTEMPTS: usize = 60;
pub const MIN_CLEARANCE: f64 = 220.0;
pub const FALLBACK_OFFSET: f64 = 300.0;
pub const CANVAS_MARGIN: f64 = 20.0;
pub const EMPTY_CANVAS_ORIGIN: Position = Position { x: 100.0, y: 100.0 };

/// Position for a new class given the elements already placed.
pub fn calculate_new_class_position(elements: &[DiagramElement]) -> Position {
    let occupied: Vec<Position> = elements.iter().map(|e| e.position).collect();
    find_free_position(&occupied)
}

/// Spiral search over raw occupied points. Used directly when a batch places several classes
/// and earlier picks must count as occupied.
pub fn find_free_position(occupied: &[Position]) -> Position {
    if occupied.is_empty() {
        return EMPTY_CANVAS_ORIGIN;
    }

    let n = occupied.len() as f64;
    let cx = occupied.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = occupied.iter().map(|p| p.y).sum::<f64>() / n;

    for attempt in 0..MAX_ATTEMPTS {
        let radius = INITIAL_RADIUS + RADIUS_STEP * (attempt / ATTEMPTS_PER_RING) as f64;
        let angle = ANGLE_STEP * attempt as f64;
        let candidate = Position::new(
            (cx + radius * angle.cos()).round().max(CANVAS_MARGIN),
            (cy + radius * angle.sin()).round().max(CANVAS_MARGIN),
        );
        if occupied.iter().all(|p| p.distance_to(&candidate) > MIN_CLEARANCE) {
            return candidate;
        }
    }

    // First element with the greatest x wins ties.
    let rightmost = occupied
        .iter()
        .fold(occupied[0], |best, p| if p.x > best.x { *p } else { best });
    Position::new(rightmost.x + FALLBACK_OFFSET, rightmost.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_canvas_uses_the_origin() {
        assert_eq!(find_free_position(&[]), EMPTY_CANVAS_ORIGIN);
    }

    #[test]
    fn single_element_gets_the_first_spiral_point() {
        let spot = find_free_position(&[Position::new(100.0, 100.0)]);
        assert_eq!(spot, Position::new(350.0, 100.0));
    }

    #[test]
    fn crowded_first_points_are_skipped() {
        let occupied = [Position::new(100.0, 100.0), Position::new(350.0, 100.0)];
        // 0°, 30° and 60° are all within clearance of (350, 100); 90° is free.
        assert_eq!(find_free_position(&occupied), Position::new(225.0, 350.0));
    }

    #[test]
    fn placement_is_deterministic() {
        let occupied = [
            Position::new(40.0, 80.0),
            Position::new(420.0, 60.0),
            Position::new(260.0, 330.0),
        ];
        let first = find_free_position(&occupied);
        for _ in 0..10 {
            assert_eq!(find_free_position(&occupied), first);
        }
        assert!(occupied.iter().all(|p| p.distance_to(&first) > MIN_CLEARANCE));
    }

    #[test]
    fn saturated_canvas_falls_back_to_the_right_edge() {
        let mut occupied = Vec::new();
        for i in 0..=10 {
            for j in 0..=10 {
                occupied.push(Position::new(i as f64 * 150.0, j as f64 * 150.0));
            }
        }
        let spot = find_free_position(&occupied);
        assert_eq!(spot, Position::new(1800.0, 0.0));
    }
}
