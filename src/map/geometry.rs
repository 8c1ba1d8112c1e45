use crate::braille::BrailleCanvas;

/// Bresenham line
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Closed outline through `points`
pub fn draw_ring(canvas: &mut BrailleCanvas, points: &[(i32, i32)]) {
    if let Some(&first) = points.first() {
        let mut prev = first;
        for &p in points.iter().skip(1).chain(std::iter::once(&first)) {
            draw_line(canvas, prev.0, prev.1, p.0, p.1);
            prev = p;
        }
    }
}

/// Filled disc
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

/// Hollow circle, for marker outlines
pub fn draw_circle_outline(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    let inner = (radius - 1) * (radius - 1);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d = dx * dx + dy * dy;
            if d <= radius * radius && d > inner {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0);
        assert_eq!(canvas.row_to_string(0), "⠉⠉⠉⠉⠉");
    }

    #[test]
    fn test_ring_closes() {
        let mut canvas = BrailleCanvas::new(2, 1);
        draw_ring(&mut canvas, &[(0, 0), (3, 0), (3, 3), (0, 3)]);
        assert_eq!(canvas.row_to_string(0), "⣏⣹");
    }

    #[test]
    fn test_circle_outline_is_hollow() {
        let mut filled = BrailleCanvas::new(4, 2);
        let mut hollow = BrailleCanvas::new(4, 2);
        draw_circle(&mut filled, 4, 4, 3);
        draw_circle_outline(&mut hollow, 4, 4, 3);
        assert!(hollow.cells().count() > 0);
        assert!(hollow.cells().count() <= filled.cells().count());
        // The center dot is only in the filled disc
        let center = |c: &BrailleCanvas| c.row_to_string(1).chars().nth(2);
        assert_ne!(center(&filled), center(&hollow));
    }
}
