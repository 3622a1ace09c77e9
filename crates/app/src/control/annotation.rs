//! Overlay drawing onto the mirrored RGB frame.
//!
//! Everything here clips to the canvas and never fails; overlay geometry has
//! no effect on control decisions.

use gesture_core::{HAND_CONNECTIONS, LandmarkList};
use image::{Rgb, RgbImage};

const CYAN: Rgb<u8> = Rgb([0, 255, 255]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const MAGENTA: Rgb<u8> = Rgb([255, 0, 255]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

const TIP_RADIUS: i32 = 10;
const BAR_LEFT: i32 = 30;
const BAR_RIGHT: i32 = 65;
const BAR_TOP: i32 = 125;
const BAR_BOTTOM: i32 = 375;
const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;

/// Pinch feedback for the hand driving the volume.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PinchOverlay {
    pub(crate) thumb: (i32, i32),
    pub(crate) index: (i32, i32),
    pub(crate) center: (i32, i32),
    pub(crate) percent: f32,
    pub(crate) bar_px: f32,
}

/// Where and how the frame rate is printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FpsStyle {
    /// `FPS: 30` in green at the top left.
    Labelled,
    /// Bare number in large magenta digits, used by the tracker view.
    Bare,
}

pub(crate) struct Overlay<'a> {
    pub(crate) hands: &'a [LandmarkList],
    pub(crate) draw_landmarks: bool,
    pub(crate) pinch: Option<PinchOverlay>,
    pub(crate) fps: f32,
    pub(crate) fps_style: FpsStyle,
}

pub(crate) fn render_overlay(canvas: &mut RgbImage, overlay: &Overlay<'_>) {
    if overlay.draw_landmarks {
        for hand in overlay.hands {
            draw_skeleton(canvas, hand);
        }
    }

    if let Some(pinch) = overlay.pinch {
        draw_pinch(canvas, &pinch);
    }

    match overlay.fps_style {
        FpsStyle::Labelled => draw_text(
            canvas,
            20,
            50,
            &format!("FPS: {}", overlay.fps as i32),
            3,
            GREEN,
        ),
        FpsStyle::Bare => draw_text(
            canvas,
            10,
            70,
            &(overlay.fps as i32).to_string(),
            5,
            MAGENTA,
        ),
    }
}

fn draw_pinch(canvas: &mut RgbImage, pinch: &PinchOverlay) {
    let (x1, y1) = pinch.thumb;
    let (x2, y2) = pinch.index;
    fill_circle(canvas, x1, y1, TIP_RADIUS, CYAN);
    fill_circle(canvas, x2, y2, TIP_RADIUS, CYAN);
    draw_line(canvas, x1, y1, x2, y2, 3, CYAN);
    fill_circle(canvas, pinch.center.0, pinch.center.1, TIP_RADIUS, GREEN);

    draw_rectangle(canvas, BAR_LEFT, BAR_TOP, BAR_RIGHT, BAR_BOTTOM, 3, MAGENTA);
    fill_rect(
        canvas,
        BAR_LEFT,
        pinch.bar_px as i32,
        BAR_RIGHT,
        BAR_BOTTOM,
        MAGENTA,
    );
    draw_text(
        canvas,
        30,
        420,
        &format!("{}%", pinch.percent as i32),
        3,
        MAGENTA,
    );
}

fn draw_skeleton(canvas: &mut RgbImage, hand: &LandmarkList) {
    for &(from, to) in HAND_CONNECTIONS.iter() {
        if let (Some(a), Some(b)) = (hand.get(from), hand.get(to)) {
            draw_line(canvas, a.x, a.y, b.x, b.y, 2, WHITE);
        }
    }
    for point in hand {
        fill_circle(canvas, point.x, point.y, 3, RED);
    }
}

fn put_pixel(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_circle(canvas: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    let reach = i64::from(radius);
    let (x, y) = (i64::from(cx), i64::from(cy));
    if x < -reach
        || y < -reach
        || x > i64::from(canvas.width()) + reach
        || y > i64::from(canvas.height()) + reach
    {
        return;
    }
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                put_pixel(canvas, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Bresenham line stamped with a square brush of `thickness` pixels.
fn draw_line(
    canvas: &mut RgbImage,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    thickness: i32,
    color: Rgb<u8>,
) {
    let half = (thickness.max(1) - 1) / 2;
    let extra = (thickness.max(1) - 1) - half;
    let Some(((x0, y0), (x1, y1))) = clip_segment(canvas, (x0, y0), (x1, y1), thickness.max(1))
    else {
        return;
    };
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y) = (x0, y0);
    let mut err = dx + dy;
    loop {
        for oy in -half..=extra {
            for ox in -half..=extra {
                put_pixel(canvas, x + ox, y + oy, color);
            }
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Liang-Barsky clip of a segment to the canvas grown by `margin` pixels on
/// every side. Segments inside the canvas come back unchanged.
fn clip_segment(
    canvas: &RgbImage,
    from: (i32, i32),
    to: (i32, i32),
    margin: i32,
) -> Option<((i32, i32), (i32, i32))> {
    let low = -f64::from(margin);
    let max_x = f64::from(canvas.width()) + f64::from(margin);
    let max_y = f64::from(canvas.height()) + f64::from(margin);
    let (x0, y0) = (f64::from(from.0), f64::from(from.1));
    let (dx, dy) = (f64::from(to.0) - x0, f64::from(to.1) - y0);

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-dx, x0 - low),
        (dx, max_x - x0),
        (-dy, y0 - low),
        (dy, max_y - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }

    let at = |t: f64| ((x0 + t * dx).round() as i32, (y0 + t * dy).round() as i32);
    Some((at(t0), at(t1)))
}

fn draw_rectangle(
    canvas: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    thickness: i32,
    color: Rgb<u8>,
) {
    let t = thickness.max(1);
    fill_rect(canvas, left, top, right, top + t - 1, color);
    fill_rect(canvas, left, bottom - t + 1, right, bottom, color);
    fill_rect(canvas, left, top, left + t - 1, bottom, color);
    fill_rect(canvas, right - t + 1, top, right, bottom, color);
}

fn fill_rect(
    canvas: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: Rgb<u8>,
) {
    let width = canvas.width() as i32;
    let height = canvas.height() as i32;
    let (left, right) = (left.min(right).max(0), left.max(right).min(width - 1));
    let (top, bottom) = (top.min(bottom).max(0), top.max(bottom).min(height - 1));

    for y in top..=bottom {
        for x in left..=right {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Draw `text` with its baseline at `baseline_y`, each font pixel scaled to a
/// `scale` x `scale` block.
fn draw_text(
    canvas: &mut RgbImage,
    x: i32,
    baseline_y: i32,
    text: &str,
    scale: i32,
    color: Rgb<u8>,
) {
    let scale = scale.max(1);
    let top = baseline_y - GLYPH_HEIGHT * scale;
    let mut cursor = x;
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                        let px = cursor + col * scale;
                        let py = top + row as i32 * scale;
                        fill_rect(canvas, px, py, px + scale - 1, py + scale - 1, color);
                    }
                }
            }
        }
        cursor += (GLYPH_WIDTH + 1) * scale;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'F' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000,
        ]),
        'P' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000,
        ]),
        'S' => Some([
            0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '0' => Some([
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ]),
        '1' => Some([
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '2' => Some([
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ]),
        '3' => Some([
            0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110,
        ]),
        '4' => Some([
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ]),
        '5' => Some([
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '6' => Some([
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ]),
        '7' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ]),
        '8' => Some([
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ]),
        '9' => Some([
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ]),
        '%' => Some([
            0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000,
        ]),
        ':' => Some([0, 0b00110, 0b00110, 0, 0b00110, 0b00110, 0]),
        '-' => Some([0, 0, 0, 0b11111, 0, 0, 0]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use gesture_core::Landmark;

    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn canvas() -> RgbImage {
        RgbImage::from_pixel(640, 480, BLACK)
    }

    fn count(canvas: &RgbImage, color: Rgb<u8>) -> usize {
        canvas.pixels().filter(|p| **p == color).count()
    }

    fn pinch(bar_px: f32) -> PinchOverlay {
        PinchOverlay {
            thumb: (200, 200),
            index: (300, 260),
            center: (250, 230),
            percent: 50.0,
            bar_px,
        }
    }

    #[test]
    fn handless_frame_only_gets_fps() {
        let mut image = canvas();
        render_overlay(
            &mut image,
            &Overlay {
                hands: &[],
                draw_landmarks: true,
                pinch: None,
                fps: 29.7,
                fps_style: FpsStyle::Labelled,
            },
        );
        assert_eq!(count(&image, MAGENTA), 0);
        assert_eq!(count(&image, CYAN), 0);
        assert!(count(&image, GREEN) > 0);
        // Text sits above the baseline at y = 50.
        assert!(
            image
                .enumerate_pixels()
                .filter(|(_, _, p)| **p == GREEN)
                .all(|(x, y, _)| (20..200).contains(&x) && (29..50).contains(&y))
        );
    }

    #[test]
    fn pinch_draws_markers_and_bar() {
        let mut image = canvas();
        render_overlay(
            &mut image,
            &Overlay {
                hands: &[],
                draw_landmarks: false,
                pinch: Some(pinch(300.0)),
                fps: 0.0,
                fps_style: FpsStyle::Labelled,
            },
        );
        assert_eq!(*image.get_pixel(200, 200), CYAN);
        assert_eq!(*image.get_pixel(300, 260), CYAN);
        assert_eq!(*image.get_pixel(250, 230), GREEN);
        // Filled part of the bar, bar outline, and the empty part above the fill.
        assert_eq!(*image.get_pixel(47, 340), MAGENTA);
        assert_eq!(*image.get_pixel(30, 150), MAGENTA);
        assert_eq!(*image.get_pixel(47, 200), BLACK);
        // Percent text lands below the bar.
        assert!(
            image
                .enumerate_pixels()
                .any(|(x, y, p)| *p == MAGENTA && y > 390 && y < 420 && x >= 30)
        );
    }

    #[test]
    fn taller_bar_for_louder_level() {
        let mut quiet = canvas();
        let mut loud = canvas();
        for (image, bar_px) in [(&mut quiet, 350.0), (&mut loud, 150.0)] {
            render_overlay(
                image,
                &Overlay {
                    hands: &[],
                    draw_landmarks: false,
                    pinch: Some(pinch(bar_px)),
                    fps: 0.0,
                    fps_style: FpsStyle::Bare,
                },
            );
        }
        assert!(count(&loud, MAGENTA) > count(&quiet, MAGENTA));
    }

    #[test]
    fn skeleton_drawn_for_every_hand() {
        let hand: LandmarkList = (0..21u8)
            .map(|id| Landmark::new(id, 100 + id as i32 * 5, 300))
            .collect();
        let mut other = hand.clone();
        for point in &mut other {
            point.y = 400;
        }
        let mut image = canvas();
        render_overlay(
            &mut image,
            &Overlay {
                hands: &[hand, other],
                draw_landmarks: true,
                pinch: None,
                fps: 0.0,
                fps_style: FpsStyle::Labelled,
            },
        );
        assert_eq!(*image.get_pixel(100, 300), RED);
        assert_eq!(*image.get_pixel(100, 400), RED);
        assert!(count(&image, WHITE) > 0);
    }

    #[test]
    fn off_canvas_geometry_is_clipped() {
        let mut image = RgbImage::from_pixel(40, 30, BLACK);
        render_overlay(
            &mut image,
            &Overlay {
                hands: &[vec![Landmark::new(0, -50, 900)]],
                draw_landmarks: true,
                pinch: Some(PinchOverlay {
                    thumb: (-20, -20),
                    index: (5_000, 5_000),
                    center: (2_490, 2_490),
                    percent: 100.0,
                    bar_px: 125.0,
                }),
                fps: 1234.0,
                fps_style: FpsStyle::Labelled,
            },
        );
        // Only the diagonal pinch line crosses this tiny canvas.
        assert!(count(&image, CYAN) > 0);
    }

    #[test]
    fn extreme_coordinates_are_clipped() {
        let mut image = canvas();
        render_overlay(
            &mut image,
            &Overlay {
                hands: &[vec![
                    Landmark::new(0, i32::MIN, i32::MIN),
                    Landmark::new(1, i32::MAX, i32::MAX),
                ]],
                draw_landmarks: true,
                pinch: Some(PinchOverlay {
                    thumb: (200, 200),
                    index: (i32::MAX, 100),
                    center: (i32::MAX / 2, 150),
                    percent: 100.0,
                    bar_px: f32::MAX,
                }),
                fps: 0.0,
                fps_style: FpsStyle::Labelled,
            },
        );
        assert_eq!(*image.get_pixel(200, 200), CYAN);
        // The line towards the far tip runs off the right edge.
        assert_eq!(*image.get_pixel(639, 200), CYAN);
    }

    #[test]
    fn clipping_keeps_visible_segments() {
        let image = canvas();
        assert_eq!(
            clip_segment(&image, (10, 20), (300, 400), 3),
            Some(((10, 20), (300, 400)))
        );
        assert_eq!(clip_segment(&image, (-100, -100), (-50, -10), 3), None);
        let ((_, _), (x1, y1)) = clip_segment(&image, (0, 100), (i32::MAX, 100), 3).unwrap();
        assert_eq!((x1, y1), (643, 100));
    }
}
