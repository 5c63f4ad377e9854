use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let mut image = Image::new(W as u32, H as u32);
    for (y, row) in data.iter().enumerate() {
        for (x, color) in row.iter().enumerate() {
            image.set(x as u32, y as u32, *color);
        }
    }
    image
}

#[test]
fn view() {
    let image = mkimage([[C::RED, C::GREEN]]);

    let view = image.view(Rect::from_top_left(1.0, 0.0, 1.0, 1.0));
    assert_eq!(view.width(), 1);
    assert_eq!(view.height(), 1);
    assert_eq!(view.get(0, 0), C::GREEN);

    // views keep their size, pixels outside the image read as NULL
    let view = image.view(Rect::from_top_left(1.0, 0.0, 3.0, 2.0));
    assert_eq!(view.width(), 3);
    assert_eq!(view.height(), 2);
    assert_eq!(view.get(0, 0), C::GREEN);
    assert_eq!(view.get(1, 0), C::NULL);
    assert_eq!(view.get(0, 1), C::NULL);

    let view = image.view(Rect::from_top_left(-1.0, 0.0, 2.0, 1.0));
    assert_eq!(view.get(0, 0), C::NULL);
    assert_eq!(view.get(1, 0), C::RED);
}

#[test]
fn subview() {
    let image = mkimage([
        [C::RED, C::GREEN, C::BLUE],
        [C::BLACK, C::WHITE, C::YELLOW],
    ]);

    let view = image.view(Rect::from_top_left(1.0, 0.0, 2.0, 2.0));
    let sub = view.view(Rect::from_top_left(1.0, 1.0, 1.0, 1.0));
    assert_eq!(sub.get(0, 0), C::YELLOW);

    let copy = view.to_image();
    assert_eq!(copy.resolution(), Resolution::new(2, 2));
    assert_eq!(copy.get(0, 0), C::GREEN);
    assert_eq!(copy.get(1, 1), C::YELLOW);
}

#[test]
fn view_mut_ignores_outside_writes() {
    let mut image = mkimage([[C::BLACK, C::BLACK]]);
    let mut view = image.view_mut(Rect::from_top_left(1.0, 0.0, 2.0, 1.0));
    view.set(0, 0, C::WHITE);
    view.set(1, 0, C::WHITE);
    assert_eq!(image.get(0, 0), C::BLACK);
    assert_eq!(image.get(1, 0), C::WHITE);
}

#[test]
fn rgba_data() {
    let data = [1, 2, 3, 4, 5, 6, 7, 8];
    let image = Image::from_rgba8(Resolution::new(2, 1), &data);
    assert_eq!(image.get(1, 0), C([5, 6, 7, 8]));
    assert_eq!(image.data(), &data);
}

#[test]
#[should_panic(expected = "incorrect buffer size")]
fn rgba_data_size_mismatch() {
    Image::from_rgba8(Resolution::new(2, 2), &[0; 8]);
}

#[test]
fn luminance() {
    assert_eq!(C::BLACK.luminance(), 0.0);
    approx::assert_relative_eq!(C::WHITE.luminance(), 255.0, epsilon = 1e-3);
    assert!(C::GREEN.luminance() > C::RED.luminance());
    assert!(C::RED.luminance() > C::BLUE.luminance());
}

#[test]
fn draw_rect_outline() {
    let mut image = Image::new(5, 5);
    image.clear(C::BLACK);
    draw::rect(&mut image, Rect::from_top_left(1.0, 1.0, 3.0, 3.0)).color(C::GREEN);

    assert_eq!(image.get(1, 1), C::GREEN);
    assert_eq!(image.get(3, 3), C::GREEN);
    assert_eq!(image.get(2, 2), C::BLACK);
    assert_eq!(image.get(0, 0), C::BLACK);
}

#[test]
fn draw_clips_to_view() {
    let mut image = Image::new(4, 4);
    image.clear(C::BLACK);
    let mut view = image.view_mut(Rect::from_top_left(2.0, 2.0, 2.0, 2.0));
    draw::line(&mut view, -5, 0, 10, 0).color(C::WHITE);

    assert_eq!(image.get(2, 2), C::WHITE);
    assert_eq!(image.get(3, 2), C::WHITE);
    assert_eq!(image.get(1, 2), C::BLACK);
}

#[test]
fn draw_text() {
    let mut image = Image::new(64, 32);
    image.clear(C::BLACK);
    draw::text(&mut image, 2, 2, "happy")
        .align_left()
        .align_top()
        .color(C::GREEN);

    let data = image.data();
    assert!(data.chunks(4).any(|px| px == C::GREEN.0));
}
