use crate::font;
use crate::ttf::FontRenderer;
use crate::types::Rect;
use image::{Rgb, RgbImage};

pub const FACE_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
pub const FRAME_COLOR: Rgb<u8> = Rgb([0, 100, 255]);
pub const STATUS_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const BOX_THICKNESS: u32 = 2;

/// Draws boxes and labels onto frames. Uses a TrueType font when one was
/// found, otherwise the built-in bitmap font.
pub struct Annotator {
    font: Option<FontRenderer>,
    font_size_pt: f32,
    text_scale: u32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            font: None,
            font_size_pt: 18.0,
            text_scale: 2,
        }
    }
}

impl Annotator {
    pub fn new(font: Option<FontRenderer>, font_size_pt: f32, text_scale: u32) -> Self {
        Self {
            font,
            font_size_pt,
            text_scale: text_scale.max(1),
        }
    }

    pub fn line_height(&self) -> u32 {
        match &self.font {
            Some(fr) => fr.measure_height(self.font_size_pt),
            None => font::line_height(self.text_scale),
        }
    }

    pub fn draw_text(&self, img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        match &self.font {
            Some(fr) => fr.draw_text(img, x, y, text, color, self.font_size_pt),
            None => font::draw_text_line(img, x, y, text, color, self.text_scale),
        }
    }

    pub fn text_width(&self, text: &str) -> u32 {
        match &self.font {
            Some(fr) => fr.measure_width(text, self.font_size_pt),
            None => font::measure_text_width(text, self.text_scale),
        }
    }

    /// Box outline plus a label just above it, pulled back inside the frame
    /// when the box touches the top or right edge.
    pub fn draw_labeled_box(&self, img: &mut RgbImage, rect: &Rect, label: &str, color: Rgb<u8>) {
        draw_rect(img, rect, color, BOX_THICKNESS);
        let text_y = (rect.y as i32 - self.line_height() as i32).max(0);
        let rightmost = img.width() as i32 - self.text_width(label) as i32;
        let text_x = (rect.x as i32).min(rightmost).max(0);
        self.draw_text(img, text_x, text_y, label, color);
    }
}

/// Hollow rectangle clipped to the image.
pub fn draw_rect(img: &mut RgbImage, rect: &Rect, color: Rgb<u8>, thickness: u32) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let x1 = rect.x.floor() as i32;
    let y1 = rect.y.floor() as i32;
    let x2 = rect.x2().ceil() as i32 - 1;
    let y2 = rect.y2().ceil() as i32 - 1;
    if x2 < x1 || y2 < y1 {
        return;
    }

    let mut put = |x: i32, y: i32| {
        if x >= 0 && x < w && y >= 0 && y < h {
            img.put_pixel(x as u32, y as u32, color);
        }
    };

    for t in 0..thickness as i32 {
        for x in x1..=x2 {
            put(x, y1 + t);
            put(x, y2 - t);
        }
        for y in y1..=y2 {
            put(x1 + t, y);
            put(x2 - t, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_outline_leaves_inside_untouched() {
        let mut img = RgbImage::new(20, 20);
        draw_rect(&mut img, &Rect::new(2.0, 2.0, 10.0, 10.0), FACE_COLOR, 1);
        assert_eq!(*img.get_pixel(2, 2), FACE_COLOR);
        assert_eq!(*img.get_pixel(11, 11), FACE_COLOR);
        assert_eq!(*img.get_pixel(6, 6), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(12, 12), Rgb([0, 0, 0]));
    }

    #[test]
    fn rect_past_edges_is_clipped() {
        let mut img = RgbImage::new(10, 10);
        draw_rect(&mut img, &Rect::new(-5.0, -5.0, 30.0, 30.0), FRAME_COLOR, 2);
        assert_eq!(*img.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn label_lands_inside_frame_at_top_edge() {
        let mut img = RgbImage::new(60, 40);
        let ann = Annotator::default();
        ann.draw_labeled_box(&mut img, &Rect::new(0.0, 0.0, 30.0, 30.0), "happy", FACE_COLOR);
        let row_hits = (0..60).filter(|&x| *img.get_pixel(x, 1) == FACE_COLOR).count();
        assert!(row_hits > 0);
    }

    #[test]
    fn label_is_pulled_in_from_right_edge() {
        let mut img = RgbImage::new(100, 80);
        let ann = Annotator::default();
        assert_eq!(ann.text_width("happy"), 40);
        ann.draw_labeled_box(&mut img, &Rect::new(90.0, 40.0, 10.0, 20.0), "happy", FACE_COLOR);

        // Label rows sit one line height (14) above the box.
        let hits = |xs: std::ops::Range<u32>| {
            (26..40)
                .flat_map(|y| xs.clone().map(move |x| (x, y)))
                .filter(|&(x, y)| *img.get_pixel(x, y) == FACE_COLOR)
                .count()
        };
        assert!(hits(60..90) > 0);
        assert_eq!(hits(0..60), 0);
    }
}
