use image::RgbImage;

use crate::Rect;

/// Share of the original pixel kept under a highlight, in tenths
const KEEP_TENTHS: u16 = 7;
/// Green added on top of the dimmed pixel (30% of full scale)
const TINT: u16 = 76;

/// Tint the region green in place. Regions outside the image are clipped.
pub fn highlight(image: &mut RgbImage, bbox: Rect) {
    let (width, height) = image.dimensions();
    let Some(region) = bbox.clamp_to(width, height) else {
        return;
    };

    let x0 = region.x as u32;
    let y0 = region.y as u32;
    for y in y0..y0 + region.height {
        for x in x0..x0 + region.width {
            let pixel = image.get_pixel_mut(x, y);
            pixel[0] = dim(pixel[0]);
            pixel[1] = (dim(pixel[1]) as u16 + TINT).min(255) as u8;
            pixel[2] = dim(pixel[2]);
        }
    }
}

fn dim(channel: u8) -> u8 {
    (channel as u16 * KEEP_TENTHS / 10) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn tints_only_inside_box() {
        let mut image = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        highlight(&mut image, Rect::new(1, 1, 2, 2));

        assert_eq!(*image.get_pixel(1, 1), Rgb([70, 146, 70]));
        assert_eq!(*image.get_pixel(2, 2), Rgb([70, 146, 70]));
        assert_eq!(*image.get_pixel(0, 0), Rgb([100, 100, 100]));
        assert_eq!(*image.get_pixel(3, 3), Rgb([100, 100, 100]));
    }

    #[test]
    fn bright_pixels_do_not_overflow() {
        let mut image = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        highlight(&mut image, Rect::new(0, 0, 2, 2));
        assert_eq!(*image.get_pixel(0, 0), Rgb([178, 254, 178]));
    }

    #[test]
    fn box_outside_image_is_ignored() {
        let mut image = RgbImage::from_pixel(2, 2, Rgb([9, 9, 9]));
        highlight(&mut image, Rect::new(5, 5, 3, 3));
        assert!(image.pixels().all(|p| *p == Rgb([9, 9, 9])));
    }
}
