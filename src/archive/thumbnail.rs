//! Thumbnail geometry: centre crop and bounded downscale.

use image::DynamicImage;

/// Share of the frame width kept by the centre crop.
pub const CROP_WIDTH_RATIO: f64 = 0.7;
/// Longest edge of an archived thumbnail.
pub const MAX_THUMBNAIL_EDGE: u32 = 400;

/// Horizontal window `(left, width)` covering the centre `ratio` of `width`.
pub fn center_window(width: u32, ratio: f64) -> (u32, u32) {
    let kept = ((width as f64) * ratio).round() as u32;
    let kept = kept.clamp(1.min(width), width);
    ((width - kept) / 2, kept)
}

/// Keep the horizontal centre of the image at full height.
pub fn crop_center(image: &DynamicImage, ratio: f64) -> DynamicImage {
    let (left, kept) = center_window(image.width(), ratio);
    image.crop_imm(left, 0, kept, image.height())
}

/// Dimensions that fit inside `max_edge` × `max_edge` with the same aspect
/// ratio. Images already inside the box are left alone.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width <= max_edge && height <= max_edge {
        return (width, height);
    }
    let scale = max_edge as f64 / width.max(height) as f64;
    let scaled = |edge: u32| (((edge as f64) * scale).round() as u32).clamp(1, max_edge);
    (scaled(width), scaled(height))
}

/// Centre crop, then downscale to the archive size.
pub fn make_thumbnail(image: &DynamicImage) -> DynamicImage {
    let cropped = crop_center(image, CROP_WIDTH_RATIO);
    let (width, height) = fit_within(cropped.width(), cropped.height(), MAX_THUMBNAIL_EDGE);
    if (width, height) == (cropped.width(), cropped.height()) {
        cropped
    } else {
        cropped.thumbnail_exact(width, height)
    }
}

/// Object name for an archived snapshot: `{plate}_{unix}.jpg`.
///
/// The plate is reduced to ASCII alphanumerics and `-`; anything else becomes
/// `_`. Unreadable plates are named `unreadable`.
pub fn snapshot_file_name(plate: &str, unix_timestamp: i64) -> String {
    let trimmed = plate.trim();
    let stem = if trimmed.is_empty() || trimmed == "?" {
        "unreadable".to_string()
    } else {
        trimmed
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    };
    format!("{}_{}.jpg", stem, unix_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
    }

    #[test]
    fn crop_keeps_rounded_seventy_percent() {
        for (w, h) in [(1920, 1080), (2560, 1440), (641, 480), (1001, 3), (10, 10), (1, 1)] {
            let cropped = crop_center(&blank(w, h), CROP_WIDTH_RATIO);
            assert_eq!(cropped.width(), (w as f64 * 0.7).round() as u32, "width {}", w);
            assert_eq!(cropped.height(), h);
        }
    }

    #[test]
    fn crop_is_centred() {
        assert_eq!(center_window(1920, 0.7), (288, 1344));
        assert_eq!(center_window(100, 0.7), (15, 70));
    }

    #[test]
    fn crop_takes_centre_pixels() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(10, 1, |x, _| {
            image::Rgb([x as u8, 0, 0])
        }));
        let cropped = crop_center(&image, CROP_WIDTH_RATIO).to_rgb8();
        assert_eq!(cropped.width(), 7);
        assert_eq!(cropped.get_pixel(0, 0)[0], 1);
        assert_eq!(cropped.get_pixel(6, 0)[0], 7);
    }

    #[test]
    fn downscale_bounds_both_edges_and_keeps_aspect() {
        for (w, h) in [(1344, 1080), (1792, 1440), (300, 2000), (401, 400), (5000, 7)] {
            let (nw, nh) = fit_within(w, h, MAX_THUMBNAIL_EDGE);
            assert!(nw <= MAX_THUMBNAIL_EDGE && nh <= MAX_THUMBNAIL_EDGE);
            assert_eq!(nw.max(nh), MAX_THUMBNAIL_EDGE);
            let before = w as f64 / h as f64;
            let after = nw as f64 / nh as f64;
            // One pixel of rounding on the short edge.
            let tolerance = before / nh.min(nw) as f64 + 1e-9;
            assert!((before - after).abs() <= tolerance.max(0.01), "{}x{} -> {}x{}", w, h, nw, nh);
        }
    }

    #[test]
    fn small_images_are_not_upscaled() {
        assert_eq!(fit_within(320, 240, MAX_THUMBNAIL_EDGE), (320, 240));
        assert_eq!(fit_within(400, 400, MAX_THUMBNAIL_EDGE), (400, 400));
    }

    #[test]
    fn thumbnail_of_full_hd_frame() {
        let thumb = make_thumbnail(&blank(1920, 1080));
        // 1344x1080 after crop, then scaled to fit 400.
        assert_eq!((thumb.width(), thumb.height()), (400, 321));
    }

    #[test]
    fn file_names_follow_plate_and_timestamp() {
        assert_eq!(snapshot_file_name("ABC123", 1_700_000_000), "ABC123_1700000000.jpg");
        assert_eq!(snapshot_file_name("AB 12/3", 5), "AB_12_3_5.jpg");
        assert_eq!(snapshot_file_name("?", 5), "unreadable_5.jpg");
        assert_eq!(snapshot_file_name("  ", 5), "unreadable_5.jpg");
    }
}
