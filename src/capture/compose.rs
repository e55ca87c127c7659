use image::{imageops, DynamicImage, RgbaImage};

/// Scales `frame` to cover a `width`x`height` canvas, cropping the overflow
/// around the center. Never letterboxes. Only the visible region is resized,
/// so no buffer larger than the output is allocated.
pub(crate) fn cover_resize(frame: &RgbaImage, width: u32, height: u32) -> Option<RgbaImage> {
    if width == 0 || height == 0 || frame.width() == 0 || frame.height() == 0 {
        return None;
    }
    if frame.dimensions() == (width, height) {
        return Some(frame.clone());
    }

    let (left, top, crop_width, crop_height) = cover_crop(frame.dimensions(), (width, height));
    let visible = imageops::crop_imm(frame, left, top, crop_width, crop_height).to_image();
    Some(imageops::resize(
        &visible,
        width,
        height,
        imageops::FilterType::Triangle,
    ))
}

/// Centered region of `source`, as `(left, top, width, height)`, that fills
/// `target` once uniformly scaled by the larger of the two ratios.
pub(crate) fn cover_crop(source: (u32, u32), target: (u32, u32)) -> (u32, u32, u32, u32) {
    let (source_width, source_height) = (f64::from(source.0), f64::from(source.1));
    let (target_width, target_height) = (f64::from(target.0), f64::from(target.1));
    let scale = (target_width / source_width).max(target_height / source_height);

    let crop_width = ((target_width / scale).round() as u32).clamp(1, source.0);
    let crop_height = ((target_height / scale).round() as u32).clamp(1, source.1);
    (
        (source.0 - crop_width) / 2,
        (source.1 - crop_height) / 2,
        crop_width,
        crop_height,
    )
}

/// Draws `frame` over `base` using the frame's own alpha. Output always has
/// the dimensions of `base`.
pub(crate) fn overlay_frame(base: &DynamicImage, frame: &DynamicImage) -> Option<RgbaImage> {
    let mut canvas = base.to_rgba8();
    let overlay = cover_resize(&frame.to_rgba8(), canvas.width(), canvas.height())?;
    imageops::overlay(&mut canvas, &overlay, 0, 0);
    Some(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn cover_crop_keeps_the_centered_visible_region() {
        assert_eq!(cover_crop((100, 100), (1080, 1920)), (22, 0, 56, 100));
        assert_eq!(cover_crop((400, 100), (200, 200)), (150, 0, 100, 100));
        assert_eq!(cover_crop((1080, 1920), (1080, 1920)), (0, 0, 1080, 1920));
    }

    #[test]
    fn extreme_aspect_frame_is_cropped_before_scaling() {
        assert_eq!(cover_crop((4, 8000), (1080, 1920)), (0, 3996, 4, 7));

        let frame = RgbaImage::from_pixel(4, 8000, Rgba([1, 2, 3, 255]));
        let resized = cover_resize(&frame, 1080, 1920).expect("resize should work");
        assert_eq!(resized.dimensions(), (1080, 1920));
        let center = resized.get_pixel(540, 960).0;
        for (got, want) in center.iter().zip([1u8, 2, 3, 255]) {
            assert!(got.abs_diff(want) <= 1, "pixel {center:?}");
        }
    }

    #[test]
    fn cover_resize_matches_canvas_for_any_frame_shape() {
        for (frame_size, canvas) in [
            ((10, 10), (64, 48)),
            ((300, 20), (64, 48)),
            ((7, 900), (64, 48)),
            ((640, 480), (64, 48)),
            ((3, 5), (1, 1)),
        ] {
            let frame = RgbaImage::new(frame_size.0, frame_size.1);
            let resized = cover_resize(&frame, canvas.0, canvas.1).expect("resize should work");
            assert_eq!(resized.dimensions(), canvas, "frame {frame_size:?}");
        }
    }

    #[test]
    fn cover_resize_rejects_empty_inputs() {
        assert!(cover_resize(&RgbaImage::new(0, 4), 10, 10).is_none());
        assert!(cover_resize(&RgbaImage::new(4, 4), 0, 10).is_none());
    }

    #[test]
    fn transparent_frame_pixels_keep_base_pixels() {
        let base = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([200, 10, 10, 255])));
        let mut frame = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        frame.put_pixel(0, 0, Rgba([0, 0, 255, 255]));

        let merged = overlay_frame(&base, &DynamicImage::ImageRgba8(frame))
            .expect("overlay should work");
        assert_eq!(merged.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(merged.get_pixel(4, 4), &Rgba([200, 10, 10, 255]));
    }
}
