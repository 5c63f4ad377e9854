//! Conversion between OpenCV BGR frames and [`Image`]s.

use anyhow::Context;
use opencv::core::{Mat, Scalar, CV_8UC3, CV_8UC4};
use opencv::imgproc;
use opencv::prelude::*;

use crate::image::{Image, Resolution};

/// Converts an 8-bit BGR frame into an RGBA [`Image`].
pub(crate) fn bgr_to_image(frame: &Mat) -> anyhow::Result<Image> {
    anyhow::ensure!(
        frame.typ() == CV_8UC3,
        "unsupported frame type {} (expected 8-bit BGR)",
        frame.typ()
    );

    let mut rgba = Mat::default();
    imgproc::cvt_color_def(frame, &mut rgba, imgproc::COLOR_BGR2RGBA)?;

    let res = Resolution::new(rgba.cols() as u32, rgba.rows() as u32);
    let data = rgba.data_bytes().context("converted frame is not continuous")?;
    Ok(Image::from_rgba8(res, data))
}

/// Converts an [`Image`] into an 8-bit BGR frame, dropping the alpha channel.
pub(crate) fn image_to_bgr(image: &Image) -> anyhow::Result<Mat> {
    let mut rgba = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        CV_8UC4,
        Scalar::all(0.0),
    )?;
    rgba.data_bytes_mut()?.copy_from_slice(image.data());

    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&rgba, &mut bgr, imgproc::COLOR_RGBA2BGR)?;
    Ok(bgr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Color;

    #[test]
    fn frame_channel_order() {
        let mut image = Image::new(3, 2);
        image.clear(Color::BLACK);
        image.set(0, 0, Color::RED);
        image.set(2, 1, Color::BLUE);

        let bgr = image_to_bgr(&image).unwrap();
        assert_eq!((bgr.cols(), bgr.rows()), (3, 2));
        assert_eq!(bgr.typ(), CV_8UC3);
        // Red is stored last in BGR order.
        assert_eq!(&bgr.data_bytes().unwrap()[..3], &[0, 0, 255]);

        let back = bgr_to_image(&bgr).unwrap();
        assert_eq!(back.get(0, 0), Color::RED);
        assert_eq!(back.get(2, 1), Color::BLUE);
        assert_eq!(back.get(1, 0), Color::BLACK);
    }

    #[test]
    fn rejects_grayscale_frames() {
        let gray =
            Mat::new_rows_cols_with_default(2, 2, opencv::core::CV_8UC1, Scalar::all(0.0)).unwrap();
        assert!(bgr_to_image(&gray).is_err());
    }
}
