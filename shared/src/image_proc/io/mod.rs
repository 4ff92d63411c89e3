//! Image file output for rendered slices.
//!
//! Arrays in this workspace are indexed `[x, y]`, so the first axis becomes
//! the image width. The file format follows the path extension.

use std::path::Path;

use image::{GrayImage, ImageResult, Luma};
use ndarray::{ArrayBase, Data, Ix2};

/// Convert an 8-bit `[x, y]` array to a grayscale image buffer.
pub fn to_gray_image<S>(data: &ArrayBase<S, Ix2>) -> GrayImage
where
    S: Data<Elem = u8>,
{
    let (width, height) = data.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([data[[x as usize, y as usize]]])
    })
}

/// Save an 8-bit `[x, y]` array as a grayscale image (PNG, TIFF, ...).
pub fn save_u8_image<S, P>(data: &ArrayBase<S, Ix2>, path: P) -> ImageResult<()>
where
    S: Data<Elem = u8>,
    P: AsRef<Path>,
{
    to_gray_image(data).save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_first_axis_is_width() {
        let data = array![[1u8, 2, 3], [4, 5, 6]];
        let img = to_gray_image(&data);

        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(img.get_pixel(1, 0)[0], 4);
        assert_eq!(img.get_pixel(0, 2)[0], 3);
    }

    #[test]
    fn test_save_png_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slice.png");
        let data = ndarray::Array2::from_shape_fn((7, 5), |(x, y)| (x * 10 + y) as u8);

        save_u8_image(&data.view(), &path).unwrap();
        let loaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(loaded, to_gray_image(&data));
    }
}
