use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GrayImage, RgbaImage};
use std::path::Path;

use crate::error::Result;

/// Opacity the mask is blended with over the source image.
pub const MASK_ALPHA: f32 = 0.4;

/// A mask returned by the segmentation service. The PNG bytes are kept as
/// received so that saving writes exactly what the service produced.
#[derive(Clone, Debug)]
pub struct Mask {
    png: Vec<u8>,
    image: GrayImage,
    pub score: Option<f32>,
}

impl Mask {
    pub fn from_png(png: Vec<u8>, score: Option<f32>) -> Result<Self> {
        let image = image::load_from_memory(&png)?.to_luma8();
        Ok(Self { png, image, score })
    }

    pub fn from_base64(encoded: &str, score: Option<f32>) -> Result<Self> {
        let png = STANDARD.decode(encoded.trim())?;
        Self::from_png(png, score)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    /// Share of pixels that belong to the mask.
    pub fn coverage(&self) -> f32 {
        let total = self.image.width() as usize * self.image.height() as usize;
        if total == 0 {
            return 0.0;
        }
        let set = self.image.pixels().filter(|p| p.0[0] > 127).count();
        set as f32 / total as f32
    }

    /// The mask as a translucent gray layer: white where the object is, black
    /// elsewhere, both at `MASK_ALPHA`.
    pub fn overlay_rgba(&self) -> RgbaImage {
        let alpha = (MASK_ALPHA * 255.0).round() as u8;
        RgbaImage::from_fn(self.image.width(), self.image.height(), |x, y| {
            let v = self.image.get_pixel(x, y).0[0];
            image::Rgba([v, v, v, alpha])
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.png)?;
        log::info!("saved mask to {}", path.display());
        Ok(())
    }
}

/// Suggested file name for a mask of `source`: `photo.jpg` becomes
/// `photo_mask.png`. Without a source name the mask is `mask.png`.
pub fn download_name(source: Option<&str>) -> String {
    match source {
        None | Some("") => "mask.png".to_string(),
        Some(name) => match name.rfind('.') {
            Some(idx) if idx > 0 => format!("{}_mask.png", &name[..idx]),
            _ => format!("{name}_mask.png"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded_mask(w: u32, h: u32, on: impl Fn(u32, u32) -> bool) -> (Vec<u8>, String) {
        let img = GrayImage::from_fn(w, h, |x, y| image::Luma([if on(x, y) { 255 } else { 0 }]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let b64 = STANDARD.encode(&png);
        (png, b64)
    }

    #[test]
    fn test_decode_base64_mask() {
        let (png, b64) = encoded_mask(4, 2, |x, _| x < 2);
        let mask = Mask::from_base64(&b64, Some(0.9)).unwrap();
        assert_eq!((mask.width(), mask.height()), (4, 2));
        assert_eq!(mask.png_bytes(), png.as_slice());
        assert_eq!(mask.score, Some(0.9));
        assert!((mask.coverage() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_payloads_are_errors() {
        assert!(Mask::from_base64("not base64 at all!", None).is_err());
        let not_png = STANDARD.encode(b"plain text");
        assert!(Mask::from_base64(&not_png, None).is_err());
    }

    #[test]
    fn test_overlay_keeps_gray_value_with_fixed_alpha() {
        let (_, b64) = encoded_mask(2, 1, |x, _| x == 1);
        let overlay = Mask::from_base64(&b64, None).unwrap().overlay_rgba();
        assert_eq!(overlay.get_pixel(0, 0).0, [0, 0, 0, 102]);
        assert_eq!(overlay.get_pixel(1, 0).0, [255, 255, 255, 102]);
    }

    #[test]
    fn test_download_name() {
        assert_eq!(download_name(None), "mask.png");
        assert_eq!(download_name(Some("cat.jpg")), "cat_mask.png");
        assert_eq!(download_name(Some("archive.tar.png")), "archive.tar_mask.png");
        assert_eq!(download_name(Some("README")), "README_mask.png");
        assert_eq!(download_name(Some(".hidden")), ".hidden_mask.png");
    }

    #[test]
    fn test_save_writes_received_bytes() {
        let (png, b64) = encoded_mask(3, 3, |x, y| x == y);
        let mask = Mask::from_base64(&b64, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(download_name(Some("diag.png")));
        mask.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), png);
    }
}
