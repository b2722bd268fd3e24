//! 图像的持久化存储.

use super::{Frame, GrayImage8};
use image::ImageResult;
use std::path::Path;

/// 表明一个可以通过 **按原样** 模式持久化存储的 8-bit 图像对象.
///
/// 像素值不做任何映射, 直接作为单通道灰度写出. 文件格式由扩展名决定.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

macro_rules! impl_gray_raw {
    ($($img: ty),+) => {
        $(
            /// 按原样存储.
            impl ImgWriteRaw for $img {
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let pixels = self.pixels_for_save();
                    let (height, width) = pixels.dim();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in pixels.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

impl GrayImage8 {
    #[inline]
    fn pixels_for_save(&self) -> ndarray::ArrayView2<'_, u8> {
        self.view()
    }
}

impl Frame {
    #[inline]
    fn pixels_for_save(&self) -> ndarray::ArrayView2<'_, u8> {
        self.pixels()
    }
}

impl_gray_raw!(GrayImage8, Frame);
