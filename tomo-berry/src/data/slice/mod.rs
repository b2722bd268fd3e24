//! 2D 投影图与 8-bit 图像对象的操作.

mod core;
mod frame;
mod save;

pub use core::{GrayImage8, Projection};

pub use frame::{Frame, FrameTag};

pub use save::ImgWriteRaw;
