//! nifti 格式体数据的读取.

use std::path::Path;

use ndarray::{Array3, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use super::VolumeError;
use crate::Idx3d;

/// 将 header 中的 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
fn shape_from_header(header: &NiftiHeader) -> Result<Idx3d, VolumeError> {
    let [ndim, w, h, z, ..] = header.dim;
    if ndim != 3 || w == 0 || h == 0 || z == 0 {
        return Err(VolumeError::BadHeader(format!("nifti dim = {:?}", header.dim)));
    }
    Ok((z as usize, h as usize, w as usize))
}

/// 只读取 header, 获取 (z, 高, 宽) 形状.
pub(super) fn read_shape(path: &Path) -> Result<Idx3d, VolumeError> {
    shape_from_header(&NiftiHeader::from_file(path)?)
}

/// 读取全部体素, 以 (z, 高, 宽) 形式返回.
pub(super) fn read_volume(path: &Path) -> Result<Array3<f32>, VolumeError> {
    let obj = ReaderOptions::new().read_file(path)?;
    let shape = shape_from_header(obj.header())?;

    // [W, H, z] -> [z, H, W].
    // hint: 原第一维向下增长, 原第二维向右增长.
    let data = obj
        .into_volume()
        .into_ndarray::<f32>()?
        .permuted_axes([2, 1, 0].as_slice())
        .into_dimensionality::<Ix3>()
        .map_err(|e| VolumeError::BadHeader(e.to_string()))?;

    let data = if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().to_owned()
    };
    debug_assert_eq!(data.dim(), shape);
    Ok(data)
}
