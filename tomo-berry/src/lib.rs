#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 依据 IMOD 模型文件中的稀疏标注 (结构中心 + 取向),
//! 从断层重建体数据中提取带标签的 2D 训练帧.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 主要面向 IMOD 生态 (`.mod` 模型文件, `.rec` MRC 重建),
//!   同时支持 nifti 格式的体数据 (只能搭配进程内重采样器使用).
//! 2. 单个 (标注, 体数据) 对的任何失败都不会中断整个批处理,
//!   而是记录进故障日志后跳过. 只有数据集根目录不可读、输出目录不可写、
//!   配置非法这类问题才会在处理任何数据对之前终止批处理.
//!
//! # 处理流程
//!
//! ### 取向提取 ✅
//!
//! 外部工具 (`imodinfo`) 解析模型文件, 本 crate 只负责把输出整理成
//! [`orient::AnnotationRecord`], 并区分 "没有标注" 和 "解析失败".
//!
//! 实现位于 `tomo-berry/src/orient`.
//!
//! ### 取向切片 (slab) 重采样与平均 ✅
//!
//! 以标注中心为旋转中心, 按 Z -> Y -> X 的顺序旋转体数据, 重采样出 `T`
//! 层与标注轴垂直的薄片, 再逐像素平均成一张 2D 投影.
//!
//! 1. 外部重采样 (`rotatevol`) 在数据对独享的临时目录中进行. ✅
//! 2. 进程内三线性重采样, 可选 `rayon` 并行. ✅
//! 3. 体数据过高时提前放弃 (代价保护, 非正确性保护). ✅
//!
//! 实现位于 `tomo-berry/src/reorient`.
//!
//! ### 百分位强度归一化 ✅
//!
//! 以第 1 / 第 99 百分位截断后线性映射到 `[0, 255]`.
//!
//! 实现位于 `tomo-berry/src/data/window.rs`.
//!
//! ### 正/负样本帧采样 ✅
//!
//! 正样本在图像中心附近随机裁剪; 负样本按网格平铺并避开结构周围的排除框.
//!
//! 实现位于 `tomo-berry/src/sample`.
//!
//! ### 容错批处理 ✅
//!
//! 遍历数据集目录, 配对标注与体数据, 按数据对独立 (可并行) 处理,
//! 并维护一份可用于重跑失败项的故障日志.
//!
//! 实现位于 `tomo-berry/src/batch` 和 `tomo-berry/src/dataset`.

/// 二维索引 (高, 宽), 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 (z, 高, 宽), 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 高精度二维坐标 (高, 宽).
pub type Idx2dF = (f64, f64);

/// 体数据与图像基础数据结构.
mod data;

pub use data::{
    mrc, Frame, FrameTag, GrayImage8, ImgWriteRaw, IntensityNormalizer, IntensityWindow,
    PercentileBounds, Projection, VolumeError, VolumeFormat, VolumeInfo, VolumeSource,
};

pub use data::window::DegenerateIntensityRange;

pub mod consts;

pub mod tool;

pub mod orient;

pub mod reorient;

pub mod sample;

pub mod dataset;

pub mod batch;

pub mod prelude;
