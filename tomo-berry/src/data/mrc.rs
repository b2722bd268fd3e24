//! MRC (IMOD) 体数据格式的读写.
//!
//! 只处理本 crate 用得到的部分: 1024 字节主 header, 可选的扩展 header,
//! 以及 mode 0/1/2/6 的体素数据. 数据按 x 最快、z 最慢的顺序存放,
//! 因此可以直接以 (z, 高, 宽) 形式装入 `Array3`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

use super::VolumeError;
use crate::Idx3d;

/// 主 header 长度.
pub const HEADER_LEN: usize = 1024;

/// IMOD 写入的特征值, 位于第 152 字节.
const IMOD_STAMP: i32 = 1_146_047_817;

/// IMOD flags 中 "mode 0 为有符号字节" 的标志位.
const IMOD_FLAG_SIGNED_BYTES: i32 = 1;

/// 体素数据模式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MrcMode {
    /// mode 0, 8 位整数. 是否有符号由 IMOD flags 决定.
    Byte,

    /// mode 1, 16 位有符号整数.
    Int16,

    /// mode 2, 32 位浮点.
    Float32,

    /// mode 6, 16 位无符号整数.
    Uint16,
}

impl MrcMode {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Byte),
            1 => Some(Self::Int16),
            2 => Some(Self::Float32),
            6 => Some(Self::Uint16),
            _ => None,
        }
    }

    /// header 中的模式编号.
    pub fn code(self) -> i32 {
        match self {
            Self::Byte => 0,
            Self::Int16 => 1,
            Self::Float32 => 2,
            Self::Uint16 => 6,
        }
    }

    /// 单个体素的字节数.
    pub fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Float32 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn i32_at(self, buf: &[u8], offset: usize) -> i32 {
        let mut b = [0u8; 4];
        b.copy_from_slice(&buf[offset..offset + 4]);
        match self {
            Self::Little => i32::from_le_bytes(b),
            Self::Big => i32::from_be_bytes(b),
        }
    }
}

/// MRC 主 header 中本 crate 关心的字段.
#[derive(Clone, Debug)]
pub struct MrcHeader {
    nx: usize,
    ny: usize,
    nz: usize,
    mode: MrcMode,
    signed_bytes: bool,
    ext_len: usize,
    endian: Endian,
}

impl MrcHeader {
    /// 解析 1024 字节主 header.
    pub fn parse(buf: &[u8; HEADER_LEN]) -> Result<Self, VolumeError> {
        let endian = detect_endian(buf);
        let dim = |offset: usize, name: &str| -> Result<usize, VolumeError> {
            match endian.i32_at(buf, offset) {
                n if n > 0 => Ok(n as usize),
                n => Err(VolumeError::BadHeader(format!("{name} = {n}"))),
            }
        };
        let (nx, ny, nz) = (dim(0, "nx")?, dim(4, "ny")?, dim(8, "nz")?);

        let code = endian.i32_at(buf, 12);
        let mode = MrcMode::from_code(code).ok_or(VolumeError::UnsupportedMode(code))?;

        let ext_len = endian.i32_at(buf, 92);
        if ext_len < 0 {
            return Err(VolumeError::BadHeader(format!("nsymbt = {ext_len}")));
        }

        // MRC2014 规定 mode 0 有符号; 老的 IMOD 文件除非置位, 否则视为无符号.
        let signed_bytes = endian.i32_at(buf, 152) != IMOD_STAMP
            || endian.i32_at(buf, 156) & IMOD_FLAG_SIGNED_BYTES != 0;

        Ok(Self {
            nx,
            ny,
            nz,
            mode,
            signed_bytes,
            ext_len: ext_len as usize,
            endian,
        })
    }

    /// 从 `r` 读取并解析主 header.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self, VolumeError> {
        let mut buf = [0u8; HEADER_LEN];
        r.read_exact(&mut buf)?;
        Self::parse(&buf)
    }

    /// 数据形状 (z, 高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        (self.nz, self.ny, self.nx)
    }

    /// 数据模式.
    #[inline]
    pub fn mode(&self) -> MrcMode {
        self.mode
    }

    #[inline]
    fn data_offset(&self) -> u64 {
        (HEADER_LEN + self.ext_len) as u64
    }

    /// 体素数据的字节数. 溢出时返回 `None`.
    fn data_len(&self) -> Option<u64> {
        [self.nx, self.ny, self.nz, self.mode.bytes()]
            .into_iter()
            .try_fold(1u64, |acc, n| acc.checked_mul(n as u64))
    }

    /// 检查长度为 `file_len` 的文件能否容纳 header 声明的全部数据.
    fn check_len(&self, file_len: u64) -> Result<usize, VolumeError> {
        let len = self
            .data_len()
            .filter(|&n| self.data_offset().checked_add(n).is_some_and(|end| end <= file_len))
            .ok_or_else(|| {
                VolumeError::BadHeader(format!(
                    "{}x{}x{} voxels of mode {} do not fit in a file of {file_len} bytes",
                    self.nx,
                    self.ny,
                    self.nz,
                    self.mode.code()
                ))
            })?;
        usize::try_from(len).map_err(|e| VolumeError::BadHeader(e.to_string()))
    }

    fn decode(&self, raw: &[u8]) -> Vec<f32> {
        let chunks = raw.chunks_exact(self.mode.bytes());
        match (self.mode, self.endian) {
            (MrcMode::Byte, _) if self.signed_bytes => {
                chunks.map(|c| c[0] as i8 as f32).collect()
            }
            (MrcMode::Byte, _) => chunks.map(|c| c[0] as f32).collect(),
            (MrcMode::Int16, Endian::Little) => chunks
                .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32)
                .collect(),
            (MrcMode::Int16, Endian::Big) => chunks
                .map(|c| i16::from_be_bytes([c[0], c[1]]) as f32)
                .collect(),
            (MrcMode::Uint16, Endian::Little) => chunks
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as f32)
                .collect(),
            (MrcMode::Uint16, Endian::Big) => chunks
                .map(|c| u16::from_be_bytes([c[0], c[1]]) as f32)
                .collect(),
            (MrcMode::Float32, Endian::Little) => chunks
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            (MrcMode::Float32, Endian::Big) => chunks
                .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        }
    }
}

/// 依据 machine stamp 判断字节序. 老文件的 stamp 可能为空,
/// 此时看小端解析出的 mode 是否合理.
fn detect_endian(buf: &[u8; HEADER_LEN]) -> Endian {
    match buf[212] {
        0x44 => Endian::Little,
        0x11 => Endian::Big,
        _ => {
            let mode = Endian::Little.i32_at(buf, 12);
            if (0..=16).contains(&mode) {
                Endian::Little
            } else {
                Endian::Big
            }
        }
    }
}

/// 只读取 `path` 的主 header.
///
/// header 声明的数据超出文件长度时返回 [`VolumeError::BadHeader`].
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<MrcHeader, VolumeError> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let header = MrcHeader::read_from(file)?;
    header.check_len(file_len)?;
    Ok(header)
}

/// 读取 `path` 的全部体素, 以 (z, 高, 宽) 形式返回.
pub fn read_volume<P: AsRef<Path>>(path: P) -> Result<Array3<f32>, VolumeError> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let header = MrcHeader::read_from(&mut reader)?;
    let len = header.check_len(file_len)?;
    reader.seek(SeekFrom::Start(header.data_offset()))?;

    let mut raw = vec![0u8; len];
    reader.read_exact(&mut raw)?;
    let data = header.decode(&raw);
    drop(raw);

    // 长度由 header 决定, 不会失败.
    Array3::from_shape_vec(header.shape(), data)
        .map_err(|e| VolumeError::BadHeader(e.to_string()))
}

/// 以 mode 2 (小端 `f32`) 写出 (z, 高, 宽) 体数据.
pub fn write_volume<P: AsRef<Path>>(path: P, data: ArrayView3<f32>) -> Result<(), VolumeError> {
    let (nz, ny, nx) = data.dim();
    let (mut min, mut max, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0f64);
    for &v in data.iter() {
        min = min.min(v);
        max = max.max(v);
        sum += v as f64;
    }
    let mean = if data.is_empty() {
        0.0
    } else {
        (sum / data.len() as f64) as f32
    };

    let mut buf = [0u8; HEADER_LEN];
    let mut put = |offset: usize, bytes: [u8; 4]| buf[offset..offset + 4].copy_from_slice(&bytes);
    for (i, n) in [nx, ny, nz].into_iter().enumerate() {
        put(i * 4, (n as i32).to_le_bytes());
        put(28 + i * 4, (n as i32).to_le_bytes());
        put(40 + i * 4, (n as f32).to_le_bytes());
        put(52 + i * 4, 90f32.to_le_bytes());
        put(64 + i * 4, (i as i32 + 1).to_le_bytes());
    }
    put(12, MrcMode::Float32.code().to_le_bytes());
    put(76, min.to_le_bytes());
    put(80, max.to_le_bytes());
    put(84, mean.to_le_bytes());
    put(208, *b"MAP ");
    put(212, [0x44, 0x44, 0, 0]);

    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&buf)?;
    for &v in data.iter() {
        w.write_all(&v.to_le_bytes())?;
    }
    w.flush()?;
    Ok(())
}

/// 以单层体数据的形式写出 2D (高, 宽) 图像.
pub fn write_slice<P: AsRef<Path>>(path: P, data: ArrayView2<f32>) -> Result<(), VolumeError> {
    write_volume(path, data.insert_axis(Axis(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn header_with(mode: i32, stamp: [u8; 4], be: bool) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        let enc = |v: i32| if be { v.to_be_bytes() } else { v.to_le_bytes() };
        buf[0..4].copy_from_slice(&enc(4));
        buf[4..8].copy_from_slice(&enc(3));
        buf[8..12].copy_from_slice(&enc(2));
        buf[12..16].copy_from_slice(&enc(mode));
        buf[212..216].copy_from_slice(&stamp);
        buf
    }

    #[test]
    fn test_volume_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mrc");
        let data = Array3::from_shape_fn((2, 3, 4), |(z, h, w)| z as f32 - h as f32 * 0.5 + w as f32);
        write_volume(&path, data.view()).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.shape(), (2, 3, 4));
        assert_eq!(header.mode(), MrcMode::Float32);
        assert_eq!(read_volume(&path).unwrap(), data);
    }

    #[test]
    fn test_slice_is_single_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.mrc");
        let img = Array2::from_elem((5, 6), 1.5f32);
        write_slice(&path, img.view()).unwrap();
        assert_eq!(read_header(&path).unwrap().shape(), (1, 5, 6));
    }

    #[test]
    fn test_big_endian_int16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("be.mrc");
        let mut bytes = header_with(1, [0x11, 0x11, 0, 0], true).to_vec();
        for v in 0..24i16 {
            bytes.extend_from_slice(&(v - 12).to_be_bytes());
        }
        std::fs::write(&path, bytes).unwrap();

        let vol = read_volume(&path).unwrap();
        assert_eq!(vol.dim(), (2, 3, 4));
        assert_eq!(vol[(0, 0, 0)], -12.0);
        assert_eq!(vol[(1, 2, 3)], 11.0);
    }

    #[test]
    fn test_imod_unsigned_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u8.mrc");
        let mut header = header_with(0, [0x44, 0x44, 0, 0], false);
        header[152..156].copy_from_slice(&IMOD_STAMP.to_le_bytes());
        let mut bytes = header.to_vec();
        bytes.extend(std::iter::repeat(200u8).take(24));
        std::fs::write(&path, bytes).unwrap();
        assert!(read_volume(&path).unwrap().iter().all(|&v| v == 200.0));

        // 没有 IMOD 标记时按 MRC2014 视为有符号.
        let mut bytes = header_with(0, [0x44, 0x44, 0, 0], false).to_vec();
        bytes.extend(std::iter::repeat(200u8).take(24));
        std::fs::write(&path, bytes).unwrap();
        assert!(read_volume(&path).unwrap().iter().all(|&v| v == -56.0));
    }

    #[test]
    fn test_bad_headers() {
        let buf = header_with(4, [0x44, 0x44, 0, 0], false);
        assert!(matches!(
            MrcHeader::parse(&buf),
            Err(VolumeError::UnsupportedMode(4))
        ));

        let mut buf = header_with(2, [0x44, 0x44, 0, 0], false);
        buf[4..8].copy_from_slice(&0i32.to_le_bytes());
        assert!(matches!(MrcHeader::parse(&buf), Err(VolumeError::BadHeader(_))));
    }

    #[test]
    fn test_truncated_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.mrc");
        let mut bytes = header_with(2, [0x44, 0x44, 0, 0], false).to_vec();
        bytes.extend_from_slice(&[0u8; 10]);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(read_volume(&path), Err(VolumeError::BadHeader(_))));
        assert!(matches!(read_header(&path), Err(VolumeError::BadHeader(_))));

        // 比 header 还短的文件.
        std::fs::write(&path, [0u8; 100]).unwrap();
        assert!(matches!(read_volume(&path), Err(VolumeError::Io(_))));
    }

    #[test]
    fn test_huge_dimensions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.mrc");
        let mut header = header_with(2, [0x44, 0x44, 0, 0], false);
        header[0..4].copy_from_slice(&(1i32 << 30).to_le_bytes());
        header[8..12].copy_from_slice(&(1i32 << 30).to_le_bytes());
        let mut bytes = header.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(read_header(&path), Err(VolumeError::BadHeader(_))));
        assert!(matches!(read_volume(&path), Err(VolumeError::BadHeader(_))));
    }
}
