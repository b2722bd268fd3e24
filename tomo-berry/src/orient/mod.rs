//! 标注取向提取.
//!
//! 外部工具负责解析专有模型格式; 这里只负责把输出的表整理成
//! [`AnnotationRecord`], 并区分 "没有标注" 与 "解析失败".

mod error;
mod inspect;

use std::path::Path;

pub use error::{ExtractError, InspectError};
pub use inspect::{slicer_angle_rows, ImodInspector, ModelInspector, TableInspector};

use crate::consts::RECORD_FIELDS;

/// 一个被标注结构的取向与中心.
///
/// 旋转角以度为单位, 按 `(rx, ry, rz)` 存放; 重定向时按先 Z、再 Y、后 X
/// 的顺序施加 (见 [`crate::reorient::Rotation`]). 中心是体素坐标 `(x, y, z)`,
/// x 沿宽度, y 沿高度, z 沿切片方向.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AnnotationRecord {
    /// 绕 X / Y / Z 轴的旋转角 (度).
    pub rotation: [f64; 3],

    /// 结构中心的体素坐标 `[x, y, z]`.
    pub center: [f64; 3],
}

impl AnnotationRecord {
    /// 由一行 `rx ry rz cx cy cz` 构建.
    #[inline]
    pub fn from_row([rx, ry, rz, cx, cy, cz]: [f64; RECORD_FIELDS]) -> Self {
        Self {
            rotation: [rx, ry, rz],
            center: [cx, cy, cz],
        }
    }

    /// 以 `center` 为中心、不旋转的记录.
    #[inline]
    pub fn unrotated(center: [f64; 3]) -> Self {
        Self {
            rotation: [0.0; 3],
            center,
        }
    }

    /// 绕 X 轴的旋转角 (度).
    #[inline]
    pub fn rx(&self) -> f64 {
        self.rotation[0]
    }

    /// 绕 Y 轴的旋转角 (度).
    #[inline]
    pub fn ry(&self) -> f64 {
        self.rotation[1]
    }

    /// 绕 Z 轴的旋转角 (度).
    #[inline]
    pub fn rz(&self) -> f64 {
        self.rotation[2]
    }
}

/// 解析一行. 返回 `Ok(None)` 表示空行或注释.
fn parse_row(line: &str) -> Result<Option<[f64; RECORD_FIELDS]>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.len() != RECORD_FIELDS {
        return Err(format!("expected {RECORD_FIELDS} fields, found {}", fields.len()));
    }

    let mut row = [0f64; RECORD_FIELDS];
    for (slot, field) in row.iter_mut().zip(fields) {
        *slot = match field.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => return Err(format!("`{field}` is not a finite number")),
        };
    }
    Ok(Some(row))
}

/// 把 "每行 6 个数值" 的文本表解析成标注记录.
///
/// 空行和 `#` 开头的行被忽略; 其它任何不合规的行都是
/// [`ExtractError::Malformed`]. 没有任何记录时返回
/// [`ExtractError::NoAnnotations`].
pub fn parse_table(text: &str) -> Result<Vec<AnnotationRecord>, ExtractError> {
    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        match parse_row(line) {
            Ok(Some(row)) => records.push(AnnotationRecord::from_row(row)),
            Ok(None) => {}
            Err(reason) => return Err(ExtractError::Malformed { line: i + 1, reason }),
        }
    }
    if records.is_empty() {
        return Err(ExtractError::NoAnnotations);
    }
    Ok(records)
}

/// 取向提取器. 组合一个 [`ModelInspector`] 与表解析.
#[derive(Debug, Clone, Default)]
pub struct OrientationExtractor<I> {
    inspector: I,
}

impl<I: ModelInspector> OrientationExtractor<I> {
    /// 使用给定的查看工具.
    #[inline]
    pub fn new(inspector: I) -> Self {
        Self { inspector }
    }

    /// 提取 `model` 中的所有标注记录. 中间文件只写入 `workdir`.
    pub fn extract(&self, model: &Path, workdir: &Path) -> Result<Vec<AnnotationRecord>, ExtractError> {
        let table = self.inspector.inspect(model, workdir)?;
        let records = parse_table(&table)?;
        log::debug!("{}: {} annotation(s)", model.display(), records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_separators() {
        let recs = parse_table("10,20,30,1,2,3\n  -5 0 90.5   100 200 40 \n\n# note\n1, 2, 3, 4, 5, 6\n")
            .unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].rotation, [10.0, 20.0, 30.0]);
        assert_eq!(recs[0].center, [1.0, 2.0, 3.0]);
        assert_eq!(recs[1].rz(), 90.5);
        assert_eq!(recs[2].center, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_empty_is_no_annotations() {
        assert!(matches!(parse_table(""), Err(ExtractError::NoAnnotations)));
        assert!(matches!(
            parse_table("\n# nothing here\n   \n"),
            Err(ExtractError::NoAnnotations)
        ));
    }

    #[test]
    fn test_malformed_rows() {
        let err = parse_table("1 2 3 4 5 6\n1 2 3 4 5\n").unwrap_err();
        assert!(matches!(err, ExtractError::Malformed { line: 2, .. }));
        assert!(err.is_parse_failure());

        let err = parse_table("1 2 3 4 5 x\n").unwrap_err();
        assert!(matches!(err, ExtractError::Malformed { line: 1, .. }));

        let err = parse_table("1 2 3 4 5 NaN\n").unwrap_err();
        assert!(matches!(err, ExtractError::Malformed { line: 1, .. }));

        assert!(!ExtractError::NoAnnotations.is_parse_failure());
    }

    #[test]
    fn test_extractor_with_table_file() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("FM1.txt");
        std::fs::write(&model, "0 0 45 32 32 16\n").unwrap();
        let recs = OrientationExtractor::new(TableInspector)
            .extract(&model, dir.path())
            .unwrap();
        assert_eq!(recs, vec![AnnotationRecord::from_row([0.0, 0.0, 45.0, 32.0, 32.0, 16.0])]);

        std::fs::write(&model, "").unwrap();
        let err = OrientationExtractor::new(TableInspector)
            .extract(&model, dir.path())
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoAnnotations));

        let err = OrientationExtractor::new(TableInspector)
            .extract(&dir.path().join("missing.txt"), dir.path())
            .unwrap_err();
        assert!(matches!(err, ExtractError::Inspect(_)));
    }
}
