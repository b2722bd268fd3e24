use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{SkipKind, SkipRecord};

/// 一次批处理的结果.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    /// 发现 (并经过重跑过滤) 的数据对个数.
    pub pairs: usize,

    /// 成功写出帧的数据对个数.
    pub completed: usize,

    /// 因输出已存在而未重算的数据对个数.
    pub resumed: usize,

    /// 写出的帧总数.
    pub frames_written: usize,

    /// 所有跳过记录, 按数据对标识排序.
    pub skipped: Vec<SkipRecord>,

    /// 帧输出目录.
    pub frame_dir: PathBuf,

    /// 故障日志路径. 空跑时为 `None`.
    pub fault_log: Option<PathBuf>,

    /// 是否空跑.
    pub dry_run: bool,
}

impl BatchReport {
    /// 各跳过原因的个数.
    pub fn skip_counts(&self) -> BTreeMap<SkipKind, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.skipped {
            *counts.entry(r.kind).or_insert(0) += 1;
        }
        counts
    }

    /// 是否有数据对被跳过.
    #[inline]
    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }
}
