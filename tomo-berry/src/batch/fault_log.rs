//! 故障日志.
//!
//! 每行一条记录: `<数据对标识>\t<原因>\t<细节>`. 第一列即可作为重跑列表.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{PairError, SkipKind};

/// 一条跳过记录.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkipRecord {
    /// 数据对标识.
    pub pair_id: String,

    /// 原因分类.
    pub kind: SkipKind,

    /// 细节, 已去掉换行与制表符.
    pub detail: String,
}

impl SkipRecord {
    /// 由数据对错误构建.
    pub fn new(pair_id: &str, err: &PairError) -> Self {
        let detail = err
            .to_string()
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        Self {
            pair_id: pair_id.to_string(),
            kind: err.kind(),
            detail,
        }
    }

    /// 日志中的一行, 含换行符.
    pub fn to_line(&self) -> String {
        format!("{}\t{}\t{}\n", self.pair_id, self.kind, self.detail)
    }
}

/// 多个工作线程共享的只追加故障日志.
#[derive(Debug)]
pub struct FaultLog {
    path: PathBuf,
    file: Mutex<File>,
    count: AtomicUsize,
}

impl FaultLog {
    /// 创建 (或清空) `path` 处的日志.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            count: AtomicUsize::new(0),
        })
    }

    /// 追加一条记录. 整行一次写入并刷新.
    pub fn append(&self, record: &SkipRecord) -> io::Result<()> {
        let line = record.to_line();
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(line.as_bytes())?;
        file.flush()?;
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 日志路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 本次运行追加的记录数.
    #[inline]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// 本次运行是否没有任何跳过.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 读取故障日志中的数据对标识 (第一列).
pub fn read_pair_ids<P: AsRef<Path>>(path: P) -> io::Result<HashSet<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut ids = HashSet::new();
    for line in reader.lines() {
        let line = line?;
        if let Some(id) = line.split('\t').next().filter(|s| !s.trim().is_empty()) {
            ids.insert(id.trim().to_string());
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orient::ExtractError;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_line_format() {
        let err = PairError::from(ExtractError::Malformed {
            line: 2,
            reason: "bad\trow\nhere".into(),
        });
        let rec = SkipRecord::new("a_b_0_1", &err);
        let line = rec.to_line();
        assert!(line.starts_with("a_b_0_1\tParseFailure\t"));
        assert_eq!(line.matches('\t').count(), 2);
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_concurrent_appends_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faults.txt");
        let log = Arc::new(FaultLog::create(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for j in 0..25 {
                        let err = PairError::from(ExtractError::NoAnnotations);
                        log.append(&SkipRecord::new(&format!("p{i}_{j}"), &err))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.len(), 200);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 200);
        assert!(text
            .lines()
            .all(|l| l.split('\t').nth(1) == Some("NoAnnotations")));

        let ids = read_pair_ids(&path).unwrap();
        assert_eq!(ids.len(), 200);
        assert!(ids.contains("p3_17"));
    }
}
