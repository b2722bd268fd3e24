//! 在数据集目录树中配对标注文件与体数据文件.

use std::io;
use std::path::{Path, PathBuf};

use itertools::Itertools;

use super::{stable_hash, NamePattern};

/// 一个待处理的 (标注, 体数据) 对.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairSpec {
    /// 唯一且确定的标识, 同时用作输出文件名前缀.
    pub id: String,

    /// 所在目录.
    pub dir: PathBuf,

    /// 标注文件.
    pub annotation: PathBuf,

    /// 体数据文件.
    pub volume: PathBuf,
}

fn rel_parts(root: &Path, dir: &Path) -> Vec<String> {
    dir.strip_prefix(root)
        .unwrap_or(dir)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

/// 目录相对 `root` 的部分, 分隔符替换为 `_`. `root` 本身取其目录名.
fn dir_label(root: &Path, dir: &Path) -> String {
    let parts = rel_parts(root, dir);
    if parts.is_empty() {
        return root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
    }
    parts.join("_")
}

/// 目录相对 `root` 的路径, 以 `/` 分隔, `root` 本身为空串. 不同目录互不相同.
fn dir_key(root: &Path, dir: &Path) -> String {
    rel_parts(root, dir).join("/")
}

/// 一个目录内找到的数据对, 标识尚未确定.
struct Found {
    label: String,
    key: String,
    i: usize,
    j: usize,
    dir: PathBuf,
    annotation: PathBuf,
    volume: PathBuf,
}

impl Found {
    fn plain_id(&self) -> String {
        format!("{}_{}_{}", self.label, self.i, self.j)
    }

    fn into_spec(self, id: String) -> PairSpec {
        PairSpec {
            id,
            dir: self.dir,
            annotation: self.annotation,
            volume: self.volume,
        }
    }
}

/// 为数据对分配标识. 不同目录得到相同的 `<目录>_<i>_<j>` 时
/// (如 `a_b/` 与 `a/b/`), 这一组全部在目录名后追加相对路径的散列.
fn assign_ids(found: Vec<Found>) -> Vec<PairSpec> {
    let counts = found.iter().map(Found::plain_id).counts();
    found
        .into_iter()
        .map(|f| {
            let plain = f.plain_id();
            let id = if counts.get(&plain).copied().unwrap_or(0) > 1 {
                let tag = stable_hash(&f.key) as u32;
                format!("{}_{tag:08x}_{}_{}", f.label, f.i, f.j)
            } else {
                plain
            };
            f.into_spec(id)
        })
        .collect()
}

/// 按名字排序的子目录与文件.
fn list_dir(dir: &Path) -> io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let ty = entry.file_type()?;
        if ty.is_dir() {
            dirs.push(path);
        } else if ty.is_file() || path.is_file() {
            files.push(path);
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}

fn matching<'a>(files: &'a [PathBuf], pattern: &'a NamePattern) -> impl Iterator<Item = &'a PathBuf> {
    files.iter().filter(move |p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| pattern.matches(n))
    })
}

/// 递归遍历 `root`, 在每个目录内把所有匹配 `annotation` 的文件与所有匹配
/// `volume` 的文件做笛卡尔积.
///
/// 结果按目录、标注、体数据的名字顺序排列. 标识形如 `<目录>_<i>_<j>`,
/// `i` 与 `j` 分别是标注与体数据在该目录内的序号. 若两个目录的
/// `<目录>` 部分相同, 则改为 `<目录>_<散列>_<i>_<j>`, 保证标识唯一.
///
/// `root` 不可读是致命错误; 更深的子目录不可读时记录警告后跳过.
pub fn discover_pairs(
    root: &Path,
    annotation: &NamePattern,
    volume: &NamePattern,
) -> io::Result<Vec<PairSpec>> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    let mut first = true;

    while let Some(dir) = stack.pop() {
        let (subdirs, files) = match list_dir(&dir) {
            Ok(v) => v,
            Err(e) if first => return Err(e),
            Err(e) => {
                log::warn!("cannot read {}: {e}", dir.display());
                continue;
            }
        };
        first = false;

        let label = dir_label(root, &dir);
        let key = dir_key(root, &dir);
        let annotations = matching(&files, annotation).enumerate();
        let volumes: Vec<_> = matching(&files, volume).enumerate().collect();
        for ((i, a), (j, v)) in annotations.cartesian_product(volumes) {
            found.push(Found {
                label: label.clone(),
                key: key.clone(),
                i,
                j,
                dir: dir.clone(),
                annotation: a.clone(),
                volume: v.clone(),
            });
        }

        // 逆序入栈, 使先序遍历按名字升序.
        stack.extend(subdirs.into_iter().rev());
    }
    Ok(assign_ids(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_cross_product_and_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("ds");
        touch(&root.join("FM1.mod"));
        touch(&root.join("t.rec"));
        touch(&root.join("a/b/FM1.mod"));
        touch(&root.join("a/b/FM2.mod"));
        touch(&root.join("a/b/x.rec"));
        touch(&root.join("a/b/y.rec"));
        touch(&root.join("a/b/notes.txt"));
        touch(&root.join("c/FM9.mod"));
        touch(&root.join("d/only.rec"));

        let pairs = discover_pairs(
            &root,
            &NamePattern::new("FM*.mod"),
            &NamePattern::new("*.rec"),
        )
        .unwrap();
        let ids: Vec<_> = pairs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["ds_0_0", "a_b_0_0", "a_b_0_1", "a_b_1_0", "a_b_1_1"]);
        assert_eq!(pairs[3].annotation, root.join("a/b/FM2.mod"));
        assert_eq!(pairs[3].volume, root.join("a/b/x.rec"));
        assert_eq!(pairs[1].dir, root.join("a/b"));
    }

    fn ids(root: &Path) -> Vec<String> {
        discover_pairs(root, &NamePattern::new("FM*.mod"), &NamePattern::new("*.rec"))
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect()
    }

    #[test]
    fn test_flattened_names_stay_distinct() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("ds");
        touch(&root.join("a_b/FM1.mod"));
        touch(&root.join("a_b/t.rec"));
        touch(&root.join("a/b/FM1.mod"));
        touch(&root.join("a/b/t.rec"));
        touch(&root.join("c/FM1.mod"));
        touch(&root.join("c/t.rec"));

        let got = ids(&root);
        let expected = vec![
            format!("a_b_{:08x}_0_0", stable_hash("a/b") as u32),
            format!("a_b_{:08x}_0_0", stable_hash("a_b") as u32),
            "c_0_0".to_string(),
        ];
        assert_eq!(got, expected);
        assert_ne!(got[0], got[1]);
        assert_eq!(ids(&root), got);
    }

    #[test]
    fn test_child_named_like_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("ds");
        touch(&root.join("FM1.mod"));
        touch(&root.join("t.rec"));
        touch(&root.join("ds/FM1.mod"));
        touch(&root.join("ds/t.rec"));

        let got = ids(&root);
        assert_eq!(got.len(), 2);
        assert_ne!(got[0], got[1]);
        assert_eq!(got[0], format!("ds_{:08x}_0_0", stable_hash("") as u32));
        assert_eq!(got[1], format!("ds_{:08x}_0_0", stable_hash("ds") as u32));
    }

    #[test]
    fn test_unreadable_root() {
        let tmp = tempfile::tempdir().unwrap();
        let err = discover_pairs(
            &tmp.path().join("missing"),
            &NamePattern::new("*"),
            &NamePattern::new("*"),
        );
        assert!(err.is_err());
    }
}
