//! 模型查看工具. 把不透明的标注资源转成 "每行 6 个数值" 的表.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::InspectError;
use crate::consts::defaults::{IMODINFO, TOOL_TIMEOUT_SECS};
use crate::consts::{RECORD_FIELDS, SLICER_ANGLE_TAG};
use crate::tool;

/// 把标注资源转成文本表的外部协作者.
///
/// 返回的文本每行一条记录: `rx ry rz cx cy cz`, 以空白或逗号分隔.
/// 中间文件只能写在 `workdir` 中, 它在数据对处理结束后被整体删除.
pub trait ModelInspector: Sync {
    /// 查看 `model`, 返回文本表.
    fn inspect(&self, model: &Path, workdir: &Path) -> Result<String, InspectError>;
}

/// 从 `imodinfo -a` 的输出中挑出 `slicerAngle` 行, 每行只保留最后 6 个字段.
///
/// 字段不足 6 个的行原样保留, 交由表解析报告格式错误.
pub fn slicer_angle_rows(dump: &str) -> String {
    let mut table = String::new();
    for line in dump.lines().filter(|l| l.starts_with(SLICER_ANGLE_TAG)) {
        let fields: Vec<&str> = line.split_whitespace().skip(1).collect();
        let tail = &fields[fields.len().saturating_sub(RECORD_FIELDS)..];
        table.push_str(&tail.join(" "));
        table.push('\n');
    }
    table
}

/// 调用 IMOD `imodinfo -a` 查看 `.mod` 模型.
#[derive(Debug, Clone)]
pub struct ImodInspector {
    program: PathBuf,
    timeout: Duration,
}

impl Default for ImodInspector {
    fn default() -> Self {
        Self {
            program: PathBuf::from(IMODINFO),
            timeout: Duration::from_secs(TOOL_TIMEOUT_SECS),
        }
    }
}

impl ImodInspector {
    /// 指定 `imodinfo` 可执行文件与超时.
    pub fn new<P: Into<PathBuf>>(program: P, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl ModelInspector for ImodInspector {
    fn inspect(&self, model: &Path, workdir: &Path) -> Result<String, InspectError> {
        let model = tool::absolute(model)?;
        let mut cmd = Command::new(&self.program);
        cmd.arg("-a").arg(&model).current_dir(workdir);
        let output = tool::run(&mut cmd, self.timeout)?;
        let table = slicer_angle_rows(&output.stdout_lossy());

        // 留一份在数据对的工作目录里, 出错时便于对照.
        std::fs::write(workdir.join("angles.txt"), &table)?;
        Ok(table)
    }
}

/// 直接读取事先导出的标注表文件.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableInspector;

impl ModelInspector for TableInspector {
    fn inspect(&self, model: &Path, _workdir: &Path) -> Result<String, InspectError> {
        Ok(std::fs::read_to_string(model)?)
    }
}
