//! 批处理程序依赖的通用组件.

pub mod config;
pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 实际使用的并行数据对数. `jobs` 为 0 时取全部核心.
#[inline]
pub fn effective_jobs(jobs: usize) -> usize {
    if jobs == 0 {
        cpus()
    } else {
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs() {
        assert!(cpus() >= 1);
        assert_eq!(effective_jobs(3), 3);
        assert_eq!(effective_jobs(0), cpus());
    }

    #[test]
    fn test_sep_to() {
        let mut buf = Vec::new();
        sep_to(&mut buf).unwrap();
        assert_eq!(buf.len(), SEP.len() + 1);
    }
}
