//! 运行结果.

use std::io::{self, Write};

use tomo_berry::batch::BatchReport;

/// 将 `report` 的结果写进 `w` 中.
fn describe_into<W: Write>(report: &BatchReport, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    if report.dry_run {
        writeln!(w, "Dry run: {} pair(s) discovered", report.pairs)?;
        return Ok(());
    }

    writeln!(w, "Output: {}", report.frame_dir.display())?;
    writeln!(w, "{S4}Pairs: {}", report.pairs)?;
    writeln!(w, "{S4}Completed: {}", report.completed)?;
    writeln!(w, "{S4}Resumed: {}", report.resumed)?;
    writeln!(w, "{S4}Frames written: {}", report.frames_written)?;
    writeln!(w, "{S4}Skipped: {}", report.skipped.len())?;
    for (kind, n) in report.skip_counts() {
        writeln!(w, "{S4}{S4}{kind}: {n}")?;
    }
    if let Some(log) = &report.fault_log {
        write!(w, "{S4}Fault log: {}", log.display())?;
    }
    Ok(())
}

/// 打印运行结果.
pub fn print(report: &BatchReport) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    utils::sep_to(&mut out)?;
    describe_into(report, &mut out)?;
    writeln!(out)?;
    utils::sep_to(&mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tomo_berry::batch::{SkipKind, SkipRecord};

    #[test]
    fn test_describe() {
        let skip = |id: &str, kind| SkipRecord {
            pair_id: id.into(),
            kind,
            detail: String::new(),
        };
        let report = BatchReport {
            pairs: 4,
            completed: 1,
            frames_written: 5,
            skipped: vec![
                skip("a", SkipKind::NoAnnotations),
                skip("b", SkipKind::NoAnnotations),
                skip("c", SkipKind::OversizeSkip),
            ],
            frame_dir: PathBuf::from("/out/ds"),
            fault_log: Some(PathBuf::from("/out/ds/skipped_pairs.txt")),
            ..BatchReport::default()
        };
        let mut buf = Vec::new();
        describe_into(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Frames written: 5"));
        assert!(text.contains("NoAnnotations: 2"));
        assert!(text.contains("OversizeSkip: 1"));
        assert!(text.ends_with("Fault log: /out/ds/skipped_pairs.txt"));
    }
}
