//! 程序运行函数.

use anyhow::Context;
use tomo_berry::batch::{BatchConfig, BatchDriver, BatchReport, InspectorKind, ResamplerKind};
use tomo_berry::orient::{ImodInspector, ModelInspector, TableInspector};
use tomo_berry::reorient::{ImodResampler, NativeResampler, Resampler};

fn drive<I: ModelInspector, R: Resampler>(
    cfg: BatchConfig,
    inspector: I,
    resampler: R,
) -> anyhow::Result<BatchReport> {
    let driver = BatchDriver::new(cfg, inspector, resampler)?;
    let root = driver.config().dataset_root.clone();
    driver
        .run()
        .with_context(|| format!("batch over {} aborted", root.display()))
}

fn with_inspector<R: Resampler>(cfg: BatchConfig, resampler: R) -> anyhow::Result<BatchReport> {
    match cfg.inspector {
        InspectorKind::Imod => {
            let inspector = ImodInspector::new(&cfg.tools.imodinfo, cfg.tools.timeout());
            drive(cfg, inspector, resampler)
        }
        InspectorKind::Table => drive(cfg, TableInspector, resampler),
    }
}

/// 按配置选择查看工具与重采样器, 实际运行.
pub fn run(cfg: BatchConfig) -> anyhow::Result<BatchReport> {
    log::info!(
        "inspector {:?}, resampler {:?}, {} worker(s)",
        cfg.inspector,
        cfg.resampler,
        utils::effective_jobs(cfg.jobs)
    );
    match cfg.resampler {
        ResamplerKind::Imod => {
            let resampler = ImodResampler::new(&cfg.tools.rotatevol, cfg.tools.timeout());
            with_inspector(cfg, resampler)
        }
        ResamplerKind::Native => with_inspector(cfg, NativeResampler),
    }
}
