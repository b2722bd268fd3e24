//! 容错批处理.
//!
//! 每个数据对依次经过 `发现 -> 取向提取 -> 重定向 -> 归一化 -> 写出帧`,
//! 任何一步失败都只会让该数据对被跳过并记入故障日志. 数据对之间相互独立,
//! 打开 `rayon` 特性时由固定大小的线程池并行处理.

mod config;
mod error;
mod fault_log;
mod report;

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

pub use config::{
    BatchConfig, ConfigError, InspectorKind, NegativeFallback, ResamplerKind, SampleMode,
    ToolConfig,
};
pub use error::{BatchError, PairError, SkipKind};
pub use fault_log::{read_pair_ids, FaultLog, SkipRecord};
pub use report::BatchReport;

use crate::dataset::{discover_pairs, stable_hash, PairSpec};
use crate::orient::{AnnotationRecord, ExtractError, ModelInspector, OrientationExtractor};
use crate::reorient::{Resampler, SlabReorienter};
use crate::sample::{FrameSampler, SampleError};
use crate::{mrc, Frame, GrayImage8, ImgWriteRaw, IntensityNormalizer, VolumeSource};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 单个数据对的处理结果.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PairOutcome {
    /// 写出了若干帧.
    Written(usize),

    /// 输出已存在, 未重算.
    Resumed,
}

fn create_output_dir(path: &Path) -> Result<(), BatchError> {
    std::fs::create_dir_all(path).map_err(|source| BatchError::OutputDir {
        path: path.to_path_buf(),
        source,
    })
}

/// 借助 `rayon`, 在 `jobs` 个线程 (0 表示全部核心) 上对每个数据对执行 `task`.
#[cfg(feature = "rayon")]
fn map_pairs<T, F>(pairs: &[PairSpec], jobs: usize, task: F) -> Result<Vec<T>, BatchError>
where
    T: Send,
    F: Fn(&PairSpec) -> T + Sync + Send,
{
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    log::debug!("processing on {} worker(s)", pool.current_num_threads());
    Ok(pool.install(|| pairs.par_iter().map(task).collect()))
}

/// 在当前线程上依次对每个数据对执行 `task`.
#[cfg(not(feature = "rayon"))]
fn map_pairs<T, F>(pairs: &[PairSpec], _jobs: usize, task: F) -> Result<Vec<T>, BatchError>
where
    F: Fn(&PairSpec) -> T,
{
    Ok(pairs.iter().map(task).collect())
}

/// 批处理驱动器.
#[derive(Debug)]
pub struct BatchDriver<I, R> {
    config: BatchConfig,
    extractor: OrientationExtractor<I>,
    reorienter: SlabReorienter<R>,
    normalizer: IntensityNormalizer,
    sampler: FrameSampler,
}

impl<I: ModelInspector, R: Resampler> BatchDriver<I, R> {
    /// 检查配置并组装流水线.
    pub fn new(config: BatchConfig, inspector: I, resampler: R) -> Result<Self, BatchError> {
        config.validate()?;
        let reorienter = SlabReorienter::new(resampler)
            .with_thickness(config.thickness()?)
            .with_max_height(config.height_limit());
        let normalizer = IntensityNormalizer::new(config.percentile_bounds()?);
        let mut sampler = FrameSampler::new(config.frame_size);
        if let Some(half) = config.exclusion_half_width {
            sampler = sampler.with_exclusion_half_width(half);
        }
        Ok(Self {
            config,
            extractor: OrientationExtractor::new(inspector),
            reorienter,
            normalizer,
            sampler,
        })
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// 发现数据对. 配置了 `rerun_from` 时只保留其中列出的数据对.
    pub fn discover(&self) -> Result<Vec<PairSpec>, BatchError> {
        let root = self.config.root();
        let mut pairs = discover_pairs(
            root,
            &self.config.annotation_pattern(),
            &self.config.volume_pattern(),
        )
        .map_err(|source| BatchError::DatasetRoot {
            path: root.to_path_buf(),
            source,
        })?;

        if let Some(log) = &self.config.rerun_from {
            let ids = read_pair_ids(log).map_err(|source| BatchError::FaultLog {
                path: log.clone(),
                source,
            })?;
            pairs.retain(|p| ids.contains(&p.id));
            log::info!("re-running {} pair(s) listed in {}", pairs.len(), log.display());
        }
        Ok(pairs)
    }

    /// 运行整个批处理.
    ///
    /// 只有发现数据对、创建输出目录与故障日志时的错误是致命的;
    /// 之后单个数据对的失败都记入故障日志.
    pub fn run(&self) -> Result<BatchReport, BatchError> {
        let pairs = self.discover()?;
        let frame_dir = self.config.frame_dir();
        log::info!(
            "{} pair(s) under {}",
            pairs.len(),
            self.config.root().display()
        );

        if self.config.dry_run {
            for p in &pairs {
                log::info!(
                    "{}: {} + {}",
                    p.id,
                    p.annotation.display(),
                    p.volume.display()
                );
            }
            return Ok(BatchReport {
                pairs: pairs.len(),
                frame_dir,
                dry_run: true,
                ..BatchReport::default()
            });
        }

        create_output_dir(&frame_dir)?;
        let scratch = self.config.scratch_root();
        create_output_dir(&scratch)?;

        let log_path = self.config.fault_log_path();
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_output_dir(parent)?;
        }
        let faults = FaultLog::create(&log_path).map_err(|source| BatchError::FaultLog {
            path: log_path.clone(),
            source,
        })?;

        let outcomes = self.process_all(&pairs, &frame_dir, &scratch, &faults)?;

        let mut report = BatchReport {
            pairs: pairs.len(),
            frame_dir,
            fault_log: Some(log_path),
            ..BatchReport::default()
        };
        for (pair, outcome) in pairs.iter().zip(outcomes) {
            match outcome {
                Ok(PairOutcome::Written(n)) => {
                    report.completed += 1;
                    report.frames_written += n;
                }
                Ok(PairOutcome::Resumed) => report.resumed += 1,
                Err(e) => report.skipped.push(SkipRecord::new(&pair.id, &e)),
            }
        }
        report.skipped.sort_by(|a, b| a.pair_id.cmp(&b.pair_id));

        log::info!(
            "{} frame(s) from {} pair(s), {} resumed, {} skipped (see {})",
            report.frames_written,
            report.completed,
            report.resumed,
            report.skipped.len(),
            faults.path().display()
        );
        Ok(report)
    }

    /// 处理所有数据对, 结果与 `pairs` 一一对应.
    fn process_all(
        &self,
        pairs: &[PairSpec],
        frame_dir: &Path,
        scratch: &Path,
        faults: &FaultLog,
    ) -> Result<Vec<Result<PairOutcome, PairError>>, BatchError> {
        let task = |pair: &PairSpec| {
            let outcome = self.process_pair(pair, frame_dir, scratch);
            if let Err(e) = &outcome {
                log::warn!("skipping {}: {} ({e})", pair.id, e.kind());
                if let Err(io) = faults.append(&SkipRecord::new(&pair.id, e)) {
                    log::error!("cannot append to {}: {io}", faults.path().display());
                }
            }
            outcome
        };

        map_pairs(pairs, self.config.jobs, task)
    }

    /// 数据对专属的随机数发生器.
    fn pair_rng(&self, pair_id: &str) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ stable_hash(pair_id)),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// 该数据对是否已有输出.
    fn has_outputs(&self, pair: &PairSpec, frame_dir: &Path) -> bool {
        if self.config.mode.positives() {
            return frame_dir.join(format!("{}_frame0.png", pair.id)).is_file();
        }
        let prefix = format!("{}_frame_", pair.id);
        std::fs::read_dir(frame_dir).is_ok_and(|rd| {
            rd.filter_map(Result::ok)
                .any(|e| e.file_name().to_string_lossy().starts_with(&prefix))
        })
    }

    /// 处理单个数据对: 所有帧先在内存中生成, 全部成功后才写出.
    pub fn process_pair(
        &self,
        pair: &PairSpec,
        frame_dir: &Path,
        scratch: &Path,
    ) -> Result<PairOutcome, PairError> {
        if self.config.skip_existing && self.has_outputs(pair, frame_dir) {
            log::debug!("{}: outputs exist, skipped", pair.id);
            return Ok(PairOutcome::Resumed);
        }

        // 离开作用域时连同其中的中间文件一并删除.
        let workdir = tempfile::Builder::new()
            .prefix(&format!("{}-", pair.id))
            .tempdir_in(scratch)
            .map_err(PairError::Workdir)?;

        let frames = self.frames_for(pair, frame_dir, workdir.path())?;

        for frame in &frames {
            let path = frame_dir.join(frame.file_name(&pair.id));
            frame
                .save_raw(&path)
                .map_err(|source| PairError::WriteFrame { path, source })?;
        }
        log::debug!("{}: {} frame(s) written", pair.id, frames.len());
        Ok(PairOutcome::Written(frames.len()))
    }

    /// 取向提取、重定向、归一化与采样.
    fn frames_for(
        &self,
        pair: &PairSpec,
        frame_dir: &Path,
        workdir: &Path,
    ) -> Result<Vec<Frame>, PairError> {
        let mode = self.config.mode;
        let records = match self.extractor.extract(&pair.annotation, workdir) {
            Ok(records) => records,
            Err(ExtractError::NoAnnotations)
                if mode.negatives()
                    && self.config.negative_fallback == NegativeFallback::Unrotated =>
            {
                log::debug!("{}: no annotations, unrotated negatives", pair.id);
                let volume = VolumeSource::open(&pair.volume)?;
                return self.unrotated_negatives(pair, &volume, frame_dir, workdir);
            }
            Err(e) => return Err(e.into()),
        };
        log::debug!("{}: {} record(s) extracted", pair.id, records.len());

        if mode.negatives() && records.len() > 1 {
            return Err(SampleError::MultiStructureUnsupported(records.len()).into());
        }

        let volume = VolumeSource::open(&pair.volume)?;
        let mut rng = self.pair_rng(&pair.id);
        let count = self.config.frames_per_image;
        let mut frames = Vec::new();

        for (k, record) in records.iter().enumerate() {
            let image = self.project(pair, &volume, record, k, frame_dir, workdir)?;
            if mode.positives() {
                let mut positives = self.sampler.sample(&image, count, &mut rng)?;
                positives.iter_mut().for_each(|f| f.shift_index(k * count));
                frames.extend(positives);
            }
            if mode.negatives() {
                frames.extend(self.sampler.sample_negative(&image, &[image.center()])?);
            }
        }
        Ok(frames)
    }

    /// 没有标注时, 以体数据中心为旋转中心、不旋转地取 slab, 并且不设排除框.
    fn unrotated_negatives(
        &self,
        pair: &PairSpec,
        volume: &VolumeSource,
        frame_dir: &Path,
        workdir: &Path,
    ) -> Result<Vec<Frame>, PairError> {
        let (z, h, w) = volume.info().shape();
        let half = |n: usize| (n as f64 - 1.0).max(0.0) / 2.0;
        let record = AnnotationRecord::unrotated([half(w), half(h), half(z)]);
        let image = self.project(pair, volume, &record, 0, frame_dir, workdir)?;
        Ok(self.sampler.sample_negative(&image, &[])?)
    }

    /// 第 `k` 条标注的归一化投影.
    fn project(
        &self,
        pair: &PairSpec,
        volume: &VolumeSource,
        record: &AnnotationRecord,
        k: usize,
        frame_dir: &Path,
        workdir: &Path,
    ) -> Result<GrayImage8, PairError> {
        let projection = self.reorienter.reorient(volume, record, workdir)?;
        log::debug!("{}: record {k} reoriented", pair.id);

        if self.config.keep_projections {
            let path: PathBuf = frame_dir.join(format!("{}_averaged{k}.mrc", pair.id));
            mrc::write_slice(&path, projection.view())
                .map_err(|source| PairError::WriteProjection { path, source })?;
        }

        let image = projection.normalize(&self.normalizer)?;
        log::debug!("{}: record {k} normalized", pair.id);
        Ok(image)
    }
}
