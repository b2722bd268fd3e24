//! 从带 IMOD 标注的断层重建中批量提取训练帧.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use tomo_berry::batch::{BatchConfig, InspectorKind, NegativeFallback, ResamplerKind, SampleMode};

mod result;
mod runner;

/// 命令行参数. 给出的参数覆盖配置文件中的值.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML 配置文件. 缺省时依次尝试 `$FM_FRAMES_CONFIG` 与 `./fm-frames.toml`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 数据集根目录.
    #[arg(long)]
    dataset_root: Option<PathBuf>,

    /// 输出根目录.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// slab 厚度.
    #[arg(long)]
    thickness: Option<usize>,

    /// 帧边长.
    #[arg(long)]
    frame_size: Option<usize>,

    /// 每条标注的正样本帧数.
    #[arg(long)]
    frames: Option<usize>,

    /// 体数据高度上限, 0 表示不检查.
    #[arg(long)]
    max_height: Option<usize>,

    /// 采样极性.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// 无标注的数据对也以不旋转的 slab 生成负样本.
    #[arg(long)]
    unrotated_negatives: bool,

    /// 标注查看工具.
    #[arg(long, value_enum)]
    inspector: Option<Inspector>,

    /// 重采样器.
    #[arg(long, value_enum)]
    resampler: Option<Backend>,

    /// 随机种子.
    #[arg(long)]
    seed: Option<u64>,

    /// 并行数据对数, 0 表示全部核心.
    #[arg(short, long)]
    jobs: Option<usize>,

    /// 只重跑该故障日志中列出的数据对.
    #[arg(long)]
    rerun_from: Option<PathBuf>,

    /// 已有输出的数据对不再重算.
    #[arg(long)]
    skip_existing: bool,

    /// 另存平均投影.
    #[arg(long)]
    keep_projections: bool,

    /// 只列出数据对.
    #[arg(long)]
    dry_run: bool,

    /// 日志更详细 (可重复).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Positive,
    Negative,
    Both,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Inspector {
    Imod,
    Table,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Imod,
    Native,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// 用命令行参数覆盖 `cfg`.
    fn apply(self, mut cfg: BatchConfig) -> BatchConfig {
        macro_rules! set {
            ($($arg: ident => $field: ident),+ $(,)?) => {
                $(if let Some(v) = self.$arg {
                    cfg.$field = v;
                })+
            };
        }
        set!(
            dataset_root => dataset_root,
            output_dir => output_dir,
            thickness => slab_thickness,
            frame_size => frame_size,
            frames => frames_per_image,
            max_height => max_volume_height,
            jobs => jobs,
        );

        if let Some(mode) = self.mode {
            cfg.mode = match mode {
                Mode::Positive => SampleMode::Positive,
                Mode::Negative => SampleMode::Negative,
                Mode::Both => SampleMode::Both,
            };
        }
        if let Some(i) = self.inspector {
            cfg.inspector = match i {
                Inspector::Imod => InspectorKind::Imod,
                Inspector::Table => InspectorKind::Table,
            };
        }
        if let Some(r) = self.resampler {
            cfg.resampler = match r {
                Backend::Imod => ResamplerKind::Imod,
                Backend::Native => ResamplerKind::Native,
            };
        }
        if self.unrotated_negatives {
            cfg.negative_fallback = NegativeFallback::Unrotated;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if self.rerun_from.is_some() {
            cfg.rerun_from = self.rerun_from;
        }
        cfg.skip_existing |= self.skip_existing;
        cfg.keep_projections |= self.keep_projections;
        cfg.dry_run |= self.dry_run;
        cfg
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    simple_logger::SimpleLogger::new()
        .with_level(args.log_level())
        .env()
        .init()?;

    let (cfg, source) = utils::config::load(args.config.as_deref())?;
    match &source {
        Some(p) => log::info!("configuration: {}", p.display()),
        None => log::info!("configuration: defaults"),
    }
    let cfg = args.apply(cfg);

    let report = runner::run(cfg)?;
    result::print(&report)?;
    Ok(())
}
