// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/bin/simple_oneshot.rs - 单帧推理与后处理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_yolox::{
  FromUrl,
  colormap::Colormap,
  config::PostprocessConfig,
  input::SyntheticInput,
  model::ReplayBackend,
  output::OutputWrapper,
  pipeline::{Detector, Postprocessor},
  task::{OneShotTask, Task},
};
use tracing::info;

/// Shanan YOLOX 单帧参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 颜色表文件，例如 colormap:///path/to/colormap.json
  #[arg(long, value_name = "COLORMAP")]
  pub colormap: Url,
  /// 推理后端，例如 replay:///path/to/recording.json?warmup=0
  #[arg(long, value_name = "BACKEND")]
  pub backend: Url,
  /// 输入来源，例如 synthetic:///?width=1280&height=720
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，log: 或 record:///path/to/result.jsonl
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,
  /// 模型输入目标尺寸
  #[arg(long, default_value = "224", value_name = "DIM")]
  pub target_dim: u32,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,
  /// 镜像显示
  #[arg(long)]
  pub mirror: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("颜色表路径: {}", args.colormap);
  info!("推理后端: {}", args.backend);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = PostprocessConfig::default()
    .with_target_dim(args.target_dim)
    .with_confidence_threshold(args.confidence)
    .with_nms_threshold(args.nms_threshold);
  let colormap = Colormap::from_url(&args.colormap)?;
  let postprocessor = Postprocessor::new(config, colormap)?;

  let input = SyntheticInput::from_url(&args.input)?.into_frames(
    postprocessor.config(),
    None,
    args.mirror,
  )?;
  let backend = ReplayBackend::from_url(&args.backend)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let summary = OneShotTask.run_task(input, Detector::new(backend, postprocessor), output)?;
  info!("检测到 {} 个物体", summary.detections);

  Ok(())
}
