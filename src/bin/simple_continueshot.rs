// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续帧推理与后处理
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
  config::{PostprocessConfig, SuppressionPolicy},
  input::SyntheticInput,
  model::ReplayBackend,
  output::OutputWrapper,
  pipeline::{Detector, Postprocessor},
  task::{ContinuousTask, Task},
};
use tracing::info;

/// Shanan YOLOX 连续帧参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 颜色表文件
  #[arg(long, value_name = "COLORMAP")]
  pub colormap: Url,
  /// 推理后端
  #[arg(long, value_name = "BACKEND")]
  pub backend: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  #[arg(long, default_value = "224", value_name = "DIM")]
  pub target_dim: u32,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,
  /// 按类别分别做 NMS
  #[arg(long)]
  pub per_class_nms: bool,
  /// 屏幕宽度，缺省与源图一致
  #[arg(long, requires = "screen_height")]
  pub screen_width: Option<f32>,
  /// 屏幕高度，缺省与源图一致
  #[arg(long, requires = "screen_width")]
  pub screen_height: Option<f32>,
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

  let suppression = if args.per_class_nms {
    SuppressionPolicy::PerClass
  } else {
    SuppressionPolicy::ClassAgnostic
  };
  let config = PostprocessConfig::default()
    .with_target_dim(args.target_dim)
    .with_confidence_threshold(args.confidence)
    .with_nms_threshold(args.nms_threshold)
    .with_suppression(suppression);
  let colormap = Colormap::from_url(&args.colormap)?;
  let postprocessor = Postprocessor::new(config, colormap)?;

  let screen_dims = args.screen_width.zip(args.screen_height);
  let input = SyntheticInput::from_url(&args.input)?.into_frames(
    postprocessor.config(),
    screen_dims,
    args.mirror,
  )?;
  let backend = ReplayBackend::from_url(&args.backend)?;
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_interrupt_handler(true)
    .run_task(input, Detector::new(backend, postprocessor), output)?;

  Ok(())
}
