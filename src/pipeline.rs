// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/pipeline.rs - 逐帧后处理流水线
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

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  colormap::Colormap,
  config::{ConfigError, PostprocessConfig},
  frame::RgbFrame,
  model::{FrameOutcome, FrameResult, InferenceBackend, InferenceStatus, LabeledBox},
  postprocess::{
    DecodeError, GridCache, GridCell, GridKey, ViewGeometry, decode_proposals, suppress_with_policy,
  },
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("解码错误: {0}")]
  Decode(#[from] DecodeError),
  #[error("输出缓冲区尚未按分辨率准备")]
  NotPrepared,
  #[error("分辨率不匹配: 缓冲区为 {prepared:?}, 本帧为 {got:?}")]
  ResolutionMismatch { prepared: GridKey, got: (u32, u32) },
}

/// 解码 → 抑制 → 标注 → 映射。
///
/// 纯函数，所有输入都由调用方提供。配置与颜色表先做校验，不合法时不产生任何结果。
pub fn postprocess(
  output: &[f32],
  grid: &[GridCell],
  colormap: &Colormap,
  config: &PostprocessConfig,
  view: &ViewGeometry,
) -> Result<FrameResult, PipelineError> {
  config.validate()?;
  config.check_num_classes(colormap.len())?;

  let proposals = decode_proposals(
    output,
    grid,
    colormap.len(),
    config.num_box_fields(),
    config.confidence_threshold(),
  )?;
  let kept = suppress_with_policy(&proposals, config.nms_threshold(), config.suppression());

  let items = kept
    .into_iter()
    .filter_map(|index| {
      let bbox = &proposals[index];
      match colormap.get(bbox.class_index) {
        Some(entry) => Some(LabeledBox {
          bbox: view.remap(bbox),
          label: entry.label.clone(),
          color: entry.color,
        }),
        None => {
          warn!("类别索引 {} 超出颜色表范围", bbox.class_index);
          None
        }
      }
    })
    .collect();

  Ok(FrameResult::new(items))
}

/// 持有配置、颜色表、网格缓存与复用的输出缓冲区
#[derive(Debug, Clone)]
pub struct Postprocessor {
  config: PostprocessConfig,
  colormap: Colormap,
  grid: GridCache,
  output: Vec<f32>,
}

impl Postprocessor {
  pub fn new(config: PostprocessConfig, colormap: Colormap) -> Result<Self, PipelineError> {
    config.validate()?;
    config.check_num_classes(colormap.len())?;

    info!(
      "后处理配置: {} 个类别, 步长 {:?}, 置信度阈值 {}, NMS 阈值 {}",
      colormap.len(),
      config.strides(),
      config.confidence_threshold(),
      config.nms_threshold()
    );

    let grid = GridCache::new(config.strides());
    Ok(Self {
      config,
      colormap,
      grid,
      output: Vec::new(),
    })
  }

  pub fn config(&self) -> &PostprocessConfig {
    &self.config
  }

  pub fn colormap(&self) -> &Colormap {
    &self.colormap
  }

  pub fn set_confidence_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
    self.config.set_confidence_threshold(threshold)
  }

  pub fn set_nms_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
    self.config.set_nms_threshold(threshold)
  }

  pub fn proposal_length(&self) -> usize {
    self.colormap.proposal_length(self.config.num_box_fields())
  }

  /// 按分辨率准备网格与输出缓冲区，返回供推理后端写入的缓冲区
  pub fn prepare(&mut self, width: u32, height: u32) -> &mut [f32] {
    if self.grid.refresh(width, height) {
      let output_size = self.grid.cells().len() * self.proposal_length();
      self.output.clear();
      self.output.resize(output_size, 0.0);
      info!("更新输出数组大小为 {}", output_size);
    }
    &mut self.output
  }

  pub fn grid(&self) -> &[GridCell] {
    self.grid.cells()
  }

  pub fn output(&self) -> &[f32] {
    &self.output
  }

  /// 对 `prepare` 返回并已写入的缓冲区执行后处理
  pub fn process(&self, view: &ViewGeometry) -> Result<FrameResult, PipelineError> {
    let prepared = self.grid.key().ok_or(PipelineError::NotPrepared)?;
    let got = view.input_dims();
    if (prepared.width, prepared.height) != got {
      return Err(PipelineError::ResolutionMismatch { prepared, got });
    }

    postprocess(
      &self.output,
      self.grid.cells(),
      &self.colormap,
      &self.config,
      view,
    )
  }

  /// 对调用方持有的缓冲区执行后处理，网格按 `view` 的输入尺寸刷新
  pub fn process_buffer(
    &mut self,
    output: &[f32],
    view: &ViewGeometry,
  ) -> Result<FrameResult, PipelineError> {
    let (width, height) = view.input_dims();
    self.prepare(width, height);
    postprocess(
      output,
      self.grid.cells(),
      &self.colormap,
      &self.config,
      view,
    )
  }
}

#[derive(Error, Debug)]
pub enum DetectError<E> {
  #[error("推理后端错误: {0}")]
  Backend(E),
  #[error("{0}")]
  Pipeline(#[from] PipelineError),
  #[error("帧尺寸 {frame:?} 与输入尺寸 {input:?} 不一致")]
  FrameMismatch { frame: (u32, u32), input: (u32, u32) },
}

/// 推理后端与后处理的组合，每帧调用一次 `detect`
pub struct Detector<B> {
  backend: B,
  postprocessor: Postprocessor,
}

impl<B: InferenceBackend> Detector<B> {
  pub fn new(backend: B, postprocessor: Postprocessor) -> Self {
    Self {
      backend,
      postprocessor,
    }
  }

  pub fn postprocessor(&self) -> &Postprocessor {
    &self.postprocessor
  }

  pub fn postprocessor_mut(&mut self) -> &mut Postprocessor {
    &mut self.postprocessor
  }

  pub fn detect(
    &mut self,
    frame: &RgbFrame,
    view: &ViewGeometry,
  ) -> Result<FrameOutcome, DetectError<B::Error>> {
    let input = view.input_dims();
    if (frame.width(), frame.height()) != input {
      return Err(DetectError::FrameMismatch {
        frame: (frame.width(), frame.height()),
        input,
      });
    }

    let output = self.postprocessor.prepare(input.0, input.1);
    match self
      .backend
      .infer(frame, output)
      .map_err(DetectError::Backend)?
    {
      InferenceStatus::NotReady => {
        debug!("推理后端尚未就绪, 跳过本帧");
        Ok(FrameOutcome::NotReady)
      }
      InferenceStatus::Ready => {
        let result = self.postprocessor.process(view)?;
        debug!("本帧检测到 {} 个物体", result.count());
        Ok(FrameOutcome::Detections(result))
      }
    }
  }
}
