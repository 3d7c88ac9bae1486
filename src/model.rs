// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/model.rs - 推理后端边界与检测结果
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

use serde::Serialize;

use crate::{colormap::Rgba, frame::RgbFrame};

/// 推理后端单次调用的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceStatus {
  /// 输出缓冲区已写入本帧结果
  Ready,
  /// 模型尚未加载完成，本帧没有输出
  NotReady,
}

/// 推理后端。
///
/// `output` 由调用方按 `grid_cell_count * proposal_length` 分配，
/// `output[i * proposal_length + k]` 对应网格 `grid[i]` 的第 `k` 个字段。
pub trait InferenceBackend {
  type Error;

  fn infer(&mut self, input: &RgbFrame, output: &mut [f32]) -> Result<InferenceStatus, Self::Error>;
}

/// 模型坐标系下的检测框，左上角为原点
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Box2D {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
  pub class_index: usize,
  pub score: f32,
}

impl Box2D {
  /// 面积，宽或高非正时为 0
  pub fn area(&self) -> f32 {
    if self.width > 0.0 && self.height > 0.0 {
      self.width * self.height
    } else {
      0.0
    }
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }
}

/// 屏幕坐标系下带标签与颜色的检测框
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledBox {
  pub bbox: Box2D,
  pub label: String,
  pub color: Rgba,
}

/// 单帧检测结果，对外只提供框列表与数量
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameResult {
  items: Box<[LabeledBox]>,
}

impl FrameResult {
  pub fn new(items: Vec<LabeledBox>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }

  pub fn boxes(&self) -> &[LabeledBox] {
    &self.items
  }

  pub fn count(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
  /// 推理后端未就绪，本帧跳过
  NotReady,
  Detections(FrameResult),
}

impl FrameOutcome {
  /// 未就绪的帧按空结果处理
  pub fn into_result(self) -> FrameResult {
    match self {
      FrameOutcome::NotReady => FrameResult::default(),
      FrameOutcome::Detections(result) => result,
    }
  }

  pub fn is_ready(&self) -> bool {
    matches!(self, FrameOutcome::Detections(_))
  }
}

#[cfg(feature = "replay_backend")]
mod replay;
#[cfg(feature = "replay_backend")]
pub use self::replay::{ReplayBackend, ReplayBackendError};
