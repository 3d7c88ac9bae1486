// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/config.rs - 后处理参数配置
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
use tracing::error;

/// YOLOX 三个检测头的下采样倍数，顺序决定输出缓冲区布局
pub const YOLOX_STRIDES: [u32; 3] = [8, 16, 32];
/// 每个网格的框字段数量：cx, cy, w, h, objectness
pub const YOLOX_NUM_BBOX_FIELDS: usize = 5;
pub const DEFAULT_TARGET_DIM: u32 = 224;
/// 计算输入尺寸时目标边长的下限
pub const MIN_TARGET_DIM: u32 = 64;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("{name} 超出范围 [0, 1]: {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("步长列表为空")]
  EmptyStrides,
  #[error("步长不能为 0")]
  ZeroStride,
  #[error("目标尺寸 {target_dim} 小于最大步长 {stride}")]
  TargetDimBelowStride { target_dim: u32, stride: u32 },
  #[error("框字段数量至少为 {min}, 实际为 {got}")]
  TooFewBoxFields { min: usize, got: usize },
  #[error("类别数量不匹配: 期望 {expected}, 颜色表提供 {got}")]
  ClassCountMismatch { expected: usize, got: usize },
  #[error("颜色表为空")]
  NoClasses,
}

/// 抑制策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionPolicy {
  /// 只看几何重叠，不同类别之间也会互相抑制
  #[default]
  ClassAgnostic,
  /// 只在同一类别内部抑制
  PerClass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessConfig {
  strides: Vec<u32>,
  target_dim: u32,
  confidence_threshold: f32,
  nms_threshold: f32,
  num_box_fields: usize,
  num_classes: Option<usize>,
  suppression: SuppressionPolicy,
}

impl Default for PostprocessConfig {
  fn default() -> Self {
    Self {
      strides: YOLOX_STRIDES.to_vec(),
      target_dim: DEFAULT_TARGET_DIM,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      num_box_fields: YOLOX_NUM_BBOX_FIELDS,
      num_classes: None,
      suppression: SuppressionPolicy::default(),
    }
  }
}

/// 阈值必须落在 [0, 1]，NaN 同样视为越界
pub fn check_threshold(name: &'static str, value: f32) -> Result<(), ConfigError> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    error!("{} 超出范围: {}", name, value);
    Err(ConfigError::ThresholdOutOfRange { name, value })
  }
}

impl PostprocessConfig {
  pub fn with_strides(mut self, strides: Vec<u32>) -> Self {
    self.strides = strides;
    self
  }

  pub fn with_target_dim(mut self, target_dim: u32) -> Self {
    self.target_dim = target_dim;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn with_num_box_fields(mut self, num_box_fields: usize) -> Self {
    self.num_box_fields = num_box_fields;
    self
  }

  /// 固定期望的类别数量，加载颜色表时会据此校验
  pub fn with_num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = Some(num_classes);
    self
  }

  pub fn with_suppression(mut self, suppression: SuppressionPolicy) -> Self {
    self.suppression = suppression;
    self
  }

  /// 校验整套配置，任何一项不合法都直接返回错误
  pub fn validate(&self) -> Result<(), ConfigError> {
    check_threshold("confidence_threshold", self.confidence_threshold)?;
    check_threshold("nms_threshold", self.nms_threshold)?;

    if self.strides.is_empty() {
      return Err(ConfigError::EmptyStrides);
    }
    if self.strides.contains(&0) {
      return Err(ConfigError::ZeroStride);
    }

    let stride = self.max_stride();
    if self.target_dim < stride {
      return Err(ConfigError::TargetDimBelowStride {
        target_dim: self.target_dim,
        stride,
      });
    }

    if self.num_box_fields < YOLOX_NUM_BBOX_FIELDS {
      return Err(ConfigError::TooFewBoxFields {
        min: YOLOX_NUM_BBOX_FIELDS,
        got: self.num_box_fields,
      });
    }

    if self.num_classes == Some(0) {
      return Err(ConfigError::NoClasses);
    }

    Ok(())
  }

  /// 校验颜色表提供的类别数量
  pub fn check_num_classes(&self, got: usize) -> Result<(), ConfigError> {
    if got == 0 {
      return Err(ConfigError::NoClasses);
    }
    match self.num_classes {
      Some(expected) if expected != got => {
        error!("类别数量不匹配: 期望 {}, 实际 {}", expected, got);
        Err(ConfigError::ClassCountMismatch { expected, got })
      }
      _ => Ok(()),
    }
  }

  /// 运行时调整置信度阈值，校验失败时保持原值
  pub fn set_confidence_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
    check_threshold("confidence_threshold", threshold)?;
    self.confidence_threshold = threshold;
    Ok(())
  }

  pub fn set_nms_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
    check_threshold("nms_threshold", threshold)?;
    self.nms_threshold = threshold;
    Ok(())
  }

  pub fn strides(&self) -> &[u32] {
    &self.strides
  }

  pub fn max_stride(&self) -> u32 {
    self.strides.iter().copied().max().unwrap_or(1)
  }

  pub fn target_dim(&self) -> u32 {
    self.target_dim
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn nms_threshold(&self) -> f32 {
    self.nms_threshold
  }

  pub fn num_box_fields(&self) -> usize {
    self.num_box_fields
  }

  pub fn num_classes(&self) -> Option<usize> {
    self.num_classes
  }

  pub fn suppression(&self) -> SuppressionPolicy {
    self.suppression
  }
}
