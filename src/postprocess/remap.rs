// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/postprocess/remap.rs - 输入尺寸计算与屏幕坐标映射
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

use crate::{
  config::{MIN_TARGET_DIM, PostprocessConfig},
  model::Box2D,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
  #[error("输入尺寸无效: {width}x{height}")]
  InvalidInputDims { width: u32, height: u32 },
  #[error("裁剪前尺寸必须为正: {width}x{height}")]
  NonPositiveSource { width: i64, height: i64 },
  #[error("屏幕尺寸无效: {width}x{height}")]
  InvalidScreenDims { width: f32, height: f32 },
}

/// 把模型坐标系下的框映射到屏幕坐标系。
///
/// 1. 加上裁剪偏移，回到裁剪前的图像坐标；
/// 2. 按 `screen / (input + 2 * offset)` 分别缩放两个轴；
/// 3. 镜像时 `x' = screen.x - x - width`。
pub fn remap(
  bbox: &Box2D,
  input_dims: (u32, u32),
  screen_dims: (f32, f32),
  crop_offset: (i32, i32),
  mirrored: bool,
) -> Box2D {
  let source_w = input_dims.0 as f32 + 2.0 * crop_offset.0 as f32;
  let source_h = input_dims.1 as f32 + 2.0 * crop_offset.1 as f32;
  let scale_x = screen_dims.0 / source_w;
  let scale_y = screen_dims.1 / source_h;

  let width = bbox.width * scale_x;
  let height = bbox.height * scale_y;
  let mut x = (bbox.x + crop_offset.0 as f32) * scale_x;
  let y = (bbox.y + crop_offset.1 as f32) * scale_y;

  if mirrored {
    x = screen_dims.0 - x - width;
  }

  Box2D {
    x,
    y,
    width,
    height,
    ..*bbox
  }
}

/// 按目标尺寸等比缩放图像，使短边等于 `max(target_dim, 64)`
pub fn calculate_input_dims(image_dims: (u32, u32), target_dim: u32) -> (u32, u32) {
  let target_dim = target_dim.max(MIN_TARGET_DIM);
  let min_side = image_dims.0.min(image_dims.1).max(1);
  let scale = target_dim as f32 / min_side as f32;
  (
    (image_dims.0 as f32 * scale).round() as u32,
    (image_dims.1 as f32 * scale).round() as u32,
  )
}

/// 将每个轴裁到最大步长的整数倍
pub fn crop_input_dims(dims: (u32, u32), strides: &[u32]) -> (u32, u32) {
  let stride = strides.iter().copied().max().unwrap_or(1).max(1);
  (dims.0 - dims.0 % stride, dims.1 - dims.1 % stride)
}

/// 一帧从模型坐标映射到屏幕坐标所需的全部几何信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewGeometry {
  input_dims: (u32, u32),
  screen_dims: (f32, f32),
  crop_offset: (i32, i32),
  mirrored: bool,
}

impl ViewGeometry {
  pub fn new(
    input_dims: (u32, u32),
    screen_dims: (f32, f32),
    crop_offset: (i32, i32),
    mirrored: bool,
  ) -> Result<Self, GeometryError> {
    if input_dims.0 == 0 || input_dims.1 == 0 {
      return Err(GeometryError::InvalidInputDims {
        width: input_dims.0,
        height: input_dims.1,
      });
    }

    let source_w = input_dims.0 as i64 + 2 * crop_offset.0 as i64;
    let source_h = input_dims.1 as i64 + 2 * crop_offset.1 as i64;
    if source_w <= 0 || source_h <= 0 {
      return Err(GeometryError::NonPositiveSource {
        width: source_w,
        height: source_h,
      });
    }

    let (sw, sh) = screen_dims;
    if !(sw.is_finite() && sh.is_finite() && sw > 0.0 && sh > 0.0) {
      return Err(GeometryError::InvalidScreenDims {
        width: sw,
        height: sh,
      });
    }

    Ok(Self {
      input_dims,
      screen_dims,
      crop_offset,
      mirrored,
    })
  }

  /// 无裁剪、无镜像，屏幕尺寸与输入一致
  pub fn identity(input_dims: (u32, u32)) -> Result<Self, GeometryError> {
    Self::new(
      input_dims,
      (input_dims.0 as f32, input_dims.1 as f32),
      (0, 0),
      false,
    )
  }

  /// 中心裁剪：先等比缩放到目标尺寸，再裁出步长整数倍的正方形输入
  pub fn center_crop(
    image_dims: (u32, u32),
    config: &PostprocessConfig,
    screen_dims: (f32, f32),
    mirrored: bool,
  ) -> Result<Self, GeometryError> {
    let source_dims = calculate_input_dims(image_dims, config.target_dim());
    let target = config.target_dim();
    let input_dims = crop_input_dims((target, target), config.strides());
    let crop_offset = (
      (source_dims.0 as i64 - input_dims.0 as i64) / 2,
      (source_dims.1 as i64 - input_dims.1 as i64) / 2,
    );
    Self::new(
      input_dims,
      screen_dims,
      (crop_offset.0 as i32, crop_offset.1 as i32),
      mirrored,
    )
  }

  pub fn remap(&self, bbox: &Box2D) -> Box2D {
    remap(
      bbox,
      self.input_dims,
      self.screen_dims,
      self.crop_offset,
      self.mirrored,
    )
  }

  pub fn input_dims(&self) -> (u32, u32) {
    self.input_dims
  }

  pub fn screen_dims(&self) -> (f32, f32) {
    self.screen_dims
  }

  pub fn crop_offset(&self) -> (i32, i32) {
    self.crop_offset
  }

  pub fn mirrored(&self) -> bool {
    self.mirrored
  }
}
