// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use crate::postprocess::ViewGeometry;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {got}")]
  LengthMismatch { expected: usize, got: usize },
  #[error("帧尺寸不能为 0: {width}x{height}")]
  ZeroSized { width: u32, height: u32 },
}

/// 通道交错（NHWC）的 RGB 输入张量，尺寸在运行时确定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl RgbFrame {
  pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    if width == 0 || height == 0 {
      return Err(FrameError::ZeroSized { width, height });
    }

    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        got: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  /// 全黑帧
  pub fn blank(width: u32, height: u32) -> Result<Self, FrameError> {
    let size = RGB_CHANNELS * width as usize * height as usize;
    Self::new(width, height, vec![0u8; size])
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

/// 送入推理的裁剪后张量，以及把结果映射回屏幕所需的几何信息
#[derive(Debug, Clone, PartialEq)]
pub struct InputFrame {
  pub tensor: RgbFrame,
  pub view: ViewGeometry,
}
