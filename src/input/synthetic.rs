// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/input/synthetic.rs - 合成帧输入
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
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::PostprocessConfig,
  frame::{FrameError, InputFrame, RgbFrame},
  postprocess::{GeometryError, ViewGeometry},
};

#[derive(Error, Debug)]
pub enum SyntheticInputError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("Invalid query parameter: {0}")]
  InvalidQuery(String),
  #[error("Geometry error: {0}")]
  GeometryError(#[from] GeometryError),
  #[error("Frame error: {0}")]
  FrameError(#[from] FrameError),
}

const SYNTHETIC_DEFAULT_WIDTH: u32 = 1280;
const SYNTHETIC_DEFAULT_HEIGHT: u32 = 720;

/// 生成指定源尺寸的全黑帧，按中心裁剪得到模型输入。
///
/// `synthetic:///?width=1280&height=720&frames=10`，省略 `frames` 时无限输出。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticInput {
  width: u32,
  height: u32,
  frames: Option<usize>,
}

impl FromUrlWithScheme for SyntheticInput {
  const SCHEME: &'static str = "synthetic";
}

fn parse_query<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SyntheticInputError> {
  value.parse().map_err(|_| {
    error!("Invalid query parameter: {}={}", key, value);
    SyntheticInputError::InvalidQuery(format!("{}={}", key, value))
  })
}

impl FromUrl for SyntheticInput {
  type Error = SyntheticInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(SyntheticInputError::SchemeMismatch);
    }

    let mut input = SyntheticInput {
      width: SYNTHETIC_DEFAULT_WIDTH,
      height: SYNTHETIC_DEFAULT_HEIGHT,
      frames: None,
    };
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "width" => input.width = parse_query(&k, &v)?,
        "height" => input.height = parse_query(&k, &v)?,
        "frames" => input.frames = Some(parse_query(&k, &v)?),
        _ => {}
      }
    }

    Ok(input)
  }
}

impl SyntheticInput {
  pub fn new(width: u32, height: u32, frames: Option<usize>) -> Self {
    Self {
      width,
      height,
      frames,
    }
  }

  pub fn dims(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  /// 按配置计算中心裁剪，屏幕尺寸缺省时与源图一致
  pub fn into_frames(
    self,
    config: &PostprocessConfig,
    screen_dims: Option<(f32, f32)>,
    mirrored: bool,
  ) -> Result<SyntheticFrames, SyntheticInputError> {
    let screen_dims = screen_dims.unwrap_or((self.width as f32, self.height as f32));
    let view = ViewGeometry::center_crop(self.dims(), config, screen_dims, mirrored)?;
    let (input_w, input_h) = view.input_dims();
    let tensor = RgbFrame::blank(input_w, input_h)?;

    info!(
      "合成输入: 源尺寸 {}x{}, 模型输入 {}x{}, 裁剪偏移 {:?}",
      self.width,
      self.height,
      input_w,
      input_h,
      view.crop_offset()
    );

    Ok(SyntheticFrames {
      frame: InputFrame { tensor, view },
      remaining: self.frames,
    })
  }
}

pub struct SyntheticFrames {
  frame: InputFrame,
  remaining: Option<usize>,
}

impl Iterator for SyntheticFrames {
  type Item = InputFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self.remaining {
      Some(0) => None,
      Some(ref mut n) => {
        *n -= 1;
        Some(self.frame.clone())
      }
      None => Some(self.frame.clone()),
    }
  }
}
