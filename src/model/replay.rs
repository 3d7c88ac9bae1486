// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/model/replay.rs - 回放录制的推理输出
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{InferenceBackend, InferenceStatus},
};

#[derive(Error, Debug)]
pub enum ReplayBackendError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("录制文件解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("查询参数无效: {0}")]
  InvalidQuery(String),
  #[error("录制文件中没有帧")]
  EmptyRecording,
  #[error("录制帧 {frame} 长度不匹配: 期望 {expected}, 实际 {got}")]
  LengthMismatch {
    frame: usize,
    expected: usize,
    got: usize,
  },
}

#[derive(Deserialize)]
struct Recording {
  frames: Vec<Vec<f32>>,
}

/// 依次回放录制好的原始输出缓冲区，播放完后从头循环。
///
/// 前 `warmup` 次调用报告未就绪，模拟模型加载过程。
#[derive(Debug, Clone)]
pub struct ReplayBackend {
  frames: Vec<Vec<f32>>,
  cursor: usize,
  warmup: usize,
}

impl ReplayBackend {
  pub fn from_frames(frames: Vec<Vec<f32>>) -> Result<Self, ReplayBackendError> {
    if frames.is_empty() {
      return Err(ReplayBackendError::EmptyRecording);
    }
    Ok(Self {
      frames,
      cursor: 0,
      warmup: 0,
    })
  }

  /// 解析 `{"frames": [[...], ...]}`
  pub fn from_json_str(json: &str) -> Result<Self, ReplayBackendError> {
    let recording: Recording = serde_json::from_str(json)?;
    Self::from_frames(recording.frames)
  }

  pub fn with_warmup(mut self, warmup: usize) -> Self {
    self.warmup = warmup;
    self
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }
}

impl FromUrlWithScheme for ReplayBackend {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayBackend {
  type Error = ReplayBackendError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayBackendError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut warmup = 0;
    for (k, v) in url.query_pairs() {
      if k == "warmup" {
        warmup = v
          .parse()
          .map_err(|_| ReplayBackendError::InvalidQuery(format!("warmup={}", v)))?;
      }
    }

    info!("加载录制文件: {}", url.path());
    let json = std::fs::read_to_string(url.path())?;
    let backend = Self::from_json_str(&json)?.with_warmup(warmup);
    debug!("录制文件包含 {} 帧, 预热 {} 帧", backend.len(), warmup);
    Ok(backend)
  }
}

impl InferenceBackend for ReplayBackend {
  type Error = ReplayBackendError;

  fn infer(&mut self, _input: &RgbFrame, output: &mut [f32]) -> Result<InferenceStatus, Self::Error> {
    if self.warmup > 0 {
      self.warmup -= 1;
      return Ok(InferenceStatus::NotReady);
    }

    let index = self.cursor % self.frames.len();
    let frame = &self.frames[index];
    if frame.len() != output.len() {
      error!(
        "录制帧 {} 长度不匹配: 期望 {}, 实际 {}",
        index,
        output.len(),
        frame.len()
      );
      return Err(ReplayBackendError::LengthMismatch {
        frame: index,
        expected: output.len(),
        got: frame.len(),
      });
    }

    output.copy_from_slice(frame);
    self.cursor += 1;
    Ok(InferenceStatus::Ready)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn warmup_then_cycles_frames() {
    let mut backend = ReplayBackend::from_json_str(r#"{"frames": [[1.0, 2.0], [3.0, 4.0]]}"#)
      .unwrap()
      .with_warmup(1);
    let frame = RgbFrame::blank(2, 2).unwrap();
    let mut output = [0.0f32; 2];

    assert_eq!(
      backend.infer(&frame, &mut output).unwrap(),
      InferenceStatus::NotReady
    );
    assert_eq!(output, [0.0, 0.0]);

    assert_eq!(
      backend.infer(&frame, &mut output).unwrap(),
      InferenceStatus::Ready
    );
    assert_eq!(output, [1.0, 2.0]);
    backend.infer(&frame, &mut output).unwrap();
    assert_eq!(output, [3.0, 4.0]);
    backend.infer(&frame, &mut output).unwrap();
    assert_eq!(output, [1.0, 2.0]);
  }

  #[test]
  fn length_mismatch_is_an_error() {
    let mut backend = ReplayBackend::from_frames(vec![vec![0.0; 3]]).unwrap();
    let frame = RgbFrame::blank(2, 2).unwrap();
    let mut output = [0.0f32; 4];
    assert!(matches!(
      backend.infer(&frame, &mut output),
      Err(ReplayBackendError::LengthMismatch {
        frame: 0,
        expected: 4,
        got: 3
      })
    ));
  }

  #[test]
  fn empty_recording_is_rejected() {
    assert!(matches!(
      ReplayBackend::from_json_str(r#"{"frames": []}"#),
      Err(ReplayBackendError::EmptyRecording)
    ));
  }

  #[test]
  fn from_url_reads_warmup_query() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.json");
    std::fs::write(&path, r#"{"frames": [[0.5]]}"#).unwrap();

    let url = Url::parse(&format!("replay://{}?warmup=3", path.display())).unwrap();
    let mut backend = ReplayBackend::from_url(&url).unwrap();
    let frame = RgbFrame::blank(1, 1).unwrap();
    let mut output = [0.0f32; 1];
    for _ in 0..3 {
      assert_eq!(
        backend.infer(&frame, &mut output).unwrap(),
        InferenceStatus::NotReady
      );
    }
    assert_eq!(
      backend.infer(&frame, &mut output).unwrap(),
      InferenceStatus::Ready
    );

    let url = Url::parse(&format!("replay://{}?warmup=many", path.display())).unwrap();
    assert!(matches!(
      ReplayBackend::from_url(&url),
      Err(ReplayBackendError::InvalidQuery(_))
    ));
  }
}
