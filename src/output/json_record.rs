// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/output/json_record.rs - JSON 行记录输出
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

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::InputFrame,
  model::{FrameResult, LabeledBox},
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("记录文件锁已损坏")]
  Poisoned,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
  frame: u64,
  count: usize,
  mirrored: bool,
  boxes: &'a [LabeledBox],
}

struct RecordState {
  writer: BufWriter<File>,
  frame_id: u64,
}

/// 每帧写一行 JSON，`record:///path/to/result.jsonl`，带 `?always` 时空结果也记录
pub struct JsonRecordOutput {
  state: Mutex<RecordState>,
  always: bool,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let append = uri.query_pairs().any(|(k, _)| k == "append");
    Self::create(uri.path(), always, append)
  }
}

impl JsonRecordOutput {
  pub fn create(
    path: impl AsRef<Path>,
    always: bool,
    append: bool,
  ) -> Result<Self, JsonRecordOutputError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
      .create(true)
      .write(true)
      .append(append)
      .truncate(!append)
      .open(path)?;
    info!("检测结果记录到文件: {}", path.display());

    Ok(JsonRecordOutput {
      state: Mutex::new(RecordState {
        writer: BufWriter::new(file),
        frame_id: 0,
      }),
      always,
    })
  }
}

impl Render<InputFrame, FrameResult> for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(&self, frame: &InputFrame, result: &FrameResult) -> Result<(), Self::Error> {
    let mut state = self
      .state
      .lock()
      .map_err(|_| JsonRecordOutputError::Poisoned)?;
    state.frame_id += 1;

    if !self.always && result.is_empty() {
      return Ok(());
    }

    let record = FrameRecord {
      frame: state.frame_id,
      count: result.count(),
      mirrored: frame.view.mirrored(),
      boxes: result.boxes(),
    };
    serde_json::to_writer(&mut state.writer, &record)?;
    state.writer.write_all(b"\n")?;
    state.writer.flush()?;
    debug!("记录第 {} 帧, {} 个物体", record.frame, record.count);

    Ok(())
  }
}
