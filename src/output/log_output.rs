// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/output/log_output.rs - 日志输出
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
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::InputFrame,
  model::FrameResult,
  output::Render,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 把检测结果逐条写入日志，`log:` 或 `log:?quiet` 只输出数量
#[derive(Debug, Default)]
pub struct LogOutput {
  quiet: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }

    let quiet = uri.query_pairs().any(|(k, _)| k == "quiet");
    Ok(LogOutput { quiet })
  }
}

impl Render<InputFrame, FrameResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, _frame: &InputFrame, result: &FrameResult) -> Result<(), Self::Error> {
    info!("检测到 {} 个物体", result.count());
    if self.quiet {
      return Ok(());
    }

    for item in result.boxes() {
      info!(
        "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}x{:.0})",
        item.label,
        item.bbox.score * 100.0,
        item.bbox.x,
        item.bbox.y,
        item.bbox.width,
        item.bbox.height
      );
    }
    Ok(())
  }
}
