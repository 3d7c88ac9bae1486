// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/colormap.rs - 类别标签与颜色表
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ColormapError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("类别 '{label}' 的颜色无效: {reason}")]
  InvalidColor { label: String, reason: String },
  #[error("颜色表为空")]
  Empty,
}

/// RGBA 颜色，分量取值 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
  pub r: f32,
  pub g: f32,
  pub b: f32,
  pub a: f32,
}

impl Rgba {
  pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
    Self { r, g, b, a }
  }

  /// 从 3 或 4 个分量构造，缺省 alpha 为 1
  pub fn from_components(components: &[f32]) -> Result<Self, String> {
    if let Some(bad) = components.iter().find(|c| !(0.0..=1.0).contains(*c)) {
      return Err(format!("分量 {} 超出范围 [0, 1]", bad));
    }
    match *components {
      [r, g, b] => Ok(Self::new(r, g, b, 1.0)),
      [r, g, b, a] => Ok(Self::new(r, g, b, a)),
      _ => Err(format!("需要 3 或 4 个分量, 实际为 {}", components.len())),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassColorEntry {
  pub label: String,
  pub color: Rgba,
}

#[derive(Deserialize)]
struct ColormapFile {
  items: Vec<ColormapItem>,
}

#[derive(Deserialize)]
struct ColormapItem {
  label: String,
  color: Vec<f32>,
}

/// 按类别索引排列的颜色表，加载后只读
#[derive(Debug, Clone, PartialEq)]
pub struct Colormap {
  entries: Box<[ClassColorEntry]>,
}

impl Colormap {
  pub fn from_entries(entries: Vec<ClassColorEntry>) -> Result<Self, ColormapError> {
    if entries.is_empty() {
      return Err(ColormapError::Empty);
    }
    Ok(Self {
      entries: entries.into_boxed_slice(),
    })
  }

  /// 解析 `{"items": [{"label": ..., "color": [r, g, b]}]}`
  pub fn from_json_str(json: &str) -> Result<Self, ColormapError> {
    let file: ColormapFile = serde_json::from_str(json)?;
    let entries = file
      .items
      .into_iter()
      .map(|item| match Rgba::from_components(&item.color) {
        Ok(color) => Ok(ClassColorEntry {
          label: item.label,
          color,
        }),
        Err(reason) => {
          error!("类别 '{}' 的颜色无效: {}", item.label, reason);
          Err(ColormapError::InvalidColor {
            label: item.label,
            reason,
          })
        }
      })
      .collect::<Result<Vec<_>, _>>()?;
    debug!("颜色表包含 {} 个类别", entries.len());
    Self::from_entries(entries)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ColormapError> {
    let path = path.as_ref();
    info!("加载颜色表文件: {}", path.display());
    let json = std::fs::read_to_string(path)?;
    Self::from_json_str(&json)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, class_index: usize) -> Option<&ClassColorEntry> {
    self.entries.get(class_index)
  }

  pub fn entries(&self) -> &[ClassColorEntry] {
    &self.entries
  }

  /// 每个网格在输出缓冲区中占用的浮点数个数
  pub fn proposal_length(&self, num_box_fields: usize) -> usize {
    self.len() + num_box_fields
  }
}

impl FromUrlWithScheme for Colormap {
  const SCHEME: &'static str = "colormap";
}

impl FromUrl for Colormap {
  type Error = ColormapError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ColormapError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Self::from_path(url.path())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const HAND_GESTURES: &str = r#"{
    "items": [
      {"label": "call", "color": [0.0, 0.0, 1.0]},
      {"label": "dislike", "color": [0.5, 0.25, 0.0, 0.5]}
    ]
  }"#;

  #[test]
  fn parses_items_in_class_order() {
    let colormap = Colormap::from_json_str(HAND_GESTURES).unwrap();
    assert_eq!(colormap.len(), 2);
    assert_eq!(colormap.get(0).unwrap().label, "call");
    assert_eq!(colormap.get(0).unwrap().color, Rgba::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(colormap.get(1).unwrap().color.a, 0.5);
    assert!(colormap.get(2).is_none());
    assert_eq!(colormap.proposal_length(5), 7);
  }

  #[test]
  fn rejects_bad_colors_and_empty_maps() {
    let err = Colormap::from_json_str(r#"{"items": [{"label": "x", "color": [1.0, 0.0]}]}"#)
      .unwrap_err();
    assert!(matches!(err, ColormapError::InvalidColor { ref label, .. } if label == "x"));

    let err = Colormap::from_json_str(r#"{"items": [{"label": "x", "color": [2.0, 0.0, 0.0]}]}"#)
      .unwrap_err();
    assert!(matches!(err, ColormapError::InvalidColor { .. }));

    let err = Colormap::from_json_str(r#"{"items": []}"#).unwrap_err();
    assert!(matches!(err, ColormapError::Empty));

    let err = Colormap::from_json_str("not json").unwrap_err();
    assert!(matches!(err, ColormapError::JsonError(_)));
  }

  #[test]
  fn loads_from_colormap_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("colormap.json");
    std::fs::write(&path, HAND_GESTURES).unwrap();

    let url = Url::parse(&format!("colormap://{}", path.display())).unwrap();
    let colormap = Colormap::from_url(&url).unwrap();
    assert_eq!(colormap.len(), 2);

    let url = Url::parse(&format!("file://{}", path.display())).unwrap();
    assert!(matches!(
      Colormap::from_url(&url),
      Err(ColormapError::SchemeMismatch(_))
    ));
  }
}
