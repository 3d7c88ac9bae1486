// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/postprocess/grid.rs - 无锚框网格生成与缓存
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

use tracing::{debug, info};

/// 某一尺度特征图上的一个网格位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
  pub x: u32,
  pub y: u32,
  pub stride: u32,
}

/// 按步长顺序逐尺度、尺度内按行生成网格。
///
/// 返回顺序即输出缓冲区的布局顺序。步长为 0 的尺度不产生网格。
pub fn generate_grid(strides: &[u32], input_height: u32, input_width: u32) -> Vec<GridCell> {
  let mut cells = Vec::with_capacity(grid_cell_count(strides, input_height, input_width));

  for &stride in strides {
    let grid_h = input_height.checked_div(stride).unwrap_or(0);
    let grid_w = input_width.checked_div(stride).unwrap_or(0);

    for y in 0..grid_h {
      for x in 0..grid_w {
        cells.push(GridCell { x, y, stride });
      }
    }
  }

  cells
}

/// Σ ⌊h/s⌋ · ⌊w/s⌋
pub fn grid_cell_count(strides: &[u32], input_height: u32, input_width: u32) -> usize {
  strides
    .iter()
    .map(|&stride| {
      let grid_h = input_height.checked_div(stride).unwrap_or(0) as usize;
      let grid_w = input_width.checked_div(stride).unwrap_or(0) as usize;
      grid_h * grid_w
    })
    .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey {
  pub width: u32,
  pub height: u32,
}

/// 网格缓存，仅在输入分辨率变化时重建
#[derive(Debug, Clone)]
pub struct GridCache {
  strides: Box<[u32]>,
  key: Option<GridKey>,
  cells: Vec<GridCell>,
}

impl GridCache {
  pub fn new(strides: &[u32]) -> Self {
    Self {
      strides: strides.into(),
      key: None,
      cells: Vec::new(),
    }
  }

  /// 确保缓存对应 `(width, height)`，发生重建时返回 `true`
  pub fn refresh(&mut self, width: u32, height: u32) -> bool {
    let key = GridKey { width, height };
    if self.key == Some(key) {
      return false;
    }

    self.cells = generate_grid(&self.strides, height, width);
    self.key = Some(key);
    info!(
      "输入分辨率变为 {}x{}, 重建网格: {} 个网格",
      width,
      height,
      self.cells.len()
    );
    debug!("步长: {:?}", self.strides);
    true
  }

  pub fn cells(&self) -> &[GridCell] {
    &self.cells
  }

  pub fn key(&self) -> Option<GridKey> {
    self.key
  }

  pub fn strides(&self) -> &[u32] {
    &self.strides
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cells_are_scale_major_then_row_major() {
    let cells = generate_grid(&[8, 16], 16, 32);
    // 步长 8: 2 行 x 4 列，步长 16: 1 行 x 2 列
    assert_eq!(cells.len(), 8 + 2);
    assert_eq!(cells[0], GridCell { x: 0, y: 0, stride: 8 });
    assert_eq!(cells[3], GridCell { x: 3, y: 0, stride: 8 });
    assert_eq!(cells[4], GridCell { x: 0, y: 1, stride: 8 });
    assert_eq!(cells[8], GridCell { x: 0, y: 0, stride: 16 });
    assert_eq!(cells[9], GridCell { x: 1, y: 0, stride: 16 });
  }

  #[test]
  fn count_uses_integer_division() {
    assert_eq!(grid_cell_count(&[8, 16, 32], 224, 224), 28 * 28 + 14 * 14 + 7 * 7);
    assert_eq!(grid_cell_count(&[8, 16, 32], 100, 70), 12 * 8 + 6 * 4 + 3 * 2);
    assert_eq!(generate_grid(&[8, 16, 32], 100, 70).len(), 12 * 8 + 6 * 4 + 3 * 2);
    assert_eq!(grid_cell_count(&[0, 8], 16, 16), 4);
  }

  #[test]
  fn stride_order_is_preserved() {
    let cells = generate_grid(&[32, 8], 32, 32);
    assert_eq!(cells[0].stride, 32);
    assert!(cells[1..].iter().all(|c| c.stride == 8));
  }

  #[test]
  fn generation_is_deterministic() {
    assert_eq!(
      generate_grid(&[8, 16, 32], 320, 256),
      generate_grid(&[8, 16, 32], 320, 256)
    );
  }

  #[test]
  fn cache_rebuilds_only_on_resolution_change() {
    let mut cache = GridCache::new(&[8, 16, 32]);
    assert!(cache.key().is_none());
    assert!(cache.cells().is_empty());

    assert!(cache.refresh(224, 224));
    let first = cache.cells().to_vec();
    assert_eq!(first.len(), 1029);

    assert!(!cache.refresh(224, 224));
    assert_eq!(cache.cells(), first.as_slice());

    assert!(cache.refresh(256, 224));
    assert_eq!(cache.key(), Some(GridKey { width: 256, height: 224 }));
    assert_eq!(cache.cells().len(), grid_cell_count(&[8, 16, 32], 224, 256));
  }
}
