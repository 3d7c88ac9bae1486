// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/postprocess/decode.rs - 候选框解码
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
use tracing::{debug, error};

use crate::{config::YOLOX_NUM_BBOX_FIELDS, model::Box2D, postprocess::GridCell};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("输出缓冲区长度不匹配: 期望 {expected} ({cells} 个网格 x {proposal_length}), 实际 {got}")]
  BufferLengthMismatch {
    expected: usize,
    got: usize,
    cells: usize,
    proposal_length: usize,
  },
  #[error("框字段数量至少为 {min}, 实际为 {got}")]
  TooFewBoxFields { min: usize, got: usize },
  #[error("类别数量为 0")]
  NoClasses,
}

/// 一个网格在输出缓冲区中的切片，按需解码
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawProposal<'a> {
  raw: &'a [f32],
  cell: GridCell,
  num_box_fields: usize,
}

impl<'a> RawProposal<'a> {
  /// 至少需要 5 个框字段和 1 个类别分数，否则返回 `None`
  pub fn new(raw: &'a [f32], cell: GridCell, num_box_fields: usize) -> Option<Self> {
    if num_box_fields < YOLOX_NUM_BBOX_FIELDS || raw.len() <= num_box_fields {
      return None;
    }
    Some(Self {
      raw,
      cell,
      num_box_fields,
    })
  }

  pub fn cell(&self) -> GridCell {
    self.cell
  }

  /// 中心点 `((raw[0] + x) * s, (raw[1] + y) * s)`
  pub fn center(&self) -> (f32, f32) {
    let stride = self.cell.stride as f32;
    (
      (self.raw[0] + self.cell.x as f32) * stride,
      (self.raw[1] + self.cell.y as f32) * stride,
    )
  }

  /// 宽高 `(exp(raw[2]) * s, exp(raw[3]) * s)`
  pub fn size(&self) -> (f32, f32) {
    let stride = self.cell.stride as f32;
    (self.raw[2].exp() * stride, self.raw[3].exp() * stride)
  }

  pub fn objectness(&self) -> f32 {
    self.raw[4]
  }

  pub fn class_scores(&self) -> &'a [f32] {
    &self.raw[self.num_box_fields..]
  }

  /// 最高类别分数及其索引，分数相同时取较小索引
  pub fn best_class(&self) -> (usize, f32) {
    let mut best = (0, f32::NEG_INFINITY);
    for (index, &score) in self.class_scores().iter().enumerate() {
      if score > best.1 {
        best = (index, score);
      }
    }
    best
  }

  pub fn to_box(&self, class_index: usize, score: f32) -> Box2D {
    let (cx, cy) = self.center();
    let (w, h) = self.size();
    Box2D {
      x: cx - w / 2.0,
      y: cy - h / 2.0,
      width: w,
      height: h,
      class_index,
      score,
    }
  }
}

/// 解码全部网格并按 `objectness * max(class_scores)` 过滤。
///
/// `output[i * proposal_length + k]` 对应 `grid[i]`，其中
/// `proposal_length = num_classes + num_box_fields`。输出保持网格顺序。
pub fn decode_proposals(
  output: &[f32],
  grid: &[GridCell],
  num_classes: usize,
  num_box_fields: usize,
  confidence_threshold: f32,
) -> Result<Vec<Box2D>, DecodeError> {
  if num_box_fields < YOLOX_NUM_BBOX_FIELDS {
    return Err(DecodeError::TooFewBoxFields {
      min: YOLOX_NUM_BBOX_FIELDS,
      got: num_box_fields,
    });
  }
  if num_classes == 0 {
    return Err(DecodeError::NoClasses);
  }

  let proposal_length = num_classes + num_box_fields;
  let expected = grid.len() * proposal_length;
  if output.len() != expected {
    error!(
      "输出缓冲区长度不匹配: 期望 {}, 实际 {}",
      expected,
      output.len()
    );
    return Err(DecodeError::BufferLengthMismatch {
      expected,
      got: output.len(),
      cells: grid.len(),
      proposal_length,
    });
  }

  let mut boxes = Vec::new();
  for (cell, raw) in grid.iter().zip(output.chunks_exact(proposal_length)) {
    // 字段数量与切片长度已在上面校验过
    let Some(proposal) = RawProposal::new(raw, *cell, num_box_fields) else {
      continue;
    };
    let (class_index, class_score) = proposal.best_class();
    let score = proposal.objectness() * class_score;

    // NaN 同样被拒绝
    if !(score >= confidence_threshold) {
      continue;
    }

    boxes.push(proposal.to_box(class_index, score));
  }

  debug!(
    "解码 {} 个网格, {} 个候选框高于阈值 {}",
    grid.len(),
    boxes.len(),
    confidence_threshold
  );
  Ok(boxes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::postprocess::generate_grid;

  const NUM_CLASSES: usize = 3;
  const PROPOSAL_LENGTH: usize = NUM_CLASSES + YOLOX_NUM_BBOX_FIELDS;

  fn zeros(grid: &[GridCell]) -> Vec<f32> {
    vec![0.0; grid.len() * PROPOSAL_LENGTH]
  }

  #[test]
  fn single_confident_cell_yields_one_box() {
    let grid = generate_grid(&[8, 16, 32], 64, 64);
    let mut output = zeros(&grid);

    let index = 5;
    let base = index * PROPOSAL_LENGTH;
    output[base + 4] = 0.9;
    output[base + 5 + 1] = 0.8;

    let boxes = decode_proposals(&output, &grid, NUM_CLASSES, 5, 0.5).unwrap();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].class_index, 1);
    assert!((boxes[0].score - 0.72).abs() < 1e-6);

    // 偏移为 0，exp(0) = 1
    let cell = grid[index];
    let stride = cell.stride as f32;
    assert!((boxes[0].width - stride).abs() < 1e-6);
    assert!((boxes[0].x - (cell.x as f32 * stride - stride / 2.0)).abs() < 1e-6);
    assert!((boxes[0].y - (cell.y as f32 * stride - stride / 2.0)).abs() < 1e-6);
  }

  #[test]
  fn decodes_offsets_and_log_sizes() {
    let cell = GridCell {
      x: 3,
      y: 2,
      stride: 16,
    };
    let raw = [0.5, 0.25, 2.0f32.ln(), 0.0, 1.0, 0.1, 0.9, 0.3];
    let proposal = RawProposal::new(&raw, cell, 5).unwrap();

    assert_eq!(proposal.center(), (56.0, 36.0));
    let (w, h) = proposal.size();
    assert!((w - 32.0).abs() < 1e-4);
    assert!((h - 16.0).abs() < 1e-4);
    assert_eq!(proposal.best_class(), (1, 0.9));

    let bbox = proposal.to_box(1, 0.9);
    assert!((bbox.x - 40.0).abs() < 1e-4);
    assert!((bbox.y - 28.0).abs() < 1e-4);
  }

  #[test]
  fn ties_pick_lowest_class_index() {
    let raw = [0.0, 0.0, 0.0, 0.0, 1.0, 0.7, 0.7, 0.2];
    let proposal = RawProposal::new(&raw, GridCell { x: 0, y: 0, stride: 8 }, 5).unwrap();
    assert_eq!(proposal.best_class(), (0, 0.7));
  }

  #[test]
  fn short_slices_are_not_proposals() {
    let cell = GridCell { x: 0, y: 0, stride: 8 };
    assert!(RawProposal::new(&[], cell, 5).is_none());
    assert!(RawProposal::new(&[0.0, 0.0, 0.0, 0.0], cell, 5).is_none());
    // 只有框字段，没有类别分数
    assert!(RawProposal::new(&[0.0; 5], cell, 5).is_none());
    assert!(RawProposal::new(&[0.0; 6], cell, 4).is_none());
    assert!(RawProposal::new(&[0.0; 6], cell, 5).is_some());
  }

  #[test]
  fn threshold_is_inclusive() {
    let grid = generate_grid(&[8], 8, 8);
    let output = [0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 0.0, 0.0];
    assert_eq!(decode_proposals(&output, &grid, 3, 5, 0.5).unwrap().len(), 1);
    assert!(decode_proposals(&output, &grid, 3, 5, 0.51).unwrap().is_empty());
  }

  #[test]
  fn nan_scores_are_rejected() {
    let grid = generate_grid(&[8], 8, 8);
    let output = [0.0, 0.0, 0.0, 0.0, f32::NAN, 1.0, 0.0, 0.0];
    assert!(decode_proposals(&output, &grid, 3, 5, 0.0).unwrap().is_empty());
  }

  #[test]
  fn output_follows_grid_order() {
    let grid = generate_grid(&[8], 16, 16);
    let mut output = zeros(&grid);
    // 网格 1 分数低于网格 3，但仍排在前面
    output[PROPOSAL_LENGTH + 4] = 0.6;
    output[PROPOSAL_LENGTH + 5] = 1.0;
    output[3 * PROPOSAL_LENGTH + 4] = 0.95;
    output[3 * PROPOSAL_LENGTH + 7] = 1.0;

    let boxes = decode_proposals(&output, &grid, NUM_CLASSES, 5, 0.5).unwrap();
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0].class_index, 0);
    assert_eq!(boxes[1].class_index, 2);
    assert!(boxes[0].score < boxes[1].score);
  }

  #[test]
  fn extra_box_fields_shift_class_scores() {
    let grid = generate_grid(&[8], 8, 8);
    // 6 个框字段，2 个类别
    let output = [0.0, 0.0, 0.0, 0.0, 1.0, 99.0, 0.2, 0.9];
    let boxes = decode_proposals(&output, &grid, 2, 6, 0.5).unwrap();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].class_index, 1);
  }

  #[test]
  fn buffer_length_mismatch_fails_fast() {
    let grid = generate_grid(&[8, 16], 32, 32);
    let mut output = zeros(&grid);
    output.pop();

    let err = decode_proposals(&output, &grid, NUM_CLASSES, 5, 0.5).unwrap_err();
    assert_eq!(
      err,
      DecodeError::BufferLengthMismatch {
        expected: 20 * PROPOSAL_LENGTH,
        got: 20 * PROPOSAL_LENGTH - 1,
        cells: 20,
        proposal_length: PROPOSAL_LENGTH,
      }
    );

    output.extend([0.0; 2]);
    assert!(decode_proposals(&output, &grid, NUM_CLASSES, 5, 0.5).is_err());
  }

  #[test]
  fn rejects_bad_layout_parameters() {
    let grid = generate_grid(&[8], 8, 8);
    assert_eq!(
      decode_proposals(&[0.0; 4], &grid, 0, 4, 0.5),
      Err(DecodeError::TooFewBoxFields { min: 5, got: 4 })
    );
    assert_eq!(
      decode_proposals(&[0.0; 5], &grid, 0, 5, 0.5),
      Err(DecodeError::NoClasses)
    );
  }
}
