// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::{config::SuppressionPolicy, model::Box2D};

/// 计算两个边界框的 IoU，任一框面积为 0 时返回 0
pub fn iou(a: &Box2D, b: &Box2D) -> f32 {
  let area_a = a.area();
  let area_b = b.area();
  if area_a <= 0.0 || area_b <= 0.0 {
    return 0.0;
  }

  let x1 = a.x.max(b.x);
  let y1 = a.y.max(b.y);
  let x2 = a.right().min(b.right());
  let y2 = a.bottom().min(b.bottom());

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按分数降序排列的索引，稳定排序，同分保持原顺序
pub fn sorted_by_score(boxes: &[Box2D]) -> Vec<usize> {
  let mut order: Vec<usize> = (0..boxes.len()).collect();
  order.sort_by(|&a, &b| boxes[b].score.total_cmp(&boxes[a].score));
  order
}

fn greedy(
  boxes: &[Box2D],
  iou_threshold: f32,
  competes: impl Fn(&Box2D, &Box2D) -> bool,
) -> Vec<usize> {
  let mut kept: Vec<usize> = Vec::new();

  'outer: for index in sorted_by_score(boxes) {
    let candidate = &boxes[index];
    for &accepted in kept.iter() {
      let accepted = &boxes[accepted];
      if competes(candidate, accepted) && iou(candidate, accepted) >= iou_threshold {
        continue 'outer;
      }
    }
    kept.push(index);
  }

  debug!("NMS: {} 个候选框, 保留 {} 个", boxes.len(), kept.len());
  kept
}

/// 贪心 NMS，与类别无关。
///
/// 返回原序列中保留框的索引，按分数降序。候选框与每个已保留框的 IoU
/// 都小于 `iou_threshold` 时才被保留，被丢弃的框不再参与比较。
pub fn suppress(boxes: &[Box2D], iou_threshold: f32) -> Vec<usize> {
  greedy(boxes, iou_threshold, |_, _| true)
}

/// 只在同类别框之间抑制
pub fn suppress_per_class(boxes: &[Box2D], iou_threshold: f32) -> Vec<usize> {
  greedy(boxes, iou_threshold, |a, b| a.class_index == b.class_index)
}

pub fn suppress_with_policy(
  boxes: &[Box2D],
  iou_threshold: f32,
  policy: SuppressionPolicy,
) -> Vec<usize> {
  match policy {
    SuppressionPolicy::ClassAgnostic => suppress(boxes, iou_threshold),
    SuppressionPolicy::PerClass => suppress_per_class(boxes, iou_threshold),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bbox(x: f32, y: f32, width: f32, height: f32, class_index: usize, score: f32) -> Box2D {
    Box2D {
      x,
      y,
      width,
      height,
      class_index,
      score,
    }
  }

  #[test]
  fn iou_of_known_overlaps() {
    let a = bbox(0.0, 0.0, 10.0, 10.0, 0, 0.9);
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);

    // 交集 50，并集 150
    let b = bbox(5.0, 0.0, 10.0, 10.0, 0, 0.8);
    assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);

    let c = bbox(20.0, 20.0, 5.0, 5.0, 0, 0.8);
    assert_eq!(iou(&a, &c), 0.0);
  }

  #[test]
  fn degenerate_boxes_never_overlap() {
    let a = bbox(0.0, 0.0, 10.0, 10.0, 0, 0.9);
    let flat = bbox(0.0, 0.0, 10.0, 0.0, 0, 0.8);
    let negative = bbox(0.0, 0.0, -4.0, 10.0, 0, 0.8);
    assert_eq!(iou(&a, &flat), 0.0);
    assert_eq!(iou(&flat, &flat), 0.0);
    assert_eq!(iou(&negative, &a), 0.0);

    assert_eq!(suppress(&[flat, flat, a], 0.0001), vec![2, 0, 1]);
  }

  #[test]
  fn overlap_above_threshold_keeps_higher_score() {
    // IoU = 60 / 100 = 0.6
    let low = bbox(0.0, 0.0, 8.0, 10.0, 0, 0.7);
    let high = bbox(2.0, 0.0, 8.0, 10.0, 1, 0.9);
    assert!((iou(&low, &high) - 0.6).abs() < 1e-6);

    assert_eq!(suppress(&[low, high], 0.45), vec![1]);
  }

  #[test]
  fn overlap_below_threshold_keeps_both() {
    // 交集 30，并集 100 => IoU 0.3
    let a = bbox(0.0, 0.0, 6.5, 10.0, 0, 0.6);
    let b = bbox(3.5, 0.0, 6.5, 10.0, 0, 0.8);
    assert!((iou(&a, &b) - 0.3).abs() < 1e-6);

    assert_eq!(suppress(&[a, b], 0.45), vec![1, 0]);
  }

  #[test]
  fn equal_scores_keep_input_order() {
    let boxes = [
      bbox(0.0, 0.0, 1.0, 1.0, 0, 0.5),
      bbox(10.0, 0.0, 1.0, 1.0, 0, 0.9),
      bbox(20.0, 0.0, 1.0, 1.0, 0, 0.5),
    ];
    assert_eq!(sorted_by_score(&boxes), vec![1, 0, 2]);

    // 完全相同且同分的框，保留靠前的一个
    let same = [bbox(0.0, 0.0, 4.0, 4.0, 0, 0.5), bbox(0.0, 0.0, 4.0, 4.0, 0, 0.5)];
    assert_eq!(suppress(&same, 0.5), vec![0]);
  }

  #[test]
  fn suppressed_boxes_do_not_suppress_others() {
    // b 与 a、c 都重叠，a 与 c 不重叠
    let a = bbox(0.0, 0.0, 10.0, 10.0, 0, 0.9);
    let b = bbox(5.0, 0.0, 10.0, 10.0, 0, 0.8);
    let c = bbox(10.0, 0.0, 10.0, 10.0, 0, 0.7);
    assert_eq!(suppress(&[a, b, c], 0.3), vec![0, 2]);
  }

  #[test]
  fn class_agnostic_by_default_per_class_on_request() {
    let person = bbox(0.0, 0.0, 10.0, 10.0, 0, 0.9);
    let dog = bbox(1.0, 0.0, 10.0, 10.0, 1, 0.8);

    assert_eq!(suppress(&[person, dog], 0.45), vec![0]);
    assert_eq!(
      suppress_with_policy(&[person, dog], 0.45, SuppressionPolicy::ClassAgnostic),
      vec![0]
    );
    assert_eq!(
      suppress_with_policy(&[person, dog], 0.45, SuppressionPolicy::PerClass),
      vec![0, 1]
    );
  }

  #[test]
  fn empty_input_yields_empty_output() {
    assert!(suppress(&[], 0.45).is_empty());
  }
}
