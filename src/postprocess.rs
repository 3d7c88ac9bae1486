// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/postprocess.rs - 后处理各阶段
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

mod decode;
mod grid;
mod nms;
mod remap;

pub use self::decode::{DecodeError, RawProposal, decode_proposals};
pub use self::grid::{GridCache, GridCell, GridKey, generate_grid, grid_cell_count};
pub use self::nms::{iou, sorted_by_score, suppress, suppress_per_class, suppress_with_policy};
pub use self::remap::{
  GeometryError, ViewGeometry, calculate_input_dims, crop_input_dims, remap,
};
