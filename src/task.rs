// 该文件是 Shanan YOLOX （山南西风 · YOLOX 后处理） 项目的一部分。
// src/task.rs - 推理任务
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

use std::{thread, time::Duration};
use tracing::{info, warn};

use crate::{
  frame::InputFrame,
  model::{FrameOutcome, FrameResult, InferenceBackend},
  output::Render,
  pipeline::Detector,
};

pub trait Task<I, B, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: Detector<B>, output: O) -> Result<TaskSummary, Self::Error>;
}

/// 任务结束后的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
  pub frames: usize,
  pub skipped: usize,
  pub detections: usize,
}

impl TaskSummary {
  fn record(&mut self, outcome: &FrameOutcome) {
    self.frames += 1;
    match outcome {
      FrameOutcome::NotReady => self.skipped += 1,
      FrameOutcome::Detections(result) => self.detections += result.count(),
    }
  }
}

fn render_outcome<O, RE>(output: &O, frame: &InputFrame, outcome: FrameOutcome) -> Result<(), RE>
where
  O: Render<InputFrame, FrameResult, Error = RE>,
{
  output.render_result(frame, &outcome.into_result())
}

pub struct OneShotTask;

impl<
  BE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = InputFrame>,
  B: InferenceBackend<Error = BE>,
  O: Render<InputFrame, FrameResult, Error = RE>,
> Task<I, B, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    mut detector: Detector<B>,
    output: O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let outcome = detector.detect(&frame.tensor, &frame.view)?;
    let elapsed = now.elapsed();
    info!("推理与后处理完成，耗时: {:.2?}", elapsed);

    let mut summary = TaskSummary::default();
    summary.record(&outcome);
    if !outcome.is_ready() {
      warn!("推理后端尚未就绪，输出空结果");
    }
    render_outcome(&output, &frame, outcome)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(summary)
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 注册 Ctrl-C 处理，收到信号后在当前帧结束时退出
  pub fn with_interrupt_handler(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }
}

impl<
  BE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = InputFrame>,
  B: InferenceBackend<Error = BE>,
  O: Render<InputFrame, FrameResult, Error = RE>,
> Task<I, B, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    mut detector: Detector<B>,
    output: O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let mut summary = TaskSummary::default();
    if self.frame_number == Some(0) {
      info!("指定帧数为 0, 不处理任何帧");
      return Ok(summary);
    }

    let (tx, rx) = std::sync::mpsc::channel();

    if self.handle_interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let mut now = std::time::Instant::now();
    for frame in input {
      let outcome = detector.detect(&frame.tensor, &frame.view)?;
      let elapsed_a = now.elapsed();
      summary.record(&outcome);
      render_outcome(&output, &frame, outcome)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!(
        "第 {} 帧处理完成，耗时: {:.2?} / {:.2?}",
        summary.frames, elapsed_a, elapsed_b
      );

      if self.frame_number.is_some_and(|n| summary.frames >= n) {
        info!("达到指定帧数 {}, 退出任务循环", summary.frames);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成，共 {} 帧 (跳过 {} 帧)，检测到 {} 个物体",
      summary.frames, summary.skipped, summary.detections
    );
    Ok(summary)
  }
}
