// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/task.rs - 任务调度
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

use std::{sync::Arc, thread, time::Duration};

use tracing::{debug, error, info, warn};

use crate::{
  error::PipelineError,
  frame::RawFrame,
  mailbox::LatestFrameMailbox,
  model::{Cancellation, InferenceEngine},
  output::DisplaySink,
  pipeline::PipelineContext,
};

const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, context: &PipelineContext<M>, output: O) -> Result<TaskReport, Self::Error>;
}

/// 任务结束时的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
  /// 成功走完流水线的帧数
  pub processed: u64,
  /// 产生检测结果的帧数
  pub detections: u64,
  /// 因无效帧被跳过的帧数
  pub skipped: u64,
  /// 推理失败、已跳过的帧数
  pub failed: u64,
  /// 在信箱中被新帧覆盖、未处理的帧数
  pub superseded: u64,
}

pub struct OneShotTask;

impl<I, M, O> Task<I, M, O> for OneShotTask
where
  I: Iterator<Item = RawFrame>,
  M: InferenceEngine,
  O: DisplaySink,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, context: &PipelineContext<M>, output: O) -> Result<TaskReport, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功 ({}x{})，开始推理...", frame.width(), frame.height());

    let outcome = context.run_frame(&frame, &Cancellation::new())?;
    info!(
      "推理完成，耗时: {:.2?} / 渲染 {:.2?}",
      outcome.timings.inference, outcome.timings.render
    );
    match &outcome.detection {
      Some(det) => info!("检测结果: {}", det),
      None => info!("未检测到目标"),
    }
    output.present(&outcome.annotated, outcome.detection.as_ref())?;

    Ok(TaskReport {
      processed: 1,
      detections: outcome.detection.is_some() as u64,
      ..TaskReport::default()
    })
  }
}

/// 实时预览任务
///
/// 采集线程把帧投进单槽信箱，当前线程总是处理最新的一帧；
/// 处理不及时的旧帧被直接覆盖。
#[derive(Debug, Default)]
pub struct LiveTask {
  frame_number: Option<u64>,
  cancel: Cancellation,
  handle_interrupt: bool,
}

impl LiveTask {
  pub fn with_frame_number(mut self, frame_number: Option<u64>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 外部持有同一个取消令牌即可随时结束任务
  pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
    self.cancel = cancel;
    self
  }

  /// 安装 Ctrl-C 处理，每个进程只能安装一次
  pub fn handle_interrupt(mut self, handle: bool) -> Self {
    self.handle_interrupt = handle;
    self
  }

  fn install_interrupt_handler(&self, mailbox: &Arc<LatestFrameMailbox<RawFrame>>) -> Result<(), ctrlc::Error> {
    let cancel = self.cancel.clone();
    let mailbox = mailbox.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      cancel.cancel();
      mailbox.close();
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
  }
}

impl<I, M, O> Task<I, M, O> for LiveTask
where
  I: Iterator<Item = RawFrame> + Send,
  M: InferenceEngine,
  O: DisplaySink,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, context: &PipelineContext<M>, output: O) -> Result<TaskReport, Self::Error> {
    info!("开始任务...");
    let mailbox = Arc::new(LatestFrameMailbox::new());
    if self.handle_interrupt {
      self.install_interrupt_handler(&mailbox)?;
    }

    let mut report = TaskReport::default();
    let result = thread::scope(|scope| -> anyhow::Result<()> {
      let capture = {
        let mailbox = mailbox.clone();
        let cancel = self.cancel.clone();
        thread::Builder::new()
          .name("capture".to_string())
          .spawn_scoped(scope, move || {
            for frame in input {
              if cancel.is_cancelled() {
                break;
              }
              mailbox.post(frame);
            }
            debug!("输入结束，关闭信箱");
            mailbox.close();
          })?
      };

      let result = self.process_frames(&mailbox, context, &output, &mut report);

      // 任何原因退出都要让采集线程停下来
      self.cancel.cancel();
      mailbox.close();
      if capture.join().is_err() {
        error!("采集线程异常退出");
      }
      result
    });

    report.superseded = mailbox.superseded();
    info!(
      "任务完成: 处理 {} 帧, 检测 {} 帧, 跳过 {} 帧, 推理失败 {} 帧, 覆盖 {} 帧",
      report.processed, report.detections, report.skipped, report.failed, report.superseded
    );
    result.map(|_| report)
  }
}

impl LiveTask {
  fn process_frames<M, O>(
    &self,
    mailbox: &LatestFrameMailbox<RawFrame>,
    context: &PipelineContext<M>,
    output: &O,
    report: &mut TaskReport,
  ) -> anyhow::Result<()>
  where
    M: InferenceEngine,
    O: DisplaySink,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    while let Some(frame) = mailbox.take() {
      debug!("处理第 {} 帧图像", frame.sequence());
      match context.run_frame(&frame, &self.cancel) {
        Ok(outcome) => {
          output.present(&outcome.annotated, outcome.detection.as_ref())?;
          report.processed += 1;
          report.detections += outcome.detection.is_some() as u64;
        }
        Err(PipelineError::Cancelled) => {
          warn!("推理被取消，退出任务循环");
          break;
        }
        Err(e) if e.is_fatal() => {
          error!("帧 {} 出现致命错误: {}", frame.sequence(), e);
          return Err(e.into());
        }
        Err(e @ PipelineError::Inference(_)) => {
          warn!("帧 {} 推理失败, 继续下一帧: {}", frame.sequence(), e);
          report.failed += 1;
        }
        Err(e) => {
          warn!("跳过帧 {}: {}", frame.sequence(), e);
          report.skipped += 1;
        }
      }

      if self
        .frame_number
        .is_some_and(|n| report.processed + report.skipped + report.failed >= n)
      {
        info!("达到指定帧数, 退出任务循环");
        break;
      }
      if self.cancel.is_cancelled() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }
    Ok(())
  }
}
