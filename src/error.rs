// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/error.rs - 流水线错误定义
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

/// 单帧流水线中可能出现的错误
///
/// 只有模型契约被破坏是致命的；推理失败、无效帧等只影响当前帧，
/// 调用方记录日志后继续处理下一帧。
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("无效帧: 尺寸 {width}x{height}")]
  InvalidFrame { width: u32, height: u32 },
  #[error("模型契约不一致: {what} 期望 {expected}, 实际 {actual}")]
  ModelContractViolation {
    what: &'static str,
    expected: usize,
    actual: usize,
  },
  #[error("推理错误: {0}")]
  Inference(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
  #[error("推理已取消")]
  Cancelled,
}

impl PipelineError {
  pub fn contract(what: &'static str, expected: usize, actual: usize) -> Self {
    PipelineError::ModelContractViolation {
      what,
      expected,
      actual,
    }
  }

  /// 致命错误需要终止流水线，非致命错误只跳过当前帧
  pub fn is_fatal(&self) -> bool {
    matches!(self, PipelineError::ModelContractViolation { .. })
  }
}
