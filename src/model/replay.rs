// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/model/replay.rs - 回放推理后端
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

//! 按顺序回放事先录制好的模型原始输出。
//!
//! 录制文件为 JSON Lines，每行一条输出：
//!
//! ```text
//! {"geometry":[0.5,0.5,0.1,0.1],"class_probs":[0.1,0.97,0.2]}
//! ```
//!
//! 回放到末尾后从头循环。URL 形如
//! `replay:///path/outputs.jsonl?delay_ms=30&classes=3`。

use std::{
  path::PathBuf,
  sync::atomic::{AtomicUsize, Ordering},
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ModelTensor,
  model::{Cancellation, InferenceEngine, RawModelOutput},
  query_value,
};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("录制文件第 {line} 行解析失败: {source}")]
  ParseError {
    line: usize,
    #[source]
    source: serde_json::Error,
  },
  #[error("录制文件中没有任何输出")]
  EmptyRecording,
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("推理已取消")]
  Cancelled,
}

pub struct ReplayModelBuilder {
  path: PathBuf,
  delay: Duration,
  num_classes: Option<usize>,
}

impl FromUrlWithScheme for ReplayModelBuilder {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModelBuilder {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let delay_ms = match query_value(url, "delay_ms") {
      Some(v) => v
        .parse::<u64>()
        .map_err(|_| ReplayModelError::ModelPathError(format!("delay_ms 无效: {}", v)))?,
      None => 0,
    };
    let num_classes = match query_value(url, "classes") {
      Some(v) => Some(
        v.parse::<usize>()
          .map_err(|_| ReplayModelError::ModelPathError(format!("classes 无效: {}", v)))?,
      ),
      None => None,
    };

    Ok(ReplayModelBuilder {
      path: PathBuf::from(url.path()),
      delay: Duration::from_millis(delay_ms),
      num_classes,
    })
  }
}

impl ReplayModelBuilder {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      delay: Duration::ZERO,
      num_classes: None,
    }
  }

  /// 模拟每次推理的耗时
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// 显式指定类别数，否则取第一条记录的类别向量长度
  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = Some(num_classes);
    self
  }

  pub fn build(self) -> Result<ReplayModel, ReplayModelError> {
    info!("加载回放文件: {}", self.path.display());
    let content = std::fs::read_to_string(&self.path)?;

    let records = content
      .lines()
      .enumerate()
      .filter(|(_, line)| !line.trim().is_empty())
      .map(|(idx, line)| {
        serde_json::from_str::<RawModelOutput>(line)
          .map_err(|source| ReplayModelError::ParseError { line: idx + 1, source })
      })
      .collect::<Result<Vec<_>, _>>()?;

    let first = records.first().ok_or(ReplayModelError::EmptyRecording)?;
    let num_classes = self.num_classes.unwrap_or(first.class_probs.len());
    debug!("回放记录数: {}, 类别数: {}", records.len(), num_classes);
    info!("模型加载完成");

    Ok(ReplayModel::new(records, num_classes).with_delay(self.delay))
  }
}

#[derive(Debug)]
pub struct ReplayModel {
  records: Box<[RawModelOutput]>,
  cursor: AtomicUsize,
  num_classes: usize,
  delay: Duration,
}

impl ReplayModel {
  pub fn new(records: Vec<RawModelOutput>, num_classes: usize) -> Self {
    Self {
      records: records.into_boxed_slice(),
      cursor: AtomicUsize::new(0),
      num_classes,
      delay: Duration::ZERO,
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  fn wait(&self, cancel: &Cancellation) -> Result<(), ReplayModelError> {
    let deadline = Instant::now() + self.delay;
    loop {
      if cancel.is_cancelled() {
        return Err(ReplayModelError::Cancelled);
      }
      let now = Instant::now();
      if now >= deadline {
        return Ok(());
      }
      std::thread::sleep(CANCEL_POLL_INTERVAL.min(deadline - now));
    }
  }
}

impl InferenceEngine for ReplayModel {
  type Error = ReplayModelError;

  fn num_classes(&self) -> usize {
    self.num_classes
  }

  fn infer(&self, _input: &ModelTensor, cancel: &Cancellation) -> Result<RawModelOutput, Self::Error> {
    self.wait(cancel)?;

    if self.records.is_empty() {
      return Err(ReplayModelError::EmptyRecording);
    }
    let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.records.len();
    debug!("回放第 {} 条输出", idx);
    Ok(self.records[idx].clone())
  }
}
