// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/label.rs - 类别标签表
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

use std::{borrow::Cow, path::Path, str::FromStr};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelSetError {
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件为空")]
  Empty,
}

/// 与类别概率向量按下标对齐的类别名称表
///
/// 进程启动时加载一次，此后只读。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
  labels: Box<[String]>,
}

impl LabelSet {
  pub fn new<I, S>(labels: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      labels: labels.into_iter().map(Into::into).collect(),
    }
  }

  /// 从换行分隔的标签文件加载
  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelSetError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let labels: Self = content.parse()?;
    debug!("标签数量: {}", labels.len());
    Ok(labels)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }

  /// 查不到的下标使用合成名称 `Class <index>`
  pub fn resolve(&self, index: usize) -> Cow<'_, str> {
    match self.get(index) {
      Some(label) => Cow::Borrowed(label),
      None => Cow::Owned(format!("Class {}", index)),
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.labels.iter().map(String::as_str)
  }
}

impl FromStr for LabelSet {
  type Err = LabelSetError;

  // 空行跳过，行尾的 \r 与空白去掉
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let labels = LabelSet::new(
      s.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty()),
    );
    if labels.is_empty() {
      return Err(LabelSetError::Empty);
    }
    Ok(labels)
  }
}
