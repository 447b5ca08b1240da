// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU16, Ordering},
};

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  decode::Detection,
  frame::RawFrame,
  output::DisplaySink,
  query_flag, query_value,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无效的查询参数: {0}")]
  InvalidQuery(String),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 记录文件中类别的写法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLabel {
  Name,
  Id,
}

/// 按日期分目录保存标注帧
///
/// 路径形如 `dir/YYYY/MM/DD/HH-MM-SS-XXXX.png`，默认只保存有检测结果的帧。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: Option<RecordLabel>,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = match query_value(uri, "record").as_deref() {
      None => None,
      Some("name") => Some(RecordLabel::Name),
      Some("id") => Some(RecordLabel::Id),
      Some(other) => {
        return Err(DirectoryRecordOutputError::InvalidQuery(format!(
          "record 只能是 name 或 id, 实际为 '{}'",
          other
        )));
      }
    };

    Ok(
      DirectoryRecordOutput::new(uri.path())
        .with_record(record)
        .always(query_flag(uri, "always")),
    )
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      record: None,
      frame_counter: AtomicU16::new(0),
      always: false,
    }
  }

  pub fn with_record(mut self, record: Option<RecordLabel>) -> Self {
    self.record = record;
    self
  }

  /// 是否连没有检测结果的帧也保存
  pub fn always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn write_record(&self, label: RecordLabel, detection: &Detection, path: &Path) -> std::io::Result<()> {
    let name = match label {
      RecordLabel::Name => detection.class_name.clone(),
      RecordLabel::Id => detection.class_index.to_string(),
    };
    let record = format!(
      "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}\n",
      name,
      detection.confidence,
      detection.bbox.x_min,
      detection.bbox.y_min,
      detection.bbox.x_max,
      detection.bbox.y_max
    );
    std::fs::write(path.with_extension("txt"), record)
  }
}

impl DisplaySink for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn present(&self, annotated: &RawFrame, detection: Option<&Detection>) -> Result<(), Self::Error> {
    if !self.always && detection.is_none() {
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    annotated.image().save(&path)?;
    debug!("帧 {} 记录到: {}", annotated.sequence(), path.display());

    if let (Some(label), Some(detection)) = (self.record, detection) {
      self.write_record(label, detection, &path)?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::BoundingBox;
  use image::RgbImage;

  fn files_with_extension(root: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          pending.push(path);
        } else if path.extension().is_some_and(|e| e == ext) {
          found.push(path);
        }
      }
    }
    found
  }

  fn detection() -> Detection {
    Detection {
      class_index: 2,
      class_name: "cat".to_string(),
      confidence: 0.95,
      bbox: BoundingBox {
        x_min: 1.0,
        y_min: 2.0,
        x_max: 3.0,
        y_max: 4.0,
      },
    }
  }

  #[test]
  fn skips_empty_frames_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let frame = RawFrame::new(0, RgbImage::new(8, 8));

    DirectoryRecordOutput::new(dir.path()).present(&frame, None).unwrap();
    assert!(files_with_extension(dir.path(), "png").is_empty());

    DirectoryRecordOutput::new(dir.path())
      .always(true)
      .present(&frame, None)
      .unwrap();
    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);
  }

  #[test]
  fn writes_sidecar_records() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?record=id", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let frame = RawFrame::new(0, RgbImage::new(8, 8));
    output.present(&frame, Some(&detection())).unwrap();

    let records = files_with_extension(dir.path(), "txt");
    assert_eq!(records.len(), 1);
    let content = std::fs::read_to_string(&records[0]).unwrap();
    assert_eq!(content, "2, 0.9500, 1.0, 2.0, 3.0, 4.0\n");
  }

  #[test]
  fn record_query_accepts_only_name_or_id() {
    let parse = |query: &str| DirectoryRecordOutput::from_url(&url::Url::parse(&format!("folder:///tmp/rec?{}", query)).unwrap());

    assert_eq!(parse("record=name").unwrap().record, Some(RecordLabel::Name));
    assert_eq!(parse("record=id").unwrap().record, Some(RecordLabel::Id));
    assert_eq!(parse("always").unwrap().record, None);
    for bad in ["record=nmae", "record=", "record=ID"] {
      assert!(matches!(parse(bad), Err(DirectoryRecordOutputError::InvalidQuery(_))));
    }
  }

  #[test]
  fn frame_paths_are_dated_and_unique() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::new(dir.path());
    let now = Utc::now();
    let a = output.frame_path(now).unwrap();
    let b = output.frame_path(now).unwrap();
    assert_ne!(a, b);
    assert!(a.starts_with(dir.path().join(now.year().to_string())));
    assert!(a.to_string_lossy().ends_with("-0001.png"));
  }
}
