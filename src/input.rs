// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/input.rs - 帧输入
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

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, frame::RawFrame, query_value};

mod read_folder;
mod read_image_file;

pub use self::read_folder::{FolderInput, FolderInputError};
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Folder input error: {0}")]
  FolderInputError(#[from] FolderInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// 按固定帧率节拍放出帧，模拟摄像头的采集节奏
#[derive(Debug, Clone)]
pub(crate) struct Pacer {
  interval: Option<Duration>,
  next: Option<Instant>,
}

impl Pacer {
  pub(crate) fn new(fps: Option<f64>) -> Self {
    let interval = fps
      .filter(|fps| fps.is_finite() && *fps > 0.0)
      .map(|fps| Duration::from_secs_f64(1.0 / fps));
    Self {
      interval,
      next: None,
    }
  }

  /// 解析 URL 中的 `fps` 参数
  pub(crate) fn from_url(url: &url::Url) -> Result<Self, String> {
    let fps = match query_value(url, "fps") {
      Some(v) => Some(v.parse::<f64>().map_err(|_| format!("fps 无效: {}", v))?),
      None => None,
    };
    Ok(Self::new(fps))
  }

  pub(crate) fn wait(&mut self) {
    let Some(interval) = self.interval else {
      return;
    };
    let now = Instant::now();
    if let Some(next) = self.next
      && next > now
    {
      std::thread::sleep(next - now);
    }
    self.next = Some(self.next.map_or(now, |n| n.max(now)) + interval);
  }
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ReadFolder(FolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      FolderInput::SCHEME => Ok(InputWrapper::ReadFolder(FolderInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next(),
      InputWrapper::ReadFolder(input) => input.next(),
    }
  }
}
