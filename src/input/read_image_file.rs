// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RawFrame, input::Pacer, query_value};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("Invalid query: {0}")]
  InvalidQuery(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 读取单张图像并重复放出 `repeat` 次
///
/// URL 形如 `image:///path/frame.png?repeat=100&fps=30`。
pub struct ImageFileInput {
  image: RgbImage,
  remaining: u64,
  sequence: u64,
  pacer: Pacer,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let repeat = match query_value(url, "repeat") {
      Some(v) => v
        .parse::<u64>()
        .map_err(|_| ImageFileInputError::InvalidQuery(format!("repeat: {}", v)))?,
      None => 1,
    };
    let pacer = Pacer::from_url(url).map_err(ImageFileInputError::InvalidQuery)?;

    let mut input = ImageFileInput::open(url.path())?.repeat(repeat);
    input.pacer = pacer;
    Ok(input)
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    // RGBA 等格式统一转为 RGB
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    info!(
      "Image input opened: {} ({}x{})",
      path.display(),
      image.width(),
      image.height()
    );
    Ok(Self::from_image(image))
  }

  pub fn from_image(image: RgbImage) -> Self {
    Self {
      image,
      remaining: 1,
      sequence: 0,
      pacer: Pacer::new(None),
    }
  }

  pub fn repeat(mut self, times: u64) -> Self {
    self.remaining = times;
    self
  }

  pub fn fps(mut self, fps: f64) -> Self {
    self.pacer = Pacer::new(Some(fps));
    self
  }
}

impl Iterator for ImageFileInput {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    self.pacer.wait();

    let frame = RawFrame::new(self.sequence, self.image.clone());
    self.sequence += 1;
    Some(frame)
  }
}
