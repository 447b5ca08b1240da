// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/input/read_folder.rs - 图像目录输入
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

use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RawFrame, input::Pacer, query_flag};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Error, Debug)]
pub enum FolderInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("Invalid query: {0}")]
  InvalidQuery(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("No image found in {0}")]
  NoImage(PathBuf),
}

/// 按文件名顺序读取目录中的图像
///
/// URL 形如 `folder:///path/frames?fps=15&loop`。解码失败的文件跳过。
pub struct FolderInput {
  files: Vec<PathBuf>,
  cursor: usize,
  looping: bool,
  sequence: u64,
  pacer: Pacer,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = FolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FolderInputError::SchemaMismatch);
    }

    let mut input = FolderInput::open(url.path())?.looping(query_flag(url, "loop"));
    input.pacer = Pacer::from_url(url).map_err(FolderInputError::InvalidQuery)?;
    Ok(input)
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

impl FolderInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, FolderInputError> {
    let directory = directory.as_ref();
    let mut files = std::fs::read_dir(directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| path.is_file() && is_image(path))
      .collect::<Vec<_>>();
    if files.is_empty() {
      return Err(FolderInputError::NoImage(directory.to_path_buf()));
    }
    files.sort();
    info!("Folder input opened: {} ({} images)", directory.display(), files.len());

    Ok(Self {
      files,
      cursor: 0,
      looping: false,
      sequence: 0,
      pacer: Pacer::new(None),
    })
  }

  pub fn looping(mut self, looping: bool) -> Self {
    self.looping = looping;
    self
  }

  pub fn fps(mut self, fps: f64) -> Self {
    self.pacer = Pacer::new(Some(fps));
    self
  }

  fn next_path(&mut self) -> Option<PathBuf> {
    if self.cursor >= self.files.len() {
      if !self.looping {
        return None;
      }
      self.cursor = 0;
    }
    let path = self.files.get(self.cursor).cloned();
    self.cursor += 1;
    path
  }
}

impl Iterator for FolderInput {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    // 一整轮都解码失败时停止，避免循环模式下空转
    for _ in 0..self.files.len() {
      let path = self.next_path()?;
      let image = ImageReader::open(&path)
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode());
      match image {
        Ok(image) => {
          self.pacer.wait();
          let frame = RawFrame::new(self.sequence, image.to_rgb8());
          self.sequence += 1;
          return Some(frame);
        }
        Err(e) => warn!("Skipping {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn folder_with(names: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (i, name) in names.iter().enumerate() {
      RgbImage::from_pixel(2, 2, Rgb([i as u8, 0, 0]))
        .save(dir.path().join(name))
        .unwrap();
    }
    dir
  }

  #[test]
  fn reads_images_in_name_order() {
    let dir = folder_with(&["b.png", "a.png", "c.bmp"]);
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

    let frames: Vec<_> = FolderInput::open(dir.path()).unwrap().collect();
    let reds: Vec<u8> = frames.iter().map(|f| f.image().get_pixel(0, 0)[0]).collect();
    assert_eq!(reds, [1, 0, 2]);
    assert_eq!(frames[2].sequence(), 2);
  }

  #[test]
  fn loops_when_asked() {
    let dir = folder_with(&["a.png"]);
    let url = Url::parse(&format!("folder://{}?loop", dir.path().display())).unwrap();
    let frames: Vec<_> = FolderInput::from_url(&url).unwrap().take(5).collect();
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[4].sequence(), 4);
  }

  #[test]
  fn skips_undecodable_files() {
    let dir = folder_with(&["b.png"]);
    std::fs::write(dir.path().join("a.png"), b"broken").unwrap();
    let frames: Vec<_> = FolderInput::open(dir.path()).unwrap().collect();
    assert_eq!(frames.len(), 1);
  }

  #[test]
  fn empty_folders_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      FolderInput::open(dir.path()),
      Err(FolderInputError::NoImage(_))
    ));
  }
}
