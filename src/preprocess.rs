// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/preprocess.rs - 帧预处理
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

use image::imageops::{self, FilterType};
use tracing::{debug, error};

use crate::{
  error::PipelineError,
  frame::{NhwcTensor, RawFrame},
};

const PIXEL_MAX: f32 = 255.0;

/// 将原始帧缩放到 W×H 并归一化到 [0,1]
///
/// 不保持宽高比，模型要求正方形输入。
#[derive(Debug, Default, Clone, Copy)]
pub struct Preprocessor<const W: u32, const H: u32>;

impl<const W: u32, const H: u32> Preprocessor<W, H> {
  pub fn new() -> Self {
    Self
  }

  pub fn process(&self, frame: &RawFrame) -> Result<NhwcTensor<W, H>, PipelineError> {
    if frame.is_empty() {
      error!("无效帧 {}: {}x{}", frame.sequence(), frame.width(), frame.height());
      return Err(PipelineError::InvalidFrame {
        width: frame.width(),
        height: frame.height(),
      });
    }

    // Triangle 即双线性插值
    let resized = imageops::resize(frame.image(), W, H, FilterType::Triangle);
    debug!(
      "帧 {} 缩放: {}x{} -> {}x{}",
      frame.sequence(),
      frame.width(),
      frame.height(),
      W,
      H
    );

    let data: Vec<f32> = resized
      .into_raw()
      .into_iter()
      .map(|v| v as f32 / PIXEL_MAX)
      .collect();

    NhwcTensor::try_from(data)
  }
}
