// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/frame.rs - 原始帧与 NHWC 张量定义
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

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::error::PipelineError;

pub const RGB_CHANNELS: usize = 3;

/// 模型输入边长
pub const MODEL_INPUT_W: u32 = 256;
pub const MODEL_INPUT_H: u32 = 256;

/// 模型输入张量 (256x256x3, f32)
pub type ModelTensor = NhwcTensor<MODEL_INPUT_W, MODEL_INPUT_H>;

/// 摄像头采集到的一帧 RGB 图像
///
/// 每次采集生成一帧，流水线处理完即丢弃，不跨帧保留。
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
  sequence: u64,
  image: RgbImage,
}

impl RawFrame {
  pub fn new(sequence: u64, image: RgbImage) -> Self {
    Self { sequence, image }
  }

  /// RGBA 帧直接丢弃 alpha 通道
  pub fn from_rgba(sequence: u64, image: RgbaImage) -> Self {
    Self::new(sequence, DynamicImage::ImageRgba8(image).to_rgb8())
  }

  /// 从紧密排列的 RGB 字节构造帧
  pub fn from_rgb_bytes(
    sequence: u64,
    width: u32,
    height: u32,
    data: Vec<u8>,
  ) -> Result<Self, PipelineError> {
    let image =
      RgbImage::from_raw(width, height, data).ok_or(PipelineError::InvalidFrame { width, height })?;
    Ok(Self::new(sequence, image))
  }

  pub fn sequence(&self) -> u64 {
    self.sequence
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn is_empty(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn image_mut(&mut self) -> &mut RgbImage {
    &mut self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }
}

impl From<RgbImage> for RawFrame {
  fn from(image: RgbImage) -> Self {
    Self::new(0, image)
  }
}

/// NHWC 排布的 f32 张量，按行优先存储
#[derive(Debug, Clone, PartialEq)]
pub struct NhwcTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> NhwcTensor<W, H> {
  pub const LEN: usize = RGB_CHANNELS * W as usize * H as usize;

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_nhwc(&self) -> &[f32] {
    &self.data
  }

  /// 读取 (x, y, c) 处的值
  pub fn get(&self, x: usize, y: usize, c: usize) -> Option<f32> {
    if x >= self.width() || y >= self.height() || c >= RGB_CHANNELS {
      return None;
    }
    self.data.get((y * self.width() + x) * RGB_CHANNELS + c).copied()
  }
}

impl<const W: u32, const H: u32> Default for NhwcTensor<W, H> {
  fn default() -> Self {
    Self {
      data: vec![0.0; Self::LEN].into_boxed_slice(),
    }
  }
}

impl<const W: u32, const H: u32> TryFrom<Vec<f32>> for NhwcTensor<W, H> {
  type Error = PipelineError;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(PipelineError::contract("输入张量长度", Self::LEN, data.len()));
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}
