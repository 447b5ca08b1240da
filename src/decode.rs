// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/decode.rs - 检测结果解码
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

use std::fmt;

use tracing::debug;

use crate::{label::LabelSet, model::RawModelOutput};

/// 默认置信度阈值
pub const DEFAULT_THRESHOLD: f32 = 0.9;

const GEOMETRY_LEN: usize = 4;

/// 帧像素坐标系下的边界框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub x_min: f32,
  pub y_min: f32,
  pub x_max: f32,
  pub y_max: f32,
}

impl BoundingBox {
  /// 由中心点和宽高构造
  pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
    Self {
      x_min: x_center - width / 2.0,
      y_min: y_center - height / 2.0,
      x_max: x_center + width / 2.0,
      y_max: y_center + height / 2.0,
    }
  }

  pub fn center(&self) -> (f32, f32) {
    (
      (self.x_min + self.x_max) / 2.0,
      (self.y_min + self.y_max) / 2.0,
    )
  }

  pub fn width(&self) -> f32 {
    self.x_max - self.x_min
  }

  pub fn height(&self) -> f32 {
    self.y_max - self.y_min
  }

  pub fn clamp_to(self, frame_width: u32, frame_height: u32) -> Self {
    let (w, h) = (frame_width as f32, frame_height as f32);
    Self {
      x_min: self.x_min.clamp(0.0, w),
      y_min: self.y_min.clamp(0.0, h),
      x_max: self.x_max.clamp(0.0, w),
      y_max: self.y_max.clamp(0.0, h),
    }
  }
}

/// 边界框越出画面时的处理方式
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BoxPolicy {
  /// 原样保留，坐标可能落在画面之外
  #[default]
  Unclamped,
  /// 裁剪到 [0, w] × [0, h]
  Clamped,
}

/// 单帧的检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub class_index: usize,
  pub class_name: String,
  pub confidence: f32,
  pub bbox: BoundingBox,
}

impl Detection {
  /// 叠加层显示的标签文本，形如 `cat (0.95)`
  pub fn caption(&self) -> String {
    self.to_string()
  }
}

impl fmt::Display for Detection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({:.2})", self.class_name, self.confidence)
  }
}

/// 最大值所在的第一个下标，NaN 不参与比较
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
  values
    .iter()
    .copied()
    .enumerate()
    .filter(|(_, v)| !v.is_nan())
    .fold(None, |best, (idx, v)| match best {
      Some((_, best_v)) if v <= best_v => best,
      _ => Some((idx, v)),
    })
}

/// 把模型原始输出解码为至多一个检测结果
///
/// 没有检测并不是错误：类别向量为空、几何向量长度不为 4、
/// 几何值非有限数或宽高为负、最大概率不超过阈值时都返回 `None`。
pub fn decode(
  raw: &RawModelOutput,
  labels: &LabelSet,
  frame_width: u32,
  frame_height: u32,
  threshold: f32,
) -> Option<Detection> {
  Decoder::new(threshold).decode(raw, labels, frame_width, frame_height)
}

/// 带配置的解码器，每帧独立，无跨帧状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoder {
  threshold: f32,
  policy: BoxPolicy,
}

impl Default for Decoder {
  fn default() -> Self {
    Self::new(DEFAULT_THRESHOLD)
  }
}

impl Decoder {
  pub fn new(threshold: f32) -> Self {
    Self {
      threshold,
      policy: BoxPolicy::default(),
    }
  }

  pub fn with_policy(mut self, policy: BoxPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn policy(&self) -> BoxPolicy {
    self.policy
  }

  pub fn decode(
    &self,
    raw: &RawModelOutput,
    labels: &LabelSet,
    frame_width: u32,
    frame_height: u32,
  ) -> Option<Detection> {
    if raw.geometry.len() != GEOMETRY_LEN {
      debug!("几何向量长度为 {}, 跳过", raw.geometry.len());
      return None;
    }

    let (class_index, max_prob) = argmax(&raw.class_probs)?;

    // 严格大于阈值才接受
    if max_prob <= self.threshold {
      debug!(
        "最高置信度 {:.4} (类别 {}) 未超过阈值 {:.2}",
        max_prob, class_index, self.threshold
      );
      return None;
    }

    let g = &raw.geometry;
    if g.iter().any(|v| !v.is_finite()) || g[2] < 0.0 || g[3] < 0.0 {
      debug!("几何向量无效 {:?}, 跳过", g);
      return None;
    }

    let (w, h) = (frame_width as f32, frame_height as f32);
    let mut bbox = BoundingBox::from_center(g[0] * w, g[1] * h, g[2] * w, g[3] * h);
    if self.policy == BoxPolicy::Clamped {
      bbox = bbox.clamp_to(frame_width, frame_height);
    }

    let detection = Detection {
      class_index,
      class_name: labels.resolve(class_index).into_owned(),
      confidence: max_prob.min(1.0),
      bbox,
    };
    debug!("检测结果: {:?}", detection);

    Some(detection)
  }
}
