// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/output/draw.rs - 检测结果叠加绘制
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;

use crate::{
  decode::{BoundingBox, Detection},
  frame::RawFrame,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 32.0;
const LABEL_OFFSET: i32 = 10;
const STROKE_WIDTH: u32 = 4;
const MARKER_RADIUS: i32 = 8;

/// 内置字体，未指定 `--font` 时使用
const DEFAULT_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum OverlayError {
  #[error("字体文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 框中心标记
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
  pub radius: i32,
  pub color: Rgb<u8>,
}

impl Default for MarkerStyle {
  fn default() -> Self {
    Self {
      radius: MARKER_RADIUS,
      color: Rgb([0, 255, 0]),
    }
  }
}

/// 绘制样式，启动时构造一次，逐帧复用
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
  pub box_color: Rgb<u8>,
  pub stroke_width: u32,
  pub text_color: Rgb<u8>,
  pub label_background: Option<Rgb<u8>>,
  pub font_size: f32,
  /// 标签底边与框顶边之间的距离
  pub label_offset: i32,
  pub marker: Option<MarkerStyle>,
}

impl Default for OverlayStyle {
  fn default() -> Self {
    Self {
      box_color: Rgb([255, 0, 0]),
      stroke_width: STROKE_WIDTH,
      text_color: Rgb([255, 255, 0]),
      label_background: Some(Rgb([0, 0, 0])),
      font_size: LABEL_FONT_SIZE,
      label_offset: LABEL_OFFSET,
      marker: None,
    }
  }
}

impl OverlayStyle {
  pub fn with_marker(mut self, marker: Option<MarkerStyle>) -> Self {
    self.marker = marker;
    self
  }

  pub fn with_stroke_width(mut self, stroke_width: u32) -> Self {
    self.stroke_width = stroke_width.max(1);
    self
  }
}

/// 将检测结果画到帧的副本上
///
/// 边框、标签与中心标记都使用帧像素坐标。
pub struct Overlay {
  style: OverlayStyle,
  font: FontArc,
  scale: PxScale,
}

impl Overlay {
  pub fn new(style: OverlayStyle, font: FontArc) -> Self {
    let scale = PxScale::from(style.font_size);
    Self { style, font, scale }
  }

  /// 使用内置字体
  pub fn with_default_font(style: OverlayStyle) -> Result<Self, OverlayError> {
    Ok(Self::new(style, Self::default_font()?))
  }

  pub fn default_font() -> Result<FontArc, OverlayError> {
    Ok(FontArc::try_from_slice(DEFAULT_FONT)?)
  }

  pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc, OverlayError> {
    let path = path.as_ref();
    info!("加载字体文件: {}", path.display());
    let data = std::fs::read(path)?;
    Ok(FontArc::try_from_vec(data)?)
  }

  pub fn style(&self) -> &OverlayStyle {
    &self.style
  }

  /// 返回标注后的副本，原帧不变
  pub fn render(&self, frame: &RawFrame, detection: Option<&Detection>) -> RawFrame {
    let mut annotated = frame.clone();
    if let Some(detection) = detection {
      self.draw_detection(annotated.image_mut(), detection);
    }
    annotated
  }

  pub fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }

    let (left, top, right, bottom) = self.pixel_corners(image, &detection.bbox);
    self.draw_box(image, left, top, right, bottom);
    self.draw_label(image, left, top, &detection.caption());

    if let Some(marker) = self.style.marker {
      let (cx, cy) = detection.bbox.center();
      let (cx, cy) = (
        self.clamp_coord(cx, image.width()),
        self.clamp_coord(cy, image.height()),
      );
      draw_filled_circle_mut(image, (cx, cy), marker.radius, marker.color);
    }
  }

  // 画面外的坐标收拢到画面边缘外侧，避免整数溢出
  fn clamp_coord(&self, v: f32, limit: u32) -> i32 {
    let margin = self.style.stroke_width as f32 + 1.0;
    v.round().clamp(-margin, limit as f32 + margin) as i32
  }

  fn pixel_corners(&self, image: &RgbImage, bbox: &BoundingBox) -> (i32, i32, i32, i32) {
    (
      self.clamp_coord(bbox.x_min, image.width()),
      self.clamp_coord(bbox.y_min, image.height()),
      self.clamp_coord(bbox.x_max, image.width()),
      self.clamp_coord(bbox.y_max, image.height()),
    )
  }

  fn draw_box(&self, image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32) {
    // 描边向框内加粗
    for t in 0..self.style.stroke_width as i32 {
      let width = right - left + 1 - 2 * t;
      let height = bottom - top + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(left + t, top + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, self.style.box_color);
    }
  }

  fn label_size(&self, label: &str) -> (u32, u32) {
    text_size(self.scale, &self.font, label)
  }

  fn draw_label(&self, image: &mut RgbImage, left: i32, top: i32, label: &str) {
    let (text_width, text_height) = self.label_size(label);
    let label_x = left.max(0);
    let label_y = (top - self.style.label_offset - text_height as i32).max(0);

    if let Some(background) = self.style.label_background
      && text_width > 0
      && text_height > 0
    {
      let rect = Rect::at(label_x, label_y).of_size(text_width, text_height);
      draw_filled_rect_mut(image, rect, background);
    }

    draw_text_mut(
      image,
      self.style.text_color,
      label_x,
      label_y,
      self.scale,
      &self.font,
      label,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn frame() -> RawFrame {
    RawFrame::new(3, RgbImage::from_pixel(100, 100, Rgb([10, 10, 10])))
  }

  fn detection(bbox: BoundingBox) -> Detection {
    Detection {
      class_index: 1,
      class_name: "b".to_string(),
      confidence: 0.97,
      bbox,
    }
  }

  fn styled(style: OverlayStyle) -> Overlay {
    Overlay::with_default_font(style).unwrap()
  }

  fn middle_box() -> BoundingBox {
    BoundingBox {
      x_min: 20.0,
      y_min: 40.0,
      x_max: 60.0,
      y_max: 80.0,
    }
  }

  #[test]
  fn no_detection_renders_an_identical_copy() {
    let frame = frame();
    let rendered = styled(OverlayStyle::default()).render(&frame, None);
    assert_eq!(rendered, frame);
  }

  #[test]
  fn box_edges_are_drawn_and_source_is_untouched() {
    let frame = frame();
    let overlay = styled(OverlayStyle::default());
    let rendered = overlay.render(&frame, Some(&detection(middle_box())));

    let red = overlay.style().box_color;
    assert_eq!(*rendered.image().get_pixel(20, 60), red);
    assert_eq!(*rendered.image().get_pixel(60, 60), red);
    assert_eq!(*rendered.image().get_pixel(40, 80), red);
    // 描边宽度为 4，向内第 4 个像素不再属于边框
    assert_eq!(*rendered.image().get_pixel(24, 60), Rgb([10, 10, 10]));
    assert_eq!(*rendered.image().get_pixel(30, 70), Rgb([10, 10, 10]));
    assert_eq!(*frame.image().get_pixel(20, 60), Rgb([10, 10, 10]));
    assert_eq!(rendered.sequence(), frame.sequence());
  }

  #[test]
  fn label_background_sits_above_the_box() {
    let overlay = styled(OverlayStyle::default());
    let rendered = overlay.render(&frame(), Some(&detection(middle_box())));
    // 字号 32，偏移 10，标签占据 y ∈ [0, 32)，最后一行没有字形
    assert_eq!(*rendered.image().get_pixel(22, 31), Rgb([0, 0, 0]));
    assert_eq!(*rendered.image().get_pixel(10, 5), Rgb([10, 10, 10]));
  }

  #[test]
  fn caption_text_is_drawn_inside_the_label() {
    let overlay = styled(OverlayStyle::default());
    let det = detection(middle_box());
    let rendered = overlay.render(&frame(), Some(&det));

    let (width, height) = overlay.label_size(&det.caption());
    assert_eq!(height, 32);
    assert!(width > 32);

    // 黄色文字叠在黑底上，被覆盖的像素 r == g 且 b == 0
    let text_pixels = (20..20 + width)
      .flat_map(|x| (0..height).map(move |y| (x, y)))
      .filter(|&(x, y)| x < 100)
      .map(|(x, y)| *rendered.image().get_pixel(x, y))
      .filter(|p| p[0] > 128 && p[1] > 128 && p[2] == 0)
      .count();
    assert!(text_pixels > 20, "只找到 {} 个文字像素", text_pixels);

    // 没有检测结果时不会出现文字颜色
    let plain = overlay.render(&frame(), None);
    assert!(plain.image().pixels().all(|p| p[2] == 10));
  }

  #[test]
  fn fonts_load_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("font.ttf");
    std::fs::write(&path, DEFAULT_FONT).unwrap();
    let font = Overlay::load_font(&path).unwrap();

    let overlay = Overlay::new(OverlayStyle::default(), font);
    assert_eq!(overlay.label_size("b (0.97)").1, 32);

    std::fs::write(&path, b"not a font").unwrap();
    assert!(matches!(Overlay::load_font(&path), Err(OverlayError::InvalidFont(_))));
  }

  #[test]
  fn center_marker_shares_frame_coordinates() {
    let overlay = styled(OverlayStyle::default().with_marker(Some(MarkerStyle::default())));
    let rendered = overlay.render(&frame(), Some(&detection(middle_box())));
    assert_eq!(*rendered.image().get_pixel(40, 60), Rgb([0, 255, 0]));

    let plain = styled(OverlayStyle::default()).render(&frame(), Some(&detection(middle_box())));
    assert_eq!(*plain.image().get_pixel(40, 60), Rgb([10, 10, 10]));
  }

  #[test]
  fn boxes_outside_the_frame_do_not_panic() {
    let overlay = styled(OverlayStyle::default().with_marker(Some(MarkerStyle::default())));
    let boxes = [
      BoundingBox {
        x_min: -50.0,
        y_min: -50.0,
        x_max: 150.0,
        y_max: 150.0,
      },
      BoundingBox {
        x_min: 1e12,
        y_min: -1e12,
        x_max: 2e12,
        y_max: 1e12,
      },
      BoundingBox {
        x_min: 50.0,
        y_min: 50.0,
        x_max: 50.0,
        y_max: 50.0,
      },
    ];
    for bbox in boxes {
      let rendered = overlay.render(&frame(), Some(&detection(bbox)));
      assert_eq!(rendered.width(), 100);
    }
  }

  #[test]
  fn stroke_width_is_at_least_one() {
    assert_eq!(OverlayStyle::default().with_stroke_width(0).stroke_width, 1);
  }

  #[test]
  fn missing_font_files_report_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      Overlay::load_font(dir.path().join("none.ttf")),
      Err(OverlayError::IoError(_))
    ));
  }
}
