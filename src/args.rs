// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/args.rs - 公共参数配置
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

use std::path::PathBuf;

use clap::Args;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  decode::{BoxPolicy, DEFAULT_THRESHOLD, Decoder},
  label::LabelSet,
  model::{ReplayModel, ReplayModelBuilder},
  output::{MarkerStyle, Overlay, OverlayStyle},
  pipeline::PipelineContext,
};

/// 各个程序共用的流水线参数
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 模型地址，例如 replay:///data/outputs.jsonl?delay_ms=30
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 标签文件（每行一个类别名）
  #[arg(long, value_name = "FILE")]
  pub labels: PathBuf,

  /// 置信度阈值 [0.0, 1.0)，严格大于才视为检测到
  #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_name = "THRESHOLD", value_parser = parse_threshold)]
  pub threshold: f32,

  /// 将边界框裁剪到画面内
  #[arg(long)]
  pub clamp_boxes: bool,

  /// 在边界框中心绘制标记
  #[arg(long)]
  pub center_marker: bool,

  /// 标签字体文件（TTF/OTF），不指定时使用内置的 DejaVu Sans
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 边框线宽（像素）
  #[arg(long, default_value_t = 4, value_name = "PX")]
  pub stroke: u32,
}

fn parse_threshold(s: &str) -> Result<f32, String> {
  let value: f32 = s.parse().map_err(|_| format!("无法解析阈值: {}", s))?;
  if !(0.0..1.0).contains(&value) {
    return Err(format!("阈值必须在 [0, 1) 之间: {}", value));
  }
  Ok(value)
}

impl PipelineArgs {
  pub fn decoder(&self) -> Decoder {
    let policy = if self.clamp_boxes {
      BoxPolicy::Clamped
    } else {
      BoxPolicy::Unclamped
    };
    Decoder::new(self.threshold).with_policy(policy)
  }

  pub fn overlay(&self) -> anyhow::Result<Overlay> {
    let marker = self.center_marker.then(MarkerStyle::default);
    let style = OverlayStyle::default()
      .with_marker(marker)
      .with_stroke_width(self.stroke);
    let font = match &self.font {
      Some(path) => Overlay::load_font(path)?,
      None => {
        debug!("未指定字体，使用内置字体");
        Overlay::default_font()?
      }
    };
    Ok(Overlay::new(style, font))
  }

  /// 启动阶段：加载标签、模型并校验二者一致，任何失败都直接返回
  pub fn build_context(&self) -> anyhow::Result<PipelineContext<ReplayModel>> {
    info!("模型地址: {}", self.model);
    let labels = LabelSet::load(&self.labels)?;
    let model = ReplayModelBuilder::from_url(&self.model)?.build()?;
    let context = PipelineContext::new(model, labels, self.decoder(), self.overlay()?)?;
    Ok(context)
  }
}
