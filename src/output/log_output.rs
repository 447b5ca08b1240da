// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  decode::Detection,
  frame::RawFrame,
  output::DisplaySink,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 无界面运行时把检测结果写到日志
#[derive(Debug, Default)]
pub struct LogOutput;

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }
    Ok(LogOutput)
  }
}

impl DisplaySink for LogOutput {
  type Error = LogOutputError;

  fn present(&self, annotated: &RawFrame, detection: Option<&Detection>) -> Result<(), Self::Error> {
    match detection {
      Some(det) => info!(
        "帧 {}: {} at ({:.0}, {:.0}) - ({:.0}, {:.0})",
        annotated.sequence(),
        det,
        det.bbox.x_min,
        det.bbox.y_min,
        det.bbox.x_max,
        det.bbox.y_max
      ),
      None => debug!("帧 {}: 无检测", annotated.sequence()),
    }
    Ok(())
  }
}
