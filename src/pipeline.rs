// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/pipeline.rs - 单帧处理流水线
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

use tracing::{debug, error, info};

use crate::{
  decode::{Decoder, Detection},
  error::PipelineError,
  frame::{MODEL_INPUT_H, MODEL_INPUT_W, RawFrame},
  label::LabelSet,
  model::{Cancellation, InferenceEngine, ModelContract},
  output::Overlay,
  preprocess::Preprocessor,
};

/// 单帧处理结果
#[derive(Debug, Clone)]
pub struct FrameOutcome {
  pub detection: Option<Detection>,
  pub annotated: RawFrame,
  pub timings: FrameTimings,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTimings {
  pub preprocess: Duration,
  pub inference: Duration,
  pub render: Duration,
}

/// 启动时构造一次的只读上下文
///
/// 持有模型、标签表、解码器与绘制样式，按引用传入每一帧的处理。
pub struct PipelineContext<M> {
  preprocessor: Preprocessor<MODEL_INPUT_W, MODEL_INPUT_H>,
  model: M,
  contract: ModelContract,
  labels: LabelSet,
  decoder: Decoder,
  overlay: Overlay,
}

impl<M: InferenceEngine> PipelineContext<M> {
  /// 标签数量与模型类别数不一致时直接失败，不会进入逐帧处理
  pub fn new(
    model: M,
    labels: LabelSet,
    decoder: Decoder,
    overlay: Overlay,
  ) -> Result<Self, PipelineError> {
    let contract = ModelContract::new(model.num_classes());
    if contract.num_classes != labels.len() {
      error!(
        "模型类别数 {} 与标签数量 {} 不一致",
        contract.num_classes,
        labels.len()
      );
      return Err(PipelineError::contract(
        "标签数量",
        contract.num_classes,
        labels.len(),
      ));
    }
    info!(
      "流水线就绪: {} 个类别, 阈值 {:.2}, 边界框策略 {:?}",
      labels.len(),
      decoder.threshold(),
      decoder.policy()
    );

    Ok(Self {
      preprocessor: Preprocessor::new(),
      model,
      contract,
      labels,
      decoder,
      overlay,
    })
  }

  pub fn labels(&self) -> &LabelSet {
    &self.labels
  }

  pub fn decoder(&self) -> &Decoder {
    &self.decoder
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  /// 预处理 -> 推理 -> 解码 -> 绘制
  pub fn run_frame(
    &self,
    frame: &RawFrame,
    cancel: &Cancellation,
  ) -> Result<FrameOutcome, PipelineError> {
    let now = Instant::now();
    let tensor = self.preprocessor.process(frame)?;
    let preprocess = now.elapsed();

    let now = Instant::now();
    let raw = self.model.infer(&tensor, cancel).map_err(|e| {
      if cancel.is_cancelled() {
        PipelineError::Cancelled
      } else {
        PipelineError::Inference(Box::new(e))
      }
    })?;
    let inference = now.elapsed();
    drop(tensor);

    self.contract.check(&raw)?;

    let detection = self
      .decoder
      .decode(&raw, &self.labels, frame.width(), frame.height());

    let now = Instant::now();
    let annotated = self.overlay.render(frame, detection.as_ref());
    let render = now.elapsed();

    let timings = FrameTimings {
      preprocess,
      inference,
      render,
    };
    debug!(
      "帧 {} 处理完成: 预处理 {:.2?}, 推理 {:.2?}, 绘制 {:.2?}",
      frame.sequence(),
      timings.preprocess,
      timings.inference,
      timings.render
    );

    Ok(FrameOutcome {
      detection,
      annotated,
      timings,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::ModelTensor, model::RawModelOutput, output::OverlayStyle};
  use image::RgbImage;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("后端故障")]
  struct Broken;

  struct FailingModel;

  impl InferenceEngine for FailingModel {
    type Error = Broken;

    fn num_classes(&self) -> usize {
      1
    }

    fn infer(&self, _: &ModelTensor, _: &Cancellation) -> Result<RawModelOutput, Self::Error> {
      Err(Broken)
    }
  }

  fn context() -> PipelineContext<FailingModel> {
    PipelineContext::new(
      FailingModel,
      LabelSet::new(["only"]),
      Decoder::default(),
      Overlay::with_default_font(OverlayStyle::default()).unwrap(),
    )
    .unwrap()
  }

  #[test]
  fn label_count_must_match_model() {
    let result = PipelineContext::new(
      FailingModel,
      LabelSet::new(["a", "b"]),
      Decoder::default(),
      Overlay::with_default_font(OverlayStyle::default()).unwrap(),
    );
    assert!(matches!(
      result,
      Err(PipelineError::ModelContractViolation {
        expected: 1,
        actual: 2,
        ..
      })
    ));
  }

  #[test]
  fn backend_failures_only_affect_the_frame() {
    let frame = RawFrame::new(0, RgbImage::new(4, 4));
    let err = context().run_frame(&frame, &Cancellation::new()).unwrap_err();
    assert!(matches!(err, PipelineError::Inference(_)));
    assert!(!err.is_fatal());
  }

  #[test]
  fn failures_after_cancel_are_reported_as_cancelled() {
    let frame = RawFrame::new(0, RgbImage::new(4, 4));
    let cancel = Cancellation::new();
    cancel.cancel();
    let err = context().run_frame(&frame, &cancel).unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
  }

  #[test]
  fn invalid_frames_never_reach_the_model() {
    let frame = RawFrame::new(0, RgbImage::new(0, 4));
    let err = context().run_frame(&frame, &Cancellation::new()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidFrame { .. }));
  }
}
