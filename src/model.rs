// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/model.rs - 推理引擎边界
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::{error::PipelineError, frame::ModelTensor};

/// 几何向量固定长度: [x_center, y_center, width, height]
pub const GEOMETRY_LEN: usize = 4;

/// 推理引擎
///
/// 输入为 256x256x3 行优先的 f32 张量，输出为几何向量与类别概率向量。
/// 不同的推理后端都实现在这个接口之后。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 模型构建时确定的类别数 N
  fn num_classes(&self) -> usize;

  /// 后端在耗时操作中应轮询 `cancel`，被取消时尽快返回错误
  fn infer(&self, input: &ModelTensor, cancel: &Cancellation) -> Result<RawModelOutput, Self::Error>;
}

impl<M: InferenceEngine + ?Sized> InferenceEngine for Box<M> {
  type Error = M::Error;

  fn num_classes(&self) -> usize {
    (**self).num_classes()
  }

  fn infer(&self, input: &ModelTensor, cancel: &Cancellation) -> Result<RawModelOutput, Self::Error> {
    (**self).infer(input, cancel)
  }
}

/// 模型的原始输出，单次流水线内产生并消费
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawModelOutput {
  pub geometry: Vec<f32>,
  pub class_probs: Vec<f32>,
}

/// 模型输出的形状约定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelContract {
  pub num_classes: usize,
}

impl ModelContract {
  pub fn new(num_classes: usize) -> Self {
    Self { num_classes }
  }

  /// 长度不一致说明模型与标签表不匹配，属于致命错误
  pub fn check(&self, raw: &RawModelOutput) -> Result<(), PipelineError> {
    if raw.geometry.len() != GEOMETRY_LEN {
      return Err(PipelineError::contract(
        "几何向量长度",
        GEOMETRY_LEN,
        raw.geometry.len(),
      ));
    }
    if raw.class_probs.len() != self.num_classes {
      return Err(PipelineError::contract(
        "类别概率向量长度",
        self.num_classes,
        raw.class_probs.len(),
      ));
    }
    Ok(())
  }
}

/// 流水线拆除时用来打断正在进行的推理
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

mod replay;
pub use self::replay::{ReplayModel, ReplayModelBuilder, ReplayModelError};

#[cfg(test)]
mod tests {
  use super::*;

  fn output(geometry: usize, classes: usize) -> RawModelOutput {
    RawModelOutput {
      geometry: vec![0.5; geometry],
      class_probs: vec![0.1; classes],
    }
  }

  #[test]
  fn contract_accepts_matching_lengths() {
    assert!(ModelContract::new(3).check(&output(4, 3)).is_ok());
  }

  #[test]
  fn contract_rejects_geometry_and_class_mismatches() {
    let contract = ModelContract::new(3);
    assert!(matches!(
      contract.check(&output(5, 3)),
      Err(PipelineError::ModelContractViolation {
        expected: 4,
        actual: 5,
        ..
      })
    ));
    assert!(matches!(
      contract.check(&output(4, 2)),
      Err(PipelineError::ModelContractViolation {
        expected: 3,
        actual: 2,
        ..
      })
    ));
  }

  #[test]
  fn cancellation_is_shared_between_clones() {
    let cancel = Cancellation::new();
    let observer = cancel.clone();
    assert!(!observer.is_cancelled());
    cancel.cancel();
    assert!(observer.is_cancelled());
  }

  #[test]
  fn raw_output_reads_snake_case_json() {
    let raw: RawModelOutput =
      serde_json::from_str(r#"{"geometry":[0.5,0.5,0.1,0.1],"class_probs":[0.1,0.97,0.2]}"#).unwrap();
    assert_eq!(raw.geometry, [0.5, 0.5, 0.1, 0.1]);
    assert_eq!(raw.class_probs, [0.1, 0.97, 0.2]);
  }
}
