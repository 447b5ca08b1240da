// 该文件是 Liaowang （瞭望） 项目的一部分。
// src/mailbox.rs - 最新帧单槽信箱
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

use std::{
  sync::{
    Condvar, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use tracing::trace;

struct Slot<T> {
  item: Option<T>,
  closed: bool,
}

/// 只保存最新一帧的信箱
///
/// 采集线程不断投递，旧帧被新帧覆盖；处理线程每次取走最新的一帧。
/// 任意时刻最多只有一帧在等待处理。
pub struct LatestFrameMailbox<T> {
  slot: Mutex<Slot<T>>,
  ready: Condvar,
  superseded: AtomicU64,
}

impl<T> Default for LatestFrameMailbox<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> LatestFrameMailbox<T> {
  pub fn new() -> Self {
    Self {
      slot: Mutex::new(Slot {
        item: None,
        closed: false,
      }),
      ready: Condvar::new(),
      superseded: AtomicU64::new(0),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Slot<T>> {
    // 持锁期间不会 panic，中毒时直接沿用内部状态
    self.slot.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// 投递一帧，返回被覆盖的旧帧
  ///
  /// 信箱关闭后投递的帧原样退回。
  pub fn post(&self, item: T) -> Option<T> {
    let mut slot = self.lock();
    if slot.closed {
      return Some(item);
    }
    let stale = slot.item.replace(item);
    if stale.is_some() {
      self.superseded.fetch_add(1, Ordering::Relaxed);
      trace!("旧帧被覆盖");
    }
    drop(slot);
    self.ready.notify_one();
    stale
  }

  /// 阻塞直到有新帧；信箱关闭且没有待处理帧时返回 None
  pub fn take(&self) -> Option<T> {
    let mut slot = self.lock();
    loop {
      if let Some(item) = slot.item.take() {
        return Some(item);
      }
      if slot.closed {
        return None;
      }
      slot = self.ready.wait(slot).unwrap_or_else(|e| e.into_inner());
    }
  }

  /// 与 `take` 相同，但最多等待 `timeout`
  pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
    let slot = self.lock();
    let (mut slot, _) = self
      .ready
      .wait_timeout_while(slot, timeout, |s| s.item.is_none() && !s.closed)
      .unwrap_or_else(|e| e.into_inner());
    slot.item.take()
  }

  pub fn try_take(&self) -> Option<T> {
    self.lock().item.take()
  }

  /// 关闭信箱并唤醒所有等待者，待处理的帧仍可取走
  pub fn close(&self) {
    self.lock().closed = true;
    self.ready.notify_all();
  }

  pub fn is_closed(&self) -> bool {
    self.lock().closed
  }

  /// 因为处理不及时而被覆盖的帧数
  pub fn superseded(&self) -> u64 {
    self.superseded.load(Ordering::Relaxed)
  }
}
