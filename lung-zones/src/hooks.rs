//! 运行过程中的旁路: 进度回调与协作式取消.

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ZonalError, ZonalResult};

/// 进度回调与取消标记. 两者都是可选的, 缺省时不做任何报告, 也不会被取消.
///
/// 进度以 `0..=100` 的整数百分比报告, 粒度为一个帧组 (或一帧).
/// 取消标记只在两个帧组之间检查, 不会打断正在处理的帧组.
#[derive(Default)]
pub struct RunHooks<'a> {
    progress: Option<&'a mut dyn FnMut(u8)>,
    cancel: Option<&'a AtomicBool>,
}

impl Debug for RunHooks<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "RunHooks {{ progress: {}, cancel: {:?} }}",
            self.progress.is_some(),
            self.cancel.map(|c| c.load(Ordering::Relaxed))
        ))
    }
}

impl<'a> RunHooks<'a> {
    /// 不报告进度, 不可取消.
    #[inline]
    pub fn none() -> Self {
        Self::default()
    }

    /// 设置进度回调.
    #[inline]
    pub fn with_progress(mut self, f: &'a mut dyn FnMut(u8)) -> Self {
        self.progress = Some(f);
        self
    }

    /// 设置取消标记. 标记被置为 `true` 后, 运行会在下一个帧组开始前以
    /// [`ZonalError::Cancelled`] 结束.
    #[inline]
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// 报告已完成 `done / total`.
    pub(crate) fn report(&mut self, done: usize, total: usize) {
        if let Some(f) = self.progress.as_mut() {
            let pct = if total == 0 {
                100
            } else {
                (done.min(total) * 100 / total) as u8
            };
            f(pct);
        }
    }

    /// 是否已被请求取消?
    #[inline]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Acquire))
    }

    /// 若已被请求取消, 则返回 `Err(ZonalError::Cancelled)`.
    #[inline]
    pub(crate) fn check(&self) -> ZonalResult<()> {
        if self.is_cancelled() {
            Err(ZonalError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 取消标记本身, 供并行路径共享.
    #[inline]
    pub(crate) fn cancel_flag(&self) -> Option<&'a AtomicBool> {
        self.cancel
    }
}
