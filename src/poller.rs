//! ステータス追跡
//!
//! 一定間隔でレコードを取得し、終端状態になったら一度だけ通知する。
//! 取得エラーは一時的なものとして次の周期で再試行する。
//! 回数の上限はなく、キャンセルでのみ打ち切れる。

use crate::backend::{BackendError, RecordStore};
use lucid_common::AnalysisRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// デフォルトの取得間隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// 1回の取得結果
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    Pending,
    Terminal(AnalysisRecord),
}

#[derive(Clone)]
pub struct StatusPoller {
    records: Arc<dyn RecordStore>,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(records: Arc<dyn RecordStore>, interval: Duration) -> Self {
        Self { records, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// レコードを1回取得
    pub async fn poll_once(&self, id: &str) -> Result<PollStep, BackendError> {
        let record = self.records.get(id).await?;
        debug!(id, status = %record.status, "polled analysis status");
        if record.is_terminal() {
            Ok(PollStep::Terminal(record))
        } else {
            Ok(PollStep::Pending)
        }
    }

    /// 終端状態になるまで待つ（キャンセル時は `None`）
    pub async fn wait(&self, id: &str, cancel: &CancellationToken) -> Option<AnalysisRecord> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = ticker.tick() => {}
            }

            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                step = self.poll_once(id) => step,
            };

            match step {
                Ok(PollStep::Terminal(record)) => return Some(record),
                Ok(PollStep::Pending) => {}
                Err(e) => debug!(id, error = %e, "status check failed, retrying"),
            }
        }
    }

    /// バックグラウンドで待機し、終端時にコールバックを一度だけ呼ぶ
    ///
    /// キャンセル後はコールバックを呼ばない。
    pub fn await_completion<F>(&self, id: impl Into<String>, on_terminal: F) -> PollHandle
    where
        F: FnOnce(AnalysisRecord) + Send + 'static,
    {
        let token = CancellationToken::new();
        let poller = self.clone();
        let id = id.into();
        let child = token.clone();

        let task = tokio::spawn(async move {
            if let Some(record) = poller.wait(&id, &child).await {
                if !child.is_cancelled() {
                    on_terminal(record);
                }
            }
        });

        PollHandle {
            token,
            task: Some(task),
        }
    }
}

/// 実行中の追跡タスク
///
/// drop するとキャンセルされる。
pub struct PollHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// タスクの終了を待つ
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "status poll task aborted");
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
