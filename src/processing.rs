//! 処理中画面
//!
//! 進捗表示とステータス追跡を同時に動かし、終端に達したら進捗を 100 にして抜ける。
//! どちらのタイマーもこの関数を抜けた時点で破棄される。

use crate::poller::StatusPoller;
use lucid_common::{AnalysisRecord, AnalysisStatus, ProgressTracker};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// デフォルトの進捗更新間隔
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(300);

/// 1ティックで残り距離を詰める割合の範囲
const STEP_MIN: f64 = 0.02;
const STEP_MAX: f64 = 0.15;

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    Completed(AnalysisRecord),
    Failed(AnalysisRecord),
    Cancelled,
}

impl ProcessingOutcome {
    fn from_record(record: AnalysisRecord) -> Self {
        match record.status {
            AnalysisStatus::Failed => ProcessingOutcome::Failed(record),
            _ => ProcessingOutcome::Completed(record),
        }
    }
}

pub struct ProcessingScreen {
    poller: StatusPoller,
    progress_interval: Duration,
    rng: StdRng,
}

impl ProcessingScreen {
    pub fn new(poller: StatusPoller, progress_interval: Duration) -> Self {
        Self {
            poller,
            progress_interval,
            rng: StdRng::from_os_rng(),
        }
    }

    /// 乱数を固定（テスト用）
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// 終端状態まで待つ
    ///
    /// `on_progress` には単調増加の値が渡され、終端時に最後に一度だけ 100 が渡る。
    /// キャンセル時は 100 を渡さない。
    pub async fn run<F>(&mut self, id: &str, cancel: &CancellationToken, mut on_progress: F) -> ProcessingOutcome
    where
        F: FnMut(f64),
    {
        let mut tracker = ProgressTracker::new();
        let mut ticker = interval(self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 最初のティックは即時なので読み捨てる
        ticker.tick().await;

        let wait = self.poller.wait(id, cancel);
        tokio::pin!(wait);

        let outcome = loop {
            tokio::select! {
                finished = &mut wait => {
                    break match finished {
                        Some(record) => ProcessingOutcome::from_record(record),
                        None => ProcessingOutcome::Cancelled,
                    };
                }
                _ = ticker.tick() => {
                    let fraction = self.rng.random_range(STEP_MIN..STEP_MAX);
                    on_progress(tracker.advance(fraction));
                }
            }
        };

        if !matches!(outcome, ProcessingOutcome::Cancelled) {
            on_progress(tracker.finish());
        }
        debug!(id, cancelled = matches!(outcome, ProcessingOutcome::Cancelled), "processing finished");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryRecordStore, RecordStore};
    use lucid_common::{AnalysisOptions, NewAnalysisRecord, PROGRESS_CEILING, PROGRESS_DONE};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    async fn setup() -> (Arc<MemoryRecordStore>, String, ProcessingScreen) {
        let store = Arc::new(MemoryRecordStore::new());
        let id = store
            .insert(NewAnalysisRecord::processing(None, "1-a.jpg", "a.jpg", 1, AnalysisOptions::all()))
            .await
            .unwrap()
            .id;
        let poller = StatusPoller::new(store.clone(), Duration::from_secs(2));
        let screen = ProcessingScreen::new(poller, DEFAULT_PROGRESS_INTERVAL).with_seed(7);
        (store, id, screen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_monotonic_and_ends_at_hundred() {
        let (store, id, mut screen) = setup().await;

        let completer = store.clone();
        let target = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(9)).await;
            let results: BTreeMap<String, String> = [("aiScore".to_string(), "91%".to_string())].into();
            completer.complete(&target, results).await.unwrap();
        });

        let mut values = Vec::new();
        let outcome = screen.run(&id, &CancellationToken::new(), |v| values.push(v)).await;

        assert!(matches!(outcome, ProcessingOutcome::Completed(_)));
        assert!(values.len() > 10);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(values.iter().filter(|&&v| v >= PROGRESS_DONE).count(), 1);
        assert_eq!(values.last().copied(), Some(PROGRESS_DONE));
        assert!(values[..values.len() - 1].iter().all(|&v| v <= PROGRESS_CEILING));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_record() {
        let (store, id, mut screen) = setup().await;
        store.fail(&id, "worker crashed").await.unwrap();

        let mut last = 0.0;
        let outcome = screen.run(&id, &CancellationToken::new(), |v| last = v).await;

        match outcome {
            ProcessingOutcome::Failed(record) => {
                assert_eq!(record.error_message.as_deref(), Some("worker crashed"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(last, PROGRESS_DONE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_never_reports_hundred() {
        let (_store, id, mut screen) = setup().await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            trigger.cancel();
        });

        let mut values = Vec::new();
        let outcome = screen.run(&id, &cancel, |v| values.push(v)).await;

        assert_eq!(outcome, ProcessingOutcome::Cancelled);
        assert!(!values.is_empty());
        assert!(values.iter().all(|&v| v < PROGRESS_DONE));
    }
}
