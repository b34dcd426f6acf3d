//! 進捗表示
//!
//! 実際の解析進捗とは無関係の見た目用の値。
//! 終端に達するまでは 100 に届かず、`finish` で 100 に固定される。

/// 完了前に到達できる上限
pub const PROGRESS_CEILING: f64 = 99.0;

/// 完了時の値
pub const PROGRESS_DONE: f64 = 100.0;

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    value: f64,
    finished: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 残り距離の `fraction` 分だけ上限へ近づける
    pub fn advance(&mut self, fraction: f64) -> f64 {
        if self.finished || !fraction.is_finite() {
            return self.value;
        }

        let fraction = fraction.clamp(0.0, 1.0);
        let next = self.value + (PROGRESS_CEILING - self.value) * fraction;
        self.value = next.clamp(self.value, PROGRESS_CEILING);
        self.value
    }

    /// 100 に固定
    pub fn finish(&mut self) -> f64 {
        self.finished = true;
        self.value = PROGRESS_DONE;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// 表示用の整数パーセント
    pub fn percent(&self) -> u8 {
        self.value.round() as u8
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
