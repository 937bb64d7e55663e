//! ランタイム状態管理（Application層）
//!
//! キャプチャループの実行状態とTickカウンタをスレッド間で共有します。
//! `Arc<AtomicBool>`/`Arc<AtomicU64>`によるロックフリー設計で、
//! 呼び出し側はループスレッドを妨げずに状態を観測できます。

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

/// エンジンの共有ステータス（スレッド間で共有、ロックフリー）
///
/// ループスレッドがTickごとに書き込み、呼び出し側（およびテスト）が
/// 読み取る。メモリオーダーはRelaxed - 少し古い値が見えても無害。
#[derive(Clone)]
pub struct EngineStatus {
    /// キャプチャループが動作中か
    running: Arc<AtomicBool>,
    /// これまでに完了したTick数
    ticks: Arc<AtomicU64>,
}

impl EngineStatus {
    /// 新しいEngineStatusを作成（初期状態は停止）
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// ループが動作中かどうかを確認（ロックフリー）
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// ループの動作状態を設定（start/stopからのみ呼ばれる）
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    /// Tick完了を記録（ループスレッドからのみ呼ばれる）
    #[inline]
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// 完了したTick数を取得
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self::new()
    }
}
