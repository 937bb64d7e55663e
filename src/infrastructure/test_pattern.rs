//! テストパターンのソース・シンク実装
//!
//! 実デバイスなしでエンジンを動かすための合成映像アダプタ。
//! テスト・デモ・開発用。

use std::time::Duration;

use crate::domain::{
    Dimensions, EngineError, EngineResult, MediaConstraints, MediaSource, MediaStream, PixelBuffer,
    VideoFrame, VideoSink,
};

/// 指定サイズ・フレーム番号のテストパターンを生成
///
/// 横方向に赤、縦方向に緑のグラデーション。青はフレーム番号で変化する
/// ため、連続フレームは互いに異なる内容になる。
pub fn test_pattern(dimensions: Dimensions, frame_index: u64) -> PixelBuffer {
    let mut data = Vec::with_capacity(dimensions.byte_len());
    for y in 0..dimensions.height {
        for x in 0..dimensions.width {
            // 勾配計算はu64で行う（u32では幅約1677万超で乗算が溢れる）
            let r = if dimensions.width > 1 {
                (x as u64 * 255 / (dimensions.width as u64 - 1)) as u8
            } else {
                0
            };
            let g = if dimensions.height > 1 {
                (y as u64 * 255 / (dimensions.height as u64 - 1)) as u8
            } else {
                0
            };
            let b = (frame_index % 256) as u8;
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }
    // 長さはbyte_lenちょうどになるよう構築している
    PixelBuffer::new(dimensions, data).expect("pattern length invariant")
}

/// 常に取得を許可する合成メディアソース
///
/// 要求されたキャプチャ解像度そのままのストリームを発行する。
pub struct TestPatternSource {
    next_id: u64,
}

impl TestPatternSource {
    /// 新しいソースを作成
    pub fn new() -> Self {
        Self { next_id: 1 }
    }
}

impl Default for TestPatternSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSource for TestPatternSource {
    fn open(&mut self, constraints: &MediaConstraints) -> EngineResult<MediaStream> {
        let stream = MediaStream::new(
            self.next_id,
            Dimensions::new(constraints.width, constraints.height),
        );
        self.next_id += 1;

        tracing::debug!(
            stream_id = stream.id,
            audio = constraints.audio,
            facing = ?constraints.facing_mode,
            "TestPatternSource: stream granted"
        );
        Ok(stream)
    }
}

/// 常に取得を拒否するメディアソース
///
/// 権限拒否シナリオのテスト用。
pub struct DeniedSource {
    reason: String,
}

impl DeniedSource {
    /// 新しい拒否ソースを作成
    pub fn new() -> Self {
        Self {
            reason: "Permission denied".to_string(),
        }
    }

    /// 拒否理由を指定して作成
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for DeniedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSource for DeniedSource {
    fn open(&mut self, _constraints: &MediaConstraints) -> EngineResult<MediaStream> {
        Err(EngineError::MediaAcquisition(self.reason.clone()))
    }
}

/// テストパターンを再生する合成シンク
///
/// 接続済みストリームの解像度で `current_frame` のたびに新しい
/// パターンフレームを返す。
pub struct TestPatternSink {
    attached: Option<MediaStream>,
    playable_delay: Duration,
    frame_index: u64,
    play_count: u64,
}

impl TestPatternSink {
    /// 新しいシンクを作成（再生可能まで遅延なし）
    pub fn new() -> Self {
        Self {
            attached: None,
            playable_delay: Duration::ZERO,
            frame_index: 0,
            play_count: 0,
        }
    }

    /// 再生可能を報告するまでの遅延を指定して作成
    pub fn with_playable_delay(delay: Duration) -> Self {
        Self {
            playable_delay: delay,
            ..Self::new()
        }
    }

    /// これまでに提供したフレーム数
    pub fn frames_served(&self) -> u64 {
        self.frame_index
    }

    /// playが呼ばれた回数（再生ナッジの観測用）
    pub fn play_count(&self) -> u64 {
        self.play_count
    }
}

impl Default for TestPatternSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSink for TestPatternSink {
    fn attach(&mut self, stream: MediaStream) -> EngineResult<()> {
        tracing::debug!(stream_id = stream.id, "TestPatternSink: stream attached");
        self.attached = Some(stream);
        Ok(())
    }

    fn detach(&mut self) {
        self.attached = None;
    }

    fn play(&mut self) {
        self.play_count += 1;
    }

    fn wait_playable(&mut self) -> EngineResult<()> {
        if self.attached.is_none() {
            return Err(EngineError::Sink(
                "Cannot become playable without a stream".to_string(),
            ));
        }
        if !self.playable_delay.is_zero() {
            std::thread::sleep(self.playable_delay);
        }
        Ok(())
    }

    fn current_frame(&mut self) -> EngineResult<VideoFrame> {
        let stream = self
            .attached
            .as_ref()
            .ok_or_else(|| EngineError::Sink("No stream attached".to_string()))?;

        let pixels = test_pattern(stream.dimensions, self.frame_index);
        self.frame_index += 1;
        Ok(VideoFrame::new(pixels))
    }
}
