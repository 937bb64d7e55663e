/// コア型定義
///
/// Domain層の中心となるデータ構造。
/// キャプチャループのすべての段階で共有される型。

use std::sync::OnceLock;
use std::time::Instant;

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::ports::SharedSurface;

/// ピクセル単位のサイズ（幅×高さ）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// 新しいDimensionsを作成
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// RGBA8として必要なバイト数
    pub fn byte_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }

    /// ピクセル数
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// RGBA8ピクセルバッファ（連続メモリ、行優先）
///
/// `data.len()` は常に `width * height * 4` に一致する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    dimensions: Dimensions,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// 新しいPixelBufferを作成
    ///
    /// # Returns
    /// - `Ok(PixelBuffer)`: データ長がサイズと一致する場合
    /// - `Err(EngineError::Surface)`: データ長の不一致
    pub fn new(dimensions: Dimensions, data: Vec<u8>) -> EngineResult<Self> {
        if data.len() != dimensions.byte_len() {
            return Err(EngineError::Surface(format!(
                "Pixel buffer length {} does not match {} ({} bytes expected)",
                data.len(),
                dimensions,
                dimensions.byte_len()
            )));
        }
        Ok(Self { dimensions, data })
    }

    /// 単色で塗りつぶされたバッファを作成
    pub fn filled(dimensions: Dimensions, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(dimensions.byte_len());
        for _ in 0..dimensions.pixel_count() {
            data.extend_from_slice(&rgba);
        }
        Self { dimensions, data }
    }

    /// 全ピクセルが0（透明黒）のバッファを作成
    pub fn blank(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            data: vec![0u8; dimensions.byte_len()],
        }
    }

    /// バッファのサイズ
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// ピクセルデータへの参照
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// ピクセルデータへの可変参照
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 所有権ごとデータを取り出す
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// 指定座標のRGBA値を取得（範囲外はNone）
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return None;
        }
        let idx = ((y * self.dimensions.width + x) * 4) as usize;
        Some([
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ])
    }
}

/// シンクから取得した1フレーム
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// フレーム取得時刻
    pub timestamp: Instant,
    /// フレーム画像データ（シンクのネイティブ解像度）
    pub pixels: PixelBuffer,
}

impl VideoFrame {
    /// 新しいフレームを作成
    pub fn new(pixels: PixelBuffer) -> Self {
        Self {
            timestamp: Instant::now(),
            pixels,
        }
    }
}

/// カメラの向きの希望（取得制約用）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FacingMode {
    /// 背面カメラ優先
    #[default]
    Environment,
    /// 前面カメラ優先
    #[allow(dead_code)]
    User,
}

/// メディア取得制約
///
/// 音声は常に無効。facing_modeはあくまで希望であり、
/// ソース実装が無視しても構わない。
#[derive(Debug, Clone, Copy)]
pub struct MediaConstraints {
    pub audio: bool,
    pub facing_mode: FacingMode,
    pub width: u32,
    pub height: u32,
}

impl MediaConstraints {
    /// キャプチャ解像度から映像のみの制約を作成（背面カメラ優先）
    pub fn video_only(width: u32, height: u32) -> Self {
        Self {
            audio: false,
            facing_mode: FacingMode::Environment,
            width,
            height,
        }
    }
}

/// 取得済みメディアストリームのハンドル
///
/// ソースが許可した時点で発行される不透明なハンドル。
/// エンジンはこれを保持し、start時にシンクへ接続する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    /// ストリーム識別子（ソース実装が採番）
    pub id: u64,
    /// ストリームのネイティブ解像度
    pub dimensions: Dimensions,
}

impl MediaStream {
    /// 新しいストリームハンドルを作成
    pub fn new(id: u64, dimensions: Dimensions) -> Self {
        Self { id, dimensions }
    }
}

/// エンジンのライフサイクル状態
///
/// `Failed` から `Ready` へ戻る遷移は存在しない。
/// 取得失敗後はエンジンを作り直してinitし直す。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnginePhase {
    /// init未実行
    #[default]
    Uninitialized,
    /// メディア取得要求中
    Requesting,
    /// ストリーム取得済み、start可能
    Ready,
    /// キャプチャループ実行中
    Running,
    /// stop済み
    Stopped,
    /// メディア取得失敗
    Failed,
}

/// Tickごとにキャプチャコールバックへ渡されるペイロード
///
/// フル解像度のキャプチャバッファと、遅延評価のデータURLアクセサを持つ。
/// エンコードは比較的高コストなため、`data_url()` が初めて呼ばれるまで
/// 実行されない。2回目以降は同じバッファのキャッシュ済みエンコードを返す。
pub struct CapturePayload {
    image: PixelBuffer,
    surface: SharedSurface,
    url: OnceLock<String>,
}

impl CapturePayload {
    /// 新しいペイロードを作成
    ///
    /// `surface` はエンコードに使うキャプチャサーフェス。
    /// 元実装と同様、エンコード時にバッファをサーフェスへ書き戻してから
    /// データURL化する。
    pub fn new(image: PixelBuffer, surface: SharedSurface) -> Self {
        Self {
            image,
            surface,
            url: OnceLock::new(),
        }
    }

    /// フル解像度のキャプチャバッファ
    pub fn image(&self) -> &PixelBuffer {
        &self.image
    }

    /// キャプチャ画像のPNGデータURLを取得（遅延評価・キャッシュあり）
    ///
    /// # Returns
    /// - `Ok(&str)`: `data:image/png;base64,...` 形式のURL
    /// - `Err(EngineError)`: サーフェス書き込みまたはエンコード失敗
    pub fn data_url(&self) -> EngineResult<&str> {
        if let Some(url) = self.url.get() {
            return Ok(url);
        }

        let encoded = {
            let mut surface = self.surface.lock().unwrap();
            surface.write_pixels(&self.image)?;
            surface.to_data_url()?
        };

        Ok(self.url.get_or_init(|| encoded))
    }

    /// すでにエンコード済みかどうか
    pub fn is_encoded(&self) -> bool {
        self.url.get().is_some()
    }
}

impl std::fmt::Debug for CapturePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturePayload")
            .field("dimensions", &self.image.dimensions())
            .field("encoded", &self.is_encoded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_byte_len() {
        let dims = Dimensions::new(64, 48);
        assert_eq!(dims.byte_len(), 64 * 48 * 4);
        assert_eq!(dims.pixel_count(), 64 * 48);
    }

    #[test]
    fn test_pixel_buffer_length_validation() {
        let dims = Dimensions::new(4, 4);
        assert!(PixelBuffer::new(dims, vec![0u8; 64]).is_ok());

        // 長さ不一致はエラー
        let result = PixelBuffer::new(dims, vec![0u8; 63]);
        assert!(matches!(result, Err(EngineError::Surface(_))));
    }

    #[test]
    fn test_pixel_buffer_filled() {
        let buffer = PixelBuffer::filled(Dimensions::new(2, 2), [10, 20, 30, 255]);
        assert_eq!(buffer.pixel(0, 0), Some([10, 20, 30, 255]));
        assert_eq!(buffer.pixel(1, 1), Some([10, 20, 30, 255]));
        // 範囲外
        assert_eq!(buffer.pixel(2, 0), None);
    }

    #[test]
    fn test_pixel_buffer_blank_is_zeroed() {
        let buffer = PixelBuffer::blank(Dimensions::new(3, 3));
        assert!(buffer.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_media_constraints_video_only() {
        let constraints = MediaConstraints::video_only(640, 480);
        assert!(!constraints.audio);
        assert_eq!(constraints.facing_mode, FacingMode::Environment);
        assert_eq!(constraints.width, 640);
        assert_eq!(constraints.height, 480);
    }

    #[test]
    fn test_engine_phase_default() {
        assert_eq!(EnginePhase::default(), EnginePhase::Uninitialized);
    }
}
