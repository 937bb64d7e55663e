//! サンプルプロセッサ実装
//!
//! 処理解像度バッファに対する単純なピクセル変換。
//! デモおよびテスト用。

use crate::domain::{FrameProcessor, PixelBuffer};

/// グレースケール変換プロセッサ
///
/// BT.601近似の整数演算（(299R + 587G + 114B) / 1000）。
/// アルファは保持する。
pub struct GrayscaleProcessor;

impl GrayscaleProcessor {
    /// 新しいプロセッサを作成
    pub fn new() -> Self {
        Self
    }
}

impl Default for GrayscaleProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProcessor for GrayscaleProcessor {
    fn process(&mut self, mut buffer: PixelBuffer) -> PixelBuffer {
        for pixel in buffer.data_mut().chunks_exact_mut(4) {
            let luma = (299 * pixel[0] as u32 + 587 * pixel[1] as u32 + 114 * pixel[2] as u32)
                / 1000;
            let luma = luma as u8;
            pixel[0] = luma;
            pixel[1] = luma;
            pixel[2] = luma;
        }
        buffer
    }
}

/// 色反転プロセッサ
///
/// RGBを反転し、アルファは保持する。
pub struct InvertProcessor;

impl InvertProcessor {
    /// 新しいプロセッサを作成
    pub fn new() -> Self {
        Self
    }
}

impl Default for InvertProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProcessor for InvertProcessor {
    fn process(&mut self, mut buffer: PixelBuffer) -> PixelBuffer {
        for pixel in buffer.data_mut().chunks_exact_mut(4) {
            pixel[0] = 255 - pixel[0];
            pixel[1] = 255 - pixel[1];
            pixel[2] = 255 - pixel[2];
        }
        buffer
    }
}
