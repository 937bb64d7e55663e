//! インメモリラスタサーフェス
//!
//! `RasterSurface` のRGBA8実装。スケーリング描画はimageクレート、
//! データURL化はPNGエンコード＋base64で行う。

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{
    imageops::{self, FilterType},
    ImageFormat, RgbaImage,
};
use std::io::Cursor;

use crate::domain::{
    Dimensions, EngineError, EngineResult, PixelBuffer, RasterSurface, SurfaceFactory, VideoFrame,
};

/// インメモリサーフェス
///
/// ピクセルは常に `width * height * 4` バイトのRGBA8。
pub struct MemorySurface {
    image: RgbaImage,
}

impl MemorySurface {
    /// 指定サイズの空サーフェスを作成
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            image: RgbaImage::new(dimensions.width, dimensions.height),
        }
    }
}

impl RasterSurface for MemorySurface {
    fn dimensions(&self) -> Dimensions {
        let (width, height) = self.image.dimensions();
        Dimensions::new(width, height)
    }

    fn resize(&mut self, dimensions: Dimensions) {
        self.image = RgbaImage::new(dimensions.width, dimensions.height);
    }

    fn draw_frame(&mut self, frame: &VideoFrame) {
        let source_dims = frame.pixels.dimensions();
        let source = match RgbaImage::from_raw(
            source_dims.width,
            source_dims.height,
            frame.pixels.data().to_vec(),
        ) {
            Some(image) => image,
            None => {
                // PixelBufferの長さ不変条件により到達しない
                tracing::warn!("Frame buffer rejected by image container");
                return;
            }
        };

        let target = self.dimensions();
        if source_dims == target {
            self.image = source;
        } else {
            self.image = imageops::resize(&source, target.width, target.height, FilterType::Triangle);
        }
    }

    fn read_pixels(&self) -> PixelBuffer {
        PixelBuffer::new(self.dimensions(), self.image.as_raw().clone())
            .expect("RgbaImage length invariant")
    }

    fn write_pixels(&mut self, buffer: &PixelBuffer) -> EngineResult<()> {
        let dims = buffer.dimensions();
        if dims != self.dimensions() {
            return Err(EngineError::Surface(format!(
                "Cannot write {} buffer to {} surface",
                dims,
                self.dimensions()
            )));
        }

        self.image = RgbaImage::from_raw(dims.width, dims.height, buffer.data().to_vec())
            .ok_or_else(|| EngineError::Surface("Buffer rejected by image container".to_string()))?;
        Ok(())
    }

    fn clear(&mut self) {
        let dims = self.dimensions();
        self.image = RgbaImage::new(dims.width, dims.height);
    }

    fn to_data_url(&self) -> EngineResult<String> {
        let mut png = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| EngineError::Encoding(format!("PNG encode failed: {}", e)))?;

        Ok(format!("data:image/png;base64,{}", BASE64.encode(&png)))
    }
}

/// MemorySurfaceを生成するファクトリ
pub struct MemorySurfaceFactory;

impl SurfaceFactory for MemorySurfaceFactory {
    fn create(&self, dimensions: Dimensions) -> Box<dyn RasterSurface + Send> {
        Box::new(MemorySurface::new(dimensions))
    }
}
