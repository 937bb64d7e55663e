//! キャプチャ経路のベンチマーク
//!
//! Tickの主要コスト（スケーリング描画・ピクセル抽出・PNGエンコード）を
//! 単体で計測します。
//!
//! 実行方法:
//! ```
//! cargo bench
//! ```

use camengine::domain::{Dimensions, RasterSurface, VideoFrame};
use camengine::infrastructure::memory_surface::MemorySurface;
use camengine::infrastructure::test_pattern::test_pattern;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// 640x480フレームを64x48の処理サーフェスへ縮小描画
fn bench_draw_frame_downscale(c: &mut Criterion) {
    let frame = VideoFrame::new(test_pattern(Dimensions::new(640, 480), 0));
    let mut surface = MemorySurface::new(Dimensions::new(64, 48));

    c.bench_function("draw_frame_640x480_to_64x48", |b| {
        b.iter(|| surface.draw_frame(black_box(&frame)));
    });
}

/// キャプチャ解像度での等倍描画とピクセル抽出
fn bench_draw_and_read_full(c: &mut Criterion) {
    let frame = VideoFrame::new(test_pattern(Dimensions::new(640, 480), 0));
    let mut surface = MemorySurface::new(Dimensions::new(640, 480));

    c.bench_function("draw_and_read_640x480", |b| {
        b.iter(|| {
            surface.draw_frame(black_box(&frame));
            black_box(surface.read_pixels())
        });
    });
}

/// キャプチャ画像のPNGデータURL化（遅延エンコードの実コスト）
fn bench_to_data_url(c: &mut Criterion) {
    let mut surface = MemorySurface::new(Dimensions::new(640, 480));
    surface.draw_frame(&VideoFrame::new(test_pattern(Dimensions::new(640, 480), 0)));

    c.bench_function("to_data_url_640x480", |b| {
        b.iter(|| black_box(surface.to_data_url().unwrap()));
    });
}

criterion_group!(
    benches,
    bench_draw_frame_downscale,
    bench_draw_and_read_full,
    bench_to_data_url
);
criterion_main!(benches);
