mod application;
mod domain;
mod infrastructure;
mod logging;

use crate::application::engine::CamEngine;
use crate::domain::config::{AppConfig, EngineConfig, ProcessorKind};
use crate::domain::ports::FrameProcessor;
use crate::domain::types::CapturePayload;
use crate::infrastructure::memory_surface::MemorySurfaceFactory;
use crate::infrastructure::processors::{GrayscaleProcessor, InvertProcessor};
use crate::infrastructure::test_pattern::{TestPatternSink, TestPatternSource};
use crate::logging::init_logging;
use std::path::PathBuf;

fn main() {
    // 設定ファイルの読み込み（存在しない場合はデフォルト設定を使用）
    let config = match AppConfig::from_file("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {:?}, using defaults", e);
            AppConfig::default()
        }
    };

    // ログシステムの初期化
    // 注意: _guardはmain終了まで保持する必要がある（Dropでログスレッドが終了）
    let log_dir = config.logging.log_dir.as_ref().map(PathBuf::from);
    let _guard = init_logging(&config.logging.level, config.logging.json_format, log_dir);

    tracing::info!("camengine starting...");

    match run(config) {
        Ok(_) => {
            tracing::info!("camengine terminated gracefully.");
        }
        Err(e) => {
            tracing::error!("Fatal error: {:?}", e);
            std::process::exit(1);
        }
    }
}

/// デモのメイン処理
///
/// テストパターンのソース・シンクに対してエンジンを起動し、
/// 設定された時間だけキャプチャを実行して停止する。
fn run(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;

    tracing::info!(
        "Engine: capture={}x{}, proc={}x{}, interval={}ms",
        config.engine.capture_width,
        config.engine.capture_height,
        config.engine.proc_width,
        config.engine.proc_height,
        config.engine.capture_interval_ms
    );

    let processor: Option<Box<dyn FrameProcessor>> = match config.demo.processor {
        ProcessorKind::None => None,
        ProcessorKind::Grayscale => Some(Box::new(GrayscaleProcessor::new())),
        ProcessorKind::Invert => Some(Box::new(InvertProcessor::new())),
    };
    tracing::info!("Demo processor: {:?}", config.demo.processor);

    // 最初のキャプチャだけデータURLを実際にエンコードして確認する
    let mut first_capture = true;
    let capture_callback = Box::new(move |payload: &CapturePayload| {
        if first_capture {
            first_capture = false;
            match payload.data_url() {
                Ok(url) => tracing::info!(
                    url_len = url.len(),
                    dimensions = %payload.image().dimensions(),
                    "First capture encoded"
                ),
                Err(e) => tracing::warn!("First capture encode failed: {:?}", e),
            }
        } else {
            tracing::trace!(dimensions = %payload.image().dimensions(), "Frame captured");
        }
    });

    let mut engine_config =
        EngineConfig::new(config.engine.clone()).with_capture_callback(capture_callback);
    if let Some(processor) = processor {
        engine_config = engine_config.with_processor(processor);
    }

    let mut engine = CamEngine::new(
        TestPatternSource::new(),
        TestPatternSink::new(),
        MemorySurfaceFactory,
    );

    engine.init(engine_config)?;
    engine.start()?;

    tracing::info!(
        duration_ms = config.demo.duration_ms,
        "Capture running..."
    );
    std::thread::sleep(config.demo.duration());

    engine.stop();

    tracing::info!(ticks = engine.status().ticks(), "Demo finished");
    Ok(())
}
