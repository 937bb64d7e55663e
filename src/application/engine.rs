//! キャプチャエンジン本体
//!
//! init / start / stop のライフサイクルと、固定間隔のキャプチャループを
//! 制御します。ループは専用スレッド上で `crossbeam_channel::tick` によって
//! 駆動され、stopチャネルへの送信とjoinで決定的に停止します。

use crate::application::{
    runtime_state::EngineStatus,
    stats::{StatKind, StatsCollector},
};
use crate::domain::{
    config::{CaptureCallback, EngineConfig, EngineSettings},
    error::{EngineError, EngineResult},
    ports::{shared_surface, FrameProcessor, MediaSource, SharedSurface, SurfaceFactory, VideoSink},
    types::{CapturePayload, EnginePhase, MediaConstraints, MediaStream},
};
use crossbeam_channel::{bounded, select, tick, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// init後に再生を促すまでの遅延
///
/// 一部モバイル環境の映像フリーズ回避策。取得処理とは独立に、
/// この時間の経過後にシンクへ一度だけplayが送られる。
const PLAY_NUDGE_DELAY: Duration = Duration::from_millis(100);

/// キャプチャループの制御ハンドル
struct CaptureLoop {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// エンジン内部の3サーフェス
///
/// サイズはinit時に一度だけ決まる。出力サーフェスは常に処理サーフェスと
/// 同じサイズを持つ。
struct EngineSurfaces {
    capture: SharedSurface,
    proc: SharedSurface,
    output: SharedSurface,
}

/// キャプチャエンジン
///
/// 独立してインスタンス化でき、複数のエンジンが共存できる。
/// 状態遷移:
/// `Uninitialized → (init, 取得成功) → Ready → (start, 再生可能) → Running → (stop) → Stopped`
/// 失敗辺: `Uninitialized/Requesting → (取得拒否) → Failed`（Readyへ戻る遷移はない）
pub struct CamEngine<M, V>
where
    M: MediaSource,
    V: VideoSink + 'static,
{
    source: M,
    sink: Arc<Mutex<V>>,
    factory: Box<dyn SurfaceFactory>,
    settings: Option<EngineSettings>,
    phase: EnginePhase,
    stream: Option<MediaStream>,
    surfaces: Option<EngineSurfaces>,
    processor: Option<Box<dyn FrameProcessor>>,
    capture_callback: Option<CaptureCallback>,
    status: EngineStatus,
    capture_loop: Option<CaptureLoop>,
}

impl<M, V> CamEngine<M, V>
where
    M: MediaSource,
    V: VideoSink + 'static,
{
    /// 新しいエンジンを作成
    ///
    /// ソース・シンク・サーフェスファクトリをDIで注入する。
    pub fn new(source: M, sink: V, factory: impl SurfaceFactory + 'static) -> Self {
        Self {
            source,
            sink: Arc::new(Mutex::new(sink)),
            factory: Box::new(factory),
            settings: None,
            phase: EnginePhase::Uninitialized,
            stream: None,
            surfaces: None,
            processor: None,
            capture_callback: None,
            status: EngineStatus::new(),
            capture_loop: None,
        }
    }

    /// エンジンを初期化する
    ///
    /// 設定を検証し、3サーフェスを固定サイズで確保した上で、
    /// 背面カメラ優先・音声無効の制約でストリーム取得を行う。
    /// 取得はエンジン唯一の待機境界であり、許可か拒否のどちらかで
    /// ちょうど一度だけ完了する。
    ///
    /// # Returns
    /// - `Ok(())`: 取得成功、エンジンはReady
    /// - `Err(EngineError::Configuration)`: 設定が不正
    /// - `Err(EngineError::MediaAcquisition)`: デバイス拒否・不在。
    ///   エラーはログに記録され、エンジンはFailedになる（ストリーム参照は
    ///   保持されない）。リトライには新しいinit呼び出しが必要。
    pub fn init(&mut self, config: EngineConfig) -> EngineResult<()> {
        if self.phase == EnginePhase::Running {
            return Err(EngineError::NotReady(
                "Cannot re-initialize while running; call stop() first".to_string(),
            ));
        }

        let EngineConfig {
            settings,
            output,
            processor,
            capture_callback,
        } = config;

        settings.validate()?;

        let capture_dims = settings.capture_dimensions();
        let proc_dims = settings.proc_dimensions();

        // サーフェスの確保（サイズはここで一度だけ決まる）
        // 出力サーフェスは呼び出し側から渡された場合も処理サイズに合わせる
        let capture = shared_surface(self.factory.create(capture_dims));
        let proc = shared_surface(self.factory.create(proc_dims));
        let output = match output {
            Some(mut surface) => {
                surface.resize(proc_dims);
                shared_surface(surface)
            }
            None => shared_surface(self.factory.create(proc_dims)),
        };

        self.surfaces = Some(EngineSurfaces {
            capture,
            proc,
            output,
        });
        self.processor = processor;
        self.capture_callback = capture_callback;
        self.stream = None;
        self.settings = Some(settings.clone());
        self.phase = EnginePhase::Requesting;

        // 再生ナッジ: 取得とは独立に、少し遅れて一度だけplayを送る
        let nudge_sink = Arc::clone(&self.sink);
        std::thread::spawn(move || {
            std::thread::sleep(PLAY_NUDGE_DELAY);
            nudge_sink.lock().unwrap().play();
        });

        let constraints =
            MediaConstraints::video_only(settings.capture_width, settings.capture_height);

        match self.source.open(&constraints) {
            Ok(stream) => {
                tracing::info!(
                    stream_id = stream.id,
                    dimensions = %stream.dimensions,
                    "Media stream acquired"
                );
                self.stream = Some(stream);
                self.phase = EnginePhase::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Media acquisition failed: {:?}", e);
                self.phase = EnginePhase::Failed;
                Err(e)
            }
        }
    }

    /// キャプチャループを開始する
    ///
    /// ストリームをシンクに接続し、シンクが再生可能を報告するまで
    /// ブロックする（タイムアウトなし・ワンショット）。その後、
    /// 設定された間隔のキャプチャループを専用スレッドで起動する。
    ///
    /// # Returns
    /// - `Ok(())`: ループ起動済み、エンジンはRunning
    /// - `Err(EngineError::NotReady)`: ストリーム未取得（init未実行または
    ///   失敗後）。呼び出し側のミスを示すエラーで、回復処理は行わない。
    pub fn start(&mut self) -> EngineResult<()> {
        let stream = self.stream.clone().ok_or_else(|| {
            EngineError::NotReady(
                "Cannot start without an acquired stream; init() must succeed first".to_string(),
            )
        })?;

        if self.phase != EnginePhase::Ready {
            return Err(EngineError::NotReady(format!(
                "start() requires Ready state, current: {:?}",
                self.phase
            )));
        }

        let settings = self
            .settings
            .clone()
            .ok_or_else(|| EngineError::NotReady("Engine settings missing".to_string()))?;
        let surfaces = self
            .surfaces
            .as_ref()
            .ok_or_else(|| EngineError::NotReady("Engine surfaces missing".to_string()))?;

        {
            let mut sink = self.sink.lock().unwrap();
            sink.attach(stream)?;
            // 再生可能になるまで待つ（ワンショット信号、検知後は監視しない）
            sink.wait_playable()?;
        }

        let interval = settings.capture_interval();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let sink = Arc::clone(&self.sink);
        let capture = Arc::clone(&surfaces.capture);
        let proc = Arc::clone(&surfaces.proc);
        let output = Arc::clone(&surfaces.output);
        let mut processor = self.processor.take();
        let mut callback = self.capture_callback.take();
        let status = self.status.clone();
        let mut stats = StatsCollector::new(settings.stats_interval());

        let handle = std::thread::spawn(move || {
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> msg => {
                        if msg.is_err() {
                            break;
                        }
                        run_tick(
                            &sink,
                            &capture,
                            &proc,
                            &output,
                            processor.as_deref_mut(),
                            callback.as_deref_mut(),
                            &status,
                            &mut stats,
                        );
                    }
                }
            }
        });

        self.capture_loop = Some(CaptureLoop { stop_tx, handle });
        self.status.set_running(true);
        self.phase = EnginePhase::Running;
        tracing::info!(interval_ms = interval.as_millis() as u64, "Capture loop started");
        Ok(())
    }

    /// キャプチャを停止する
    ///
    /// ループスレッドに停止を通知してjoinし、シンクのストリーム参照を
    /// 解除して出力サーフェスをクリアする。joinするため、stopが戻った
    /// 時点で以後のTickが実行されないことが保証される（実行中のTickも
    /// 完了を待つ）。
    ///
    /// start前の呼び出しはStoppedへの無害な遷移として扱う。
    /// 重複呼び出しは何もしない。
    pub fn stop(&mut self) {
        self.halt_loop();

        self.sink.lock().unwrap().detach();

        if let Some(surfaces) = &self.surfaces {
            surfaces.output.lock().unwrap().clear();
        }

        if self.phase != EnginePhase::Stopped {
            tracing::info!(ticks = self.status.ticks(), "Capture stopped");
        }
        self.phase = EnginePhase::Stopped;
    }

    /// 現在のライフサイクル状態
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// 共有ステータスのハンドルを取得（ロックフリー観測用）
    pub fn status(&self) -> EngineStatus {
        self.status.clone()
    }

    /// 出力サーフェスへのハンドル（init前はNone）
    pub fn output_surface(&self) -> Option<SharedSurface> {
        self.surfaces.as_ref().map(|s| Arc::clone(&s.output))
    }

    /// キャプチャサーフェスへのハンドル（init前はNone）
    pub fn capture_surface(&self) -> Option<SharedSurface> {
        self.surfaces.as_ref().map(|s| Arc::clone(&s.capture))
    }

    /// init時に適用された設定（init前はNone）
    pub fn settings(&self) -> Option<&EngineSettings> {
        self.settings.as_ref()
    }

    /// ループスレッドを停止してjoinする
    fn halt_loop(&mut self) {
        if let Some(capture_loop) = self.capture_loop.take() {
            // ループがすでに終了していればsendは失敗するが問題ない
            let _ = capture_loop.stop_tx.send(());
            let _ = capture_loop.handle.join();
        }
        self.status.set_running(false);
    }
}

impl<M, V> Drop for CamEngine<M, V>
where
    M: MediaSource,
    V: VideoSink + 'static,
{
    fn drop(&mut self) {
        self.halt_loop();
    }
}

/// 1Tick分のキャプチャ処理
///
/// 現在フレームをキャプチャ・処理の両サーフェスへ描画してピクセルを
/// 抽出し、プロセッサがあれば処理バッファを変換した上で、コールバック
/// 呼び出しと出力サーフェスへの書き込みを行う。
///
/// Tick本体はループスレッド上で直列に実行される。間隔より遅い
/// プロセッサは後続Tickの実行を遅らせるが、Tickの期限はtickチャネルが
/// 管理するため、遅延が解消すれば後続は予定の間隔で発火する
/// （溜まった期限は1件に合流する）。
#[allow(clippy::too_many_arguments)]
fn run_tick(
    sink: &Arc<Mutex<impl VideoSink>>,
    capture: &SharedSurface,
    proc: &SharedSurface,
    output: &SharedSurface,
    processor: Option<&mut (dyn FrameProcessor + 'static)>,
    callback: Option<&mut (dyn FnMut(&CapturePayload) + Send + 'static)>,
    status: &EngineStatus,
    stats: &mut StatsCollector,
) {
    let tick_start = Instant::now();

    let frame = {
        let mut sink = sink.lock().unwrap();
        match sink.current_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Skipping tick, no frame available: {:?}", e);
                return;
            }
        }
    };

    // キャプチャサーフェス: フル解像度で描画して抽出
    let draw_start = Instant::now();
    let capture_buffer = {
        let mut surface = capture.lock().unwrap();
        surface.draw_frame(&frame);
        surface.read_pixels()
    };

    // 処理サーフェス: 縮小解像度で独立に描画して抽出
    let mut proc_buffer = {
        let mut surface = proc.lock().unwrap();
        surface.draw_frame(&frame);
        surface.read_pixels()
    };
    stats.record_duration(StatKind::Draw, draw_start.elapsed());

    // プロセッサ実行（同期、このスレッド上）
    if let Some(processor) = processor {
        let process_start = Instant::now();
        proc_buffer = processor.process(proc_buffer);
        let elapsed = process_start.elapsed();
        stats.record_duration(StatKind::Process, elapsed);

        #[cfg(feature = "capture-timing")]
        tracing::debug!(elapsed_us = elapsed.as_micros() as u64, "Processor finished");
    }

    // コールバック呼び出し（出力書き込みより先、元実装と同順）
    if let Some(callback) = callback {
        let payload = CapturePayload::new(capture_buffer, Arc::clone(capture));
        callback(&payload);
    }

    // 出力サーフェスへ書き込み
    let output_start = Instant::now();
    {
        let mut surface = output.lock().unwrap();
        if let Err(e) = surface.write_pixels(&proc_buffer) {
            tracing::warn!("Output write failed: {:?}", e);
        }
    }
    stats.record_duration(StatKind::Output, output_start.elapsed());
    stats.record_duration(StatKind::EndToEnd, tick_start.elapsed());

    status.record_tick();
    stats.record_tick();
    if stats.should_report() {
        stats.report_and_reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Dimensions, EngineResult, PixelBuffer, RasterSurface, VideoFrame,
    };
    use std::sync::atomic::{AtomicU64, Ordering};

    // モック実装
    struct StubSurface {
        dims: Dimensions,
        pixels: PixelBuffer,
    }

    impl StubSurface {
        fn new(dims: Dimensions) -> Self {
            Self {
                dims,
                pixels: PixelBuffer::blank(dims),
            }
        }
    }

    impl RasterSurface for StubSurface {
        fn dimensions(&self) -> Dimensions {
            self.dims
        }

        fn resize(&mut self, dimensions: Dimensions) {
            self.dims = dimensions;
            self.pixels = PixelBuffer::blank(dimensions);
        }

        fn draw_frame(&mut self, frame: &VideoFrame) {
            // 最近傍でもなく、単にフレーム左上の色で塗る（エンジンの
            // 制御フロー検証にはこれで十分）
            let rgba = frame.pixels.pixel(0, 0).unwrap_or([0, 0, 0, 0]);
            self.pixels = PixelBuffer::filled(self.dims, rgba);
        }

        fn read_pixels(&self) -> PixelBuffer {
            self.pixels.clone()
        }

        fn write_pixels(&mut self, buffer: &PixelBuffer) -> EngineResult<()> {
            if buffer.dimensions() != self.dims {
                return Err(EngineError::Surface("dimension mismatch".to_string()));
            }
            self.pixels = buffer.clone();
            Ok(())
        }

        fn clear(&mut self) {
            self.pixels = PixelBuffer::blank(self.dims);
        }

        fn to_data_url(&self) -> EngineResult<String> {
            Ok("data:image/png;base64,stub".to_string())
        }
    }

    struct StubFactory;
    impl SurfaceFactory for StubFactory {
        fn create(&self, dimensions: Dimensions) -> Box<dyn RasterSurface + Send> {
            Box::new(StubSurface::new(dimensions))
        }
    }

    struct GrantingSource;
    impl MediaSource for GrantingSource {
        fn open(&mut self, constraints: &MediaConstraints) -> EngineResult<MediaStream> {
            Ok(MediaStream::new(
                1,
                Dimensions::new(constraints.width, constraints.height),
            ))
        }
    }

    struct DenyingSource;
    impl MediaSource for DenyingSource {
        fn open(&mut self, _constraints: &MediaConstraints) -> EngineResult<MediaStream> {
            Err(EngineError::MediaAcquisition("Permission denied".to_string()))
        }
    }

    struct StubSink {
        attached: Option<MediaStream>,
        frame_count: Arc<AtomicU64>,
    }

    impl StubSink {
        fn new() -> Self {
            Self {
                attached: None,
                frame_count: Arc::new(AtomicU64::new(0)),
            }
        }
    }

    impl VideoSink for StubSink {
        fn attach(&mut self, stream: MediaStream) -> EngineResult<()> {
            self.attached = Some(stream);
            Ok(())
        }

        fn detach(&mut self) {
            self.attached = None;
        }

        fn play(&mut self) {}

        fn wait_playable(&mut self) -> EngineResult<()> {
            if self.attached.is_none() {
                return Err(EngineError::Sink("no stream attached".to_string()));
            }
            Ok(())
        }

        fn current_frame(&mut self) -> EngineResult<VideoFrame> {
            let stream = self
                .attached
                .as_ref()
                .ok_or_else(|| EngineError::Sink("no stream attached".to_string()))?;
            let n = self.frame_count.fetch_add(1, Ordering::Relaxed);
            Ok(VideoFrame::new(PixelBuffer::filled(
                stream.dimensions,
                [n as u8, 0, 0, 255],
            )))
        }
    }

    fn engine_with<S: MediaSource>(source: S) -> CamEngine<S, StubSink> {
        CamEngine::new(source, StubSink::new(), StubFactory)
    }

    #[test]
    fn test_init_allocates_output_at_proc_dimensions() {
        let mut engine = engine_with(GrantingSource);
        engine.init(EngineConfig::default()).unwrap();

        assert_eq!(engine.phase(), EnginePhase::Ready);
        let output = engine.output_surface().unwrap();
        // 出力はキャプチャ解像度(640x480)ではなく処理解像度(64x48)
        assert_eq!(output.lock().unwrap().dimensions(), Dimensions::new(64, 48));
        let capture = engine.capture_surface().unwrap();
        assert_eq!(
            capture.lock().unwrap().dimensions(),
            Dimensions::new(640, 480)
        );
    }

    #[test]
    fn test_init_resizes_caller_supplied_output() {
        let mut engine = engine_with(GrantingSource);
        let supplied = Box::new(StubSurface::new(Dimensions::new(999, 999)));
        engine
            .init(EngineConfig::default().with_output(supplied))
            .unwrap();

        let output = engine.output_surface().unwrap();
        assert_eq!(output.lock().unwrap().dimensions(), Dimensions::new(64, 48));
    }

    #[test]
    fn test_init_rejects_invalid_settings() {
        let mut engine = engine_with(GrantingSource);
        let settings = EngineSettings {
            capture_interval_ms: 0,
            ..Default::default()
        };
        let result = engine.init(EngineConfig::new(settings));
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_init_denied_transitions_to_failed() {
        let mut engine = engine_with(DenyingSource);
        let result = engine.init(EngineConfig::default());

        assert!(matches!(result, Err(EngineError::MediaAcquisition(_))));
        assert_eq!(engine.phase(), EnginePhase::Failed);

        // 失敗後のstartは呼び出しミスとしてエラー
        assert!(matches!(engine.start(), Err(EngineError::NotReady(_))));
    }

    #[test]
    fn test_start_before_init_errors() {
        let mut engine = engine_with(GrantingSource);
        assert!(matches!(engine.start(), Err(EngineError::NotReady(_))));
        assert_eq!(engine.phase(), EnginePhase::Uninitialized);
    }

    #[test]
    fn test_start_twice_errors() {
        let mut engine = engine_with(GrantingSource);
        engine.init(EngineConfig::default()).unwrap();
        engine.start().unwrap();

        assert!(matches!(engine.start(), Err(EngineError::NotReady(_))));

        engine.stop();
    }

    #[test]
    fn test_stop_before_start_is_noop_transition() {
        let mut engine = engine_with(GrantingSource);
        engine.stop();
        assert_eq!(engine.phase(), EnginePhase::Stopped);

        // 重複stopも無害
        engine.stop();
        assert_eq!(engine.phase(), EnginePhase::Stopped);
    }

    #[test]
    fn test_capture_loop_ticks_and_stops() {
        let settings = EngineSettings {
            capture_interval_ms: 20,
            ..Default::default()
        };
        let mut engine = engine_with(GrantingSource);
        engine.init(EngineConfig::new(settings)).unwrap();
        engine.start().unwrap();
        assert_eq!(engine.phase(), EnginePhase::Running);
        assert!(engine.status().is_running());

        std::thread::sleep(Duration::from_millis(110));
        engine.stop();

        let ticks = engine.status().ticks();
        assert!(ticks >= 3, "Expected at least 3 ticks, got {}", ticks);
        assert!(!engine.status().is_running());
        assert_eq!(engine.phase(), EnginePhase::Stopped);

        // stop後はTickが増えない
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(engine.status().ticks(), ticks);
    }

    #[test]
    fn test_stop_clears_output_surface() {
        let settings = EngineSettings {
            capture_interval_ms: 10,
            ..Default::default()
        };
        let mut engine = engine_with(GrantingSource);
        engine.init(EngineConfig::new(settings)).unwrap();
        engine.start().unwrap();

        std::thread::sleep(Duration::from_millis(50));
        engine.stop();

        let output = engine.output_surface().unwrap();
        let pixels = output.lock().unwrap().read_pixels();
        assert!(pixels.data().iter().all(|&b| b == 0));
    }
}
