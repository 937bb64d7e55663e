//! 設定管理
//!
//! TOML設定ファイルの読み込みと、init時にエンジンへ渡す実行時設定。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::ports::{FrameProcessor, RasterSurface};
use crate::domain::types::{CapturePayload, Dimensions};

/// キャプチャコールバック
///
/// Tickごとに1回、キャプチャペイロードを受け取る。
pub type CaptureCallback = Box<dyn FnMut(&CapturePayload) + Send>;

/// エンジン設定（シリアライズ可能な部分）
///
/// 省略されたフィールドにはデフォルト値が適用される。
/// サイズと間隔はinit後に変更されることはない。
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EngineSettings {
    /// キャプチャ画像の幅（ピクセル）
    ///
    /// デフォルト: 640
    #[serde(default = "EngineSettings::default_capture_width")]
    pub capture_width: u32,

    /// キャプチャ画像の高さ（ピクセル）
    ///
    /// デフォルト: 480
    #[serde(default = "EngineSettings::default_capture_height")]
    pub capture_height: u32,

    /// 処理画像の幅（ピクセル）
    ///
    /// 出力サーフェスは常にこの幅になる
    /// デフォルト: 64
    #[serde(default = "EngineSettings::default_proc_width")]
    pub proc_width: u32,

    /// 処理画像の高さ（ピクセル）
    ///
    /// 出力サーフェスは常にこの高さになる
    /// デフォルト: 48
    #[serde(default = "EngineSettings::default_proc_height")]
    pub proc_height: u32,

    /// キャプチャ間隔（ミリ秒）
    ///
    /// デフォルト: 100ms
    #[serde(default = "EngineSettings::default_capture_interval_ms")]
    pub capture_interval_ms: u64,

    /// フレームごとの処理を実行するか（情報提供用）
    ///
    /// エンジンはこのフラグを参照しない。処理を実際に有効化するのは
    /// `EngineConfig::with_processor` によるプロセッサの注入で、
    /// 有効状態は `EngineConfig::processing_enabled` が返す。
    /// デフォルト: false
    #[serde(default)]
    pub do_process: bool,

    /// 統計情報の出力間隔（秒）
    ///
    /// デフォルト: 10秒
    #[serde(default = "EngineSettings::default_stats_interval_sec")]
    pub stats_interval_sec: u64,
}

impl EngineSettings {
    /// デフォルトのキャプチャ幅
    pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
    /// デフォルトのキャプチャ高さ
    pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;
    /// デフォルトの処理幅
    pub const DEFAULT_PROC_WIDTH: u32 = 64;
    /// デフォルトの処理高さ
    pub const DEFAULT_PROC_HEIGHT: u32 = 48;
    /// デフォルトのキャプチャ間隔（ミリ秒）
    pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 100;
    /// デフォルトの統計出力間隔（秒）
    pub const DEFAULT_STATS_INTERVAL_SEC: u64 = 10;

    fn default_capture_width() -> u32 {
        Self::DEFAULT_CAPTURE_WIDTH
    }
    fn default_capture_height() -> u32 {
        Self::DEFAULT_CAPTURE_HEIGHT
    }
    fn default_proc_width() -> u32 {
        Self::DEFAULT_PROC_WIDTH
    }
    fn default_proc_height() -> u32 {
        Self::DEFAULT_PROC_HEIGHT
    }
    fn default_capture_interval_ms() -> u64 {
        Self::DEFAULT_CAPTURE_INTERVAL_MS
    }
    fn default_stats_interval_sec() -> u64 {
        Self::DEFAULT_STATS_INTERVAL_SEC
    }

    /// キャプチャサーフェスのサイズ
    pub fn capture_dimensions(&self) -> Dimensions {
        Dimensions::new(self.capture_width, self.capture_height)
    }

    /// 処理サーフェスのサイズ（出力サーフェスも同じ）
    pub fn proc_dimensions(&self) -> Dimensions {
        Dimensions::new(self.proc_width, self.proc_height)
    }

    /// キャプチャ間隔
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    /// 統計出力間隔
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_sec)
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> EngineResult<()> {
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(EngineError::Configuration(
                "Capture width and height must be greater than 0".to_string(),
            ));
        }
        if self.proc_width == 0 || self.proc_height == 0 {
            return Err(EngineError::Configuration(
                "Processing width and height must be greater than 0".to_string(),
            ));
        }
        if self.capture_interval_ms == 0 {
            return Err(EngineError::Configuration(
                "Capture interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            capture_width: Self::DEFAULT_CAPTURE_WIDTH,
            capture_height: Self::DEFAULT_CAPTURE_HEIGHT,
            proc_width: Self::DEFAULT_PROC_WIDTH,
            proc_height: Self::DEFAULT_PROC_HEIGHT,
            capture_interval_ms: Self::DEFAULT_CAPTURE_INTERVAL_MS,
            do_process: false,
            stats_interval_sec: Self::DEFAULT_STATS_INTERVAL_SEC,
        }
    }
}

/// エンジンの実行時設定
///
/// シリアライズ可能な `EngineSettings` に加えて、呼び出し側が注入する
/// 出力サーフェス・プロセッサ・キャプチャコールバックのスロットを持つ。
#[derive(Default)]
pub struct EngineConfig {
    /// 基本設定
    pub settings: EngineSettings,
    /// 呼び出し側が観測する出力サーフェス（省略時はファクトリが生成）
    pub output: Option<Box<dyn RasterSurface + Send>>,
    /// フレームプロセッサ（与えられた場合、処理は自動的に有効）
    pub processor: Option<Box<dyn FrameProcessor>>,
    /// キャプチャコールバック
    pub capture_callback: Option<CaptureCallback>,
}

impl EngineConfig {
    /// デフォルト設定から作成
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            output: None,
            processor: None,
            capture_callback: None,
        }
    }

    /// 出力サーフェスを指定する
    pub fn with_output(mut self, output: Box<dyn RasterSurface + Send>) -> Self {
        self.output = Some(output);
        self
    }

    /// プロセッサを指定する（処理が有効になる）
    pub fn with_processor(mut self, processor: Box<dyn FrameProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// キャプチャコールバックを指定する
    pub fn with_capture_callback(mut self, callback: CaptureCallback) -> Self {
        self.capture_callback = Some(callback);
        self
    }

    /// フレーム処理を実行するか
    ///
    /// プロセッサが与えられていれば常にtrue。
    pub fn processing_enabled(&self) -> bool {
        self.processor.is_some()
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("settings", &self.settings)
            .field("has_output", &self.output.is_some())
            .field("has_processor", &self.processor.is_some())
            .field("has_capture_callback", &self.capture_callback.is_some())
            .finish()
    }
}

/// デモバイナリで使うプロセッサの種別
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// 処理なし（ダウンスケールのみ）
    #[default]
    None,
    /// グレースケール変換
    Grayscale,
    /// 色反転
    Invert,
}

/// デモ実行設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DemoConfig {
    /// 実行時間（ミリ秒）
    pub duration_ms: u64,

    /// 使用するプロセッサ
    ///
    /// 選択肢: "none", "grayscale", "invert"
    #[serde(default)]
    pub processor: ProcessorKind,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            duration_ms: 3000,
            processor: ProcessorKind::None,
        }
    }
}

impl DemoConfig {
    /// デモの実行時間
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// ログレベル（"info", "debug", "trace"等）
    pub level: String,

    /// JSON形式で出力するか
    pub json_format: bool,

    /// ログファイル出力先ディレクトリ（省略時は標準出力）
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            log_dir: None,
        }
    }
}

/// アプリケーション設定のルート構造
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// エンジン設定
    #[serde(default)]
    pub engine: EngineSettings,
    /// ログ設定
    #[serde(default)]
    pub logging: LoggingConfig,
    /// デモ実行設定
    #[serde(default)]
    pub demo: DemoConfig,
}

impl AppConfig {
    /// TOMLファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Configuration(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| EngineError::Configuration(format!("Failed to parse config file: {}", e)))
    }

    /// デフォルト設定をTOMLファイルに書き出す
    pub fn write_default<P: AsRef<Path>>(path: P) -> EngineResult<()> {
        let config = Self::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| EngineError::Configuration(format!("Failed to write config file: {}", e)))
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> EngineResult<()> {
        self.engine.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_match_contract() {
        let settings = EngineSettings::default();
        assert_eq!(settings.capture_width, 640);
        assert_eq!(settings.capture_height, 480);
        assert_eq!(settings.proc_width, 64);
        assert_eq!(settings.proc_height, 48);
        assert_eq!(settings.capture_interval_ms, 100);
        assert!(!settings.do_process);
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = EngineSettings::default();
        assert!(settings.validate().is_ok());

        // 不正なキャプチャサイズ
        settings.capture_width = 0;
        assert!(matches!(
            settings.validate(),
            Err(EngineError::Configuration(_))
        ));

        settings.capture_width = 640;

        // 不正な間隔
        settings.capture_interval_ms = 0;
        assert!(matches!(
            settings.validate(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_settings_omitted_fields_get_defaults() {
        // 一部フィールドのみ指定したTOML
        let toml = r#"
            proc_width = 32
            proc_height = 24
        "#;
        let settings: EngineSettings = toml::from_str(toml).unwrap();
        assert_eq!(settings.proc_width, 32);
        assert_eq!(settings.proc_height, 24);
        // 省略分はデフォルト
        assert_eq!(settings.capture_width, 640);
        assert_eq!(settings.capture_interval_ms, 100);
    }

    #[test]
    fn test_proc_dimensions_drive_output() {
        let settings = EngineSettings {
            proc_width: 80,
            proc_height: 60,
            ..Default::default()
        };
        assert_eq!(settings.proc_dimensions(), Dimensions::new(80, 60));
        assert_eq!(settings.capture_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_engine_config_processing_enabled() {
        let config = EngineConfig::default();
        assert!(!config.processing_enabled());

        // do_processフラグ単体では処理は有効にならない（情報提供用）
        let flagged = EngineConfig::new(EngineSettings {
            do_process: true,
            ..Default::default()
        });
        assert!(!flagged.processing_enabled());

        let config = EngineConfig::default()
            .with_processor(Box::new(|buffer: crate::domain::PixelBuffer| buffer));
        assert!(config.processing_enabled());
    }

    #[test]
    fn test_processor_kind_parsing() {
        let demo: DemoConfig = toml::from_str(
            r#"
            duration_ms = 500
            processor = "grayscale"
        "#,
        )
        .unwrap();
        assert_eq!(demo.processor, ProcessorKind::Grayscale);
        assert_eq!(demo.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_config_loads() {
        // config.tomlが正常に読み込めることを確認
        let config = AppConfig::from_file("config.toml").expect("config.tomlが読み込めません");

        config
            .validate()
            .expect("設定値のバリデーションに失敗しました");

        assert!(
            config.engine.capture_interval_ms > 0,
            "capture_interval_msは0より大きい必要があります"
        );
        assert!(
            config.engine.proc_width > 0,
            "処理幅は0より大きい必要があります"
        );
    }

    #[test]
    fn test_config_example_loads() {
        // config.toml.exampleが正常に読み込めることを確認
        let config = AppConfig::from_file("config.toml.example")
            .expect("config.toml.exampleが読み込めません");

        config
            .validate()
            .expect("設定値のバリデーションに失敗しました");
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        AppConfig::write_default(&path).unwrap();
        let loaded = AppConfig::from_file(&path).unwrap();

        assert_eq!(loaded.engine.capture_width, 640);
        assert_eq!(loaded.demo.duration_ms, 3000);
    }
}
