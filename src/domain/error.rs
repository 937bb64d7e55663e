/// エラー型定義
///
/// Domain層の統一エラー型。thiserrorを使用して型安全なエラー処理を提供します。
///
/// # 設計方針
/// - unwrap()の使用を禁止し、明示的なエラーハンドリングを強制
/// - Result型でエラー伝播を明示化
/// - 取得失敗（MediaAcquisition）と呼び出しミス（NotReady）を型で区別

use thiserror::Error;

/// エンジンの統一エラー型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 設定関連のエラー
    ///
    /// サイズ0や間隔0など、initに渡された設定が不正な場合。
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// メディア取得エラー
    ///
    /// デバイスの拒否・不在。取得境界でログに記録され、
    /// initの戻り値として一度だけ報告される。リトライは行わない。
    #[error("Media acquisition failed: {0}")]
    MediaAcquisition(String),

    /// ストリーム未取得での操作
    ///
    /// init成功前のstart()呼び出しなど、呼び出し側のミスを示す。
    /// 回復可能な実行時条件ではない。
    #[error("Engine not ready: {0}")]
    NotReady(String),

    /// サーフェス関連のエラー
    #[error("Surface error: {0}")]
    Surface(String),

    /// シンク関連のエラー
    #[error("Sink error: {0}")]
    Sink(String),

    /// 画像エンコード関連のエラー
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// エンジンの統一Result型
pub type EngineResult<T> = Result<T, EngineError>;
