//! Application Layer
//!
//! キャプチャエンジンのライフサイクル制御と統計管理を実装します。
//!
//! ## モジュール構成
//! - `engine`: キャプチャエンジン（init/start/stop、固定間隔ループ）
//! - `runtime_state`: ループ状態のロックフリー共有ハンドル
//! - `stats`: 統計情報管理（キャプチャレート、段階別レイテンシ）

pub mod engine;
pub mod runtime_state;
pub mod stats;
