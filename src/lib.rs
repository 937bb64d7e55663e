//! camengine - Library
//!
//! カメラストリームを固定間隔でサンプリングし、フル解像度の
//! キャプチャバッファと縮小解像度の処理バッファに取り込み、
//! 任意の変換を通して出力サーフェスへ描画するキャプチャエンジン。

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use application::engine::CamEngine;
pub use domain::{EngineConfig, EngineError, EngineResult, EngineSettings};
