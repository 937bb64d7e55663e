//! Infrastructure層: 外部技術の統合
//!
//! Domain層のtraitを実装し、外部ライブラリ（image/base64）と接続する。

pub mod memory_surface;
pub mod processors;
pub mod test_pattern;
