/// Port定義（Clean Architectureのインターフェース）
///
/// Domain層が外部実装に依存するための抽象trait。
/// Infrastructure層がこれらを実装し、Application層がDIで注入する。

use std::sync::{Arc, Mutex};

use crate::domain::{Dimensions, EngineResult, MediaConstraints, MediaStream, PixelBuffer, VideoFrame};

/// スレッド間で共有されるサーフェスハンドル
pub type SharedSurface = Arc<Mutex<Box<dyn RasterSurface + Send>>>;

/// サーフェスをBoxから共有ハンドルに変換するヘルパー
pub fn shared_surface(surface: Box<dyn RasterSurface + Send>) -> SharedSurface {
    Arc::new(Mutex::new(surface))
}

/// ラスタサーフェスポート: 2D描画面を抽象化
///
/// キャプチャ・処理・出力の3サーフェスすべてがこのtraitを通して扱われる。
/// サイズは設定時に一度だけ決まり、以後 `resize` が呼ばれることはない。
pub trait RasterSurface: Send {
    /// サーフェスの現在サイズ
    fn dimensions(&self) -> Dimensions;

    /// サーフェスのサイズを変更する
    ///
    /// init時の初期サイズ設定にのみ使用される。
    fn resize(&mut self, dimensions: Dimensions);

    /// フレームをサーフェスのサイズにスケーリングして描画する
    fn draw_frame(&mut self, frame: &VideoFrame);

    /// サーフェス全体のピクセルバッファを取り出す
    fn read_pixels(&self) -> PixelBuffer;

    /// ピクセルバッファをサーフェスに書き込む
    ///
    /// # Returns
    /// - `Err(EngineError::Surface)`: バッファサイズがサーフェスと不一致
    fn write_pixels(&mut self, buffer: &PixelBuffer) -> EngineResult<()>;

    /// サーフェスを空（透明黒）にクリアする
    fn clear(&mut self);

    /// サーフェス内容をPNGデータURLにエンコードする
    fn to_data_url(&self) -> EngineResult<String>;
}

/// サーフェスファクトリ: エンジン内部サーフェスの生成を抽象化
pub trait SurfaceFactory: Send {
    /// 指定サイズのサーフェスを作成する
    fn create(&self, dimensions: Dimensions) -> Box<dyn RasterSurface + Send>;
}

/// メディアソースポート: カメラストリームの取得を抽象化
///
/// openはエンジン唯一の取得境界であり、許可または拒否で一度だけ完了する。
/// 要求した取得をキャンセルする手段はない。
pub trait MediaSource: Send {
    /// 制約を指定してストリームを取得する
    ///
    /// # Returns
    /// - `Ok(MediaStream)`: 取得成功（許可）
    /// - `Err(EngineError::MediaAcquisition)`: 拒否またはデバイス不在
    fn open(&mut self, constraints: &MediaConstraints) -> EngineResult<MediaStream>;
}

/// 映像シンクポート: ストリームの再生先を抽象化
pub trait VideoSink: Send {
    /// ストリームをシンクに接続する
    fn attach(&mut self, stream: MediaStream) -> EngineResult<()>;

    /// ストリーム参照を解除する
    fn detach(&mut self);

    /// 再生を促す
    ///
    /// 一部モバイル環境のフリーズ回避のため、init直後に非同期で
    /// 一度だけ呼ばれる。接続状態に関わらず失敗しないこと。
    fn play(&mut self);

    /// 再生可能になるまでブロックする（ワンショット）
    ///
    /// タイムアウトは設けない。シンクが再生可能を報告しない場合、
    /// エンジンはReadyのまま待ち続ける（仕様上許容された制限）。
    fn wait_playable(&mut self) -> EngineResult<()>;

    /// 現在のフレームを取得する
    ///
    /// # Returns
    /// - `Err(EngineError::Sink)`: ストリーム未接続など
    fn current_frame(&mut self) -> EngineResult<VideoFrame>;
}

/// フレームプロセッサ: 処理解像度バッファの同期変換
///
/// Tickのたびに処理サーフェスから取り出したバッファが渡され、
/// 戻り値がそのまま出力サーフェスへ書き込まれる。
/// 呼び出しスレッド上で同期実行される（サスペンドなし）。
pub trait FrameProcessor: Send {
    /// バッファを変換する
    fn process(&mut self, buffer: PixelBuffer) -> PixelBuffer;
}

/// クロージャをそのままプロセッサとして使えるようにする
impl<F> FrameProcessor for F
where
    F: FnMut(PixelBuffer) -> PixelBuffer + Send,
{
    fn process(&mut self, buffer: PixelBuffer) -> PixelBuffer {
        self(buffer)
    }
}
