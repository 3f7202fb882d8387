//! RemoteMethod trait - 型付きリモートメソッドの契約
//!
//! # 学習ポイント
//! - Associated Types (`type Input`, `type Output`)
//! - 契約は「値」: 同じ型の契約でも name の違う複数インスタンスを作れる

use super::codec::CodecError;

/// RemoteMethod は method 名と入出力のシリアライズ方法を定義する
///
/// # 使用例
/// ```ignore
/// struct Reschedule;
///
/// impl RemoteMethod for Reschedule {
///     type Input = RescheduleRequest;
///     type Output = RescheduleResponse;
///
///     fn name(&self) -> &str { "Reschedule" }
///     fn serialize_output(&self, output: &RescheduleResponse) -> Result<Vec<u8>, CodecError> { ... }
///     fn deserialize_input(&self, data: &[u8]) -> Result<RescheduleRequest, CodecError> { ... }
/// }
/// ```
///
/// # 命名
/// - name は state machine 型ごとに一意（登録時に検査）
/// - name はワイヤ上・永続化データ上のキーなので、変更は破壊的変更
///   → 契約を変えるときは新しい name で登録する
///
/// # シリアライズ
/// - 入力のデコードと出力のエンコードは独立（互いの逆関数である必要はない）
/// - `CodecError` はペイロードの不整合を意味し、一時的なエラーとして扱わない
pub trait RemoteMethod: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &str;

    fn serialize_output(&self, output: &Self::Output) -> Result<Vec<u8>, CodecError>;

    fn deserialize_input(&self, data: &[u8]) -> Result<Self::Input, CodecError>;
}
