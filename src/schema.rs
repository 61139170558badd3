//! スキーマを推測しながら protobuf のペイロードを入れ子のキーバリュー構造にデコードするためのモジュール
use crate::wire::{FieldReader, FieldValue};

/// 入れ子メッセージとしての解釈を試みる最大の深さ
const MAX_NESTING_DEPTH: usize = 32;

/// 数値の葉
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// スキーマ推測デコーダーが返す値
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 数値
    Number(Number),

    /// 文字列
    Text(String),

    /// キーと値の組の並び（キーの初出順）
    Mapping(Vec<(String, Value)>),

    /// 値の並び
    Sequence(Vec<Value>),
}

impl Value {
    /// 葉の値を数値として解釈する
    ///
    /// 数値として解釈できる文字列は、整数なら [`Number::Int`] に、それ以外なら [`Number::Float`] になる
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Number::Int)
                    .or_else(|_| s.parse::<f64>().map(Number::Float))
                    .ok()
            }
            Value::Mapping(_) | Value::Sequence(_) => None,
        }
    }

    /// 子要素の値を順に返す
    ///
    /// 葉の値の場合には空のイテレーターを返す
    pub fn children(&self) -> Box<dyn '_ + Iterator<Item = &Value>> {
        match self {
            Value::Mapping(entries) => Box::new(entries.iter().map(|(_, v)| v)),
            Value::Sequence(items) => Box::new(items.iter()),
            Value::Number(_) | Value::Text(_) => Box::new(core::iter::empty()),
        }
    }
}

/// スキーマなしでペイロードの構造を推測するデコーダーを表すトレイト
///
/// デコードに失敗した、あるいは何も得られなかった場合には [`None`] を返す
pub trait SchemaGuesser {
    /// ペイロードをデコードする
    fn guess(&self, payload: &[u8]) -> Option<Value>;
}

/// 組み込みのスキーマ推測デコーダー
///
/// 各ワイヤータイプを次のように解釈する:
/// - varint: 2 の補数の 64 bit 整数
/// - 64 bit 固定長: リトルエンディアンの倍精度浮動小数点数
/// - 32 bit 固定長: リトルエンディアンの単精度浮動小数点数
/// - 長さ付き: 全体がメッセージとして読めれば入れ子の [`Value::Mapping`]、
///   そうでなければ UTF-8 文字列、それも無理なら `0x` で始まる 16 進文字列
///
/// フィールド番号がキーとなり、同じフィールドが繰り返し現れた場合には一つの [`Value::Sequence`] にまとめられる。
#[derive(Debug, Default, Clone, Copy)]
pub struct BlindDecoder;

impl BlindDecoder {
    fn decode_message(buf: &[u8], depth: usize) -> Option<Vec<(String, Value)>> {
        let mut entries: Vec<(String, Value)> = Vec::new();
        for field in FieldReader::new(buf) {
            let field = field.ok()?;
            if field.number == 0 {
                return None;
            }

            let value = match field.value {
                FieldValue::Varint(v) => Value::Number(Number::Int(FieldValue::varint_as_i64(v))),
                FieldValue::Fixed64(b) => Value::Number(Number::Float(f64::from_le_bytes(b))),
                FieldValue::Fixed32(b) => Value::Number(Number::Float(f32::from_le_bytes(b) as f64)),
                FieldValue::LengthDelimited(bytes) => Self::decode_bytes(bytes, depth),
            };

            let key = field.number.to_string();
            match entries.iter_mut().find(|entry| entry.0 == key) {
                Some((_, Value::Sequence(items))) => items.push(value),
                Some((_, existing)) => {
                    let first = core::mem::replace(existing, Value::Sequence(Vec::new()));
                    *existing = Value::Sequence(vec![first, value]);
                }
                None => entries.push((key, value)),
            }
        }
        Some(entries)
    }

    fn decode_bytes(bytes: &[u8], depth: usize) -> Value {
        if !bytes.is_empty()
            && depth < MAX_NESTING_DEPTH
            && let Some(entries) = Self::decode_message(bytes, depth + 1)
        {
            return Value::Mapping(entries);
        }
        match core::str::from_utf8(bytes) {
            Ok(s) => Value::Text(s.to_owned()),
            Err(_) => {
                let mut hex = String::with_capacity(2 + bytes.len() * 2);
                hex.push_str("0x");
                for b in bytes {
                    hex.push_str(&format!("{b:02x}"));
                }
                Value::Text(hex)
            }
        }
    }
}

impl SchemaGuesser for BlindDecoder {
    fn guess(&self, payload: &[u8]) -> Option<Value> {
        if payload.is_empty() {
            return None;
        }
        Self::decode_message(payload, 0).map(Value::Mapping)
    }
}
