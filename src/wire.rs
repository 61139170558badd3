//! スキーマなしで protobuf のワイヤーフォーマットを読むためのモジュール
use crate::{Error, ErrorKind, Result};

/// varint の最大バイト数
pub const MAX_VARINT_SIZE: usize = 10;

/// protobuf のワイヤータイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    StartGroup,
    EndGroup,
    Fixed32,
}

impl WireType {
    /// タグの下位 3 bit からワイヤータイプを判定する
    pub const fn from_tag(tag: u64) -> Option<Self> {
        match tag & 0b111 {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            3 => Some(Self::StartGroup),
            4 => Some(Self::EndGroup),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }
}

/// `buf` の先頭から base-128 の可変長整数をデコードする
///
/// 成功時にはデコードされた値と消費したバイト数を返す。
/// [`MAX_VARINT_SIZE`] バイト以内に終端が見つからない場合には [`None`] が返される。
pub fn decode_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &b) in buf.iter().take(MAX_VARINT_SIZE).enumerate() {
        value |= ((b & 0x7f) as u64) << (7 * i);
        if b < 0x80 {
            return Some((value, i + 1));
        }
    }
    None
}

/// フィールドの値
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed64([u8; 8]),
    LengthDelimited(&'a [u8]),
    Fixed32([u8; 4]),
}

impl FieldValue<'_> {
    /// varint を protobuf の `int64` として（2 の補数で）解釈した値を返す
    pub const fn varint_as_i64(value: u64) -> i64 {
        value as i64
    }
}

/// デコードされた一つのフィールド
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field<'a> {
    /// フィールド番号
    pub number: u64,

    /// フィールドの値
    pub value: FieldValue<'a>,
}

/// メッセージのバイト列からフィールドを順に取り出すイテレーター
///
/// 不正なバイト列に到達した場合には、そのエラーを一度だけ返して以降は [`None`] を返す
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> FieldReader<'a> {
    /// [`FieldReader`] インスタンスを生成する
    pub const fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }

    /// 読み込み済みのバイト数を返す
    pub const fn position(&self) -> usize {
        self.offset
    }

    fn read_varint(&mut self) -> Result<u64> {
        let (value, size) = decode_varint(&self.buf[self.offset..])
            .ok_or_else(|| malformed("Unterminated varint"))?;
        self.offset += size;
        Ok(value)
    }

    fn read_bytes(&mut self, len: u64) -> Result<&'a [u8]> {
        let remaining = (self.buf.len() - self.offset) as u64;
        if len > remaining {
            return Err(malformed(format!(
                "Field length {len} exceeds the remaining {remaining} bytes"
            )));
        }
        let bytes = &self.buf[self.offset..self.offset + len as usize];
        self.offset += len as usize;
        Ok(bytes)
    }

    fn read_field(&mut self) -> Result<Field<'a>> {
        let tag = self.read_varint()?;
        let number = tag >> 3;
        let value = match WireType::from_tag(tag) {
            Some(WireType::Varint) => FieldValue::Varint(self.read_varint()?),
            Some(WireType::Fixed64) => {
                let mut bytes = [0; 8];
                bytes.copy_from_slice(self.read_bytes(8)?);
                FieldValue::Fixed64(bytes)
            }
            Some(WireType::LengthDelimited) => {
                let len = self.read_varint()?;
                FieldValue::LengthDelimited(self.read_bytes(len)?)
            }
            Some(WireType::Fixed32) => {
                let mut bytes = [0; 4];
                bytes.copy_from_slice(self.read_bytes(4)?);
                FieldValue::Fixed32(bytes)
            }
            wire_type => {
                return Err(malformed(format!(
                    "Unsupported wire type {wire_type:?} (tag={tag})"
                )));
            }
        };
        Ok(Field { number, value })
    }
}

impl<'a> Iterator for FieldReader<'a> {
    type Item = Result<Field<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }
        let result = self.read_field();
        self.failed = result.is_err();
        Some(result)
    }
}

#[track_caller]
fn malformed<T: Into<String>>(reason: T) -> Error {
    Error::with_reason(ErrorKind::InvalidData, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint() {
        assert_eq!(decode_varint(&[0x01]), Some((1, 1)));
        assert_eq!(decode_varint(&[0xac, 0x02]), Some((300, 2)));
        assert_eq!(decode_varint(&[0x80, 0x80]), None);
        assert_eq!(decode_varint(&[0xff; 11]), None);

        let minus_one = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        let (v, size) = decode_varint(&minus_one).unwrap();
        assert_eq!(size, 10);
        assert_eq!(FieldValue::varint_as_i64(v), -1);
    }

    #[test]
    fn reader_stops_after_error() {
        // field 1 varint 150, field 2 length-delimited with a length past the end
        let buf = [0x08, 0x96, 0x01, 0x12, 0x05, 0x61];
        let mut reader = FieldReader::new(&buf);
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(first.value, FieldValue::Varint(150));
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
        assert_eq!(reader.position(), 5);
    }
}
