//! MP4 ファイルの中からトップレベルのボックスを探し出すためのモジュール
use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use crate::{BoxHeader, BoxRange, BoxType, Decode, Error, ErrorKind, Result};

/// ファイル先頭から読み込むバイト数のデフォルト値
pub const DEFAULT_HEAD_READ_LIMIT: u64 = 100 * 1024 * 1024;

/// ファイル末尾から読み込むバイト数のデフォルト値
pub const DEFAULT_TAIL_READ_LIMIT: u64 = 50 * 1024 * 1024;

/// トップレベルのボックスヘッダーを辿る際の上限数
const MAX_TOP_LEVEL_BOXES: usize = 1 << 16;

/// MP4 ファイルからボックスを探して読み込むための構造体
///
/// 数 GB の `mdat` ボックスの後ろに `moov` ボックスが置かれているような大きなファイルにも対応するため、
/// ボックスの探索は次の順番で行われる:
///
/// 1. ファイル先頭からトップレベルのボックスヘッダーを順に辿る
/// 2. ファイル先頭の一定範囲を読み込み、その中で `[サイズ][種別]` のバイト列パターンを探す
/// 3. 探しているのが `moov` で、ファイルが先頭の読み込み範囲より大きい場合には、
///    ファイル末尾の一定範囲を読み込んで同様にパターンを探す
#[derive(Debug)]
pub struct BoxReader<R> {
    inner: R,
    file_size: u64,
    head_read_limit: u64,
    tail_read_limit: u64,
}

impl BoxReader<BufReader<File>> {
    /// 指定されたパスのファイルを開く
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(open_file(path)?)
    }
}

/// ファイルを開く（エラーメッセージにはパスが含まれる）
pub(crate) fn open_file<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
    let path = path.as_ref();
    File::open(path).map(BufReader::new).map_err(|e| {
        Error::with_reason(ErrorKind::Io, format!("Cannot open '{}': {e}", path.display()))
    })
}

impl<R: Read + Seek> BoxReader<R> {
    /// [`BoxReader`] インスタンスを生成する
    pub fn new(mut inner: R) -> Result<Self> {
        let file_size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            file_size,
            head_read_limit: DEFAULT_HEAD_READ_LIMIT,
            tail_read_limit: DEFAULT_TAIL_READ_LIMIT,
        })
    }

    /// パターン探索時にファイルの先頭および末尾から読み込むバイト数の上限を指定する
    pub fn with_read_limits(mut self, head_read_limit: u64, tail_read_limit: u64) -> Result<Self> {
        if head_read_limit == 0 || tail_read_limit == 0 {
            return Err(Error::invalid_input(format!(
                "Read limits must be non-zero: head={head_read_limit}, tail={tail_read_limit}"
            )));
        }
        self.head_read_limit = head_read_limit;
        self.tail_read_limit = tail_read_limit;
        Ok(self)
    }

    /// ファイルのサイズを返す
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// 指定された種別のボックスを探して、そのペイロードの位置を返す
    ///
    /// 見つからなかった場合には [`None`] が返される
    pub fn locate(&mut self, box_type: BoxType) -> Result<Option<BoxRange>> {
        if let Some(found) = self.walk_top_level(box_type)? {
            tracing::debug!(%box_type, offset = found.payload_offset, "box found by header walk");
            return Ok(Some(found));
        }

        let head_len = self.head_read_limit.min(self.file_size);
        let head = self.read_at(0, head_len)?;
        if let Some(found) = search_pattern(&head, box_type, 0) {
            tracing::debug!(%box_type, offset = found.payload_offset, "box found in file head");
            return Ok(Some(found));
        }

        if self.file_size > self.head_read_limit && box_type == BoxType::MOOV {
            let tail_len = self.tail_read_limit.min(self.file_size);
            let tail_start = self.file_size - tail_len;
            let tail = self.read_at(tail_start, tail_len)?;
            if let Some(found) = search_pattern(&tail, box_type, tail_start) {
                tracing::debug!(%box_type, offset = found.payload_offset, "box found in file tail");
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    /// ボックスのペイロードを読み込む
    pub fn read_payload(&mut self, range: &BoxRange) -> Result<Vec<u8>> {
        if range.payload_end() > self.file_size {
            return Err(Error::truncated_file(format!(
                "Box '{}' ends at byte {}, but the file has only {} bytes",
                range.box_type,
                range.payload_end(),
                self.file_size
            ))
            .with_box_type(range.box_type));
        }
        self.read_at(range.payload_offset, range.payload_length)
    }

    /// ファイル内の指定位置から `len` バイトを読み込む
    pub fn read_at(&mut self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let end = offset.checked_add(len).filter(|end| *end <= self.file_size);
        if end.is_none() {
            return Err(Error::truncated_file(format!(
                "Cannot read {len} bytes at offset {offset}: the file has only {} bytes",
                self.file_size
            )));
        }
        let len = usize::try_from(len)
            .map_err(|_| Error::invalid_input(format!("Too large read size: {len}")))?;

        self.inner.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0; len];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn walk_top_level(&mut self, box_type: BoxType) -> Result<Option<BoxRange>> {
        let mut offset: u64 = 0;
        for _ in 0..MAX_TOP_LEVEL_BOXES {
            if offset.saturating_add(BoxHeader::MIN_SIZE as u64) > self.file_size {
                break;
            }
            let header_len = (BoxHeader::MAX_SIZE as u64).min(self.file_size - offset);
            let bytes = self.read_at(offset, header_len)?;
            let Ok((header, header_size)) = BoxHeader::decode(&bytes) else {
                break;
            };
            let Some(payload_size) = header.payload_size() else {
                break;
            };

            if header.box_type == box_type {
                return Ok(Some(BoxRange {
                    box_type,
                    payload_offset: offset + header_size as u64,
                    payload_length: payload_size,
                }));
            }

            let Some(next) = offset.checked_add(header.box_size.get()) else {
                break;
            };
            offset = next;
        }
        Ok(None)
    }
}

/// `data` の中から `[サイズ][種別]` のバイト列パターンを探す
///
/// 種別の直前の 4 バイトをサイズとして読み、それが `data` の範囲に収まっている最初の候補を返す。
/// 返り値のオフセットには `base` が加算される。
fn search_pattern(data: &[u8], box_type: BoxType, base: u64) -> Option<BoxRange> {
    memchr::memmem::find_iter(data, box_type.as_bytes())
        .filter(|&idx| idx >= 4)
        .find_map(|idx| {
            let start = idx - 4;
            let size = u32::from_be_bytes([
                data[start],
                data[start + 1],
                data[start + 2],
                data[start + 3],
            ]) as usize;
            (BoxHeader::MIN_SIZE <= size && size <= data.len() - start).then(|| BoxRange {
                box_type,
                payload_offset: base + (idx + 4) as u64,
                payload_length: (size - BoxHeader::MIN_SIZE) as u64,
            })
        })
}
