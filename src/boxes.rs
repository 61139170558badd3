//! トラックのタイミング情報の復元に必要なボックスのペイロードをデコードするためのモジュール
//!
//! ここでのデコードは全て、ボックスのヘッダーを除いたペイロード部分を対象としている。
//! ペイロードが途中で切れている場合でもエラーにはせず、読み込めた範囲までの結果を返す。
use core::num::NonZeroU32;

use crate::{BoxType, Decode, Mp4FileTime};

/// 64 bit 版の時刻フィールドを使う場合のフルボックスのバージョン
const VERSION_64BIT_TIME: u8 = 1;

/// [ISO/IEC 14496-12] SampleSizeBox class (親: `stbl`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StszBox {
    Fixed {
        sample_size: NonZeroU32,
        sample_count: u32,
    },
    Variable {
        entry_sizes: Vec<u32>,
    },
}

impl StszBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::STSZ;

    /// ペイロードをデコードする
    ///
    /// 個別サイズのエントリーが途中で切れている場合には、読み込めた分だけを保持する
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut offset = 0;
        let header = <[u32; 3]>::decode_at(payload, &mut offset);
        let Ok([_version_and_flags, sample_size, sample_count]) = header else {
            return Self::Variable {
                entry_sizes: Vec::new(),
            };
        };

        if let Some(sample_size) = NonZeroU32::new(sample_size) {
            return Self::Fixed {
                sample_size,
                sample_count,
            };
        }

        let available = (payload.len() - offset) / 4;
        let mut entry_sizes = Vec::with_capacity(available.min(sample_count as usize));
        for _ in 0..sample_count {
            let Ok(size) = u32::decode_at(payload, &mut offset) else {
                break;
            };
            entry_sizes.push(size);
        }
        Self::Variable { entry_sizes }
    }

    /// サンプル数を返す
    pub fn sample_count(&self) -> usize {
        match self {
            Self::Fixed { sample_count, .. } => *sample_count as usize,
            Self::Variable { entry_sizes } => entry_sizes.len(),
        }
    }

    /// サンプルごとのサイズの一覧を返す
    pub fn sample_sizes(&self) -> Vec<u32> {
        match self {
            Self::Fixed {
                sample_size,
                sample_count,
            } => vec![sample_size.get(); *sample_count as usize],
            Self::Variable { entry_sizes } => entry_sizes.clone(),
        }
    }
}

/// [`SttsBox`] が保持するエントリー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SttsEntry {
    /// 同じ尺が連続するサンプルの数
    pub sample_count: u32,

    /// 各サンプルの尺（トラックのタイムスケール単位）
    pub sample_delta: u32,
}

/// [ISO/IEC 14496-12] TimeToSampleBox class (親: `stbl`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SttsBox {
    pub entries: Vec<SttsEntry>,
}

impl SttsBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::STTS;

    /// ペイロードをデコードする
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut offset = 0;
        let Ok([_version_and_flags, count]) = <[u32; 2]>::decode_at(payload, &mut offset) else {
            return Self {
                entries: Vec::new(),
            };
        };

        let mut entries = Vec::with_capacity(((payload.len() - offset) / 8).min(count as usize));
        for _ in 0..count {
            let Ok([sample_count, sample_delta]) = <[u32; 2]>::decode_at(payload, &mut offset)
            else {
                break;
            };
            entries.push(SttsEntry {
                sample_count,
                sample_delta,
            });
        }
        Self { entries }
    }

    /// 全エントリーのサンプル数の合計を返す
    pub fn total_sample_count(&self) -> u64 {
        self.entries.iter().map(|e| e.sample_count as u64).sum()
    }
}

/// [ISO/IEC 14496-12] MediaHeaderBox class (親: `mdia`)
///
/// タイミングの計算に使うタイムスケールのみを保持する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct MdhdBox {
    pub timescale: u32,
}

impl MdhdBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::MDHD;

    /// ペイロードからタイムスケールを読み取れなかった場合に使われる値
    pub const DEFAULT_TIMESCALE: u32 = 24000;

    /// ペイロードをデコードする
    ///
    /// 未知のバージョンやペイロード不足でタイムスケールを読み取れない場合には
    /// [`MdhdBox::DEFAULT_TIMESCALE`] が使われる
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut offset = match payload.first() {
            Some(0) => 4 + 4 + 4,
            Some(&VERSION_64BIT_TIME) => 4 + 8 + 8,
            _ => {
                return Self {
                    timescale: Self::DEFAULT_TIMESCALE,
                };
            }
        };
        let timescale = u32::decode_at(payload, &mut offset).unwrap_or(Self::DEFAULT_TIMESCALE);
        Self { timescale }
    }
}

/// [ISO/IEC 14496-12] MovieHeaderBox class (親: `moov`)
///
/// ファイル全体の時間軸の起点となる作成時刻のみを保持する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct MvhdBox {
    pub creation_time: Mp4FileTime,
}

impl MvhdBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::MVHD;

    /// 作成時刻フィールドの位置
    const CREATION_TIME_OFFSET: usize = 8;

    /// ペイロードをデコードする
    ///
    /// バージョン 0 ではオフセット 8 の 32 bit 値を、バージョン 1 ではオフセット 8 の 64 bit 値を、
    /// 1904/1/1 からの経過秒数として読む。
    /// 未知のバージョンやペイロード不足の場合には [`None`] が返される。
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let mut offset = Self::CREATION_TIME_OFFSET;
        let secs = match *payload.first()? {
            0 => u32::decode_at(payload, &mut offset).ok()? as u64,
            VERSION_64BIT_TIME => u64::decode_at(payload, &mut offset).ok()?,
            _ => return None,
        };
        Some(Self {
            creation_time: Mp4FileTime::from_secs(secs),
        })
    }
}

/// [ISO/IEC 14496-12] HandlerBox class (親: `mdia`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct HdlrBox {
    pub handler_type: [u8; 4],
}

impl HdlrBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::HDLR;

    /// ペイロードをデコードする
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let mut offset = 4 + 4;
        let handler_type = <[u8; 4]>::decode_at(payload, &mut offset).ok()?;
        Some(Self { handler_type })
    }
}

/// [ISO/IEC 14496-12] SampleDescriptionBox class (親: `stbl`)
///
/// 先頭のサンプルエントリーの種別（フォーマット）のみを保持する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct StsdBox {
    pub first_entry_format: BoxType,
}

impl StsdBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::STSD;

    /// ペイロードをデコードする
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let mut offset = 0;
        let [_version_and_flags, entry_count, _entry_size] =
            <[u32; 3]>::decode_at(payload, &mut offset).ok()?;
        if entry_count == 0 {
            return None;
        }
        let format = <[u8; 4]>::decode_at(payload, &mut offset).ok()?;
        Some(Self {
            first_entry_format: BoxType(format),
        })
    }
}

/// [`StscBox`] が保持するエントリー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// [ISO/IEC 14496-12] SampleToChunkBox class (親: `stbl`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct StscBox {
    pub entries: Vec<StscEntry>,
}

impl StscBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::STSC;

    /// ペイロードをデコードする
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut offset = 0;
        let Ok([_version_and_flags, count]) = <[u32; 2]>::decode_at(payload, &mut offset) else {
            return Self {
                entries: Vec::new(),
            };
        };

        let mut entries = Vec::with_capacity(((payload.len() - offset) / 12).min(count as usize));
        for _ in 0..count {
            let Ok([first_chunk, samples_per_chunk, sample_description_index]) =
                <[u32; 3]>::decode_at(payload, &mut offset)
            else {
                break;
            };
            entries.push(StscEntry {
                first_chunk,
                samples_per_chunk,
                sample_description_index,
            });
        }
        Self { entries }
    }
}

/// [ISO/IEC 14496-12] ChunkOffsetBox class および ChunkLargeOffsetBox class (親: `stbl`)
///
/// `stco` の 32 bit オフセットも `co64` の 64 bit オフセットも、ここでは `u64` として保持する
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct ChunkOffsetBox {
    pub chunk_offsets: Vec<u64>,
}

impl ChunkOffsetBox {
    /// `stco` ボックスのペイロードをデコードする
    pub fn from_stco_payload(payload: &[u8]) -> Self {
        Self::decode_entries(payload, |payload, offset| {
            u32::decode_at(payload, offset).ok().map(u64::from)
        })
    }

    /// `co64` ボックスのペイロードをデコードする
    pub fn from_co64_payload(payload: &[u8]) -> Self {
        Self::decode_entries(payload, |payload, offset| {
            u64::decode_at(payload, offset).ok()
        })
    }

    fn decode_entries<F>(payload: &[u8], mut decode_entry: F) -> Self
    where
        F: FnMut(&[u8], &mut usize) -> Option<u64>,
    {
        let mut offset = 0;
        let Ok([_version_and_flags, count]) = <[u32; 2]>::decode_at(payload, &mut offset) else {
            return Self {
                chunk_offsets: Vec::new(),
            };
        };

        let mut chunk_offsets = Vec::with_capacity(((payload.len() - offset) / 4).min(count as usize));
        for _ in 0..count {
            let Some(chunk_offset) = decode_entry(payload, &mut offset) else {
                break;
            };
            chunk_offsets.push(chunk_offset);
        }
        Self { chunk_offsets }
    }
}
