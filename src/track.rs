//! `moov` ボックスの中から対象のトラックを選び、そのサンプルテーブルを取り出すためのモジュール
use core::num::NonZeroU32;
use std::io::{Read, Seek};

use crate::{
    BoxReader, BoxType, Error, Mp4FileTime, Result,
    box_tree::{find_boxes, find_payload},
    boxes::{
        ChunkOffsetBox, HdlrBox, MdhdBox, MvhdBox, StscBox, StscEntry, StsdBox, SttsBox, SttsEntry,
        StszBox,
    },
};

/// 対象のトラックの選び方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSelector {
    /// `moov` 内の `trak` ボックスの出現順（0 始まり）で選ぶ
    Index(usize),

    /// `hdlr` ボックスのハンドラー種別（例: `meta`）が一致する最初のトラックを選ぶ
    Handler([u8; 4]),

    /// `stsd` ボックスの先頭のサンプルエントリーの種別（例: `djmd`）が一致する最初のトラックを選ぶ
    SampleFormat([u8; 4]),
}

impl TrackSelector {
    /// テレメトリートラックが置かれている既定の位置
    pub const DEFAULT_INDEX: usize = 2;
}

impl Default for TrackSelector {
    fn default() -> Self {
        Self::Index(Self::DEFAULT_INDEX)
    }
}

/// 一つのトラックから取り出したサンプルテーブルの内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTables {
    /// サンプルごとのサイズ（`stsz`）
    pub sample_sizes: Vec<u32>,

    /// トラックのタイムスケール（`mdhd`）
    ///
    /// `mdhd` が存在しないか、タイムスケールが 0 の場合には [`MdhdBox::DEFAULT_TIMESCALE`] となる
    pub timescale: NonZeroU32,

    /// サンプルの尺の連続（`stts`）
    pub durations: Vec<SttsEntry>,

    /// サンプルとチャンクの対応（`stsc`）
    pub sample_to_chunk: Vec<StscEntry>,

    /// チャンクのファイル内での位置（`stco` または `co64`）
    pub chunk_offsets: Option<Vec<u64>>,
}

/// ファイルから読み込んだ `moov` ボックスのペイロード
#[derive(Debug, Clone)]
pub struct MovieIndex {
    payload: Vec<u8>,
    file_size: u64,
}

impl MovieIndex {
    /// ファイルから `moov` ボックスを探して読み込む
    pub fn read<R: Read + Seek>(reader: &mut BoxReader<R>) -> Result<Self> {
        let range = reader
            .locate(BoxType::MOOV)?
            .ok_or_else(|| Error::missing_box(BoxType::MOOV, "file"))?;
        let payload = reader.read_payload(&range)?;
        Ok(Self::from_payload(payload, reader.file_size()))
    }

    /// `moov` ボックスのペイロードから [`MovieIndex`] インスタンスを生成する
    ///
    /// `file_size` は元のファイルのサイズで、サンプルサイズの合計がこれを越えるテーブルはエラーとなる
    pub fn from_payload(payload: Vec<u8>, file_size: u64) -> Self {
        Self { payload, file_size }
    }

    /// ファイルの作成時刻（時間軸の 0 に対応する時刻）を返す
    ///
    /// `mvhd` ボックスが存在しないか、デコードできなかった場合には [`None`] が返される
    pub fn creation_time(&self) -> Option<Mp4FileTime> {
        find_payload(&self.payload, BoxType::MVHD)
            .and_then(MvhdBox::from_payload)
            .map(|b| b.creation_time)
    }

    /// トラックの数を返す
    pub fn track_count(&self) -> usize {
        self.tracks().len()
    }

    /// 指定されたトラックのサンプルテーブルを取り出す
    pub fn track_tables(&self, selector: TrackSelector) -> Result<TrackTables> {
        let tracks = self.tracks();
        let trak = match selector {
            TrackSelector::Index(index) => *tracks.get(index).ok_or_else(|| {
                Error::track_not_found(format!(
                    "Track index {index} is out of range: the file has {} tracks",
                    tracks.len()
                ))
            })?,
            TrackSelector::Handler(handler_type) => tracks
                .iter()
                .copied()
                .find(|trak| {
                    find_payload(trak, BoxType::HDLR)
                        .and_then(HdlrBox::from_payload)
                        .is_some_and(|b| b.handler_type == handler_type)
                })
                .ok_or_else(|| {
                    Error::track_not_found(format!(
                        "No track with handler type '{}'",
                        BoxType(handler_type)
                    ))
                })?,
            TrackSelector::SampleFormat(format) => tracks
                .iter()
                .copied()
                .find(|trak| {
                    find_payload(trak, BoxType::STSD)
                        .and_then(StsdBox::from_payload)
                        .is_some_and(|b| b.first_entry_format == BoxType(format))
                })
                .ok_or_else(|| {
                    Error::track_not_found(format!(
                        "No track with sample entry format '{}'",
                        BoxType(format)
                    ))
                })?,
        };
        tracing::debug!(?selector, trak_size = trak.len(), "track selected");
        decode_track_tables(trak, self.file_size)
    }

    fn tracks(&self) -> Vec<&[u8]> {
        find_boxes(&self.payload, BoxType::TRAK)
            .iter()
            .map(|b| b.slice(&self.payload))
            .collect()
    }
}

fn decode_track_tables(trak: &[u8], file_size: u64) -> Result<TrackTables> {
    let stbl = find_payload(trak, BoxType::STBL)
        .ok_or_else(|| Error::missing_box(BoxType::STBL, "trak"))?;
    let stsz = find_payload(stbl, StszBox::TYPE)
        .ok_or_else(|| Error::missing_box(StszBox::TYPE, "stbl"))?;
    let stts = find_payload(stbl, SttsBox::TYPE)
        .ok_or_else(|| Error::missing_box(SttsBox::TYPE, "stbl"))?;

    let stsz = StszBox::from_payload(stsz);
    if let StszBox::Fixed {
        sample_size,
        sample_count,
    } = stsz
    {
        let total_size = sample_size.get() as u64 * sample_count as u64;
        if total_size > file_size {
            return Err(Error::truncated_file(format!(
                "stsz declares {sample_count} samples of {sample_size} bytes, \
                 but the file has only {file_size} bytes"
            ))
            .with_box_type(StszBox::TYPE));
        }
    }

    // mdhd は stbl ではなく、その祖先の mdia の直下にある
    let timescale = find_payload(trak, MdhdBox::TYPE)
        .map_or(MdhdBox::DEFAULT_TIMESCALE, |p| MdhdBox::from_payload(p).timescale);
    let timescale = NonZeroU32::new(timescale).unwrap_or_else(|| {
        tracing::warn!(
            default = MdhdBox::DEFAULT_TIMESCALE,
            "mdhd timescale is zero; falling back to the default"
        );
        NonZeroU32::new(MdhdBox::DEFAULT_TIMESCALE).unwrap_or(NonZeroU32::MIN)
    });

    let chunk_offsets = find_payload(stbl, BoxType::STCO)
        .map(ChunkOffsetBox::from_stco_payload)
        .or_else(|| find_payload(stbl, BoxType::CO64).map(ChunkOffsetBox::from_co64_payload))
        .map(|b| b.chunk_offsets);
    let sample_to_chunk = find_payload(stbl, StscBox::TYPE)
        .map(|p| StscBox::from_payload(p).entries)
        .unwrap_or_default();

    Ok(TrackTables {
        sample_sizes: stsz.sample_sizes(),
        timescale,
        durations: SttsBox::from_payload(stts).entries,
        sample_to_chunk,
        chunk_offsets,
    })
}
