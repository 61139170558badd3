//! MP4 ファイルから GPS トラックを取り出す処理の全体をまとめたモジュール
use core::{num::NonZeroU32, time::Duration};
use std::{
    io::{Read, Seek},
    path::Path,
    time::SystemTime,
};

use crate::{
    BoxReader, BoxType, Error, Mp4FileTime, Result,
    assemble::{Assembled, GpsFixSource, GpsSample, MismatchReport, TrackAssembler},
    auxiliary::{SampleLocator, split_samples},
    box_reader::{DEFAULT_HEAD_READ_LIMIT, DEFAULT_TAIL_READ_LIMIT, open_file},
    boxes::{StscEntry, SttsEntry},
    plausibility::PlausibilityFilter,
    scanner::{GpsCandidate, GpsScanner},
    timing::build_pts_ms,
    track::{MovieIndex, TrackSelector, TrackTables},
};

/// [`GpsExtractor`] 用のオプション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// テレメトリートラックの選び方
    ///
    /// デフォルト値は [`TrackSelector::Index(2)`](TrackSelector::Index)
    pub track: TrackSelector,

    /// `true` の場合には、緯度と経度のどちらかの絶対値が 1 未満の組を棄却する
    ///
    /// 撮影場所が赤道や本初子午線から十分に離れていることが分かっている場合に、
    /// 誤検出を減らすために指定する
    pub strict: bool,

    /// ボックスのパターン探索時にファイル先頭から読み込むバイト数の上限
    ///
    /// デフォルト値は 100 MiB
    pub head_read_limit: u64,

    /// `moov` ボックスのパターン探索時にファイル末尾から読み込むバイト数の上限
    ///
    /// デフォルト値は 50 MiB
    pub tail_read_limit: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            track: TrackSelector::default(),
            strict: false,
            head_read_limit: DEFAULT_HEAD_READ_LIMIT,
            tail_read_limit: DEFAULT_TAIL_READ_LIMIT,
        }
    }
}

/// テレメトリートラックのタイミング情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTiming {
    /// サンプルごとのサイズ
    pub sample_sizes: Vec<u32>,

    /// トラックのタイムスケール
    pub timescale: NonZeroU32,

    /// サンプルの尺の連続
    pub durations: Vec<SttsEntry>,

    /// サンプルごとのタイムスタンプ（ミリ秒）
    ///
    /// 長さは常に `sample_sizes` と等しい
    pub pts_ms: Vec<i64>,
}

impl TrackTiming {
    fn from_tables(tables: &TrackTables) -> Self {
        let pts_ms = build_pts_ms(tables.sample_sizes.len(), tables.timescale, &tables.durations);
        Self {
            sample_sizes: tables.sample_sizes.clone(),
            timescale: tables.timescale,
            durations: tables.durations.clone(),
            pts_ms,
        }
    }
}

/// 取り出された GPS トラック
#[derive(Debug, Clone, PartialEq)]
pub struct GpsTrack {
    /// タイムスタンプ順に並んだ GPS 位置
    pub samples: Vec<GpsSample>,

    /// タイムスタンプ 0 に対応する時刻（`mvhd` ボックスの作成時刻）
    pub creation_time: Option<Mp4FileTime>,

    /// タイムスタンプの列と GPS 位置の列の長さが一致しなかった場合の情報
    pub mismatch: Option<MismatchReport>,
}

impl GpsTrack {
    fn new(assembled: Assembled, creation_time: Option<Mp4FileTime>) -> Self {
        Self {
            samples: assembled.samples,
            creation_time,
            mismatch: assembled.mismatch,
        }
    }

    /// サンプルの絶対時刻を返す
    ///
    /// 作成時刻が不明、あるいは UNIX エポックより前の場合には [`None`] が返される
    pub fn absolute_time(&self, sample: &GpsSample) -> Option<SystemTime> {
        let origin = self.creation_time?.to_system_time()?;
        let offset = Duration::from_millis(sample.timestamp_ms.unsigned_abs());
        if sample.timestamp_ms >= 0 {
            origin.checked_add(offset)
        } else {
            origin.checked_sub(offset)
        }
    }
}

/// MP4 ファイルから GPS トラックを取り出すための構造体
///
/// # Examples
///
/// ```no_run
/// use mp4_gps_track::{ExtractOptions, GpsExtractor};
///
/// let extractor = GpsExtractor::new(ExtractOptions::default());
/// let track = extractor.extract("DJI_0001.MP4")?;
/// for sample in &track.samples {
///     println!("{} {} {}", sample.timestamp_ms, sample.latitude, sample.longitude);
/// }
/// # Ok::<(), mp4_gps_track::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct GpsExtractor {
    options: ExtractOptions,
    scanner: GpsScanner,
}

impl GpsExtractor {
    /// 組み込みのスキーマ推測デコーダーを使う [`GpsExtractor`] インスタンスを生成する
    pub fn new(options: ExtractOptions) -> Self {
        Self::with_scanner(options, GpsScanner::new())
    }

    /// 指定のスキャナーを使う [`GpsExtractor`] インスタンスを生成する
    pub fn with_scanner(options: ExtractOptions, scanner: GpsScanner) -> Self {
        Self { options, scanner }
    }

    /// テレメトリートラックのサンプルサイズとタイムスタンプを求める
    pub fn timing<P: AsRef<Path>>(&self, path: P) -> Result<TrackTiming> {
        self.timing_from_reader(open_file(path)?)
    }

    /// [`GpsExtractor::timing()`] の任意のリーダー版
    pub fn timing_from_reader<R: Read + Seek>(&self, reader: R) -> Result<TrackTiming> {
        let mut reader = self.box_reader(reader)?;
        let index = MovieIndex::read(&mut reader)?;
        let tables = index.track_tables(self.options.track)?;
        Ok(TrackTiming::from_tables(&tables))
    }

    /// 事前に取り出されたテレメトリーサンプルの連結バイト列から GPS トラックを組み立てる
    ///
    /// `blob` はサンプルサイズの一覧に従って分割され、各サンプルが個別にデコードされる
    pub fn extract_from_blob<P: AsRef<Path>>(&self, path: P, blob: &[u8]) -> Result<GpsTrack> {
        self.extract_from_blob_with_reader(open_file(path)?, blob)
    }

    /// [`GpsExtractor::extract_from_blob()`] の任意のリーダー版
    pub fn extract_from_blob_with_reader<R: Read + Seek>(
        &self,
        reader: R,
        blob: &[u8],
    ) -> Result<GpsTrack> {
        let mut reader = self.box_reader(reader)?;
        let index = MovieIndex::read(&mut reader)?;
        let timing = TrackTiming::from_tables(&index.track_tables(self.options.track)?);

        let samples = split_samples(blob, &timing.sample_sizes);
        tracing::debug!(
            sample_count = timing.sample_sizes.len(),
            split = samples.len(),
            "telemetry blob split"
        );
        let candidates: Vec<_> = samples.iter().map(|s| self.scan_sample(s)).collect();
        let assembled = self.assembler().assemble_candidates(&timing.pts_ms, &candidates);
        Ok(GpsTrack::new(assembled, index.creation_time()))
    }

    /// MP4 ファイル内のテレメトリーサンプルを直接読み込んで GPS トラックを組み立てる
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Result<GpsTrack> {
        self.extract_from_reader(open_file(path)?)
    }

    /// [`GpsExtractor::extract()`] の任意のリーダー版
    pub fn extract_from_reader<R: Read + Seek>(&self, reader: R) -> Result<GpsTrack> {
        let mut reader = self.box_reader(reader)?;
        let index = MovieIndex::read(&mut reader)?;
        let tables = index.track_tables(self.options.track)?;
        let timing = TrackTiming::from_tables(&tables);

        let chunk_offsets = tables
            .chunk_offsets
            .as_deref()
            .ok_or_else(|| Error::missing_box(BoxType::STCO, "stbl"))?;
        let sample_to_chunk = sample_to_chunk_or_default(&tables.sample_to_chunk);
        let locator = SampleLocator::new(&tables.sample_sizes, &sample_to_chunk, chunk_offsets);

        let mut candidates = Vec::with_capacity(locator.sample_count());
        for (offset, size) in locator.samples() {
            if offset.saturating_add(size as u64) > reader.file_size() {
                tracing::warn!(
                    read = candidates.len(),
                    sample_count = tables.sample_sizes.len(),
                    offset,
                    size,
                    "telemetry sample extends past the end of the file"
                );
                break;
            }
            let payload = reader.read_at(offset, size as u64)?;
            candidates.push(self.scan_sample(&payload));
        }

        let assembled = self.assembler().assemble_candidates(&timing.pts_ms, &candidates);
        Ok(GpsTrack::new(assembled, index.creation_time()))
    }

    /// 外部の GPS ソースから得た位置の列を、テレメトリートラックのタイムスタンプと突き合わせる
    pub fn extract_with_source<P, S>(&self, path: P, source: &mut S) -> Result<GpsTrack>
    where
        P: AsRef<Path>,
        S: GpsFixSource + ?Sized,
    {
        self.extract_with_source_from_reader(open_file(path)?, source)
    }

    /// [`GpsExtractor::extract_with_source()`] の任意のリーダー版
    pub fn extract_with_source_from_reader<R, S>(&self, reader: R, source: &mut S) -> Result<GpsTrack>
    where
        R: Read + Seek,
        S: GpsFixSource + ?Sized,
    {
        let mut reader = self.box_reader(reader)?;
        let index = MovieIndex::read(&mut reader)?;
        let timing = TrackTiming::from_tables(&index.track_tables(self.options.track)?);

        let fixes = source.read_fixes()?;
        tracing::debug!(fix_count = fixes.len(), "external GPS fixes read");
        let assembled = self.assembler().assemble_fixes(&timing.pts_ms, &fixes);
        Ok(GpsTrack::new(assembled, index.creation_time()))
    }

    fn box_reader<R: Read + Seek>(&self, reader: R) -> Result<BoxReader<R>> {
        BoxReader::new(reader)?
            .with_read_limits(self.options.head_read_limit, self.options.tail_read_limit)
    }

    fn assembler(&self) -> TrackAssembler {
        TrackAssembler::new(PlausibilityFilter::new(self.options.strict))
    }

    fn scan_sample(&self, payload: &[u8]) -> Vec<GpsCandidate> {
        let found = self.scanner.scan(payload);
        tracing::trace!(size = payload.len(), candidates = found.len(), "sample scanned");
        found
    }
}

/// `stsc` が存在しない場合には、一つのチャンクに一つのサンプルが入っているものとみなす
fn sample_to_chunk_or_default(entries: &[StscEntry]) -> Vec<StscEntry> {
    if entries.is_empty() {
        vec![StscEntry {
            first_chunk: 1,
            samples_per_chunk: 1,
            sample_description_index: 1,
        }]
    } else {
        entries.to_vec()
    }
}
