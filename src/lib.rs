//! アクションカメラの MP4 ファイルに埋め込まれたテレメトリートラックから、時刻つきの GPS トラックを取り出すためのライブラリ
//!
//! 処理は次の二つの流れから成り、最後にサンプルの並び順で突き合わされる:
//!
//! - MP4 のボックス木からテレメトリートラックのサンプルテーブルを取り出し、サンプルごとのタイムスタンプを求める
//! - 各サンプルのペイロード（スキーマ不明な protobuf）から緯度経度の候補を探し、もっともらしいものだけを残す
#![warn(missing_docs)]

mod auxiliary;
mod basic_types;
mod box_reader;
mod codec;
mod extract;

pub mod assemble;
pub mod box_tree;
pub mod boxes;
pub mod plausibility;
pub mod scanner;
pub mod schema;
pub mod timing;
pub mod track;
pub mod wire;

pub use assemble::{GpsFix, GpsFixSource, GpsSample, MismatchReport};
pub use basic_types::{BoxHeader, BoxRange, BoxSize, BoxType, Mp4FileTime};
pub use box_reader::{BoxReader, DEFAULT_HEAD_READ_LIMIT, DEFAULT_TAIL_READ_LIMIT};
pub use codec::{Decode, Error, ErrorKind, Result};
pub use extract::{ExtractOptions, GpsExtractor, GpsTrack, TrackTiming};
pub use scanner::{GpsCandidate, GpsScanner};
pub use track::TrackSelector;

// [NOTE]
// Windows 環境では aux.rs というファイル名が予約語で、リポジトリに含まれていると git clone に失敗するため、
// ファイル名自体は auxiliary.rs にして lib.rs の中で aux モジュール以下に再エクスポートしている。
pub mod aux {
    //! MP4 の仕様とは直接は関係がない、テレメトリーサンプルの取り出しに便利な補助的なコンポーネントを集めたモジュール

    pub use crate::auxiliary::{SampleLocator, split_samples};
}
