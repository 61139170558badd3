//! サンプルのタイムスタンプと GPS 位置の列を突き合わせて、最終的な GPS トラックを組み立てるためのモジュール
use std::collections::HashSet;

use crate::{Result, plausibility::PlausibilityFilter, scanner::GpsCandidate};

/// 座標を丸める小数点以下の桁数に対応する倍率
const COORDINATE_ROUNDING: f64 = 1e7;

/// タイムスタンプつきの GPS 位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsSample {
    /// トラックの時間軸の先頭からの経過時間（ミリ秒）
    pub timestamp_ms: i64,

    /// 緯度
    pub latitude: f64,

    /// 経度
    pub longitude: f64,

    /// 高度（外部の GPS ソースから得られた場合のみ）
    pub altitude: Option<f64>,
}

/// 外部の GPS ソースから得られる GPS 位置
///
/// 個々の位置は明示的なタイムスタンプを持たず、並び順でサンプルと対応づけられる
#[derive(Debug, Clone, PartialEq)]
pub struct GpsFix {
    /// 緯度
    pub latitude: f64,

    /// 経度
    pub longitude: f64,

    /// 高度
    pub altitude: Option<f64>,

    /// ソースが付与した時刻情報（自由形式の文字列）
    pub time_info: Option<String>,
}

/// テレメトリーを独自にデコードして GPS 位置の列を返す外部ソースを表すトレイト
pub trait GpsFixSource {
    /// GPS 位置の列を、テレメトリーサンプルと同じ順番で返す
    fn read_fixes(&mut self) -> Result<Vec<GpsFix>>;
}

impl GpsFixSource for Vec<GpsFix> {
    fn read_fixes(&mut self) -> Result<Vec<GpsFix>> {
        Ok(core::mem::take(self))
    }
}

/// タイムスタンプの列と GPS 位置の列の長さが一致しなかったことを表す
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MismatchReport {
    /// タイムスタンプの列の長さ
    pub timing_len: usize,

    /// GPS 位置（またはサンプルペイロード）の列の長さ
    pub gps_len: usize,
}

impl MismatchReport {
    fn check(timing_len: usize, gps_len: usize) -> Option<Self> {
        if timing_len == gps_len {
            return None;
        }
        tracing::warn!(
            timing_len,
            gps_len,
            "GPS sequence length does not match sample timing length; pairing up to the shorter one"
        );
        Some(Self {
            timing_len,
            gps_len,
        })
    }
}

/// 組み立て結果
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    /// 重複を除いた GPS 位置の列
    pub samples: Vec<GpsSample>,

    /// 二つの列の長さの不一致
    pub mismatch: Option<MismatchReport>,
}

/// サンプルのタイムスタンプと GPS 位置の列を並び順で対応づける
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackAssembler {
    filter: PlausibilityFilter,
}

impl TrackAssembler {
    /// [`TrackAssembler`] インスタンスを生成する
    pub const fn new(filter: PlausibilityFilter) -> Self {
        Self { filter }
    }

    /// 外部ソースから得た GPS 位置の列を組み立てる
    ///
    /// `i` 番目のタイムスタンプと `i` 番目の GPS 位置が対応づけられ、出力の長さは二つの列の短い方を越えない
    pub fn assemble_fixes(&self, pts_ms: &[i64], fixes: &[GpsFix]) -> Assembled {
        let mismatch = MismatchReport::check(pts_ms.len(), fixes.len());
        let samples = pts_ms
            .iter()
            .zip(fixes)
            .filter(|(_, fix)| self.filter.accepts(fix.latitude, fix.longitude))
            .map(|(&timestamp_ms, fix)| GpsSample {
                timestamp_ms,
                latitude: fix.latitude,
                longitude: fix.longitude,
                altitude: fix.altitude,
            });
        Assembled {
            samples: dedup_samples(samples),
            mismatch,
        }
    }

    /// サンプルごとにデコードした緯度経度の候補を組み立てる
    ///
    /// `candidates[i]` は `i` 番目のサンプルから見つかった候補で、全て `pts_ms[i]` のタイムスタンプを持つ。
    /// 座標は小数点以下 7 桁に丸められる。
    pub fn assemble_candidates(&self, pts_ms: &[i64], candidates: &[Vec<GpsCandidate>]) -> Assembled {
        let mismatch = MismatchReport::check(pts_ms.len(), candidates.len());
        let filter = self.filter;
        let samples = pts_ms
            .iter()
            .zip(candidates)
            .flat_map(move |(&timestamp_ms, found)| {
                found
                    .iter()
                    .filter(move |c| filter.accepts(c.latitude, c.longitude))
                    .map(move |c| GpsSample {
                        timestamp_ms,
                        latitude: round_coordinate(c.latitude),
                        longitude: round_coordinate(c.longitude),
                        altitude: None,
                    })
            });
        Assembled {
            samples: dedup_samples(samples),
            mismatch,
        }
    }
}

/// 小数点以下 7 桁に丸める
pub fn round_coordinate(v: f64) -> f64 {
    (v * COORDINATE_ROUNDING).round() / COORDINATE_ROUNDING
}

/// `(タイムスタンプ, 小数点以下 7 桁に丸めた緯度, 同経度)` が同じ要素を、最初の一つだけ残して取り除く
pub fn dedup_samples<I>(samples: I) -> Vec<GpsSample>
where
    I: IntoIterator<Item = GpsSample>,
{
    let mut seen = HashSet::new();
    samples
        .into_iter()
        .filter(|s| {
            let key = (
                s.timestamp_ms,
                (s.latitude * COORDINATE_ROUNDING).round() as i64,
                (s.longitude * COORDINATE_ROUNDING).round() as i64,
            );
            seen.insert(key)
        })
        .collect()
}
