//! サンプルの尺のテーブルから、サンプルごとのタイムスタンプ（ミリ秒）を求めるためのモジュール
use core::num::NonZeroU32;

use crate::boxes::SttsEntry;

/// `stts` のエントリー群を展開して、`sample_count` 個のサンプルそれぞれのタイムスタンプをミリ秒単位で返す
///
/// 先頭サンプルのタイムスタンプは常に 0 で、`i` 番目のサンプルのタイムスタンプは
/// それより前のサンプルの尺の合計を `floor(ticks * 1000 / timescale)` で変換した値となる。
///
/// 展開後の尺の数が `sample_count` より少ない場合には最後の尺（存在しなければ 0）を繰り返して補い、
/// 多い場合には `sample_count` 個で打ち切る。
pub fn build_pts_ms(sample_count: usize, timescale: NonZeroU32, entries: &[SttsEntry]) -> Vec<i64> {
    let expanded_count: u64 = entries.iter().map(|e| e.sample_count as u64).sum();
    if expanded_count != sample_count as u64 {
        tracing::warn!(
            expanded_count,
            sample_count,
            "stts sample count does not match stsz sample count"
        );
    }

    let last_delta = entries
        .iter()
        .rev()
        .find(|e| e.sample_count > 0)
        .map_or(0, |e| e.sample_delta);
    let deltas = entries
        .iter()
        .flat_map(|e| core::iter::repeat_n(e.sample_delta, e.sample_count as usize))
        .chain(core::iter::repeat(last_delta))
        .take(sample_count);

    let timescale = timescale.get() as u128;
    let mut ticks: u128 = 0;
    let mut pts_ms = Vec::with_capacity(sample_count);
    for delta in deltas {
        pts_ms.push(i64::try_from(ticks * 1000 / timescale).unwrap_or(i64::MAX));
        ticks = ticks.saturating_add(delta as u128);
    }
    pts_ms
}
