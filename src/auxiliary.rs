//! MP4 の仕様とは直接は関係がない、テレメトリーサンプルの取り出しに便利な補助的なコンポーネントを集めたモジュール
use crate::boxes::StscEntry;

/// サンプルテーブルの情報から、各サンプルのファイル内での位置を求めるための構造体
#[derive(Debug, Clone)]
pub struct SampleLocator {
    offsets: Vec<u64>,
    sizes: Vec<u32>,
}

impl SampleLocator {
    /// `stsz` / `stsc` / `stco` (または `co64`) の内容から [`SampleLocator`] インスタンスを生成する
    ///
    /// チャンク内のサンプルは連続して配置されているものとして、各サンプルの開始位置を計算する。
    /// テーブル同士の内容が食い違っていて、一部のサンプルの位置が求まらない場合には、
    /// 位置が求まった先頭からのサンプルのみを保持する。
    pub fn new(sample_sizes: &[u32], stsc_entries: &[StscEntry], chunk_offsets: &[u64]) -> Self {
        let mut offsets = Vec::with_capacity(sample_sizes.len());
        let mut sizes = sample_sizes.iter().copied();

        'outer: for (i, entry) in stsc_entries.iter().enumerate() {
            // チャンク番号は 1 始まり
            let first_chunk = entry.first_chunk.max(1) as usize;
            let next_first_chunk = stsc_entries
                .get(i + 1)
                .map_or(chunk_offsets.len() + 1, |next| next.first_chunk as usize);

            for chunk_index in first_chunk..next_first_chunk {
                let Some(&chunk_offset) = chunk_offsets.get(chunk_index - 1) else {
                    break 'outer;
                };

                let mut position = chunk_offset;
                for _ in 0..entry.samples_per_chunk {
                    let Some(size) = sizes.next() else {
                        break 'outer;
                    };
                    offsets.push(position);
                    position = position.saturating_add(size as u64);
                }
            }
        }

        if offsets.len() != sample_sizes.len() {
            tracing::warn!(
                located = offsets.len(),
                sample_count = sample_sizes.len(),
                "sample table does not cover every sample"
            );
        }

        let sizes = sample_sizes[..offsets.len()].to_vec();
        Self { offsets, sizes }
    }

    /// 位置が求まったサンプルの数を返す
    pub fn sample_count(&self) -> usize {
        self.offsets.len()
    }

    /// 各サンプルの `(ファイル内での開始位置, バイト数)` を走査するイテレーターを返す
    pub fn samples(&self) -> impl '_ + Iterator<Item = (u64, u32)> {
        self.offsets.iter().copied().zip(self.sizes.iter().copied())
    }
}

/// サンプルを連結したバイト列を、サンプルサイズの一覧に従って分割する
///
/// 途中でバイト列の末尾を越えるサンプルに到達した場合には、それ以降のサンプルは返さない
pub fn split_samples<'a>(blob: &'a [u8], sample_sizes: &[u32]) -> Vec<&'a [u8]> {
    let mut samples = Vec::with_capacity(sample_sizes.len());
    let mut offset = 0usize;
    for &size in sample_sizes {
        let Some(end) = offset.checked_add(size as usize).filter(|end| *end <= blob.len()) else {
            tracing::warn!(
                split = samples.len(),
                sample_count = sample_sizes.len(),
                blob_len = blob.len(),
                "sample blob is shorter than the sample size table"
            );
            break;
        };
        samples.push(&blob[offset..end]);
        offset = end;
    }
    samples
}
