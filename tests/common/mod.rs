//! 結合テスト用の MP4 / protobuf バイト列の組み立て処理
#![allow(dead_code)]

pub fn mp4_box(ty: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut b = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    b.extend_from_slice(ty);
    b.extend_from_slice(payload);
    b
}

pub fn large_box(ty: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut b = 1u32.to_be_bytes().to_vec();
    b.extend_from_slice(ty);
    b.extend_from_slice(&((payload.len() + 16) as u64).to_be_bytes());
    b.extend_from_slice(payload);
    b
}

pub fn container(ty: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    mp4_box(ty, &children.concat())
}

fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

pub fn stsz_fixed(sample_size: u32, sample_count: u32) -> Vec<u8> {
    mp4_box(b"stsz", &words(&[0, sample_size, sample_count]))
}

pub fn stsz_variable(sizes: &[u32]) -> Vec<u8> {
    let mut payload = words(&[0, 0, sizes.len() as u32]);
    payload.extend(words(sizes));
    mp4_box(b"stsz", &payload)
}

pub fn stts(runs: &[(u32, u32)]) -> Vec<u8> {
    let mut payload = words(&[0, runs.len() as u32]);
    for &(count, delta) in runs {
        payload.extend(words(&[count, delta]));
    }
    mp4_box(b"stts", &payload)
}

pub fn mdhd_v0_payload(timescale: u32) -> Vec<u8> {
    words(&[0, 0, 0, timescale, 0, 0])
}

pub fn mdhd_v1_payload(timescale: u32) -> Vec<u8> {
    let mut payload = vec![1, 0, 0, 0];
    payload.extend_from_slice(&[0; 16]);
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&[0; 12]);
    payload
}

pub fn mvhd_v0_payload(secs: u32) -> Vec<u8> {
    let mut payload = words(&[0, secs, secs, 1000, 0]);
    payload.resize(100, 0);
    payload
}

pub fn mvhd_v1_payload(secs: u64) -> Vec<u8> {
    // version, flags, reserved の後に creation_time が続く
    let mut payload = vec![1, 0, 0, 0];
    payload.extend_from_slice(&[0; 4]);
    payload.extend_from_slice(&secs.to_be_bytes());
    payload.resize(112, 0);
    payload
}

pub fn hdlr(handler_type: &[u8; 4]) -> Vec<u8> {
    let mut payload = words(&[0, 0]);
    payload.extend_from_slice(handler_type);
    payload.extend_from_slice(&[0; 13]);
    mp4_box(b"hdlr", &payload)
}

pub fn stsd(format: &[u8; 4]) -> Vec<u8> {
    let mut payload = words(&[0, 1]);
    payload.extend(mp4_box(format, &[0; 8]));
    mp4_box(b"stsd", &payload)
}

pub fn stsc(entries: &[(u32, u32, u32)]) -> Vec<u8> {
    let mut payload = words(&[0, entries.len() as u32]);
    for &(first_chunk, samples_per_chunk, index) in entries {
        payload.extend(words(&[first_chunk, samples_per_chunk, index]));
    }
    mp4_box(b"stsc", &payload)
}

pub fn stco(offsets: &[u32]) -> Vec<u8> {
    let mut payload = words(&[0, offsets.len() as u32]);
    payload.extend(words(offsets));
    mp4_box(b"stco", &payload)
}

pub fn co64(offsets: &[u64]) -> Vec<u8> {
    let mut payload = words(&[0, offsets.len() as u32]);
    payload.extend(offsets.iter().flat_map(|v| v.to_be_bytes()));
    mp4_box(b"co64", &payload)
}

/// `trak > mdia > (mdhd, hdlr, minf > stbl)` を組み立てる
pub fn trak(mdhd: Option<Vec<u8>>, handler: &[u8; 4], stbl_children: &[Vec<u8>]) -> Vec<u8> {
    let mut mdia = Vec::new();
    if let Some(payload) = mdhd {
        mdia.push(mp4_box(b"mdhd", &payload));
    }
    mdia.push(hdlr(handler));
    mdia.push(container(b"minf", &[container(b"stbl", stbl_children)]));
    container(b"trak", &[container(b"mdia", &mdia)])
}

/// テレメトリー以外のダミーのトラック
pub fn dummy_trak(handler: &[u8; 4], format: &[u8; 4]) -> Vec<u8> {
    trak(
        Some(mdhd_v0_payload(90000)),
        handler,
        &[stsd(format), stsz_fixed(100, 3), stts(&[(3, 3000)])],
    )
}

pub fn moov(mvhd: Option<Vec<u8>>, traks: &[Vec<u8>]) -> Vec<u8> {
    let mut children = Vec::new();
    if let Some(payload) = mvhd {
        children.push(mp4_box(b"mvhd", &payload));
    }
    children.extend_from_slice(traks);
    container(b"moov", &children)
}

pub fn ftyp() -> Vec<u8> {
    mp4_box(b"ftyp", b"isom\0\0\0\0isomiso2")
}

/// テレメトリーファイルの組み立て方
pub struct TelemetryFile {
    pub samples: Vec<Vec<u8>>,
    pub runs: Vec<(u32, u32)>,
    pub timescale: u32,
    pub creation_secs: u32,
    /// `true` なら全サンプルを一つのチャンクに入れる
    pub single_chunk: bool,
}

impl TelemetryFile {
    pub fn new(samples: Vec<Vec<u8>>, runs: Vec<(u32, u32)>, timescale: u32) -> Self {
        Self {
            samples,
            runs,
            timescale,
            creation_secs: 0,
            single_chunk: false,
        }
    }

    /// `ftyp`, `mdat`, `moov` の順に並んだファイルを組み立てる
    ///
    /// テレメトリートラックは 3 番目（インデックス 2）で、ハンドラーは `meta`、フォーマットは `djmd`
    pub fn build(&self) -> Vec<u8> {
        let ftyp = ftyp();
        let mdat_payload_start = (ftyp.len() + 8) as u32;

        let sizes: Vec<u32> = self.samples.iter().map(|s| s.len() as u32).collect();
        let (stsc_box, stco_box) = if self.single_chunk {
            (
                stsc(&[(1, sizes.len() as u32, 1)]),
                stco(&[mdat_payload_start]),
            )
        } else {
            let mut offsets = Vec::new();
            let mut offset = mdat_payload_start;
            for size in &sizes {
                offsets.push(offset);
                offset += size;
            }
            (stsc(&[(1, 1, 1)]), stco(&offsets))
        };

        let telemetry = trak(
            Some(mdhd_v0_payload(self.timescale)),
            b"meta",
            &[
                stsd(b"djmd"),
                stts(&self.runs),
                stsc_box,
                stsz_variable(&sizes),
                stco_box,
            ],
        );
        let moov = moov(
            Some(mvhd_v0_payload(self.creation_secs)),
            &[
                dummy_trak(b"vide", b"avc1"),
                dummy_trak(b"soun", b"mp4a"),
                telemetry,
            ],
        );

        let mut file = ftyp;
        file.extend(mp4_box(b"mdat", &self.samples.concat()));
        file.extend(moov);
        file
    }
}

pub fn encode_varint(mut v: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let b = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(b);
            return out;
        }
        out.push(b | 0x80);
    }
}

pub fn varint_field(number: u64, v: u64) -> Vec<u8> {
    let mut out = encode_varint(number << 3);
    out.extend(encode_varint(v));
    out
}

pub fn fixed64_field(number: u64, v: f64) -> Vec<u8> {
    let mut out = encode_varint((number << 3) | 1);
    out.extend_from_slice(&v.to_le_bytes());
    out
}

pub fn fixed32_field(number: u64, bytes: [u8; 4]) -> Vec<u8> {
    let mut out = encode_varint((number << 3) | 5);
    out.extend_from_slice(&bytes);
    out
}

pub fn bytes_field(number: u64, bytes: &[u8]) -> Vec<u8> {
    let mut out = encode_varint((number << 3) | 2);
    out.extend(encode_varint(bytes.len() as u64));
    out.extend_from_slice(bytes);
    out
}

/// 度数を 1e7 倍の固定小数点の varint として符号化する
pub fn degrees_field(number: u64, degrees: f64) -> Vec<u8> {
    varint_field(number, (degrees * 1e7).round() as i64 as u64)
}

/// フレームレートの隣に、入れ子メッセージとして緯度経度を持つテレメトリーサンプル
pub fn telemetry_sample(latitude: f64, longitude: f64) -> Vec<u8> {
    let mut position = degrees_field(1, latitude);
    position.extend(degrees_field(2, longitude));

    let mut sample = fixed64_field(1, 29.97);
    sample.extend(bytes_field(4, &position));
    sample
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
