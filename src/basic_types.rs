use core::time::Duration;
use std::time::SystemTime;

use crate::{Decode, Result};

/// 四文字で表現されるボックスの種別
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoxType(pub [u8; 4]);

impl BoxType {
    /// `moov` ボックス（ファイル全体のインデックス）
    pub const MOOV: Self = Self(*b"moov");

    /// `mvhd` ボックス
    pub const MVHD: Self = Self(*b"mvhd");

    /// `trak` ボックス
    pub const TRAK: Self = Self(*b"trak");

    /// `mdia` ボックス
    pub const MDIA: Self = Self(*b"mdia");

    /// `mdhd` ボックス
    pub const MDHD: Self = Self(*b"mdhd");

    /// `hdlr` ボックス
    pub const HDLR: Self = Self(*b"hdlr");

    /// `minf` ボックス
    pub const MINF: Self = Self(*b"minf");

    /// `stbl` ボックス
    pub const STBL: Self = Self(*b"stbl");

    /// `stsd` ボックス
    pub const STSD: Self = Self(*b"stsd");

    /// `stts` ボックス
    pub const STTS: Self = Self(*b"stts");

    /// `stsc` ボックス
    pub const STSC: Self = Self(*b"stsc");

    /// `stsz` ボックス
    pub const STSZ: Self = Self(*b"stsz");

    /// `stco` ボックス
    pub const STCO: Self = Self(*b"stco");

    /// `co64` ボックス
    pub const CO64: Self = Self(*b"co64");

    /// 種別を表すバイト列を返す
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// 子ボックスを持つコンテナとして再帰的に走査すべき種別かどうか
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::MOOV | Self::TRAK | Self::MDIA | Self::MINF | Self::STBL
        )
    }
}

impl core::fmt::Debug for BoxType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Ok(ty) = core::str::from_utf8(&self.0) {
            f.debug_tuple("BoxType").field(&ty).finish()
        } else {
            f.debug_tuple("BoxType").field(&self.0).finish()
        }
    }
}

impl core::fmt::Display for BoxType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Ok(ty) = core::str::from_utf8(&self.0) {
            return write!(f, "{ty}");
        }
        write!(f, "{:?}", self.0)
    }
}

/// ボックスのサイズ
///
/// 通常は 32 bit のサイズフィールドが使われるが、4 GB を超えるような `mdat` ボックスでは
/// サイズフィールドに 1 を入れて、種別の直後に 64 bit のサイズを配置する形式が使われる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum BoxSize {
    U32(u32),
    U64(u64),
}

impl BoxSize {
    /// ボックスのサイズの値を取得する
    pub const fn get(self) -> u64 {
        match self {
            BoxSize::U32(v) => v as u64,
            BoxSize::U64(v) => v,
        }
    }
}

/// ボックスのヘッダー部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxHeader {
    /// ボックスの種別
    pub box_type: BoxType,

    /// ボックスのサイズ（ヘッダー部分を含む）
    pub box_size: BoxSize,
}

impl BoxHeader {
    /// ヘッダーの最小バイト数
    pub const MIN_SIZE: usize = 8;

    /// ヘッダーの最大バイト数（64 bit サイズ形式）
    pub const MAX_SIZE: usize = 16;

    /// ヘッダーをエンコードした際のバイト数を返す
    pub const fn external_size(self) -> usize {
        match self.box_size {
            BoxSize::U32(_) => Self::MIN_SIZE,
            BoxSize::U64(_) => Self::MAX_SIZE,
        }
    }

    /// ペイロード部分のバイト数を返す
    ///
    /// サイズが 0（ファイル末尾まで続く可変長ボックス）の場合や、
    /// ヘッダー自体のサイズより小さい場合には、走査を続けられないので [`None`] が返される
    pub fn payload_size(self) -> Option<u64> {
        let size = self.box_size.get();
        if size == 0 {
            return None;
        }
        size.checked_sub(self.external_size() as u64)
    }
}

impl Decode for BoxHeader {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut offset = 0;
        let size = u32::decode_at(buf, &mut offset)?;
        let box_type = BoxType(<[u8; 4]>::decode_at(buf, &mut offset)?);
        let box_size = if size == 1 {
            BoxSize::U64(u64::decode_at(buf, &mut offset)?)
        } else {
            BoxSize::U32(size)
        };
        Ok((Self { box_type, box_size }, offset))
    }
}

/// バッファまたはファイル内で見つかったボックスのペイロードの位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxRange {
    /// ボックスの種別
    pub box_type: BoxType,

    /// ペイロードの開始位置（バイト単位）
    pub payload_offset: u64,

    /// ペイロードのバイト数
    pub payload_length: u64,
}

impl BoxRange {
    /// ペイロードの終端位置を返す
    pub const fn payload_end(&self) -> u64 {
        self.payload_offset.saturating_add(self.payload_length)
    }

    /// `buf` の中からペイロード部分を切り出す
    ///
    /// `buf` の末尾を越える部分は切り捨てられる
    pub fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        let start = (self.payload_offset as usize).min(buf.len());
        let end = (self.payload_end() as usize).min(buf.len());
        &buf[start..end]
    }
}

/// MP4 ファイル内で使われる時刻形式（1904/1/1 00:00:00 UTC からの経過秒数）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mp4FileTime(u64);

impl Mp4FileTime {
    /// 1904/1/1 から 1970/1/1 までの経過秒数
    const UNIX_EPOCH_DELTA: u64 = 2082844800;

    /// 1904/1/1 からの経過秒数を引数にとって [`Mp4FileTime`] インスタンスを作成する
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// 1904/1/1 からの経過秒数を返す
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// UNIX EPOCH を起点とした経過時間を受け取って、対応する [`Mp4FileTime`] インスタンスを作成する
    pub const fn from_unix_time(unix_time: Duration) -> Self {
        Self::from_secs(unix_time.as_secs() + Self::UNIX_EPOCH_DELTA)
    }

    /// UNIX EPOCH を起点とした経過時間を返す
    ///
    /// 1970/1/1 より前の時刻の場合には [`None`] が返される
    pub const fn to_unix_time(self) -> Option<Duration> {
        match self.0.checked_sub(Self::UNIX_EPOCH_DELTA) {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        }
    }

    /// 対応する [`SystemTime`] を返す
    pub fn to_system_time(self) -> Option<SystemTime> {
        SystemTime::UNIX_EPOCH.checked_add(self.to_unix_time()?)
    }
}
