//! テレメトリーサンプルのペイロードから緯度経度の候補を探し出すためのモジュール
use crate::{
    plausibility::{is_valid_latitude, is_valid_longitude},
    schema::{BlindDecoder, Number, SchemaGuesser, Value},
    wire::{FieldReader, FieldValue},
};

/// 1e7 倍の固定小数点で表現された度数を実数に戻すための係数
const FIXED_POINT_SCALE: f64 = 1e7;

/// 1e7 倍の固定小数点とみなす整数の絶対値の範囲（両端を含まない）
const FIXED_POINT_RANGE: (f64, f64) = (1e6, 2e9);

/// 浮動小数点数として取り出す値の絶対値の上限
const FLOAT_SANITY_BOUND: f64 = 1e10;

/// ワイヤーフォーマットの走査で一つのサンプルから取り出す数値の上限
const MAX_WIRE_NUMBERS: usize = 5000;

/// ワイヤーフォーマットの走査で入れ子メッセージを辿る最大の深さ
const MAX_WIRE_DEPTH: usize = 64;

/// 緯度経度の候補（まだフィルターにかけられていないもの）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsCandidate {
    /// 緯度
    pub latitude: f64,

    /// 経度
    pub longitude: f64,
}

impl GpsCandidate {
    /// 隣り合う二つの数値を緯度経度の組として解釈する
    ///
    /// `(a, b)` の順で緯度経度の範囲に収まればそのまま、`(b, a)` の順で収まれば入れ替えた組を返す
    pub fn from_adjacent(a: f64, b: f64) -> Option<Self> {
        if is_valid_latitude(a) && is_valid_longitude(b) {
            Some(Self {
                latitude: a,
                longitude: b,
            })
        } else if is_valid_latitude(b) && is_valid_longitude(a) {
            Some(Self {
                latitude: b,
                longitude: a,
            })
        } else {
            None
        }
    }
}

/// テレメトリーサンプルのペイロードから緯度経度の候補を探すスキャナー
///
/// 次の二段階で候補を探す:
///
/// 1. スキーマ推測デコーダーがあれば、それでペイロードを入れ子の構造にデコードし、
///    同じ階層で隣り合う数値の組を候補とする
/// 2. 1 で何も見つからなかった場合には、ワイヤーフォーマットを直接走査して数値を取り出し、
///    隣り合う数値の組を候補とする
pub struct GpsScanner {
    guesser: Option<Box<dyn SchemaGuesser>>,
}

impl GpsScanner {
    /// 組み込みの [`BlindDecoder`] を使うスキャナーを生成する
    pub fn new() -> Self {
        Self::with_guesser(BlindDecoder)
    }

    /// 指定のスキーマ推測デコーダーを使うスキャナーを生成する
    pub fn with_guesser<G: 'static + SchemaGuesser>(guesser: G) -> Self {
        Self {
            guesser: Some(Box::new(guesser)),
        }
    }

    /// スキーマ推測デコーダーを使わず、ワイヤーフォーマットの走査のみを行うスキャナーを生成する
    pub fn wire_only() -> Self {
        Self { guesser: None }
    }

    /// ペイロードから緯度経度の候補を探す
    pub fn scan(&self, payload: &[u8]) -> Vec<GpsCandidate> {
        if let Some(root) = self.guesser.as_ref().and_then(|g| g.guess(payload)) {
            let mut candidates = Vec::new();
            collect_value_pairs(&root, &mut candidates);
            if !candidates.is_empty() {
                return candidates;
            }
        }
        scan_wire(payload)
    }
}

impl Default for GpsScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for GpsScanner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GpsScanner")
            .field("guesser", &self.guesser.is_some())
            .finish()
    }
}

/// デコード済みの値の木を再帰的に辿り、同じ階層で隣り合う数値の組を候補として集める
fn collect_value_pairs(value: &Value, out: &mut Vec<GpsCandidate>) {
    for child in value.children() {
        collect_value_pairs(child, out);
    }

    let numbers: Vec<Option<f64>> = value.children().map(normalize_leaf).collect();
    for pair in numbers.windows(2) {
        if let [Some(a), Some(b)] = *pair
            && let Some(candidate) = GpsCandidate::from_adjacent(a, b)
        {
            out.push(candidate);
        }
    }
}

/// 葉の数値を度数として解釈する
///
/// 1e7 倍の固定小数点らしい大きさの整数は 1e7 で割り、それ以外の数値はそのまま返す
fn normalize_leaf(value: &Value) -> Option<f64> {
    match value.as_number()? {
        Number::Int(i) => {
            let v = i as f64;
            let magnitude = v.abs();
            if FIXED_POINT_RANGE.0 < magnitude && magnitude < FIXED_POINT_RANGE.1 {
                Some(v / FIXED_POINT_SCALE)
            } else {
                Some(v)
            }
        }
        Number::Float(f) => Some(f),
    }
}

/// スキーマなしでワイヤーフォーマットを走査し、隣り合う数値の組を候補として返す
pub fn scan_wire(payload: &[u8]) -> Vec<GpsCandidate> {
    let mut numbers = Vec::new();
    collect_wire_numbers(payload, 0, &mut numbers);
    numbers
        .windows(2)
        .filter_map(|pair| GpsCandidate::from_adjacent(pair[0], pair[1]))
        .collect()
}

/// ワイヤーフォーマットから度数として解釈しうる数値を順に取り出す
///
/// 不正なタグや、バイト列の末尾を越える長さに到達した時点で走査を打ち切るが、
/// それまでに取り出した数値は保持する
fn collect_wire_numbers(buf: &[u8], depth: usize, out: &mut Vec<f64>) {
    for field in FieldReader::new(buf) {
        if out.len() >= MAX_WIRE_NUMBERS {
            break;
        }
        let Ok(field) = field else {
            break;
        };

        match field.value {
            FieldValue::Varint(v) => {
                let degrees = FieldValue::varint_as_i64(v) as f64 / FIXED_POINT_SCALE;
                if is_valid_longitude(degrees) {
                    out.push(degrees);
                }
            }
            FieldValue::Fixed64(b) => {
                let d = f64::from_le_bytes(b);
                if d.abs() < FLOAT_SANITY_BOUND {
                    out.push(d);
                }
            }
            FieldValue::Fixed32(b) => {
                let degrees = i32::from_le_bytes(b) as f64 / FIXED_POINT_SCALE;
                if is_valid_longitude(degrees) {
                    out.push(degrees);
                }
                let f = f32::from_le_bytes(b) as f64;
                if f.abs() < FLOAT_SANITY_BOUND && out.len() < MAX_WIRE_NUMBERS {
                    out.push(f);
                }
            }
            FieldValue::LengthDelimited(bytes) => {
                if depth < MAX_WIRE_DEPTH {
                    collect_wire_numbers(bytes, depth + 1, out);
                }
            }
        }
    }
}
