//! 緯度経度の候補がもっともらしいかどうかを判定するためのモジュール

/// 緯度経度と誤検出しやすい、代表的な動画のフレームレート
pub const COMMON_FRAME_RATES: [f64; 6] = [23.976, 24.0, 29.97, 30.0, 59.94, 60.0];

/// フレームレートとの一致とみなす差
const FRAME_RATE_TOLERANCE: f64 = 0.01;

/// 原点付近のノイズとみなす絶対値
const NEAR_ZERO: f64 = 0.01;

/// ワイヤーフォーマットの読み違いによるゴミとみなす絶対値
const GARBAGE_MAGNITUDE: f64 = 1e10;

/// strict モードで要求される最小の絶対値
const STRICT_MIN_MAGNITUDE: f64 = 1.0;

/// 緯度として有効な範囲に収まっているかどうか
pub fn is_valid_latitude(v: f64) -> bool {
    (-90.0..=90.0).contains(&v)
}

/// 経度として有効な範囲に収まっているかどうか
pub fn is_valid_longitude(v: f64) -> bool {
    (-180.0..=180.0).contains(&v)
}

/// 緯度経度の候補をふるいにかけるフィルター
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlausibilityFilter {
    /// `true` の場合には、緯度と経度のどちらかの絶対値が 1 未満の組も棄却する
    pub strict: bool,
}

impl PlausibilityFilter {
    /// [`PlausibilityFilter`] インスタンスを生成する
    pub const fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// 緯度経度の組を受け入れるかどうかを判定する
    pub fn accepts(&self, latitude: f64, longitude: f64) -> bool {
        let (lat, lon) = (latitude.abs(), longitude.abs());
        if latitude.is_nan() || longitude.is_nan() {
            return false;
        }
        if lat > 90.0 || lon > 180.0 {
            return false;
        }
        if lat < NEAR_ZERO || lon < NEAR_ZERO {
            return false;
        }
        if lat > GARBAGE_MAGNITUDE || lon > GARBAGE_MAGNITUDE {
            return false;
        }
        let near_frame_rate = |v: f64| {
            COMMON_FRAME_RATES
                .iter()
                .any(|rate| (v - rate).abs() < FRAME_RATE_TOLERANCE)
        };
        if near_frame_rate(latitude) || near_frame_rate(longitude) {
            return false;
        }
        if self.strict && (lat < STRICT_MIN_MAGNITUDE || lon < STRICT_MIN_MAGNITUDE) {
            return false;
        }
        true
    }
}
