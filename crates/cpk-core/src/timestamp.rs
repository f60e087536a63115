//! 90 kHz 时钟常量与换算.
//!
//! FILM 解封装器的所有时间戳都以 90 kHz 为单位, 在建表时一次性算出,
//! 分发与定位阶段直接复用, 不再重复换算.

use crate::rational::Rational;

/// 表示"未定义"的时间戳值
pub const NOPTS_VALUE: i64 = i64::MIN;

/// 展示时间戳时钟频率 (每秒 90000 个单位)
pub const PTS_CLOCK_HZ: u64 = 90_000;

/// 展示时间戳的时间基 (1/90000)
pub const PTS_TIME_BASE: Rational = Rational::new(1, PTS_CLOCK_HZ as i32);

/// 按比例换算到 90 kHz 时钟并截断: `90000 * count / rate`
///
/// `rate` 为 0 时返回 `None`.
pub fn ticks_to_90k_floor(count: u64, rate: u64) -> Option<i64> {
    if rate == 0 {
        return None;
    }
    let v = u128::from(count) * u128::from(PTS_CLOCK_HZ) / u128::from(rate);
    i64::try_from(v).ok()
}

/// 按比例换算到 90 kHz 时钟并四舍五入: `round(90000 * count / rate)`
///
/// `rate` 为 0 时返回 `None`.
pub fn ticks_to_90k_rounded(count: u64, rate: u64) -> Option<i64> {
    if rate == 0 {
        return None;
    }
    let rate = u128::from(rate);
    let v = (u128::from(count) * u128::from(PTS_CLOCK_HZ) + rate / 2) / rate;
    i64::try_from(v).ok()
}
