//! UI 数量与链上最小单位之间的换算，全程十进制运算。

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{SessionError, SessionResult};

/// rust_decimal 能表示的最大小数位数。
const MAX_SCALE: u8 = 28;
pub const SOL_DECIMALS: u8 = 9;

/// `trunc(amount × 10^decimals)`；非正数、截断后为零或超出 u64 均视为参数错误。
pub fn ui_to_base_units(amount: Decimal, decimals: u8) -> SessionResult<u64> {
    if amount <= Decimal::ZERO {
        return Err(SessionError::validation(format!("数量必须为正数: {amount}")));
    }

    let mut scaled = amount;
    for _ in 0..decimals {
        scaled = scaled.checked_mul(Decimal::TEN).ok_or_else(|| {
            SessionError::validation(format!("数量 {amount} 按 {decimals} 位精度换算后溢出"))
        })?;
    }

    let units = scaled.trunc().to_u64().ok_or_else(|| {
        SessionError::validation(format!("数量 {amount} 超出 u64 最小单位范围"))
    })?;
    if units == 0 {
        return Err(SessionError::validation(format!(
            "数量 {amount} 低于 {decimals} 位精度的最小单位"
        )));
    }
    Ok(units)
}

pub fn base_units_to_ui(units: u64, decimals: u8) -> Decimal {
    if decimals <= MAX_SCALE {
        return Decimal::from_i128_with_scale(i128::from(units), u32::from(decimals)).normalize();
    }
    let mut value = Decimal::from_i128_with_scale(i128::from(units), u32::from(MAX_SCALE));
    for _ in MAX_SCALE..decimals {
        value /= Decimal::TEN;
    }
    value.normalize()
}

pub fn lamports_to_sol(lamports: u64) -> Decimal {
    base_units_to_ui(lamports, SOL_DECIMALS)
}
