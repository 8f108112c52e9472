//! 以字符串形式序列化 `Pubkey` / `Signature` 等实现了 `Display` 的字段。

pub mod display_string {
    use std::fmt::Display;

    use serde::Serializer;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }
}

/// 聚合器的数量字段可能是字符串也可能是数字。
pub(crate) fn lenient_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(number) => number.as_u64(),
        serde_json::Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn lenient_decimal(value: &serde_json::Value) -> Option<rust_decimal::Decimal> {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    let raw = match value {
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::String(raw) => raw.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}
