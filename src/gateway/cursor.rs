use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const CURSOR_PREFIX: &str = "cursor:";

/// 跳过 `offset` 个元素的分页游标（远端格式：base64("cursor:<offset>")）
pub fn encode(offset: u32) -> String {
    STANDARD.encode(format!("{}{}", CURSOR_PREFIX, offset))
}

/// 第 `position`（1-based）个元素对应的 `after` 参数；第一个元素不需要游标
pub fn after_for_position(position: u32) -> Option<String> {
    match position {
        0 | 1 => None,
        p => Some(encode(p - 1)),
    }
}

pub fn decode(cursor: &str) -> Option<u32> {
    let bytes = STANDARD.decode(cursor).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.strip_prefix(CURSOR_PREFIX)?.parse().ok()
}
