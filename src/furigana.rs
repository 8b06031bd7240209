//! 振假名切分：把一个词的平假名读音分配到表层形中的汉字段上。
//!
//! 混合汉字与假名的词（送假名、前缀假名、中间假名）按以下方式对齐：
//! 先剥离首尾连续的假名，再在中间区域交替切出汉字段和假名段。每个汉字段的
//! 读音终点由下一个中间假名段（转为平假名）在读音串里的位置决定；没有下一个
//! 假名段时，汉字段取走除去首尾假名之外的剩余读音。
//!
//! 已知局限：如果汉字本身的读音里恰好包含后面那段假名（如「聞き手」读作
//! ききて，「聞」读 き，后接假名也是 き），锚点会在错误的位置命中，整段剩余读音
//! 会被分给第一个汉字段，后面的汉字段没有读音。这个行为保留不修。

use crate::kana::{has_kanji, is_all_kanji, is_kanji, katakana_to_hiragana};
use crate::models::TokenPart;

/// 根据表层形和读音生成 TokenPart 列表，各部分文本拼接后等于表层形
pub fn token_parts(surface: &str, reading: Option<&str>) -> Vec<TokenPart> {
    if surface.is_empty() {
        return Vec::new();
    }

    // 没有汉字：假名、片假名、标点、数字、罗马字都不需要读音
    if !has_kanji(surface) {
        return vec![TokenPart::plain(surface)];
    }

    match reading.filter(|r| !r.is_empty()) {
        // 熟语整体注音，不按字拆分
        Some(reading) if is_all_kanji(surface) => {
            vec![TokenPart::with_reading(surface, reading)]
        }
        Some(reading) => align_reading(surface, reading),
        None => vec![TokenPart::plain(surface)],
    }
}

/// 混合词的读音对齐，例如 食べ/たべ → [食(た), べ]，言い/いい → [言(い), い]
pub fn align_reading(surface: &str, reading: &str) -> Vec<TokenPart> {
    let chars: Vec<char> = surface.chars().collect();
    let reading: Vec<char> = reading.chars().collect();

    let prefix_len = chars.iter().take_while(|c| !is_kanji(**c)).count();
    if prefix_len == chars.len() {
        return vec![TokenPart::plain(surface)];
    }
    let suffix_len = chars.iter().rev().take_while(|c| !is_kanji(**c)).count();
    let middle_end = chars.len() - suffix_len;

    // 片假名转平假名是逐字映射，长度不变
    let reading_end = reading.len().saturating_sub(suffix_len);

    let mut parts = Vec::new();
    if prefix_len > 0 {
        parts.push(TokenPart::plain(collect(&chars, 0, prefix_len)));
    }

    let mut idx = prefix_len;
    let mut reading_idx = prefix_len;

    // 中间区域以汉字开头，每轮切出一个汉字段和其后的假名段
    while idx < middle_end {
        let kanji_start = idx;
        while idx < middle_end && is_kanji(chars[idx]) {
            idx += 1;
        }
        let kanji_text = collect(&chars, kanji_start, idx);

        if idx < middle_end {
            // 汉字段后面还有中间假名，用它作锚点
            let kana_start = idx;
            while idx < middle_end && !is_kanji(chars[idx]) {
                idx += 1;
            }
            let mid_kana = collect(&chars, kana_start, idx);
            let anchor: Vec<char> = katakana_to_hiragana(&mid_kana).chars().collect();

            let kanji_reading = match find_from(&reading, &anchor, reading_idx) {
                Some(pos) if pos > reading_idx => {
                    let r = collect(&reading, reading_idx, pos);
                    reading_idx = pos + anchor.len();
                    r
                }
                _ => {
                    let r = collect(&reading, reading_idx, reading_end);
                    reading_idx = reading_end;
                    r
                }
            };

            parts.push(kanji_part(kanji_text, kanji_reading));
            parts.push(TokenPart::plain(mid_kana));
        } else {
            let kanji_reading = collect(&reading, reading_idx, reading_end);
            parts.push(kanji_part(kanji_text, kanji_reading));
        }
    }

    if suffix_len > 0 {
        parts.push(TokenPart::plain(collect(&chars, middle_end, chars.len())));
    }

    parts
}

fn kanji_part(text: String, reading: String) -> TokenPart {
    if reading.is_empty() {
        TokenPart::plain(text)
    } else {
        TokenPart::with_reading(text, reading)
    }
}

fn collect(chars: &[char], start: usize, end: usize) -> String {
    let end = end.min(chars.len());
    if start >= end {
        return String::new();
    }
    chars[start..end].iter().collect()
}

fn find_from(haystack: &[char], needle: &[char], start: usize) -> Option<usize> {
    if start > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(start);
    }
    haystack[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + start)
}
