// 字符分类与假名转换

const KATAKANA_SHIFT: u32 = 0x60;

/// CJK 统一表意文字（0x4E00–0x9FFF）
pub fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

pub fn is_hiragana(c: char) -> bool {
    ('\u{3041}'..='\u{309F}').contains(&c)
}

pub fn is_katakana(c: char) -> bool {
    ('\u{30A0}'..='\u{30FF}').contains(&c)
}

pub fn has_kanji(text: &str) -> bool {
    text.chars().any(is_kanji)
}

pub fn is_all_kanji(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_kanji)
}

/// 外来语判定：全部由 ァ–ヶ 或长音符 ー 组成
pub fn is_katakana_word(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| ('\u{30A1}'..='\u{30F6}').contains(&c) || c == 'ー')
}

/// 片假名转平假名，只平移 ァ–ヶ，其余字符（ー、ヽヾ、ヷ 等）保持不变
pub fn katakana_to_hiragana(text: &str) -> String {
    text.chars()
        .map(|c| {
            if ('\u{30A1}'..='\u{30F6}').contains(&c) {
                char::from_u32(c as u32 - KATAKANA_SHIFT).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_katakana_to_hiragana() {
        assert_eq!(katakana_to_hiragana("タベル"), "たべる");
        assert_eq!(katakana_to_hiragana("ヴァ"), "ゔぁ");
        // 长音符和迭代符不转换
        assert_eq!(katakana_to_hiragana("コーヒー"), "こーひー");
        assert_eq!(katakana_to_hiragana("ヽヷ"), "ヽヷ");
        assert_eq!(katakana_to_hiragana("abc漢字"), "abc漢字");
        assert_eq!(katakana_to_hiragana(""), "");
    }

    #[test]
    fn test_kanji_detection() {
        assert!(is_kanji('言'));
        assert!(!is_kanji('い'));
        assert!(!is_kanji('々'));
        assert!(is_all_kanji("友達"));
        assert!(!is_all_kanji("食べる"));
        assert!(!is_all_kanji(""));
        assert!(has_kanji("お茶"));
        assert!(!has_kanji("カフェ"));
    }

    #[test]
    fn test_katakana_word() {
        assert!(is_katakana_word("コーヒー"));
        assert!(is_katakana_word("スマートフォン"));
        assert!(!is_katakana_word("コーヒーを"));
        assert!(!is_katakana_word("・"));
        assert!(!is_katakana_word(""));
    }
}
