//! 词汇难度校验（Learning Value Score）。
//!
//! 一篇分级读物需要同时满足三个独立条件：
//! 1. 有学习价值：目标等级的词足够多
//! 2. 不太难：高于目标等级的词不多
//! 3. 不生僻：不在任何等级词表里的词不多
//!
//! 阈值都是 `base + total_tokens / scale`，随故事长度增长。

use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::kana::is_katakana_word;
use crate::levels::{JlptLevel, WordLevelIndex};
use crate::models::Token;

const MAX_EXAMPLE_WORDS: usize = 20;

const UNKNOWN_WORDS_BASE: usize = 8;
const UNKNOWN_WORDS_SCALE: usize = 100;

// 各等级都会出现、没有区分度的词：助词、标点、数字、基础动词、指示词、
// 助动词和活用词尾、语法固定搭配、基础副词和连词、时间量词、基础名词
const IGNORED_WORDS: &[&str] = &[
    "は", "が", "を", "に", "で", "と", "も", "の", "へ", "から", "まで", "より", "や", "か",
    "ね", "よ", "な", "わ", "さ", "ぞ", "ぜ", "け", "こそ", "だけ", "しか", "ばかり",
    "。", "、", "！", "？", "「", "」", "『", "』", "…", "ー", "・",
    "一", "二", "三", "四", "五", "六", "七", "八", "九", "十", "百", "千", "万",
    "する", "いる", "ある", "なる", "できる", "くる", "いく", "みる", "くれる", "もらう",
    "この", "その", "あの", "どの", "これ", "それ", "あれ", "どれ", "ここ", "そこ", "あそこ",
    "どこ", "こう", "そう", "ああ", "どう",
    "です", "ます", "た", "て", "ない", "ば", "う", "よう", "だ", "だろう", "でしょう",
    "れる", "られる", "せる", "させる", "たい", "ほしい", "ぬ", "ん", "ている", "てある",
    "ておく", "てしまう", "ていく", "てくる", "しまう", "し", "ながら", "たり", "つつ",
    "ので", "のに", "のは", "のが", "のを", "について", "として", "によって", "において",
    "という", "ということ", "というのは",
    "とても", "すごく", "本当に", "もう", "まだ", "もっと", "ちょっと", "すぐ", "ずっと",
    "たくさん", "少し", "全然", "絶対", "きっと", "たぶん", "やっぱり", "やはり",
    "そして", "でも", "しかし", "だから", "けれど", "けど", "または", "あるいは",
    "時", "日", "年", "月", "週", "分", "秒", "回", "度", "番", "目", "時間", "今日", "明日",
    "昨日", "毎日", "毎週", "毎月", "毎年",
    "人", "物", "事", "所", "方", "前", "後", "中", "上", "下", "外", "内", "ぐらい", "くらい",
    "ころ", "頃", "ため", "まま", "ほう",
];

/// 某个等级在给定故事长度下的三个阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub min_target: usize,
    /// None 表示没有上限（最高等级）
    pub max_above: Option<usize>,
    pub max_unknown: usize,
}

impl Thresholds {
    pub fn for_level(level: JlptLevel, total_tokens: usize) -> Self {
        let (base, scale) = match level {
            JlptLevel::N5 => (2, 150),
            JlptLevel::N4 => (3, 120),
            JlptLevel::N3 => (4, 100),
            JlptLevel::N2 => (5, 80),
            JlptLevel::N1 => (6, 80),
        };
        let min_target = base + total_tokens / scale;

        let max_above = match level {
            JlptLevel::N5 => Some((5, 100)),
            JlptLevel::N4 | JlptLevel::N3 | JlptLevel::N2 => Some((10, 50)),
            JlptLevel::N1 => None,
        }
        .map(|(base, scale)| base + total_tokens / scale);

        Self {
            min_target,
            max_above,
            max_unknown: UNKNOWN_WORDS_BASE + total_tokens / UNKNOWN_WORDS_SCALE,
        }
    }
}

fn round_score<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((score * 1000.0).round() / 1000.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub total_tokens: usize,
    pub unique_words: usize,
    pub words_by_level: BTreeMap<String, usize>,

    pub target_level_count: usize,
    pub above_level_count: usize,
    pub unknown_count: usize,

    pub min_target_threshold: usize,
    pub max_above_threshold: Option<usize>,
    pub max_unknown_threshold: usize,

    pub has_learning_value: bool,
    pub not_too_hard: bool,
    pub not_too_obscure: bool,
    pub passed: bool,

    #[serde(serialize_with = "round_score")]
    pub readability_score: f64,
    pub target_level: String,
    pub message: String,

    #[serde(default)]
    pub target_level_words: Vec<String>,
    #[serde(default)]
    pub above_level_words: Vec<String>,
    #[serde(default)]
    pub unknown_words: Vec<String>,
}

impl ValidationResult {
    /// 没有可校验内容时的中性结果
    fn neutral(
        target_level: &str,
        max_above_threshold: Option<usize>,
        total_tokens: usize,
        message: &str,
    ) -> Self {
        Self {
            total_tokens,
            unique_words: 0,
            words_by_level: BTreeMap::new(),
            target_level_count: 0,
            above_level_count: 0,
            unknown_count: 0,
            min_target_threshold: 0,
            max_above_threshold,
            max_unknown_threshold: 0,
            has_learning_value: true,
            not_too_hard: true,
            not_too_obscure: true,
            passed: true,
            readability_score: 1.0,
            target_level: target_level.to_string(),
            message: message.to_string(),
            target_level_words: Vec::new(),
            above_level_words: Vec::new(),
            unknown_words: Vec::new(),
        }
    }

    fn invalid_level(target_level: &str) -> Self {
        Self {
            has_learning_value: false,
            not_too_hard: false,
            not_too_obscure: false,
            passed: false,
            readability_score: 0.0,
            message: format!("Invalid JLPT level: {}", target_level),
            ..Self::neutral(target_level, Some(0), 0, "")
        }
    }

    pub fn checks_passed(&self) -> usize {
        [self.has_learning_value, self.not_too_hard, self.not_too_obscure]
            .into_iter()
            .filter(|&check| check)
            .count()
    }

    /// 通过的检查更多者更好；相同时比较可读性
    pub fn is_better_than(&self, other: &ValidationResult) -> bool {
        let (mine, theirs) = (self.checks_passed(), other.checks_passed());
        if mine != theirs {
            return mine > theirs;
        }
        self.readability_score > other.readability_score
    }

    /// 需要替换的词：超纲词 + 生僻词
    pub fn problem_words(&self) -> Vec<String> {
        self.above_level_words
            .iter()
            .chain(self.unknown_words.iter())
            .cloned()
            .collect()
    }
}

pub struct VocabularyValidator {
    index: Arc<WordLevelIndex>,
    ignored: HashSet<&'static str>,
}

impl VocabularyValidator {
    pub fn new(index: Arc<WordLevelIndex>) -> Self {
        Self {
            index,
            ignored: IGNORED_WORDS.iter().copied().collect(),
        }
    }

    pub fn get_word_level(&self, word: &str) -> Option<JlptLevel> {
        self.index.get_word_level(word)
    }

    pub fn is_ignored(&self, word: &str) -> bool {
        self.ignored.contains(word)
    }

    pub fn validate(&self, tokens: &[Token], target_level: &str) -> ValidationResult {
        let Ok(level) = target_level.parse::<JlptLevel>() else {
            return ValidationResult::invalid_level(target_level);
        };
        self.validate_level(tokens, level)
    }

    pub fn validate_level(&self, tokens: &[Token], target: JlptLevel) -> ValidationResult {
        let target_name = target.as_str();
        let total_tokens = tokens.len();
        // 最高等级没有超纲上限
        let neutral_above = (!target.is_hardest()).then_some(0);

        if self.index.is_empty() {
            tracing::warn!("JLPT 词表未加载，跳过词汇校验");
            return ValidationResult::neutral(
                target_name,
                neutral_above,
                total_tokens,
                "Validation skipped - word lists not loaded",
            );
        }

        // 去重并保留首次出现顺序
        let mut seen = HashSet::new();
        let words: Vec<&str> = tokens
            .iter()
            .map(Token::lookup_word)
            .filter(|w| !w.is_empty() && !self.is_ignored(w))
            .filter(|w| seen.insert(*w))
            .collect();

        if words.is_empty() {
            return ValidationResult::neutral(
                target_name,
                neutral_above,
                total_tokens,
                "No words to validate",
            );
        }

        let mut words_by_level: BTreeMap<String, usize> = JlptLevel::ALL
            .into_iter()
            .map(|level| (level.as_str().to_string(), 0))
            .collect();
        words_by_level.insert("unknown".to_string(), 0);
        words_by_level.insert("katakana".to_string(), 0);

        let mut target_words = Vec::new();
        let mut above_words = Vec::new();
        let mut below_count = 0;
        let mut unknown_words = Vec::new();

        for word in &words {
            let is_katakana = is_katakana_word(word);

            let bucket = match self.index.get_word_level(word) {
                None if is_katakana => "katakana",
                None => {
                    unknown_words.push(word.to_string());
                    "unknown"
                }
                Some(level) => {
                    if level == target {
                        target_words.push(word.to_string());
                    } else if level < target {
                        below_count += 1;
                    } else if !is_katakana {
                        // 外来语即使超纲也不扣分
                        above_words.push(word.to_string());
                    }
                    level.as_str()
                }
            };
            *words_by_level.entry(bucket.to_string()).or_default() += 1;
        }

        let thresholds = Thresholds::for_level(target, total_tokens);
        let target_count = target_words.len();
        let above_count = above_words.len();
        let unknown_count = unknown_words.len();
        let unique_words = words.len();

        let has_learning_value = target_count >= thresholds.min_target;
        let not_too_hard = thresholds.max_above.is_none_or(|max| above_count <= max);
        let not_too_obscure = unknown_count <= thresholds.max_unknown;
        let passed = has_learning_value && not_too_hard && not_too_obscure;

        let readability_score = (target_count + below_count) as f64 / unique_words as f64;

        let message = if passed {
            format!("Story vocabulary is appropriate for {}", target_name)
        } else {
            let mut issues = Vec::new();
            if !has_learning_value {
                issues.push(format!(
                    "not enough {} words ({}/{})",
                    target_name, target_count, thresholds.min_target
                ));
            }
            if let (false, Some(max)) = (not_too_hard, thresholds.max_above) {
                issues.push(format!("too many above-level words ({}/{})", above_count, max));
            }
            if !not_too_obscure {
                issues.push(format!(
                    "too many unknown words ({}/{})",
                    unknown_count, thresholds.max_unknown
                ));
            }
            format!("Story failed {} validation: {}", target_name, issues.join(", "))
        };

        target_words.truncate(MAX_EXAMPLE_WORDS);
        above_words.truncate(MAX_EXAMPLE_WORDS);
        unknown_words.truncate(MAX_EXAMPLE_WORDS);

        ValidationResult {
            total_tokens,
            unique_words,
            words_by_level,
            target_level_count: target_count,
            above_level_count: above_count,
            unknown_count,
            min_target_threshold: thresholds.min_target,
            max_above_threshold: thresholds.max_above,
            max_unknown_threshold: thresholds.max_unknown,
            has_learning_value,
            not_too_hard,
            not_too_obscure,
            passed,
            readability_score,
            target_level: target_name.to_string(),
            message,
            target_level_words: target_words,
            above_level_words: above_words,
            unknown_words,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PartOfSpeech, TokenPart};

    fn token(word: &str) -> Token {
        Token {
            surface: word.to_string(),
            base_form: word.to_string(),
            part_of_speech: PartOfSpeech::Noun,
            parts: vec![TokenPart::plain(word)],
        }
    }

    fn validator() -> VocabularyValidator {
        let index = WordLevelIndex::from_lists([
            (JlptLevel::N5, vec!["東", "食べる", "学校"]),
            (JlptLevel::N4, vec!["字"]),
            (JlptLevel::N3, vec!["環境", "商人"]),
            (JlptLevel::N2, vec!["銅", "パトロール"]),
            (JlptLevel::N1, vec!["曖昧"]),
        ]);
        VocabularyValidator::new(Arc::new(index))
    }

    #[test]
    fn test_threshold_values() {
        let t = Thresholds::for_level(JlptLevel::N3, 500);
        assert_eq!(t.min_target, 9);
        assert_eq!(t.max_above, Some(20));
        assert_eq!(t.max_unknown, 13);

        let t = Thresholds::for_level(JlptLevel::N3, 1000);
        assert_eq!(t.min_target, 14);
        assert_eq!(t.max_above, Some(30));
        assert_eq!(t.max_unknown, 18);

        assert_eq!(Thresholds::for_level(JlptLevel::N5, 500).max_above, Some(10));
        assert_eq!(Thresholds::for_level(JlptLevel::N1, 500).max_above, None);
    }

    #[test]
    fn test_thresholds_monotonic_in_length() {
        for level in JlptLevel::ALL {
            let mut prev = Thresholds::for_level(level, 0);
            for n in (1..5000).step_by(37) {
                let t = Thresholds::for_level(level, n);
                assert!(t.min_target >= prev.min_target);
                assert!(t.max_unknown >= prev.max_unknown);
                assert!(t.max_above >= prev.max_above);
                let doubled = Thresholds::for_level(level, n * 2);
                assert!(doubled.min_target >= t.min_target);
                assert!(doubled.max_unknown >= t.max_unknown);
                prev = t;
            }
        }
    }

    #[test]
    fn test_words_by_level_tracked() {
        let tokens: Vec<Token> = ["東", "字", "環境", "銅", "曖昧", "xyzabc", "カフェ"]
            .into_iter()
            .map(token)
            .collect();
        let result = validator().validate(&tokens, "N3");

        assert_eq!(result.words_by_level["N5"], 1);
        assert_eq!(result.words_by_level["N4"], 1);
        assert_eq!(result.words_by_level["N3"], 1);
        assert_eq!(result.words_by_level["N2"], 1);
        assert_eq!(result.words_by_level["N1"], 1);
        assert_eq!(result.words_by_level["unknown"], 1);
        assert_eq!(result.words_by_level["katakana"], 1);
        assert_eq!(result.target_level_count, 1);
        assert_eq!(result.above_level_count, 2);
        assert_eq!(result.unknown_count, 1);
        assert_eq!(result.unknown_words, vec!["xyzabc"]);
    }

    #[test]
    fn test_ignored_words_are_not_counted() {
        let tokens: Vec<Token> = ["は", "が", "。", "する", "学校", "です"]
            .into_iter()
            .map(token)
            .collect();
        let result = validator().validate(&tokens, "N5");
        assert_eq!(result.total_tokens, 6);
        assert_eq!(result.unique_words, 1);
    }

    #[test]
    fn test_only_ignored_words_is_neutral_pass() {
        let tokens: Vec<Token> = ["は", "が", "を"].into_iter().map(token).collect();
        let result = validator().validate(&tokens, "N4");
        assert!(result.passed);
        assert_eq!(result.unique_words, 0);
        assert_eq!(result.total_tokens, 3);
        assert_eq!(result.readability_score, 1.0);
    }

    #[test]
    fn test_base_form_preferred_over_surface() {
        let mut t = token("食べ");
        t.base_form = "食べる".to_string();
        let result = validator().validate(&[t], "N5");
        assert_eq!(result.target_level_words, vec!["食べる"]);

        let mut t = token("学校");
        t.base_form = String::new();
        let result = validator().validate(&[t], "N5");
        assert_eq!(result.target_level_words, vec!["学校"]);
    }

    #[test]
    fn test_katakana_above_level_not_penalized() {
        let tokens: Vec<Token> = ["パトロール", "学校"].into_iter().map(token).collect();
        let result = validator().validate(&tokens, "N5");
        assert_eq!(result.above_level_count, 0);
        assert!(result.above_level_words.is_empty());
        assert_eq!(result.words_by_level["N2"], 1);
    }

    #[test]
    fn test_n1_has_no_above_limit() {
        let result = validator().validate(&[token("曖昧")], "N1");
        assert_eq!(result.max_above_threshold, None);
        assert!(result.not_too_hard);
    }

    #[test]
    fn test_neutral_result_has_no_above_limit_for_n1() {
        let particles: Vec<Token> = ["は", "が"].into_iter().map(token).collect();
        let result = validator().validate(&particles, "N1");
        assert!(result.passed);
        assert_eq!(result.max_above_threshold, None);

        let result = validator().validate(&particles, "N2");
        assert_eq!(result.max_above_threshold, Some(0));

        let empty = VocabularyValidator::new(Arc::new(WordLevelIndex::default()));
        let result = empty.validate(&[token("曖昧")], "N1");
        assert_eq!(result.max_above_threshold, None);
    }

    #[test]
    fn test_invalid_level() {
        let result = validator().validate(&[token("東")], "N9");
        assert!(!result.passed);
        assert!(result.message.contains("Invalid"));
        assert_eq!(result.checks_passed(), 0);

        let result = validator().validate(&[token("東")], "n5");
        assert!(!result.passed);
        assert_eq!(result.message, "Invalid JLPT level: n5");
    }

    #[test]
    fn test_empty_index_skips_validation() {
        let v = VocabularyValidator::new(Arc::new(WordLevelIndex::default()));
        let result = v.validate(&[token("曖昧")], "N5");
        assert!(result.passed);
        assert!(result.message.contains("skipped"));
    }

    #[test]
    fn test_example_lists_capped() {
        let words: Vec<String> = (0..30).map(|i| format!("謎{}", i)).collect();
        let tokens: Vec<Token> = words.iter().map(|w| token(w)).collect();
        let result = validator().validate(&tokens, "N5");
        assert_eq!(result.unknown_count, 30);
        assert_eq!(result.unknown_words.len(), MAX_EXAMPLE_WORDS);
        assert_eq!(result.unknown_words[0], "謎0");
    }

    #[test]
    fn test_better_validation_ordering() {
        let v = validator();
        let good = v.validate(&[token("学校")], "N5");
        let bad = v.validate(&[token("曖昧")], "N5");
        assert!(good.checks_passed() >= bad.checks_passed());
        assert!(good.is_better_than(&bad));
        assert!(!bad.is_better_than(&good));
        assert!(!good.is_better_than(&good));
    }

    #[test]
    fn test_serialized_field_names() {
        let result = validator().validate(&[token("東")], "N5");
        let json = serde_json::to_value(&result).unwrap();
        for key in [
            "totalTokens",
            "uniqueWords",
            "wordsByLevel",
            "targetLevelCount",
            "hasLearningValue",
            "notTooHard",
            "notTooObscure",
            "readabilityScore",
            "passed",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
