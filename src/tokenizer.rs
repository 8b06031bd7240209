//! 日语分词：形态素解析 + 振假名对齐 + 外来语复合词合并。
//!
//! 形态素解析器通过 [`MorphAnalyzer`] 注入。生产环境使用 vibrato 加载
//! zstd 压缩的 IPADIC 词典；词典缺失时退回按文字种类切分的 [`ScriptAnalyzer`]，
//! 保证阅读器在没有词典的情况下仍然可用（没有读音和词性）。

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::furigana::token_parts;
use crate::kana::{is_hiragana, is_kanji, is_katakana, katakana_to_hiragana};
use crate::models::{PartOfSpeech, Token};

// 容易被词典切错的外来语复合词
const KATAKANA_COMPOUNDS: &[(&str, &str, &str)] = &[
    ("スマート", "フォン", "スマートフォン"),
    ("アイス", "クリーム", "アイスクリーム"),
    ("クレジット", "カード", "クレジットカード"),
    ("ショッピング", "センター", "ショッピングセンター"),
    ("コンピュータ", "ー", "コンピューター"),
    ("エア", "コン", "エアコン"),
    ("リモート", "コントロール", "リモートコントロール"),
    ("ソフト", "ウェア", "ソフトウェア"),
    ("ハード", "ウェア", "ハードウェア"),
];

// 词典给出书面读音时改用口语读音
const COLLOQUIAL_READINGS: &[(&str, &str)] = &[
    ("私", "わたし"),
    ("明日", "あした"),
    ("今日", "きょう"),
    ("昨日", "きのう"),
    ("一人", "ひとり"),
    ("二人", "ふたり"),
    ("大人", "おとな"),
];

/// 形态素：表层形 + 逗号分隔的 IPADIC 素性串
/// （品詞,品詞細分類1,品詞細分類2,品詞細分類3,活用型,活用形,原形,読み,発音）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Morpheme {
    pub surface: String,
    pub feature: String,
}

impl Morpheme {
    pub fn new(surface: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            feature: feature.into(),
        }
    }
}

pub trait MorphAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Vec<Morpheme>;
}

/// vibrato 形态素解析器
pub struct VibratoAnalyzer {
    tokenizer: vibrato::Tokenizer,
}

impl VibratoAnalyzer {
    pub fn from_zstd_file(path: &Path) -> Result<Self> {
        info!("加载形态素词典: {}", path.display());

        let file = File::open(path)
            .with_context(|| format!("无法打开词典文件 {}", path.display()))?;
        let decoder = zstd::Decoder::new(file)?;
        let dict = vibrato::Dictionary::read(decoder)
            .map_err(|e| anyhow::anyhow!("词典解析失败 {}: {}", path.display(), e))?;

        info!("形态素词典加载完成");
        Ok(Self {
            tokenizer: vibrato::Tokenizer::new(dict),
        })
    }
}

impl MorphAnalyzer for VibratoAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Morpheme> {
        let mut worker = self.tokenizer.new_worker();
        worker.reset_sentence(text);
        worker.tokenize();

        worker
            .token_iter()
            .map(|t| Morpheme::new(t.surface(), t.feature()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Kanji,
    Hiragana,
    Katakana,
    Whitespace,
    Other,
}

fn script_of(c: char) -> Script {
    if is_kanji(c) {
        Script::Kanji
    } else if is_hiragana(c) {
        Script::Hiragana
    } else if is_katakana(c) {
        Script::Katakana
    } else if c.is_whitespace() {
        Script::Whitespace
    } else {
        Script::Other
    }
}

/// 无词典的退化解析器：按文字种类切成连续片段，不提供读音
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptAnalyzer;

impl MorphAnalyzer for ScriptAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Morpheme> {
        let mut morphemes = Vec::new();
        let mut current = String::new();
        let mut current_script = None;

        for c in text.chars() {
            let script = script_of(c);
            if current_script.is_some_and(|s| s != script) {
                morphemes.push(script_morpheme(std::mem::take(&mut current), current_script));
            }
            current_script = Some(script);
            current.push(c);
        }
        if !current.is_empty() {
            morphemes.push(script_morpheme(current, current_script));
        }

        morphemes
    }
}

fn script_morpheme(surface: String, script: Option<Script>) -> Morpheme {
    let feature = match script {
        Some(Script::Whitespace) => "空白",
        _ => "",
    };
    Morpheme::new(surface, feature)
}

struct Features<'a> {
    pos: &'a str,
    base_form: Option<&'a str>,
    reading: Option<&'a str>,
}

fn parse_features(feature: &str) -> Features<'_> {
    let fields: Vec<&str> = feature.split(',').collect();
    let field = |i: usize| {
        fields
            .get(i)
            .copied()
            .filter(|f| !f.is_empty() && *f != "*")
    };

    Features {
        pos: field(0).unwrap_or(""),
        base_form: field(6),
        reading: field(7),
    }
}

pub fn colloquial_reading(surface: &str) -> Option<&'static str> {
    COLLOQUIAL_READINGS
        .iter()
        .find(|(word, _)| *word == surface)
        .map(|(_, reading)| *reading)
}

pub struct Tokenizer {
    analyzer: Box<dyn MorphAnalyzer>,
}

impl Tokenizer {
    pub fn new(analyzer: impl MorphAnalyzer + 'static) -> Self {
        Self {
            analyzer: Box::new(analyzer),
        }
    }

    pub fn from_dictionary(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(VibratoAnalyzer::from_zstd_file(path.as_ref())?))
    }

    /// 词典缺失或损坏时退回按文字种类切分
    pub fn load_or_fallback(path: impl AsRef<Path>) -> Self {
        match Self::from_dictionary(path) {
            Ok(tokenizer) => tokenizer,
            Err(e) => {
                warn!("形态素词典不可用，退回按文字种类切分: {:#}", e);
                Self::new(ScriptAnalyzer)
            }
        }
    }

    /// 预热：在正式请求之前跑一次解析
    pub fn warm_up(&self) {
        let tokens = self.tokenize("今日は良い天気ですね。");
        debug!("分词器预热完成: {} 个词", tokens.len());
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut tokens = Vec::new();
        let mut cursor = 0;

        for morpheme in self.analyzer.analyze(text) {
            if morpheme.surface.is_empty() {
                continue;
            }
            let Some(offset) = text[cursor..].find(&morpheme.surface) else {
                debug!("形态素 {} 不在原文剩余部分中，跳过", morpheme.surface);
                continue;
            };

            // 解析器丢掉的字符（如空格）补回来，保证无损
            if offset > 0 {
                tokens.push(gap_token(&text[cursor..cursor + offset]));
            }
            tokens.push(build_token(&morpheme));
            cursor += offset + morpheme.surface.len();
        }

        if cursor < text.len() {
            tokens.push(gap_token(&text[cursor..]));
        }

        merge_katakana_compounds(tokens)
    }
}

fn build_token(morpheme: &Morpheme) -> Token {
    let surface = morpheme.surface.as_str();
    let features = parse_features(&morpheme.feature);

    // 只覆盖词典给出的读音；没有读音时保持没有
    let reading = features.reading.map(|r| match colloquial_reading(surface) {
        Some(colloquial) => colloquial.to_string(),
        None => katakana_to_hiragana(r),
    });

    Token {
        surface: surface.to_string(),
        base_form: features.base_form.unwrap_or(surface).to_string(),
        part_of_speech: PartOfSpeech::from_tag(features.pos),
        parts: token_parts(surface, reading.as_deref()),
    }
}

fn gap_token(surface: &str) -> Token {
    let part_of_speech = if surface.chars().all(char::is_whitespace) {
        PartOfSpeech::Whitespace
    } else {
        PartOfSpeech::Unknown
    };

    Token {
        surface: surface.to_string(),
        base_form: surface.to_string(),
        part_of_speech,
        parts: token_parts(surface, None),
    }
}

fn compound_for(first: &str, second: &str) -> Option<&'static str> {
    KATAKANA_COMPOUNDS
        .iter()
        .find(|(a, b, _)| *a == first && *b == second)
        .map(|(_, _, merged)| *merged)
}

/// 相邻两个词组成已知外来语复合词时合并为一个词，词性取第一个词
pub fn merge_katakana_compounds(tokens: Vec<Token>) -> Vec<Token> {
    if tokens.len() < 2 {
        return tokens;
    }

    let mut result = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        let merged = iter
            .peek()
            .and_then(|next| compound_for(&token.surface, &next.surface));

        match merged {
            Some(surface) => {
                iter.next();
                result.push(Token {
                    surface: surface.to_string(),
                    base_form: surface.to_string(),
                    part_of_speech: token.part_of_speech,
                    parts: token_parts(surface, None),
                });
            }
            None => result.push(token),
        }
    }

    result
}
