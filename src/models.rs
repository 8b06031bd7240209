use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::validator::ValidationResult;

// 分词结果结构
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenPart {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
}

impl TokenPart {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reading: None,
        }
    }

    pub fn with_reading(text: impl Into<String>, reading: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reading: Some(reading.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub surface: String,
    pub base_form: String,
    pub part_of_speech: PartOfSpeech,
    pub parts: Vec<TokenPart>,
}

impl Token {
    /// 用于词汇校验的词：优先辞书形，缺失时退回表层形
    pub fn lookup_word(&self) -> &str {
        if self.base_form.is_empty() {
            &self.surface
        } else {
            &self.base_form
        }
    }

    /// 振假名朗读串：有读音的部分用读音，其余用原文
    pub fn reading_text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.reading.as_deref().unwrap_or(&p.text))
            .collect()
    }
}

// 词性（封闭集合，未映射的标签原样小写保留）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Particle,
    Auxiliary,
    Conjunction,
    Interjection,
    Adnominal,
    Pronoun,
    Prefix,
    Suffix,
    Punctuation,
    Whitespace,
    Unknown,
    Other(String),
}

impl PartOfSpeech {
    /// IPADIC / UniDic 的大分类标签
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "" | "*" => PartOfSpeech::Unknown,
            "名詞" => PartOfSpeech::Noun,
            "動詞" => PartOfSpeech::Verb,
            "形容詞" | "形状詞" => PartOfSpeech::Adjective,
            "副詞" => PartOfSpeech::Adverb,
            "助詞" => PartOfSpeech::Particle,
            "助動詞" => PartOfSpeech::Auxiliary,
            "接続詞" => PartOfSpeech::Conjunction,
            "感動詞" => PartOfSpeech::Interjection,
            "連体詞" => PartOfSpeech::Adnominal,
            "代名詞" => PartOfSpeech::Pronoun,
            "接頭辞" | "接頭詞" => PartOfSpeech::Prefix,
            "接尾辞" => PartOfSpeech::Suffix,
            "記号" | "補助記号" => PartOfSpeech::Punctuation,
            "空白" => PartOfSpeech::Whitespace,
            other => PartOfSpeech::Other(other.to_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Adverb => "adverb",
            PartOfSpeech::Particle => "particle",
            PartOfSpeech::Auxiliary => "auxiliary",
            PartOfSpeech::Conjunction => "conjunction",
            PartOfSpeech::Interjection => "interjection",
            PartOfSpeech::Adnominal => "adnominal",
            PartOfSpeech::Pronoun => "pronoun",
            PartOfSpeech::Prefix => "prefix",
            PartOfSpeech::Suffix => "suffix",
            PartOfSpeech::Punctuation => "punctuation",
            PartOfSpeech::Whitespace => "whitespace",
            PartOfSpeech::Unknown => "unknown",
            PartOfSpeech::Other(tag) => tag,
        }
    }
}

impl From<String> for PartOfSpeech {
    fn from(value: String) -> Self {
        match value.as_str() {
            "noun" => PartOfSpeech::Noun,
            "verb" => PartOfSpeech::Verb,
            "adjective" => PartOfSpeech::Adjective,
            "adverb" => PartOfSpeech::Adverb,
            "particle" => PartOfSpeech::Particle,
            "auxiliary" => PartOfSpeech::Auxiliary,
            "conjunction" => PartOfSpeech::Conjunction,
            "interjection" => PartOfSpeech::Interjection,
            "adnominal" => PartOfSpeech::Adnominal,
            "pronoun" => PartOfSpeech::Pronoun,
            "prefix" => PartOfSpeech::Prefix,
            "suffix" => PartOfSpeech::Suffix,
            "punctuation" => PartOfSpeech::Punctuation,
            "whitespace" => PartOfSpeech::Whitespace,
            "" | "unknown" => PartOfSpeech::Unknown,
            _ => PartOfSpeech::Other(value),
        }
    }
}

impl From<PartOfSpeech> for String {
    fn from(value: PartOfSpeech) -> Self {
        match value {
            PartOfSpeech::Other(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 故事结构
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub metadata: StoryMetadata,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoryMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_japanese: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title_tokens: Vec<Token>,
    pub jlpt_level: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary_validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_passed_on_retry: Option<bool>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simplifier_used: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_japanese: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title_tokens: Vec<Token>,
    #[serde(default)]
    pub content: Vec<Segment>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    #[default]
    Narration,
    Dialogue,
    Thought,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    #[serde(rename = "type", default)]
    pub segment_type: SegmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<Token>,
}

impl Story {
    /// 故事标题、章节标题和正文的全部分词结果
    pub fn all_tokens(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        for chapter in &self.chapters {
            tokens.extend(chapter.title_tokens.iter().cloned());
            for segment in &chapter.content {
                tokens.extend(segment.tokens.iter().cloned());
            }
        }
        tokens.extend(self.metadata.title_tokens.iter().cloned());
        tokens
    }
}
