//! 生成 → 分词 → 校验 → （简化或重新生成）的循环。
//!
//! 大模型生成的文本难度经常漂移，所以每次生成后都做词汇校验，失败时带着反馈
//! 重新生成，最多 `max_attempts` 次。在指定的那一次失败后，先让模型只改写含
//! 超纲词/生僻词的句子，这比整篇重写便宜。所有尝试都失败时返回最好的一次，
//! 并明确标记为未通过。

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::levels::JlptLevel;
use crate::models::{Chapter, Segment, SegmentType, Story, StoryMetadata};
use crate::tokenizer::Tokenizer;
use crate::validator::{ValidationResult, VocabularyValidator};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub level: JlptLevel,
    pub genre: String,
    pub theme: Option<String>,
    pub num_chapters: u32,
    pub words_per_chapter: u32,
}

impl GenerationRequest {
    pub fn new(level: JlptLevel, genre: impl Into<String>, theme: Option<String>) -> Self {
        Self {
            level,
            genre: genre.into(),
            theme,
            num_chapters: 5,
            words_per_chapter: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailedCheck {
    NotEnoughTargetWords,
    TooManyAboveLevelWords,
    TooManyUnknownWords,
}

/// 重新生成时交给模型的反馈
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationFeedback {
    pub previous_attempt: u32,
    pub failed_checks: Vec<FailedCheck>,
    pub target_level_count: usize,
    pub min_target_threshold: usize,
    pub above_level_words: Vec<String>,
    pub unknown_words: Vec<String>,
    pub message: String,
}

impl RegenerationFeedback {
    pub fn from_validation(attempt: u32, validation: &ValidationResult) -> Self {
        let mut failed_checks = Vec::new();
        if !validation.has_learning_value {
            failed_checks.push(FailedCheck::NotEnoughTargetWords);
        }
        if !validation.not_too_hard {
            failed_checks.push(FailedCheck::TooManyAboveLevelWords);
        }
        if !validation.not_too_obscure {
            failed_checks.push(FailedCheck::TooManyUnknownWords);
        }

        Self {
            previous_attempt: attempt,
            failed_checks,
            target_level_count: validation.target_level_count,
            min_target_threshold: validation.min_target_threshold,
            above_level_words: validation.above_level_words.clone(),
            unknown_words: validation.unknown_words.clone(),
            message: validation.message.clone(),
        }
    }
}

/// 大模型协作方：生成整篇故事，或只改写含问题词的句子
pub trait StoryWriter: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        feedback: Option<&'a RegenerationFeedback>,
    ) -> BoxFuture<'a, Result<Story>>;

    fn simplify<'a>(
        &'a self,
        story: &'a Story,
        problem_words: &'a [String],
        level: JlptLevel,
    ) -> BoxFuture<'a, Result<Story>>;
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub story: Story,
    pub validation: ValidationResult,
    pub attempts: u32,
    pub passed: bool,
    pub simplifier_used: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopPolicy {
    pub max_attempts: u32,
    /// 在这一次尝试失败后先简化句子
    pub simplify_on_attempt: Option<u32>,
    pub retry_delay: Duration,
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for LoopPolicy {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            simplify_on_attempt: (config.simplify_on_attempt > 0)
                .then_some(config.simplify_on_attempt),
            retry_delay: config.retry_delay(),
        }
    }
}

/// 一次校验之后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Simplify,
    Regenerate { next_attempt: u32 },
    GiveUp,
}

pub fn decide(
    policy: &LoopPolicy,
    attempt: u32,
    simplified: bool,
    validation: &ValidationResult,
) -> Decision {
    if validation.passed {
        return Decision::Accept;
    }
    let has_problem_words =
        !validation.above_level_words.is_empty() || !validation.unknown_words.is_empty();
    if !simplified && policy.simplify_on_attempt == Some(attempt) && has_problem_words {
        return Decision::Simplify;
    }
    if attempt < policy.max_attempts.max(1) {
        Decision::Regenerate {
            next_attempt: attempt + 1,
        }
    } else {
        Decision::GiveUp
    }
}

enum State {
    Generate {
        attempt: u32,
    },
    Tokenize {
        attempt: u32,
        story: Story,
        simplified: bool,
    },
    Validate {
        attempt: u32,
        story: Story,
        simplified: bool,
    },
    Simplify {
        attempt: u32,
        story: Story,
        validation: ValidationResult,
    },
    Done(GenerationOutcome),
}

pub struct RegenerationLoop {
    tokenizer: Arc<Tokenizer>,
    validator: Arc<VocabularyValidator>,
    policy: LoopPolicy,
}

impl RegenerationLoop {
    pub fn new(
        tokenizer: Arc<Tokenizer>,
        validator: Arc<VocabularyValidator>,
        policy: LoopPolicy,
    ) -> Self {
        Self {
            tokenizer,
            validator,
            policy,
        }
    }

    pub fn policy(&self) -> &LoopPolicy {
        &self.policy
    }

    pub async fn run(
        &self,
        writer: &dyn StoryWriter,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut best: Option<(Story, ValidationResult)> = None;
        let mut feedback: Option<RegenerationFeedback> = None;
        let mut state = State::Generate { attempt: 1 };

        loop {
            state = match state {
                State::Generate { attempt } => {
                    info!(
                        "生成故事 {} {}（第 {}/{} 次）",
                        request.level, request.genre, attempt, max_attempts
                    );
                    let story = writer
                        .generate(request, feedback.as_ref())
                        .await
                        .with_context(|| format!("第 {} 次生成失败", attempt))?;
                    State::Tokenize {
                        attempt,
                        story,
                        simplified: false,
                    }
                }

                State::Tokenize {
                    attempt,
                    mut story,
                    simplified,
                } => {
                    tokenize_story(&self.tokenizer, &mut story);
                    State::Validate {
                        attempt,
                        story,
                        simplified,
                    }
                }

                State::Validate {
                    attempt,
                    mut story,
                    simplified,
                } => {
                    let validation = self
                        .validator
                        .validate_level(&story.all_tokens(), request.level);
                    story.metadata.vocabulary_validation = Some(validation.clone());
                    debug!("校验结果: {}", validation.message);

                    if best
                        .as_ref()
                        .is_none_or(|(_, previous)| validation.is_better_than(previous))
                    {
                        best = Some((story.clone(), validation.clone()));
                    }

                    match decide(&self.policy, attempt, simplified, &validation) {
                        Decision::Accept => {
                            info!("词汇校验通过（第 {} 次）", attempt);
                            State::Done(finish(story, validation, attempt, true, simplified))
                        }
                        Decision::Simplify => {
                            info!("尝试简化问题句子后再决定是否重新生成");
                            State::Simplify {
                                attempt,
                                story,
                                validation,
                            }
                        }
                        Decision::Regenerate { next_attempt } => {
                            warn!("词汇校验失败，重新生成: {}", validation.message);
                            feedback = Some(RegenerationFeedback::from_validation(
                                attempt,
                                &validation,
                            ));
                            if !self.policy.retry_delay.is_zero() {
                                tokio::time::sleep(self.policy.retry_delay).await;
                            }
                            State::Generate {
                                attempt: next_attempt,
                            }
                        }
                        Decision::GiveUp => {
                            warn!("{} 次尝试都未通过校验，使用最好的一次", max_attempts);
                            let (story, validation) = best.take().unwrap_or((story, validation));
                            let simplified = story.metadata.simplifier_used;
                            State::Done(finish(
                                story,
                                validation,
                                max_attempts,
                                false,
                                simplified,
                            ))
                        }
                    }
                }

                State::Simplify {
                    attempt,
                    story,
                    validation,
                } => {
                    let problem_words = validation.problem_words();
                    let mut simplified = writer
                        .simplify(&story, &problem_words, request.level)
                        .await
                        .context("简化句子失败")?;
                    simplified.metadata.simplifier_used = true;
                    State::Tokenize {
                        attempt,
                        story: simplified,
                        simplified: true,
                    }
                }

                State::Done(outcome) => return Ok(outcome),
            };
        }
    }
}

fn finish(
    mut story: Story,
    validation: ValidationResult,
    attempts: u32,
    passed: bool,
    simplifier_used: bool,
) -> GenerationOutcome {
    story.metadata.generation_attempts = Some(attempts);
    story.metadata.simplifier_used = simplifier_used;
    story.metadata.vocabulary_validation = Some(validation.clone());
    if !passed {
        story.metadata.validation_passed_on_retry = Some(false);
    }

    GenerationOutcome {
        story,
        validation,
        attempts,
        passed,
        simplifier_used,
    }
}

/// 给故事标题、章节标题和每个段落写入分词结果
pub fn tokenize_story(tokenizer: &Tokenizer, story: &mut Story) {
    if let Some(title) = &story.metadata.title_japanese {
        story.metadata.title_tokens = tokenizer.tokenize(title);
    }

    for chapter in &mut story.chapters {
        if let Some(title) = &chapter.title_japanese {
            chapter.title_tokens = tokenizer.tokenize(title);
        }
        for segment in &mut chapter.content {
            segment.tokens = tokenizer.tokenize(&segment.text);
        }
    }
}

// 模型返回的 JSON 结构
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedStory {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub chapters: Vec<GeneratedChapter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedChapter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub content: Vec<GeneratedSegment>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedSegment {
    #[serde(rename = "type", default)]
    pub segment_type: SegmentType,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// 从模型回复中截取 JSON 部分并解析
pub fn parse_generated_story(content: &str) -> Result<GeneratedStory> {
    let json_start = content.find('{').unwrap_or(0);
    let json_end = content
        .rfind('}')
        .map(|i| i + 1)
        .unwrap_or(content.len())
        .max(json_start);
    let json_content = &content[json_start..json_end];

    serde_json::from_str(json_content)
        .map_err(|e| anyhow::anyhow!("解析故事失败: {}\n响应内容: {}", e, json_content))
}

impl GeneratedStory {
    pub fn into_story(self, request: &GenerationRequest) -> Story {
        let now = Utc::now();
        let title = self.title.unwrap_or_else(|| "Untitled".to_string());
        let slug: String = title
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let id = format!(
            "{}_{}_{:x}",
            request.level.as_str().to_lowercase(),
            slug,
            now.timestamp_millis() & 0xff_ffff
        );

        let chapters = self
            .chapters
            .into_iter()
            .enumerate()
            .map(|(i, chapter)| {
                let number = i as u32 + 1;
                let chapter_id = format!("{}_ch{}", id, number);
                let content = chapter
                    .content
                    .into_iter()
                    .enumerate()
                    .map(|(j, segment)| Segment {
                        id: format!("{}_seg{}", chapter_id, j + 1),
                        segment_type: segment.segment_type,
                        speaker: segment.speaker,
                        text: segment.text,
                        tokens: Vec::new(),
                    })
                    .collect();

                Chapter {
                    id: chapter_id,
                    number,
                    title: chapter.title.unwrap_or_else(|| format!("Chapter {}", number)),
                    title_japanese: chapter.title_japanese,
                    title_tokens: Vec::new(),
                    content,
                }
            })
            .collect();

        Story {
            id,
            metadata: StoryMetadata {
                title,
                title_japanese: self.title_japanese,
                jlpt_level: request.level.as_str().to_string(),
                genre: request.genre.clone(),
                theme: request.theme.clone(),
                summary: self.summary,
                created_date: Some(now),
                ..StoryMetadata::default()
            },
            chapters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn validation(checks: [bool; 3], above: &[&str], unknown: &[&str]) -> ValidationResult {
        ValidationResult {
            total_tokens: 100,
            unique_words: 10,
            words_by_level: BTreeMap::new(),
            target_level_count: 0,
            above_level_count: above.len(),
            unknown_count: unknown.len(),
            min_target_threshold: 1,
            max_above_threshold: Some(0),
            max_unknown_threshold: 0,
            has_learning_value: checks[0],
            not_too_hard: checks[1],
            not_too_obscure: checks[2],
            passed: checks.iter().all(|c| *c),
            readability_score: 0.5,
            target_level: "N3".to_string(),
            message: String::new(),
            target_level_words: Vec::new(),
            above_level_words: above.iter().map(|s| s.to_string()).collect(),
            unknown_words: unknown.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn policy() -> LoopPolicy {
        LoopPolicy {
            max_attempts: 3,
            simplify_on_attempt: Some(2),
            retry_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_decide_accepts_passing() {
        let v = validation([true, true, true], &[], &[]);
        assert_eq!(decide(&policy(), 1, false, &v), Decision::Accept);
        assert_eq!(decide(&policy(), 3, true, &v), Decision::Accept);
    }

    #[test]
    fn test_decide_regenerates_until_budget() {
        let v = validation([false, true, true], &[], &["謎"]);
        assert_eq!(
            decide(&policy(), 1, false, &v),
            Decision::Regenerate { next_attempt: 2 }
        );
        assert_eq!(decide(&policy(), 3, false, &v), Decision::GiveUp);
    }

    #[test]
    fn test_decide_simplifies_once_on_configured_attempt() {
        let v = validation([true, false, true], &["曖昧"], &[]);
        assert_eq!(decide(&policy(), 2, false, &v), Decision::Simplify);
        // 简化后仍失败则继续重新生成
        assert_eq!(
            decide(&policy(), 2, true, &v),
            Decision::Regenerate { next_attempt: 3 }
        );
        assert_eq!(
            decide(&policy(), 1, false, &v),
            Decision::Regenerate { next_attempt: 2 }
        );
    }

    #[test]
    fn test_decide_skips_simplify_without_problem_words() {
        let v = validation([false, true, true], &[], &[]);
        assert_eq!(
            decide(&policy(), 2, false, &v),
            Decision::Regenerate { next_attempt: 3 }
        );
    }

    #[test]
    fn test_decide_simplify_disabled() {
        let mut p = policy();
        p.simplify_on_attempt = None;
        let v = validation([true, false, true], &["曖昧"], &[]);
        assert_eq!(
            decide(&p, 2, false, &v),
            Decision::Regenerate { next_attempt: 3 }
        );
    }

    #[test]
    fn test_zero_budget_means_one_attempt() {
        let p = LoopPolicy::from(&GenerationConfig {
            max_attempts: 0,
            simplify_on_attempt: 0,
            retry_delay_ms: 0,
        });
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.simplify_on_attempt, None);
        let v = validation([false, false, false], &["曖昧"], &[]);
        assert_eq!(decide(&p, 1, false, &v), Decision::GiveUp);
    }

    #[test]
    fn test_feedback_lists_failed_checks() {
        let v = validation([false, true, false], &[], &["謎"]);
        let feedback = RegenerationFeedback::from_validation(1, &v);
        assert_eq!(
            feedback.failed_checks,
            vec![FailedCheck::NotEnoughTargetWords, FailedCheck::TooManyUnknownWords]
        );
        assert_eq!(feedback.unknown_words, vec!["謎"]);
    }

    #[test]
    fn test_parse_generated_story_with_surrounding_text() {
        let content = r#"好的，下面是故事：
{
  "title": "The Cat",
  "titleJapanese": "ねこ",
  "summary": "A cat story.",
  "chapters": [
    {"title": "Morning", "titleJapanese": "朝", "content": [
      {"type": "narration", "text": "猫が寝ています。"},
      {"type": "dialogue", "speaker": "Ken", "text": "おはよう！"}
    ]}
  ]
}
以上。"#;
        let generated = parse_generated_story(content).unwrap();
        let request = GenerationRequest::new(JlptLevel::N5, "slice of life", None);
        let story = generated.into_story(&request);

        assert!(story.id.starts_with("n5_the_cat_"));
        assert_eq!(story.metadata.jlpt_level, "N5");
        assert_eq!(story.chapters.len(), 1);
        assert_eq!(story.chapters[0].id, format!("{}_ch1", story.id));
        assert_eq!(story.chapters[0].content[1].segment_type, SegmentType::Dialogue);
        assert_eq!(story.chapters[0].content[1].speaker.as_deref(), Some("Ken"));
    }

    #[test]
    fn test_parse_generated_story_rejects_garbage() {
        assert!(parse_generated_story("no json here").is_err());
    }
}
