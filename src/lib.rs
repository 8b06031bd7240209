pub mod config;
pub mod models;
pub mod kana;
pub mod furigana;
pub mod tokenizer;
pub mod levels;
pub mod validator;
pub mod pipeline;

pub use config::Config;
pub use models::*;
pub use levels::{JlptLevel, WordLevelIndex};
pub use tokenizer::Tokenizer;
pub use validator::{ValidationResult, VocabularyValidator};
pub use pipeline::{GenerationOutcome, RegenerationLoop, StoryWriter};
