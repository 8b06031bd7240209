use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use graded_reader::{Config, Tokenizer, VocabularyValidator, WordLevelIndex};

/// 分级读物工具：分词、振假名、词汇难度校验
#[derive(Parser, Debug)]
#[command(name = "graded-reader")]
#[command(version)]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 分词并输出 JSON
    Tokenize {
        text: String,
    },
    /// 查询单词的 JLPT 等级
    Level {
        word: String,
    },
    /// 校验文本文件的词汇是否适合目标等级
    Validate {
        #[arg(short, long, default_value = "N5")]
        level: String,
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load_or_default(&args.config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Tokenize { text } => {
            let tokenizer = Tokenizer::load_or_fallback(&config.data.dictionary_file);
            let tokens = tokenizer.tokenize(&text);
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
        Command::Level { word } => {
            let index = WordLevelIndex::load(&config.data.jlpt_dir);
            match index.get_word_level(&word) {
                Some(level) => println!("📗 {} → {}", word, level),
                None => println!("❓ {} 不在任何 JLPT 词表中", word),
            }
        }
        Command::Validate { level, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("无法读取文件 {}", file.display()))?;

            let tokenizer = Tokenizer::load_or_fallback(&config.data.dictionary_file);
            tokenizer.warm_up();
            let index = Arc::new(WordLevelIndex::load(&config.data.jlpt_dir));
            let validator = VocabularyValidator::new(index);

            println!("📝 输入文本长度: {} 字符", text.chars().count());
            let tokens = tokenizer.tokenize(&text);
            let result = validator.validate(&tokens, &level);

            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.passed {
                println!("✅ {}", result.message);
            } else {
                println!("❌ {}", result.message);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
