use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

// JLPT 等级，从易到难
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JlptLevel {
    N5,
    N4,
    N3,
    N2,
    N1,
}

impl JlptLevel {
    pub const ALL: [JlptLevel; 5] = [
        JlptLevel::N5,
        JlptLevel::N4,
        JlptLevel::N3,
        JlptLevel::N2,
        JlptLevel::N1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JlptLevel::N5 => "N5",
            JlptLevel::N4 => "N4",
            JlptLevel::N3 => "N3",
            JlptLevel::N2 => "N2",
            JlptLevel::N1 => "N1",
        }
    }

    /// 词表文件名，如 n5.txt
    pub fn file_name(self) -> String {
        format!("{}.txt", self.as_str().to_lowercase())
    }

    pub fn is_hardest(self) -> bool {
        self == JlptLevel::N1
    }
}

impl fmt::Display for JlptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JlptLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JlptLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Invalid JLPT level: {}", s))
    }
}

/// 各等级词表。构建后只读，可在多个线程间共享
#[derive(Debug, Default, Clone)]
pub struct WordLevelIndex {
    specific: HashMap<JlptLevel, HashSet<String>>,
    cumulative: HashMap<JlptLevel, HashSet<String>>,
}

impl WordLevelIndex {
    /// 从目录读取 n5.txt … n1.txt，每行一个词。
    /// 目录或文件缺失时不报错，对应等级为空
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            warn!("JLPT 词表目录不存在: {}", dir.display());
            return Self::default();
        }

        let mut lists = Vec::new();
        for level in JlptLevel::ALL {
            let path = dir.join(level.file_name());
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let words = Self::parse_words(content.lines());
                    info!("加载 {} 词表: {} 个词", level, words.len());
                    lists.push((level, words));
                }
                Err(e) => {
                    warn!("无法读取词表 {}: {}", path.display(), e);
                }
            }
        }

        Self::from_lists(lists)
    }

    fn parse_words<'a>(lines: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
        lines
            .into_iter()
            .map(|line| line.trim().trim_start_matches('\u{feff}'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// 由各等级专属词表构建，累积词表 = 本级 ∪ 所有更简单等级
    pub fn from_lists<I, W>(lists: impl IntoIterator<Item = (JlptLevel, I)>) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<String>,
    {
        let mut specific: HashMap<JlptLevel, HashSet<String>> = HashMap::new();
        for (level, words) in lists {
            specific
                .entry(level)
                .or_default()
                .extend(words.into_iter().map(Into::into));
        }

        let mut cumulative = HashMap::new();
        let mut running: HashSet<String> = HashSet::new();
        for level in JlptLevel::ALL {
            if let Some(words) = specific.get(&level) {
                running.extend(words.iter().cloned());
            }
            cumulative.insert(level, running.clone());
        }

        if specific.values().all(HashSet::is_empty) {
            warn!("JLPT 词表为空，词汇难度校验将被跳过");
        } else {
            for level in JlptLevel::ALL {
                info!("累积 {}: {} 个词", level, cumulative[&level].len());
            }
        }

        Self {
            specific,
            cumulative,
        }
    }

    /// 返回词首次出现的（最简单的）等级
    pub fn get_word_level(&self, word: &str) -> Option<JlptLevel> {
        JlptLevel::ALL.into_iter().find(|level| {
            self.specific
                .get(level)
                .is_some_and(|words| words.contains(word))
        })
    }

    /// 该词是否属于此等级或更简单的等级
    pub fn is_known_at(&self, word: &str, level: JlptLevel) -> bool {
        self.cumulative
            .get(&level)
            .is_some_and(|words| words.contains(word))
    }

    pub fn cumulative(&self, level: JlptLevel) -> Option<&HashSet<String>> {
        self.cumulative.get(&level)
    }

    pub fn is_empty(&self) -> bool {
        self.specific.values().all(HashSet::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> WordLevelIndex {
        WordLevelIndex::from_lists([
            (JlptLevel::N5, vec!["東", "食べる"]),
            (JlptLevel::N4, vec!["字", "東"]),
            (JlptLevel::N3, vec!["商人"]),
            (JlptLevel::N2, vec!["銅"]),
            (JlptLevel::N1, vec!["曖昧"]),
        ])
    }

    #[test]
    fn test_level_parse_and_order() {
        assert_eq!("N3".parse::<JlptLevel>().unwrap(), JlptLevel::N3);
        assert!("N6".parse::<JlptLevel>().is_err());
        // 只接受规范写法
        assert!("n3".parse::<JlptLevel>().is_err());
        assert!(" N1 ".parse::<JlptLevel>().is_err());
        assert!(JlptLevel::N5 < JlptLevel::N1);
        assert_eq!(JlptLevel::N2.file_name(), "n2.txt");
    }

    #[test]
    fn test_word_level_detection() {
        let index = sample_index();
        assert_eq!(index.get_word_level("字"), Some(JlptLevel::N4));
        assert_eq!(index.get_word_level("商人"), Some(JlptLevel::N3));
        assert_eq!(index.get_word_level("銅"), Some(JlptLevel::N2));
        assert_eq!(index.get_word_level("曖昧"), Some(JlptLevel::N1));
        assert_eq!(index.get_word_level("xyzabc123"), None);
    }

    #[test]
    fn test_word_reported_at_introduction_level() {
        let index = sample_index();
        // 东同时在 N5 和 N4 词表里，报告最简单的 N5
        assert_eq!(index.get_word_level("東"), Some(JlptLevel::N5));
        for level in JlptLevel::ALL {
            assert!(index.is_known_at("東", level));
        }
    }

    #[test]
    fn test_cumulative_sets_grow() {
        let index = sample_index();
        assert!(index.is_known_at("商人", JlptLevel::N1));
        assert!(!index.is_known_at("商人", JlptLevel::N4));
        let sizes: Vec<usize> = JlptLevel::ALL
            .into_iter()
            .map(|l| index.cumulative(l).map_or(0, HashSet::len))
            .collect();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(sizes.last(), Some(&6));
    }

    #[test]
    fn test_missing_directory_gives_empty_index() {
        let index = WordLevelIndex::load("/nonexistent/jlpt");
        assert!(index.is_empty());
        assert_eq!(index.get_word_level("東"), None);
    }
}
