//! 已发布标题比对 - 业务能力层
//!
//! 导入记录丢失或文章曾经手动发布过时，用目标平台上已有的标题兜底去重。

use std::sync::LazyLock;

use regex::Regex;

/// 前缀比较使用的单词数
const PREFIX_WORDS: usize = 5;

static RE_NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").expect("valid regex"));
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// 标题比对器
#[derive(Debug, Clone)]
pub struct TitleMatcher {
    suffixes: Vec<String>,
}

impl TitleMatcher {
    /// `suffixes` 是比较前从标题中去掉的固定后缀
    pub fn new(suffixes: Vec<String>) -> Self {
        let suffixes = suffixes.into_iter().map(|s| s.to_lowercase()).collect();
        Self { suffixes }
    }

    /// 规范化标题：小写、去后缀、连字符变空格、去标点、合并空白
    pub fn normalize(&self, title: &str) -> String {
        let mut t = title.to_lowercase().replace('\u{200a}', " ");
        for suffix in &self.suffixes {
            t = t.replace(suffix.as_str(), "");
        }
        let t = t.replace('-', " ");
        let t = RE_NON_ALNUM.replace_all(&t, "");
        RE_WHITESPACE.replace_all(&t, " ").trim().to_string()
    }

    /// 规范化一组远端标题，丢弃规范化后为空的
    pub fn normalize_all(&self, titles: &[String]) -> Vec<String> {
        titles
            .iter()
            .map(|t| self.normalize(t))
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// 标题是否已出现在已发布列表中
    ///
    /// `published` 须已规范化。前五个词作为前缀匹配，或任一方包含另一方即算命中。
    /// 前缀与包含都按整词比较："go" 不命中 "golang tips"。
    /// 规范化后为空的标题从不命中。
    pub fn is_already_published(&self, title: &str, published: &[String]) -> bool {
        let norm = self.normalize(title);
        if norm.is_empty() {
            return false;
        }
        let prefix = norm
            .split_whitespace()
            .take(PREFIX_WORDS)
            .collect::<Vec<_>>()
            .join(" ");

        published
            .iter()
            .filter(|p| !p.is_empty())
            .any(|p| {
                starts_with_words(p, &prefix) || contains_words(p, &norm) || contains_words(&norm, p)
            })
    }
}

/// 规范化后的标题由单个空格分隔，两端补空格即可按整词比较
fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

fn starts_with_words(haystack: &str, prefix: &str) -> bool {
    format!("{} ", haystack).starts_with(&format!("{} ", prefix))
}

impl Default for TitleMatcher {
    fn default() -> Self {
        Self::new(vec![
            " - a developer's story".to_string(),
            "— a developer's story".to_string(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_suffix_and_punctuation() {
        let m = TitleMatcher::default();
        assert_eq!(
            m.normalize("Rust\u{200a}Async - A Developer's Story"),
            "rust async"
        );
        assert_eq!(m.normalize("Zero-Copy   Parsing: Why?"), "zero copy parsing why");
    }

    #[test]
    fn prefix_of_five_words_matches() {
        let m = TitleMatcher::default();
        let published = m.normalize_all(&[
            "Building a Feed Importer in Rust: part one".to_string(),
        ]);
        assert!(m.is_already_published(
            "Building a Feed Importer in Rust - a developer's story",
            &published
        ));
        assert!(!m.is_already_published("Building a Cache", &published));
    }

    #[test]
    fn containment_matches_both_ways() {
        let m = TitleMatcher::default();
        let published = m.normalize_all(&["Tokio tips".to_string()]);
        assert!(m.is_already_published("Ten Tokio tips for everyone", &published));
        assert!(m.is_already_published("tokio", &published));
    }

    #[test]
    fn partial_words_do_not_match() {
        let m = TitleMatcher::default();
        let published = m.normalize_all(&["Go".to_string(), "Rust".to_string()]);
        assert!(!m.is_already_published("Going to production", &published));
        assert!(!m.is_already_published("Golang tips", &published));
        assert!(!m.is_already_published("Trusty old tools", &published));
        assert!(m.is_already_published("Why Go is boring", &published));

        let published = m.normalize_all(&["Tokio tipsy tricks".to_string()]);
        assert!(!m.is_already_published("Tokio tips", &published));
    }

    #[test]
    fn empty_titles_never_match() {
        let m = TitleMatcher::default();
        let published = m.normalize_all(&["???".to_string(), "Anything".to_string()]);
        assert_eq!(published, vec!["anything"]);
        assert!(!m.is_already_published("!!!", &published));
    }
}
