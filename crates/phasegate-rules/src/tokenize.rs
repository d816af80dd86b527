/// Lowercased word tokens. Each CJK ideograph is its own token so that
/// proximity windows work for unsegmented Chinese text.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for ch in text.chars() {
        if is_cjk(ch) {
            flush(&mut word, &mut tokens);
            tokens.push(ch.to_string());
        } else if ch.is_alphanumeric() || ch == '_' {
            word.extend(ch.to_lowercase());
        } else {
            flush(&mut word, &mut tokens);
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

fn flush(word: &mut String, tokens: &mut Vec<String>) {
    if !word.is_empty() {
        tokens.push(std::mem::take(word));
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF)
}

/// Token range `[start, end)` where a term matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Tokens strictly between two spans; 0 when they touch or overlap.
    pub fn gap(&self, other: &Span) -> usize {
        if self.end <= other.start {
            other.start - self.end
        } else if other.end <= self.start {
            self.start - other.end
        } else {
            0
        }
    }
}

/// A term from a rule table. A trailing `*` lets the last word match as a
/// prefix (`implement*` matches `implementing`); otherwise words match exactly.
#[derive(Clone, Debug)]
pub struct Term {
    pub text: String,
    tokens: Vec<String>,
    prefix: bool,
}

impl Term {
    pub fn new(text: &str) -> Self {
        let (body, prefix) = match text.trim_end().strip_suffix('*') {
            Some(body) => (body, true),
            None => (text, false),
        };
        Self {
            text: body.trim().to_string(),
            tokens: tokenize(body),
            prefix,
        }
    }

    pub fn find_all(&self, haystack: &[String]) -> Vec<Span> {
        let n = self.tokens.len();
        if n == 0 || haystack.len() < n {
            return vec![];
        }
        (0..=haystack.len() - n)
            .filter(|&i| {
                self.tokens
                    .iter()
                    .zip(&haystack[i..i + n])
                    .enumerate()
                    .all(|(k, (t, w))| w == t || (self.prefix && k == n - 1 && w.starts_with(t.as_str())))
            })
            .map(|i| Span { start: i, end: i + n })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_ascii_words_and_cjk_chars() {
        assert_eq!(tokenize("Continue, then WRITE code!"), vec!["continue", "then", "write", "code"]);
        assert_eq!(tokenize("继续写代码"), vec!["继", "续", "写", "代", "码"]);
        assert_eq!(tokenize("进入P3阶段"), vec!["进", "入", "p3", "阶", "段"]);
    }

    #[test]
    fn multi_token_terms_match_in_sequence() {
        let hay = tokenize("please write code now");
        let spans = Term::new("write code").find_all(&hay);
        assert_eq!(spans, vec![Span { start: 1, end: 3 }]);
        assert!(Term::new("code write").find_all(&hay).is_empty());
    }

    #[test]
    fn prefix_matching_is_opt_in() {
        let hay = tokenize("implementing fixes");
        assert_eq!(Term::new("implement*").find_all(&hay).len(), 1);
        assert!(Term::new("implement").find_all(&hay).is_empty());
        assert!(Term::new("fix").find_all(&hay).is_empty());
        assert_eq!(Term::new("implement*").text, "implement");
    }

    #[test]
    fn exact_terms_ignore_longer_words() {
        let hay = tokenize("open the editor and read the codebase");
        assert!(Term::new("edit").find_all(&hay).is_empty());
        assert!(Term::new("code").find_all(&hay).is_empty());
        assert_eq!(Term::new("edit*").find_all(&hay).len(), 1);
    }

    #[test]
    fn prefix_applies_to_the_last_word_only() {
        assert_eq!(Term::new("write cod*").find_all(&tokenize("write coding")).len(), 1);
        assert!(Term::new("writ* code").find_all(&tokenize("writing code")).is_empty());
    }

    #[test]
    fn gap_is_symmetric() {
        let a = Span { start: 0, end: 2 };
        let b = Span { start: 5, end: 6 };
        assert_eq!(a.gap(&b), 3);
        assert_eq!(b.gap(&a), 3);
        assert_eq!(a.gap(&Span { start: 1, end: 3 }), 0);
    }
}
