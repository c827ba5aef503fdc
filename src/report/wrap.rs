//! Greedy paragraph filling compatible with the layout mail readers of the
//! report are used to.

/// Line width of wrapped package lists.
pub const WRAP_WIDTH: usize = 70;

#[derive(Debug, Clone)]
pub struct TextWrapper {
    pub width: usize,
    pub subsequent_indent: String,
    /// Split words longer than a line instead of overflowing.
    pub break_long_words: bool,
    /// Allow breaks after hyphens inside words such as `foo-bar`.
    pub break_on_hyphens: bool,
}

impl TextWrapper {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            subsequent_indent: String::new(),
            break_long_words: true,
            break_on_hyphens: true,
        }
    }

    pub fn wrap(&self, text: &str) -> Vec<String> {
        let normalized: String = text
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();

        let mut chunks = self.split_chunks(&normalized);
        chunks.reverse();

        let mut lines: Vec<String> = Vec::new();
        while !chunks.is_empty() {
            let indent = if lines.is_empty() {
                ""
            } else {
                self.subsequent_indent.as_str()
            };
            let width = self.width.saturating_sub(char_len(indent));

            if !lines.is_empty() && chunks.last().is_some_and(|c| is_blank(c)) {
                chunks.pop();
            }

            let mut line: Vec<String> = Vec::new();
            let mut len = 0;
            while let Some(chunk) = chunks.pop() {
                let chunk_len = char_len(&chunk);
                if len + chunk_len <= width {
                    len += chunk_len;
                    line.push(chunk);
                } else {
                    chunks.push(chunk);
                    break;
                }
            }

            if chunks.last().is_some_and(|c| char_len(c) > width) {
                self.handle_long_word(&mut chunks, &mut line, len, width);
            }

            if line.last().is_some_and(|c| is_blank(c)) {
                line.pop();
            }
            if !line.is_empty() {
                lines.push(format!("{}{}", indent, line.concat()));
            }
        }

        lines
    }

    pub fn fill(&self, text: &str) -> String {
        self.wrap(text).join("\n")
    }

    fn handle_long_word(
        &self,
        chunks: &mut Vec<String>,
        line: &mut Vec<String>,
        len: usize,
        width: usize,
    ) {
        let space_left = if width < 1 { 1 } else { width - len };
        if self.break_long_words {
            if let Some(chunk) = chunks.pop() {
                let split = chunk
                    .char_indices()
                    .nth(space_left)
                    .map_or(chunk.len(), |(i, _)| i);
                let (head, tail) = chunk.split_at(split);
                line.push(head.to_string());
                if !tail.is_empty() {
                    chunks.push(tail.to_string());
                }
            }
        } else if line.is_empty() {
            if let Some(chunk) = chunks.pop() {
                line.push(chunk);
            }
        }
    }

    /// Splits into alternating runs of words and spaces.
    fn split_chunks(&self, text: &str) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut in_space = false;

        for c in text.chars() {
            let space = c == ' ';
            if !current.is_empty() && space != in_space {
                chunks.push(std::mem::take(&mut current));
            }
            in_space = space;
            current.push(c);
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        if !self.break_on_hyphens {
            return chunks;
        }
        chunks
            .into_iter()
            .flat_map(|chunk| {
                if is_blank(&chunk) {
                    vec![chunk]
                } else {
                    split_hyphenated(&chunk)
                }
            })
            .collect()
    }
}

/// Breaks after hyphens preceded by at least two word characters ending in
/// a letter and followed by at least two word characters containing a
/// letter after the first.
fn split_hyphenated(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let is_letter = |c: char| is_word(c) && !c.is_ascii_digit();

    let mut parts = Vec::new();
    let mut start = 0;
    for i in 0..chars.len() {
        if chars[i] != '-' {
            continue;
        }
        let before = chars[start..i]
            .iter()
            .rev()
            .take_while(|c| is_word(**c))
            .count();
        let after: Vec<char> = chars[i + 1..]
            .iter()
            .copied()
            .take_while(|c| is_word(*c))
            .collect();
        let breaks_before = before >= 2 && i > 0 && is_letter(chars[i - 1]);
        let breaks_after = after.len() >= 2 && after[1..].iter().any(|c| is_letter(*c));
        if breaks_before && breaks_after {
            parts.push(chars[start..=i].iter().collect());
            start = i + 1;
        }
    }
    parts.push(chars[start..].iter().collect());
    parts
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// `"<label> (<count>): a b c"` filled to [`WRAP_WIDTH`] columns with
/// continuation lines indented by four spaces, surrounded by blank lines.
/// Package names are never split.
pub fn wrap_and_format<S: AsRef<str>>(label: &str, packages: &[S]) -> String {
    let wrapper = TextWrapper {
        width: WRAP_WIDTH,
        subsequent_indent: "    ".to_string(),
        break_long_words: false,
        break_on_hyphens: false,
    };
    let names: Vec<&str> = packages.iter().map(AsRef::as_ref).collect();
    let text = format!("{} ({}): {}", label, names.len(), names.join(" "));
    format!("\n{}\n\n", wrapper.fill(&text))
}
