//! Line-oriented view of a markdown report: title, header block, `##` sections and
//! the numbered subsections inside them.

use crate::domain::section::normalize_title;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// 1-based.
    pub number: usize,
    pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopSection<'a> {
    pub heading: Line<'a>,
    /// Heading text with leading emoji and punctuation removed.
    pub title: String,
    pub body: Vec<Line<'a>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline<'a> {
    pub title: Option<Line<'a>>,
    /// Lines between the title and the first `##` section.
    pub preamble: Vec<Line<'a>>,
    pub sections: Vec<TopSection<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedBlock<'a> {
    pub number: usize,
    pub title: String,
    pub heading: Line<'a>,
    pub body: Vec<Line<'a>>,
}

impl NumberedBlock<'_> {
    pub fn text(&self) -> String {
        block_text(&self.body)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberedSplit<'a> {
    pub preamble: Vec<Line<'a>>,
    pub blocks: Vec<NumberedBlock<'a>>,
}

pub fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// ATX heading level and text, e.g. `### 1. Valuation` -> `(3, "1. Valuation")`.
pub fn heading(line: &str) -> Option<(usize, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let t = &line[indent..];
    let level = t.len() - t.trim_start_matches('#').len();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &t[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some((level, rest.trim().trim_end_matches('#').trim()))
}

/// Level of a setext underline (`===` is 1, `---` is 2). Only meaningful directly
/// under a paragraph line; see [`setext_heading`].
fn setext_underline(line: &str) -> Option<usize> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let t = line.trim();
    if t.is_empty() {
        return None;
    }
    if t.chars().all(|c| c == '=') {
        Some(1)
    } else if t.chars().all(|c| c == '-') {
        Some(2)
    } else {
        None
    }
}

fn is_paragraph_text(line: &str) -> bool {
    let t = line.trim_start();
    if t.is_empty() || line.len() - t.len() > 3 || heading(line).is_some() || is_rule(line) {
        return false;
    }
    if t.starts_with(['|', '>']) || t.starts_with("- ") || t.starts_with("* ") || t.starts_with("+ ") {
        return false;
    }
    let digits = t.len() - t.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let rest = &t[digits..];
    !(digits > 0 && (rest.starts_with(". ") || rest.starts_with(") ")))
}

/// First setext heading (a paragraph line underlined with `===` or `---`) outside code
/// fences, as the underline line and its level.
pub fn setext_heading<'a>(lines: &[Line<'a>]) -> Option<(Line<'a>, usize)> {
    let mut in_fence = false;
    let mut previous: Option<&str> = None;
    for line in lines {
        if is_fence(line.text) {
            in_fence = !in_fence;
            previous = None;
            continue;
        }
        if in_fence {
            continue;
        }
        if let (Some(prev), Some(level)) = (previous, setext_underline(line.text)) {
            if is_paragraph_text(prev) {
                return Some((*line, level));
            }
        }
        previous = Some(line.text);
    }
    None
}

/// Numbers `text` line by line, starting at 1.
pub fn lines_of(text: &str) -> Vec<Line<'_>> {
    text.lines()
        .enumerate()
        .map(|(i, t)| Line {
            number: i + 1,
            text: t,
        })
        .collect()
}

pub fn is_rule(line: &str) -> bool {
    let t: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    t.len() >= 3
        && (t.chars().all(|c| c == '-') || t.chars().all(|c| c == '*') || t.chars().all(|c| c == '_'))
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes a surrounding code fence (```` ```markdown ... ``` ````) if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let mut inner = trimmed;
    if let Some((_, after_first)) = inner.split_once('\n') {
        inner = after_first;
    } else {
        return "";
    }
    if let Some(end) = inner.rfind("```") {
        inner = &inner[..end];
    }
    inner.trim()
}

pub fn parse_outline(markdown: &str) -> Outline<'_> {
    let mut outline = Outline::default();
    let mut in_fence = false;

    for (idx, text) in markdown.lines().enumerate() {
        let line = Line {
            number: idx + 1,
            text,
        };

        let fence = is_fence(text);
        let head = if in_fence || fence { None } else { heading(text) };
        if fence {
            in_fence = !in_fence;
        }

        match head {
            Some((1, _)) if outline.title.is_none() && outline.sections.is_empty() => {
                outline.title = Some(line);
            }
            Some((2, title)) => outline.sections.push(TopSection {
                heading: line,
                title: strip_decoration(title).to_string(),
                body: Vec::new(),
            }),
            _ => match outline.sections.last_mut() {
                Some(section) => section.body.push(line),
                None => outline.preamble.push(line),
            },
        }
    }

    outline
}

/// Splits a section body at its numbered subsection headings.
///
/// `### N. Title` headings are authoritative when any are present; otherwise deeper
/// headings and bold lines such as `1. **COMPANY OVERVIEW**` are accepted, which is
/// how model-written text usually numbers its parts. Those looser forms only count
/// when they start the line and name one of `titles`, so numbered bold lists inside
/// a subsection stay part of its body.
pub fn split_numbered<'a>(body: &[Line<'a>], titles: &[&str]) -> NumberedSplit<'a> {
    let known: Vec<String> = titles.iter().map(|t| normalize_title(t)).collect();
    let mut candidates = Vec::new();
    let mut in_fence = false;
    for (idx, line) in body.iter().enumerate() {
        if is_fence(line.text) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some((level3, number, title)) = numbered_heading(line.text) {
            candidates.push((idx, level3, number, title));
        }
    }

    let strict = candidates.iter().any(|(_, level3, _, _)| *level3);
    let heads: Vec<_> = candidates
        .into_iter()
        .filter(|(idx, level3, _, title)| {
            if strict {
                return *level3;
            }
            !body[*idx].text.starts_with([' ', '\t']) && known.contains(&normalize_title(title))
        })
        .collect();

    let first = heads.first().map(|(idx, ..)| *idx).unwrap_or(body.len());
    let mut split = NumberedSplit {
        preamble: body[..first].to_vec(),
        blocks: Vec::with_capacity(heads.len()),
    };

    for (i, (idx, _, number, title)) in heads.iter().enumerate() {
        let end = heads.get(i + 1).map(|(next, ..)| *next).unwrap_or(body.len());
        split.blocks.push(NumberedBlock {
            number: *number,
            title: title.clone(),
            heading: body[*idx],
            body: body[idx + 1..end].to_vec(),
        });
    }

    split
}

/// Joins lines, dropping blank lines and horizontal rules at either end.
pub fn block_text(lines: &[Line<'_>]) -> String {
    let keep = |l: &&Line<'_>| !l.text.trim().is_empty() && !is_rule(l.text);
    let start = lines.iter().position(|l| keep(&l)).unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| keep(&l))
        .map(|i| i + 1)
        .unwrap_or(start);
    lines[start..end.max(start)]
        .iter()
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_decoration(title: &str) -> &str {
    title
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim()
}

fn strip_bold(s: &str) -> Option<&str> {
    s.strip_prefix("**")
        .and_then(|s| s.strip_suffix("**"))
        .map(str::trim)
}

// Returns (is level-3 heading, number, title).
fn numbered_heading(text: &str) -> Option<(bool, usize, String)> {
    let (level3, candidate, needs_bold) = match heading(text) {
        Some((3, rest)) => (true, rest, false),
        Some((level, rest)) if level > 3 => (false, rest, false),
        Some(_) => return None,
        None => (false, text.trim(), true),
    };

    let mut candidate = candidate.trim();
    let mut bold = false;
    if let Some(inner) = strip_bold(candidate) {
        candidate = inner;
        bold = true;
    }

    let digits = candidate.len() - candidate.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let number = candidate[..digits].parse::<usize>().ok()?;
    let mut title = candidate[digits..].strip_prefix(['.', ')'])?.trim();
    if let Some(inner) = strip_bold(title) {
        title = inner;
        bold = true;
    }
    if needs_bold && !bold {
        return None;
    }

    let title = title.trim_matches(|c: char| c == '*' || c == '_' || c == ':' || c.is_whitespace());
    if title.is_empty() {
        return None;
    }
    Some((level3, number, title.to_string()))
}
