//! Sentence-aligned text chunker.
//!
//! Splits lesson bodies into overlapping windows for embedding. Chunks
//! always break on sentence boundaries, so a window never cuts a sentence
//! in half.
//!
//! # Algorithm
//!
//! 1. Collapse whitespace runs to a single space.
//! 2. Split into sentences. A boundary is `.`, `!` or `?` followed by
//!    whitespace and an uppercase letter. A `.` that closes a known
//!    abbreviation (`Dr.`, `etc.`, `e.g.`) is not a boundary.
//! 3. Pack sentences greedily, joined by single spaces, while the chunk
//!    stays within `chunk_size` characters. A sentence that is longer than
//!    `chunk_size` on its own becomes a whole chunk.
//! 4. Walk back from the end of the finished chunk, sentence by sentence,
//!    while the carried text stays within `chunk_overlap` characters. The
//!    next chunk starts at the first carried sentence, and always at least
//!    one sentence later than the previous start.
//!
//! ```text
//! sentences:  s0 s1 s2 s3 s4 s5
//! chunk 0:   [s0 s1 s2 s3]
//! chunk 1:            [s3 s4 s5]     <- s3 carried as overlap
//! ```
//!
//! Lengths are measured in characters, not bytes.

use crate::models::{Course, CourseChunk};

/// Titles and short forms whose trailing `.` does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "Dr", "Mr", "Mrs", "Ms", "Prof", "St", "Jr", "Sr", "vs", "etc", "Inc", "Ltd", "No", "Fig",
];

/// Split `text` into overlapping, sentence-aligned chunks.
///
/// Returns an empty vector for blank input.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }
    if char_len(&normalized) <= chunk_size {
        return vec![normalized];
    }

    let sentences = split_sentences(&normalized);
    let mut chunks = Vec::new();
    let mut i = 0;

    while i < sentences.len() {
        let mut current: Vec<&str> = Vec::new();
        let mut current_size = 0;

        for sentence in &sentences[i..] {
            let space = usize::from(!current.is_empty());
            let addition = char_len(sentence) + space;
            if current_size + addition > chunk_size && !current.is_empty() {
                break;
            }
            current.push(sentence);
            current_size += addition;
        }

        chunks.push(current.join(" "));

        if i + current.len() >= sentences.len() {
            break;
        }

        let carried = overlap_sentences(&current, chunk_overlap);
        i = (i + current.len() - carried).max(i + 1);
    }

    chunks
}

/// Count trailing sentences of `chunk` that fit within `overlap` chars.
fn overlap_sentences(chunk: &[&str], overlap: usize) -> usize {
    let mut size = 0;
    let mut count = 0;
    for (k, sentence) in chunk.iter().enumerate().rev() {
        let len = char_len(sentence) + usize::from(k + 1 < chunk.len());
        if size + len > overlap {
            break;
        }
        size += len;
        count += 1;
    }
    count
}

/// Chunk every lesson of a course, assigning course-wide chunk indices.
///
/// The first chunk of each lesson carries a context header naming the
/// course and lesson so the chunk still reads sensibly when retrieved in
/// isolation.
pub fn chunk_course(course: &Course, chunk_size: usize, chunk_overlap: usize) -> Vec<CourseChunk> {
    let mut out = Vec::new();
    let mut chunk_index: i64 = 0;

    for lesson in &course.lessons {
        let header = match lesson.lesson_number {
            Some(n) => format!("Course {} Lesson {} content: ", course.title, n),
            None => format!("Course {} content: ", course.title),
        };

        for (i, text) in chunk_text(&lesson.content, chunk_size, chunk_overlap)
            .into_iter()
            .enumerate()
        {
            let content = if i == 0 {
                format!("{header}{text}")
            } else {
                text
            };
            out.push(CourseChunk {
                course_title: course.title.clone(),
                lesson_number: lesson.lesson_number,
                chunk_index,
                content,
            });
            chunk_index += 1;
        }
    }

    out
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split normalized text into sentences.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for (pos, &(offset, c)) in chars.iter().enumerate() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let followed_by_space = chars.get(pos + 1).is_some_and(|(_, n)| n.is_whitespace());
        let then_upper = chars.get(pos + 2).is_some_and(|(_, n)| n.is_uppercase());
        if !(followed_by_space && then_upper) {
            continue;
        }
        if c == '.' && is_abbreviation(&text[start..offset]) {
            continue;
        }

        let end = offset + c.len_utf8();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Whether the word ending `before` (text up to a `.`) is an abbreviation.
fn is_abbreviation(before: &str) -> bool {
    let word = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric());
    if word.is_empty() {
        return false;
    }
    if ABBREVIATIONS.contains(&word) {
        return true;
    }

    // Single-letter initial or short title such as "J." or "Mt.".
    let mut chars = word.chars();
    let first = chars.next();
    let rest: Vec<char> = chars.collect();
    if first.is_some_and(|c| c.is_ascii_uppercase())
        && rest.len() <= 1
        && rest.iter().all(|c| c.is_ascii_lowercase())
    {
        return true;
    }

    // Dotted initialisms: "e.g", "i.e", "U.S".
    let parts: Vec<&str> = word.split('.').collect();
    parts.len() > 1
        && parts
            .iter()
            .all(|p| p.chars().count() == 1 && p.chars().all(|c| c.is_alphabetic()))
}
