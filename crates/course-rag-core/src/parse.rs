//! Course document parser.
//!
//! Course documents are plain text with an optional header block followed
//! by lesson sections:
//!
//! ```text
//! Course Title: Building Towards Computer Use
//! Course Link: https://example.com/computer-use
//! Course Instructor: Colt Steele
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/computer-use/lesson-0
//! Welcome to the course. ...
//!
//! Lesson 1: Overview
//! ...
//! ```
//!
//! Header keys are matched case-insensitively. The `Lesson` keyword is
//! case-sensitive. Structure problems never fail the parse: a missing
//! title falls back to the file stem, and a document with no lesson
//! markers becomes a single unnumbered lesson. The only failures are
//! unreadable input (I/O errors and non-UTF-8 bytes), reported as a
//! [`ParseError`] value.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Course, Lesson};

/// Header lines are only looked for in this many leading non-blank lines.
const HEADER_WINDOW: usize = 4;

/// Per-document failure reported by [`parse_course_file`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8 text")]
    Encoding { path: PathBuf },
}

fn lesson_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Lesson\s+(\d+)\s*:\s*(.*)$").expect("valid regex"))
}

fn lesson_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^lesson\s+link\s*:\s*(.+)$").expect("valid regex"))
}

fn header_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^course\s+(title|link|instructor)\s*:\s*(.*)$").expect("valid regex")
    })
}

/// Read and parse a course document from disk.
///
/// The file stem is used as the course title when the document has no
/// `Course Title:` header.
pub fn parse_course_file(path: &Path) -> Result<Course, ParseError> {
    let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| ParseError::Encoding {
        path: path.to_path_buf(),
    })?;
    let default_title = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(parse_course_document(&text, &default_title))
}

/// Parse course document text. Always succeeds.
pub fn parse_course_document(text: &str, default_title: &str) -> Course {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().collect();

    let mut title: Option<String> = None;
    let mut course_link: Option<String> = None;
    let mut instructor: Option<String> = None;

    // Header block: leading non-blank lines that carry a known key.
    let mut body_start = 0;
    let mut seen = 0;
    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            body_start = i + 1;
            continue;
        }
        if seen == HEADER_WINDOW {
            break;
        }
        seen += 1;
        let Some(caps) = header_line().captures(line) else {
            break;
        };
        let value = caps[2].trim();
        let value = (!value.is_empty()).then(|| value.to_string());
        match caps[1].to_ascii_lowercase().as_str() {
            "title" => title = value,
            "link" => course_link = value,
            _ => instructor = value,
        }
        body_start = i + 1;
    }

    let title = title.unwrap_or_else(|| default_title.to_string());

    let mut lessons: Vec<Lesson> = Vec::new();
    let mut current: Option<Lesson> = None;
    let mut body: Vec<&str> = Vec::new();
    let mut loose: Vec<&str> = Vec::new();

    let mut i = body_start;
    while i < lines.len() {
        let line = lines[i].trim();
        let number = lesson_marker()
            .captures(line)
            .and_then(|caps| Some((caps[1].parse::<i64>().ok()?, caps[2].trim().to_string())));

        match number {
            Some((n, lesson_title)) => {
                if let Some(lesson) = current.take() {
                    push_lesson(&mut lessons, lesson, &body);
                }
                body.clear();

                let mut link = None;
                if let Some(next) = lines.get(i + 1) {
                    if let Some(caps) = lesson_link().captures(next.trim()) {
                        link = Some(caps[1].trim().to_string());
                        i += 1;
                    }
                }
                current = Some(Lesson {
                    lesson_number: Some(n),
                    title: lesson_title,
                    lesson_link: link,
                    content: String::new(),
                });
            }
            None if current.is_some() => body.push(lines[i]),
            None => loose.push(lines[i]),
        }
        i += 1;
    }

    if let Some(lesson) = current.take() {
        push_lesson(&mut lessons, lesson, &body);
    }

    if lessons.is_empty() {
        let content = loose.join("\n").trim().to_string();
        if !content.is_empty() {
            lessons.push(Lesson {
                lesson_number: None,
                title: title.clone(),
                lesson_link: None,
                content,
            });
        }
    }

    Course {
        title,
        course_link,
        instructor,
        lessons,
    }
}

/// Finish a lesson. A repeated lesson number extends the earlier lesson
/// so numbers stay unique within the course.
fn push_lesson(lessons: &mut Vec<Lesson>, mut lesson: Lesson, body: &[&str]) {
    let content = body.join("\n").trim().to_string();
    if let Some(existing) = lessons
        .iter_mut()
        .find(|l| l.lesson_number == lesson.lesson_number)
    {
        if !content.is_empty() {
            if !existing.content.is_empty() {
                existing.content.push('\n');
            }
            existing.content.push_str(&content);
        }
        if existing.lesson_link.is_none() {
            existing.lesson_link = lesson.lesson_link;
        }
        return;
    }
    lesson.content = content;
    lessons.push(lesson);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Course Title: Test Course
Course Link: https://example.com/course
Course Instructor: Test Instructor

Lesson 1: Introduction
Lesson Link: https://example.com/lesson-1
This is the introduction to the test course. It covers basic concepts.

Lesson 2: Advanced Topics
Lesson Link: https://example.com/lesson-2
This lesson covers more advanced topics in the subject matter.
";

    #[test]
    fn test_parses_header_and_lessons() {
        let course = parse_course_document(SAMPLE, "fallback");
        assert_eq!(course.title, "Test Course");
        assert_eq!(course.course_link.as_deref(), Some("https://example.com/course"));
        assert_eq!(course.instructor.as_deref(), Some("Test Instructor"));
        assert_eq!(course.lessons.len(), 2);

        let first = &course.lessons[0];
        assert_eq!(first.lesson_number, Some(1));
        assert_eq!(first.title, "Introduction");
        assert_eq!(first.lesson_link.as_deref(), Some("https://example.com/lesson-1"));
        assert_eq!(
            first.content,
            "This is the introduction to the test course. It covers basic concepts."
        );
        assert_eq!(course.lessons[1].lesson_number, Some(2));
    }

    #[test]
    fn test_missing_title_defaults_to_filename() {
        let course = parse_course_document("Lesson 1: Only\nBody text.", "course3_script");
        assert_eq!(course.title, "course3_script");
        assert_eq!(course.lessons.len(), 1);
        assert!(course.course_link.is_none());
    }

    #[test]
    fn test_no_markers_single_unnumbered_lesson() {
        let course = parse_course_document(
            "Course Title: Notes\n\nJust some prose.\nMore prose.",
            "x",
        );
        assert_eq!(course.lessons.len(), 1);
        assert_eq!(course.lessons[0].lesson_number, None);
        assert_eq!(course.lessons[0].content, "Just some prose.\nMore prose.");
    }

    #[test]
    fn test_lesson_keyword_is_case_sensitive() {
        let text = "Course Title: C\n\nLesson 1: Real\nbody\nlesson 2: not a marker\nmore";
        let course = parse_course_document(text, "x");
        assert_eq!(course.lessons.len(), 1);
        assert!(course.lessons[0].content.contains("lesson 2: not a marker"));
    }

    #[test]
    fn test_marker_tolerates_whitespace() {
        let course = parse_course_document("Lesson   7 :   Spaced Out\nbody", "x");
        assert_eq!(course.lessons[0].lesson_number, Some(7));
        assert_eq!(course.lessons[0].title, "Spaced Out");
    }

    #[test]
    fn test_header_keys_case_insensitive() {
        let course = parse_course_document("course title: Lower\nCOURSE LINK: u\n", "x");
        assert_eq!(course.title, "Lower");
        assert_eq!(course.course_link.as_deref(), Some("u"));
    }

    #[test]
    fn test_empty_document() {
        let course = parse_course_document("", "empty");
        assert_eq!(course.title, "empty");
        assert!(course.lessons.is_empty());
    }

    #[test]
    fn test_duplicate_lesson_numbers_merge() {
        let text = "Lesson 1: A\nfirst\nLesson 1: A again\nsecond";
        let course = parse_course_document(text, "x");
        assert_eq!(course.lessons.len(), 1);
        assert_eq!(course.lessons[0].title, "A");
        assert_eq!(course.lessons[0].content, "first\nsecond");
    }

    #[test]
    fn test_invalid_utf8_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let err = parse_course_file(&path).unwrap_err();
        assert!(matches!(err, ParseError::Encoding { .. }));

        let missing = parse_course_file(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(missing, ParseError::Io { .. }));
    }
}
