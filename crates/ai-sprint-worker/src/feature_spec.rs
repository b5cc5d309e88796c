// crates/ai-sprint-worker/src/feature_spec.rs
// ============================================================================
// Module: Feature Spec Parsing
// Description: Parses a feature's `tasks.md` artifact into convoys and tasks.
// Purpose: Give the Supervisor's materialization step (§4.5) a typed
//          intermediate form to build `Convoy`/`Task` records from, decoupled
//          from the concrete markdown grammar via the `FeatureSpecParser`
//          seam.
// Dependencies: ai-sprint-core::model, thiserror, std
// ============================================================================

//! ## Overview
//! A feature directory holds three fixed filenames: `spec.md`, `plan.md`,
//! `tasks.md`. Only `tasks.md` is consumed by the coordination plane; `spec.md`
//! and `plan.md` are human-facing and the core never reads them. There is no
//! grammar for `tasks.md` to ground against, so [`MarkdownTasksParser`]
//! defines a minimal, line-oriented one in the same style as
//! [`ai_sprint_gates::thresholds::parse_mutation_output`]: convoy sections
//! headed by `## Convoy: <story>`, a required `files:` line, an optional
//! `depends_on:` line naming other convoys in the same document by story, and
//! one `- [ ]` line per task with an inline `:: <file_path>` and optional
//! indented `acceptance:` line.
//!
//! ```text
//! ## Convoy: Add login form (priority: P1)
//! files: src/auth/login.rs, src/auth/mod.rs
//! depends_on: Add session store
//!
//! - [ ] Render the login form :: src/auth/login.rs
//!   Build the form markup and wire up the submit handler.
//!   acceptance: Form renders username/password fields; Submit posts credentials
//! ```

use std::collections::BTreeSet;

use ai_sprint_core::model::Priority;
use thiserror::Error;

/// Failures parsing or validating a `tasks.md` artifact.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeatureSpecError {
    /// No `## Convoy:` section was found anywhere in the document.
    #[error("tasks.md contains no convoy sections")]
    NoConvoys,
    /// A convoy section named the same story as an earlier one in the same
    /// document.
    #[error("duplicate convoy story {0:?}")]
    DuplicateStory(String),
    /// A convoy section had no `files:` line.
    #[error("convoy {0:?} is missing a files: line")]
    MissingFiles(String),
    /// A `priority:` annotation did not match `P1`/`P2`/`P3`.
    #[error("convoy {story:?} has invalid priority {value:?}")]
    InvalidPriority {
        /// The convoy whose priority annotation was invalid.
        story: String,
        /// The unrecognized value.
        value: String,
    },
    /// A convoy section had no `- [ ]` task lines.
    #[error("convoy {0:?} has no tasks")]
    EmptyConvoy(String),
    /// A `- [ ]` line had no ` :: <file_path>` suffix.
    #[error("task line {0:?} is missing a :: <file_path> suffix")]
    MalformedTaskLine(String),
    /// A `depends_on:` line named a story not defined anywhere in the
    /// document.
    #[error("convoy {story:?} depends on undefined convoy {dependency:?}")]
    UnknownDependency {
        /// The convoy whose dependency could not be resolved.
        story: String,
        /// The undefined story name it referenced.
        dependency: String,
    },
}

/// One task parsed out of a convoy section, prior to id allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    /// Task title, taken verbatim from the `- [ ]` line.
    pub title: String,
    /// The file this task edits.
    pub file_path: String,
    /// Free-form description lines following the title, joined with `\n`.
    pub description: String,
    /// Acceptance-criterion descriptions from an `acceptance:` line, if any.
    pub acceptance_criteria: Vec<String>,
}

/// One convoy parsed out of `tasks.md`, prior to id allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConvoy {
    /// The convoy's story name, also its identity within the document for
    /// `depends_on` resolution.
    pub story: String,
    /// Priority class; defaults to [`Priority::P2`] when unannotated.
    pub priority: Priority,
    /// File paths this convoy owns.
    pub files: BTreeSet<String>,
    /// Story names of convoys this one depends on.
    pub dependencies: BTreeSet<String>,
    /// Tasks under this convoy, in document order.
    pub tasks: Vec<ParsedTask>,
}

/// Parses a feature's `tasks.md` contents into its convoys and tasks.
pub trait FeatureSpecParser {
    /// Parses `tasks_md` into an ordered list of convoys.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureSpecError`] if the document is empty of convoys, a
    /// convoy is missing required fields, or a dependency names an undefined
    /// story.
    fn parse(&self, tasks_md: &str) -> Result<Vec<ParsedConvoy>, FeatureSpecError>;
}

/// The reference [`FeatureSpecParser`]: the minimal line-oriented grammar
/// documented on this module.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownTasksParser;

impl FeatureSpecParser for MarkdownTasksParser {
    fn parse(&self, tasks_md: &str) -> Result<Vec<ParsedConvoy>, FeatureSpecError> {
        let mut convoys = Vec::new();
        let mut seen_stories = BTreeSet::new();
        let mut lines = tasks_md.lines().peekable();

        while let Some(line) = lines.next() {
            let Some(header) = line.trim().strip_prefix("## Convoy:") else { continue };
            let (story, priority) = parse_header(header.trim())?;
            if !seen_stories.insert(story.clone()) {
                return Err(FeatureSpecError::DuplicateStory(story));
            }

            let mut files: Option<BTreeSet<String>> = None;
            let mut dependencies = BTreeSet::new();
            let mut tasks = Vec::new();

            while let Some(&next) = lines.peek() {
                let trimmed = next.trim();
                if trimmed.starts_with("## Convoy:") {
                    break;
                }
                lines.next();

                if let Some(rest) = trimmed.strip_prefix("files:") {
                    files = Some(split_list(rest));
                } else if let Some(rest) = trimmed.strip_prefix("depends_on:") {
                    dependencies = split_list(rest);
                } else if let Some(rest) = trimmed.strip_prefix("- [ ]") {
                    tasks.push(parse_task(rest.trim(), &mut lines)?);
                }
            }

            let files = files.ok_or_else(|| FeatureSpecError::MissingFiles(story.clone()))?;
            if tasks.is_empty() {
                return Err(FeatureSpecError::EmptyConvoy(story));
            }
            convoys.push(ParsedConvoy { story, priority, files, dependencies, tasks });
        }

        if convoys.is_empty() {
            return Err(FeatureSpecError::NoConvoys);
        }
        for convoy in &convoys {
            for dependency in &convoy.dependencies {
                if !seen_stories.contains(dependency) {
                    return Err(FeatureSpecError::UnknownDependency {
                        story: convoy.story.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        Ok(convoys)
    }
}

/// Parses a `## Convoy: <story> (priority: Pn)` header, `story` trimmed of
/// the optional trailing `(priority: ...)` annotation.
fn parse_header(header: &str) -> Result<(String, Priority), FeatureSpecError> {
    let Some(open) = header.find('(') else {
        return Ok((header.trim().to_string(), Priority::P2));
    };
    let story = header[..open].trim().to_string();
    let annotation = header[open..].trim_start_matches('(').trim_end_matches(')');
    let Some(value) = annotation.strip_prefix("priority:").map(str::trim) else {
        return Ok((story, Priority::P2));
    };
    let priority = match value {
        "P1" => Priority::P1,
        "P2" => Priority::P2,
        "P3" => Priority::P3,
        other => {
            return Err(FeatureSpecError::InvalidPriority { story, value: other.to_string() });
        }
    };
    Ok((story, priority))
}

/// Splits a comma-separated list into a set, trimming whitespace and
/// dropping empty entries.
fn split_list(raw: &str) -> BTreeSet<String> {
    raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()).map(str::to_string).collect()
}

/// Parses one `- [ ] <title> :: <file_path>` line plus any indented
/// continuation lines (free-form description, or an `acceptance:` line).
fn parse_task<'a>(
    rest: &str,
    lines: &mut std::iter::Peekable<std::str::Lines<'a>>,
) -> Result<ParsedTask, FeatureSpecError> {
    let Some((title, file_path)) = rest.split_once("::") else {
        return Err(FeatureSpecError::MalformedTaskLine(rest.to_string()));
    };
    let title = title.trim().to_string();
    let file_path = file_path.trim().to_string();

    let mut description_lines = Vec::new();
    let mut acceptance_criteria = Vec::new();

    while let Some(&next) = lines.peek() {
        if next.trim().is_empty() || !next.starts_with(char::is_whitespace) {
            break;
        }
        let line = lines.next().expect("peeked").trim();
        if let Some(rest) = line.strip_prefix("acceptance:") {
            acceptance_criteria.extend(rest.split(';').map(str::trim).filter(|c| !c.is_empty()).map(str::to_string));
        } else {
            description_lines.push(line.to_string());
        }
    }

    Ok(ParsedTask { title, file_path, description: description_lines.join("\n"), acceptance_criteria })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
## Convoy: Add session store (priority: P1)
files: src/auth/session.rs

- [ ] Define the session struct :: src/auth/session.rs
  acceptance: Session carries a user id and expiry

## Convoy: Add login form
files: src/auth/login.rs, src/auth/mod.rs
depends_on: Add session store

- [ ] Render the login form :: src/auth/login.rs
  Build the form markup and wire up the submit handler.
  acceptance: Form renders username/password fields; Submit posts credentials
- [ ] Validate credentials :: src/auth/login.rs
";

    #[test]
    fn parses_two_convoys_with_a_dependency() {
        let convoys = MarkdownTasksParser.parse(SAMPLE).expect("parse");
        assert_eq!(convoys.len(), 2);
        assert_eq!(convoys[0].story, "Add session store");
        assert_eq!(convoys[0].priority, Priority::P1);
        assert_eq!(convoys[1].story, "Add login form");
        assert_eq!(convoys[1].priority, Priority::P2);
        assert!(convoys[1].dependencies.contains("Add session store"));
        assert_eq!(convoys[1].tasks.len(), 2);
    }

    #[test]
    fn parses_task_descriptions_and_acceptance_criteria() {
        let convoys = MarkdownTasksParser.parse(SAMPLE).expect("parse");
        let task = &convoys[1].tasks[0];
        assert_eq!(task.file_path, "src/auth/login.rs");
        assert!(task.description.contains("Build the form markup"));
        assert_eq!(task.acceptance_criteria.len(), 2);
    }

    #[test]
    fn a_task_with_no_acceptance_line_still_parses() {
        let convoys = MarkdownTasksParser.parse(SAMPLE).expect("parse");
        let task = &convoys[1].tasks[1];
        assert_eq!(task.title, "Validate credentials");
        assert!(task.acceptance_criteria.is_empty());
    }

    #[test]
    fn an_empty_document_errors_with_no_convoys() {
        let err = MarkdownTasksParser.parse("").expect_err("should not parse");
        assert_eq!(err, FeatureSpecError::NoConvoys);
    }

    #[test]
    fn a_convoy_missing_files_errors() {
        let doc = "## Convoy: Bare\n\n- [ ] Do a thing :: src/a.rs\n";
        let err = MarkdownTasksParser.parse(doc).expect_err("should not parse");
        assert_eq!(err, FeatureSpecError::MissingFiles("Bare".to_string()));
    }

    #[test]
    fn a_convoy_with_no_tasks_errors() {
        let doc = "## Convoy: Bare\nfiles: src/a.rs\n";
        let err = MarkdownTasksParser.parse(doc).expect_err("should not parse");
        assert_eq!(err, FeatureSpecError::EmptyConvoy("Bare".to_string()));
    }

    #[test]
    fn a_dependency_on_an_undefined_convoy_errors() {
        let doc = "## Convoy: X\nfiles: src/a.rs\ndepends_on: Ghost\n\n- [ ] t :: src/a.rs\n";
        let err = MarkdownTasksParser.parse(doc).expect_err("should not parse");
        assert_eq!(err, FeatureSpecError::UnknownDependency { story: "X".to_string(), dependency: "Ghost".to_string() });
    }

    #[test]
    fn a_duplicate_story_errors() {
        let doc = "## Convoy: X\nfiles: src/a.rs\n\n- [ ] t :: src/a.rs\n\n## Convoy: X\nfiles: src/b.rs\n\n- [ ] t :: src/b.rs\n";
        let err = MarkdownTasksParser.parse(doc).expect_err("should not parse");
        assert_eq!(err, FeatureSpecError::DuplicateStory("X".to_string()));
    }

    #[test]
    fn an_invalid_priority_annotation_errors() {
        let doc = "## Convoy: X (priority: P9)\nfiles: src/a.rs\n\n- [ ] t :: src/a.rs\n";
        let err = MarkdownTasksParser.parse(doc).expect_err("should not parse");
        assert_eq!(err, FeatureSpecError::InvalidPriority { story: "X".to_string(), value: "P9".to_string() });
    }

    #[test]
    fn a_malformed_task_line_errors() {
        let doc = "## Convoy: X\nfiles: src/a.rs\n\n- [ ] a title with no separator\n";
        let err = MarkdownTasksParser.parse(doc).expect_err("should not parse");
        assert!(matches!(err, FeatureSpecError::MalformedTaskLine(_)));
    }
}
