//! Content catalog: the closed category set and the built-in documents.
//!
//! Dispatch is a plain `match` over [`Category`], so adding a category is a
//! compile error everywhere it is not handled.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::{CatalogError, ContentCatalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Til,
    Snippet,
    Note,
    Progress,
    Project,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Til,
        Category::Snippet,
        Category::Note,
        Category::Progress,
        Category::Project,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Til => "til",
            Category::Snippet => "snippet",
            Category::Note => "note",
            Category::Progress => "progress",
            Category::Project => "project",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownCategory(s.to_string()))
    }
}

/// Uniform draw over `categories`. `None` only when the slice is empty.
pub fn select_category<R: Rng + ?Sized>(categories: &[Category], rng: &mut R) -> Option<Category> {
    categories.choose(rng).copied()
}

/// Catalog of built-in markdown documents, dated with the contribution day.
#[derive(Debug, Clone)]
pub struct BuiltinCatalog {
    date: NaiveDate,
}

impl BuiltinCatalog {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    fn date_label(&self) -> String {
        self.date.format("%B %-d, %Y").to_string()
    }
}

impl ContentCatalog for BuiltinCatalog {
    fn produce(&self, category: Category) -> Result<String, CatalogError> {
        let mut rng = rand::thread_rng();
        let date = self.date_label();
        let body = match category {
            Category::Til => TIL_TOPICS.choose(&mut rng).map(|t| render_til(t, &date)),
            Category::Snippet => SNIPPETS.choose(&mut rng).map(|s| render_snippet(s, &date)),
            Category::Note => NOTES.choose(&mut rng).map(|n| render_note(n, &date)),
            Category::Progress => PROGRESS_UPDATES
                .choose(&mut rng)
                .map(|update| render_progress(update, &date)),
            Category::Project => PROJECTS.choose(&mut rng).map(|p| render_project(p, &date)),
        };
        let mut body = body
            .filter(|b| !b.trim().is_empty())
            .ok_or(CatalogError::EmptyDocument(category))?;
        if !body.ends_with('\n') {
            body.push('\n');
        }
        debug!(%category, bytes = body.len(), "Rendered catalog document");
        Ok(body)
    }
}

struct Topic {
    title: &'static str,
    body: &'static str,
}

struct Snippet {
    title: &'static str,
    language: &'static str,
    code: &'static str,
    description: &'static str,
}

struct ProjectFile {
    name: &'static str,
    language: &'static str,
    content: &'static str,
}

struct Project {
    name: &'static str,
    title: &'static str,
    description: &'static str,
    files: &'static [ProjectFile],
}

const TIL_TOPICS: &[Topic] = &[
    Topic {
        title: "Iterator adaptors are lazy",
        body: "Calling `map` or `filter` on an iterator builds a new adaptor and does no work until something consumes it, such as `collect`, `sum` or a `for` loop.",
    },
    Topic {
        title: "Git rebase vs merge",
        body: "Rebase rewrites local commits on top of the target and keeps history linear. Merge records a merge commit and keeps the branch shape. Rebase private branches, merge shared ones.",
    },
    Topic {
        title: "Docker layer caching",
        body: "Each Dockerfile instruction is a cached layer. Copying the dependency manifest and installing dependencies before copying the source keeps rebuilds fast.",
    },
    Topic {
        title: "Database indexing",
        body: "Indexes speed up reads on columns used in WHERE, JOIN and ORDER BY clauses, and slow down every write that touches them.",
    },
    Topic {
        title: "HTTP method semantics",
        body: "GET and DELETE are idempotent, PUT replaces a resource, PATCH updates part of it, and POST creates or triggers a non-idempotent action.",
    },
];

const SNIPPETS: &[Snippet] = &[
    Snippet {
        title: "Retry with exponential backoff",
        language: "rust",
        code: r#"async fn retry<T, E, F, Fut>(mut op: F, attempts: u32) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut delay = std::time::Duration::from_millis(100);
    let mut tries = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if tries + 1 >= attempts => return Err(e),
            Err(_) => {
                tokio::time::sleep(delay).await;
                delay *= 2;
                tries += 1;
            }
        }
    }
}"#,
        description: "Retries an async operation, doubling the wait between attempts.",
    },
    Snippet {
        title: "Human readable file size",
        language: "rust",
        code: r#"fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}"#,
        description: "Formats a byte count with the largest fitting binary unit.",
    },
    Snippet {
        title: "Debounce",
        language: "typescript",
        code: r#"function debounce<T extends (...args: any[]) => void>(fn: T, wait: number) {
  let timer: ReturnType<typeof setTimeout> | undefined;
  return (...args: Parameters<T>) => {
    if (timer) clearTimeout(timer);
    timer = setTimeout(() => fn(...args), wait);
  };
}"#,
        description: "Delays a call until `wait` ms have passed without another call.",
    },
];

const NOTES: &[Topic] = &[
    Topic {
        title: "Microservice patterns",
        body: "## API gateway\n\n- Single entry point for clients\n- Routing, authentication, rate limiting\n\n## Circuit breaker\n\n- Stops cascading failures\n- Fails fast while a dependency is down\n- Probes for recovery\n\n## Challenges\n\n- Data consistency across services\n- Network latency",
    },
    Topic {
        title: "Query optimisation",
        body: "## Indexing\n\n- Index columns that are queried often\n- Prefer composite indexes for multi-column filters\n\n## Performance\n\n- Read the query plan with EXPLAIN\n- Paginate large result sets\n\n## Connections\n\n- Pool connections and size the pool for the load",
    },
    Topic {
        title: "Web application security",
        body: "## Passwords\n\n- Hash with argon2 or bcrypt\n- Rate limit login attempts\n\n## Input\n\n- Validate every input\n- Use parameterised queries\n\n## Transport\n\n- HTTPS everywhere\n- Set CSP and HSTS headers",
    },
];

const PROGRESS_UPDATES: &[&str] = &[
    "Refactored the authentication module for readability",
    "Added error handling across the API endpoints",
    "Updated the documentation with the latest API changes",
    "Cut database response time by rewriting two slow queries",
    "Added unit tests for the core business logic",
    "Automated the release pipeline",
    "Fixed a production bug in request validation",
];

const PROJECTS: &[Project] = &[
    Project {
        name: "token-bucket",
        title: "Token bucket rate limiter",
        description: "A small rate limiter that refills tokens at a fixed rate.",
        files: &[
            ProjectFile {
                name: "src/lib.rs",
                language: "rust",
                content: r#"use std::time::Instant;

pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self { capacity, tokens: capacity, refill_per_sec, last: Instant::now() }
    }

    pub fn try_take(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}"#,
            },
            ProjectFile {
                name: "Cargo.toml",
                language: "toml",
                content: "[package]\nname = \"token-bucket\"\nversion = \"0.1.0\"\nedition = \"2021\"",
            },
        ],
    },
    Project {
        name: "event-emitter",
        title: "Typed event emitter",
        description: "Subscribe handlers by event name and emit typed payloads.",
        files: &[
            ProjectFile {
                name: "src/emitter.ts",
                language: "typescript",
                content: r#"type Handler<T> = (payload: T) => void;

export class Emitter<Events extends Record<string, unknown>> {
  private handlers: { [K in keyof Events]?: Handler<Events[K]>[] } = {};

  on<K extends keyof Events>(event: K, handler: Handler<Events[K]>): void {
    (this.handlers[event] ??= []).push(handler);
  }

  emit<K extends keyof Events>(event: K, payload: Events[K]): void {
    this.handlers[event]?.forEach((h) => h(payload));
  }
}"#,
            },
            ProjectFile {
                name: "package.json",
                language: "json",
                content: "{\n  \"name\": \"event-emitter\",\n  \"version\": \"1.0.0\",\n  \"main\": \"dist/emitter.js\"\n}",
            },
        ],
    },
];

fn render_til(topic: &Topic, date: &str) -> String {
    format!(
        "# TIL: {title}\n\n**Date:** {date}\n\n## What I learned\n\n{body}\n\n## Why it matters\n\nSmall details like this add up to code that is easier to maintain.\n\n---\n*Part of my daily learning log.*\n",
        title = topic.title,
        body = topic.body,
    )
}

fn render_snippet(snippet: &Snippet, date: &str) -> String {
    format!(
        "# Code snippet: {title}\n\n**Date:** {date}\n\n## Description\n\n{description}\n\n## Code\n\n```{language}\n{code}\n```\n\n---\n*Part of my snippet collection.*\n",
        title = snippet.title,
        description = snippet.description,
        language = snippet.language,
        code = snippet.code,
    )
}

fn render_note(note: &Topic, date: &str) -> String {
    format!(
        "# Technical note: {title}\n\n**Date:** {date}\n\n{body}\n\n---\n*Notes from ongoing reading and research.*\n",
        title = note.title,
        body = note.body,
    )
}

fn render_progress(update: &str, date: &str) -> String {
    format!(
        "# Daily progress\n\n**Date:** {date}\n\n## Done today\n\n{update}\n\n## Next\n\n- Keep monitoring\n- Collect feedback\n\n---\n*Daily progress log.*\n"
    )
}

fn render_project(project: &Project, date: &str) -> String {
    let mut out = format!(
        "# Project: {title}\n\n**Date:** {date}\n\n{description}\n\n## Layout\n\n```\n{name}/\n",
        title = project.title,
        description = project.description,
        name = project.name,
    );
    for file in project.files {
        out.push_str(&format!("├── {}\n", file.name));
    }
    out.push_str("```\n\n## Files\n\n");
    for file in project.files {
        out.push_str(&format!(
            "### {}\n\n```{}\n{}\n```\n\n",
            file.name, file.language, file.content
        ));
    }
    out.push_str("---\n*Part of my daily build log.*\n");
    out
}
