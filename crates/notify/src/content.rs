//! Email content rendering.
//!
//! Builds the plain-text and HTML bodies for the change summary email, and
//! the per-event text block reused by the To Do channel.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::events::ChangeEvent;

/// Rendering switches taken from the config file settings.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Include the compare/diff link per event.
    pub include_diff_link: bool,
    /// Include the first line of the commit message per event.
    pub include_commit_message: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_diff_link: true,
            include_commit_message: true,
        }
    }
}

/// Build the email subject line.
///
/// Single-repository runs name the repository; multi-repository runs
/// summarize the counts.
#[must_use]
pub fn subject(events: &[ChangeEvent], prefix: &str) -> String {
    let repo_count = group_by_repo(events).len();
    if repo_count == 1 {
        let basename = events[0].repo_basename();
        format!("{prefix} {basename}: {} file(s) updated", events.len())
    } else {
        format!(
            "{prefix} {} files updated across {repo_count} repositories",
            events.len()
        )
    }
}

/// Render the plain-text email body.
#[must_use]
pub fn render_text(
    events: &[ChangeEvent],
    options: &RenderOptions,
    generated_at: DateTime<Utc>,
) -> String {
    let grouped = group_by_repo(events);

    let mut text = String::new();
    let _ = writeln!(text, "{}", "━".repeat(50));
    let _ = writeln!(text, "Watched file updates");
    let _ = writeln!(text, "{}", "━".repeat(50));
    let _ = writeln!(
        text,
        "Checked at: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        text,
        "Updates: {} repositories / {} files",
        grouped.len(),
        events.len()
    );
    let _ = writeln!(text, "{}", "━".repeat(50));
    text.push('\n');

    for (repo, repo_events) in &grouped {
        let _ = writeln!(text, "{repo}");
        let _ = writeln!(text, "{}", "-".repeat(40));
        for event in repo_events {
            text.push_str(&render_event_text(event, options));
            text.push('\n');
        }
    }

    text
}

/// Render a single event as an indented text block.
///
/// Shared between the email body and the To Do task body.
#[must_use]
pub fn render_event_text(event: &ChangeEvent, options: &RenderOptions) -> String {
    let mut block = String::new();
    let _ = writeln!(block, "  {} ({})", event.path, event.branch);
    let _ = writeln!(
        block,
        "     Author: {} | Date: {}",
        event.author,
        event.committed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if options.include_commit_message {
        let _ = writeln!(block, "     Commit: {}", event.message);
    }
    if options.include_diff_link {
        let _ = writeln!(block, "     Diff: {}", event.compare_url());
    }
    let _ = writeln!(block, "     Commit view: {}", event.commit_url());
    let _ = writeln!(block, "     File: {}", event.file_url());
    block
}

/// Render the HTML email body.
#[must_use]
pub fn render_html(
    events: &[ChangeEvent],
    options: &RenderOptions,
    generated_at: DateTime<Utc>,
) -> String {
    let grouped = group_by_repo(events);
    let repo_count = grouped.len();
    let file_count = events.len();
    let checked_at = generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();

    let mut sections = String::new();
    for (repo, repo_events) in &grouped {
        let _ = write!(
            sections,
            r#"
            <div class="repo">
                <div class="repo-name">{repo}</div>"#,
            repo = html_escape(repo),
        );

        for event in repo_events {
            let message_html = if options.include_commit_message {
                format!(
                    r#"<div class="message">{}</div>"#,
                    html_escape(&event.message)
                )
            } else {
                String::new()
            };

            let diff_link = if options.include_diff_link {
                format!(
                    r#"<a class="button" href="{}">Compare</a>"#,
                    event.compare_url()
                )
            } else {
                String::new()
            };

            let _ = write!(
                sections,
                r#"
                <div class="entry">
                    <div class="path">{path}</div>
                    <div class="body">
                        <span class="tag">{monitor}</span>
                        {message_html}
                        <div class="meta">{author} &bull; {date} &bull; {branch}</div>
                        <div class="links">
                            {diff_link}
                            <a class="button" href="{commit_url}">Commit</a>
                            <a class="button" href="{file_url}">File</a>
                        </div>
                    </div>
                </div>"#,
                path = html_escape(&event.path),
                monitor = html_escape(&event.monitor),
                message_html = message_html,
                author = html_escape(&event.author),
                date = event.committed_at.format("%Y-%m-%d %H:%M UTC"),
                branch = html_escape(&event.branch),
                diff_link = diff_link,
                commit_url = event.commit_url(),
                file_url = event.file_url(),
            );
        }

        sections.push_str("\n            </div>");
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
            color: #24292f;
            background-color: #f6f8fa;
            margin: 0;
            padding: 20px;
        }}
        .container {{
            max-width: 600px;
            margin: 0 auto;
            background: #ffffff;
            border: 1px solid #d0d7de;
            border-radius: 6px;
            overflow: hidden;
        }}
        .header {{
            padding: 24px;
            border-bottom: 1px solid #d0d7de;
            text-align: center;
        }}
        .header h1 {{
            margin: 0;
            font-size: 20px;
            font-weight: 600;
        }}
        .header .stats {{
            margin-top: 8px;
            font-size: 13px;
            color: #57606a;
        }}
        .content {{
            padding: 24px;
        }}
        .repo {{
            margin-bottom: 24px;
        }}
        .repo-name {{
            font-size: 16px;
            font-weight: 600;
            padding-bottom: 8px;
            margin-bottom: 12px;
            border-bottom: 1px solid #d0d7de;
        }}
        .entry {{
            border: 1px solid #d0d7de;
            border-radius: 6px;
            overflow: hidden;
            margin-bottom: 16px;
        }}
        .path {{
            background: #f6f8fa;
            padding: 8px 12px;
            border-bottom: 1px solid #d0d7de;
            font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace;
            font-size: 12px;
            color: #57606a;
            word-break: break-all;
        }}
        .body {{
            padding: 12px;
        }}
        .tag {{
            display: inline-block;
            padding: 2px 6px;
            background: #ddf4ff;
            color: #0969da;
            border: 1px solid rgba(9, 105, 218, 0.2);
            border-radius: 10px;
            font-size: 12px;
            font-weight: 500;
            margin-bottom: 8px;
        }}
        .message {{
            font-size: 14px;
            font-weight: 600;
            margin-bottom: 8px;
        }}
        .meta {{
            font-size: 12px;
            color: #57606a;
            margin-bottom: 12px;
        }}
        .button {{
            display: inline-block;
            padding: 5px 12px;
            background: #f6f8fa;
            color: #24292f;
            border: 1px solid #d0d7de;
            border-radius: 6px;
            font-size: 12px;
            font-weight: 500;
            text-decoration: none;
            margin-right: 4px;
        }}
        .footer {{
            background: #f6f8fa;
            padding: 16px;
            border-top: 1px solid #d0d7de;
            text-align: center;
            font-size: 12px;
            color: #57606a;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Watched file updates</h1>
            <div class="stats">{repo_count} repositories &bull; {file_count} files &bull; {checked_at}</div>
        </div>
        <div class="content">{sections}
        </div>
        <div class="footer">
            Generated by langwatch
        </div>
    </div>
</body>
</html>"#,
        repo_count = repo_count,
        file_count = file_count,
        checked_at = checked_at,
        sections = sections,
    )
}

/// Group events by repository, preserving a stable order.
fn group_by_repo(events: &[ChangeEvent]) -> BTreeMap<&str, Vec<&ChangeEvent>> {
    let mut grouped: BTreeMap<&str, Vec<&ChangeEvent>> = BTreeMap::new();
    for event in events {
        grouped.entry(event.repo.as_str()).or_default().push(event);
    }
    grouped
}

/// Simple HTML escaping for user content.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
