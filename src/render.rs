// ============================================================================
// File: src/render.rs
// Terminal rendering of result cards and chat transcripts
// ============================================================================

use colored::*;

use crate::conversation::{ConversationSession, SessionState};
use crate::models::{Paper, Role};

/// The "begin chat" action of a card: hand back the exact record.
pub fn pick(papers: &[Paper], index: usize) -> Option<&Paper> {
    papers.get(index)
}

/// Render one result card. `number` is the 1-based position shown to the user.
pub fn render_card(number: usize, paper: &Paper) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n",
        format!("[{}]", number).bright_black(),
        paper.title.bright_white().bold()));
    out.push_str(&format!("    {}\n", paper.url.blue().underline()));
    if !paper.authors.is_empty() {
        out.push_str(&format!("    {}\n", paper.authors_line().green()));
    }
    if !paper.abstract_text.is_empty() {
        out.push_str(&format!("    {}\n", paper.abstract_text));
    }
    out.push_str(&format!("    {}\n",
        format!("→ /chat {} to chat about this paper", number).yellow()));
    out
}

pub fn render_results(papers: &[Paper]) -> String {
    if papers.is_empty() {
        return format!("{}\n", "No papers found.".bright_black());
    }
    papers
        .iter()
        .enumerate()
        .map(|(i, paper)| render_card(i + 1, paper))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Header shown when a conversation is opened
pub fn render_chat_header(paper: &Paper) -> String {
    format!("\n{} {}\n{}\n",
        "●".bright_cyan(),
        paper.title.bright_white().bold(),
        "Ask about the paper. /close to leave, /save <file> to export.".bright_black())
}

pub fn render_message(role: Role, content: &str) -> String {
    let label = match role {
        Role::User => "You".cyan().bold(),
        Role::Assistant => "Assistant".magenta().bold(),
        Role::System => "System".bright_black().bold(),
    };
    format!("{}: {}", label, content)
}

pub fn render_transcript(session: &ConversationSession) -> String {
    let mut lines: Vec<String> = session
        .transcript()
        .iter()
        .map(|m| render_message(m.role, &m.content))
        .collect();
    match session.state() {
        SessionState::AwaitingReply => lines.push("Thinking...".bright_black().italic().to_string()),
        SessionState::ReplyFailed => lines.push(reply_failed_hint()),
        SessionState::Idle | SessionState::Closed => {}
    }
    lines.join("\n")
}

pub fn reply_failed_hint() -> String {
    format!("{} Reply failed. Type /retry to try again.", "⚠".yellow())
}

pub fn render_notice(title: &str, description: &str) -> String {
    format!("{} {}: {}", "✗".red().bold(), title.red().bold(), description)
}
