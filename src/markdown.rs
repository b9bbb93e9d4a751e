// ============================================================================
// File: src/markdown.rs
// Markdown export of a conversation transcript
// ============================================================================

use anyhow::Result;
use chrono::Local;
use std::fs;
use std::path::Path;

use crate::models::{Message, Paper, Role};

pub struct TranscriptExporter<'a> {
    paper: &'a Paper,
    transcript: &'a [Message],
}

impl<'a> TranscriptExporter<'a> {
    pub fn new(paper: &'a Paper, transcript: &'a [Message]) -> Self {
        Self { paper, transcript }
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut content = String::new();

        self.write_header(&mut content);
        self.write_abstract(&mut content);
        self.write_transcript(&mut content);

        content
    }

    fn write_header(&self, content: &mut String) {
        content.push_str(&format!("# Chat: {}\n\n", self.paper.title));
        content.push_str(&format!("**Paper**: <{}>\n\n", self.paper.url));
        if !self.paper.authors.is_empty() {
            content.push_str(&format!("**Authors**: {}\n\n", self.paper.authors_line()));
        }
        content.push_str(&format!("**Date**: {}\n\n", Local::now().format("%Y-%m-%d %H:%M:%S")));
    }

    fn write_abstract(&self, content: &mut String) {
        content.push_str("## Abstract\n\n");
        content.push_str(&self.paper.abstract_text);
        content.push_str("\n\n");
    }

    fn write_transcript(&self, content: &mut String) {
        content.push_str("## Conversation\n\n");

        for message in self.transcript {
            let speaker = match message.role {
                Role::User => "You",
                Role::Assistant => "Assistant",
                Role::System => continue,
            };
            content.push_str(&format!("#### {}\n\n", speaker));
            content.push_str(&message.content);
            content.push_str("\n\n---\n\n");
        }
    }
}
