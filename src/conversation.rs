// ============================================================================
// File: src/conversation.rs
// Per-paper conversation session: transcript, input buffer, reply state
// ============================================================================

use tracing::{debug, error};

use crate::models::{Message, Paper};

/// Where a session is in its request/reply loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingReply,
    /// The last request failed; the user may retry or send something new
    ReplyFailed,
    Closed,
}

/// Identifies the request a reply belongs to. A reply is only applied when
/// its ticket still matches the session's current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTicket {
    pub session_id: u64,
    pub generation: u64,
}

/// An outbound request produced by a state transition
#[derive(Debug, Clone)]
pub struct PendingReply {
    pub ticket: ReplyTicket,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Appended,
    Failed,
    Discarded,
}

/// Build the hidden system message that seeds every request.
pub fn system_prompt(paper: &Paper) -> String {
    format!(
        "You are a helpful assistant discussing the following scientific paper:\n\
         Title: {}\n\
         Authors: {}\n\
         Abstract: {}\n\n\
         Provide clear and concise responses about this paper.",
        paper.title,
        paper.authors_line(),
        paper.abstract_text
    )
}

pub struct ConversationSession {
    id: u64,
    paper: Paper,
    transcript: Vec<Message>,
    input: String,
    state: SessionState,
    generation: u64,
}

impl ConversationSession {
    pub fn new(id: u64, paper: Paper) -> Self {
        Self {
            id,
            paper,
            transcript: Vec::new(),
            input: String::new(),
            state: SessionState::Idle,
            generation: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn paper(&self) -> &Paper {
        &self.paper
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.state == SessionState::AwaitingReply
    }

    /// Replace the input buffer. The input is disabled while a reply is
    /// outstanding and after the session is closed.
    pub fn set_input(&mut self, text: &str) {
        if matches!(self.state, SessionState::AwaitingReply | SessionState::Closed) {
            return;
        }
        self.input = text.to_string();
    }

    /// Turn the input buffer into a user turn and the request to send.
    /// Returns `None` without touching any state when the input is blank or
    /// the session cannot accept a submission.
    pub fn submit(&mut self) -> Option<PendingReply> {
        if !matches!(self.state, SessionState::Idle | SessionState::ReplyFailed) {
            return None;
        }
        let text = self.input.trim();
        if text.is_empty() {
            return None;
        }

        self.transcript.push(Message::user(text));
        self.input.clear();
        Some(self.begin_request())
    }

    /// Re-send the unanswered user turn after a failed reply.
    pub fn retry(&mut self) -> Option<PendingReply> {
        if self.state != SessionState::ReplyFailed {
            return None;
        }
        Some(self.begin_request())
    }

    fn begin_request(&mut self) -> PendingReply {
        self.generation += 1;
        self.state = SessionState::AwaitingReply;
        PendingReply {
            ticket: ReplyTicket { session_id: self.id, generation: self.generation },
            messages: self.request_messages(),
        }
    }

    /// `[system, ...transcript]`; the transcript already ends with the new
    /// user turn when this is called.
    fn request_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.transcript.len() + 1);
        messages.push(Message::system(system_prompt(&self.paper)));
        messages.extend(self.transcript.iter().cloned());
        messages
    }

    /// Apply the provider's answer to the request identified by `ticket`.
    pub fn apply_reply(&mut self, ticket: ReplyTicket, result: anyhow::Result<String>) -> ReplyOutcome {
        let current = ReplyTicket { session_id: self.id, generation: self.generation };
        if ticket != current || self.state != SessionState::AwaitingReply {
            debug!(?ticket, ?current, state = ?self.state, "discarding stale reply");
            return ReplyOutcome::Discarded;
        }

        match result {
            Ok(text) => {
                self.transcript.push(Message::assistant(text));
                self.state = SessionState::Idle;
                ReplyOutcome::Appended
            }
            Err(e) => {
                error!(session = self.id, paper = %self.paper.id, "chat completion failed: {:#}", e);
                self.state = SessionState::ReplyFailed;
                ReplyOutcome::Failed
            }
        }
    }

    /// Drop all session state. Outstanding requests are not cancelled; their
    /// replies are discarded when they arrive.
    pub fn close(&mut self) {
        self.transcript.clear();
        self.input.clear();
        self.generation += 1;
        self.state = SessionState::Closed;
    }
}
