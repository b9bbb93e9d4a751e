// ============================================================================
// File: src/browser.rs
// Page-level controller: result list, loading flag, open conversation
// ============================================================================

use anyhow::Result;
use tracing::{debug, error};

use crate::conversation::{ConversationSession, ReplyOutcome, ReplyTicket};
use crate::models::Paper;
use crate::render;

/// Identifies the search a response belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Loaded(usize),
    Failed,
    Discarded,
}

#[derive(Default)]
pub struct PaperBrowser {
    results: Vec<Paper>,
    loading: bool,
    search_generation: u64,
    session: Option<ConversationSession>,
    next_session_id: u64,
}

impl PaperBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[Paper] {
        &self.results
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Start a search. Returns the ticket and trimmed query to send, or
    /// `None` for a blank query or while another search is outstanding.
    pub fn begin_search(&mut self, query: &str) -> Option<(SearchTicket, String)> {
        let query = query.trim();
        if query.is_empty() || self.loading {
            return None;
        }
        self.search_generation += 1;
        self.loading = true;
        self.results.clear();
        Some((SearchTicket(self.search_generation), query.to_string()))
    }

    pub fn finish_search(&mut self, ticket: SearchTicket, result: Result<Vec<Paper>>) -> SearchOutcome {
        if ticket != SearchTicket(self.search_generation) {
            debug!(?ticket, current = self.search_generation, "discarding stale search response");
            return SearchOutcome::Discarded;
        }
        self.loading = false;
        match result {
            Ok(papers) => {
                self.results = papers;
                SearchOutcome::Loaded(self.results.len())
            }
            Err(e) => {
                error!("Error fetching papers: {:#}", e);
                SearchOutcome::Failed
            }
        }
    }

    /// Mount a conversation for result `index`, closing any open one.
    pub fn open_chat(&mut self, index: usize) -> Option<&mut ConversationSession> {
        let paper = render::pick(&self.results, index)?.clone();
        self.close_chat();
        self.next_session_id += 1;
        self.session = Some(ConversationSession::new(self.next_session_id, paper));
        self.session.as_mut()
    }

    pub fn session(&self) -> Option<&ConversationSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut ConversationSession> {
        self.session.as_mut()
    }

    /// Tear down the open conversation, if any.
    pub fn close_chat(&mut self) -> bool {
        match self.session.take() {
            Some(mut session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    /// Route a reply to the session that asked for it.
    pub fn apply_reply(&mut self, ticket: ReplyTicket, result: Result<String>) -> ReplyOutcome {
        match self.session.as_mut() {
            Some(session) if session.id() == ticket.session_id => session.apply_reply(ticket, result),
            _ => {
                debug!(?ticket, "reply arrived for a closed session");
                ReplyOutcome::Discarded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn papers(n: usize) -> Vec<Paper> {
        (0..n)
            .map(|i| Paper {
                id: format!("http://arxiv.org/abs/{}", i),
                title: format!("Paper {}", i),
                url: format!("http://arxiv.org/abs/{}", i),
                ..Paper::default()
            })
            .collect()
    }

    fn loaded(n: usize) -> PaperBrowser {
        let mut browser = PaperBrowser::new();
        let (ticket, _) = browser.begin_search("quantum").unwrap();
        browser.finish_search(ticket, Ok(papers(n)));
        browser
    }

    #[test]
    fn search_replaces_results() {
        let mut browser = loaded(3);
        assert_eq!(browser.results().len(), 3);

        let (ticket, query) = browser.begin_search("  quantum computing ").unwrap();
        assert_eq!(query, "quantum computing");
        assert!(browser.is_loading());
        assert!(browser.results().is_empty());

        assert_eq!(browser.finish_search(ticket, Ok(papers(2))), SearchOutcome::Loaded(2));
        assert!(!browser.is_loading());
        assert_eq!(browser.results()[1].title, "Paper 1");
    }

    #[test]
    fn busy_flag_suppresses_duplicate_searches() {
        let mut browser = PaperBrowser::new();
        assert!(browser.begin_search("   ").is_none());
        assert!(browser.begin_search("a").is_some());
        assert!(browser.begin_search("b").is_none());
    }

    #[test]
    fn failed_search_clears_loading_and_results() {
        let mut browser = loaded(2);
        let (ticket, _) = browser.begin_search("again").unwrap();
        assert_eq!(browser.finish_search(ticket, Err(anyhow!("boom"))), SearchOutcome::Failed);
        assert!(!browser.is_loading());
        assert!(browser.results().is_empty());
    }

    #[test]
    fn stale_search_response_is_discarded() {
        let mut browser = PaperBrowser::new();
        let (old, _) = browser.begin_search("a").unwrap();
        browser.finish_search(old, Ok(papers(1)));
        let (_current, _) = browser.begin_search("b").unwrap();

        assert_eq!(browser.finish_search(old, Ok(papers(5))), SearchOutcome::Discarded);
        assert!(browser.is_loading());
        assert!(browser.results().is_empty());
    }

    #[test]
    fn open_chat_uses_exact_record() {
        let mut browser = loaded(2);
        assert!(browser.open_chat(5).is_none());
        let session = browser.open_chat(1).unwrap();
        assert_eq!(session.paper(), &papers(2)[1]);
    }

    #[test]
    fn reopening_after_close_starts_empty() {
        let mut browser = loaded(2);
        let session = browser.open_chat(0).unwrap();
        session.set_input("hello");
        let pending = session.submit().unwrap();

        assert!(browser.close_chat());
        assert!(browser.session().is_none());

        let fresh = browser.open_chat(1).unwrap();
        assert!(fresh.transcript().is_empty());
        assert_eq!(browser.apply_reply(pending.ticket, Ok("late".into())), ReplyOutcome::Discarded);
        assert!(browser.session().unwrap().transcript().is_empty());
    }

    #[test]
    fn reply_routes_to_open_session() {
        let mut browser = loaded(1);
        let session = browser.open_chat(0).unwrap();
        session.set_input("Summarize this");
        let pending = session.submit().unwrap();

        let outcome = browser.apply_reply(pending.ticket, Ok("This paper is about X.".into()));
        assert_eq!(outcome, ReplyOutcome::Appended);
        assert_eq!(browser.session().unwrap().transcript().len(), 2);
    }
}
