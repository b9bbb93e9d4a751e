// ============================================================================
// File: src/repl.rs
// Interactive driver: maps input lines onto browser events and runs
// provider calls in the background
// ============================================================================

use anyhow::{anyhow, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::browser::{PaperBrowser, SearchOutcome, SearchTicket};
use crate::config::Config;
use crate::conversation::{PendingReply, ReplyOutcome, ReplyTicket};
use crate::credentials::{self, CredentialStore, API_KEY_NAME};
use crate::llm_client::ChatClient;
use crate::markdown::TranscriptExporter;
use crate::models::{Paper, Role};
use crate::render;
use crate::search_client::ArxivClient;

/// A typed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    /// Zero-based index into the current results
    OpenChat(usize),
    Send(String),
    Retry,
    Transcript,
    Save(PathBuf),
    Close,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Interpret a line. Plain text searches on the result page and is sent as a
/// message inside a chat; slash commands work in both.
pub fn parse_command(line: &str, chat_open: bool) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return if chat_open {
            Command::Send(line.to_string())
        } else {
            Command::Search(line.to_string())
        };
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        "search" if !arg.is_empty() => Command::Search(arg.to_string()),
        "chat" => match arg.parse::<usize>() {
            Ok(n) if n >= 1 => Command::OpenChat(n - 1),
            _ => Command::Invalid("Usage: /chat <result number>".to_string()),
        },
        "retry" if chat_open => Command::Retry,
        "transcript" if chat_open => Command::Transcript,
        "close" if chat_open => Command::Close,
        "save" if chat_open && !arg.is_empty() => Command::Save(PathBuf::from(arg)),
        "save" if chat_open => Command::Invalid("Usage: /save <file>".to_string()),
        _ => Command::Invalid(format!("Unknown command: /{}", name)),
    }
}

/// Result of a background provider call
enum Completion {
    Search(SearchTicket, Result<Vec<Paper>>),
    Reply(ReplyTicket, Result<String>),
}

pub struct Repl {
    config: Config,
    browser: PaperBrowser,
    search_client: ArxivClient,
    chat_client: Option<ChatClient>,
    credentials: Option<CredentialStore>,
    /// Result index waiting for the user to type an API key
    awaiting_key_for: Option<usize>,
    spinner: Option<ProgressBar>,
    tx: UnboundedSender<Completion>,
    rx: Option<UnboundedReceiver<Completion>>,
}

impl Repl {
    pub fn new(config: Config, credentials: Option<CredentialStore>) -> Result<Self> {
        let search_client = ArxivClient::new(&config.search)?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            browser: PaperBrowser::new(),
            search_client,
            chat_client: None,
            credentials,
            awaiting_key_for: None,
            spinner: None,
            tx,
            rx: Some(rx),
        })
    }

    /// Run until `/quit` or end of input on stdin.
    pub async fn run(mut self) -> Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.run_with(stdin).await
    }

    /// Drive the loop from `input`. At end of input, outstanding searches
    /// and replies are still awaited and shown before returning.
    pub async fn run_with<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<()> {
        let mut rx = self.rx.take().ok_or_else(|| anyhow!("driver already running"))?;
        let mut lines = input.lines();
        let mut input_open = true;

        self.print_banner();

        loop {
            tokio::select! {
                line = lines.next_line(), if input_open => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(&line)? {
                                break;
                            }
                        }
                        None => {
                            input_open = false;
                            if !self.has_pending() {
                                break;
                            }
                            debug!("input closed; waiting for outstanding requests");
                        }
                    }
                }
                Some(done) = rx.recv() => {
                    self.handle_completion(done);
                    if !input_open && !self.has_pending() {
                        break;
                    }
                }
            }
        }

        self.stop_spinner();
        Ok(())
    }

    pub fn browser(&self) -> &PaperBrowser {
        &self.browser
    }

    fn has_pending(&self) -> bool {
        self.browser.is_loading()
            || self.browser.session().is_some_and(|s| s.is_awaiting_reply())
    }

    /// Returns `false` when the user asked to quit.
    fn handle_line(&mut self, line: &str) -> Result<bool> {
        if let Some(index) = self.awaiting_key_for.take() {
            let key = line.trim();
            if !key.starts_with('/') {
                self.accept_api_key(index, key)?;
                return Ok(true);
            }
            // A command is never a key; it cancels the prompt and runs.
            println!("{}", "API key entry cancelled.".bright_black());
        }

        let chat_open = self.browser.session().is_some();
        match parse_command(line, chat_open) {
            Command::Empty => {}
            Command::Quit => return Ok(false),
            Command::Help => self.print_help(),
            Command::Invalid(msg) => println!("{}", msg.yellow()),
            Command::Search(query) => self.start_search(&query),
            Command::OpenChat(index) => self.request_chat(index)?,
            Command::Send(text) => self.send_message(&text),
            Command::Retry => self.retry_reply(),
            Command::Transcript => {
                if let Some(session) = self.browser.session() {
                    println!("{}", render::render_transcript(session));
                }
            }
            Command::Save(path) => self.save_transcript(&path),
            Command::Close => {
                self.browser.close_chat();
                self.stop_spinner();
                println!("{}", "Chat closed.".bright_black());
            }
        }
        Ok(true)
    }

    fn start_search(&mut self, query: &str) {
        if self.browser.session().is_some() {
            self.browser.close_chat();
        }
        let Some((ticket, query)) = self.browser.begin_search(query) else {
            if self.browser.is_loading() {
                println!("{}", "A search is already running...".bright_black());
            }
            return;
        };

        info!(%query, "searching");
        self.start_spinner("Loading...");

        let client = self.search_client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.search(&query).await;
            let _ = tx.send(Completion::Search(ticket, result));
        });
    }

    fn request_chat(&mut self, index: usize) -> Result<()> {
        if render::pick(self.browser.results(), index).is_none() {
            println!("{}", format!("No result number {}.", index + 1).yellow());
            return Ok(());
        }

        if self.chat_client.is_none() {
            let env_value = std::env::var(API_KEY_NAME).ok();
            let resolved = credentials::resolve_api_key(&self.config.chat, env_value, self.credentials.as_ref())
                .unwrap_or_else(|e| {
                    warn!("Could not read stored credentials: {:#}", e);
                    None
                });
            match resolved {
                Some(key) => self.install_chat_client(key)?,
                None => {
                    println!("Please enter your OpenAI API key ({}):", API_KEY_NAME);
                    self.awaiting_key_for = Some(index);
                    return Ok(());
                }
            }
        }

        self.open_chat(index);
        Ok(())
    }

    fn accept_api_key(&mut self, index: usize, key: &str) -> Result<()> {
        if key.is_empty() {
            println!("{}", render::render_notice(
                "API Key Required",
                "Please provide an OpenAI API key to use the chat feature."));
            return Ok(());
        }

        if let Some(store) = &self.credentials {
            if let Err(e) = store.set(API_KEY_NAME, key) {
                warn!("Could not persist API key to {}: {:#}", store.path().display(), e);
            }
        }
        self.install_chat_client(key.to_string())?;
        self.open_chat(index);
        Ok(())
    }

    fn install_chat_client(&mut self, key: String) -> Result<()> {
        let mut settings = self.config.chat.clone();
        settings.api_key = Some(key);
        let client = ChatClient::new(settings)?;
        debug!(model = client.model(), "chat client ready");
        self.chat_client = Some(client);
        Ok(())
    }

    fn open_chat(&mut self, index: usize) {
        self.stop_spinner();
        if let Some(session) = self.browser.open_chat(index) {
            print!("{}", render::render_chat_header(session.paper()));
        }
    }

    fn send_message(&mut self, text: &str) {
        let Some(session) = self.browser.session_mut() else {
            return;
        };
        if session.is_awaiting_reply() {
            println!("{}", "Still waiting for the previous reply...".bright_black());
            return;
        }
        session.set_input(text);
        if let Some(pending) = session.submit() {
            self.dispatch_reply(pending);
        }
    }

    fn retry_reply(&mut self) {
        let Some(session) = self.browser.session_mut() else {
            return;
        };
        match session.retry() {
            Some(pending) => self.dispatch_reply(pending),
            None => println!("{}", "Nothing to retry.".bright_black()),
        }
    }

    fn dispatch_reply(&mut self, pending: PendingReply) {
        let Some(client) = self.chat_client.clone() else {
            warn!("no chat client configured; dropping request");
            return;
        };

        self.start_spinner("Thinking...");

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.complete(&pending.messages).await;
            let _ = tx.send(Completion::Reply(pending.ticket, result));
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Search(ticket, result) => {
                match self.browser.finish_search(ticket, result) {
                    SearchOutcome::Loaded(count) => {
                        self.stop_spinner();
                        debug!(count, "search finished");
                        println!("\n{}", render::render_results(self.browser.results()));
                    }
                    SearchOutcome::Failed => {
                        self.stop_spinner();
                        println!("{}", render::render_notice(
                            "Error",
                            "Failed to fetch papers. Please try again."));
                    }
                    SearchOutcome::Discarded => {}
                }
            }
            Completion::Reply(ticket, result) => {
                match self.browser.apply_reply(ticket, result) {
                    ReplyOutcome::Appended => {
                        self.stop_spinner();
                        if let Some(reply) = self.browser.session().and_then(|s| s.transcript().last()) {
                            println!("\n{}\n", render::render_message(Role::Assistant, &reply.content));
                        }
                    }
                    ReplyOutcome::Failed => {
                        self.stop_spinner();
                        println!("{}", render::reply_failed_hint());
                    }
                    ReplyOutcome::Discarded => {}
                }
            }
        }
    }

    fn save_transcript(&self, path: &Path) {
        let Some(session) = self.browser.session() else {
            return;
        };
        let exporter = TranscriptExporter::new(session.paper(), session.transcript());
        match exporter.export(path) {
            Ok(()) => println!("{} Chat exported to: {}",
                "✓".green().bold(),
                path.display().to_string().bright_cyan()),
            Err(e) => {
                warn!("export failed: {:#}", e);
                println!("{}", render::render_notice("Error", "Could not write the transcript."));
            }
        }
    }

    fn start_spinner(&mut self, message: &'static str) {
        self.stop_spinner();
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn print_banner(&self) {
        println!("{}", "\n═══════════════════════════════════════".bright_blue());
        println!("{}", "       SCIENTIFIC PAPER SEARCH".bright_white().bold());
        println!("{}", "═══════════════════════════════════════".bright_blue());
        println!("{}\n", "Search and chat about scientific papers from arXiv. /help for commands.".bright_black());
    }

    fn print_help(&self) {
        println!("{}", "Commands".green().bold());
        println!("  <text>            search arXiv (or send a message inside a chat)");
        println!("  /search <text>    search arXiv");
        println!("  /chat <n>         chat about result n");
        println!("  /retry            resend after a failed reply");
        println!("  /transcript       show the conversation so far");
        println!("  /save <file>      export the chat as Markdown");
        println!("  /close            leave the chat");
        println!("  /quit             exit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_depends_on_mode() {
        assert_eq!(parse_command("quantum computing", false), Command::Search("quantum computing".into()));
        assert_eq!(parse_command("  Summarize this ", true), Command::Send("Summarize this".into()));
        assert_eq!(parse_command("   ", true), Command::Empty);
    }

    #[test]
    fn chat_numbers_are_one_based() {
        assert_eq!(parse_command("/chat 1", false), Command::OpenChat(0));
        assert_eq!(parse_command("/chat 10", true), Command::OpenChat(9));
        assert!(matches!(parse_command("/chat 0", false), Command::Invalid(_)));
        assert!(matches!(parse_command("/chat x", false), Command::Invalid(_)));
    }

    #[test]
    fn chat_only_commands() {
        assert_eq!(parse_command("/close", true), Command::Close);
        assert_eq!(parse_command("/retry", true), Command::Retry);
        assert_eq!(parse_command("/transcript", true), Command::Transcript);
        assert_eq!(parse_command("/save out.md", true), Command::Save(PathBuf::from("out.md")));
        assert!(matches!(parse_command("/close", false), Command::Invalid(_)));
        assert!(matches!(parse_command("/save", true), Command::Invalid(_)));
    }

    #[test]
    fn global_commands() {
        assert_eq!(parse_command("/quit", true), Command::Quit);
        assert_eq!(parse_command("/exit", false), Command::Quit);
        assert_eq!(parse_command("/help", false), Command::Help);
        assert_eq!(parse_command("/search  graphs ", true), Command::Search("graphs".into()));
    }

    #[tokio::test]
    async fn quits_on_command_and_end_of_input() {
        let mut repl = Repl::new(Config::default(), None).unwrap();
        repl.run_with(&b"/help\n/quit\n"[..]).await.unwrap();

        let mut repl = Repl::new(Config::default(), None).unwrap();
        repl.run_with(&b""[..]).await.unwrap();
    }

    #[tokio::test]
    async fn slash_command_cancels_key_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = CredentialStore::new(&path);

        let mut repl = Repl::new(Config::default(), Some(CredentialStore::new(&path))).unwrap();
        repl.awaiting_key_for = Some(0);
        assert!(repl.handle_line("/help").unwrap());
        assert_eq!(repl.awaiting_key_for, None);
        assert!(repl.chat_client.is_none());
        assert_eq!(store.get(API_KEY_NAME).unwrap(), None);

        repl.awaiting_key_for = Some(0);
        assert!(!repl.handle_line("/quit").unwrap());
        assert_eq!(store.get(API_KEY_NAME).unwrap(), None);
    }
}
