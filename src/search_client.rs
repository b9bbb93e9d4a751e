// ============================================================================
// File: src/search_client.rs
// arXiv search client and Atom feed parsing
// ============================================================================

use anyhow::{anyhow, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::SearchSettings;
use crate::models::Paper;

#[derive(Clone)]
pub struct ArxivClient {
    client: Client,
    base_url: String,
    page_size: usize,
}

impl ArxivClient {
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("paperchat/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            page_size: settings.page_size,
        })
    }

    /// Fetch the first page of results for `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<Paper>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(anyhow!("Search query is empty"));
        }

        let search_query = format!("all:{}", query);
        let page_size = self.page_size.to_string();
        let params = [
            ("search_query", search_query.as_str()),
            ("start", "0"),
            ("max_results", page_size.as_str()),
        ];

        debug!(query, page_size = self.page_size, "querying arXiv");

        let http_response = self.client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await?;

        if !http_response.status().is_success() {
            let status = http_response.status();
            let error_text = http_response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "arXiv API error: HTTP {}\nURL: {}\nResponse: {}",
                status,
                self.base_url,
                Self::truncate(&error_text, 500)
            ));
        }

        let response_text = http_response.text().await?;
        let papers = parse_feed(&response_text).map_err(|e| anyhow!(
            "Failed to parse arXiv response: {}\nRaw response (first 500 chars): {}",
            e,
            Self::truncate(&response_text, 500)
        ))?;

        debug!(count = papers.len(), "parsed arXiv feed");
        Ok(papers)
    }

    fn truncate(text: &str, max_chars: usize) -> String {
        text.chars().take(max_chars).collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    AuthorName,
}

/// Fields of the entry currently being read
#[derive(Default)]
struct EntryBuilder {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    authors: Vec<String>,
    author_name: Option<String>,
    in_author: bool,
}

impl EntryBuilder {
    fn commit(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::AuthorName => &mut self.author_name,
        };
        // Only the first occurrence of each element counts.
        if slot.is_none() {
            *slot = Some(text);
        }
    }

    fn finish_author(&mut self) {
        self.in_author = false;
        let name = self.author_name.take().unwrap_or_default();
        self.authors.push(name.trim().to_string());
    }

    fn build(self) -> Paper {
        let id = self.id.unwrap_or_default().trim().to_string();
        Paper {
            url: id.clone(),
            id,
            title: collapse_whitespace(&self.title.unwrap_or_default()),
            authors: self.authors,
            abstract_text: collapse_whitespace(&self.summary.unwrap_or_default()),
        }
    }
}

/// Collapse whitespace runs into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an arXiv Atom feed into papers, one per `entry`, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<Paper>> {
    // Text nodes are kept untrimmed so whitespace between mixed-content
    // pieces survives until `collapse_whitespace`.
    let mut reader = Reader::from_str(xml);

    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut capture: Option<(Field, String)> = None;
    let mut depth: usize = 0;
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                saw_root = true;
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"entry" && entry.is_none() {
                    entry = Some(EntryBuilder::default());
                } else if let Some(cur) = entry.as_mut() {
                    match name {
                        b"author" => {
                            cur.in_author = true;
                            cur.author_name = None;
                        }
                        b"name" if cur.in_author => capture = Some((Field::AuthorName, String::new())),
                        b"id" if !cur.in_author => capture = Some((Field::Id, String::new())),
                        b"title" if !cur.in_author => capture = Some((Field::Title, String::new())),
                        b"summary" if !cur.in_author => capture = Some((Field::Summary, String::new())),
                        _ => {}
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                saw_root = true;
                if let Some(cur) = entry.as_mut() {
                    match e.local_name().as_ref() {
                        b"author" => {
                            cur.author_name = None;
                            cur.finish_author();
                        }
                        b"name" if cur.in_author => cur.commit(Field::AuthorName, String::new()),
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, buf)) = capture.as_mut() {
                    let text = t.unescape().map_err(|e| anyhow!("XML parse error: {}", e))?;
                    buf.push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some((_, buf)) = capture.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                let name = e.local_name();
                let name = name.as_ref();
                let closes_capture = match capture.as_ref() {
                    Some((field, _)) => matches!(
                        (*field, name),
                        (Field::Id, b"id")
                            | (Field::Title, b"title")
                            | (Field::Summary, b"summary")
                            | (Field::AuthorName, b"name")
                    ),
                    None => false,
                };
                if name == b"entry" {
                    if let Some(done) = entry.take() {
                        papers.push(done.build());
                    }
                    capture = None;
                } else if let Some(cur) = entry.as_mut() {
                    if closes_capture {
                        if let Some((field, text)) = capture.take() {
                            cur.commit(field, text);
                        }
                    }
                    if name == b"author" && cur.in_author {
                        cur.finish_author();
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error at byte {}: {}", reader.buffer_position(), e)),
            _ => {}
        }
    }

    if !saw_root {
        return Err(anyhow!("Response is not an XML document"));
    }
    if depth != 0 {
        return Err(anyhow!("Unexpected end of XML document ({} unclosed elements)", depth));
    }

    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>http://arxiv.org/api/feed-id</id>
  <title type="html">ArXiv Query: search_query=all:quantum</title>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v1</id>
    <title>Quantum
      Error   Correction</title>
    <summary>  We study
    surface codes &amp; friends.  </summary>
    <author><name>Alice Smith</name></author>
    <author><name>Bob Jones</name><arxiv:affiliation xmlns:arxiv="http://arxiv.org/schemas/atom">MIT</arxiv:affiliation></author>
    <link href="http://arxiv.org/abs/2101.00001v1" rel="alternate" type="text/html"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2101.00002v2</id>
    <title>Second</title>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_in_document_order() {
        let papers = parse_feed(FEED).unwrap();
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].id, "http://arxiv.org/abs/2101.00001v1");
        assert_eq!(papers[0].url, papers[0].id);
        assert_eq!(papers[0].title, "Quantum Error Correction");
        assert_eq!(papers[0].abstract_text, "We study surface codes & friends.");
        assert_eq!(papers[0].authors, vec!["Alice Smith", "Bob Jones"]);
        assert_eq!(papers[1].title, "Second");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let papers = parse_feed(FEED).unwrap();
        assert_eq!(papers[1].abstract_text, "");
        assert!(papers[1].authors.is_empty());

        let bare = r#"<feed><entry><author></author></entry></feed>"#;
        let papers = parse_feed(bare).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, "");
        assert_eq!(papers[0].url, "");
        assert_eq!(papers[0].title, "");
        assert_eq!(papers[0].authors, vec![String::new()]);
    }

    #[test]
    fn feed_title_and_id_are_not_entry_fields() {
        let xml = r#"<feed><title>Feed</title><id>feed</id><entry><summary>s</summary></entry></feed>"#;
        let papers = parse_feed(xml).unwrap();
        assert_eq!(papers[0].title, "");
        assert_eq!(papers[0].id, "");
    }

    #[test]
    fn mixed_content_keeps_word_boundaries() {
        let xml = r#"<feed><entry>
            <title>Quantum <i>dots</i> in wells</title>
            <summary>A <![CDATA[b]]> c</summary>
            <author>
                <name>  Carol King </name>
            </author>
        </entry></feed>"#;
        let papers = parse_feed(xml).unwrap();
        assert_eq!(papers[0].title, "Quantum dots in wells");
        assert_eq!(papers[0].abstract_text, "A b c");
        assert_eq!(papers[0].authors, vec!["Carol King"]);
    }

    #[test]
    fn empty_feed_yields_no_papers() {
        let papers = parse_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#).unwrap();
        assert!(papers.is_empty());
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(parse_feed("<feed><entry><title>x</summary></entry></feed>").is_err());
        assert!(parse_feed("<feed><entry><title>x</title>").is_err());
        assert!(parse_feed("Rate limit exceeded").is_err());
    }

    #[test]
    fn collapse_whitespace_normalizes_runs() {
        assert_eq!(collapse_whitespace("  a\n\t b  c "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }
}
