//! Streaming deduplication by citation key.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{BibContents, DownloadResult};

/// Quality of a candidate, compared field by field in declaration order.
///
/// The derived ordering makes a candidate better when it wins the first
/// differing predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContentRank {
    /// Content was acquired.
    pub has_content: bool,
    /// The content has a preferred media type.
    pub preferred: bool,
    /// A DOI is known.
    pub has_doi: bool,
    /// The content has a non-empty file name.
    pub has_file_name: bool,
}

/// Running best candidate per citation key.
#[derive(Debug, Default)]
pub struct Deduplicator {
    preferred_media_types: Vec<String>,
    best: HashMap<String, ContentRank>,
}

impl Deduplicator {
    /// Creates a deduplicator ranking `preferred_media_types` above others.
    #[must_use]
    pub fn new(preferred_media_types: Vec<String>) -> Self {
        Self {
            preferred_media_types,
            best: HashMap::new(),
        }
    }

    /// Ranks a candidate.
    #[must_use]
    pub fn rank(&self, candidate: &BibContents) -> ContentRank {
        let contents = candidate.contents.as_ref();
        ContentRank {
            has_content: contents.is_some(),
            preferred: contents.is_some_and(|c| {
                self.preferred_media_types
                    .iter()
                    .any(|preferred| preferred.eq_ignore_ascii_case(&c.media_type))
            }),
            has_doi: candidate.doi.is_some(),
            has_file_name: contents.is_some_and(|c| !c.file_name.is_empty()),
        }
    }

    /// Records `candidate` and returns whether it should be forwarded: the
    /// first candidate for a key always is, later ones only when strictly
    /// better than every candidate seen before.
    pub fn offer(&mut self, candidate: &BibContents) -> bool {
        let rank = self.rank(candidate);
        match self.best.get_mut(&candidate.entry.key) {
            Some(best) if rank <= *best => false,
            Some(best) => {
                *best = rank;
                true
            }
            None => {
                self.best.insert(candidate.entry.key.clone(), rank);
                true
            }
        }
    }

    /// Number of distinct citation keys seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.best.len()
    }

    /// Returns true if nothing has been offered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }

    /// Spawns the deduplication stage between two bounded queues.
    ///
    /// Errors are forwarded unchanged and end the stage.
    #[must_use]
    pub fn spawn(
        mut self,
        mut input: mpsc::Receiver<DownloadResult>,
        capacity: usize,
    ) -> (mpsc::Receiver<DownloadResult>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(result) = input.recv().await {
                match result {
                    Ok(candidate) => {
                        if !self.offer(&candidate) {
                            debug!(cite_key = %candidate.entry.key, "Dropping duplicate candidate");
                            continue;
                        }
                        if sender.send(Ok(candidate)).await.is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        let _ = sender.send(Err(error)).await;
                        break;
                    }
                }
            }
            debug!(citations = self.len(), "Deduplicator finished");
        });
        (receiver, handle)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveError, DownloadedContent};
    use crate::parser::BibEntry;
    use crate::resolver::ContentOrigin;

    fn candidate(key: &str, media_type: Option<&str>, doi: bool, file_name: &str) -> BibContents {
        BibContents {
            entry: BibEntry::new("misc", key),
            doi: doi.then(|| "10.1234/x".to_string()),
            contents: media_type.map(|media_type| DownloadedContent {
                content: b"x".to_vec(),
                media_type: media_type.to_string(),
                file_name: file_name.to_string(),
                origin: ContentOrigin::ResolvedUrl,
            }),
        }
    }

    fn dedup() -> Deduplicator {
        Deduplicator::new(vec!["application/pdf".to_string()])
    }

    #[test]
    fn test_predicates_are_compared_in_priority_order() {
        let d = dedup();
        let content = d.rank(&candidate("k", Some("text/html"), false, ""));
        let preferred = d.rank(&candidate("k", Some("application/pdf"), false, ""));
        let doi_only = d.rank(&candidate("k", None, true, ""));
        let named = d.rank(&candidate("k", Some("text/html"), false, "a.html"));

        assert!(content > doi_only);
        assert!(preferred > named);
        assert!(named > content);
        assert_eq!(d.rank(&candidate("k", None, false, "")), ContentRank::default());
    }

    #[test]
    fn test_only_improving_candidates_are_forwarded() {
        let mut d = dedup();
        assert!(d.offer(&candidate("k", None, false, "")));
        assert!(d.offer(&candidate("k", Some("text/html"), false, "a")));
        assert!(!d.offer(&candidate("k", Some("text/html"), false, "b")));
        assert!(!d.offer(&candidate("k", None, true, "")));
        assert!(d.offer(&candidate("k", Some("application/pdf"), false, "")));
        assert!(d.offer(&candidate("other", None, false, "")));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn test_last_forwarded_matches_offline_best() {
        let stream = vec![
            candidate("a", Some("text/html"), false, "1"),
            candidate("b", None, true, ""),
            candidate("a", None, true, "2"),
            candidate("a", Some("application/pdf"), false, "3"),
            candidate("b", Some("text/html"), false, "4"),
            candidate("a", Some("application/pdf"), true, "5"),
            candidate("b", Some("text/html"), false, "6"),
        ];

        let mut online = dedup();
        let mut last_forwarded: HashMap<String, BibContents> = HashMap::new();
        for item in &stream {
            if online.offer(item) {
                last_forwarded.insert(item.entry.key.clone(), item.clone());
            }
        }

        let ranker = dedup();
        for key in ["a", "b"] {
            // Offline best: maximum rank, earliest on ties.
            let best = stream
                .iter()
                .filter(|item| item.entry.key == key)
                .fold(None::<&BibContents>, |best, item| match best {
                    Some(b) if ranker.rank(item) <= ranker.rank(b) => Some(b),
                    _ => Some(item),
                })
                .unwrap();
            assert_eq!(&last_forwarded[key], best);
        }
        assert_eq!(last_forwarded["a"].contents.as_ref().unwrap().file_name, "5");
        assert_eq!(last_forwarded["b"].contents.as_ref().unwrap().file_name, "4");
    }

    #[tokio::test]
    async fn test_stage_forwards_errors_and_stops() {
        let (sender, input) = mpsc::channel(4);
        let (mut output, handle) = dedup().spawn(input, 4);

        sender.send(Ok(candidate("k", None, false, ""))).await.unwrap();
        sender.send(Ok(candidate("k", None, false, ""))).await.unwrap();
        sender.send(Err(ArchiveError::Cancelled)).await.unwrap();
        sender.send(Ok(candidate("late", None, false, ""))).await.ok();
        drop(sender);

        assert_eq!(output.recv().await.unwrap().unwrap().entry.key, "k");
        assert!(output.recv().await.unwrap().unwrap_err().is_cancelled());
        assert!(output.recv().await.is_none());
        handle.await.unwrap();
    }
}
