//! Request interception for audited pages.
//!
//! Blocking policy is a pure function over the request URL and the run's
//! blocklist; a thin adapter wires it to the CDP Fetch domain of a page.
//! Matching is substring containment, first matching entry wins.

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of the blocking policy for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through
    Allow,
    /// Abort the request; carries the blocklist entry that matched
    Abort { matched: String },
}

/// Decide whether a request URL is blocked.
///
/// Entries are evaluated in blocklist order and the first substring match
/// wins; later entries are never consulted.
pub fn decide(url: &str, blocklist: &[String]) -> Decision {
    for entry in blocklist {
        if url.contains(entry.as_str()) {
            return Decision::Abort {
                matched: entry.clone(),
            };
        }
    }
    Decision::Allow
}

/// Adapter that services paused requests on one page
pub struct RequestInterceptor;

impl RequestInterceptor {
    /// Enable the Fetch domain on `page` and spawn a task that resolves every
    /// paused request through [`decide`].
    ///
    /// A request id is serviced at most once; a second pause event for an
    /// already-resolved request is a no-op.
    pub async fn attach(page: &Page, blocklist: Vec<String>) -> Result<tokio::task::JoinHandle<()>> {
        page.execute(EnableParams::default())
            .await
            .context("Failed to enable request interception")?;

        let mut events = page
            .event_listener::<EventRequestPaused>()
            .await
            .context("Failed to subscribe to paused requests")?;

        let page = page.clone();
        let task = tokio::spawn(async move {
            let mut handled: HashSet<RequestId> = HashSet::new();
            while let Some(event) = events.next().await {
                if !handled.insert(event.request_id.clone()) {
                    continue;
                }

                let method = event.request.method.clone();
                let url = event.request.url.clone();

                match decide(&url, &blocklist) {
                    Decision::Abort { matched } => {
                        info!(">> {} {} SKIPPED ({})", method, url, matched);
                        let params =
                            FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                        if let Err(error) = page.execute(params).await {
                            warn!("failed to abort {}: {}", url, error);
                        }
                    }
                    Decision::Allow => {
                        debug!(">> {} {} ALLOWED", method, url);
                        let params = ContinueRequestParams::new(event.request_id.clone());
                        if let Err(error) = page.execute(params).await {
                            warn!("failed to continue {}: {}", url, error);
                        }
                    }
                }
            }
        });

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocklist(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decide_empty_blocklist_allows() {
        assert_eq!(decide("https://example.com/app.js", &[]), Decision::Allow);
    }

    #[test]
    fn test_decide_substring_match_aborts() {
        let list = blocklist(&["analytics"]);
        assert_eq!(
            decide("https://cdn.example.com/analytics.js", &list),
            Decision::Abort {
                matched: "analytics".to_string()
            }
        );
    }

    #[test]
    fn test_decide_no_match_allows() {
        let list = blocklist(&["ads", "track"]);
        assert_eq!(decide("https://example.com/styles.css", &list), Decision::Allow);
    }

    #[test]
    fn test_decide_first_match_wins_in_list_order() {
        // URL contains both entries; the first one in list order must win
        let list = blocklist(&["ads", "track"]);
        assert_eq!(
            decide("https://ads.example.com/track.js", &list),
            Decision::Abort {
                matched: "ads".to_string()
            }
        );

        let reversed = blocklist(&["track", "ads"]);
        assert_eq!(
            decide("https://ads.example.com/track.js", &reversed),
            Decision::Abort {
                matched: "track".to_string()
            }
        );
    }

    #[test]
    fn test_decide_matches_anywhere_in_url() {
        let list = blocklist(&["utm_source"]);
        assert_eq!(
            decide("https://example.com/?utm_source=mail", &list),
            Decision::Abort {
                matched: "utm_source".to_string()
            }
        );
    }
}
