//! Book feed: latest top-of-book per token.
//!
//! Read-only from the engine's point of view; a market-data transport pushes
//! observations in through `apply_quote`/`apply_trade`. Subscription is
//! set-based: callers hand over the full desired token set each refresh and
//! the feed computes the delta itself.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::{BookLevel, LastTrade, TopOfBook};
use crate::infrastructure::clock::SharedClock;

/// Tokens added/removed by a subscription refresh.
#[derive(Debug, Default, PartialEq)]
pub struct SubscriptionDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SubscriptionDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct BookFeed {
    clock: SharedClock,
    books: RwLock<HashMap<String, TopOfBook>>,
    subscribed: RwLock<HashSet<String>>,
}

impl BookFeed {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            books: RwLock::new(HashMap::new()),
            subscribed: RwLock::new(HashSet::new()),
        }
    }

    /// Replace the desired token set. Idempotent: resubmitting the same set
    /// yields an empty delta. Books of dropped tokens are evicted so the map
    /// stays bounded by the active market set.
    pub fn subscribe(&self, tokens: &[String]) -> SubscriptionDelta {
        let desired: HashSet<String> = tokens.iter().cloned().collect();
        let mut current = self.subscribed.write();

        let added: Vec<String> = desired.difference(&current).cloned().collect();
        let removed: Vec<String> = current.difference(&desired).cloned().collect();

        if !removed.is_empty() {
            let mut books = self.books.write();
            for token in &removed {
                books.remove(token);
            }
        }

        *current = desired;
        if !added.is_empty() || !removed.is_empty() {
            debug!(
                "[BookFeed] Subscription delta: +{} -{} ({} total)",
                added.len(),
                removed.len(),
                current.len()
            );
        }

        SubscriptionDelta { added, removed }
    }

    pub fn subscribed_tokens(&self) -> Vec<String> {
        self.subscribed.read().iter().cloned().collect()
    }

    pub fn is_subscribed(&self, token: &str) -> bool {
        self.subscribed.read().contains(token)
    }

    /// Latest observation for a token, if any has arrived.
    pub fn top_of_book(&self, token: &str) -> Option<TopOfBook> {
        self.books.read().get(token).cloned()
    }

    /// Ingest a quote update. Stamps `updated_at` with the feed clock and
    /// preserves the previous last-trade.
    pub fn apply_quote(&self, token: &str, bid: Option<BookLevel>, ask: Option<BookLevel>) {
        let now = self.clock.now();
        let mut books = self.books.write();
        let last_trade = books.get(token).and_then(|b| b.last_trade);
        books.insert(
            token.to_string(),
            TopOfBook {
                bid,
                ask,
                updated_at: now,
                last_trade,
            },
        );
    }

    /// Ingest a last-trade print. No-op until a quote exists for the token.
    pub fn apply_trade(&self, token: &str, price: f64) {
        self.apply_trade_at(token, price, self.clock.now());
    }

    pub fn apply_trade_at(&self, token: &str, price: f64, at: DateTime<Utc>) {
        let mut books = self.books.write();
        if let Some(book) = books.get_mut(token) {
            book.last_trade = Some(LastTrade { price, at });
        }
    }
}
