//! Read access to quotes owned by the quoting service.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use salesflow_core::QuoteId;
use salesflow_sales::Quote;

use crate::event_store::EventStoreError;

pub trait QuoteLookup: Send + Sync {
    /// `Ok(None)` when no quote has that id.
    fn find(&self, id: &QuoteId) -> Result<Option<Quote>, EventStoreError>;
}

impl<Q> QuoteLookup for Arc<Q>
where
    Q: QuoteLookup + ?Sized,
{
    fn find(&self, id: &QuoteId) -> Result<Option<Quote>, EventStoreError> {
        (**self).find(id)
    }
}

/// Quotes held in memory, seeded by the host process.
#[derive(Debug, Default)]
pub struct InMemoryQuoteBook {
    quotes: RwLock<HashMap<QuoteId, Quote>>,
}

impl InMemoryQuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, quote: Quote) {
        if let Ok(mut quotes) = self.quotes.write() {
            quotes.insert(quote.id.clone(), quote);
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.read().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QuoteLookup for InMemoryQuoteBook {
    fn find(&self, id: &QuoteId) -> Result<Option<Quote>, EventStoreError> {
        let quotes = self
            .quotes
            .read()
            .map_err(|_| EventStoreError::Unavailable("quote book lock poisoned".to_string()))?;
        Ok(quotes.get(id).cloned())
    }
}
