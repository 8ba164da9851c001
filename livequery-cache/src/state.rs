//! Reconciliation state machine for one cache.
//!
//! `CacheState` is the local window plus its pagination cursor. Every rule
//! for applying server events and server pages lives here as plain
//! synchronous code; the async handle in `live` only sequences network calls
//! around it and publishes the results.

use livequery_core::{
    CacheSettings, FieldPathError, FindPage, InsertionPolicy, Record, DEFAULT_LIMIT,
};

/// Read-only view of the cursor, handed to listeners with every notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageView {
    pub total: u64,
    pub skip: u64,
    pub page: u64,
    pub limit: u64,
    pub len: usize,
}

/// What applying an event did to the local window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The window is unchanged.
    Untouched,
    /// A record was inserted at `index`; `evicted` is set when the window
    /// overflowed and one record was dropped from the opposite end.
    Inserted { index: usize, evicted: bool },
    /// The record at `index` was replaced in place.
    Replaced { index: usize },
    /// The record at `index` was removed. `refill` asks the caller to
    /// reload the first page because the window fell below the page size.
    Removed { index: usize, refill: bool },
}

impl Reconciliation {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Reconciliation::Untouched)
    }

    pub fn needs_refill(&self) -> bool {
        matches!(self, Reconciliation::Removed { refill: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheState {
    items: Vec<Record>,
    total: u64,
    skip: u64,
    page: u64,
    limit: u64,
}

impl Default for CacheState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            skip: 0,
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded with `items`, as if a first page had been loaded.
    pub fn seeded(items: Vec<Record>, total: u64, limit: u64) -> Self {
        let mut state = Self::default();
        state.replace_page(
            FindPage {
                data: items,
                total,
                skip: 0,
                limit,
            },
            Some(1),
            &CacheSettings::default(),
        );
        state
    }

    pub fn items(&self) -> &[Record] {
        &self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn view(&self) -> PageView {
        PageView {
            total: self.total,
            skip: self.skip,
            page: self.page,
            limit: self.limit,
            len: self.items.len(),
        }
    }

    /// Forget everything and return to the pre-load cursor.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Position of the record sharing `record`'s identifier.
    pub fn find_index(&self, record: &Record) -> Option<usize> {
        self.items.iter().position(|item| item.same_id(record))
    }

    /// `ceil(total / limit)`, zero when no page size is known.
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit)
    }

    /// Offset of 1-based page `page` under the current page size.
    pub fn skip_for_page(&self, page: u64) -> u64 {
        page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Offset of the page following the current one.
    pub fn next_skip(&self) -> u64 {
        self.page.saturating_mul(self.limit)
    }

    // ========================================================================
    // SERVER PAGES
    // ========================================================================

    /// Overwrite the window and cursor with a server page.
    ///
    /// When `page` is `None` it is derived from the response's skip and limit.
    /// A response reporting a zero page size keeps the previous one. With
    /// pagination enforced the window is cut to the page size.
    pub fn replace_page(&mut self, response: FindPage, page: Option<u64>, settings: &CacheSettings) {
        let FindPage {
            data,
            total,
            skip,
            limit,
        } = response;
        self.items = Vec::with_capacity(data.len());
        for record in data {
            if self.find_index(&record).is_none() {
                self.items.push(record);
            }
        }
        self.total = total;
        self.skip = skip;
        self.limit = match (limit, self.limit) {
            (0, 0) => DEFAULT_LIMIT,
            (0, previous) => previous,
            (reported, _) => reported,
        };
        if settings.pagination_enforced {
            self.items.truncate(self.limit as usize);
        }
        self.page = page.unwrap_or(skip / self.limit + 1);
    }

    /// Union-merge the page following the current one into the window.
    ///
    /// Records already present keep their position and content; new ones are
    /// appended. The cursor advances one page and `total` follows the server.
    /// With pagination enforced the earliest records are dropped so the window
    /// never exceeds the page size.
    pub fn merge_page(&mut self, response: FindPage, requested_skip: u64, settings: &CacheSettings) {
        for record in response.data {
            if self.find_index(&record).is_none() {
                self.items.push(record);
            }
        }
        self.page = self.page.saturating_add(1);
        self.skip = requested_skip;
        self.total = response.total;
        if settings.pagination_enforced {
            let cap = self.limit as usize;
            if self.items.len() > cap {
                let excess = self.items.len() - cap;
                self.items.drain(..excess);
            }
        }
    }

    // ========================================================================
    // SERVER EVENTS
    // ========================================================================

    /// Apply a created event.
    ///
    /// `total` grows whether or not the record is in scope.
    pub fn apply_created(
        &mut self,
        record: Record,
        settings: &CacheSettings,
    ) -> Result<Reconciliation, FieldPathError> {
        self.total = self.total.saturating_add(1);
        if !settings.channels.admits(&record)? {
            return Ok(Reconciliation::Untouched);
        }
        if let Some(index) = self.find_index(&record) {
            // duplicate delivery of a record we already hold
            self.items[index] = record;
            return Ok(Reconciliation::Replaced { index });
        }
        Ok(self.insert(record, settings, true))
    }

    /// Apply a removed event.
    ///
    /// `total` shrinks whether or not the record is held locally.
    pub fn apply_removed(&mut self, record: &Record) -> Reconciliation {
        self.total = self.total.saturating_sub(1);
        match self.find_index(record) {
            Some(index) => {
                self.items.remove(index);
                let refill = (self.items.len() as u64) < self.limit;
                Reconciliation::Removed { index, refill }
            }
            None => Reconciliation::Untouched,
        }
    }

    /// Apply an updated or patched event.
    ///
    /// A held record is replaced while it stays in scope and dropped once it
    /// leaves; `total` is never touched because the record still exists.
    /// Unknown in-scope records are only picked up when pagination is not
    /// enforced.
    pub fn apply_changed(
        &mut self,
        record: Record,
        settings: &CacheSettings,
    ) -> Result<Reconciliation, FieldPathError> {
        let in_channel = settings.channels.admits(&record)?;
        match (self.find_index(&record), in_channel) {
            (Some(index), true) => {
                self.items[index] = record;
                Ok(Reconciliation::Replaced { index })
            }
            (Some(index), false) => {
                self.items.remove(index);
                Ok(Reconciliation::Removed {
                    index,
                    refill: false,
                })
            }
            (None, true) if !settings.pagination_enforced => Ok(self.insert(record, settings, false)),
            _ => Ok(Reconciliation::Untouched),
        }
    }

    fn insert(&mut self, record: Record, settings: &CacheSettings, capped: bool) -> Reconciliation {
        let capped = capped && settings.pagination_enforced;
        if capped && self.limit == 0 {
            return Reconciliation::Untouched;
        }
        let overflow = |len: usize, limit: u64| capped && len as u64 > limit;
        match settings.insertion_policy {
            InsertionPolicy::Append => {
                self.items.push(record);
                let evicted = overflow(self.items.len(), self.limit);
                if evicted {
                    self.items.remove(0);
                }
                Reconciliation::Inserted {
                    index: self.items.len().saturating_sub(1),
                    evicted,
                }
            }
            InsertionPolicy::Prepend => {
                self.items.insert(0, record);
                let evicted = overflow(self.items.len(), self.limit);
                if evicted {
                    self.items.pop();
                }
                Reconciliation::Inserted { index: 0, evicted }
            }
        }
    }
}
