//! Due-set selection: which cards to study now, in which order.
//!
//! Review cards whose due date has passed come first, most overdue first.
//! Never-reviewed cards follow in content order, capped by the daily
//! new-card allowance so new material cannot crowd out the review backlog.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{CardMemoryState, CardState};

/// A card the user has reviewed at least once.
#[derive(Debug, Clone, PartialEq)]
pub struct DueCandidate {
    pub card_id: Uuid,
    pub memory: CardMemoryState,
}

/// A card the user has never reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewCandidate {
    pub card_id: Uuid,
    /// Content-defined position within its course.
    pub sort_order: i32,
}

/// Daily allowances for one study session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionBudget {
    pub new_cards_per_day: u32,
    pub reviews_per_day: u32,
    /// New cards already introduced since the start of the (UTC) day.
    pub new_introduced_today: u32,
}

impl SessionBudget {
    pub fn new_remaining(&self) -> usize {
        self.new_cards_per_day.saturating_sub(self.new_introduced_today) as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DueEntry {
    Review(DueCandidate),
    New(NewCandidate),
}

impl DueEntry {
    pub fn card_id(&self) -> Uuid {
        match self {
            Self::Review(c) => c.card_id,
            Self::New(c) => c.card_id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DueSelection {
    pub entries: Vec<DueEntry>,
    /// Cards available today under both caps, before `limit` truncation.
    pub total_due: usize,
}

/// Order and cap the due set at `now`, then truncate to `limit`.
pub fn select_due(
    reviewed: Vec<DueCandidate>,
    unseen: Vec<NewCandidate>,
    budget: &SessionBudget,
    limit: usize,
    now: DateTime<Utc>,
) -> DueSelection {
    let mut reviews: Vec<DueCandidate> = reviewed
        .into_iter()
        .filter(|c| c.memory.state != CardState::New && c.memory.due <= now)
        .collect();
    // Earliest due date is the most overdue
    reviews.sort_by(|a, b| {
        a.memory
            .due
            .cmp(&b.memory.due)
            .then_with(|| a.card_id.cmp(&b.card_id))
    });
    reviews.truncate(budget.reviews_per_day as usize);

    let mut fresh = unseen;
    fresh.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.card_id.cmp(&b.card_id))
    });
    fresh.truncate(budget.new_remaining());

    let total_due = reviews.len() + fresh.len();

    let entries = reviews
        .into_iter()
        .map(DueEntry::Review)
        .chain(fresh.into_iter().map(DueEntry::New))
        .take(limit)
        .collect();

    DueSelection { entries, total_due }
}
