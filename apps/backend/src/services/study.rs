//! Study session queue

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use certprep_core::{select_due, DueCandidate, DueEntry, NewCandidate, SessionBudget};

use crate::config::StudySettings;
use crate::db::{ProgressScope, Repository};
use crate::error::{ApiError, Result};
use crate::models::{CardWithReview, DueCardsResponse};

pub const DEFAULT_DUE_LIMIT: usize = 50;
pub const MAX_DUE_LIMIT: usize = 500;

/// Start of the UTC day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

/// Cards to study now: due reviews first, then new cards within today's allowance.
///
/// Without a course, new cards come from the user's active enrollments.
pub async fn due_cards<S: Repository>(
    store: &S,
    settings: &StudySettings,
    user_id: Uuid,
    course_id: Option<Uuid>,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Result<DueCardsResponse> {
    let limit = limit.unwrap_or(DEFAULT_DUE_LIMIT);
    if limit == 0 || limit > MAX_DUE_LIMIT {
        return Err(ApiError::InvalidInput(format!(
            "limit must be between 1 and {}, got {}",
            MAX_DUE_LIMIT, limit
        )));
    }

    let (scope, new_card_courses) = match course_id {
        Some(id) => {
            store
                .get_course(id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Course {}", id)))?;
            (ProgressScope::Course(id), vec![id])
        }
        None => {
            let active = store
                .list_enrollments(user_id)
                .await?
                .into_iter()
                .filter(|e| e.is_active)
                .map(|e| e.course_id)
                .collect();
            (ProgressScope::All, active)
        }
    };

    let reviewed: Vec<DueCandidate> = store
        .list_memory_states(user_id, scope)
        .await?
        .into_iter()
        .map(|(card_id, memory)| DueCandidate { card_id, memory })
        .collect();
    let seen: HashSet<Uuid> = reviewed.iter().map(|c| c.card_id).collect();

    let mut cards = HashMap::new();
    let mut unseen = Vec::new();
    for course in new_card_courses {
        for card in store.list_cards(course).await? {
            if seen.contains(&card.id) {
                continue;
            }
            unseen.push(NewCandidate {
                card_id: card.id,
                sort_order: card.sort_order,
            });
            cards.insert(card.id, card);
        }
    }

    let budget = SessionBudget {
        new_cards_per_day: settings.new_cards_per_day,
        reviews_per_day: settings.reviews_per_day,
        new_introduced_today: store.count_new_introduced(user_id, start_of_day(now)).await?,
    };
    let selection = select_due(reviewed, unseen, &budget, limit, now);

    let review_ids: Vec<Uuid> = selection
        .entries
        .iter()
        .filter(|e| !e.is_new())
        .map(DueEntry::card_id)
        .collect();
    if !review_ids.is_empty() {
        for card in store.get_cards(&review_ids).await? {
            cards.insert(card.id, card);
        }
    }

    let mut out = Vec::with_capacity(selection.entries.len());
    for entry in &selection.entries {
        let Some(card) = cards.get(&entry.card_id()) else {
            tracing::warn!(card_id = %entry.card_id(), "due card missing from catalog");
            continue;
        };
        out.push(match entry {
            DueEntry::Review(c) => CardWithReview::reviewed(card, &c.memory, now),
            DueEntry::New(_) => CardWithReview::unseen(card, now),
        });
    }

    tracing::debug!(
        %user_id,
        returned = out.len(),
        total_due = selection.total_due,
        new_introduced_today = budget.new_introduced_today,
        "due cards selected"
    );

    Ok(DueCardsResponse {
        cards: out,
        total_due: selection.total_due,
    })
}
