use crate::allocation::{AllocatedArticle, Allocation};
use crate::categories::CategoryIndex;
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveReason {
    /// Source and destination belong to the same family
    FamilyCompatibility,
    GapReduction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
    pub article: String,
    pub article_index: usize,
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub reason: MoveReason,
    /// 1-based iteration at which the move happened.
    pub step: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub from: String,
    pub to: String,
    pub article_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceStatus {
    /// No further move was possible.
    Converged,
    /// Stopped by the iteration cap before reaching a fixed point.
    IterationLimitReached,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebalanceOutcome {
    pub allocation: Allocation,
    pub journal: Vec<JournalEntry>,
    pub iterations: usize,
    pub status: RebalanceStatus,
    pub tolerance: f64,
}

impl RebalanceOutcome {
    /// Categories still over budget beyond tolerance after the run.
    pub fn remaining_over_budget(&self) -> Vec<String> {
        self.allocation.over_budget_keys(self.tolerance)
    }

    /// Number of distinct articles moved at least once.
    pub fn reallocated_article_count(&self) -> usize {
        self.journal
            .iter()
            .map(|e| e.article_index)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Chooses where an article of `item_amount` leaving `from_key` should go.
///
/// Only categories with more than `tolerance` of room are candidates. When the
/// origin has a family and some candidate shares it, only those are kept.
/// Candidates the move would push more than `tolerance` over budget are
/// dropped, and the one landing closest to its budget wins (first on ties).
pub fn pick_best_destination<'a>(
    item_amount: f64,
    from_key: &str,
    categories: &'a CategoryIndex,
    totals: &BTreeMap<String, f64>,
    gap: &BTreeMap<String, f64>,
    tolerance: f64,
) -> Option<&'a str> {
    let gap_of = |key: &str| gap.get(key).copied().unwrap_or(0.0);
    let total_of = |key: &str| totals.get(key).copied().unwrap_or(0.0);

    let mut pool: Vec<_> = categories
        .iter()
        .filter(|c| gap_of(c.key.as_str()) > tolerance)
        .collect();

    if let Some(origin) = categories.get(from_key) {
        if origin.family.is_some() && pool.iter().any(|c| origin.shares_family_with(c)) {
            pool.retain(|c| origin.shares_family_with(c));
        }
    }

    let mut best: Option<(&'a str, f64)> = None;

    for candidate in pool {
        let post_gap = candidate.budget - (total_of(candidate.key.as_str()) + item_amount);
        if post_gap < -tolerance {
            trace!(
                "Skipping {} for {:.2}: would overshoot by {:.2}",
                candidate.key,
                item_amount,
                -post_gap
            );
            continue;
        }

        let distance = post_gap.abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate.key.as_str(), distance));
        }
    }

    best.map(|(key, _)| key)
}

/// Performs at most one move, the first improving one found.
///
/// Over-budget categories are visited from most to least over, and their
/// articles from largest to smallest. Totals are recomputed first, so the
/// allocation's maps reflect the assignment before the move.
pub fn reallocate_once(allocation: &mut Allocation, tolerance: f64) -> Option<Move> {
    allocation.refresh_totals();

    let mut over_budget = allocation.over_budget_keys(tolerance);
    over_budget.sort_by(|a, b| allocation.gap[a].total_cmp(&allocation.gap[b]));

    let has_room = allocation.gap.values().any(|g| *g > tolerance);
    if over_budget.is_empty() || !has_room {
        return None;
    }

    for from_key in over_budget {
        let mut candidates = allocation.article_indices_in(&from_key);
        candidates.sort_by(|&a, &b| {
            allocation.articles[b]
                .article
                .amount
                .total_cmp(&allocation.articles[a].article.amount)
        });

        for idx in candidates {
            let amount = allocation.articles[idx].article.amount;
            let destination = pick_best_destination(
                amount,
                &from_key,
                &allocation.categories,
                &allocation.totals,
                &allocation.gap,
                tolerance,
            )
            .map(str::to_string);

            if let Some(to_key) = destination {
                allocation.articles[idx].category = Some(to_key.clone());
                return Some(Move {
                    from: from_key,
                    to: to_key,
                    article_index: idx,
                });
            }
        }
    }

    None
}

/// Runs `reallocate_once` until no move is possible or `max_iterations`
/// moves were attempted, journaling each move.
pub fn rebalance_within_tolerance(
    articles: Vec<AllocatedArticle>,
    categories: CategoryIndex,
    max_iterations: usize,
    tolerance: f64,
) -> RebalanceOutcome {
    let mut allocation = Allocation::new(articles, categories);
    let mut journal = Vec::new();
    let mut status = RebalanceStatus::IterationLimitReached;
    let mut iterations = 0;

    for step in 1..=max_iterations {
        iterations = step;
        let Some(mv) = reallocate_once(&mut allocation, tolerance) else {
            status = RebalanceStatus::Converged;
            break;
        };

        let entry = journal_entry(&allocation, &mv, step);
        debug!(
            "Step {}: moved '{}' ({:.2}) from {} to {} [{:?}]",
            step, entry.article, entry.amount, entry.from, entry.to, entry.reason
        );
        journal.push(entry);
    }

    allocation.refresh_totals();

    let outcome = RebalanceOutcome {
        allocation,
        journal,
        iterations,
        status,
        tolerance,
    };

    match outcome.status {
        RebalanceStatus::Converged => info!(
            "Rebalancing converged after {} moves, max |gap| {:.2}",
            outcome.journal.len(),
            outcome.allocation.max_abs_gap()
        ),
        RebalanceStatus::IterationLimitReached => warn!(
            "Rebalancing stopped at the {} iteration cap; still over budget: {:?}",
            max_iterations,
            outcome.remaining_over_budget()
        ),
    }

    outcome
}

fn journal_entry(allocation: &Allocation, mv: &Move, step: usize) -> JournalEntry {
    let article = &allocation.articles[mv.article_index].article;
    let same_family = match (
        allocation.categories.get(&mv.from),
        allocation.categories.get(&mv.to),
    ) {
        (Some(from), Some(to)) => from.shares_family_with(to),
        _ => false,
    };

    JournalEntry {
        article: article.name.clone(),
        article_index: mv.article_index,
        amount: article.amount,
        from: mv.from.clone(),
        to: mv.to.clone(),
        reason: if same_family {
            MoveReason::FamilyCompatibility
        } else {
            MoveReason::GapReduction
        },
        step,
    }
}

/// True when no article of any over-budget category has a destination.
pub fn is_fixed_point(allocation: &Allocation, tolerance: f64) -> bool {
    allocation.over_budget_keys(tolerance).iter().all(|from_key| {
        allocation.article_indices_in(from_key).iter().all(|&idx| {
            pick_best_destination(
                allocation.articles[idx].article.amount,
                from_key,
                &allocation.categories,
                &allocation.totals,
                &allocation.gap,
                tolerance,
            )
            .is_none()
        })
    })
}
