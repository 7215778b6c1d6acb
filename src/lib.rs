//! # Budget Reallocation
//!
//! A library for assigning expense lines ("articles") to budget categories and
//! moving them between categories until every category sits within tolerance of
//! its budget, with a journal explaining every move.
//!
//! ## Core Concepts
//!
//! - **Category Index**: Validated budget categories keyed by their normalized name
//! - **Keyword Classification**: Deterministic scoring of article labels against keyword hints,
//!   with an optional pluggable batch classifier and a largest-budget fallback
//! - **Gap**: `budget - total`; positive means room left, negative means overspent
//! - **Reallocation**: Greedy, bounded moves from the most overspent category into the
//!   destination landing closest to its budget, preferring categories of the same family
//! - **Global Adjustment**: A reporting-only rescaling of budgets so they sum to the spend
//!
//! ## Example
//!
//! ```rust
//! use budget_reallocation::*;
//!
//! let input = ReallocationInput {
//!     articles: vec![
//!         ArticleRow { name: "Sac de ciment".to_string(), amount: AmountValue::from("180,00") },
//!         ArticleRow { name: "Sable fin".to_string(), amount: AmountValue::from(20.0) },
//!     ],
//!     categories: vec![
//!         CategoryRow {
//!             name: "Maçonnerie".to_string(),
//!             budget: AmountValue::from("100"),
//!             keywords: Some("ciment, sable".to_string()),
//!             family: Some("Gros œuvre".to_string()),
//!         },
//!         CategoryRow {
//!             name: "Terrassement".to_string(),
//!             budget: AmountValue::from("300"),
//!             keywords: None,
//!             family: Some("Gros œuvre".to_string()),
//!         },
//!     ],
//!     settings: ReallocationSettings::default(),
//! };
//!
//! let result = process_budget_reallocation(&input, None).unwrap();
//! assert_eq!(result.outcome.journal.len(), 1);
//! assert_eq!(result.report.summary.articles_reallocated_count, 1);
//! ```

pub mod adjustment;
pub mod allocation;
pub mod balancer;
pub mod categories;
pub mod classifier;
pub mod error;
pub mod ingestion;
pub mod normalize;
pub mod report;
pub mod schema;

pub use adjustment::{compute_adjusted_budgets, BudgetAdjustment, GLOBAL_ADJUSTMENT_THRESHOLD};
pub use allocation::{compute_totals, AllocatedArticle, Allocation, AssignmentSource, Totals};
pub use balancer::{
    is_fixed_point, pick_best_destination, reallocate_once, rebalance_within_tolerance,
    JournalEntry, Move, MoveReason, RebalanceOutcome, RebalanceStatus,
};
pub use categories::{CatalogEntry, Category, CategoryIndex};
pub use classifier::{
    choose_category_by_keywords, classify_articles, keyword_score, BatchClassifier,
};
pub use error::{ReallocationError, Result};
pub use ingestion::{convert_article_rows, Article};
pub use normalize::{normalize_text, parse_euro, split_keywords};
pub use report::{CategoryReport, CategoryStatus, ReallocationReport, ReportSummary};
pub use schema::*;

use log::{debug, info};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ReallocationResult {
    pub outcome: RebalanceOutcome,
    pub adjustment: BudgetAdjustment,
    pub report: ReallocationReport,
}

pub struct BudgetReallocationProcessor;

impl BudgetReallocationProcessor {
    /// Runs the whole pipeline: category validation, row conversion,
    /// classification, rebalancing and the reporting view.
    ///
    /// Only invalid settings or category rows fail the run. Non-convergence is
    /// reported through `outcome.status` and the over-budget categories.
    pub fn process(
        input: &ReallocationInput,
        classifier: Option<&dyn BatchClassifier>,
    ) -> Result<ReallocationResult> {
        input.settings.validate()?;
        let categories = CategoryIndex::build(&input.categories)?;

        info!(
            "Processing {} article rows against {} categories",
            input.articles.len(),
            categories.len()
        );

        let articles = convert_article_rows(&input.articles);
        debug!(
            "{} of {} article rows have a usable amount",
            articles.len(),
            input.articles.len()
        );

        let allocated = classify_articles(articles, &categories, classifier);

        let outcome = rebalance_within_tolerance(
            allocated,
            categories,
            input.settings.max_iterations,
            input.settings.tolerance,
        );

        let adjustment = compute_adjusted_budgets(&outcome.allocation, input.settings.tolerance);
        let report = ReallocationReport::build(&outcome, &adjustment);

        info!(
            "Reallocation finished: {} moves, {} categories balanced, {} over budget",
            report.summary.moves,
            report.summary.categories_balanced_count,
            report.over_budget().count()
        );

        Ok(ReallocationResult {
            outcome,
            adjustment,
            report,
        })
    }

    pub fn process_file(
        path: impl AsRef<std::path::Path>,
        classifier: Option<&dyn BatchClassifier>,
    ) -> Result<ReallocationResult> {
        let input = ReallocationInput::from_path(path)?;
        Self::process(&input, classifier)
    }
}

pub fn process_budget_reallocation(
    input: &ReallocationInput,
    classifier: Option<&dyn BatchClassifier>,
) -> Result<ReallocationResult> {
    BudgetReallocationProcessor::process(input, classifier)
}
