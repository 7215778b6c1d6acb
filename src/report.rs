use crate::adjustment::BudgetAdjustment;
use crate::balancer::{JournalEntry, RebalanceOutcome, RebalanceStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    Balanced,
    UnderBudget,
    OverBudget,
}

impl CategoryStatus {
    pub fn from_gap(gap: f64, tolerance: f64) -> Self {
        if gap < -tolerance {
            CategoryStatus::OverBudget
        } else if gap > tolerance {
            CategoryStatus::UnderBudget
        } else {
            CategoryStatus::Balanced
        }
    }

    fn label(self) -> &'static str {
        match self {
            CategoryStatus::Balanced => "balanced",
            CategoryStatus::UnderBudget => "under budget",
            CategoryStatus::OverBudget => "over budget",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub key: String,
    pub name: String,
    pub family: Option<String>,
    pub nominal_budget: f64,
    pub adjusted_budget: f64,
    pub total_allocated: f64,
    /// Nominal budget minus allocated total.
    pub gap: f64,
    pub status: CategoryStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_budget: f64,
    pub total_allocated: f64,
    pub global_gap: f64,
    pub categories_balanced_count: usize,
    pub categories_adjusted_count: usize,
    pub articles_reallocated_count: usize,
    pub moves: usize,
    pub status: RebalanceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReallocationReport {
    pub categories: Vec<CategoryReport>,
    pub summary: ReportSummary,
    pub journal: Vec<JournalEntry>,
}

impl ReallocationReport {
    pub fn build(outcome: &RebalanceOutcome, adjustment: &BudgetAdjustment) -> Self {
        let allocation = &outcome.allocation;

        let categories: Vec<CategoryReport> = allocation
            .categories
            .iter()
            .map(|c| {
                let total = allocation.totals.get(&c.key).copied().unwrap_or(0.0);
                let gap = allocation.gap.get(&c.key).copied().unwrap_or(c.budget);
                CategoryReport {
                    key: c.key.clone(),
                    name: c.name.clone(),
                    family: c.family.clone(),
                    nominal_budget: c.budget,
                    adjusted_budget: adjustment.adjusted_budget(&c.key).unwrap_or(c.budget),
                    total_allocated: total,
                    gap,
                    status: CategoryStatus::from_gap(gap, outcome.tolerance),
                }
            })
            .collect();

        let summary = ReportSummary {
            total_budget: adjustment.total_budget,
            total_allocated: adjustment.total_allocated,
            global_gap: adjustment.difference,
            categories_balanced_count: categories
                .iter()
                .filter(|c| c.status == CategoryStatus::Balanced)
                .count(),
            categories_adjusted_count: adjustment.adjusted_keys.len(),
            articles_reallocated_count: outcome.reallocated_article_count(),
            moves: outcome.journal.len(),
            status: outcome.status,
        };

        Self {
            categories,
            summary,
            journal: outcome.journal.clone(),
        }
    }

    pub fn over_budget(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories
            .iter()
            .filter(|c| c.status == CategoryStatus::OverBudget)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Category,Family,Nominal Budget,Adjusted Budget,Total Allocated,Gap,Status\n");

        for category in &self.categories {
            output.push_str(&format!(
                "{},{},{:.2},{:.2},{:.2},{:.2},{}\n",
                csv_field(&category.name),
                csv_field(category.family.as_deref().unwrap_or("")),
                category.nominal_budget,
                category.adjusted_budget,
                category.total_allocated,
                category.gap,
                category.status.label()
            ));
        }

        output
    }

    pub fn journal_to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Step,Article,Amount,From,To,Reason\n");

        for entry in &self.journal {
            output.push_str(&format!(
                "{},{},{:.2},{},{},{}\n",
                entry.step,
                csv_field(&entry.article),
                entry.amount,
                csv_field(&entry.from),
                csv_field(&entry.to),
                reason_label(entry)
            ));
        }

        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        let summary = &self.summary;

        output.push_str("# Budget Reallocation Report\n\n");
        output.push_str(&format!("**Total Budget:** {:.2}\n\n", summary.total_budget));
        output.push_str(&format!("**Total Allocated:** {:.2}\n\n", summary.total_allocated));
        output.push_str(&format!("**Global Gap:** {:.2}\n\n", summary.global_gap));
        output.push_str(&format!(
            "**Outcome:** {} after {} moves ({} articles reallocated)\n\n",
            match summary.status {
                RebalanceStatus::Converged => "converged",
                RebalanceStatus::IterationLimitReached => "iteration limit reached",
            },
            summary.moves,
            summary.articles_reallocated_count
        ));

        output.push_str("## Categories\n\n");
        output.push_str("| Category | Nominal | Adjusted | Allocated | Gap | Status |\n");
        output.push_str("|---|---:|---:|---:|---:|---|\n");
        for category in &self.categories {
            output.push_str(&format!(
                "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {} |\n",
                category.name,
                category.nominal_budget,
                category.adjusted_budget,
                category.total_allocated,
                category.gap,
                category.status.label()
            ));
        }

        if !self.journal.is_empty() {
            output.push_str("\n## Journal\n\n");
            for entry in &self.journal {
                output.push_str(&format!(
                    "{}. {} ({:.2}): {} → {} [{}]\n",
                    entry.step,
                    entry.article,
                    entry.amount,
                    entry.from,
                    entry.to,
                    reason_label(entry)
                ));
            }
        }

        output
    }
}

fn reason_label(entry: &JournalEntry) -> &'static str {
    match entry.reason {
        crate::balancer::MoveReason::FamilyCompatibility => "family-compatibility",
        crate::balancer::MoveReason::GapReduction => "gap-reduction",
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
