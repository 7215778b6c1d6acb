use crate::error::{ReallocationError, Result};
use crate::normalize::parse_euro;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A monetary cell as it arrives from the parsing layer: either a number
/// already typed by the spreadsheet reader or raw text such as `"1 234,56 €"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AmountValue {
    /// Numeric cell value, used as-is.
    Number(f64),

    /// Text cell value in French or English notation (e.g. '1 234,56', '1,234.50', '2 000 €').
    Text(String),
}

impl AmountValue {
    /// Resolves the cell to a finite amount, `None` when it cannot be parsed.
    pub fn parse(&self) -> Option<f64> {
        match self {
            AmountValue::Number(value) => Some(*value).filter(|v| v.is_finite()),
            AmountValue::Text(text) => parse_euro(text),
        }
    }
}

impl fmt::Display for AmountValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountValue::Number(value) => write!(f, "{}", value),
            AmountValue::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<f64> for AmountValue {
    fn from(value: f64) -> Self {
        AmountValue::Number(value)
    }
}

impl From<&str> for AmountValue {
    fn from(value: &str) -> Self {
        AmountValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArticleRow {
    #[schemars(description = "Label of the expense line (e.g. 'Ciment gris 35kg', 'Location nacelle').")]
    #[serde(alias = "article", alias = "designation")]
    pub name: String,

    #[schemars(description = "Amount of the expense line. Rows whose amount cannot be parsed are dropped.")]
    #[serde(alias = "montant")]
    pub amount: AmountValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryRow {
    #[schemars(description = "Display name of the budget category. Must be unique after accent/case folding.")]
    #[serde(rename = "categorie", alias = "category")]
    pub name: String,

    #[schemars(description = "Budget ceiling of the category. Must be a finite, non-negative amount.")]
    pub budget: AmountValue,

    #[schemars(description = "Comma-separated keyword hints matched against article labels.")]
    #[serde(rename = "motscles", alias = "keywords", default)]
    pub keywords: Option<String>,

    #[schemars(
        description = "Optional family grouping. Reallocation prefers destinations of the same family."
    )]
    #[serde(rename = "famille", alias = "family", default)]
    pub family: Option<String>,
}

fn default_tolerance() -> f64 {
    10.0
}

fn default_max_iterations() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReallocationSettings {
    #[schemars(
        description = "Absolute gap (same unit as amounts) under which a category counts as balanced. Defaults to 10."
    )]
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    #[schemars(description = "Hard cap on reallocation moves. Defaults to 1000.")]
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for ReallocationSettings {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl ReallocationSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ReallocationError::InvalidSettings(format!(
                "tolerance must be a finite, non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReallocationInput {
    #[schemars(description = "Expense lines to assign and rebalance.")]
    pub articles: Vec<ArticleRow>,

    #[schemars(
        description = "Budget categories in source order. Order is kept and used to break classification ties."
    )]
    pub categories: Vec<CategoryRow>,

    #[serde(default)]
    pub settings: ReallocationSettings,
}

impl ReallocationInput {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReallocationInput)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
