use crate::schema::ArticleRow;
use log::warn;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub name: String,
    pub amount: f64,
}

impl Article {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// Turns parsed rows into articles. Rows with an unparsable or negative
/// amount never reach the engine; they are logged and skipped.
pub fn convert_article_rows(rows: &[ArticleRow]) -> Vec<Article> {
    rows.iter()
        .enumerate()
        .filter_map(|(idx, row)| match row.amount.parse() {
            Some(amount) if amount >= 0.0 => Some(Article::new(row.name.trim(), amount)),
            Some(amount) => {
                warn!(
                    "Dropping article row {} ('{}'): negative amount {}",
                    idx + 1,
                    row.name,
                    amount
                );
                None
            }
            None => {
                warn!(
                    "Dropping article row {} ('{}'): unparsable amount '{}'",
                    idx + 1,
                    row.name,
                    row.amount
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AmountValue;

    #[test]
    fn test_convert_drops_bad_rows() {
        let rows = vec![
            ArticleRow {
                name: " Ciment ".to_string(),
                amount: AmountValue::from("1 234,56"),
            },
            ArticleRow {
                name: "Remise".to_string(),
                amount: AmountValue::from(-20.0),
            },
            ArticleRow {
                name: "Total".to_string(),
                amount: AmountValue::from("voir annexe"),
            },
            ArticleRow {
                name: "Sable".to_string(),
                amount: AmountValue::from(0.0),
            },
        ];

        let articles = convert_article_rows(&rows);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].name, "Ciment");
        assert!((articles[0].amount - 1234.56).abs() < 1e-9);
        assert_eq!(articles[1], Article::new("Sable", 0.0));
    }
}
