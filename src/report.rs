use crate::batch::{BatchReport, ExpressionOutcome, RowOutcome, RowReport};
use crate::markdown::{escape_md_link, sanitize_heading, table_cell};
use crate::model::{QueryResult, SearchExpression, SearchUnit};

/// Markdown summary: one table line per expression, then per-row details.
///
/// `hits_shown` caps the article links listed under each expression.
pub fn format_report(report: &BatchReport, hits_shown: usize) -> String {
    let mut output = String::from("# Literature co-occurrence\n\n");

    output.push_str("| Key | Gene | Search terms | Publications | Status |\n");
    output.push_str("|---|---|---|---|---|\n");
    for row in &report.rows {
        push_summary_lines(&mut output, row);
    }
    output.push('\n');

    let failed = report.failed_expressions();
    if failed > 0 {
        output.push_str(&format!(
            "**{failed} search(es) failed.** Their rows are marked FAILED above.\n\n"
        ));
    }

    for row in &report.rows {
        if let RowOutcome::Searched {
            warnings,
            expressions,
            ..
        } = &row.outcome
        {
            push_row_details(&mut output, row, warnings, expressions, hits_shown);
        }
    }

    output
}

/// The full report as pretty-printed JSON.
pub fn format_json(report: &BatchReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

fn push_summary_lines(output: &mut String, row: &RowReport) {
    let key = table_cell(&row.key);
    let gene = table_cell(&row.unit.gene);
    match &row.outcome {
        RowOutcome::Skipped { reason } => {
            let terms = table_cell(&row.unit.search_terms());
            output.push_str(&format!(
                "| {key} | {gene} | {terms} | - | skipped: {} |\n",
                table_cell(reason)
            ));
        }
        RowOutcome::Searched { expressions, .. } => {
            for outcome in expressions {
                let (expression, count, status) = match outcome {
                    ExpressionOutcome::Completed(result) => {
                        (&result.expression, result.count.to_string(), status(result))
                    }
                    ExpressionOutcome::Failed { expression, error } => (
                        expression,
                        "-".to_string(),
                        format!("FAILED: {}", table_cell(error)),
                    ),
                };
                let terms = table_cell(&expression_terms(&row.unit, expression));
                output.push_str(&format!(
                    "| {key} | {gene} | {terms} | {count} | {status} |\n"
                ));
            }
        }
    }
}

fn status(result: &QueryResult) -> String {
    let mut status = String::from("ok");
    if result.truncated {
        status.push_str(&format!(", {} retrieved", result.hits.len()));
    }
    if result.preprints_removed > 0 {
        status.push_str(&format!(", {} preprint(s) merged", result.preprints_removed));
    }
    if result.list_mentions > 0 {
        status.push_str(&format!(", {} via family lists", result.list_mentions));
    }
    status
}

/// Disease, tissue and this expression's keyword group.
fn expression_terms(unit: &SearchUnit, expression: &SearchExpression) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.extend(unit.disease.iter().cloned());
    parts.extend(unit.tissue.iter().cloned());
    if !expression.keywords.is_empty() {
        parts.push(expression.keywords.join(" + "));
    }
    parts.join(", ")
}

fn push_row_details(
    output: &mut String,
    row: &RowReport,
    warnings: &[String],
    expressions: &[ExpressionOutcome],
    hits_shown: usize,
) {
    output.push_str(&format!("## {}\n\n", sanitize_heading(&row.key)));
    for warning in warnings {
        output.push_str(&format!("> {}\n", sanitize_heading(warning)));
    }
    if !warnings.is_empty() {
        output.push('\n');
    }

    for outcome in expressions {
        let ExpressionOutcome::Completed(result) = outcome else {
            continue;
        };
        let terms = expression_terms(&row.unit, &result.expression);
        let heading = if terms.is_empty() {
            row.unit.gene.clone()
        } else {
            terms
        };
        output.push_str(&format!(
            "### {} ({})\n\n",
            sanitize_heading(&heading),
            result.count
        ));

        if let Some(top_terms) = result.top_terms.as_ref().filter(|t| !t.is_empty()) {
            let list: Vec<String> = top_terms
                .iter()
                .map(|t| format!("{} ({})", t.term, t.count))
                .collect();
            output.push_str(&format!("Top terms: {}\n\n", list.join(", ")));
        }

        for hit in result.hits.iter().take(hits_shown) {
            let title = hit.title.as_deref().unwrap_or(&hit.id);
            let year = hit
                .pub_year
                .as_deref()
                .map(|y| format!(" ({y})"))
                .unwrap_or_default();
            output.push_str(&format!(
                "- [{}]({}){year}\n",
                escape_md_link(title),
                hit.url()
            ));
        }
        if result.hits.len() > hits_shown {
            output.push_str(&format!(
                "- ... {} more\n",
                result.hits.len() - hits_shown
            ));
        }
        output.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Hit, TermCount};
    use crate::query::ResolvedSynonyms;

    fn expression(keywords: &[&str]) -> SearchExpression {
        SearchExpression {
            query: "q".into(),
            taxon: 9606,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            terms: Vec::new(),
            family: None,
        }
    }

    fn sample_report() -> BatchReport {
        let unit = SearchUnit::new("CFTR")
            .with_disease("arthritis")
            .with_keyword_group(["diet"])
            .with_keyword_group(["children"]);
        let completed = QueryResult {
            expression: expression(&["diet"]),
            count: 42,
            hits: vec![
                Hit {
                    title: Some("CFTR [and] diet".into()),
                    pub_year: Some("2020".into()),
                    ..Hit::stub("1")
                },
                Hit::stub("2"),
            ],
            truncated: false,
            preprints_removed: 0,
            list_mentions: 0,
            top_terms: Some(vec![TermCount {
                term: "lung".into(),
                count: 3,
            }]),
        };
        BatchReport {
            rows: vec![
                RowReport {
                    index: 0,
                    key: "CFTR".into(),
                    outcome: RowOutcome::Searched {
                        synonyms: ResolvedSynonyms::literal(&unit),
                        warnings: vec!["'arthritis' searched without synonyms: timeout".into()],
                        expressions: vec![
                            ExpressionOutcome::Completed(completed),
                            ExpressionOutcome::Failed {
                                expression: expression(&["children"]),
                                error: "gave up after 4 attempts".into(),
                            },
                        ],
                    },
                    unit,
                },
                RowReport {
                    index: 1,
                    key: "7q31.2".into(),
                    unit: SearchUnit::new("7q31.2"),
                    outcome: RowOutcome::Skipped {
                        reason: "'7q31.2' is a gene map location".into(),
                    },
                },
            ],
        }
    }

    #[test]
    fn status_notes_family_list_mentions() {
        let result = QueryResult {
            expression: expression(&[]),
            count: 9,
            hits: Vec::new(),
            truncated: false,
            preprints_removed: 0,
            list_mentions: 2,
            top_terms: None,
        };
        assert_eq!(status(&result), "ok, 2 via family lists");
    }

    #[test]
    fn summary_has_one_line_per_expression_with_failure_markers() {
        let md = format_report(&sample_report(), 1);
        assert!(md.contains("| CFTR | CFTR | arthritis, diet | 42 | ok |"));
        assert!(md.contains("| CFTR | CFTR | arthritis, children | - | FAILED: gave up after 4 attempts |"));
        assert!(md.contains("| 7q31.2 | 7q31.2 |  | - | skipped: '7q31.2' is a gene map location |"));
        assert!(md.contains("**1 search(es) failed.**"));
    }

    #[test]
    fn details_list_top_terms_and_capped_hits() {
        let md = format_report(&sample_report(), 1);
        assert!(md.contains("## CFTR\n\n> 'arthritis' searched without synonyms: timeout"));
        assert!(md.contains("### arthritis, diet (42)"));
        assert!(md.contains("Top terms: lung (3)"));
        assert!(md.contains(
            r"- [CFTR \[and\] diet](https://europepmc.org/abstract/MED/1) (2020)"
        ));
        assert!(md.contains("- ... 1 more"));
        assert!(!md.contains("## 7q31.2"));
    }

    #[test]
    fn json_output_round_trips_through_serde_value() {
        let json = format_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["rows"][0]["expressions"][1]["status"], "failed");
        assert_eq!(value["rows"][1]["status"], "skipped");
    }
}
