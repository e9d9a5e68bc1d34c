//! Runs a batch of `SearchUnit`s through resolution, query building,
//! retrieval and aggregation, keeping input order and isolating failures.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::aggregate;
use crate::model::{Category, QueryResult, SearchExpression, SearchUnit, SynonymSet};
use crate::query::{QueryBuilder, ResolvedSynonyms};
use crate::retrieval::{Dispatcher, LiteratureSearch};
use crate::synonyms::{SynonymLookup, SynonymResolver};

static CLONE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,}\d{6}\.\d").expect("valid regex"));
static MAP_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}[pq]\d+\.?\d*").expect("valid regex"));

/// Why a row was not searched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    #[error("empty gene identifier")]
    EmptyGene,

    #[error("'{0}' holds more than one identifier; use one row per gene")]
    MultipleGenes(String),

    #[error("'{0}' is a clone-based gene name")]
    CloneName(String),

    #[error("'{0}' is a gene map location")]
    MapLocation(String),

    #[error("duplicate of row {0}")]
    Duplicate(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("nothing to search: every row was rejected")]
    NoValidRows,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Expand keywords through the ontology service instead of searching them literally.
    pub expand_keywords: bool,
    pub top_terms: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub rows: Vec<RowReport>,
}

impl BatchReport {
    pub fn failed_expressions(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| match &r.outcome {
                RowOutcome::Searched { expressions, .. } => Some(expressions),
                RowOutcome::Skipped { .. } => None,
            })
            .flatten()
            .filter(|e| matches!(e, ExpressionOutcome::Failed { .. }))
            .count()
    }
}

#[derive(Debug, Serialize)]
pub struct RowReport {
    /// Zero-based position in the input.
    pub index: usize,
    /// Gene identifier, suffixed `_2`, `_3`... when it repeats.
    pub key: String,
    pub unit: SearchUnit,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RowOutcome {
    Skipped {
        reason: String,
    },
    Searched {
        synonyms: ResolvedSynonyms,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
        expressions: Vec<ExpressionOutcome>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExpressionOutcome {
    Completed(QueryResult),
    Failed {
        expression: SearchExpression,
        error: String,
    },
}

/// Trim every field; empty disease/tissue become absent and empty keywords
/// and groups are dropped.
pub fn normalize_unit(mut unit: SearchUnit) -> SearchUnit {
    unit.gene = unit.gene.trim().to_string();
    let present = |s: Option<String>| {
        s.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    unit.disease = present(unit.disease);
    unit.tissue = present(unit.tissue);
    unit.keyword_groups = unit
        .keyword_groups
        .into_iter()
        .map(|group| {
            let mut seen = HashSet::new();
            group
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
                .collect::<Vec<_>>()
        })
        .filter(|group| !group.is_empty())
        .collect();
    unit
}

pub fn validate_unit(unit: &SearchUnit) -> Result<(), UnitError> {
    let gene = unit.gene.trim();
    if gene.is_empty() {
        return Err(UnitError::EmptyGene);
    }
    if gene.contains([',', ';']) || gene.contains(char::is_whitespace) {
        return Err(UnitError::MultipleGenes(gene.to_string()));
    }
    if CLONE_NAME.is_match(gene) {
        return Err(UnitError::CloneName(gene.to_string()));
    }
    if MAP_LOCATION.is_match(gene) {
        return Err(UnitError::MapLocation(gene.to_string()));
    }
    Ok(())
}

/// Unique report key per row: the gene itself the first time, then `GENE_2`, `GENE_3`...
pub fn row_keys(units: &[SearchUnit]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    units
        .iter()
        .map(|unit| {
            let n = seen.entry(unit.gene.as_str()).or_insert(0);
            *n += 1;
            if *n == 1 {
                unit.gene.clone()
            } else {
                format!("{}_{n}", unit.gene)
            }
        })
        .collect()
}

pub async fn run<L, S>(
    units: Vec<SearchUnit>,
    resolver: &SynonymResolver<L>,
    builder: &QueryBuilder,
    dispatcher: &Dispatcher<'_, S>,
    options: BatchOptions,
) -> Result<BatchReport, BatchError>
where
    L: SynonymLookup,
    S: LiteratureSearch,
{
    let units: Vec<SearchUnit> = units.into_iter().map(normalize_unit).collect();
    let keys = row_keys(&units);
    let checks = check_rows(&units);

    let valid: Vec<usize> = checks
        .iter()
        .enumerate()
        .filter_map(|(i, check)| check.is_ok().then_some(i))
        .collect();
    if valid.is_empty() {
        return Err(BatchError::NoValidRows);
    }
    info!(
        rows = units.len(),
        valid = valid.len(),
        "starting batch"
    );

    let resolved: Vec<ResolvedSynonyms> = stream::iter(&valid)
        .map(|&i| {
            let unit = &units[i];
            async move {
                // once cancelled, every expression fails in dispatch anyway
                dispatcher
                    .cancellable(resolve_unit(resolver, unit, options.expand_keywords))
                    .await
                    .unwrap_or_else(|_| ResolvedSynonyms::literal(unit))
            }
        })
        .buffered(dispatcher.workers())
        .collect()
        .await;

    let built: Vec<Vec<SearchExpression>> = valid
        .iter()
        .zip(&resolved)
        .map(|(&i, synonyms)| builder.build(&units[i], synonyms))
        .collect();
    let flat = dispatch_list(&built);
    info!(expressions = flat.len(), "dispatching searches");

    let mut outcomes = dispatcher.execute_all(&flat).await.into_iter();
    let mut searched: BTreeMap<usize, RowOutcome> = BTreeMap::new();
    for ((&i, synonyms), expressions) in valid.iter().zip(resolved).zip(built) {
        let mut warnings = fallback_warnings(&synonyms);
        let mut completed = Vec::with_capacity(expressions.len());
        for expression in expressions {
            let Some(outcome) = outcomes.next() else {
                break;
            };
            let list_mentions = match expression.family.as_ref().and_then(|_| outcomes.next()) {
                Some(Ok(retrieved)) => Some(retrieved),
                Some(Err(e)) => {
                    warn!(row = %keys[i], error = %e, "family list search failed");
                    warnings.push(format!("family list search failed: {e}"));
                    None
                }
                None => None,
            };
            completed.push(match outcome {
                Ok(retrieved) => ExpressionOutcome::Completed(aggregate(
                    retrieved,
                    list_mentions,
                    expression,
                    options.top_terms,
                )),
                Err(e) => {
                    warn!(row = %keys[i], query = %expression.query, error = %e, "search failed");
                    ExpressionOutcome::Failed {
                        expression,
                        error: e.to_string(),
                    }
                }
            });
        }
        searched.insert(
            i,
            RowOutcome::Searched {
                synonyms,
                warnings,
                expressions: completed,
            },
        );
    }

    let rows = units
        .into_iter()
        .zip(keys)
        .zip(checks)
        .enumerate()
        .map(|(index, ((unit, key), check))| {
            let outcome = match check {
                Err(e) => RowOutcome::Skipped {
                    reason: e.to_string(),
                },
                Ok(()) => searched
                    .remove(&index)
                    .unwrap_or_else(|| RowOutcome::Skipped {
                        reason: "not searched".to_string(),
                    }),
            };
            RowReport {
                index,
                key,
                unit,
                outcome,
            }
        })
        .collect();

    Ok(BatchReport { rows })
}

/// Every expression followed by its family search, when it has one, in the
/// order outcomes are read back.
fn dispatch_list(built: &[Vec<SearchExpression>]) -> Vec<SearchExpression> {
    let mut flat = Vec::new();
    for expression in built.iter().flatten() {
        flat.push(expression.clone());
        if let Some(family) = &expression.family {
            flat.push(SearchExpression {
                query: family.query.clone(),
                family: None,
                ..expression.clone()
            });
        }
    }
    flat
}

/// Validate every row and flag exact repeats of an earlier row.
fn check_rows(units: &[SearchUnit]) -> Vec<Result<(), UnitError>> {
    let mut first_seen: HashMap<&SearchUnit, usize> = HashMap::new();
    units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            let check = match first_seen.get(unit) {
                Some(&first) => Err(UnitError::Duplicate(first)),
                None => {
                    first_seen.insert(unit, i);
                    validate_unit(unit)
                }
            };
            if let Err(e) = &check {
                warn!(row = i, gene = %unit.gene, reason = %e, "row skipped");
            }
            check
        })
        .collect()
}

async fn resolve_unit<L: SynonymLookup>(
    resolver: &SynonymResolver<L>,
    unit: &SearchUnit,
    expand_keywords: bool,
) -> ResolvedSynonyms {
    let (gene, disease, tissue) = tokio::join!(
        resolver.resolve(&unit.gene, Category::Gene(unit.id_type), unit.taxon),
        resolve_optional(resolver, unit.disease.as_deref(), Category::Disease, unit.taxon),
        resolve_optional(resolver, unit.tissue.as_deref(), Category::Tissue, unit.taxon),
    );

    let mut keywords = BTreeMap::new();
    if expand_keywords {
        for keyword in unit.keyword_groups.iter().flatten() {
            if !keywords.contains_key(keyword) {
                let set = resolver
                    .resolve(keyword, Category::Keyword, unit.taxon)
                    .await;
                keywords.insert(keyword.clone(), set);
            }
        }
    }

    ResolvedSynonyms {
        gene,
        disease,
        tissue,
        keywords,
    }
}

async fn resolve_optional<L: SynonymLookup>(
    resolver: &SynonymResolver<L>,
    term: Option<&str>,
    category: Category,
    taxon: u32,
) -> Option<SynonymSet> {
    match term {
        Some(term) => Some(resolver.resolve(term, category, taxon).await),
        None => None,
    }
}

fn fallback_warnings(synonyms: &ResolvedSynonyms) -> Vec<String> {
    let describe = |set: &SynonymSet| {
        set.fallback()
            .map(|reason| format!("'{}' searched without synonyms: {reason}", set.canonical()))
    };
    std::iter::once(&synonyms.gene)
        .chain(synonyms.disease.as_ref())
        .chain(synonyms.tissue.as_ref())
        .chain(synonyms.keywords.values())
        .filter_map(describe)
        .collect()
}
