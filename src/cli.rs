use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::batch::BatchOptions;
use crate::config::{Config, Endpoints, default_workers};
use crate::model::{HUMAN_TAXON, IdType, SearchUnit, parse_keyword_group};
use crate::query::{AdvancedSearch, YearRange};
use crate::retrieval::europepmc::MAX_PAGE_SIZE;
use crate::retrieval::{RetrievalSettings, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not a JSON array of search rows: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Count publications mentioning genes together with a disease, tissue or keywords.
#[derive(Debug, Parser)]
#[command(name = "litspy", version, about)]
pub struct Args {
    /// Gene symbols or UniProt accessions, one search row each
    #[arg(short = 'g', long = "genes", num_args = 1.., required_unless_present = "input")]
    pub genes: Vec<String>,

    /// JSON file holding an array of search rows (replaces -g/-d/-t/-k)
    #[arg(short = 'i', long, conflicts_with_all = ["genes", "disease", "tissue", "keywords"])]
    pub input: Option<PathBuf>,

    /// Write the report to this file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Kind of identifier passed with -g
    #[arg(short = 'u', long, value_enum, default_value_t = IdType::Gene)]
    pub id_type: IdType,

    /// NCBI taxonomy ID of the organism
    #[arg(short = 's', long, default_value_t = HUMAN_TAXON)]
    pub taxon: u32,

    /// Disease that must co-occur with each gene (synonyms are expanded)
    #[arg(short = 'd', long)]
    pub disease: Option<String>,

    /// Tissue that must co-occur with each gene (synonyms are expanded)
    #[arg(short = 't', long)]
    pub tissue: Option<String>,

    /// Comma-separated keywords that must all co-occur; repeat for alternative searches
    #[arg(short = 'k', long = "keywords")]
    pub keywords: Vec<String>,

    /// Expand keywords through the ontology service (noisier than disease/tissue expansion)
    #[arg(short = 'e', long)]
    pub expand_keywords: bool,

    /// Rank the most frequent words in the abstracts of each result set
    #[arg(short = 'w', long)]
    pub top_terms: bool,

    /// Publication years, e.g. 2010-2020, 2015- or 2019
    #[arg(long, value_parser = parse_year_range)]
    pub pub_year: Option<YearRange>,

    /// Only open access articles
    #[arg(long)]
    pub open_access: bool,

    /// Only records with an abstract
    #[arg(long)]
    pub has_abstract: bool,

    /// Record source, e.g. MED or PPR
    #[arg(long)]
    pub source: Option<String>,

    /// Extra FIELD=value search constraint (repeatable)
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,

    /// Raw clause AND-ed onto every query
    #[arg(long)]
    pub raw_query: Option<String>,

    /// Concurrent searches (default: available cores)
    #[arg(short = 'm', long)]
    pub workers: Option<usize>,

    /// Results per page
    #[arg(long, default_value_t = MAX_PAGE_SIZE)]
    pub page_size: u32,

    /// Page cap per search
    #[arg(long, default_value_t = 10)]
    pub max_pages: u32,

    /// Retries after the first attempt for transient failures
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Synonym lookup timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub lookup_timeout: u64,

    /// Article links listed per search in the Markdown report
    #[arg(long, default_value_t = 5)]
    pub hits: usize,

    /// Emit the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn config(&self, endpoints: Endpoints) -> Config {
        Config {
            endpoints,
            retrieval: RetrievalSettings {
                workers: self.workers.unwrap_or_else(default_workers),
                page_size: self.page_size,
                max_pages: self.max_pages,
                retry: RetryPolicy {
                    max_retries: self.max_retries,
                    ..RetryPolicy::default()
                },
            },
            request_timeout: Duration::from_secs(self.timeout),
            lookup_timeout: Duration::from_secs(self.lookup_timeout),
            batch: BatchOptions {
                expand_keywords: self.expand_keywords,
                top_terms: self.top_terms,
            },
            hits_shown: self.hits,
        }
    }

    pub fn advanced(&self) -> AdvancedSearch {
        AdvancedSearch {
            pub_year: self.pub_year,
            open_access: self.open_access,
            has_abstract: self.has_abstract,
            source: self.source.clone(),
            fields: self.fields.iter().cloned().collect::<BTreeMap<_, _>>(),
            raw: self.raw_query.clone(),
        }
    }

    /// Search rows from `--input`, or one row per `-g` gene sharing the other flags.
    pub fn units(&self) -> Result<Vec<SearchUnit>, InputError> {
        match &self.input {
            Some(path) => read_units(path),
            None => Ok(self.units_from_flags()),
        }
    }

    fn units_from_flags(&self) -> Vec<SearchUnit> {
        let groups: Vec<Vec<String>> = self
            .keywords
            .iter()
            .map(|cell| parse_keyword_group(cell))
            .filter(|group| !group.is_empty())
            .collect();
        self.genes
            .iter()
            .map(|gene| SearchUnit {
                id_type: self.id_type,
                taxon: self.taxon,
                disease: self.disease.clone(),
                tissue: self.tissue.clone(),
                keyword_groups: groups.clone(),
                ..SearchUnit::new(gene.as_str())
            })
            .collect()
    }
}

fn read_units(path: &Path) -> Result<Vec<SearchUnit>, InputError> {
    let text = fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| InputError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_year_range(s: &str) -> Result<YearRange, String> {
    s.parse().map_err(|e: crate::query::QueryError| e.to_string())
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=value, got '{s}'"))?;
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() || value.is_empty() {
        return Err(format!("expected FIELD=value, got '{s}'"));
    }
    Ok((name.to_uppercase(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("litspy").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn genes_share_concepts_and_keyword_groups() {
        let args = parse(&[
            "-g", "CFTR", "BRCA1", "-d", "arthritis", "-k", "normal diet, biomarker", "-k",
            "children",
        ]);
        let units = args.units().unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].gene, "BRCA1");
        assert_eq!(units[1].disease.as_deref(), Some("arthritis"));
        assert_eq!(
            units[0].keyword_groups,
            vec![
                vec!["normal diet".to_string(), "biomarker".to_string()],
                vec!["children".to_string()],
            ]
        );
        assert_eq!(units[0].taxon, HUMAN_TAXON);
    }

    #[test]
    fn genes_or_input_is_required() {
        assert!(Args::try_parse_from(["litspy"]).is_err());
        assert!(Args::try_parse_from(["litspy", "-i", "rows.json", "-g", "CFTR"]).is_err());
    }

    #[test]
    fn field_pairs_are_parsed_and_upper_cased() {
        assert_eq!(
            parse_field("lang=eng").unwrap(),
            ("LANG".to_string(), "eng".to_string())
        );
        assert!(parse_field("LANG").is_err());
        assert!(parse_field("=eng").is_err());
    }

    #[test]
    fn advanced_flags_build_the_clause() {
        let args = parse(&[
            "-g", "CFTR", "--pub-year", "2010-2020", "--open-access", "--field", "LANG=eng",
        ]);
        assert_eq!(
            args.advanced().to_clause().as_deref(),
            Some("PUB_YEAR:[2010 TO 2020] AND OPEN_ACCESS:y AND LANG:eng")
        );
        assert!(Args::try_parse_from(["litspy", "-g", "CFTR", "--pub-year", "soon"]).is_err());
    }

    #[test]
    fn config_reflects_flags() {
        let args = parse(&["-g", "CFTR", "-m", "3", "--max-retries", "1", "-w"]);
        let config = args.config(Endpoints::default());
        assert_eq!(config.retrieval.workers, 3);
        assert_eq!(config.retrieval.retry.max_retries, 1);
        assert_eq!(config.retrieval.page_size, MAX_PAGE_SIZE);
        assert!(config.batch.top_terms);
        assert!(!config.batch.expand_keywords);
    }

    #[test]
    fn input_file_rows_are_read() {
        let path = std::env::temp_dir().join(format!("litspy-rows-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"[{"gene": "CFTR", "disease": "arthritis"}, {"gene": "P38398", "id_type": "accession"}]"#,
        )
        .unwrap();
        let args = parse(&["-i", path.to_str().unwrap()]);
        let units = args.units().unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[1].id_type, IdType::Accession);
    }

    #[test]
    fn missing_input_file_is_a_read_error() {
        let args = parse(&["-i", "/nonexistent/litspy/rows.json"]);
        assert!(matches!(args.units(), Err(InputError::Read { .. })));
    }
}
