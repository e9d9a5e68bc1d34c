use reqwest::Client;
use tracing::debug;

use super::{LookupError, check_status};
use crate::model::IdType;

pub const API_BASE: &str = "https://rest.uniprot.org";

/// Client for the UniProtKB search endpoint, used to map a gene symbol or
/// accession to every gene name recorded for it.
#[derive(Clone)]
pub struct UniprotClient {
    http: Client,
    base_url: String,
}

impl UniprotClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn gene_names(
        &self,
        id: &str,
        id_type: IdType,
        taxon: u32,
    ) -> Result<Vec<String>, LookupError> {
        let url = format!("{}/uniprotkb/search", self.base_url);
        let query = format!(
            "{}:{id} AND organism_id:{taxon} AND reviewed:true",
            id_type.uniprot_field()
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", query.as_str()),
                ("fields", "gene_names"),
                ("format", "tsv"),
            ])
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        let names = parse_gene_names_tsv(&body);
        debug!(id, taxon, names = names.len(), "uniprot lookup complete");
        Ok(names)
    }
}

/// Parse the `gene_names` TSV: a header line, then one line per entry with
/// space-separated names.
fn parse_gene_names_tsv(body: &str) -> Vec<String> {
    body.lines()
        .skip(1)
        .flat_map(str::split_whitespace)
        .map(String::from)
        .collect()
}
