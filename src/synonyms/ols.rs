use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{LookupError, check_status};

pub const API_BASE: &str = "https://www.ebi.ac.uk/ols4/api";

/// Candidate nodes requested per search; only the best usable one is read.
const SEARCH_ROWS: &str = "5";

/// OGG class grouping the human genes.
const OGG_HUMAN_GENES: &str = "http://purl.obolibrary.org/obo/OGG_2000009606";

/// Which ontology nodes a term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OntologyScope {
    /// MONDO disease ontology, phrase match.
    Disease,
    /// UBERON anatomy ontology, exact match.
    Tissue,
    /// Every loaded ontology, exact match.
    Any,
    /// Ontology of Genes and Genomes, exact match, optionally restricted to
    /// human genes.
    Gene { human_only: bool },
}

impl OntologyScope {
    fn ontology(self) -> Option<&'static str> {
        match self {
            OntologyScope::Disease => Some("mondo"),
            OntologyScope::Tissue => Some("uberon"),
            OntologyScope::Any => None,
            OntologyScope::Gene { .. } => Some("ogg"),
        }
    }

    fn children_of(self) -> Option<&'static str> {
        match self {
            OntologyScope::Gene { human_only: true } => Some(OGG_HUMAN_GENES),
            _ => None,
        }
    }

    fn exact(self) -> bool {
        !matches!(self, OntologyScope::Disease)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody {
    #[serde(default)]
    num_found: u64,
    #[serde(default)]
    docs: Vec<OntologyDoc>,
}

#[derive(Debug, Deserialize)]
struct OntologyDoc {
    iri: Option<String>,
    label: Option<String>,
    #[serde(default)]
    synonym: Vec<String>,
}

/// Client for the EBI Ontology Lookup Service search API.
#[derive(Clone)]
pub struct OlsClient {
    http: Client,
    base_url: String,
}

impl OlsClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Label and synonyms of the top-ranked node matching `term`.
    pub async fn best_match_synonyms(
        &self,
        term: &str,
        scope: OntologyScope,
    ) -> Result<Vec<String>, LookupError> {
        let url = format!("{}/search", self.base_url);
        // phrase searches need the term quoted to keep its words together
        let q = if scope.exact() {
            term.to_string()
        } else {
            format!("\"{term}\"")
        };

        let mut params = vec![
            ("q", q.as_str()),
            ("rows", SEARCH_ROWS),
            ("fieldList", "iri,label,synonym"),
            ("exact", if scope.exact() { "true" } else { "false" }),
        ];
        if let Some(ontology) = scope.ontology() {
            params.push(("ontology", ontology));
        }
        if let Some(parent) = scope.children_of() {
            params.push(("allChildrenOf", parent));
        }

        let response = self
            .http
            .get(&url)
            .query(&params)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;
        let body: SearchResponse = check_status(response).await?.json().await?;

        debug!(term, ?scope, found = body.response.num_found, "ols search complete");
        let doc = best_match(body.response.docs).ok_or(LookupError::NotFound)?;
        Ok(doc.label.into_iter().chain(doc.synonym).collect())
    }
}

/// First document that is not an upper-level BFO node.
fn best_match(docs: Vec<OntologyDoc>) -> Option<OntologyDoc> {
    docs.into_iter()
        .find(|d| !d.iri.as_deref().is_some_and(|iri| iri.contains("/obo/BFO_")))
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn disease_search_returns_label_and_synonyms_of_top_node() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "\"arthritis\""))
            .and(query_param("ontology", "mondo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {
                    "numFound": 2,
                    "docs": [
                        {
                            "iri": "http://purl.obolibrary.org/obo/MONDO_0005578",
                            "label": "arthritis",
                            "synonym": ["joint inflammation", "arthritides"]
                        },
                        {
                            "iri": "http://purl.obolibrary.org/obo/MONDO_0008383",
                            "label": "rheumatoid arthritis",
                            "synonym": ["RA"]
                        }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = OlsClient::new(Client::new(), &server.uri());
        let names = client
            .best_match_synonyms("arthritis", OntologyScope::Disease)
            .await
            .unwrap();
        assert_eq!(names, vec!["arthritis", "joint inflammation", "arthritides"]);
    }

    #[tokio::test]
    async fn human_gene_search_is_limited_to_ogg_human_genes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "ADAMTS5"))
            .and(query_param("ontology", "ogg"))
            .and(query_param("exact", "true"))
            .and(query_param("allChildrenOf", OGG_HUMAN_GENES))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {
                    "numFound": 1,
                    "docs": [{
                        "iri": "http://purl.obolibrary.org/obo/OGG_3000011096",
                        "label": "ADAMTS5",
                        "synonym": ["ADAMTS11", "ADMP-2"]
                    }]
                }
            })))
            .mount(&server)
            .await;

        let client = OlsClient::new(Client::new(), &server.uri());
        let names = client
            .best_match_synonyms("ADAMTS5", OntologyScope::Gene { human_only: true })
            .await
            .unwrap();
        assert_eq!(names, vec!["ADAMTS5", "ADAMTS11", "ADMP-2"]);
    }

    #[tokio::test]
    async fn empty_result_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"numFound": 0, "docs": []}
            })))
            .mount(&server)
            .await;

        let client = OlsClient::new(Client::new(), &server.uri());
        let result = client.best_match_synonyms("zzz", OntologyScope::Any).await;
        assert!(matches!(result, Err(LookupError::NotFound)));
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = OlsClient::new(Client::new(), &server.uri());
        let result = client.best_match_synonyms("lung", OntologyScope::Tissue).await;
        assert!(matches!(result, Err(LookupError::RateLimited)));
    }
}
