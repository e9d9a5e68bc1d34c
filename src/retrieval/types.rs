use serde::Deserialize;

use crate::model::Hit;

const PREPRINT_OF: &str = "Preprint of";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub hit_count: u64,
    pub next_cursor_mark: Option<String>,
    #[serde(default)]
    pub result_list: ResultList,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultList {
    #[serde(default)]
    pub result: Vec<ArticleRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub id: Option<String>,
    pub source: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub author_string: Option<String>,
    pub journal_info: Option<JournalInfo>,
    pub pub_year: Option<String>,
    pub doi: Option<String>,
    pub pub_type_list: Option<PubTypeList>,
    pub keyword_list: Option<KeywordList>,
    pub comment_correction_list: Option<CommentCorrectionList>,
}

#[derive(Debug, Deserialize)]
pub struct JournalInfo {
    pub journal: Option<Journal>,
}

#[derive(Debug, Deserialize)]
pub struct Journal {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubTypeList {
    #[serde(default)]
    pub pub_type: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeywordList {
    #[serde(default)]
    pub keyword: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCorrectionList {
    #[serde(default)]
    pub comment_correction: Vec<CommentCorrection>,
}

#[derive(Debug, Deserialize)]
pub struct CommentCorrection {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ArticleRecord {
    /// Records without an ID or source cannot be linked and are dropped.
    pub fn into_hit(self) -> Option<Hit> {
        let preprint_of = self.comment_correction_list.and_then(|list| {
            list.comment_correction
                .into_iter()
                .find(|c| c.kind.as_deref() == Some(PREPRINT_OF))
                .and_then(|c| c.id)
        });

        Some(Hit {
            id: self.id?,
            source: self.source?,
            title: self.title,
            abstract_text: self.abstract_text,
            authors: self.author_string,
            journal: self.journal_info.and_then(|j| j.journal).and_then(|j| j.title),
            pub_year: self.pub_year,
            doi: self.doi,
            pub_types: self.pub_type_list.map(|l| l.pub_type).unwrap_or_default(),
            keywords: self.keyword_list.map(|l| l.keyword).unwrap_or_default(),
            preprint_of,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_record_converts_to_hit() {
        let record: ArticleRecord = serde_json::from_value(serde_json::json!({
            "id": "PPR123",
            "source": "PPR",
            "title": "CFTR in joints",
            "abstractText": "We studied CFTR.",
            "authorString": "Doe J, Roe R.",
            "journalInfo": {"journal": {"title": "bioRxiv"}},
            "pubYear": "2021",
            "pubTypeList": {"pubType": ["Preprint"]},
            "keywordList": {"keyword": ["cystic fibrosis"]},
            "commentCorrectionList": {"commentCorrection": [
                {"id": "999", "source": "MED", "type": "Update in"},
                {"id": "34567", "source": "MED", "type": "Preprint of"}
            ]}
        }))
        .unwrap();

        let hit = record.into_hit().unwrap();
        assert_eq!(hit.id, "PPR123");
        assert_eq!(hit.journal.as_deref(), Some("bioRxiv"));
        assert_eq!(hit.pub_types, ["Preprint"]);
        assert_eq!(hit.keywords, ["cystic fibrosis"]);
        assert_eq!(hit.preprint_of.as_deref(), Some("34567"));
    }

    #[test]
    fn record_without_id_is_dropped() {
        let record: ArticleRecord =
            serde_json::from_value(serde_json::json!({"source": "MED", "title": "x"})).unwrap();
        assert!(record.into_hit().is_none());
    }

    #[test]
    fn empty_response_deserializes() {
        let resp: SearchResponse =
            serde_json::from_value(serde_json::json!({"hitCount": 0})).unwrap();
        assert_eq!(resp.hit_count, 0);
        assert!(resp.result_list.result.is_empty());
        assert!(resp.next_cursor_mark.is_none());
    }
}
