//! Client for the datasets-server rows API.
//!
//! `GET {base}/rows?dataset=..&config=..&split=..&offset=..&length=..` answers
//! with one page of rows plus the total row count of the split.

use evalcorpus_shared::{Corpus, EvalCorpusError, Result, SourceConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("evalcorpus/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// One page returned by the rows endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RowsPage {
    pub rows: Vec<SourceRow>,
    pub num_rows_total: usize,
}

/// A row wrapper carrying its absolute position in the split.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRow {
    pub row_idx: usize,
    pub row: SourceDocument,
    /// Columns the server shortened; any entry means the text is incomplete.
    #[serde(default)]
    pub truncated_cells: Vec<String>,
}

/// The labeled document columns of the corpus dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDocument {
    pub docid: String,
    pub title: String,
    pub text: String,
}

/// Pages through one dataset split.
pub struct DatasetsServerClient {
    client: Client,
    base_url: Url,
    dataset: String,
    split: String,
    page_size: usize,
}

impl DatasetsServerClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                EvalCorpusError::SourceUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
            dataset: config.dataset.clone(),
            split: config.split.clone(),
            page_size: config.page_size,
        })
    }

    /// Build the request URL for the page starting at `offset`.
    pub fn rows_url(&self, corpus: Corpus, offset: usize) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                EvalCorpusError::config(format!(
                    "source base URL cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push("rows");
        url.query_pairs_mut()
            .append_pair("dataset", &self.dataset)
            .append_pair("config", corpus.code())
            .append_pair("split", &self.split)
            .append_pair("offset", &offset.to_string())
            .append_pair("length", &self.page_size.to_string());
        Ok(url)
    }

    /// Fetch the page starting at `offset`.
    pub async fn fetch_page(&self, corpus: Corpus, offset: usize) -> Result<RowsPage> {
        let url = self.rows_url(corpus, offset)?;
        debug!(%url, "fetching rows page");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| EvalCorpusError::SourceUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EvalCorpusError::SourceUnavailable(format!(
                "{url}: HTTP {status}"
            )));
        }

        response.json::<RowsPage>().await.map_err(|e| {
            EvalCorpusError::SourceUnavailable(format!("{url}: undecodable rows page: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base_url: &str) -> DatasetsServerClient {
        let config = SourceConfig {
            base_url: base_url.into(),
            page_size: 50,
            ..SourceConfig::default()
        };
        DatasetsServerClient::new(&config).unwrap()
    }

    #[test]
    fn rows_url_carries_all_parameters() {
        let client = client_for("https://datasets-server.huggingface.co");
        let url = client.rows_url(Corpus::Sw, 150).unwrap();
        assert_eq!(url.path(), "/rows");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("dataset".into(), "miracl/miracl-corpus".into())));
        assert!(pairs.contains(&("config".into(), "sw".into())));
        assert!(pairs.contains(&("split".into(), "train".into())));
        assert!(pairs.contains(&("offset".into(), "150".into())));
        assert!(pairs.contains(&("length".into(), "50".into())));
    }

    #[test]
    fn rows_url_appends_to_base_path() {
        let client = client_for("http://localhost:9000/mirror/");
        let url = client.rows_url(Corpus::En, 0).unwrap();
        assert_eq!(url.path(), "/mirror/rows");
    }

    #[test]
    fn page_ignores_extra_fields() {
        let body = r#"{
            "features": [],
            "rows": [{"row_idx": 0, "row": {"docid": "1#0", "title": "T", "text": "B"}, "truncated_cells": []}],
            "num_rows_total": 1,
            "num_rows_per_page": 100,
            "partial": false
        }"#;
        let page: RowsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.num_rows_total, 1);
        assert_eq!(page.rows[0].row.docid, "1#0");
        assert!(page.rows[0].truncated_cells.is_empty());
    }
}
