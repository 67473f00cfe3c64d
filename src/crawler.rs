use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

const APIFY_BASE_URL: &str = "https://api.apify.com/v2";
const CRAWLER_ACTOR: &str = "apify~website-content-crawler";

// One scraped page: text content plus the page it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub url: String,
}

// Source of crawled documents, stubbed out in tests
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, start_urls: &[String]) -> Result<Vec<Document>, ApiError>;
}

#[derive(Serialize)]
struct StartUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct RunInput<'a> {
    #[serde(rename = "startUrls")]
    start_urls: Vec<StartUrl<'a>>,
}

// Items come back with whatever fields the actor produced; pages
// without text are dropped
#[derive(Deserialize)]
struct CrawlItem {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

// Client for the Apify website-content-crawler actor. Uses the
// run-sync endpoint so one call covers the whole crawl.
pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: APIFY_BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl DocumentSource for ApifyClient {
    async fn fetch(&self, start_urls: &[String]) -> Result<Vec<Document>, ApiError> {
        let input = RunInput {
            start_urls: start_urls.iter().map(|url| StartUrl { url }).collect(),
        };
        let url = format!(
            "{}/acts/{}/run-sync-get-dataset-items",
            self.base_url, CRAWLER_ACTOR
        );

        tracing::info!("starting crawl of {} urls", start_urls.len());
        let res = self
            .client
            .post(&url)
            .query(&[("token", self.token.as_str())])
            .json(&input)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let items: Vec<CrawlItem> = res.json().await?;
        let documents: Vec<Document> = items
            .into_iter()
            .filter_map(|item| {
                let text = item.text?;
                if text.trim().is_empty() {
                    return None;
                }
                Some(Document {
                    text,
                    url: item.url.unwrap_or_default(),
                })
            })
            .collect();

        tracing::info!("total documents scraped: {}", documents.len());
        Ok(documents)
    }
}
