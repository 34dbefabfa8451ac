use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::debug;

pub mod model;

pub use model::{Page, QueryDatabaseResp};

const NOTION_API_BASE: &str = "https://api.notion.com/";
const QUERY_PAGE_SIZE: u32 = 100;

/// Database-side capability surface consumed by the sync engine.
/// Implemented by [`NotionClient`] and by recording fakes in tests.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    async fn list_entries(&self) -> Result<Vec<Page>>;
    async fn create_entry(&self, properties: Map<String, Value>) -> Result<Page>;
    async fn update_entry(&self, page_id: &str, properties: Map<String, Value>) -> Result<()>;
    async fn archive_entry(&self, page_id: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    base_url: Url,
    token: String,
    version: String,
    database_id: String,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .field("database_id", &self.database_id)
            .finish_non_exhaustive()
    }
}

impl NotionClient {
    pub fn new(token: String, version: String, database_id: String) -> Self {
        let base_url = Url::parse(NOTION_API_BASE).expect("valid default Notion URL");
        Self::with_base_url(token, version, database_id, base_url)
    }

    pub fn with_base_url(token: String, version: String, database_id: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("trello-notion-sync/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token,
            version,
            database_id,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid Notion endpoint path: {}", path))
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", &self.version)
            .header("Content-Type", "application/json")
    }

    async fn check(&self, res: Response, what: &str) -> Result<Response> {
        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from Notion while {}: {}", what, body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("notion error {} while {}: {}", status, what, body));
        }
        Ok(res)
    }
}

#[async_trait]
impl DatabaseService for NotionClient {
    async fn list_entries(&self) -> Result<Vec<Page>> {
        let url = self.endpoint(&format!("v1/databases/{}/query", self.database_id))?;
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
            if let Some(cur) = &cursor {
                body["start_cursor"] = json!(cur);
            }
            debug!(url = %url, cursor = ?cursor, "querying database");
            let res = self
                .authed(self.http.post(url.clone()))
                .json(&body)
                .send()
                .await
                .context("failed to reach Notion")?;
            let res = self.check(res, "querying database").await?;
            let payload: QueryDatabaseResp =
                res.json().await.context("invalid Notion query response")?;
            pages.extend(payload.results);
            if payload.has_more {
                cursor = payload.next_cursor;
                if cursor.is_none() {
                    return Err(anyhow!("notion reported more results without a cursor"));
                }
            } else {
                break;
            }
        }
        Ok(pages)
    }

    async fn create_entry(&self, properties: Map<String, Value>) -> Result<Page> {
        let url = self.endpoint("v1/pages")?;
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": Value::Object(properties),
        });
        debug!(url = %url, payload = %body, "creating page");
        let res = self
            .authed(self.http.post(url))
            .json(&body)
            .send()
            .await
            .context("failed to reach Notion")?;
        let res = self.check(res, "creating page").await?;
        res.json().await.context("invalid Notion page response")
    }

    async fn update_entry(&self, page_id: &str, properties: Map<String, Value>) -> Result<()> {
        let url = self.endpoint(&format!("v1/pages/{}", page_id))?;
        let body = json!({ "properties": Value::Object(properties) });
        debug!(url = %url, payload = %body, "updating page");
        let res = self
            .authed(self.http.patch(url))
            .json(&body)
            .send()
            .await
            .context("failed to reach Notion")?;
        self.check(res, "updating page").await?;
        Ok(())
    }

    async fn archive_entry(&self, page_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("v1/pages/{}", page_id))?;
        let body = json!({ "archived": true });
        let res = self
            .authed(self.http.patch(url))
            .json(&body)
            .send()
            .await
            .context("failed to reach Notion")?;
        self.check(res, "archiving page").await?;
        Ok(())
    }
}
