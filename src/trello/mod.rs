use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

use crate::model::FieldValue;

pub mod model;

pub use model::{BoardAction, BoardList, Card, CustomFieldDef, CustomFieldItem, CustomFieldValue};

const TRELLO_API_BASE: &str = "https://api.trello.com/1/";

/// Board-side capability surface consumed by the sync engine and the change
/// watcher. Implemented by [`TrelloClient`] and by recording fakes in tests.
#[async_trait]
pub trait BoardService: Send + Sync {
    async fn list_cards(&self) -> Result<Vec<Card>>;
    async fn list_lists(&self) -> Result<Vec<BoardList>>;
    async fn list_custom_fields(&self) -> Result<Vec<CustomFieldDef>>;
    async fn list_actions(&self, since: DateTime<Utc>) -> Result<Vec<BoardAction>>;
    async fn create_card(&self, name: &str, list_id: &str) -> Result<Card>;
    async fn update_card(&self, card_id: &str, name: &str) -> Result<()>;
    async fn move_card(&self, card_id: &str, list_id: &str) -> Result<()>;
    async fn update_custom_field(
        &self,
        card_id: &str,
        field_id: &str,
        value: &FieldValue,
    ) -> Result<()>;
    async fn delete_card(&self, card_id: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct TrelloClient {
    http: Client,
    base_url: Url,
    key: String,
    token: String,
    board_id: String,
}

impl fmt::Debug for TrelloClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrelloClient")
            .field("base_url", &self.base_url)
            .field("board_id", &self.board_id)
            .finish_non_exhaustive()
    }
}

impl TrelloClient {
    pub fn new(key: String, token: String, board_id: String) -> Self {
        let base_url = Url::parse(TRELLO_API_BASE).expect("valid default Trello URL");
        Self::with_base_url(key, token, board_id, base_url)
    }

    pub fn with_base_url(key: String, token: String, board_id: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("trello-notion-sync/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            key,
            token,
            board_id,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid Trello endpoint path: {}", path))
    }

    /// Every request carries the key+token pair as query parameters.
    fn auth(&self) -> [(&'static str, &str); 2] {
        [("key", self.key.as_str()), ("token", self.token.as_str())]
    }

    async fn check(&self, res: Response, what: &str) -> Result<Response> {
        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from Trello while {}: {}", what, body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("trello error {} while {}: {}", status, what, body));
        }
        Ok(res)
    }
}

#[async_trait]
impl BoardService for TrelloClient {
    async fn list_cards(&self) -> Result<Vec<Card>> {
        let url = self.endpoint(&format!("boards/{}/cards", self.board_id))?;
        debug!(%url, "listing board cards");
        let res = self
            .http
            .get(url)
            .query(&self.auth())
            .query(&[
                ("customFieldItems", "true"),
                ("fields", "id,name,idList,dateLastActivity"),
            ])
            .send()
            .await
            .context("failed to reach Trello")?;
        let res = self.check(res, "listing cards").await?;
        res.json().await.context("invalid Trello cards response")
    }

    async fn list_lists(&self) -> Result<Vec<BoardList>> {
        let url = self.endpoint(&format!("boards/{}/lists", self.board_id))?;
        let res = self
            .http
            .get(url)
            .query(&self.auth())
            .send()
            .await
            .context("failed to reach Trello")?;
        let res = self.check(res, "listing lists").await?;
        res.json().await.context("invalid Trello lists response")
    }

    async fn list_custom_fields(&self) -> Result<Vec<CustomFieldDef>> {
        let url = self.endpoint(&format!("boards/{}/customFields", self.board_id))?;
        let res = self
            .http
            .get(url)
            .query(&self.auth())
            .send()
            .await
            .context("failed to reach Trello")?;
        let res = self.check(res, "listing custom fields").await?;
        res.json()
            .await
            .context("invalid Trello custom fields response")
    }

    async fn list_actions(&self, since: DateTime<Utc>) -> Result<Vec<BoardAction>> {
        let url = self.endpoint(&format!("boards/{}/actions", self.board_id))?;
        let since = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        let res = self
            .http
            .get(url)
            .query(&self.auth())
            .query(&[
                ("filter", "createCard,updateCard,updateCustomFieldItem"),
                ("since", since.as_str()),
            ])
            .send()
            .await
            .context("failed to reach Trello")?;
        let res = self.check(res, "listing board actions").await?;
        res.json().await.context("invalid Trello actions response")
    }

    async fn create_card(&self, name: &str, list_id: &str) -> Result<Card> {
        let url = self.endpoint("cards")?;
        debug!(name, list_id, "creating card");
        let res = self
            .http
            .post(url)
            .query(&self.auth())
            .query(&[("name", name), ("idList", list_id)])
            .send()
            .await
            .context("failed to reach Trello")?;
        let res = self.check(res, "creating card").await?;
        res.json().await.context("invalid Trello card response")
    }

    async fn update_card(&self, card_id: &str, name: &str) -> Result<()> {
        let url = self.endpoint(&format!("cards/{}", card_id))?;
        let res = self
            .http
            .put(url)
            .query(&self.auth())
            .query(&[("name", name)])
            .send()
            .await
            .context("failed to reach Trello")?;
        self.check(res, "updating card").await?;
        Ok(())
    }

    async fn move_card(&self, card_id: &str, list_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("cards/{}", card_id))?;
        let res = self
            .http
            .put(url)
            .query(&self.auth())
            .query(&[("idList", list_id)])
            .send()
            .await
            .context("failed to reach Trello")?;
        self.check(res, "moving card").await?;
        Ok(())
    }

    async fn update_custom_field(
        &self,
        card_id: &str,
        field_id: &str,
        value: &FieldValue,
    ) -> Result<()> {
        let url = self.endpoint(&format!("cards/{}/customField/{}/item", card_id, field_id))?;
        let body = custom_field_update_body(value);
        debug!(card_id, field_id, payload = %body, "updating custom field");
        let res = self
            .http
            .put(url)
            .query(&self.auth())
            .json(&body)
            .send()
            .await
            .context("failed to reach Trello")?;
        self.check(res, "updating custom field").await?;
        Ok(())
    }

    async fn delete_card(&self, card_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("cards/{}", card_id))?;
        let res = self
            .http
            .delete(url)
            .query(&self.auth())
            .send()
            .await
            .context("failed to reach Trello")?;
        self.check(res, "deleting card").await?;
        Ok(())
    }
}

/// Body for the custom-field item update endpoint. Numbers and booleans are
/// transmitted in their string forms, matching what the listing returns.
pub fn custom_field_update_body(value: &FieldValue) -> Value {
    let inner = match value {
        FieldValue::Number(_) => json!({ "number": value.string_form() }),
        FieldValue::Text(s) => json!({ "text": s }),
        FieldValue::Bool(_) => json!({ "checked": value.string_form() }),
    };
    json!({ "value": inner })
}
