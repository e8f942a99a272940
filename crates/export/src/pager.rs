use crate::ExportError;
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// One page of a remote collection.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Value>,
    /// Opaque cursor for the next page; `None` when the collection is
    /// exhausted.
    pub next: Option<String>,
}

/// A paginated remote collection. Implementations are driven one page at a
/// time by the source streams, which pass back each page's `next` cursor.
#[async_trait]
pub trait Pager: Send {
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page, ExportError>;
}

/// Configuration of an [`HttpPager`], as it appears in application config
/// files.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagerConfig {
    pub url: String,
    #[serde(default)]
    pub bearer: Option<String>,
    #[serde(default = "default_items_field")]
    pub items_field: String,
    #[serde(default = "default_next_field")]
    pub next_field: String,
}

fn default_items_field() -> String {
    "value".to_string()
}

fn default_next_field() -> String {
    "@odata.nextLink".to_string()
}

/// [`Pager`] over an HTTP collection endpoint which returns its items in an
/// array field and an absolute next-page link, in the style of OData
/// `value` / `@odata.nextLink` responses.
pub struct HttpPager {
    client: reqwest::Client,
    url: Url,
    bearer: Option<String>,
    items_field: String,
    next_field: String,
}

impl HttpPager {
    pub fn new(url: Url) -> HttpPager {
        HttpPager {
            client: reqwest::Client::new(),
            url,
            bearer: None,
            items_field: default_items_field(),
            next_field: default_next_field(),
        }
    }

    pub fn from_config(config: &PagerConfig) -> Result<HttpPager, ExportError> {
        let mut pager = HttpPager::new(Url::parse(&config.url)?);
        pager.bearer = config.bearer.clone();
        pager.items_field = config.items_field.clone();
        pager.next_field = config.next_field.clone();
        Ok(pager)
    }

    pub fn bearer(mut self, token: impl Into<String>) -> HttpPager {
        self.bearer = Some(token.into());
        self
    }

    pub fn items_field(mut self, field: impl Into<String>) -> HttpPager {
        self.items_field = field.into();
        self
    }

    pub fn next_field(mut self, field: impl Into<String>) -> HttpPager {
        self.next_field = field.into();
        self
    }
}

#[async_trait]
impl Pager for HttpPager {
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page, ExportError> {
        let url = match cursor {
            Some(next) => Url::parse(next)?,
            None => self.url.clone(),
        };
        tracing::debug!(%url, "fetching page");

        let mut request = self.client.get(url);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        let body: Value = request.send().await?.error_for_status()?.json().await?;

        let items = match body.get(&self.items_field) {
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return Err(ExportError::PageShape("items field is not an array")),
            None => return Err(ExportError::PageShape("missing items field")),
        };
        let next = body
            .get(&self.next_field)
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Page { items, next })
    }
}
