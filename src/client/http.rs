//! HTTP client adapter
//!
//! Forwards every CRUD operation to a remote REST service:
//!
//! | operation | request                               |
//! |-----------|---------------------------------------|
//! | `find`    | `GET    {base}/{table}/{id}`          |
//! | `create`  | `POST   {base}/{table}`               |
//! | `update`  | `PATCH  {base}/{table}/{id}`          |
//! | `remove`  | `DELETE {base}/{table}/{id}`          |
//! | `list`    | `GET    {base}/{table}?<query params>` |
//!
//! The list query travels as flattened bracket parameters
//! (`age[$gte]=15&$sort[age]=-1`), see [`Query::to_params`].
//!
//! Responses are classified: 404 on a record route becomes
//! [`StoreError::NotFound`], any other non-success status becomes
//! [`StoreError::Status`] carrying the response body, and network failures
//! or undecodable bodies become [`StoreError::Transport`]. There is no retry
//! or timeout beyond what the supplied `reqwest::Client` is configured with.

use crate::config::HttpConfig;
use crate::core::error::{StoreError, StoreResult};
use crate::core::query::Query;
use crate::core::record::{Fields, Readable, Record, Writable, from_listing};
use crate::core::service::{
    CreateProps, DataAdapter, FindProps, ListProps, RemoveProps, UpdateProps,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Data adapter talking to a remote REST service
pub struct HttpAdapter<R = Record, W = Fields> {
    client: reqwest::Client,
    base_url: Url,
    headers: HeaderMap,
    _marker: PhantomData<fn() -> (R, W)>,
}

impl<R, W> Clone for HttpAdapter<R, W> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            headers: self.headers.clone(),
            _marker: PhantomData,
        }
    }
}

impl HttpAdapter {
    /// Create an adapter for the service rooted at `base_url`
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| StoreError::Config {
            message: format!("invalid base url '{}': {}", base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Config {
                message: format!("base url '{}' cannot carry a path", base_url),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            headers: HeaderMap::new(),
            _marker: PhantomData,
        })
    }

    /// Create an adapter from the `http` section of the configuration
    pub fn from_config(config: &HttpConfig) -> StoreResult<Self> {
        Self::new(&config.base_url)?.with_headers(&config.headers)
    }
}

impl<R, W> HttpAdapter<R, W> {
    /// Add headers sent with every request
    pub fn with_headers(mut self, headers: &HashMap<String, String>) -> StoreResult<Self> {
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| StoreError::Config {
                message: format!("invalid header name '{}': {}", name, e),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| StoreError::Config {
                message: format!("invalid value for header '{}': {}", name, e),
            })?;
            self.headers.insert(name, value);
        }
        Ok(self)
    }

    /// Use a preconfigured client (timeouts, proxies, TLS)
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// A view over the same service with other record types
    pub fn typed<R2, W2>(&self) -> HttpAdapter<R2, W2> {
        HttpAdapter {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            headers: self.headers.clone(),
            _marker: PhantomData,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/{segments...}` with every segment percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.client
            .request(method, self.url(segments))
            .headers(self.headers.clone())
    }
}

/// Turn a response into the decoded body or a classified error
///
/// `id` is `None` on the collection route, where a 404 is not a missing
/// record.
async fn decode<T: DeserializeOwned>(
    response: Response,
    table: &str,
    id: Option<&str>,
) -> StoreResult<T> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND
        && let Some(id) = id
    {
        return Err(StoreError::not_found(table, id));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(table = %table, status = status.as_u16(), "request rejected by server");
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response.json::<T>().await?)
}

#[async_trait]
impl<R: Readable, W: Writable> DataAdapter<R, W> for HttpAdapter<R, W> {
    async fn find(&self, props: FindProps) -> StoreResult<R> {
        let response = self
            .request(Method::GET, &[&props.table, &props.id])
            .send()
            .await?;
        decode(response, &props.table, Some(&props.id)).await
    }

    async fn create(&self, props: CreateProps<W>) -> StoreResult<R> {
        let response = self
            .request(Method::POST, &[&props.table])
            .json(&props.data)
            .send()
            .await?;
        let record = decode(response, &props.table, None).await?;
        tracing::debug!(table = %props.table, "created remote record");
        Ok(record)
    }

    async fn update(&self, props: UpdateProps<W::Patch>) -> StoreResult<R> {
        let response = self
            .request(Method::PATCH, &[&props.table, &props.id])
            .json(&props.data)
            .send()
            .await?;
        let record = decode(response, &props.table, Some(&props.id)).await?;
        tracing::debug!(table = %props.table, id = %props.id, "updated remote record");
        Ok(record)
    }

    async fn remove(&self, props: RemoveProps) -> StoreResult<R> {
        let response = self
            .request(Method::DELETE, &[&props.table, &props.id])
            .send()
            .await?;
        let record = decode(response, &props.table, Some(&props.id)).await?;
        tracing::debug!(table = %props.table, id = %props.id, "removed remote record");
        Ok(record)
    }

    async fn list(&self, props: ListProps) -> StoreResult<Vec<R>> {
        let params = props
            .query
            .as_ref()
            .map(Query::to_params)
            .unwrap_or_default();

        let response = self
            .request(Method::GET, &[&props.table])
            .query(&params)
            .send()
            .await?;
        let records: Vec<Fields> = decode(response, &props.table, None).await?;
        Ok(from_listing(&props.table, records))
    }
}
