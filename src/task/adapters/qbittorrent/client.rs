//! `reqwest`-based gateway for the qBittorrent Web API v2.

use super::models::TorrentInfo;
use crate::task::{
    domain::{ExternalEntry, ExternalId},
    ports::{
        DownloadGateway, EntryFilter, GatewayError, GatewayResult, SubmitRequest, TorrentSource,
    },
};
use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    header::{COOKIE, REFERER, SET_COOKIE},
    multipart::{Form, Part},
};
use std::time::Duration;
use tokio::sync::RwLock;

const SESSION_COOKIE: &str = "SID";
const FAILURE_BODY: &str = "Fails.";

/// Connection settings for a qBittorrent instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QbittorrentSettings {
    /// Base URL of the Web UI, for example `http://localhost:8080`.
    pub base_url: String,
    /// Web UI user name.
    pub username: String,
    /// Web UI password.
    pub password: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Download gateway backed by the qBittorrent Web API.
///
/// The gateway keeps the `SID` session cookie itself. A `403 Forbidden`
/// answer drops the session, logs in again and retries the call once.
#[derive(Debug)]
pub struct QbittorrentGateway {
    client: Client,
    settings: QbittorrentSettings,
    session: RwLock<Option<String>>,
}

impl QbittorrentGateway {
    /// Creates a gateway; no request is sent until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] when the HTTP client cannot be
    /// built.
    pub fn new(settings: QbittorrentSettings) -> GatewayResult<Self> {
        let client = Client::builder()
            .user_agent(format!("steward/{}", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout)
            .build()
            .map_err(GatewayError::transport)?;
        Ok(Self {
            client,
            settings,
            session: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v2{path}", self.settings.base_url.trim_end_matches('/'))
    }

    async fn login(&self) -> GatewayResult<String> {
        let response = self
            .client
            .post(self.endpoint("/auth/login"))
            .header(REFERER, self.settings.base_url.as_str())
            .form(&[
                ("username", self.settings.username.as_str()),
                ("password", self.settings.password.as_str()),
            ])
            .send()
            .await
            .map_err(GatewayError::transport)?;

        let status = response.status();
        let session = session_cookie(&response);
        let body = response.text().await.map_err(GatewayError::transport)?;
        if !status.is_success() || body.trim() == FAILURE_BODY {
            return Err(GatewayError::Authentication(format!(
                "login rejected with status {}",
                status.as_u16()
            )));
        }
        let sid = session.ok_or_else(|| {
            GatewayError::Authentication("login response carried no session cookie".to_owned())
        })?;

        *self.session.write().await = Some(sid.clone());
        tracing::debug!("download client session established");
        Ok(sid)
    }

    async fn ensure_authenticated(&self) -> GatewayResult<String> {
        let current = self.session.read().await.clone();
        match current {
            Some(sid) => Ok(sid),
            None => self.login().await,
        }
    }

    async fn invalidate_session(&self) {
        *self.session.write().await = None;
    }

    /// Sends an authenticated request built by `build`.
    ///
    /// `build` runs once per attempt so that non-cloneable bodies such as
    /// multipart forms can be rebuilt for the retry.
    async fn execute<F>(&self, operation: &'static str, build: F) -> GatewayResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let sid = self.ensure_authenticated().await?;
        let first = self.send_with_session(&build, &sid).await?;
        let response = if first.status() == StatusCode::FORBIDDEN {
            tracing::info!(operation, "download client session expired; re-authenticating");
            self.invalidate_session().await;
            let renewed = self.ensure_authenticated().await?;
            self.send_with_session(&build, &renewed).await?
        } else {
            first
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::FORBIDDEN {
            self.invalidate_session().await;
            return Err(GatewayError::Authentication(format!(
                "{operation} rejected after re-authentication"
            )));
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Request {
            operation,
            status: status.as_u16(),
            body,
        })
    }

    async fn send_with_session<F>(&self, build: &F, sid: &str) -> GatewayResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        build(&self.client)
            .header(COOKIE, format!("{SESSION_COOKIE}={sid}"))
            .header(REFERER, self.settings.base_url.as_str())
            .send()
            .await
            .map_err(GatewayError::transport)
    }

    async fn post_form(
        &self,
        operation: &'static str,
        path: &str,
        fields: &[(&'static str, String)],
    ) -> GatewayResult<()> {
        let url = self.endpoint(path);
        self.execute(operation, |client| client.post(url.as_str()).form(fields))
            .await?;
        Ok(())
    }

    async fn fetch_entries(
        &self,
        operation: &'static str,
        query: &[(&'static str, String)],
    ) -> GatewayResult<Vec<ExternalEntry>> {
        let url = self.endpoint("/torrents/info");
        let response = self
            .execute(operation, |client| client.get(url.as_str()).query(query))
            .await?;
        let body = response.text().await.map_err(GatewayError::transport)?;
        let infos: Vec<TorrentInfo> =
            serde_json::from_str(&body).map_err(|err| GatewayError::Decode {
                operation,
                reason: err.to_string(),
            })?;
        infos
            .into_iter()
            .map(|info| {
                ExternalEntry::try_from(info)
                    .map_err(|reason| GatewayError::Decode { operation, reason })
            })
            .collect()
    }
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .find_map(|pair| {
            pair.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .map(str::to_owned)
        })
}

fn joined_ids(ids: &[ExternalId]) -> String {
    ids.iter()
        .map(ExternalId::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

/// Builds the server-side part of an entry query.
///
/// The Web API only filters on coarse state groups, so exact states, paging
/// and limits are applied after decoding.
fn info_query(filter: &EntryFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(category) = &filter.category {
        query.push(("category", category.clone()));
    }
    if let Some(tag) = &filter.tag {
        query.push(("tag", tag.clone()));
    }
    if !filter.ids.is_empty() {
        query.push(("hashes", joined_ids(&filter.ids)));
    }
    if let Some(sort) = filter.sort {
        query.push(("sort", sort.as_str().to_owned()));
        query.push(("reverse", filter.reverse.to_string()));
    }
    query
}

fn submission_fields(request: &SubmitRequest) -> Vec<(&'static str, String)> {
    let mut fields = Vec::new();
    if let Some(category) = &request.category {
        fields.push(("category", category.clone()));
    }
    if !request.tags.is_empty() {
        fields.push(("tags", request.tags.join(",")));
    }
    if let Some(save_path) = &request.save_path {
        fields.push(("savepath", save_path.clone()));
    }
    fields
}

fn torrent_form(
    file_name: &str,
    contents: &[u8],
    fields: &[(&'static str, String)],
) -> Form {
    let part = Part::bytes(contents.to_vec()).file_name(file_name.to_owned());
    fields
        .iter()
        .fold(Form::new().part("torrents", part), |form, (name, value)| {
            form.text(*name, value.clone())
        })
}

#[async_trait]
impl DownloadGateway for QbittorrentGateway {
    async fn authenticate(&self) -> GatewayResult<()> {
        self.login().await.map(|_| ())
    }

    async fn submit(&self, request: &SubmitRequest) -> GatewayResult<()> {
        let url = self.endpoint("/torrents/add");
        let fields = submission_fields(request);
        let response = match &request.source {
            TorrentSource::Magnet(link) => {
                let mut form_fields = fields.clone();
                form_fields.push(("urls", link.clone()));
                self.execute("submit", |client| {
                    client.post(url.as_str()).form(&form_fields)
                })
                .await?
            }
            TorrentSource::File {
                file_name,
                contents,
            } => {
                self.execute("submit", |client| {
                    client
                        .post(url.as_str())
                        .multipart(torrent_form(file_name, contents, &fields))
                })
                .await?
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.map_err(GatewayError::transport)?;
        if body.trim() == FAILURE_BODY {
            return Err(GatewayError::Request {
                operation: "submit",
                status,
                body,
            });
        }
        tracing::info!(source = request.source.kind(), "download submitted");
        Ok(())
    }

    async fn list_entries(&self, filter: &EntryFilter) -> GatewayResult<Vec<ExternalEntry>> {
        let entries = self.fetch_entries("list_entries", &info_query(filter)).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| filter.matches(entry))
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn get_entry(&self, id: &ExternalId) -> GatewayResult<Option<ExternalEntry>> {
        let entries = self
            .fetch_entries("get_entry", &[("hashes", id.as_str().to_owned())])
            .await?;
        Ok(entries.into_iter().find(|entry| entry.id == *id))
    }

    async fn delete(&self, id: &ExternalId, purge_files: bool) -> GatewayResult<()> {
        self.post_form(
            "delete",
            "/torrents/delete",
            &[
                ("hashes", id.as_str().to_owned()),
                ("deleteFiles", purge_files.to_string()),
            ],
        )
        .await
    }

    async fn pause(&self, id: &ExternalId) -> GatewayResult<()> {
        self.post_form("pause", "/torrents/pause", &[("hashes", id.as_str().to_owned())])
            .await
    }

    async fn resume(&self, id: &ExternalId) -> GatewayResult<()> {
        self.post_form("resume", "/torrents/resume", &[("hashes", id.as_str().to_owned())])
            .await
    }

    async fn add_tags(&self, id: &ExternalId, tags: &[String]) -> GatewayResult<()> {
        self.post_form(
            "add_tags",
            "/torrents/addTags",
            &[("hashes", id.as_str().to_owned()), ("tags", tags.join(","))],
        )
        .await
    }

    async fn remove_tags(&self, id: &ExternalId, tags: &[String]) -> GatewayResult<()> {
        self.post_form(
            "remove_tags",
            "/torrents/removeTags",
            &[("hashes", id.as_str().to_owned()), ("tags", tags.join(","))],
        )
        .await
    }
}
