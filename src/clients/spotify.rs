use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::clients::{
    entities::{ArtistBatch, CurrentUser, PlaylistPage, TrackPage},
    errors::{Error, Result},
};

/// Default Spotify Web API location
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com";

// Sparse field selection for playlist tracks: only artist ids and the next link
const TRACK_FIELDS: &str = "items(track(artists(id))),next";

/// Read-only slice of the Spotify Web API used by the genre pipeline.
///
/// Every call takes the bearer token explicitly so one client can serve
/// several sessions. Implementations return [`Error::Status`] for non-2xx
/// responses and leave the tolerate-or-fail decision to the caller.
#[allow(async_fn_in_trait)]
pub trait SpotifyApi {
    /// `GET /v1/me`
    async fn current_user(&self, token: &str) -> Result<CurrentUser>;

    /// `GET /v1/me/playlists`
    async fn playlists(&self, token: &str, limit: u32, offset: u32) -> Result<PlaylistPage>;

    /// `GET /v1/playlists/{id}/tracks` restricted to artist ids
    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<TrackPage>;

    /// `GET /v1/artists?ids=...`
    async fn artists(&self, token: &str, ids: &[String]) -> Result<ArtistBatch>;
}

/// Web API client backed by `reqwest`
#[derive(Clone, Debug)]
pub struct SpotifyClient {
    http: Client,
    base_url: String,
}

impl SpotifyClient {
    /// Client talking to `base_url`, a trailing slash is ignored.
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        SpotifyClient { http, base_url }
    }

    /// Web API location requests go to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url} {query:?}");
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url,
                status: status.as_u16(),
            });
        }
        // Some endpoints answer 204 with an empty body, treat it as an empty object
        if status == StatusCode::NO_CONTENT {
            return Ok(serde_json::from_str("{}")?);
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl SpotifyApi for SpotifyClient {
    async fn current_user(&self, token: &str) -> Result<CurrentUser> {
        self.get_json(token, "/v1/me", &[]).await
    }

    async fn playlists(&self, token: &str, limit: u32, offset: u32) -> Result<PlaylistPage> {
        self.get_json(
            token,
            "/v1/me/playlists",
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<TrackPage> {
        self.get_json(
            token,
            &format!("/v1/playlists/{playlist_id}/tracks"),
            &[
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
                ("fields", TRACK_FIELDS.to_string()),
            ],
        )
        .await
    }

    async fn artists(&self, token: &str, ids: &[String]) -> Result<ArtistBatch> {
        self.get_json(token, "/v1/artists", &[("ids", ids.join(","))])
            .await
    }
}
