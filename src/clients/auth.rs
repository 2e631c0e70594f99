use std::path::PathBuf;

use log::{debug, info};
use rspotify::{
    AuthCodePkceSpotify, Config, Credentials, OAuth, Token, prelude::*, scopes,
};

use crate::clients::errors::{Error, Result};

/// Spotify sign-in using the authorization code flow with PKCE.
///
/// The token is cached on disk by rspotify, so a single interactive
/// [`authorize_client`](Self::authorize_client) is enough for later runs;
/// [`access_token`](Self::access_token) refreshes it when it expired.
pub struct SpotifyAuth {
    spotify: AuthCodePkceSpotify,
}

impl SpotifyAuth {
    /// Create a `SpotifyAuth` from the `RSPOTIFY_*` environment variables
    pub fn try_default() -> Result<Self> {
        let creds = Credentials::from_env().ok_or_else(|| {
            Error::Configuration(
                "Missing Spotify credentials in environment variables (RSPOTIFY_CLIENT_ID)".into(),
            )
        })?;
        let oauth = OAuth::from_env(scopes!(
            "playlist-read-private",
            "user-read-email",
            "user-read-private"
        ))
        .ok_or_else(|| {
            Error::Configuration(
                "Missing Spotify OAuth configuration in environment variables (RSPOTIFY_REDIRECT_URI)"
                    .into(),
            )
        })?;

        let spotify = AuthCodePkceSpotify::with_config(
            creds,
            oauth,
            Config {
                token_cached: true,
                cache_path: Self::token_cache_path(),
                ..Default::default()
            },
        );

        Ok(Self { spotify })
    }

    /// File rspotify caches the token in
    pub fn token_cache_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp")) // Fallback to /tmp if cache directory can't be determined
            .join(".band_radar_token_cache")
    }

    /// Interactive sign-in: the terminal prompts for the redirect URL, then
    /// the code and verifier are exchanged for a token. Returns the user name.
    pub async fn authorize_client(&mut self) -> Result<String> {
        debug!("Starting Spotify authorization ...");
        let url = self.spotify.get_authorize_url(None)?;
        self.spotify.prompt_for_token(&url).await?;
        let user = self.spotify.me().await?;
        let name = user
            .display_name
            .unwrap_or_else(|| user.id.id().to_string());
        info!("Authenticated as user: {name}");
        Ok(name)
    }

    /// Returns a usable access token, refreshing the cached one if needed.
    pub async fn access_token(&self) -> Result<String> {
        let cache_path = Self::token_cache_path();
        let cached = if tokio::fs::try_exists(&cache_path).await? {
            self.spotify.read_token_cache(true).await?
        } else {
            debug!("No cached Spotify token found in {cache_path:?}");
            None
        };
        let Some(token) = cached else {
            return Err(Error::Authorization(
                "No cached Spotify token, run `band-radar authorize` first".into(),
            ));
        };
        let expired = token.is_expired();
        self.set_token(Some(token)).await?;

        if expired {
            debug!("Cached Spotify token expired, refreshing ...");
            // rspotify re-caches the refreshed token and keeps the old refresh token
            self.spotify.refresh_token().await?;
        }

        let guard = self
            .spotify
            .token
            .lock()
            .await
            .map_err(|_| Error::Authorization("Spotify token lock poisoned".into()))?;
        guard
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| Error::Authorization("Spotify token refresh returned nothing".into()))
    }

    async fn set_token(&self, token: Option<Token>) -> Result<()> {
        let mut guard = self
            .spotify
            .token
            .lock()
            .await
            .map_err(|_| Error::Authorization("Spotify token lock poisoned".into()))?;
        *guard = token;
        Ok(())
    }
}

pub(crate) async fn remove_if_exists(path: PathBuf) -> Result<()> {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            debug!("Removed {path:?}");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::from(e)),
    }
}
