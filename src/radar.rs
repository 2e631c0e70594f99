use std::path::PathBuf;
use std::str::FromStr;

use log::{debug, info, warn};

use crate::clients::{
    GenreCache, SpotifyApi, SpotifyClient,
    auth::remove_if_exists,
    cache::{CacheKey, CachedGenres},
    entities::MappedGenre,
    errors::{Error, Result},
    spotify::DEFAULT_API_BASE_URL,
};
use crate::genre_map::GenreMap;
use crate::genres::{GenreExtractor, GenreExtractorConfig, GenreReport};

const ENV_API_BASE_URL: &str = "BAND_RADAR_API_BASE_URL";
const ENV_CONCURRENCY: &str = "BAND_RADAR_CONCURRENCY";
const ENV_TOP_GENRES: &str = "BAND_RADAR_TOP_GENRES";
const ENV_GENRE_MAP: &str = "BAND_RADAR_GENRE_MAP";

const DEFAULT_TOP_GENRES: usize = 10;

/// Configuration for the [`Radar`] struct
pub struct Config {
    /// Playlist scanner talking to the Web API
    pub extractor: GenreExtractor<SpotifyClient>,
    /// Spotify to Ticketmaster genre table
    pub genre_map: GenreMap,
    /// Where mapped genres are kept between runs
    pub cache: GenreCache,
    /// How many top raw genres are mapped
    pub top_genres: usize,
}

/// Collects settings from the environment and explicit overrides
#[derive(Default)]
pub struct ConfigBuilder {
    api_base_url: Option<String>,
    concurrency: Option<usize>,
    top_genres: Option<usize>,
    genre_map_path: Option<PathBuf>,
    cache: Option<GenreCache>,
}

impl ConfigBuilder {
    /// Builder with every setting at its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings from `BAND_RADAR_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Settings read through `lookup` instead of the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_base_url: lookup(ENV_API_BASE_URL),
            concurrency: parse_var(&lookup, ENV_CONCURRENCY)?,
            top_genres: parse_var(&lookup, ENV_TOP_GENRES)?,
            genre_map_path: lookup(ENV_GENRE_MAP).map(PathBuf::from),
            cache: None,
        })
    }

    /// Web API location, mostly useful for tests
    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Requests in flight while scanning, 1 is sequential
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// How many top raw genres are mapped
    #[must_use]
    pub fn top_genres(mut self, top_genres: usize) -> Self {
        self.top_genres = Some(top_genres);
        self
    }

    /// JSON genre table to use instead of the builtin one
    #[must_use]
    pub fn genre_map_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.genre_map_path = Some(path.into());
        self
    }

    /// Genre cache to use instead of the one in the user cache directory
    #[must_use]
    pub fn cache(mut self, cache: GenreCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Validates the settings and loads the genre table
    pub async fn build(self) -> Result<Config> {
        let concurrency = self.concurrency.unwrap_or(1);
        if concurrency == 0 {
            return Err(Error::Configuration(format!(
                "{ENV_CONCURRENCY} must be at least 1"
            )));
        }
        let http = reqwest::Client::builder().build()?;
        let api = SpotifyClient::new(
            http,
            self.api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        );
        let genre_map = match self.genre_map_path {
            Some(path) => {
                debug!("Loading genre map from {path:?}");
                GenreMap::from_file(&path).await?
            }
            None => GenreMap::builtin()?.clone(),
        };
        Ok(Config {
            extractor: GenreExtractor::new(
                api,
                GenreExtractorConfig {
                    concurrency,
                    ..Default::default()
                },
            ),
            genre_map,
            cache: self.cache.unwrap_or_else(GenreCache::try_default),
            top_genres: self.top_genres.unwrap_or(DEFAULT_TOP_GENRES),
        })
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Configuration(format!("Invalid {key}={raw:?}: {e}")))
        })
        .transpose()
}

/// Where the genres of a session came from
#[derive(Debug)]
pub enum GenreSource {
    /// Loaded from the genre cache
    Cache,
    /// Scanned from the playlists just now
    Compiled(GenreReport),
}

/// Mapped genres of the signed-in user
#[derive(Debug)]
pub struct SessionGenres {
    /// Ticketmaster genres, best ranked first
    pub genres: Vec<MappedGenre>,
    /// Where `genres` came from
    pub source: GenreSource,
}

/// Ties the extraction, the genre table and the cache together for one user
pub struct Radar {
    config: Config,
}

impl Radar {
    /// Radar running with `config`
    pub fn new(config: Config) -> Self {
        Radar { config }
    }

    /// Raw genre counts of the user, straight from the playlists.
    pub async fn raw_genres(&self, token: &str) -> Result<GenreReport> {
        self.config.extractor.extract(token).await
    }

    /// Ticketmaster genres of the user. Cached genres are used unless
    /// `refresh` is set; complete results are written back to the cache.
    ///
    /// The cache only answers for the same user, `top_genres` and genre
    /// table that produced it, so the account is looked up first.
    pub async fn genres(&self, token: &str, refresh: bool) -> Result<SessionGenres> {
        let user = self
            .config
            .extractor
            .api()
            .current_user(token)
            .await
            .map_err(Error::extraction)?;
        let key = CacheKey {
            user_id: user.id,
            top_genres: self.config.top_genres,
            genre_map: self.config.genre_map.fingerprint().to_string(),
        };
        if !refresh && let CachedGenres::Cached(genres) = self.config.cache.load(&key).await? {
            info!("Using {} cached genres", genres.len());
            return Ok(SessionGenres {
                genres,
                source: GenreSource::Cache,
            });
        }

        info!("Compiling genres from playlists ...");
        let report = self.raw_genres(token).await?;
        let genres = self
            .config
            .genre_map
            .map_top_genres(&report.genres, self.config.top_genres);

        if report.is_partial() {
            // Retry on the next run instead of pinning incomplete genres
            warn!(
                "Genres compiled from partial data ({} parts skipped), not caching them",
                report.skipped.len()
            );
        } else {
            self.config.cache.store(&key, &genres).await?;
        }

        Ok(SessionGenres {
            genres,
            source: GenreSource::Compiled(report),
        })
    }
}

/// Drops everything tied to the signed-in user: the cached genres and the
/// cached token at `token_cache`.
pub async fn sign_out(cache: &GenreCache, token_cache: PathBuf) -> Result<()> {
    cache.clear().await?;
    remove_if_exists(token_cache).await?;
    info!("Signed out");
    Ok(())
}
