use std::path::PathBuf;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::clients::{auth::remove_if_exists, entities::MappedGenre, errors::Result};

// Keeps the mapped genres of the signed-in user between runs so the
// playlist scan only happens once per session.
// NOTE: single user, like the token cache next to it. A cached list is only
// handed out for the same user and mapping settings that produced it.

/// What the cached genres were computed from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Spotify user id
    pub user_id: String,
    /// Number of raw genres that were mapped
    pub top_genres: usize,
    /// [`GenreMap::fingerprint`](crate::genre_map::GenreMap::fingerprint) of the table used
    pub genre_map: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct CachedEntry {
    #[serde(flatten)]
    key: CacheKey,
    genres: Vec<MappedGenre>,
}

/// Result of loading cached genres from local storage
#[derive(Debug)]
pub enum CachedGenres {
    /// Genres stored for the requested key
    Cached(Vec<MappedGenre>),
    /// Nothing stored, or stored for another key
    NotFound,
}

/// JSON file holding the mapped genres of the last session
#[derive(Debug, Clone)]
pub struct GenreCache {
    path: PathBuf,
}

impl GenreCache {
    /// Cache stored at `path`
    pub fn new(path: PathBuf) -> Self {
        GenreCache { path }
    }

    /// Cache in the user cache directory
    pub fn try_default() -> Self {
        let path = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp")) // Fallback to /tmp if cache directory can't be determined
            .join(".band_radar_genres.json");
        Self::new(path)
    }

    /// Location of the cache file
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Replaces the cached genres
    pub async fn store(&self, key: &CacheKey, genres: &[MappedGenre]) -> Result<()> {
        let entry = CachedEntry {
            key: key.clone(),
            genres: genres.to_vec(),
        };
        let contents = serde_json::to_vec_pretty(&entry)?;
        tokio::fs::write(&self.path, contents).await?;
        debug!("Stored {} genres in cache {:?}", genres.len(), self.path);
        Ok(())
    }

    /// Cached genres for `key`; anything stored under another key is ignored
    pub async fn load(&self, key: &CacheKey) -> Result<CachedGenres> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!("No cached genres found in {:?}", self.path);
            return Ok(CachedGenres::NotFound);
        }
        let contents = tokio::fs::read(&self.path).await?;
        match serde_json::from_slice::<CachedEntry>(&contents) {
            Ok(entry) if entry.key == *key => {
                debug!("Loaded genres from cache");
                Ok(CachedGenres::Cached(entry.genres))
            }
            Ok(entry) => {
                debug!(
                    "Ignoring genres cached for {:?}, current settings are {key:?}",
                    entry.key
                );
                Ok(CachedGenres::NotFound)
            }
            Err(e) => {
                // A corrupt cache is not fatal, the genres get recompiled
                debug!("Ignoring unreadable genre cache: {e}");
                Ok(CachedGenres::NotFound)
            }
        }
    }

    /// Removes the cache file, a missing file is fine
    pub async fn clear(&self) -> Result<()> {
        remove_if_exists(self.path.clone()).await
    }
}
