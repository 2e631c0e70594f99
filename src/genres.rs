//! Playlist genre aggregation.
//!
//! Walks the user's playlists, collects the artists of every track, looks the
//! artists up in batches and tallies their genre tags. Track pages that answer
//! with an error status and artist batches that fail are tolerated: they are
//! logged, reported in [`GenreReport::skipped`] and the scan goes on. Anything
//! else, including a failure to list the playlists, aborts the extraction.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info, warn};

use crate::clients::{
    entities::{Artist, GenreCount, Playlist, TrackItem},
    errors::{Error, Result},
    spotify::SpotifyApi,
};

/// Tuning knobs of the extraction. Defaults follow the Web API limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreExtractorConfig {
    /// How many playlists are scanned (first page only)
    pub playlist_limit: u32,
    /// Tracks requested per page
    pub track_page_size: u32,
    /// Artist ids per lookup request
    pub artist_batch_size: usize,
    /// Pause between artist batches when running sequentially
    pub batch_pause: Duration,
    /// Requests in flight; 1 keeps the sequential scan with pauses
    pub concurrency: usize,
}

impl Default for GenreExtractorConfig {
    fn default() -> Self {
        GenreExtractorConfig {
            playlist_limit: 10,
            track_page_size: 100,
            artist_batch_size: 50,
            batch_pause: Duration::from_millis(100),
            concurrency: 1,
        }
    }
}

/// A tolerated failure, the data behind it is missing from the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skipped {
    /// Pagination of a playlist stopped at `offset`
    TrackPage {
        /// Playlist being paged
        playlist_id: String,
        /// Offset of the failed page
        offset: u32,
        /// Error that stopped it
        reason: String,
    },
    /// Artist batch number `index` (0 based) holding `size` ids was dropped
    ArtistBatch {
        /// Batch position
        index: usize,
        /// Ids in the batch
        size: usize,
        /// Error that dropped it
        reason: String,
    },
}

/// Outcome of an extraction: the genre tally plus what had to be skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreReport {
    /// Sorted by count, most frequent first
    pub genres: Vec<GenreCount>,
    /// Tolerated failures, in the order they happened
    pub skipped: Vec<Skipped>,
}

impl GenreReport {
    /// True when some data is missing from `genres`
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Tracks of one playlist
#[derive(Debug, Default)]
pub struct TrackCollection {
    /// Well formed tracks, in playlist order
    pub tracks: Vec<TrackItem>,
    /// Set when pagination stopped on an error status
    pub skipped: Option<Skipped>,
}

/// Artists returned by the batch lookups
#[derive(Debug, Default)]
pub struct ArtistFetch {
    /// Artists of the successful batches, in batch order
    pub artists: Vec<Artist>,
    /// Batches that failed
    pub skipped: Vec<Skipped>,
}

/// Scans the playlists of a user through any [`SpotifyApi`]
pub struct GenreExtractor<A> {
    api: A,
    config: GenreExtractorConfig,
}

impl<A: SpotifyApi> GenreExtractor<A> {
    /// Extractor over `api`; zero sizes in `config` are raised to 1
    pub fn new(api: A, mut config: GenreExtractorConfig) -> Self {
        // Zero sized pages would never terminate
        config.track_page_size = config.track_page_size.max(1);
        config.artist_batch_size = config.artist_batch_size.max(1);
        config.concurrency = config.concurrency.max(1);
        GenreExtractor { api, config }
    }

    /// Underlying Web API client
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Effective settings
    pub fn config(&self) -> &GenreExtractorConfig {
        &self.config
    }

    /// Extracts the genre profile of the user owning `token`.
    ///
    /// Fatal errors come back wrapped in [`Error::GenreExtraction`].
    pub async fn extract(&self, token: &str) -> Result<GenreReport> {
        self.run(token).await.map_err(Error::extraction)
    }

    async fn run(&self, token: &str) -> Result<GenreReport> {
        info!("Fetching playlists ...");
        let playlists = self.playlists(token).await?;
        if playlists.is_empty() {
            info!("No playlists found, nothing to extract");
            return Ok(GenreReport::default());
        }
        info!("Collecting tracks of {} playlists ...", playlists.len());

        let collections: Vec<TrackCollection> = stream::iter(&playlists)
            .map(|p| self.playlist_tracks(token, &p.id))
            .buffered(self.config.concurrency)
            .try_collect()
            .await?;

        let mut skipped = Vec::new();
        let mut tracks = Vec::new();
        for collection in collections {
            tracks.extend(collection.tracks);
            skipped.extend(collection.skipped);
        }

        let artist_ids = unique_artist_ids(&tracks);
        info!(
            "Fetching {} artists referenced by {} tracks ...",
            artist_ids.len(),
            tracks.len()
        );
        let fetch = self.artist_details(token, &artist_ids).await;
        skipped.extend(fetch.skipped);

        let genres = tally_genres(&fetch.artists);
        info!(
            "Extracted {} genres from {} artists ({} parts skipped)",
            genres.len(),
            fetch.artists.len(),
            skipped.len()
        );
        Ok(GenreReport { genres, skipped })
    }

    /// First page of the user's playlists. Every error is fatal here.
    pub async fn playlists(&self, token: &str) -> Result<Vec<Playlist>> {
        let page = self
            .api
            .playlists(token, self.config.playlist_limit, 0)
            .await?;
        let playlists: Vec<Playlist> = page
            .items
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();
        debug!("Fetched {} playlists", playlists.len());
        Ok(playlists)
    }

    /// All well formed tracks of a playlist.
    ///
    /// A page answered with an error status ends the pagination and what was
    /// gathered so far is kept. Transport or decoding errors are returned.
    pub async fn playlist_tracks(&self, token: &str, playlist_id: &str) -> Result<TrackCollection> {
        let limit = self.config.track_page_size;
        let mut collection = TrackCollection::default();
        let mut offset = 0;

        loop {
            let page = match self
                .api
                .playlist_tracks(token, playlist_id, limit, offset)
                .await
            {
                Ok(page) => page,
                Err(err @ Error::Status { .. }) => {
                    warn!("Failed to fetch tracks for playlist {playlist_id}: {err}");
                    collection.skipped = Some(Skipped::TrackPage {
                        playlist_id: playlist_id.to_string(),
                        offset,
                        reason: err.to_string(),
                    });
                    break;
                }
                Err(err) => return Err(err),
            };

            let items = page.items.unwrap_or_default();
            let received = items.len();
            collection
                .tracks
                .extend(items.into_iter().flatten().filter(TrackItem::is_well_formed));

            if page.next.is_none() || received < limit as usize {
                break;
            }
            offset += limit;
        }

        debug!(
            "Collected {} tracks from playlist {playlist_id}",
            collection.tracks.len()
        );
        Ok(collection)
    }

    /// Looks artists up in batches. Failed batches are skipped, never fatal.
    pub async fn artist_details(&self, token: &str, artist_ids: &[String]) -> ArtistFetch {
        let sequential = self.config.concurrency == 1;
        let pause = self.config.batch_pause;

        let results: Vec<(usize, usize, Result<Vec<Artist>>)> =
            stream::iter(artist_ids.chunks(self.config.artist_batch_size).enumerate())
                .map(|(index, batch)| async move {
                    // With a single request in flight this lands between two batches
                    if sequential && index > 0 && !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    (index, batch.len(), self.artist_batch(token, batch).await)
                })
                .buffered(self.config.concurrency)
                .collect()
                .await;

        let mut fetch = ArtistFetch::default();
        for (index, size, result) in results {
            match result {
                Ok(artists) => fetch.artists.extend(artists),
                Err(err) => {
                    warn!("Failed to fetch artist batch {index}: {err}");
                    fetch.skipped.push(Skipped::ArtistBatch {
                        index,
                        size,
                        reason: err.to_string(),
                    });
                }
            }
        }
        fetch
    }

    async fn artist_batch(&self, token: &str, ids: &[String]) -> Result<Vec<Artist>> {
        let batch = self.api.artists(token, ids).await?;
        Ok(batch.artists.unwrap_or_default().into_iter().flatten().collect())
    }
}

/// Distinct artist ids in order of first appearance.
pub fn unique_artist_ids(tracks: &[TrackItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .flat_map(TrackItem::artist_ids)
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Counts every genre tag of every artist and sorts by count, descending.
///
/// Tags are counted as listed, so a tag repeated by one artist counts twice.
/// Equal counts keep the order in which the tags were first seen.
pub fn tally_genres(artists: &[Artist]) -> Vec<GenreCount> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<GenreCount> = Vec::new();

    for genre in artists.iter().filter_map(|a| a.genres.as_deref()).flatten() {
        if let Some(&i) = positions.get(genre.as_str()) {
            counts[i].count += 1;
        } else {
            positions.insert(genre, counts.len());
            counts.push(GenreCount {
                name: genre.clone(),
                count: 1,
            });
        }
    }

    // sort_by_key is stable
    counts.sort_by_key(|g| Reverse(g.count));
    counts
}
