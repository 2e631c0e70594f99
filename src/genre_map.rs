//! Mapping from Spotify genre tags to the Ticketmaster genre taxonomy.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::clients::{
    entities::{GenreCount, MappedGenre},
    errors::{Error, Result},
};

const BUILTIN_GENRE_MAP: &str = include_str!("../data/genre_map.json");

static BUILTIN: OnceLock<GenreMap> = OnceLock::new();

/// One row of the genre table: every Spotify tag listed maps to `tm_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GenreMapEntry {
    /// Spotify tags covered by this entry
    pub spotify_genres: Vec<String>,
    /// Ticketmaster genre id
    pub tm_id: String,
    /// Ticketmaster genre name
    pub tm_name: String,
}

/// Immutable genre table with a reverse index from tag to entry.
///
/// When a tag is listed by several entries the first entry in table order
/// wins, the index only remembers that one.
#[derive(Debug, Clone)]
pub struct GenreMap {
    entries: Vec<GenreMapEntry>,
    index: HashMap<String, usize>,
    fingerprint: String,
}

impl GenreMap {
    /// Validates the entries and builds the reverse index.
    pub fn new(entries: Vec<GenreMapEntry>) -> Result<Self> {
        let mut index = HashMap::new();
        for (position, entry) in entries.iter().enumerate() {
            if entry.tm_id.trim().is_empty() {
                return Err(Error::GenreMap(format!(
                    "entry {position} ({}) has an empty tm_id",
                    entry.tm_name
                )));
            }
            for genre in &entry.spotify_genres {
                index.entry(genre.clone()).or_insert(position);
            }
        }
        debug!(
            "Genre map ready: {} entries, {} tags",
            entries.len(),
            index.len()
        );
        let fingerprint = blake3::hash(&serde_json::to_vec(&entries)?)
            .to_hex()
            .to_string();
        Ok(GenreMap {
            entries,
            index,
            fingerprint,
        })
    }

    /// Parses a JSON array of entries
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<GenreMapEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// Reads a JSON genre table from disk
    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// The table shipped with the crate, parsed on first use.
    pub fn builtin() -> Result<&'static GenreMap> {
        if let Some(map) = BUILTIN.get() {
            return Ok(map);
        }
        let map = Self::from_json(BUILTIN_GENRE_MAP)?;
        Ok(BUILTIN.get_or_init(|| map))
    }

    /// Entries in table order
    pub fn entries(&self) -> &[GenreMapEntry] {
        &self.entries
    }

    /// Content hash of the table, changes whenever an entry does
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// First entry listing `spotify_genre`
    pub fn lookup(&self, spotify_genre: &str) -> Option<&GenreMapEntry> {
        self.index.get(spotify_genre).map(|&i| &self.entries[i])
    }

    /// Maps the `top_n` highest ranked raw genres, drops tags without a
    /// mapping and keeps only the first occurrence of each Ticketmaster id.
    pub fn map_top_genres(&self, genres: &[GenreCount], top_n: usize) -> Vec<MappedGenre> {
        let mut seen = HashSet::new();
        genres
            .iter()
            .take(top_n)
            .filter_map(|genre| self.lookup(&genre.name))
            .filter(|entry| seen.insert(entry.tm_id.as_str()))
            .map(|entry| MappedGenre {
                id: entry.tm_id.clone(),
                name: entry.tm_name.clone(),
            })
            .collect()
    }
}
