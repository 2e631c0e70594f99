use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

// Web API payloads. Only the fields the genre pipeline consumes are modelled,
// and fields with an unexpected shape deserialize to `None` instead of failing
// the whole page.

/// Signed-in user, `GET /v1/me`
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// Spotify user id
    pub id: String,
}

/// Playlist of the user; only the id is used
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    /// Spotify playlist id
    pub id: String,
    /// Display name, for logging
    #[serde(default)]
    pub name: Option<String>,
}

/// One page of `GET /v1/me/playlists`
#[derive(Deserialize, Debug, Default)]
pub struct PlaylistPage {
    /// Playlists, `None` entries could not be decoded
    #[serde(default, deserialize_with = "lenient_seq")]
    pub items: Option<Vec<Option<Playlist>>>,
}

/// Artist reference inside a track
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistRef {
    /// Spotify artist id
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
}

/// Track reduced to its artists by the sparse field selection
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackRef {
    /// Credited artists, `None` when missing or not a list
    #[serde(default, deserialize_with = "lenient")]
    pub artists: Option<Vec<ArtistRef>>,
}

/// Entry of a playlist track page
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackItem {
    /// The track, absent for removed or local items
    #[serde(default, deserialize_with = "lenient")]
    pub track: Option<TrackRef>,
}

impl TrackItem {
    /// A track item is usable when it has a track with an artist list.
    pub fn is_well_formed(&self) -> bool {
        self.track.as_ref().is_some_and(|t| t.artists.is_some())
    }

    /// Artist IDs of this item, skipping refs without an id.
    pub fn artist_ids(&self) -> impl Iterator<Item = &str> {
        self.track
            .iter()
            .filter_map(|t| t.artists.as_ref())
            .flatten()
            .filter_map(|a| a.id.as_deref())
    }
}

/// One page of `GET /v1/playlists/{id}/tracks`
#[derive(Deserialize, Debug, Default)]
pub struct TrackPage {
    /// Raw items, `None` entries could not be decoded
    #[serde(default, deserialize_with = "lenient_seq")]
    pub items: Option<Vec<Option<TrackItem>>>,
    /// Link to the following page, if any
    #[serde(default)]
    pub next: Option<String>,
}

/// Artist details from `GET /v1/artists`
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    /// Spotify artist id, empty when the payload had none
    #[serde(default)]
    pub id: String,
    /// Genre tags; `None` when missing or not a list. Non-string tags are dropped.
    #[serde(default, deserialize_with = "lenient_strings")]
    pub genres: Option<Vec<String>>,
}

/// Response of a batch artist lookup
#[derive(Deserialize, Debug, Default)]
pub struct ArtistBatch {
    /// One entry per requested id, `None` for unknown ids
    #[serde(default, deserialize_with = "lenient_seq")]
    pub artists: Option<Vec<Option<Artist>>>,
}

/// Raw genre tag with the number of times it was seen.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GenreCount {
    /// Spotify genre tag
    pub name: String,
    /// Occurrences across all artists
    pub count: u32,
}

/// Genre expressed in the ticketing taxonomy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MappedGenre {
    /// Ticketmaster genre id
    pub id: String,
    /// Ticketmaster genre name
    pub name: String,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

// Like `lenient`, but a bad element only drops itself, not the whole list.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Option<Vec<Option<T>>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(values) => Some(
            values
                .into_iter()
                .map(|v| serde_json::from_value(v).ok())
                .collect(),
        ),
        _ => None,
    })
}

// Keeps the string elements of a list, `None` if the value is not a list.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_seq::<D, String>(deserializer)?.map(|tags| tags.into_iter().flatten().collect()))
}
