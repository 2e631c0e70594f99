//! Band Radar - find concert genres in your Spotify playlists
//!
//! This library scans the playlists of a Spotify user, tallies the genres of
//! the artists found in them and maps the most frequent ones onto the
//! Ticketmaster genre taxonomy used to search for concerts.

/// Client modules for interacting with external services and local storage
pub mod clients;
/// Mapping of Spotify genre tags to Ticketmaster genres
pub mod genre_map;
/// Playlist genre aggregation
pub mod genres;
/// Configuration and the session level genre workflow
pub mod radar;
