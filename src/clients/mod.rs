/// Spotify sign-in and token refresh
pub mod auth;
/// Local cache of the mapped genres
pub mod cache;
/// Web API payloads and genre records
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// Spotify Web API client
pub mod spotify;

pub use auth::SpotifyAuth;
pub use cache::GenreCache;
pub use spotify::{SpotifyApi, SpotifyClient};
