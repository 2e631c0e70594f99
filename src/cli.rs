use clap::{Parser, Subcommand};
use log::info;

use band_radar::clients::{
    GenreCache, SpotifyAuth,
    errors::{Error, Result},
};
use band_radar::genres::{GenreReport, Skipped};
use band_radar::radar::{self, ConfigBuilder, GenreSource, Radar};

const ENV_ACCESS_TOKEN: &str = "SPOTIFY_ACCESS_TOKEN";

#[derive(Parser)]
#[command(name = "band-radar")]
#[command(version, about = "Find concert genres in your Spotify playlists", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with Spotify and cache the token
    Authorize {},
    /// Print the Ticketmaster genres matching your playlists
    Genres {
        /// Ignore cached genres and scan the playlists again
        #[arg(long)]
        refresh: bool,
        /// Print the raw Spotify genre counts instead of mapped genres
        #[arg(long)]
        raw: bool,
        /// How many top raw genres are mapped
        #[arg(long)]
        top: Option<usize>,
        /// Requests in flight while scanning (1 = sequential)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Access token to use instead of the cached sign-in
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the cached token and genres
    SignOut {},
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Authorize {} => authorize().await,
        Commands::Genres {
            refresh,
            raw,
            top,
            concurrency,
            token,
        } => genres(refresh, raw, top, concurrency, token).await,
        Commands::SignOut {} => {
            radar::sign_out(&GenreCache::try_default(), SpotifyAuth::token_cache_path()).await
        }
    }
}

async fn authorize() -> Result<()> {
    info!("Authorizing Spotify client ...");
    // CLI prompt is shown here
    let mut auth = SpotifyAuth::try_default()?;
    let user = auth.authorize_client().await?;
    // Genres cached for a previous account must not carry over
    GenreCache::try_default().clear().await?;
    println!("Signed in as {user}");
    Ok(())
}

async fn access_token(explicit: Option<String>) -> Result<String> {
    if let Some(token) = explicit.or_else(|| std::env::var(ENV_ACCESS_TOKEN).ok()) {
        return Ok(token);
    }
    SpotifyAuth::try_default()?.access_token().await
}

async fn genres(
    refresh: bool,
    raw: bool,
    top: Option<usize>,
    concurrency: Option<usize>,
    token: Option<String>,
) -> Result<()> {
    info!("Building config ...");
    let mut builder = ConfigBuilder::from_env()?;
    if let Some(top) = top {
        builder = builder.top_genres(top);
    }
    if let Some(concurrency) = concurrency {
        builder = builder.concurrency(concurrency);
    }
    let radar = Radar::new(builder.build().await?);
    let token = access_token(token).await?;
    if token.trim().is_empty() {
        return Err(Error::Authorization("Empty Spotify access token".into()));
    }

    if raw {
        let report = radar.raw_genres(&token).await?;
        for genre in &report.genres {
            println!("{:>5}  {}", genre.count, genre.name);
        }
        report_skipped(&report);
        return Ok(());
    }

    let session = radar.genres(&token, refresh).await?;
    if session.genres.is_empty() {
        println!("No concert genres found in your playlists");
    }
    for genre in &session.genres {
        println!("{}  {}", genre.id, genre.name);
    }
    if let GenreSource::Compiled(report) = &session.source {
        report_skipped(report);
    }
    Ok(())
}

fn report_skipped(report: &GenreReport) {
    for skipped in &report.skipped {
        match skipped {
            Skipped::TrackPage {
                playlist_id,
                offset,
                reason,
            } => eprintln!("Tracks of playlist {playlist_id} from offset {offset} are missing: {reason}"),
            Skipped::ArtistBatch {
                index,
                size,
                reason,
            } => eprintln!("Artist batch {index} ({size} artists) is missing: {reason}"),
        }
    }
}
