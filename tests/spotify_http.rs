use band_radar::clients::{
    GenreCache, SpotifyApi, SpotifyClient,
    entities::MappedGenre,
    errors::Error,
};
use band_radar::genres::{GenreExtractor, GenreExtractorConfig, Skipped};
use band_radar::radar::{ConfigBuilder, GenreSource, Radar};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

const TOKEN: &str = "test-token";

fn client(server: &MockServer) -> SpotifyClient {
    SpotifyClient::new(reqwest::Client::new(), server.uri())
}

fn track(artist_ids: &[&str]) -> Value {
    json!({ "track": { "artists": artist_ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>() } })
}

fn tracks_page(count: usize, artist: &str, next: bool) -> Value {
    json!({
        "items": vec![track(&[artist]); count],
        "next": if next { json!("https://api.spotify.com/next") } else { Value::Null },
    })
}

// Answers an artist lookup with one "rock" artist per requested id
struct EchoArtists;

impl Respond for EchoArtists {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let ids = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "ids")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        let artists: Vec<Value> = ids
            .split(',')
            .map(|id| json!({ "id": id, "genres": ["rock"] }))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "artists": artists }))
    }
}

#[tokio::test]
async fn playlists_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "0"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "p1", "name": "Road trip" }, null, { "id": "p2" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = GenreExtractor::new(client(&server), GenreExtractorConfig::default());
    let playlists = extractor.playlists(TOKEN).await.unwrap();
    let ids: Vec<_> = playlists.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
}

#[tokio::test]
async fn track_pages_use_sparse_fields_and_stop_on_short_page() {
    let server = MockServer::start().await;
    let fields = "items(track(artists(id))),next";
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "100"))
        .and(query_param("fields", fields))
        .respond_with(ResponseTemplate::new(200).set_body_json(tracks_page(100, "a1", true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .and(query_param("offset", "100"))
        .and(query_param("fields", fields))
        .respond_with(ResponseTemplate::new(200).set_body_json(tracks_page(7, "a2", true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .and(query_param("offset", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tracks_page(1, "a3", false)))
        .expect(0)
        .mount(&server)
        .await;

    let extractor = GenreExtractor::new(client(&server), GenreExtractorConfig::default());
    let collection = extractor.playlist_tracks(TOKEN, "p1").await.unwrap();
    assert_eq!(collection.tracks.len(), 107);
    assert!(collection.skipped.is_none());
}

#[tokio::test]
async fn error_status_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/artists"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client(&server)
        .artists(TOKEN, &["a1".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Status { status: 429, .. }));
}

#[tokio::test]
async fn failing_artist_batch_is_skipped() {
    let server = MockServer::start().await;
    let ids: Vec<String> = (0..120).map(|i| format!("a{i}")).collect();

    Mock::given(method("GET"))
        .and(path("/v1/artists"))
        .and(query_param("ids", ids[50..100].join(",")))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/artists"))
        .respond_with(EchoArtists)
        .expect(2)
        .mount(&server)
        .await;

    let extractor = GenreExtractor::new(client(&server), GenreExtractorConfig::default());
    let fetch = extractor.artist_details(TOKEN, &ids).await;

    assert_eq!(fetch.artists.len(), 70);
    assert_eq!(fetch.artists[0].id, "a0");
    assert_eq!(fetch.artists[50].id, "a100");
    assert!(matches!(
        fetch.skipped.as_slice(),
        [Skipped::ArtistBatch {
            index: 1,
            size: 50,
            ..
        }]
    ));
}

#[tokio::test]
async fn playlist_failure_aborts_extraction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(path("/v1/artists"))
        .respond_with(EchoArtists)
        .expect(0)
        .mount(&server)
        .await;

    let extractor = GenreExtractor::new(client(&server), GenreExtractorConfig::default());
    let err = extractor.extract(TOKEN).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to extract genres:"));
}

#[tokio::test]
async fn radar_maps_caches_and_reuses_genres() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "alice" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [{ "id": "p1" }] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [track(&["x", "y"]), { "track": null }, track(&["y"])],
            "next": null,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/artists"))
        .and(query_param("ids", "x,y"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": [
                { "id": "x", "genres": ["indie rock", "shoegaze"] },
                { "id": "y", "genres": ["rock", "polka"] },
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache_path =
        std::env::temp_dir().join(format!("band_radar_it_{}.json", std::process::id()));
    let cache = GenreCache::new(cache_path);
    cache.clear().await.unwrap();

    let config = ConfigBuilder::new()
        .api_base_url(server.uri())
        .cache(cache.clone())
        .build()
        .await
        .unwrap();
    let radar = Radar::new(config);

    let expected = vec![
        MappedGenre {
            id: "KnvZfZ7vAvv".into(),
            name: "Alternative".into(),
        },
        MappedGenre {
            id: "KnvZfZ7vAeA".into(),
            name: "Rock".into(),
        },
    ];

    let first = radar.genres(TOKEN, false).await.unwrap();
    assert_eq!(first.genres, expected);
    match &first.source {
        GenreSource::Compiled(report) => {
            assert_eq!(report.genres.len(), 4);
            assert!(!report.is_partial());
        }
        GenreSource::Cache => panic!("first run must compile genres"),
    }

    let second = radar.genres(TOKEN, false).await.unwrap();
    assert_eq!(second.genres, expected);
    assert!(matches!(second.source, GenreSource::Cache));

    cache.clear().await.unwrap();
}

// One playlist whose artists tally to indie rock, shoegaze, rock, polka
async fn mount_library(server: &MockServer, user_id: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": user_id })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [{ "id": "p1" }] })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [track(&["x", "y"])],
            "next": null,
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/artists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": [
                { "id": "x", "genres": ["indie rock", "shoegaze"] },
                { "id": "y", "genres": ["rock", "polka"] },
            ]
        })))
        .mount(server)
        .await;
}

async fn radar_for(server: &MockServer, cache: &GenreCache, top_genres: usize) -> Radar {
    let config = ConfigBuilder::new()
        .api_base_url(server.uri())
        .cache(cache.clone())
        .top_genres(top_genres)
        .build()
        .await
        .unwrap();
    Radar::new(config)
}

#[tokio::test]
async fn cached_genres_are_not_reused_across_settings_or_users() {
    let alice = MockServer::start().await;
    mount_library(&alice, "alice").await;
    let bob = MockServer::start().await;
    mount_library(&bob, "bob").await;

    let cache_path =
        std::env::temp_dir().join(format!("band_radar_it_keyed_{}.json", std::process::id()));
    let cache = GenreCache::new(cache_path);
    cache.clear().await.unwrap();

    let full = radar_for(&alice, &cache, 10).await.genres(TOKEN, false).await.unwrap();
    assert!(matches!(full.source, GenreSource::Compiled(_)));
    assert_eq!(full.genres.len(), 2);

    // Same cache, smaller top_genres: the top-10 result must not leak through
    let narrow = radar_for(&alice, &cache, 1).await;
    let first = narrow.genres(TOKEN, false).await.unwrap();
    assert!(matches!(first.source, GenreSource::Compiled(_)));
    assert_eq!(
        first.genres,
        vec![MappedGenre {
            id: "KnvZfZ7vAvv".into(),
            name: "Alternative".into(),
        }]
    );
    let again = narrow.genres(TOKEN, false).await.unwrap();
    assert!(matches!(again.source, GenreSource::Cache));
    assert_eq!(again.genres, first.genres);

    // Another account with identical settings compiles its own genres
    let other = radar_for(&bob, &cache, 1).await.genres(TOKEN, false).await.unwrap();
    assert!(matches!(other.source, GenreSource::Compiled(_)));

    cache.clear().await.unwrap();
}
