use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tunegrab::config::{DEFAULT_CLIENT_ID, DEFAULT_CLIENT_SECRET, SEARCH_LIMIT};
use tunegrab::core::{MediaCandidate, ProgressEvent};
use tunegrab::{Config, Credentials, DownloadOutcome, PlaylistResolution, SearchResponse, TuneGrab};

#[derive(Parser)]
#[command(
    name = "tunegrab",
    about = "Search, download and tag music",
    long_about = "Resolve Spotify track and playlist links or plain search text to YouTube videos,\n\
    download the audio as MP3 and tag it with Spotify metadata.\n\n\
    Examples:\n\
      tunegrab search \"daft punk one more time\"                        # List candidates\n\
      tunegrab download https://open.spotify.com/track/<id> -d ./music  # Download and tag\n\
      tunegrab download https://open.spotify.com/playlist/<id>          # Whole playlist\n\
      tunegrab metadata Strobe deadmau5                                 # Audio features as JSON"
)]
struct Args {
    /// Spotify client id
    #[arg(long, env = "TUNEGRAB_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    client_id: String,

    /// Spotify client secret
    #[arg(long, env = "TUNEGRAB_CLIENT_SECRET", default_value = DEFAULT_CLIENT_SECRET, hide_default_value = true)]
    client_secret: String,

    /// ffmpeg executable
    #[arg(long, env = "TUNEGRAB_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// yt-dlp executable
    #[arg(long, env = "TUNEGRAB_YT_DLP")]
    yt_dlp: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search YouTube, or list the tracks of a playlist link
    Search {
        query: String,

        /// Number of results
        #[arg(short = 'n', long, default_value_t = SEARCH_LIMIT)]
        limit: usize,
    },
    /// Download the best match of a query or track link, or every track of a playlist link
    Download {
        query: String,

        /// Destination directory, created if missing
        #[arg(short = 'd', long = "dir", default_value = ".")]
        dir: PathBuf,
    },
    /// Print the audio features of a track
    Metadata { name: String, artist: String },
}

fn print_candidates(videos: &[MediaCandidate]) {
    if videos.is_empty() {
        println!("No results.");
        return;
    }
    for (index, video) in videos.iter().enumerate() {
        println!("[{}] {}", index + 1, video.title);
        println!("    Channel: {}", video.channel);
        println!("    Duration: {}", video.duration);
        println!("    URL: {}", video.url);
    }
}

fn print_playlist(playlist: &PlaylistResolution) {
    println!(
        "Playlist: {} ({} tracks)",
        playlist.playlist_name, playlist.total_tracks
    );
    for (index, track) in playlist.tracks.iter().enumerate() {
        println!("[{}] {} - {}", index + 1, track.artists, track.name);
    }
}

fn progress_printer() -> (
    mpsc::UnboundedSender<ProgressEvent>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::Download(p) => {
                    println!("  {:>3}% {} / {}", p.percent, p.downloaded, p.total)
                }
                ProgressEvent::Playlist(p) => println!(
                    "[{}/{}] {} - {} ({}%)",
                    p.current, p.total, p.artist, p.track_name, p.percent
                ),
            }
        }
    });
    (tx, printer)
}

async fn download(grab: &TuneGrab, query: &str, dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create {}", dir.display()))?;
    let (tx, printer) = progress_printer();

    match grab.resolve_query(query).await? {
        SearchResponse::Videos { videos, track, .. } => {
            let Some(best) = videos.first() else {
                bail!("no results for '{}'", query);
            };
            println!("Downloading: {} ({})", best.title, best.url);
            let outcome = grab.download_track(best, dir, track.as_ref(), Some(&tx)).await;
            drop(tx);
            let _ = printer.await;
            match outcome {
                DownloadOutcome::Saved { file_path, .. } => {
                    println!("✓ Saved to: {}", file_path.display())
                }
                DownloadOutcome::Failed { error } => bail!("download failed: {}", error),
            }
        }
        SearchResponse::Playlist(playlist) => {
            print_playlist(&playlist);
            let result = grab.download_playlist(&playlist, dir, Some(&tx)).await?;
            drop(tx);
            let _ = printer.await;
            println!();
            println!(
                "{}: {} downloaded, {} failed of {}",
                result.playlist_name, result.downloaded, result.failed, result.total_tracks
            );
            for error in &result.errors {
                println!("✗ {}", error);
            }
        }
        SearchResponse::ManualPlaylist {
            playlist_id, error, ..
        } => bail!("could not read playlist {}: {}", playlist_id, error),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunegrab=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let search_limit = match &args.command {
        Command::Search { limit, .. } => *limit,
        _ => SEARCH_LIMIT,
    };
    let config = Config {
        credentials: Credentials {
            client_id: args.client_id,
            client_secret: args.client_secret,
        },
        ffmpeg_path: args.ffmpeg,
        yt_dlp_path: args.yt_dlp,
        search_limit,
        ..Config::default()
    };

    let grab = TuneGrab::new(config);
    if grab.init().await {
        info!("Spotify API available");
    }

    match args.command {
        Command::Search { query, .. } => match grab.resolve_query(&query).await? {
            SearchResponse::Videos {
                search_query,
                videos,
                is_from_spotify,
                ..
            } => {
                if is_from_spotify {
                    println!("Searching for: {}", search_query);
                }
                print_candidates(&videos);
            }
            SearchResponse::Playlist(playlist) => print_playlist(&playlist),
            SearchResponse::ManualPlaylist {
                playlist_id, error, ..
            } => bail!("could not read playlist {}: {}", playlist_id, error),
        },
        Command::Download { query, dir } => download(&grab, &query, &dir).await?,
        Command::Metadata { name, artist } => match grab.track_metadata(&name, &artist).await {
            Some(features) => println!("{}", serde_json::to_string_pretty(&features)?),
            None => bail!("no metadata for {} - {}", artist, name),
        },
    }
    Ok(())
}
