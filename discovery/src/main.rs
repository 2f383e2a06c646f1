use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use video_discovery::config::{init_logger, load_environment};
use video_discovery::utils::{format_duration, format_iso8601_date, format_view_count};
use video_discovery::{DiscoveryConfig, VideoQueryService, VideoSummary};

#[derive(Parser)]
#[command(name = "discover", about = "Browse YouTube videos from the terminal")]
struct Cli {
    /// Print the raw records as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Top rated videos from a random category
    Random,
    /// Videos related to the given video id
    Related { video_id: String },
    /// Videos for a category ("All" picks one at random)
    Category { name: String },
    /// Videos of a public playlist
    Playlist { playlist_id: String },
    /// List the configured categories
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_environment();
    init_logger();

    let cli = Cli::parse();
    let config = DiscoveryConfig::from_env()?;
    let service = VideoQueryService::from_config(&config)?;

    let videos = match cli.command {
        Command::Categories => {
            for category in service.categories() {
                println!("{category}");
            }
            return Ok(());
        }
        Command::Random => service.get_random_videos().await?,
        Command::Related { video_id } => service.get_related_videos(&video_id).await,
        Command::Category { name } => service.get_category_videos(&name).await?,
        Command::Playlist { playlist_id } => service.get_playlist_videos(&playlist_id).await?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&videos)?);
    } else {
        for video in &videos {
            println!("{}", format_line(video));
        }
    }

    info!("Listed {} videos.", videos.len());
    Ok(())
}

fn format_line(video: &VideoSummary) -> String {
    let duration = video
        .duration
        .as_deref()
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{}  {:>8}  {:>6} views  {}  {} - {}",
        video.id,
        duration,
        format_view_count(&video.view_count),
        format_iso8601_date(&video.published_at),
        video.channel_title,
        video.title,
    )
}
