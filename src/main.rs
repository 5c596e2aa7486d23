use std::{path::PathBuf, time::Duration};

use chrono::{NaiveDate, NaiveTime};

use clap::Parser;

use tracing::{error, info, warn};

mod embed;
mod entry;
mod error;
mod locator;
mod queue;
mod request;
mod upload;

use crate::{
    entry::{parse_date, parse_time, Schedule},
    error::Error,
    queue::{QueueProcessor, RetryPolicy},
    upload::{MixcloudClient, DEFAULT_ENDPOINT},
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Name of the batch directory holding one folder per artist
    target: String,
    /// Airing date label used in show titles, e.g. "5th August 2021"
    #[arg(long)]
    airdate: String,
    /// Publish date, YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    publish_date: NaiveDate,
    /// Publish time in UTC, HH:MM:SS
    #[arg(long, value_parser = parse_time)]
    publish_time: NaiveTime,
    /// Mixcloud API access token, required unless --dry-run
    #[arg(long, env = "MIXCLOUD_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
    /// Upload endpoint
    #[arg(long, env = "MIXCLOUD_UPLOAD_URL", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    /// Directory searched for the target batch
    #[arg(long, env = "SHOW_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,
    /// Artist folders to leave out (comma separated in the environment)
    #[arg(long, env = "FOLDER_SKIP", value_delimiter = ',')]
    skip: Vec<String>,
    /// Network timeout per upload, in seconds
    #[arg(long, default_value_t = 180)]
    timeout: u64,
    /// Submissions per show before giving up on rate limits, 0 for no limit
    #[arg(long, default_value_t = 20)]
    max_attempts: u32,
    /// Seconds added to the server's retry delay
    #[arg(long, default_value_t = 0)]
    retry_padding: u64,
    /// Write an embed snippet per uploaded show to this file
    #[arg(long)]
    embed_out: Option<PathBuf>,
    /// Scan and build requests without uploading
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{e}");
        std::process::exit(1);
    }
}

fn retry_policy(args: &Args) -> RetryPolicy {
    RetryPolicy {
        padding: Duration::from_secs(args.retry_padding),
        max_attempts: (args.max_attempts > 0).then_some(args.max_attempts),
        ..RetryPolicy::default()
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let access_token = match (&args.access_token, args.dry_run) {
        (Some(token), _) => Some(token.clone()),
        (None, true) => None,
        (None, false) => return Err(Error::MissingAccessToken),
    };
    let policy = retry_policy(&args);
    let schedule = Schedule {
        airdate: args.airdate,
        publish_date: args.publish_date,
        publish_time: args.publish_time,
    };
    let skip: Vec<String> = args
        .skip
        .iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect();

    let entries = queue::scan(&args.work_dir, &args.target, &skip, &schedule).await?;

    if args.dry_run {
        for entry in &entries {
            match request::build_request(entry).await {
                Some(payload) => info!(
                    audio = %payload.audio.display(),
                    image = %payload.image.display(),
                    publish_date = %payload.publish_date,
                    "Would upload {}",
                    payload.name
                ),
                None => warn!("Would skip {}", entry.artist),
            }
        }
        return Ok(());
    }

    let client = MixcloudClient::new(
        args.endpoint,
        access_token.unwrap_or_default(),
        Duration::from_secs(args.timeout),
    )?;
    let report = QueueProcessor::new(client, policy, entries).run().await;

    for dropped in &report.dropped {
        warn!("Not uploaded {}: {}", dropped.artist, dropped.reason);
    }
    info!(
        "{} shows uploaded, {} dropped",
        report.uploaded.len(),
        report.dropped.len()
    );

    if let Some(path) = args.embed_out {
        embed::write_embeds(&path, &report.uploaded).await?;
        info!("Embed snippets written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_with(date: &str, time: &str, extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec![
            "show_uploader",
            "SHOW 2",
            "--airdate",
            "5th August 2021",
            "--publish-date",
            date,
            "--publish-time",
            time,
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    fn parse(date: &str, time: &str) -> Result<Args, clap::Error> {
        parse_with(date, time, &["--access-token", "secret"])
    }

    #[test]
    fn accepts_well_formed_schedule() {
        let args = parse("2021-08-23", "00:00:00").unwrap();
        assert_eq!(args.target, "SHOW 2");
        assert_eq!(args.publish_date, parse_date("2021-08-23").unwrap());
        assert_eq!(args.timeout, 180);
        assert_eq!(args.max_attempts, 20);
    }

    #[test]
    fn rejects_malformed_schedule_up_front() {
        assert!(parse("23-08-2021", "00:00:00").is_err());
        assert!(parse("2021-08-23", "midnight").is_err());
    }

    #[test]
    fn zero_max_attempts_is_unbounded() {
        let args = parse_with(
            "2021-08-23",
            "00:00:00",
            &["--access-token", "secret", "--max-attempts", "0"],
        )
        .unwrap();
        assert_eq!(retry_policy(&args).max_attempts, None);

        let args = parse("2021-08-23", "00:00:00").unwrap();
        assert_eq!(retry_policy(&args).max_attempts, Some(20));
    }

    #[tokio::test]
    async fn dry_run_needs_no_token() {
        let work = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(work.path().join("SHOW 2").join("DJ Elephant")).unwrap();
        let work_dir = work.path().to_str().unwrap();

        let args = parse_with(
            "2021-08-23",
            "00:00:00",
            &["--dry-run", "--work-dir", work_dir],
        )
        .unwrap();
        assert!(run(args).await.is_ok());
    }

    #[tokio::test]
    async fn upload_without_token_fails_before_scanning() {
        let work = tempfile::tempdir().unwrap();
        let work_dir = work.path().to_str().unwrap();

        // no SHOW 2 under work_dir: reaching the scan would report TargetNotFound
        let args = parse_with("2021-08-23", "00:00:00", &["--work-dir", work_dir]).unwrap();
        assert!(matches!(run(args).await, Err(Error::MissingAccessToken)));
    }
}
