//! Upload CLI
//!
//! Uploads files through the coordinator into a local directory-backed
//! object store, printing per-task progress.

use clap::{value_parser, Arg, ArgAction, Command};
use oss_upload::{
    ClientConfig, DispatchMode, LocalFsConnector, ProgressEventBus, StorageClient,
    UploadCoordinator, UploadOptions,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("oss-upload")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Upload files into a local object store with progress")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("chunk-size")
                .long("chunk-size")
                .help("Bytes written per progress step")
                .value_parser(value_parser!(usize))
                .default_value("65536"),
        )
        .arg(
            Arg::new("delay-ms")
                .long("delay-ms")
                .help("Pause after each chunk, in milliseconds")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("cancel-after")
                .long("cancel-after")
                .help("Cancel each upload once it has sent this many bytes")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("root")
                .help("Directory holding the object store")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(Arg::new("bucket").help("Destination bucket").required(true))
        .arg(
            Arg::new("files")
                .help("Files to upload")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
        .get_matches();

    let level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let root = matches
        .get_one::<PathBuf>("root")
        .ok_or("missing root")?;
    let bucket = matches
        .get_one::<String>("bucket")
        .ok_or("missing bucket")?;
    let files: Vec<PathBuf> = matches
        .get_many::<PathBuf>("files")
        .ok_or("missing files")?
        .cloned()
        .collect();
    let chunk_size = matches.get_one::<usize>("chunk-size").copied().unwrap_or(65536);
    let cancel_after = matches.get_one::<u64>("cancel-after").copied();

    std::fs::create_dir_all(root)?;
    let root = std::fs::canonicalize(root)?;
    let endpoint = url::Url::from_directory_path(&root)
        .map_err(|_| format!("cannot express {} as a file URL", root.display()))?;

    let mut connector = LocalFsConnector::new().chunk_size(chunk_size);
    if let Some(delay) = matches.get_one::<u64>("delay-ms") {
        connector = connector.chunk_delay(Duration::from_millis(*delay));
    }

    let client = StorageClient::new(connector);
    client.init(ClientConfig::new("local", "local", "", endpoint.as_str()))?;
    let bus = ProgressEventBus::new(DispatchMode::Queued.dispatcher()?);
    let coordinator = UploadCoordinator::new(client, bus);

    let mut uploads = Vec::new();
    for file in &files {
        let key = object_key(file)?;
        let canceller = coordinator.clone();
        let options = UploadOptions::new()
            .on_progress(move |current, total, task_id| {
                println!("[{}] {}/{} bytes", task_id, current, total);
                if cancel_after.is_some_and(|limit| current >= limit && current < total) {
                    canceller.cancel_upload(task_id);
                }
            })
            .on_cancel(|task_id| println!("[{}] cancelled", task_id))
            .on_failed(|task_id, error| println!("[{}] failed: {}", task_id, error));

        let path = file.to_str().ok_or("file path is not valid UTF-8")?;
        uploads.push(coordinator.start_upload(bucket, &key, path, options)?);
    }

    let mut failures = 0;
    for outcome in futures::future::join_all(uploads).await {
        match outcome {
            Ok(result) => println!("{} -> {}", result.upload_id, result.result),
            Err(e) => {
                failures += 1;
                eprintln!("{} ({})", e, e.code());
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} upload(s) did not complete", failures).into());
    }
    Ok(())
}

fn object_key(file: &Path) -> Result<String, Box<dyn std::error::Error>> {
    Ok(file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("cannot derive an object key from {}", file.display()))?
        .to_string())
}
