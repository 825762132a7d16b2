// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use log::{error, info};
use mind2web_dataset::{
    DatasetStore, Error, LocalStore, Settings, SAMPLE_FIELDS,
    mind2web::{ConvertOptions, Progress, ReadOptions, RecordReader, SEQUENCES_VIEW, create_dataset},
    write_arrow,
};
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::mpsc,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file, defaults to config.toml in the user configuration
    /// directory
    #[clap(long, env = "MIND2WEB_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the converted datasets
    #[clap(long)]
    datasets_dir: Option<PathBuf>,

    /// Converter Command
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Convert Mind2Web records into a dataset.  The input is a JSON Lines
    /// file, a Parquet shard or a directory of either.
    Convert {
        /// Input file or directory
        input: PathBuf,

        /// Dataset name
        #[clap(long, default_value = "mind2web")]
        name: String,

        /// Directory the screenshots are written to, defaults to the
        /// screenshots folder of the dataset
        #[clap(long)]
        screenshots: Option<PathBuf>,

        /// Fail instead of replacing an existing dataset with the same name
        #[clap(long)]
        no_overwrite: bool,

        /// Only convert the first N records
        #[clap(long)]
        limit: Option<usize>,

        /// JPEG quality of the written screenshots (1-100)
        #[clap(long)]
        quality: Option<u8>,
    },
    /// List the converted datasets.
    Datasets,
    /// Show the details of a dataset.
    Info {
        /// Dataset name
        name: String,
    },
    /// Print the trajectories of a dataset in step order.
    Sequences {
        /// Dataset name
        name: String,

        /// Saved view to evaluate
        #[clap(long, default_value = SEQUENCES_VIEW)]
        view: String,
    },
    /// Export the samples of a dataset.  The format follows the output
    /// extension: .json for the samples as JSON or .arrow for a flat Arrow
    /// table with one row per detection.
    Export {
        /// Dataset name
        name: String,

        /// Output file
        output: PathBuf,
    },
    /// Delete a dataset and everything stored in its directory.
    Delete {
        /// Dataset name
        name: String,
    },
}

fn handle_convert(
    store: &LocalStore,
    settings: &Settings,
    input: PathBuf,
    name: String,
    limit: Option<usize>,
) -> Result<(), Error> {
    use indicatif::{ProgressBar, ProgressStyle};

    let reader = RecordReader::with_options(ReadOptions {
        max_records: limit.unwrap_or(0),
    });
    let records = reader.read(&input)?;
    info!("Converting {} into dataset {}", input.display(), name);

    let options = ConvertOptions {
        overwrite: settings.overwrite,
        jpeg_quality: settings.jpeg_quality,
        ..Default::default()
    };
    let screenshots = settings.screenshots_dir_for(&name);

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise} ETA: {eta}] {msg}: {wide_bar:.yellow} {human_pos}/{human_len}",
        )
        .map_err(|e| Error::InvalidParameters(e.to_string()))?
        .progress_chars("█▇▆▅▄▃▂▁  "),
    );
    bar.set_message("Converting");

    let (tx, rx) = mpsc::channel::<Progress>();
    let drain = {
        let bar = bar.clone();
        std::thread::spawn(move || {
            for progress in rx {
                let length = match progress.total {
                    0 => progress.current,
                    total => total,
                };
                bar.set_length(length as u64);
                bar.set_position(progress.current as u64);
            }
        })
    };

    let result = create_dataset(store, records, &name, &screenshots, &options, Some(tx));
    let _ = drain.join();
    bar.finish_and_clear();

    let dataset = result?;
    let view = dataset.load_saved_view(&options.view_name)?;
    println!(
        "Created dataset {} with {} samples in {} sequences",
        dataset.name(),
        dataset.len(),
        view.groups(&dataset).len()
    );
    info!("Screenshots written to {}", screenshots.display());
    Ok(())
}

fn handle_datasets(store: &LocalStore) -> Result<(), Error> {
    for name in store.list()? {
        println!("{}", name);
    }
    Ok(())
}

fn handle_info(store: &LocalStore, name: String) -> Result<(), Error> {
    let dataset = store.load(&name)?;
    println!("Name:          {}", dataset.name());
    println!("Samples:       {}", dataset.len());
    println!("Created:       {}", dataset.created_at().to_rfc3339());
    println!("Last modified: {}", dataset.last_modified_at().to_rfc3339());
    println!("Persistent:    {}", dataset.persistent());
    println!("Saved views:   {}", dataset.list_saved_views().join(", "));

    let dynamic: Vec<&str> = dataset.dynamic_fields().iter().map(String::as_str).collect();
    println!("Fields:        {}", SAMPLE_FIELDS.join(", "));
    if !dynamic.is_empty() {
        println!("Dynamic:       {}", dynamic.join(", "));
    }
    Ok(())
}

fn handle_sequences(store: &LocalStore, name: String, view: String) -> Result<(), Error> {
    let dataset = store.load(&name)?;
    let view = dataset.load_saved_view(&view)?;

    for group in view.groups(&dataset) {
        println!("{} ({} steps)", group.key_str(), group.len());
        for sample in &group.samples {
            println!(
                "    {}: {}",
                sample.target_action_index, sample.current_action
            );
        }
    }
    Ok(())
}

fn handle_export(store: &LocalStore, name: String, output: PathBuf) -> Result<(), Error> {
    let dataset = store.load(&name)?;

    let extension = output
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("json") => {
            create_parent(&output)?;
            let writer = BufWriter::new(File::create(&output)?);
            serde_json::to_writer_pretty(writer, dataset.samples())?;
            println!("Exported {} samples to {}", dataset.len(), output.display());
        }
        Some("arrow") => {
            let rows = write_arrow(&dataset, &output)?;
            println!("Exported {} rows to {}", rows, output.display());
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!(
                "{} (expected .json or .arrow)",
                output.display()
            )));
        }
    }
    Ok(())
}

fn handle_delete(store: &LocalStore, name: String) -> Result<(), Error> {
    store.delete(&name)?;
    println!("Deleted dataset {}", name);
    Ok(())
}

fn create_parent(path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn run(args: Args) -> Result<(), Error> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(datasets_dir) = args.datasets_dir {
        settings.datasets_dir = datasets_dir;
    }

    let store = LocalStore::new(&settings.datasets_dir);

    match args.cmd {
        Command::Convert {
            input,
            name,
            screenshots,
            no_overwrite,
            limit,
            quality,
        } => {
            if screenshots.is_some() {
                settings.screenshots_dir = screenshots;
            }
            if no_overwrite {
                settings.overwrite = false;
            }
            if let Some(quality) = quality {
                settings.jpeg_quality = quality;
            }
            settings.validate()?;
            handle_convert(&store, &settings, input, name, limit)
        }
        Command::Datasets => handle_datasets(&store),
        Command::Info { name } => handle_info(&store, name),
        Command::Sequences { name, view } => handle_sequences(&store, name, view),
        Command::Export { name, output } => handle_export(&store, name, output),
        Command::Delete { name } => handle_delete(&store, name),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    #[cfg(feature = "profiling")]
    {
        use tracing_subscriber::{EnvFilter, fmt, fmt::format::FmtSpan};
        // Fails to bridge `log` once env_logger owns it; spans still install
        let _ = fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .try_init();
    }

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
