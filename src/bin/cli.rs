//! flashblob CLI
//!
//! Inspect and modify a flash image file from the command line.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use flashblob::{BlobStore, Config, FileFlash, Record, Result, SensorReading, SensorType};
use tracing_subscriber::{fmt, EnvFilter};

/// flashblob CLI
#[derive(Parser, Debug)]
#[command(name = "flashblob-cli")]
#[command(about = "Blob storage on a flash image file")]
#[command(
    long_about = "Blob storage on a flash image file.\n\n\
                  Every command mounts the image first. A mount counts as one boot, \
                  increments the stored boot counter and rewrites sector 0, so \
                  read-only commands such as `get` or `info` also wear the superblock sector."
)]
#[command(version)]
struct Args {
    /// Flash image file (created erased if missing)
    #[arg(short, long, default_value = "./flash.img")]
    image: PathBuf,

    /// Number of sectors in the image
    #[arg(short, long, default_value = "256")]
    sectors: u32,

    /// Sector size in bytes
    #[arg(long, default_value = "4096")]
    sector_size: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mount the image, formatting it if needed
    Init {
        /// Format even if a valid store exists
        #[arg(long)]
        format: bool,
    },

    /// Store a record
    Store {
        /// Record type id
        #[arg(short = 't', long = "type")]
        type_id: u32,

        /// Payload (stored as UTF-8 bytes)
        data: String,
    },

    /// Store a sensor reading
    Reading {
        /// temperature, humidity, pressure, acceleration or custom
        #[arg(long, default_value = "custom")]
        sensor: String,

        /// Sensor id
        #[arg(long, default_value = "0")]
        id: u32,

        /// Label (at most 15 bytes)
        #[arg(long, default_value = "")]
        label: String,

        /// Up to four values
        values: Vec<f32>,
    },

    /// Print one record
    Get {
        index: u32,
    },

    /// Delete one record
    Delete {
        index: u32,
    },

    /// Delete records start..=end
    DeleteRange {
        start: u32,
        end: u32,
    },

    /// Reclaim deleted and invalid records
    Compact,

    /// Scan, compact if needed, and verify
    Repair,

    /// Sector usage
    Info,

    /// Per-type record summary
    Summary,

    /// Print the newest records
    Dump {
        #[arg(short, long, default_value = "10")]
        max: u32,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flashblob=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("flashblob CLI v{}", flashblob::VERSION);
    tracing::info!("Image: {}", args.image.display());

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let device = FileFlash::open(&args.image, args.sector_size, args.sectors)?;
    let config = Config::builder()
        .sector_size(args.sector_size)
        .sector_count(args.sectors)
        .build();

    let mut store = BlobStore::new(device, config)?;
    let format = matches!(args.command, Commands::Init { format: true });
    // Mounting is a boot even for read-only commands
    store.init(format)?;

    match args.command {
        Commands::Init { .. } => {
            println!("boot count: {}", store.boot_count());
            println!("records:    {}", store.count());
            println!("max blob:   {} bytes", store.max_blob_size());
        }
        Commands::Store { type_id, data } => {
            store.store(type_id, data.as_bytes())?;
            store.flush()?;
            println!("stored as record {}", store.count() - 1);
        }
        Commands::Reading {
            sensor,
            id,
            label,
            values,
        } => {
            let sensor = parse_sensor(&sensor)?;
            let mut reading = SensorReading::new(id, 0, label);
            reading.values = values;
            store.store_reading(&reading, sensor)?;
            store.flush()?;
            println!("stored as record {}", store.count() - 1);
        }
        Commands::Get { index } => {
            let record = store.get(index)?;
            print_record(&record);
        }
        Commands::Delete { index } => {
            store.delete(index)?;
            println!("deleted record {}", index);
        }
        Commands::DeleteRange { start, end } => {
            store.delete_range(start, end)?;
            println!("deleted records {}..={}", start, end);
        }
        Commands::Compact => {
            let report = store.compact()?;
            println!(
                "retained {}, discarded {} ({} bytes)",
                report.retained, report.discarded, report.bytes_retained
            );
        }
        Commands::Repair => {
            let report = store.repair()?;
            println!(
                "valid {}, crc mismatches {}, invalid {}",
                report.before.valid,
                report.before.crc_mismatches,
                report.before.invalid()
            );
            if let Some(c) = report.compaction {
                println!("compacted: retained {}, discarded {}", c.retained, c.discarded);
            }
            println!("verified {}/{}", report.verified, report.sampled);
        }
        Commands::Info => {
            let info = store.info();
            println!("total sectors: {}", info.total_sectors);
            println!("used sectors:  {}", info.used_sectors);
            println!("free sectors:  {}", info.free_sectors);
        }
        Commands::Summary => {
            let summary = store.summary()?;
            println!("boot count:    {}", summary.boot_count);
            println!("total records: {}", summary.total_records);
            println!("live records:  {}", summary.live_records);
            for (type_id, t) in &summary.by_type {
                println!(
                    "  type {:>3}: {} records, {}..{}",
                    type_id, t.count, t.earliest, t.latest
                );
            }
            if let Some((lo, hi)) = summary.time_range() {
                println!("time range:    {}..{}", lo, hi);
            }
        }
        Commands::Dump { max } => {
            for (index, outcome) in store.recent(max)? {
                match outcome {
                    Ok(record) => print_record(&record),
                    Err(e) => println!("#{:<5} {}", index, e),
                }
            }
        }
    }

    store.close()?;
    Ok(())
}

fn parse_sensor(name: &str) -> Result<SensorType> {
    let sensor = match name {
        "temperature" => SensorType::Temperature,
        "humidity" => SensorType::Humidity,
        "pressure" => SensorType::Pressure,
        "acceleration" => SensorType::Acceleration,
        "custom" => SensorType::Custom,
        other => {
            return Err(flashblob::FlashBlobError::Config(format!(
                "unknown sensor type '{}'",
                other
            )))
        }
    };
    Ok(sensor)
}

fn print_record(record: &Record) {
    let integrity = if record.is_intact() { "ok" } else { "CRC MISMATCH" };
    print!(
        "#{:<5} type {:>3} t={:<10} {:>4} bytes [{}] ",
        record.index,
        record.type_id,
        record.timestamp,
        record.len(),
        integrity
    );

    let sensor = SensorType::from_type_id(record.type_id);
    match sensor.and_then(|_| SensorReading::from_bytes(&record.payload).ok()) {
        Some(reading) => println!(
            "sensor {} '{}' {:?}",
            reading.sensor_id, reading.label, reading.values
        ),
        None => println!("{}", String::from_utf8_lossy(&record.payload)),
    }
}
