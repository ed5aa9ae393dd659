//! Desktop simulator for the roommon sensor history store.
//!
//! Stores the history in a host directory instead of on the SD card and
//! generates synthetic sensor data, so every store operation can be exercised
//! without hardware.
//!
//! Each invocation is one wake episode: the store is opened (cold, or warm
//! from the retained index written by the previous run with `--warm`), one
//! command runs, and the index scalars are retained again before "sleeping".
//!
//! ```text
//! roommon-simulator fill --count 5000 --interval 900
//! roommon-simulator query weekly temperature --offset 1
//! roommon-simulator --warm sample
//! ```

mod file_storage;

use std::convert::Infallible;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use roommon_core::query::clamp_offset;
use roommon_core::sampling::{EnvironmentSensor, Readings, record_sample};
use roommon_core::settings::Settings;
use roommon_core::storage::RetainedIndex;
use roommon_core::time::{TimeSyncPolicy, TimeZone, time_is_sane};
use roommon_core::{RecordStore, SensorRecord, SensorType, Series, StoreConfig, TimeWindow};

use file_storage::FileStorage;

/// Retention memory stand-in, next to the volume directory.
const RETAINED_FILE: &str = "retained.bin";

#[derive(Parser)]
#[command(name = "roommon-simulator")]
#[command(version, about = "Drive the sensor history store from the desktop")]
struct Cli {
    /// Directory standing in for the SD card volume
    #[arg(long, global = true, default_value = "sim-data")]
    data_dir: PathBuf,

    /// Resume from the index retained by the previous run instead of reading
    /// it from storage
    #[arg(long, global = true)]
    warm: bool,

    /// Override the clock (UTC epoch seconds)
    #[arg(long, global = true)]
    now: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append synthetic history ending at the current time
    Fill {
        /// Number of records
        #[arg(long, default_value_t = 2_000)]
        count: usize,

        /// Seconds between records
        #[arg(long, default_value_t = 900)]
        interval: i64,
    },

    /// Take one sample, as a background wake-up would
    Sample,

    /// Print the most recent record
    Latest,

    /// Print the record at an index
    Show { index: usize },

    /// Graph data for a span of history
    Query {
        #[arg(value_enum)]
        window: WindowArg,

        #[arg(value_enum)]
        sensor: SensorArg,

        /// Spans back from now (clamped to 0..=100)
        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// Output cap
        #[arg(long)]
        max_points: Option<usize>,
    },

    /// Delete the whole history
    Clear,

    /// Show or change persisted settings
    Settings {
        /// Turn daylight saving time on or off
        #[arg(long)]
        summer_time: Option<bool>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum WindowArg {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<WindowArg> for TimeWindow {
    fn from(arg: WindowArg) -> Self {
        match arg {
            WindowArg::Daily => TimeWindow::Daily,
            WindowArg::Weekly => TimeWindow::Weekly,
            WindowArg::Monthly => TimeWindow::Monthly,
            WindowArg::Yearly => TimeWindow::Yearly,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SensorArg {
    Temperature,
    Humidity,
    Pressure,
}

impl From<SensorArg> for SensorType {
    fn from(arg: SensorArg) -> Self {
        match arg {
            SensorArg::Temperature => SensorType::Temperature,
            SensorArg::Humidity => SensorType::Humidity,
            SensorArg::Pressure => SensorType::Pressure,
        }
    }
}

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Generates synthetic sensor readings that vary with the time of day.
struct MockSensorGenerator {
    /// Epoch seconds the next reading is taken at
    timestamp: i64,
}

impl MockSensorGenerator {
    fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }

    fn readings_at(timestamp: i64) -> Readings {
        let t = timestamp as f64;
        let day = t / 86_400.0 * std::f64::consts::TAU;

        // Temperature: 20–26 °C daily cycle with slow drift
        let temperature = 23.0 + 3.0 * day.sin() + 0.5 * (t / 3_700.0).cos();

        // Humidity: 40–60 %, opposite phase to temperature
        let humidity = 50.0 - 8.0 * day.sin() + 2.0 * (t / 2_300.0).cos();

        // Pressure: weather fronts over a few days
        let pressure = 1013.0 + 8.0 * (t / 259_200.0).sin() + 0.3 * (t / 4_100.0).cos();

        Readings {
            temperature: temperature as f32,
            humidity: humidity as f32,
            pressure: pressure as f32,
        }
    }
}

impl EnvironmentSensor for MockSensorGenerator {
    type Error = Infallible;

    fn read(&mut self) -> Result<Readings, Self::Error> {
        Ok(Self::readings_at(self.timestamp))
    }
}

// ---------------------------------------------------------------------------
// Retention memory
// ---------------------------------------------------------------------------

fn load_retained(path: &Path) -> Option<RetainedIndex> {
    let bytes = fs::read(path)
        .map_err(|e| warn!("No retained index at {}: {}", path.display(), e))
        .ok()?;
    postcard::from_bytes(&bytes)
        .map_err(|e| warn!("Retained index is corrupt: {}", e))
        .ok()
}

fn save_retained(path: &Path, retained: &RetainedIndex) -> Result<()> {
    let bytes = postcard::to_allocvec(retained)
        .map_err(|e| anyhow!("Failed to encode retained index: {}", e))?;
    fs::write(path, bytes)
        .with_context(|| format!("Failed to write retained index to {}", path.display()))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn fill(
    store: &mut RecordStore<FileStorage>,
    count: usize,
    interval: i64,
    now: i64,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let interval = interval.max(1);

    let mut start = now - (count as i64 - 1) * interval;
    if !store.is_empty() && start <= store.newest() {
        warn!("History already reaches {}, appending after it", store.newest());
        start = store.newest() + interval;
    }

    let mut sensor = MockSensorGenerator::new(start);
    for i in 0..count as i64 {
        let timestamp = start + i * interval;
        sensor.timestamp = timestamp;
        record_sample(store, &mut sensor, timestamp).map_err(|e| {
            anyhow!(
                "Failed to append record #{} (timestamp {}): {}",
                store.len(),
                timestamp,
                e
            )
        })?;
    }

    println!(
        "Appended {} records, {} total ({}..={})",
        count,
        store.len(),
        store.oldest(),
        store.newest()
    );
    Ok(())
}

fn sample(store: &mut RecordStore<FileStorage>, volume: &FileStorage, now: i64) -> Result<()> {
    if !time_is_sane(now) {
        bail!("Clock reads {}, not set; skipping sample", now);
    }

    let mut storage = volume.clone();
    let mut settings = Settings::load(&mut storage);
    if TimeSyncPolicy::default().is_due(settings.last_time_sync, now) {
        // The host clock is always synced
        info!("Time sync due, adopting host clock");
        settings.last_time_sync = now;
        settings.save(&mut storage).map_err(|e| {
            anyhow!("Failed to save settings in {}: {}", volume.root().display(), e)
        })?;
    }

    let mut sensor = MockSensorGenerator::new(now);
    let record = record_sample(store, &mut sensor, now)
        .map_err(|e| anyhow!("Failed to record sample at {}: {}", now, e))?;

    let local = TimeZone::default().local_time(now, &settings);
    println!("#{} at local {}: {}", store.len() - 1, local, record);
    Ok(())
}

fn print_record(index: usize, record: &SensorRecord) {
    println!("#{} {}", index, record);
}

fn query(
    store: &mut RecordStore<FileStorage>,
    now: i64,
    window: TimeWindow,
    sensor: SensorType,
    offset: i64,
    max_points: Option<usize>,
) -> Result<()> {
    let offset = clamp_offset(offset);
    let mut request = store.request(window, sensor).with_offset(offset);
    if let Some(max_points) = max_points {
        request = request.with_max_points(max_points);
    }

    let marker = if offset > 0 {
        format!(" -{}{}", offset, window.offset_suffix())
    } else {
        String::new()
    };
    println!("{} {}{}", sensor.label(), window.label(), marker);

    let series = store.query(now, &request).map_err(|e| {
        anyhow!(
            "Failed to query {} {}{}: {}",
            sensor.label(),
            window.label(),
            marker,
            e
        )
    })?;

    match series {
        Series::Points(points) => {
            for value in &points {
                println!("{:.2} {}", value, sensor.unit());
            }
            println!("{} points", points.len());
        }
        Series::InsufficientData => println!("no data"),
    }
    Ok(())
}

fn settings(volume: &FileStorage, summer_time: Option<bool>) -> Result<()> {
    let mut storage = volume.clone();
    let mut settings = Settings::load(&mut storage);

    if let Some(summer_time) = summer_time {
        settings.summer_time = summer_time;
        settings.save(&mut storage).map_err(|e| {
            anyhow!("Failed to save settings in {}: {}", volume.root().display(), e)
        })?;
    }

    println!("{:?}", settings);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    info!("Starting roommon simulator in {}", cli.data_dir.display());

    let volume = FileStorage::new(&cli.data_dir)
        .with_context(|| format!("Failed to open data directory {}", cli.data_dir.display()))?;
    let retained_path = cli.data_dir.join(RETAINED_FILE);

    let now = cli.now.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    });

    let retained = if cli.warm {
        load_retained(&retained_path)
    } else {
        None
    };
    let mut store = match retained {
        Some(retained) => RecordStore::resume(volume.clone(), StoreConfig::default(), retained),
        None => RecordStore::open(volume.clone(), StoreConfig::default()),
    };

    let result = match cli.command {
        Command::Fill { count, interval } => fill(&mut store, count, interval, now),
        Command::Sample => sample(&mut store, &volume, now),
        Command::Latest => {
            match store.latest() {
                Some(record) => print_record(store.len() - 1, &record),
                None => println!("no records"),
            }
            Ok(())
        }
        Command::Show { index } => store
            .read_at(index)
            .map(|record| print_record(index, &record))
            .map_err(|e| anyhow!("Failed to read record #{}: {}", index, e)),
        Command::Query {
            window,
            sensor,
            offset,
            max_points,
        } => query(
            &mut store,
            now,
            window.into(),
            sensor.into(),
            offset,
            max_points,
        ),
        Command::Clear => store
            .clear()
            .map_err(|e| anyhow!("Failed to clear history: {}", e)),
        Command::Settings { summer_time } => settings(&volume, summer_time),
    };

    // Going back to sleep, even after a failed command
    if let Err(e) = save_retained(&retained_path, &store.retained()) {
        warn!("{:#}", e);
    }
    result
}
