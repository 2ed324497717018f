//! camelot-cli - terminal client for the Camelot watch view API
//!
//! Talks to a running `camelot-watch` over HTTP. Filtering and grouping
//! happen server-side; this binary renders the result.
//!
//! # Subcommands
//! - `events [filters] [--json]`                       - filtered event feed
//! - `timeline [filters] [--group-by time|camera] [--expand KEY]... [--expand-all]`
//! - `summary`                                         - fleet counts
//! - `status`                                          - per-collection load state
//! - `cameras list|add|update|remove`                  - camera management

use anyhow::{bail, Context};
use camelot_core::models::{Event, Source, SourceCreate, SourceUpdate};
use camelot_core::{ExpansionState, FleetSummary, GroupKey, GroupMode};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "camelot-cli",
    version,
    about = "Camelot camera dashboard in the terminal"
)]
struct Cli {
    /// camelot-watch URL (overrides CAMELOT_HTTP_URL env var)
    #[arg(long, env = "CAMELOT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the filtered event feed
    Events {
        #[command(flatten)]
        filters: FilterArgs,

        /// Print the raw response JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the filtered feed grouped into timeline buckets
    Timeline {
        #[command(flatten)]
        filters: FilterArgs,

        /// Grouping mode: time or camera
        #[arg(long, default_value = "time")]
        group_by: String,

        /// Open the group with this key (repeatable), e.g. `0-1`, `09:00`, `3`
        #[arg(long)]
        expand: Vec<String>,

        /// Open every group
        #[arg(long)]
        expand_all: bool,
    },

    /// Show fleet counts
    Summary,

    /// Show load state of each polled collection
    Status,

    /// Manage cameras on the backend
    Cameras {
        #[command(subcommand)]
        command: CameraCommands,
    },
}

#[derive(Debug, Subcommand)]
enum CameraCommands {
    /// List cameras from the latest snapshot
    List,

    /// Register a new camera
    Add {
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
        #[arg(long)]
        rtsp_url: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },

    /// Change camera fields; omitted fields stay as they are
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        online: Option<bool>,
    },

    /// Delete a camera
    Remove { id: i64 },
}

#[derive(Debug, Args, Default)]
struct FilterArgs {
    /// Text to match against event kind or camera id
    #[arg(short, long)]
    query: Option<String>,

    /// Only these kinds (comma-separated)
    #[arg(long, value_delimiter = ',')]
    kinds: Vec<String>,

    /// Only these camera ids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    sources: Vec<i64>,

    /// Minimum confidence, 0-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    min_confidence: Option<u8>,

    /// Time window: all, 1h, 24h, 7d, 30d
    #[arg(long)]
    window: Option<String>,
}

impl FilterArgs {
    /// Query string pairs for `/events` and `/timeline`.
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = self.query.as_deref().filter(|q| !q.is_empty()) {
            pairs.push(("q", q.to_string()));
        }
        if !self.kinds.is_empty() {
            pairs.push(("kinds", self.kinds.join(",")));
        }
        if !self.sources.is_empty() {
            let ids: Vec<String> = self.sources.iter().map(|id| id.to_string()).collect();
            pairs.push(("sources", ids.join(",")));
        }
        if let Some(min) = self.min_confidence.filter(|m| *m > 0) {
            pairs.push(("min_confidence", min.to_string()));
        }
        if let Some(window) = &self.window {
            pairs.push(("window", window.clone()));
        }
        pairs
    }
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Descriptor {
    pub label: String,
    pub glyph: String,
}

/// One row of `/events` or a timeline group.
#[derive(Debug, Deserialize)]
pub struct FeedRow {
    #[serde(flatten)]
    pub event: Event,
    pub descriptor: Descriptor,
}

#[derive(Debug, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<FeedRow>,
    pub count: usize,
    pub total: usize,
    pub stale: bool,
    pub active_filters: usize,
}

#[derive(Debug, Deserialize)]
pub struct GroupView {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub events: Vec<FeedRow>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineResponse {
    pub group_by: GroupMode,
    pub groups: Vec<GroupView>,
    pub count: usize,
    pub stale: bool,
}

#[derive(Debug, Deserialize)]
pub struct SummaryResponse {
    pub summary: FleetSummary,
    pub stale: bool,
}

#[derive(Debug, Deserialize)]
pub struct CamerasResponse {
    pub cameras: Vec<Source>,
}

#[derive(Debug, Deserialize)]
pub struct CameraResponse {
    pub camera: Source,
}

// ============================================================================
// Formatting
// ============================================================================

/// Compact age: `12s`, `4m`, `3h`, `2d`. Future timestamps read as `now`.
pub fn relative_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - timestamp;
    if elapsed.num_seconds() <= 0 {
        "now".to_string()
    } else if elapsed.num_minutes() < 1 {
        format!("{}s", elapsed.num_seconds())
    } else if elapsed.num_hours() < 1 {
        format!("{}m", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{}h", elapsed.num_hours())
    } else {
        format!("{}d", elapsed.num_days())
    }
}

/// One feed line: glyph, label, camera, confidence, age.
pub fn format_event_line(row: &FeedRow, now: DateTime<Utc>) -> String {
    format!(
        "{} {:<10} cam {:03}  {:>3.0}%  {}",
        row.descriptor.glyph,
        row.descriptor.label,
        row.event.source_id,
        row.event.confidence * 100.0,
        relative_age(row.event.timestamp, now)
    )
}

pub fn format_group_header(group: &GroupView, expanded: bool) -> String {
    let marker = if expanded { "▾" } else { "▸" };
    format!("{} {} ({})", marker, group.label, group.count)
}

/// Resolve `--expand` / `--expand-all` into an expansion state for `groups`.
/// Keys that are not valid for `mode` are an error; valid keys with no
/// current group are kept but have no effect.
pub fn expansion_for(
    mode: GroupMode,
    groups: &[GroupView],
    expand: &[String],
    expand_all: bool,
) -> anyhow::Result<ExpansionState> {
    let mut state = ExpansionState::new(mode);
    for raw in expand {
        match GroupKey::parse(raw, mode) {
            Some(key) if !state.is_expanded(&key) => state.toggle(key),
            Some(_) => {}
            None => bail!("'{}' is not a group key for this grouping", raw),
        }
    }

    if expand_all {
        let existing: Vec<GroupKey> = groups
            .iter()
            .filter_map(|g| GroupKey::parse(&g.key, mode))
            .collect();
        if !state.all_expanded(&existing) {
            state.toggle_all(&existing);
        }
    }
    Ok(state)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?)
}

/// Send a request and decode a successful JSON body.
fn send<T: DeserializeOwned>(request: reqwest::blocking::RequestBuilder) -> anyhow::Result<T> {
    let resp = request.send().context("connection to camelot-watch failed")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let detail = body["error"]
            .as_str()
            .or_else(|| body["status"].as_str())
            .unwrap_or("no detail");
        bail!("server returned {}: {}", status, detail);
    }

    resp.json().context("failed to parse server response")
}

fn do_events(server: &str, filters: &FilterArgs, json_output: bool) -> anyhow::Result<()> {
    let request = client()?
        .get(format!("{}/events", server))
        .query(&filters.query_pairs());

    if json_output {
        let body: serde_json::Value = send(request)?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let resp: EventsResponse = send(request)?;
    let now = Utc::now();

    if resp.stale {
        eprintln!("warning: latest poll failed, showing last good data");
    }
    if resp.events.is_empty() {
        eprintln!("No events match ({} total)", resp.total);
        return Ok(());
    }
    for row in &resp.events {
        println!("{}", format_event_line(row, now));
    }
    println!(
        "\n{} of {} events, {} active filter(s)",
        resp.count, resp.total, resp.active_filters
    );
    Ok(())
}

fn do_timeline(
    server: &str,
    filters: &FilterArgs,
    group_by: &str,
    expand: &[String],
    expand_all: bool,
) -> anyhow::Result<()> {
    let mut query = filters.query_pairs();
    query.push(("group_by", group_by.to_string()));

    let resp: TimelineResponse = send(
        client()?
            .get(format!("{}/timeline", server))
            .query(&query),
    )?;
    let state = expansion_for(resp.group_by, &resp.groups, expand, expand_all)?;
    let now = Utc::now();

    if resp.stale {
        eprintln!("warning: latest poll failed, showing last good data");
    }
    if resp.groups.is_empty() {
        eprintln!("No events match");
        return Ok(());
    }

    for group in &resp.groups {
        let expanded = GroupKey::parse(&group.key, resp.group_by)
            .map(|key| state.is_expanded(&key))
            .unwrap_or(false);
        println!("{}", format_group_header(group, expanded));
        if expanded {
            for row in &group.events {
                println!("    {}", format_event_line(row, now));
            }
        }
    }
    println!("\n{} events in {} groups", resp.count, resp.groups.len());
    Ok(())
}

fn do_summary(server: &str) -> anyhow::Result<()> {
    let resp: SummaryResponse = send(client()?.get(format!("{}/summary", server)))?;
    let s = resp.summary;
    println!("Cameras:  {} ({} online)", s.cameras_total, s.cameras_online);
    println!(
        "Entities: {} ({} active, {} recognized)",
        s.entities_total, s.entities_active, s.entities_recognized
    );
    if resp.stale {
        println!("(stale: latest fleet poll failed)");
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let body: serde_json::Value = send(client()?.get(format!("{}/health", server)))?;
    println!("camelot-watch: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
    for name in ["cameras", "entities", "events"] {
        let set = &body[name];
        let state = set["status"]["state"].as_str().unwrap_or("?");
        let stale = set["status"]["stale"].as_bool().unwrap_or(false);
        let count = set["count"].as_u64().unwrap_or(0);
        let mut line = format!("{:<10} {:<8} {:>5} records", name, state, count);
        if stale {
            line.push_str("  (stale)");
        }
        if let Some(err) = set["last_error"].as_str() {
            line.push_str(&format!("  last error: {}", err));
        }
        println!("{}", line);
    }
    Ok(())
}

fn do_cameras(server: &str, command: CameraCommands) -> anyhow::Result<()> {
    let client = client()?;
    match command {
        CameraCommands::List => {
            let resp: CamerasResponse = send(client.get(format!("{}/cameras", server)))?;
            for cam in &resp.cameras {
                println!(
                    "{:03}  {:<24} {:<8} {:>9.5}, {:>10.5}",
                    cam.id,
                    cam.name,
                    if cam.online { "online" } else { "offline" },
                    cam.position.latitude,
                    cam.position.longitude
                );
            }
        }
        CameraCommands::Add {
            name,
            latitude,
            longitude,
            rtsp_url,
            description,
            username,
            password,
        } => {
            let body = SourceCreate {
                name,
                description,
                latitude,
                longitude,
                rtsp_url,
                username,
                password,
                config: None,
            };
            let resp: CameraResponse =
                send(client.post(format!("{}/cameras", server)).json(&body))?;
            println!("Created camera {} ({})", resp.camera.id, resp.camera.name);
        }
        CameraCommands::Update {
            id,
            name,
            description,
            active,
            online,
        } => {
            let body = SourceUpdate {
                name,
                description,
                is_active: active,
                is_online: online,
                config: None,
            };
            if body.is_empty() {
                bail!("nothing to update: pass at least one field");
            }
            let resp: CameraResponse =
                send(client.patch(format!("{}/cameras/{}", server, id)).json(&body))?;
            println!("Updated camera {} ({})", resp.camera.id, resp.camera.name);
        }
        CameraCommands::Remove { id } => {
            let _: serde_json::Value =
                send(client.delete(format!("{}/cameras/{}", server, id)))?;
            println!("Deleted camera {}", id);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Events { filters, json } => do_events(&server, &filters, json),
        Commands::Timeline {
            filters,
            group_by,
            expand,
            expand_all,
        } => do_timeline(&server, &filters, &group_by, &expand, expand_all),
        Commands::Summary => do_summary(&server),
        Commands::Status => do_status(&server),
        Commands::Cameras { command } => do_cameras(&server, command),
    };

    if let Err(e) = result {
        eprintln!("camelot-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
