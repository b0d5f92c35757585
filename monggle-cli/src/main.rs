//! monggle-cli — terminal frontend for a running Monggle server
//!
//! # Subcommands
//! - `status`                                   — show server health
//! - `interpret <text> [--raw]`                 — one-off nightmare interpretation
//! - `chat [text]`                              — send a chat turn, or print the transcript
//! - `records list|show <date>|add …`           — sleep journal
//! - `analytics [--period P] [--anchor D]`      — sleep report
//! - `routines list|toggle|add|recommend|remove|recommendations|goal`

use std::time::Duration;

use clap::{Parser, Subcommand};
use monggle_core::analytics::Period;
use monggle_core::{
    ChatMessage, InterpretationClient, InterpretationSections, MonggleConfig, Mood, NewRecord,
    RemoteInterpreter, Role, RoutineItem, SleepGoal, SleepRecord,
};
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_CONFIG: &str = "monggle.toml";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "monggle-cli",
    version,
    about = "Monggle sleep journal and nightmare interpreter"
)]
struct Cli {
    /// Monggle server URL (defaults to client.server_url from the config file)
    #[arg(long, env = "MONGGLE_SERVER_URL")]
    server: Option<String>,

    /// Path to the config file
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show Monggle server status
    Status,

    /// Interpret a nightmare once
    Interpret {
        /// The dream, in your own words
        text: String,

        /// Print the reply exactly as received
        #[arg(long)]
        raw: bool,
    },

    /// Talk to the hosted chat session; without text, print the transcript
    Chat {
        text: Option<String>,
    },

    /// Sleep journal
    Records {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Sleep report for a day, week or month
    Analytics {
        #[arg(long, default_value_t = Period::Week)]
        period: Period,

        /// YYYY-MM-DD; defaults to the newest record
        #[arg(long)]
        anchor: Option<String>,
    },

    /// Bedtime routines and sleep goal
    Routines {
        #[command(subcommand)]
        command: RoutineCommands,
    },
}

#[derive(Debug, Subcommand)]
enum RecordCommands {
    /// List all records, newest entry first
    List,

    /// Show the record for a date
    Show { date: String },

    /// Add a record, or replace one when --id is given
    Add {
        #[arg(long)]
        date: String,
        #[arg(long)]
        score: u8,
        /// Minutes asleep
        #[arg(long)]
        duration: u32,
        #[arg(long)]
        deep: u8,
        #[arg(long)]
        light: u8,
        #[arg(long)]
        rem: u8,
        /// refreshed, tired, anxious, neutral, nightmare or energized
        #[arg(long)]
        mood: Mood,
        /// 1 to 5
        #[arg(long)]
        satisfaction: u8,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        memo: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum RoutineCommands {
    /// List routines and the sleep goal
    List,

    /// Flip a routine on or off
    Toggle { id: String },

    /// Add a custom routine
    Add {
        name: String,
        #[arg(long)]
        icon: Option<String>,
        /// HH:MM
        #[arg(long)]
        time: Option<String>,
    },

    /// Add one of the recommended routines by name
    Recommend { name: String },

    /// Remove a routine
    Remove { id: String },

    /// Show the recommended routines
    Recommendations,

    /// Show the sleep goal, or update it when both times are given
    Goal {
        #[arg(long, requires = "wake")]
        bedtime: Option<String>,
        #[arg(long, requires = "bedtime")]
        wake: Option<String>,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<SleepRecord>,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    record: SleepRecord,
    #[serde(default)]
    shadowed: usize,
}

#[derive(Debug, Deserialize)]
struct RoutinesResponse {
    routines: Vec<RoutineItem>,
    goal: SleepGoal,
}

#[derive(Debug, Deserialize)]
struct ChatTurnResponse {
    reply: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    messages: Vec<ChatMessage>,
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
}

impl Api {
    fn new(server: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str) -> Value {
        let url = format!("{}{}", self.server, path);
        finish(&url, self.client.get(&url).send())
    }

    fn post(&self, path: &str, body: Option<Value>) -> Value {
        let url = format!("{}{}", self.server, path);
        let req = self.client.post(&url);
        let req = match body {
            Some(body) => req.json(&body),
            None => req,
        };
        finish(&url, req.send())
    }

    fn put(&self, path: &str, body: Value) -> Value {
        let url = format!("{}{}", self.server, path);
        finish(&url, self.client.put(&url).json(&body).send())
    }

    fn delete(&self, path: &str) -> Value {
        let url = format!("{}{}", self.server, path);
        finish(&url, self.client.delete(&url).send())
    }
}

/// Unwrap a response body or exit 1 with the server's error message.
fn finish(url: &str, resp: reqwest::Result<reqwest::blocking::Response>) -> Value {
    let resp = match resp {
        Ok(r) => r,
        Err(e) => {
            eprintln!("monggle-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: Value = resp.json().unwrap_or_default();

    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("no details");
        eprintln!("monggle-cli: server returned {}: {}", status, message);
        std::process::exit(1);
    }
    body
}

fn parse<T: serde::de::DeserializeOwned>(body: Value) -> anyhow::Result<T> {
    Ok(serde_json::from_value(body)?)
}

// ============================================================================
// Rendering
// ============================================================================

fn format_record(r: &SleepRecord) -> String {
    format!(
        "{}  {:>3}  {:>7}  {}  {}",
        r.date,
        r.score,
        r.duration_label(),
        r.mood,
        r.title
    )
}

fn format_routine(item: &RoutineItem) -> String {
    format!(
        "[{}] {:<38} {:>5}  {}{}",
        if item.enabled { "x" } else { " " },
        item.name,
        item.time.as_deref().unwrap_or("--:--"),
        item.id,
        if item.is_custom { "  (custom)" } else { "" }
    )
}

/// Lay out a reply by section when all three are present, else verbatim.
fn render_interpretation(reply: &str) -> String {
    let sections = InterpretationSections::parse(reply);
    if !sections.is_complete() {
        return reply.to_string();
    }

    let mut out = String::new();
    if let Some(meaning) = &sections.meaning {
        out.push_str(&format!("Dream meaning\n  {}\n\n", meaning));
    }
    let tags: Vec<String> = sections.keywords.iter().map(|k| format!("#{}", k)).collect();
    out.push_str(&format!("Keywords\n  {}\n\n", tags.join(" ")));
    if let Some(care) = &sections.care {
        out.push_str(&format!("Monggle's care note\n  {}", care));
    }
    out
}

fn print_message(m: &ChatMessage) {
    let who = match m.role {
        Role::User => "you",
        Role::Assistant => "monggle",
    };
    println!("{:>8}: {}", who, m.text);
}

// ============================================================================
// Commands
// ============================================================================

fn do_status(api: &Api) -> anyhow::Result<()> {
    let body = api.get("/health");
    println!("Monggle server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
    println!("Generator:      {}", body["generator"].as_str().unwrap_or("?"));
    println!("Records:        {}", body["records"]);
    println!("Routines:       {}", body["routines"]);
    Ok(())
}

/// Goes through the interpretation client so a failed call still prints the
/// fallback reply.
fn do_interpret(server: &str, timeout: Duration, text: &str, raw: bool) -> anyhow::Result<()> {
    let interpreter = RemoteInterpreter::new(server, timeout)?;
    let client = InterpretationClient::from_generator(interpreter);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(client.interpret(text));

    let Some(reply) = outcome.text() else {
        eprintln!("monggle-cli: nothing to interpret");
        std::process::exit(1);
    };

    if raw || outcome.is_fallback() {
        println!("{}", reply);
    } else {
        println!("{}", render_interpretation(reply));
    }
    Ok(())
}

fn do_chat(api: &Api, text: Option<String>) -> anyhow::Result<()> {
    match text {
        Some(text) => {
            let turn: ChatTurnResponse = parse(api.post("/api/chat", Some(json!({ "text": text }))))?;
            print_message(&turn.reply);
        }
        None => {
            let transcript: TranscriptResponse = parse(api.get("/api/chat"))?;
            for m in &transcript.messages {
                print_message(m);
            }
        }
    }
    Ok(())
}

fn do_records(api: &Api, command: RecordCommands) -> anyhow::Result<()> {
    match command {
        RecordCommands::List => {
            let resp: RecordsResponse = parse(api.get("/api/records"))?;
            for r in &resp.records {
                println!("{}", format_record(r));
            }
            println!("{} record(s)", resp.count);
        }
        RecordCommands::Show { date } => {
            let resp: RecordResponse = parse(api.get(&format!("/api/records/by-date/{}", date)))?;
            let r = &resp.record;
            println!("{}", format_record(r));
            println!(
                "Stages:       deep {}% / light {}% / rem {}%",
                r.deep_sleep, r.light_sleep, r.rem_sleep
            );
            println!("Satisfaction: {}/5", r.satisfaction);
            println!("Tags:         {}", r.tags.join(", "));
            if !r.memo.is_empty() {
                println!("\n{}", r.memo);
            }
            if resp.shadowed > 0 {
                eprintln!("note: {} older record(s) share this date", resp.shadowed);
            }
        }
        RecordCommands::Add {
            date,
            score,
            duration,
            deep,
            light,
            rem,
            mood,
            satisfaction,
            title,
            memo,
            tags,
            id,
        } => {
            let draft = NewRecord {
                id,
                date,
                score,
                duration,
                deep_sleep: deep,
                light_sleep: light,
                rem_sleep: rem,
                mood,
                satisfaction,
                title,
                memo,
                tags,
            };
            // Catch bad input before the round trip.
            draft.validate()?;
            let body = api.post("/api/records", Some(serde_json::to_value(&draft)?));
            let saved: RecordResponse = parse(body.clone())?;
            let verb = if body["replaced"].as_bool().unwrap_or(false) {
                "Updated"
            } else {
                "Saved"
            };
            println!("{} {}", verb, format_record(&saved.record));
        }
    }
    Ok(())
}

fn do_analytics(api: &Api, period: Period, anchor: Option<String>) -> anyhow::Result<()> {
    let mut path = format!("/api/analytics?period={}", period);
    if let Some(anchor) = anchor {
        path.push_str(&format!("&anchor={}", anchor));
    }
    let report = api.get(&path);

    let heading = format!("{} report around {}", period, report["anchor"].as_str().unwrap_or("?"));
    if report["illustrative"].as_bool().unwrap_or(false) {
        println!("{} (no records yet, showing an example)", heading);
    } else {
        println!("{} ({} record(s))", heading, report["record_count"]);
    }

    if let Some(buckets) = report["buckets"].as_array() {
        for b in buckets {
            let hours = b["hours"].as_f64().unwrap_or(0.0);
            println!(
                "  {:>4}  {:>5.1}h  {}",
                b["label"].as_str().unwrap_or("?"),
                hours,
                "#".repeat((hours * 2.0).round() as usize)
            );
        }
    }

    let stages = &report["stages"];
    println!(
        "Stages:     deep {}% / light {}% / rem {}%",
        stages["deep"], stages["light"], stages["rem"]
    );
    let longest = report["longest_minutes"].as_u64().unwrap_or(0);
    println!("Longest:    {}h {}m", longest / 60, longest % 60);
    println!("Efficiency: {}%", report["efficiency_percent"]);
    if let Some(insight) = report["insight"].as_str() {
        println!("\n{}", insight);
    }
    Ok(())
}

fn do_routines(api: &Api, command: RoutineCommands) -> anyhow::Result<()> {
    match command {
        RoutineCommands::List => {
            let resp: RoutinesResponse = parse(api.get("/api/routines"))?;
            for item in &resp.routines {
                println!("{}", format_routine(item));
            }
            println!(
                "Goal: bed {} / wake {} ({} min in bed)",
                resp.goal.bedtime,
                resp.goal.wake_time,
                resp.goal.in_bed_minutes()
            );
        }
        RoutineCommands::Toggle { id } => {
            let body = api.post(&format!("/api/routines/{}/toggle", id), None);
            let state = if body["enabled"].as_bool().unwrap_or(false) { "on" } else { "off" };
            println!("Routine {} is now {}", id, state);
        }
        RoutineCommands::Add { name, icon, time } => {
            let body = api.post(
                "/api/routines",
                Some(json!({ "name": name, "icon": icon, "time": time })),
            );
            let item: RoutineItem = parse(body["routine"].clone())?;
            println!("Added {}", format_routine(&item));
        }
        RoutineCommands::Recommend { name } => {
            let body = api.post("/api/routines/recommended", Some(json!({ "name": name })));
            let item: RoutineItem = parse(body["routine"].clone())?;
            println!("Added {}", format_routine(&item));
        }
        RoutineCommands::Remove { id } => {
            let body = api.delete(&format!("/api/routines/{}", id));
            println!("Removed {}", body["removed"]["name"].as_str().unwrap_or(&id));
        }
        RoutineCommands::Recommendations => {
            let body = api.get("/api/routines/recommendations");
            if let Some(list) = body["recommendations"].as_array() {
                for rec in list {
                    println!(
                        "{}  {}",
                        rec["time"].as_str().unwrap_or("--:--"),
                        rec["name"].as_str().unwrap_or("?")
                    );
                }
            }
        }
        RoutineCommands::Goal { bedtime, wake } => {
            let body = match (bedtime, wake) {
                (Some(bedtime), Some(wake_time)) => {
                    api.put("/api/routines/goal", json!(SleepGoal { bedtime, wake_time }))
                }
                _ => api.get("/api/routines/goal"),
            };
            let goal: SleepGoal = parse(body["goal"].clone())?;
            println!("Bed {} / wake {} ({} min in bed)", goal.bedtime, goal.wake_time, goal.in_bed_minutes());
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let config = match MonggleConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("monggle-cli: failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    let server = cli
        .server
        .unwrap_or(config.client.server_url)
        .trim_end_matches('/')
        .to_string();
    let timeout = Duration::from_secs(config.client.timeout_seconds);

    let result = match cli.command {
        Commands::Interpret { text, raw } => do_interpret(&server, timeout, &text, raw),
        Commands::Status => Api::new(&server, timeout).and_then(|api| do_status(&api)),
        Commands::Chat { text } => Api::new(&server, timeout).and_then(|api| do_chat(&api, text)),
        Commands::Records { command } => {
            Api::new(&server, timeout).and_then(|api| do_records(&api, command))
        }
        Commands::Analytics { period, anchor } => {
            Api::new(&server, timeout).and_then(|api| do_analytics(&api, period, anchor))
        }
        Commands::Routines { command } => {
            Api::new(&server, timeout).and_then(|api| do_routines(&api, command))
        }
    };

    if let Err(e) = result {
        eprintln!("monggle-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> SleepRecord {
        SleepRecord {
            id: "r9".to_string(),
            date: "2024-12-20".to_string(),
            score: 88,
            duration: 485,
            deep_sleep: 25,
            light_sleep: 55,
            rem_sleep: 20,
            mood: Mood::Refreshed,
            satisfaction: 5,
            title: "Slept like a log".to_string(),
            memo: String::new(),
            tags: vec!["recorded".to_string()],
        }
    }

    #[test]
    fn test_format_record_line() {
        let line = format_record(&sample_record());
        assert!(line.starts_with("2024-12-20"));
        assert!(line.contains("8h 5m"));
        assert!(line.ends_with("Slept like a log"));
    }

    #[test]
    fn test_format_routine_marks_state() {
        let item = RoutineItem {
            id: "1".to_string(),
            name: "Drink warm tea".to_string(),
            icon: "fa-mug-hot".to_string(),
            time: None,
            enabled: true,
            is_custom: true,
        };
        let line = format_routine(&item);
        assert!(line.starts_with("[x] Drink warm tea"));
        assert!(line.contains("--:--"));
        assert!(line.ends_with("(custom)"));
    }

    #[test]
    fn test_render_interpretation_by_section() {
        let reply = "[Dream Meaning]\nYou feel unsupported.\n\
                     [Psychological Keywords]\n#anxiety #control\n\
                     [Monggle's Care Note]\nBreathe slowly tonight.";
        let out = render_interpretation(reply);
        assert!(out.starts_with("Dream meaning\n  You feel unsupported."));
        assert!(out.contains("#anxiety #control"));
        assert!(out.ends_with("Breathe slowly tonight."));
    }

    #[test]
    fn test_render_interpretation_incomplete_is_verbatim() {
        let reply = "Just a short note with no sections.";
        assert_eq!(render_interpretation(reply), reply);
    }

    #[test]
    fn test_cli_parses_record_add() {
        let cli = Cli::try_parse_from([
            "monggle-cli",
            "records",
            "add",
            "--date",
            "2024-12-21",
            "--score",
            "80",
            "--duration",
            "420",
            "--deep",
            "20",
            "--light",
            "60",
            "--rem",
            "20",
            "--mood",
            "anxious",
            "--satisfaction",
            "3",
            "--title",
            "Restless",
            "--tag",
            "stress",
        ])
        .unwrap();

        match cli.command {
            Commands::Records {
                command: RecordCommands::Add { mood, tags, .. },
            } => {
                assert_eq!(mood, Mood::Anxious);
                assert_eq!(tags, vec!["stress".to_string()]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_half_goal() {
        let parsed = Cli::try_parse_from(["monggle-cli", "routines", "goal", "--bedtime", "23:00"]);
        assert!(parsed.is_err());
    }
}
