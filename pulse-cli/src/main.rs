//! pulse-cli — anonymous mood feedback and team dashboard from the terminal
//!
//! Talks to a running `pulse-server` over HTTP.
//!
//! # Subcommands
//! - `submit --mood <1-5> [--comment <text>]` — share one piece of feedback
//! - `kiosk`                                  — shared-terminal intake loop
//! - `dashboard [--json]`                     — stats, mood chart, recent comments
//! - `plan [--json]`                          — generate a 3-point action plan
//! - `reset --yes`                            — clear all feedback (irreversible)
//! - `view [employee|management]`             — show or switch the view mode
//! - `status`                                 — show server health

use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use pulse_core::intake::DEFAULT_CONFIRMATION_DELAY;
use pulse_core::{
    ActionPlan, DashboardSummary, FeedbackRecord, IntakeForm, Mood, MoodBucket, Tone, ViewMode,
};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
const BAR_WIDTH: usize = 30;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "pulse-cli",
    version,
    about = "Culture Pulse — anonymous mood feedback and team dashboard"
)]
struct Cli {
    /// Culture Pulse server URL (overrides PULSE_HTTP_URL env var)
    #[arg(long, env = "PULSE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Share how you feel today (100% anonymous)
    Submit {
        /// 1 Awful, 2 Poor, 3 Neutral, 4 Good, 5 Amazing
        #[arg(short, long)]
        mood: Option<u8>,

        /// Optional comment
        #[arg(short, long, default_value = "")]
        comment: String,
    },

    /// Repeated intake on a shared terminal; resets after each submission
    Kiosk {
        /// Seconds the confirmation stays up before the form resets
        /// (defaults to the server's configured delay)
        #[arg(long)]
        confirm_secs: Option<u64>,
    },

    /// Show the culture dashboard
    Dashboard {
        /// Print the raw dashboard JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a 3-point action plan from current feedback
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear all feedback data. This cannot be undone.
    Reset {
        /// Confirm the irreversible clear
        #[arg(long)]
        yes: bool,
    },

    /// Show or switch the current view
    View {
        mode: Option<ViewArg>,
    },

    /// Show server status
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ViewArg {
    Employee,
    Management,
}

impl From<ViewArg> for ViewMode {
    fn from(arg: ViewArg) -> Self {
        match arg {
            ViewArg::Employee => ViewMode::Employee,
            ViewArg::Management => ViewMode::Management,
        }
    }
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DashboardResponse {
    pub summary: DashboardSummary,
    pub view: ViewMode,
    pub plan: Option<ActionPlan>,
    pub plan_error: Option<String>,
    #[serde(default)]
    pub generating: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlanResponse {
    pub plan: ActionPlan,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub record: FeedbackRecord,
    pub total: usize,
    pub message: String,
}

// ============================================================================
// Rendering
// ============================================================================

/// One bar per mood level, scaled to the largest bucket.
pub fn render_histogram(buckets: &[MoodBucket]) -> String {
    let max = buckets.iter().map(|b| b.count).max().unwrap_or(0);
    buckets
        .iter()
        .map(|b| {
            let width = if max == 0 { 0 } else { b.count * BAR_WIDTH / max };
            format!(
                "{} {:<8} {:<width$} {}",
                b.mood.icon(),
                b.label,
                "█".repeat(width),
                b.count,
                width = BAR_WIDTH
            )
            .trim_end()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tone_marker(tone: Tone) -> &'static str {
    match tone {
        Tone::Positive => "+",
        Tone::Neutral => "~",
        Tone::Negative => "-",
    }
}

fn format_time(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "??:??:??".to_string())
}

/// A recent-comments line: tone, icon, comment (or placeholder), time.
pub fn format_recent(record: &FeedbackRecord) -> String {
    let comment = if record.comment.trim().is_empty() {
        "(no comment provided)"
    } else {
        record.comment.as_str()
    };
    format!(
        "[{}] {} {}\n      {} • Anonymous{}",
        tone_marker(record.mood.tone()),
        record.mood.icon(),
        comment,
        format_time(record.timestamp),
        if record.is_sample() { " • sample" } else { "" }
    )
}

pub fn render_plan(plan: &ActionPlan) -> String {
    let mut out = format!("\"{}\"\n", plan.summary);
    for (i, point) in plan.points().iter().enumerate() {
        out.push_str(&format!("\nStep {}: {}", i + 1, point));
    }
    out
}

pub fn render_dashboard(dash: &DashboardResponse) -> String {
    let summary = &dash.summary;
    let mut out = String::new();

    if dash.view == ViewMode::Employee {
        out.push_str("(server is in the employee view; run `pulse-cli view management` to switch)\n\n");
    }
    out.push_str("OVERALL SENTIMENT\n");
    out.push_str(&format!(
        "  {:.1} out of 5.0 avg — based on {} anonymous responses\n\n",
        summary.average_mood, summary.total
    ));

    out.push_str("MOOD DISTRIBUTION\n");
    for line in render_histogram(&summary.histogram).lines() {
        out.push_str(&format!("  {}\n", line));
    }

    out.push_str("\nAI INSIGHTS\n");
    if dash.generating {
        out.push_str("  Processing...\n");
    } else if let Some(plan) = &dash.plan {
        for line in render_plan(plan).lines() {
            out.push_str(&format!("  {}\n", line));
        }
    } else if let Some(err) = &dash.plan_error {
        out.push_str(&format!("  {}\n", err));
    } else {
        out.push_str("  Run `pulse-cli plan` to reveal your AI-powered management roadmap.\n");
    }

    out.push_str("\nRAW FEEDBACK (ANONYMOUS)\n");
    if summary.recent.is_empty() {
        out.push_str("  No feedback received yet.\n");
    } else {
        for r in &summary.recent {
            out.push_str(&format!("  {}\n", format_recent(r)));
        }
    }

    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Turn a non-success response into an error carrying the server's message.
fn check(resp: reqwest::blocking::Response) -> anyhow::Result<reqwest::blocking::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    let message = body["error"].as_str().unwrap_or("request failed").to_string();
    anyhow::bail!("server returned {}: {}", status, message)
}

fn post_feedback(server: &str, mood: Mood, comment: &str) -> anyhow::Result<SubmitResponse> {
    let resp = client(10)?
        .post(format!("{}/feedback", server))
        .json(&serde_json::json!({ "mood": mood.value(), "comment": comment }))
        .send()?;
    Ok(check(resp)?.json()?)
}

fn do_submit(server: &str, mood: Option<u8>, comment: &str) -> anyhow::Result<()> {
    let mut form = IntakeForm::default();
    if let Some(m) = mood {
        form.select_mood(m)?;
    }
    form.set_comment(comment);

    // Validates locally; the server assigns the stored id and timestamp.
    let draft = form.submit(Instant::now())?;
    let resp = post_feedback(server, draft.mood, &draft.comment)?;

    println!("✨ {}", resp.message);
    println!(
        "   Recorded {} {} — {} responses collected so far.",
        resp.record.mood.icon(),
        resp.record.mood.label(),
        resp.total
    );
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Confirmation delay advertised by the server, if reachable.
fn server_confirmation_delay(server: &str) -> Option<Duration> {
    let resp = client(5).ok()?.get(format!("{}/health", server)).send().ok()?;
    let body: serde_json::Value = resp.json().ok()?;
    body["confirmation_secs"].as_u64().map(Duration::from_secs)
}

fn do_kiosk(server: &str, confirm_secs: Option<u64>) -> anyhow::Result<()> {
    let delay = confirm_secs
        .map(Duration::from_secs)
        .or_else(|| server_confirmation_delay(server))
        .unwrap_or(DEFAULT_CONFIRMATION_DELAY);
    let mut form = IntakeForm::new(delay);
    println!("Your voice is anonymous. Help us shape a better workplace, one feeling at a time.");

    loop {
        println!();
        for mood in Mood::all() {
            print!("  {} {} {}   ", mood.value(), mood.icon(), mood.label());
        }
        println!();

        let answer = match prompt("How are you feeling today? [1-5, q to quit] ")? {
            Some(a) => a,
            None => return Ok(()),
        };
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("q") {
            return Ok(());
        }

        let selected = answer.parse::<u8>().ok().map(|v| form.select_mood(v));
        if !matches!(selected, Some(Ok(()))) {
            println!("Please pick a mood between 1 and 5.");
            continue;
        }

        let comment = prompt("Any specific feedback or comments? ")?.unwrap_or_default();
        form.set_comment(comment);

        let draft = match form.submit(Instant::now()) {
            Ok(d) => d,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match post_feedback(server, draft.mood, &draft.comment) {
            Ok(resp) => println!("✨ {}", resp.message),
            Err(e) => eprintln!("pulse-cli: {}", e),
        }

        std::thread::sleep(form.delay());
        form.poll(Instant::now());
    }
}

fn fetch_dashboard(server: &str) -> anyhow::Result<(serde_json::Value, DashboardResponse)> {
    let resp = check(client(10)?.get(format!("{}/dashboard", server)).send()?)?;
    let raw: serde_json::Value = resp.json()?;
    let parsed = serde_json::from_value(raw.clone())?;
    Ok((raw, parsed))
}

fn do_dashboard(server: &str, json: bool) -> anyhow::Result<()> {
    let (raw, dash) = fetch_dashboard(server)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&raw)?);
    } else {
        print!("{}", render_dashboard(&dash));
    }
    Ok(())
}

fn do_plan(server: &str, json: bool) -> anyhow::Result<()> {
    if !json {
        eprintln!("Processing...");
    }
    // Generation waits on the upstream model, so allow longer than other calls.
    let resp = check(client(120)?.post(format!("{}/plan", server)).send()?)?;
    let body: PlanResponse = resp.json()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body.plan)?);
    } else {
        println!("{}", render_plan(&body.plan));
    }
    Ok(())
}

fn do_reset(server: &str, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("clearing all feedback cannot be undone; rerun with --yes to confirm");
    }
    check(
        client(10)?
            .post(format!("{}/reset", server))
            .json(&serde_json::json!({ "confirm": true }))
            .send()?,
    )?;
    println!("All feedback data cleared.");
    Ok(())
}

fn do_view(server: &str, mode: Option<ViewArg>) -> anyhow::Result<()> {
    let http = client(10)?;
    let resp = match mode {
        Some(m) => http
            .put(format!("{}/view", server))
            .json(&serde_json::json!({ "mode": ViewMode::from(m) }))
            .send()?,
        None => http.get(format!("{}/view", server)).send()?,
    };
    let body: serde_json::Value = check(resp)?.json()?;
    println!("View: {}", body["mode"].as_str().unwrap_or("unknown"));
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client(10)?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Culture Pulse: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Records:       {}", body["records"]);
            println!("Generator:     {}", body["generator"].as_str().unwrap_or("?"));
            println!("Data dir:      {}", body["data_dir"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("pulse-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("pulse-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
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
        Commands::Submit { mood, comment } => do_submit(&server, mood, &comment),
        Commands::Kiosk { confirm_secs } => do_kiosk(&server, confirm_secs),
        Commands::Dashboard { json } => do_dashboard(&server, json),
        Commands::Plan { json } => do_plan(&server, json),
        Commands::Reset { yes } => do_reset(&server, yes),
        Commands::View { mode } => do_view(&server, mode),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("pulse-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
