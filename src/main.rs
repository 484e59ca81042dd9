#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;

use wildwatch::adapters::CpalRecorder;
use wildwatch::ports::AudioCapture;
use wildwatch::app::{record_and_submit, spawn_meter_printer, AutoCapture, FieldConsole};
use wildwatch::domain::report::{AnalysisReport, NotificationStatus};
use wildwatch::domain::{DomainError, RangerReport, Threat, ThreatQuery};

#[derive(Parser)]
#[command(name = "wildwatch")]
#[command(version)]
#[command(about = "Field console for a wildlife threat detection service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an image or audio file
    Analyze {
        /// Path to a jpeg/png image or wav/mp3 audio file
        file: PathBuf,
    },
    /// Trigger one capture on the station camera and analyze it
    Capture,
    /// Unattended capture loop on the station camera until Ctrl+C
    Watch,
    /// Record from the microphone and submit the clip
    Record,
    /// List recent threats
    Threats {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one threat in full
    Threat { id: String },
    /// Send the ranger notification for a threat
    Notify { id: String },
    /// Submit a ranger response for a threat
    Respond {
        #[arg(long)]
        threat_id: String,
        #[arg(long)]
        ranger: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        details: String,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// List recent ranger responses
    Responses {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Stop showing the "no location" advisory
    DismissLocationNotice,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let console = Arc::new(FieldConsole::new().map_err(fail)?);

    match cli.command {
        Commands::Analyze { file } => analyze(&console, &file).await,
        Commands::Capture => capture(&console).await,
        Commands::Watch => watch(Arc::clone(&console)).await,
        Commands::Record => record(&console).await,
        Commands::Threats { limit, status } => threats(&console, ThreatQuery { limit, status }).await,
        Commands::Threat { id } => threat(&console, &id).await,
        Commands::Notify { id } => notify(&console, &id).await,
        Commands::Respond {
            threat_id,
            ranger,
            action,
            details,
            photo,
        } => respond(&console, threat_id, ranger, action, details, photo).await,
        Commands::Responses { limit } => responses(&console, limit).await,
        Commands::DismissLocationNotice => {
            console.dismiss_location_notice().map_err(fail)?;
            println!("Location advisory dismissed.");
            Ok(())
        }
    }
}

/// Turn a domain error into a CLI error, using the titled notice form for
/// acquisition failures.
fn fail(err: DomainError) -> anyhow::Error {
    match err.notice() {
        Some(notice) => anyhow!("{}: {}", notice.title, notice.message),
        None => anyhow!(err),
    }
}

fn show_advisory(console: &FieldConsole) {
    if let Some(notice) = console.location_advisory() {
        eprintln!("{}: {}", notice.title, notice.message);
    }
}

async fn analyze(console: &FieldConsole, file: &Path) -> anyhow::Result<()> {
    show_advisory(console);

    // Unsupported types stage nothing and surface nothing.
    if console.stage_upload(file).await.map_err(fail)?.is_none() {
        return Ok(());
    }

    let report = console.submit_pending().await.map_err(fail)?;
    print_report(&report);
    Ok(())
}

async fn capture(console: &FieldConsole) -> anyhow::Result<()> {
    show_advisory(console);

    console.open_camera().await.map_err(fail)?;
    let report = console.capture_now().await.map_err(fail)?;
    console.close_camera();

    print_report(&report);
    Ok(())
}

async fn watch(console: Arc<FieldConsole>) -> anyhow::Result<()> {
    show_advisory(&console);

    console.open_camera().await.map_err(fail)?;
    let auto = AutoCapture::new(Arc::clone(&console));
    auto.start().map_err(fail)?;

    println!(
        "Watching every {}s. Press Ctrl+C to stop.",
        console.config().capture.auto_interval_secs
    );
    tokio::signal::ctrl_c().await?;

    auto.stop().await;
    console.close_camera();
    println!("Stopped.");
    Ok(())
}

async fn record(console: &FieldConsole) -> anyhow::Result<()> {
    show_advisory(console);

    let audio_config = console.config().audio.clone();
    let max_clip_secs = audio_config.max_clip_secs;
    let recorder = CpalRecorder::new(audio_config).map_err(fail)?;
    let meter = spawn_meter_printer(recorder.subscribe_meter());

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        tokio::select! {
            _ = stdin.read_line(&mut line) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        let _ = stop_tx.send(());
    });

    println!("Recording... press Enter to stop (auto-stops at {max_clip_secs}s).");
    let result = record_and_submit(console, &recorder, stop_rx).await;
    meter.abort();
    eprintln!();

    print_report(&result.map_err(fail)?);
    Ok(())
}

async fn threats(console: &FieldConsole, query: ThreatQuery) -> anyhow::Result<()> {
    let threats = console.recent_threats(&query).await.map_err(fail)?;
    if threats.is_empty() {
        println!("No threats recorded.");
        return Ok(());
    }
    for threat in &threats {
        print_threat_line(threat);
    }
    Ok(())
}

async fn threat(console: &FieldConsole, id: &str) -> anyhow::Result<()> {
    let threat = console.threat_details(id).await.map_err(fail)?;
    println!("{}", serde_json::to_string_pretty(&threat)?);
    Ok(())
}

async fn notify(console: &FieldConsole, id: &str) -> anyhow::Result<()> {
    let outcome = console.notify_threat(id).await.map_err(fail)?;
    if outcome.success {
        println!("Ranger notified for threat {id}.");
    } else {
        // Never latched off: the same command retries.
        println!(
            "Notification failed{}. Run the command again to retry.",
            outcome
                .message
                .map(|m| format!(": {m}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn respond(
    console: &FieldConsole,
    threat_id: String,
    ranger_name: String,
    action_taken: String,
    response_details: String,
    photo: Option<PathBuf>,
) -> anyhow::Result<()> {
    let photo = match photo {
        Some(path) => {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "evidence.jpg".to_string());
            Some((filename, tokio::fs::read(&path).await?))
        }
        None => None,
    };

    let report = RangerReport {
        threat_id,
        ranger_name,
        action_taken,
        response_details,
        photo,
    };

    let outcome = console.submit_ranger_report(&report).await.map_err(fail)?;
    println!(
        "Response recorded{}.",
        outcome
            .response_id
            .map(|id| format!(" (id {id})"))
            .unwrap_or_default()
    );
    Ok(())
}

async fn responses(console: &FieldConsole, limit: Option<u32>) -> anyhow::Result<()> {
    let responses = console.ranger_responses(limit).await.map_err(fail)?;
    if responses.is_empty() {
        println!("No ranger responses recorded.");
        return Ok(());
    }
    for response in &responses {
        println!("{}", serde_json::to_string(response)?);
    }
    Ok(())
}

fn print_threat_line(threat: &Threat) {
    let status = threat.status.as_deref().unwrap_or("active");
    let when = threat.timestamp.as_deref().unwrap_or("-");
    println!(
        "{}  {:<12} {:>5.1}%  {:<8} {}",
        threat.id,
        threat.threat_type,
        threat.confidence * 100.0,
        status,
        when
    );
}

fn print_report(report: &AnalysisReport) {
    match report {
        AnalysisReport::Failure { message } => {
            println!("Analysis failed: {message}");
        }
        AnalysisReport::Success {
            summary,
            threat_detected,
            notification,
            location,
            detections,
        } => {
            if let Some(summary) = summary {
                println!("{summary}");
            }
            if *threat_detected {
                println!("!! THREAT DETECTED !!");
            }
            match notification {
                Some(NotificationStatus::Notified) => println!("Ranger has been notified."),
                Some(NotificationStatus::NotifyNow { threat_id }) => {
                    println!("Run `wildwatch notify {threat_id}` to alert the ranger.")
                }
                None => {}
            }
            if let Some(block) = location {
                let place = block
                    .description
                    .as_deref()
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default();
                println!(
                    "Location: {}, {}{place}  {}",
                    block.latitude, block.longitude, block.map_url
                );
            }
            if detections.is_empty() {
                println!("No detections.");
            }
            for block in detections {
                let threat_tag = if block.is_threat { " [THREAT]" } else { "" };
                let bbox = block
                    .bounding_box
                    .map(|b| format!("  box ({:.0}, {:.0})-({:.0}, {:.0})", b.x1, b.y1, b.x2, b.y2))
                    .unwrap_or_default();
                println!(
                    "- {} {} ({}){threat_tag}{bbox}",
                    block.label,
                    block.confidence_percent(),
                    block.band.label()
                );
            }
        }
    }
}
