//! Procflow demo entry point
//!
//! Runs an agent-style example flow against an ingestion endpoint and waits
//! for every event to be delivered.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use procflow::{
    ParentStrategy, ProcessValue, QueueStatus, TrackOptions, Tracker, TrackerConfig,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "procflow-demo")]
#[command(about = "Run an example process flow and relay it to an ingestion service")]
#[command(version)]
struct Cli {
    /// Ingestion endpoint URL
    #[arg(short, long, env = "PROCFLOW_INGEST_ENDPOINT")]
    endpoint: Option<String>,

    /// Name of the demo flow
    #[arg(long, default_value = "paris-weather-activity-flow")]
    flow_name: String,

    /// Parent inference strategy (stack_trace or context)
    #[arg(long)]
    strategy: Option<ParentStrategy>,

    /// Retries per event before the queue gives up
    #[arg(long)]
    max_retries: Option<u32>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Simulated work duration per step, in milliseconds
    #[arg(long, default_value = "200")]
    step_ms: u64,
}

impl Cli {
    fn tracker_config(&self) -> anyhow::Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                TrackerConfig::from_toml_str(&content)?
            }
            None => TrackerConfig::from_env(),
        };

        config.enabled = true;
        if let Some(endpoint) = &self.endpoint {
            config.ingest_endpoint = endpoint.clone();
        }
        if let Some(strategy) = self.strategy {
            config.parent_strategy = strategy;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        Ok(config)
    }
}

struct Demo {
    tracker: Tracker,
    step: Duration,
}

impl Demo {
    async fn pause(&self) {
        tokio::time::sleep(self.step).await;
    }

    async fn log_step(&self, message: &str) -> Result<(), String> {
        self.tracker
            .track_with(
                || async {
                    tracing::info!(message, "Demo step");
                    self.pause().await;
                    Ok::<_, String>(json!({"success": true, "timestamp": chrono::Utc::now().to_rfc3339()}))
                },
                TrackOptions::new().id("logging").param(json!({"message": message})),
            )
            .await
            .map(|_| ())
    }

    async fn geocode(&self, city: &str, parent: &str) -> anyhow::Result<(String, (f64, f64))> {
        let id = self
            .tracker
            .start("geocodingTool", ProcessValue::from(json!({"location": city})), Some(parent.into()))?
            .unwrap_or_default();

        self.log_step("Geocoding started").await.map_err(anyhow::Error::msg)?;
        self.pause().await;

        let (latitude, longitude) = (48.8566, 2.3522);
        self.tracker.end(
            &id,
            ProcessValue::from(json!({"latitude": latitude, "longitude": longitude})),
        )?;
        Ok((id, (latitude, longitude)))
    }

    async fn weather(&self, coordinates: (f64, f64), parent: &str) -> anyhow::Result<(String, i64)> {
        let id = self
            .tracker
            .start(
                "weatherTool",
                ProcessValue::from(json!({"coordinates": {"lat": coordinates.0, "lng": coordinates.1}})),
                Some(parent.into()),
            )?
            .unwrap_or_default();

        self.log_step("Weather check started").await.map_err(anyhow::Error::msg)?;
        self.pause().await;

        let temperature = 22;
        self.tracker.end(
            &id,
            ProcessValue::from(json!({"temperature": temperature, "unit": "Celsius"})),
        )?;
        Ok((id, temperature))
    }

    async fn run(&self, flow_name: &str) -> anyhow::Result<ProcessValue> {
        let flow_id = self.tracker.rename_flow(flow_name);
        tracing::info!(flow_id = %flow_id, flow_name, "Starting demo flow");

        let query = "What's an activity to do in Paris for the weather?";
        let agent = self
            .tracker
            .start("aiAgent", ProcessValue::from(json!({"query": query})), None)?
            .unwrap_or_default();

        let extractor = self
            .tracker
            .start("cityExtractor", ProcessValue::from(json!({"query": query})), Some(agent.as_str().into()))?
            .unwrap_or_default();
        self.pause().await;
        let city = "Paris";
        self.tracker.end(&extractor, ProcessValue::from(json!({"city": city})))?;

        let (geocoding, coordinates) = self.geocode(city, &agent).await?;
        let (weather, temperature) = self.weather(coordinates, &geocoding).await?;

        // Depends on both the extracted city and the weather report
        let recommendation = self
            .tracker
            .track_with(
                || async {
                    self.pause().await;
                    Ok::<_, String>(json!({
                        "recommendation": "Visit the Eiffel Tower and enjoy a picnic in Champ de Mars"
                    }))
                },
                TrackOptions::new()
                    .id("activityRecommender")
                    .param(json!({"city": city, "temperature": temperature}))
                    .parents(vec![extractor.clone(), weather]),
            )
            .await
            .map_err(anyhow::Error::msg)?;

        let summary = ProcessValue::from(json!({
            "city": city,
            "temperature": temperature,
            "unit": "Celsius",
            "activity": recommendation["recommendation"],
        }));
        self.tracker.end(&agent, summary.clone())?;
        Ok(summary)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();
    let config = cli.tracker_config()?;

    tracing::info!(
        endpoint = %config.ingest_endpoint,
        strategy = %config.parent_strategy,
        max_retries = config.max_retries,
        "Procflow demo v{}",
        procflow::VERSION
    );

    let demo = Demo {
        tracker: Tracker::new(config)?,
        step: Duration::from_millis(cli.step_ms),
    };

    let summary = demo.run(&cli.flow_name).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let queue = demo.tracker.queue();
    let status = queue.wait_until_settled().await;
    println!(
        "{}",
        json!({
            "queue_status": status.as_str(),
            "undelivered": queue.len(),
            "processes": demo.tracker.records().len(),
            "delivered": demo.tracker.metrics().delivered(),
            "attempts": demo.tracker.metrics().attempts(),
        })
    );

    if status == QueueStatus::Failed {
        std::process::exit(1);
    }

    Ok(())
}
