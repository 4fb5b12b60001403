use clap::{Parser, Subcommand};
use farm_assistant::chat::ChatWidget;
use farm_assistant::config::Configuration;
use farm_assistant::error::AppError;
use farm_assistant::flows::{
    AnalyzeFarmDataFlow, AnalyzeFarmDataInput, FarmAssistantFlow, FarmRecords, GenAiClient,
    PredictYieldFlow, PredictYieldInput,
};
use farm_assistant::media::{DirectoryCamera, MediaSource};
use farm_assistant::scan::ScanOrchestrator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

/// Farm assistant: crop scans and questions about your farm data
#[derive(Parser, Debug)]
#[command(name = "farm-assistant", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./farm-assistant.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Analyse an image file with the plant and thermal classifiers
    Scan { image: PathBuf },

    /// Capture a frame from the snapshot camera and analyse it
    Capture,

    /// Ask the farm assistant a question
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Look for problems in the configured analytics records
    Analyze,

    /// Predict this season's yield from the configured analytics records
    Predict,
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

async fn load_records(configuration: &Configuration) -> Result<FarmRecords, AppError> {
    match &configuration.assistant.records_file {
        Some(path) => FarmRecords::load(path).await,
        None => Ok(FarmRecords::default()),
    }
}

async fn require_records(configuration: &Configuration) -> Result<FarmRecords, AppError> {
    if configuration.assistant.records_file.is_none() {
        return Err(AppError::InvalidConfiguration(
            "assistant.records_file must be set to analyse farm data".to_string(),
        ));
    }
    load_records(configuration).await
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let configuration = Configuration::load(cli.config.as_deref())?;
    configuration
        .validate()
        .map_err(AppError::InvalidConfiguration)?;
    init_logging(configuration.tracing_level()?);

    let client = Arc::new(GenAiClient::from_settings(&configuration.assistant)?);

    match cli.command {
        Command::Analyze => {
            let records = require_records(&configuration).await?;
            let output = AnalyzeFarmDataFlow::new(client)
                .run(AnalyzeFarmDataInput {
                    analytics_data: records.analytics_data,
                })
                .await?;
            for insight in &output.insights {
                println!("Problem: {}\nRecommendation: {}\n", insight.problem, insight.recommendation);
            }
            println!("Summary: {}", output.summary);
            return Ok(());
        }
        Command::Predict => {
            let records = require_records(&configuration).await?;
            let output = PredictYieldFlow::new(client)
                .run(PredictYieldInput {
                    analytics_data: records.analytics_data,
                })
                .await?;
            println!("Predicted Yield: {}", output.predicted_yield);
            println!("Yield Confidence: {}", output.yield_confidence);
            println!("Next Month Growth: {}", output.next_month_growth_prediction);
            println!("Summary: {}", output.prediction_summary);
            return Ok(());
        }
        _ => {}
    }

    let orchestrator = ScanOrchestrator::from_configuration(&configuration)?;
    let records = load_records(&configuration).await?;
    let snapshot_dir = configuration.camera.snapshot_dir.clone();

    let mut widget = ChatWidget::new(
        Arc::new(FarmAssistantFlow::new(client)),
        orchestrator,
        Box::new(move || Box::new(DirectoryCamera::new(snapshot_dir.clone())) as Box<dyn MediaSource>),
    )
    .with_records(records.tasks, records.analytics_data);
    widget.open();

    match cli.command {
        Command::Scan { image } => {
            info!("Submitting {} for analysis", image.display());
            widget.scan().choose_file_path(&image).await?;
            widget.submit_scan().await?;
        }
        Command::Capture => {
            let session = widget.scan();
            session.open_camera().await?;
            session.capture_frame().await?;
            widget.submit_scan().await?;
        }
        Command::Ask { question } => {
            widget.send_message(&question.join(" ")).await?;
        }
        Command::Analyze | Command::Predict => {}
    }

    if let Some(turn) = widget.transcript().latest() {
        println!("{}", turn.text);
    }
    widget.close();
    Ok(())
}
