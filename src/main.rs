//! robogo - drive toward a named object using a vision-language model
//!
//! ```text
//! robogo --goal "red ball"                        # mock camera, simulated motors
//! robogo --camera dir --frames-dir ./frames       # replay stills
//! robogo --motor device --motor-device /dev/ttyUSB0 --narrator command
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use robogo::actuator::{Actuator, DeviceActuator, SimulatedActuator, DEFAULT_POWER};
use robogo::camera::{Camera, DirectoryCamera, MockCamera, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use robogo::narration::{CommandNarrator, ConsoleNarrator, Narrator};
use robogo::pursuit::{PursuitConfig, PursuitDriver};
use robogo::vision::{gemini::API_KEY_VAR, GeminiClient, GeminiConfig, RetryPolicy, RetryingModel};

/// Vision-guided goal pursuit
#[derive(Parser)]
#[command(name = "robogo")]
#[command(about = "Drive a small robot toward a named object", long_about = None)]
#[command(version)]
struct Cli {
    /// Object to look for (asked on stdin if omitted)
    #[arg(long)]
    goal: Option<String>,

    /// Step budget for the pursuit
    #[arg(long, default_value_t = 40)]
    max_steps: u32,

    /// Seed for left/right choices (reproducible runs)
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = CameraKind::Mock)]
    camera: CameraKind,

    /// Directory of JPEG/PNG stills for `--camera dir`
    #[arg(long, required_if_eq("camera", "dir"))]
    frames_dir: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,

    #[arg(long, value_enum, default_value_t = MotorKind::Sim)]
    motor: MotorKind,

    /// Motor controller device for `--motor device`
    #[arg(long, required_if_eq("motor", "device"))]
    motor_device: Option<PathBuf>,

    /// Motor power, 0-100
    #[arg(long, default_value_t = DEFAULT_POWER)]
    motor_power: u8,

    #[arg(long, value_enum, default_value_t = NarratorKind::Console)]
    narrator: NarratorKind,

    /// Speech command for `--narrator command`; the text is appended
    #[arg(long, default_value = "espeak")]
    tts_command: String,

    /// Gemini model name (overrides GEMINI_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Gemini API key (overrides GEMINI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// OTLP collector for trace export
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Write Prometheus metrics here on exit
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Skip the opening scene description
    #[arg(long)]
    skip_survey: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CameraKind {
    Mock,
    Dir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MotorKind {
    Sim,
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum NarratorKind {
    Console,
    Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Variables already set in the environment win over .env
    let dotenv_path = dotenvy::dotenv().ok();
    let cli = Cli::parse();

    robogo::tracing::init_tracing("robogo", cli.otlp_endpoint.as_deref())
        .map_err(|e| anyhow!("failed to initialize tracing: {}", e))?;
    if let Some(path) = dotenv_path {
        debug!(path = %path.display(), "Loaded .env");
    }

    let narrator: Arc<dyn Narrator> = match cli.narrator {
        NarratorKind::Console => Arc::new(ConsoleNarrator),
        NarratorKind::Command => Arc::new(
            CommandNarrator::from_command_line(&cli.tts_command)
                .unwrap_or_else(CommandNarrator::espeak),
        ),
    };

    let camera: Box<dyn Camera> = match cli.camera {
        CameraKind::Mock => Box::new(MockCamera::new(cli.width, cli.height)),
        CameraKind::Dir => {
            let dir = cli
                .frames_dir
                .as_ref()
                .context("--frames-dir is required with --camera dir")?;
            Box::new(DirectoryCamera::open(dir)?)
        }
    };

    let actuator: Box<dyn Actuator> = match cli.motor {
        MotorKind::Sim => Box::new(SimulatedActuator::realtime()),
        MotorKind::Device => {
            let path = cli
                .motor_device
                .as_ref()
                .context("--motor-device is required with --motor device")?;
            Box::new(DeviceActuator::open(path, cli.motor_power).await?)
        }
    };

    let mut gemini = match &cli.api_key {
        Some(key) => GeminiConfig::from_lookup(|name| {
            if name == API_KEY_VAR {
                Some(key.clone())
            } else {
                std::env::var(name).ok()
            }
        })?,
        None => GeminiConfig::from_env()
            .context("set GEMINI_API_KEY in the environment or a .env file, or pass --api-key")?,
    };
    if let Some(model) = &cli.model {
        gemini.model = model.clone();
    }
    let client = GeminiClient::new(gemini)?;
    let model = RetryingModel::new(client, RetryPolicy::default(), narrator.clone());

    let config = PursuitConfig {
        max_steps: cli.max_steps,
        seed: cli.seed,
        ..PursuitConfig::default()
    };
    let mut driver = PursuitDriver::new(camera, Box::new(model), narrator.clone(), actuator, config);

    info!(camera = ?cli.camera, motor = ?cli.motor, narrator = ?cli.narrator, "robogo starting");
    narrator.speak("Hello! I'm ready. Let me take a look around.").await;

    let result = tokio::select! {
        result = run(&mut driver, narrator.as_ref(), &cli) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            narrator.speak("Okay, stopping now.").await;
            Ok(())
        }
    };

    driver.shutdown().await;

    if let Some(path) = &cli.metrics_out {
        let text = robogo::metrics::render()?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    }

    robogo::tracing::shutdown_tracing();
    result
}

async fn run(driver: &mut PursuitDriver, narrator: &dyn Narrator, cli: &Cli) -> Result<()> {
    if !cli.skip_survey {
        driver.survey_scene().await?;
    }

    let goal = match &cli.goal {
        Some(goal) => goal.trim().to_lowercase(),
        None => {
            let mut stdin = BufReader::new(tokio::io::stdin());
            ask_goal(&mut stdin, narrator).await?
        }
    };
    if goal.is_empty() {
        narrator.speak("I didn't hear a goal, so I'll stay here.").await;
        return Ok(());
    }

    match driver.pursue(&goal).await {
        Ok(report) => {
            if report.reached {
                narrator.speak("I found it! Task complete.").await;
            } else {
                narrator
                    .speak("I tried my best but couldn't complete the task this time.")
                    .await;
            }
            println!(
                "Pursuit of '{}': reached={} steps={} capture_failures={} advice_failures={} trace_id={}",
                goal,
                report.reached,
                report.steps_completed,
                report.capture_failures,
                report.advice_failures,
                report.trace_id
            );
            Ok(())
        }
        Err(e) => {
            narrator
                .speak("I tried my best but couldn't complete the task this time.")
                .await;
            Err(e.into())
        }
    }
}

/// Read the goal from `input`, re-asking while the line is blank
///
/// Returns an empty string only at end of input.
async fn ask_goal<R>(input: &mut R, narrator: &dyn Narrator) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        println!("\n[USER INPUT] What object should I look for? (e.g., 'red ball')");

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .await
            .context("failed to read goal from stdin")?;
        if read == 0 {
            return Ok(String::new());
        }

        let goal = line.trim().to_lowercase();
        if !goal.is_empty() {
            return Ok(goal);
        }
        narrator.speak("Please tell me what to look for.").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robogo::narration::TranscriptNarrator;

    #[tokio::test]
    async fn test_ask_goal_reprompts_on_blank_lines() {
        let narrator = TranscriptNarrator::new();
        let mut input: &[u8] = b"\n   \n  Red Ball \n";

        let goal = ask_goal(&mut input, &narrator).await.unwrap();

        assert_eq!(goal, "red ball");
        assert_eq!(
            narrator.lines(),
            vec![
                "Please tell me what to look for.".to_string(),
                "Please tell me what to look for.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_ask_goal_end_of_input() {
        let narrator = TranscriptNarrator::new();
        let mut input: &[u8] = b"\n";

        assert_eq!(ask_goal(&mut input, &narrator).await.unwrap(), "");
        assert_eq!(narrator.lines().len(), 1);
    }

    #[test]
    fn test_cli_key_and_model_are_optional() {
        let cli = Cli::try_parse_from(["robogo", "--goal", "cup"]).unwrap();
        assert!(cli.api_key.is_none());
        assert!(cli.model.is_none());

        let cli = Cli::try_parse_from(["robogo", "--api-key", "k", "--model", "gemini-1.5-pro"])
            .unwrap();
        assert_eq!(cli.api_key.as_deref(), Some("k"));
        assert_eq!(cli.model.as_deref(), Some("gemini-1.5-pro"));
    }
}
