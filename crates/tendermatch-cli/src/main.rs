mod display;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tendermatch_ai::client::{DEFAULT_API_URL, DEFAULT_MODEL};
use tendermatch_ai::{
    AnthropicClient, AssessmentResponse, Assessor, ClientConfig, Gateway, GatewayConfig,
    GenerationSettings,
};
use tendermatch_core::{
    AssessmentRequest, DeclaredDocument, FORMULA_V1, Scorecard, SectionWeights, score_generated,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tendermatch",
    version,
    about = "Score a company against a public tender"
)]
struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = Format::Card)]
    format: Format,
    /// Override one section weight, e.g. `--weight certificazioni=0.2`. Repeatable.
    #[arg(long = "weight", global = true, value_name = "SECTION=WEIGHT", value_parser = parse_weight)]
    weights: Vec<(String, f64)>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assess a company profile against a tender text.
    TenderReady {
        #[arg(long, value_name = "FILE")]
        profile: PathBuf,
        #[arg(long, value_name = "FILE")]
        tender: PathBuf,
        #[arg(long)]
        language: Option<String>,
        #[command(flatten)]
        generation: GenerationArgs,
    },
    /// Assess declared documents against a tender identifier.
    ComplianceCheck {
        #[arg(long)]
        tender_id: String,
        /// JSON array of `{"name", "type", "summary"}` objects.
        #[arg(long, value_name = "FILE")]
        documents: PathBuf,
        #[arg(long)]
        language: Option<String>,
        #[command(flatten)]
        generation: GenerationArgs,
    },
    /// Rebuild a scorecard from stored generator output, without any network call.
    Score {
        /// Generator output; stdin when omitted or `-`.
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Card,
    Json,
}

#[derive(Args, Debug)]
struct GenerationArgs {
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: String,
    #[arg(long, env = "TENDERMATCH_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long, env = "TENDERMATCH_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    #[arg(long, env = "TENDERMATCH_TOKENS_PER_MINUTE", default_value_t = GatewayConfig::default().tokens_per_minute)]
    tokens_per_minute: u64,
    #[arg(long, env = "TENDERMATCH_MIN_INTERVAL_MS", default_value_t = 1500)]
    min_interval_ms: u64,
    #[arg(long, env = "TENDERMATCH_MAX_RETRIES", default_value_t = GatewayConfig::default().max_retries)]
    max_retries: u32,
    #[arg(long, env = "TENDERMATCH_BACKOFF_BASE_MS", default_value_t = 2000)]
    backoff_base_ms: u64,
    #[arg(long, env = "TENDERMATCH_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    request_timeout_secs: u64,
    #[arg(long, env = "TENDERMATCH_MAX_OUTPUT_TOKENS", default_value_t = GenerationSettings::default().max_output_tokens)]
    max_output_tokens: u32,
    #[arg(long, env = "TENDERMATCH_TEMPERATURE", default_value_t = GenerationSettings::default().temperature)]
    temperature: f32,
}

impl GenerationArgs {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            tokens_per_minute: self.tokens_per_minute,
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..GatewayConfig::default()
        }
    }

    fn client(&self) -> AnthropicClient {
        AnthropicClient::new(ClientConfig {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            api_url: self.api_url.clone(),
        })
    }

    fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    tracing::debug!("tendermatch v{}", env!("CARGO_PKG_VERSION"));

    let weights = weights_with_overrides(&cli.weights)?;

    match cli.command {
        Commands::Score { file } => {
            let scorecard = score_file(file.as_deref(), &weights)?;
            emit_scorecard(cli.format, &scorecard)?;
        }
        Commands::TenderReady {
            profile,
            tender,
            language,
            generation,
        } => {
            let request = AssessmentRequest::TenderReady {
                company_profile: read_text(&profile)?,
                tender_text: read_text(&tender)?,
                language,
            };
            let response = run_assessment(&request, &generation, weights).await?;
            emit_response(cli.format, &response)?;
        }
        Commands::ComplianceCheck {
            tender_id,
            documents,
            language,
            generation,
        } => {
            let request = AssessmentRequest::ComplianceCheck {
                tender_id,
                documents: read_documents(&documents)?,
                language,
            };
            let response = run_assessment(&request, &generation, weights).await?;
            emit_response(cli.format, &response)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_assessment(
    request: &AssessmentRequest,
    args: &GenerationArgs,
    weights: SectionWeights,
) -> anyhow::Result<AssessmentResponse> {
    let client = args.client();
    tracing::info!(model = client.model(), kind = request.kind(), "starting assessment");
    let gateway = Gateway::new(client, args.gateway_config());
    let response = Assessor::new(&gateway)
        .with_settings(args.settings())
        .with_weights(weights)
        .assess(request)
        .await
        .context("invalid request")?;
    Ok(response)
}

fn emit_response(format: Format, response: &AssessmentResponse) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(response)?),
        Format::Card => display::print_response(response)?,
    }
    if !response.ok {
        bail!(
            "report generation failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn emit_scorecard(format: Format, scorecard: &Scorecard) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(scorecard)?),
        Format::Card => display::print_scorecard(scorecard)?,
    }
    Ok(())
}

/// Parse, canonicalize and score stored generator output.
fn score_file(path: Option<&Path>, weights: &SectionWeights) -> anyhow::Result<Scorecard> {
    let raw = match path {
        Some(path) => read_text(path)?,
        None => read_stdin()?,
    };
    Ok(score_generated(&raw, weights))
}

fn weights_with_overrides(overrides: &[(String, f64)]) -> anyhow::Result<SectionWeights> {
    let mut weights = SectionWeights::for_formula(&FORMULA_V1);
    for (section, weight) in overrides {
        weights
            .set(section, *weight)
            .with_context(|| format!("--weight {section}={weight}"))?;
    }
    Ok(weights)
}

fn parse_weight(s: &str) -> Result<(String, f64), String> {
    let (section, weight) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SECTION=WEIGHT, got `{s}`"))?;
    let section = section.trim();
    if section.is_empty() {
        return Err(format!("missing section in `{s}`"));
    }
    let weight: f64 = weight
        .trim()
        .parse()
        .map_err(|e| format!("bad weight in `{s}`: {e}"))?;
    Ok((section.to_string(), weight))
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        return read_stdin();
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_stdin() -> anyhow::Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading stdin")?;
    Ok(buf)
}

fn read_documents(path: &Path) -> anyhow::Result<Vec<DeclaredDocument>> {
    let raw = read_text(path)?;
    serde_json::from_str(&raw).with_context(|| format!("parsing documents in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::CommandFactory;
    use tendermatch_core::CheckResult;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_weight_pairs() {
        assert_eq!(
            parse_weight("certificazioni=0.2").unwrap(),
            ("certificazioni".to_string(), 0.2)
        );
        assert_eq!(
            parse_weight(" technical = 1 ").unwrap(),
            ("technical".to_string(), 1.0)
        );
        assert!(parse_weight("certificazioni").is_err());
        assert!(parse_weight("=0.3").is_err());
        assert!(parse_weight("certificazioni=alto").is_err());
    }

    #[test]
    fn overrides_resolve_synonyms() {
        let weights = weights_with_overrides(&[("technical".into(), 0.5)]).unwrap();
        assert_eq!(weights.get("requisiti_tecnici"), 0.5);
        assert_eq!(weights.get("requisiti_amministrativi"), 0.25);
    }

    #[test]
    fn overrides_reject_unknown_or_negative() {
        assert!(weights_with_overrides(&[("marketing".into(), 0.5)]).is_err());
        assert!(weights_with_overrides(&[("certificazioni".into(), -1.0)]).is_err());
    }

    #[test]
    fn score_command_parses_without_api_key() {
        let cli = Cli::try_parse_from([
            "tendermatch",
            "score",
            "out.txt",
            "--format",
            "json",
            "--weight",
            "certificazioni=0",
        ])
        .unwrap();
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.weights, vec![("certificazioni".to_string(), 0.0)]);
        assert!(matches!(cli.command, Commands::Score { file: Some(_) }));
    }

    #[test]
    fn assessment_flags_feed_gateway_config() {
        let cli = Cli::try_parse_from([
            "tendermatch",
            "tender-ready",
            "--profile",
            "azienda.txt",
            "--tender",
            "bando.txt",
            "--api-key",
            "sk-test",
            "--tokens-per-minute",
            "20000",
            "--min-interval-ms",
            "500",
            "--request-timeout-secs",
            "30",
        ])
        .unwrap();
        let Commands::TenderReady { generation, .. } = cli.command else {
            panic!("expected tender-ready");
        };
        let config = generation.gateway_config();
        assert_eq!(config.tokens_per_minute, 20_000);
        assert_eq!(config.min_interval, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.window, Duration::from_secs(60));
    }

    #[test]
    fn scores_stored_output_offline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "Risultato:\n```json\n{}\n```",
            r#"{"sections":[{"section_id":"requisiti_economici","checks":[
                {"id":"fatturato","status":"FAIL"},{"id":"referenze","status":"PASS"}]}]}"#
        )
        .unwrap();

        let weights = SectionWeights::for_formula(&FORMULA_V1);
        let scorecard = score_file(Some(file.path()), &weights).unwrap();
        assert_eq!(scorecard.sections.len(), 5);
        assert_eq!(scorecard.overall.score, Some(50));
        assert_eq!(scorecard.overall.status, CheckResult::Partial);
    }

    #[test]
    fn reads_declared_documents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"DURC","type":"certificato","summary":"regolare"}},{{"name":"Visura"}}]"#
        )
        .unwrap();
        let docs = read_documents(file.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].doc_type, "certificato");
        assert_eq!(docs[1].summary, "");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_text(Path::new("/nonexistent/bando.txt")).unwrap_err();
        assert!(err.to_string().contains("reading /nonexistent/bando.txt"));
    }
}
