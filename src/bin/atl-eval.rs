use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use atl_eval::{
    agent::{AgentConfig, ToolCallingAgent, DEDICATED_SYSTEM_PROMPT, GENERIC_SYSTEM_PROMPT},
    eval::{
        convert_corpus, load_dataset, AgentRunner, DedicatedToolNames, Evaluator, EvaluatorConfig,
        GenericToolNames, ToolNameMapper,
    },
    providers::{
        openai::OpenAI,
        openrouter::OpenRouter,
        scripted::{ScriptedProvider, ScriptedTurn},
    },
    tools::{
        DedicatedToolBackend, EngineConfig, GenericToolBackend, ToolBackend, TransformationEngine,
        TransformationService,
    },
    LLMProvider,
};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, ValueEnum)]
enum ProviderKind {
    Openai,
    Openrouter,
    /// Answers without calling tools; exercises the pipeline offline.
    Scripted,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    /// One apply and one get tool per transformation.
    Dedicated,
    /// A fixed tool set taking the transformation name as an argument.
    Generic,
}

#[derive(Parser)]
#[command(name = "atl-eval")]
#[command(about = "Score the tool calls of an ATL transformation agent against a labeled dataset")]
struct Args {
    /// Dataset file (JSON, or YAML by extension)
    #[arg(long)]
    dataset: PathBuf,

    /// Provider to use
    #[arg(long, value_enum, default_value = "openai")]
    provider: ProviderKind,

    /// Model identifier (provider-specific)
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Tool naming convention of the agent under test
    #[arg(long, value_enum, default_value = "dedicated")]
    variant: Variant,

    /// Directory for the result table and summary
    #[arg(long, default_value = "evaluation_results")]
    out_dir: PathBuf,

    /// Prefix of the written report files
    #[arg(long, default_value = "atl")]
    prefix: String,

    /// Sampling temperature sent with every completion
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Completion token cap
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Maximum agent steps per example
    #[arg(long, default_value_t = atl_eval::agent::DEFAULT_RECURSION_LIMIT)]
    recursion_limit: usize,

    /// Wall-clock limit per example, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Transformation server URL (defaults to ATL_SERVER_URL or http://localhost:8080)
    #[arg(long)]
    engine_url: Option<String>,

    /// Handlebars system prompt template; receives the `tools` list
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Evaluate only the first N examples
    #[arg(long)]
    limit: Option<usize>,

    /// Write the dataset with expected calls mapped for --variant to this path and exit
    #[arg(long)]
    convert_to: Option<PathBuf>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,atl_eval=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_provider(kind: &ProviderKind) -> Result<Arc<dyn LLMProvider>, Box<dyn std::error::Error>> {
    Ok(match kind {
        ProviderKind::Openai => Arc::new(OpenAI::from_env()?),
        ProviderKind::Openrouter => Arc::new(OpenRouter::from_env()?),
        ProviderKind::Scripted => Arc::new(
            ScriptedProvider::new([ScriptedTurn::Text("No tool needed.".into())]).repeating(),
        ),
    })
}

fn build_engine(url: Option<&str>) -> Result<Arc<dyn TransformationService>, Box<dyn std::error::Error>> {
    let engine = match url {
        Some(url) => TransformationEngine::from_config(EngineConfig::default().with_base_url(url))?,
        None => TransformationEngine::from_env()?,
    };
    info!(url = engine.base_url(), "using transformation server");
    Ok(Arc::new(engine))
}

fn system_prompt(variant: Variant, prompt_file: Option<&Path>) -> std::io::Result<String> {
    match prompt_file {
        Some(path) => fs::read_to_string(path),
        None => Ok(match variant {
            Variant::Dedicated => DEDICATED_SYSTEM_PROMPT.to_string(),
            Variant::Generic => GENERIC_SYSTEM_PROMPT.to_string(),
        }),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let mut dataset = load_dataset(&args.dataset)?;
    if let Some(limit) = args.limit {
        dataset.examples.truncate(limit);
    }

    let mapper: Arc<dyn ToolNameMapper> = match args.variant {
        Variant::Dedicated => Arc::new(DedicatedToolNames),
        Variant::Generic => Arc::new(GenericToolNames),
    };

    if let Some(path) = &args.convert_to {
        convert_corpus(&dataset, mapper.as_ref()).save(path)?;
        info!(path = %path.display(), examples = dataset.len(), "converted dataset written");
        return Ok(());
    }

    let provider = build_provider(&args.provider)?;
    let engine = build_engine(args.engine_url.as_deref())?;
    let backend: Arc<dyn ToolBackend> = match args.variant {
        Variant::Dedicated => Arc::new(DedicatedToolBackend::connect(engine).await?),
        Variant::Generic => Arc::new(GenericToolBackend::new(engine)),
    };

    info!(provider = provider.name(), model = %args.model, "evaluating agent");
    let mut config = AgentConfig::new(&args.model)
        .with_system_prompt(system_prompt(args.variant, args.prompt_file.as_deref())?)
        .with_recursion_limit(args.recursion_limit)
        .with_temperature(args.temperature);
    if let Some(max_tokens) = args.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    let agent = Arc::new(ToolCallingAgent::new(provider, backend, config));

    let mut runner = AgentRunner::new(agent, mapper);
    if let Some(secs) = args.timeout_secs {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }

    let mut evaluator = Evaluator::new(
        dataset,
        runner,
        EvaluatorConfig::default()
            .with_output_dir(&args.out_dir)
            .with_report_prefix(&args.prefix),
    );
    let (summary, paths) = evaluator.evaluate_all().await?;

    println!("Total examples:   {}", summary.total_examples);
    println!("Average score:    {:.2}%", summary.average_score);
    println!("Perfect matches:  {}", summary.perfect_matches);
    println!("Partial matches:  {}", summary.partial_matches);
    println!("Failed matches:   {}", summary.failed_matches);
    if let Some(acc) = summary.single_tool_accuracy {
        println!("Single-tool:      {acc:.2}%");
    }
    if let Some(acc) = summary.multi_tool_accuracy {
        println!("Multi-tool:       {acc:.2}%");
    }
    for (level, acc) in &summary.by_level {
        println!("{level}:          {acc:.2}%");
    }
    println!("Results: {}", paths.results.display());
    println!("Summary: {}", paths.summary.display());

    Ok(())
}
