//! `openapi-intent`: resolve a request against an OpenAPI file from the shell.

use std::process::ExitCode;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::Level;

use openapi_intent::config::{
    BASE_URL_ENV, MAX_TOKENS_ENV, MODEL_ENV, PROVIDER_ENV, TIMEOUT_SECS_ENV,
};
use openapi_intent::{
    IntentError, IntentMatch, IntentResolver, Provider, ResolverConfig, SchemaIndex,
};

fn build_cli() -> Command {
    Command::new("openapi-intent")
        .about("Find the OpenAPI endpoint that serves a free-text request")
        .arg(
            Arg::new("schema")
                .long("schema")
                .short('s')
                .required(true)
                .help("OpenAPI document (YAML or JSON)"),
        )
        .arg(
            Arg::new("query")
                .required(true)
                .num_args(1..)
                .help("The request, e.g. \"how do I reset my password\""),
        )
        .arg(
            Arg::new("provider")
                .long("provider")
                .env(PROVIDER_ENV)
                .value_parser(["anthropic", "openai"])
                .ignore_case(true)
                .help("Completion API"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .env(MODEL_ENV)
                .help("Model identifier"),
        )
        .arg(
            Arg::new("max-tokens")
                .long("max-tokens")
                .env(MAX_TOKENS_ENV)
                .value_parser(value_parser!(u32))
                .help("Maximum output tokens"),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .env(TIMEOUT_SECS_ENV)
                .value_parser(value_parser!(u64))
                .help("Request timeout in seconds (0 disables)"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .env(BASE_URL_ENV)
                .help("Override the provider's API base URL"),
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .help("API key (defaults to ANTHROPIC_API_KEY or OPENAI_API_KEY)"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print keywords, candidates and the prompt without calling the model"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Log more (-v debug, -vv trace)"),
        )
}

/// Flags override whatever `from_env` picked up.
fn resolver_config(matches: &ArgMatches) -> Result<ResolverConfig, IntentError> {
    let env = ResolverConfig::from_env()?;
    let mut config = match matches.get_one::<String>("provider") {
        Some(p) => {
            let provider: Provider = p.parse()?;
            if provider == env.provider {
                env
            } else {
                let api_key = std::env::var(provider.api_key_env()).unwrap_or_default();
                ResolverConfig::new(provider).api_key(api_key)
            }
        }
        None => env,
    };

    if let Some(model) = matches.get_one::<String>("model") {
        config = config.model(model.clone());
    }
    if let Some(&max_tokens) = matches.get_one::<u32>("max-tokens") {
        config = config.max_tokens(max_tokens);
    }
    if let Some(&secs) = matches.get_one::<u64>("timeout-secs") {
        config = config.timeout_secs(secs);
    }
    if let Some(url) = matches.get_one::<String>("base-url") {
        config = config.base_url(url.clone());
    }
    if let Some(key) = matches.get_one::<String>("api-key") {
        config = config.api_key(key.clone());
    }
    Ok(config)
}

fn run(matches: &ArgMatches) -> Result<(), IntentError> {
    let schema = matches
        .get_one::<String>("schema")
        .map(String::as_str)
        .unwrap_or_default();
    let query = matches
        .get_many::<String>("query")
        .map(|words| words.map(String::as_str).collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let config = resolver_config(matches)?;

    if matches.get_flag("dry-run") {
        let index = SchemaIndex::load(schema)?;
        let resolver = IntentResolver::new(index, NoCompletion, &config);
        let analyzed = resolver.analyze(&query)?;
        println!(
            "keywords: {}",
            analyzed
                .keywords
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("candidates:");
        for c in &analyzed.candidates {
            println!("  {} {}", c.method, c.path);
        }
        println!();
        println!("{}", resolver.render_prompt(&query)?);
        return Ok(());
    }

    let resolver = IntentResolver::from_path(schema, &config)?;
    let matched = resolver.infer_intent(&query)?;
    println!("{}", render_match(&matched)?);
    Ok(())
}

fn render_match(matched: &IntentMatch) -> Result<String, IntentError> {
    serde_json::to_string_pretty(matched).map_err(IntentError::Render)
}

/// Stand-in collaborator for `--dry-run`; never called.
struct NoCompletion;

impl openapi_intent::Completion for NoCompletion {
    fn complete(
        &self,
        _: &openapi_intent::CompletionRequest,
    ) -> Result<String, openapi_intent::CompletionError> {
        Err(openapi_intent::CompletionError::Other(
            "dry run does not call a model".to_string(),
        ))
    }
}

fn main() -> ExitCode {
    let matches = build_cli().get_matches();

    let level = match matches.get_count("verbose") {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
