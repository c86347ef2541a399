//! sinharc CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use sinharc_core::tensor::{self, Tensor};
use sinharc_core::Distribution;
use sinharc_prob::{DistributionSpec, SinhArcsinh};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sinharc")]
#[command(about = "sinharc - SinhArcsinh distribution evaluation and sampling")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a distribution spec
    Describe {
        /// Distribution spec (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Treat spec parameters as unconstrained reals.
        #[arg(long)]
        unconstrained: bool,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Log density at the given points
    LogProb {
        /// Distribution spec (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Points: JSON number or nested array, e.g. `[0.5, 1.0]`.
        /// Non-finite values are written as `"inf"`, `"-inf"` or `"nan"`.
        #[arg(long, allow_hyphen_values = true)]
        x: String,

        /// Treat spec parameters as unconstrained reals.
        #[arg(long)]
        unconstrained: bool,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cumulative distribution function at the given points
    Cdf {
        /// Distribution spec (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Points: JSON number or nested array
        #[arg(long, allow_hyphen_values = true)]
        x: String,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inverse cdf at the given probabilities
    Quantile {
        /// Probabilities in [0, 1]: JSON number or nested array
        #[arg(long, allow_hyphen_values = true)]
        p: String,

        /// Distribution spec (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Draw samples
    Sample {
        /// Distribution spec (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Sample shape, comma separated (e.g. `100` or `10,5`).
        #[arg(long, value_delimiter = ',', default_value = "1")]
        shape: Vec<usize>,

        /// RNG seed. Omit for an entropy-seeded draw.
        #[arg(long)]
        seed: Option<u64>,

        /// Treat spec parameters as unconstrained reals.
        #[arg(long)]
        unconstrained: bool,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Describe { config, unconstrained, output } => {
            cmd_describe(&config, unconstrained, output.as_ref())
        }
        Commands::LogProb { config, x, unconstrained, output } => {
            cmd_log_prob(&config, &x, unconstrained, output.as_ref())
        }
        Commands::Cdf { config, x, output } => cmd_cdf(&config, &x, output.as_ref()),
        Commands::Quantile { p, config, output } => cmd_quantile(&config, &p, output.as_ref()),
        Commands::Sample { config, shape, seed, unconstrained, output } => {
            cmd_sample(&config, &shape, seed, unconstrained, output.as_ref())
        }
    }
}

fn load_distribution(config: &PathBuf, unconstrained: bool) -> Result<SinhArcsinh> {
    tracing::info!(path = %config.display(), unconstrained, "loading distribution spec");
    let spec = DistributionSpec::from_path(config)
        .with_context(|| format!("failed to read spec {}", config.display()))?;
    let dist = if unconstrained { spec.build_unconstrained()? } else { spec.build()? };
    let batch_shape = dist.batch_shape()?;
    tracing::info!(name = dist.name(), batch_shape = ?batch_shape, "distribution built");
    Ok(dist)
}

fn parse_points(flag: &str, raw: &str) -> Result<Tensor> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("--{flag} is not valid JSON: {raw}"))?;
    tensor::tensor_from_json(&value).with_context(|| format!("--{flag}"))
}

fn header(dist: &SinhArcsinh) -> Result<serde_json::Map<String, Value>> {
    let mut out = serde_json::Map::new();
    out.insert("name".into(), Value::from(dist.name()));
    out.insert("batch_shape".into(), serde_json::to_value(dist.batch_shape()?)?);
    Ok(out)
}

fn cmd_describe(config: &PathBuf, unconstrained: bool, output: Option<&PathBuf>) -> Result<()> {
    let dist = load_distribution(config, unconstrained)?;

    let mut parameters = serde_json::Map::new();
    for (name, param) in dist.parameters() {
        parameters.insert(name.to_string(), tensor::tensor_to_json(&param.value()?));
    }
    let properties: Vec<Value> = SinhArcsinh::parameter_properties()
        .iter()
        .map(|(name, p)| {
            serde_json::json!({
                "name": name,
                "event_ndims": p.event_ndims,
                "is_preferred": p.is_preferred,
                "default_constraining_bijector": p.default_constraining_bijector().name(),
            })
        })
        .collect();

    let mut out = header(&dist)?;
    out.insert("event_shape".into(), serde_json::to_value(dist.event_shape())?);
    out.insert("base_distribution".into(), Value::from(dist.distribution().name()));
    out.insert("bijector".into(), Value::from(dist.bijector().name()));
    out.insert("parameters".into(), Value::Object(parameters));
    out.insert("parameter_properties".into(), Value::Array(properties));
    out.insert("validate_args".into(), Value::from(dist.validate_args()));
    out.insert("allow_nan_stats".into(), Value::from(dist.allow_nan_stats()));
    out.insert("reparameterization_type".into(), serde_json::to_value(dist.reparameterization_type())?);
    out.insert(
        "event_space_bijector".into(),
        Value::from(dist.default_event_space_bijector().name()),
    );
    out.insert("median".into(), tensor::tensor_to_json(&dist.median()?));

    write_json(output, Value::Object(out))
}

fn cmd_log_prob(
    config: &PathBuf,
    x: &str,
    unconstrained: bool,
    output: Option<&PathBuf>,
) -> Result<()> {
    let dist = load_distribution(config, unconstrained)?;
    let x = parse_points("x", x)?;
    let lp = dist.log_prob(&x)?;
    tracing::info!(shape = ?lp.shape(), "log_prob evaluated");

    let mut out = header(&dist)?;
    out.insert("log_prob".into(), tensor::tensor_to_json(&lp));
    write_json(output, Value::Object(out))
}

fn cmd_cdf(config: &PathBuf, x: &str, output: Option<&PathBuf>) -> Result<()> {
    let dist = load_distribution(config, false)?;
    let x = parse_points("x", x)?;
    let cdf = dist.cdf(&x)?;
    tracing::info!(shape = ?cdf.shape(), "cdf evaluated");

    let mut out = header(&dist)?;
    out.insert("cdf".into(), tensor::tensor_to_json(&cdf));
    write_json(output, Value::Object(out))
}

fn cmd_quantile(config: &PathBuf, p: &str, output: Option<&PathBuf>) -> Result<()> {
    let dist = load_distribution(config, false)?;
    let p = parse_points("p", p)?;
    let q = dist.quantile(&p)?;
    tracing::info!(shape = ?q.shape(), "quantile evaluated");

    let mut out = header(&dist)?;
    out.insert("quantile".into(), tensor::tensor_to_json(&q));
    write_json(output, Value::Object(out))
}

fn cmd_sample(
    config: &PathBuf,
    shape: &[usize],
    seed: Option<u64>,
    unconstrained: bool,
    output: Option<&PathBuf>,
) -> Result<()> {
    let dist = load_distribution(config, unconstrained)?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let samples = dist.sample(shape, &mut rng)?;
    tracing::info!(shape = ?samples.shape(), seed = ?seed, "sampled");

    let mut out = header(&dist)?;
    out.insert("sample_shape".into(), serde_json::to_value(shape)?);
    out.insert("seed".into(), serde_json::to_value(seed)?);
    out.insert("samples".into(), tensor::tensor_to_json(&samples));
    write_json(output, Value::Object(out))
}

fn write_json(output: Option<&PathBuf>, value: Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
