//! Subcommand implementations

use crate::cli::{BackendKind, EvalArgs, PreprocessArgs, ServeArgs, SplitArgs, TrainArgs};
use crate::config::TrainConfig;
use anyhow::{bail, Context};
use candle_core::Device;
use haetae_backends::{Backend, ClovaBackend, LocalAdapterBackend, OpenAiBackend};
use haetae_core::SplitRatios;
use haetae_data::{
    build_canonical, partition, read_canonical_csv, read_raw_tsv, write_canonical_csv,
    MalformedLabelPolicy,
};
use haetae_eval::{evaluate, EvalOptions};
use haetae_model::{train, Backbone, BackboneSource, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub fn preprocess(args: &PreprocessArgs) -> anyhow::Result<()> {
    let policy = if args.skip_malformed {
        MalformedLabelPolicy::SkipAndCount
    } else {
        MalformedLabelPolicy::Abort
    };

    let mut sources = Vec::with_capacity(args.input.len());
    for path in &args.input {
        let rows = read_raw_tsv(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        info!(path = %path.display(), rows = rows.len(), "loaded annotation file");
        sources.push(rows);
    }

    let (examples, report) = build_canonical(&sources, policy)?;
    write_canonical_csv(&args.output, &examples)?;

    println!(
        "Wrote {} examples to {} ({} malformed rows skipped)",
        report.kept,
        args.output.display(),
        report.skipped
    );
    Ok(())
}

pub fn split(args: &SplitArgs) -> anyhow::Result<()> {
    let ratios = SplitRatios::new(args.train, args.validation, args.test)?;
    let examples = read_canonical_csv(&args.input)?;
    let partitioned = partition(&examples, ratios, args.seed)?;

    std::fs::create_dir_all(&args.out_dir)?;
    for (name, part) in [
        ("train.csv", &partitioned.train),
        ("validation.csv", &partitioned.validation),
        ("test.csv", &partitioned.test),
    ] {
        let path = args.out_dir.join(name);
        write_canonical_csv(&path, part)?;
        println!("Wrote {} examples to {}", part.len(), path.display());
    }
    Ok(())
}

pub fn run_train(args: &TrainArgs) -> anyhow::Result<()> {
    let mut config = TrainConfig::load(args.config.as_deref())?;
    if let Some(rank) = args.rank {
        config.lora.rank = rank;
    }
    if let Some(alpha) = args.alpha {
        config.lora.alpha = alpha;
    }
    if let Some(learning_rate) = args.learning_rate {
        config.schedule.learning_rate = learning_rate;
    }
    if let Some(batch_size) = args.batch_size {
        config.schedule.batch_size = batch_size;
    }
    if let Some(epochs) = args.epochs {
        config.schedule.epochs = epochs;
    }
    if let Some(seed) = args.seed {
        config.schedule.seed = seed;
    }

    let train_set = read_canonical_csv(&args.train)?;
    let val_set = read_canonical_csv(&args.validation)?;

    let device = Device::Cpu;
    let files = BackboneSource::parse(&args.backbone).resolve()?;
    let mut backbone = Backbone::load(&files, &device)?;
    let encoder = TextEncoder::from_file(&files.tokenizer, config.schedule.max_seq_len, &device)?;

    info!(
        backbone = backbone.id(),
        train = train_set.len(),
        validation = val_set.len(),
        "starting adapter training"
    );
    let outcome = train(
        &mut backbone,
        &encoder,
        &config.lora,
        &config.schedule,
        &train_set,
        &val_set,
        &args.output,
    )?;

    println!(
        "Best epoch {} with validation F1 {:.4}; adapter saved to {}",
        outcome.best_epoch,
        outcome.best_f1,
        args.output.display()
    );
    Ok(())
}

pub async fn eval(args: &EvalArgs) -> anyhow::Result<()> {
    let backend: Box<dyn Backend> = match args.backend {
        BackendKind::Local => {
            let (Some(adapter), Some(backbone)) = (&args.adapter, &args.backbone) else {
                bail!("the local backend requires --adapter and --backbone");
            };
            let files = BackboneSource::parse(backbone).resolve()?;
            let backend =
                LocalAdapterBackend::compose(&files, adapter, 128, &Device::Cpu)?;
            Box::new(backend)
        }
        BackendKind::Openai => Box::new(OpenAiBackend::from_env()?),
        BackendKind::Clova => Box::new(ClovaBackend::from_env()?),
    };

    let examples = read_canonical_csv(&args.test)?;
    let options = EvalOptions {
        sample_limit: args.limit,
    };
    let report = evaluate(backend.as_ref(), &examples, &options).await?;

    println!("Backend: {}", backend.name());
    println!("{report}");
    Ok(())
}

pub async fn serve(args: &ServeArgs) -> anyhow::Result<()> {
    let files = BackboneSource::parse(&args.backbone).resolve()?;
    let backend = LocalAdapterBackend::compose(&files, &args.adapter, 128, &Device::Cpu)?;

    let addr: SocketAddr = format!("{}:{}", args.listen, args.port).parse()?;
    crate::server::run(addr, Arc::new(backend)).await
}
