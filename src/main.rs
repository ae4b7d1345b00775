//! kicau CLI - Bird song classification service
//!
//! Serves the classifier over HTTP or classifies single recordings offline

use clap::{Parser, Subcommand};
use kicau::{
    audio::load_audio,
    model::{self, check_ort_availability},
    server::{self, AppState},
    Config, Error, InferencePipeline, Result, WorkerPool,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "kicau",
    about = "Bird song classification service",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// ONNX model path
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Bind port
        #[arg(short, long)]
        port: Option<u16>,

        /// Inference worker threads
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Classify a single recording
    Predict {
        /// Input audio file (mp3, wav, m4a)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// ONNX model path
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Generate default configuration file
    InitConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Show information about the system
    Info,

    /// Time the preprocessing pipeline on a synthetic recording
    Benchmark {
        /// Number of iterations
        #[arg(short, long, default_value = "10")]
        iterations: usize,
    },
}

fn load_config(path: Option<PathBuf>, model: Option<PathBuf>) -> Result<Config> {
    let mut cfg = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(model) = model {
        cfg.model.path = model;
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            model,
            host,
            port,
            workers,
        } => {
            let mut cfg = load_config(config, model)?;
            if let Some(host) = host {
                cfg.server.host = host;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            if let Some(workers) = workers {
                cfg.server.workers = workers;
            }
            cfg.validate()?;

            log::info!("kicau {} starting", kicau::VERSION);
            log::info!("Model path: {}", cfg.model.path.display());

            let classifier = model::load_classifier(&cfg.model);
            match classifier.as_ref() {
                Some(m) => log::info!(
                    "Model loaded, input shape {:?}",
                    model::format_shape(&m.input_shape())
                ),
                None => log::warn!("Serving without a model; /predict will fail"),
            }

            let pipeline = Arc::new(InferencePipeline::new(&cfg, classifier));
            let audio = pipeline.audio_config();
            log::info!(
                "Features: {:.1}s clips at {} Hz -> ({}, {}, 1)",
                audio.duration_seconds,
                audio.sample_rate,
                audio.n_mels,
                audio.num_frames()
            );
            let pool = WorkerPool::new(cfg.server.workers)?;
            log::info!("Inference workers: {}", pool.size());

            let state = AppState::new(&cfg, pipeline, pool);
            let address = cfg.server.bind_address();

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::serve(state, &address))?;
        }

        Commands::Predict {
            input,
            config,
            model,
        } => {
            let cfg = load_config(config, model)?;
            cfg.validate()?;

            let classifier = model::load_classifier(&cfg.model).ok_or(Error::ModelUnavailable)?;
            let pipeline = InferencePipeline::new(&cfg, Some(classifier));

            let audio = load_audio(&input)?;
            log::info!(
                "Loaded {} ({:.2}s at {} Hz)",
                input.display(),
                audio.duration(),
                audio.sample_rate
            );

            let result = pipeline.run_decoded(&audio)?;

            println!("✓ {}", input.display());
            println!("  eBird code: {}", result.label);
            println!("  Confidence: {:.4}", result.confidence);
            println!("  Processing time: {:.3}s", result.elapsed.as_secs_f64());
        }

        Commands::InitConfig { output } => {
            log::info!("Creating default configuration...");

            Config::create_default(&output)?;

            println!("✓ Configuration saved to: {}", output.display());
        }

        Commands::Info => {
            println!("kicau - Bird Song Classification Service");
            println!("========================================");
            println!("Version: {}", kicau::VERSION);
            println!("Platform: {}", std::env::consts::OS);
            println!("Architecture: {}", std::env::consts::ARCH);
            println!();
            println!("Sample Rate: {} Hz", kicau::SAMPLE_RATE);
            println!("Clip Length: {} s", kicau::DURATION_SECONDS);
            println!("Mel Bands: {}", kicau::N_MELS);
            println!("FFT Size: {}", kicau::N_FFT);
            println!("Hop Length: {}", kicau::HOP_LENGTH);
            println!("Upload Limit: {} MiB", kicau::MAX_UPLOAD_BYTES / (1024 * 1024));
            println!("Formats: {}", kicau::ALLOWED_EXTENSIONS.join(", "));
            println!("Classes: {}", kicau::CLASS_NAMES.join(", "));
            println!();
            println!("ONNX Runtime: {:?}", check_ort_availability());
            println!("CPU Cores: {}", num_cpus::get());
            println!("Physical Cores: {}", num_cpus::get_physical());
        }

        Commands::Benchmark { iterations } => {
            log::info!("Running benchmarks ({} iterations)...", iterations);

            benchmark_preprocessing(iterations.max(1))?;

            println!("✓ Benchmarks complete");
        }
    }

    Ok(())
}

fn benchmark_preprocessing(iterations: usize) -> Result<()> {
    use kicau::audio::AudioData;
    use std::time::Instant;

    println!("\nPreprocessing Benchmark");
    println!("-----------------------");

    let cfg = Config::default();
    let pipeline = InferencePipeline::new(&cfg, None);

    let sample_rate = 44100;
    let num_samples = sample_rate as usize * 5;
    let signal: Vec<f32> = (0..num_samples)
        .map(|i| (i as f32 * 0.05).sin() * 0.3)
        .collect();
    let audio = AudioData::new(signal, sample_rate);

    let start = Instant::now();
    for _ in 0..iterations {
        pipeline.features_from(&audio)?;
    }
    let elapsed = start.elapsed();

    let per_iter = elapsed.as_secs_f32() / iterations as f32;
    println!(
        "  Signal length: {} samples ({:.2}s at {} Hz)",
        num_samples,
        audio.duration(),
        sample_rate
    );
    println!("  Iterations: {}", iterations);
    println!("  Total time: {:.3}s", elapsed.as_secs_f32());
    println!("  Per iteration: {:.3}ms", per_iter * 1000.0);
    println!("  Throughput: {:.1}x real-time", audio.duration() / per_iter);
    Ok(())
}
