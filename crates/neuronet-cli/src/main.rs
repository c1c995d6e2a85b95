// SPDX-License-Identifier: AGPL-3.0-only

//! `neuronet`: classify inputs with an MLP on the dot-product accelerator.
//!
//! ```text
//! USAGE:
//!   neuronet info <MODEL>                      Shape and arena sizes of a model file
//!   neuronet eval <MODEL> <INPUTS> [--labels]  Classify every input vector
//!   neuronet selftest                          Run the built-in [2,2,1] network
//! ```

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use dsa_chip::regs::DSA_BASE;
use dsa_driver::{
    select_port, Accelerator, AcceleratorPort, DotProduct, HandshakeConfig, PortSelection,
    SimulatedPort,
};
use neuronet::model_file::{read_inputs, read_labels};
use neuronet::{InferenceEngine, ModelFile, Network};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "neuronet", about = "MLP inference on the dot-product accelerator", version)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the shape and arena sizes of a model file.
    Info {
        /// Model file.
        model: PathBuf,
    },
    /// Classify every vector of an input file.
    Eval {
        /// Model file.
        model: PathBuf,
        /// Input file (concatenated little-endian f32 vectors).
        inputs: PathBuf,
        /// Label file (one byte per input) for accuracy reporting.
        #[arg(long)]
        labels: Option<PathBuf>,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Run the built-in [2,2,1] network on the simulator and the chosen backend.
    Selftest {
        #[command(flatten)]
        device: DeviceArgs,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// In-memory device model.
    Sim,
    /// Physical register window through a memory device (root).
    Mmio,
}

#[derive(Args)]
struct DeviceArgs {
    /// Accelerator backend.
    #[arg(long, value_enum, default_value_t = Backend::Sim)]
    backend: Backend,
    /// Memory device mapped by the mmio backend.
    #[arg(long, default_value = dsa_driver::backends::mmio::DEFAULT_MEM_DEVICE)]
    mem_device: PathBuf,
    /// Maximum `ready` reads per request.
    #[arg(long, default_value_t = HandshakeConfig::DEFAULT_MAX_POLLS)]
    max_polls: u32,
    /// Wall-clock budget per request in milliseconds (0 disables).
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
    /// Simulated device latency in `ready` reads.
    #[arg(long, default_value_t = 0)]
    latency_polls: u32,
}

impl DeviceArgs {
    fn handshake(&self) -> HandshakeConfig {
        let config = HandshakeConfig::default().with_max_polls(self.max_polls);
        if self.timeout_ms == 0 {
            config.without_timeout()
        } else {
            config.with_timeout(Duration::from_millis(self.timeout_ms))
        }
    }

    fn open(&self) -> Result<Accelerator<Box<dyn AcceleratorPort>>> {
        let port: Box<dyn AcceleratorPort> = match self.backend {
            Backend::Sim => {
                Box::new(SimulatedPort::new().with_latency_polls(self.latency_polls))
            }
            Backend::Mmio => select_port(&PortSelection::Mmio {
                path: self.mem_device.clone(),
                base: DSA_BASE,
            })
            .with_context(|| {
                format!(
                    "mapping accelerator window {DSA_BASE:#x}+{:#x} via {}",
                    dsa_chip::WINDOW_SIZE,
                    self.mem_device.display()
                )
            })?,
        };
        let config = self.handshake();
        info!(
            "Using {} accelerator port: max {} polls, timeout {:?}",
            port.port_type(),
            config.max_polls,
            config.timeout
        );
        Ok(Accelerator::new(port).with_config(config))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .init();

    match cli.command {
        Cmd::Info { model } => cmd_info(&model)?,
        Cmd::Eval {
            model,
            inputs,
            labels,
            device,
        } => cmd_eval(&model, &inputs, labels.as_deref(), &device)?,
        Cmd::Selftest { device } => cmd_selftest(&device)?,
    }

    Ok(())
}

fn cmd_info(path: &std::path::Path) -> Result<()> {
    let model = ModelFile::from_file(path)
        .with_context(|| format!("loading model {}", path.display()))?;
    let shape = model.shape();

    println!("Model        : {}", path.display());
    println!("Layers       : {}  {shape}", shape.layer_count());
    println!("Inputs       : {}", shape.input_width());
    println!("Classes      : {}", shape.output_width());
    println!(
        "Neurons      : {} ({} bytes)",
        shape.total_neurons(),
        shape.total_neurons() * std::mem::size_of::<f32>()
    );
    println!(
        "Weights      : {} ({} bytes)",
        shape.total_weights(),
        shape.total_weights() * std::mem::size_of::<f32>()
    );
    println!(
        "Max fan-in   : {} (accelerator capacity {})",
        shape.max_fan_in(),
        dsa_chip::sram::CAPACITY
    );

    Ok(())
}

fn cmd_eval(
    model: &std::path::Path,
    inputs: &std::path::Path,
    labels: Option<&std::path::Path>,
    device: &DeviceArgs,
) -> Result<()> {
    let mut network = ModelFile::from_file(model)
        .and_then(ModelFile::into_network)
        .with_context(|| format!("loading model {}", model.display()))?;
    let vectors = read_inputs(inputs, network.shape().input_width())
        .with_context(|| format!("reading inputs {}", inputs.display()))?;
    let labels = labels
        .map(|path| read_labels(path).with_context(|| format!("reading labels {}", path.display())))
        .transpose()?;
    if let Some(labels) = &labels {
        if labels.len() != vectors.len() {
            bail!("{} labels for {} inputs", labels.len(), vectors.len());
        }
    }

    let mut engine = InferenceEngine::new(device.open()?);
    let mut correct = 0usize;
    let mut elapsed = Duration::ZERO;

    for (i, input) in vectors.iter().enumerate() {
        let eval = engine
            .evaluate_detailed(&mut network, input)
            .with_context(|| format!("input {i}"))?;
        elapsed += eval.duration;

        match labels.as_ref().map(|l| l[i]) {
            Some(label) => {
                let mark = if eval.class == label { "ok" } else { "MISS" };
                if eval.class == label {
                    correct += 1;
                }
                println!("[{i}] class {}  label {label}  {mark}", eval.class);
            }
            None => println!("[{i}] class {}", eval.class),
        }
    }

    println!();
    if labels.is_some() && !vectors.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let accuracy = correct as f64 / vectors.len() as f64 * 100.0;
        println!("Accuracy     : {correct}/{} ({accuracy:.2}%)", vectors.len());
    }
    info!("Classified {} inputs in {elapsed:?}", vectors.len());
    print_stats(engine.accelerator(), vectors.len(), elapsed);

    Ok(())
}

fn print_stats(acc: &impl DotProduct, inputs: usize, elapsed: Duration) {
    let stats = acc.stats();
    println!("Inputs       : {inputs}");
    println!("Requests     : {}", stats.requests);
    println!(
        "Polls        : {} total, {:.1} mean, {} worst",
        stats.total_polls,
        stats.mean_polls(),
        stats.max_polls
    );
    println!("Elapsed      : {elapsed:?}");
}

/// Weights of the built-in network: every weight 1, every bias 0
const SELFTEST_WEIGHTS: [f32; 9] = [1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0];

fn selftest_on<D: DotProduct>(name: &str, accelerator: D) -> Result<()> {
    let mut network = Network::new(3, &[2, 2, 1])?;
    network.load(&SELFTEST_WEIGHTS)?;

    let mut engine = InferenceEngine::new(accelerator);
    let class = engine.evaluate(&mut network, &[1.0, 1.0])?;
    let hidden = network.layer_values(1).unwrap_or_default().to_vec();
    let output = network.output().to_vec();

    let pass = class == 0 && hidden == [2.0, 2.0] && output == [4.0];
    println!(
        "{name:<10} hidden {hidden:?}  output {output:?}  class {class}  {}",
        if pass { "PASS" } else { "FAIL" }
    );
    if !pass {
        bail!("{name}: expected hidden [2.0, 2.0], output [4.0], class 0");
    }
    Ok(())
}

fn cmd_selftest(device: &DeviceArgs) -> Result<()> {
    selftest_on("simulated", Accelerator::new(SimulatedPort::new()))?;
    if device.backend == Backend::Mmio {
        selftest_on("mmio", device.open()?)?;
    }
    Ok(())
}
