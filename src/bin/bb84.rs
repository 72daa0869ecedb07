//! BB84 simulation CLI
//!
//! Runs local key-distribution rounds and exercises the quantum oracle.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use bb84_sim::protocols::bb84;
use bb84_sim::{
    Basis, ChannelNoise, NoiseConfig, NoiseUpdate, QuantumOracle, QubitDescriptor, SimulatedOracle,
    bit_from_u8, format_bits, sift, wire,
};

#[derive(Parser)]
#[command(name = "bb84")]
#[command(about = "BB84 quantum key distribution simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full round between two local parties
    Simulate {
        /// Number of raw qubits
        #[arg(short, long, default_value_t = 256)]
        length: usize,

        /// JSON noise configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Enable the intercept-resend eavesdropper
        #[arg(long)]
        eve: bool,

        /// Classical bit-flip probability in transit
        #[arg(long)]
        network_noise: Option<f64>,

        /// Depolarizing probability per gate
        #[arg(long)]
        channel_noise: Option<f64>,

        /// Drop probability in transit
        #[arg(long)]
        packet_loss: Option<f64>,

        /// T1 in microseconds
        #[arg(long)]
        t1: Option<f64>,

        /// T2 in microseconds
        #[arg(long)]
        t2: Option<f64>,

        /// Duration of one gate in nanoseconds
        #[arg(long, default_value_t = bb84_sim::oracle::DEFAULT_GATE_TIME_NS)]
        gate_time: f64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Prepare and measure one qubit many times and report the outcome counts
    OracleCheck {
        /// Encoded bit (0 or 1)
        #[arg(short, long, default_value_t = 0)]
        bit: u8,

        #[arg(long, value_enum, default_value_t = BasisArg::Rectilinear)]
        encode: BasisArg,

        #[arg(long, value_enum, default_value_t = BasisArg::Rectilinear)]
        measure: BasisArg,

        #[arg(short, long, default_value_t = 1000)]
        trials: usize,

        /// Depolarizing probability per gate
        #[arg(long, default_value_t = 0.0)]
        channel_noise: f64,

        #[arg(long, default_value_t = bb84_sim::config::DEFAULT_T1_US)]
        t1: f64,

        #[arg(long, default_value_t = bb84_sim::config::DEFAULT_T2_US)]
        t2: f64,

        /// Duration of one gate in nanoseconds
        #[arg(long, default_value_t = bb84_sim::oracle::DEFAULT_GATE_TIME_NS)]
        gate_time: f64,
    },

    /// Sift digit strings, e.g. `sift 01010 00111 01011`
    Sift {
        /// Sender bases (0 = rectilinear, 1 = diagonal)
        sender_bases: String,

        /// Receiver bases
        receiver_bases: String,

        /// Receiver measured bits
        receiver_bits: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BasisArg {
    Rectilinear,
    Diagonal,
}

impl From<BasisArg> for Basis {
    fn from(arg: BasisArg) -> Self {
        match arg {
            BasisArg::Rectilinear => Basis::Rectilinear,
            BasisArg::Diagonal => Basis::Diagonal,
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bb84=info,bb84_sim=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            length,
            config,
            eve,
            network_noise,
            channel_noise,
            packet_loss,
            t1,
            t2,
            gate_time,
            json,
        } => {
            let update = NoiseUpdate {
                eve_active: eve.then_some(true),
                network_noise_rate: network_noise,
                channel_noise_rate: channel_noise,
                t1,
                t2,
                packet_loss_rate: packet_loss,
            };
            cmd_simulate(length, config, update, SimulatedOracle::with_gate_time(gate_time), json)
        }
        Commands::OracleCheck {
            bit,
            encode,
            measure,
            trials,
            channel_noise,
            t1,
            t2,
            gate_time,
        } => cmd_oracle_check(
            SimulatedOracle::with_gate_time(gate_time),
            bit,
            encode.into(),
            measure.into(),
            trials,
            ChannelNoise {
                rate: channel_noise,
                t1,
                t2,
            },
        ),
        Commands::Sift {
            sender_bases,
            receiver_bases,
            receiver_bits,
        } => cmd_sift(&sender_bases, &receiver_bases, &receiver_bits),
    }
}

fn cmd_simulate(
    length: usize,
    path: Option<String>,
    update: NoiseUpdate,
    oracle: SimulatedOracle,
    json: bool,
) -> Result<()> {
    let base = match path {
        Some(path) => NoiseConfig::from_json_file(&path)
            .with_context(|| format!("loading noise config from {path}"))?,
        None => NoiseConfig::default(),
    };
    let config = base.apply_update(&update)?;
    info!(?config, length, "starting simulation");

    let report = bb84::run(length, &config, &oracle)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Raw qubits:      {}", report.raw_length);
    println!(
        "Received:        {} ({} dropped, {} flipped, {} intercepted)",
        report.received_length,
        report.channel.dropped_count,
        report.channel.flipped_count,
        report.channel.intercepted_count
    );
    println!(
        "Sifted key:      {} bits, {} errors ({:.2}% QBER)",
        report.sifted_length, report.sifted_errors, report.sifted_qber
    );
    println!(
        "Sample check:    {} errors ({:.2}% QBER)",
        report.verification.error_count, report.verification.qber
    );

    match (&report.sender_key, &report.receiver_key) {
        (Some(sender), Some(receiver)) => {
            println!("Result:          key accepted ({} bits)", sender.len());
            println!("  sender:   {}", format_bits(sender));
            println!("  receiver: {}", format_bits(receiver));
        }
        _ => println!("Result:          key rejected"),
    }
    Ok(())
}

fn cmd_oracle_check(
    oracle: SimulatedOracle,
    bit: u8,
    encode: Basis,
    measure: Basis,
    trials: usize,
    noise: ChannelNoise,
) -> Result<()> {
    let descriptor = QubitDescriptor::new(bit_from_u8(bit)?, encode);
    oracle.gate_noise(&noise).context("invalid channel noise")?;

    let mut ones = 0usize;
    for _ in 0..trials {
        if oracle.prepare_and_measure(descriptor, measure, &noise)? {
            ones += 1;
        }
    }

    println!(
        "Prepared {} (basis {}), measured in basis {} over {} trials",
        descriptor.state_label(),
        encode,
        measure,
        trials
    );
    println!("  0: {}", trials - ones);
    println!("  1: {}", ones);
    if trials > 0 {
        println!("  zero frequency: {:.3}", (trials - ones) as f64 / trials as f64);
    }
    Ok(())
}

fn parse_digits(raw: &str) -> Result<Vec<u8>> {
    raw.chars()
        .map(|c| match c {
            '0' => Ok(0),
            '1' => Ok(1),
            other => bail!("expected 0 or 1, found {other:?}"),
        })
        .collect()
}

fn cmd_sift(sender_bases: &str, receiver_bases: &str, receiver_bits: &str) -> Result<()> {
    let sender_bases = wire::parse_bases(&parse_digits(sender_bases)?)?;
    let receiver_bases = wire::parse_bases(&parse_digits(receiver_bases)?)?;
    let receiver_bits = wire::parse_bits(&parse_digits(receiver_bits)?)?;

    let sifted = sift(&sender_bases, &receiver_bases, &receiver_bits)?;
    println!("Sifted bits:   {}", format_bits(&sifted.bits));
    println!("Match indices: {:?}", sifted.match_indices);
    Ok(())
}
