// crates/storpulse-cli/src/main.rs

//! Command-line wrapper over the public heartbeat contract.
//!
//! The verifier keeps a scheme config file (it holds the secret key); the
//! prover works from the key-stripped `public` copy, the tag, and the
//! file. Every transported object lives on disk as JSON or CBOR, chosen
//! by extension.

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use storpulse_core::{io, Scheme};
use storpulse_merkle::MerkleScheme;
use storpulse_swizzle::SwizzleScheme;

#[derive(Parser, Debug)]
#[command(
    name = "storpulse",
    about = "Proof-of-storage heartbeats",
    long_about = "Proof-of-storage heartbeats.\n\nTag files for remote auditing, then challenge the holder to prove it still has them.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Generate a verifier config (holds the secret key; keep it private).
    Setup {
        /// Heartbeat scheme to configure
        #[arg(value_enum, long)]
        scheme: SchemeOpt,

        /// Swizzle: sectors per chunk
        #[arg(long, default_value_t = 10)]
        sectors: u64,

        /// Swizzle: bit length of the generated field modulus
        #[arg(long, default_value_t = 1024)]
        prime_bits: u64,

        /// Swizzle: seal states convergently (equal states seal identically)
        #[arg(long, default_value_t = false)]
        convergent: bool,

        /// Merkle: fraction of the file to cover per spot check
        #[arg(long)]
        check_fraction: Option<f64>,

        /// Output path for the scheme config (JSON/CBOR)
        #[arg(long, default_value = "scheme.json")]
        out: PathBuf,
    },

    /// Write a key-stripped copy of a config for the prover side.
    Public {
        /// Verifier config path
        #[arg(long)]
        scheme_file: PathBuf,

        /// Output path for the stripped copy
        #[arg(long, default_value = "scheme.public.json")]
        out: PathBuf,
    },

    /// Tag a file: produces the tag (for the prover) and the state.
    Encode {
        /// Verifier config path
        #[arg(long)]
        scheme_file: PathBuf,

        /// File to tag
        #[arg(long)]
        file: PathBuf,

        /// Output path for the tag (JSON/CBOR)
        #[arg(long, default_value = "tag.json")]
        out_tag: PathBuf,

        /// Output path for the state (JSON/CBOR)
        #[arg(long, default_value = "state.json")]
        out_state: PathBuf,
    },

    /// Issue the next challenge; rewrites the state file in place.
    Challenge {
        /// Verifier config path
        #[arg(long)]
        scheme_file: PathBuf,

        /// State path (read and rewritten)
        #[arg(long)]
        state: PathBuf,

        /// Output path for the challenge (JSON/CBOR)
        #[arg(long, default_value = "challenge.json")]
        out: PathBuf,
    },

    /// Answer a challenge from the file and the tag.
    Prove {
        /// Scheme config path (the public copy suffices)
        #[arg(long)]
        scheme_file: PathBuf,

        /// File under audit
        #[arg(long)]
        file: PathBuf,

        /// Challenge path
        #[arg(long)]
        challenge: PathBuf,

        /// Tag path
        #[arg(long)]
        tag: PathBuf,

        /// Output path for the proof (JSON/CBOR)
        #[arg(long, default_value = "proof.json")]
        out: PathBuf,
    },

    /// Check a proof; exits non-zero if it fails.
    Verify {
        /// Verifier config path
        #[arg(long)]
        scheme_file: PathBuf,

        /// Proof path
        #[arg(long)]
        proof: PathBuf,

        /// Challenge path
        #[arg(long)]
        challenge: PathBuf,

        /// State path
        #[arg(long)]
        state: PathBuf,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum SchemeOpt {
    /// Merkle spot-check heartbeat (small tag, bounded challenges)
    Merkle,
    /// Shacham-Waters full-audit heartbeat (unlimited challenges)
    Swizzle,
}

/// On-disk scheme config: the scheme kind plus its parameters.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "params", rename_all = "snake_case")]
enum SchemeConfig {
    Merkle(MerkleScheme),
    Swizzle(SwizzleScheme),
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let outcome = match cli.cmd {
        Cmd::Setup {
            scheme,
            sectors,
            prime_bits,
            convergent,
            check_fraction,
            out,
        } => setup(scheme, sectors, prime_bits, convergent, check_fraction, &out),

        Cmd::Public { scheme_file, out } => public(&scheme_file, &out),

        Cmd::Encode {
            scheme_file,
            file,
            out_tag,
            out_state,
        } => encode(&scheme_file, &file, &out_tag, &out_state),

        Cmd::Challenge {
            scheme_file,
            state,
            out,
        } => challenge(&scheme_file, &state, &out),

        Cmd::Prove {
            scheme_file,
            file,
            challenge,
            tag,
            out,
        } => prove(&scheme_file, &file, &challenge, &tag, &out),

        Cmd::Verify {
            scheme_file,
            proof,
            challenge,
            state,
        } => verify(&scheme_file, &proof, &challenge, &state),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn load_config(path: &Path) -> Result<SchemeConfig> {
    io::read_auto(path).with_context(|| format!("reading scheme config {}", path.display()))
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("opening {}", path.display()))
}

fn setup(
    scheme: SchemeOpt,
    sectors: u64,
    prime_bits: u64,
    convergent: bool,
    check_fraction: Option<f64>,
    out: &Path,
) -> Result<ExitCode> {
    let config = match scheme {
        SchemeOpt::Merkle => {
            let mut m = MerkleScheme::new();
            if let Some(fraction) = check_fraction {
                m = m.with_check_fraction(fraction);
            }
            SchemeConfig::Merkle(m)
        }
        SchemeOpt::Swizzle => {
            info!(prime_bits, "generating field modulus");
            let s =
                SwizzleScheme::with_params(sectors, None, None, prime_bits).convergent(convergent);
            SchemeConfig::Swizzle(s)
        }
    };
    io::write_auto(out, &config)
        .with_context(|| format!("writing scheme config {}", out.display()))?;
    println!("Wrote verifier config to {} (keep it secret)", out.display());
    Ok(ExitCode::SUCCESS)
}

fn public(scheme_file: &Path, out: &Path) -> Result<ExitCode> {
    let stripped = match load_config(scheme_file)? {
        SchemeConfig::Merkle(m) => SchemeConfig::Merkle(m.public()),
        SchemeConfig::Swizzle(s) => SchemeConfig::Swizzle(s.public()),
    };
    io::write_auto(out, &stripped)
        .with_context(|| format!("writing public config {}", out.display()))?;
    println!("Wrote key-stripped config to {}", out.display());
    Ok(ExitCode::SUCCESS)
}

fn encode(scheme_file: &Path, file: &Path, out_tag: &Path, out_state: &Path) -> Result<ExitCode> {
    let config = load_config(scheme_file)?;
    let mut stream = open_file(file)?;

    info!(file = %file.display(), "encoding");
    match config {
        SchemeConfig::Merkle(m) => {
            let (tag, state) = m.encode(&mut stream)?;
            io::write_auto(out_tag, &tag)?;
            io::write_auto(out_state, &state)?;
        }
        SchemeConfig::Swizzle(s) => {
            let (tag, state) = s.encode(&mut stream)?;
            io::write_auto(out_tag, &tag)?;
            io::write_auto(out_state, &state)?;
        }
    }
    println!(
        "Encoded {} → tag {}, state {}",
        file.display(),
        out_tag.display(),
        out_state.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn challenge(scheme_file: &Path, state_path: &Path, out: &Path) -> Result<ExitCode> {
    match load_config(scheme_file)? {
        SchemeConfig::Merkle(m) => {
            let mut state = io::read_auto(state_path)
                .with_context(|| format!("reading state {}", state_path.display()))?;
            let chal = m.gen_challenge(&mut state)?;
            io::write_auto(out, &chal)?;
            // The challenge advanced the state; persist it for next round.
            io::write_auto(state_path, &state)?;
        }
        SchemeConfig::Swizzle(s) => {
            let mut state = io::read_auto(state_path)
                .with_context(|| format!("reading state {}", state_path.display()))?;
            let chal = s.gen_challenge(&mut state)?;
            io::write_auto(out, &chal)?;
        }
    }
    println!("Wrote challenge to {}", out.display());
    Ok(ExitCode::SUCCESS)
}

fn prove(
    scheme_file: &Path,
    file: &Path,
    challenge: &Path,
    tag: &Path,
    out: &Path,
) -> Result<ExitCode> {
    let config = load_config(scheme_file)?;
    let mut stream = open_file(file)?;

    match config {
        SchemeConfig::Merkle(m) => {
            let chal = io::read_auto(challenge)?;
            let tag = io::read_auto(tag)?;
            let proof = m.prove(&mut stream, &chal, &tag)?;
            io::write_auto(out, &proof)?;
        }
        SchemeConfig::Swizzle(s) => {
            let chal = io::read_auto(challenge)?;
            let tag = io::read_auto(tag)?;
            let proof = s.prove(&mut stream, &chal, &tag)?;
            io::write_auto(out, &proof)?;
        }
    }
    println!("Wrote proof to {}", out.display());
    Ok(ExitCode::SUCCESS)
}

fn verify(scheme_file: &Path, proof: &Path, challenge: &Path, state: &Path) -> Result<ExitCode> {
    let ok = match load_config(scheme_file)? {
        SchemeConfig::Merkle(m) => {
            let proof = io::read_auto(proof)?;
            let chal = io::read_auto(challenge)?;
            let state = io::read_auto(state)?;
            m.verify(&proof, &chal, &state)?
        }
        SchemeConfig::Swizzle(s) => {
            let proof = io::read_auto(proof)?;
            let chal = io::read_auto(challenge)?;
            let state = io::read_auto(state)?;
            s.verify(&proof, &chal, &state)?
        }
    };

    if ok {
        println!("ok");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("verification FAILED");
        Ok(ExitCode::FAILURE)
    }
}
