//! Transitbox CLI - Passphrase-based JSON payload encryption
//!
//! Command-line interface for encrypting and decrypting JSON payload
//! files as transit envelopes (PBKDF2-HMAC-SHA1 key derivation,
//! AES-256-CBC).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use transitbox::file_ops;
use transitbox::kdf::KdfParams;
use transitbox::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use transitbox::payloadcrypt;

#[derive(Parser)]
#[command(name = "transitbox")]
#[command(version)]
#[command(about = "Passphrase-based JSON payload encryption.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Use the legacy key-stretching parameters (100 PBKDF2 iterations);
    /// required for decrypting legacy envelopes
    #[arg(long, global = true)]
    legacy: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a JSON payload file into an envelope file
    #[command(alias = "e")]
    Encrypt {
        /// Path to the JSON payload file to encrypt
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the envelope to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Decrypt an envelope file back into a JSON payload file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the envelope file to decrypt
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the JSON payload to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Update an envelope file with a new payload, while validating
    /// that the passphrase is not accidentally changed.
    #[command(alias = "u")]
    Update {
        /// Path to the JSON payload file to encrypt
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing envelope file to replace
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Generate a random 256-bit key as hex, usable as a passphrase
    #[command(alias = "k")]
    Key,
}

fn main() {
    let cli = Cli::parse();

    let params = if cli.legacy {
        KdfParams::legacy()
    } else {
        KdfParams::default()
    };

    let result = match cli.command {
        Commands::Encrypt { input, output } => {
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            file_ops::encrypt_file(&input, &output, &params, &mut *reader)
        }
        Commands::Decrypt { input, output } => {
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            file_ops::decrypt_file(&input, &output, &params, &mut *reader)
        }
        Commands::Update { input, output } => {
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            file_ops::update_file(&input, &output, &params, &mut *reader)
        }
        Commands::Key => payloadcrypt::random_key().map(|key| println!("{}", key)),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}
