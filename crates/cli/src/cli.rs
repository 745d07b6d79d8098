//! Command-line surface: one positional mode plus the raw key option.

use clap::{Parser, ValueEnum};

/// Encrypt or decrypt a fixed example object with a raw AES keyring.
#[derive(Parser, Debug)]
#[command(
    name = "s3-envelope",
    about = "Client-side envelope encryption of an S3 object with a raw AES keyring",
    version
)]
pub struct Cli {
    /// Flow to run.
    #[arg(value_enum)]
    pub mode: Mode,

    /// Base64-encoded 256-bit AES wrapping key.
    #[arg(long, value_name = "BASE64")]
    pub raw_key_b64: String,
}

/// Top-level mode selection: the only branching in the program.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Encrypt the example data and upload the ciphertext envelope.
    Upload,
    /// Download the ciphertext envelope and decrypt it.
    Download,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload_mode() {
        let cli = Cli::try_parse_from(["s3-envelope", "upload", "--raw-key-b64", "AAAA"])
            .expect("parse should succeed");
        assert_eq!(cli.mode, Mode::Upload);
        assert_eq!(cli.raw_key_b64, "AAAA");
    }

    #[test]
    fn parses_download_mode() {
        let cli = Cli::try_parse_from(["s3-envelope", "download", "--raw-key-b64", "AAAA"])
            .expect("parse should succeed");
        assert_eq!(cli.mode, Mode::Download);
    }

    #[test]
    fn raw_key_option_is_required() {
        assert!(Cli::try_parse_from(["s3-envelope", "upload"]).is_err());
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["s3-envelope", "sideways", "--raw-key-b64", "AAAA"]).is_err());
    }
}
