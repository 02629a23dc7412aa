// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path or HTTP(S) link to the transfer manifest
    #[arg(short, long)]
    pub transfer: String,

    /// Directory the downloaded files are written into
    #[arg(short, long, default_value = "./downloads")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_defaults_to_downloads() {
        let cli = Cli::parse_from(["downdeck", "--transfer", "bundle.toml"]);
        assert_eq!(cli.transfer, "bundle.toml");
        assert_eq!(cli.output, PathBuf::from("./downloads"));
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from(["downdeck", "-t", "https://example.net/bundle.toml", "-o", "/tmp/dl"]);
        assert_eq!(cli.transfer, "https://example.net/bundle.toml");
        assert_eq!(cli.output, PathBuf::from("/tmp/dl"));
    }

    #[test]
    fn test_transfer_is_required() {
        assert!(Cli::try_parse_from(["downdeck"]).is_err());
    }
}
