//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

/// Fetch a directory over SSH and/or upload files to SharePoint.
#[derive(Debug, Parser)]
#[command(name = "sshpoint", version, about)]
pub struct Cli {
    /// File to upload, or directory to compress and upload.
    pub path: Option<PathBuf>,

    /// Configuration file.
    #[arg(long, default_value = "sshpoint.toml")]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Also append log output to this file.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Fetch a remote directory over SSH.
    #[arg(long)]
    pub use_ssh: bool,

    /// Remote directory to fetch.
    #[arg(long)]
    pub remote_path: Option<String>,

    /// Local directory that receives the fetched tree.
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    #[arg(long)]
    pub ssh_host: Option<String>,

    #[arg(long)]
    pub ssh_user: Option<String>,

    #[arg(long)]
    pub ssh_pass: Option<String>,

    /// Private key used instead of a password.
    #[arg(long)]
    pub ssh_key: Option<PathBuf>,

    #[arg(long)]
    pub ssh_port: Option<u16>,

    /// Compress the fetched directory into a .tar.zst archive.
    #[arg(long)]
    pub compress: bool,

    /// zstd compression level; 0 writes an uncompressed .tar.
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub compression_level: u8,

    /// Keep the fetched directory after compressing it.
    #[arg(long)]
    pub keep_original: bool,

    /// Upload the result to SharePoint.
    #[arg(long)]
    pub upload_to_sharepoint: bool,

    /// Upload a single file and exit.
    #[arg(long, value_name = "FILE")]
    pub upload_only: Option<PathBuf>,

    /// Destination folder in the drive (defaults to the configured folder).
    #[arg(long)]
    pub sharepoint_folder: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ssh_mode() {
        let cli = Cli::try_parse_from([
            "sshpoint",
            "--use-ssh",
            "--remote-path",
            "/var/log",
            "--ssh-host",
            "backup.local",
            "--ssh-user",
            "ops",
            "--compress",
            "--compression-level",
            "9",
        ])
        .unwrap();
        assert!(cli.use_ssh);
        assert_eq!(cli.remote_path.as_deref(), Some("/var/log"));
        assert_eq!(cli.compression_level, 9);
        assert_eq!(cli.config, PathBuf::from("sshpoint.toml"));
        assert!(cli.path.is_none());
    }

    #[test]
    fn log_file_is_optional() {
        let cli = Cli::try_parse_from(["sshpoint", "x"]).unwrap();
        assert!(cli.log_file.is_none());

        let cli = Cli::try_parse_from(["sshpoint", "x", "--log-file", "logs/run.log"]).unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("logs/run.log")));
    }

    #[test]
    fn rejects_out_of_range_level() {
        let err = Cli::try_parse_from(["sshpoint", "--compression-level", "12"]);
        assert!(err.is_err());
    }

    #[test]
    fn positional_path() {
        let cli = Cli::try_parse_from(["sshpoint", "report.pdf", "-v"]).unwrap();
        assert_eq!(cli.path, Some(PathBuf::from("report.pdf")));
        assert!(cli.verbose);
        assert_eq!(cli.compression_level, 6);
    }
}
