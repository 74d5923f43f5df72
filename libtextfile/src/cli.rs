use clap::{Parser, Subcommand};
use libtextfile::{Encoding, TextFileOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "textfile")]
#[command(version, about = "Read and write text files through a shared cache", long_about = None)]
pub(crate) struct Cli {
    /// Text encoding of the files
    #[arg(long, global = true, env = "TEXTFILE_ENCODING", default_value_t = Encoding::Utf8)]
    pub(crate) encoding: Encoding,

    /// How long a read result is reused before the file is checked again
    #[arg(long, global = true, env = "TEXTFILE_CACHE_WINDOW_MS", default_value_t = 1000)]
    pub(crate) cache_window_ms: u64,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    #[command(about = "Print a file using ./textfile cat notes.txt")]
    Cat {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// Create the file empty if it does not exist
        #[arg(long)]
        create: bool,
    },
    #[command(about = "Replace a file's content using ./textfile write notes.txt \"hello\"")]
    Write {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        #[arg(value_name = "TEXT")]
        text: String,
        /// Create the file empty if it does not exist
        #[arg(long)]
        create: bool,
    },
    #[command(about = "Walk through caching and write coalescing on a scratch file in DIR")]
    Demo {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    #[command(about = "Print the effective handle options as JSON")]
    Config,
}

impl Cli {
    pub(crate) fn options(&self) -> TextFileOptions {
        TextFileOptions::default()
            .with_encoding(self.encoding)
            .with_cache_window(Duration::from_millis(self.cache_window_ms))
    }
}
