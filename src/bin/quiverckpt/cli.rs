use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Инспекция файлов чекпоинтов QuiverCkpt (только чтение)
#[derive(Parser, Debug)]
#[command(name = "quiverckpt", version, about = "QuiverCkpt checkpoint inspector")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List tensors: dtype, shape and saved slices
    Ls {
        #[arg(long)]
        path: PathBuf,
        /// JSON output (array of objects)
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print element values of a tensor region
    ///
    /// Пример:
    ///   quiverckpt dump --path ./ckpt --name weights --slice "-:0,2"
    /// Без --slice печатается весь тензор.
    Dump {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        name: String,
        /// Slice spec ("-" = full dimension, "start,len" = range; dims joined by ':')
        #[arg(long)]
        slice: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// File summary: sizes, tensors, codecs and reader metrics
    Stat {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Doctor: verify CRC and decode every record (exit code 1 on failure)
    Doctor {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
