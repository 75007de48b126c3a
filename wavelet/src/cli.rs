//! Command line shared by all construction tools.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(about = "Distributed wavelet tree construction", disable_version_flag = true)]
pub struct CommonArgs {
    /// The input file.
    pub file: PathBuf,

    /// File read buffer size in symbols (default: local partition size).
    #[arg(short = 'r', long = "rbuf")]
    pub rbuf: Option<usize>,

    /// Extract the local partition to <PATH>.part.<rank> first and read
    /// subsequent passes from it.
    #[arg(short = 'l', long = "local")]
    pub local: Option<PathBuf>,

    /// Base path of the output files.
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Only process a prefix of the input file.
    #[arg(short = 'p', long = "prefix")]
    pub prefix: Option<u64>,
}

impl CommonArgs {
    /// Parses the command line, exiting with a nonzero status on failure
    /// before any substrate state is created.
    pub fn parse_or_exit() -> Self {
        match Self::try_parse() {
            Ok(args) => args,
            Err(e) => {
                let _ = e.print();
                std::process::exit(-1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let args = CommonArgs::try_parse_from([
            "wt-bsort", "-r", "4096", "--local", "/tmp/slice", "-o", "/tmp/out",
            "--prefix", "1048576", "input.txt",
        ])
        .unwrap();
        assert_eq!(args.file, PathBuf::from("input.txt"));
        assert_eq!(args.rbuf, Some(4096));
        assert_eq!(args.local, Some(PathBuf::from("/tmp/slice")));
        assert_eq!(args.output.as_deref(), Some("/tmp/out"));
        assert_eq!(args.prefix, Some(1048576));
    }

    #[test]
    fn input_file_is_required() {
        assert!(CommonArgs::try_parse_from(["wt-bsort", "-r", "1"]).is_err());
    }
}
