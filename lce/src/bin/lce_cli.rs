use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use lce::cancel::CancelToken;
use lce::{build_prezza_index, build_sss_index};

#[derive(Clone, Copy, ValueEnum)]
enum IndexKind {
    Sss,
    Prezza,
}

/// Build an LCE index over a text file and answer queries from a file of
/// index pairs: ASCII decimal, one per line, two lines per pair.
#[derive(Parser)]
struct Args {
    /// Text file; a leading FASTA-style header line is dropped if present.
    file: PathBuf,
    #[clap(long, value_enum, default_value_t = IndexKind::Sss)]
    index: IndexKind,
    /// Anchor spacing tau, used only by the SSS index.
    #[clap(long, default_value_t = 32)]
    tau: usize,
    /// Worker-partition count for the SSS builder.
    #[clap(long, default_value_t = 4)]
    parallelism: usize,
    /// Rolling hash base; 0 picks one at random.
    #[clap(long, default_value_t = 0)]
    base: u64,
    /// Optional query file: (i, j) pairs, two lines each.
    #[clap(long)]
    queries: Option<PathBuf>,
}

fn read_text(path: &PathBuf) -> Vec<u8> {
    let raw = std::fs::read_to_string(path).unwrap();
    let mut lines = raw.lines();
    let first = lines.next().unwrap_or("");
    if first.starts_with('>') {
        lines.collect::<String>().into_bytes()
    } else {
        std::iter::once(first).chain(lines).collect::<String>().into_bytes()
    }
}

fn read_queries(path: &PathBuf) -> Vec<(u64, u64)> {
    let raw = std::fs::read_to_string(path).unwrap();
    let mut nums = raw.lines().map(|l| l.trim().parse::<u64>().unwrap());
    let mut pairs = Vec::new();
    while let (Some(i), Some(j)) = (nums.next(), nums.next()) {
        pairs.push((i, j));
    }
    pairs
}

fn main() {
    let args = Args::parse();

    eprintln!("Reading...");
    let t = read_text(&args.file);
    eprintln!("Length: {}", t.len());

    let base = if args.base == 0 { rand::random::<u64>() as u128 } else { args.base as u128 };

    eprintln!("Building {} index...", if matches!(args.index, IndexKind::Sss) { "SSS" } else { "Prezza" });
    let start = std::time::Instant::now();
    match args.index {
        IndexKind::Sss => {
            let idx = build_sss_index(t, args.tau, args.parallelism, base, &CancelToken::new()).expect("build failed");
            eprintln!("Time: {:?}", start.elapsed());
            eprintln!("size_bytes: {}", idx.size_bytes());
            if let Some(path) = args.queries {
                for (i, j) in read_queries(&path) {
                    println!("{}", idx.lce(i, j).expect("query out of range"));
                }
            }
        }
        IndexKind::Prezza => {
            let idx = build_prezza_index(t, &CancelToken::new()).expect("build failed");
            eprintln!("Time: {:?}", start.elapsed());
            eprintln!("size_bytes: {}", idx.size_bytes());
            if let Some(path) = args.queries {
                for (i, j) in read_queries(&path) {
                    println!("{}", idx.lce(i, j).expect("query out of range"));
                }
            }
        }
    }
}
