use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use sift_core::{Cursor, OptionsFile, SegmentBuilder, Store};

#[derive(Parser)]
#[command(name = "sift", about = "sift — sorted segment store tools")]
struct Cli {
    /// Debug logging on stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    Init {
        #[arg(long)]
        dir: PathBuf,
        /// Built-in merge operator: add, append
        #[arg(long)]
        merge_operator: Option<String>,
    },

    /// Write one batch file as a new segment. Lines: `set K V`, `merge K V`, `del K`.
    Write {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        input: PathBuf,
    },

    Scan {
        #[arg(long)]
        dir: PathBuf,
        /// Inclusive start key
        #[arg(long)]
        start: Option<String>,
        /// Exclusive end key
        #[arg(long)]
        end: Option<String>,
        /// Print raw operations without tombstone/merge handling
        #[arg(long, default_value_t = false)]
        raw: bool,
    },

    Get {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        key: String,
    },

    Info {
        #[arg(long)]
        dir: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn show(b: &[u8]) -> String {
    match std::str::from_utf8(b) {
        Ok(s) => s.to_string(),
        Err(_) => format!("0x{}", hex::encode(b)),
    }
}

fn parse_batch(text: &str) -> Result<SegmentBuilder> {
    let mut b = SegmentBuilder::new();
    for (no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let op = parts.next().unwrap_or_default();
        let key = parts.next().ok_or_else(|| anyhow!("line {}: missing key", no + 1))?;
        let rest: Vec<&str> = parts.collect();
        let val = (!rest.is_empty()).then(|| rest.join(" "));
        match (op, val) {
            ("set", Some(v)) => b.set(key.as_bytes(), v.as_bytes()),
            ("merge", Some(v)) => b.merge(key.as_bytes(), v.as_bytes()),
            ("del", None) => b.del(key.as_bytes()),
            _ => bail!("line {}: expected `set K V`, `merge K V` or `del K`", no + 1),
        };
    }
    Ok(b)
}

fn ensure_store(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("no store at {}, run `sift init` first", dir.display());
    }
    Ok(())
}

fn scan(it: &mut dyn Cursor, raw: bool) -> Result<usize> {
    let mut n = 0usize;
    loop {
        if raw {
            match it.current_ex() {
                Ok((ex, k, v)) => println!("{} {} {}", ex.operation.as_str(), show(k), show(v)),
                Err(e) if e.is_done() => break,
                Err(e) => return Err(e.into()),
            }
        } else {
            match it.current() {
                Ok((k, Some(v))) => println!("{}={}", show(k), show(&v)),
                Ok((k, None)) => println!("{} (deleted)", show(k)),
                Err(e) if e.is_done() => break,
                // keep scanning past keys whose value could not be reduced
                Err(e) => match e.key() {
                    Some(k) => println!("{} !{e}", show(k)),
                    None => return Err(e.into()),
                },
            }
        }
        n += 1;
        match it.next() {
            Ok(()) => {}
            Err(e) if e.is_done() => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(n)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Cmd::Init { dir, merge_operator } => {
            Store::init(&dir, &OptionsFile { merge_operator })?;
            println!("init: {}", dir.display());
        }
        Cmd::Write { dir, input } => {
            ensure_store(&dir)?;
            let text = std::fs::read_to_string(&input)?;
            let batch = parse_batch(&text)?;
            if batch.is_empty() {
                bail!("{}: no operations", input.display());
            }
            let n = batch.len();
            let mut store = Store::open(&dir)?;
            let path = store.write_batch(batch)?;
            println!("wrote {} ({} entries)", path.display(), n);
        }
        Cmd::Scan { dir, start, end, raw } => {
            ensure_store(&dir)?;
            let store = Store::open(&dir)?;
            let snap = store.snapshot()?;
            let mut it = snap.start_iterator(start.as_deref().map(str::as_bytes), end.as_deref().map(str::as_bytes));
            let res = scan(it.as_mut(), raw);
            it.close()?;
            let n = res?;
            tracing::debug!(entries = n, "scan finished");
        }
        Cmd::Get { dir, key } => {
            ensure_store(&dir)?;
            let store = Store::open(&dir)?;
            match store.snapshot()?.get(key.as_bytes())? {
                Some(v) => println!("{}", show(&v)),
                None => println!("not found"),
            }
        }
        Cmd::Info { dir } => {
            ensure_store(&dir)?;
            let store = Store::open(&dir)?;
            let op = store.options().merge_operator().map(|m| m.name().to_string());
            println!("merge operator: {}", op.as_deref().unwrap_or("none"));
            println!("segments: {}", store.manifest().segments.len());
            for s in &store.manifest().segments {
                println!("  {} entries={}", s.path.display(), s.entries);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::SegmentAccess;

    #[test]
    fn batch_lines() {
        let b = parse_batch("# comment\nset a 1\n\nmerge c +5\ndel b\nset d two words\n").unwrap();
        let seg = b.build().unwrap();
        assert_eq!(seg.len(), 4);
        assert_eq!(seg.key_at(3), Some(&b"d"[..]));
        assert_eq!(seg.operation_key_val(3).map(|(_, _, v)| v), Some(&b"two words"[..]));
    }

    #[test]
    fn batch_rejects_bad_lines() {
        assert!(parse_batch("set onlykey").is_err());
        assert!(parse_batch("del a extra").is_err());
        assert!(parse_batch("put a 1").is_err());
    }

    #[test]
    fn non_utf8_is_hex() {
        assert_eq!(show(b"ab"), "ab");
        assert_eq!(show(&[0xff, 0x00]), "0xff00");
    }
}
