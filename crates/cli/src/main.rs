//! # CLI — Nokhal Interactive Shell
//!
//! A REPL over one nokhal database. Reads commands from stdin, executes them
//! against the engine, and prints results to stdout. Works interactively and
//! with piped input for scripted testing. The shell is a thin caller: all
//! crypto, framing, and indexing happen inside the engine.
//!
//! ## Commands
//!
//! ```text
//! PUT col key value...          Store a value (spaces allowed in the value)
//! PUTTTL col key ttl_ms value   Store a value that expires after ttl_ms
//! GET col key                   Print the value, or "(nil)"
//! DEL col key                   Delete a key (no-op when absent)
//! LIST col                      Print the keys of a collection
//! SCAN prefix                   Print live records matching a composite prefix
//! COMPACT                       Rewrite the log, dropping dead records
//! STATS                         Print handle debug info
//! EXIT / QUIT                   Write the hint snapshot and leave
//! ```
//!
//! ## Configuration
//!
//! ```text
//! NOKHAL_PATH       Database file path   (default: "nokhal.db")
//! NOKHAL_PASSWORD   Database password    (required)
//! ```

use anyhow::Result;
use engine::{Db, Error};
use std::io::{self, BufRead, Write};
use std::time::Duration;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let path = env_or("NOKHAL_PATH", "nokhal.db");
    let password = env_or("NOKHAL_PASSWORD", "");
    if password.is_empty() {
        anyhow::bail!("NOKHAL_PASSWORD must be set");
    }

    let db = Db::open(&path, &password)?;
    println!("nokhal started ({}, {} live keys)", path, db.len());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        stdout.flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0].to_ascii_uppercase().as_str() {
            "PUT" => {
                if parts.len() < 4 {
                    println!("usage: PUT <collection> <key> <value>");
                    continue;
                }
                let value = parts[3..].join(" ");
                reply(db.put(parts[1], parts[2], value.as_bytes()).map(|_| "OK".into()));
            }
            "PUTTTL" => {
                if parts.len() < 5 {
                    println!("usage: PUTTTL <collection> <key> <ttl_ms> <value>");
                    continue;
                }
                let Ok(ttl_ms) = parts[3].parse::<u64>() else {
                    println!("usage: PUTTTL <collection> <key> <ttl_ms> <value>");
                    continue;
                };
                let value = parts[4..].join(" ");
                reply(
                    db.put_with_ttl(
                        parts[1],
                        parts[2],
                        value.as_bytes(),
                        Duration::from_millis(ttl_ms),
                    )
                    .map(|_| "OK".into()),
                );
            }
            "GET" => {
                if parts.len() != 3 {
                    println!("usage: GET <collection> <key>");
                    continue;
                }
                match db.get(parts[1], parts[2]) {
                    Ok(value) => println!("{}", String::from_utf8_lossy(&value)),
                    Err(Error::NotFound) => println!("(nil)"),
                    Err(e) => println!("ERR {}", e),
                }
            }
            "DEL" => {
                if parts.len() != 3 {
                    println!("usage: DEL <collection> <key>");
                    continue;
                }
                reply(db.delete(parts[1], parts[2]).map(|_| "OK".into()));
            }
            "LIST" => {
                if parts.len() != 2 {
                    println!("usage: LIST <collection>");
                    continue;
                }
                match db.list(parts[1]) {
                    Ok(mut keys) => {
                        keys.sort();
                        for key in &keys {
                            println!("{}", key);
                        }
                        println!("({} keys)", keys.len());
                    }
                    Err(e) => println!("ERR {}", e),
                }
            }
            "SCAN" => {
                let prefix = if parts.len() > 1 { parts[1] } else { "" };
                match db.scan_prefix(prefix) {
                    Ok(mut entries) => {
                        entries.sort_by(|a, b| (&a.collection, &a.key).cmp(&(&b.collection, &b.key)));
                        for e in &entries {
                            println!(
                                "{}:{} -> {}",
                                e.collection,
                                e.key,
                                String::from_utf8_lossy(&e.value)
                            );
                        }
                        println!("({} entries)", entries.len());
                    }
                    Err(e) => println!("ERR {}", e),
                }
            }
            "COMPACT" => reply(db.compact().map(|_| "OK".into())),
            "STATS" => println!("{:?}", db),
            "EXIT" | "QUIT" => break,
            other => println!("unknown command: {}", other),
        }
    }

    db.close()?;
    println!("bye");
    Ok(())
}

/// Prints `OK`-style replies and engine errors uniformly.
fn reply(result: engine::Result<String>) {
    match result {
        Ok(msg) => println!("{}", msg),
        Err(e) => println!("ERR {}", e),
    }
}
