// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

//! Pinax stdio console.
//!
//! Reads one operation per line (`name {json-args}`), executes it through a
//! fully wired executor, and prints each result as a JSON line. Intended for
//! poking the canvas core by hand or from scripts; the conversational loop
//! lives in the library behind the `AgentClient` seam.

use std::error::Error;
use std::io::{BufRead, Write};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use pinax::hub::{CanvasEvent, DeliveryError, Observer, ObserverHub};
use pinax::model::{CanvasSettings, CanvasSize};
use pinax::ops::FunctionExecutor;
use pinax::store::CanvasStore;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--canvas <WxH>] [--max-operations <n>]\n\nReads `name {{json-args}}` lines from stdin and prints one JSON result per line.\nLines without a JSON object run the operation with empty arguments.\n\n--canvas sets the initial canvas size ({min}..={max} per axis; default 800x600).\n--max-operations stops the console after n executed operations.",
        min = CanvasSize::MIN_DIMENSION,
        max = CanvasSize::MAX_DIMENSION,
    );
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CliOptions {
    canvas: Option<CanvasSize>,
    max_operations: Option<usize>,
}

fn parse_canvas(raw: &str) -> Result<CanvasSize, ()> {
    let (width, height) = raw.split_once('x').ok_or(())?;
    let size = CanvasSize::new(width.parse().map_err(|_| ())?, height.parse().map_err(|_| ())?);
    if size.in_resize_range() {
        Ok(size)
    } else {
        Err(())
    }
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--canvas" => {
                if options.canvas.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                options.canvas = Some(parse_canvas(&raw)?);
            }
            "--max-operations" => {
                if options.max_operations.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let n: usize = raw.parse().map_err(|_| ())?;
                if n == 0 {
                    return Err(());
                }
                options.max_operations = Some(n);
            }
            _ => return Err(()),
        }
    }

    Ok(options)
}

/// Splits a console line into the operation name and its JSON arguments.
fn parse_line(line: &str) -> Result<(&str, Value), String> {
    let line = line.trim();
    let (name, rest) = match line.find(char::is_whitespace) {
        Some(split) => (&line[..split], line[split..].trim_start()),
        None => (line, ""),
    };
    if rest.is_empty() {
        return Ok((name, Value::Null));
    }
    let arguments: Value =
        serde_json::from_str(rest).map_err(|err| format!("invalid arguments: {err}"))?;
    Ok((name, arguments))
}

/// Logs every broadcast instead of pushing it to a peer; the console has no
/// remote observers, but the fan-out path still runs end to end.
struct LogObserver;

impl Observer for LogObserver {
    fn deliver(&self, event: &CanvasEvent) -> Result<(), DeliveryError> {
        let CanvasEvent::CanvasUpdated { snapshot } = event;
        info!(
            containers = snapshot.containers.len(),
            width = snapshot.canvas_size.width,
            height = snapshot.canvas_size.height,
            "canvas updated"
        );
        Ok(())
    }
}

fn main() {
    let result = (|| -> Result<(), Box<dyn Error>> {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();

        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "pinax".to_owned());
        let options = match parse_options(args) {
            Ok(options) => options,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        let size = options.canvas.unwrap_or_default();
        let store = Arc::new(Mutex::new(CanvasStore::new(size, CanvasSettings::default())));
        let hub = Arc::new(ObserverHub::new());
        let executor = FunctionExecutor::new(store, hub.clone());

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        runtime.block_on(async move {
            hub.register(Box::new(LogObserver)).await;

            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let mut executed = 0usize;
            for line in stdin.lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let result = match parse_line(&line) {
                    Ok((name, arguments)) => executor.execute(name, arguments).await,
                    Err(message) => {
                        eprintln!("{program}: {message}");
                        continue;
                    }
                };
                let mut out = stdout.lock();
                serde_json::to_writer(&mut out, &result)?;
                out.write_all(b"\n")?;
                out.flush()?;

                executed += 1;
                if options.max_operations == Some(executed) {
                    break;
                }
            }
            Ok::<(), Box<dyn Error>>(())
        })?;
        Ok(())
    })();

    if let Err(err) = result {
        eprintln!("pinax: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_canvas, parse_line, parse_options, CliOptions};
    use pinax::model::CanvasSize;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_defaults() {
        assert_eq!(parse_options(args(&[])), Ok(CliOptions::default()));
    }

    #[test]
    fn parses_canvas_and_cap() {
        let options =
            parse_options(args(&["--canvas", "1024x768", "--max-operations", "20"])).expect("ok");
        assert_eq!(options.canvas, Some(CanvasSize::new(1024, 768)));
        assert_eq!(options.max_operations, Some(20));
    }

    #[test]
    fn rejects_bad_flags_and_out_of_range_canvas() {
        assert!(parse_options(args(&["--bogus"])).is_err());
        assert!(parse_options(args(&["--canvas"])).is_err());
        assert!(parse_options(args(&["--max-operations", "0"])).is_err());
        assert!(parse_canvas("100x300").is_err());
        assert!(parse_canvas("800").is_err());
    }

    #[test]
    fn splits_name_and_arguments() {
        let (name, arguments) = parse_line("create_container {\"id\": \"a\"}").expect("ok");
        assert_eq!(name, "create_container");
        assert_eq!(arguments["id"], "a");

        let (name, arguments) = parse_line("clear_canvas").expect("ok");
        assert_eq!(name, "clear_canvas");
        assert!(arguments.is_null());

        assert!(parse_line("create_container {broken").is_err());
    }
}
