use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use cvtxt_client::models::Controller;
use cvtxt_client::{FrameEvent, TextEvent};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    source: &'a str,
    text: &'a str,
    timestamp: String,
}

pub fn print_message(event: &TextEvent, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                source,
                text: event.as_str(),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = table(vec!["SOURCE", "MESSAGE"]);
            table.add_row(vec![source, event.as_str()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("[{source}] {event}"),
        OutputFormat::Raw => println!("{event}"),
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    index: u64,
    content_type: &'a str,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    timestamp: String,
}

/// Report one received frame. With `Raw` and no output file, the JPEG bytes go to stdout.
pub fn print_frame(frame: &FrameEvent, index: u64, saved_to: Option<&Path>, format: OutputFormat) {
    let path = saved_to.map(|path| path.display().to_string());
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                index,
                content_type: &frame.content_type,
                size: frame.len(),
                path,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = table(vec!["FRAME", "TYPE", "SIZE", "FILE"]);
            table.add_row(vec![
                index.to_string(),
                frame.content_type.clone(),
                frame.len().to_string(),
                path.unwrap_or_else(|| "-".to_string()),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match path {
            Some(path) => println!("frame {index}: {} bytes -> {path}", frame.len()),
            None => println!("frame {index}: {} bytes ({})", frame.len(), frame.content_type),
        },
        OutputFormat::Raw => {
            if saved_to.is_none() {
                print_raw(&frame.payload);
            }
        }
    }
}

pub fn print_controllers(controllers: &[Controller], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(&controllers),
        OutputFormat::Table => {
            let mut table = table(vec!["NAME", "SERIAL", "FIRMWARE", "VERSION", "API"]);
            for controller in controllers {
                table.add_row(vec![
                    field(&controller.name),
                    field(&controller.serial_number),
                    field(&controller.firmware),
                    field(&controller.version),
                    field(&controller.api_version),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if controllers.is_empty() {
                println!("no controllers found");
            }
            for controller in controllers {
                println!(
                    "{} serial={} firmware={}",
                    field(&controller.name),
                    field(&controller.serial_number),
                    field(&controller.firmware)
                );
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn field(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
