use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use memolink_roll::{Frame, Roll};
use memolink_session::CameraInfo;
use memolink_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|p| PortOutput {
                    name: &p.name,
                    kind: &p.kind,
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(vec!["PORT", "TYPE"]);
            for port in ports {
                table.add_row(vec![port.name.as_str(), port.kind.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("No serial ports found.");
            }
            for port in ports {
                println!("{} ({})", port.name, port.kind);
            }
        }
    }
}

pub fn print_camera_info(info: &CameraInfo, format: OutputFormat) {
    let g = &info.geometry;
    match format {
        OutputFormat::Json => print_json(info),
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in [
                ("model", info.model.clone()),
                ("total shots", info.total_shots.to_string()),
                (
                    "current roll",
                    format!("{} (frame {})", info.current_roll.roll, info.current_roll.frame),
                ),
                ("memo", on_off(g.memo_enabled()).to_string()),
                ("storage mode", format!("{:?}", g.storage_mode())),
                ("ring", format!("0x{:04X}..0x{:04X}", g.ring_start(), g.ring_end())),
                ("bytes used", g.bytes_used().to_string()),
                ("first stored roll", g.first_roll_number().to_string()),
            ] {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Camera:");
            println!("  Model:         {}", info.model);
            println!("  Total shots:   {}", info.total_shots);
            println!(
                "  Current roll:  {} (frame {})",
                info.current_roll.roll, info.current_roll.frame
            );
            println!(
                "  Memo:          {} ({:?}, {}-byte records)",
                on_off(g.memo_enabled()),
                g.storage_mode(),
                g.frame_size()
            );
            println!(
                "  Ring:          0x{:04X}..0x{:04X}, {} bytes used",
                g.ring_start(),
                g.ring_end(),
                g.bytes_used()
            );
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

pub fn print_rolls(rolls: &[Roll], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(rolls),
        OutputFormat::Table => {
            for roll in rolls {
                println!("{roll}");
                println!("{}", frames_table(&roll.frames));
            }
        }
        OutputFormat::Pretty => {
            for roll in rolls {
                println!("{roll}");
                for frame in &roll.frames {
                    println!("  {}", frame_line(frame));
                }
            }
        }
    }
    if rolls.is_empty() && format != OutputFormat::Json {
        println!("No rolls stored.");
    }
    let _ = std::io::stdout().flush();
}

fn frames_table(frames: &[Frame]) -> Table {
    let mut table = table();
    table.set_header(vec![
        "FRAME", "SHUTTER", "APERTURE", "FOCAL", "MODE", "METERING", "FLASH", "COMP",
    ]);
    for frame in frames {
        table.add_row(vec![
            frame.index.to_string(),
            frame.shutter.clone(),
            frame.aperture.clone(),
            or_dash(&frame.focal_length),
            or_dash(&frame.exposure_mode),
            or_dash(&frame.metering_mode),
            or_dash(&frame.flash_mode),
            or_dash(&frame.exposure_compensation),
        ]);
    }
    table
}

fn or_dash(field: &Option<String>) -> String {
    field.clone().unwrap_or_else(|| "-".to_string())
}

fn frame_line(frame: &Frame) -> String {
    let mut parts = vec![
        format!("#{:<3}", frame.index),
        frame.shutter.clone(),
        frame.aperture.clone(),
    ];
    parts.extend(
        [
            &frame.focal_length,
            &frame.exposure_mode,
            &frame.metering_mode,
            &frame.flash_mode,
            &frame.exposure_compensation,
        ]
        .into_iter()
        .flatten()
        .cloned(),
    );
    parts.join("  ")
}
