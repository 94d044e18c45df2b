//! Operator-facing CLI output.
//!
//! Human-readable lines with colored symbols by default; one JSON object per
//! line in `--json` mode for scripting. `--quiet` suppresses everything but
//! warnings and errors.

use std::fmt::Display;
use std::sync::OnceLock;

use owo_colors::{OwoColorize, Stream, Style};
use parking_lot::RwLock;
use serde_json::json;

use super::command::ColorChoice;

/// Runtime output configuration shared by CLI handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    pub json: bool,
    pub quiet: bool,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }
}

static OUTPUT_CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn config_cell() -> &'static RwLock<OutputConfig> {
    OUTPUT_CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()))
}

fn read_config() -> OutputConfig {
    *config_cell().read()
}

/// Apply `style` when `stream` supports color, honoring `--color`.
fn paint(text: &str, style: Style, stream: Stream) -> String {
    text.if_supports_color(stream, |text| text.style(style))
        .to_string()
}

fn emit_json_line(kind: &str, payload: serde_json::Value) {
    println!("{}", json!({ "type": kind, "payload": payload }));
}

/// Apply output settings from global CLI flags.
pub fn configure(config: OutputConfig, color: ColorChoice) {
    *config_cell().write() = config;
    match color {
        ColorChoice::Auto => owo_colors::unset_override(),
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
    }
}

#[must_use]
pub fn is_json() -> bool {
    read_config().json
}

/// Print the application header with name and version.
pub fn header(version: &str) {
    let config = read_config();
    if config.json {
        emit_json_line("header", json!({ "app": "berth", "version": version }));
        return;
    }
    if config.quiet {
        return;
    }
    println!(
        "{} {}",
        paint("berth", Style::new().bold(), Stream::Stdout),
        paint(version, Style::new().dimmed(), Stream::Stdout)
    );
    println!();
}

/// Print a labeled value.
pub fn field(label: &str, value: impl Display) {
    let config = read_config();
    let value = value.to_string();
    if config.json {
        emit_json_line("field", json!({ "label": label, "value": value }));
        return;
    }
    if config.quiet {
        return;
    }
    let label = format!("{label:<12}");
    println!(
        "  {} {}",
        paint(&label, Style::new().dimmed(), Stream::Stdout),
        value
    );
}

/// Print one deployed unit with what state says about it.
pub fn unit(name: &str, life: &str, deployer: &str) {
    let config = read_config();
    if config.json {
        emit_json_line(
            "unit",
            json!({ "name": name, "life": life, "deployer": deployer }),
        );
        return;
    }
    if config.quiet {
        return;
    }
    let style = match life {
        "alive" => Style::new().green(),
        "dying" => Style::new().yellow(),
        _ => Style::new().red(),
    };
    let life = format!("{life:<8}");
    println!(
        "  {name:<20} {} {}",
        paint(&life, style, Stream::Stdout),
        paint(deployer, Style::new().dimmed(), Stream::Stdout)
    );
}

/// Print a success line.
pub fn success(message: &str) {
    let config = read_config();
    if config.json {
        emit_json_line("success", json!({ "message": message }));
        return;
    }
    if config.quiet {
        return;
    }
    println!(
        "  {} {}",
        paint("✓", Style::new().green(), Stream::Stdout),
        message
    );
}

/// Print a warning line.
pub fn warning(message: &str) {
    if read_config().json {
        emit_json_line("warning", json!({ "message": message }));
        return;
    }
    println!(
        "  {} {}",
        paint("⚠", Style::new().yellow(), Stream::Stdout),
        message
    );
}

/// Print an error line.
pub fn error(message: &str) {
    if read_config().json {
        eprintln!("{}", json!({ "type": "error", "payload": { "message": message } }));
        return;
    }
    eprintln!(
        "  {} {}",
        paint("×", Style::new().red(), Stream::Stderr),
        message
    );
}

/// Print a section header.
pub fn section(title: &str) {
    let config = read_config();
    if config.json {
        emit_json_line("section", json!({ "title": title }));
        return;
    }
    if config.quiet {
        return;
    }
    println!();
    println!("{}", paint(title, Style::new().bold(), Stream::Stdout));
}
