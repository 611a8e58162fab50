//! Output formatting module for rustible-azure
//!
//! Renders module results for humans (colored, Ansible-like) or as JSON.

use colored::Colorize;
use rustible_azure::modules::{ModuleOutput, ModuleStatus, ParamSpec};
use serde_json::Value;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Colored label for a module status
pub fn colored_status(status: ModuleStatus) -> String {
    match status {
        ModuleStatus::Ok => "ok".green().to_string(),
        ModuleStatus::Changed => "changed".yellow().to_string(),
        ModuleStatus::Failed => "failed".red().bold().to_string(),
    }
}

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        colored::control::set_override(use_color);

        Self {
            use_color,
            json_mode,
            verbosity,
            start_time: Instant::now(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a task header
    pub fn task_header(&self, module: &str) {
        if self.json_mode {
            return;
        }

        let header = format!("TASK [{}]", module);
        let stars = "*".repeat(80_usize.saturating_sub(header.len()));

        if self.use_color {
            println!("\n{} {}", header.bright_white().bold(), stars.bright_black());
        } else {
            println!("\n{} {}", header, stars);
        }
    }

    /// Print a module result
    pub fn module_result(&self, output: &ModuleOutput) {
        if self.json_mode {
            println!("{}", to_json_pretty(output));
            return;
        }

        let status = if self.use_color {
            colored_status(output.status)
        } else {
            output.status.to_string()
        };
        println!("{}: [azure] => {}", status, output.msg);

        if let Some(diff) = &output.diff {
            self.diff(&diff.before, &diff.after);
        }

        if self.verbosity >= 1 || output.status == ModuleStatus::Failed {
            for (key, value) in &output.data {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if self.use_color {
                    println!("    {}: {}", key.bright_black(), rendered);
                } else {
                    println!("    {}: {}", key, rendered);
                }
            }
        }

        if self.verbosity >= 1 {
            let elapsed = format_duration(self.start_time.elapsed());
            if self.use_color {
                println!("{} {}", "Completed in".bright_black(), elapsed.bright_white());
            } else {
                println!("Completed in {}", elapsed);
            }
        }
    }

    /// Print a JSON before/after diff, line by line
    pub fn diff(&self, before: &Value, after: &Value) {
        let render = |value: &Value| match value {
            Value::Null => String::new(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        };
        let old = render(before);
        let new = render(after);

        println!();
        for line in old.lines() {
            if self.use_color {
                println!("{}", format!("- {}", line).red());
            } else {
                println!("- {}", line);
            }
        }
        for line in new.lines() {
            if self.use_color {
                println!("{}", format!("+ {}", line).green());
            } else {
                println!("+ {}", line);
            }
        }
        println!();
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            let err = serde_json::json!({
                "failed": true,
                "changed": false,
                "msg": message
            });
            println!("{}", to_json_pretty(&err));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a list of modules with their descriptions
    pub fn module_list(&self, modules: &[(&str, &str)]) {
        if self.json_mode {
            let list: serde_json::Map<String, Value> = modules
                .iter()
                .map(|(name, description)| (name.to_string(), Value::from(*description)))
                .collect();
            println!("{}", to_json_pretty(&list));
            return;
        }

        let rows: Vec<Vec<String>> = modules
            .iter()
            .map(|(name, description)| vec![name.to_string(), description.to_string()])
            .collect();
        self.table(&["MODULE", "DESCRIPTION"], &rows);
    }

    /// Print a module's parameter documentation
    pub fn module_doc(&self, name: &str, description: &str, params: &[ParamSpec]) {
        if self.json_mode {
            let doc = serde_json::json!({
                "module": name,
                "description": description,
                "options": params,
            });
            println!("{}", to_json_pretty(&doc));
            return;
        }

        if self.use_color {
            println!("{} - {}\n", name.bright_white().bold(), description);
        } else {
            println!("{} - {}\n", name, description);
        }

        let rows: Vec<Vec<String>> = params
            .iter()
            .map(|p| {
                let mut notes = p.description.to_string();
                if !p.choices.is_empty() {
                    notes = format!("{} [choices: {}]", notes, p.choices.join(", "));
                }
                if let Some(default) = p.default {
                    notes = format!("{} [default: {}]", notes, default);
                }
                vec![
                    p.name.to_string(),
                    p.kind.to_string(),
                    if p.required { "yes" } else { "no" }.to_string(),
                    notes.trim().to_string(),
                ]
            })
            .collect();
        self.table(&["OPTION", "TYPE", "REQUIRED", "DESCRIPTION"], &rows);
    }

    /// Print a table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        // Calculate column widths
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:width$}", cell, width = width))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let header_line = line(&header_cells);
        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

        if self.use_color {
            println!("{}", header_line.bright_white().bold());
            println!("{}", sep.join("-+-").bright_black());
        } else {
            println!("{}", header_line);
            println!("{}", sep.join("-+-"));
        }

        for row in rows {
            println!("{}", line(row));
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

fn to_json_pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        format!(r#"{{"failed": true, "msg": "failed to serialize result: {}"}}"#, e)
    })
}

/// Format a duration as a human-readable string
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;
        format!("{}h {}m {}s", hours, mins, secs)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}
