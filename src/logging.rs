use std::{fmt, sync::OnceLock};

use colored::Colorize;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self as tracing_fmt, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
};

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Text(String),
    Number(String),
    Bool(bool),
    Debug(String),
}

/// Visitor that splits an event into its message and remaining fields
#[derive(Default)]
struct FieldCollector {
    fields: Vec<(String, FieldValue)>,
    message: Option<String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .push((field.name().to_string(), FieldValue::Text(value.to_string())));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .push((field.name().to_string(), FieldValue::Number(value.to_string())));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .push((field.name().to_string(), FieldValue::Number(value.to_string())));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields
            .push((field.name().to_string(), FieldValue::Number(value.to_string())));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.push((field.name().to_string(), FieldValue::Bool(value)));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .push((field.name().to_string(), FieldValue::Debug(format!("{:?}", value))));
        }
    }
}

fn render_field_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => format!("\"{}\"", s).cyan().to_string(),
        FieldValue::Number(n) => n.yellow().to_string(),
        FieldValue::Bool(b) => b.to_string().purple().to_string(),
        FieldValue::Debug(s) => s.bright_black().to_string(),
    }
}

/// Renders collected fields one per line under the message
fn render_fields_tree(fields: &[(String, FieldValue)]) -> String {
    let mut result = String::new();

    for (i, (name, value)) in fields.iter().enumerate() {
        let branch = if i == fields.len() - 1 { "└" } else { "├" };
        result.push_str(&format!(
            "\n    {} {}: {}",
            branch,
            name.white(),
            render_field_value(value)
        ));
    }

    result
}

struct TabsLogFormatter;

impl<S, N> FormatEvent<S, N> for TabsLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: tracing_fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        write!(writer, "{} ", chrono::Utc::now().to_rfc3339().dimmed())?;

        let level_str = match *meta.level() {
            Level::TRACE => "TRACE".purple(),
            Level::DEBUG => "DEBUG".green(),
            Level::INFO => "INFO".blue(),
            Level::WARN => "WARN".yellow(),
            Level::ERROR => "ERROR".red(),
        };
        write!(writer, "[{}] ", level_str)?;
        write!(writer, "{} ", meta.target().cyan().bold())?;

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        if let Some(msg) = &collector.message {
            write!(writer, "{}", msg.white())?;
        }
        write!(writer, "{}", render_fields_tree(&collector.fields))?;

        writeln!(writer)
    }
}

static TRACING: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let installed = tracing_fmt::Subscriber::builder()
            .with_env_filter(filter)
            .event_format(TabsLogFormatter)
            .try_init();
        if installed.is_err() {
            tracing::debug!("A global tracing subscriber was already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fields_tree() {
        colored::control::set_override(false);
        let fields = vec![
            ("task".to_string(), FieldValue::Text("signup".to_string())),
            ("matched".to_string(), FieldValue::Number("2".to_string())),
        ];

        assert_eq!(
            render_fields_tree(&fields),
            "\n    ├ task: \"signup\"\n    └ matched: 2"
        );
        assert_eq!(render_fields_tree(&[]), "");
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::info!(task = "signup", "logging initialised");
    }
}
