use std::fmt::Write as _;

use playback_model::session_tags::SESSION_TAGS;
use qoe_agent::DeliveryStats;
use qoe_agent::transport::BeaconRequest;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::Result;

pub fn format_requests(requests: &[BeaconRequest], format: OutputFormat) -> Result<String> {
    let mut output = String::new();
    match format {
        OutputFormat::Pretty => {
            for (index, request) in requests.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "batch {} -> {} ({} events)",
                    index + 1,
                    request.domain,
                    request.events().len()
                );
                for event in request.events() {
                    let _ = writeln!(output, "  {}", describe_event(event));
                }
            }
        }
        OutputFormat::Json => {
            let bodies: Vec<&Value> = requests.iter().map(|request| &request.body).collect();
            output.push_str(&serde_json::to_string_pretty(&bodies)?);
            output.push('\n');
        }
        OutputFormat::JsonCompact => {
            for request in requests {
                output.push_str(&serde_json::to_string(&request.body)?);
                output.push('\n');
            }
        }
    }
    Ok(output)
}

fn describe_event(event: &Value) -> String {
    let name = event["evna"].as_str().unwrap_or("?");
    let mut line = format!("{name:<16}");
    for key in ["veid", "vesqnu", "plphti", "vectpbti", "vewati"] {
        match &event[key] {
            Value::Null => {}
            Value::String(text) => {
                let _ = write!(line, " {key}={text}");
            }
            other => {
                let _ = write!(line, " {key}={other}");
            }
        }
    }
    let fields = event.as_object().map(|fields| fields.len()).unwrap_or(0);
    let _ = write!(line, " ({fields} fields)");
    line
}

pub fn format_stats(stats: &DeliveryStats, session_id: Option<&str>) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "session:   {}", session_id.unwrap_or("-"));
    let _ = writeln!(
        output,
        "enqueued:  {} (dropped {}, overflow markers {})",
        stats.enqueued, stats.dropped, stats.overflow_markers
    );
    let _ = writeln!(
        output,
        "sent:      {} events in {} batches ({} failed)",
        stats.events_sent, stats.batches_sent, stats.batches_failed
    );
    let _ = writeln!(
        output,
        "cadence:   {}ms / {} events",
        stats.interval_ms, stats.batch_size
    );
    if let Some(rtt) = stats.last_rtt_ms {
        let _ = writeln!(output, "last rtt:  {rtt}ms");
    }
    output
}

pub fn format_tags() -> String {
    let width = SESSION_TAGS
        .iter()
        .map(|tag| tag.public_name.len())
        .max()
        .unwrap_or(0);
    let mut output = String::new();
    for tag in SESSION_TAGS {
        let _ = writeln!(
            output,
            "{:<width$}  {:<10} {}",
            tag.public_name,
            tag.wire_key,
            tag.entity,
        );
    }
    output
}
