//! Event tracking command.

use clap::Args;
use serde_json::Value;

use crate::output::{self, OutputFormat};
use beacon_core::error::AppError;
use beacon_entity::event::{EventName, EventPayload, EventType};

/// Arguments for the track command
#[derive(Debug, Args)]
pub struct TrackArgs {
    /// Event name: a catalog name such as APP_LAUNCHED, or any custom name
    pub name: String,

    /// Event type (SYSTEM, CUSTOM, LIFE_CYCLE, PUSH, INAPP, APPINBOX)
    #[arg(short = 't', long = "type", default_value = "CUSTOM")]
    pub event_type: EventType,

    /// Attribute as key=value; numbers, booleans and null are typed
    #[arg(short, long = "attr", value_parser = parse_attribute)]
    pub attributes: Vec<(String, Value)>,
}

/// Parse `key=value` into a payload entry
fn parse_attribute(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("attribute key must not be empty".to_string());
    }
    let value = match serde_json::from_str::<Value>(value) {
        Ok(parsed) if !parsed.is_object() && !parsed.is_array() => parsed,
        _ => Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}

/// Execute the track command
pub async fn execute(
    args: &TrackArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let beacon = super::open_beacon(config_path).await?;

    let payload: EventPayload = args.attributes.iter().cloned().collect();
    let name = EventName::from_parts(args.event_type, &args.name);
    let tracked = beacon.tracker().track(args.event_type, name, payload).await;

    let result = match tracked {
        Ok(Some(record)) => {
            output::print_item(&record, format);
            Ok(())
        }
        Ok(None) => {
            output::print_warning("Tracking is opted out; event was not recorded.");
            Ok(())
        }
        Err(e) => Err(e),
    };
    beacon.shutdown().await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_attribute_types() {
        assert_eq!(parse_attribute("count=3").unwrap(), ("count".into(), json!(3)));
        assert_eq!(parse_attribute("vip=true").unwrap(), ("vip".into(), json!(true)));
        assert_eq!(
            parse_attribute("sku=AB-12").unwrap(),
            ("sku".into(), json!("AB-12"))
        );
        assert_eq!(
            parse_attribute("note=a=b").unwrap(),
            ("note".into(), json!("a=b"))
        );
        assert_eq!(
            parse_attribute("obj={\"a\":1}").unwrap(),
            ("obj".into(), json!("{\"a\":1}"))
        );
        assert!(parse_attribute("novalue").is_err());
        assert!(parse_attribute("=1").is_err());
    }
}
