use crate::event::{ExceptionInfo, LogEvent};
use serde_json::{Map, Value};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::warn;

/// Logstash v1 event schema version, injected as `@version`.
const SCHEMA_VERSION: u64 = 1;

/// Host name used when neither configuration nor the OS can supply one.
const FALLBACK_HOST: &str = "unknown";

/// ISO-8601 with fixed three-digit milliseconds, UTC.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("event timestamp out of representable range: {0}")]
    TimestampRange(#[from] time::error::ComponentRange),
    #[error("timestamp formatting failed: {0}")]
    TimestampFormat(#[from] time::error::Format),
    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Turns [`LogEvent`]s into logstash-format JSON records.
///
/// The encoder performs no I/O at encode time. The host name is resolved once at
/// construction (configured value if non-blank, else the machine hostname, else
/// `"unknown"`) and the user-fields string is parsed once and cached; replacing it
/// through [`Encoder::set_user_fields`] is the only thing that re-parses it.
#[derive(Debug, Clone)]
pub struct Encoder {
    host: String,
    user_fields: Map<String, Value>,
}

impl Encoder {
    pub fn new(configured_host: Option<&str>, user_fields: Option<&str>) -> Self {
        Encoder {
            host: resolve_host(configured_host),
            user_fields: user_fields.map(parse_user_fields).unwrap_or_default(),
        }
    }

    /// Replaces the cached user fields with a freshly parsed copy of `raw`.
    pub fn set_user_fields(&mut self, raw: &str) {
        self.user_fields = parse_user_fields(raw);
    }

    /// Host name this encoder stamps into every record.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Encodes one event as a JSON byte record.
    ///
    /// Deterministic for a fixed event and encoder state: the underlying map is
    /// ordered by key, so identical inputs serialize to identical bytes.
    pub fn encode(&self, event: &LogEvent) -> Result<Vec<u8>, EncodeError> {
        let mut record = Map::new();
        record.insert("@version".to_string(), Value::from(SCHEMA_VERSION));
        record.insert(
            "@timestamp".to_string(),
            Value::from(format_timestamp(event.timestamp_millis)?),
        );
        if let Some(logger) = &event.logger {
            let simple = logger.rsplit('.').next().unwrap_or(logger.as_str());
            record.insert("logger_full".to_string(), Value::from(logger.as_str()));
            record.insert("logger_simple".to_string(), Value::from(simple));
        }
        record.insert("level".to_string(), Value::from(event.level.as_str()));
        record.insert("message".to_string(), Value::from(event.message.as_str()));
        record.insert(
            "mdc".to_string(),
            Value::Object(
                event
                    .mdc
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value.as_str())))
                    .collect(),
            ),
        );
        record.insert("thread".to_string(), Value::from(event.thread.as_str()));
        record.insert("host".to_string(), Value::from(self.host.as_str()));
        if let Some(exception) = &event.exception {
            record.insert("exception".to_string(), exception_value(exception));
        }
        // User fields are merged last and win every key collision.
        for (key, value) in &self.user_fields {
            record.insert(key.clone(), value.clone());
        }
        Ok(serde_json::to_vec(&Value::Object(record))?)
    }
}

fn format_timestamp(timestamp_millis: i64) -> Result<String, EncodeError> {
    let datetime =
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_millis) * 1_000_000)?;
    Ok(datetime.format(&TIMESTAMP_FORMAT)?)
}

fn resolve_host(configured: Option<&str>) -> String {
    if let Some(host) = configured {
        if !host.trim().is_empty() {
            return host.to_string();
        }
    }
    match hostname::get() {
        Ok(name) if !name.is_empty() => name.to_string_lossy().into_owned(),
        _ => FALLBACK_HOST.to_string(),
    }
}

/// Parses a `key:value,key:value` string into a field map. Pairs without a `:`
/// separator are skipped.
fn parse_user_fields(raw: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    for pair in raw.split(',') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once(':') {
            Some((key, value)) => {
                fields.insert(key.to_string(), Value::from(value));
            }
            None => warn!(pair, "Ignoring malformed user field, expected key:value"),
        }
    }
    fields
}

fn exception_value(exception: &ExceptionInfo) -> Value {
    let mut object = Map::new();
    object.insert("class".to_string(), Value::from(exception.class.as_str()));
    if let Some(message) = &exception.message {
        object.insert("message".to_string(), Value::from(message.as_str()));
    }
    object.insert(
        "stacktrace".to_string(),
        Value::from(exception.stacktrace.join("\n")),
    );
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use proptest::prelude::*;
    use serde_json::Value;

    fn encode_to_value(encoder: &Encoder, event: &LogEvent) -> Value {
        let bytes = encoder.encode(event).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn sample_event() -> LogEvent {
        LogEvent::new(Level::Info, "a sample message")
            .with_timestamp_millis(1_397_521_334_308)
            .with_logger("com.example.service.Widget")
            .with_thread("main")
            .with_mdc_entry("request_id", "abc123")
    }

    #[test]
    fn test_timestamp_is_iso8601_utc_with_millis() {
        let encoder = Encoder::new(Some("host01"), None);
        let value = encode_to_value(&encoder, &sample_event());
        assert_eq!(value["@timestamp"], "2014-04-15T00:22:14.308Z");
    }

    #[test]
    fn test_timestamp_millis_are_always_three_digits() {
        let encoder = Encoder::new(Some("host01"), None);
        let event = sample_event().with_timestamp_millis(1_397_521_334_000);
        let value = encode_to_value(&encoder, &event);
        assert_eq!(value["@timestamp"], "2014-04-15T00:22:14.000Z");
    }

    #[test]
    fn test_out_of_range_timestamp_is_an_encode_error() {
        let encoder = Encoder::new(Some("host01"), None);
        let event = sample_event().with_timestamp_millis(i64::MAX);
        assert!(matches!(
            encoder.encode(&event),
            Err(EncodeError::TimestampRange(_))
        ));
    }

    #[test]
    fn test_canonical_field_set() {
        let encoder = Encoder::new(Some("host01"), None);
        let value = encode_to_value(&encoder, &sample_event());
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "@timestamp",
                "@version",
                "host",
                "level",
                "logger_full",
                "logger_simple",
                "mdc",
                "message",
                "thread",
            ]
        );
        assert_eq!(object["@version"], 1);
        assert_eq!(object["level"], "INFO");
        assert_eq!(object["message"], "a sample message");
        assert_eq!(object["thread"], "main");
        assert_eq!(object["host"], "host01");
        assert_eq!(object["mdc"]["request_id"], "abc123");
    }

    #[test]
    fn test_logger_simple_is_suffix_after_last_dot() {
        let encoder = Encoder::new(Some("host01"), None);

        let value = encode_to_value(&encoder, &sample_event());
        assert_eq!(value["logger_full"], "com.example.service.Widget");
        assert_eq!(value["logger_simple"], "Widget");

        let undotted = sample_event().with_logger("Widget");
        let value = encode_to_value(&encoder, &undotted);
        assert_eq!(value["logger_simple"], "Widget");
    }

    #[test]
    fn test_logger_fields_absent_without_logger_name() {
        let encoder = Encoder::new(Some("host01"), None);
        let mut event = sample_event();
        event.logger = None;
        let value = encode_to_value(&encoder, &event);
        assert!(value.get("logger_full").is_none());
        assert!(value.get("logger_simple").is_none());
    }

    #[test]
    fn test_blank_configured_host_falls_back() {
        let encoder = Encoder::new(Some("   "), None);
        // Either the machine hostname or the literal fallback; never blank.
        assert!(!encoder.host().trim().is_empty());

        let unconfigured = Encoder::new(None, None);
        assert!(!unconfigured.host().trim().is_empty());
    }

    #[test]
    fn test_exception_object() {
        let encoder = Encoder::new(Some("host01"), None);
        let event = sample_event().with_exception(ExceptionInfo {
            class: "java.lang.IllegalStateException".to_string(),
            message: Some("bad state".to_string()),
            stacktrace: vec![
                "java.lang.IllegalStateException: bad state".to_string(),
                "\tat com.example.Widget.spin(Widget.java:42)".to_string(),
            ],
        });
        let value = encode_to_value(&encoder, &event);
        let exception = &value["exception"];
        assert_eq!(exception["class"], "java.lang.IllegalStateException");
        assert_eq!(exception["message"], "bad state");
        assert_eq!(
            exception["stacktrace"],
            "java.lang.IllegalStateException: bad state\n\tat com.example.Widget.spin(Widget.java:42)"
        );
    }

    #[test]
    fn test_exception_message_omitted_when_absent() {
        let encoder = Encoder::new(Some("host01"), None);
        let event = sample_event().with_exception(ExceptionInfo {
            class: "java.io.IOException".to_string(),
            message: None,
            stacktrace: vec!["java.io.IOException".to_string()],
        });
        let value = encode_to_value(&encoder, &event);
        assert!(value["exception"].get("message").is_none());
        assert_eq!(value["exception"]["class"], "java.io.IOException");
    }

    #[test]
    fn test_exception_omitted_entirely_without_error() {
        let encoder = Encoder::new(Some("host01"), None);
        let value = encode_to_value(&encoder, &sample_event());
        assert!(value.get("exception").is_none());
    }

    #[test]
    fn test_user_fields_are_merged() {
        let encoder = Encoder::new(Some("host01"), Some("app:myApp,someField:myField"));
        let value = encode_to_value(&encoder, &sample_event());
        assert_eq!(value["app"], "myApp");
        assert_eq!(value["someField"], "myField");
    }

    #[test]
    fn test_user_fields_win_key_collisions() {
        let encoder = Encoder::new(Some("host01"), Some("host:overridden,level:SHOUTING"));
        let value = encode_to_value(&encoder, &sample_event());
        assert_eq!(value["host"], "overridden");
        assert_eq!(value["level"], "SHOUTING");
    }

    #[test]
    fn test_malformed_user_field_pairs_are_skipped() {
        let encoder = Encoder::new(Some("host01"), Some("app:myApp,nocolonhere,other:ok"));
        let value = encode_to_value(&encoder, &sample_event());
        assert_eq!(value["app"], "myApp");
        assert_eq!(value["other"], "ok");
        assert!(value.get("nocolonhere").is_none());
    }

    #[test]
    fn test_set_user_fields_reparses() {
        let mut encoder = Encoder::new(Some("host01"), Some("app:first"));
        encoder.set_user_fields("env:prod");
        let value = encode_to_value(&encoder, &sample_event());
        assert!(value.get("app").is_none());
        assert_eq!(value["env"], "prod");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = Encoder::new(Some("host01"), Some("app:myApp"));
        let event = sample_event()
            .with_mdc_entry("zz", "1")
            .with_mdc_entry("aa", "2");
        let first = encoder.encode(&event).unwrap();
        let second = encoder.encode(&event).unwrap();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn encode_produces_valid_json_for_arbitrary_events(
            message in any::<String>(),
            logger in proptest::option::of("[a-z]{1,6}(\\.[a-zA-Z]{1,8}){0,3}"),
            level in proptest::sample::select(vec![
                Level::Trace,
                Level::Debug,
                Level::Info,
                Level::Warn,
                Level::Error,
                Level::Fatal,
            ]),
            timestamp in 0i64..253_402_300_799_999i64,
            mdc in proptest::collection::hash_map("[a-z]{1,6}", "[a-z0-9]{0,8}", 0..4),
        ) {
            let encoder = Encoder::new(Some("prophost"), None);
            let mut event = LogEvent::new(level, message.clone())
                .with_timestamp_millis(timestamp)
                .with_thread("prop");
            event.mdc = mdc;
            if let Some(name) = &logger {
                event = event.with_logger(name.clone());
            }

            let first = encoder.encode(&event).unwrap();
            let second = encoder.encode(&event).unwrap();
            prop_assert_eq!(&first, &second);

            let value: Value = serde_json::from_slice(&first).unwrap();
            let object = value.as_object().unwrap();
            prop_assert_eq!(object.get("@version").and_then(Value::as_i64), Some(1));
            prop_assert_eq!(
                object.get("message").and_then(Value::as_str),
                Some(message.as_str())
            );
            prop_assert_eq!(
                object.get("level").and_then(Value::as_str),
                Some(level.as_str())
            );
            match &logger {
                Some(name) => {
                    let full = object.get("logger_full").and_then(Value::as_str).unwrap();
                    let simple = object.get("logger_simple").and_then(Value::as_str).unwrap();
                    prop_assert_eq!(full, name.as_str());
                    prop_assert!(full.ends_with(simple));
                    prop_assert_eq!(simple, name.rsplit('.').next().unwrap());
                }
                None => {
                    prop_assert!(object.get("logger_full").is_none());
                    prop_assert!(object.get("logger_simple").is_none());
                }
            }
        }
    }
}
