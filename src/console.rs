//! Console capture
//!
//! One listener per page, registered before navigation so nothing emitted
//! during page load is missed. CDP delivers `Runtime.consoleAPICalled` events
//! on a single ordered stream and the capture task is the only writer, so the
//! log holds exactly the emitted entries in emission order. The log is
//! append-only for the page's lifetime; nothing is pruned mid-run.

use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, RemoteObject};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::error::HarnessError;

/// One captured console emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEntry {
    pub level: String,
    pub text: String,
}

/// Ordered console log for a single page session.
///
/// Clones share the same underlying log; the handle held by the capture task
/// and the one held by the harness observe the same entries.
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    entries: Arc<Mutex<Vec<ConsoleEntry>>>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: ConsoleEntry) {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty()
    }

    /// Every entry captured so far, in emission order.
    pub fn snapshot(&self) -> Vec<ConsoleEntry> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// First `cap` entries whose text contains `substring`, order preserved.
    pub fn filter(&self, substring: &str, cap: usize) -> Vec<ConsoleEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|e| e.text.contains(substring))
            .take(cap)
            .cloned()
            .collect()
    }

    /// Register the console listener on `page` and spawn the capture task.
    ///
    /// Each event is appended to this log and echoed to stdout as
    /// `[level] text`. The task ends when the page's event stream closes.
    pub async fn attach(&self, page: &Page) -> Result<JoinHandle<()>, HarnessError> {
        let mut events = page.event_listener::<EventConsoleApiCalled>().await?;
        let log = self.clone();

        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let level = format!("{:?}", event.r#type).to_lowercase();
                let text = event
                    .args
                    .iter()
                    .map(render_remote_object)
                    .collect::<Vec<_>>()
                    .join(" ");

                println!("[{level}] {text}");
                log.push(ConsoleEntry { level, text });
            }
            tracing::debug!("console event stream closed");
        }))
    }
}

/// Render a CDP `RemoteObject` console argument as display text.
///
/// Primitives arrive in `value`; objects and arrays usually arrive with only
/// a `preview`; `description` and `unserializable_value` cover the rest
/// (class names, `undefined`, `NaN`, ...).
fn render_remote_object(arg: &RemoteObject) -> String {
    if let Some(value) = &arg.value {
        return match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }

    if let Some(preview) = &arg.preview {
        use chromiumoxide::cdp::js_protocol::runtime::ObjectPreviewSubtype;
        let is_array = preview
            .subtype
            .as_ref()
            .is_some_and(|s| matches!(s, ObjectPreviewSubtype::Array));

        let props: Vec<String> = preview
            .properties
            .iter()
            .map(|p| {
                let val = p.value.as_deref().unwrap_or("…");
                if is_array {
                    val.to_string()
                } else {
                    format!("{}: {}", p.name, val)
                }
            })
            .collect();

        let overflow = if preview.overflow { ", …" } else { "" };
        return if is_array {
            format!("[{}{}]", props.join(", "), overflow)
        } else {
            format!("{{{}{}}}", props.join(", "), overflow)
        };
    }

    if let Some(desc) = &arg.description {
        return desc.clone();
    }

    if let Some(unser) = &arg.unserializable_value {
        return unser.inner().clone();
    }

    String::from("[unknown]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn entry(level: &str, text: &str) -> ConsoleEntry {
        ConsoleEntry {
            level: level.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn log_preserves_insertion_order() {
        let log = ConsoleLog::new();
        for i in 0..50 {
            log.push(entry("log", &format!("line {i}")));
        }
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 50);
        for (i, e) in snapshot.iter().enumerate() {
            assert_eq!(e.text, format!("line {i}"));
        }
    }

    #[test]
    fn clones_share_one_log() {
        let log = ConsoleLog::new();
        let writer = log.clone();
        writer.push(entry("log", "from clone"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.snapshot()[0].text, "from clone");
    }

    #[test]
    fn filter_matches_substring_in_order() {
        let log = ConsoleLog::new();
        log.push(entry("log", "[INFO] connected"));
        log.push(entry("log", "[PART] chunk 1"));
        log.push(entry("log", "[EVENT] session.created"));
        log.push(entry("log", "[PART] chunk 2"));

        let parts = log.filter("[PART]", 20);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text, "[PART] chunk 1");
        assert_eq!(parts[1].text, "[PART] chunk 2");
    }

    #[test]
    fn filter_caps_match_count() {
        let log = ConsoleLog::new();
        for i in 0..30 {
            log.push(entry("log", &format!("[PART] chunk {i}")));
        }
        let parts = log.filter("[PART]", 20);
        assert_eq!(parts.len(), 20);
        assert_eq!(parts[0].text, "[PART] chunk 0");
        assert_eq!(parts[19].text, "[PART] chunk 19");
    }

    #[test]
    fn filter_on_empty_log() {
        let log = ConsoleLog::new();
        assert!(log.is_empty());
        assert!(log.filter("[PART]", 20).is_empty());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let log = ConsoleLog::new();
        log.push(entry("log", "before poison"));

        // Panic while holding the guard so the mutex is poisoned.
        let holder = log.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.entries.lock().unwrap();
            panic!("poison the log mutex");
        })
        .join();

        log.push(entry("log", "after poison"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.snapshot()[1].text, "after poison");
        assert_eq!(log.filter("after", 20).len(), 1);
    }

    proptest! {
        #[test]
        fn filter_is_order_preserving_subsequence(texts in prop::collection::vec("[a-z ]{0,12}", 0..80)) {
            let log = ConsoleLog::new();
            for t in &texts {
                log.push(entry("log", t));
            }

            let expected: Vec<String> = texts
                .iter()
                .filter(|t| t.contains('a'))
                .take(20)
                .cloned()
                .collect();
            let got: Vec<String> = log.filter("a", 20).into_iter().map(|e| e.text).collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn snapshot_never_drops_or_reorders(texts in prop::collection::vec(".{0,16}", 0..100)) {
            let log = ConsoleLog::new();
            for t in &texts {
                log.push(entry("log", t));
            }
            let got: Vec<String> = log.snapshot().into_iter().map(|e| e.text).collect();
            prop_assert_eq!(got, texts);
        }
    }

    #[test]
    fn render_string_primitive() {
        let arg: RemoteObject = serde_json::from_value(json!({
            "type": "string",
            "value": "hello world",
        }))
        .unwrap();
        assert_eq!(render_remote_object(&arg), "hello world");
    }

    #[test]
    fn render_number_primitive() {
        let arg: RemoteObject = serde_json::from_value(json!({
            "type": "number",
            "value": 42,
        }))
        .unwrap();
        assert_eq!(render_remote_object(&arg), "42");
    }

    #[test]
    fn render_array_preview() {
        let arg: RemoteObject = serde_json::from_value(json!({
            "type": "object",
            "subtype": "array",
            "description": "Array(3)",
            "preview": {
                "type": "object",
                "subtype": "array",
                "overflow": false,
                "properties": [
                    {"name": "0", "type": "number", "value": "1"},
                    {"name": "1", "type": "number", "value": "2"},
                    {"name": "2", "type": "number", "value": "3"}
                ]
            }
        }))
        .unwrap();
        assert_eq!(render_remote_object(&arg), "[1, 2, 3]");
    }

    #[test]
    fn render_object_preview_with_overflow() {
        let arg: RemoteObject = serde_json::from_value(json!({
            "type": "object",
            "description": "Object",
            "preview": {
                "type": "object",
                "overflow": true,
                "properties": [
                    {"name": "id", "type": "string", "value": "'abc'"}
                ]
            }
        }))
        .unwrap();
        let rendered = render_remote_object(&arg);
        assert!(rendered.starts_with('{'), "got: {rendered}");
        assert!(rendered.contains("id: 'abc'"), "got: {rendered}");
        assert!(rendered.contains('…'), "got: {rendered}");
    }

    #[test]
    fn render_description_fallback() {
        let arg: RemoteObject = serde_json::from_value(json!({
            "type": "object",
            "description": "SessionState"
        }))
        .unwrap();
        assert_eq!(render_remote_object(&arg), "SessionState");
    }

    #[test]
    fn render_unserializable_value() {
        let arg: RemoteObject = serde_json::from_value(json!({
            "type": "undefined",
            "unserializableValue": "undefined"
        }))
        .unwrap();
        assert_eq!(render_remote_object(&arg), "undefined");
    }
}
