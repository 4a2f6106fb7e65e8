//! `---` delimited YAML front matter codec.
//!
//! ```text
//! ---
//! title: Pay rent
//! status: todo
//! due: 2026-03-01
//! recurrence: FREQ=MONTHLY
//! ref: T-1a2b
//! tags: [home, bills]
//! ---
//! Free-form body text.
//! ```
//!
//! The header is a YAML mapping. Unknown keys are kept with their YAML
//! values, in order, after the known ones.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};

use crate::codec::{DocumentCodec, ParseFailure};
use crate::model::{Blocking, Priority, TaskDocument};
use crate::validate::{normalize_priority, normalize_status};

const DELIMITER: &str = "---";

/// The header as it sits in the file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Header {
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flagged: Option<bool>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    area: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    #[serde(default, deserialize_with = "list", skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    due: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    defer: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scheduled: Option<NaiveDate>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    recurrence: Option<String>,
    #[serde(rename = "ref", default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blocked: Option<bool>,
    #[serde(default, deserialize_with = "list", skip_serializing_if = "Vec::is_empty")]
    blocked_by: Vec<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, deserialize_with = "timestamp", skip_serializing_if = "Option::is_none")]
    created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp", skip_serializing_if = "Option::is_none")]
    modified: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp", skip_serializing_if = "Option::is_none")]
    completed: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    completed_by: Option<String>,
    #[serde(flatten)]
    extra: Mapping,
}

impl Header {
    fn into_document(self, body: &str) -> Result<TaskDocument, ParseFailure> {
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ParseFailure::new("missing title"))?;

        let mut doc = TaskDocument::new(title);
        if let Some(status) = self.status {
            doc.status = normalize_status(&status)
                .map_err(|(v, _)| ParseFailure::new(format!("invalid status '{v}'")))?;
        }
        if let Some(priority) = self.priority.filter(|p| !p.is_empty()) {
            doc.priority = normalize_priority(&priority)
                .map_err(|(v, _)| ParseFailure::new(format!("invalid priority '{v}'")))?;
        }
        doc.flagged = self.flagged.unwrap_or(false);
        doc.area = self.area;
        doc.project = self.project;
        doc.tags = self.tags;
        doc.due = self.due;
        doc.defer = self.defer;
        doc.scheduled = self.scheduled;
        doc.recurrence = self.recurrence;
        doc.reference = self.reference;
        doc.assignee = self.assignee;
        doc.blocking = if !self.blocked_by.is_empty() {
            Blocking::By(self.blocked_by)
        } else if self.blocked == Some(true) {
            Blocking::Unspecified
        } else {
            Blocking::Clear
        };
        doc.source = self.source;
        doc.created = self.created;
        doc.modified = self.modified;
        doc.completed = self.completed;
        doc.completed_by = self.completed_by;
        doc.extra = self.extra;
        doc.body = body.to_string();
        Ok(doc)
    }

    fn from_document(doc: &TaskDocument) -> Self {
        let (blocked, blocked_by) = match &doc.blocking {
            Blocking::Clear => (None, Vec::new()),
            Blocking::Unspecified => (Some(true), Vec::new()),
            Blocking::By(refs) => (None, refs.clone()),
        };
        Self {
            title: Some(doc.title.clone()),
            status: Some(doc.status.as_str().to_string()),
            priority: (doc.priority != Priority::None).then(|| doc.priority.as_str().to_string()),
            flagged: doc.flagged.then_some(true),
            area: doc.area.clone(),
            project: doc.project.clone(),
            tags: doc.tags.clone(),
            due: doc.due,
            defer: doc.defer,
            scheduled: doc.scheduled,
            recurrence: doc.recurrence.clone(),
            reference: doc.reference.clone(),
            assignee: doc.assignee.clone(),
            blocked,
            blocked_by,
            source: doc.source.clone(),
            created: doc.created,
            modified: doc.modified,
            completed: doc.completed,
            completed_by: doc.completed_by.clone(),
            extra: doc.extra.clone(),
        }
    }
}

/// Front matter codec for markdown task files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontMatterCodec;

impl DocumentCodec for FrontMatterCodec {
    fn decode(&self, text: &str) -> Result<TaskDocument, ParseFailure> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let (header, body) = split_front_matter(text)?;
        if header.trim().is_empty() {
            return Err(ParseFailure::new("missing title"));
        }

        let header: Header = serde_yaml::from_str(header)
            .map_err(|e| ParseFailure::new(format!("invalid front matter: {e}")))?;
        header.into_document(body)
    }

    fn encode(&self, doc: &TaskDocument) -> String {
        // Strings, dates and YAML values cannot fail to serialize
        let yaml = serde_yaml::to_string(&Header::from_document(doc)).unwrap_or_default();

        let mut out = String::with_capacity(yaml.len() + doc.body.len() + 8);
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(&yaml);
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(&doc.body);
        out
    }
}

/// Split text into (field section, body).
fn split_front_matter(text: &str) -> Result<(&str, &str), ParseFailure> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
        .ok_or_else(|| ParseFailure::new("missing opening `---`"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == DELIMITER {
            return Ok((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }

    Err(ParseFailure::new("missing closing `---`"))
}

// ── Lenient field readers ────────────────────────────────────

/// A single scalar as text. Hand-edited files write `priority: 3` or
/// `title: 2026` without quotes; an empty value reads as absent.
fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(D::Error::custom("expected a single value")),
    }
}

/// A sequence of scalars, or one scalar standing for a one-item list.
fn list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let item = |value: Value| match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(D::Error::custom("list items must be single values")),
    };
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items.into_iter().map(item).collect(),
        Some(other) => item(other).map(|s| vec![s]),
    }
}

/// RFC 3339, or a bare date taken as midnight UTC.
fn timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let Some(text) = scalar(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&text) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use chrono::TimeZone;

    fn codec() -> FrontMatterCodec {
        FrontMatterCodec
    }

    #[test]
    fn test_decode_basic() {
        let text = "---\ntitle: Pay rent\nstatus: todo\ndue: 2026-03-01\nrecurrence: FREQ=MONTHLY\nref: T-1a2b\ntags: [home, bills]\n---\nCall the landlord first.\n";
        let doc = codec().decode(text).unwrap();

        assert_eq!(doc.title, "Pay rent");
        assert_eq!(doc.status, Status::Todo);
        assert_eq!(doc.due, NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(doc.recurrence.as_deref(), Some("FREQ=MONTHLY"));
        assert_eq!(doc.reference.as_deref(), Some("T-1a2b"));
        assert_eq!(doc.tags, vec!["home", "bills"]);
        assert_eq!(doc.body, "Call the landlord first.\n");
    }

    #[test]
    fn test_round_trip_preserves_unknown_fields() {
        let text = "---\ntitle: Plan trip\nstatus: doing\nx-color: teal\nestimate: 3h\nsteps:\n  - pack\n  - go\n---\nbody";
        let doc = codec().decode(text).unwrap();
        assert_eq!(doc.extra_field("x-color"), Some("teal"));
        assert_eq!(doc.extra_field("estimate"), Some("3h"));
        assert!(doc.extra.get("steps").is_some_and(Value::is_sequence));

        let encoded = codec().encode(&doc);
        let again = codec().decode(&encoded).unwrap();
        assert_eq!(doc, again);
        assert!(encoded.find("x-color").unwrap() < encoded.find("estimate").unwrap());
    }

    #[test]
    fn test_round_trip_all_fields() {
        let mut doc = TaskDocument::new("Everything");
        doc.status = Status::Done;
        doc.created = Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());
        doc.modified = Some(Utc::now());
        doc.due = NaiveDate::from_ymd_opt(2026, 2, 1);
        doc.defer = NaiveDate::from_ymd_opt(2026, 1, 25);
        doc.scheduled = NaiveDate::from_ymd_opt(2026, 1, 28);
        doc.completed = Some(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap());
        doc.completed_by = Some("sam".into());
        doc.assignee = Some("alex".into());
        doc.priority = Priority::High;
        doc.flagged = true;
        doc.area = Some("Home".into());
        doc.project = Some("Move".into());
        doc.tags = vec!["a".into(), "b".into()];
        doc.recurrence = Some("every 2 weeks".into());
        doc.reference = Some("T-00ff".into());
        doc.blocking = Blocking::By(vec!["T-0001".into(), "T-0002".into()]);
        doc.source = Some("import".into());
        doc.body = "line one\n\nline three\n".into();

        let again = codec().decode(&codec().encode(&doc)).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_round_trip_awkward_strings() {
        let mut doc = TaskDocument::new("Call mom ");
        doc.area = Some(" Home".into());
        doc.project = Some(String::new());
        doc.tags = vec!["\"quoted\"".into(), "'single'".into(), "#hash".into()];
        doc.assignee = Some("true".into());
        doc.source = Some("2026-03-01".into());
        doc.completed_by = Some("key: value".into());
        doc.recurrence = Some("123".into());

        let encoded = codec().encode(&doc);
        let again = codec().decode(&encoded).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_hand_written_scalars() {
        let doc = codec()
            .decode("---\ntitle: 2026\npriority: 3\ntags: solo\narea:\n---\n")
            .unwrap();
        assert_eq!(doc.title, "2026");
        assert_eq!(doc.priority, Priority::High);
        assert_eq!(doc.tags, vec!["solo"]);
        assert_eq!(doc.area, None);
    }

    #[test]
    fn test_blocked_without_refs() {
        let doc = codec()
            .decode("---\ntitle: Wait\nblocked: true\n---\n")
            .unwrap();
        assert_eq!(doc.blocking, Blocking::Unspecified);

        let encoded = codec().encode(&doc);
        assert!(encoded.contains("blocked: true"));
    }

    #[test]
    fn test_decode_failures() {
        assert!(codec().decode("no front matter").is_err());
        assert!(codec().decode("---\ntitle: x\n").is_err());
        assert!(codec().decode("---\nstatus: todo\n---\n").is_err());
        assert!(codec().decode("---\n---\n").is_err());
        assert!(codec().decode("---\ntitle: x\nstatus: maybe\n---\n").is_err());
        assert!(codec().decode("---\ntitle: x\ndue: tomorrow\n---\n").is_err());
        assert!(codec().decode("---\ntitle: x\ntitle: y\n---\n").is_err());
        assert!(codec().decode("---\ntitle: x\njust text\n---\n").is_err());
        assert!(codec().decode("---\ntitle: [a, b]\n---\n").is_err());
    }

    #[test]
    fn test_status_synonyms_accepted() {
        let doc = codec().decode("---\ntitle: x\nstatus: completed\n---\n").unwrap();
        assert_eq!(doc.status, Status::Done);
    }

    #[test]
    fn test_crlf_delimiters() {
        let doc = codec()
            .decode("---\r\ntitle: Windows\r\n---\r\nbody\r\n")
            .unwrap();
        assert_eq!(doc.title, "Windows");
        assert_eq!(doc.body, "body\r\n");
    }
}
