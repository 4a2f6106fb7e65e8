//! Task command implementations.

use crate::cli::commands::open_workspace;
use crate::cli::{TaskCommands, TaskCreateArgs, TaskListArgs, TaskUpdateArgs};
use crate::config::default_actor;
use crate::error::{Error, Result};
use crate::model::{Blocking, Priority, Status, TaskDocument, TaskRecord};
use crate::store::ManualOrdering;
use crate::validate::{is_reference_id, normalize_priority, normalize_status};
use crate::workspace::{DurableWrite, Workspace};
use chrono::{NaiveDate, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Output for task create.
#[derive(Serialize)]
struct TaskCreateOutput<'a> {
    path: &'a Path,
    reference: Option<&'a str>,
    title: &'a str,
    status: Status,
}

/// Output for task list.
#[derive(Serialize)]
struct TaskListOutput<'a> {
    tasks: Vec<&'a TaskRecord>,
    count: usize,
}

/// Output for task update.
#[derive(Serialize)]
struct TaskUpdateOutput<'a> {
    path: &'a Path,
    #[serde(flatten)]
    write: &'a DurableWrite,
    task: &'a TaskDocument,
}

/// Output for one completed task.
#[derive(Serialize)]
struct TaskCompleteOutput {
    path: PathBuf,
    reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    successor: Option<PathBuf>,
}

/// Execute task commands.
pub fn execute(
    command: &TaskCommands,
    root: Option<&PathBuf>,
    config_dir: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let workspace = open_workspace(root, config_dir)?;
    match command {
        TaskCommands::Create(args) => create(&workspace, args, json),
        TaskCommands::List(args) => list(&workspace, args, json),
        TaskCommands::Show { id } => show(&workspace, id, json),
        TaskCommands::Update(args) => update(&workspace, args, json),
        TaskCommands::Complete { ids } => complete(&workspace, ids, actor, json),
        TaskCommands::Delete { ids } => delete(&workspace, ids, json),
        TaskCommands::Order { ids } => order(&workspace, ids, json),
    }
}

/// Find a task by reference id, or load it by path.
fn locate(workspace: &Workspace, id: &str) -> Result<TaskRecord> {
    let prefix = &workspace.settings().ref_ids.prefix;
    let looks_like_reference = id
        .get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .and_then(|_| id.get(prefix.len()..))
        .is_some_and(|hex| is_reference_id(&format!("{prefix}{}", hex.to_lowercase()), prefix));
    if looks_like_reference {
        return workspace.repository().find_by_reference(id);
    }
    workspace.repository().load(Path::new(id))
}

// ── Argument parsing ─────────────────────────────────────────

fn parse_status(input: &str) -> Result<Status> {
    normalize_status(input).map_err(|(value, suggestion)| {
        let constraint = match suggestion {
            Some(s) => format!("'{value}' is not a status. Did you mean '{s}'?"),
            None => format!("'{value}' is not a status"),
        };
        Error::validation("status", constraint)
    })
}

fn parse_priority(input: &str) -> Result<Priority> {
    normalize_priority(input).map_err(|(value, suggestion)| {
        let constraint = match suggestion {
            Some(s) => format!("'{value}': {s}"),
            None => format!("'{value}' is not a priority"),
        };
        Error::validation("priority", constraint)
    })
}

fn parse_date(field: &str, input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidArgument(format!("{field}: expected YYYY-MM-DD, got '{input}'")))
}

/// `None` keeps the value, `Some(None)` clears it.
fn parse_date_edit(field: &str, input: Option<&str>) -> Result<Option<Option<NaiveDate>>> {
    match input {
        None => Ok(None),
        Some(v) if is_clear(v) => Ok(Some(None)),
        Some(v) => parse_date(field, v).map(|d| Some(Some(d))),
    }
}

fn is_clear(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "" | "none" | "clear")
}

fn parse_blocked_by(ids: &[String]) -> Option<Blocking> {
    let ids: Vec<String> = ids
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!ids.is_empty()).then_some(Blocking::By(ids))
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ── Create ───────────────────────────────────────────────────

fn create(workspace: &Workspace, args: &TaskCreateArgs, json: bool) -> Result<()> {
    let mut document = TaskDocument::new(args.title.trim());
    document.status = parse_status(&args.status)?;
    if let Some(priority) = &args.priority {
        document.priority = parse_priority(priority)?;
    }
    document.due = args.due.as_deref().map(|v| parse_date("due", v)).transpose()?;
    document.defer = args.defer.as_deref().map(|v| parse_date("defer", v)).transpose()?;
    document.scheduled = args
        .scheduled
        .as_deref()
        .map(|v| parse_date("scheduled", v))
        .transpose()?;
    document.tags = args
        .tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    document.area = non_empty(args.area.as_ref());
    document.project = non_empty(args.project.as_ref());
    document.assignee = non_empty(args.assignee.as_ref());
    document.recurrence = non_empty(args.recurrence.as_ref());
    document.flagged = args.flag;
    document.source = non_empty(args.source.as_ref());
    if let Some(blocking) = parse_blocked_by(&args.blocked_by) {
        document.blocking = blocking;
    }
    if let Some(body) = &args.body {
        document.body.clone_from(body);
    }
    if document.status == Status::Done {
        document.completed = Some(Utc::now());
    }

    let record = workspace
        .repository()
        .create(document, args.file.as_deref())?;

    if json {
        let output = TaskCreateOutput {
            path: record.path(),
            reference: record.reference(),
            title: &record.document.title,
            status: record.document.status,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "Created {} {}",
            record.reference().unwrap_or("-").cyan(),
            record.document.title
        );
        println!("  {}", record.path().display().to_string().dimmed());
    }
    Ok(())
}

// ── List / show ──────────────────────────────────────────────

fn list(workspace: &Workspace, args: &TaskListArgs, json: bool) -> Result<()> {
    let status = args.status.as_deref().map(parse_status).transpose()?;
    let ordering = workspace.sidecars().ordering()?;

    let mut records: Vec<TaskRecord> = workspace
        .repository()
        .load_all()?
        .into_iter()
        .filter(|r| match status {
            Some(s) => r.document.status == s,
            None => args.all || !r.document.status.is_closed(),
        })
        .filter(|r| {
            args.tag
                .as_ref()
                .is_none_or(|tag| r.document.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
        })
        .collect();
    sort_records(&mut records, &ordering);
    records.truncate(args.limit);

    if json {
        let output = TaskListOutput {
            count: records.len(),
            tasks: records.iter().collect(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for record in &records {
        print_line(record);
    }
    Ok(())
}

/// Manual order first, then due date, then title.
fn sort_records(records: &mut [TaskRecord], ordering: &ManualOrdering) {
    records.sort_by(|a, b| {
        let pos = |r: &TaskRecord| r.reference().and_then(|id| ordering.position(id));
        match (pos(a), pos(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => match (a.document.due, b.document.due) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a.document.title.cmp(&b.document.title)),
        }
    });
}

fn status_marker(status: Status) -> String {
    match status {
        Status::Todo => "[ ]".to_string(),
        Status::Doing => "[>]".yellow().to_string(),
        Status::Waiting => "[~]".blue().to_string(),
        Status::Done => "[x]".green().to_string(),
        Status::Cancelled => "[-]".dimmed().to_string(),
    }
}

fn print_line(record: &TaskRecord) {
    let doc = &record.document;
    let mut line = format!(
        "{} {} {}",
        status_marker(doc.status),
        record.reference().unwrap_or("-").cyan(),
        doc.title
    );
    if doc.flagged {
        line.push_str(&format!(" {}", "⚑".red()));
    }
    if let Some(due) = doc.due {
        line.push_str(&format!(" {}", format!("due {due}").yellow()));
    }
    if !doc.tags.is_empty() {
        line.push_str(&format!(" {}", format!("#{}", doc.tags.join(" #")).dimmed()));
    }
    println!("{line}");
}

fn show(workspace: &Workspace, id: &str, json: bool) -> Result<()> {
    let record = locate(workspace, id)?;

    if json {
        println!("{}", serde_json::to_string(&record)?);
        return Ok(());
    }

    let doc = &record.document;
    println!("{} {}", record.reference().unwrap_or("-").cyan().bold(), doc.title.bold());
    println!("  {}", record.path().display().to_string().dimmed());
    println!("  Status:   {}", doc.status);
    if doc.priority != Priority::None {
        println!("  Priority: {}", doc.priority);
    }
    if doc.flagged {
        println!("  Flagged");
    }
    for (label, date) in [("Due", doc.due), ("Defer", doc.defer), ("Scheduled", doc.scheduled)] {
        if let Some(date) = date {
            println!("  {:<9} {date}", format!("{label}:"));
        }
    }
    if let Some(area) = &doc.area {
        println!("  Area:     {area}");
    }
    if let Some(project) = &doc.project {
        println!("  Project:  {project}");
    }
    if !doc.tags.is_empty() {
        println!("  Tags:     {}", doc.tags.join(", "));
    }
    if let Some(assignee) = &doc.assignee {
        println!("  Assignee: {assignee}");
    }
    if let Some(rule) = &doc.recurrence {
        println!("  Repeats:  {rule}");
    }
    match &doc.blocking {
        Blocking::Clear => {}
        Blocking::Unspecified => println!("  Blocked"),
        Blocking::By(ids) => println!("  Blocked by: {}", ids.join(", ")),
    }
    if let Some(completed) = doc.completed {
        let by = doc
            .completed_by
            .as_deref()
            .map(|b| format!(" by {b}"))
            .unwrap_or_default();
        println!("  Completed {}{by}", completed.format("%Y-%m-%d %H:%M"));
    }
    if !doc.body.trim().is_empty() {
        println!();
        println!("{}", doc.body.trim_end());
    }
    Ok(())
}

// ── Update ───────────────────────────────────────────────────

fn update(workspace: &Workspace, args: &TaskUpdateArgs, json: bool) -> Result<()> {
    let record = locate(workspace, &args.id)?;

    // Parse everything before touching the file
    let status = args.status.as_deref().map(parse_status).transpose()?;
    let priority = args.priority.as_deref().map(parse_priority).transpose()?;
    let due = parse_date_edit("due", args.due.as_deref())?;
    let defer = parse_date_edit("defer", args.defer.as_deref())?;
    let scheduled = parse_date_edit("scheduled", args.scheduled.as_deref())?;
    let blocking = if args.unblock {
        Some(Blocking::Clear)
    } else if args.blocked {
        Some(Blocking::Unspecified)
    } else {
        parse_blocked_by(&args.blocked_by)
    };

    let (document, write) = workspace.update_durably(record.path(), |doc| {
        if let Some(title) = &args.title {
            doc.title = title.trim().to_string();
        }
        if let Some(body) = &args.body {
            doc.body.clone_from(body);
        }
        if let Some(status) = status {
            doc.status = status;
            if status.is_closed() {
                doc.completed.get_or_insert_with(Utc::now);
            } else {
                doc.completed = None;
                doc.completed_by = None;
            }
        }
        if let Some(priority) = priority {
            doc.priority = priority;
        }
        if let Some(due) = due {
            doc.due = due;
        }
        if let Some(defer) = defer {
            doc.defer = defer;
        }
        if let Some(scheduled) = scheduled {
            doc.scheduled = scheduled;
        }
        for tag in &args.add_tags {
            let tag = tag.trim();
            if !tag.is_empty() && !doc.tags.iter().any(|t| t == tag) {
                doc.tags.push(tag.to_string());
            }
        }
        doc.tags
            .retain(|t| !args.remove_tags.iter().any(|r| r.trim() == t));
        if let Some(area) = &args.area {
            doc.area = non_empty(Some(area));
        }
        if let Some(project) = &args.project {
            doc.project = non_empty(Some(project));
        }
        if let Some(assignee) = &args.assignee {
            doc.assignee = non_empty(Some(assignee));
        }
        if let Some(rule) = &args.recurrence {
            doc.recurrence = if is_clear(rule) { None } else { non_empty(Some(rule)) };
        }
        if args.flag {
            doc.flagged = true;
        }
        if args.unflag {
            doc.flagged = false;
        }
        if let Some(blocking) = blocking {
            doc.blocking = blocking;
        }
    })?;

    if json {
        let output = TaskUpdateOutput {
            path: record.path(),
            write: &write,
            task: &document,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    match write {
        DurableWrite::Written { .. } => println!(
            "Updated {} {}",
            document.reference.as_deref().unwrap_or("-").cyan(),
            document.title
        ),
        DurableWrite::Queued { id } => println!(
            "{} {} could not be written now; queued as {id} (`tf journal replay` retries)",
            "Queued:".yellow().bold(),
            document.title
        ),
    }
    Ok(())
}

// ── Complete / delete / order ────────────────────────────────

fn complete(workspace: &Workspace, ids: &[String], actor: Option<&str>, json: bool) -> Result<()> {
    if ids.is_empty() {
        return Err(Error::InvalidArgument("No task ids given".to_string()));
    }
    let actor = actor.map_or_else(default_actor, ToString::to_string);
    let repo = workspace.repository();
    let now = Utc::now();
    let mut results = Vec::with_capacity(ids.len());

    for id in ids {
        let record = locate(workspace, id)?;
        let output = if record.document.is_recurring() {
            let outcome = repo.complete_repeating(record.path(), now, Some(actor.as_str()))?;
            TaskCompleteOutput {
                path: outcome.completed.path().to_path_buf(),
                reference: outcome.completed.reference().map(ToString::to_string),
                successor: outcome.successor.map(|s| s.path().to_path_buf()),
            }
        } else {
            let completed = repo.complete(record.path(), now, Some(actor.as_str()))?;
            TaskCompleteOutput {
                path: completed.path().to_path_buf(),
                reference: completed.reference().map(ToString::to_string),
                successor: None,
            }
        };

        if !json {
            println!(
                "{} {} {}",
                "✓".green(),
                output.reference.as_deref().unwrap_or("-").cyan(),
                record.document.title
            );
            if let Some(next) = &output.successor {
                println!("  Next occurrence: {}", next.display());
            }
        }
        results.push(output);
    }

    if json {
        println!("{}", serde_json::json!({ "completed": results, "count": results.len() }));
    }
    Ok(())
}

fn delete(workspace: &Workspace, ids: &[String], json: bool) -> Result<()> {
    if ids.is_empty() {
        return Err(Error::InvalidArgument("No task ids given".to_string()));
    }
    let mut deleted = Vec::with_capacity(ids.len());
    for id in ids {
        let record = locate(workspace, id)?;
        workspace.repository().delete(record.path())?;
        if !json {
            println!("Deleted {} {}", record.reference().unwrap_or("-").cyan(), record.document.title);
        }
        deleted.push(record.path().to_path_buf());
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "count": deleted.len() }));
    }
    Ok(())
}

fn order(workspace: &Workspace, ids: &[String], json: bool) -> Result<()> {
    let repo = workspace.repository();
    let mut order = Vec::with_capacity(ids.len());
    for id in ids {
        // Store the id as written in the file
        let record = repo.find_by_reference(id)?;
        if let Some(reference) = record.reference() {
            order.push(reference.to_string());
        }
    }

    let ordering = ManualOrdering { order };
    workspace.sidecars().save_ordering(&ordering)?;

    if json {
        println!("{}", serde_json::to_string(&ordering)?);
    } else {
        println!("Saved manual order of {} task(s)", ordering.order.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileIdentity;

    fn record(title: &str, reference: Option<&str>, due: Option<NaiveDate>) -> TaskRecord {
        let mut document = TaskDocument::new(title);
        document.reference = reference.map(String::from);
        document.due = due;
        TaskRecord {
            identity: FileIdentity::new(format!("/tasks/{title}.md")),
            document,
        }
    }

    #[test]
    fn test_sort_manual_then_due_then_title() {
        let date = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        let mut records = vec![
            record("b", None, None),
            record("a", None, None),
            record("due later", None, Some(date(20))),
            record("due soon", None, Some(date(2))),
            record("pinned", Some("T-0001"), None),
        ];
        let ordering = ManualOrdering {
            order: vec!["T-0001".into()],
        };

        sort_records(&mut records, &ordering);
        let titles: Vec<&str> = records.iter().map(|r| r.document.title.as_str()).collect();
        assert_eq!(titles, vec!["pinned", "due soon", "due later", "a", "b"]);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_status("wip").unwrap(), Status::Doing);
        assert!(matches!(parse_status("bogus"), Err(Error::Validation { .. })));
        assert_eq!(parse_priority("!!!").unwrap(), Priority::High);
        assert_eq!(parse_date_edit("due", Some("none")).unwrap(), Some(None));
        assert!(parse_date_edit("due", Some("tomorrow")).is_err());
        assert_eq!(parse_blocked_by(&[" ".into()]), None);
    }
}
