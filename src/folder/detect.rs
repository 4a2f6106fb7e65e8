//! Heuristic task-folder detection.
//!
//! Scores every directory under the cloud-documents root (up to
//! `max_depth` levels) and picks the one most likely to be an existing task
//! folder. Scoring:
//! - name matches a known name: `name_weight`
//! - each sidecar file present: `sidecar_weight`
//! - each markdown file, up to `sample_files`: 1
//! - each sampled markdown file with schema markers: `marker_weight`
//!
//! Highest score wins; ties go to the shallower path, then the
//! lexicographically smaller one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::config::DetectionSettings;
use crate::store::SIDECAR_FILES;

/// Bytes read from each sampled file when looking for markers.
const MARKER_SCAN_BYTES: usize = 4096;

/// One scored directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub depth: usize,
    pub score: u32,
}

/// Find the best-scoring directory under `cloud_root`.
///
/// Returns `None` when no directory reaches `min_score`.
#[must_use]
pub fn detect(cloud_root: &Path, settings: &DetectionSettings, extension: &str) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    let mut pending = vec![(cloud_root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = pending.pop() {
        if depth >= settings.max_depth {
            continue;
        }
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            // Symlinked directories are not followed here.
            if name.starts_with('.') || !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }

            let path = entry.path();
            let candidate = Candidate {
                score: score_directory(&path, settings, extension),
                depth: depth + 1,
                path: path.clone(),
            };
            trace!(path = %candidate.path.display(), score = candidate.score, "Scored directory");

            if candidate.score >= settings.min_score
                && best.as_ref().is_none_or(|b| beats(&candidate, b))
            {
                best = Some(candidate);
            }
            pending.push((path, depth + 1));
        }
    }

    if let Some(found) = &best {
        debug!(path = %found.path.display(), score = found.score, "Detected task folder");
    }
    best
}

fn beats(a: &Candidate, b: &Candidate) -> bool {
    a.score
        .cmp(&b.score)
        .then_with(|| b.depth.cmp(&a.depth))
        .then_with(|| b.path.cmp(&a.path))
        .is_gt()
}

/// Score one directory.
#[must_use]
pub fn score_directory(dir: &Path, settings: &DetectionSettings, extension: &str) -> u32 {
    let mut score = 0;

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if settings.known_names.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
        score += settings.name_weight;
    }

    for sidecar in SIDECAR_FILES {
        if dir.join(sidecar).is_file() {
            score += settings.sidecar_weight;
        }
    }

    let Ok(entries) = fs::read_dir(dir) else {
        return score;
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
                && p.is_file()
        })
        .collect();
    files.sort();
    files.truncate(settings.sample_files);

    for file in &files {
        score += 1;
        if read_prefix(file).is_some_and(|text| has_schema_markers(&text)) {
            score += settings.marker_weight;
        }
    }

    score
}

fn read_prefix(path: &Path) -> Option<String> {
    use std::io::Read;

    let mut buf = Vec::with_capacity(MARKER_SCAN_BYTES);
    fs::File::open(path)
        .ok()?
        .take(MARKER_SCAN_BYTES as u64)
        .read_to_end(&mut buf)
        .ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Whether a file's field section has `status:` plus `ref:` or `title:`.
#[must_use]
pub fn has_schema_markers(text: &str) -> bool {
    let mut lines = text.trim_start_matches('\u{feff}').lines();
    if lines.next().map(str::trim_end) != Some("---") {
        return false;
    }

    let (mut status, mut identity) = (false, false);
    for line in lines {
        let line = line.trim_end();
        if line == "---" {
            break;
        }
        let key = line
            .split_once(':')
            .map(|(k, _)| k.trim().to_lowercase())
            .unwrap_or_default();
        match key.as_str() {
            "status" => status = true,
            "ref" | "title" => identity = true,
            _ => {}
        }
    }
    status && identity
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TASK: &str = "---\ntitle: Buy milk\nstatus: todo\nref: T-0001\n---\n";

    fn settings() -> DetectionSettings {
        DetectionSettings::default()
    }

    #[test]
    fn test_schema_markers() {
        assert!(has_schema_markers(TASK));
        assert!(has_schema_markers("---\r\nstatus: done\r\nref: T-1\r\n---\r\n"));
        assert!(!has_schema_markers("---\ntitle: only title\n---\n"));
        assert!(!has_schema_markers("# Just notes\nstatus: todo\ntitle: x\n"));
    }

    #[test]
    fn test_score_components() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Tasks");
        fs::create_dir(&dir).unwrap();
        let s = settings();
        assert_eq!(score_directory(&dir, &s, "md"), s.name_weight);

        fs::write(dir.join(".ordering.json"), "{}").unwrap();
        fs::write(dir.join("plain.md"), "# notes").unwrap();
        fs::write(dir.join("task.md"), TASK).unwrap();
        assert_eq!(
            score_directory(&dir, &s, "md"),
            s.name_weight + s.sidecar_weight + 2 + s.marker_weight
        );
    }

    #[test]
    fn test_detect_prefers_marked_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        // Named like a task folder but empty
        fs::create_dir(root.join("Todo")).unwrap();
        // Unremarkable name, full of real task files
        let real = root.join("Stuff");
        fs::create_dir(&real).unwrap();
        for i in 0..3 {
            fs::write(real.join(format!("t{i}.md")), TASK).unwrap();
        }

        let found = detect(root, &settings(), "md").unwrap();
        assert_eq!(found.path, real);
        assert_eq!(found.depth, 1);
    }

    #[test]
    fn test_detect_below_min_score() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Photos");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("readme.md"), "hello").unwrap();
        assert!(detect(temp_dir.path(), &settings(), "md").is_none());
    }

    #[test]
    fn test_tie_prefers_shallower_then_smaller() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/tasks")).unwrap();
        fs::create_dir(root.join("tasks")).unwrap();
        fs::create_dir(root.join("todo")).unwrap();

        let found = detect(root, &settings(), "md").unwrap();
        assert_eq!(found.path, root.join("tasks"));

        let shallow = Candidate {
            path: root.join("b"),
            depth: 1,
            score: 10,
        };
        let deep = Candidate {
            path: root.join("a/b"),
            depth: 2,
            score: 10,
        };
        assert!(beats(&shallow, &deep));
        assert!(!beats(&deep, &shallow));
    }

    #[test]
    fn test_max_depth_respected() {
        let temp_dir = TempDir::new().unwrap();
        let deep = temp_dir.path().join("x/y/tasks");
        fs::create_dir_all(&deep).unwrap();
        assert!(detect(temp_dir.path(), &settings(), "md").is_none());
    }
}
