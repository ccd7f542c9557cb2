use anyhow::Result;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use vgrep::{
    search, CancelToken, CollectSink, LineEmitter, MatchEvent, SearchConfig, SearchEvent,
    SearchRequest, Searcher,
};

fn create_test_files(
    dir: &tempfile::TempDir,
    file_count: usize,
    lines_per_file: usize,
) -> Result<()> {
    for i in 0..file_count {
        let file_path = dir.path().join(format!("test_{}.txt", i));
        let mut file = File::create(file_path)?;
        for j in 0..lines_per_file {
            writeln!(file, "Line {} in file {}: TODO implement this", j, i)?;
            writeln!(file, "Another line {} in file {}: nothing special", j, i)?;
            writeln!(file, "FIXME: This is a bug in file {} line {}", i, j)?;
        }
    }
    Ok(())
}

fn config(threads: usize) -> SearchConfig {
    SearchConfig {
        thread_count: NonZeroUsize::new(threads).unwrap(),
        ..SearchConfig::default()
    }
}

fn run(threads: usize, request: &SearchRequest) -> Result<Vec<SearchEvent>> {
    let sink = CollectSink::new();
    Searcher::new(config(threads))?.run(request, &sink, &CancelToken::new())?;
    Ok(sink.into_events())
}

fn matches(events: &[SearchEvent]) -> Vec<MatchEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            SearchEvent::Match(m) => Some(m.clone()),
            _ => None,
        })
        .collect()
}

fn match_set(events: &[SearchEvent]) -> BTreeSet<(PathBuf, usize, String)> {
    matches(events)
        .into_iter()
        .map(|m| (m.file_path, m.line_number, m.line_content))
        .collect()
}

#[test]
fn test_simple_term() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 10, 100)?;

    let request = SearchRequest::new(dir.path(), "todo")?;
    let events = run(4, &request)?;

    assert_eq!(matches(&events).len(), 1000);
    let last = events.last().unwrap();
    match last {
        SearchEvent::Progress(p) => {
            assert!(p.is_final);
            assert_eq!((p.files_processed, p.files_total), (10, 10));
        }
        other => panic!("expected final snapshot, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_pool_size_does_not_change_results() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 30, 20)?;
    fs::create_dir_all(dir.path().join("nested/deeper"))?;
    fs::write(dir.path().join("nested/deeper/x.txt"), "fixme\nFIXME\n")?;

    let request = SearchRequest::new(dir.path(), "FixMe")?;
    let single = match_set(&run(1, &request)?);
    let many = match_set(&run(8, &request)?);
    assert_eq!(single.len(), 30 * 20 + 2);
    assert_eq!(single, many);
    Ok(())
}

#[test]
fn test_repeated_runs_are_identical() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 15, 10)?;

    let request = SearchRequest::new(dir.path(), "line")?;
    let first = match_set(&run(4, &request)?);
    let second = match_set(&run(4, &request)?);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_line_order_within_file() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 8, 50)?;

    let request = SearchRequest::new(dir.path(), "todo")?;
    let events = run(4, &request)?;

    let mut last_line: std::collections::HashMap<PathBuf, usize> = Default::default();
    for m in matches(&events) {
        let previous = last_line.insert(m.file_path.clone(), m.line_number);
        if let Some(previous) = previous {
            assert!(previous < m.line_number);
        }
    }
    Ok(())
}

#[test]
fn test_progress_invariants() -> Result<()> {
    let dir = tempdir()?;
    for d in 0..5 {
        fs::create_dir(dir.path().join(format!("dir{}", d)))?;
        for f in 0..20 {
            fs::write(
                dir.path().join(format!("dir{}/f{}.txt", d, f)),
                "needle\n",
            )?;
        }
    }

    let request = SearchRequest::new(dir.path(), "needle")?;
    let events = run(6, &request)?;
    let snapshots: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SearchEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();

    for p in &snapshots {
        assert!(p.files_processed <= p.files_total);
    }
    for pair in snapshots.windows(2) {
        assert!(pair[0].files_processed < pair[1].files_processed);
    }
    assert_eq!(snapshots.iter().filter(|p| p.is_final).count(), 1);
    assert!(events.last().unwrap().is_final());
    Ok(())
}

#[test]
fn test_absolute_paths() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.txt"), "needle\n")?;
    let cwd_relative = SearchRequest::new(dir.path(), "needle")?;

    let events = run(2, &cwd_relative)?;
    let found = matches(&events);
    assert_eq!(found.len(), 1);
    assert!(found[0].file_path.is_absolute());
    assert_eq!(
        found[0].file_path,
        dir.path().canonicalize()?.join("a.txt")
    );
    Ok(())
}

#[test]
fn test_long_line_and_no_trailing_newline() -> Result<()> {
    let dir = tempdir()?;
    let long = format!("{}Needle{}", "a".repeat(200_000), "b".repeat(10));
    fs::write(dir.path().join("long.txt"), format!("start\n{}", long))?;

    let request = SearchRequest::new(dir.path(), "needle")?;
    let found = matches(&run(2, &request)?);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].line_number, 2);
    assert_eq!(found[0].line_content, long);
    Ok(())
}

#[test]
fn test_skipped_file_counts_as_processed() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.txt"), "needle\n")?;
    fs::write(dir.path().join("b.bin"), b"\x00needle")?;

    let request = SearchRequest::new(dir.path(), "needle")?;
    let sink = CollectSink::new();
    let summary = Searcher::new(config(2))?.run(&request, &sink, &CancelToken::new())?;

    assert_eq!(summary.files_total, 2);
    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.matched_lines, 1);
    let skips: Vec<_> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SearchEvent::Skipped(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].reason, "binary file");
    Ok(())
}

#[test]
fn test_past_deadline_cancels() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 20, 10)?;

    let request = SearchRequest::new(dir.path(), "todo")?;
    let cancel = CancelToken::new().with_deadline(Instant::now() - Duration::from_millis(1));
    let sink = CollectSink::new();
    let summary = Searcher::new(config(4))?.run(&request, &sink, &cancel)?;

    assert!(summary.cancelled);
    assert!(!sink.events().iter().any(|e| e.is_final()));
    Ok(())
}

#[test]
fn test_cancel_through_handle() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 200, 50)?;

    let mut cfg = config(2);
    cfg.event_capacity = 1;
    let request = SearchRequest::new(dir.path(), "line")?;
    let handle = Searcher::new(cfg)?.spawn(request, CancelToken::new())?;

    // Take a few events, then stop the run
    let first: Vec<SearchEvent> = handle.events().iter().take(5).collect();
    assert_eq!(first.len(), 5);
    handle.cancel();
    let rest: Vec<SearchEvent> = handle.events().iter().collect();
    let summary = handle.join()?;

    assert!(summary.cancelled);
    assert!(!rest.iter().any(|e| e.is_final()));
    Ok(())
}

#[test]
fn test_line_emitter_output() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.txt"), "one\nTwo: needle\n")?;

    let request = SearchRequest::new(dir.path(), "NEEDLE")?;
    let emitter = LineEmitter::new(Vec::new(), Vec::new());
    Searcher::new(config(1))?.run(&request, &emitter, &CancelToken::new())?;
    let (out, err) = emitter.into_inner();

    let expected = format!(
        "{}:2:Two: needle\nProcessed 1/1\n",
        dir.path().canonicalize()?.join("a.txt").display()
    );
    assert_eq!(String::from_utf8(out)?, expected);
    assert!(err.is_empty());
    Ok(())
}

#[test]
fn test_search_with_config() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 3, 4)?;
    fs::write(dir.path().join("notes.md"), "TODO in markdown\n")?;

    let cfg = SearchConfig {
        root_path: dir.path().to_path_buf(),
        term: "todo".to_string(),
        file_extensions: Some(vec!["md".to_string()]),
        ..config(2)
    };
    let sink = CollectSink::new();
    let summary = search(&cfg, &sink)?;
    assert_eq!(summary.files_total, 1);
    assert_eq!(summary.matched_lines, 1);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_skipped() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir()?;
    let locked = dir.path().join("locked.txt");
    fs::write(&locked, "needle\n")?;
    fs::write(dir.path().join("open.txt"), "needle\n")?;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;

    // Root ignores permission bits; nothing to observe then
    if File::open(&locked).is_ok() {
        return Ok(());
    }

    let request = SearchRequest::new(dir.path(), "needle")?;
    let sink = CollectSink::new();
    let summary = Searcher::new(config(2))?.run(&request, &sink, &CancelToken::new())?;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644))?;

    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.matched_lines, 1);
    assert!(sink.events().last().unwrap().is_final());
    Ok(())
}

#[test]
fn test_slow_consumer_loses_no_events() -> Result<()> {
    let dir = tempdir()?;
    for i in 0..300 {
        fs::write(
            dir.path().join(format!("f{:03}.txt", i)),
            format!("needle {}\nplain\nNEEDLE again {}\n", i, i),
        )?;
    }

    let cfg = SearchConfig {
        queue_capacity: 1,
        event_capacity: 1,
        ..config(8)
    };
    let request = SearchRequest::new(dir.path(), "needle")?;
    let handle = Searcher::new(cfg)?.spawn(request, CancelToken::new())?;

    let mut events = Vec::new();
    for event in handle.events().iter() {
        std::thread::sleep(Duration::from_micros(50));
        events.push(event);
    }
    let summary = handle.join()?;

    assert!(!summary.cancelled);
    assert_eq!(match_set(&events).len(), 600);
    assert_eq!(summary.matched_lines, 600);
    assert_eq!(events.iter().filter(|e| e.is_final()).count(), 1);
    assert!(events.last().unwrap().is_final());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_linked_file_is_counted() -> Result<()> {
    use std::os::unix::fs::symlink;

    let dir = tempdir()?;
    fs::write(dir.path().join("real.txt"), "needle\n")?;
    symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))?;

    let request = SearchRequest::new(dir.path(), "needle")?;
    let sink = CollectSink::new();
    let summary = Searcher::new(config(2))?.run(&request, &sink, &CancelToken::new())?;

    assert_eq!(summary.files_total, 2);
    assert_eq!(summary.files_processed, 2);
    let root = dir.path().canonicalize()?;
    let paths: BTreeSet<PathBuf> = matches(&sink.events())
        .into_iter()
        .map(|m| m.file_path)
        .collect();
    assert_eq!(
        paths,
        BTreeSet::from([root.join("link.txt"), root.join("real.txt")])
    );
    Ok(())
}
