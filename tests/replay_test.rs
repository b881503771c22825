mod common;

use common::*;
use overhead::commands::handle_run;
use overhead::config::{ObserverSettings, Settings};
use overhead::sbs::{FeedSource, SbsFeed};
use std::io::Write;
use std::path::Path;

/// Settings for a run observed from the scripted observer, speaking through
/// `sh` into `spoken`, one utterance per line
fn run_settings(spoken: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.observer = ObserverSettings {
        latitude: Some(37.0),
        longitude: Some(-122.0),
        altitude: Some(0.0),
    };
    settings.speech.command = "sh".to_string();
    settings.speech.args = vec![
        "-c".to_string(),
        format!("printf '%s\\n' \"$0\" >> '{}'", spoken.display()),
    ];
    settings
}

fn spoken_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_replay_speaks_each_announcement_once() {
    let dir = tempfile::tempdir().unwrap();
    let spoken = dir.path().join("spoken.txt");
    let feed_path = dir.path().join("feed.sbs");
    let raw_path = dir.path().join("raw.sbs");

    let mut script = overflight_script("7700");
    script.insert(3, "garbage that is not SBS".to_string());
    script.insert(4, String::new());
    {
        let mut file = std::fs::File::create(&feed_path).unwrap();
        for line in &script {
            writeln!(file, "{}\r", line).unwrap();
        }
    }

    let mut settings = run_settings(&spoken);
    settings.feed.replay = Some(feed_path);
    settings.feed.message_clock = true;
    settings.log.raw = Some(raw_path.clone());

    handle_run(settings).await.unwrap();

    let utterances = spoken_lines(&spoken);
    assert_eq!(utterances.len(), 2, "{utterances:?}");
    assert!(utterances[0].starts_with("ATTENTION"));
    assert!(utterances[1].starts_with("Southwest flight one two tree in sight"));

    let raw = std::fs::read_to_string(&raw_path).unwrap();
    assert_eq!(raw, format!("{}\n", script.join("\n")));
}

#[tokio::test]
async fn test_raw_log_appends_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let spoken = dir.path().join("spoken.txt");
    let feed_path = dir.path().join("feed.sbs");
    let raw_path = dir.path().join("raw.sbs");
    std::fs::write(&feed_path, format!("{}\n", position_line(ICAO, 36.5, 5000))).unwrap();

    for _ in 0..2 {
        let mut settings = run_settings(&spoken);
        settings.feed.replay = Some(feed_path.clone());
        settings.log.raw = Some(raw_path.clone());
        handle_run(settings).await.unwrap();
    }

    let raw = std::fs::read_to_string(&raw_path).unwrap();
    assert_eq!(raw.lines().count(), 2);
    assert!(spoken_lines(&spoken).is_empty());
}

#[tokio::test]
async fn test_failing_feed_command_fails_the_run_after_speaking() {
    let dir = tempfile::tempdir().unwrap();
    let spoken = dir.path().join("spoken.txt");
    let feed_path = dir.path().join("feed.sbs");
    std::fs::write(&feed_path, format!("{}\n", overflight_script("1200").join("\n"))).unwrap();

    let mut settings = run_settings(&spoken);
    settings.feed.command = Some("sh".to_string());
    settings.feed.args = vec![
        "-c".to_string(),
        format!("cat '{}'; exit 3", feed_path.display()),
    ];

    let result = handle_run(settings).await;
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("exit"), "got {message}");

    // Speech queued before the feed failed is still spoken
    let utterances = spoken_lines(&spoken);
    assert_eq!(utterances.len(), 1);
    assert!(utterances[0].starts_with("Southwest flight"));
}

#[tokio::test]
async fn test_line_split_by_a_slow_feed_is_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let spoken = dir.path().join("spoken.txt");
    let raw_path = dir.path().join("raw.sbs");

    // Directly overhead, written in two halves with a pause longer than
    // several ticks of the run loop
    let line = position_line(ICAO, 37.0, 5000);
    let (head, tail) = line.split_at(30);

    let mut settings = run_settings(&spoken);
    settings.trigger.tick_ms = 20;
    settings.feed.command = Some("sh".to_string());
    settings.feed.args = vec![
        "-c".to_string(),
        "printf '%s' \"$0\"; sleep 0.4; printf '%s\\n' \"$1\"".to_string(),
        head.to_string(),
        tail.to_string(),
    ];
    settings.log.raw = Some(raw_path.clone());

    handle_run(settings).await.unwrap();

    assert_eq!(std::fs::read_to_string(&raw_path).unwrap(), format!("{line}\n"));
    let utterances = spoken_lines(&spoken);
    assert_eq!(utterances.len(), 1);
    assert!(utterances[0].starts_with("aircraft alfa one bravo two charlie tree"));
}

#[tokio::test]
async fn test_replay_with_unreadable_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = SbsFeed::open(FeedSource::File(dir.path().join("missing.sbs"))).await;
    let message = format!("{:#}", result.err().unwrap());
    assert!(message.contains("missing.sbs"), "got {message}");
}
