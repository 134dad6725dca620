//! Analyzer output streaming end to end: split writes, resync, replace,
//! edits between batches, and large documents.

use blocwatch_watch::DiagnosticSeverity;

use crate::common::{Fixture, STAY_ALIVE, eventually, issue_json, published_path, within};

const MAIN: &str = "void main() {\n  var x = 1;\n}\n";

#[tokio::test]
async fn test_document_split_across_writes_is_published() {
    let fx = Fixture::new();
    fx.write("lib/a.dart", MAIN);

    let doc = format!(
        r#"{{"lib/a.dart":[{}]}}"#,
        issue_json("lib/a.dart", 10, 4, "unused variable", 1)
    );
    let (head, tail) = doc.split_at(doc.len() / 2);
    let script = format!(
        "[ \"$2\" = \"--watch\" ] || exit 9\nprintf '%s' '{head}'\nsleep 0.2\nprintf '%s\\n' '{tail}'\n{STAY_ALIVE}"
    );
    let session = fx.start(&fx.analyzer(&script)).await.unwrap();

    within(session.wait_ready()).await.unwrap();
    let path = published_path(&session, "lib/a.dart");
    assert!(eventually(|| fx.store.get(&path).is_some()).await);

    let items = fx.store.get(&path).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].message(), "unused variable");
    assert_eq!(items[0].severity(), DiagnosticSeverity::Warning);
    assert_eq!(items[0].source(), "fake analyzer");
    let range = items[0].range();
    assert_eq!((range.start.line, range.start.character), (0, 10));
    assert_eq!((range.end.line, range.end.character), (1, 0));

    session.shutdown().await;
}

#[tokio::test]
async fn test_later_batch_replaces_file_diagnostics() {
    let fx = Fixture::new();
    fx.write("lib/a.dart", MAIN);

    let first = format!(
        r#"{{"lib/a.dart":[{},{}]}}"#,
        issue_json("lib/a.dart", 0, 4, "one", 0),
        issue_json("lib/a.dart", 5, 4, "two", 0)
    );
    let second = format!(
        r#"{{"lib/a.dart":[{}]}}"#,
        issue_json("lib/a.dart", 16, 3, "three", 3)
    );
    let script = format!(
        "printf '%s\\n' '{first}'\nsleep 0.3\nprintf '%s\\n' '{second}'\n{STAY_ALIVE}"
    );
    let session = fx.start(&fx.analyzer(&script)).await.unwrap();
    let path = published_path(&session, "lib/a.dart");

    assert!(
        eventually(|| fx
            .store
            .get(&path)
            .is_some_and(|items| items.len() == 1 && items[0].message() == "three"))
        .await
    );
    let items = fx.store.get(&path).unwrap();
    assert_eq!(items[0].severity(), DiagnosticSeverity::Hint);
    assert_eq!(items[0].range().start.line, 1);

    session.shutdown().await;
}

#[tokio::test]
async fn test_malformed_line_is_skipped() {
    let fx = Fixture::new();
    fx.write("b.dart", "final b = 2;\n");

    let good = format!(r#"{{"b.dart":[{}]}}"#, issue_json("b.dart", 6, 1, "name", 2));
    let script = format!(
        "printf '%s\\n' 'this is not json'\nprintf '%s\\n' '{{\"shape\": 1}}'\nprintf '%s\\n' '{good}'\n{STAY_ALIVE}"
    );
    let session = fx.start(&fx.analyzer(&script)).await.unwrap();
    let path = published_path(&session, "b.dart");

    assert!(eventually(|| fx.store.get(&path).is_some()).await);
    let items = fx.store.get(&path).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].message(), "name");
    assert_eq!(items[0].severity(), DiagnosticSeverity::Information);
    assert!(session.state().first_output_received());

    session.shutdown().await;
}

#[tokio::test]
async fn test_coalesced_documents_and_unknown_file() {
    let fx = Fixture::new();
    fx.write("c.dart", "c");
    fx.write("d.dart", "dd");

    let one = format!(r#"{{"c.dart":[{}]}}"#, issue_json("c.dart", 0, 1, "c1", 1));
    let two = format!(
        r#"{{"d.dart":[{}],"gone.dart":[{}]}}"#,
        issue_json("d.dart", 1, 1, "d1", 1),
        issue_json("gone.dart", 0, 1, "stale", 1)
    );
    let script = format!("printf '%s%s\\n' '{one}' '{two}'\n{STAY_ALIVE}");
    let session = fx.start(&fx.analyzer(&script)).await.unwrap();

    let d = published_path(&session, "d.dart");
    assert!(eventually(|| fx.store.get(&d).is_some()).await);
    assert_eq!(
        fx.store.get(&published_path(&session, "c.dart")).unwrap()[0].message(),
        "c1"
    );
    assert!(fx.store.get(&published_path(&session, "gone.dart")).is_none());

    session.shutdown().await;
}

#[tokio::test]
async fn test_configured_env_reaches_analyzer() {
    let fx = Fixture::new();
    fx.write("e.dart", "eeee");

    let mut config = fx.analyzer(&format!(
        "printf '{{\"%s\":[{}]}}\\n' \"$TARGET\"\n{STAY_ALIVE}",
        issue_json("e.dart", 0, 2, "from env", 1)
    ));
    config.env.insert("TARGET".to_string(), "e.dart".to_string());
    let session = fx.start(&config).await.unwrap();

    let path = published_path(&session, "e.dart");
    assert!(eventually(|| fx.store.get(&path).is_some()).await);
    assert_eq!(fx.store.get(&path).unwrap()[0].message(), "from env");

    session.shutdown().await;
}

#[tokio::test]
async fn test_file_edited_between_batches_maps_against_new_text() {
    let fx = Fixture::new();
    fx.write("f.dart", "abc");

    let first = format!(r#"{{"f.dart":[{}]}}"#, issue_json("f.dart", 0, 1, "first", 1));
    let second = format!(r#"{{"f.dart":[{}]}}"#, issue_json("f.dart", 4, 1, "second", 1));
    let script = format!(
        "printf '%s\\n' '{first}'\nwhile [ ! -f \"$1/go.flag\" ]; do sleep 0.05; done\nprintf '%s\\n' '{second}'\n{STAY_ALIVE}"
    );
    let session = fx.start(&fx.analyzer(&script)).await.unwrap();
    let path = published_path(&session, "f.dart");

    assert!(eventually(|| fx.store.get(&path).is_some()).await);
    let range = fx.store.get(&path).unwrap()[0].range();
    assert_eq!((range.start.line, range.start.character), (0, 0));
    assert_eq!((range.end.line, range.end.character), (0, 1));

    fx.write("f.dart", "abc\nxyz");
    fx.write("go.flag", "");

    assert!(
        eventually(|| fx
            .store
            .get(&path)
            .is_some_and(|items| items[0].message() == "second"))
        .await
    );
    let range = fx.store.get(&path).unwrap()[0].range();
    assert_eq!((range.start.line, range.start.character), (1, 0));
    assert_eq!((range.end.line, range.end.character), (1, 1));

    session.shutdown().await;
}

#[tokio::test]
async fn test_multi_megabyte_document_is_published() {
    const ISSUES: usize = 30_000;

    let fx = Fixture::new();
    fx.write("g.dart", "ab\ncd\n");
    fx.write("h.dart", "h");

    let issues: Vec<String> = (0..ISSUES)
        .map(|i| issue_json("g.dart", i % 6, 1, &format!("issue {i}"), 1))
        .collect();
    let doc = format!(
        r#"{{"g.dart":[{}],"h.dart":[{}]}}"#,
        issues.join(","),
        issue_json("h.dart", 0, 1, "tail", 2)
    );
    assert!(doc.len() > 2 * 1024 * 1024);
    fx.write("big.json", &format!("{doc}\n"));

    let script = format!("cat \"$1/big.json\"\n{STAY_ALIVE}");
    let session = fx.start(&fx.analyzer(&script)).await.unwrap();
    within(session.wait_ready()).await.unwrap();

    let g = published_path(&session, "g.dart");
    let h = published_path(&session, "h.dart");
    assert!(eventually(|| fx.store.get(&h).is_some()).await);
    assert_eq!(fx.store.get(&h).unwrap()[0].message(), "tail");

    let items = fx.store.get(&g).unwrap();
    assert_eq!(items.len(), ISSUES);
    assert_eq!(items[ISSUES - 1].message(), format!("issue {}", ISSUES - 1));
    // Offset 3 is the start of the second line.
    assert_eq!(items[3].range().start.line, 1);
    assert_eq!(items[3].range().start.character, 0);
    assert!(fx.notifier.errors().is_empty());

    session.shutdown().await;
}
