//! Snapshot tests
//!
//! Resolves each *.yml file in /tests/fixtures/ individually and compares if the
//! resolved document changes.

#[test]
fn snapshots() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CONFRES_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new().unwrap();

    insta::glob!("fixtures/*.yml", |path| {
        let options = confres::Options::new()
            .with_merge_key("environment")
            .with_verbatim_key("help");

        let rendered = runtime
            .block_on(confres::resolve(path, options))
            .expect("fixture must resolve");

        insta::assert_json_snapshot!(rendered);
    });
}
