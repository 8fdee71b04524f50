//! Test: Variable Substitution - command templates and overrides

use crate::helpers::*;

#[tokio::test]
async fn test_variables_render_into_commands() {
    let yaml = r#"
name: "vars"
variables:
  python: "python3"
  channel: "lobelia4cosmetics"
steps:
  - name: "scrape"
    command: "{{ python }} src/scraping/telegram_scraper.py --channel {{ channel }}"
  - name: "load"
    command: "{{ python }} src/loading/load_to_raw.py"
"#;
    let graph = pipeline_from_yaml(yaml);
    let runner = MockRunner::new();

    let result = run_pipeline_with_mock(&graph, runner.clone()).await;

    assert_pipeline_succeeded(&result);
    assert_eq!(
        runner.invocations(),
        vec![
            "python3 src/scraping/telegram_scraper.py --channel lobelia4cosmetics",
            "python3 src/loading/load_to_raw.py",
        ]
    );
}

#[tokio::test]
async fn test_override_replaces_file_variable() {
    let yaml = r#"
name: "override"
variables:
  date: "2024-01-01"
steps:
  - name: "load"
    command: "load --date {{ date }}"
"#;
    let mut graph = pipeline_from_yaml(yaml);
    graph.set_variable("date", "2024-06-30");
    let runner = MockRunner::new();

    run_pipeline_with_mock(&graph, runner.clone()).await;

    assert_eq!(runner.invocations(), vec!["load --date 2024-06-30"]);
}
