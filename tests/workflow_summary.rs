// tests/workflow_summary.rs
//
// Aggregation properties: grouping, ordering, start_url and summary rendering.

use autopattern::workflow::{
    group_workflows, normalize_value, select_workflow, Workflow, WorkflowError, WorkflowEvent,
};
use rand::seq::SliceRandom;
use serde_json::json;

#[test]
fn end_to_end_summary_and_start_url() {
    let events = [
        json!({"event": "navigation", "url": "https://x.com", "timestamp": 1}),
        json!({"event": "click", "timestamp": 2, "data": {"element_type": "button", "text": "Submit"}}),
    ];
    let wf = Workflow::new("w1", events.iter().map(normalize_value).collect());
    assert_eq!(wf.start_url(), "https://x.com");
    assert_eq!(
        wf.summary(),
        "1. Navigated to https://x.com\n2. Clicked on button with text 'Submit'"
    );
}

#[test]
fn start_url_skips_events_without_url() {
    let wf = Workflow::new(
        "w",
        vec![
            WorkflowEvent::new("focus", 1),
            WorkflowEvent::new("click", 2),
            WorkflowEvent::new("page_visit", 3).with_url("https://second.example"),
            WorkflowEvent::new("navigation", 4).with_url("https://third.example"),
        ],
    );
    assert_eq!(wf.start_url(), "https://second.example");
    assert_eq!(Workflow::new("empty", vec![]).start_url(), "");
}

#[test]
fn ordering_is_independent_of_input_order_and_stable_on_ties() {
    let base: Vec<WorkflowEvent> = (0..30)
        .map(|i| {
            // timestamps repeat in pairs so ties exist
            WorkflowEvent::new("click", i / 2).with_data("seq", i)
        })
        .collect();
    let expected = Workflow::new("w", base.clone());

    let mut rng = rand::rng();
    for _ in 0..10 {
        let mut shuffled = base.clone();
        shuffled.shuffle(&mut rng);
        let wf = Workflow::new("w", shuffled.clone());
        let ts: Vec<i64> = wf.events().iter().map(|e| e.timestamp).collect();
        let mut sorted = ts.clone();
        sorted.sort();
        assert_eq!(ts, sorted, "events must be ascending by timestamp");

        // ties keep their relative input order
        for pair in wf.events().windows(2) {
            if pair[0].timestamp == pair[1].timestamp {
                let pos = |e: &WorkflowEvent| shuffled.iter().position(|s| s == e).unwrap();
                assert!(pos(&pair[0]) < pos(&pair[1]));
            }
        }
        // re-aggregating already ordered events is a no-op
        assert_eq!(Workflow::new("w", wf.events().to_vec()), wf);
    }
    assert_eq!(expected.events().len(), 30);
}

#[test]
fn summary_caps_at_twenty_significant_actions() {
    let mut events = Vec::new();
    for i in 0..25 {
        events.push(WorkflowEvent::new("click", i * 10).with_data("text", format!("b{i}")));
        // noise between actions
        events.push(WorkflowEvent::new("scroll", i * 10 + 1));
        events.push(WorkflowEvent::new("focus", i * 10 + 2));
    }
    let wf = Workflow::new("w", events);
    let summary = wf.summary();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 20);
    assert_eq!(lines[0], "1. Clicked on element with text 'b0'");
    assert_eq!(lines[19], "20. Clicked on element with text 'b19'");
    assert!(!summary.contains("Scrolled"));
}

#[test]
fn grouping_keeps_first_appearance_order() {
    let rows = vec![
        ("2".to_string(), WorkflowEvent::new("click", 5)),
        ("1".to_string(), WorkflowEvent::new("click", 9)),
        ("2".to_string(), WorkflowEvent::new("navigation", 1).with_url("https://a")),
        ("10".to_string(), WorkflowEvent::new("input", 3)),
    ];
    let wfs = group_workflows(rows);
    let ids: Vec<&str> = wfs.iter().map(|w| w.workflow_id()).collect();
    assert_eq!(ids, vec!["2", "1", "10"]);
    assert_eq!(wfs[0].events()[0].event_type, "navigation");
    assert_eq!(wfs[0].start_url(), "https://a");
}

#[test]
fn selecting_by_id_or_first() {
    let wfs = || {
        group_workflows(vec![
            ("b".to_string(), WorkflowEvent::new("click", 1)),
            ("a".to_string(), WorkflowEvent::new("click", 1)),
        ])
    };
    assert_eq!(select_workflow(wfs(), None).unwrap().workflow_id(), "b");
    assert_eq!(select_workflow(wfs(), Some("a")).unwrap().workflow_id(), "a");
    assert!(matches!(
        select_workflow(wfs(), Some("zzz")),
        Err(WorkflowError::NotFound(id)) if id == "zzz"
    ));
    assert!(matches!(
        select_workflow(vec![], None),
        Err(WorkflowError::NoWorkflows)
    ));
}
