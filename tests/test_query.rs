use log_sea::Session;
use log_sea::annotate::{Align, ERROR_COLOR, ERROR_LABEL, correlate};
use log_sea::expr::ExprError;
use log_sea::query::{LogView, Query};
use log_sea::timeutil::TimeControlError;

const COMBINED: &str = "==> /tmp/client.log <==\n\
                        [10:00:00] [#2] ping\n\
                        [10:00:02] [#1] open: {file: 'a'}\n\
                        ==> /tmp/server.log <==\n\
                        [10:00:01] [#1] opened: {ok: true}\n\
                        ==> /tmp/notes.log <==\n\
                        [note] unrelated";

fn session() -> Session {
    let mut session = Session::default();
    session.ingest(COMBINED);
    session
}

fn query(filter: &str) -> Query {
    Query {
        filter: filter.to_string(),
        text: "log".to_string(),
        id: "id".to_string(),
        color: "title".to_string(),
        ..Query::default()
    }
}

fn gindexes(session: &Session, query: &Query) -> Vec<usize> {
    session.query(query).records.iter().map(|r| r.gindex).collect()
}

#[test]
fn test_blank_filter_orders_by_time_with_timeless_last() {
    let session = session();
    let outcome = session.query(&query(""));
    let order: Vec<usize> = outcome.records.iter().map(|r| r.gindex).collect();
    assert_eq!(order, vec![0, 2, 1, 3]);
    assert!(outcome.errors.is_empty());

    let times: Vec<_> = outcome.records.iter().filter_map(|r| r.time).collect();
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(outcome.records.last().unwrap().time.is_none());
}

#[test]
fn test_matching_filter_reports_no_error() {
    let session = session();
    let outcome = session.query(&query("log == 'client'"));
    assert_eq!(outcome.records.len(), 2);
    assert!(outcome.records.iter().all(|r| r.log == "client"));
    assert_eq!(outcome.errors.filter, None);
}

#[test]
fn test_failing_predicate_keeps_the_record_and_reports_first_error() {
    let session = session();
    let outcome = session.query(&query("payload.file == 'a'"));
    let order: Vec<usize> = outcome.records.iter().map(|r| r.gindex).collect();
    assert_eq!(order, vec![0, 1, 3]);
    let err = outcome.errors.filter.expect("filter error reported");
    assert!(err.to_string().contains("reading 'file'"), "{err}");

    assert_eq!(gindexes(&session, &query("payload?.file == 'a'")), vec![1]);
}

#[test]
fn test_compile_error_keeps_everything() {
    let session = session();
    let outcome = session.query(&query("title =="));
    assert_eq!(outcome.records.len(), 4);
    assert!(matches!(outcome.errors.filter, Some(ExprError::Syntax { .. })));
}

#[test]
fn test_same_query_twice_gives_same_view() {
    let session = session();
    let q = query("payload.file == 'a'");
    let first = session.query(&q);
    let second = session.query(&q);
    assert_eq!(first.records, second.records);
    assert_eq!(first.annotations, second.annotations);
    assert_eq!(first.errors, second.errors);
}

#[test]
fn test_hidden_logs_are_left_out() {
    let session = session();
    let mut q = query("");
    q.log_views.insert(
        "server".to_string(),
        LogView {
            visible: false,
            align: Align::Right,
        },
    );
    assert_eq!(gindexes(&session, &q), vec![0, 1, 3]);
}

#[test]
fn test_annotations_follow_log_alignment() {
    let session = session();
    let outcome = session.query(&query(""));
    let aligns: Vec<(String, Align)> = outcome
        .annotations
        .iter()
        .map(|a| (a.label.clone(), a.align))
        .collect();
    assert_eq!(
        aligns,
        vec![
            ("client".to_string(), Align::Left),
            ("server".to_string(), Align::Right),
            ("client".to_string(), Align::Left),
            ("notes".to_string(), Align::Left),
        ]
    );

    let mut q = query("");
    q.log_views.insert(
        "client".to_string(),
        LogView {
            visible: true,
            align: Align::Center,
        },
    );
    let outcome = session.query(&q);
    assert_eq!(outcome.annotations[0].align, Align::Center);
}

#[test]
fn test_annotation_errors_use_error_label_and_color() {
    let session = session();
    let mut q = query("");
    q.text = "payload.ok.toString()".to_string();
    q.id = "payload.ok ?? payload.file".to_string();
    q.color = "'#abc'".to_string();
    let outcome = session.query(&q);

    // ping has no payload, so both text and id fail for it.
    let ping = &outcome.annotations[0];
    assert_eq!(ping.label, ERROR_LABEL);
    assert_eq!(ping.color, ERROR_COLOR);
    assert!(ping.ids.is_empty());

    let opened = &outcome.annotations[1];
    assert_eq!(opened.label, "true");
    assert_eq!(opened.color, "#abc");
    assert_eq!(opened.ids, vec!["true".to_string()]);

    assert!(outcome.errors.text.is_some());
    assert!(outcome.errors.id.is_some());
    assert_eq!(outcome.errors.color, None);
    assert_eq!(outcome.errors.filter, None);
}

#[test]
fn test_hashed_colors_are_stable_hex() {
    let session = session();
    let outcome = session.query(&query(""));
    for annotation in &outcome.annotations {
        assert_eq!(annotation.color.len(), 7, "{}", annotation.color);
        assert!(annotation.color.starts_with('#'));
    }
    let again = session.query(&query(""));
    assert_eq!(outcome.annotations, again.annotations);
}

#[test]
fn test_shared_ids_are_correlated() {
    let session = session();
    let outcome = session.query(&query(""));
    let groups = correlate(&outcome.annotations);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups["#1"], vec![1, 2]);
}

#[test]
fn test_time_bounds_select_a_window() {
    let session = session();
    let mut q = query("");
    q.start = "10:00:01".to_string();
    q.end = "+1s".to_string();
    assert_eq!(gindexes(&session, &q), vec![2, 1]);

    q.start = "-1s".to_string();
    q.end = "10:00:01".to_string();
    assert_eq!(gindexes(&session, &q), vec![0, 2]);
}

#[test]
fn test_bound_errors_do_not_mask_each_other() {
    let session = session();
    let mut q = query("title ==");
    q.start = "soon".to_string();
    q.end = "+5 m".to_string();
    let outcome = session.query(&q);
    assert_eq!(outcome.errors.start, Some(TimeControlError::Unrecognized));
    assert_eq!(outcome.errors.end, Some(TimeControlError::NeedStart));
    assert!(outcome.errors.filter.is_some());
    assert_eq!(outcome.records.len(), 4);

    let slots: Vec<&str> = outcome.errors.messages().into_iter().map(|(slot, _)| slot).collect();
    assert_eq!(slots, vec!["filter", "start", "end"]);
}

#[test]
fn test_dictionary_covers_the_filtered_records() {
    let session = session();
    let outcome = session.query(&query("log == 'server'"));
    let payload = outcome.dictionary["payload"].nested.as_ref().unwrap();
    assert!(payload.contains_key("ok"));
    assert!(!payload.contains_key("file"));
}

#[test]
fn test_time_suggestions_cover_overall_and_each_log() {
    let session = session();
    let suggestions = session.time_suggestions();

    let start: Vec<&str> = suggestions.start.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(start, vec!["10:00:00", "10:00:00 - client", "10:00:01 - server"]);

    let end: Vec<&str> = suggestions.end.iter().map(|s| s.value.as_str()).collect();
    assert_eq!(end, vec!["10:00:02", "+5s", "+10 minutes", "10:00:02", "10:00:01"]);

    assert!(Session::default().time_suggestions().start.is_empty());
}
