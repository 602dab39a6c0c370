use log_sea::dictionary::{ELEMENT, build_dictionary, flatten};
use log_sea::parser::{Record, parse_log};
use std::collections::BTreeMap;

fn sample() -> Vec<Record> {
    parse_log("client", "[1] a: {x: 1, items: [{n: 'a'}]}\n[2] b")
}

fn hints(records: &[Record]) -> BTreeMap<String, String> {
    flatten(&build_dictionary(records)).into_iter().collect()
}

#[test]
fn test_empty_collection_gives_empty_dictionary() {
    assert!(build_dictionary::<Record>(&[]).is_empty());
}

#[test]
fn test_partially_present_members_are_marked_undefined() {
    let hints = hints(&sample());
    assert_eq!(hints["payload.x"], "number | undefined");
    assert_eq!(hints["payload.items"], "undefined | array");
    assert_eq!(hints["payload.items[].n"], "string");
}

#[test]
fn test_top_level_members_carry_notes() {
    let hints = hints(&sample());
    assert!(hints["payload"].starts_with("null | object  -- "));
    assert!(hints["title"].starts_with("string  -- "));
    assert!(hints["time"].starts_with("null  -- "));
    assert!(hints["log"].contains("which logfile"));
}

#[test]
fn test_tags_describe_positional_elements() {
    let dictionary = build_dictionary(&sample());
    let tags = dictionary["tags"].nested.as_ref().unwrap();
    let positional = tags["positional"].nested.as_ref().unwrap();
    assert_eq!(positional[ELEMENT].hint, "string");
    assert!(!tags.contains_key("kind"));
}

#[test]
fn test_empty_strings_and_empty_arrays_have_their_own_hints() {
    let records = parse_log("client", "[1] a: {s: '', list: []}");
    let hints = hints(&records);
    assert_eq!(hints["payload.s"], "empty_string");
    assert_eq!(hints["payload.list"], "array");
}

#[test]
fn test_building_twice_is_identical() {
    let records = sample();
    let first = serde_json::to_string(&build_dictionary(&records)).unwrap();
    let second = serde_json::to_string(&build_dictionary(&records)).unwrap();
    assert_eq!(first, second);
}
