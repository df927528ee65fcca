use super::utils;

#[test]
fn test_ranges() {
    let output = utils::run(&["ranges"]);
    assert!(output.success, "{output:?}");

    let lines: Vec<_> = output.stdout.lines().collect();
    assert_eq!(lines.len(), 14, "{lines:?}");
    assert_eq!(lines[0], "173.245.48.0/20");
    assert!(lines.contains(&"104.16.0.0/13"));
    assert!(lines.contains(&"131.0.72.0/22"));
}

#[test]
fn test_ranges_json() {
    let output = utils::run(&["ranges", "--json"]);
    assert!(output.success, "{output:?}");

    let ranges: Vec<String> = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(ranges.len(), 14);
    assert!(ranges.iter().any(|range| range == "172.64.0.0/13"));
}
