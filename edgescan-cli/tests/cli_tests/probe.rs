use super::utils;

#[test]
fn test_probe_unreachable_address() {
    let port = utils::closed_port().to_string();
    let output = utils::run(&[
        "probe",
        "127.0.0.1",
        "--sni",
        "real.host.net",
        "--port",
        &port,
        "--insecure",
        "--connect-timeout",
        "500",
        "--timeout",
        "1000",
    ]);

    // no usable candidate is an outcome, not an error
    assert!(output.success, "{output:?}");
    assert!(output.stdout.contains("❌ 127.0.0.1 | unreachable"), "{output:?}");
    assert!(output.stdout.contains("no usable candidate found (0/1 reachable)"), "{output:?}");
    assert!(!output.stdout.contains("rewritten descriptor"));
}

#[test]
fn test_probe_unreachable_address_json() {
    let port = utils::closed_port().to_string();
    let output = utils::run(&[
        "probe",
        "127.0.0.1",
        "127.0.0.2",
        "--sni",
        "real.host.net",
        "--port",
        &port,
        "--json",
    ]);
    assert!(output.success, "{output:?}");

    let report: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(report["attempted"], 2);
    assert_eq!(report["succeeded"], 0);
    assert_eq!(report["cancelled"], false);
    assert!(report["winner"].is_null());
    assert!(report["descriptor"].is_null());
    assert!(report["trials"][0]["range"].is_null());
}

#[test]
fn test_probe_invalid_address() {
    let output = utils::run(&["probe", "not-an-ip", "--sni", "real.host.net"]);
    assert!(!output.success, "{output:?}");
}
