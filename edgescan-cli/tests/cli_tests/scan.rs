use super::utils;

#[test]
fn test_scan_malformed_descriptor() {
    for descriptor in [
        "https://old.example.com",
        "vless://old.example.com:443?sni=real.host.net",
        "vless://uuid@",
    ] {
        let output = utils::run(&["scan", descriptor]);
        assert!(!output.success, "{output:?}");
        assert_eq!(output.code, Some(1));
        assert!(output.stderr.contains("🚩 exit with error"), "{output:?}");
        assert!(output.stderr.contains("invalid descriptor"), "{output:?}");
        // aborted before probing a single candidate
        assert!(!output.stdout.contains("✅"));
        assert!(!output.stdout.contains("❌"));
    }
}

#[test]
fn test_scan_rejects_inverted_timeouts() {
    let output = utils::run(&[
        "scan",
        "vless://uuid@old.example.com:443?sni=real.host.net&path=%2Fws",
        "--connect-timeout",
        "5000",
        "--timeout",
        "5000",
    ]);
    assert_eq!(output.code, Some(1), "{output:?}");
    assert!(output.stderr.contains("connect timeout"), "{output:?}");
    assert!(!output.stdout.contains("❌"));
}
