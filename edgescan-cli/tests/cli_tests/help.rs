use super::utils;

#[test]
fn test_help() {
    let output = utils::run(&["help"]);
    assert!(output.success, "{output:?}");
    assert!(
        output
            .stdout
            .contains("edgescan cli to find the fastest anycast edge entry point")
    );
    assert!(output.stdout.contains("Usage:"));
    assert!(output.stdout.contains("Commands:"));
    assert!(output.stdout.contains("scan"));
    assert!(output.stdout.contains("probe"));
    assert!(output.stdout.contains("ranges"));
}

#[test]
fn test_help_scan() {
    let output = utils::run(&["help", "scan"]);
    assert!(output.success, "{output:?}");
    assert!(output.stdout.contains("rewrite a vless descriptor"));
    assert!(output.stdout.contains("[DESCRIPTOR]"));
    assert!(output.stdout.contains("--trials"));
    assert!(output.stdout.contains("--concurrency <N>"));
    assert!(output.stdout.contains("--h2"));
    assert!(!output.stdout.contains("--no-h2"));
    assert!(output.stdout.contains("--connect-timeout"));
    assert!(output.stdout.contains("--insecure"));
    assert!(output.stdout.contains("--seed"));
}

#[test]
fn test_help_probe() {
    let output = utils::run(&["help", "probe"]);
    assert!(output.success, "{output:?}");
    assert!(output.stdout.contains("<ADDRESSES>..."));
    assert!(output.stdout.contains("--sni"));
    assert!(output.stdout.contains("--path"));
}
