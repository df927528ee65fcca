#![allow(dead_code)]

use std::process::Output;

#[derive(Debug)]
/// Output of a finished edgescan process.
pub(crate) struct EdgescanOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for EdgescanOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8(output.stdout).unwrap(),
            stderr: String::from_utf8(output.stderr).unwrap(),
        }
    }
}

/// Run any edgescan cmd and wait for it to finish.
pub(crate) fn run(args: &[&str]) -> EdgescanOutput {
    escargot::CargoBuild::new()
        .package("edgescan-cli")
        .bin("edgescan")
        .run()
        .unwrap()
        .command()
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .unwrap()
        .into()
}

/// A local port on which nothing listens.
pub(crate) fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
