use std::io::Write;

use edgescan::{
    descriptor::ConnectionDescriptor,
    error::{ErrorContext as _, OpaqueError},
    rank::LatencyCategory,
    scan::{ScanReport, TrialRecord},
};

/// Number of runner-ups listed below the winner.
const RUNNER_UPS: usize = 4;

/// Progress printer, printing one line per completed trial to stdout unless `quiet`.
pub fn progress(quiet: bool) -> impl FnMut(&TrialRecord) {
    move |record: &TrialRecord| {
        if quiet {
            return;
        }
        if let Err(err) = write_trial(&mut std::io::stdout().lock(), record) {
            tracing::debug!("write trial progress: {err}");
        }
    }
}

fn write_trial(w: &mut impl Write, record: &TrialRecord) -> std::io::Result<()> {
    let address = record.result.address();
    match record.result.latency() {
        Some(latency) => {
            let category = LatencyCategory::classify(latency);
            writeln!(
                w,
                "✅ {address} | {}ms | {} {category}",
                latency.as_millis(),
                category.emoji(),
            )
        }
        None => writeln!(w, "❌ {address} | unreachable"),
    }
}

/// Print the outcome of a scan to stdout, see [`write_report`].
pub fn print_report(
    report: &ScanReport,
    descriptor: Option<&ConnectionDescriptor>,
    json: bool,
) -> Result<(), OpaqueError> {
    write_report(&mut std::io::stdout().lock(), report, descriptor, json)
        .context("write scan report to stdout")
}

/// Write the outcome of a scan, human readable or as json.
///
/// Without a winner only the explicit no-candidate outcome is written,
/// never a rewritten descriptor.
pub fn write_report(
    w: &mut impl Write,
    report: &ScanReport,
    descriptor: Option<&ConnectionDescriptor>,
    json: bool,
) -> Result<(), OpaqueError> {
    let rewritten = report
        .winner()
        .zip(descriptor)
        .map(|(winner, descriptor)| descriptor.rewrite(winner.address));

    if json {
        let mut output = serde_json::to_value(report).context("serialize scan report")?;
        output["descriptor"] = rewritten.into();
        let output = serde_json::to_string_pretty(&output).context("format scan report")?;
        writeln!(w, "{output}").context("write scan report")?;
        return Ok(());
    }

    write_summary(w, report, rewritten.as_deref()).context("write scan report")
}

fn write_summary(
    w: &mut impl Write,
    report: &ScanReport,
    rewritten: Option<&str>,
) -> std::io::Result<()> {
    writeln!(w)?;
    if report.is_cancelled() {
        writeln!(w, "⚠️  scan cancelled, results are partial")?;
    }

    let Some(winner) = report.winner() else {
        return writeln!(
            w,
            "🚫 no usable candidate found ({}/{} reachable)",
            report.succeeded(),
            report.attempted(),
        );
    };

    writeln!(
        w,
        "🏆 best entry point: {} | {}ms | {} {}",
        winner.address,
        winner.latency.as_millis(),
        winner.category.emoji(),
        winner.category,
    )?;
    for result in report.ranking().ranked().iter().skip(1).take(RUNNER_UPS) {
        writeln!(
            w,
            "   {} | {}ms | {} {}",
            result.address,
            result.latency.as_millis(),
            result.category.emoji(),
            result.category,
        )?;
    }

    let mean = report
        .mean_latency()
        .map(|latency| latency.as_millis())
        .unwrap_or_default();
    writeln!(
        w,
        "📊 {}/{} reachable, mean latency {mean}ms",
        report.succeeded(),
        report.attempted(),
    )?;

    if let Some(rewritten) = rewritten {
        writeln!(w)?;
        writeln!(w, "🔗 rewritten descriptor:")?;
        writeln!(w, "{rewritten}")?;
    }

    Ok(())
}
