use anyhow::anyhow;
use byte_unit::{AdjustedByte, Byte, UnitType};
use crossterm::style::{StyledContent, Stylize};
use itertools::Itertools;
use std::io::Write;
use tabled::settings::object::{Columns, Object, Rows};
use tabled::{
    builder::Builder,
    settings::{Alignment, Color, Margin, Padding, Style, themes::Colorization},
};

use crate::{
    histogram::{LatencyHistogram, PERCENTAGES},
    report::{BenchReport, RunOutcome, RunResult, TotalResults},
};

/// Prints the report as styled plain text.
pub struct TextReporter;

impl super::BenchReporter for TextReporter {
    fn print(&self, w: &mut dyn Write, report: &BenchReport) -> anyhow::Result<()> {
        for run in &report.runs {
            print_run(w, run)?;
            writeln!(w)?;
        }
        print_totals(w, &report.totals)?;
        Ok(())
    }
}

fn render_ratio(ratio: f64) -> StyledContent<String> {
    let text = format!("{:.2}%", 100.0 * ratio);
    if ratio >= 1.0 {
        text.green().bold()
    } else if ratio >= 0.99 {
        text.yellow().bold()
    } else {
        text.red().bold()
    }
}

fn render_outcome(outcome: &RunOutcome) -> StyledContent<String> {
    match outcome {
        RunOutcome::Completed => "completed".to_string().green(),
        RunOutcome::ConnectFailed(reason) => format!("connect failed: {reason}").red(),
        RunOutcome::ConnectTimeout => "connect timed out".to_string().red(),
        RunOutcome::Aborted => "aborted".to_string().red(),
    }
}

#[rustfmt::skip]
fn print_run(w: &mut dyn Write, run: &RunResult) -> anyhow::Result<()> {
    let elapsed = run.run_time.as_secs_f64();

    writeln!(w, "{}", format!("Client {}", run.id).h1())?;
    writeln!(w,       "  Outcome:       {}", render_outcome(&run.outcome))?;
    writeln!(w,       "  Time:          {}", format!("{:.3}s", elapsed).green().bold())?;
    writeln!(w,       "  Success ratio: {} ({}/{})", render_ratio(run.ratio()), run.successes, run.total)?;
    writeln!(w,       "  Throughput:    {}", format!("{:.2} msg/s", run.msgs_per_sec).green().bold())?;
    writeln!(w,       "  Bandwidth:     {}", format!("{:.2}", adjusted(run.bytes)).green().bold())?;

    if run.successes > 0 {
        writeln!(w)?;
        print_latency(w, &[
            ("Min", run.latency.min),
            ("Max", run.latency.max),
            ("Mean", run.latency.mean),
            ("Stdev", run.latency.stdev),
        ], &run.hist)?;
    }
    Ok(())
}

#[rustfmt::skip]
fn print_totals(w: &mut dyn Write, totals: &TotalResults) -> anyhow::Result<()> {
    let elapsed = totals.total_run_time.as_secs_f64();
    let bandwidth = if elapsed > 0.0 { totals.bytes as f64 / elapsed } else { 0.0 };

    writeln!(w, "{}", format!("Total ({} clients)", totals.clients).h1())?;
    writeln!(w,       "  Time:          {}", format!("{:.3}s", elapsed).green().bold())?;
    writeln!(w,       "  Avg run time:  {}", format!("{:.3}s", totals.avg_run_time.as_secs_f64()).green())?;
    writeln!(w,       "  Success ratio: {} ({}/{})",
        render_ratio(totals.ratio), totals.successes, totals.successes + totals.failures)?;
    writeln!(w)?;

    let rates = vec![
        vec!["".into(), "Total".into(), "Per client".into()],
        vec![
            "Msgs".into(),
            format!("{:.2}/s", totals.total_msgs_per_sec),
            format!("{:.2}/s", totals.avg_msgs_per_sec),
        ],
        vec![
            "Bytes".into(),
            format!("{:.2}", adjusted(totals.bytes)),
            format!("{:.2}/s", adjusted_rate(bandwidth)?),
        ],
    ];
    let mut rates = Builder::from(rates).build();
    rates
        .with(Style::empty())
        .with(Alignment::center())
        .with(Padding::new(2, 2, 0, 0))
        .with(Colorization::exact([Color::BOLD], Rows::first()))
        .with(Colorization::exact([Color::FG_GREEN], Rows::new(1..).not(Columns::first())));
    writeln!(w, "{}", rates)?;

    if totals.successes > 0 {
        writeln!(w)?;
        print_latency(w, &[
            ("Min", totals.msg_time_min),
            ("Max", totals.msg_time_max),
            ("Mean avg", totals.msg_time_mean_avg),
            ("Mean stdev", totals.msg_time_mean_std),
        ], &totals.hist)?;
    }
    Ok(())
}

fn print_latency(w: &mut dyn Write, stats: &[(&str, f64)], hist: &LatencyHistogram) -> anyhow::Result<()> {
    writeln!(w, "{}", "  Latencies (ms)".h2())?;
    let header = stats.iter().map(|(name, _)| name.to_string()).collect_vec();
    let values = stats.iter().map(|(_, v)| format!("{v:.3}")).collect_vec();
    let mut table = Builder::from(vec![header, values]).build();
    table
        .with(Style::empty())
        .with(Margin::new(3, 0, 0, 0))
        .with(Alignment::center())
        .with(Colorization::exact([Color::FG_CYAN], Rows::first()))
        .with(Colorization::exact([Color::FG_GREEN], Rows::new(1..=1)));
    writeln!(w, "{}", table)?;

    if !hist.is_empty() {
        let percentiles = hist
            .percentiles_ms(PERCENTAGES)
            .map(|(p, v)| format!("p{p}: {}", format!("{v:.3}").green()))
            .join("  ");
        writeln!(w, "   {percentiles}")?;
    }
    Ok(())
}

fn adjusted(bytes: u64) -> AdjustedByte {
    Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary)
}

fn adjusted_rate(bytes: f64) -> anyhow::Result<AdjustedByte> {
    Byte::from_f64(bytes)
        .ok_or(anyhow!("size too large"))
        .map(|b| b.get_appropriate_unit(UnitType::Binary))
}

trait ReportStyle {
    fn h1(&self) -> StyledContent<&str>;
    fn h2(&self) -> StyledContent<&str>;
}

impl<T: AsRef<str>> ReportStyle for T {
    fn h1(&self) -> StyledContent<&str> {
        self.as_ref().bold().underlined().yellow()
    }

    fn h2(&self) -> StyledContent<&str> {
        self.as_ref().bold().cyan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{broker::SimBroker, client::Client, config::ClientConfig, reporter::BenchReporter};
    use std::time::Duration;

    #[test]
    fn test_adjusted_units() {
        assert_eq!(format!("{:.2}", adjusted(2048)), "2.00 KiB");
        assert_eq!(format!("{:.2}", adjusted_rate(1536.0).unwrap()), "1.50 KiB");
        assert!(adjusted_rate(-1.0).is_err());
    }

    #[tokio::test]
    async fn test_text_report_mentions_every_client() {
        let mut runs = Vec::new();
        for id in 0..2 {
            let cfg = ClientConfig::new(id, "sim://", "/t").with_count(3).with_quiet(true);
            runs.push(Client::new(cfg, SimBroker::new()).run().await);
        }
        let cfg = ClientConfig::new(2, "sim://", "/t").with_count(3).with_quiet(true);
        runs.push(Client::new(cfg, SimBroker::new().refuse_connect("denied")).run().await);

        let report = BenchReport::new(runs, Duration::from_millis(5)).unwrap();
        let mut buf = Vec::new();
        TextReporter.print(&mut buf, &report).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Client 0"));
        assert!(text.contains("Client 1"));
        assert!(text.contains("connect failed: denied"));
        assert!(text.contains("Total (3 clients)"));
        assert!(text.contains("(6/6)"));
        assert!(text.contains("p99"));
    }
}
