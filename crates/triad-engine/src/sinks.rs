//! Stdout and CSV tick sinks.

use std::borrow::Cow;
use std::io::Write;

use triad_core::config::StdoutFormat;
use triad_core::runner::{SinkError, TickSink};
use triad_types::TickEvent;

/// Text longer than this is elided in the middle for display.
const DISPLAY_LIMIT: usize = 60;

/// Characters kept at each end of elided text.
const DISPLAY_EDGE: usize = 30;

/// CSV header row.
pub const CSV_HEADER: &str = "tick,step,rho,upsilon,beta,koppa,psi_precursor_diff";

/// Shorten `text` to `<first 30>...(<n> digits)...<last 30>` when it is
/// longer than 60 characters, where `n` is the number of elided characters.
pub fn truncate_for_display(text: &str) -> Cow<'_, str> {
    let len = text.chars().count();
    if len <= DISPLAY_LIMIT {
        return Cow::Borrowed(text);
    }
    let head: String = text.chars().take(DISPLAY_EDGE).collect();
    let tail: String = text.chars().skip(len.saturating_sub(DISPLAY_EDGE)).collect();
    let elided = len.saturating_sub(DISPLAY_LIMIT);
    Cow::Owned(format!("{head}...({elided} digits)...{tail}"))
}

/// Writes snapshots to a stream as text or JSON lines.
#[derive(Debug)]
pub struct ConsoleSink<W> {
    out: W,
    format: StdoutFormat,
}

impl<W: Write> ConsoleSink<W> {
    /// Create a sink writing `format` lines to `out`.
    pub const fn new(out: W, format: StdoutFormat) -> Self {
        Self { out, format }
    }

    /// Consume the sink and return the stream.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TickSink for ConsoleSink<W> {
    fn on_event(&mut self, tick: u64, event: &TickEvent) -> Result<(), SinkError> {
        match self.format {
            StdoutFormat::Text => writeln!(
                self.out,
                "[T={tick}] U={} B={} K={}",
                truncate_for_display(&event.upsilon.to_string()),
                truncate_for_display(&event.beta.to_string()),
                truncate_for_display(&event.koppa.to_string()),
            )?,
            StdoutFormat::Json => {
                serde_json::to_writer(&mut self.out, event)?;
                self.out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Writes one CSV row per snapshot, header first.
#[derive(Debug)]
pub struct CsvSink<W> {
    out: W,
    header_written: bool,
}

impl<W: Write> CsvSink<W> {
    /// Create a sink writing to `out`. The header is written with the first row.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    /// Consume the sink and return the stream.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn ensure_header(&mut self) -> Result<(), SinkError> {
        if !self.header_written {
            writeln!(self.out, "{CSV_HEADER}")?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write> TickSink for CsvSink<W> {
    fn on_event(&mut self, tick: u64, event: &TickEvent) -> Result<(), SinkError> {
        self.ensure_header()?;
        writeln!(
            self.out,
            "{tick},{},{},{},{},{},{}",
            event.step,
            event.rho.code(),
            event.upsilon,
            event.beta,
            event.koppa,
            event.psi_precursor,
        )?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        // An empty run still produces a header-only file.
        self.ensure_header()?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use triad_types::{BigInt, RationalValue, Rho};

    use super::*;

    fn event() -> TickEvent {
        TickEvent {
            step: 2,
            microtick: 11,
            rho: Rho::Num,
            upsilon: RationalValue::new(22, 7).unwrap(),
            beta: RationalValue::new(-3, 5).unwrap(),
            koppa: RationalValue::one(),
            transformed: true,
            psi_precursor: BigInt::from(-414),
        }
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_for_display("19/7"), "19/7");
        let sixty = "9".repeat(60);
        assert_eq!(truncate_for_display(&sixty), sixty.as_str());
    }

    #[test]
    fn long_text_is_elided_in_the_middle() {
        let text = format!("{}{}{}", "1".repeat(30), "5".repeat(40), "2".repeat(30));
        let shown = truncate_for_display(&text);
        assert_eq!(
            shown,
            format!("{}...(40 digits)...{}", "1".repeat(30), "2".repeat(30))
        );
    }

    #[test]
    fn text_lines() {
        let mut sink = ConsoleSink::new(Vec::new(), StdoutFormat::Text);
        sink.on_event(3, &event()).unwrap();
        sink.finish().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "[T=3] U=22/7 B=-3/5 K=1/1\n");
    }

    #[test]
    fn json_lines_round_trip() {
        let mut sink = ConsoleSink::new(Vec::new(), StdoutFormat::Json);
        sink.on_event(1, &event()).unwrap();
        sink.on_event(2, &event()).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: TickEvent = serde_json::from_str(lines.first().unwrap()).unwrap();
        assert_eq!(parsed, event());
    }

    #[test]
    fn csv_rows_follow_the_header() {
        let mut sink = CsvSink::new(Vec::new());
        sink.on_event(1, &event()).unwrap();
        sink.on_event(2, &event()).unwrap();
        sink.finish().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                CSV_HEADER,
                "1,2,1,22/7,-3/5,1/1,-414",
                "2,2,1,22/7,-3/5,1/1,-414",
            ]
        );
    }

    #[test]
    fn empty_csv_still_has_a_header() {
        let mut sink = CsvSink::new(Vec::new());
        sink.finish().unwrap();
        sink.finish().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, format!("{CSV_HEADER}\n"));
    }
}
