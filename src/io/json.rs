use std::io::{self, Write};

use nalgebra::Vector3;

use crate::sim::{EventKind, RunResult};

/// Summary statistics computed from a simulation run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub scenario: String,
    pub finished: bool,
    pub duration: f64,
    pub distance_travelled: f64,
    pub max_speed: f64,
    pub final_speed: f64,
    pub final_position: Vector3<f64>,
    pub connections: usize,
    pub dispatched: Vec<String>,
}

impl RunSummary {
    /// Compute summary from a run.
    pub fn from_run(scenario: &str, run: &RunResult) -> Self {
        let distance_travelled: f64 = run
            .samples
            .windows(2)
            .map(|w| (w[1].pos - w[0].pos).norm())
            .sum();

        let max_speed = run.samples.iter().map(|s| s.speed()).fold(0.0_f64, f64::max);

        let (final_speed, final_position) = run
            .samples
            .last()
            .map(|s| (s.speed(), s.pos))
            .unwrap_or((0.0, Vector3::zeros()));

        RunSummary {
            scenario: scenario.to_string(),
            finished: run.finished,
            duration: run.duration(),
            distance_travelled,
            max_speed,
            final_speed,
            final_position,
            connections: run.events.iter().filter(|e| e.kind == EventKind::Connected).count(),
            dispatched: run.dispatched.clone(),
        }
    }
}

fn json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Write run summary as JSON to a writer.
pub fn write_summary<W: Write>(writer: &mut W, summary: &RunSummary) -> io::Result<()> {
    let dispatched: Vec<String> = summary.dispatched.iter().map(|d| json_string(d)).collect();
    let p = &summary.final_position;

    writeln!(writer, "{{")?;
    writeln!(writer, "  \"scenario\": {},", json_string(&summary.scenario))?;
    writeln!(writer, "  \"finished\": {},", summary.finished)?;
    writeln!(writer, "  \"performance\": {{")?;
    writeln!(writer, "    \"duration_s\": {:.2},", summary.duration)?;
    writeln!(writer, "    \"distance_m\": {:.2},", summary.distance_travelled)?;
    writeln!(writer, "    \"max_speed_ms\": {:.2},", summary.max_speed)?;
    writeln!(writer, "    \"final_speed_ms\": {:.3},", summary.final_speed)?;
    writeln!(writer, "    \"final_position_m\": [{:.2}, {:.2}, {:.2}],", p.x, p.y, p.z)?;
    writeln!(writer, "    \"connections\": {}", summary.connections)?;
    writeln!(writer, "  }},")?;
    writeln!(writer, "  \"dispatched\": [{}]", dispatched.join(", "))?;
    writeln!(writer, "}}")?;
    Ok(())
}

/// Write run summary JSON to a file.
pub fn write_summary_file(path: &str, summary: &RunSummary) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_summary(&mut file, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Sample, SimEvent};

    fn sample(time: f64, z: f64, vz: f64) -> Sample {
        Sample {
            time,
            pos: Vector3::new(0.0, 0.0, z),
            vel: Vector3::new(0.0, 0.0, vz),
            forward: -Vector3::z(),
            thrust: Vector3::zeros(),
            activity: String::new(),
            connected: false,
            cargo: 0.0,
        }
    }

    fn simple_run() -> RunResult {
        RunResult {
            samples: vec![sample(0.0, 0.0, 0.0), sample(10.0, -300.0, -40.0), sample(20.0, -400.0, 0.0)],
            events: vec![SimEvent { time: 19.0, kind: EventKind::Connected }],
            dispatched: vec!["DOCKED \"A\"".into()],
            finished: true,
            checkpoint: String::new(),
        }
    }

    #[test]
    fn summary_computes_extremes() {
        let s = RunSummary::from_run("Test", &simple_run());
        assert!((s.distance_travelled - 400.0).abs() < 1e-9);
        assert!((s.max_speed - 40.0).abs() < 1e-9);
        assert!((s.duration - 20.0).abs() < 1e-9);
        assert_eq!(s.connections, 1);
    }

    #[test]
    fn json_output_is_valid() {
        let summary = RunSummary::from_run("Test", &simple_run());
        let mut buf = Vec::new();
        write_summary(&mut buf, &summary).unwrap();
        let json = String::from_utf8(buf).unwrap();
        assert!(json.contains("\"scenario\": \"Test\""));
        assert!(json.contains("\"finished\": true"));
        assert!(json.contains("[\"DOCKED \\\"A\\\"\"]"));
    }
}
