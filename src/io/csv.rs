use std::io::{self, Write};

use crate::sim::Sample;

/// Write sampled telemetry in CSV format.
///
/// Columns: time, pos_x, pos_y, pos_z, vel_x, vel_y, vel_z, speed,
///          fwd_x, fwd_y, fwd_z, thrust_x, thrust_y, thrust_z,
///          connected, cargo, activity
pub fn write_trajectory<W: Write>(writer: &mut W, samples: &[Sample]) -> io::Result<()> {
    writeln!(
        writer,
        "time,pos_x,pos_y,pos_z,vel_x,vel_y,vel_z,speed,\
         fwd_x,fwd_y,fwd_z,thrust_x,thrust_y,thrust_z,\
         connected,cargo,activity"
    )?;

    for s in samples {
        writeln!(
            writer,
            "{:.4},{:.3},{:.3},{:.3},{:.4},{:.4},{:.4},{:.4},\
             {:.6},{:.6},{:.6},{:.1},{:.1},{:.1},\
             {},{:.4},\"{}\"",
            s.time,
            s.pos.x, s.pos.y, s.pos.z,
            s.vel.x, s.vel.y, s.vel.z,
            s.speed(),
            s.forward.x, s.forward.y, s.forward.z,
            s.thrust.x, s.thrust.y, s.thrust.z,
            u8::from(s.connected),
            s.cargo,
            s.activity.replace('"', "\"\""),
        )?;
    }

    Ok(())
}

/// Write sampled telemetry to a CSV file at the given path.
pub fn write_trajectory_file(path: &str, samples: &[Sample]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_trajectory(&mut file, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn csv_output_has_header_and_rows() {
        let samples = vec![
            Sample {
                time: 0.0,
                pos: Vector3::zeros(),
                vel: Vector3::zeros(),
                forward: -Vector3::z(),
                thrust: Vector3::zeros(),
                activity: "Cruise Locating, Arrival".into(),
                connected: false,
                cargo: 0.0,
            },
            Sample {
                time: 0.1,
                pos: Vector3::new(0.0, 0.0, -0.5),
                vel: Vector3::new(0.0, 0.0, -10.0),
                forward: -Vector3::z(),
                thrust: Vector3::new(0.0, 0.0, -2.0e5),
                activity: "Cruise Accelerating, Arrival".into(),
                connected: true,
                cargo: 0.25,
            },
        ];

        let mut buf = Vec::new();
        write_trajectory(&mut buf, &samples).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[0].starts_with("time,"));
        assert_eq!(lines.len(), 3); // header + 2 data rows
        assert!(lines[1].starts_with("0.0000,"));
        assert!(lines[2].ends_with(",1,0.2500,\"Cruise Accelerating, Arrival\""));
    }
}
