use std::io::{self, Write};
use std::path::Path;

use crate::sim::Sample;

/// Write trajectory samples as CSV.
///
/// Columns: time, mission_time, phase, stage, pos_x, pos_y, pos_z,
///          vel_x, vel_y, vel_z, mass, roll_deg, pitch_deg, yaw_deg,
///          altitude, speed, nav_error, nav_velocity_error
pub fn write_trajectory<W: Write>(writer: &mut W, samples: &[Sample]) -> io::Result<()> {
    writeln!(
        writer,
        "time,mission_time,phase,stage,pos_x,pos_y,pos_z,vel_x,vel_y,vel_z,\
         mass,roll_deg,pitch_deg,yaw_deg,altitude,speed,nav_error,nav_velocity_error"
    )?;

    for s in samples {
        writeln!(
            writer,
            "{:.3},{:.3},{},{},{:.2},{:.2},{:.2},{:.4},{:.4},{:.4},\
             {:.1},{:.3},{:.3},{:.3},{:.2},{:.4},{:.3},{:.4}",
            s.time,
            s.mission_time,
            s.phase,
            s.stage,
            s.pos.x, s.pos.y, s.pos.z,
            s.vel.x, s.vel.y, s.vel.z,
            s.mass,
            s.attitude.x.to_degrees(),
            s.attitude.y.to_degrees(),
            s.attitude.z.to_degrees(),
            s.altitude,
            s.speed,
            s.nav_error,
            s.nav_velocity_error,
        )?;
    }

    Ok(())
}

/// Write trajectory to a CSV file at the given path.
pub fn write_trajectory_file(path: impl AsRef<Path>, samples: &[Sample]) -> io::Result<()> {
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    write_trajectory(&mut file, samples)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timebase::Timebase;
    use nalgebra::Vector3;

    fn sample(time: f64, phase: Timebase) -> Sample {
        Sample {
            time,
            mission_time: time - 10.0,
            phase,
            stage: 1,
            pos: Vector3::new(6_373_338.0, 0.0, 0.0),
            vel: Vector3::new(0.0, 408.0, 0.0),
            mass: 586_000.0,
            attitude: Vector3::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0),
            altitude: 15_201.0,
            speed: 408.0,
            nav_error: 0.0,
            nav_velocity_error: 0.0,
        }
    }

    #[test]
    fn csv_output_has_header_and_rows() {
        let samples = vec![sample(10.0, Timebase::ReferenceReleased), sample(15.1, Timebase::Tb1)];

        let mut buf = Vec::new();
        write_trajectory(&mut buf, &samples).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[0].starts_with("time,mission_time,phase,"));
        assert_eq!(lines.len(), 3); // header + 2 data rows
        assert!(lines[1].starts_with("10.000,0.000,GRR,1,"));
        assert!(lines[2].contains(",TB1,"));
        assert!(lines[2].contains(",90.000,"), "{}", lines[2]);
        let columns = lines[0].split(',').count();
        assert!(lines.iter().all(|l| l.split(',').count() == columns));
    }
}
