//! Enumerate the Cartesian product of run parameters.

use uuid::Uuid;

use crate::gcode::Axis;
use crate::storage::filename::FilenameMeta;

/// Short opaque identifier embedded in file names.
fn short_hash() -> String {
    let (time_low, ..) = Uuid::new_v4().as_fields();
    format!("{time_low:08x}")
}

/// Parameters of one capture run. Created by the planner, immutable after.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunDescriptor {
    pub sequence_nr: u16,
    pub axis: Axis,
    pub frequency_hz: u16,
    /// Damping ratio times 100.
    pub zeta_em2: u8,
    /// Shared by all runs of one planner invocation.
    pub run_hash: String,
    /// Unique per run.
    pub stream_hash: String,
    pub prefix: String,
}

impl RunDescriptor {
    /// Output file name, stamped with the current time.
    pub fn filename(&self) -> String {
        FilenameMeta::for_stream(
            &self.prefix,
            &self.run_hash,
            &self.stream_hash,
            self.sequence_nr,
            self.axis,
            self.frequency_hz,
            self.zeta_em2,
        )
        .format()
    }
}

/// Generates run descriptors over inclusive frequency and zeta ranges,
/// nested axis → frequency → zeta → sequence.
#[derive(Clone, Debug)]
pub struct RunPlanner {
    pub axes: Vec<Axis>,
    pub fx_start_hz: u16,
    pub fx_stop_hz: u16,
    pub fx_step_hz: u16,
    pub zeta_start_em2: u8,
    pub zeta_stop_em2: u8,
    pub zeta_step_em2: u8,
    pub sequence_repeat_count: u16,
    pub prefix: String,
}

impl RunPlanner {
    pub fn plan(&self) -> Vec<RunDescriptor> {
        let run_hash = short_hash();
        let fx_step = usize::from(self.fx_step_hz.max(1));
        let zeta_step = usize::from(self.zeta_step_em2.max(1));

        let mut runs = Vec::new();
        for &axis in &self.axes {
            for frequency_hz in (self.fx_start_hz..=self.fx_stop_hz).step_by(fx_step) {
                for zeta_em2 in (self.zeta_start_em2..=self.zeta_stop_em2).step_by(zeta_step) {
                    for sequence_nr in 0..self.sequence_repeat_count {
                        runs.push(RunDescriptor {
                            sequence_nr,
                            axis,
                            frequency_hz,
                            zeta_em2,
                            run_hash: run_hash.clone(),
                            stream_hash: short_hash(),
                            prefix: self.prefix.clone(),
                        });
                    }
                }
            }
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn planner() -> RunPlanner {
        RunPlanner {
            axes: vec![Axis::X, Axis::Y],
            fx_start_hz: 10,
            fx_stop_hz: 20,
            fx_step_hz: 10,
            zeta_start_em2: 0,
            zeta_stop_em2: 5,
            zeta_step_em2: 5,
            sequence_repeat_count: 2,
            prefix: "cap".to_string(),
        }
    }

    #[test]
    fn enumerates_the_full_cartesian_product_in_order() {
        let runs = planner().plan();
        assert_eq!(runs.len(), 16);

        let key = |r: &RunDescriptor| (r.axis, r.frequency_hz, r.zeta_em2, r.sequence_nr);
        let mut sorted: Vec<_> = runs.iter().map(key).collect();
        sorted.sort();
        assert_eq!(runs.iter().map(key).collect::<Vec<_>>(), sorted);

        assert_eq!(key(&runs[0]), (Axis::X, 10, 0, 0));
        assert_eq!(key(&runs[15]), (Axis::Y, 20, 5, 1));
    }

    #[test]
    fn ranges_are_inclusive_on_both_ends() {
        let mut p = planner();
        p.axes = vec![Axis::Z];
        p.sequence_repeat_count = 1;
        let runs = p.plan();
        let frequencies: Vec<u16> = runs.iter().map(|r| r.frequency_hz).collect();
        assert!(frequencies.contains(&10) && frequencies.contains(&20));
        let zetas: Vec<u8> = runs.iter().map(|r| r.zeta_em2).collect();
        assert!(zetas.contains(&0) && zetas.contains(&5));
    }

    #[test]
    fn hashes_group_runs_and_separate_streams() {
        let runs = planner().plan();
        let run_hashes: HashSet<_> = runs.iter().map(|r| r.run_hash.clone()).collect();
        assert_eq!(run_hashes.len(), 1);
        let stream_hashes: HashSet<_> = runs.iter().map(|r| r.stream_hash.clone()).collect();
        assert_eq!(stream_hashes.len(), runs.len());
        assert!(runs.iter().all(|r| r.stream_hash.len() == 8));
    }

    #[test]
    fn descriptor_filenames_parse_back() {
        let runs = planner().plan();
        let meta = FilenameMeta::parse(&runs[3].filename()).unwrap();
        assert_eq!(meta.sequence_nr, runs[3].sequence_nr);
        assert_eq!(meta.axis, runs[3].axis);
        assert_eq!(meta.frequency_hz, runs[3].frequency_hz);
        assert_eq!(meta.zeta_em2, runs[3].zeta_em2);
        assert_eq!(meta.run_hash, runs[3].run_hash);
    }

    #[test]
    fn empty_axis_list_plans_nothing() {
        let mut p = planner();
        p.axes.clear();
        assert!(p.plan().is_empty());
    }
}
