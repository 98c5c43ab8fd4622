//! Run bookkeeping for the polyphase merge, kept apart from any file I/O.
//!
//! Distribution follows Knuth's Algorithm D (TAOCP vol. 3, 5.4.2): runs are dealt
//! onto `P = F - 1` files so that each level reaches a perfect generalized Fibonacci
//! distribution, with the shortfall of the last level kept as dummy runs. The merge
//! phase then repeatedly merges the front run of every input into the idle file and
//! rotates roles whenever an input runs dry.

use std::collections::VecDeque;

use crate::constants::MIN_SCRATCH_FILES;

/// One action the sort engine has to carry out during the merge phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStep {
    /// Merge the front run of every file in `inputs` into one run on `output`.
    /// `run_lines[i]` is the length of the run taken from `inputs[i]`.
    Merge {
        inputs: Vec<usize>,
        run_lines: Vec<u64>,
        output: usize,
    },
    /// `new_output` ran dry and becomes the merge target. The previous output
    /// `rewind` holds finished runs and must be rewound for reading.
    Rotate { new_output: usize, rewind: usize },
    /// Everything has been merged into a single run on `file`.
    Finished { file: Option<usize>, lines: u64 },
}

#[derive(Debug, Clone)]
pub struct PolyphaseSchedule {
    /// Ideal run count per input file at the current level (Knuth's `A[j]`).
    ideal: Vec<u64>,
    /// Runs still missing per input file to reach the ideal (Knuth's `D[j]`).
    dummy: Vec<u64>,
    level: u32,
    next: usize,
    started: bool,
    /// Run lengths, front run first, for all `F` files.
    runs: Vec<VecDeque<u64>>,
    output: usize,
    merging: bool,
    real_runs: u64,
    dummy_runs: u64,
    phases: usize,
}

impl PolyphaseSchedule {
    /// `scratch_files` includes the file reserved as the first merge target. Fewer than
    /// three cannot merge and are raised to three.
    pub fn new(scratch_files: usize) -> Self {
        let scratch_files = scratch_files.max(MIN_SCRATCH_FILES);
        let inputs = scratch_files - 1;
        Self {
            ideal: vec![1; inputs],
            dummy: vec![1; inputs],
            level: 1,
            next: 0,
            started: false,
            runs: vec![VecDeque::new(); scratch_files],
            output: inputs,
            merging: false,
            real_runs: 0,
            dummy_runs: 0,
            phases: 0,
        }
    }

    pub fn scratch_files(&self) -> usize {
        self.runs.len()
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn ideal_distribution(&self) -> &[u64] {
        &self.ideal
    }

    pub fn dummy_distribution(&self) -> &[u64] {
        &self.dummy
    }

    pub fn real_runs(&self) -> u64 {
        self.real_runs
    }

    pub fn dummy_runs(&self) -> u64 {
        self.dummy_runs
    }

    /// Completed merge phases, i.e. role rotations.
    pub fn phases(&self) -> usize {
        self.phases
    }

    pub fn runs_on(&self, file: usize) -> usize {
        self.runs[file].len()
    }

    /// Picks the file the next run goes to and records it as written.
    pub fn next_target(&mut self) -> usize {
        debug_assert!(!self.merging, "distribution already finished");
        if self.started {
            self.advance();
        }
        self.started = true;

        let target = self.next;
        self.dummy[target] = self.dummy[target].saturating_sub(1);
        target
    }

    /// Steps D3/D4: move to the file with the most missing runs, or up a level.
    fn advance(&mut self) {
        let j = self.next;
        let following = self.dummy.get(j + 1).copied().unwrap_or(0);
        if self.dummy[j] < following {
            self.next = j + 1;
        } else if self.dummy[j] == 0 {
            self.level_up();
            self.next = 0;
        } else {
            self.next = 0;
        }
    }

    fn level_up(&mut self) {
        self.level += 1;
        let first = self.ideal[0];
        for j in 0..self.ideal.len() {
            let following = self.ideal.get(j + 1).copied().unwrap_or(0);
            self.dummy[j] = first + following - self.ideal[j];
            self.ideal[j] = first + following;
        }
    }

    /// Records a run of `lines` lines written to `file` by the distribution phase.
    pub fn record_run(&mut self, file: usize, lines: u64) {
        self.runs[file].push_back(lines);
        self.real_runs += 1;
    }

    /// Ends distribution. Missing runs become empty runs at the front of each input.
    pub fn begin_merge(&mut self) {
        self.merging = true;
        if self.real_runs == 0 {
            return;
        }
        for (file, &missing) in self.dummy.iter().enumerate() {
            for _ in 0..missing {
                self.runs[file].push_front(0);
            }
            self.dummy_runs += missing;
        }
    }

    /// Advances the merge bookkeeping by one step and says what to do.
    pub fn next_merge_step(&mut self) -> MergeStep {
        if !self.merging {
            self.begin_merge();
        }

        let total: usize = self.runs.iter().map(VecDeque::len).sum();
        if total <= 1 {
            let file = self.runs.iter().position(|runs| !runs.is_empty());
            let lines = file.and_then(|f| self.runs[f].front().copied()).unwrap_or(0);
            return MergeStep::Finished { file, lines };
        }

        let inputs: Vec<usize> = (0..self.runs.len()).filter(|&f| f != self.output).collect();
        let output_has_runs = !self.runs[self.output].is_empty();

        if output_has_runs {
            if let Some(&dry) = inputs.iter().find(|&&f| self.runs[f].is_empty()) {
                let rewind = self.output;
                self.output = dry;
                self.phases += 1;
                return MergeStep::Rotate {
                    new_output: dry,
                    rewind,
                };
            }
        }

        let active: Vec<usize> = inputs.into_iter().filter(|&f| !self.runs[f].is_empty()).collect();
        let run_lines: Vec<u64> = active
            .iter()
            .map(|&f| self.runs[f].pop_front().unwrap_or(0))
            .collect();
        self.runs[self.output].push_back(run_lines.iter().sum());

        MergeStep::Merge {
            inputs: active,
            run_lines,
            output: self.output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distribute(schedule: &mut PolyphaseSchedule, runs: u64) -> Vec<usize> {
        (0..runs)
            .map(|_| {
                let target = schedule.next_target();
                schedule.record_run(target, 1);
                target
            })
            .collect()
    }

    /// Drives the merge to completion, returning the number of merge steps.
    fn merge_to_end(schedule: &mut PolyphaseSchedule) -> (usize, MergeStep) {
        schedule.begin_merge();
        let mut merges = 0;
        loop {
            match schedule.next_merge_step() {
                MergeStep::Merge { .. } => merges += 1,
                MergeStep::Rotate { .. } => {}
                finished => return (merges, finished),
            }
        }
    }

    #[test]
    fn test_three_files_follow_fibonacci() {
        // With two input files perfect distributions are consecutive Fibonacci numbers.
        let mut schedule = PolyphaseSchedule::new(3);
        let expected = [vec![1, 1], vec![2, 1], vec![3, 2], vec![5, 3], vec![8, 5], vec![13, 8]];

        for (level, ideal) in expected.iter().enumerate() {
            let total: u64 = ideal.iter().sum();
            let written = schedule.real_runs();
            distribute(&mut schedule, total - written);
            assert_eq!(schedule.level() as usize, level + 1);
            assert_eq!(schedule.ideal_distribution(), ideal.as_slice());
            assert!(schedule.dummy_distribution().iter().all(|&d| d == 0));
        }
    }

    #[test]
    fn test_four_files_match_knuth_table() {
        // Knuth 5.4.2 with three input files: 3, 5, 9, 17, 31, 57 runs.
        let mut schedule = PolyphaseSchedule::new(4);
        let expected = [
            vec![1, 1, 1],
            vec![2, 2, 1],
            vec![4, 3, 2],
            vec![7, 6, 4],
            vec![13, 11, 7],
            vec![24, 20, 13],
        ];

        for ideal in expected.iter() {
            let total: u64 = ideal.iter().sum();
            let written = schedule.real_runs();
            distribute(&mut schedule, total - written);
            assert_eq!(schedule.ideal_distribution(), ideal.as_slice());
        }
    }

    #[test]
    fn test_six_files_level_totals() {
        // Five input files: 5, 9, 17, 33, 65, 129 runs per perfect level.
        let mut schedule = PolyphaseSchedule::new(6);
        for total in [5u64, 9, 17, 33, 65, 129] {
            let written = schedule.real_runs();
            distribute(&mut schedule, total - written);
            assert_eq!(schedule.ideal_distribution().iter().sum::<u64>(), total);
            assert_eq!(schedule.dummy_distribution().iter().sum::<u64>(), 0);
        }
    }

    #[test]
    fn test_partial_level_keeps_dummies() {
        let mut schedule = PolyphaseSchedule::new(4);
        // Level 2 is (2, 2, 1) = 5 runs; stop after 4.
        let targets = distribute(&mut schedule, 4);
        assert_eq!(targets, vec![0, 1, 2, 0]);
        assert_eq!(schedule.level(), 2);
        assert_eq!(schedule.dummy_distribution(), &[0, 1, 0]);

        schedule.begin_merge();
        assert_eq!(schedule.dummy_runs(), 1);
        assert_eq!(schedule.runs_on(1), 2);
    }

    #[test]
    fn test_too_few_files_are_raised_and_merge_starts_itself() {
        let mut schedule = PolyphaseSchedule::new(1);
        assert_eq!(schedule.scratch_files(), 3);

        for lines in [4, 6] {
            let target = schedule.next_target();
            schedule.record_run(target, lines);
        }
        // No explicit begin_merge.
        let mut steps = 0;
        let finished = loop {
            steps += 1;
            match schedule.next_merge_step() {
                MergeStep::Finished { file, lines } => break (file, lines),
                _ => assert!(steps < 10),
            }
        };
        assert_eq!(finished.1, 10);
        assert!(finished.0.is_some());
    }

    #[test]
    fn test_merge_single_run() {
        let mut schedule = PolyphaseSchedule::new(3);
        let target = schedule.next_target();
        schedule.record_run(target, 7);

        let (merges, finished) = merge_to_end(&mut schedule);
        // The lone real run is merged with one dummy run.
        assert_eq!(merges, 1);
        assert_eq!(finished, MergeStep::Finished { file: Some(2), lines: 7 });
    }

    #[test]
    fn test_merge_without_runs() {
        let mut schedule = PolyphaseSchedule::new(3);
        let (merges, finished) = merge_to_end(&mut schedule);
        assert_eq!(merges, 0);
        assert_eq!(finished, MergeStep::Finished { file: None, lines: 0 });
    }

    #[test]
    fn test_merge_conserves_lines_for_every_run_count() {
        for files in 3..=7 {
            for runs in 1..=60u64 {
                let mut schedule = PolyphaseSchedule::new(files);
                for i in 0..runs {
                    let target = schedule.next_target();
                    schedule.record_run(target, i + 1);
                }

                let (_, finished) = merge_to_end(&mut schedule);
                let expected_lines = runs * (runs + 1) / 2;
                match finished {
                    MergeStep::Finished { file: Some(_), lines } => {
                        assert_eq!(lines, expected_lines, "files={} runs={}", files, runs)
                    }
                    other => panic!("unexpected end state {:?} for files={} runs={}", other, files, runs),
                }
            }
        }
    }

    #[test]
    fn test_perfect_distribution_merges_in_level_phases() {
        // 13 runs on three files is the level-5 perfect distribution (8, 5).
        let mut schedule = PolyphaseSchedule::new(3);
        distribute(&mut schedule, 13);
        assert_eq!(schedule.level(), 5);

        let (merges, _) = merge_to_end(&mut schedule);
        assert_eq!(schedule.dummy_runs(), 0);
        assert_eq!(schedule.phases(), 4);
        // 5 + 3 + 2 + 1 + 1 merges over the five phases.
        assert_eq!(merges, 12);
    }

    #[test]
    fn test_merge_steps_never_use_output_as_input() {
        let mut schedule = PolyphaseSchedule::new(5);
        distribute(&mut schedule, 23);
        schedule.begin_merge();

        loop {
            match schedule.next_merge_step() {
                MergeStep::Merge { inputs, run_lines, output } => {
                    assert!(!inputs.contains(&output));
                    assert_eq!(inputs.len(), run_lines.len());
                }
                MergeStep::Rotate { new_output, rewind } => assert_ne!(new_output, rewind),
                MergeStep::Finished { .. } => break,
            }
        }
    }
}
