//! Bin-packing of the expanded file list into archive plans.
//!
//! First-fit over the input order, no reordering: files accumulate into
//! the running archive while the estimated compressed total stays under
//! the target; the archive is then flushed and a new one started. A
//! single file whose estimate alone reaches the target forms its own
//! archive — that one may exceed the cap.

use tracing::{debug, info};

use crate::estimate::Estimator;
use crate::model::{ArchiveElement, ArchivePlan};
use crate::naming::OutputNames;
use crate::types::ArchiveType;

#[derive(Debug, Clone, Copy)]
pub struct Planner {
    estimator: Estimator,
    /// Soft upper bound per archive, bytes (already clamped by config).
    target_size: u64,
    archive_type: ArchiveType,
}

impl Planner {
    pub fn new(estimator: Estimator, target_size: u64, archive_type: ArchiveType) -> Planner {
        Planner {
            estimator,
            target_size,
            archive_type,
        }
    }

    /// Group `elements` into archive plans. Entry order within an archive
    /// is the input order; ids are contiguous from 0. Empty input yields
    /// no plans.
    pub fn plan(&self, elements: Vec<ArchiveElement>, names: &OutputNames) -> Vec<ArchivePlan> {
        let mut plans: Vec<ArchivePlan> = Vec::new();
        let mut running: Vec<ArchiveElement> = Vec::new();
        let mut running_est: u64 = 0;
        let mut counter: u32 = 0;

        for element in elements {
            let est = self.estimator.estimate(element.size, self.archive_type);
            if running.is_empty() || running_est + est < self.target_size {
                debug!(uri = %element.uri, est, "adding element to archive {counter}");
                running_est += est;
                running.push(element);
            } else {
                plans.push(self.flush(std::mem::take(&mut running), running_est, counter, names));
                counter += 1;
                running_est = est;
                running.push(element);
            }
        }
        if !running.is_empty() {
            plans.push(self.flush(running, running_est, counter, names));
        }

        info!(
            archives = plans.len(),
            target = self.target_size,
            "archive planning complete"
        );
        plans
    }

    fn flush(
        &self,
        elements: Vec<ArchiveElement>,
        estimated_size: u64,
        id: u32,
        names: &OutputNames,
    ) -> ArchivePlan {
        ArchivePlan {
            id,
            archive_type: self.archive_type,
            output_file: names.output_file(id),
            elements,
            estimated_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundler_fs::Uri;

    const MB: u64 = 1024 * 1024;

    fn element(name: &str, size: u64) -> ArchiveElement {
        ArchiveElement {
            uri: Uri::parse(&format!("/data/{name}")),
            entry_path: format!("data/{name}"),
            size,
        }
    }

    fn planner(target_mb: u64, pct: u64) -> Planner {
        Planner::new(Estimator::new(pct), target_mb * MB, ArchiveType::Zip)
    }

    fn names() -> OutputNames {
        OutputNames::new(
            &Uri::parse("file:///staging"),
            "JOB",
            None,
            ArchiveType::Zip,
        )
    }

    #[test]
    fn splits_across_the_target_boundary() {
        // Three 40 MB files, no compression credit, 100 MB target: the
        // first two fit (80 < 100), the third starts archive 1.
        let plans = planner(100, 0).plan(
            vec![
                element("a.bin", 40 * MB),
                element("b.bin", 40 * MB),
                element("c.bin", 40 * MB),
            ],
            &names(),
        );
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].elements.len(), 2);
        assert_eq!(plans[1].elements.len(), 1);
        assert_eq!(plans[0].id, 0);
        assert_eq!(plans[1].id, 1);
        assert_eq!(plans[1].elements[0].entry_path, "data/c.bin");
    }

    #[test]
    fn oversize_single_file_forms_its_own_archive() {
        let plans = planner(100, 0).plan(vec![element("huge.bin", 500 * MB)], &names());
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].elements.len(), 1);
        assert_eq!(plans[0].size(), 500 * MB);
    }

    #[test]
    fn oversize_file_mid_stream_still_gets_own_archive() {
        let plans = planner(100, 0).plan(
            vec![
                element("a.bin", 10 * MB),
                element("huge.bin", 500 * MB),
                element("b.bin", 10 * MB),
            ],
            &names(),
        );
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[1].elements.len(), 1);
        assert_eq!(plans[1].elements[0].entry_path, "data/huge.bin");
    }

    #[test]
    fn empty_input_yields_no_plans() {
        assert!(planner(100, 0).plan(Vec::new(), &names()).is_empty());
    }

    #[test]
    fn packing_is_deterministic() {
        let input: Vec<ArchiveElement> = (0..64)
            .map(|i| element(&format!("f{i}.bin"), (i % 7 + 1) * 13 * MB))
            .collect();
        let first = planner(100, 30).plan(input.clone(), &names());
        let second = planner(100, 30).plan(input, &names());
        let shape =
            |plans: &[ArchivePlan]| -> Vec<Vec<String>> {
                plans
                    .iter()
                    .map(|p| p.elements.iter().map(|e| e.entry_path.clone()).collect())
                    .collect()
            };
        assert_eq!(shape(&first), shape(&second));
    }

    #[test]
    fn estimator_credit_changes_the_split() {
        // 60 MB files at 50% compression estimate to 30 MB each; five of
        // them fit under a 160 MB target (150 < 160).
        let input: Vec<ArchiveElement> = (0..5)
            .map(|i| element(&format!("f{i}.bin"), 60 * MB))
            .collect();
        let plans = planner(160, 50).plan(input, &names());
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].elements.len(), 5);
    }
}
