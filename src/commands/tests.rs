#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    use crate::cdx::CdxFormat;
    use crate::commands::{output_file_name, run_index, IndexOptions, OutputPlan, StagedOutput};
    use crate::config::SiftConfig;
    use crate::error::BatchError;
    use crate::pipeline::InputKind;

    fn options(output: Option<&Path>, concatenate: bool, format: CdxFormat) -> IndexOptions {
        IndexOptions {
            concatenate,
            output: output.map(Path::to_path_buf),
            ..IndexOptions::new(vec![PathBuf::from("in/a.warc.gz")], format)
        }
    }

    #[test]
    fn test_output_file_name_replaces_last_extension() {
        assert_eq!(output_file_name(Path::new("in/a.warc.gz"), "cdxj"), "a.warc.cdxj");
        assert_eq!(output_file_name(Path::new("b.arc"), "cdx"), "b.cdx");
        assert_eq!(output_file_name(Path::new("noext"), "cdx"), "noext.cdx");
    }

    #[test]
    fn test_no_output_means_stdout() {
        let plan = OutputPlan::resolve(&options(None, true, CdxFormat::Cdxj), &[]).unwrap();
        assert_eq!(plan, OutputPlan::Stdout);
    }

    #[test]
    fn test_concatenate_into_directory_uses_out_file() {
        let dir = tempdir().unwrap();
        let plan = OutputPlan::resolve(&options(Some(dir.path()), true, CdxFormat::Cdx11), &[]).unwrap();
        assert_eq!(plan, OutputPlan::Single(dir.path().join("out.cdx")));

        let file = dir.path().join("index.cdxj");
        let plan = OutputPlan::resolve(&options(Some(&file), true, CdxFormat::Cdxj), &[]).unwrap();
        assert_eq!(plan, OutputPlan::Single(file));
    }

    #[test]
    fn test_existing_output_is_refused() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("out.cdxj"), b"keep me").unwrap();

        let error = OutputPlan::resolve(&options(Some(dir.path()), true, CdxFormat::Cdxj), &[]).unwrap_err();
        assert!(error.to_string().contains("already exists"));

        fs::write(dir.path().join("a.warc.cdxj"), b"keep me too").unwrap();
        let inputs = vec![PathBuf::from("in/a.warc.gz")];
        let error = OutputPlan::resolve(&options(Some(dir.path()), false, CdxFormat::Cdxj), &inputs).unwrap_err();
        assert!(error.to_string().contains("already exists"));
        assert_eq!(fs::read(dir.path().join("a.warc.cdxj")).unwrap(), b"keep me too");
    }

    #[test]
    fn test_per_input_output_must_be_a_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("index.cdx");
        let inputs = vec![PathBuf::from("a.warc")];

        let error = OutputPlan::resolve(&options(Some(&file), false, CdxFormat::Cdx9), &inputs).unwrap_err();
        assert!(error.to_string().contains("must be a directory"));
    }

    #[test]
    fn test_per_input_pairs_and_collisions() {
        let dir = tempdir().unwrap();
        let inputs = vec![PathBuf::from("x/a.warc"), PathBuf::from("y/b.arc.gz")];
        let plan = OutputPlan::resolve(&options(Some(dir.path()), false, CdxFormat::Cdx9), &inputs).unwrap();
        assert_eq!(
            plan,
            OutputPlan::PerInput(vec![
                (inputs[0].clone(), dir.path().join("a.cdx")),
                (inputs[1].clone(), dir.path().join("b.arc.cdx")),
            ])
        );

        let clashing = vec![PathBuf::from("x/a.warc"), PathBuf::from("y/a.warc")];
        assert!(OutputPlan::resolve(&options(Some(dir.path()), false, CdxFormat::Cdx9), &clashing).is_err());
    }

    #[test]
    fn test_command_line_overrides_sort_settings() {
        let mut config = SiftConfig::default();
        let mut options = options(None, false, CdxFormat::Cdxj);
        options.apply_to(&mut config);
        assert_eq!(config.sort.scratch_files, 10);
        assert_eq!(config.sort.heap_size, 100);

        options.scratch_files = Some(5);
        options.heap_size = Some(2_000);
        options.apply_to(&mut config);
        assert_eq!(config.sort.scratch_files, 5);
        assert_eq!(config.sort.heap_size, 2_000);
    }

    /// CDX inputs with `lines` entries each, in their own directory.
    fn write_cdx_inputs(dir: &Path, files: usize, lines: usize) -> Vec<PathBuf> {
        let input_dir = dir.join("input");
        fs::create_dir_all(&input_dir).unwrap();
        (0..files)
            .map(|file| {
                let mut text = String::from(" CDX N b a m s k r V g\n");
                for line in 0..lines {
                    text.push_str(&format!(
                        "com,example)/{}/{:06} 20160101000000 http://example.com/{}/{:06} text/html 200 - - 0 f.warc\n",
                        file, line, file, line
                    ));
                }
                let path = input_dir.join(format!("part-{}.cdx", file));
                fs::write(&path, text).unwrap();
                path
            })
            .collect()
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir).unwrap().map(|entry| entry.unwrap().path()).collect();
        files.sort();
        files
    }

    #[test]
    fn test_staged_output_appears_only_when_published() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("index.cdx");

        let staged = StagedOutput::create(&target).unwrap();
        staged.writer().unwrap().write_all(b"line\n").unwrap();
        assert!(!target.exists());
        staged.publish().unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"line\n");

        let dropped = StagedOutput::create(&dir.path().join("dropped.cdx")).unwrap();
        drop(dropped);
        assert_eq!(files_in(dir.path()), vec![target.clone()]);

        let late = StagedOutput::create(&target).unwrap();
        late.writer().unwrap().write_all(b"other\n").unwrap();
        assert!(late.publish().is_err());
        assert_eq!(fs::read(&target).unwrap(), b"line\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_sort_publishes_nothing() {
        let dir = tempdir().unwrap();
        let inputs = write_cdx_inputs(dir.path(), 2, 5);
        let output_dir = dir.path().join("output");
        fs::create_dir(&output_dir).unwrap();

        let mut config = SiftConfig::default();
        config.sort.heap_size = 1;
        config.sort.temp_directory = dir.path().join("gone");
        let options = IndexOptions {
            sort: true,
            concatenate: true,
            output: Some(output_dir.clone()),
            ..IndexOptions::new(inputs.clone(), CdxFormat::Cdx9)
        };

        assert!(run_index(&options, &inputs, InputKind::Cdx, &config).await.is_err());
        assert!(files_in(&output_dir).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_batch_publishes_nothing() {
        for sort in [false, true] {
            let dir = tempdir().unwrap();
            let inputs = write_cdx_inputs(dir.path(), 3, 20_000);
            let output_dir = dir.path().join("output");
            fs::create_dir(&output_dir).unwrap();

            let mut config = SiftConfig::default();
            config.workers.max_parallelism = 1;
            config.workers.batch_timeout_secs = 0;
            config.sort.temp_directory = dir.path().to_path_buf();
            let options = IndexOptions {
                sort,
                concatenate: true,
                output: Some(output_dir.clone()),
                ..IndexOptions::new(inputs.clone(), CdxFormat::Cdx9)
            };

            let error = run_index(&options, &inputs, InputKind::Cdx, &config).await.unwrap_err();
            assert!(matches!(error.downcast_ref::<BatchError>(), Some(BatchError::Timeout(_))));

            // Producers still running after the timeout must not bring the output back.
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            assert!(files_in(&output_dir).is_empty(), "sort={}", sort);
        }
    }
}
