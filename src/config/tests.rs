#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::config::model::*;
    use crate::constants::*;

    #[test]
    fn test_defaults() {
        let config = SiftConfig::default();

        assert_eq!(config.sort.scratch_files, DEFAULT_SCRATCH_FILES);
        assert_eq!(config.sort.heap_size, DEFAULT_HEAP_SIZE);
        assert_eq!(config.sort.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.workers.max_parallelism, DEFAULT_MAX_PARALLELISM);
        assert_eq!(config.workers.batch_timeout().as_secs(), 5 * 60 * 60);
        assert_eq!(config.logging.verbosity, "normal");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_bounds() {
        let mut config = SiftConfig::default();
        config.sort.scratch_files = 2;
        assert!(config.validate().is_err());

        let mut config = SiftConfig::default();
        config.sort.heap_size = 0;
        assert!(config.validate().is_err());

        let mut config = SiftConfig::default();
        config.workers.max_parallelism = 0;
        assert!(config.validate().is_err());

        let mut config = SiftConfig::default();
        config.logging.verbosity = "chatty".to_string();
        assert!(config.validate().is_err());

        let mut config = SiftConfig::default();
        config.sort.temp_directory = "/definitely/not/here".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "sort": { "heap_size": 5000 }, "logging": { "verbosity": "verbose" } }"#).unwrap();

        let config = SiftConfig::from_file(&path).unwrap();
        assert_eq!(config.sort.heap_size, 5000);
        assert_eq!(config.sort.scratch_files, DEFAULT_SCRATCH_FILES);
        assert_eq!(config.workers.max_parallelism, DEFAULT_MAX_PARALLELISM);
        assert_eq!(config.logging.verbosity, "verbose");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = SiftConfig::default();
        config.sort.scratch_files = 7;
        config.workers.max_parallelism = 3;
        config.to_file(&path).unwrap();

        let loaded = SiftConfig::from_file(&path).unwrap();
        assert_eq!(loaded.sort.scratch_files, 7);
        assert_eq!(loaded.workers.max_parallelism, 3);
    }

    #[test]
    fn test_bad_json_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let error = SiftConfig::from_file(&path).unwrap_err();
        assert!(error.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_memory_estimate_grows_with_heap() {
        let small = SiftConfig::default().sort;
        let mut large = small.clone();
        large.heap_size *= 10;
        assert!(large.estimated_memory_bytes() > small.estimated_memory_bytes());
    }
}
