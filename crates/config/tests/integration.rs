//! Integration tests for config

#[cfg(test)]
mod tests {
    use sps2_config::Config;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently.
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
parallel_downloads = 8
disable_dl_timeout = true

[network]
timeout = 60
retries = 5
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.general.parallel_downloads, 8);
        assert!(config.general.disable_dl_timeout);
        assert_eq!(config.network.timeout, 60);
        assert_eq!(config.network.retries, 5);
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::remove_var("SPS2_PARALLEL_DOWNLOADS");
        std::env::remove_var("HTTP_USER_AGENT");

        std::env::set_var("SPS2_PARALLEL_DOWNLOADS", "2");
        std::env::set_var("HTTP_USER_AGENT", "sps2/test");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.general.parallel_downloads, 2);
        assert_eq!(config.network.user_agent.as_deref(), Some("sps2/test"));

        std::env::remove_var("SPS2_PARALLEL_DOWNLOADS");
        std::env::remove_var("HTTP_USER_AGENT");
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::remove_var("SPS2_PARALLEL_DOWNLOADS");
        std::env::set_var("SPS2_PARALLEL_DOWNLOADS", "not-a-number");

        let mut config = Config::default();
        let result = config.merge_env();
        assert!(result.is_err());

        std::env::remove_var("SPS2_PARALLEL_DOWNLOADS");
    }

    #[test]
    fn test_default_cache_and_tmp_paths() {
        let config = Config::default();
        assert_eq!(config.cache_path(), config.tmp_path());
    }
}
