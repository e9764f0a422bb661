//! CONFIG_FILE selection, kept in its own test binary since it mutates the environment

use std::io::Write;
use tempfile::NamedTempFile;
use transit_beacon::infra::Config;

#[test]
fn test_config_file_env_selects_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(
            br#"
[feed]
url = "http://feed.test/"

[area]
lower_left = [24.0, 60.0]
upper_right = [25.0, 61.0]

[[triggers]]
line = "1010"
direction = "0"
alert_point = [24.5, 60.5]
passby_point = [24.6, 60.5]

[geofence]
search_radius_m = 75.0
move_threshold_m = 15.0

[cadence]
normal_secs = 30
intensive_secs = 5
"#,
        )
        .unwrap();
    temp_file.flush().unwrap();
    let path = temp_file.path().to_string_lossy().to_string();

    std::env::set_var("CONFIG_FILE", &path);

    let config = Config::load(None);
    assert_eq!(config.config_file(), path);
    assert_eq!(config.triggers().len(), 1);
    assert_eq!(config.triggers()[0].line, "1010");

    // An explicit path still wins over the environment
    let config = Config::load(Some("/nonexistent/config.toml"));
    assert_eq!(config.config_file(), "default");

    std::env::remove_var("CONFIG_FILE");
}
